use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{fmt, EnvFilter};

use prbac::authz::mutator::GrantOutcome;
use prbac::authz::types::{parse_assignment, ParamValue, ParameterValues, SubjectRef};
use prbac::authz::Authorizer;
use prbac::{settings, storage};

#[derive(Parser, Debug)]
#[command(
    name = "prbac",
    version,
    about = "Parametrized role-based access control"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Manage the permission catalog
    #[command(subcommand)]
    Permission(PermissionCommand),
    /// Check whether a subject may perform an action
    Check(GrantArgs),
    /// Grant a permission to a user or group
    Grant(GrantArgs),
    /// Revoke a direct grant from a user or group
    Revoke(GrantArgs),
    /// List the grants held directly by a user or group
    Grants {
        #[command(flatten)]
        subject: SubjectArgs,
    },
}

#[derive(Subcommand, Debug)]
enum PermissionCommand {
    /// Define a new permission
    Create {
        code: String,
        #[arg(long, default_value = "global")]
        scope: String,
        /// Declared parameter name; repeat for several
        #[arg(long = "parameter")]
        parameters: Vec<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List all defined permissions
    List,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct SubjectArgs {
    #[arg(long)]
    user: Option<String>,
    #[arg(long)]
    group: Option<String>,
}

impl SubjectArgs {
    fn subject(&self) -> Result<SubjectRef> {
        self.user
            .clone()
            .map(SubjectRef::user)
            .or_else(|| self.group.clone().map(SubjectRef::group))
            .ok_or_else(|| miette::miette!("either --user or --group is required"))
    }
}

#[derive(Args, Debug)]
struct GrantArgs {
    #[command(flatten)]
    subject: SubjectArgs,
    /// Permission code, e.g. can_view:module
    #[arg(long)]
    action: String,
    /// Parameter assignment name=value; repeat for several
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, ParamValue)>,
}

impl GrantArgs {
    fn values(&self) -> ParameterValues {
        self.params.iter().cloned().collect()
    }
}

fn parse_param(s: &str) -> std::result::Result<(String, ParamValue), String> {
    parse_assignment(s).ok_or_else(|| format!("expected name=value, got `{s}`"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::debug!(?settings, "Loaded configuration");

    // init storage (database)
    let db = storage::init(&settings.database).await?;

    match cli.command {
        Command::Migrate => {
            storage::migrate(&db).await?;
        }
        Command::Permission(PermissionCommand::Create {
            code,
            scope,
            parameters,
            description,
        }) => {
            let permission = storage::create_permission(
                &db,
                storage::NewPermission {
                    code,
                    description,
                    scope,
                    parameters,
                },
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&permission).into_diagnostic()?);
        }
        Command::Permission(PermissionCommand::List) => {
            for permission in storage::list_permissions(&db).await? {
                let parameters: Vec<&str> =
                    permission.parameters.iter().map(String::as_str).collect();
                println!(
                    "{}\t{}\t[{}]\t{}",
                    permission.code,
                    permission.scope,
                    parameters.join(", "),
                    permission.description
                );
            }
        }
        Command::Check(args) => {
            let authorizer = Authorizer::new(db, settings.authz);
            let subject = args.subject.subject()?;
            let allowed = authorizer
                .has_permission(&subject, &args.action, &args.values())
                .await?;
            println!("{}", if allowed { "allowed" } else { "denied" });
            if !allowed {
                std::process::exit(1);
            }
        }
        Command::Grant(args) => {
            let authorizer = Authorizer::new(db, settings.authz);
            let subject = args.subject.subject()?;
            match authorizer.grant(&subject, &args.action, args.values()).await? {
                GrantOutcome::Created => println!("granted"),
                GrantOutcome::AlreadyImplied => println!("already granted"),
            }
        }
        Command::Revoke(args) => {
            let authorizer = Authorizer::new(db, settings.authz);
            let subject = args.subject.subject()?;
            authorizer
                .revoke(&subject, &args.action, args.values())
                .await?;
            println!("revoked");
        }
        Command::Grants { subject } => {
            let subject = subject.subject()?;
            for grant in storage::list_grants(&db, &subject).await? {
                let values: Vec<String> = grant
                    .parameter_values
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect();
                println!("{}\t{}", grant.permission.code, values.join(" "));
            }
        }
    }

    Ok(())
}
