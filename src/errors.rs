use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PrbacError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(prbac::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(prbac::config))]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(prbac::serde))]
    Serde(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    #[diagnostic(code(prbac::db))]
    Db(#[from] sea_orm::DbErr),

    #[error("Corrupt record: {0}")]
    #[diagnostic(
        code(prbac::corrupt_record),
        help("A stored row references data that no longer exists or cannot be decoded")
    )]
    CorruptRecord(String),

    #[error("Bad request: {0}")]
    #[diagnostic(code(prbac::bad_request))]
    BadRequest(String),
}
