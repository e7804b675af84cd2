pub mod builders;
pub mod db;

pub use builders::{GrantBuilder, PermissionBuilder};
pub use db::{seed_group, seed_user, TestDb};
