//! PRBAC - parametrized role-based access control
//!
//! Resolves the grants a user or group holds, answers point permission
//! checks, and compiles grants into query predicates. It exposes all modules
//! for testing purposes.

pub mod authz;
pub mod entities;
pub mod errors;
pub mod settings;
pub mod storage;
