//! Query functions, one module per table.

pub mod comments;
pub mod follows;
pub mod plans;
pub mod profiles;
