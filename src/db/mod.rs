//! Database module: sheet models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: the recipient sheet as returned by repositories.
//! - `repo`: SQL-only functions that map rows into models.
//!
//! The repository API is re-exported at `batch_mailer::db` for convenience.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{Sheet, SheetRow};
