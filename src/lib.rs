//! Batch mail dispatcher over a recipient sheet stored in SQLite.
//!
//! A run selects up to `batch_size` eligible rows, renders a gendered
//! template per recipient, sends (or saves a draft once the send quota is
//! exhausted), writes the outcome back, and compacts the sheet.

pub mod blob;
pub mod columns;
pub mod compact;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod import;
pub mod mailer;
pub mod model;
pub mod pacing;
pub mod preview;
pub mod render;
pub mod store;
pub mod template;

pub use dispatch::{BatchReport, BatchResult, DispatchError, Dispatcher};
pub use store::{Journal, RecipientStore, SqliteStore};
