pub mod action;
pub mod config;
pub mod db;
pub mod error;
pub mod finding;
pub mod io;
pub mod paths;
pub mod types;

pub use action::{NewAction, RemediationAction};
pub use db::InsightDb;
pub use error::{InsightError, Result};
pub use types::ActionStatus;
