//! Executor for approved remediation actions.
//!
//! The runner claims each `approved` action with a compare-and-set
//! (`approved → executing`), dispatches on `action_type`, and records the
//! outcome as `completed` with a result or `failed` with the error text.

pub mod error;
pub mod executors;
pub mod runner;

pub use error::ExecutorError;
pub use executors::{ActionKind, Executors};
pub use runner::{run_action, run_loop, run_once, RunSummary};
