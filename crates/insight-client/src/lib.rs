//! Client side of remediation action review.
//!
//! [`ApiClient`] is a thin typed wrapper over the HTTP API. [`ReviewSession`]
//! holds the operator's view of the actions: a cache of server records that is
//! only ever replaced by what the server returns, plus the set of ids with a
//! transition request in flight.

pub mod api;
pub mod error;
pub mod review;

pub use api::ApiClient;
pub use error::ClientError;
pub use review::{Control, Outcome, ResultPanel, ReviewSession};
