//! Feedprobe verifier -- eventual-consistency verification of activity feeds.
//!
//! A mutation against the server commits synchronously, but the activity
//! index that feeds the feed endpoint trails it. The verifier issues
//! mutations through the session client, waits for the index to converge
//! with a bounded polling primitive, and asserts the feed's count and
//! newest-first ordering. Scenarios are all-or-nothing: the first failed
//! transition aborts the run with the stage it died at.

pub mod convergence;
pub mod scenario;

pub use convergence::{await_convergence, confirm_stable, ConvergencePolicy};
pub use scenario::{Scenario, ScenarioFailure, Stage};

/// Why a verification step failed.
///
/// Mutations are never retried (creates are not idempotent); only feed
/// reads are, and only inside the convergence wait.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// A mutating call failed outright. Fatal, aborts the scenario.
    #[error("mutation failed: {0}")]
    Mutation(#[from] feedprobe_client::ClientError),

    /// The feed never reached the expected total within the wait budget.
    /// Carries the last observed state for diagnostics.
    #[error("feed for {target} did not reach total {expected} within {waited_ms}ms. last seen: {last}")]
    ConvergenceTimeout {
        target: String,
        expected: u64,
        waited_ms: u128,
        last: String,
    },

    /// A feed read failed outside the convergence wait.
    #[error("feed read failed: {0}")]
    Fetch(#[from] feedprobe_activity::FeedError),

    /// Feed content present but semantically wrong.
    #[error(transparent)]
    Mismatch(#[from] feedprobe_activity::FeedMismatch),

    /// Metadata read-back did not return what was written.
    #[error("metadata at {path} has {key}={actual}, expected {expected}")]
    MetadataMismatch {
        path: String,
        key: String,
        expected: String,
        actual: String,
    },
}
