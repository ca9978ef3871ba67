//! Scenario stage machine.
//!
//! A scenario moves through a fixed sequence of stages; each convergence
//! stage is entered only after the wait succeeds. Tracking the stage means
//! a failure report names the transition that died, not just the error.

use std::fmt;

use crate::VerifyError;

/// Where a scenario is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Uploaded,
    MetadataWritten,
    /// The content feed reached the given total.
    IndexConverged(u64),
    Updated,
    Commented,
    /// The comment's own feed reached its expected single entry.
    CommentFeedConverged,
    Done,
}

impl Stage {
    pub fn name(&self) -> String {
        match self {
            Stage::Init => "init".into(),
            Stage::Uploaded => "uploaded".into(),
            Stage::MetadataWritten => "metadata-written".into(),
            Stage::IndexConverged(n) => format!("index-converged({n})"),
            Stage::Updated => "updated".into(),
            Stage::Commented => "commented".into(),
            Stage::CommentFeedConverged => "comment-feed-converged".into(),
            Stage::Done => "done".into(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Tracks one scenario run. No partial success: the caller aborts on the
/// first [`ScenarioFailure`].
#[derive(Debug)]
pub struct Scenario {
    name: String,
    stage: Stage,
    transitions: Vec<(String, String)>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage: Stage::Init,
            transitions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Transitions recorded so far, as (from, to) stage names.
    pub fn transitions(&self) -> &[(String, String)] {
        &self.transitions
    }

    /// Move to the next stage, recording the transition.
    pub fn advance(&mut self, to: Stage) {
        tracing::info!(scenario = %self.name, from = %self.stage, to = %to, "stage");
        self.transitions.push((self.stage.name(), to.name()));
        self.stage = to;
    }

    /// Wrap an error with this scenario's name and current stage. The
    /// current stage is the last one successfully entered, so the report
    /// identifies which transition failed.
    pub fn failure(&self, source: VerifyError) -> ScenarioFailure {
        ScenarioFailure {
            scenario: self.name.clone(),
            stage: self.stage.name(),
            source,
        }
    }
}

/// A scenario that died, with the stage it died at and the underlying
/// verification error.
#[derive(Debug, thiserror::Error)]
#[error("scenario '{scenario}' failed at stage {stage}: {source}")]
pub struct ScenarioFailure {
    pub scenario: String,
    pub stage: String,
    #[source]
    pub source: VerifyError,
}
