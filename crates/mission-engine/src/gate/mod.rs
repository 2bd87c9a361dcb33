//! Phase gates: the criterion a phase must meet before the next one starts.
//!
//! [`evaluate_gate`] decides; an unsatisfied gate is a normal outcome
//! carrying a [`GateBlocker`] whose `Display` is the human-readable reason.

pub mod evaluator;

use std::fmt;

use serde::Serialize;

pub use evaluator::evaluate_gate;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Result of evaluating a phase gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "blocker", rename_all = "snake_case")]
pub enum GateVerdict {
    Satisfied,
    Unsatisfied(GateBlocker),
}

impl GateVerdict {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }

    pub fn blocker(&self) -> Option<&GateBlocker> {
        match self {
            Self::Satisfied => None,
            Self::Unsatisfied(blocker) => Some(blocker),
        }
    }
}

/// Why a gate is not satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "keys", rename_all = "snake_case")]
pub enum GateBlocker {
    /// Keys of tasks not yet `done` or `skipped`.
    TasksOutstanding(Vec<String>),
    /// Keys of review-enabled tasks not yet `done`.
    ReviewsOutstanding(Vec<String>),
    /// No test results were recorded for the phase.
    NoTestResults,
    /// Names of failing tests.
    TestsFailing(Vec<String>),
    /// Only an explicit approval outside the engine can open this gate.
    ManualApprovalRequired,
    /// The phase carries a gate type the engine does not know.
    UnknownGateType(String),
}

impl GateBlocker {
    /// Whether this blocker signals a malformed phase rather than pending work.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::UnknownGateType(_))
    }
}

impl fmt::Display for GateBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TasksOutstanding(keys) => {
                write!(f, "{} task(s) not yet complete: {}", keys.len(), keys.join(", "))
            }
            Self::ReviewsOutstanding(keys) => write!(
                f,
                "{} reviewed task(s) not yet approved: {}",
                keys.len(),
                keys.join(", ")
            ),
            Self::NoTestResults => f.write_str("no test results recorded for phase"),
            Self::TestsFailing(names) => {
                write!(f, "{} test(s) failing: {}", names.len(), names.join(", "))
            }
            Self::ManualApprovalRequired => f.write_str("phase requires manual approval"),
            Self::UnknownGateType(gate) => write!(f, "unknown gate type {gate:?}"),
        }
    }
}
