use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a closed, snake_case string enum together with its `Display`,
/// `FromStr`, and parse-error type.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident / $err:ident ($label:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant, )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = $err;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok(Self::$variant), )+
                    other => Err($err(other.to_owned())),
                }
            }
        }

        #[doc = concat!("Error returned when parsing an invalid [`", stringify!($name), "`] string.")]
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $err(pub String);

        impl fmt::Display for $err {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "invalid {}: {:?}", $label, self.0)
            }
        }

        impl std::error::Error for $err {}
    };
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

text_enum! {
    /// Lifecycle status of a plan version.
    pub enum PlanStatus / PlanStatusParseError ("plan status") {
        Draft => "draft",
        Approved => "approved",
        Superseded => "superseded",
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// Lifecycle status of a phase.
    pub enum PhaseStatus / PhaseStatusParseError ("phase status") {
        Pending => "pending",
        Active => "active",
        Blocked => "blocked",
        Completed => "completed",
        Failed => "failed",
        Skipped => "skipped",
    }
}

text_enum! {
    /// Status of a task.
    pub enum TaskStatus / TaskStatusParseError ("task status") {
        Pending => "pending",
        Ready => "ready",
        InProgress => "in_progress",
        Review => "review",
        Done => "done",
        Failed => "failed",
        Skipped => "skipped",
    }
}

impl TaskStatus {
    /// Whether a task in this status releases the tasks it blocks.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }
}

text_enum! {
    /// Task priority as declared by the planner.
    #[derive(Default)]
    pub enum Priority / PriorityParseError ("priority") {
        Low => "low",
        #[default]
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

text_enum! {
    /// Kind of a task-to-task edge.
    pub enum EdgeType / EdgeTypeParseError ("edge type") {
        /// Target cannot start until the source is done or skipped.
        Blocks => "blocks",
        /// Source output flows into the target without gating it.
        Informs => "informs",
    }
}

text_enum! {
    /// What the circuit breaker does once a phase accumulates failures.
    pub enum FailurePolicy / FailurePolicyParseError ("failure policy") {
        StopPhase => "stop_phase",
        StopMission => "stop_mission",
        Continue => "continue",
    }
}

// ---------------------------------------------------------------------------

/// Completion criterion of a phase.
///
/// Stored values that do not name a known gate survive as
/// [`GateType::Unrecognized`] so the gate evaluator can report them instead
/// of failing to load the phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GateType {
    #[default]
    AllComplete,
    ReviewApproved,
    TestPass,
    ManualApproval,
    Unrecognized(String),
}

impl GateType {
    /// The four gate types a planner may declare.
    pub const KNOWN: [GateType; 4] = [
        Self::AllComplete,
        Self::ReviewApproved,
        Self::TestPass,
        Self::ManualApproval,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::AllComplete => "all_complete",
            Self::ReviewApproved => "review_approved",
            Self::TestPass => "test_pass",
            Self::ManualApproval => "manual_approval",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for GateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GateType {
    type Err = GateTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_complete" => Ok(Self::AllComplete),
            "review_approved" => Ok(Self::ReviewApproved),
            "test_pass" => Ok(Self::TestPass),
            "manual_approval" => Ok(Self::ManualApproval),
            other => Err(GateTypeParseError(other.to_owned())),
        }
    }
}

impl From<String> for GateType {
    fn from(raw: String) -> Self {
        raw.parse().unwrap_or(Self::Unrecognized(raw))
    }
}

impl From<GateType> for String {
    fn from(gate: GateType) -> Self {
        gate.as_str().to_owned()
    }
}

/// Error returned when parsing an invalid [`GateType`] string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateTypeParseError(pub String);

impl fmt::Display for GateTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid gate type: {:?}", self.0)
    }
}

impl std::error::Error for GateTypeParseError {}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Failure handling policy attached to a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub on_task_failure: FailurePolicy,
    /// Number of failed tasks in the active phase that trips the breaker.
    /// Always at least 1.
    pub max_phase_failures: u32,
}

impl CircuitBreakerConfig {
    pub const DEFAULT_MAX_PHASE_FAILURES: u32 = 3;
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            on_task_failure: FailurePolicy::StopPhase,
            max_phase_failures: Self::DEFAULT_MAX_PHASE_FAILURES,
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One versioned execution blueprint for a mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub mission_id: Uuid,
    pub version: u32,
    pub status: PlanStatus,
    pub title: String,
    pub description: Option<String>,
    pub circuit_breaker: CircuitBreakerConfig,
    pub created_by: String,
    pub approved_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
}

/// An ordered, gated stage within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: Uuid,
    pub plan_id: Uuid,
    /// Zero-based, gapless position within the plan.
    pub phase_index: u32,
    pub title: String,
    pub description: Option<String>,
    pub gate_type: GateType,
    pub status: PhaseStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A file or document a task is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub key: String,
    pub label: String,
    pub mime_type: String,
}

/// A unit of work assigned to one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub phase_id: Uuid,
    /// Plan-wide unique, human-stable identifier.
    pub key: String,
    pub title: String,
    pub instructions: String,
    pub agent_id: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub domains: Vec<String>,
    pub review_enabled: bool,
    pub review_agent_id: Option<String>,
    pub max_revisions: u32,
    pub revision_round: u32,
    /// Upstream task key -> upstream output text.
    pub input_context: BTreeMap<String, String>,
    pub output: Option<String>,
    pub output_artifacts: Vec<OutputArtifact>,
    pub error: Option<String>,
    pub sort_order: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A directed relationship between two tasks of the same plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub plan_id: Uuid,
    pub source_task_id: Uuid,
    pub target_task_id: Uuid,
    pub edge_type: EdgeType,
}

/// An externally produced test outcome, consumed by `test_pass` gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub phase_id: Uuid,
    pub name: String,
    pub passed: bool,
}
