//! Data models for PlanPilot entities.
//!
//! This module defines the core data structures:
//! - `Goal` - Top-level objective with a timeframe and a cached progress value
//! - `Milestone` - AI-generated sub-objective under a goal, spanning weeks
//! - `Task` - Smallest actionable unit under a milestone, with a date
//! - `GoalPatch` / `MilestonePatch` / `TaskPatch` - Partial updates for merges
//! - `PriorityTier` - Derived priority bucket from simplicity/urgency/importance

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A top-level user objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    /// Unique identifier (e.g., "gl-a1b2"), assigned by the store
    #[serde(default)]
    pub id: String,

    /// Goal statement
    pub name: String,

    /// Target timeframe, free text (e.g., "3 months")
    #[serde(default)]
    pub timeframe: String,

    /// How success will be measured
    #[serde(default)]
    pub measurable: String,

    /// Why the goal is achievable
    #[serde(default)]
    pub achievable: String,

    /// Why the goal matters now
    #[serde(default)]
    pub relevance: String,

    /// Weekly time commitment in hours
    #[serde(default)]
    pub bandwidth: u32,

    /// Completion percentage (0-100). Cached; recomputed from tasks when
    /// task data is available, retained as-is otherwise.
    #[serde(default)]
    pub progress: u8,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    /// Create a new goal with the given name. Progress starts at zero.
    pub fn new(name: String) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name,
            timeframe: String::new(),
            measurable: String::new(),
            achievable: String::new(),
            relevance: String::new(),
            bandwidth: 0,
            progress: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a goal. Only the populated fields are merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurable: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievable: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

/// A sub-objective under a goal, typically produced by the planner backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    /// Unique identifier (e.g., "ms-a1b2"), assigned by the store
    #[serde(default)]
    pub id: String,

    /// Owning goal id
    pub goal_id: String,

    /// Milestone title
    pub name: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    /// Expected duration in weeks
    #[serde(default)]
    pub duration_weeks: f32,

    /// Completion flag
    #[serde(default)]
    pub completed: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Milestone {
    /// Create a new milestone under the given goal.
    pub fn new(goal_id: String, name: String) -> Self {
        Self {
            id: String::new(),
            goal_id,
            name,
            description: String::new(),
            duration_weeks: 0.0,
            completed: false,
            created_at: Utc::now(),
        }
    }
}

/// Partial update for a milestone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MilestonePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_weeks: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

/// An actionable work item under a milestone.
///
/// `goal_id` and `milestone_id` must stay consistent: the referenced
/// milestone's `goal_id` equals the task's `goal_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (e.g., "tk-a1b2"), assigned by the store
    #[serde(default)]
    pub id: String,

    /// Owning goal id
    pub goal_id: String,

    /// Owning milestone id
    pub milestone_id: String,

    /// Task title
    pub name: String,

    /// Scheduled calendar day
    pub date: NaiveDate,

    /// Completion flag
    #[serde(default)]
    pub completed: bool,

    /// Priority input: how simple the task is (1-5)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simplicity: Option<u8>,

    /// Priority input: how urgent the task is (1-5)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<u8>,

    /// Priority input: how important the task is (1-5)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<u8>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task under the given goal and milestone, dated `date`.
    pub fn new(goal_id: String, milestone_id: String, name: String, date: NaiveDate) -> Self {
        Self {
            id: String::new(),
            goal_id,
            milestone_id,
            name,
            date,
            completed: false,
            simplicity: None,
            urgency: None,
            importance: None,
            created_at: Utc::now(),
        }
    }

    /// Derived priority tier, when all three inputs are present.
    pub fn priority(&self) -> Option<PriorityTier> {
        match (self.simplicity, self.urgency, self.importance) {
            (Some(s), Some(u), Some(i)) => Some(PriorityTier::from_inputs(s, u, i)),
            _ => None,
        }
    }
}

/// Partial update for a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub simplicity: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<u8>,
}

/// Priority bucket derived from the simplicity/urgency/importance inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Low,
    Medium,
    High,
}

impl PriorityTier {
    /// Compute the tier from the three 1-5 inputs.
    ///
    /// score = simplicity * urgency * importance; High at >= 75,
    /// Medium at >= 50, Low otherwise. Thresholds are inclusive.
    pub fn from_inputs(simplicity: u8, urgency: u8, importance: u8) -> Self {
        let score = u32::from(simplicity) * u32::from(urgency) * u32::from(importance);
        if score >= 75 {
            Self::High
        } else if score >= 50 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
