//! CLI argument definitions for PlanPilot.

use clap::{Parser, Subcommand};

/// PlanPilot - goal, milestone, and task tracking with live sync.
///
/// Start with `pp system init`, then `pp login <user>` and `pp goal add`.
#[derive(Parser, Debug)]
#[command(name = "pp")]
#[command(author, version, about = "Track goals, milestones, and tasks with live sync", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Use <path> as the data directory instead of the platform default.
    /// Can also be set via the PP_DATA_DIR environment variable.
    #[arg(short = 'D', long = "data-dir", global = true, env = "PP_DATA_DIR")]
    pub data_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// System administration commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },

    /// Sign in as a user (stored in config; used for all data access)
    Login {
        /// User id
        user: String,
    },

    /// Sign out the current user
    Logout,

    /// Goal management commands
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },

    /// Milestone management commands
    Milestone {
        #[command(subcommand)]
        command: MilestoneCommands,
    },

    /// Task management commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Show tasks scheduled for today, ranked by priority
    Today,

    /// Generate milestones and tasks for a goal via the AI backend
    Plan {
        /// Goal ID (e.g., gl-a1b2)
        goal_id: String,

        /// Backend base URL (overrides the configured backend_url)
        #[arg(long, env = "PP_BACKEND_URL")]
        backend: Option<String>,
    },

    /// Run the sync engine and print reload events as they arrive
    Watch,

    /// Start the web GUI (requires 'gui' feature)
    #[cfg(feature = "gui")]
    Gui {
        /// Port to listen on
        #[arg(short, long, env = "PP_GUI_PORT", default_value = "3030")]
        port: u16,

        /// Host address to bind to (use 0.0.0.0 for network access)
        #[arg(long, env = "PP_GUI_HOST", default_value = "127.0.0.1")]
        host: String,
    },
}

/// System subcommands
#[derive(Subcommand, Debug)]
pub enum SystemCommands {
    /// Initialize the data directory and document store
    Init,

    /// Show store location, signed-in user, and counts
    Status,

    /// Show version and build information
    Version,
}

/// Goal subcommands
#[derive(Subcommand, Debug)]
pub enum GoalCommands {
    /// Create a new goal
    Add {
        /// Goal statement
        name: String,

        /// Target timeframe (e.g., "3 months")
        #[arg(short, long)]
        timeframe: Option<String>,

        /// How success will be measured
        #[arg(long)]
        measurable: Option<String>,

        /// Why the goal is achievable
        #[arg(long)]
        achievable: Option<String>,

        /// Why the goal matters now
        #[arg(long)]
        relevance: Option<String>,

        /// Weekly time commitment in hours
        #[arg(short, long)]
        bandwidth: Option<u32>,
    },

    /// Refine what/why/when answers into a goal via the AI backend
    Refine {
        /// What you want to achieve
        #[arg(long)]
        what: String,

        /// Why it matters to you
        #[arg(long)]
        why: String,

        /// When you want it done
        #[arg(long)]
        when: String,

        /// Backend base URL (overrides the configured backend_url)
        #[arg(long, env = "PP_BACKEND_URL")]
        backend: Option<String>,
    },

    /// List goals with derived progress
    List,

    /// Show a goal with its milestones and tasks
    Show {
        /// Goal ID (e.g., gl-a1b2)
        id: String,
    },

    /// Update a goal
    Update {
        /// Goal ID
        id: String,

        /// New goal statement
        #[arg(long)]
        name: Option<String>,

        /// New timeframe
        #[arg(long)]
        timeframe: Option<String>,

        /// New measurability statement
        #[arg(long)]
        measurable: Option<String>,

        /// New achievability statement
        #[arg(long)]
        achievable: Option<String>,

        /// New relevance statement
        #[arg(long)]
        relevance: Option<String>,

        /// New weekly bandwidth in hours
        #[arg(long)]
        bandwidth: Option<u32>,
    },

    /// Delete a goal and everything under it
    Rm {
        /// Goal ID
        id: String,
    },

    /// Recompute and persist a goal's progress from its tasks
    Progress {
        /// Goal ID
        id: String,
    },
}

/// Milestone subcommands
#[derive(Subcommand, Debug)]
pub enum MilestoneCommands {
    /// Create a new milestone under a goal
    Add {
        /// Owning goal ID
        goal_id: String,

        /// Milestone title
        name: String,

        /// Detailed description
        #[arg(short, long)]
        description: Option<String>,

        /// Expected duration in weeks
        #[arg(short = 'w', long)]
        weeks: Option<f32>,
    },

    /// List milestones under a goal
    List {
        /// Owning goal ID
        goal_id: String,
    },

    /// Mark a milestone completed
    Done {
        /// Owning goal ID
        goal_id: String,
        /// Milestone ID
        id: String,
    },

    /// Delete a milestone and its tasks
    Rm {
        /// Owning goal ID
        goal_id: String,
        /// Milestone ID
        id: String,
    },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a new task under a milestone
    Add {
        /// Owning goal ID
        goal_id: String,

        /// Owning milestone ID
        milestone_id: String,

        /// Task title
        name: String,

        /// Scheduled day (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<chrono::NaiveDate>,

        /// Priority input: simplicity (1-5)
        #[arg(long)]
        simplicity: Option<u8>,

        /// Priority input: urgency (1-5)
        #[arg(long)]
        urgency: Option<u8>,

        /// Priority input: importance (1-5)
        #[arg(long)]
        importance: Option<u8>,
    },

    /// List tasks under a milestone
    List {
        /// Owning goal ID
        goal_id: String,
        /// Owning milestone ID
        milestone_id: String,
    },

    /// Toggle a task's completion flag
    Done {
        /// Owning goal ID
        goal_id: String,
        /// Owning milestone ID
        milestone_id: String,
        /// Task ID
        id: String,
    },

    /// Update a task
    Update {
        /// Owning goal ID
        goal_id: String,
        /// Owning milestone ID
        milestone_id: String,
        /// Task ID
        id: String,

        /// New task title
        #[arg(long)]
        name: Option<String>,

        /// New scheduled day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<chrono::NaiveDate>,

        /// New simplicity (1-5)
        #[arg(long)]
        simplicity: Option<u8>,

        /// New urgency (1-5)
        #[arg(long)]
        urgency: Option<u8>,

        /// New importance (1-5)
        #[arg(long)]
        importance: Option<u8>,
    },

    /// Delete a task
    Rm {
        /// Owning goal ID
        goal_id: String,
        /// Owning milestone ID
        milestone_id: String,
        /// Task ID
        id: String,
    },
}
