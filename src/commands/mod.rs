//! Command implementations for the PlanPilot CLI.
//!
//! Each CLI command maps to one function here returning a result type that
//! implements [`Output`]. Write paths go through the repository; read paths
//! that show hierarchy or derived values go through the sync engine's
//! mirror, the same data the GUI sees.

use chrono::{Local, NaiveDate};
use std::path::Path;
use std::sync::Arc;

use crate::auth::AuthContext;
use crate::config::Config;
use crate::models::{Goal, GoalPatch, Milestone, MilestonePatch, Task, TaskPatch};
use crate::planner::{MilestoneSuggestion, PlannerClient};
use crate::repo::Repository;
use crate::store::{validate_id, LocalStore};
use crate::sync::{derive, SyncEngine};
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

/// Everything a data-touching command needs: config, store, identity, repo.
struct Context {
    config: Config,
    store: LocalStore,
    auth: AuthContext,
    repo: Repository,
}

fn open_context(data_dir: &Path) -> Result<Context> {
    let config = Config::load(data_dir)?;
    if !LocalStore::exists(data_dir) {
        return Err(Error::NotInitialized);
    }
    let store = LocalStore::open(data_dir)?;
    let auth = match &config.user {
        Some(user) => AuthContext::with_user(user.clone()),
        None => AuthContext::signed_out(),
    };
    let repo = Repository::new(Arc::new(store.clone()), auth.clone());
    Ok(Context {
        config,
        store,
        auth,
        repo,
    })
}

/// Attach a sync engine over the context's store and pump it to
/// quiescence, so the mirror reflects the full stored hierarchy.
fn mirrored_engine(ctx: &Context) -> SyncEngine {
    let mut engine = SyncEngine::new(Arc::new(ctx.store.clone()), ctx.auth.clone());
    engine.attach();
    engine.pump();
    engine
}

// === system ===

#[derive(serde::Serialize)]
pub struct InitResult {
    pub data_dir: String,
    pub created: bool,
}

impl Output for InitResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.created {
            format!("Initialized data directory at {}", self.data_dir)
        } else {
            format!("Already initialized at {}", self.data_dir)
        }
    }
}

pub fn system_init(data_dir: &Path) -> Result<InitResult> {
    let created = !LocalStore::exists(data_dir);
    LocalStore::init(data_dir)?;
    let config = Config::load(data_dir)?;
    config.save(data_dir)?;
    Ok(InitResult {
        data_dir: data_dir.display().to_string(),
        created,
    })
}

#[derive(serde::Serialize)]
pub struct StatusResult {
    pub data_dir: String,
    pub initialized: bool,
    pub user: Option<String>,
    pub backend_url: Option<String>,
    pub goals: Option<usize>,
}

impl Output for StatusResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Data directory: {}", self.data_dir),
            format!("Initialized:    {}", self.initialized),
            format!("User:           {}", self.user.as_deref().unwrap_or("(not signed in)")),
            format!("Backend:        {}", self.backend_url.as_deref().unwrap_or("(not configured)")),
        ];
        if let Some(goals) = self.goals {
            lines.push(format!("Goals:          {}", goals));
        }
        lines.join("\n")
    }
}

pub async fn system_status(data_dir: &Path) -> Result<StatusResult> {
    let config = Config::load(data_dir)?;
    let initialized = LocalStore::exists(data_dir);

    let goals = if initialized && config.user.is_some() {
        let ctx = open_context(data_dir)?;
        Some(ctx.repo.list_goals().await?.len())
    } else {
        None
    };

    Ok(StatusResult {
        data_dir: data_dir.display().to_string(),
        initialized,
        user: config.user,
        backend_url: config.backend_url,
        goals,
    })
}

#[derive(serde::Serialize)]
pub struct VersionResult {
    pub version: String,
    pub build_timestamp: String,
    pub git_commit: String,
}

impl Output for VersionResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "pp {} (built {} from {})",
            self.version, self.build_timestamp, self.git_commit
        )
    }
}

pub fn version() -> VersionResult {
    VersionResult {
        version: env!("CARGO_PKG_VERSION").to_string(),
        build_timestamp: env!("PP_BUILD_TIMESTAMP").to_string(),
        git_commit: env!("PP_GIT_COMMIT").to_string(),
    }
}

// === auth ===

#[derive(serde::Serialize)]
pub struct LoginResult {
    pub user: String,
}

impl Output for LoginResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Signed in as {}", self.user)
    }
}

pub fn login(data_dir: &Path, user: &str) -> Result<LoginResult> {
    if user.trim().is_empty() || user.contains('/') {
        return Err(Error::InvalidInput(format!("invalid user id: {user:?}")));
    }
    let mut config = Config::load(data_dir)?;
    config.user = Some(user.to_string());
    config.save(data_dir)?;
    Ok(LoginResult {
        user: user.to_string(),
    })
}

#[derive(serde::Serialize)]
pub struct LogoutResult {
    pub user: Option<String>,
}

impl Output for LogoutResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match &self.user {
            Some(user) => format!("Signed out {}", user),
            None => "No user was signed in".to_string(),
        }
    }
}

pub fn logout(data_dir: &Path) -> Result<LogoutResult> {
    let mut config = Config::load(data_dir)?;
    let user = config.user.take();
    config.save(data_dir)?;
    Ok(LogoutResult { user })
}

// === goals ===

#[derive(Debug, serde::Serialize)]
pub struct CreatedResult {
    pub id: String,
    pub name: String,
}

impl Output for CreatedResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Created {} ({})", self.id, self.name)
    }
}

#[derive(serde::Serialize)]
pub struct UpdatedResult {
    pub id: String,
}

impl Output for UpdatedResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Updated {}", self.id)
    }
}

#[derive(serde::Serialize)]
pub struct DeletedResult {
    pub id: String,
}

impl Output for DeletedResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Deleted {}", self.id)
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn goal_add(
    data_dir: &Path,
    name: String,
    timeframe: Option<String>,
    measurable: Option<String>,
    achievable: Option<String>,
    relevance: Option<String>,
    bandwidth: Option<u32>,
) -> Result<CreatedResult> {
    let ctx = open_context(data_dir)?;
    let mut goal = Goal::new(name.clone());
    goal.timeframe = timeframe.unwrap_or_default();
    goal.measurable = measurable.unwrap_or_default();
    goal.achievable = achievable.unwrap_or_default();
    goal.relevance = relevance.unwrap_or_default();
    goal.bandwidth = bandwidth.unwrap_or_default();
    let id = ctx.repo.create_goal(&goal).await?;
    Ok(CreatedResult { id, name })
}

/// Ask the backend to refine a what/why/when answer set, then persist the
/// suggested goal.
pub async fn goal_refine(
    data_dir: &Path,
    what: String,
    why: String,
    when: String,
    backend: Option<String>,
) -> Result<CreatedResult> {
    let ctx = open_context(data_dir)?;
    let user = ctx.auth.current().ok_or(Error::Unauthenticated)?;
    let base_url = backend
        .or_else(|| ctx.config.backend_url.clone())
        .ok_or_else(|| {
            Error::InvalidInput(
                "no backend configured: set backend_url in config.toml or pass --backend"
                    .to_string(),
            )
        })?;

    let client = PlannerClient::new(base_url);
    let suggestion = client
        .smart_goal(&user, &crate::planner::PreGoal { what, why, when })
        .await?;

    let mut goal = Goal::new(suggestion.name.clone());
    goal.timeframe = suggestion.timeframe;
    goal.measurable = suggestion.measurable;
    goal.achievable = suggestion.achievable;
    goal.relevance = suggestion.relevance;
    goal.bandwidth = suggestion.bandwidth;
    let id = ctx.repo.create_goal(&goal).await?;
    Ok(CreatedResult {
        id,
        name: suggestion.name,
    })
}

#[derive(Debug, serde::Serialize)]
pub struct GoalRow {
    pub id: String,
    pub name: String,
    pub timeframe: String,
    pub progress: u8,
    pub milestones: usize,
    pub tasks: usize,
}

#[derive(Debug, serde::Serialize)]
pub struct GoalListResult {
    pub goals: Vec<GoalRow>,
}

impl Output for GoalListResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.goals.is_empty() {
            return "No goals yet. Create one with `pp goal add`.".to_string();
        }
        self.goals
            .iter()
            .map(|g| {
                format!(
                    "{}  {:>3}%  {} ({} milestones, {} tasks)",
                    g.id, g.progress, g.name, g.milestones, g.tasks
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub async fn goal_list(data_dir: &Path) -> Result<GoalListResult> {
    let ctx = open_context(data_dir)?;
    if ctx.auth.current().is_none() {
        return Err(Error::Unauthenticated);
    }
    let engine = mirrored_engine(&ctx);
    let mirror = engine.mirror();

    let goals = mirror
        .goals()
        .map(|goal| GoalRow {
            id: goal.id.clone(),
            name: goal.name.clone(),
            timeframe: goal.timeframe.clone(),
            progress: derive::goal_progress(mirror, &goal.id).unwrap_or(goal.progress),
            milestones: mirror.milestones_for(&goal.id).len(),
            tasks: mirror.tasks_for_goal(&goal.id).count(),
        })
        .collect();
    Ok(GoalListResult { goals })
}

#[derive(Debug, serde::Serialize)]
pub struct MilestoneDetail {
    #[serde(flatten)]
    pub milestone: Milestone,
    pub tasks: Vec<Task>,
}

#[derive(Debug, serde::Serialize)]
pub struct GoalShowResult {
    #[serde(flatten)]
    pub goal: Goal,
    pub derived_progress: u8,
    pub milestones: Vec<MilestoneDetail>,
}

impl Output for GoalShowResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "{}  {:>3}%  {}",
            self.goal.id, self.derived_progress, self.goal.name
        )];
        if !self.goal.timeframe.is_empty() {
            lines.push(format!("  timeframe: {}", self.goal.timeframe));
        }
        for detail in &self.milestones {
            let mark = if detail.milestone.completed { "x" } else { " " };
            lines.push(format!(
                "  [{}] {}  {}",
                mark, detail.milestone.id, detail.milestone.name
            ));
            for task in &detail.tasks {
                let mark = if task.completed { "x" } else { " " };
                let tier = task
                    .priority()
                    .map(|t| format!("  ({t})"))
                    .unwrap_or_default();
                lines.push(format!(
                    "      [{}] {}  {}  {}{}",
                    mark, task.id, task.date, task.name, tier
                ));
            }
        }
        lines.join("\n")
    }
}

pub async fn goal_show(data_dir: &Path, id: &str) -> Result<GoalShowResult> {
    validate_id(id, "gl")?;
    let ctx = open_context(data_dir)?;
    if ctx.auth.current().is_none() {
        return Err(Error::Unauthenticated);
    }
    let engine = mirrored_engine(&ctx);
    let mirror = engine.mirror();

    let goal = mirror
        .goal(id)
        .cloned()
        .ok_or_else(|| Error::NotFound(id.to_string()))?;
    let derived_progress = derive::goal_progress(mirror, id).unwrap_or(goal.progress);
    let milestones = mirror
        .milestones_for(id)
        .iter()
        .map(|milestone| MilestoneDetail {
            milestone: milestone.clone(),
            tasks: mirror.tasks_for(&milestone.id).to_vec(),
        })
        .collect();

    Ok(GoalShowResult {
        goal,
        derived_progress,
        milestones,
    })
}

#[allow(clippy::too_many_arguments)]
pub async fn goal_update(
    data_dir: &Path,
    id: &str,
    name: Option<String>,
    timeframe: Option<String>,
    measurable: Option<String>,
    achievable: Option<String>,
    relevance: Option<String>,
    bandwidth: Option<u32>,
) -> Result<UpdatedResult> {
    validate_id(id, "gl")?;
    let ctx = open_context(data_dir)?;
    let patch = GoalPatch {
        name,
        timeframe,
        measurable,
        achievable,
        relevance,
        bandwidth,
        progress: None,
    };
    ctx.repo.update_goal(id, &patch).await?;
    Ok(UpdatedResult { id: id.to_string() })
}

pub async fn goal_rm(data_dir: &Path, id: &str) -> Result<DeletedResult> {
    validate_id(id, "gl")?;
    let ctx = open_context(data_dir)?;
    ctx.repo.delete_goal(id).await?;
    Ok(DeletedResult { id: id.to_string() })
}

#[derive(serde::Serialize)]
pub struct ProgressResult {
    pub id: String,
    pub progress: u8,
}

impl Output for ProgressResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("{}: {}%", self.id, self.progress)
    }
}

pub async fn goal_progress(data_dir: &Path, id: &str) -> Result<ProgressResult> {
    validate_id(id, "gl")?;
    let ctx = open_context(data_dir)?;
    let progress = ctx.repo.recompute_progress(id).await?;
    Ok(ProgressResult {
        id: id.to_string(),
        progress,
    })
}

// === milestones ===

pub async fn milestone_add(
    data_dir: &Path,
    goal_id: &str,
    name: String,
    description: Option<String>,
    weeks: Option<f32>,
) -> Result<CreatedResult> {
    validate_id(goal_id, "gl")?;
    let ctx = open_context(data_dir)?;
    // Reject milestones for goals that do not exist.
    ctx.repo.get_goal(goal_id).await?;

    let mut milestone = Milestone::new(goal_id.to_string(), name.clone());
    milestone.description = description.unwrap_or_default();
    milestone.duration_weeks = weeks.unwrap_or_default();
    let id = ctx.repo.create_milestone(&milestone).await?;
    Ok(CreatedResult { id, name })
}

#[derive(serde::Serialize)]
pub struct MilestoneListResult {
    pub goal_id: String,
    pub milestones: Vec<Milestone>,
}

impl Output for MilestoneListResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.milestones.is_empty() {
            return format!("No milestones under {}.", self.goal_id);
        }
        self.milestones
            .iter()
            .map(|m| {
                let mark = if m.completed { "x" } else { " " };
                format!("[{}] {}  {} ({} weeks)", mark, m.id, m.name, m.duration_weeks)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub async fn milestone_list(data_dir: &Path, goal_id: &str) -> Result<MilestoneListResult> {
    validate_id(goal_id, "gl")?;
    let ctx = open_context(data_dir)?;
    let milestones = ctx.repo.list_milestones(goal_id).await?;
    Ok(MilestoneListResult {
        goal_id: goal_id.to_string(),
        milestones,
    })
}

pub async fn milestone_done(data_dir: &Path, goal_id: &str, id: &str) -> Result<UpdatedResult> {
    validate_id(goal_id, "gl")?;
    validate_id(id, "ms")?;
    let ctx = open_context(data_dir)?;
    let patch = MilestonePatch {
        completed: Some(true),
        ..Default::default()
    };
    ctx.repo.update_milestone(goal_id, id, &patch).await?;
    Ok(UpdatedResult { id: id.to_string() })
}

pub async fn milestone_rm(data_dir: &Path, goal_id: &str, id: &str) -> Result<DeletedResult> {
    validate_id(goal_id, "gl")?;
    validate_id(id, "ms")?;
    let ctx = open_context(data_dir)?;
    ctx.repo.delete_milestone(goal_id, id).await?;
    Ok(DeletedResult { id: id.to_string() })
}

// === tasks ===

#[allow(clippy::too_many_arguments)]
pub async fn task_add(
    data_dir: &Path,
    goal_id: &str,
    milestone_id: &str,
    name: String,
    date: Option<NaiveDate>,
    simplicity: Option<u8>,
    urgency: Option<u8>,
    importance: Option<u8>,
) -> Result<CreatedResult> {
    validate_id(goal_id, "gl")?;
    validate_id(milestone_id, "ms")?;
    validate_priority_inputs(simplicity, urgency, importance)?;
    let ctx = open_context(data_dir)?;

    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let mut task = Task::new(goal_id.to_string(), milestone_id.to_string(), name.clone(), date);
    task.simplicity = simplicity;
    task.urgency = urgency;
    task.importance = importance;
    let id = ctx.repo.create_task(&task).await?;
    Ok(CreatedResult { id, name })
}

#[derive(serde::Serialize)]
pub struct TaskListResult {
    pub goal_id: String,
    pub milestone_id: String,
    pub tasks: Vec<Task>,
}

impl Output for TaskListResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return format!("No tasks under {}.", self.milestone_id);
        }
        self.tasks
            .iter()
            .map(|t| {
                let mark = if t.completed { "x" } else { " " };
                let tier = t.priority().map(|p| format!("  ({p})")).unwrap_or_default();
                format!("[{}] {}  {}  {}{}", mark, t.id, t.date, t.name, tier)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub async fn task_list(
    data_dir: &Path,
    goal_id: &str,
    milestone_id: &str,
) -> Result<TaskListResult> {
    validate_id(goal_id, "gl")?;
    validate_id(milestone_id, "ms")?;
    let ctx = open_context(data_dir)?;
    let tasks = ctx.repo.list_tasks(goal_id, milestone_id).await?;
    Ok(TaskListResult {
        goal_id: goal_id.to_string(),
        milestone_id: milestone_id.to_string(),
        tasks,
    })
}

#[derive(serde::Serialize)]
pub struct TaskToggledResult {
    pub id: String,
    pub completed: bool,
}

impl Output for TaskToggledResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.completed {
            format!("Completed {}", self.id)
        } else {
            format!("Reopened {}", self.id)
        }
    }
}

pub async fn task_done(
    data_dir: &Path,
    goal_id: &str,
    milestone_id: &str,
    id: &str,
) -> Result<TaskToggledResult> {
    validate_id(goal_id, "gl")?;
    validate_id(milestone_id, "ms")?;
    validate_id(id, "tk")?;
    let ctx = open_context(data_dir)?;
    let completed = ctx.repo.toggle_task(goal_id, milestone_id, id).await?;
    Ok(TaskToggledResult {
        id: id.to_string(),
        completed,
    })
}

#[allow(clippy::too_many_arguments)]
pub async fn task_update(
    data_dir: &Path,
    goal_id: &str,
    milestone_id: &str,
    id: &str,
    name: Option<String>,
    date: Option<NaiveDate>,
    simplicity: Option<u8>,
    urgency: Option<u8>,
    importance: Option<u8>,
) -> Result<UpdatedResult> {
    validate_id(goal_id, "gl")?;
    validate_id(milestone_id, "ms")?;
    validate_id(id, "tk")?;
    validate_priority_inputs(simplicity, urgency, importance)?;
    let ctx = open_context(data_dir)?;
    let patch = TaskPatch {
        name,
        date,
        completed: None,
        simplicity,
        urgency,
        importance,
    };
    ctx.repo.update_task(goal_id, milestone_id, id, &patch).await?;
    Ok(UpdatedResult { id: id.to_string() })
}

pub async fn task_rm(
    data_dir: &Path,
    goal_id: &str,
    milestone_id: &str,
    id: &str,
) -> Result<DeletedResult> {
    validate_id(goal_id, "gl")?;
    validate_id(milestone_id, "ms")?;
    validate_id(id, "tk")?;
    let ctx = open_context(data_dir)?;
    ctx.repo.delete_task(goal_id, milestone_id, id).await?;
    Ok(DeletedResult { id: id.to_string() })
}

fn validate_priority_inputs(
    simplicity: Option<u8>,
    urgency: Option<u8>,
    importance: Option<u8>,
) -> Result<()> {
    for (label, value) in [
        ("simplicity", simplicity),
        ("urgency", urgency),
        ("importance", importance),
    ] {
        if let Some(v) = value {
            if !(1..=5).contains(&v) {
                return Err(Error::InvalidInput(format!(
                    "{label} must be between 1 and 5, got {v}"
                )));
            }
        }
    }
    Ok(())
}

// === today ===

#[derive(serde::Serialize)]
pub struct TodayRow {
    pub id: String,
    pub goal_id: String,
    pub milestone_id: String,
    pub name: String,
    pub completed: bool,
    pub priority: Option<String>,
}

#[derive(serde::Serialize)]
pub struct TodayResult {
    pub date: NaiveDate,
    pub tasks: Vec<TodayRow>,
}

impl Output for TodayResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return format!("Nothing scheduled for {}.", self.date);
        }
        let mut lines = vec![format!("Tasks for {}:", self.date)];
        for task in &self.tasks {
            let mark = if task.completed { "x" } else { " " };
            let tier = task
                .priority
                .as_deref()
                .map(|p| format!("  ({p})"))
                .unwrap_or_default();
            lines.push(format!("[{}] {}  {}{}", mark, task.id, task.name, tier));
        }
        lines.join("\n")
    }
}

pub async fn today(data_dir: &Path) -> Result<TodayResult> {
    let ctx = open_context(data_dir)?;
    if ctx.auth.current().is_none() {
        return Err(Error::Unauthenticated);
    }
    let engine = mirrored_engine(&ctx);
    let mirror = engine.mirror();

    let date = Local::now().date_naive();
    // Ranked order first, then keep only today's.
    let tasks = derive::ranked_tasks(mirror)
        .into_iter()
        .filter(|task| task.date == date)
        .map(|task| TodayRow {
            id: task.id.clone(),
            goal_id: task.goal_id.clone(),
            milestone_id: task.milestone_id.clone(),
            name: task.name.clone(),
            completed: task.completed,
            priority: task.priority().map(|t| t.to_string()),
        })
        .collect();
    Ok(TodayResult { date, tasks })
}

// === plan ===

#[derive(serde::Serialize)]
pub struct PlannedTask {
    pub id: String,
    pub name: String,
}

#[derive(serde::Serialize)]
pub struct PlannedMilestone {
    pub id: String,
    pub name: String,
    pub tasks: Vec<PlannedTask>,
}

#[derive(serde::Serialize)]
pub struct PlanResult {
    pub goal_id: String,
    pub milestones: Vec<PlannedMilestone>,
}

impl Output for PlanResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Generated {} milestone(s) for {}:",
            self.milestones.len(),
            self.goal_id
        )];
        for milestone in &self.milestones {
            lines.push(format!("  {}  {}", milestone.id, milestone.name));
            for task in &milestone.tasks {
                lines.push(format!("    {}  {}", task.id, task.name));
            }
        }
        lines.join("\n")
    }
}

pub async fn plan(data_dir: &Path, goal_id: &str, backend: Option<String>) -> Result<PlanResult> {
    validate_id(goal_id, "gl")?;
    let ctx = open_context(data_dir)?;
    let user = ctx.auth.current().ok_or(Error::Unauthenticated)?;
    let goal = ctx.repo.get_goal(goal_id).await?;

    let base_url = backend
        .or_else(|| ctx.config.backend_url.clone())
        .ok_or_else(|| {
            Error::InvalidInput(
                "no backend configured: set backend_url in config.toml or pass --backend"
                    .to_string(),
            )
        })?;

    let client = PlannerClient::new(base_url);
    let suggestions = client
        .generate_milestones_and_tasks(&user, &goal.name)
        .await?;

    let created = persist_plan(&ctx.repo, goal_id, suggestions).await?;
    Ok(PlanResult {
        goal_id: goal_id.to_string(),
        milestones: created,
    })
}

/// Persist accepted suggestions under the goal. Tasks are scheduled at the
/// start of their milestone's window, offset by the cumulative duration of
/// the preceding milestones.
async fn persist_plan(
    repo: &Repository,
    goal_id: &str,
    suggestions: Vec<MilestoneSuggestion>,
) -> Result<Vec<PlannedMilestone>> {
    let start = Local::now().date_naive();
    let mut offset_weeks = 0.0f32;
    let mut created = Vec::new();

    for suggestion in suggestions {
        let mut milestone = Milestone::new(goal_id.to_string(), suggestion.name.clone());
        milestone.description = suggestion.description;
        milestone.duration_weeks = suggestion.duration_weeks;
        let milestone_id = repo.create_milestone(&milestone).await?;

        let date = start + chrono::Days::new((offset_weeks * 7.0).round() as u64);
        let mut tasks = Vec::new();
        for task_suggestion in suggestion.tasks {
            let task = Task::new(
                goal_id.to_string(),
                milestone_id.clone(),
                task_suggestion.name.clone(),
                date,
            );
            let task_id = repo.create_task(&task).await?;
            tasks.push(PlannedTask {
                id: task_id,
                name: task_suggestion.name,
            });
        }

        offset_weeks += suggestion.duration_weeks;
        created.push(PlannedMilestone {
            id: milestone_id,
            name: suggestion.name,
            tasks,
        });
    }
    Ok(created)
}

// === watch ===

/// Run the sync engine until Ctrl-C, printing one reload line per applied
/// snapshot.
pub async fn watch(data_dir: &Path) -> Result<()> {
    let ctx = open_context(data_dir)?;
    if ctx.auth.current().is_none() {
        return Err(Error::Unauthenticated);
    }

    let mut engine = SyncEngine::new(Arc::new(ctx.store.clone()), ctx.auth.clone());
    let mut reloads = engine.subscribe_reloads();
    tokio::spawn(async move {
        while let Ok(line) = reloads.recv().await {
            println!("{line}");
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });

    engine.run(shutdown_rx).await;
    Ok(())
}
