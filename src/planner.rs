//! HTTP client for the AI planning backend.
//!
//! The backend is an opaque remote service with two endpoints:
//! `POST /smart_goal` refines a rough what/why/when answer set into a
//! structured goal, and `POST /generate_milestones_and_tasks` decomposes a
//! validated goal statement into milestone and task suggestions. This
//! client only shapes requests and deserializes responses; persisting
//! accepted suggestions is the caller's job, through the repository.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Free-text answers that seed goal refinement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreGoal {
    /// What the user wants to achieve
    pub what: String,
    /// Why it matters to them
    pub why: String,
    /// When they want it done
    pub when: String,
}

#[derive(Debug, Serialize)]
struct SmartGoalRequest<'a> {
    user_id: &'a str,
    pre_goal_data: &'a PreGoal,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    user_id: &'a str,
    validated_goal: &'a str,
}

/// A refined goal proposed by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct GoalSuggestion {
    pub name: String,
    #[serde(default)]
    pub measurable: String,
    #[serde(default)]
    pub achievable: String,
    #[serde(default)]
    pub relevance: String,
    #[serde(default)]
    pub timeframe: String,
    /// Suggested weekly commitment in hours
    #[serde(default)]
    pub bandwidth: u32,
}

/// A milestone suggestion with its task suggestions nested under it.
#[derive(Debug, Clone, Deserialize)]
pub struct MilestoneSuggestion {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Expected duration in weeks (the backend calls this `duration`)
    #[serde(rename = "duration", default)]
    pub duration_weeks: f32,
    #[serde(default)]
    pub tasks: Vec<TaskSuggestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskSuggestion {
    pub name: String,
    #[serde(default)]
    pub duration_hours: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    milestones: Vec<MilestoneSuggestion>,
}

/// Client for the planning backend.
pub struct PlannerClient {
    base_url: String,
    client: reqwest::Client,
}

impl PlannerClient {
    /// Create a client against the given backend base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Refine a pre-goal into a structured goal suggestion.
    pub async fn smart_goal(&self, user_id: &str, pre_goal: &PreGoal) -> Result<GoalSuggestion> {
        let url = format!("{}/smart_goal", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&SmartGoalRequest {
                user_id,
                pre_goal_data: pre_goal,
            })
            .send()
            .await?;
        check_status(&url, &response)?;
        Ok(response.json().await?)
    }

    /// Decompose a validated goal statement into milestone and task
    /// suggestions.
    pub async fn generate_milestones_and_tasks(
        &self,
        user_id: &str,
        validated_goal: &str,
    ) -> Result<Vec<MilestoneSuggestion>> {
        let url = format!("{}/generate_milestones_and_tasks", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                user_id,
                validated_goal,
            })
            .send()
            .await?;
        check_status(&url, &response)?;
        let body: GenerateResponse = response.json().await?;
        Ok(body.milestones)
    }
}

fn check_status(url: &str, response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Other(format!("{url} returned {status}")));
    }
    Ok(())
}
