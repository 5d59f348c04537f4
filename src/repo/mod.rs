//! Entity repositories: domain CRUD over the document store.
//!
//! Every operation resolves the signed-in user first and addresses the
//! store under that user's namespace. Reads and writes round-trip through
//! the store; nothing here touches the sync engine's mirror directly.
//!
//! Deletes cascade parent -> children bottom-up: a goal delete removes all
//! tasks, then their milestones, then the goal itself, and a parent
//! document is never removed while one of its descendants failed to
//! delete, so a partial failure cannot orphan children.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::auth::AuthContext;
use crate::models::{Goal, GoalPatch, Milestone, MilestonePatch, Task, TaskPatch};
use crate::store::{CollectionPath, DocumentStore, StoreError};
use crate::{Error, Result};

/// CRUD façade for goals, milestones, and tasks.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
    auth: AuthContext,
}

impl Repository {
    pub fn new(store: Arc<dyn DocumentStore>, auth: AuthContext) -> Self {
        Self { store, auth }
    }

    fn user(&self) -> Result<String> {
        self.auth.current().ok_or_else(|| {
            tracing::warn!("repository call with no signed-in user");
            Error::Unauthenticated
        })
    }

    // === Goals ===

    /// Create a goal; returns the store-assigned id.
    pub async fn create_goal(&self, goal: &Goal) -> Result<String> {
        let user = self.user()?;
        let id = self
            .store
            .add_doc(&CollectionPath::goals(&user), doc_fields(goal)?)
            .await?;
        Ok(id)
    }

    /// Fetch one goal.
    pub async fn get_goal(&self, goal_id: &str) -> Result<Goal> {
        let user = self.user()?;
        let doc = self
            .store
            .get_doc(&CollectionPath::goals(&user).doc(goal_id))
            .await
            .map_err(|err| not_found(err, goal_id))?;
        Ok(doc.decode()?)
    }

    /// List all goals for the current user.
    pub async fn list_goals(&self) -> Result<Vec<Goal>> {
        let user = self.user()?;
        let docs = self.store.get_docs(&CollectionPath::goals(&user)).await?;
        Ok(decode_docs(docs))
    }

    /// Merge the populated patch fields into a goal, bumping `updated_at`.
    pub async fn update_goal(&self, goal_id: &str, patch: &GoalPatch) -> Result<()> {
        let user = self.user()?;
        let mut fields = doc_fields(patch)?;
        stamp_updated(&mut fields);
        self.store
            .update_doc(&CollectionPath::goals(&user).doc(goal_id), fields)
            .await
            .map_err(|err| not_found(err, goal_id))?;
        Ok(())
    }

    /// Delete a goal and, first, every milestone and task under it.
    ///
    /// Best effort: all descendant deletions are attempted; if any fails,
    /// the goal (and the affected milestone) are left in place and the
    /// aggregate failure is returned.
    pub async fn delete_goal(&self, goal_id: &str) -> Result<()> {
        let user = self.user()?;
        let goals = CollectionPath::goals(&user);
        // Surface a clean not-found before fanning out.
        self.store
            .get_doc(&goals.doc(goal_id))
            .await
            .map_err(|err| not_found(err, goal_id))?;

        let milestones = self
            .store
            .get_docs(&CollectionPath::milestones(&user, goal_id))
            .await?;

        let mut failed = Vec::new();
        for milestone in &milestones {
            self.delete_milestone_subtree(&user, goal_id, &milestone.id, &mut failed)
                .await;
        }

        if !failed.is_empty() {
            return Err(Error::Cascade { failed });
        }
        self.store.delete_doc(&goals.doc(goal_id)).await?;
        Ok(())
    }

    /// Recompute a goal's progress from its tasks in the store and persist
    /// it. Returns the stored value. With zero tasks the previously stored
    /// value is kept untouched.
    pub async fn recompute_progress(&self, goal_id: &str) -> Result<u8> {
        let user = self.user()?;
        let goal = self.get_goal(goal_id).await?;

        let mut total = 0u32;
        let mut completed = 0u32;
        let milestones = self
            .store
            .get_docs(&CollectionPath::milestones(&user, goal_id))
            .await?;
        for milestone in &milestones {
            let tasks = self
                .store
                .get_docs(&CollectionPath::tasks(&user, goal_id, &milestone.id))
                .await?;
            for task in decode_docs::<Task>(tasks) {
                total += 1;
                if task.completed {
                    completed += 1;
                }
            }
        }

        if total == 0 {
            return Ok(goal.progress);
        }
        let progress = ((100.0 * f64::from(completed) / f64::from(total)).round()) as u8;
        self.update_goal(
            goal_id,
            &GoalPatch {
                progress: Some(progress),
                ..Default::default()
            },
        )
        .await?;
        Ok(progress)
    }

    // === Milestones ===

    /// Create a milestone under its goal; returns the store-assigned id.
    pub async fn create_milestone(&self, milestone: &Milestone) -> Result<String> {
        let user = self.user()?;
        let id = self
            .store
            .add_doc(
                &CollectionPath::milestones(&user, &milestone.goal_id),
                doc_fields(milestone)?,
            )
            .await?;
        Ok(id)
    }

    /// List milestones under a goal.
    pub async fn list_milestones(&self, goal_id: &str) -> Result<Vec<Milestone>> {
        let user = self.user()?;
        let docs = self
            .store
            .get_docs(&CollectionPath::milestones(&user, goal_id))
            .await?;
        Ok(decode_docs(docs))
    }

    /// Merge the populated patch fields into a milestone.
    pub async fn update_milestone(
        &self,
        goal_id: &str,
        milestone_id: &str,
        patch: &MilestonePatch,
    ) -> Result<()> {
        let user = self.user()?;
        self.store
            .update_doc(
                &CollectionPath::milestones(&user, goal_id).doc(milestone_id),
                doc_fields(patch)?,
            )
            .await
            .map_err(|err| not_found(err, milestone_id))?;
        Ok(())
    }

    /// Delete a milestone and, first, every task under it. Same best-effort
    /// discipline as `delete_goal`, one level deep.
    pub async fn delete_milestone(&self, goal_id: &str, milestone_id: &str) -> Result<()> {
        let user = self.user()?;
        let mut failed = Vec::new();
        self.delete_milestone_subtree(&user, goal_id, milestone_id, &mut failed)
            .await;
        if !failed.is_empty() {
            return Err(Error::Cascade { failed });
        }
        Ok(())
    }

    /// Delete a milestone's tasks, then the milestone itself unless a task
    /// deletion failed. Failed paths accumulate in `failed`.
    async fn delete_milestone_subtree(
        &self,
        user: &str,
        goal_id: &str,
        milestone_id: &str,
        failed: &mut Vec<String>,
    ) {
        let tasks_path = CollectionPath::tasks(user, goal_id, milestone_id);
        let before = failed.len();

        match self.store.get_docs(&tasks_path).await {
            Ok(tasks) => {
                for task in tasks {
                    let doc = tasks_path.doc(&task.id);
                    if let Err(err) = self.store.delete_doc(&doc).await {
                        tracing::warn!(path = %doc, %err, "cascade task delete failed");
                        failed.push(doc.to_string());
                    }
                }
            }
            Err(err) => {
                tracing::warn!(path = %tasks_path, %err, "cascade task enumeration failed");
                failed.push(tasks_path.to_string());
            }
        }

        // Keep the milestone while any of its tasks survived.
        if failed.len() > before {
            return;
        }
        let doc = CollectionPath::milestones(user, goal_id).doc(milestone_id);
        if let Err(err) = self.store.delete_doc(&doc).await {
            tracing::warn!(path = %doc, %err, "cascade milestone delete failed");
            failed.push(doc.to_string());
        }
    }

    // === Tasks ===

    /// Create a task; returns the store-assigned id.
    ///
    /// Enforces referential consistency: the owning milestone must exist
    /// and belong to the task's goal.
    pub async fn create_task(&self, task: &Task) -> Result<String> {
        let user = self.user()?;
        let milestone_doc = self
            .store
            .get_doc(&CollectionPath::milestones(&user, &task.goal_id).doc(&task.milestone_id))
            .await
            .map_err(|err| not_found(err, &task.milestone_id))?;
        let milestone: Milestone = milestone_doc.decode()?;
        if milestone.goal_id != task.goal_id {
            return Err(Error::InvalidInput(format!(
                "milestone {} belongs to goal {}, not {}",
                task.milestone_id, milestone.goal_id, task.goal_id
            )));
        }

        let id = self
            .store
            .add_doc(
                &CollectionPath::tasks(&user, &task.goal_id, &task.milestone_id),
                doc_fields(task)?,
            )
            .await?;
        Ok(id)
    }

    /// List tasks under a milestone.
    pub async fn list_tasks(&self, goal_id: &str, milestone_id: &str) -> Result<Vec<Task>> {
        let user = self.user()?;
        let docs = self
            .store
            .get_docs(&CollectionPath::tasks(&user, goal_id, milestone_id))
            .await?;
        Ok(decode_docs(docs))
    }

    /// Merge the populated patch fields into a task.
    pub async fn update_task(
        &self,
        goal_id: &str,
        milestone_id: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> Result<()> {
        let user = self.user()?;
        self.store
            .update_doc(
                &CollectionPath::tasks(&user, goal_id, milestone_id).doc(task_id),
                doc_fields(patch)?,
            )
            .await
            .map_err(|err| not_found(err, task_id))?;
        Ok(())
    }

    /// Flip a task's completion flag; returns the new state.
    pub async fn toggle_task(
        &self,
        goal_id: &str,
        milestone_id: &str,
        task_id: &str,
    ) -> Result<bool> {
        let user = self.user()?;
        let path = CollectionPath::tasks(&user, goal_id, milestone_id).doc(task_id);
        let task: Task = self
            .store
            .get_doc(&path)
            .await
            .map_err(|err| not_found(err, task_id))?
            .decode()?;
        let completed = !task.completed;
        self.store
            .update_doc(&path, serde_json::json!({ "completed": completed }))
            .await?;
        Ok(completed)
    }

    /// Delete a single task.
    pub async fn delete_task(&self, goal_id: &str, milestone_id: &str, task_id: &str) -> Result<()> {
        let user = self.user()?;
        self.store
            .delete_doc(&CollectionPath::tasks(&user, goal_id, milestone_id).doc(task_id))
            .await
            .map_err(|err| not_found(err, task_id))?;
        Ok(())
    }
}

/// Serialize an entity/patch to its document fields, dropping the `id`
/// (ids live in the document path, not the document body).
fn doc_fields<T: Serialize>(value: &T) -> Result<Value> {
    let mut fields = serde_json::to_value(value)?;
    if let Some(obj) = fields.as_object_mut() {
        obj.remove("id");
    }
    Ok(fields)
}

fn stamp_updated(fields: &mut Value) {
    if let Some(obj) = fields.as_object_mut() {
        obj.insert(
            "updated_at".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }
}

fn not_found(err: StoreError, id: &str) -> Error {
    match err {
        StoreError::NotFound(_) => Error::NotFound(id.to_string()),
        other => Error::Store(other),
    }
}

fn decode_docs<T: serde::de::DeserializeOwned>(docs: Vec<crate::store::Document>) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match doc.decode() {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(id = %doc.id, %err, "skipping undecodable document");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, LocalStore, SnapshotEvent, SubscriptionHandle};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedSender;

    fn repo(store: &LocalStore) -> Repository {
        Repository::new(Arc::new(store.clone()), AuthContext::with_user("u1"))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 26).unwrap()
    }

    async fn seed_tree(repo: &Repository, milestones: usize, tasks_each: usize) -> String {
        let goal_id = repo
            .create_goal(&Goal::new("Run a marathon".to_string()))
            .await
            .unwrap();
        for m in 0..milestones {
            let milestone_id = repo
                .create_milestone(&Milestone::new(goal_id.clone(), format!("phase {}", m)))
                .await
                .unwrap();
            for t in 0..tasks_each {
                repo.create_task(&Task::new(
                    goal_id.clone(),
                    milestone_id.clone(),
                    format!("task {}", t),
                    date(),
                ))
                .await
                .unwrap();
            }
        }
        goal_id
    }

    #[tokio::test]
    async fn test_unauthenticated_calls_are_reported() {
        let store = LocalStore::in_memory();
        let repo = Repository::new(Arc::new(store), AuthContext::signed_out());
        let err = repo
            .create_goal(&Goal::new("Run a marathon".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));
    }

    #[tokio::test]
    async fn test_create_and_list_goals() {
        let store = LocalStore::in_memory();
        let repo = repo(&store);

        let id = repo
            .create_goal(&Goal::new("Run a marathon".to_string()))
            .await
            .unwrap();
        assert!(id.starts_with("gl-"));

        let goals = repo.list_goals().await.unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].id, id);
    }

    #[tokio::test]
    async fn test_update_goal_merges_fields() {
        let store = LocalStore::in_memory();
        let repo = repo(&store);
        let id = repo
            .create_goal(&Goal::new("Run a marathon".to_string()))
            .await
            .unwrap();

        repo.update_goal(
            &id,
            &GoalPatch {
                timeframe: Some("6 months".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let goal = repo.get_goal(&id).await.unwrap();
        assert_eq!(goal.timeframe, "6 months");
        assert_eq!(goal.name, "Run a marathon");
        assert!(goal.updated_at > goal.created_at);
    }

    #[tokio::test]
    async fn test_create_task_rejects_goal_mismatch() {
        let store = LocalStore::in_memory();
        let repo = repo(&store);
        let g1 = repo
            .create_goal(&Goal::new("Run a marathon".to_string()))
            .await
            .unwrap();
        let g2 = repo
            .create_goal(&Goal::new("Learn Rust".to_string()))
            .await
            .unwrap();
        let m1 = repo
            .create_milestone(&Milestone::new(g1.clone(), "Base fitness".to_string()))
            .await
            .unwrap();

        // Task claims goal g2 but references g1's milestone.
        let task = Task::new(g2, m1, "Run 5k".to_string(), date());
        let err = repo.create_task(&task).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_) | Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_toggle_task() {
        let store = LocalStore::in_memory();
        let repo = repo(&store);
        let goal_id = seed_tree(&repo, 1, 1).await;
        let milestone = &repo.list_milestones(&goal_id).await.unwrap()[0];
        let task = &repo.list_tasks(&goal_id, &milestone.id).await.unwrap()[0];

        assert!(repo.toggle_task(&goal_id, &milestone.id, &task.id).await.unwrap());
        assert!(!repo.toggle_task(&goal_id, &milestone.id, &task.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_cascade_delete_goal_n0() {
        let store = LocalStore::in_memory();
        let repo = repo(&store);
        let goal_id = seed_tree(&repo, 0, 0).await;

        repo.delete_goal(&goal_id).await.unwrap();
        assert!(repo.list_goals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cascade_delete_goal_n1() {
        let store = LocalStore::in_memory();
        let repo = repo(&store);
        let goal_id = seed_tree(&repo, 1, 2).await;
        let milestone_id = repo.list_milestones(&goal_id).await.unwrap()[0].id.clone();

        repo.delete_goal(&goal_id).await.unwrap();

        assert!(repo.list_goals().await.unwrap().is_empty());
        assert!(repo.list_milestones(&goal_id).await.unwrap().is_empty());
        assert!(repo
            .list_tasks(&goal_id, &milestone_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_cascade_delete_goal_many_milestones() {
        let store = LocalStore::in_memory();
        let repo = repo(&store);
        let goal_id = seed_tree(&repo, 3, 2).await;
        let milestone_ids: Vec<String> = repo
            .list_milestones(&goal_id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();

        repo.delete_goal(&goal_id).await.unwrap();

        assert!(repo.list_goals().await.unwrap().is_empty());
        for milestone_id in milestone_ids {
            assert!(repo
                .list_tasks(&goal_id, &milestone_id)
                .await
                .unwrap()
                .is_empty());
        }
    }

    #[tokio::test]
    async fn test_delete_milestone_cascades_its_tasks_only() {
        let store = LocalStore::in_memory();
        let repo = repo(&store);
        let goal_id = seed_tree(&repo, 2, 1).await;
        let milestones = repo.list_milestones(&goal_id).await.unwrap();
        let (m1, m2) = (milestones[0].id.clone(), milestones[1].id.clone());

        repo.delete_milestone(&goal_id, &m1).await.unwrap();

        assert!(repo.list_tasks(&goal_id, &m1).await.unwrap().is_empty());
        assert_eq!(repo.list_milestones(&goal_id).await.unwrap().len(), 1);
        assert_eq!(repo.list_tasks(&goal_id, &m2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recompute_progress_persists() {
        let store = LocalStore::in_memory();
        let repo = repo(&store);
        let goal_id = seed_tree(&repo, 1, 4).await;
        let milestone_id = repo.list_milestones(&goal_id).await.unwrap()[0].id.clone();
        let task_id = repo.list_tasks(&goal_id, &milestone_id).await.unwrap()[0]
            .id
            .clone();

        repo.toggle_task(&goal_id, &milestone_id, &task_id)
            .await
            .unwrap();
        assert_eq!(repo.recompute_progress(&goal_id).await.unwrap(), 25);
        assert_eq!(repo.get_goal(&goal_id).await.unwrap().progress, 25);
    }

    #[tokio::test]
    async fn test_recompute_progress_zero_tasks_keeps_stored() {
        let store = LocalStore::in_memory();
        let repo = repo(&store);
        let goal_id = repo
            .create_goal(&Goal::new("Run a marathon".to_string()))
            .await
            .unwrap();
        repo.update_goal(
            &goal_id,
            &GoalPatch {
                progress: Some(70),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(repo.recompute_progress(&goal_id).await.unwrap(), 70);
    }

    /// Store wrapper that fails deletion of one specific document id.
    struct FailingDelete {
        inner: LocalStore,
        poison: Mutex<String>,
    }

    #[async_trait]
    impl crate::store::DocumentStore for FailingDelete {
        async fn add_doc(
            &self,
            collection: &CollectionPath,
            data: Value,
        ) -> std::result::Result<String, StoreError> {
            self.inner.add_doc(collection, data).await
        }

        async fn get_doc(
            &self,
            path: &crate::store::DocPath,
        ) -> std::result::Result<Document, StoreError> {
            self.inner.get_doc(path).await
        }

        async fn get_docs(
            &self,
            collection: &CollectionPath,
        ) -> std::result::Result<Vec<Document>, StoreError> {
            self.inner.get_docs(collection).await
        }

        async fn update_doc(
            &self,
            path: &crate::store::DocPath,
            patch: Value,
        ) -> std::result::Result<(), StoreError> {
            self.inner.update_doc(path, patch).await
        }

        async fn delete_doc(
            &self,
            path: &crate::store::DocPath,
        ) -> std::result::Result<(), StoreError> {
            if *self.poison.lock().unwrap() == path.id() {
                return Err(StoreError::Other("simulated delete failure".to_string()));
            }
            self.inner.delete_doc(path).await
        }

        fn subscribe(
            &self,
            collection: &CollectionPath,
            events: UnboundedSender<SnapshotEvent>,
        ) -> SubscriptionHandle {
            self.inner.subscribe(collection, events)
        }

        fn open_subscription_count(&self) -> usize {
            self.inner.open_subscription_count()
        }
    }

    #[tokio::test]
    async fn test_partial_cascade_keeps_ancestors_and_reports() {
        let inner = LocalStore::in_memory();
        let failing = Arc::new(FailingDelete {
            inner: inner.clone(),
            poison: Mutex::new(String::new()),
        });
        let repo = Repository::new(failing.clone(), AuthContext::with_user("u1"));

        let goal_id = seed_tree(&repo, 2, 1).await;
        let milestones = repo.list_milestones(&goal_id).await.unwrap();
        let sticky_task = repo.list_tasks(&goal_id, &milestones[0].id).await.unwrap()[0]
            .id
            .clone();
        *failing.poison.lock().unwrap() = sticky_task.clone();

        let err = repo.delete_goal(&goal_id).await.unwrap_err();
        match err {
            Error::Cascade { failed } => {
                assert_eq!(failed.len(), 1);
                assert!(failed[0].contains(&sticky_task));
            }
            other => panic!("expected cascade error, got {other:?}"),
        }

        // The goal and the milestone owning the stuck task survive; the
        // other milestone subtree was fully removed.
        assert!(repo.get_goal(&goal_id).await.is_ok());
        let remaining = repo.list_milestones(&goal_id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, milestones[0].id);
        assert!(repo
            .list_tasks(&goal_id, &milestones[1].id)
            .await
            .unwrap()
            .is_empty());
    }
}
