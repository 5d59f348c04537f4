//! Real-time hierarchical sync engine.
//!
//! [`SyncEngine`] maintains a live mirror of one user's
//! goals -> milestones -> tasks hierarchy. It subscribes to the goals
//! collection and, for every known goal and milestone, keeps exactly one
//! subscription on the corresponding child collection. On every snapshot
//! event it diffs the previous and current id sets at that level, opening
//! subscriptions only for newly-seen ids and closing only newly-absent
//! ones. Unchanged ids are never re-subscribed; naive re-subscription on
//! every parent event produces duplicate listeners that fire multiple
//! writes per change.
//!
//! All snapshot events funnel into a single channel and are applied
//! sequentially, so the mirror has exactly one writer. Events from a
//! cancelled subscription are identified by subscription id and discarded,
//! which keeps a detached engine silent even for pushes that were already
//! in flight.

pub mod derive;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

use crate::auth::AuthContext;
use crate::models::{Goal, Milestone, Task};
use crate::store::{
    CollectionPath, Document, DocumentStore, SnapshotEvent, SubscriptionHandle, SubscriptionId,
};

/// Hierarchy level a subscription covers, with the parent ids needed to
/// tear it down when an ancestor disappears.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Level {
    Goals,
    Milestones {
        goal_id: String,
    },
    Tasks {
        goal_id: String,
        milestone_id: String,
    },
}

struct ActiveSub {
    id: SubscriptionId,
    level: Level,
    handle: SubscriptionHandle,
}

/// In-memory mirror of the latest store-observed hierarchy.
///
/// Owned and written exclusively by the engine; consumers read it between
/// pumps and must route every mutation through the repository layer.
#[derive(Debug, Clone, Default)]
pub struct Mirror {
    goals: BTreeMap<String, Goal>,
    /// goal id -> milestones, in store order
    milestones: BTreeMap<String, Vec<Milestone>>,
    /// milestone id -> tasks, in store order
    tasks: BTreeMap<String, Vec<Task>>,
}

impl Mirror {
    /// All mirrored goals, in id order.
    pub fn goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals.values()
    }

    /// A single goal by id.
    pub fn goal(&self, goal_id: &str) -> Option<&Goal> {
        self.goals.get(goal_id)
    }

    /// Milestones under a goal, in store order.
    pub fn milestones_for(&self, goal_id: &str) -> &[Milestone] {
        self.milestones.get(goal_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tasks under a milestone, in store order.
    pub fn tasks_for(&self, milestone_id: &str) -> &[Task] {
        self.tasks.get(milestone_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every mirrored task across all goals.
    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().flatten()
    }

    /// Tasks transitively owned by a goal.
    pub fn tasks_for_goal<'a>(&'a self, goal_id: &'a str) -> impl Iterator<Item = &'a Task> {
        self.all_tasks().filter(move |task| task.goal_id == goal_id)
    }

    /// True when nothing is mirrored.
    pub fn is_empty(&self) -> bool {
        self.goals.is_empty() && self.milestones.is_empty() && self.tasks.is_empty()
    }
}

/// Hierarchical subscription manager for a single authenticated user.
pub struct SyncEngine {
    store: Arc<dyn DocumentStore>,
    auth: AuthContext,
    events_tx: mpsc::UnboundedSender<SnapshotEvent>,
    events_rx: mpsc::UnboundedReceiver<SnapshotEvent>,
    /// Ownership table: collection path -> its one active subscription
    subs: HashMap<String, ActiveSub>,
    mirror: Mirror,
    user: Option<String>,
    reload_tx: broadcast::Sender<String>,
}

impl SyncEngine {
    /// Create an engine over a store, bound to an identity context.
    pub fn new(store: Arc<dyn DocumentStore>, auth: AuthContext) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (reload_tx, _) = broadcast::channel(100);
        Self {
            store,
            auth,
            events_tx,
            events_rx,
            subs: HashMap::new(),
            mirror: Mirror::default(),
            user: None,
            reload_tx,
        }
    }

    /// Read access to the mirrored hierarchy.
    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// Receiver for reload notifications, one per applied snapshot.
    pub fn subscribe_reloads(&self) -> broadcast::Receiver<String> {
        self.reload_tx.subscribe()
    }

    /// Number of subscriptions currently held by this engine.
    pub fn active_subscriptions(&self) -> usize {
        self.subs.len()
    }

    /// Open the root subscription on the signed-in user's goals collection.
    ///
    /// No-op (logged) when nobody is signed in, and when already attached
    /// for the same user; a second attach never duplicates a subscription.
    /// Attaching as a different user detaches the previous hierarchy first.
    pub fn attach(&mut self) {
        let Some(user_id) = self.auth.current() else {
            tracing::warn!("sync attach requested with no signed-in user");
            return;
        };

        if self.user.as_deref() == Some(user_id.as_str()) {
            tracing::debug!(user = %user_id, "sync engine already attached");
            return;
        }
        if self.user.is_some() {
            self.detach();
        }

        self.user = Some(user_id.clone());
        self.open(CollectionPath::goals(&user_id), Level::Goals);
    }

    /// Close every subscription at every level and clear the mirror.
    /// Idempotent. Events already queued are discarded, not applied.
    pub fn detach(&mut self) {
        for (_, mut sub) in self.subs.drain() {
            sub.handle.cancel();
        }
        while self.events_rx.try_recv().is_ok() {}
        self.mirror = Mirror::default();
        self.user = None;
    }

    /// Drain and apply every queued snapshot event, including events queued
    /// by subscriptions opened during this pass. Returns the number of
    /// events processed; the mirror is quiescent when this returns.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            processed += 1;
        }
        processed
    }

    /// Long-lived event loop: applies snapshots as they arrive, re-attaches
    /// on identity transitions, and exits (fully detached) on shutdown.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut auth_rx = self.auth.changes();
        self.attach();

        loop {
            tokio::select! {
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                changed = auth_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.detach();
                    self.attach();
                }
                _ = shutdown.changed() => break,
            }
        }

        self.detach();
    }

    fn open(&mut self, path: CollectionPath, level: Level) {
        if self.subs.contains_key(path.as_str()) {
            return;
        }
        let handle = self.store.subscribe(&path, self.events_tx.clone());
        self.subs.insert(
            path.as_str().to_string(),
            ActiveSub {
                id: handle.id(),
                level,
                handle,
            },
        );
    }

    fn close(&mut self, path: &str) {
        if let Some(mut sub) = self.subs.remove(path) {
            sub.handle.cancel();
        }
    }

    fn handle_event(&mut self, event: SnapshotEvent) {
        let level = match self.subs.get(event.path.as_str()) {
            // Stale events: the subscription was closed, or the path was
            // re-subscribed under a new id after this push was queued.
            Some(sub) if sub.id == event.subscription => sub.level.clone(),
            _ => return,
        };

        match level {
            Level::Goals => self.apply_goals(event.docs),
            Level::Milestones { goal_id } => self.apply_milestones(&goal_id, event.docs),
            Level::Tasks { milestone_id, .. } => self.apply_tasks(&milestone_id, event.docs),
        }

        let _ = self.reload_tx.send(
            serde_json::json!({
                "type": "reload",
                "path": event.path.as_str(),
            })
            .to_string(),
        );
    }

    fn apply_goals(&mut self, docs: Vec<Document>) {
        let Some(user_id) = self.user.clone() else {
            return;
        };

        let goals = decode_all::<Goal>(&docs, "goal");
        let previous: HashSet<String> = self.mirror.goals.keys().cloned().collect();
        let current: HashSet<String> = goals.keys().cloned().collect();

        // Applied as a whole: consumers never observe a torn goal list.
        self.mirror.goals = goals;

        for removed in previous.difference(&current) {
            self.drop_goal_subtree(&user_id, removed);
        }
        for added in current.difference(&previous) {
            self.open(
                CollectionPath::milestones(&user_id, added),
                Level::Milestones {
                    goal_id: added.clone(),
                },
            );
        }
    }

    fn apply_milestones(&mut self, goal_id: &str, docs: Vec<Document>) {
        let Some(user_id) = self.user.clone() else {
            return;
        };

        let mut milestones: Vec<Milestone> = decode_all::<Milestone>(&docs, "milestone")
            .into_values()
            .collect();
        milestones.sort_by(|a, b| a.id.cmp(&b.id));

        let previous: HashSet<String> = self
            .mirror
            .milestones_for(goal_id)
            .iter()
            .map(|m| m.id.clone())
            .collect();
        let current: HashSet<String> = milestones.iter().map(|m| m.id.clone()).collect();

        self.mirror
            .milestones
            .insert(goal_id.to_string(), milestones);

        for removed in previous.difference(&current) {
            self.close(CollectionPath::tasks(&user_id, goal_id, removed).as_str());
            self.mirror.tasks.remove(removed);
        }
        for added in current.difference(&previous) {
            self.open(
                CollectionPath::tasks(&user_id, goal_id, added),
                Level::Tasks {
                    goal_id: goal_id.to_string(),
                    milestone_id: added.clone(),
                },
            );
        }
    }

    fn apply_tasks(&mut self, milestone_id: &str, docs: Vec<Document>) {
        let mut tasks: Vec<Task> = decode_all::<Task>(&docs, "task").into_values().collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        self.mirror.tasks.insert(milestone_id.to_string(), tasks);
    }

    /// Close the milestone subscription of a removed goal plus every task
    /// subscription underneath it, and purge the mirrored children.
    fn drop_goal_subtree(&mut self, user_id: &str, goal_id: &str) {
        self.close(CollectionPath::milestones(user_id, goal_id).as_str());

        let milestone_ids: Vec<String> = self
            .mirror
            .milestones
            .remove(goal_id)
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.id)
            .collect();
        for milestone_id in &milestone_ids {
            self.close(CollectionPath::tasks(user_id, goal_id, milestone_id).as_str());
            self.mirror.tasks.remove(milestone_id);
        }

        // Task subscriptions can exist for milestones that never produced a
        // snapshot; sweep the ownership table by parent goal as well.
        let orphaned: Vec<String> = self
            .subs
            .iter()
            .filter(|(_, sub)| {
                matches!(&sub.level, Level::Tasks { goal_id: g, .. } if g == goal_id)
            })
            .map(|(path, _)| path.clone())
            .collect();
        for path in orphaned {
            self.close(&path);
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Decode a document set, skipping (and logging) documents that do not
/// parse. A malformed document must never abort reconciliation.
fn decode_all<T: serde::de::DeserializeOwned>(
    docs: &[Document],
    kind: &str,
) -> BTreeMap<String, T> {
    let mut out = BTreeMap::new();
    for doc in docs {
        match doc.decode::<T>() {
            Ok(value) => {
                out.insert(doc.id.clone(), value);
            }
            Err(err) => {
                tracing::warn!(id = %doc.id, %err, "skipping undecodable {kind} document");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;
    use serde_json::json;

    fn engine_for(store: &LocalStore, auth: AuthContext) -> SyncEngine {
        SyncEngine::new(Arc::new(store.clone()), auth)
    }

    async fn seed_goal(store: &LocalStore, user: &str, name: &str) -> String {
        store
            .add_doc(
                &CollectionPath::goals(user),
                json!({
                    "name": name,
                    "progress": 0,
                    "created_at": "2026-08-01T00:00:00Z",
                    "updated_at": "2026-08-01T00:00:00Z"
                }),
            )
            .await
            .unwrap()
    }

    async fn seed_milestone(store: &LocalStore, user: &str, goal_id: &str, name: &str) -> String {
        store
            .add_doc(
                &CollectionPath::milestones(user, goal_id),
                json!({
                    "goal_id": goal_id,
                    "name": name,
                    "created_at": "2026-08-01T00:00:00Z"
                }),
            )
            .await
            .unwrap()
    }

    async fn seed_task(
        store: &LocalStore,
        user: &str,
        goal_id: &str,
        milestone_id: &str,
        name: &str,
    ) -> String {
        store
            .add_doc(
                &CollectionPath::tasks(user, goal_id, milestone_id),
                json!({
                    "goal_id": goal_id,
                    "milestone_id": milestone_id,
                    "name": name,
                    "date": "2026-08-26",
                    "completed": false,
                    "created_at": "2026-08-01T00:00:00Z"
                }),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_attach_without_user_is_noop() {
        let store = LocalStore::in_memory();
        let mut engine = engine_for(&store, AuthContext::signed_out());

        engine.attach();
        assert_eq!(engine.pump(), 0);
        assert_eq!(engine.active_subscriptions(), 0);
        assert_eq!(store.open_subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_attach_mirrors_existing_hierarchy() {
        let store = LocalStore::in_memory();
        let goal_id = seed_goal(&store, "u1", "Run a marathon").await;
        let milestone_id = seed_milestone(&store, "u1", &goal_id, "Base fitness").await;
        seed_task(&store, "u1", &goal_id, &milestone_id, "Run 5k").await;

        let mut engine = engine_for(&store, AuthContext::with_user("u1"));
        engine.attach();
        engine.pump();

        assert_eq!(engine.mirror().goals().count(), 1);
        assert_eq!(engine.mirror().milestones_for(&goal_id).len(), 1);
        assert_eq!(engine.mirror().tasks_for(&milestone_id).len(), 1);
        // goals + 1 milestones collection + 1 tasks collection
        assert_eq!(store.open_subscription_count(), 3);
    }

    #[tokio::test]
    async fn test_attach_twice_keeps_single_subscription() {
        let store = LocalStore::in_memory();
        seed_goal(&store, "u1", "Run a marathon").await;

        let mut engine = engine_for(&store, AuthContext::with_user("u1"));
        engine.attach();
        engine.attach();
        engine.pump();

        // one goals subscription + one milestones subscription
        assert_eq!(store.open_subscription_count(), 2);
        assert_eq!(engine.active_subscriptions(), 2);
    }

    #[tokio::test]
    async fn test_two_goals_in_one_snapshot_open_two_subscriptions() {
        let store = LocalStore::in_memory();
        seed_goal(&store, "u1", "Run a marathon").await;
        seed_goal(&store, "u1", "Learn Rust").await;

        let mut engine = engine_for(&store, AuthContext::with_user("u1"));
        engine.attach();
        engine.pump();

        assert_eq!(store.open_subscription_count(), 3); // goals + 2 milestone subs
    }

    #[tokio::test]
    async fn test_unchanged_id_set_is_not_resubscribed() {
        let store = LocalStore::in_memory();
        let goal_id = seed_goal(&store, "u1", "Run a marathon").await;

        let mut engine = engine_for(&store, AuthContext::with_user("u1"));
        engine.attach();
        engine.pump();
        let before = store.open_subscription_count();

        // A field update re-delivers the goals snapshot with the same ids.
        store
            .update_doc(
                &CollectionPath::goals("u1").doc(&goal_id),
                json!({"progress": 50}),
            )
            .await
            .unwrap();
        engine.pump();

        assert_eq!(store.open_subscription_count(), before);
        assert_eq!(engine.mirror().goal(&goal_id).unwrap().progress, 50);
    }

    #[tokio::test]
    async fn test_removed_goal_tears_down_descendants() {
        let store = LocalStore::in_memory();
        let goal_id = seed_goal(&store, "u1", "Run a marathon").await;
        let milestone_id = seed_milestone(&store, "u1", &goal_id, "Base fitness").await;
        seed_task(&store, "u1", &goal_id, &milestone_id, "Run 5k").await;

        let mut engine = engine_for(&store, AuthContext::with_user("u1"));
        engine.attach();
        engine.pump();
        assert_eq!(store.open_subscription_count(), 3);

        store
            .delete_doc(&CollectionPath::goals("u1").doc(&goal_id))
            .await
            .unwrap();
        engine.pump();

        assert_eq!(store.open_subscription_count(), 1); // goals only
        assert!(engine.mirror().goal(&goal_id).is_none());
        assert!(engine.mirror().milestones_for(&goal_id).is_empty());
        assert!(engine.mirror().tasks_for(&milestone_id).is_empty());
    }

    #[tokio::test]
    async fn test_removed_milestone_closes_task_subscription() {
        let store = LocalStore::in_memory();
        let goal_id = seed_goal(&store, "u1", "Run a marathon").await;
        let m1 = seed_milestone(&store, "u1", &goal_id, "Base fitness").await;
        let m2 = seed_milestone(&store, "u1", &goal_id, "Speed work").await;
        seed_task(&store, "u1", &goal_id, &m1, "Run 5k").await;
        seed_task(&store, "u1", &goal_id, &m2, "Intervals").await;

        let mut engine = engine_for(&store, AuthContext::with_user("u1"));
        engine.attach();
        engine.pump();
        assert_eq!(store.open_subscription_count(), 4);

        store
            .delete_doc(&CollectionPath::milestones("u1", &goal_id).doc(&m1))
            .await
            .unwrap();
        engine.pump();

        assert_eq!(store.open_subscription_count(), 3);
        assert!(engine.mirror().tasks_for(&m1).is_empty());
        // The sibling milestone's tasks are untouched.
        assert_eq!(engine.mirror().tasks_for(&m2).len(), 1);
    }

    #[tokio::test]
    async fn test_post_detach_silence() {
        let store = LocalStore::in_memory();
        seed_goal(&store, "u1", "Run a marathon").await;

        let mut engine = engine_for(&store, AuthContext::with_user("u1"));
        engine.attach();
        engine.pump();

        engine.detach();
        engine.detach(); // idempotent
        assert_eq!(store.open_subscription_count(), 0);

        // A delayed push for a previously-subscribed collection.
        seed_goal(&store, "u1", "Learn Rust").await;
        assert_eq!(engine.pump(), 0);
        assert!(engine.mirror().is_empty());
    }

    #[tokio::test]
    async fn test_churn_add_then_remove_before_child_snapshot_fires() {
        let store = LocalStore::in_memory();
        let mut engine = engine_for(&store, AuthContext::with_user("u1"));
        engine.attach();
        engine.pump();
        assert_eq!(store.open_subscription_count(), 1);

        // Queue an add and a remove without pumping in between; the
        // milestone subscription opened for the add is closed by the remove
        // before its own initial snapshot is processed.
        let goal_id = seed_goal(&store, "u1", "Run a marathon").await;
        store
            .delete_doc(&CollectionPath::goals("u1").doc(&goal_id))
            .await
            .unwrap();
        engine.pump();

        assert_eq!(store.open_subscription_count(), 1);
        assert_eq!(engine.active_subscriptions(), 1);
        assert!(engine.mirror().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_document_is_skipped() {
        let store = LocalStore::in_memory();
        seed_goal(&store, "u1", "Run a marathon").await;
        store
            .add_doc(&CollectionPath::goals("u1"), json!({"nonsense": true}))
            .await
            .unwrap();

        let mut engine = engine_for(&store, AuthContext::with_user("u1"));
        engine.attach();
        engine.pump();

        assert_eq!(engine.mirror().goals().count(), 1);
    }

    #[tokio::test]
    async fn test_run_follows_sign_out() {
        let store = LocalStore::in_memory();
        seed_goal(&store, "u1", "Run a marathon").await;
        let auth = AuthContext::with_user("u1");

        let mut engine = engine_for(&store, auth.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let store_probe = store.clone();
        let handle = tokio::spawn(async move {
            engine.run(shutdown_rx).await;
            engine
        });

        // Give the loop a moment to attach, then sign out.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(store_probe.open_subscription_count() > 0);
        auth.sign_out();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(store_probe.open_subscription_count(), 0);

        shutdown_tx.send(true).unwrap();
        let engine = handle.await.unwrap();
        assert!(engine.mirror().is_empty());
    }
}
