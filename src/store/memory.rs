//! In-process document store with an optional JSON snapshot on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ChangeSet, Expect, Store, StoreError, StoreResult, Versioned};
use crate::types::{
    Agent, StatusEntry, StepStatus, WorkflowInstance, WorkflowStep, WorkflowTemplate,
};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    templates: BTreeMap<Uuid, WorkflowTemplate>,
    #[serde(default)]
    instances: BTreeMap<Uuid, Versioned<WorkflowInstance>>,
    #[serde(default)]
    steps: BTreeMap<Uuid, Versioned<WorkflowStep>>,
    #[serde(default)]
    agents: BTreeMap<Uuid, Agent>,
    /// Keyed by status key, which is unique
    #[serde(default)]
    status: BTreeMap<String, StatusEntry>,
}

impl Tables {
    fn check(&self, changes: &ChangeSet) -> StoreResult<()> {
        for write in &changes.instances {
            let current = self.instances.get(&write.doc.id).map(|v| v.version);
            check_expectation("instance", write.doc.id, write.expect, current)?;
        }
        for write in &changes.steps {
            let current = self.steps.get(&write.doc.id).map(|v| v.version);
            check_expectation("step", write.doc.id, write.expect, current)?;
        }
        for (id, version) in &changes.instance_guards {
            let current = self.instances.get(id).map(|v| v.version);
            check_expectation("instance", *id, Expect::Version(*version), current)?;
        }
        for (id, version) in &changes.step_guards {
            let current = self.steps.get(id).map(|v| v.version);
            check_expectation("step", *id, Expect::Version(*version), current)?;
        }
        Ok(())
    }

    fn apply(&mut self, changes: ChangeSet) {
        for write in changes.instances {
            let version = next_version(write.expect);
            self.instances.insert(
                write.doc.id,
                Versioned {
                    version,
                    doc: write.doc,
                },
            );
        }
        for write in changes.steps {
            let version = next_version(write.expect);
            self.steps.insert(
                write.doc.id,
                Versioned {
                    version,
                    doc: write.doc,
                },
            );
        }
    }
}

fn check_expectation(
    collection: &'static str,
    id: Uuid,
    expect: Expect,
    current: Option<u64>,
) -> StoreResult<()> {
    let ok = match expect {
        Expect::Absent => current.is_none(),
        Expect::Version(version) => current == Some(version),
    };
    if ok {
        Ok(())
    } else {
        Err(StoreError::Conflict { collection, id })
    }
}

fn next_version(expect: Expect) -> u64 {
    match expect {
        Expect::Absent => 1,
        Expect::Version(version) => version + 1,
    }
}

/// Document store holding all tables behind one lock.
///
/// When opened with a snapshot path, every successful write is persisted to
/// that file before the lock is released.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store that lives only in memory
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            snapshot_path: None,
        }
    }

    /// Open a store backed by a JSON snapshot file, loading it if present
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tables = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Tables::default()
        };

        tracing::debug!(path = %path.display(), "Opened store snapshot");

        Ok(Self {
            tables: RwLock::new(tables),
            snapshot_path: Some(path),
        })
    }

    /// Path of the snapshot file, if any
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    async fn persist(&self, tables: &Tables) -> StoreResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let contents = serde_json::to_string_pretty(tables)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Run a mutation against a copy of the tables, persist, then swap it in.
    /// A failed persist leaves the in-memory tables untouched.
    async fn write<T: Send>(
        &self,
        mutate: impl FnOnce(&mut Tables) -> StoreResult<T> + Send,
    ) -> StoreResult<T> {
        let mut tables = self.tables.write().await;
        if self.snapshot_path.is_none() {
            return mutate(&mut *tables);
        }

        let mut next = tables.clone();
        let result = mutate(&mut next)?;
        self.persist(&next).await?;
        *tables = next;
        Ok(result)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_template(&self, template: WorkflowTemplate) -> StoreResult<()> {
        self.write(move |tables| {
            if tables.templates.contains_key(&template.id) {
                return Err(StoreError::Duplicate {
                    collection: "template",
                    id: template.id,
                });
            }
            tables.templates.insert(template.id, template);
            Ok(())
        })
        .await
    }

    async fn template(&self, id: Uuid) -> StoreResult<Option<WorkflowTemplate>> {
        Ok(self.tables.read().await.templates.get(&id).cloned())
    }

    async fn templates(&self) -> StoreResult<Vec<WorkflowTemplate>> {
        Ok(self.tables.read().await.templates.values().cloned().collect())
    }

    async fn instance(&self, id: Uuid) -> StoreResult<Option<Versioned<WorkflowInstance>>> {
        Ok(self.tables.read().await.instances.get(&id).cloned())
    }

    async fn instances(&self) -> StoreResult<Vec<WorkflowInstance>> {
        Ok(self
            .tables
            .read()
            .await
            .instances
            .values()
            .map(|v| v.doc.clone())
            .collect())
    }

    async fn delete_instance(&self, id: Uuid) -> StoreResult<bool> {
        self.write(move |tables| {
            if tables.instances.remove(&id).is_none() {
                return Ok(false);
            }
            tables.steps.retain(|_, step| step.doc.instance_id != id);
            Ok(true)
        })
        .await
    }

    async fn step(&self, id: Uuid) -> StoreResult<Option<Versioned<WorkflowStep>>> {
        Ok(self.tables.read().await.steps.get(&id).cloned())
    }

    async fn steps_for_instance(&self, instance_id: Uuid) -> StoreResult<Vec<WorkflowStep>> {
        let tables = self.tables.read().await;
        let mut steps: Vec<WorkflowStep> = tables
            .steps
            .values()
            .filter(|v| v.doc.instance_id == instance_id)
            .map(|v| v.doc.clone())
            .collect();
        steps.sort_by_key(|s| (s.order, s.attempt));
        Ok(steps)
    }

    async fn steps_with_status(
        &self,
        statuses: &[StepStatus],
    ) -> StoreResult<Vec<WorkflowStep>> {
        let tables = self.tables.read().await;
        let mut steps: Vec<WorkflowStep> = tables
            .steps
            .values()
            .filter(|v| statuses.contains(&v.doc.status()))
            .map(|v| v.doc.clone())
            .collect();
        steps.sort_by_key(|s| s.created_at);
        Ok(steps)
    }

    async fn commit(&self, changes: ChangeSet) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        self.write(move |tables| {
            tables.check(&changes)?;
            tables.apply(changes);
            Ok(())
        })
        .await
    }

    async fn agents(&self) -> StoreResult<Vec<Agent>> {
        Ok(self.tables.read().await.agents.values().cloned().collect())
    }

    async fn agent_by_name(&self, name: &str) -> StoreResult<Option<Agent>> {
        Ok(self
            .tables
            .read()
            .await
            .agents
            .values()
            .find(|a| a.name == name)
            .cloned())
    }

    async fn agent_by_role(&self, agent_role: &str) -> StoreResult<Option<Agent>> {
        Ok(self
            .tables
            .read()
            .await
            .agents
            .values()
            .find(|a| a.agent_role.as_deref() == Some(agent_role))
            .cloned())
    }

    async fn agent(&self, id: Uuid) -> StoreResult<Option<Agent>> {
        Ok(self.tables.read().await.agents.get(&id).cloned())
    }

    async fn upsert_agent(&self, agent: Agent) -> StoreResult<Agent> {
        self.write(move |tables| {
            let stored = match tables.agents.values().find(|a| a.name == agent.name) {
                Some(existing) => Agent {
                    id: existing.id,
                    created_at: existing.created_at,
                    ..agent
                },
                None => agent,
            };
            tables.agents.insert(stored.id, stored.clone());
            Ok(stored)
        })
        .await
    }

    async fn status_entry(&self, key: &str) -> StoreResult<Option<StatusEntry>> {
        Ok(self.tables.read().await.status.get(key).cloned())
    }

    async fn status_entries(&self) -> StoreResult<Vec<StatusEntry>> {
        Ok(self.tables.read().await.status.values().cloned().collect())
    }

    async fn upsert_status(
        &self,
        key: &str,
        status: &str,
        details: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Uuid> {
        let key = key.to_string();
        let status = status.to_string();
        self.write(move |tables| {
            if let Some(existing) = tables.status.get_mut(&key) {
                if existing.updated_at > updated_at {
                    return Ok(existing.id);
                }
                existing.status = status;
                existing.details = details;
                existing.updated_at = updated_at;
                return Ok(existing.id);
            }

            let entry = StatusEntry {
                id: Uuid::new_v4(),
                key: key.clone(),
                status,
                details,
                updated_at,
            };
            let id = entry.id;
            tables.status.insert(key, entry);
            Ok(id)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentType, InstanceStatus, StepState};
    use std::sync::Arc;
    use chrono::Duration;
    use tempfile::TempDir;

    fn make_instance(now: DateTime<Utc>) -> WorkflowInstance {
        WorkflowInstance {
            id: Uuid::new_v4(),
            template_id: Uuid::new_v4(),
            template_name: "blog".to_string(),
            current_step: 1,
            total_steps: 2,
            status: InstanceStatus::Active,
            active_step_id: None,
            input: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn test_commit_inserts_at_version_one() {
        let store = MemoryStore::new();
        let instance = make_instance(Utc::now());
        let id = instance.id;

        let mut changes = ChangeSet::new();
        changes.insert_instance(instance);
        store.commit(changes).await.unwrap();

        let stored = store.instance(id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts_and_writes_nothing() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let instance = make_instance(now);
        let id = instance.id;

        let mut changes = ChangeSet::new();
        changes.insert_instance(instance.clone());
        store.commit(changes).await.unwrap();

        let mut first = instance.clone();
        first.current_step = 2;
        let mut changes = ChangeSet::new();
        changes.update_instance(first, 1);
        store.commit(changes).await.unwrap();

        // Second writer still holds version 1
        let step = WorkflowStep::pending(id, 2, "Draft", None, None, now);
        let step_id = step.id;
        let mut stale = instance;
        stale.current_step = 3;
        let mut changes = ChangeSet::new();
        changes.update_instance(stale, 1).insert_step(step);
        let err = store.commit(changes).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { collection: "instance", .. }));

        let stored = store.instance(id).await.unwrap().unwrap();
        assert_eq!(stored.doc.current_step, 2);
        assert_eq!(stored.version, 2);
        assert!(store.step(step_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_guard_detects_concurrent_step_change() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let step = WorkflowStep::pending(Uuid::new_v4(), 1, "Draft", None, None, now);
        let step_id = step.id;

        let mut changes = ChangeSet::new();
        changes.insert_step(step.clone());
        store.commit(changes).await.unwrap();

        let mut claimed = step;
        claimed.state = StepState::AgentWorking { started_at: now };
        let mut changes = ChangeSet::new();
        changes.update_step(claimed, 1);
        store.commit(changes).await.unwrap();

        let mut changes = ChangeSet::new();
        changes.guard_step(step_id, 1);
        assert!(store.commit(changes).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_instance_cascades_steps() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let instance = make_instance(now);
        let id = instance.id;
        let other = Uuid::new_v4();

        let mut changes = ChangeSet::new();
        changes
            .insert_instance(instance)
            .insert_step(WorkflowStep::pending(id, 1, "Research", None, None, now))
            .insert_step(WorkflowStep::pending(other, 1, "Research", None, None, now));
        store.commit(changes).await.unwrap();

        assert!(store.delete_instance(id).await.unwrap());
        assert!(store.steps_for_instance(id).await.unwrap().is_empty());
        assert_eq!(store.steps_for_instance(other).await.unwrap().len(), 1);
        assert!(!store.delete_instance(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_status_keeps_id_and_ignores_older_reports() {
        let store = MemoryStore::new();
        let t0 = Utc::now();

        let id = store
            .upsert_status("daemon_health", "online", None, t0)
            .await
            .unwrap();
        let again = store
            .upsert_status(
                "daemon_health",
                "offline",
                Some("stopped".into()),
                t0 + Duration::seconds(5),
            )
            .await
            .unwrap();
        assert_eq!(id, again);

        let late = store
            .upsert_status("daemon_health", "online", None, t0 + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(id, late);

        let entry = store.status_entry("daemon_health").await.unwrap().unwrap();
        assert_eq!(entry.status, "offline");
        assert_eq!(entry.details.as_deref(), Some("stopped"));
        assert_eq!(store.status_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");

        let instance = make_instance(Utc::now());
        let id = instance.id;
        {
            let store = MemoryStore::open(&path).unwrap();
            let mut changes = ChangeSet::new();
            changes.insert_instance(instance);
            store.commit(changes).await.unwrap();
            store
                .upsert_status("daemon_health", "online", None, Utc::now())
                .await
                .unwrap();
        }

        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.snapshot_path(), Some(path.as_path()));
        let stored = reopened.instance(id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert!(reopened.status_entry("daemon_health").await.unwrap().is_some());
    }

    fn make_agent(name: &str, role: &str, now: DateTime<Utc>) -> Agent {
        Agent {
            id: Uuid::new_v4(),
            name: name.to_string(),
            role: role.to_string(),
            agent_role: None,
            agent_type: AgentType::Agent,
            parent_agent_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_upsert_agent_replaces_by_name() {
        let store = MemoryStore::new();
        let created = Utc::now();
        let first = store
            .upsert_agent(make_agent("Milton", "Writer", created))
            .await
            .unwrap();

        let later = created + Duration::seconds(5);
        let second = store
            .upsert_agent(make_agent("Milton", "Editor", later))
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, created);
        assert_eq!(second.updated_at, later);
        assert_eq!(second.role, "Editor");
        assert_eq!(store.agents().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upsert_agent_stores_one_row() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::open(temp_dir.path().join("state.json")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .upsert_agent(make_agent("Milton", "Writer", Utc::now()))
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }

        let agents = store.agents().await.unwrap();
        assert_eq!(agents.len(), 1);
        assert!(ids.iter().all(|id| *id == agents[0].id));
    }
}
