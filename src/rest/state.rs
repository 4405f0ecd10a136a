//! API state management for the REST server.

use std::sync::Arc;

use crate::agents::AgentDirectory;
use crate::clock::Clock;
use crate::config::Config;
use crate::status::StatusRegistry;
use crate::store::Store;
use crate::workflow::WorkflowCoordinator;

/// Shared state for the REST API
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: WorkflowCoordinator,
    pub registry: StatusRegistry,
    pub agents: AgentDirectory,
    /// Application configuration (reserved for future CORS/auth settings)
    #[allow(dead_code)]
    pub config: Arc<Config>,
}

impl ApiState {
    /// Wire the engine components over one store and clock
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: Config) -> Self {
        let coordinator = WorkflowCoordinator::new(Arc::clone(&store), Arc::clone(&clock));
        let registry = StatusRegistry::new(store, clock, &config.status);
        let agents = coordinator.agents().clone();

        Self {
            coordinator,
            registry,
            agents,
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_components_share_store() {
        let state = ApiState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            Config::default(),
        );

        state
            .registry
            .upsert("daemon_health", "online", None)
            .await
            .unwrap();
        assert_eq!(state.registry.list().await.len(), 1);
        assert!(state.coordinator.templates().await.unwrap().is_empty());
        assert!(state.agents.list().await.unwrap().is_empty());
    }
}
