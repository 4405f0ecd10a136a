//! Agent directory: the team roster and what each member is doing.

pub mod activity;
pub mod routing;

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{WorkflowError, WorkflowResult};
use crate::store::Store;
use crate::types::{Agent, AgentProfile, AgentType, StepStatus, WorkflowTemplate};

pub use activity::{activity_for, describe, resolve, AgentActivity};
pub use routing::{check_agent_for_template, RoutingDecision};

/// Registers agents and answers activity and routing questions
#[derive(Clone)]
pub struct AgentDirectory {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl AgentDirectory {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create an agent, or update the one with the same name in place
    pub async fn upsert(&self, profile: AgentProfile) -> WorkflowResult<Agent> {
        let name = profile.name.trim();
        if name.is_empty() {
            return Err(WorkflowError::invalid_input("agent name is required"));
        }
        if profile.agent_type == AgentType::Subagent && profile.parent_agent_ids.is_empty() {
            warn!(agent = %name, "Subagent registered without parents");
        }

        let now = self.clock.now();
        let agent = self
            .store
            .upsert_agent(Agent {
                id: Uuid::new_v4(),
                name: name.to_string(),
                role: profile.role,
                agent_role: profile.agent_role,
                agent_type: profile.agent_type,
                parent_agent_ids: profile.parent_agent_ids,
                created_at: now,
                updated_at: now,
            })
            .await?;
        info!(agent_id = %agent.id, name = %agent.name, "Agent registered");
        Ok(agent)
    }

    /// All agents sorted by name
    pub async fn list(&self) -> WorkflowResult<Vec<Agent>> {
        let mut agents = self.store.agents().await?;
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(agents)
    }

    pub async fn get(&self, id: Uuid) -> WorkflowResult<Agent> {
        self.store
            .agent(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("agent", id))
    }

    pub async fn by_role(&self, agent_role: &str) -> WorkflowResult<Option<Agent>> {
        Ok(self.store.agent_by_role(agent_role).await?)
    }

    /// Every agent with its derived activity.
    ///
    /// Never fails: an unreadable roster yields an empty list, and unreadable
    /// live steps leave every agent `idle`.
    pub async fn activity(&self) -> Vec<AgentActivity> {
        let agents = match self.store.agents().await {
            Ok(agents) => agents,
            Err(e) => {
                warn!(error = %e, "Failed to load agents, reporting no activity");
                return Vec::new();
            }
        };
        let steps = match self.store.steps_with_status(&StepStatus::LIVE).await {
            Ok(steps) => steps,
            Err(e) => {
                warn!(error = %e, "Failed to load live steps, reporting all agents idle");
                Vec::new()
            }
        };
        describe(&agents, &steps)
    }

    /// Check whether the agent holding `agent_role` may work on `template`
    pub async fn check_routing(
        &self,
        agent_role: &str,
        template: &WorkflowTemplate,
    ) -> WorkflowResult<RoutingDecision> {
        let agent = self.store.agent_by_role(agent_role).await?;

        let mut parents = Vec::new();
        if let Some(agent) = &agent {
            for parent_id in &agent.parent_agent_ids {
                if let Some(parent) = self.store.agent(*parent_id).await? {
                    parents.push(parent);
                }
            }
        }

        Ok(check_agent_for_template(
            agent.as_ref(),
            &parents,
            template,
        ))
    }
}
