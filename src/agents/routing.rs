//! Step routing checks.
//!
//! Top-level agents may take any step routed to their role. A subagent is only
//! allowed when one of its parents has a role that appears in the template.
//! Violations are reported, not enforced: the coordinator logs them and keeps
//! going.

use std::fmt;

use crate::types::{Agent, AgentType, WorkflowTemplate};

/// Outcome of checking who would execute a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    Allowed,
    /// No agent carries the step's role
    UnknownRole,
    /// The role belongs to a subagent with no parent in the template
    UnboundSubagent { agent_name: String },
}

impl RoutingDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RoutingDecision::Allowed)
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingDecision::Allowed => f.write_str("allowed"),
            RoutingDecision::UnknownRole => f.write_str("no agent has this role"),
            RoutingDecision::UnboundSubagent { agent_name } => write!(
                f,
                "subagent '{agent_name}' is not bound to any agent in this template"
            ),
        }
    }
}

/// Check whether `agent` may execute a step of `template`.
///
/// `parents` are the agent's resolved parent agents; unresolved ids are
/// simply absent.
pub fn check_agent_for_template(
    agent: Option<&Agent>,
    parents: &[Agent],
    template: &WorkflowTemplate,
) -> RoutingDecision {
    let Some(agent) = agent else {
        return RoutingDecision::UnknownRole;
    };

    if agent.agent_type == AgentType::Agent {
        return RoutingDecision::Allowed;
    }

    let bound = parents
        .iter()
        .filter_map(|parent| parent.agent_role.as_deref())
        .any(|role| template.uses_role(role));

    if bound {
        RoutingDecision::Allowed
    } else {
        RoutingDecision::UnboundSubagent {
            agent_name: agent.name.clone(),
        }
    }
}
