//! Derived agent activity.
//!
//! Activity is never stored. It is recomputed from the live workflow steps
//! every time it is read:
//!
//! - `working` when any live step routed to the agent's role is `agent_working`
//! - `waiting` when none is working but one is `awaiting_review`
//! - `idle` otherwise, including agents without a workflow role

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::types::{Activity, Agent, AgentType, StepStatus, WorkflowStep};

/// An agent together with its derived activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
pub struct AgentActivity {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub agent_role: Option<String>,
    pub agent_type: AgentType,
    pub activity: Activity,
}

/// Resolve one agent's activity against a set of steps
pub fn activity_for(agent: &Agent, steps: &[WorkflowStep]) -> Activity {
    let Some(role) = agent.agent_role.as_deref() else {
        return Activity::Idle;
    };

    let mut activity = Activity::Idle;
    for step in steps
        .iter()
        .filter(|s| s.agent_role.as_deref() == Some(role))
    {
        match step.status() {
            StepStatus::AgentWorking => return Activity::Working,
            StepStatus::AwaitingReview => activity = Activity::Waiting,
            _ => {}
        }
    }
    activity
}

/// Resolve activity for every agent, keyed by agent id
pub fn resolve(agents: &[Agent], steps: &[WorkflowStep]) -> BTreeMap<Uuid, Activity> {
    agents
        .iter()
        .map(|agent| (agent.id, activity_for(agent, steps)))
        .collect()
}

/// Pair each agent with its activity, sorted by name
pub fn describe(agents: &[Agent], steps: &[WorkflowStep]) -> Vec<AgentActivity> {
    let mut described: Vec<AgentActivity> = agents
        .iter()
        .map(|agent| AgentActivity {
            id: agent.id,
            name: agent.name.clone(),
            role: agent.role.clone(),
            agent_role: agent.agent_role.clone(),
            agent_type: agent.agent_type,
            activity: activity_for(agent, steps),
        })
        .collect();
    described.sort_by(|a, b| a.name.cmp(&b.name));
    described
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_agent(name: &str, agent_role: Option<&str>) -> Agent {
        let now = Utc::now();
        Agent {
            id: Uuid::new_v4(),
            name: name.to_string(),
            role: "Team member".to_string(),
            agent_role: agent_role.map(str::to_string),
            agent_type: AgentType::Agent,
            parent_agent_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn make_step(role: &str, status: StepStatus) -> WorkflowStep {
        let now = Utc::now();
        let mut step = WorkflowStep::pending(
            Uuid::new_v4(),
            1,
            "Draft",
            Some(role.to_string()),
            None,
            now,
        );
        match status {
            StepStatus::Pending => {}
            StepStatus::AgentWorking => step.claim(role, now).unwrap(),
            StepStatus::AwaitingReview => {
                step.claim(role, now).unwrap();
                step.submit(None, now).unwrap();
            }
            other => panic!("unsupported test status {other}"),
        }
        step
    }

    #[test]
    fn test_working_beats_waiting() {
        let agent = make_agent("Milton", Some("writer"));
        let steps = vec![
            make_step("writer", StepStatus::AwaitingReview),
            make_step("writer", StepStatus::AgentWorking),
        ];
        assert_eq!(activity_for(&agent, &steps), Activity::Working);
    }

    #[test]
    fn test_waiting_when_only_under_review() {
        let agent = make_agent("Milton", Some("writer"));
        let steps = vec![
            make_step("writer", StepStatus::AwaitingReview),
            make_step("writer", StepStatus::Pending),
        ];
        assert_eq!(activity_for(&agent, &steps), Activity::Waiting);
    }

    #[test]
    fn test_idle_without_role_or_matching_steps() {
        let no_role = make_agent("Ada", None);
        let other = make_agent("Grace", Some("editor"));
        let steps = vec![
            make_step("writer", StepStatus::AgentWorking),
            make_step("editor", StepStatus::Pending),
        ];
        assert_eq!(activity_for(&no_role, &steps), Activity::Idle);
        assert_eq!(activity_for(&other, &steps), Activity::Idle);
        assert_eq!(activity_for(&other, &[]), Activity::Idle);
    }

    #[test]
    fn test_resolve_and_describe() {
        let writer = make_agent("Milton", Some("writer"));
        let editor = make_agent("Ada", Some("editor"));
        let agents = vec![writer.clone(), editor.clone()];
        let steps = vec![make_step("editor", StepStatus::AwaitingReview)];

        let map = resolve(&agents, &steps);
        assert_eq!(map[&writer.id], Activity::Idle);
        assert_eq!(map[&editor.id], Activity::Waiting);

        let described = describe(&agents, &steps);
        assert_eq!(described[0].name, "Ada");
        assert_eq!(described[0].activity, Activity::Waiting);
        assert_eq!(described[1].activity, Activity::Idle);
    }
}
