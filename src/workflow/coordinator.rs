//! Workflow instance coordinator.
//!
//! Sequences steps according to a template. Every mutation reads the documents
//! it depends on, decides, and commits a [`ChangeSet`] guarded by the versions
//! it read, so a racing writer turns into
//! [`WorkflowError::ConcurrentModification`] instead of a double transition.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::templates::validate_definition;
use crate::agents::AgentDirectory;
use crate::clock::Clock;
use crate::error::{WorkflowError, WorkflowResult};
use crate::store::{ChangeSet, Store, Versioned};
use crate::types::{
    InstanceStatus, InstanceSummary, StepStatus, TemplateDefinition, WorkflowInstance,
    WorkflowStep, WorkflowTemplate,
};

/// An instance together with every step it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InstanceDetail {
    pub instance: WorkflowInstance,
    /// Ordered by (order, attempt)
    pub steps: Vec<WorkflowStep>,
}

/// Outcome of approving a step with optional advancement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    pub step: WorkflowStep,
    pub instance: InstanceSummary,
    /// Whether the instance moved past the approved step
    pub advanced: bool,
}

/// Drives workflow instances through their templates
#[derive(Clone)]
pub struct WorkflowCoordinator {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    agents: AgentDirectory,
}

impl WorkflowCoordinator {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        let agents = AgentDirectory::new(Arc::clone(&store), Arc::clone(&clock));
        Self {
            store,
            clock,
            agents,
        }
    }

    /// The agent directory used for routing checks
    pub fn agents(&self) -> &AgentDirectory {
        &self.agents
    }

    // -- Templates --

    /// Validate and store a new template
    pub async fn create_template(
        &self,
        definition: TemplateDefinition,
    ) -> WorkflowResult<WorkflowTemplate> {
        let steps = validate_definition(&definition)?;
        let template = WorkflowTemplate {
            id: Uuid::new_v4(),
            name: definition.name.trim().to_string(),
            description: definition.description,
            steps,
            created_at: self.clock.now(),
        };

        self.store.insert_template(template.clone()).await?;
        info!(
            template_id = %template.id,
            name = %template.name,
            steps = template.total_steps(),
            "Created workflow template"
        );
        Ok(template)
    }

    /// Create templates whose names are not taken yet. Returns how many were
    /// created; invalid definitions are logged and skipped.
    pub async fn seed_templates(
        &self,
        definitions: Vec<TemplateDefinition>,
    ) -> WorkflowResult<usize> {
        let mut names: HashSet<String> = self
            .store
            .templates()
            .await?
            .into_iter()
            .map(|t| t.name)
            .collect();

        let mut created = 0;
        for definition in definitions {
            if names.contains(definition.name.trim()) {
                debug!(name = %definition.name, "Template already exists, skipping");
                continue;
            }
            match self.create_template(definition).await {
                Ok(template) => {
                    names.insert(template.name);
                    created += 1;
                }
                Err(WorkflowError::InvalidInput(message)) => {
                    warn!("Skipping invalid template: {}", message);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    /// All templates, oldest first
    pub async fn templates(&self) -> WorkflowResult<Vec<WorkflowTemplate>> {
        let mut templates = self.store.templates().await?;
        templates.sort_by_key(|t| t.created_at);
        Ok(templates)
    }

    pub async fn template(&self, id: Uuid) -> WorkflowResult<WorkflowTemplate> {
        self.store
            .template(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("template", id))
    }

    // -- Instance lifecycle --

    /// Start an instance of a template with step 1 pending
    pub async fn create_instance(&self, template_id: Uuid) -> WorkflowResult<Uuid> {
        self.create_instance_with_input(template_id, None).await
    }

    /// Start an instance, handing `input` to its first step
    pub async fn create_instance_with_input(
        &self,
        template_id: Uuid,
        input: Option<String>,
    ) -> WorkflowResult<Uuid> {
        let template = self.template(template_id).await?;
        let Some(first) = template.step(1) else {
            return Err(WorkflowError::invalid_state(format!(
                "template '{}' has no steps",
                template.name
            )));
        };

        let now = self.clock.now();
        let instance_id = Uuid::new_v4();
        let step = WorkflowStep::pending(
            instance_id,
            first.order,
            first.name.clone(),
            first.agent_role.clone(),
            input.clone(),
            now,
        );
        self.check_routing(&step, &template).await;

        let instance = WorkflowInstance {
            id: instance_id,
            template_id,
            template_name: template.name.clone(),
            current_step: 1,
            total_steps: template.total_steps(),
            status: InstanceStatus::Active,
            active_step_id: Some(step.id),
            input,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        let mut changes = ChangeSet::new();
        changes.insert_instance(instance).insert_step(step);
        self.store.commit(changes).await?;

        info!(
            instance_id = %instance_id,
            template = %template.name,
            total_steps = template.total_steps(),
            "Created workflow instance"
        );
        Ok(instance_id)
    }

    /// Move past the approved current step.
    ///
    /// Completes the instance on the last step, otherwise spawns the next
    /// template step as `pending` with the approved output as its input.
    pub async fn advance(&self, instance_id: Uuid) -> WorkflowResult<InstanceSummary> {
        let Versioned {
            version,
            doc: mut instance,
        } = self.load_instance(instance_id).await?;

        ensure_open(&instance)?;
        if instance.status == InstanceStatus::PausedForReview {
            return Err(WorkflowError::invalid_state(format!(
                "instance {instance_id} is paused for review, resume it before advancing"
            )));
        }

        let active = self.load_active_step(&instance).await?;
        if active.doc.status() != StepStatus::Approved {
            return Err(WorkflowError::invalid_state(format!(
                "step {} of instance {} is {}, not approved",
                instance.current_step,
                instance_id,
                active.doc.status()
            )));
        }

        let now = self.clock.now();
        let mut changes = ChangeSet::new();
        changes.guard_step(active.doc.id, active.version);
        self.move_past(&mut instance, &active.doc, now, &mut changes)
            .await?;

        let summary = InstanceSummary::from(&instance);
        changes.update_instance(instance, version);
        self.store.commit(changes).await?;

        log_advance(&summary);
        Ok(summary)
    }

    /// Move the cursor of `instance` past `approved`, staging the next step
    /// in `changes`. The caller stages and commits the instance itself.
    async fn move_past(
        &self,
        instance: &mut WorkflowInstance,
        approved: &WorkflowStep,
        now: DateTime<Utc>,
        changes: &mut ChangeSet,
    ) -> WorkflowResult<()> {
        if instance.current_step >= instance.total_steps {
            instance.status = InstanceStatus::Completed;
            instance.active_step_id = None;
            instance.completed_at = Some(now);
        } else {
            let template = self.template(instance.template_id).await?;
            let next_order = instance.current_step + 1;
            let Some(spec) = template.step(next_order) else {
                return Err(WorkflowError::invalid_state(format!(
                    "template '{}' has no step {next_order}",
                    template.name
                )));
            };

            let next = WorkflowStep::pending(
                instance.id,
                spec.order,
                spec.name.clone(),
                spec.agent_role.clone(),
                approved.output().map(str::to_string),
                now,
            );
            self.check_routing(&next, &template).await;

            instance.current_step = next_order;
            instance.status = InstanceStatus::Active;
            instance.active_step_id = Some(next.id);
            changes.insert_step(next);
        }
        instance.updated_at = now;
        Ok(())
    }

    /// Halt automatic progression without moving the cursor
    pub async fn pause_for_review(&self, instance_id: Uuid) -> WorkflowResult<InstanceSummary> {
        self.set_status(
            instance_id,
            &[InstanceStatus::Active, InstanceStatus::Running],
            InstanceStatus::PausedForReview,
        )
        .await
    }

    /// Lift a pause, returning the instance to `active`
    pub async fn resume(&self, instance_id: Uuid) -> WorkflowResult<InstanceSummary> {
        self.set_status(
            instance_id,
            &[InstanceStatus::PausedForReview],
            InstanceStatus::Active,
        )
        .await
    }

    /// Stop an instance, skipping its live step
    pub async fn cancel(&self, instance_id: Uuid) -> WorkflowResult<InstanceSummary> {
        let Versioned {
            version,
            doc: mut instance,
        } = self.load_instance(instance_id).await?;
        ensure_open(&instance)?;

        let now = self.clock.now();
        let mut changes = ChangeSet::new();

        if let Some(step_id) = instance.active_step_id {
            if let Some(Versioned {
                version: step_version,
                doc: mut step,
            }) = self.store.step(step_id).await?
            {
                if step.is_live() {
                    step.skip(now)?;
                    changes.update_step(step, step_version);
                }
            }
        }

        instance.status = InstanceStatus::Cancelled;
        instance.active_step_id = None;
        instance.updated_at = now;

        let summary = InstanceSummary::from(&instance);
        changes.update_instance(instance, version);
        self.store.commit(changes).await?;

        info!(instance_id = %instance_id, "Workflow cancelled");
        Ok(summary)
    }

    /// Remove an instance and every step it owns
    pub async fn delete_instance(&self, instance_id: Uuid) -> WorkflowResult<()> {
        if !self.store.delete_instance(instance_id).await? {
            return Err(WorkflowError::not_found("instance", instance_id));
        }
        info!(instance_id = %instance_id, "Workflow deleted");
        Ok(())
    }

    // -- Queries --

    /// Cursor, total, and status of an instance
    pub async fn get_instance(&self, instance_id: Uuid) -> WorkflowResult<InstanceSummary> {
        let instance = self.load_instance(instance_id).await?;
        Ok(InstanceSummary::from(&instance.doc))
    }

    pub async fn instance(&self, instance_id: Uuid) -> WorkflowResult<WorkflowInstance> {
        Ok(self.load_instance(instance_id).await?.doc)
    }

    pub async fn instance_detail(&self, instance_id: Uuid) -> WorkflowResult<InstanceDetail> {
        let instance = self.load_instance(instance_id).await?.doc;
        let steps = self.store.steps_for_instance(instance_id).await?;
        Ok(InstanceDetail { instance, steps })
    }

    /// Instances, newest first, optionally filtered by status
    pub async fn list_instances(
        &self,
        status: Option<InstanceStatus>,
    ) -> WorkflowResult<Vec<WorkflowInstance>> {
        let mut instances: Vec<WorkflowInstance> = self
            .store
            .instances()
            .await?
            .into_iter()
            .filter(|i| status.is_none_or(|s| i.status == s))
            .collect();
        instances.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(instances)
    }

    pub async fn step(&self, step_id: Uuid) -> WorkflowResult<WorkflowStep> {
        Ok(self.load_step(step_id).await?.doc)
    }

    /// Pending steps an agent may claim now. Steps of paused instances are
    /// left out.
    pub async fn pending_steps(&self) -> WorkflowResult<Vec<WorkflowStep>> {
        let paused: HashSet<Uuid> = self
            .store
            .instances()
            .await?
            .into_iter()
            .filter(|i| i.status == InstanceStatus::PausedForReview)
            .map(|i| i.id)
            .collect();

        Ok(self
            .store
            .steps_with_status(&[StepStatus::Pending])
            .await?
            .into_iter()
            .filter(|s| !paused.contains(&s.instance_id))
            .collect())
    }

    /// Steps waiting on a reviewer
    pub async fn awaiting_review(&self) -> WorkflowResult<Vec<WorkflowStep>> {
        Ok(self
            .store
            .steps_with_status(&[StepStatus::AwaitingReview])
            .await?)
    }

    // -- Step operations --

    /// An agent takes the active step: `pending → agent_working`
    pub async fn claim_step(&self, step_id: Uuid, agent_role: &str) -> WorkflowResult<WorkflowStep> {
        let (step, instance) = self.load_transitionable(step_id).await?;
        if instance.doc.status == InstanceStatus::PausedForReview {
            return Err(WorkflowError::invalid_state(format!(
                "instance {} is paused for review",
                instance.doc.id
            )));
        }

        let now = self.clock.now();
        let Versioned {
            version: step_version,
            doc: mut step,
        } = step;
        step.claim(agent_role, now)?;

        let Versioned {
            version: instance_version,
            doc: mut instance,
        } = instance;
        instance.status = InstanceStatus::Running;
        instance.updated_at = now;

        let mut changes = ChangeSet::new();
        changes
            .update_step(step.clone(), step_version)
            .update_instance(instance, instance_version);
        self.store.commit(changes).await?;

        info!(step_id = %step_id, agent_role = %agent_role, "Step claimed");
        Ok(step)
    }

    /// The agent hands in its output: `agent_working → awaiting_review`
    pub async fn submit_step(
        &self,
        step_id: Uuid,
        output: Option<String>,
    ) -> WorkflowResult<WorkflowStep> {
        let (step, instance) = self.load_transitionable(step_id).await?;

        let Versioned { version, doc: mut step } = step;
        step.submit(output, self.clock.now())?;

        let mut changes = ChangeSet::new();
        changes
            .update_step(step.clone(), version)
            .guard_instance(instance.doc.id, instance.version);
        self.store.commit(changes).await?;

        info!(step_id = %step_id, "Step submitted for review");
        Ok(step)
    }

    /// A reviewer accepts the output: `awaiting_review → approved`
    pub async fn approve_step(
        &self,
        step_id: Uuid,
        notes: Option<String>,
    ) -> WorkflowResult<WorkflowStep> {
        let (step, instance) = self.load_transitionable(step_id).await?;

        let Versioned { version, doc: mut step } = step;
        step.approve(notes, self.clock.now())?;

        let mut changes = ChangeSet::new();
        changes
            .update_step(step.clone(), version)
            .guard_instance(instance.doc.id, instance.version);
        self.store.commit(changes).await?;

        info!(step_id = %step_id, "Step approved");
        Ok(step)
    }

    /// Approve a step and, when `advance` is set and the instance is not
    /// paused, advance past it in the same commit.
    ///
    /// Either both take effect or neither does. A pause that lands first
    /// leaves the instance where it is and reports `advanced: false`.
    pub async fn approve_and_advance(
        &self,
        step_id: Uuid,
        notes: Option<String>,
        advance: bool,
    ) -> WorkflowResult<Approval> {
        let (step, instance) = self.load_transitionable(step_id).await?;
        let now = self.clock.now();

        let Versioned {
            version: step_version,
            doc: mut step,
        } = step;
        step.approve(notes, now)?;

        let Versioned {
            version: instance_version,
            doc: mut instance,
        } = instance;

        let advanced = advance && instance.status != InstanceStatus::PausedForReview;
        let mut changes = ChangeSet::new();
        if advanced {
            self.move_past(&mut instance, &step, now, &mut changes)
                .await?;
            changes.update_instance(instance.clone(), instance_version);
        } else {
            changes.guard_instance(instance.id, instance_version);
        }
        changes.update_step(step.clone(), step_version);
        self.store.commit(changes).await?;

        info!(step_id = %step_id, advanced, "Step approved");
        let summary = InstanceSummary::from(&instance);
        if advanced {
            log_advance(&summary);
        }
        Ok(Approval {
            step,
            instance: summary,
            advanced,
        })
    }

    /// A reviewer turns the output down: `awaiting_review → rejected`.
    ///
    /// A fresh pending retry at the same order becomes the active step and its
    /// id is returned. The cursor and step total do not move.
    pub async fn reject_step(&self, step_id: Uuid, reason: &str) -> WorkflowResult<Uuid> {
        let (step, instance) = self.load_transitionable(step_id).await?;
        let now = self.clock.now();

        let Versioned {
            version: step_version,
            doc: mut step,
        } = step;
        step.reject(reason, now)?;
        let retry = step.retry(now)?;
        let retry_id = retry.id;

        let Versioned {
            version: instance_version,
            doc: mut instance,
        } = instance;
        instance.active_step_id = Some(retry_id);
        if matches!(
            instance.status,
            InstanceStatus::Running | InstanceStatus::PausedForReview
        ) {
            instance.status = InstanceStatus::Active;
        }
        instance.updated_at = now;

        let mut changes = ChangeSet::new();
        changes
            .update_step(step, step_version)
            .insert_step(retry)
            .update_instance(instance, instance_version);
        self.store.commit(changes).await?;

        warn!(
            step_id = %step_id,
            retry_id = %retry_id,
            reason = %reason.trim(),
            "Step rejected, retry queued"
        );
        Ok(retry_id)
    }

    // -- Helpers --

    async fn load_instance(&self, id: Uuid) -> WorkflowResult<Versioned<WorkflowInstance>> {
        self.store
            .instance(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("instance", id))
    }

    async fn load_step(&self, id: Uuid) -> WorkflowResult<Versioned<WorkflowStep>> {
        self.store
            .step(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("step", id))
    }

    async fn load_active_step(
        &self,
        instance: &WorkflowInstance,
    ) -> WorkflowResult<Versioned<WorkflowStep>> {
        let Some(step_id) = instance.active_step_id else {
            return Err(WorkflowError::invalid_state(format!(
                "instance {} has no active step",
                instance.id
            )));
        };
        self.load_step(step_id).await
    }

    /// Load a step and its instance, checking the step may move at all
    async fn load_transitionable(
        &self,
        step_id: Uuid,
    ) -> WorkflowResult<(Versioned<WorkflowStep>, Versioned<WorkflowInstance>)> {
        let step = self.load_step(step_id).await?;
        let instance = self.load_instance(step.doc.instance_id).await?;
        ensure_open(&instance.doc)?;

        if instance.doc.active_step_id != Some(step_id) {
            return Err(WorkflowError::invalid_state(format!(
                "step {step_id} is not the active step of instance {}",
                instance.doc.id
            )));
        }
        Ok((step, instance))
    }

    async fn set_status(
        &self,
        instance_id: Uuid,
        from: &[InstanceStatus],
        to: InstanceStatus,
    ) -> WorkflowResult<InstanceSummary> {
        let Versioned {
            version,
            doc: mut instance,
        } = self.load_instance(instance_id).await?;

        if !from.contains(&instance.status) {
            return Err(WorkflowError::invalid_state(format!(
                "instance {instance_id} is {}, cannot become {to}",
                instance.status
            )));
        }

        instance.status = to;
        instance.updated_at = self.clock.now();

        let summary = InstanceSummary::from(&instance);
        let mut changes = ChangeSet::new();
        changes.update_instance(instance, version);
        self.store.commit(changes).await?;

        info!(instance_id = %instance_id, status = %to, "Workflow status changed");
        Ok(summary)
    }

    /// Log, but never block on, a step routed to an agent that may not take it
    async fn check_routing(&self, step: &WorkflowStep, template: &WorkflowTemplate) {
        let Some(role) = step.agent_role.as_deref() else {
            return;
        };
        match self.agents.check_routing(role, template).await {
            Ok(decision) if decision.is_allowed() => {}
            Ok(decision) => warn!(
                agent_role = %role,
                template = %template.name,
                step = step.order,
                "Routing check failed ({}), creating step anyway",
                decision
            ),
            Err(e) => warn!(agent_role = %role, error = %e, "Routing check could not run"),
        }
    }
}

fn log_advance(summary: &InstanceSummary) {
    if summary.status == InstanceStatus::Completed {
        info!(instance_id = %summary.id, "Workflow completed");
    } else {
        info!(
            instance_id = %summary.id,
            step = summary.current_step,
            total_steps = summary.total_steps,
            "Workflow advanced"
        );
    }
}

fn ensure_open(instance: &WorkflowInstance) -> WorkflowResult<()> {
    if instance.status.is_terminal() {
        return Err(WorkflowError::invalid_state(format!(
            "instance {} is already {}",
            instance.id, instance.status
        )));
    }
    Ok(())
}
