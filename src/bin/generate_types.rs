//! Generates TypeScript definitions and JSON schemas for the dashboard.
//!
//! Usage: `cargo run --bin generate_types [output_dir]` (default: `bindings/`)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use schemars::JsonSchema;
use ts_rs::TS;

use mission_control::agents::AgentActivity;
use mission_control::config::Config;
use mission_control::types::{
    Activity, Agent, AgentProfile, AgentType, InstanceStatus, InstanceSummary, StatusEntry,
    StatusReading, StepSpec, StepState, StepStatus, TemplateDefinition, WorkflowInstance,
    WorkflowStep, WorkflowTemplate,
};
use mission_control::workflow::InstanceDetail;

fn write_schema<T: JsonSchema>(dir: &Path, name: &str) -> Result<()> {
    let schema = schemars::schema_for!(T);
    let path = dir.join(format!("{name}.schema.json"));
    let json = serde_json::to_string_pretty(&schema)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("  ✓ {}", path.display());
    Ok(())
}

fn typescript_bindings() -> String {
    let decls = [
        // Templates
        StepSpec::decl(),
        TemplateDefinition::decl(),
        WorkflowTemplate::decl(),
        // Instances and steps
        InstanceStatus::decl(),
        StepStatus::decl(),
        StepState::decl(),
        WorkflowStep::decl(),
        WorkflowInstance::decl(),
        InstanceSummary::decl(),
        // Agents
        AgentType::decl(),
        Activity::decl(),
        Agent::decl(),
        AgentProfile::decl(),
        AgentActivity::decl(),
        // Status
        StatusEntry::decl(),
        StatusReading::decl(),
    ];

    let mut out = String::from("// Generated by generate_types. Do not edit.\n\n");
    for decl in decls {
        out.push_str("export ");
        out.push_str(&decl);
        out.push_str("\n\n");
    }
    out
}

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("bindings"));

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    println!("Generating types to: {}", out_dir.display());

    let ts_path = out_dir.join("mission-control.ts");
    std::fs::write(&ts_path, typescript_bindings())
        .with_context(|| format!("Failed to write {}", ts_path.display()))?;
    println!("  ✓ {}", ts_path.display());

    write_schema::<Config>(&out_dir, "config")?;
    write_schema::<TemplateDefinition>(&out_dir, "template-definition")?;
    write_schema::<WorkflowTemplate>(&out_dir, "workflow-template")?;
    write_schema::<InstanceDetail>(&out_dir, "instance-detail")?;
    write_schema::<AgentActivity>(&out_dir, "agent-activity")?;
    write_schema::<StatusReading>(&out_dir, "status-reading")?;

    println!("\nType generation complete.");
    Ok(())
}
