use anyhow::{Context, Result};
use std::path::Path;
use weather_infra::config::PROJECT;
use weather_infra::deployment;
use weather_infra::in_memory::InMemoryOrchestrator;
use weather_infra::Stack;
use weather_infra_models::{ChangeKind, DeploymentReport};

use super::load_config;

pub async fn run_plan(stack_name: &str, config_file: Option<&Path>, output: &str) -> Result<()> {
    let config = load_config(stack_name, config_file)?;

    let mut stack = Stack::new(PROJECT, stack_name);
    deployment::declare(&config, &mut stack)?;
    let plan = stack.plan();

    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("Plan for {}/{} ({:?})", PROJECT, stack_name, stack.phase());
    println!("{}", "=".repeat(80));
    println!();

    for resource in &plan {
        println!("{:<28} {}", resource.logical_name, resource.type_token);
        let properties = serde_json::to_string_pretty(&resource.properties)?;
        for line in properties.lines() {
            println!("    {}", line);
        }
        println!();
    }

    println!("Exports: {}", stack.export_names().collect::<Vec<_>>().join(", "));
    println!();
    println!("{} resource(s) declared", plan.len());

    Ok(())
}

pub async fn run_simulate(stack_name: &str, config_file: Option<&Path>, runs: usize, output: &str) -> Result<()> {
    let config = load_config(stack_name, config_file)?;
    let orchestrator = InMemoryOrchestrator::new();
    let mut reports = Vec::with_capacity(runs);

    for run in 1..=runs.max(1) {
        tracing::info!("Simulated run {}/{}", run, runs.max(1));

        let mut stack = Stack::new(PROJECT, stack_name);
        deployment::declare(&config, &mut stack)?;

        match stack.submit(&orchestrator).await {
            Ok(report) => reports.push(report),
            Err(failure) => {
                if output != "json" {
                    print_report(run, &failure.report);
                }
                return Err(failure).with_context(|| format!("Simulated run {} failed", run));
            }
        }
    }

    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for (i, report) in reports.iter().enumerate() {
            print_report(i + 1, report);
        }
    }

    Ok(())
}

fn print_report(run: usize, report: &DeploymentReport) {
    println!("Run {} - {:?}", run, report.phase);
    println!("{}", "-".repeat(60));
    println!("{:<28} {:<16} {}", "RESOURCE", "KIND", "CHANGE");
    for change in &report.changes {
        println!("{:<28} {:<16} {}", change.logical_name, change.kind.to_string(), change.change);
    }
    println!();
    println!(
        "  {} to create, {} to update, {} unchanged",
        report.count(ChangeKind::Create),
        report.count(ChangeKind::Update),
        report.count(ChangeKind::Same)
    );

    if !report.exports.is_empty() {
        println!();
        println!("Outputs:");
        for (name, value) in &report.exports {
            println!("  {:<10} {}", name, value);
        }
    }
    println!();
}
