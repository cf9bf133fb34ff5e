use crate::context::{self, Overrides};
use crate::output::{format_timestamp, print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use storefleet_core::types::{DeleteOutcome, RefreshOutcome, StoreRecord};
use storefleet_core::Orchestrator;

#[derive(Subcommand)]
pub enum StoreSubcommand {
    /// Register a store and install it into its own namespace
    Create { name: String },
    /// List all stores, newest first
    List,
    /// Show one store
    Show { name: String },
    /// Probe the store's pod and update its status
    Refresh { name: String },
    /// Uninstall the store and remove it from the registry
    Delete { name: String },
}

pub fn run(overrides: &Overrides, subcmd: StoreSubcommand, json: bool) -> anyhow::Result<()> {
    let config = overrides.load_config()?;
    // Drives the API readiness probe; orchestrator calls stay on this thread.
    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let orch = context::orchestrator(config, rt.handle().clone())?;

    match subcmd {
        StoreSubcommand::Create { name } => create(&orch, &name, json),
        StoreSubcommand::List => list(&orch, json),
        StoreSubcommand::Show { name } => show(&orch, &name, json),
        StoreSubcommand::Refresh { name } => refresh(&orch, &name, json),
        StoreSubcommand::Delete { name } => delete(&orch, &name, json),
    }
}

fn create(orch: &Orchestrator, name: &str, json: bool) -> anyhow::Result<()> {
    let record = orch
        .create(name)
        .with_context(|| format!("failed to create store '{}'", name.trim()))?;

    if json {
        print_json(&record)?;
    } else {
        println!("Store {}: {}", record.id, record.status);
        println!("URL: {}", record.url);
    }
    Ok(())
}

fn list(orch: &Orchestrator, json: bool) -> anyhow::Result<()> {
    let records = orch.list().context("failed to list stores")?;

    if json {
        print_json(&records)?;
        return Ok(());
    }
    if records.is_empty() {
        println!("No stores.");
        return Ok(());
    }

    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.id.clone(),
                r.status.to_string(),
                r.engine.clone(),
                r.url.clone(),
                format_timestamp(r.created_at),
            ]
        })
        .collect();
    print_table(&["ID", "STATUS", "ENGINE", "URL", "CREATED"], rows);
    Ok(())
}

fn show(orch: &Orchestrator, name: &str, json: bool) -> anyhow::Result<()> {
    let record = orch.get(name)?;
    if json {
        print_json(&record)?;
    } else {
        print_record(&record);
    }
    Ok(())
}

fn print_record(r: &StoreRecord) {
    println!("Store:    {}", r.id);
    println!("Status:   {}", r.status);
    println!("Engine:   {}", r.engine);
    println!("URL:      {}", r.url);
    println!("Created:  {}", format_timestamp(r.created_at));
    if let Some(err) = &r.last_error {
        println!("Error:    {err}");
    }
}

fn refresh(orch: &Orchestrator, name: &str, json: bool) -> anyhow::Result<()> {
    let outcome: RefreshOutcome = orch.refresh(name)?;
    if json {
        print_json(&outcome)?;
    } else {
        println!("Store {}: {}", outcome.id, outcome.status);
        if let Some(w) = &outcome.warning {
            println!("warning: {w}");
        }
    }
    Ok(())
}

fn delete(orch: &Orchestrator, name: &str, json: bool) -> anyhow::Result<()> {
    let outcome: DeleteOutcome = orch
        .delete(name)
        .with_context(|| format!("failed to delete store '{name}'"))?;
    if json {
        print_json(&outcome)?;
    } else {
        println!("Deleted store {}", outcome.store_name);
        for w in &outcome.teardown_warnings {
            println!("warning: {w}");
        }
    }
    Ok(())
}
