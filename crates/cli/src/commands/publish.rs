//! Publish command - send one post to one platform

use anyhow::{Context, Result};
use crosspost_adapters::store::InMemoryStore;
use crosspost_domain::{
    AccountDirectory, CapabilityTable, PostRequest, PublishError, PublishPlan, PublishResult,
    usecases::PublishOrchestrator,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use crate::args::PublishArgs;
use crate::commands::{build_adapters, open_store};
use crate::config::AppConfig;

pub async fn execute(args: PublishArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let request = PostRequest::new(args.platform, args.message, args.media);

    // Planning needs neither adapters nor the database, so bad requests fail
    // before any account lookup.
    let planner = PublishOrchestrator::new(
        CapabilityTable::default(),
        vec![],
        Arc::new(InMemoryStore::new()),
    );
    let plan = match planner.plan(&request) {
        Ok(plan) => plan,
        Err(e) => exit_with(&e, args.json),
    };

    if args.dry_run {
        return print_plan(&plan, args.json);
    }

    let user_id = config.resolve_user(args.user)?;
    let store = open_store(&config).await?;

    let credential = store
        .credential(user_id, request.platform)
        .await
        .with_context(|| format!("Cannot publish to {}", request.platform))?;

    let orchestrator =
        PublishOrchestrator::new(CapabilityTable::default(), build_adapters(&config)?, store);

    tracing::info!(
        user_id = %user_id,
        platform = %request.platform,
        shape = %plan.shape(),
        media_count = request.media.len(),
        "Starting publish"
    );

    // Detached so an interrupted CLI does not abandon calls already in flight
    let outcome = orchestrator
        .spawn_publish(user_id, request, credential)
        .await
        .context("Publish task failed")?;

    match outcome {
        Ok(result) => {
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({ "ok": true, "result": result }))?
                );
            } else {
                print_result(&result);
            }
            Ok(())
        }
        Err(e) => exit_with(&e, args.json),
    }
}

/// Print the failure (and any partial result) and exit non-zero
fn exit_with(error: &PublishError, as_json: bool) -> ! {
    if as_json {
        let report = json!({
            "ok": false,
            "error": { "kind": error.kind(), "message": error.to_string() },
            "result": error.result(),
        });
        println!("{:#}", report);
    } else if let Some(result) = error.result() {
        print_result(result);
    }

    eprintln!("Error ({}): {}", error.kind(), error);
    if let PublishError::PartialFailure { failures, .. } = error {
        for failure in failures {
            eprintln!("  - {}", failure);
        }
    }

    std::process::exit(1);
}

fn print_plan(plan: &PublishPlan, as_json: bool) -> Result<()> {
    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "ok": true,
                "dry_run": true,
                "platform": plan.platform(),
                "shape": plan.shape(),
                "calls": plan.describe(),
            }))?
        );
    } else {
        println!("Dry run: {} ({})", plan.platform(), plan.shape());
        for (i, call) in plan.describe().iter().enumerate() {
            println!("  {}. {}", i + 1, call);
        }
    }
    Ok(())
}

fn print_result(result: &PublishResult) {
    println!(
        "Published to {}: {}",
        result.platform, result.platform_post_id
    );
    for media in &result.attached_media {
        println!("  + {}", media.location);
    }
    for failed in result.failed_items() {
        println!(
            "  ! {}: {}",
            failed.media_ref.location,
            failed.error.as_deref().unwrap_or("failed")
        );
    }
}
