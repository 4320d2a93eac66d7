//! Analytics command - engagement metrics of a published post

use anyhow::{Context, Result};
use crosspost_domain::{AccountDirectory, InsightsSource, Platform, PostHistory};
use std::path::PathBuf;

use crate::args::AnalyticsArgs;
use crate::commands::{build_facebook, open_store};
use crate::config::AppConfig;

pub async fn execute(args: AnalyticsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let store = open_store(&config).await?;

    let post = store
        .get_post(args.post_id)
        .await
        .context("Failed to load post")?
        .with_context(|| format!("Post not found: {}", args.post_id))?;

    if post.platform != Platform::Facebook {
        anyhow::bail!(
            "Analytics are only available for Facebook posts (post {} is on {})",
            post.id,
            post.platform
        );
    }

    let credential = store
        .credential(post.user_id, Platform::Facebook)
        .await
        .context("Cannot fetch analytics")?;

    let insights = build_facebook(&config)?
        .post_insights(&post.platform_post_id, &credential)
        .await
        .context("Failed to fetch post insights")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&insights)?);
    } else if insights.is_empty() {
        println!("No metrics reported for {}", post.platform_post_id);
    } else {
        println!("Insights for {}:", post.platform_post_id);
        for (metric, value) in &insights {
            println!("  {:<32} {}", metric, value);
        }
    }

    Ok(())
}
