//! Posts command - inspect published posts

use anyhow::{Context, Result};
use crosspost_domain::{Post, PostHistory};
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;

use crate::args::{PostsArgs, PostsCommands};
use crate::commands::open_store;
use crate::config::AppConfig;

const PREVIEW_CHARS: usize = 40;

pub async fn execute(args: PostsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let store = open_store(&config).await?;

    match args.command {
        PostsCommands::List {
            platform,
            user,
            json,
        } => {
            let user_id = config.resolve_user(user)?;
            let posts = store
                .list_posts(user_id, platform)
                .await
                .context("Failed to list posts")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&posts)?);
            } else if posts.is_empty() {
                println!("No posts yet");
            } else {
                for post in &posts {
                    print_row(post);
                }
            }
            Ok(())
        }
        PostsCommands::Show { id, json } => {
            let post = store
                .get_post(id)
                .await
                .context("Failed to load post")?
                .with_context(|| format!("Post not found: {}", id))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&post)?);
            } else {
                print_post(&post);
            }
            Ok(())
        }
    }
}

fn timestamp(post: &Post) -> String {
    post.posted_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| "-".to_string())
}

fn preview(message: &str) -> String {
    let line = message.lines().next().unwrap_or("");
    if line.chars().count() > PREVIEW_CHARS {
        let cut: String = line.chars().take(PREVIEW_CHARS - 1).collect();
        format!("{}…", cut)
    } else {
        line.to_string()
    }
}

fn print_row(post: &Post) {
    println!(
        "{}  {:<9} {:<20} {}  media={}  {}",
        post.id,
        post.platform,
        post.platform_post_id,
        timestamp(post),
        post.media_urls.len(),
        preview(&post.message)
    );
}

fn print_post(post: &Post) {
    println!("Post {}", post.id);
    println!("  Platform:    {}", post.platform);
    println!("  Remote id:   {}", post.platform_post_id);
    println!("  Status:      {}", post.status.as_str());
    println!("  Posted at:   {}", timestamp(post));
    if !post.message.is_empty() {
        println!("  Message:     {}", post.message);
    }
    for url in &post.media_urls {
        println!("  Media:       {}", url);
    }
}
