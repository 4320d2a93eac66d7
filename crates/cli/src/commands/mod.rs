//! Subcommand implementations and the wiring they share

pub mod accounts;
pub mod analytics;
pub mod config;
pub mod doctor;
pub mod posts;
pub mod publish;

use anyhow::{Context, Result};
use crosspost_adapters::{facebook::FacebookAdapter, store::SqliteStore, telegram::TelegramAdapter};
use crosspost_domain::PlatformAdapter;
use secrecy::SecretString;
use std::sync::Arc;

use crate::config::AppConfig;

pub(crate) async fn open_store(config: &AppConfig) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::new(&config.general.database_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open database: {}",
                config.general.database_path.display()
            )
        })?;
    Ok(Arc::new(store))
}

/// Read the bot token from the configured environment variable
pub(crate) fn telegram_bot_token(config: &AppConfig) -> Result<SecretString> {
    let env_var = &config.telegram.bot_token_env;
    match std::env::var(env_var) {
        Ok(token) if !token.is_empty() => Ok(SecretString::new(token.into())),
        _ => anyhow::bail!("Telegram bot token not set: export {}", env_var),
    }
}

pub(crate) fn build_facebook(config: &AppConfig) -> Result<FacebookAdapter> {
    FacebookAdapter::with_base_url(
        &config.facebook.graph_base_url,
        &config.facebook.api_version,
        config.request_timeout(),
    )
    .context("Failed to build Facebook HTTP client")
}

pub(crate) fn build_telegram(config: &AppConfig) -> Result<TelegramAdapter> {
    TelegramAdapter::with_base_url(
        &config.telegram.api_base_url,
        telegram_bot_token(config)?,
        config.request_timeout(),
    )
    .context("Failed to build Telegram HTTP client")
}

/// One adapter per enabled platform that has what it needs to run
pub(crate) fn build_adapters(config: &AppConfig) -> Result<Vec<Arc<dyn PlatformAdapter>>> {
    let mut adapters: Vec<Arc<dyn PlatformAdapter>> = Vec::new();

    if config.facebook.enabled {
        adapters.push(Arc::new(build_facebook(config)?));
    }

    if config.telegram.enabled {
        match build_telegram(config) {
            Ok(adapter) => adapters.push(Arc::new(adapter)),
            Err(e) => tracing::warn!(error = %e, "Telegram adapter unavailable"),
        }
    }

    Ok(adapters)
}
