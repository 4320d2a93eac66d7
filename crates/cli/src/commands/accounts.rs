//! Accounts command - connect and list social accounts

use anyhow::{Context, Result};
use crosspost_domain::{AccountCredential, AccountDirectory, Platform, SocialAccount};
use secrecy::SecretString;
use serde::Serialize;
use std::path::PathBuf;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::args::{AccountsArgs, AccountsCommands};
use crate::commands::{build_facebook, build_telegram, open_store};
use crate::config::AppConfig;

/// Account as shown to the user; the token never leaves the store
#[derive(Debug, Serialize)]
struct AccountView {
    platform: Platform,
    platform_account_id: String,
    display_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    connected_at: OffsetDateTime,
}

impl From<&SocialAccount> for AccountView {
    fn from(account: &SocialAccount) -> Self {
        Self {
            platform: account.platform,
            platform_account_id: account.platform_account_id.clone(),
            display_name: account.display_name.clone(),
            connected_at: account.connected_at,
        }
    }
}

pub async fn execute(args: AccountsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    match args.command {
        AccountsCommands::Add {
            platform,
            account_id,
            token_env,
            name,
            user,
            verify,
        } => {
            let user_id = config.resolve_user(user)?;
            let access_token = read_token(platform, token_env.as_deref())?;
            let credential = AccountCredential::new(access_token.clone(), account_id.clone());

            let display_name = match (name, verify) {
                (Some(name), _) => Some(name),
                (None, true) => Some(verify_account(&config, platform, &credential).await?),
                (None, false) => None,
            };

            let account = SocialAccount {
                user_id,
                platform,
                platform_account_id: account_id,
                access_token,
                display_name,
                connected_at: OffsetDateTime::now_utc(),
            };

            let store = open_store(&config).await?;
            store
                .connect(&account)
                .await
                .context("Failed to save account")?;

            tracing::info!(
                user_id = %user_id,
                platform = %platform,
                account = %account.platform_account_id,
                "Account connected"
            );
            println!(
                "Connected {} account {}{}",
                platform,
                account.platform_account_id,
                account
                    .display_name
                    .as_deref()
                    .map(|n| format!(" ({})", n))
                    .unwrap_or_default()
            );
            Ok(())
        }
        AccountsCommands::List { user, json } => {
            let user_id = config.resolve_user(user)?;
            let store = open_store(&config).await?;
            let accounts = store
                .list_accounts(user_id)
                .await
                .context("Failed to list accounts")?;
            print_accounts(user_id, &accounts, json)
        }
    }
}

/// Facebook needs a page token; Telegram posts with the bot token from config
fn read_token(platform: Platform, token_env: Option<&str>) -> Result<SecretString> {
    let env_var = match (platform, token_env) {
        (_, Some(env_var)) => env_var,
        (Platform::Facebook, None) => "FACEBOOK_PAGE_TOKEN",
        (Platform::Telegram, None) => return Ok(SecretString::new("".into())),
    };

    match std::env::var(env_var) {
        Ok(token) if !token.is_empty() => Ok(SecretString::new(token.into())),
        _ => anyhow::bail!("Access token not set: export {}", env_var),
    }
}

async fn verify_account(
    config: &AppConfig,
    platform: Platform,
    credential: &AccountCredential,
) -> Result<String> {
    let name = match platform {
        Platform::Facebook => build_facebook(config)?
            .page_name(credential)
            .await
            .context("Facebook page verification failed")?,
        Platform::Telegram => {
            let chat = build_telegram(config)?
                .get_chat(&credential.platform_account_id)
                .await
                .context("Telegram chat verification failed")?;
            chat.display_name()
                .unwrap_or_else(|| credential.platform_account_id.clone())
        }
    };

    tracing::debug!(platform = %platform, name = %name, "Account verified");
    Ok(name)
}

fn print_accounts(user_id: Uuid, accounts: &[SocialAccount], json: bool) -> Result<()> {
    let views: Vec<AccountView> = accounts.iter().map(AccountView::from).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if views.is_empty() {
        println!("No accounts connected for user {}", user_id);
        return Ok(());
    }

    println!("Accounts for user {}:", user_id);
    for view in &views {
        let connected = view
            .connected_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| "-".to_string());
        println!(
            "  {:<9} {:<24} {:<24} {}",
            view.platform,
            view.platform_account_id,
            view.display_name.as_deref().unwrap_or("-"),
            connected
        );
    }
    Ok(())
}
