//! Doctor command - validate configuration and show status

use anyhow::Result;
use crosspost_adapters::store::SqliteStore;
use crosspost_domain::{AccountDirectory, Platform, SocialAccount};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use crate::args::DoctorArgs;
use crate::commands::telegram_bot_token;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    database: CheckResult,
    user: CheckResult,
    facebook: CheckResult,
    telegram: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        database: CheckResult::error("Not checked"),
        user: CheckResult::error("Not checked"),
        facebook: CheckResult::error("Not checked"),
        telegram: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    // Check config
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        let store = match SqliteStore::new(&config.general.database_path).await {
            Ok(store) => match store.ping().await {
                Ok(()) => {
                    report.database = CheckResult::ok(format!(
                        "Database: {}",
                        config.general.database_path.display()
                    ));
                    Some(store)
                }
                Err(e) => {
                    report.database = CheckResult::error(format!("Database query failed: {}", e));
                    None
                }
            },
            Err(e) => {
                report.database = CheckResult::error(format!("Failed to open database: {}", e));
                None
            }
        };

        let accounts = match config.general.user_id {
            Some(user_id) => {
                report.user = CheckResult::ok(format!("User: {}", user_id));
                match &store {
                    Some(store) => connected_accounts(store, user_id, &mut report.database).await,
                    None => None,
                }
            }
            None => {
                report.user =
                    CheckResult::warn("No general.user_id configured; pass --user to commands");
                Some(vec![])
            }
        };

        report.facebook = check_facebook(config, accounts.as_deref());
        report.telegram = check_telegram(config, accounts.as_deref());
    }

    // Determine overall status
    let checks = [
        &report.config,
        &report.database,
        &report.user,
        &report.facebook,
        &report.telegram,
    ];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    // Output report
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

/// Accounts of the user, or `None` with the database check marked failed
async fn connected_accounts(
    directory: &dyn AccountDirectory,
    user_id: Uuid,
    database: &mut CheckResult,
) -> Option<Vec<SocialAccount>> {
    match directory.list_accounts(user_id).await {
        Ok(accounts) => Some(accounts),
        Err(e) => {
            *database = CheckResult::error(format!("Failed to list accounts: {}", e));
            None
        }
    }
}

fn connected(accounts: &[SocialAccount], platform: Platform) -> Option<&SocialAccount> {
    accounts.iter().find(|a| a.platform == platform)
}

fn check_facebook(config: &AppConfig, accounts: Option<&[SocialAccount]>) -> CheckResult {
    if !config.facebook.enabled {
        return CheckResult::ok("Facebook disabled");
    }

    if config.facebook.graph_base_url.trim().is_empty() {
        return CheckResult::error("facebook.graph_base_url is empty");
    }

    let details = serde_json::json!({
        "graph_base_url": config.facebook.graph_base_url,
        "api_version": config.facebook.api_version,
    });

    let Some(accounts) = accounts else {
        return CheckResult::warn("Connected page unknown: accounts unavailable")
            .with_details(details);
    };

    match connected(accounts, Platform::Facebook) {
        Some(account) => CheckResult::ok(format!(
            "Page {} connected, API {}",
            account.platform_account_id, config.facebook.api_version
        ))
        .with_details(details),
        None => CheckResult::warn("No Facebook page connected").with_details(details),
    }
}

fn check_telegram(config: &AppConfig, accounts: Option<&[SocialAccount]>) -> CheckResult {
    if !config.telegram.enabled {
        return CheckResult::ok("Telegram disabled");
    }

    let env_var = &config.telegram.bot_token_env;
    if env_var.is_empty() {
        return CheckResult::error("No bot token env var configured");
    }

    let token_state = if telegram_bot_token(config).is_ok() {
        "set"
    } else {
        "not set"
    };
    let chat = match accounts {
        Some(accounts) => connected(accounts, Platform::Telegram)
            .map(|a| a.platform_account_id.as_str())
            .unwrap_or("none"),
        None => "unknown",
    };

    let message = format!(
        "Bot token: {} ({}), Chat: {}",
        env_var, token_state, chat
    );

    if token_state == "set" && chat != "none" && chat != "unknown" {
        CheckResult::ok(message)
    } else {
        CheckResult::warn(message)
    }
}

fn print_report(report: &DoctorReport) {
    println!("crosspost Doctor Report");
    println!("=======================");
    println!();

    print_check("Config", &report.config);
    print_check("Database", &report.database);
    print_check("User", &report.user);
    print_check("Facebook", &report.facebook);
    print_check("Telegram", &report.telegram);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall == "ok" {
        println!();
        println!("Ready! Try: crosspost publish --platform telegram --message hello --dry-run");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
