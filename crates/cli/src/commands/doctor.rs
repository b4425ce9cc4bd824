//! Doctor command - validate configuration and show status

use anyhow::Result;
use crosscast_adapters::{farcaster::NeynarCastPublisher, state::SqliteSyncStore};
use crosscast_domain::{SyncStore, User};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::args::DoctorArgs;
use crate::commands::load_api_key;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    store: CheckResult,
    twitter: CheckResult,
    farcaster: CheckResult,
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
        store: CheckResult::error("Not checked"),
        twitter: CheckResult::error("Not checked"),
        farcaster: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

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
        let (store, users) = check_store(&config.general.state_db_path).await;
        report.store = store;
        report.twitter = check_api_key(
            &config.twitter.api_key_env,
            format!("RapidAPI host: {}", config.twitter.rapidapi_host),
        );
        report.farcaster = if config.general.dry_run {
            CheckResult::ok("Dry run enabled; casts are not published")
        } else {
            let context = format!("Neynar: {}", config.farcaster.base_url);
            match load_api_key(&config.farcaster.api_key_env, "farcaster") {
                Ok(api_key) => {
                    let publisher = NeynarCastPublisher::with_base_url(
                        api_key,
                        config.farcaster.base_url.clone(),
                        config.farcaster.max_cast_bytes,
                        Duration::from_secs(config.farcaster.timeout_secs),
                    );
                    check_signers(&publisher, &users, context).await
                }
                Err(_) => check_api_key(&config.farcaster.api_key_env, context),
            }
        };
    }

    let checks = [
        &report.config,
        &report.store,
        &report.twitter,
        &report.farcaster,
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

async fn check_store(path: &Path) -> (CheckResult, Vec<User>) {
    let store = match SqliteSyncStore::new(path).await {
        Ok(store) => store,
        Err(e) => {
            let result = CheckResult::error(format!(
                "Failed to open state database {}: {}",
                path.display(),
                e
            ));
            return (result, vec![]);
        }
    };

    match store.list_users().await {
        Ok(users) => {
            let enabled = users.iter().filter(|u| u.crosspost_enabled).count();
            let result = CheckResult::ok(format!(
                "{} users ({} enabled) in {}",
                users.len(),
                enabled,
                path.display()
            ))
            .with_details(serde_json::json!({
                "users": users.len(),
                "enabled": enabled,
            }));
            (result, users)
        }
        Err(e) => (
            CheckResult::error(format!("Failed to read users: {}", e)),
            vec![],
        ),
    }
}

/// Ask Neynar whether each enabled user's signer may still publish
async fn check_signers(
    publisher: &NeynarCastPublisher,
    users: &[User],
    context: String,
) -> CheckResult {
    let mut approved = 0;
    let mut problems = Vec::new();

    for user in users.iter().filter(|u| u.crosspost_enabled && u.has_farcaster()) {
        match publisher.signer_status(&user.farcaster_signer_uuid).await {
            Ok(signer) if signer.status.can_publish() => approved += 1,
            Ok(signer) => problems.push(serde_json::json!({
                "user_id": user.id,
                "handle": user.handle(),
                "status": format!("{:?}", signer.status),
            })),
            Err(e) => problems.push(serde_json::json!({
                "user_id": user.id,
                "handle": user.handle(),
                "error": e.to_string(),
            })),
        }
    }

    if problems.is_empty() {
        CheckResult::ok(format!("{}, {} signers approved", context, approved))
    } else {
        CheckResult::warn(format!(
            "{}, {} of {} signers cannot publish",
            context,
            problems.len(),
            approved + problems.len()
        ))
        .with_details(serde_json::json!({ "signers": problems }))
    }
}

fn check_api_key(env_var: &str, context: String) -> CheckResult {
    if env_var.trim().is_empty() {
        return CheckResult::error(format!("{}, no API key env var configured", context));
    }

    // Never print the value itself
    match std::env::var(env_var) {
        Ok(val) if !val.trim().is_empty() => {
            CheckResult::ok(format!("{}, API key: {} (set)", context, env_var))
        }
        _ => CheckResult::warn(format!("{}, API key: {} (not set)", context, env_var)),
    }
}

fn print_report(report: &DoctorReport) {
    println!("crosscast Doctor Report");
    println!("=======================");
    println!();

    print_check("Config", &report.config);
    print_check("State store", &report.store);
    print_check("Twitter", &report.twitter);
    print_check("Farcaster", &report.farcaster);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall == "ok" {
        println!();
        println!("Ready to run! Try: crosscast run --dry-run --once");
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
