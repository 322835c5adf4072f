//! Platform preflight command — `leadgate check`.
//!
//! Dials the platform with the configured credentials and reports
//! whether the gateway would be able to provision leads: default
//! workspace, entry column, automation webhook, token requirement.

use std::time::Duration;

use anyhow::{Context, Result};

use leadgate::config::AppConfig;
use leadgate::platform::PlatformClient;
use leadgate::store::{CrmStore, PlatformStore};

pub async fn cmd_check() -> Result<()> {
    let config = AppConfig::from_env()?;
    println!("Platform URL:       {}", config.platform_url);

    let client = PlatformClient::new(
        &config.platform_url,
        &config.platform_service_key,
        Duration::from_secs(config.platform_timeout_secs),
    )
    .context("Failed to build platform client")?;
    let store = PlatformStore::new(client);

    let workspace = store
        .default_workspace()
        .await
        .context("Failed to reach the platform")?
        .context("No workspace found; create one before pointing webhooks here")?;
    println!("Default workspace:  {} ({})", workspace.name, workspace.id);

    match store.entry_column(workspace.id).await? {
        Some(column) => {
            println!("Entry column:       {} (position {})", column.title, column.position)
        }
        None => println!("Entry column:       none (new leads will not land on a board column)"),
    }

    match workspace.automation_url.as_deref() {
        Some(url) => println!("Automation webhook: {}", url),
        None => println!("Automation webhook: not configured"),
    }

    if config.webhook_token.is_some() {
        println!("Webhook token:      required");
    } else {
        println!("Webhook token:      not set, endpoints are open");
    }

    println!("Platform reachable, gateway is ready.");
    Ok(())
}
