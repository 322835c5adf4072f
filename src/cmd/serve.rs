//! Webhook gateway server command — `leadgate serve`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use leadgate::automation::WebhookNotifier;
use leadgate::config::AppConfig;
use leadgate::pipeline::LeadPipeline;
use leadgate::platform::PlatformClient;
use leadgate::server::api::AppState;
use leadgate::server::{self, ServerConfig};
use leadgate::store::PlatformStore;

pub async fn cmd_serve(port: u16, bind: String) -> Result<()> {
    let config = AppConfig::from_env()?;

    let client = PlatformClient::new(
        &config.platform_url,
        &config.platform_service_key,
        Duration::from_secs(config.platform_timeout_secs),
    )
    .context("Failed to build platform client")?;
    let store = Arc::new(PlatformStore::new(client));
    let notifier = Arc::new(
        WebhookNotifier::new(Duration::from_secs(config.automation_timeout_secs))
            .context("Failed to build automation client")?,
    );
    let pipeline = LeadPipeline::new(store, notifier, &config.default_country_code);

    let state = Arc::new(AppState {
        pipeline,
        webhook_token: config.webhook_token,
    });

    server::start_server(ServerConfig { port, bind }, state).await
}
