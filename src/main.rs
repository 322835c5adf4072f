use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "leadgate")]
#[command(version, about = "Webhook gateway that turns checkout events into CRM leads")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the webhook gateway server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3333")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
    },
    /// Verify platform connectivity and workspace setup
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("leadgate=info,tower_http=warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { port, bind } => cmd::cmd_serve(port, bind).await?,
        Commands::Check => cmd::cmd_check().await?,
    }
    Ok(())
}
