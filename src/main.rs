use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use eco_untung::{chat, constants, rewards, web_server, GeminiBackend, GeminiConfig, ModelClient};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// API key for the hosted model.
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Model used for classification and chat.
    #[arg(long, global = true, env = "GEMINI_MODEL")]
    model: Option<String>,
    /// Base URL of the hosted model API.
    #[arg(long, global = true, env = "GEMINI_BASE_URL")]
    base_url: Option<String>,
    /// Request timeout in seconds.
    #[arg(long, global = true, env = "ECO_REQUEST_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the mobile web app.
    Serve {
        #[arg(long, default_value_t = 8080, help = "Port for the web server.")]
        port: u16,
        #[arg(long, default_value = "templates", help = "Directory holding index.html.")]
        templates: PathBuf,
        #[arg(long, default_value = "static", help = "Directory served under /static.")]
        static_dir: PathBuf,
    },
    /// Classify a photo of a waste item.
    Scan {
        /// Path to the image file.
        image: PathBuf,
    },
    /// Chat with EcoBot in the terminal.
    Chat,
    /// List the rewards points can be traded for.
    Rewards,
}

impl Cli {
    fn gemini_config(&self) -> GeminiConfig {
        let mut config = GeminiConfig::from_env();
        if let Some(key) = &self.api_key {
            config.api_key = key.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }

    fn model_client(&self) -> Result<ModelClient> {
        let backend = GeminiBackend::new(self.gemini_config()).context("Failed to set up the hosted model client")?;
        Ok(ModelClient::new(Arc::new(backend)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for environment variables like API keys)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g., RUST_LOG=info,eco_untung=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("Eco Untung starting with command: {:?}", cli.command);

    match &cli.command {
        Commands::Serve {
            port,
            templates,
            static_dir,
        } => {
            let client = cli.model_client()?;
            let state = web_server::ServerState::new(client, templates.clone());

            let port = *port;
            let static_dir = static_dir.clone();
            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(port, state, static_dir).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, initiating shutdown...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                info!("Aborting web server task...");
                web_server_handle.abort();
            }
            info!("Shutdown complete.");
        }
        Commands::Scan { image } => {
            let bytes = tokio::fs::read(image)
                .await
                .with_context(|| format!("Failed to read image {}", image.display()))?;
            let client = cli.model_client()?;
            let result = client
                .classify(&bytes)
                .await
                .context("Gagal menganalisis gambar. Pastikan gambar jelas dan coba lagi.")?;

            println!("{} ({})", result.item_name, result.category);
            if let Some(confidence) = result.confidence {
                println!("Keyakinan: {:.0}%", confidence * 100.0);
            }
            println!("Potensi daur ulang: {}", result.recycling_potential);
            println!();
            println!("{}", result.explanation);
            println!();
            for (i, step) in result.disposal_advice.iter().enumerate() {
                println!("{}. {}", i + 1, step);
            }
            println!();
            println!("Klaim di aplikasi untuk +{} poin.", constants::CLAIM_REWARD);
        }
        Commands::Chat => {
            let client = cli.model_client()?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            chat::run_chat(&client, stdin, &mut stdout)
                .await
                .context("Chat session failed")?;
        }
        Commands::Rewards => {
            for item in rewards::catalog() {
                let status = if item.is_available { "" } else { " (habis)" };
                println!(
                    "{:>2}. {} {} - {} · {} Poin{}",
                    item.id, item.glyph, item.name, item.vendor_name, item.cost_in_points, status
                );
            }
        }
    }

    Ok(())
}
