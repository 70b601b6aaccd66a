//! Home Assistant Rust Server
//!
//! Loads the config entries from a config directory, sets them up and runs
//! the KidsChores wizard over stdin/stdout. Each stdin line is one JSON
//! submission (an empty line submits nothing) and each flow result is printed
//! as one JSON line. The config flow runs when no KidsChores entry exists yet,
//! the options flow otherwise.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ha_auth::UserStore;
use ha_config_entries::{ConfigEntries, FlowHandler, FlowManager, FlowResult, Storage};
use kidschores::{ConfigFlow, OptionsFlow, DOMAIN};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// The central Home Assistant instance
pub struct HomeAssistant {
    /// Config entries backed by `.storage/core.config_entries`
    pub entries: Arc<ConfigEntries>,
    pub users: Arc<UserStore>,
    pub flows: FlowManager,
}

impl HomeAssistant {
    /// Load and set up every stored config entry
    pub async fn start(config_dir: PathBuf) -> Result<Self> {
        let storage = Arc::new(Storage::new(&config_dir));
        let entries = Arc::new(ConfigEntries::new(storage));
        entries
            .load()
            .await
            .with_context(|| format!("loading config entries from {}", config_dir.display()))?;

        kidschores::register(&entries);
        for result in entries.setup_all().await {
            if let Err(e) = result {
                warn!("Config entry setup failed: {}", e);
            }
        }

        Ok(Self {
            entries,
            users: Arc::new(UserStore::new_onboarded()),
            flows: FlowManager::new(),
        })
    }

    /// Options flow of the existing entry, or the config flow creating it
    pub async fn start_flow(&self) -> Result<FlowResult> {
        let flow: Box<dyn FlowHandler> = match self.entries.get_by_domain(DOMAIN).first() {
            Some(entry) => {
                info!("Opening options for entry {}", entry.entry_id);
                Box::new(OptionsFlow::new(
                    entry.entry_id.clone(),
                    self.entries.clone(),
                    self.users.clone(),
                ))
            }
            None => Box::new(ConfigFlow::new(self.entries.clone(), self.users.clone())),
        };
        Ok(self.flows.start(flow).await?)
    }
}

async fn print_result(result: &FlowResult) -> Result<()> {
    let mut line = serde_json::to_vec(result)?;
    line.push(b'\n');
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&line).await?;
    stdout.flush().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config"));
    info!("Starting Home Assistant (Rust) in {}", config_dir.display());

    let hass = HomeAssistant::start(config_dir).await?;
    info!("Home Assistant initialized with {} config entries", hass.entries.len());

    let mut result = hass.start_flow().await?;
    print_result(&result).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while result.is_form() {
        let Some(line) = lines.next_line().await? else {
            info!("Input closed, leaving flow {}", result.flow_id);
            break;
        };
        let user_input = match line.trim() {
            "" => None,
            text => match serde_json::from_str(text) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Ignoring malformed input: {}", e);
                    continue;
                }
            },
        };

        match hass.flows.progress(&result.flow_id, user_input).await {
            Ok(next) => {
                result = next;
                print_result(&result).await?;
            }
            // The flow stays at its current form
            Err(e) => warn!("Step failed: {:#}", anyhow::Error::from(e)),
        }
    }

    info!("Shutting down...");
    Ok(())
}
