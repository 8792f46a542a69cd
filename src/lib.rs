pub mod api_server;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod env_manager;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod roster;
pub mod search;
pub mod services;
pub mod storage;
pub mod validation;

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;

use config::StorageBackend;
use storage::{MeetupStore, MemoryStore, RestStore};

pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use chrono::Local;
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

pub fn build_store(config: &Config) -> Result<Arc<dyn MeetupStore>> {
    let store: Arc<dyn MeetupStore> = match config.storage.backend {
        StorageBackend::Rest => {
            info!("Using REST storage at {}", config.storage.base_url);
            Arc::new(
                RestStore::new(&config.storage.base_url, config.storage.timeout())
                    .context("Failed to set up REST storage")?,
            )
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

pub fn build_service(config: &Config) -> Result<ClubService> {
    let projector = config
        .calendar
        .projector()
        .context("Invalid calendar configuration")?;
    Ok(ClubService::new(build_store(config)?, projector)
        .with_roster_max_age(config.storage.roster_max_age()))
}

// Re-export commonly used types
pub use config::Config;
pub use error::{ClubError, ClubResult};
pub use services::ClubService;
