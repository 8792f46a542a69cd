use crate::config::{CONFIG_PATH_VAR, SERVER_URL_VAR};
use log::info;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

// Names of optional environment variables
pub const OPTIONAL_ENV_VARS: &[&str] = &["RUST_LOG", SERVER_URL_VAR, CONFIG_PATH_VAR];

pub fn load_env_file() -> io::Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => {
            info!("Loaded environment from {:?}", path);
            Ok(())
        }
        Err(e) => {
            info!("No .env file found or error loading it: {}", e);
            create_env_template(Path::new(".env"))
        }
    }
}

/// Write a commented-out template listing every variable the binary reads.
/// An existing file is left alone.
pub fn create_env_template(env_path: &Path) -> io::Result<()> {
    if env_path.exists() {
        return Ok(());
    }

    let mut file = File::create(env_path)?;
    for var in OPTIONAL_ENV_VARS {
        writeln!(file, "# {}=", var)?;
    }

    Ok(())
}
