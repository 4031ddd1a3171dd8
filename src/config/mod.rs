pub mod settings;

pub use settings::Config;

use crate::error::BotError;
use std::sync::Arc;

/// Loads `.env` (if present), reads the environment and validates the result.
pub fn load_config() -> Result<Arc<Config>, BotError> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    config.validate()?;
    config.validate_and_log();

    Ok(Arc::new(config))
}
