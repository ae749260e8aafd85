use std::fs;
use std::path::Path;

use crate::config::FrontendConfig;
use crate::error::{FrontendError, Result};
use crate::pattern::Pattern;

/// Load and validate a frontend configuration from a TOML file.
pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<FrontendConfig> {
    let txt = fs::read_to_string(p)
        .map_err(|e| FrontendError::Config(format!("failed to read config file: {e}")))?;
    let cfg: FrontendConfig = toml::from_str(&txt)
        .map_err(|e| FrontendError::Config(format!("failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &FrontendConfig) -> Result<()> {
    if cfg.name.is_empty() {
        return Err(FrontendError::Config("frontend name must not be empty".to_string()));
    }
    if cfg.default_backend.is_empty() {
        return Err(FrontendError::Config("default_backend must not be empty".to_string()));
    }
    for route in &cfg.routes {
        if route.backend.is_empty() {
            return Err(FrontendError::Config("route backend must not be empty".to_string()));
        }
        Pattern::compile(&route.host)?;
        Pattern::compile(&route.path)?;
        for restriction in &route.restrictions {
            if let Some(path) = &restriction.path {
                Pattern::compile(path)?;
            }
        }
    }
    Ok(())
}
