//! Verifier configuration directory layout.

use std::path::PathBuf;

use crate::error::{VerifyError, VerifyResult};

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "SEAL_CONFIG_DIR";

/// Trust policy file name inside the configuration directory.
pub const TRUST_POLICY_FILE: &str = "trustpolicy.json";

/// Trust store directory inside the configuration directory.
pub const TRUST_STORE_DIR: &str = "truststore";

/// Configuration directory: `$SEAL_CONFIG_DIR`, else `<user config dir>/seal`.
pub fn config_dir() -> VerifyResult<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join("seal"))
        .ok_or_else(|| VerifyError::Config {
            message: format!(
                "could not determine the user configuration directory; set {}",
                CONFIG_DIR_ENV
            ),
        })
}
