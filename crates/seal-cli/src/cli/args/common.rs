//! Shared argument types used across multiple commands.

use seal_registry::RegistryConfig;

/// Log verbosity flags.
#[derive(clap::Args, Clone, Debug, Default)]
pub struct LoggingFlags {
    /// Debug mode
    #[arg(long, short = 'd', conflicts_with = "verbose")]
    pub debug: bool,

    /// Verbose mode
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl LoggingFlags {
    /// Default log filter for these flags (`RUST_LOG` still overrides).
    pub fn filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }
}

/// Registry access flags.
#[derive(clap::Args, Clone, Debug, Default)]
pub struct SecureFlags {
    /// Username for registry operations
    #[arg(long, short = 'u', env = "SEAL_USERNAME")]
    pub username: Option<String>,

    /// Password for registry operations
    #[arg(long, short = 'p', env = "SEAL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Use HTTP protocol while connecting to registries. Should be used only for testing
    #[arg(long)]
    pub insecure_registry: bool,
}

impl SecureFlags {
    /// Reject a username without a password or the reverse.
    pub fn validate(&self) -> anyhow::Result<()> {
        match (&self.username, &self.password) {
            (Some(_), None) => anyhow::bail!("--password is required when --username is set"),
            (None, Some(_)) => anyhow::bail!("--username is required when --password is set"),
            _ => Ok(()),
        }
    }

    /// Registry client configuration: environment first, flags on top.
    pub fn registry_config(&self) -> RegistryConfig {
        let mut config = RegistryConfig::from_env();
        if self.insecure_registry {
            config = config.with_plain_http(true);
        }
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            config = config.with_credentials(username, password);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter() {
        assert_eq!(LoggingFlags::default().filter(), "warn");
        let verbose = LoggingFlags {
            verbose: true,
            ..Default::default()
        };
        assert_eq!(verbose.filter(), "info");
        let debug = LoggingFlags {
            debug: true,
            ..Default::default()
        };
        assert_eq!(debug.filter(), "debug");
    }

    #[test]
    fn test_registry_config_from_flags() {
        let flags = SecureFlags {
            username: Some("alice".into()),
            password: Some("secret".into()),
            insecure_registry: true,
        };
        let config = flags.registry_config();
        assert!(config.plain_http);
        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(config.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_half_credentials_rejected() {
        let username_only = SecureFlags {
            username: Some("alice".into()),
            ..Default::default()
        };
        assert_eq!(
            username_only.validate().unwrap_err().to_string(),
            "--password is required when --username is set"
        );

        let password_only = SecureFlags {
            password: Some("secret".into()),
            ..Default::default()
        };
        assert_eq!(
            password_only.validate().unwrap_err().to_string(),
            "--username is required when --password is set"
        );

        assert!(SecureFlags::default().validate().is_ok());
    }
}
