//! Gate for experimental flags.
//!
//! Read once from `SEAL_EXPERIMENTAL` at startup and passed down, so commands
//! never consult the environment themselves.

use anyhow::bail;

/// Environment variable enabling experimental features.
pub const EXPERIMENTAL_ENV: &str = "SEAL_EXPERIMENTAL";

const ENABLED: &str = "1";

/// Printed to stderr whenever an experimental feature is used.
pub const EXPERIMENTAL_WARNING: &str = "Warning: This feature is experimental and may not be fully tested or completed and may be deprecated. Report any issues to \"https://github.com/seal-dev/seal\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Experimental {
    enabled: bool,
}

impl Experimental {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var(EXPERIMENTAL_ENV).ok().as_deref() == Some(ENABLED))
    }

    pub fn is_disabled(&self) -> bool {
        !self.enabled
    }

    /// Check the experimental flags that were set on `command_path`.
    ///
    /// `changed` holds flag names without dashes. Returns the warning to print
    /// when an experimental flag is used and the gate is open.
    pub fn check_flags(
        &self,
        command_path: &str,
        changed: &[&str],
    ) -> anyhow::Result<Option<&'static str>> {
        if changed.is_empty() {
            return Ok(None);
        }
        if self.is_disabled() {
            let flags: Vec<String> = changed.iter().map(|f| format!("--{f}")).collect();
            bail!(
                "flag(s) {} in \"{}\" is experimental and not enabled by default. To use, please set {}={} environment variable",
                flags.join(","),
                command_path,
                EXPERIMENTAL_ENV,
                ENABLED
            );
        }
        Ok(Some(EXPERIMENTAL_WARNING))
    }

    /// Hide experimental args of `subcommand` from help when the gate is closed.
    pub fn hide_flags(&self, command: clap::Command, subcommand: &str, arg_ids: &[&str]) -> clap::Command {
        if !self.is_disabled() {
            return command;
        }
        command.mut_subcommand(subcommand, |sub| {
            arg_ids
                .iter()
                .fold(sub, |sub, id| sub.mut_arg(*id, |arg| arg.hide(true)))
        })
    }
}
