//! Runtime limits for the restart supervisor.
//!
//! These settings bound how long a delay loop waits for an outgoing task
//! to quiesce. They are process-wide, optional, and validated strictly
//! when loaded from the environment.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::service::Service;

const ENV_QUIESCE_TIMEOUT_SECS: &str = "FLOTILLA_RESTART_QUIESCE_TIMEOUT_SECS";
const ENV_GRACE_SLACK_SECS: &str = "FLOTILLA_RESTART_GRACE_SLACK_SECS";

const DEFAULT_QUIESCE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_GRACE_SLACK_SECS: u64 = 5;

/// Timeout configuration for delay loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// How long to wait for the outgoing task to stop when its service
    /// carries no container spec.
    pub default_quiesce_timeout: Duration,
    /// Added to a container's stop-grace-period to absorb agent-to-
    /// manager latency.
    pub grace_period_slack: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            default_quiesce_timeout: Duration::from_secs(DEFAULT_QUIESCE_TIMEOUT_SECS),
            grace_period_slack: Duration::from_secs(DEFAULT_GRACE_SLACK_SECS),
        }
    }
}

impl SupervisorConfig {
    /// Loads the config from process environment with strict validation.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an environment value is not a
    /// positive integer number of seconds.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Loads the config with a custom environment source.
    ///
    /// Test-friendly entry point that accepts a key lookup function.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an environment value is not a
    /// positive integer number of seconds.
    pub fn from_env_with<F>(get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            default_quiesce_timeout: Duration::from_secs(parse_positive_u64_env(
                &get_env,
                ENV_QUIESCE_TIMEOUT_SECS,
                DEFAULT_QUIESCE_TIMEOUT_SECS,
            )?),
            grace_period_slack: Duration::from_secs(parse_positive_u64_env(
                &get_env,
                ENV_GRACE_SLACK_SECS,
                DEFAULT_GRACE_SLACK_SECS,
            )?),
        })
    }

    /// The quiescence timeout for a restart of one of `service`'s tasks:
    /// the container's stop-grace-period plus the configured slack, or
    /// the default when the service carries no container spec.
    #[must_use]
    pub fn quiesce_timeout(&self, service: &Service) -> Duration {
        service.spec.container.as_ref().map_or(
            self.default_quiesce_timeout,
            |container| container.stop_grace_period + self.grace_period_slack,
        )
    }
}

fn parse_positive_u64_env<F>(get_env: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = get_env(key) else {
        return Ok(default);
    };

    let parsed = raw.parse::<u64>().map_err(|_| {
        Error::configuration(format!("{key} must be a positive integer, got '{raw}'"))
    })?;
    if parsed == 0 {
        return Err(Error::configuration(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(parsed)
}
