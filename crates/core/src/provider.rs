//! Provider identifiers and execution profiles.
//!
//! A [`ProviderProfile`] captures everything the orchestrator needs to know
//! about a provider without branching on its identity: credit cost, polling
//! budget, image ceiling, and whether sources must be uploaded to a
//! fetchable URL first. Values here are defaults; the api crate may
//! override them from the environment.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;

/// The supported image-generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    /// Fast task-based provider; the platform default.
    Nano,
    /// Higher-quality, slower task-based provider.
    GptImage,
    /// Synchronous inline provider.
    Gemini,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Nano => "nano",
            ProviderId::GptImage => "gpt-image",
            ProviderId::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nano" => Ok(ProviderId::Nano),
            "gpt-image" => Ok(ProviderId::GptImage),
            "gemini" => Ok(ProviderId::Gemini),
            other => Err(CoreError::Validation(format!(
                "Unknown provider '{other}'. Must be one of: nano, gpt-image, gemini"
            ))),
        }
    }
}

/// How a provider executes work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Submit a task, then poll until a terminal state.
    Task,
    /// One blocking HTTP call returns the result inline.
    Sync,
}

/// Per-provider execution parameters consumed by the orchestrator and the
/// job client.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub id: ProviderId,
    pub execution: ExecutionMode,
    /// Credits consumed by one successful generation.
    pub credit_cost: i64,
    /// Delay between task polls. Unused for sync providers.
    pub poll_interval: Duration,
    /// Poll attempts before a synthetic timeout. Unused for sync providers.
    pub max_poll_attempts: u32,
    /// Largest number of source images a combine request may carry.
    pub max_combine_images: usize,
    /// Whether sources must be uploaded to fetchable URLs before the call.
    pub needs_remote_urls: bool,
}

impl ProviderProfile {
    /// Built-in defaults for a provider. Poll budgets reflect observed
    /// latency: roughly one minute for the fast provider, five for the
    /// slow one.
    pub fn defaults_for(id: ProviderId) -> Self {
        match id {
            ProviderId::Nano => Self {
                id,
                execution: ExecutionMode::Task,
                credit_cost: 1,
                poll_interval: Duration::from_secs(1),
                max_poll_attempts: 60,
                max_combine_images: 5,
                needs_remote_urls: true,
            },
            ProviderId::GptImage => Self {
                id,
                execution: ExecutionMode::Task,
                credit_cost: 2,
                poll_interval: Duration::from_secs(1),
                max_poll_attempts: 300,
                max_combine_images: 8,
                needs_remote_urls: true,
            },
            ProviderId::Gemini => Self {
                id,
                execution: ExecutionMode::Sync,
                credit_cost: 1,
                poll_interval: Duration::from_secs(1),
                max_poll_attempts: 0,
                max_combine_images: 3,
                needs_remote_urls: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_id_round_trips() {
        for id in [ProviderId::Nano, ProviderId::GptImage, ProviderId::Gemini] {
            assert_eq!(id.as_str().parse::<ProviderId>().unwrap(), id);
        }
    }

    #[test]
    fn unknown_provider_rejected() {
        assert!("dalle".parse::<ProviderId>().is_err());
    }

    #[test]
    fn default_costs_match_pricing() {
        assert_eq!(ProviderProfile::defaults_for(ProviderId::Nano).credit_cost, 1);
        assert_eq!(
            ProviderProfile::defaults_for(ProviderId::GptImage).credit_cost,
            2
        );
    }

    #[test]
    fn task_providers_need_remote_urls() {
        assert!(ProviderProfile::defaults_for(ProviderId::Nano).needs_remote_urls);
        assert!(ProviderProfile::defaults_for(ProviderId::GptImage).needs_remote_urls);
        assert!(!ProviderProfile::defaults_for(ProviderId::Gemini).needs_remote_urls);
    }

    #[test]
    fn combine_ceilings_differ_by_provider() {
        assert_eq!(
            ProviderProfile::defaults_for(ProviderId::Nano).max_combine_images,
            5
        );
        assert_eq!(
            ProviderProfile::defaults_for(ProviderId::GptImage).max_combine_images,
            8
        );
    }
}
