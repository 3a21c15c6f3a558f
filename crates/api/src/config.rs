//! Server configuration loaded from environment variables.

use std::time::Duration;

use pixshop_core::provider::{ProviderId, ProviderProfile};
use pixshop_core::usage::{DEFAULT_ANONYMOUS_QUOTA, DEFAULT_SIGNUP_GRANT};
use pixshop_store::S3Config;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except secrets have defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `600`, generous enough
    /// for the slow provider's full poll budget).
    pub request_timeout_secs: u64,
    /// Deployment environment (`development` | `production`). Error
    /// `details` payloads are only emitted outside production.
    pub environment: String,
    /// JWT validation configuration.
    pub jwt: JwtConfig,
    /// Free generations per anonymous session.
    pub anonymous_quota: i64,
    /// Credits granted when a user account first materializes.
    pub signup_grant: i64,
    /// Shared secret the payment processor sends on top-up webhooks.
    pub payment_webhook_secret: String,
    /// Provider connection settings.
    pub providers: ProviderSettings,
    /// Temporary asset bucket settings.
    pub s3: S3Config,
}

/// Connection and tuning settings for the generation providers.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Base URL of the task gateway fronting the async providers.
    pub task_gateway_url: String,
    /// API key for the task gateway.
    pub task_gateway_key: String,
    /// Base URL of the synchronous provider.
    pub gemini_base_url: String,
    /// API key for the synchronous provider.
    pub gemini_api_key: String,
    /// Delay between task polls.
    pub poll_interval: Duration,
    /// Poll attempt budget for the fast task provider (default: 60,
    /// about one minute at the default interval).
    pub nano_poll_attempts: u32,
    /// Poll attempt budget for the slow task provider (default: 300,
    /// about five minutes at the default interval).
    pub gpt_image_poll_attempts: u32,
    /// Per-provider credit costs.
    pub nano_credit_cost: i64,
    pub gpt_image_credit_cost: i64,
    pub gemini_credit_cost: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                   |
    /// |---------------------------|---------------------------|
    /// | `HOST`                    | `0.0.0.0`                 |
    /// | `PORT`                    | `3000`                    |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`   |
    /// | `REQUEST_TIMEOUT_SECS`    | `600`                     |
    /// | `APP_ENV`                 | `development`             |
    /// | `ANON_QUOTA`              | `20`                      |
    /// | `SIGNUP_GRANT`            | `30`                      |
    /// | `PAYMENT_WEBHOOK_SECRET`  | **required**              |
    /// | `TASK_GATEWAY_URL`        | `https://api.kie.ai`      |
    /// | `TASK_GATEWAY_KEY`        | **required**              |
    /// | `GEMINI_BASE_URL`         | `https://generativelanguage.googleapis.com` |
    /// | `GEMINI_API_KEY`          | **required**              |
    /// | `POLL_INTERVAL_MS`        | `1000`                    |
    /// | `NANO_POLL_ATTEMPTS`      | `60`                      |
    /// | `GPT_IMAGE_POLL_ATTEMPTS` | `300`                     |
    /// | `NANO_CREDIT_COST`        | `1`                       |
    /// | `GPT_IMAGE_CREDIT_COST`   | `2`                       |
    /// | `GEMINI_CREDIT_COST`      | `1`                       |
    /// | `S3_BUCKET`               | **required**              |
    /// | `S3_REGION`               | `us-east-1`               |
    /// | `S3_KEY_PREFIX`           | `tmp`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let environment =
            std::env::var("APP_ENV").unwrap_or_else(|_| "development".into());

        let anonymous_quota: i64 = std::env::var("ANON_QUOTA")
            .unwrap_or_else(|_| DEFAULT_ANONYMOUS_QUOTA.to_string())
            .parse()
            .expect("ANON_QUOTA must be a valid i64");

        let signup_grant: i64 = std::env::var("SIGNUP_GRANT")
            .unwrap_or_else(|_| DEFAULT_SIGNUP_GRANT.to_string())
            .parse()
            .expect("SIGNUP_GRANT must be a valid i64");

        let payment_webhook_secret = std::env::var("PAYMENT_WEBHOOK_SECRET")
            .expect("PAYMENT_WEBHOOK_SECRET must be set in the environment");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            environment,
            jwt: JwtConfig::from_env(),
            anonymous_quota,
            signup_grant,
            payment_webhook_secret,
            providers: ProviderSettings::from_env(),
            s3: S3Config {
                bucket: std::env::var("S3_BUCKET")
                    .expect("S3_BUCKET must be set in the environment"),
                region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
                key_prefix: std::env::var("S3_KEY_PREFIX").unwrap_or_else(|_| "tmp".into()),
            },
        }
    }

    /// Whether to attach developer `details` payloads to error responses.
    pub fn expose_error_details(&self) -> bool {
        self.environment != "production"
    }

    /// The execution profile for a provider, with environment overrides
    /// applied on top of the built-in defaults.
    pub fn profile_for(&self, id: ProviderId) -> ProviderProfile {
        let mut profile = ProviderProfile::defaults_for(id);
        profile.poll_interval = self.providers.poll_interval;
        match id {
            ProviderId::Nano => {
                profile.credit_cost = self.providers.nano_credit_cost;
                profile.max_poll_attempts = self.providers.nano_poll_attempts;
            }
            ProviderId::GptImage => {
                profile.credit_cost = self.providers.gpt_image_credit_cost;
                profile.max_poll_attempts = self.providers.gpt_image_poll_attempts;
            }
            ProviderId::Gemini => {
                profile.credit_cost = self.providers.gemini_credit_cost;
            }
        }
        profile
    }
}

impl ProviderSettings {
    fn from_env() -> Self {
        let poll_interval_ms: u64 = std::env::var("POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("POLL_INTERVAL_MS must be a valid u64");

        Self {
            task_gateway_url: std::env::var("TASK_GATEWAY_URL")
                .unwrap_or_else(|_| "https://api.kie.ai".into()),
            task_gateway_key: std::env::var("TASK_GATEWAY_KEY")
                .expect("TASK_GATEWAY_KEY must be set in the environment"),
            gemini_base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".into()),
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .expect("GEMINI_API_KEY must be set in the environment"),
            poll_interval: Duration::from_millis(poll_interval_ms),
            nano_poll_attempts: env_u32("NANO_POLL_ATTEMPTS", 60),
            gpt_image_poll_attempts: env_u32("GPT_IMAGE_POLL_ATTEMPTS", 300),
            nano_credit_cost: env_i64("NANO_CREDIT_COST", 1),
            gpt_image_credit_cost: env_i64("GPT_IMAGE_CREDIT_COST", 2),
            gemini_credit_cost: env_i64("GEMINI_CREDIT_COST", 1),
        }
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
