use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::RefundPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub policy: PolicyConfig,
    pub stripe: StripeConfig,
    pub notify: NotifyConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PolicyConfig {
    pub auto_approval_ceiling: Decimal,
    pub currency: String,
}

#[derive(Clone, Debug)]
pub struct StripeConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct NotifyConfig {
    pub transport: NotifyTransportKind,
    pub slack_bot_token: Option<SecretString>,
    pub slack_channel: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyTransportKind {
    Noop,
    Slack,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub auto_approval_ceiling: Option<Decimal>,
    pub stripe_api_key: Option<String>,
    pub notify_transport: Option<NotifyTransportKind>,
    pub slack_bot_token: Option<String>,
    pub slack_channel: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        let policy = RefundPolicy::default();
        Self {
            database: DatabaseConfig {
                url: "sqlite://redress.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            policy: PolicyConfig {
                auto_approval_ceiling: policy.auto_approval_ceiling,
                currency: policy.currency,
            },
            stripe: StripeConfig {
                api_key: None,
                base_url: "https://api.stripe.com".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            notify: NotifyConfig {
                transport: NotifyTransportKind::Noop,
                slack_bot_token: None,
                slack_channel: None,
                timeout_secs: 5,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl From<&PolicyConfig> for RefundPolicy {
    fn from(config: &PolicyConfig) -> Self {
        Self {
            auto_approval_ceiling: config.auto_approval_ceiling,
            currency: config.currency.clone(),
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl FromStr for NotifyTransportKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "noop" => Ok(Self::Noop),
            "slack" => Ok(Self::Slack),
            other => Err(ConfigError::Validation(format!(
                "unsupported notify transport `{other}` (expected noop|slack)"
            ))),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Precedence, lowest to highest: built-in defaults, config file, `REDRESS_*`
    /// environment variables, explicit CLI overrides.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("redress.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(policy) = patch.policy {
            if let Some(ceiling) = policy.auto_approval_ceiling {
                self.policy.auto_approval_ceiling =
                    parse_decimal("policy.auto_approval_ceiling", &ceiling)?;
            }
            if let Some(currency) = policy.currency {
                self.policy.currency = currency;
            }
        }

        if let Some(stripe) = patch.stripe {
            if let Some(stripe_api_key_value) = stripe.api_key {
                self.stripe.api_key = Some(secret_value(stripe_api_key_value));
            }
            if let Some(base_url) = stripe.base_url {
                self.stripe.base_url = base_url;
            }
            if let Some(timeout_secs) = stripe.timeout_secs {
                self.stripe.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = stripe.max_retries {
                self.stripe.max_retries = max_retries;
            }
        }

        if let Some(notify) = patch.notify {
            if let Some(transport) = notify.transport {
                self.notify.transport = transport;
            }
            if let Some(slack_bot_token_value) = notify.slack_bot_token {
                self.notify.slack_bot_token = Some(secret_value(slack_bot_token_value));
            }
            if let Some(slack_channel) = notify.slack_channel {
                self.notify.slack_channel = Some(slack_channel);
            }
            if let Some(timeout_secs) = notify.timeout_secs {
                self.notify.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("REDRESS_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("REDRESS_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("REDRESS_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("REDRESS_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("REDRESS_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("REDRESS_POLICY_AUTO_APPROVAL_CEILING") {
            self.policy.auto_approval_ceiling =
                parse_decimal("REDRESS_POLICY_AUTO_APPROVAL_CEILING", &value)?;
        }
        if let Some(value) = read_env("REDRESS_POLICY_CURRENCY") {
            self.policy.currency = value;
        }

        if let Some(value) = read_env("REDRESS_STRIPE_API_KEY") {
            self.stripe.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("REDRESS_STRIPE_BASE_URL") {
            self.stripe.base_url = value;
        }
        if let Some(value) = read_env("REDRESS_STRIPE_TIMEOUT_SECS") {
            self.stripe.timeout_secs = parse_u64("REDRESS_STRIPE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("REDRESS_STRIPE_MAX_RETRIES") {
            self.stripe.max_retries = parse_u32("REDRESS_STRIPE_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("REDRESS_NOTIFY_TRANSPORT") {
            self.notify.transport = value.parse()?;
        }
        if let Some(value) = read_env("REDRESS_NOTIFY_SLACK_BOT_TOKEN") {
            self.notify.slack_bot_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("REDRESS_NOTIFY_SLACK_CHANNEL") {
            self.notify.slack_channel = Some(value);
        }
        if let Some(value) = read_env("REDRESS_NOTIFY_TIMEOUT_SECS") {
            self.notify.timeout_secs = parse_u64("REDRESS_NOTIFY_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("REDRESS_LOGGING_LEVEL").or_else(|| read_env("REDRESS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("REDRESS_LOGGING_FORMAT").or_else(|| read_env("REDRESS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(ceiling) = overrides.auto_approval_ceiling {
            self.policy.auto_approval_ceiling = ceiling;
        }
        if let Some(stripe_api_key) = overrides.stripe_api_key {
            self.stripe.api_key = Some(secret_value(stripe_api_key));
        }
        if let Some(transport) = overrides.notify_transport {
            self.notify.transport = transport;
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.notify.slack_bot_token = Some(secret_value(slack_bot_token));
        }
        if let Some(slack_channel) = overrides.slack_channel {
            self.notify.slack_channel = Some(slack_channel);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_policy(&self.policy)?;
        validate_stripe(&self.stripe)?;
        validate_notify(&self.notify)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("redress.toml"), PathBuf::from("config/redress.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_policy(policy: &PolicyConfig) -> Result<(), ConfigError> {
    if policy.auto_approval_ceiling <= Decimal::ZERO {
        return Err(ConfigError::Validation(
            "policy.auto_approval_ceiling must be greater than zero".to_string(),
        ));
    }

    let currency = policy.currency.trim();
    if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(
            "policy.currency must be a three-letter uppercase ISO code (e.g. USD)".to_string(),
        ));
    }

    Ok(())
}

fn validate_stripe(stripe: &StripeConfig) -> Result<(), ConfigError> {
    if stripe.timeout_secs == 0 || stripe.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "stripe.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !stripe.base_url.starts_with("http://") && !stripe.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "stripe.base_url must start with http:// or https://".to_string(),
        ));
    }

    if let Some(key) = &stripe.api_key {
        let exposed = key.expose_secret();
        if !exposed.starts_with("sk_") && !exposed.starts_with("rk_") {
            return Err(ConfigError::Validation(
                "stripe.api_key must be a secret key (`sk_...`) or restricted key (`rk_...`). Get it from https://dashboard.stripe.com/apikeys".to_string()
            ));
        }
    }

    Ok(())
}

fn validate_notify(notify: &NotifyConfig) -> Result<(), ConfigError> {
    if notify.timeout_secs == 0 || notify.timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "notify.timeout_secs must be in range 1..=60".to_string(),
        ));
    }

    if notify.transport == NotifyTransportKind::Slack {
        let token = notify
            .slack_bot_token
            .as_ref()
            .map(|token| token.expose_secret().trim().to_owned())
            .unwrap_or_default();
        if token.is_empty() {
            return Err(ConfigError::Validation(
                "notify.slack_bot_token is required for the slack transport. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions".to_string()
            ));
        }
        if !token.starts_with("xoxb-") {
            return Err(ConfigError::Validation(
                "notify.slack_bot_token must start with `xoxb-`".to_string(),
            ));
        }

        let missing_channel =
            notify.slack_channel.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
        if missing_channel {
            return Err(ConfigError::Validation(
                "notify.slack_channel is required for the slack transport".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(value.trim()).map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    policy: Option<PolicyPatch>,
    stripe: Option<StripePatch>,
    notify: Option<NotifyPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

// Ceiling arrives as a string so `"120.00"` survives exactly; a TOML float
// would round-trip through f64.
#[derive(Debug, Default, Deserialize)]
struct PolicyPatch {
    auto_approval_ceiling: Option<String>,
    currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StripePatch {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct NotifyPatch {
    transport: Option<NotifyTransportKind>,
    slack_bot_token: Option<String>,
    slack_channel: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
