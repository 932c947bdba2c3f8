use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use redress_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        field_source(
            "database.url",
            Some("REDRESS_DATABASE_URL"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        field_source(
            "database.max_connections",
            Some("REDRESS_DATABASE_MAX_CONNECTIONS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        field_source(
            "database.timeout_secs",
            Some("REDRESS_DATABASE_TIMEOUT_SECS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.push(render_line(
        "policy.auto_approval_ceiling",
        &config.policy.auto_approval_ceiling.to_string(),
        field_source(
            "policy.auto_approval_ceiling",
            Some("REDRESS_POLICY_AUTO_APPROVAL_CEILING"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "policy.currency",
        &config.policy.currency,
        field_source(
            "policy.currency",
            Some("REDRESS_POLICY_CURRENCY"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    let stripe_api_key = match &config.stripe.api_key {
        Some(key) => redact_key(key.expose_secret()),
        None => "<unset>".to_string(),
    };
    lines.push(render_line(
        "stripe.api_key",
        &stripe_api_key,
        field_source(
            "stripe.api_key",
            Some("REDRESS_STRIPE_API_KEY"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "stripe.base_url",
        &config.stripe.base_url,
        field_source(
            "stripe.base_url",
            Some("REDRESS_STRIPE_BASE_URL"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "stripe.timeout_secs",
        &config.stripe.timeout_secs.to_string(),
        field_source(
            "stripe.timeout_secs",
            Some("REDRESS_STRIPE_TIMEOUT_SECS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "stripe.max_retries",
        &config.stripe.max_retries.to_string(),
        field_source(
            "stripe.max_retries",
            Some("REDRESS_STRIPE_MAX_RETRIES"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.push(render_line(
        "notify.transport",
        &format!("{:?}", config.notify.transport),
        field_source(
            "notify.transport",
            Some("REDRESS_NOTIFY_TRANSPORT"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    let slack_bot_token = match &config.notify.slack_bot_token {
        Some(token) => redact_key(token.expose_secret()),
        None => "<unset>".to_string(),
    };
    lines.push(render_line(
        "notify.slack_bot_token",
        &slack_bot_token,
        field_source(
            "notify.slack_bot_token",
            Some("REDRESS_NOTIFY_SLACK_BOT_TOKEN"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "notify.slack_channel",
        config.notify.slack_channel.as_deref().unwrap_or("<unset>"),
        field_source(
            "notify.slack_channel",
            Some("REDRESS_NOTIFY_SLACK_CHANNEL"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "notify.timeout_secs",
        &config.notify.timeout_secs.to_string(),
        field_source(
            "notify.timeout_secs",
            Some("REDRESS_NOTIFY_TIMEOUT_SECS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        field_source(
            "logging.level",
            Some("REDRESS_LOGGING_LEVEL"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        field_source(
            "logging.format",
            Some("REDRESS_LOGGING_FORMAT"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("redress.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/redress.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('_') {
        return format!("{prefix}_***");
    }
    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
