use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use shoplist_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let bot_token = redact_token(config.chat.bot_token.expose_secret());

    let fields: [(&str, &str, &str); 11] = [
        ("storage.data_dir", &config.storage.data_dir.display().to_string(), "SHOPLIST_STORAGE_DATA_DIR"),
        ("chat.bot_token", &bot_token, "SHOPLIST_CHAT_BOT_TOKEN"),
        ("chat.application_id", config.chat.application_id.as_deref().unwrap_or("<unset>"), "SHOPLIST_CHAT_APPLICATION_ID"),
        ("reactions.mode", &format!("{:?}", config.reactions.mode), "SHOPLIST_REACTIONS_MODE"),
        ("reactions.pacing_ms", &config.reactions.pacing_ms.to_string(), "SHOPLIST_REACTIONS_PACING_MS"),
        ("follow_up.timeout_secs", &config.follow_up.timeout_secs.to_string(), "SHOPLIST_FOLLOW_UP_TIMEOUT_SECS"),
        ("server.bind_address", &config.server.bind_address, "SHOPLIST_SERVER_BIND_ADDRESS"),
        ("server.health_check_port", &config.server.health_check_port.to_string(), "SHOPLIST_SERVER_HEALTH_CHECK_PORT"),
        ("server.graceful_shutdown_secs", &config.server.graceful_shutdown_secs.to_string(), "SHOPLIST_SERVER_GRACEFUL_SHUTDOWN_SECS"),
        ("logging.level", &config.logging.level, "SHOPLIST_LOGGING_LEVEL"),
        ("logging.format", &format!("{:?}", config.logging.format), "SHOPLIST_LOGGING_FORMAT"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields.iter().map(|(key, value, env_key)| {
        render_line(
            key,
            value,
            field_source(key, Some(*env_key), config_file_doc.as_ref(), config_file_path.as_deref()),
        )
    }));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("shoplist.toml"), PathBuf::from("config/shoplist.toml")]
        .into_iter()
        .find(|path| path.exists())
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

/// Keeps the first four characters of long tokens so operators can tell
/// which bot is configured.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.char_indices().nth(4) {
        Some((cut, _)) if trimmed.len() >= 16 => format!("{}***", &trimmed[..cut]),
        _ => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn redaction_never_reveals_short_tokens() {
        assert_eq!(redact_token(""), "<empty>");
        assert_eq!(redact_token("short-token"), "<redacted>");
        assert_eq!(redact_token("MTA1abcdefghijklmnop"), "MTA1***");
    }

    #[test]
    fn nested_keys_are_found_in_config_documents() {
        let doc = "[chat]\nbot_token = \"x\"\n".parse::<Value>().expect("toml");
        assert!(contains_path(&doc, "chat.bot_token"));
        assert!(!contains_path(&doc, "chat.application_id"));
    }
}
