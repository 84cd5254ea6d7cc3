use std::env;
use std::path::{Path, PathBuf};

use gaffer_core::config::{AppConfig, LoadOptions};
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
        "discord.bot_token",
        &redact_token(config.discord.bot_token.expose_secret()),
        field_source(
            "discord.bot_token",
            &["GAFFER_DISCORD_BOT_TOKEN", "DISCORD_TOKEN"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "discord.application_id",
        &config.discord.application_id.clone().unwrap_or_else(|| "(unset)".to_string()),
        field_source(
            "discord.application_id",
            &["GAFFER_DISCORD_APPLICATION_ID"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "discord.transaction_channel_id",
        &config.discord.transaction_channel_id.clone().unwrap_or_else(|| "(unset)".to_string()),
        field_source(
            "discord.transaction_channel_id",
            &["GAFFER_DISCORD_TRANSACTION_CHANNEL_ID", "TRANSACTION_CHANNEL_ID"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "registry.path",
        &config.registry.path.display().to_string(),
        field_source(
            "registry.path",
            &["GAFFER_REGISTRY_PATH"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        field_source(
            "server.bind_address",
            &["GAFFER_SERVER_BIND_ADDRESS"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        field_source(
            "server.port",
            &["GAFFER_SERVER_PORT"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "presence.statuses",
        &config.presence.statuses.join(", "),
        field_source(
            "presence.statuses",
            &["GAFFER_PRESENCE_STATUSES"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "presence.interval_secs",
        &config.presence.interval_secs.to_string(),
        field_source(
            "presence.interval_secs",
            &["GAFFER_PRESENCE_INTERVAL_SECS"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        field_source(
            "logging.level",
            &["GAFFER_LOGGING_LEVEL", "GAFFER_LOG_LEVEL"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.join("\n")
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("  {key} = {value}  ({source})")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("gaffer.toml"), PathBuf::from("config/gaffer.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = std::fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    dotted_key: &str,
    env_keys: &[&str],
    file_doc: Option<&Value>,
    file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        if env::var(env_key).map(|value| !value.trim().is_empty()).unwrap_or(false) {
            return format!("env:{env_key}");
        }
    }

    if let (Some(doc), Some(path)) = (file_doc, file_path) {
        if file_doc_contains(doc, dotted_key) {
            return format!("file:{}", path.display());
        }
    }

    "default".to_string()
}

fn file_doc_contains(doc: &Value, dotted_key: &str) -> bool {
    let mut current = doc;
    for segment in dotted_key.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return false,
        }
    }
    true
}

fn redact_token(token: &str) -> String {
    if token.len() <= 8 {
        return "********".to_string();
    }
    format!("{}…{}", &token[..4], &token[token.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::{field_source, file_doc_contains, redact_token};
    use toml::Value;

    #[test]
    fn redaction_keeps_only_edges_of_long_tokens() {
        let redacted = redact_token("abcdefghijklmnop");
        assert_eq!(redacted, "abcd…mnop");
        assert_eq!(redact_token("short"), "********");
    }

    #[test]
    fn file_doc_lookup_walks_dotted_keys() {
        let doc: Value = "[server]\nport = 8090\n".parse().expect("toml");
        assert!(file_doc_contains(&doc, "server.port"));
        assert!(!file_doc_contains(&doc, "server.bind_address"));
        assert!(!file_doc_contains(&doc, "discord.bot_token"));
    }

    #[test]
    fn missing_everything_attributes_to_default() {
        let source = field_source(
            "presence.interval_secs",
            &["GAFFER_TEST_UNSET_VARIABLE"],
            None,
            None,
        );
        assert_eq!(source, "default");
    }
}
