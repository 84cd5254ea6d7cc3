use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub registry: RegistryConfig,
    pub server: ServerConfig,
    pub presence: PresenceConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub bot_token: SecretString,
    /// Application id; required only for startup slash-command registration.
    pub application_id: Option<String>,
    /// Channel that receives signed contract announcements. Accept aborts
    /// with a private notice when this is unset.
    pub transaction_channel_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RegistryConfig {
    pub path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct PresenceConfig {
    pub statuses: Vec<String>,
    pub interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub bot_token: Option<String>,
    pub application_id: Option<String>,
    pub transaction_channel_id: Option<String>,
    pub registry_path: Option<PathBuf>,
    pub server_port: Option<u16>,
    pub presence_statuses: Option<Vec<String>>,
    pub log_level: Option<String>,
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
        Self {
            discord: DiscordConfig {
                bot_token: String::new().into(),
                application_id: None,
                transaction_channel_id: None,
            },
            registry: RegistryConfig { path: PathBuf::from("teams.json") },
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), port: 3000 },
            presence: PresenceConfig {
                statuses: vec!["[VEF] Hub".to_string()],
                interval_secs: 60,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
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
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("gaffer.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(discord) = patch.discord {
            if let Some(bot_token_value) = discord.bot_token {
                self.discord.bot_token = secret_value(bot_token_value);
            }
            if let Some(application_id) = discord.application_id {
                self.discord.application_id = Some(application_id);
            }
            if let Some(transaction_channel_id) = discord.transaction_channel_id {
                self.discord.transaction_channel_id = Some(transaction_channel_id);
            }
        }

        if let Some(registry) = patch.registry {
            if let Some(path) = registry.path {
                self.registry.path = PathBuf::from(path);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(presence) = patch.presence {
            if let Some(statuses) = presence.statuses {
                self.presence.statuses = statuses;
            }
            if let Some(interval_secs) = presence.interval_secs {
                self.presence.interval_secs = interval_secs;
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
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Bare DISCORD_TOKEN / TRANSACTION_CHANNEL_ID are accepted as aliases
        // for operators migrating an existing deployment.
        let bot_token =
            read_env("GAFFER_DISCORD_BOT_TOKEN").or_else(|| read_env("DISCORD_TOKEN"));
        if let Some(value) = bot_token {
            self.discord.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("GAFFER_DISCORD_APPLICATION_ID") {
            self.discord.application_id = Some(value);
        }
        let transaction_channel = read_env("GAFFER_DISCORD_TRANSACTION_CHANNEL_ID")
            .or_else(|| read_env("TRANSACTION_CHANNEL_ID"));
        if let Some(value) = transaction_channel {
            self.discord.transaction_channel_id = Some(value);
        }

        if let Some(value) = read_env("GAFFER_REGISTRY_PATH") {
            self.registry.path = PathBuf::from(value);
        }

        if let Some(value) = read_env("GAFFER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("GAFFER_SERVER_PORT") {
            self.server.port = parse_u16("GAFFER_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("GAFFER_PRESENCE_STATUSES") {
            let statuses: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|status| !status.is_empty())
                .map(str::to_owned)
                .collect();
            if statuses.is_empty() {
                return Err(ConfigError::InvalidEnvOverride {
                    key: "GAFFER_PRESENCE_STATUSES".to_string(),
                    value,
                });
            }
            self.presence.statuses = statuses;
        }
        if let Some(value) = read_env("GAFFER_PRESENCE_INTERVAL_SECS") {
            self.presence.interval_secs = parse_u64("GAFFER_PRESENCE_INTERVAL_SECS", &value)?;
        }

        let log_level = read_env("GAFFER_LOGGING_LEVEL").or_else(|| read_env("GAFFER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GAFFER_LOGGING_FORMAT").or_else(|| read_env("GAFFER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bot_token) = overrides.bot_token {
            self.discord.bot_token = secret_value(bot_token);
        }
        if let Some(application_id) = overrides.application_id {
            self.discord.application_id = Some(application_id);
        }
        if let Some(transaction_channel_id) = overrides.transaction_channel_id {
            self.discord.transaction_channel_id = Some(transaction_channel_id);
        }
        if let Some(registry_path) = overrides.registry_path {
            self.registry.path = registry_path;
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
        if let Some(presence_statuses) = overrides.presence_statuses {
            self.presence.statuses = presence_statuses;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_registry(&self.registry)?;
        validate_server(&self.server)?;
        validate_presence(&self.presence)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("gaffer.toml"), PathBuf::from("config/gaffer.toml")]
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

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    let bot_token = discord.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "discord.bot_token is required. Get it from the developer portal under Bot > Token"
                .to_string(),
        ));
    }
    if bot_token.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(
            "discord.bot_token must not contain whitespace".to_string(),
        ));
    }

    if let Some(channel_id) = &discord.transaction_channel_id {
        if channel_id.trim().is_empty() || !channel_id.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(ConfigError::Validation(
                "discord.transaction_channel_id must be a numeric channel id".to_string(),
            ));
        }
    }

    if let Some(application_id) = &discord.application_id {
        if application_id.trim().is_empty()
            || !application_id.chars().all(|ch| ch.is_ascii_digit())
        {
            return Err(ConfigError::Validation(
                "discord.application_id must be a numeric application id".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_registry(registry: &RegistryConfig) -> Result<(), ConfigError> {
    if registry.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("registry.path must not be empty".to_string()));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }
    Ok(())
}

fn validate_presence(presence: &PresenceConfig) -> Result<(), ConfigError> {
    if presence.statuses.is_empty() {
        return Err(ConfigError::Validation(
            "presence.statuses must contain at least one status".to_string(),
        ));
    }
    if presence.statuses.iter().any(|status| status.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "presence.statuses must not contain blank entries".to_string(),
        ));
    }
    if presence.interval_secs == 0 || presence.interval_secs > 3600 {
        return Err(ConfigError::Validation(
            "presence.interval_secs must be in range 1..=3600".to_string(),
        ));
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

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
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

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    discord: Option<DiscordPatch>,
    registry: Option<RegistryPatch>,
    server: Option<ServerPatch>,
    presence: Option<PresencePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    bot_token: Option<String>,
    application_id: Option<String>,
    transaction_channel_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryPatch {
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct PresencePatch {
    statuses: Option<Vec<String>>,
    interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
