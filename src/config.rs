//! Environment-driven configuration for the server process.

use std::env;

/// Default network bind address for SSE hosting.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default network port for SSE hosting.
pub const DEFAULT_PORT: u16 = 8000;

/// How the MCP server is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Network hosting over Server-Sent Events.
    #[default]
    Sse,
    /// Standard input/output hosting, for spawned child-process clients.
    Stdio,
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: Option<String>,
    pub meteoblue_api_key: Option<String>,
    pub mock_google_api: bool,
    pub mock_weather_api: bool,
    pub transport: Transport,
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            google_api_key: None,
            meteoblue_api_key: None,
            mock_google_api: false,
            mock_weather_api: false,
            transport: Transport::default(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self {
            google_api_key: env_var("GOOGLE_API_KEY"),
            meteoblue_api_key: env_var("METEOBLUE_API_KEY"),
            mock_google_api: env_flag("MOCK_GOOGLE_API"),
            mock_weather_api: env_flag("MOCK_WEATHER_API"),
            transport: match env_var("TRANSPORT") {
                Some(value) if !value.eq_ignore_ascii_case("sse") => Transport::Stdio,
                _ => Transport::Sse,
            },
            host: env_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: env_var("PORT")
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_PORT),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn env_flag(name: &str) -> bool {
    matches!(
        env_var(name).map(|value| value.to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_accepts_truthy_spellings() {
        for (i, value) in ["1", "true", "TRUE", "yes", "on"].iter().enumerate() {
            let name = format!("NEARBY_TEST_TRUTHY_{i}");
            env::set_var(&name, value);
            assert!(env_flag(&name), "{value} should enable the flag");
        }
    }

    #[test]
    fn flag_rejects_falsy_or_unset() {
        env::set_var("NEARBY_TEST_FALSY", "false");
        assert!(!env_flag("NEARBY_TEST_FALSY"));
        env::set_var("NEARBY_TEST_EMPTY", "");
        assert!(!env_flag("NEARBY_TEST_EMPTY"));
        assert!(!env_flag("NEARBY_TEST_NEVER_SET"));
    }

    #[test]
    fn default_config_binds_sse_on_8000() {
        let config = Config::default();
        assert_eq!(config.transport, Transport::Sse);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(!config.mock_google_api);
    }
}
