// Configuration module entry point
// Loads layered configuration and holds the shared application state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig};

/// Environment variable prefix, e.g. `ROUTEBIND_SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "ROUTEBIND";

impl Config {
    /// Load configuration from `config.toml` in the working directory
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from specified file path (without extension)
    ///
    /// Sources, lowest priority first: built-in defaults, the file (optional),
    /// then `ROUTEBIND_*` environment variables.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = Self::defaults()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    fn defaults(
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "plain")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.read_timeout", 30)?
            .set_default("http.server_name", "routebind/0.1")?
            .set_default("http.max_body_size", 10_485_760) // 10MB
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
