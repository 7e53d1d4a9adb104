use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// ASKWELL Q&A portal server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "askwell-server", version, about = "ASKWELL Q&A portal server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "ASKWELL_PORT", default_value = "8080")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "ASKWELL_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./askwell.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "ASKWELL_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, signing key)
    #[arg(long, env = "ASKWELL_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Keep unauthenticated WebSocket connections open in a degraded state
    /// instead of closing them. Degraded sessions cannot join rooms.
    #[arg(long, env = "ASKWELL_ALLOW_ANONYMOUS_WS")]
    pub allow_anonymous_ws: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            config: "./askwell.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            allow_anonymous_ws: false,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (ASKWELL_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("ASKWELL_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# ASKWELL Portal Server Configuration
# Place this file at ./askwell.toml or specify with --config <path>
# All settings can be overridden via environment variables (ASKWELL_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for SQLite database and JWT signing key
# data_dir = "./data"

# Keep unauthenticated WebSocket connections open in a degraded state.
# Default: false (bad or missing tokens close the socket with 4001/4002)
# allow_anonymous_ws = false
"#
    .to_string()
}
