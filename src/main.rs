use std::time::Duration;

use clap::Parser;
use duel_server::{Limits, ServerConfig};
use duel_telemetry::TelemetryConfig;
use tracing::Level;

/// Real-time coordinator for two-player rock-paper-scissors rooms.
#[derive(Debug, Parser)]
#[command(name = "duel", version)]
struct Args {
    /// Address to bind.
    #[arg(long, env = "DUEL_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3001)]
    port: u16,

    /// Origin allowed by CORS. Any origin is allowed when unset.
    #[arg(long, env = "FRONTEND_URL")]
    frontend_url: Option<String>,

    /// Upper bound for a room's totalRounds.
    #[arg(long, env = "DUEL_MAX_ROUNDS", default_value_t = 99)]
    max_rounds: u32,

    /// Default log level; RUST_LOG takes precedence.
    #[arg(long, env = "DUEL_LOG_LEVEL", default_value = "info")]
    log_level: Level,

    /// Log as JSON lines.
    #[arg(long, env = "DUEL_LOG_JSON")]
    log_json: bool,

    /// Seconds between WebSocket pings.
    #[arg(long, default_value_t = 30)]
    heartbeat_secs: u64,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let heartbeat = Duration::from_secs(self.heartbeat_secs.max(1));
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            frontend_url: self.frontend_url.clone(),
            heartbeat_interval: heartbeat,
            client_timeout: heartbeat * 3,
            limits: Limits {
                max_rounds: self.max_rounds.max(1),
                ..Limits::default()
            },
            ..ServerConfig::default()
        }
    }

    fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            log_level: self.log_level,
            module_levels: Vec::new(),
            json: self.log_json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    duel_telemetry::init_telemetry(&args.telemetry_config())?;

    tracing::info!("Starting duel server");

    let handle = duel_server::start(args.server_config()).await?;
    tracing::info!(port = handle.port, "Duel server ready");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down");
    handle.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_config() {
        let args = Args::parse_from(["duel"]);
        let config = args.server_config();
        assert_eq!(config.client_timeout, Duration::from_secs(90));
        assert_eq!(config.limits.max_rounds, 99);
        assert!(config.frontend_url.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "duel",
            "--port",
            "8080",
            "--frontend-url",
            "http://localhost:3000",
            "--log-level",
            "debug",
            "--log-json",
        ]);
        assert_eq!(args.server_config().port, 8080);
        assert_eq!(args.server_config().frontend_url.as_deref(), Some("http://localhost:3000"));
        let telemetry = args.telemetry_config();
        assert_eq!(telemetry.log_level, Level::DEBUG);
        assert!(telemetry.json);
    }
}
