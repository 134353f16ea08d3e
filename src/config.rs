use std::{
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::draw::DEFAULT_WINNING_NUMBER;

/// Lottery server configuration.
///
/// every option can also be set through the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "lottery-server", about = "Collects agency bets and runs the draw")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "SERVER_PORT", default_value_t = 12345)]
    pub port: u16,

    /// Maximum number of pending connections
    #[arg(long, env = "SERVER_LISTEN_BACKLOG", default_value_t = 5)]
    pub listen_backlog: u32,

    /// Number of agencies that must finish before the draw runs
    #[arg(
        long,
        env = "SERVER_AGENCIES",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub agencies: u64,

    /// File the received bets are appended to
    #[arg(long, env = "SERVER_BETS_FILE", default_value = "bets.csv")]
    pub bets_file: PathBuf,

    /// Bets that played this number win
    #[arg(long, env = "LOTTERY_WINNING_NUMBER", default_value_t = DEFAULT_WINNING_NUMBER)]
    pub winning_number: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "LOGGING_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

/// Connects tracing to stdout.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Config;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["lottery-server"]).unwrap();

        assert_eq!(config.listen_backlog, 5);
        assert_eq!(config.agencies, 5);
        assert_eq!(config.winning_number, 7574);
        assert_eq!(config.bets_file.to_str(), Some("bets.csv"));
    }

    #[test]
    fn overrides() {
        let config = Config::try_parse_from([
            "lottery-server",
            "--port",
            "4000",
            "--listen-backlog",
            "64",
            "--agencies",
            "3",
            "--winning-number",
            "7",
        ])
        .unwrap();

        assert_eq!(config.listen_addr().port(), 4000);
        assert_eq!(config.listen_backlog, 64);
        assert_eq!(config.agencies, 3);
        assert_eq!(config.winning_number, 7);
    }

    #[test]
    fn at_least_one_agency() {
        assert!(Config::try_parse_from(["lottery-server", "--agencies", "0"]).is_err());
    }
}
