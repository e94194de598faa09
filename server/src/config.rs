//! This module is in charge of defining the configuration format with types
//! and reading the configuration.
//!
//! Unlike a config file, the command line surface here is a flat set of
//! `key=value` tokens in any order (§6): `ip=`, `port=`, `rooms=`,
//! `players=`. Limits are `Option<usize>`, with `None` meaning unlimited.

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct EnvironmentConfig {
    pub bind_ip: IpAddr,
    pub port: u16,
    pub room_limit: Option<usize>,
    pub player_limit: Option<usize>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 10001,
            room_limit: None,
            player_limit: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown configuration key: {0}")]
    UnknownKey(String),
    #[error("malformed argument (expected key=value): {0}")]
    MalformedArgument(String),
    #[error("invalid ip address: {0}")]
    InvalidIp(String),
    #[error("invalid port: {0}")]
    InvalidPort(String),
    #[error("invalid limit for {key}: {value}")]
    InvalidLimit { key: String, value: String },
}

/// Parses the process's command line into an `EnvironmentConfig`. Exits the
/// process with a non-zero status on any parse error, since the logger may
/// not be initialized yet and there is nowhere else to report a bad config.
pub fn load_config() -> EnvironmentConfig {
    let args: Vec<String> = env::args().skip(1).collect();
    match load_config_inner(&args) {
        Ok(config) => config,
        Err(err) => {
            println!("Error loading config: {err}");
            std::process::exit(1);
        }
    }
}

fn load_config_inner(args: &[String]) -> Result<EnvironmentConfig, ConfigError> {
    let mut config = EnvironmentConfig::default();

    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedArgument(arg.clone()))?;

        match key {
            "ip" => config.bind_ip = parse_ip(value)?,
            "port" => {
                config.port = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidPort(value.to_string()))?
            }
            "rooms" => config.room_limit = parse_limit("rooms", value)?,
            "players" => config.player_limit = parse_limit("players", value)?,
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
    }

    Ok(config)
}

fn parse_ip(value: &str) -> Result<IpAddr, ConfigError> {
    if value == "any" {
        return Ok(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }
    value
        .parse()
        .map_err(|_| ConfigError::InvalidIp(value.to_string()))
}

fn parse_limit(key: &str, value: &str) -> Result<Option<usize>, ConfigError> {
    let parsed: i64 = value
        .parse()
        .map_err(|_| ConfigError::InvalidLimit { key: key.to_string(), value: value.to_string() })?;
    match parsed {
        -1 => Ok(None),
        n if n >= 0 => Ok(Some(n as usize)),
        _ => Err(ConfigError::InvalidLimit { key: key.to_string(), value: value.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_when_no_args() {
        let config = load_config_inner(&[]).unwrap();
        assert_eq!(config.port, 10001);
        assert_eq!(config.room_limit, None);
        assert_eq!(config.player_limit, None);
        assert_eq!(config.bind_ip, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn parses_all_keys_in_any_order() {
        let config = load_config_inner(&args(&["players=5", "port=7000", "rooms=-1", "ip=127.0.0.1"])).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.player_limit, Some(5));
        assert_eq!(config.room_limit, None);
        assert_eq!(config.bind_ip, IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
    }

    #[test]
    fn rejects_unknown_key() {
        assert!(matches!(
            load_config_inner(&args(&["bogus=1"])),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn rejects_malformed_argument() {
        assert!(matches!(
            load_config_inner(&args(&["justsometoken"])),
            Err(ConfigError::MalformedArgument(_))
        ));
    }

    #[test]
    fn rejects_invalid_port() {
        assert!(matches!(
            load_config_inner(&args(&["port=notanumber"])),
            Err(ConfigError::InvalidPort(_))
        ));
    }
}
