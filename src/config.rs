use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

use thiserror::Error;

pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);
pub const DEFAULT_PORT: u16 = 7400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// One datagram is fully handled before the next read.
    #[default]
    Inline,
    /// Each datagram is handled on the blocking pool; replies may reorder.
    Spawned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub group: IpAddr,
    pub port: u16,
    pub interface: Ipv4Addr,
    pub dispatch: DispatchMode,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("MCAST_GROUP must be a valid IP address")]
    InvalidGroup,
    #[error("MCAST_GROUP must be a multicast address")]
    NotMulticast,
    #[error("MCAST_PORT must be a valid non-zero u16")]
    InvalidPort,
    #[error("MCAST_INTERFACE must be a valid IPv4 address")]
    InvalidInterface,
    #[error("MCAST_DISPATCH must be one of: inline, spawned")]
    InvalidDispatchMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group: IpAddr::V4(DEFAULT_GROUP),
            port: DEFAULT_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            dispatch: DispatchMode::Inline,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let group = read("MCAST_GROUP")
            .map(|value| {
                value
                    .parse::<IpAddr>()
                    .map_err(|_| ConfigError::InvalidGroup)
            })
            .transpose()?
            .unwrap_or(IpAddr::V4(DEFAULT_GROUP));
        if !group.is_multicast() {
            return Err(ConfigError::NotMulticast);
        }

        let port = read("MCAST_PORT")
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        let interface = read("MCAST_INTERFACE")
            .map(|value| {
                value
                    .parse::<Ipv4Addr>()
                    .map_err(|_| ConfigError::InvalidInterface)
            })
            .transpose()?
            .unwrap_or(Ipv4Addr::UNSPECIFIED);

        let dispatch = match read("MCAST_DISPATCH")
            .map(|value| value.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("inline") => DispatchMode::Inline,
            Some("spawned") => DispatchMode::Spawned,
            Some(_) => return Err(ConfigError::InvalidDispatchMode),
        };

        Ok(Self {
            group,
            port,
            interface,
            dispatch,
        })
    }

    pub fn group_socket(&self) -> SocketAddr {
        SocketAddr::new(self.group, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn parse(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn parse_defaults() {
        let config = parse(&[]).expect("config should parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.group_socket().to_string(), "239.255.0.1:7400");
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = parse(&[("MCAST_GROUP", "  "), ("MCAST_PORT", "")]).expect("parses");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn parses_explicit_values() {
        let config = parse(&[
            ("MCAST_GROUP", "ff02::1234"),
            ("MCAST_PORT", "9000"),
            ("MCAST_INTERFACE", "10.0.0.5"),
            ("MCAST_DISPATCH", "Spawned"),
        ])
        .expect("config should parse");

        assert_eq!(config.group, "ff02::1234".parse::<IpAddr>().expect("v6"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.interface, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(config.dispatch, DispatchMode::Spawned);
    }

    #[test]
    fn unicast_group_fails() {
        let err = parse(&[("MCAST_GROUP", "192.168.1.10")]).expect_err("not multicast");
        assert_eq!(err, ConfigError::NotMulticast);
    }

    #[test]
    fn invalid_values_fail() {
        assert_eq!(
            parse(&[("MCAST_GROUP", "not-an-ip")]).expect_err("bad group"),
            ConfigError::InvalidGroup
        );
        assert_eq!(
            parse(&[("MCAST_PORT", "70000")]).expect_err("bad port"),
            ConfigError::InvalidPort
        );
        assert_eq!(
            parse(&[("MCAST_PORT", "0")]).expect_err("zero port"),
            ConfigError::InvalidPort
        );
        assert_eq!(
            parse(&[("MCAST_INTERFACE", "eth0")]).expect_err("bad interface"),
            ConfigError::InvalidInterface
        );
        assert_eq!(
            parse(&[("MCAST_DISPATCH", "threaded")]).expect_err("bad mode"),
            ConfigError::InvalidDispatchMode
        );
    }
}
