//! Configuration from environment variables.
//!
//! | variable                      | default   |
//! |-------------------------------|-----------|
//! | `PORT`                        | `8080`    |
//! | `BIND_ADDR`                   | `0.0.0.0` |
//! | `SESSION_IDLE_TTL_SECS`       | `1800`    |
//! | `SESSION_SWEEP_INTERVAL_SECS` | `60`      |

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Socket address to bind the server to.
    pub addr: SocketAddr,
    /// How long a session with no connected player is kept before eviction.
    pub session_idle_ttl: Duration,
    /// How often the eviction sweep runs.
    pub sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            session_idle_ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let port: u16 = parse_or(&lookup, "PORT", defaults.addr.port())?;
        let ip: IpAddr = parse_or(&lookup, "BIND_ADDR", defaults.addr.ip())?;
        let ttl = secs_or(&lookup, "SESSION_IDLE_TTL_SECS", defaults.session_idle_ttl)?;
        let sweep = secs_or(&lookup, "SESSION_SWEEP_INTERVAL_SECS", defaults.sweep_interval)?;
        Ok(Self {
            addr: SocketAddr::new(ip, port),
            session_idle_ttl: ttl,
            sweep_interval: sweep,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn secs_or<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(lookup, key, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::Zero { key });
    }
    Ok(Duration::from_secs(secs))
}
