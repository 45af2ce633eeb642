use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{ProctorError, Result};

pub const DEFAULT_SERVER_PORT: u16 = 5000;
pub const DEFAULT_DB_PATH: &str = "./data/proctor.db";
pub const DEFAULT_RECENT_LIMIT: usize = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_TOTAL_STUDENTS: u64 = 120;
pub const DEFAULT_AVERAGE_SCORE: f64 = 82.0;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub alerts: AlertConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = ProctorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(ProctorError::InvalidConfiguration(format!(
                "ALERT_STORE must be 'memory' or 'sqlite', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub db_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Bound on the recent alerts shown on the dashboard
    pub recent_limit: usize,
    /// Hold alerts raised while no teacher is registered
    pub queue_when_no_teacher: bool,
    pub queue_capacity: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            recent_limit: DEFAULT_RECENT_LIMIT,
            queue_when_no_teacher: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub total_students: u64,
    pub average_score: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            total_students: DEFAULT_TOTAL_STUDENTS,
            average_score: DEFAULT_AVERAGE_SCORE,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", DEFAULT_SERVER_PORT)?,
            },
            store: StoreConfig {
                backend: match env::var("ALERT_STORE") {
                    Ok(value) => value.parse()?,
                    Err(_) => StoreBackend::Sqlite,
                },
                db_path: env::var("ALERT_DB_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH)),
            },
            alerts: AlertConfig {
                recent_limit: parse_var("ALERT_RECENT_LIMIT", DEFAULT_RECENT_LIMIT)?,
                queue_when_no_teacher: parse_var("ALERT_QUEUE_WHEN_NO_TEACHER", false)?,
                queue_capacity: parse_var("ALERT_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?,
            },
            dashboard: DashboardConfig {
                total_students: parse_var("DASHBOARD_TOTAL_STUDENTS", DEFAULT_TOTAL_STUDENTS)?,
                average_score: parse_var("DASHBOARD_AVERAGE_SCORE", DEFAULT_AVERAGE_SCORE)?,
            },
        })
    }

    pub fn bind_address(&self) -> ([u8; 4], u16) {
        let ip_addr = self.parse_host_to_ipv4();
        (ip_addr.octets(), self.server.port)
    }

    fn parse_host_to_ipv4(&self) -> Ipv4Addr {
        if let Ok(addr) = self.server.host.parse::<IpAddr>() {
            match addr {
                IpAddr::V4(ipv4) => return ipv4,
                IpAddr::V6(_) => {
                    tracing::warn!(
                        host = %self.server.host,
                        "IPv6 address provided but only IPv4 supported, using 0.0.0.0"
                    );
                    return Ipv4Addr::new(0, 0, 0, 0);
                }
            }
        }

        match self.server.host.as_str() {
            "localhost" => Ipv4Addr::new(127, 0, 0, 1),
            "" | "0.0.0.0" => Ipv4Addr::new(0, 0, 0, 0),
            _ => {
                tracing::warn!(
                    host = %self.server.host,
                    "Unable to parse host as IPv4, using 0.0.0.0"
                );
                Ipv4Addr::new(0, 0, 0, 0)
            }
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        ProctorError::InvalidConfiguration(format!("{} has an invalid value: '{}'", name, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_host(host: &str, port: u16) -> Config {
        Config {
            server: ServerConfig {
                host: host.to_string(),
                port,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                db_path: PathBuf::from(DEFAULT_DB_PATH),
            },
            alerts: AlertConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }

    #[test]
    fn test_parse_localhost() {
        let config = config_with_host("localhost", 5000);
        assert_eq!(config.bind_address(), ([127, 0, 0, 1], 5000));
    }

    #[test]
    fn test_parse_ipv4_address() {
        let config = config_with_host("192.168.1.1", 3000);
        assert_eq!(config.bind_address(), ([192, 168, 1, 1], 3000));
    }

    #[test]
    fn test_parse_empty_host() {
        let config = config_with_host("", 5000);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 5000));
    }

    #[test]
    fn test_parse_invalid_hostname_defaults_to_all() {
        let config = config_with_host("invalid-hostname", 9000);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 9000));
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!(" SQLite ".parse::<StoreBackend>().unwrap(), StoreBackend::Sqlite);
        assert!("mongo".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_alert_defaults_drop_alerts_without_teachers() {
        let alerts = AlertConfig::default();
        assert_eq!(alerts.recent_limit, 10);
        assert!(!alerts.queue_when_no_teacher);
        assert_eq!(alerts.queue_capacity, 100);
    }

    #[test]
    fn test_parse_value_rejects_garbage() {
        let result: Result<u16> = parse_value("SERVER_PORT", "not-a-port");
        assert!(matches!(result, Err(ProctorError::InvalidConfiguration(_))));

        let port: u16 = parse_value("SERVER_PORT", " 8080 ").unwrap();
        assert_eq!(port, 8080);

        let fallback: u16 = parse_var("PROCTOR_TEST_PORT_UNSET", 5000).unwrap();
        assert_eq!(fallback, 5000);
    }

    #[test]
    fn test_queue_flag_rejects_non_boolean_values() {
        assert!(parse_value::<bool>("ALERT_QUEUE_WHEN_NO_TEACHER", "true").unwrap());
        assert!(!parse_value::<bool>("ALERT_QUEUE_WHEN_NO_TEACHER", "false").unwrap());

        for raw in ["1", "yes", "on"] {
            let result = parse_value::<bool>("ALERT_QUEUE_WHEN_NO_TEACHER", raw);
            assert!(matches!(result, Err(ProctorError::InvalidConfiguration(_))));
        }
    }
}
