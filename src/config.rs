//! Stack configuration
//!
//! Every literal the declaration embeds (address block, ports, engine
//! version, names) can be overridden from `cumulo.toml`; the defaults
//! reproduce the stock topology. Lookup order: explicit `--config` path,
//! `./cumulo.toml`, `~/.config/cumulo/config.toml`. No file means
//! defaults.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The full set of declaration inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Top-level scope every logical id nests under
    pub stack_name: String,
    pub network: NetworkConfig,
    pub database: DatabaseConfig,
    pub compute: ComputeConfig,
    pub ports: PortsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub cidr: String,
    pub subnet_mask: u8,
    pub nat_gateways: u32,
    pub availability_zones: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub engine_version: String,
    /// Logical database created on first boot
    pub name: String,
    pub username: String,
    /// Named secret holding the password; the value never appears here
    pub secret_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    pub instance_type: String,
    /// Boot payload, read byte-for-byte at evaluation time
    pub user_data_path: PathBuf,
    /// Pre-existing IAM role resolved by name at apply time
    pub role_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortsConfig {
    /// Listener port, open to the world
    pub http: u16,
    /// Application port, reachable from the load balancer only
    pub app: u16,
    /// Database port, reachable from the instances only
    pub database: u16,
    /// SSH port, reachable from the instances only
    pub ssh: u16,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: "WebStack".to_string(),
            network: NetworkConfig::default(),
            database: DatabaseConfig::default(),
            compute: ComputeConfig::default(),
            ports: PortsConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: "10.10.0.0/16".to_string(),
            subnet_mask: 24,
            nat_gateways: 1,
            availability_zones: vec!["us-east-1a".to_string(), "us-east-1b".to_string()],
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine_version: "3.04.0".to_string(),
            name: "Population".to_string(),
            username: "testuser".to_string(),
            secret_name: "database-admin".to_string(),
        }
    }
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            instance_type: "t2.small".to_string(),
            user_data_path: PathBuf::from("assets/userdata.sh"),
            role_name: "ec2_instance_role".to_string(),
        }
    }
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self { http: 80, app: 8443, database: 3306, ssh: 22 }
    }
}

impl StackConfig {
    /// Load the config, falling back to defaults when no file exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    bail!("config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::discover(),
        };
        let config = match path {
            Some(path) => {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("could not read config file {}", path.display()))?;
                let config: Self = toml::from_str(&content)
                    .with_context(|| format!("invalid TOML in {}", path.display()))?;
                log::debug!("loaded config from {}", path.display());
                config
            }
            None => {
                log::debug!("no config file found, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from("cumulo.toml");
        if local.exists() {
            return Some(local);
        }
        let home = dirs::home_dir()?.join(".config").join("cumulo").join("config.toml");
        home.exists().then_some(home)
    }

    /// Reject configs the declaration cannot be built from
    pub fn validate(&self) -> Result<()> {
        if self.stack_name.is_empty() {
            bail!("stack_name must not be empty");
        }
        if self.network.availability_zones.len() < 2 {
            bail!("at least two availability zones are required (the web servers are zone-spread)");
        }
        let mut zones = self.network.availability_zones.clone();
        zones.sort();
        zones.dedup();
        if zones.len() < self.network.availability_zones.len() {
            bail!("availability zones must be distinct");
        }
        if self.database.secret_name.is_empty() {
            bail!("database.secret_name must not be empty");
        }
        if self.compute.role_name.is_empty() {
            bail!("compute.role_name must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_reproduce_stock_topology() {
        let config = StackConfig::default();
        assert_eq!(config.network.cidr, "10.10.0.0/16");
        assert_eq!(config.network.nat_gateways, 1);
        assert_eq!(config.ports.http, 80);
        assert_eq!(config.ports.app, 8443);
        assert_eq!(config.ports.database, 3306);
        assert_eq!(config.ports.ssh, 22);
        assert_eq!(config.database.name, "Population");
        assert_eq!(config.compute.role_name, "ec2_instance_role");
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[database]\nname = \"Census\"\n").unwrap();
        let config = StackConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.database.name, "Census");
        assert_eq!(config.database.username, "testuser");
    }

    #[test]
    fn test_single_zone_rejected() {
        let mut config = StackConfig::default();
        config.network.availability_zones = vec!["us-east-1a".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_zones_rejected() {
        let mut config = StackConfig::default();
        config.network.availability_zones =
            vec!["us-east-1a".to_string(), "us-east-1a".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        assert!(StackConfig::load(Some(Path::new("/nonexistent/cumulo.toml"))).is_err());
    }
}
