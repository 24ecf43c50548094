//! Daemon configuration.
//!
//! Loaded from a TOML file with a `[reader]` and a `[directory]` table.
//! Required keys must be present and non-empty; errors name the key.

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use gatehouse_core::UnitAddress;
use gatehouse_core::constants::DEFAULT_UNIT_ADDRESS;
use gatehouse_directory::DirectoryConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Missing required key: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Serial reader settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderSection {
    /// Serial device path, e.g. `/dev/ttyUSB0`.
    pub device: String,

    /// Two-digit unit address of the reader.
    #[serde(default = "default_unit_address")]
    pub unit_address: String,
}

fn default_unit_address() -> String {
    DEFAULT_UNIT_ADDRESS.to_string()
}

/// Complete daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub reader: ReaderSection,
    pub directory: DirectoryConfig,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("reader.device", &self.reader.device),
            ("directory.host", &self.directory.host),
            ("directory.bind_dn", &self.directory.bind_dn),
            ("directory.password", &self.directory.password),
            ("directory.search_base", &self.directory.search_base),
            ("directory.id_field", &self.directory.id_field),
            (
                "directory.location_code_field",
                &self.directory.location_code_field,
            ),
            ("directory.username_field", &self.directory.username_field),
            ("directory.disabled_field", &self.directory.disabled_field),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(key));
            }
        }

        self.unit_address()?;

        if self.directory.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "directory.timeout_ms",
                message: "must be greater than zero".into(),
            });
        }

        Ok(())
    }

    /// The reader's unit address.
    pub fn unit_address(&self) -> Result<UnitAddress, ConfigError> {
        UnitAddress::new(&self.reader.unit_address).map_err(|e| ConfigError::Invalid {
            key: "reader.unit_address",
            message: e.to_string(),
        })
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

/// Human-readable summary with the password redacted.
impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let directory = &self.directory;

        writeln!(f, "Reader:")?;
        writeln!(f, "  device:              {}", self.reader.device)?;
        writeln!(f, "  unit address:        {}", self.reader.unit_address)?;
        writeln!(f, "Directory:")?;
        writeln!(f, "  host:                {}", directory.host)?;
        writeln!(f, "  bind dn:             {}", directory.bind_dn)?;
        writeln!(f, "  password:            <redacted>")?;
        writeln!(f, "  search base:         {}", directory.search_base)?;
        writeln!(f, "  id field:            {}", directory.id_field)?;
        writeln!(f, "  location code field: {}", directory.location_code_field)?;
        writeln!(f, "  username field:      {}", directory.username_field)?;
        writeln!(f, "  disabled field:      {}", directory.disabled_field)?;
        write!(f, "  timeout:             {} ms", directory.timeout_ms)
    }
}
