//! Host configuration management

use anyhow::{Context, Result, anyhow};
use common::classifier::{VendorOverride, VendorTables};
use common::logging::LOG_LEVELS;
use common::scanner::FramerTiming;
use protocol::Role;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub host: HostSettings,
    #[serde(default)]
    pub scanner: ScannerSettings,
    #[serde(default)]
    pub printer: PrinterSettings,
    #[serde(default)]
    pub usb: UsbSettings,
    /// Vendor additions merged into the built-in classifier tables
    #[serde(default)]
    pub classifier: ClassifierSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSettings {
    pub log_level: String,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Keystroke framing timings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerSettings {
    /// Inter-key gap that closes a scan
    #[serde(default = "ScannerSettings::default_gap_timeout")]
    pub gap_timeout_ms: u64,
    /// Idle time after the last key before a scan is flushed
    #[serde(default = "ScannerSettings::default_auto_flush")]
    pub auto_flush_ms: u64,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            gap_timeout_ms: Self::default_gap_timeout(),
            auto_flush_ms: Self::default_auto_flush(),
        }
    }
}

impl ScannerSettings {
    fn default_gap_timeout() -> u64 {
        100
    }

    fn default_auto_flush() -> u64 {
        150
    }

    pub fn timing(&self) -> FramerTiming {
        FramerTiming {
            gap: Duration::from_millis(self.gap_timeout_ms),
            auto_flush: Duration::from_millis(self.auto_flush_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterSettings {
    #[serde(default = "PrinterSettings::default_bulk_timeout")]
    pub bulk_timeout_ms: u64,
}

impl Default for PrinterSettings {
    fn default() -> Self {
        Self {
            bulk_timeout_ms: Self::default_bulk_timeout(),
        }
    }
}

impl PrinterSettings {
    fn default_bulk_timeout() -> u64 {
        5000
    }

    pub fn bulk_timeout(&self) -> Duration {
        Duration::from_millis(self.bulk_timeout_ms)
    }
}

/// Report descriptor access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbSettings {
    #[serde(default = "UsbSettings::default_descriptor_timeout")]
    pub descriptor_timeout_ms: u64,
    /// Read buffer for GET_DESCRIPTOR; longer descriptors are truncated
    #[serde(default = "UsbSettings::default_descriptor_buffer_len")]
    pub descriptor_buffer_len: usize,
}

impl Default for UsbSettings {
    fn default() -> Self {
        Self {
            descriptor_timeout_ms: Self::default_descriptor_timeout(),
            descriptor_buffer_len: Self::default_descriptor_buffer_len(),
        }
    }
}

impl UsbSettings {
    fn default_descriptor_timeout() -> u64 {
        1000
    }

    fn default_descriptor_buffer_len() -> usize {
        1024
    }

    pub fn descriptor_timeout(&self) -> Duration {
        Duration::from_millis(self.descriptor_timeout_ms)
    }
}

/// Hex vendor ids to allow or deny for one role
///
/// # Example Configuration
/// ```toml
/// [classifier.scanner]
/// allow = ["0x2dd6"]
/// deny = ["0x1a40"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorListSettings {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierSettings {
    #[serde(default)]
    pub scanner: VendorListSettings,
    #[serde(default)]
    pub keyboard: VendorListSettings,
    #[serde(default)]
    pub printer: VendorListSettings,
    #[serde(default)]
    pub card_reader: VendorListSettings,
}

impl ClassifierSettings {
    fn roles(&self) -> [(Role, &VendorListSettings); 4] {
        [
            (Role::Scanner, &self.scanner),
            (Role::Keyboard, &self.keyboard),
            (Role::Printer, &self.printer),
            (Role::CardReader, &self.card_reader),
        ]
    }
}

impl HostConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            expand_path(&p)
        } else {
            Self::candidate_paths()
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: HostConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let path = expand_path(path);
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("pos-hid").join("host.toml")
        } else {
            PathBuf::from(".config/pos-hid/host.toml")
        }
    }

    fn candidate_paths() -> Vec<PathBuf> {
        vec![Self::default_path(), PathBuf::from("/etc/pos-hid/host.toml")]
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.host.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.host.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        if self.scanner.gap_timeout_ms == 0 || self.scanner.auto_flush_ms == 0 {
            return Err(anyhow!("Scanner timings must be greater than 0 ms"));
        }

        if self.usb.descriptor_buffer_len == 0 {
            return Err(anyhow!("descriptor_buffer_len must be greater than 0"));
        }

        // Catches conflicts and malformed ids before the tables are built
        self.vendor_tables()?;

        Ok(())
    }

    /// Built-in vendor tables with the configured additions merged in
    pub fn vendor_tables(&self) -> Result<VendorTables> {
        let mut tables = VendorTables::builtin();
        for (role, lists) in self.classifier.roles() {
            let overrides = VendorOverride {
                allow: parse_ids(&lists.allow, role)?,
                deny: parse_ids(&lists.deny, role)?,
            };
            tables
                .apply(role, &overrides)
                .with_context(|| format!("Invalid [classifier] section for {}", role))?;
        }
        Ok(tables)
    }

    /// Validate a hex vendor id
    pub fn validate_hex_id(id: &str) -> Result<u16> {
        let hex_part = id
            .strip_prefix("0x")
            .or_else(|| id.strip_prefix("0X"))
            .ok_or_else(|| {
                anyhow!(
                    "Invalid vendor id '{}', must start with '0x' (e.g., '0x1234')",
                    id
                )
            })?;

        if hex_part.is_empty() || hex_part.len() > 4 {
            return Err(anyhow!(
                "Invalid vendor id '{}', hex part must be 1-4 digits",
                id
            ));
        }

        u16::from_str_radix(hex_part, 16)
            .map_err(|_| anyhow!("Invalid vendor id '{}', not a valid hex number", id))
    }
}

fn parse_ids(ids: &[String], role: Role) -> Result<Vec<u16>> {
    ids.iter()
        .map(|id| {
            HostConfig::validate_hex_id(id).with_context(|| format!("In vendor list for {}", role))
        })
        .collect()
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();
        assert_eq!(config.host.log_level, "info");
        assert_eq!(config.scanner.gap_timeout_ms, 100);
        assert_eq!(config.scanner.auto_flush_ms, 150);
        assert_eq!(config.printer.bulk_timeout_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_hex_id() {
        assert_eq!(HostConfig::validate_hex_id("0x1a86").unwrap(), 0x1a86);
        assert_eq!(HostConfig::validate_hex_id("0XABCD").unwrap(), 0xabcd);
        assert!(HostConfig::validate_hex_id("1a86").is_err());
        assert!(HostConfig::validate_hex_id("0x").is_err());
        assert!(HostConfig::validate_hex_id("0x12345").is_err());
        assert!(HostConfig::validate_hex_id("0xGHIJ").is_err());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = HostConfig::default();
        config.host.log_level = "verbose".to_string();
        assert!(config.validate().is_err());

        config.host.log_level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timing_rejected() {
        let mut config = HostConfig::default();
        config.scanner.auto_flush_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("host.toml");

        let mut config = HostConfig::default();
        config.host.log_level = "debug".to_string();
        config.classifier.scanner.allow = vec!["0x1eab".to_string()];
        config.save(&path).unwrap();

        let loaded = HostConfig::load(Some(path)).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.vendor_tables().unwrap().get(Role::Scanner).unwrap().is_allowed(0x1eab));
    }

    #[test]
    fn test_conflicting_vendor_lists_rejected() {
        let mut config = HostConfig::default();
        config.classifier.printer.allow = vec!["0x0416".to_string()];
        config.classifier.printer.deny = vec!["0x0416".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timing_conversion() {
        let timing = ScannerSettings {
            gap_timeout_ms: 80,
            auto_flush_ms: 200,
        }
        .timing();
        assert_eq!(timing.gap, Duration::from_millis(80));
        assert_eq!(timing.auto_flush, Duration::from_millis(200));
    }
}
