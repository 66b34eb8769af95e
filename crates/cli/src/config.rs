//! `vibrate` configuration file.
//!
//! ```toml
//! [hidl]
//! device = "/dev/hwbinder"
//!
//! [aidl]
//! device = "/dev/binder"
//! protocol = "aidl3"
//! ```
//!
//! Every key is optional. Only the device nodes and the AIDL protocol
//! generation can be changed; the search order is fixed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use binder::{BinderTransport, RpcProtocol};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vibrator::protocol::{AIDL_DEVICE, HIDL_DEVICE};
use vibrator::{search_order, DevicePath, Domain};

/// Configuration read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/vibrate.toml";

/// Contents of `vibrate.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// The `[hidl]` table.
    #[serde(default)]
    pub hidl: HidlConfig,
    /// The `[aidl]` table.
    #[serde(default)]
    pub aidl: AidlConfig,
}

/// Settings of the HIDL domain, searched first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HidlConfig {
    /// Binder device node of the HIDL domain.
    #[serde(default = "default_hidl_device")]
    pub device: String,
}

impl Default for HidlConfig {
    fn default() -> Self {
        Self {
            device: default_hidl_device(),
        }
    }
}

/// Settings of the AIDL domain, searched second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AidlConfig {
    /// Binder device node of the AIDL domain.
    #[serde(default = "default_aidl_device")]
    pub device: String,
    /// Service-manager protocol generation of the AIDL device.
    #[serde(default)]
    pub protocol: RpcProtocol,
}

impl Default for AidlConfig {
    fn default() -> Self {
        Self {
            device: default_aidl_device(),
            protocol: RpcProtocol::default(),
        }
    }
}

fn default_hidl_device() -> String {
    HIDL_DEVICE.to_owned()
}

fn default_aidl_device() -> String {
    AIDL_DEVICE.to_owned()
}

impl CliConfig {
    /// Domains to search, HIDL first.
    pub fn domains(&self) -> Result<[Domain; 2]> {
        let hidl = DevicePath::new(self.hidl.device.as_str())
            .context("hidl.device must not be empty")?;
        let aidl = DevicePath::new(self.aidl.device.as_str())
            .context("aidl.device must not be empty")?;
        Ok(search_order(hidl, aidl))
    }

    /// Binder transport speaking the configured protocol on each device.
    pub fn transport(&self) -> BinderTransport {
        BinderTransport::new(self.aidl.protocol)
            .with_device_protocol(self.hidl.device.clone(), RpcProtocol::Hidl)
            .with_device_protocol(self.aidl.device.clone(), self.aidl.protocol)
    }
}

/// Loads the configuration.
///
/// An explicitly named file must exist and parse. The default file is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig> {
    let path: PathBuf = match explicit {
        Some(path) => path.to_owned(),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !path.exists() {
                debug!("no configuration file, using defaults");
                return Ok(CliConfig::default());
            }
            path
        }
    };

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}
