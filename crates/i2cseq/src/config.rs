//! Configuration loading
//!
//! Layers, lowest precedence first: built-in defaults, the user config file
//! (`<config dir>/i2cseq/config.toml`), `i2cseq.toml` in the working
//! directory, an explicit `--config` file, then `I2CSEQ_BUS` and
//! `I2CSEQ_DEVICE` from the environment. A layer only overrides the keys it
//! sets; named sequences merge by name.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use etcetera::{BaseStrategy, choose_base_strategy};
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;

use crate::{
    bus::device_path,
    compiler::{CompileOptions, EmptySegmentPolicy},
    notation::parse_sequence,
    token::Token,
};

/// File name looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "i2cseq.toml";

pub const ENV_BUS: &str = "I2CSEQ_BUS";
pub const ENV_DEVICE: &str = "I2CSEQ_DEVICE";

/// Effective configuration after every layer is merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bus number, used as `/dev/i2c-<bus>` unless `device` is set
    pub bus: u8,
    /// Explicit device node
    pub device: Option<PathBuf>,
    /// Fail instead of emitting zero-length segments
    pub reject_empty_segments: bool,
    /// Named sequences in text notation
    pub sequences: IndexMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: 1,
            device: None,
            reject_empty_segments: false,
            sequences: IndexMap::new(),
        }
    }
}

/// One configuration file, where every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigLayer {
    bus: Option<u8>,
    device: Option<PathBuf>,
    reject_empty_segments: Option<bool>,
    sequences: IndexMap<String, String>,
}

/// Where to look for configuration files
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub user_file: Option<PathBuf>,
    pub project_dir: Option<PathBuf>,
    pub explicit_file: Option<PathBuf>,
}

impl ConfigSources {
    /// Standard locations: the user config dir and the working directory
    pub fn discover(explicit_file: Option<&Path>) -> Self {
        let user_file = choose_base_strategy()
            .map(|strategy| strategy.config_dir().join("i2cseq").join("config.toml"))
            .ok();
        let project_dir = std::env::current_dir().ok();

        Self {
            user_file,
            project_dir,
            explicit_file: explicit_file.map(Path::to_path_buf),
        }
    }

    /// Load and merge every layer, then apply environment overrides
    pub fn load(&self) -> Result<Config> {
        let mut config = Config::default();

        if let Some(user_file) = self.user_file.as_ref().filter(|path| path.is_file()) {
            config.merge(read_layer(user_file)?);
        }

        if let Some(project_dir) = &self.project_dir {
            let project_file = project_dir.join(PROJECT_CONFIG_FILE);
            if project_file.is_file() {
                config.merge(read_layer(&project_file)?);
            }
        }

        // An explicit file must exist
        if let Some(explicit_file) = &self.explicit_file {
            config.merge(read_layer(explicit_file)?);
        }

        config.apply_env()?;
        Ok(config)
    }
}

impl Config {
    /// Load configuration from the standard locations
    pub fn load(explicit_file: Option<&Path>) -> Result<Self> {
        ConfigSources::discover(explicit_file).load()
    }

    /// Parse a complete configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let layer: ConfigLayer = toml::from_str(text).context("invalid configuration")?;
        let mut config = Self::default();
        config.merge(layer);
        Ok(config)
    }

    /// Device node this configuration points at
    pub fn device_path(&self) -> PathBuf {
        self.device.clone().unwrap_or_else(|| device_path(self.bus))
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            empty_segments: if self.reject_empty_segments {
                EmptySegmentPolicy::Reject
            } else {
                EmptySegmentPolicy::Allow
            },
        }
    }

    /// Parse a named sequence
    pub fn sequence(&self, name: &str) -> Result<Vec<Token>> {
        let text = self
            .sequences
            .get(name)
            .ok_or_else(|| anyhow!("no sequence named '{name}' in configuration"))?;
        parse_sequence(text).with_context(|| format!("invalid sequence '{name}'"))
    }

    fn merge(&mut self, layer: ConfigLayer) {
        if let Some(bus) = layer.bus {
            self.bus = bus;
        }
        if layer.device.is_some() {
            self.device = layer.device;
        }
        if let Some(reject) = layer.reject_empty_segments {
            self.reject_empty_segments = reject;
        }
        self.sequences.extend(layer.sequences);
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(bus) = std::env::var(ENV_BUS) {
            self.bus = bus
                .trim()
                .parse()
                .with_context(|| format!("{ENV_BUS}={bus} is not a bus number"))?;
            debug!("Bus overridden from environment: {}", self.bus);
        }
        if let Some(device) = std::env::var_os(ENV_DEVICE) {
            self.device = Some(PathBuf::from(device));
            debug!("Device overridden from environment");
        }
        Ok(())
    }
}

fn read_layer(path: &Path) -> Result<ConfigLayer> {
    debug!("Reading configuration from {}", path.display());
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid configuration {}", path.display()))
}
