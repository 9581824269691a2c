use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::audio::{DataFlow, DeviceRole, SelectorMode};
use crate::playback::{SampleEncoding, ShareMode, WaveFormat};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub devices: DeviceConfig,

    #[serde(default)]
    pub renderer: RendererConfig,

    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub console_output: bool,
    pub file_output: bool,
    pub json_format: bool,
    pub log_dir: Option<PathBuf>,
}

/// Which endpoints a registry tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFilter {
    Render,
    Capture,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub filter: DeviceFilter,
    pub role: DeviceRole,
    pub selector_mode: SelectorMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub share_mode: ShareMode,
    pub event_sync: bool,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub encoding: SampleEncoding,
    pub pad_short_reads: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            json_format: false,
            log_dir: None,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            filter: DeviceFilter::Render,
            role: DeviceRole::Multimedia,
            selector_mode: SelectorMode::Auto,
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            share_mode: ShareMode::Shared,
            event_sync: true,
            latency_ms: 100,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            bits_per_sample: 16,
            encoding: SampleEncoding::Pcm,
            pad_short_reads: true,
        }
    }
}

impl DeviceFilter {
    pub fn as_flow(self) -> Option<DataFlow> {
        match self {
            DeviceFilter::Render => Some(DataFlow::Render),
            DeviceFilter::Capture => Some(DataFlow::Capture),
            DeviceFilter::All => None,
        }
    }
}

impl RendererConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

impl ProviderConfig {
    /// Format reported by the switch provider while no source is installed.
    pub fn fallback_format(&self) -> WaveFormat {
        WaveFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: self.bits_per_sample,
            encoding: self.encoding,
        }
    }
}

impl Config {
    pub fn default_config_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to get home directory")?;

        Ok(home_dir.join(".config/audio-session-sync/config.toml"))
    }

    /// Reject values no pipeline or source could work with.
    pub fn validate(&self) -> Result<()> {
        let provider = &self.provider;
        if provider.sample_rate == 0 {
            anyhow::bail!("provider.sample_rate must be greater than zero");
        }
        if provider.channels == 0 {
            anyhow::bail!("provider.channels must be greater than zero");
        }
        if !matches!(provider.bits_per_sample, 8 | 16 | 24 | 32) {
            anyhow::bail!(
                "provider.bits_per_sample must be 8, 16, 24 or 32 (got {})",
                provider.bits_per_sample
            );
        }
        if provider.encoding == SampleEncoding::Float && provider.bits_per_sample != 32 {
            anyhow::bail!("float samples must be 32-bit");
        }
        if self.renderer.latency_ms == 0 {
            warn!("renderer.latency_ms is 0, the pipeline will pick its own minimum");
        }
        Ok(())
    }
}
