use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const ENV_CCP_URL: &str = "SOFTPANEL_CCP_URL";
const ENV_REGION: &str = "SOFTPANEL_REGION";

#[derive(Debug, Clone, Deserialize)]
pub struct PanelConfig {
    /// Endpoint URL of the embedded contact control panel.
    pub ccp_url: String,
    /// Region identifier the embedding library routes through.
    pub region: String,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    #[serde(default)]
    pub popup: PopupOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PopupOptions {
    #[serde(default = "default_popup_width")]
    pub width: u32,
    #[serde(default = "default_popup_height")]
    pub height: u32,
}

fn default_popup_width() -> u32 {
    500
}

fn default_popup_height() -> u32 {
    700
}

impl Default for PopupOptions {
    fn default() -> Self {
        Self {
            width: default_popup_width(),
            height: default_popup_height(),
        }
    }
}

/// Delays and intervals used by the panel cores. Defaults are the production
/// values; tests compress them so timing-sensitive paths run in milliseconds.
#[derive(Debug, Clone)]
pub struct PanelTiming {
    /// How long the probed microphone stream is held open before its tracks
    /// are stopped. The grant outlives the stream; holding it briefly keeps
    /// the permission warm for the widget.
    pub mic_warm_hold: Duration,
    /// Wait between a successful widget init call and reporting Ready. The
    /// widget mounts its nested frame asynchronously and exposes no
    /// completion callback, so this delay stands in for a readiness signal.
    /// Replace it outright if the library ever grows a real readiness event.
    pub widget_settle_delay: Duration,
    /// Interval of the popup liveness poll. Closing happens outside this
    /// process, so polling is the only way to observe it.
    pub popup_poll_interval: Duration,
    /// How long the "copied" acknowledgement stays up before reverting.
    pub copy_ack_ttl: Duration,
}

impl Default for PanelTiming {
    fn default() -> Self {
        Self {
            mic_warm_hold: Duration::from_secs(1),
            widget_settle_delay: Duration::from_secs(2),
            popup_poll_interval: Duration::from_secs(1),
            copy_ack_ttl: Duration::from_secs(2),
        }
    }
}

impl PanelConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path))?;
        let config: PanelConfig =
            toml::from_str(&content).with_context(|| format!("invalid config file: {}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config from process environment, the way a hosting shell
    /// supplies it.
    pub fn from_env() -> Result<Self> {
        let ccp_url = std::env::var(ENV_CCP_URL).unwrap_or_default();
        let region = std::env::var(ENV_REGION).unwrap_or_default();
        let config = Self {
            ccp_url,
            region,
            log_level: None,
            log_file: None,
            popup: PopupOptions::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ccp_url.trim().is_empty() {
            bail!("ccp_url must not be empty");
        }
        if self.region.trim().is_empty() {
            bail!("region must not be empty");
        }
        Url::parse(&self.ccp_url)
            .with_context(|| format!("ccp_url is not a valid URL: {}", self.ccp_url))?;
        Ok(())
    }
}
