use crate::config::PanelConfig;
use serde::{Deserialize, Serialize};

/// Configuration object handed to the embedding library's init call. Field
/// names and units belong to that library's contract and are passed through
/// unchanged; only the endpoint URL and region come from our own config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetInitOptions {
    pub ccp_url: String,
    pub login_popup: bool,
    pub login_popup_auto_close: bool,
    pub login_options: LoginOptions,
    pub region: String,
    pub softphone: SoftphoneOptions,
    pub page_options: PageOptions,
    /// Acknowledgment timeout, milliseconds.
    pub ccp_ack_timeout: u64,
    /// Handshake timeout, milliseconds.
    pub ccp_syn_timeout: u64,
    /// Load timeout, milliseconds.
    pub ccp_load_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOptions {
    pub auto_close: bool,
    pub height: u32,
    pub width: u32,
    pub top: u32,
    pub left: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftphoneOptions {
    pub allow_framed_softphone: bool,
    pub disable_ringtone: bool,
    pub allow_framed_video_call: bool,
    pub allow_early_gum: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOptions {
    pub enable_audio_device_settings: bool,
    pub enable_video_device_settings: bool,
    pub enable_phone_type_settings: bool,
}

impl WidgetInitOptions {
    pub fn for_panel(config: &PanelConfig) -> Self {
        Self {
            ccp_url: config.ccp_url.clone(),
            login_popup: true,
            login_popup_auto_close: true,
            login_options: LoginOptions {
                auto_close: true,
                height: 600,
                width: 400,
                top: 0,
                left: 0,
            },
            region: config.region.clone(),
            softphone: SoftphoneOptions {
                allow_framed_softphone: true,
                disable_ringtone: false,
                allow_framed_video_call: true,
                allow_early_gum: true,
            },
            page_options: PageOptions {
                enable_audio_device_settings: true,
                enable_video_device_settings: true,
                enable_phone_type_settings: true,
            },
            ccp_ack_timeout: 5000,
            ccp_syn_timeout: 3000,
            ccp_load_timeout: 10000,
        }
    }
}
