use serde::{Deserialize, Serialize};

pub mod controller;
pub mod widget;

#[cfg(test)]
mod tests;

pub use controller::{SessionController, SessionControllerBuilder};
pub use widget::WidgetInitOptions;

/// Bootstrap progress of one embedding attempt. `Failed` is terminal for the
/// session; the operator reloads the page to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitState {
    Idle,
    LoadingLibrary,
    InitializingWidget,
    Ready,
    Failed,
}

/// Where the widget UI currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelMode {
    Embedded,
    Popup,
}

/// Outcome of the microphone side probe. Advisory only; a denial never
/// blocks widget initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MicPermission {
    Unknown,
    Granted,
    Denied,
}
