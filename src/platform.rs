use crate::session::widget::WidgetInitOptions;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifier of the host-page node the widget is injected into. The session
/// controller owns it exclusively once a session is built; nothing else may
/// write into that node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountNode(String);

impl MountNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// Size, position and chrome of the popup window. The feature string format
/// is the host environment's contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFeatures {
    pub width: u32,
    pub height: u32,
    pub left: u32,
    pub top: u32,
    pub resizable: bool,
    pub scrollbars: bool,
    pub toolbar: bool,
    pub menubar: bool,
    pub location: bool,
    pub status: bool,
}

/// Gap kept between the popup and the right screen edge.
const POPUP_MARGIN: u32 = 50;
const POPUP_TOP: u32 = 50;

impl WindowFeatures {
    /// Fixed-size, fixed-feature window anchored near the top-right corner.
    pub fn top_right(screen: ScreenSize, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            left: screen.width.saturating_sub(width + POPUP_MARGIN),
            top: POPUP_TOP,
            resizable: true,
            scrollbars: true,
            toolbar: false,
            menubar: false,
            location: false,
            status: true,
        }
    }

    pub fn to_feature_string(&self) -> String {
        let flag = |on: bool| if on { "yes" } else { "no" };
        format!(
            "width={},height={},left={},top={},resizable={},scrollbars={},toolbar={},menubar={},location={},status={}",
            self.width,
            self.height,
            self.left,
            self.top,
            flag(self.resizable),
            flag(self.scrollbars),
            flag(self.toolbar),
            flag(self.menubar),
            flag(self.location),
            flag(self.status),
        )
    }
}

/// Why microphone acquisition failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MicDeniedReason {
    /// The user or the embedding frame refused the permission prompt.
    PermissionDenied,
    /// No capture device present.
    NoDevice,
    /// The device is held by another application.
    DeviceBusy,
    Other(String),
}

impl std::fmt::Display for MicDeniedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MicDeniedReason::PermissionDenied => write!(f, "permission denied"),
            MicDeniedReason::NoDevice => write!(f, "no capture device found"),
            MicDeniedReason::DeviceBusy => write!(f, "device is busy"),
            MicDeniedReason::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for MicDeniedReason {}

/// A live microphone capture handle. Stopping tracks is idempotent.
pub trait MicStream: Send + Sync {
    fn stop_tracks(&self);
}

/// Handle to an externally-opened window. Liveness can only be observed by
/// asking, never pushed.
pub trait PopupWindow: Send + Sync {
    fn is_closed(&self) -> bool;
    fn focus(&self);
    fn close(&self);
}

/// The host environment the panel runs inside. Obtained once at session start
/// and passed explicitly to the controller, so the whole lifecycle is
/// testable against a fake host.
#[async_trait]
pub trait PanelHost: Send + Sync {
    /// Fetch and inject the external embedding library. One-shot; resolves
    /// when the library reports itself loaded.
    async fn load_widget_library(&self) -> Result<()>;

    /// Remove the injected library from the page.
    fn release_widget_library(&self);

    /// Invoke the embedding library's init call, mounting widget UI into the
    /// given node. The options object is the library's own contract.
    fn init_widget(&self, mount: &MountNode, options: &WidgetInitOptions) -> Result<()>;

    /// Ask for microphone access. Resolves once the permission prompt is
    /// answered.
    async fn request_microphone(&self) -> Result<Box<dyn MicStream>, MicDeniedReason>;

    fn screen_size(&self) -> ScreenSize;

    /// Open a named window. An error means the host environment refused the
    /// creation (popup blocker); there is no handle to poll in that case.
    fn open_window(
        &self,
        url: &str,
        name: &str,
        features: &WindowFeatures,
    ) -> Result<Box<dyn PopupWindow>>;
}

/// Opaque id of a transient off-screen text field inserted for the copy
/// fallback.
pub type ScratchFieldId = u64;

/// Clipboard primitives of the host environment. The platform write path is
/// expected to fail inside restricted embedded frames; the scratch-field
/// primitives back the select-and-exec-copy fallback.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClipboardAccess: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<()>;

    fn insert_scratch_field(&self, text: &str) -> Result<ScratchFieldId>;

    /// Select the scratch field's content and execute the copy command.
    fn exec_copy(&self, field: ScratchFieldId) -> Result<()>;

    fn remove_scratch_field(&self, field: ScratchFieldId);
}
