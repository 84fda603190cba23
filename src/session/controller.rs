use crate::config::{PanelConfig, PanelTiming};
use crate::event::{EventSender, PanelEvent};
use crate::get_timestamp;
use crate::platform::{MicDeniedReason, MicStream, MountNode, PanelHost, PopupWindow, WindowFeatures};
use crate::session::widget::WidgetInitOptions;
use crate::session::{InitState, MicPermission, PanelMode};
use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::select;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Name handed to the host when opening the popup, so repeated opens target
/// the same native window.
const POPUP_WINDOW_NAME: &str = "SoftphonePanel";

struct SessionState {
    init_state: InitState,
    mode: PanelMode,
    mic_permission: MicPermission,
}

struct PopupSlot {
    window: Arc<dyn PopupWindow>,
    poll_token: CancellationToken,
}

pub struct SessionControllerBuilder {
    pub config: Option<PanelConfig>,
    pub host: Option<Arc<dyn PanelHost>>,
    pub mount: Option<MountNode>,
    pub cancel_token: Option<CancellationToken>,
    pub event_sender: Option<EventSender>,
    pub timing: Option<PanelTiming>,
}

/// Owns the lifecycle of one embedding attempt: one-shot widget bootstrap,
/// the microphone side probe, embedded/popup mode and teardown.
pub struct SessionController {
    pub session_id: crate::SessionId,
    pub created_at: DateTime<Utc>,
    pub config: PanelConfig,
    pub token: CancellationToken,
    timing: PanelTiming,
    host: Arc<dyn PanelHost>,
    mount: MountNode,
    event_sender: EventSender,
    state: Arc<RwLock<SessionState>>,
    // Sticky: never reset while this controller is alive, however many times
    // bootstrap() is called.
    bootstrapped: AtomicBool,
    mic_stream: Arc<Mutex<Option<Box<dyn MicStream>>>>,
    popup: Arc<Mutex<Option<PopupSlot>>>,
}

impl SessionControllerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            host: None,
            mount: None,
            cancel_token: None,
            event_sender: None,
            timing: None,
        }
    }

    pub fn with_config(mut self, config: PanelConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_host(mut self, host: Arc<dyn PanelHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn with_mount(mut self, mount: MountNode) -> Self {
        self.mount = Some(mount);
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn with_event_sender(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    pub fn with_timing(mut self, timing: PanelTiming) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn build(self) -> Result<SessionController> {
        let config = self.config.ok_or_else(|| anyhow!("config is required"))?;
        config.validate()?;
        let host = self.host.ok_or_else(|| anyhow!("panel host is required"))?;
        let mount = self.mount.ok_or_else(|| anyhow!("mount node is required"))?;
        let event_sender = self
            .event_sender
            .unwrap_or_else(|| tokio::sync::broadcast::channel(32).0);
        Ok(SessionController {
            session_id: format!("panel:{}", uuid::Uuid::new_v4()),
            created_at: Utc::now(),
            config,
            token: self.cancel_token.unwrap_or_else(CancellationToken::new),
            timing: self.timing.unwrap_or_default(),
            host,
            mount,
            event_sender,
            state: Arc::new(RwLock::new(SessionState {
                init_state: InitState::Idle,
                mode: PanelMode::Embedded,
                mic_permission: MicPermission::Unknown,
            })),
            bootstrapped: AtomicBool::new(false),
            mic_stream: Arc::new(Mutex::new(None)),
            popup: Arc::new(Mutex::new(None)),
        })
    }
}

impl SessionController {
    pub fn init_state(&self) -> InitState {
        self.state.read().unwrap().init_state
    }

    pub fn mode(&self) -> PanelMode {
        self.state.read().unwrap().mode
    }

    pub fn mic_permission(&self) -> MicPermission {
        self.state.read().unwrap().mic_permission
    }

    pub fn subscribe(&self) -> crate::event::EventReceiver {
        self.event_sender.subscribe()
    }

    fn set_init_state(&self, next: InitState) {
        if self.token.is_cancelled() {
            return;
        }
        self.state.write().unwrap().init_state = next;
        self.event_sender
            .send(PanelEvent::State(get_timestamp(), next))
            .ok();
    }

    fn set_mic_permission(&self, status: MicPermission) {
        if self.token.is_cancelled() {
            return;
        }
        self.state.write().unwrap().mic_permission = status;
        self.event_sender
            .send(PanelEvent::MicPermission(get_timestamp(), status))
            .ok();
    }

    fn set_mode(&self, mode: PanelMode) {
        if self.token.is_cancelled() {
            return;
        }
        Self::flip_mode(&self.state, &self.event_sender, mode);
    }

    fn flip_mode(state: &Arc<RwLock<SessionState>>, event_sender: &EventSender, mode: PanelMode) {
        state.write().unwrap().mode = mode;
        event_sender
            .send(PanelEvent::Mode(get_timestamp(), mode))
            .ok();
    }

    /// Run the one-shot bootstrap: inject the embedding library, probe the
    /// microphone, invoke the widget init call, wait out the settle delay.
    ///
    /// Safe to call any number of times; only the first call with a non-empty
    /// mount node does work. A load or init failure is terminal for this
    /// session (no retry) but never affects the hosting application beyond
    /// the returned error.
    pub async fn bootstrap(&self) -> Result<()> {
        if self.mount.is_empty() {
            bail!("mount node is empty, nothing to bootstrap into");
        }
        if self.bootstrapped.swap(true, Ordering::SeqCst) {
            debug!(session_id = self.session_id, "bootstrap already ran, ignoring");
            return Ok(());
        }

        info!(
            session_id = self.session_id,
            mount = self.mount.id(),
            "bootstrapping softphone panel"
        );
        self.set_init_state(InitState::LoadingLibrary);

        let loaded = select! {
            _ = self.token.cancelled() => return Ok(()),
            r = self.host.load_widget_library() => r,
        };
        if let Err(e) = loaded {
            warn!(session_id = self.session_id, "widget library failed to load: {}", e);
            self.set_init_state(InitState::Failed);
            return Err(e.context("widget library failed to load"));
        }
        debug!(session_id = self.session_id, "widget library loaded");
        self.set_init_state(InitState::InitializingWidget);

        // Side probe: warm the permission before the widget needs it. A
        // denial is advisory only and never blocks the init call.
        self.probe_microphone().await;
        if self.token.is_cancelled() {
            return Ok(());
        }

        let options = WidgetInitOptions::for_panel(&self.config);
        if let Err(e) = self.host.init_widget(&self.mount, &options) {
            warn!(session_id = self.session_id, "widget init failed: {}", e);
            self.set_init_state(InitState::Failed);
            return Err(e.context("widget init failed"));
        }

        // The widget mounts its nested frame asynchronously and offers no
        // completion callback; see PanelTiming::widget_settle_delay.
        select! {
            _ = self.token.cancelled() => return Ok(()),
            _ = tokio::time::sleep(self.timing.widget_settle_delay) => {}
        }
        self.set_init_state(InitState::Ready);
        info!(session_id = self.session_id, "softphone panel ready");
        Ok(())
    }

    async fn probe_microphone(&self) {
        let result = select! {
            _ = self.token.cancelled() => return,
            r = self.host.request_microphone() => r,
        };
        match result {
            Ok(stream) => {
                self.set_mic_permission(MicPermission::Granted);
                *self.mic_stream.lock().await = Some(stream);

                let mic_stream = self.mic_stream.clone();
                let hold = self.timing.mic_warm_hold;
                let token = self.token.child_token();
                tokio::spawn(async move {
                    select! {
                        _ = token.cancelled() => {}
                        _ = tokio::time::sleep(hold) => {}
                    }
                    if let Some(stream) = mic_stream.lock().await.take() {
                        stream.stop_tracks();
                    }
                });
            }
            Err(reason) => {
                self.set_mic_permission(MicPermission::Denied);
                match reason {
                    MicDeniedReason::PermissionDenied => warn!(
                        session_id = self.session_id,
                        "microphone blocked; embedded frames often cannot prompt, popup mode is the way out"
                    ),
                    MicDeniedReason::NoDevice => {
                        warn!(session_id = self.session_id, "no microphone device found")
                    }
                    MicDeniedReason::DeviceBusy => warn!(
                        session_id = self.session_id,
                        "microphone is in use by another application"
                    ),
                    MicDeniedReason::Other(msg) => {
                        warn!(session_id = self.session_id, "microphone unavailable: {}", msg)
                    }
                }
            }
        }
    }

    /// Open the panel in a popup window, or focus the one already open.
    ///
    /// A refused window creation is surfaced both as the returned error and
    /// as a PopupBlocked event; no handle or liveness poll is left behind.
    pub async fn open_popup(&self) -> Result<()> {
        let mut slot = self.popup.lock().await;
        if let Some(existing) = slot.as_ref() {
            if !existing.window.is_closed() {
                debug!(session_id = self.session_id, "popup already open, focusing");
                existing.window.focus();
                return Ok(());
            }
            // Stale handle the poll has not reaped yet.
            existing.poll_token.cancel();
            *slot = None;
        }

        let features = WindowFeatures::top_right(
            self.host.screen_size(),
            self.config.popup.width,
            self.config.popup.height,
        );
        let window: Arc<dyn PopupWindow> =
            match self
                .host
                .open_window(&self.config.ccp_url, POPUP_WINDOW_NAME, &features)
            {
                Ok(window) => Arc::from(window),
                Err(e) => {
                    warn!(session_id = self.session_id, "popup blocked: {}", e);
                    self.event_sender
                        .send(PanelEvent::PopupBlocked(get_timestamp(), e.to_string()))
                        .ok();
                    return Err(e.context("popup window was blocked by the host environment"));
                }
            };

        let poll_token = self.spawn_liveness_poll(window.clone());
        *slot = Some(PopupSlot {
            window,
            poll_token,
        });
        drop(slot);

        self.set_mode(PanelMode::Popup);
        info!(session_id = self.session_id, "panel moved to popup window");
        Ok(())
    }

    /// Recurring check of whether the external window is still open; the
    /// browser offers no cross-window close event, so this cannot be pushed.
    fn spawn_liveness_poll(&self, window: Arc<dyn PopupWindow>) -> CancellationToken {
        let poll_token = self.token.child_token();
        let popup = self.popup.clone();
        let state = self.state.clone();
        let event_sender = self.event_sender.clone();
        let interval = self.timing.popup_poll_interval;
        let session_id = self.session_id.clone();
        let task_token = poll_token.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick completes immediately
            loop {
                select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !window.is_closed() {
                            continue;
                        }
                        if task_token.is_cancelled() {
                            break;
                        }
                        debug!(session_id, "popup closed externally, back to embedded");
                        popup.lock().await.take();
                        Self::flip_mode(&state, &event_sender, PanelMode::Embedded);
                        break;
                    }
                }
            }
        });
        poll_token
    }

    /// Tear the session down: cancel pending continuations, close an open
    /// popup, stop a live microphone stream and release the injected
    /// library. Runs the same way from every state, including Failed.
    pub async fn shutdown(&self) {
        info!(session_id = self.session_id, "shutting down softphone panel");
        self.token.cancel();
        if let Some(slot) = self.popup.lock().await.take() {
            if !slot.window.is_closed() {
                slot.window.close();
            }
        }
        if let Some(stream) = self.mic_stream.lock().await.take() {
            stream.stop_tracks();
        }
        self.host.release_widget_library();
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        // Backstop for sessions dropped without shutdown(): cancelling the
        // token stops the poll task and makes the mic hold task release the
        // stream.
        self.token.cancel();
    }
}
