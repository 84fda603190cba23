use crate::config::{PanelConfig, PanelTiming, PopupOptions};
use crate::event::{EventReceiver, PanelEvent};
use crate::platform::{
    MicDeniedReason, MicStream, MountNode, PanelHost, PopupWindow, ScreenSize, WindowFeatures,
};
use crate::session::widget::WidgetInitOptions;
use crate::session::{InitState, MicPermission, PanelMode, SessionController, SessionControllerBuilder};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

#[derive(Default)]
struct FakeMic {
    stopped: AtomicBool,
}

impl MicStream for Arc<FakeMic> {
    fn stop_tracks(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeWindow {
    closed: AtomicBool,
    focus_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl PopupWindow for Arc<FakeWindow> {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn focus(&self) {
        self.focus_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
enum MicOutcome {
    #[default]
    Grant,
    Deny(MicDeniedReason),
}

#[derive(Default)]
struct FakeHost {
    load_calls: AtomicUsize,
    init_calls: AtomicUsize,
    open_calls: AtomicUsize,
    released: AtomicBool,
    fail_load: bool,
    fail_init: bool,
    block_popups: bool,
    /// When set, library load parks on this gate (never notified in tests
    /// that exercise teardown mid-bootstrap).
    hold_load: Option<Arc<Notify>>,
    mic: MicOutcome,
    mics: Mutex<Vec<Arc<FakeMic>>>,
    windows: Mutex<Vec<Arc<FakeWindow>>>,
}

#[async_trait]
impl PanelHost for FakeHost {
    async fn load_widget_library(&self) -> Result<()> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.hold_load {
            gate.notified().await;
        }
        if self.fail_load {
            return Err(anyhow!("script failed to load"));
        }
        Ok(())
    }

    fn release_widget_library(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    fn init_widget(&self, _mount: &MountNode, _options: &WidgetInitOptions) -> Result<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(anyhow!("widget init threw"));
        }
        Ok(())
    }

    async fn request_microphone(&self) -> Result<Box<dyn MicStream>, MicDeniedReason> {
        match &self.mic {
            MicOutcome::Grant => {
                let mic = Arc::new(FakeMic::default());
                self.mics.lock().unwrap().push(mic.clone());
                Ok(Box::new(mic))
            }
            MicOutcome::Deny(reason) => Err(reason.clone()),
        }
    }

    fn screen_size(&self) -> ScreenSize {
        ScreenSize {
            width: 1920,
            height: 1080,
        }
    }

    fn open_window(
        &self,
        _url: &str,
        _name: &str,
        _features: &WindowFeatures,
    ) -> Result<Box<dyn PopupWindow>> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.block_popups {
            return Err(anyhow!("popup blocked by host"));
        }
        let window = Arc::new(FakeWindow::default());
        self.windows.lock().unwrap().push(window.clone());
        Ok(Box::new(window))
    }
}

fn config() -> PanelConfig {
    PanelConfig {
        ccp_url: "https://example.my.connect.aws/ccp-v2/".to_string(),
        region: "us-east-1".to_string(),
        log_level: None,
        log_file: None,
        popup: PopupOptions::default(),
    }
}

fn fast_timing() -> PanelTiming {
    PanelTiming {
        mic_warm_hold: Duration::from_millis(20),
        widget_settle_delay: Duration::from_millis(20),
        popup_poll_interval: Duration::from_millis(10),
        copy_ack_ttl: Duration::from_millis(40),
    }
}

fn build_controller(host: Arc<FakeHost>) -> SessionController {
    build_controller_with_mount(host, MountNode::new("ccp-root"))
}

fn build_controller_with_mount(host: Arc<FakeHost>, mount: MountNode) -> SessionController {
    SessionControllerBuilder::new()
        .with_config(config())
        .with_host(host)
        .with_mount(mount)
        .with_timing(fast_timing())
        .build()
        .expect("failed to build controller")
}

async fn next_mode(receiver: &mut EventReceiver) -> PanelMode {
    timeout(Duration::from_secs(1), async {
        loop {
            if let PanelEvent::Mode(_, mode) = receiver.recv().await.unwrap() {
                return mode;
            }
        }
    })
    .await
    .expect("no mode event within deadline")
}

#[tokio::test]
async fn test_bootstrap_runs_once() {
    let host = Arc::new(FakeHost::default());
    let controller = Arc::new(build_controller(host.clone()));

    let (first, second) = tokio::join!(controller.bootstrap(), controller.bootstrap());
    first.unwrap();
    second.unwrap();
    controller.bootstrap().await.unwrap();

    assert_eq!(host.load_calls.load(Ordering::SeqCst), 1);
    assert_eq!(host.init_calls.load(Ordering::SeqCst), 1);
    assert_eq!(controller.init_state(), InitState::Ready);
}

#[tokio::test]
async fn test_empty_mount_refuses_bootstrap() {
    let host = Arc::new(FakeHost::default());
    let controller = build_controller_with_mount(host.clone(), MountNode::new("  "));

    assert!(controller.bootstrap().await.is_err());
    assert_eq!(host.load_calls.load(Ordering::SeqCst), 0);
    assert_eq!(controller.init_state(), InitState::Idle);
}

#[tokio::test]
async fn test_load_failure_is_terminal() {
    let host = Arc::new(FakeHost {
        fail_load: true,
        ..Default::default()
    });
    let controller = build_controller(host.clone());

    assert!(controller.bootstrap().await.is_err());
    assert_eq!(controller.init_state(), InitState::Failed);
    assert_eq!(host.init_calls.load(Ordering::SeqCst), 0);

    // Terminal: a second call is swallowed by the sticky flag, no retry.
    controller.bootstrap().await.unwrap();
    assert_eq!(host.load_calls.load(Ordering::SeqCst), 1);
    assert_eq!(controller.init_state(), InitState::Failed);
}

#[tokio::test]
async fn test_init_failure_is_terminal() {
    let host = Arc::new(FakeHost {
        fail_init: true,
        ..Default::default()
    });
    let controller = build_controller(host.clone());

    assert!(controller.bootstrap().await.is_err());
    assert_eq!(controller.init_state(), InitState::Failed);
    assert_eq!(host.load_calls.load(Ordering::SeqCst), 1);
    assert_eq!(host.init_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mic_denial_is_advisory_only() {
    let host = Arc::new(FakeHost {
        mic: MicOutcome::Deny(MicDeniedReason::PermissionDenied),
        ..Default::default()
    });
    let controller = build_controller(host.clone());

    controller.bootstrap().await.unwrap();
    assert_eq!(controller.mic_permission(), MicPermission::Denied);
    // The widget still comes up.
    assert_eq!(controller.init_state(), InitState::Ready);
    assert_eq!(host.init_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mic_stream_released_after_warm_hold() {
    let host = Arc::new(FakeHost::default());
    let controller = build_controller(host.clone());

    controller.bootstrap().await.unwrap();
    assert_eq!(controller.mic_permission(), MicPermission::Granted);

    sleep(Duration::from_millis(60)).await;
    let mics = host.mics.lock().unwrap();
    assert_eq!(mics.len(), 1);
    assert!(mics[0].stopped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_popup_dedup_focuses_existing() {
    let host = Arc::new(FakeHost::default());
    let controller = build_controller(host.clone());

    controller.open_popup().await.unwrap();
    controller.open_popup().await.unwrap();

    assert_eq!(host.open_calls.load(Ordering::SeqCst), 1);
    let windows = host.windows.lock().unwrap();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].focus_calls.load(Ordering::SeqCst), 1);
    assert_eq!(controller.mode(), PanelMode::Popup);
}

#[tokio::test]
async fn test_popup_blocked_is_surfaced() {
    let host = Arc::new(FakeHost {
        block_popups: true,
        ..Default::default()
    });
    let controller = build_controller(host.clone());
    let mut receiver = controller.subscribe();

    assert!(controller.open_popup().await.is_err());
    assert_eq!(controller.mode(), PanelMode::Embedded);

    let event = timeout(Duration::from_secs(1), receiver.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, PanelEvent::PopupBlocked(_, _)));

    // No handle was recorded, so the next attempt reaches the host again.
    assert!(controller.open_popup().await.is_err());
    assert_eq!(host.open_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_popup_close_reverts_to_embedded() {
    let host = Arc::new(FakeHost::default());
    let controller = build_controller(host.clone());
    let mut receiver = controller.subscribe();

    controller.open_popup().await.unwrap();
    assert_eq!(next_mode(&mut receiver).await, PanelMode::Popup);

    host.windows.lock().unwrap()[0]
        .closed
        .store(true, Ordering::SeqCst);

    assert_eq!(next_mode(&mut receiver).await, PanelMode::Embedded);
    assert_eq!(controller.mode(), PanelMode::Embedded);

    // Handle was cleared: reopening creates a fresh window.
    controller.open_popup().await.unwrap();
    assert_eq!(host.open_calls.load(Ordering::SeqCst), 2);
    assert_eq!(host.windows.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_teardown_mid_bootstrap_leaves_no_trace() {
    let host = Arc::new(FakeHost {
        hold_load: Some(Arc::new(Notify::new())),
        ..Default::default()
    });
    let controller = Arc::new(build_controller(host.clone()));

    let in_flight = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.bootstrap().await })
    };
    sleep(Duration::from_millis(20)).await;
    assert_eq!(controller.init_state(), InitState::LoadingLibrary);

    controller.shutdown().await;
    in_flight.await.unwrap().unwrap();

    // No state update after teardown, ever.
    sleep(Duration::from_millis(60)).await;
    assert_eq!(controller.init_state(), InitState::LoadingLibrary);
    assert!(host.released.load(Ordering::SeqCst));
    assert!(host.mics.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_shutdown_closes_popup_and_stops_mic() {
    let host = Arc::new(FakeHost::default());
    // Long warm hold keeps the probed stream alive into the shutdown.
    let controller = SessionControllerBuilder::new()
        .with_config(config())
        .with_host(host.clone())
        .with_mount(MountNode::new("ccp-root"))
        .with_timing(PanelTiming {
            mic_warm_hold: Duration::from_secs(30),
            ..fast_timing()
        })
        .build()
        .unwrap();

    controller.bootstrap().await.unwrap();
    controller.open_popup().await.unwrap();
    controller.shutdown().await;

    let windows = host.windows.lock().unwrap();
    assert_eq!(windows[0].close_calls.load(Ordering::SeqCst), 1);
    let mics = host.mics.lock().unwrap();
    assert!(mics[0].stopped.load(Ordering::SeqCst));
}
