use crate::config::PanelTiming;
use crate::event::{EventSender, PanelEvent};
use crate::get_timestamp;
use crate::platform::ClipboardAccess;
use crate::resolve::PhoneField;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Copies the current field value to the clipboard, with the scratch-field
/// fallback for restricted embedded frames and a transient acknowledgement
/// that reverts on its own.
pub struct CopyController {
    clipboard: Arc<dyn ClipboardAccess>,
    field: PhoneField,
    event_sender: EventSender,
    timing: PanelTiming,
    token: CancellationToken,
    copied: Arc<AtomicBool>,
    // Bumped on every acknowledgement so a stale revert task cannot clobber
    // a newer one.
    generation: Arc<AtomicU64>,
}

impl CopyController {
    pub fn new(
        clipboard: Arc<dyn ClipboardAccess>,
        field: PhoneField,
        event_sender: EventSender,
        timing: PanelTiming,
        token: CancellationToken,
    ) -> Self {
        Self {
            clipboard,
            field,
            event_sender,
            timing,
            token,
            copied: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether the "copied" acknowledgement is currently up.
    pub fn copied(&self) -> bool {
        self.copied.load(Ordering::SeqCst)
    }

    /// Normalize the field in place and copy it. A double failure (platform
    /// write and fallback both) is logged and otherwise silent; there is no
    /// further remedy to offer the user.
    pub async fn copy(&self) {
        let value = self.field.commit_edit();
        if value.is_empty() {
            debug!("nothing to copy");
            return;
        }
        let ok = match self.clipboard.write_text(&value).await {
            Ok(()) => true,
            Err(e) => {
                debug!("platform clipboard write failed, trying scratch field: {}", e);
                match self.fallback_copy(&value) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("clipboard copy failed after fallback: {}", e);
                        false
                    }
                }
            }
        };
        if ok {
            self.acknowledge();
        }
    }

    /// Select-and-exec-copy through a transient off-screen field. The field
    /// comes back out whether or not the copy took.
    fn fallback_copy(&self, text: &str) -> Result<()> {
        let scratch = self.clipboard.insert_scratch_field(text)?;
        let result = self.clipboard.exec_copy(scratch);
        self.clipboard.remove_scratch_field(scratch);
        result
    }

    fn acknowledge(&self) {
        self.copied.store(true, Ordering::SeqCst);
        self.event_sender
            .send(PanelEvent::CopyAck(get_timestamp(), true))
            .ok();

        let generation = self.generation.clone();
        let this_generation = generation.fetch_add(1, Ordering::SeqCst) + 1;
        let copied = self.copied.clone();
        let event_sender = self.event_sender.clone();
        let ttl = self.timing.copy_ack_ttl;
        let token = self.token.clone();
        tokio::spawn(async move {
            select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(ttl) => {}
            }
            if generation.load(Ordering::SeqCst) != this_generation {
                return;
            }
            copied.store(false, Ordering::SeqCst);
            event_sender
                .send(PanelEvent::CopyAck(get_timestamp(), false))
                .ok();
        });
    }
}
