use crate::event::{EventSender, PanelEvent};
use crate::get_timestamp;
use crate::resolve::sdk::{AgentSdk, Topic};
use crate::resolve::{extract, normalize_number, PhoneCandidate, PhoneField, Tier};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Best-effort discovery of the customer's phone number across three tiers
/// of decreasing specificity: profile record, conversation metadata,
/// free-text transcript.
///
/// Tier 1 runs unconditionally and only seeds the field. Tiers 2 and 3 race;
/// whichever succeeds first locks the field in and every later report
/// no-ops. The lock lives in the field itself, not in the listeners, so
/// stickiness holds regardless of delivery order.
pub struct PhoneResolver {
    sdk: Arc<dyn AgentSdk>,
    field: PhoneField,
    event_sender: EventSender,
    /// Transcript lines already scanned in earlier deliveries.
    scanned_lines: Arc<AtomicUsize>,
}

impl PhoneResolver {
    pub fn new(sdk: Arc<dyn AgentSdk>, field: PhoneField, event_sender: EventSender) -> Self {
        Self {
            sdk,
            field,
            event_sender,
            scanned_lines: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn field(&self) -> PhoneField {
        self.field.clone()
    }

    /// Initialize the SDK and register the three listeners. If init fails
    /// the listeners are never registered and the pipeline stays inert.
    pub fn start(&self) -> Result<()> {
        self.sdk
            .init()
            .context("chat session sdk failed to initialize")?;
        self.register_profile_probe();
        self.register_metadata_probe();
        self.register_transcript_scan();
        debug!("phone resolution pipeline registered");
        Ok(())
    }

    fn apply_seed(field: &PhoneField, event_sender: &EventSender, candidate: PhoneCandidate) {
        let normalized = normalize_number(&candidate.raw);
        if field.seed(&normalized) {
            info!(tier = ?candidate.tier, number = %normalized, "phone number seeded");
            event_sender
                .send(PanelEvent::NumberResolved(
                    get_timestamp(),
                    candidate.tier,
                    normalized,
                ))
                .ok();
        } else {
            debug!(tier = ?candidate.tier, "seed discarded, field already settled");
        }
    }

    fn apply_lock_in(field: &PhoneField, event_sender: &EventSender, candidate: PhoneCandidate) {
        let normalized = normalize_number(&candidate.raw);
        if field.lock_in(candidate.tier, &normalized) {
            info!(tier = ?candidate.tier, number = %normalized, "phone number locked in");
            event_sender
                .send(PanelEvent::NumberResolved(
                    get_timestamp(),
                    candidate.tier,
                    normalized,
                ))
                .ok();
        } else {
            debug!(tier = ?candidate.tier, "candidate discarded, field already settled");
        }
    }

    /// Tier 1: one-shot profile read. Always attempts to seed the display;
    /// it is expected, but not guaranteed, to land before tiers 2/3 report.
    fn register_profile_probe(&self) {
        let field = self.field.clone();
        let event_sender = self.event_sender.clone();
        self.sdk.get(
            Topic::VisitorProfile,
            Box::new(move |data| {
                if let Some(raw) = extract::from_named_fields(&data) {
                    Self::apply_seed(
                        &field,
                        &event_sender,
                        PhoneCandidate {
                            raw,
                            tier: Tier::Profile,
                        },
                    );
                } else {
                    debug!("no phone field on visitor profile");
                }
            }),
        );
    }

    /// Tier 2: one-shot metadata read, field names first, then survey
    /// answers.
    fn register_metadata_probe(&self) {
        let field = self.field.clone();
        let event_sender = self.event_sender.clone();
        self.sdk.get(
            Topic::ConversationInfo,
            Box::new(move |data| {
                if field.is_locked() {
                    return;
                }
                let raw = extract::from_named_fields(&data)
                    .or_else(|| extract::from_survey_answers(&data));
                match raw {
                    Some(raw) => Self::apply_lock_in(
                        &field,
                        &event_sender,
                        PhoneCandidate {
                            raw,
                            tier: Tier::Metadata,
                        },
                    ),
                    None => debug!("no phone candidate in conversation metadata"),
                }
            }),
        );
    }

    /// Tier 3: streaming transcript scan. Each delivery looks only at lines
    /// not seen before, in order.
    fn register_transcript_scan(&self) {
        let field = self.field.clone();
        let event_sender = self.event_sender.clone();
        let scanned_lines = self.scanned_lines.clone();
        self.sdk.bind(
            Topic::TranscriptLines,
            Box::new(move |data| {
                if field.is_locked() {
                    return;
                }
                let lines = extract::transcript_lines(&data);
                let start = scanned_lines.load(Ordering::SeqCst);
                if lines.len() < start {
                    // Shorter than what we have seen: the session restarted
                    // the transcript on us. Rescan from the top.
                    warn!(
                        seen = start,
                        delivered = lines.len(),
                        "transcript shrank, rescanning"
                    );
                    scanned_lines.store(0, Ordering::SeqCst);
                    return;
                }
                for line in &lines[start..] {
                    if let Some(raw) = extract::phone_in_text(line) {
                        Self::apply_lock_in(
                            &field,
                            &event_sender,
                            PhoneCandidate {
                                raw,
                                tier: Tier::Transcript,
                            },
                        );
                        break;
                    }
                }
                scanned_lines.store(lines.len(), Ordering::SeqCst);
            }),
        );
    }
}
