//! Agent-appropriate event views without ever touching the canonical event.
//!
//! Every operation clones the input first and works only on the clone, so
//! two agents can never observe each other's view of the same record. The
//! mask table is an immutable value injected at construction, not process
//! state.
//!
//! A level missing from the mask table fails CLOSED: the maximal mask is
//! applied and a warning logged. Silently disclosing a private event under
//! an unexpected level would be a security defect.

use std::collections::HashMap;
use tracing::warn;

use crate::model::{Event, PrivacyLevel};

/// Placeholder summary for fully hidden events.
pub const PRIVATE_SUMMARY: &str = "🔒 Private Event";
/// Placeholder summary for occupied-block masking.
pub const BUSY_SUMMARY: &str = "Busy";

/// Display rules for one privacy level.
#[derive(Debug, Clone, PartialEq)]
pub struct PrivacyMask {
    pub level: PrivacyLevel,
    pub show_time: bool,
    pub show_busy_status: bool,
    pub show_location: bool,
    pub show_attendees: bool,
    pub show_details: bool,
    /// Replacement summary; `None` keeps the original.
    pub masked_summary: Option<String>,
}

impl PrivacyMask {
    /// Full-fidelity mask: everything preserved.
    pub fn full(level: PrivacyLevel) -> Self {
        PrivacyMask {
            level,
            show_time: true,
            show_busy_status: true,
            show_location: true,
            show_attendees: true,
            show_details: true,
            masked_summary: None,
        }
    }

    /// Everything suppressed, summary replaced. The maximal mask.
    pub fn hidden(level: PrivacyLevel) -> Self {
        PrivacyMask {
            level,
            show_time: false,
            show_busy_status: false,
            show_location: false,
            show_attendees: false,
            show_details: false,
            masked_summary: Some(PRIVATE_SUMMARY.to_string()),
        }
    }

    /// Occupied-block mask: time and busy status survive, details do not.
    pub fn busy_only(level: PrivacyLevel) -> Self {
        PrivacyMask {
            level,
            show_time: true,
            show_busy_status: true,
            show_location: false,
            show_attendees: false,
            show_details: false,
            masked_summary: Some(BUSY_SUMMARY.to_string()),
        }
    }
}

/// Produces reduced-fidelity event copies according to a mask table.
#[derive(Debug, Clone)]
pub struct PrivacyEngine {
    masks: HashMap<PrivacyLevel, PrivacyMask>,
    custom_masks: HashMap<String, PrivacyMask>,
}

impl Default for PrivacyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivacyEngine {
    /// Engine with the default mask table: public/shared full fidelity,
    /// private fully hidden, masked reduced to an occupied block.
    pub fn new() -> Self {
        let mut masks = HashMap::new();
        masks.insert(PrivacyLevel::Public, PrivacyMask::full(PrivacyLevel::Public));
        masks.insert(PrivacyLevel::Shared, PrivacyMask::full(PrivacyLevel::Shared));
        masks.insert(
            PrivacyLevel::Private,
            PrivacyMask::hidden(PrivacyLevel::Private),
        );
        masks.insert(
            PrivacyLevel::Masked,
            PrivacyMask::busy_only(PrivacyLevel::Masked),
        );
        PrivacyEngine {
            masks,
            custom_masks: HashMap::new(),
        }
    }

    /// Engine with a caller-supplied mask table. Levels absent from the
    /// table hit the fail-closed fallback in [`apply_mask`].
    pub fn with_masks(masks: HashMap<PrivacyLevel, PrivacyMask>) -> Self {
        PrivacyEngine {
            masks,
            custom_masks: HashMap::new(),
        }
    }

    /// Register a reusable named mask. Configuration-time extension point.
    pub fn register_mask(&mut self, name: impl Into<String>, mask: PrivacyMask) {
        self.custom_masks.insert(name.into(), mask);
    }

    /// Retrieve a previously registered named mask.
    pub fn custom_mask(&self, name: &str) -> Option<&PrivacyMask> {
        self.custom_masks.get(name)
    }

    /// Produce a sanitized copy of `event` for the given level.
    ///
    /// The input is cloned first and never mutated. With `custom` set, that
    /// mask wins over the level's table entry. A level with no table entry
    /// and no custom mask gets the maximal mask (fail closed) and a warning.
    pub fn apply_mask(
        &self,
        event: &Event,
        level: PrivacyLevel,
        custom: Option<&PrivacyMask>,
    ) -> Event {
        let fallback;
        let mask = match custom.or_else(|| self.masks.get(&level)) {
            Some(mask) => mask,
            None => {
                warn!(level = %level, "no mask configured for privacy level, masking maximally");
                fallback = PrivacyMask::hidden(level);
                &fallback
            }
        };

        let mut copy = event.clone();
        if let Some(summary) = &mask.masked_summary {
            copy.summary = Some(summary.clone());
        }
        if !mask.show_details {
            copy.description = None;
            // Pass-through fields are details too.
            copy.extra.clear();
        }
        if !mask.show_location {
            copy.location = None;
        }
        if !mask.show_attendees {
            copy.attendees = None;
        }
        if !mask.show_time {
            copy.start = None;
            copy.end = None;
        }
        if !mask.show_busy_status {
            copy.busy = None;
        }
        copy.privacy_level = Some(level);
        copy.masked = true;
        copy
    }

    /// Produce the view of `event` appropriate to an agent.
    ///
    /// Direct calendar access yields a full copy regardless of level;
    /// otherwise private/masked levels are masked and public/shared pass
    /// through as full copies.
    pub fn apply_for_agent(
        &self,
        event: &Event,
        agent_has_direct_access: bool,
        level: PrivacyLevel,
    ) -> Event {
        if agent_has_direct_access {
            return event.clone();
        }
        match level {
            PrivacyLevel::Private | PrivacyLevel::Masked => self.apply_mask(event, level, None),
            PrivacyLevel::Public | PrivacyLevel::Shared => event.clone(),
        }
    }

    /// Reduce an event to the minimal "occupied" shape: summary `"Busy"`,
    /// the time range, and the busy flag. Nothing else survives.
    pub fn busy_block(&self, event: &Event) -> Event {
        Event {
            id: String::new(),
            calendar: String::new(),
            start: event.start,
            end: event.end,
            busy: Some(true),
            timezone: None,
            summary: Some(BUSY_SUMMARY.to_string()),
            description: None,
            location: None,
            attendees: None,
            privacy_level: None,
            masked: true,
            extra: serde_json::Map::new(),
        }
    }
}
