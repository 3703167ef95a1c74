//! Interval algebra over event sets -- conflicts, busy-time merging, and
//! free-slot search -- with explicit denial-of-service bounds.
//!
//! Two intervals overlap iff `a.start < b.end && b.start < a.end`; strict on
//! both boundaries, so back-to-back events are never conflicts. The 5-minute
//! adjacency tolerance in [`ConflictResolver::get_busy_times`] is a coarser,
//! display-only notion and never feeds conflict detection.
//!
//! Every entry point validates its window first. A window wider than the
//! configured ceiling is rejected outright: a silently truncated answer
//! about availability would be wrong, not merely incomplete.

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

use crate::error::{Result, VaultError};
use crate::model::{Event, TimeSlot, WorkingHours};

/// Widest window any single query may span, in days.
pub const MAX_DATE_RANGE_DAYS: i64 = 365;
/// Soft cap on events per check; pairwise comparison is O(n²).
pub const MAX_EVENTS_PER_CHECK: usize = 1000;
/// Busy slots starting within this many minutes of the previous slot's end
/// are merged when adjacency merging is requested.
const MERGE_TOLERANCE_MINUTES: i64 = 5;

/// How serious a detected conflict is, by busy-participant count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Two or more events whose intervals overlap.
///
/// Deduplicated via a canonical key over the sorted participant ids, the
/// covering slot, the sorted calendar names, and the severity -- so the same
/// physical conflict discovered from either participant's perspective
/// collapses to one entry, whatever the input order was.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    /// Covering span of all participants (no single-event attribution).
    pub slot: TimeSlot,
    /// Participants, sorted by event id.
    pub events: Vec<Event>,
    /// Distinct calendar names involved, sorted.
    pub calendars: Vec<String>,
    pub severity: Severity,
}

/// Canonical dedup key for [`Conflict`]. Order-independent by construction:
/// every list in it is sorted before insertion.
#[derive(Debug, PartialEq, Eq, Hash)]
struct ConflictKey {
    event_ids: Vec<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    calendars: Vec<String>,
    severity: Severity,
}

impl Conflict {
    fn key(&self) -> ConflictKey {
        let mut event_ids: Vec<String> = self.events.iter().map(|e| e.id.clone()).collect();
        event_ids.sort();
        ConflictKey {
            event_ids,
            start: self.slot.start,
            end: self.slot.end,
            calendars: self.calendars.clone(),
            severity: self.severity,
        }
    }
}

/// Stateless-per-call scheduling reasoner. Holds only immutable
/// configuration, so concurrent callers need no coordination.
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    working_hours: WorkingHours,
    default_tz: Tz,
    max_range_days: i64,
    max_events_per_check: usize,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictResolver {
    pub fn new() -> Self {
        ConflictResolver {
            working_hours: WorkingHours::default(),
            default_tz: chrono_tz::UTC,
            max_range_days: MAX_DATE_RANGE_DAYS,
            max_events_per_check: MAX_EVENTS_PER_CHECK,
        }
    }

    pub fn with_working_hours(mut self, working_hours: WorkingHours) -> Self {
        self.working_hours = working_hours;
        self
    }

    /// Timezone assigned to slots whose event carries no timezone tag.
    pub fn with_default_timezone(mut self, tz: Tz) -> Self {
        self.default_tz = tz;
        self
    }

    pub fn with_limits(mut self, max_range_days: i64, max_events_per_check: usize) -> Self {
        self.max_range_days = max_range_days;
        self.max_events_per_check = max_events_per_check;
        self
    }

    /// Find all sets of overlapping events within `[start, end)`.
    ///
    /// One conflict is emitted per event with at least one overlap partner,
    /// covering that event and all its partners; identical conflicts seen
    /// from different participants' perspectives are deduplicated. Severity
    /// follows the busy-participant count: more than two is critical, two is
    /// an error, otherwise a warning.
    ///
    /// Events missing either endpoint are skipped -- there is no interval to
    /// compare.
    ///
    /// # Errors
    /// `RangeTooWide` / `InvalidWindow` if the window fails validation.
    pub fn find_conflicts(
        &self,
        events: &[Event],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Conflict>> {
        self.validate_window(start, end)?;
        self.check_event_count(events.len());

        // One slot per event, window-filtered but not clipped.
        let slots: Vec<(TimeSlot, &Event)> = events
            .iter()
            .filter_map(|event| self.event_slot(event).map(|slot| (slot, event)))
            .filter(|(slot, _)| slot.start < end && start < slot.end)
            .collect();

        let mut seen: HashSet<ConflictKey> = HashSet::new();
        let mut conflicts = Vec::new();

        for (i, (slot, event)) in slots.iter().enumerate() {
            let partners: Vec<&(TimeSlot, &Event)> = slots
                .iter()
                .enumerate()
                .filter(|(j, (other, _))| *j != i && slot.overlaps(other))
                .map(|(_, pair)| pair)
                .collect();
            if partners.is_empty() {
                continue;
            }

            let mut participants: Vec<&Event> = Vec::with_capacity(partners.len() + 1);
            participants.push(*event);
            participants.extend(partners.iter().map(|(_, e)| *e));
            participants.sort_by(|a, b| a.id.cmp(&b.id));

            let cover_start = participants
                .iter()
                .filter_map(|e| e.start)
                .min()
                .unwrap_or(slot.start);
            let cover_end = participants
                .iter()
                .filter_map(|e| e.end)
                .max()
                .unwrap_or(slot.end);

            let mut calendars: Vec<String> =
                participants.iter().map(|e| e.calendar.clone()).collect();
            calendars.sort();
            calendars.dedup();

            let busy_count = participants.iter().filter(|e| e.is_busy()).count();
            let severity = if busy_count > 2 {
                Severity::Critical
            } else if busy_count > 1 {
                Severity::Error
            } else {
                Severity::Warning
            };

            // The min-id participant's timezone keeps the tag independent
            // of discovery order.
            let conflict = Conflict {
                slot: TimeSlot::new(cover_start, cover_end, self.event_timezone(participants[0])),
                events: participants.into_iter().cloned().collect(),
                calendars,
                severity,
            };
            if seen.insert(conflict.key()) {
                conflicts.push(conflict);
            }
        }

        // Participant ids break ties between conflicts sharing a span, so
        // the output order is independent of the input order.
        conflicts.sort_by_key(|c| {
            let ids: Vec<String> = c.events.iter().map(|e| e.id.clone()).collect();
            (c.slot.start, c.slot.end, ids)
        });
        Ok(conflicts)
    }

    /// Busy events clipped to `[start, end)`, sorted by start.
    ///
    /// Events not marked busy, missing an endpoint, or whose clipped
    /// interval collapses are discarded.
    pub fn get_busy_slots(
        &self,
        events: &[Event],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>> {
        self.validate_window(start, end)?;
        self.check_event_count(events.len());

        let mut slots: Vec<TimeSlot> = events
            .iter()
            .filter(|event| event.is_busy())
            .filter_map(|event| {
                let mut slot = self.event_slot(event)?;
                slot.start = slot.start.max(start);
                slot.end = slot.end.min(end);
                (slot.start < slot.end).then_some(slot)
            })
            .collect();
        slots.sort_by_key(|slot| (slot.start, slot.end));
        Ok(slots)
    }

    /// Busy intervals, optionally merged into a minimal covering set.
    ///
    /// With `merge_adjacent`, a slot starting at or before the previous
    /// slot's end plus five minutes is absorbed into it; absorbed intervals
    /// lose their single-event attribution.
    pub fn get_busy_times(
        &self,
        events: &[Event],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        merge_adjacent: bool,
    ) -> Result<Vec<TimeSlot>> {
        let slots = self.get_busy_slots(events, start, end)?;
        if !merge_adjacent {
            return Ok(slots);
        }

        let tolerance = Duration::minutes(MERGE_TOLERANCE_MINUTES);
        let mut merged: Vec<TimeSlot> = Vec::new();
        for slot in slots {
            match merged.last_mut() {
                Some(last) if slot.start <= last.end + tolerance => {
                    last.end = last.end.max(slot.end);
                    last.calendar = None;
                    last.event_id = None;
                }
                _ => merged.push(slot),
            }
        }
        Ok(merged)
    }

    /// Gaps of at least `duration_minutes` between busy intervals.
    ///
    /// Walks the sorted busy slots with a forward-clamped cursor, emitting
    /// each qualifying gap. With `only_working_hours`, every gap is split
    /// per calendar day into the configured working window (in its
    /// timezone) and day segments shorter than the duration are dropped.
    ///
    /// # Errors
    /// `RangeTooWide` / `InvalidWindow` if the window fails validation.
    pub fn find_free_slots(
        &self,
        events: &[Event],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        duration_minutes: i64,
        only_working_hours: bool,
    ) -> Result<Vec<TimeSlot>> {
        let busy = self.get_busy_slots(events, start, end)?;
        let needed = Duration::minutes(duration_minutes);

        let mut free = Vec::new();
        let mut cursor = start;
        let emit_gap = |gap_start: DateTime<Utc>, gap_end: DateTime<Utc>, free: &mut Vec<TimeSlot>| {
            if only_working_hours {
                free.extend(self.split_into_working_hours(gap_start, gap_end, needed));
            } else if gap_end - gap_start >= needed {
                free.push(TimeSlot::new(gap_start, gap_end, self.default_tz));
            }
        };

        for slot in &busy {
            if slot.start > cursor {
                emit_gap(cursor, slot.start, &mut free);
            }
            // Busy slots may overlap each other; never move backwards.
            cursor = cursor.max(slot.end);
        }
        if cursor < end {
            emit_gap(cursor, end, &mut free);
        }
        Ok(free)
    }

    /// Test a proposed slot against every event's own (non-clipped)
    /// interval. Returns whether it is free, plus the conflicting events
    /// when it is not.
    pub fn check_availability(
        &self,
        events: &[Event],
        proposed: &TimeSlot,
    ) -> Result<(bool, Option<Vec<Event>>)> {
        self.validate_window(proposed.start, proposed.end)?;
        self.check_event_count(events.len());

        let conflicting: Vec<Event> = events
            .iter()
            .filter(|event| match (event.start, event.end) {
                (Some(ev_start), Some(ev_end)) => {
                    ev_start < proposed.end && proposed.start < ev_end
                }
                _ => false,
            })
            .cloned()
            .collect();

        if conflicting.is_empty() {
            Ok((true, None))
        } else {
            Ok((false, Some(conflicting)))
        }
    }

    /// Window guard run by every entry point before any per-event work.
    fn validate_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
        if start >= end {
            return Err(VaultError::InvalidWindow {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        let days = (end - start).num_days();
        if days > self.max_range_days {
            return Err(VaultError::RangeTooWide {
                days,
                max_days: self.max_range_days,
            });
        }
        Ok(())
    }

    /// Soft O(n²) guard: log, never reject.
    fn check_event_count(&self, count: usize) {
        if count > self.max_events_per_check {
            warn!(
                count,
                max = self.max_events_per_check,
                "event count exceeds the pairwise-comparison guideline"
            );
        }
    }

    /// Slot for an event's own interval, tagged with the event's timezone
    /// or the resolver default. `None` when either endpoint is missing.
    fn event_slot(&self, event: &Event) -> Option<TimeSlot> {
        let start = event.start?;
        let end = event.end?;
        Some(TimeSlot {
            start,
            end,
            calendar: Some(event.calendar.clone()),
            event_id: Some(event.id.clone()),
            timezone: self.event_timezone(event),
        })
    }

    /// The event's own timezone tag when it parses, the resolver default
    /// otherwise.
    fn event_timezone(&self, event: &Event) -> Tz {
        event
            .timezone
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(self.default_tz)
    }

    /// Split a free gap into per-day working-hours segments of at least
    /// `needed` length. Day iteration is bounded by the range ceiling, so a
    /// malformed gap cannot loop unboundedly.
    fn split_into_working_hours(
        &self,
        gap_start: DateTime<Utc>,
        gap_end: DateTime<Utc>,
        needed: Duration,
    ) -> Vec<TimeSlot> {
        let tz = self.working_hours.timezone;
        let mut day = gap_start.with_timezone(&tz).date_naive();
        let last_day = gap_end.with_timezone(&tz).date_naive();

        let mut segments = Vec::new();
        let mut iterations: i64 = 0;
        while day <= last_day && iterations <= self.max_range_days {
            iterations += 1;

            let window_start = tz
                .from_local_datetime(&day.and_time(self.working_hours.start))
                .earliest();
            let window_end = tz
                .from_local_datetime(&day.and_time(self.working_hours.end))
                .earliest();
            if let (Some(ws), Some(we)) = (window_start, window_end) {
                let seg_start = gap_start.max(ws.with_timezone(&Utc));
                let seg_end = gap_end.min(we.with_timezone(&Utc));
                if seg_start < seg_end && seg_end - seg_start >= needed {
                    segments.push(TimeSlot::new(seg_start, seg_end, tz));
                }
            }

            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        segments
    }
}
