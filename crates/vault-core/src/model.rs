//! Shared data types for the calendar vault.
//!
//! Configuration-time objects ([`Agent`], [`Calendar`], [`WorkingHours`]) are
//! built once at load and never mutated afterwards. Per-request objects
//! ([`Event`], [`TimeSlot`]) are created per call and discarded with the
//! response.

use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, VaultError};

/// Visibility policy attached to a calendar or a masked event copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    /// Full fidelity for everyone.
    Public,
    /// Full fidelity for agents the calendar is shared with.
    Shared,
    /// Details hidden entirely, including the time range.
    Private,
    /// Time range visible as an occupied block, details hidden.
    Masked,
}

impl PrivacyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Public => "public",
            PrivacyLevel::Shared => "shared",
            PrivacyLevel::Private => "private",
            PrivacyLevel::Masked => "masked",
        }
    }
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyLevel {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "public" => Ok(PrivacyLevel::Public),
            "shared" => Ok(PrivacyLevel::Shared),
            "private" => Ok(PrivacyLevel::Private),
            "masked" => Ok(PrivacyLevel::Masked),
            other => Err(VaultError::ConfigValidation(format!(
                "unknown privacy level '{}' (expected public, shared, private, or masked)",
                other
            ))),
        }
    }
}

/// An operation an agent may attempt on a calendar. Closed set — policy
/// checks never accept free-form action strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Edit,
    Delete,
    View,
    ViewBusy,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::View => "view",
            Action::ViewBusy => "view_busy",
        };
        f.write_str(name)
    }
}

/// An autonomous caller with its own identity and access grants.
///
/// Calendar names are stored normalized (trimmed, lowercased) in the order
/// the configuration listed them.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub id: String,
    pub calendars: Vec<String>,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_view_busy: bool,
}

/// A calendar known to the vault.
#[derive(Debug, Clone, PartialEq)]
pub struct Calendar {
    /// Normalized lookup key.
    pub name: String,
    /// Original casing, retained for presentation.
    pub display_name: String,
    /// Provider-specific name, when it differs from ours.
    pub external_name: Option<String>,
    pub privacy_level: PrivacyLevel,
    pub accessible_by: Vec<String>,
}

/// A calendar event as handed over by the sync layer.
///
/// The vault treats events as opaque records: recognized fields get typed
/// access, everything else rides along in `extra` and is preserved on full
/// copies but stripped on masked copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub calendar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub busy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<String>>,
    /// Privacy level stamped on a masked copy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy_level: Option<PrivacyLevel>,
    /// Marker set on any reduced-fidelity copy.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub masked: bool,
    /// Unrecognized fields, passed through untouched on full copies.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// Minimal event with just an id, calendar, and time range.
    pub fn new(
        id: impl Into<String>,
        calendar: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Event {
            id: id.into(),
            calendar: calendar.into(),
            start: Some(start),
            end: Some(end),
            busy: None,
            timezone: None,
            summary: None,
            description: None,
            location: None,
            attendees: None,
            privacy_level: None,
            masked: false,
            extra: Map::new(),
        }
    }

    /// Whether this event occupies its time range. Absent means busy.
    pub fn is_busy(&self) -> bool {
        self.busy.unwrap_or(true)
    }

    /// Build an event from an arbitrary JSON mapping.
    ///
    /// Datetimes may be RFC 3339 instants or naive local datetimes; naive
    /// inputs are interpreted in `default_tz` so every stored instant is
    /// timezone-aware. Unrecognized fields land in `extra`.
    pub fn from_value(value: &Value, default_tz: Tz) -> Result<Event> {
        let map = value.as_object().ok_or_else(|| {
            VaultError::ConfigValidation("event record must be a mapping".to_string())
        })?;

        let str_field = |key: &str| -> Option<String> {
            map.get(key).and_then(Value::as_str).map(str::to_string)
        };

        let start = match map.get("start").and_then(Value::as_str) {
            Some(raw) => Some(parse_datetime(raw, default_tz)?),
            None => None,
        };
        let end = match map.get("end").and_then(Value::as_str) {
            Some(raw) => Some(parse_datetime(raw, default_tz)?),
            None => None,
        };

        let attendees = map.get("attendees").and_then(Value::as_array).map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        });

        const KNOWN: &[&str] = &[
            "id",
            "calendar",
            "start",
            "end",
            "busy",
            "timezone",
            "summary",
            "description",
            "location",
            "attendees",
        ];
        let extra: Map<String, Value> = map
            .iter()
            .filter(|(k, _)| !KNOWN.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Event {
            id: str_field("id").unwrap_or_default(),
            calendar: str_field("calendar").unwrap_or_default(),
            start,
            end,
            busy: map.get("busy").and_then(Value::as_bool),
            timezone: str_field("timezone"),
            summary: str_field("summary"),
            description: str_field("description"),
            location: str_field("location"),
            attendees,
            privacy_level: None,
            masked: false,
            extra,
        })
    }
}

/// Parse a datetime string into a UTC instant.
///
/// RFC 3339 inputs keep their offset; naive inputs are interpreted in
/// `default_tz` (earliest mapping on DST-ambiguous wall times).
pub fn parse_datetime(raw: &str, default_tz: Tz) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map_err(|_| VaultError::InvalidDatetime(raw.to_string()))?;
    default_tz
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| VaultError::InvalidDatetime(raw.to_string()))
}

/// A concrete span of time, optionally attributed to a calendar and event.
///
/// Immutable once constructed. Equality covers start, end, calendar, and
/// event id — the timezone tag is presentational and excluded.
#[derive(Debug, Clone)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub calendar: Option<String>,
    pub event_id: Option<String>,
    pub timezone: Tz,
}

impl TimeSlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, timezone: Tz) -> Self {
        TimeSlot {
            start,
            end,
            calendar: None,
            event_id: None,
            timezone,
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Strict interval overlap — touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl PartialEq for TimeSlot {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start
            && self.end == other.end
            && self.calendar == other.calendar
            && self.event_id == other.event_id
    }
}

impl Eq for TimeSlot {}

/// Daily window that free-slot search is constrained to when requested.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub timezone: Tz,
}

impl Default for WorkingHours {
    fn default() -> Self {
        WorkingHours {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            timezone: chrono_tz::UTC,
        }
    }
}

/// Trim and lowercase a calendar name for lookup.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
