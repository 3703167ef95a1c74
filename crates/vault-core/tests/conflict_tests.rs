//! Tests for conflict detection — overlap boundaries, severity,
//! deduplication, and the DoS guards.

use chrono::{DateTime, Duration, TimeZone, Utc};
use vault_core::error::VaultError;
use vault_core::model::{Event, TimeSlot};
use vault_core::{ConflictResolver, Severity};

fn at(hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, min, 0).unwrap()
}

fn busy_event(id: &str, calendar: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Event {
    let mut event = Event::new(id, calendar, start, end);
    event.busy = Some(true);
    event
}

fn window() -> (DateTime<Utc>, DateTime<Utc>) {
    (at(0, 0), at(23, 59))
}

#[test]
fn two_overlapping_busy_events_are_one_error_conflict() {
    // Scenario: 09:00-10:00 and 09:30-10:30 on the same calendar.
    let events = vec![
        busy_event("a", "family", at(9, 0), at(10, 0)),
        busy_event("b", "family", at(9, 30), at(10, 30)),
    ];
    let (start, end) = window();

    let resolver = ConflictResolver::new();
    let conflicts = resolver.find_conflicts(&events, start, end).unwrap();

    assert_eq!(conflicts.len(), 1, "perspectives must collapse to one");
    let conflict = &conflicts[0];
    assert_eq!(conflict.severity, Severity::Error);
    assert_eq!(conflict.events.len(), 2);
    assert_eq!(conflict.calendars, vec!["family"]);
    assert_eq!(conflict.slot.start, at(9, 0));
    assert_eq!(conflict.slot.end, at(10, 30));
}

#[test]
fn back_to_back_events_are_not_a_conflict() {
    let events = vec![
        busy_event("a", "family", at(9, 0), at(10, 0)),
        busy_event("b", "family", at(10, 0), at(11, 0)),
    ];
    let (start, end) = window();

    let conflicts = ConflictResolver::new()
        .find_conflicts(&events, start, end)
        .unwrap();

    assert!(conflicts.is_empty(), "end == start must not conflict");
}

#[test]
fn one_minute_overlap_is_a_conflict() {
    let events = vec![
        busy_event("a", "family", at(9, 0), at(10, 0)),
        busy_event("b", "family", at(9, 59), at(11, 0)),
    ];
    let (start, end) = window();

    let conflicts = ConflictResolver::new()
        .find_conflicts(&events, start, end)
        .unwrap();

    assert_eq!(conflicts.len(), 1);
}

#[test]
fn conflicts_are_invariant_under_input_order() {
    let events = vec![
        busy_event("a", "family", at(9, 0), at(10, 0)),
        busy_event("b", "work", at(9, 30), at(10, 30)),
        busy_event("c", "family", at(14, 0), at(15, 0)),
    ];
    let mut reversed = events.clone();
    reversed.reverse();
    let (start, end) = window();

    let resolver = ConflictResolver::new();
    let forward = resolver.find_conflicts(&events, start, end).unwrap();
    let backward = resolver.find_conflicts(&reversed, start, end).unwrap();

    assert_eq!(forward, backward);
}

#[test]
fn three_busy_participants_are_critical() {
    let events = vec![
        busy_event("a", "family", at(9, 0), at(10, 0)),
        busy_event("b", "work", at(9, 15), at(10, 15)),
        busy_event("c", "school", at(9, 30), at(10, 30)),
    ];
    let (start, end) = window();

    let conflicts = ConflictResolver::new()
        .find_conflicts(&events, start, end)
        .unwrap();

    assert!(conflicts
        .iter()
        .any(|c| c.severity == Severity::Critical && c.events.len() == 3));
}

#[test]
fn free_events_downgrade_severity_to_warning() {
    let mut free_event = Event::new("b", "family", at(9, 30), at(10, 30));
    free_event.busy = Some(false);
    let events = vec![busy_event("a", "family", at(9, 0), at(10, 0)), free_event];
    let (start, end) = window();

    let conflicts = ConflictResolver::new()
        .find_conflicts(&events, start, end)
        .unwrap();

    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].severity, Severity::Warning);
}

#[test]
fn events_outside_the_window_are_ignored() {
    let events = vec![
        busy_event("a", "family", at(9, 0), at(10, 0)),
        busy_event("b", "family", at(9, 30), at(10, 30)),
    ];

    let conflicts = ConflictResolver::new()
        .find_conflicts(&events, at(12, 0), at(18, 0))
        .unwrap();

    assert!(conflicts.is_empty());
}

#[test]
fn events_without_endpoints_are_skipped() {
    let mut timeless = Event::new("b", "family", at(9, 0), at(10, 0));
    timeless.start = None;
    let events = vec![busy_event("a", "family", at(9, 0), at(10, 0)), timeless];
    let (start, end) = window();

    let conflicts = ConflictResolver::new()
        .find_conflicts(&events, start, end)
        .unwrap();

    assert!(conflicts.is_empty());
}

#[test]
fn cross_calendar_conflicts_list_both_calendars() {
    let events = vec![
        busy_event("a", "family", at(9, 0), at(10, 0)),
        busy_event("b", "work", at(9, 30), at(10, 30)),
    ];
    let (start, end) = window();

    let conflicts = ConflictResolver::new()
        .find_conflicts(&events, start, end)
        .unwrap();

    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].calendars, vec!["family", "work"]);
}

#[test]
fn oversized_range_is_rejected_before_any_work() {
    let start = at(0, 0);
    let end = start + Duration::days(366);
    let events = vec![busy_event("a", "family", at(9, 0), at(10, 0))];

    let err = ConflictResolver::new()
        .find_conflicts(&events, start, end)
        .unwrap_err();

    assert!(matches!(err, VaultError::RangeTooWide { days: 366, .. }));
}

#[test]
fn inverted_window_is_rejected() {
    let err = ConflictResolver::new()
        .find_conflicts(&[], at(10, 0), at(9, 0))
        .unwrap_err();

    assert!(matches!(err, VaultError::InvalidWindow { .. }));
}

#[test]
fn custom_range_limit_is_honored() {
    let resolver = ConflictResolver::new().with_limits(7, 100);
    let start = at(0, 0);

    let err = resolver
        .find_conflicts(&[], start, start + Duration::days(8))
        .unwrap_err();

    assert!(matches!(err, VaultError::RangeTooWide { .. }));
    assert!(resolver
        .find_conflicts(&[], start, start + Duration::days(7))
        .is_ok());
}

#[test]
fn conflict_timezone_tag_is_input_order_independent() {
    let mut a = busy_event("a", "family", at(9, 0), at(10, 0));
    a.timezone = Some("America/New_York".to_string());
    let mut b = busy_event("b", "work", at(9, 30), at(10, 30));
    b.timezone = Some("Asia/Tokyo".to_string());
    let (start, end) = window();

    let resolver = ConflictResolver::new();
    let forward = resolver
        .find_conflicts(&[a.clone(), b.clone()], start, end)
        .unwrap();
    let backward = resolver.find_conflicts(&[b, a], start, end).unwrap();

    // The tag follows the min-id participant, whichever order arrived.
    let expected: chrono_tz::Tz = "America/New_York".parse().unwrap();
    assert_eq!(forward[0].slot.timezone, expected);
    assert_eq!(backward[0].slot.timezone, expected);
}

#[test]
fn availability_check_reports_conflicting_events() {
    let events = vec![busy_event("a", "family", at(9, 0), at(10, 0))];
    let resolver = ConflictResolver::new();

    let proposed = TimeSlot::new(at(9, 30), at(10, 30), chrono_tz::UTC);
    let (free, conflicting) = resolver.check_availability(&events, &proposed).unwrap();
    assert!(!free);
    assert_eq!(conflicting.unwrap()[0].id, "a");

    let proposed = TimeSlot::new(at(10, 0), at(11, 0), chrono_tz::UTC);
    let (free, conflicting) = resolver.check_availability(&events, &proposed).unwrap();
    assert!(free, "back-to-back proposal is free");
    assert!(conflicting.is_none());
}
