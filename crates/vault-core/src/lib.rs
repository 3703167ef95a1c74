//! # vault-core
//!
//! Privacy-preserving calendar sharing engine for autonomous agents.
//!
//! Several agents share a set of calendars; the vault enforces per-agent,
//! per-calendar role-based access, masks event details an agent is not
//! entitled to see, and reasons about conflicts and free time without
//! leaking information across privacy boundaries. The three components are
//! mutually independent and composed by the embedding orchestrator.
//!
//! ## Quick start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use vault_core::{ConflictResolver, Event, Severity};
//!
//! let resolver = ConflictResolver::new();
//! let day = |h, m| Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap();
//!
//! let events = vec![
//!     Event::new("standup", "work", day(9, 0), day(10, 0)),
//!     Event::new("dentist", "family", day(9, 30), day(10, 30)),
//! ];
//!
//! let conflicts = resolver
//!     .find_conflicts(&events, day(0, 0), day(23, 0))
//!     .unwrap();
//! assert_eq!(conflicts.len(), 1);
//! assert_eq!(conflicts[0].severity, Severity::Error);
//! ```
//!
//! ## Modules
//!
//! - [`policy`] — who may do what to which calendar
//! - [`privacy`] — agent-appropriate event views (masking, busy blocks)
//! - [`conflict`] — interval algebra: conflicts, busy merging, free slots
//! - [`model`] — shared data types
//! - [`error`] — error types

pub mod conflict;
pub mod error;
pub mod model;
pub mod policy;
pub mod privacy;

pub use conflict::{Conflict, ConflictResolver, Severity};
pub use error::VaultError;
pub use model::{Action, Agent, Calendar, Event, PrivacyLevel, TimeSlot, WorkingHours};
pub use policy::AccessPolicy;
pub use privacy::{PrivacyEngine, PrivacyMask};
