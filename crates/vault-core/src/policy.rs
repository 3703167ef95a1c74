//! Role-based access policy -- who may do what to which calendar.
//!
//! The policy is constructed once from a validated configuration tree and is
//! immutable afterwards. All calendar-name lookups are case-insensitive; the
//! original display casing is retained alongside the normalized key.
//!
//! Denials are ordinary control flow: every per-request check returns `false`
//! or an empty result with an internal diagnostic log. Only configuration
//! problems are errors, and those are raised in full before any state is
//! built, so a malformed config never partially initializes the policy.

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path};
use tracing::{debug, warn};

use crate::error::{Result, VaultError};
use crate::model::{normalize_name, Action, Agent, Calendar, PrivacyLevel};

/// The single source of truth for agent/calendar permissions.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    agents: HashMap<String, Agent>,
    calendars: HashMap<String, Calendar>,
}

impl AccessPolicy {
    /// Build a policy from a parsed configuration tree.
    ///
    /// The whole tree is validated before anything is loaded; see
    /// [`validate_config`] for the structural rules.
    ///
    /// # Errors
    /// Returns `VaultError::ConfigValidation` naming the first structural
    /// defect found.
    pub fn from_value(config: &Value) -> Result<AccessPolicy> {
        validate_config(config)?;

        // Validation guarantees the shapes below; indexing is safe.
        let agent_entries = config["agents"].as_array().unwrap();
        let calendar_entries = config["calendars"].as_array().unwrap();

        let mut agents = HashMap::new();
        for entry in agent_entries {
            let id = entry["id"].as_str().unwrap().to_string();
            let calendars = entry
                .get("calendars")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(normalize_name)
                        .collect()
                })
                .unwrap_or_default();
            let flag = |key: &str, default: bool| {
                entry.get(key).and_then(Value::as_bool).unwrap_or(default)
            };
            agents.insert(
                id.clone(),
                Agent {
                    id,
                    calendars,
                    can_create: flag("can_create_events", true),
                    can_edit: flag("can_edit_events", true),
                    // Destructive capability is opt-in.
                    can_delete: flag("can_delete_events", false),
                    can_view_busy: flag("can_view_busy", true),
                },
            );
        }

        let mut calendars: HashMap<String, Calendar> = HashMap::new();
        for entry in calendar_entries {
            let display_name = entry["name"].as_str().unwrap().to_string();
            let name = normalize_name(&display_name);
            let privacy_level = match entry.get("privacy_level").and_then(Value::as_str) {
                Some(raw) => raw.parse()?,
                None => PrivacyLevel::Private,
            };
            let accessible_by = entry
                .get("accessible_by")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let calendar = Calendar {
                name: name.clone(),
                display_name,
                external_name: entry
                    .get("icloud_name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                privacy_level,
                accessible_by,
            };
            if let Some(previous) = calendars.insert(name, calendar) {
                // Two display names collapsing to one key: last write wins.
                warn!(
                    display_name = %previous.display_name,
                    "duplicate calendar name after normalization, keeping the later entry"
                );
            }
        }

        Ok(AccessPolicy { agents, calendars })
    }

    /// Load and validate a policy from a YAML or JSON file.
    ///
    /// The path is canonicalized and checked before the file is read: the raw
    /// input must not contain a `..` component, the target must exist and be
    /// a regular file, and when `allowed_dir` is given the resolved path must
    /// fall under it.
    ///
    /// # Errors
    /// `VaultError::PathValidation` for path problems,
    /// `VaultError::ConfigValidation` for unparseable or invalid contents.
    pub fn load_from_file(path: &Path, allowed_dir: Option<&Path>) -> Result<AccessPolicy> {
        // Reject traversal in the caller-supplied string itself, before any
        // filesystem resolution.
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(VaultError::PathValidation(format!(
                "path '{}' contains a parent-directory component",
                path.display()
            )));
        }

        let resolved = path.canonicalize().map_err(|e| {
            VaultError::PathValidation(format!("cannot resolve '{}': {}", path.display(), e))
        })?;
        if !resolved.is_file() {
            return Err(VaultError::PathValidation(format!(
                "'{}' is not a regular file",
                resolved.display()
            )));
        }
        if let Some(dir) = allowed_dir {
            let dir = dir.canonicalize().map_err(|e| {
                VaultError::PathValidation(format!("cannot resolve '{}': {}", dir.display(), e))
            })?;
            if !resolved.starts_with(&dir) {
                return Err(VaultError::PathValidation(format!(
                    "'{}' is outside the allowed directory '{}'",
                    resolved.display(),
                    dir.display()
                )));
            }
        }

        let raw = fs::read_to_string(&resolved).map_err(|e| {
            VaultError::PathValidation(format!("cannot read '{}': {}", resolved.display(), e))
        })?;

        let is_json = resolved
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config: Value = if is_json {
            serde_json::from_str(&raw)
                .map_err(|e| VaultError::ConfigValidation(format!("malformed JSON: {}", e)))?
        } else {
            serde_yaml::from_str(&raw)
                .map_err(|e| VaultError::ConfigValidation(format!("malformed YAML: {}", e)))?
        };

        Self::from_value(&config)
    }

    /// The calendars an agent may access, normalized. Empty for an unknown
    /// agent -- existence is not disclosed.
    pub fn accessible_calendars(&self, agent_id: &str) -> &[String] {
        self.agents
            .get(agent_id)
            .map(|a| a.calendars.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the agent's grant list contains the calendar, compared on
    /// normalized names. Unknown agents get `false`, never an error.
    pub fn can_access(&self, agent_id: &str, calendar_name: &str) -> bool {
        let Some(agent) = self.agents.get(agent_id) else {
            return false;
        };
        agent.calendars.contains(&normalize_name(calendar_name))
    }

    /// Map a vault calendar name to its provider-specific name.
    pub fn resolve_external_name(&self, calendar_name: &str) -> Option<&str> {
        self.calendars
            .get(&normalize_name(calendar_name))
            .and_then(|c| c.external_name.as_deref())
    }

    /// Look up a calendar by name, case-insensitively.
    pub fn calendar(&self, calendar_name: &str) -> Option<&Calendar> {
        self.calendars.get(&normalize_name(calendar_name))
    }

    /// Look up an agent by id.
    pub fn agent(&self, agent_id: &str) -> Option<&Agent> {
        self.agents.get(agent_id)
    }

    /// Full permission check: agent exists, calendar exists, agent has the
    /// calendar, agent's capability flag for the action is enabled.
    ///
    /// Each failing step returns `false` with a debug log. To a caller, "not
    /// permitted" and "does not exist" are indistinguishable.
    pub fn validate(&self, agent_id: &str, calendar_name: &str, action: Action) -> bool {
        let Some(agent) = self.agents.get(agent_id) else {
            debug!(agent_id, "permission denied: unknown agent");
            return false;
        };
        let normalized = normalize_name(calendar_name);
        if !self.calendars.contains_key(&normalized) {
            debug!(agent_id, calendar = %normalized, "permission denied: unknown calendar");
            return false;
        }
        if !agent.calendars.contains(&normalized) {
            debug!(agent_id, calendar = %normalized, "permission denied: no calendar access");
            return false;
        }
        let allowed = match action {
            Action::Create => agent.can_create,
            Action::Edit => agent.can_edit,
            Action::Delete => agent.can_delete,
            // Calendar access is itself the view grant.
            Action::View => true,
            Action::ViewBusy => agent.can_view_busy,
        };
        if !allowed {
            debug!(agent_id, calendar = %normalized, %action, "permission denied: capability disabled");
        }
        allowed
    }
}

/// Structural validation of a configuration tree, run to completion before
/// any data is loaded.
///
/// Rules: the top level is a mapping with `agents` and `calendars` lists;
/// every agent entry is a mapping with a string `id` and, if present, a list
/// `calendars`; every calendar entry is a mapping with a string `name` and,
/// if present, a recognized `privacy_level`.
fn validate_config(config: &Value) -> Result<()> {
    let root = config.as_object().ok_or_else(|| {
        VaultError::ConfigValidation("configuration root must be a mapping".to_string())
    })?;

    let agents = root
        .get("agents")
        .ok_or_else(|| VaultError::ConfigValidation("missing 'agents' list".to_string()))?
        .as_array()
        .ok_or_else(|| VaultError::ConfigValidation("'agents' must be a list".to_string()))?;
    let calendars = root
        .get("calendars")
        .ok_or_else(|| VaultError::ConfigValidation("missing 'calendars' list".to_string()))?
        .as_array()
        .ok_or_else(|| VaultError::ConfigValidation("'calendars' must be a list".to_string()))?;

    for (i, entry) in agents.iter().enumerate() {
        let map = entry.as_object().ok_or_else(|| {
            VaultError::ConfigValidation(format!("agent entry {} must be a mapping", i))
        })?;
        if !map.get("id").is_some_and(Value::is_string) {
            return Err(VaultError::ConfigValidation(format!(
                "agent entry {} is missing a string 'id'",
                i
            )));
        }
        if let Some(cals) = map.get("calendars") {
            if !cals.is_array() {
                return Err(VaultError::ConfigValidation(format!(
                    "agent '{}': 'calendars' must be a list",
                    map["id"].as_str().unwrap_or("?")
                )));
            }
        }
    }

    for (i, entry) in calendars.iter().enumerate() {
        let map = entry.as_object().ok_or_else(|| {
            VaultError::ConfigValidation(format!("calendar entry {} must be a mapping", i))
        })?;
        if !map.get("name").is_some_and(Value::is_string) {
            return Err(VaultError::ConfigValidation(format!(
                "calendar entry {} is missing a string 'name'",
                i
            )));
        }
        if let Some(level) = map.get("privacy_level") {
            let raw = level.as_str().ok_or_else(|| {
                VaultError::ConfigValidation(format!(
                    "calendar '{}': 'privacy_level' must be a string",
                    map["name"].as_str().unwrap_or("?")
                ))
            })?;
            let _: PrivacyLevel = raw.parse()?;
        }
    }

    Ok(())
}
