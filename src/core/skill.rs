//! Skill identity and document types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Description prefix added when a decomposed skill is reassembled under
/// another name.
pub const LINEAGE_PREFIX: &str = "Copied from ";

/// A remote skill as reported by a list query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRecord {
    pub id: String,
    pub name: String,
    pub updated_on: String,
}

impl SkillRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, updated_on: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            updated_on: updated_on.into(),
        }
    }

    /// `{name}-{id}` label used in user-facing messages.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}-{}", self.name, self.id)
    }
}

/// An exported skill document.
///
/// Only the fields wa-cli reads or rewrites are typed; intents, entities,
/// dialog nodes and everything else ride along in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(rename = "workspace_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_opt_out: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_settings: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SkillDocument {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Remove `created`/`updated` from every object below the top level.
    ///
    /// Exports stamp each intent, example and node; those stamps churn on
    /// every edit and make the cached file useless for diffing. The
    /// top-level `updated` stays, it is the cache marker.
    pub fn strip_nested_audit(&mut self) {
        if let Some(settings) = self.system_settings.as_mut() {
            strip_audit(settings);
        }
        for value in self.extra.values_mut() {
            strip_audit(value);
        }
    }

    /// Drop the server-owned fields before a create/update call.
    pub fn prepare_for_deploy(&mut self) {
        self.created = None;
        self.status = None;
        self.updated = None;
    }

    /// Remove the `Copied from {source}. ` lineage marker if present.
    pub fn strip_lineage(&mut self, source: &str) {
        self.description = strip_lineage(&self.description, source).to_string();
    }
}

/// Description text of a skill reassembled from `source` under another name.
#[must_use]
pub fn with_lineage(description: &str, source: &str) -> String {
    format!("{LINEAGE_PREFIX}{source}. {description}")
}

/// `description` without a leading `Copied from {source}. ` marker.
#[must_use]
pub fn strip_lineage<'a>(description: &'a str, source: &str) -> &'a str {
    let marker = format!("{LINEAGE_PREFIX}{source}. ");
    description.strip_prefix(marker.as_str()).unwrap_or(description)
}

fn strip_audit(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("created");
            map.remove("updated");
            for child in map.values_mut() {
                strip_audit(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_audit(item);
            }
        }
        _ => {}
    }
}
