//! Remote skill service.
//!
//! The core only talks to [`SkillService`]; [`WatsonService`] is the HTTP
//! implementation used by the binary.

pub mod watson;

pub use watson::{WatsonService, WatsonServiceConfig};

use crate::core::skill::{SkillDocument, SkillRecord};
use crate::error::Result;

/// Status reported by a skill that finished training.
pub const STATUS_AVAILABLE: &str = "Available";

/// Statuses that will not turn into `Available` by waiting.
pub const TERMINAL_STATUSES: &[&str] = &["Failed", "Non Existent", "Unavailable"];

pub trait SkillService {
    /// Skills whose name matches a shell glob. Empty or `*` matches all.
    fn list(&self, pattern: &str) -> Result<Vec<SkillRecord>>;

    /// Full export of one skill.
    fn get(&self, id: &str) -> Result<SkillDocument>;

    /// Training status of one skill.
    fn status(&self, id: &str) -> Result<String>;

    fn create(&self, document: &SkillDocument) -> Result<bool>;

    /// Update the skill identified by `document.id`.
    fn update(&self, document: &SkillDocument) -> Result<bool>;

    fn delete(&self, id: &str) -> Result<bool>;
}
