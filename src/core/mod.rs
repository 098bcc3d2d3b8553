//! Core skill types and logic

pub mod bulk;
pub mod cache;
pub mod deploy;
pub mod readonly;
pub mod resolver;
pub mod sandbox;
pub mod skill;

pub use cache::{CacheStore, CachedArtifact};
pub use readonly::{Capability, ReadonlyGuard, ReadonlyRegistry};
pub use resolver::SkillResolver;
pub use sandbox::{Sandbox, SandboxIdentity, SandboxState};
pub use skill::{SkillDocument, SkillRecord};
