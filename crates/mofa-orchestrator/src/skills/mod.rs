//! Implicit-knowledge skills: loaded from `SKILL.md` files, optionally
//! indexed for vector search, and injected into prompts on demand.

pub mod injector;
pub mod loader;
pub mod store;

pub use injector::{SkillInjector, MARKER};
pub use loader::{Skill, SkillLoader};
pub use store::{Embedder, SkillStore};
