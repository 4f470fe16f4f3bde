#![forbid(unsafe_code)]

pub mod lifecycle;
pub mod profile;
pub mod query;

pub use lifecycle::{apply_transition, DataTransition, LifecycleEngine};
pub use profile::{CommitPolicy, EngineProfile, EnvelopeFormat, ModifyMode, ResponseEnvelope, UserKeying};
pub use query::QueryBuilder;
