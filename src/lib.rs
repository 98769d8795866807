//! Threat actor intelligence records: schema validation, provenance tracking and
//! reconciliation of data arriving from several sources.

pub mod config;
pub mod core;
pub mod pipeline;
pub mod schema;

pub use crate::core::actor::{ActorDraft, Rejected, ThreatActor};
pub use crate::core::error::{IntelError, ValidationError};
pub use crate::core::reference::Reference;
pub use crate::pipeline::Reconciler;
