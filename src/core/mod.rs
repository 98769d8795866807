//! Entity model and the ambient pieces it leans on.

pub mod actor;
pub mod error;
pub mod hash;
pub mod logger;
pub mod metadata;
pub mod reference;
pub mod time;
pub mod types;
pub mod update;
