//! Trigger Registry: declarative Resource/Trigger configuration resolved
//! into startup-time lookup maps (§4.2).

pub mod config;
pub mod registry;
pub mod signature;

pub use config::{ResourceConfig, TriggerConfig, TriggerConfigEntry, TriggerKindConfig};
pub use registry::{RegistryError, TriggerRegistry};
pub use signature::{ParsedSignature, SignatureError};
