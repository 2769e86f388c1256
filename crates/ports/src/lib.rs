//! pwsafe-ports - seams between the provider and its host
//!
//! The orchestration host drives providers through [`Provider`] and
//! [`SecretsClient`]; providers read indirected credentials through
//! [`SecretReader`]. Providers are made known to the host through an
//! explicit [`ProviderRegistry`].

mod provider;
mod registry;
mod secret_reader;

pub use provider::*;
pub use registry::*;
pub use secret_reader::*;
