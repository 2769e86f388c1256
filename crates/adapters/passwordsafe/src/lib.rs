//! adapter-passwordsafe - BeyondTrust Password Safe secret-store provider
//!
//! Reads one secret per request from a Password Safe vault:
//! - Value-or-reference credential resolution at client construction
//! - OAuth client-credentials handshake with exponential backoff
//! - Secrets Safe secrets (`folder/title`) and managed accounts (`system/account`)
//! - Optional mutual TLS
//! - Connectivity checks
//!
//! Hosts register the provider explicitly with [`register`].

pub mod auth;
pub mod backoff;
pub mod client;
pub mod credentials;
pub mod dispatch;
mod error;
pub mod health;
pub mod managed_account;
pub mod provider;
pub mod secrets;
pub mod validation;

pub use auth::AuthSession;
pub use client::PasswordSafeApi;
pub use credentials::ResolvedCredentials;
pub use dispatch::{RetrievalPlan, SecretKeyPath};
pub use health::{ConnectivityStatus, check_connectivity};
pub use provider::{PROVIDER_NAME, PasswordSafeClient, PasswordSafeProvider, register};
pub use validation::validate_store;
