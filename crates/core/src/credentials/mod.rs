//! OAuth credential lifecycle

pub mod ports;
pub mod vault;

pub use vault::CredentialVault;
