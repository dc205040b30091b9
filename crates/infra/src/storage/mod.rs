//! Credential store implementations

mod keychain;
mod memory;

pub use keychain::KeychainCredentialStore;
pub use memory::MemoryCredentialStore;
