pub mod crypto;
pub mod db;
pub mod error;
pub mod vault;

pub use crypto::EncryptionKey;
pub use error::VaultError;
pub use vault::{CredentialVault, DecryptedCredential};
