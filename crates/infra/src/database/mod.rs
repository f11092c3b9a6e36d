//! Database implementations

pub mod credential_repository;
pub mod job_repository;
pub mod manager;
pub mod mapping_repository;
pub mod settings_repository;

pub use credential_repository::SqlCipherCredentialStore;
pub use job_repository::SqlCipherJobRepository;
pub use manager::{DbManager, SqlConnection, SCHEMA_VERSION};
pub use mapping_repository::{SqlCipherMappingStore, SqlCipherPartyMappingStore};
pub use settings_repository::SqlCipherSettingsRepository;
