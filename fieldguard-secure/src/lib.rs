//! Secured data access for FieldGuard.
//!
//! Sensitive fields never reach the document store as plaintext under
//! their semantic names. The pieces:
//!
//! - [`FieldTransformer`]: per-field obfuscation (`DETERMINISTIC`, `BLIND`,
//!   `BUCKETED`, `TEMPORAL_OFFSET`, `ENCRYPTED`) and recovery
//! - [`SecurityRegistry`]: deterministic field-name tokens, exportable
//! - [`SecuredRecord`]: per-field protection contracts on record types
//! - [`CollectionPolicy`]: allow-lists of record kinds per collection
//! - [`SecuredCollection`]: the only handle that can write; raw mutation
//!   primitives fail with [`SecureError::SecurityViolation`]
//! - [`SecuredInterface`]: owns keys, registry, policies and metrics
//!
//! # Example
//!
//! ```no_run
//! use fieldguard_secure::{
//!     CollectionPolicy, FieldSecurityConfig, RecordSchema, SecuredInterface, SecuredRecord,
//!     SecurityConfig, StaticSecretProvider,
//! };
//! use fieldguard_store::MemoryStore;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Person {
//!     id: String,
//!     email: String,
//! }
//!
//! impl SecuredRecord for Person {
//!     const KIND: &'static str = "Person";
//!     fn schema() -> RecordSchema {
//!         RecordSchema::new()
//!             .field("id", FieldSecurityConfig::token_only())
//!             .field("email", FieldSecurityConfig::encrypted())
//!     }
//! }
//!
//! # async fn run() -> fieldguard_secure::SecureResult<()> {
//! let secrets = StaticSecretProvider::new()
//!     .with("FIELDGUARD_NAMESPACE_SECRET", "namespace passphrase")
//!     .with("FIELDGUARD_MASTER_KEY", "master passphrase");
//! let interface =
//!     SecuredInterface::new(SecurityConfig::default(), &secrets, Arc::new(MemoryStore::new()))?;
//! interface.initialize().await?;
//!
//! let people = interface
//!     .create_secured_collection(CollectionPolicy::new("people").allow::<Person>())
//!     .await?;
//! people
//!     .insert_secured(&Person { id: "u1".into(), email: "a@example.com".into() })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod builtin;
pub mod collection;
pub mod config;
pub mod error;
pub mod field;
pub mod interface;
pub mod keyring;
pub mod metrics;
pub mod policy;
pub mod record;
pub mod registry;
pub mod secrets;
pub mod transform;

pub use builtin::{AuditRecord, AUDIT_COLLECTION};
pub use collection::{MutationPrimitive, SecureQuery, SecuredCollection};
pub use config::{SecretSource, SecurityConfig};
pub use error::{SecureError, SecureResult};
pub use field::{FieldSecurityConfig, SearchCapability, Strategy, TemporalPrecision};
pub use interface::SecuredInterface;
pub use keyring::KeyRing;
pub use metrics::{MetricsSnapshot, SecurityMetrics};
pub use policy::{Candidate, CollectionPolicy, PolicyDirectory};
pub use record::{FieldDeclaration, RecordRenderer, RecordSchema, RenderingMode, SecuredRecord};
pub use registry::{RegistryEntry, RegistrySnapshot, SecurityRegistry};
pub use secrets::{
    provider_for, EnvSecretProvider, FileSecretProvider, SecretBytes, SecretProvider,
    StaticSecretProvider,
};
pub use transform::{bucket_for, Bucket, FieldTransformer};
