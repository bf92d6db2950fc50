//! The secured interface: owner of keys, registry, policies and metrics.

use crate::builtin::{self, AuditRecord, AUDIT_COLLECTION};
use crate::collection::SecuredCollection;
use crate::config::SecurityConfig;
use crate::error::{SecureError, SecureResult};
use crate::keyring::{key_from_secret, KeyRing};
use crate::metrics::{MetricsSnapshot, SecurityMetrics};
use crate::policy::{CollectionPolicy, PolicyDirectory};
use crate::record::{RecordRenderer, RenderingMode, SecuredRecord};
use crate::registry::{RegistrySnapshot, SecurityRegistry};
use crate::secrets::SecretProvider;
use crate::transform::FieldTransformer;
use fieldguard_crypto::KdfParams;
use fieldguard_store::{Document, DocumentCollection, DocumentStore};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Entry point to secured collections.
///
/// Collections move from unregistered, to registered (a policy exists), to
/// wrapped (a [`SecuredCollection`] was issued). There is no way to obtain
/// a write handle for a collection without a policy.
pub struct SecuredInterface {
    config: SecurityConfig,
    store: Arc<dyn DocumentStore>,
    registry: Arc<SecurityRegistry>,
    renderer: RecordRenderer,
    policies: PolicyDirectory,
    metrics: Arc<SecurityMetrics>,
    initialized: OnceCell<()>,
}

impl SecuredInterface {
    /// Builds a protected interface. Secrets are fetched once, here.
    pub fn new(
        config: SecurityConfig,
        secrets: &dyn SecretProvider,
        store: Arc<dyn DocumentStore>,
    ) -> SecureResult<Self> {
        Self::with_rendering(config, secrets, store, RenderingMode::Protected)
    }

    /// Builds an interface with an explicit rendering mode.
    ///
    /// `RenderingMode::InsecurePlaintextDevelopment` unlocks plaintext
    /// development views. Stored documents stay protected either way.
    pub fn with_rendering(
        config: SecurityConfig,
        secrets: &dyn SecretProvider,
        store: Arc<dyn DocumentStore>,
        mode: RenderingMode,
    ) -> SecureResult<Self> {
        Self::with_kdf_params(config, secrets, store, mode, &KdfParams::default())
    }

    /// Like [`with_rendering`](Self::with_rendering) with explicit Argon2id
    /// parameters for passphrase secrets.
    pub fn with_kdf_params(
        config: SecurityConfig,
        secrets: &dyn SecretProvider,
        store: Arc<dyn DocumentStore>,
        mode: RenderingMode,
        params: &KdfParams,
    ) -> SecureResult<Self> {
        let namespace_secret = secrets.fetch(&config.namespace_secret)?;
        let namespace = key_from_secret(&namespace_secret, &config.namespace_secret, params)?;
        let master_secret = secrets.fetch(&config.master_key_secret)?;
        let master = key_from_secret(&master_secret, &config.master_key_secret, params)?;

        let registry = Arc::new(SecurityRegistry::new(&namespace));
        let transformer = Arc::new(FieldTransformer::new(KeyRing::from_root(&master)));

        if mode == RenderingMode::InsecurePlaintextDevelopment {
            warn!("Secured interface built with INSECURE plaintext development rendering");
        }
        info!(fingerprint = %registry.fingerprint(), "Secured interface created");

        Ok(Self {
            config,
            store,
            renderer: RecordRenderer::new(registry.clone(), transformer, mode),
            registry,
            policies: PolicyDirectory::new(),
            metrics: Arc::new(SecurityMetrics::new()),
            initialized: OnceCell::new(),
        })
    }

    /// Loads the registry snapshot, if one is configured and present, and
    /// registers the built-in policies. Repeated calls are no-ops.
    pub async fn initialize(&self) -> SecureResult<()> {
        self.initialized
            .get_or_try_init(|| async {
                if let Some(path) = &self.config.registry_snapshot {
                    if path.exists() {
                        let snapshot = SecurityRegistry::load_snapshot(path)?;
                        self.registry.import(snapshot)?;
                    } else {
                        info!(path = %path.display(), "No registry snapshot yet, starting empty");
                    }
                }
                for policy in builtin::default_policies() {
                    self.policies.register(policy)?;
                }
                info!(
                    collections = self.policies.len(),
                    field_mappings = self.registry.len(),
                    "Secured interface initialized"
                );
                Ok::<_, SecureError>(())
            })
            .await
            .map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Registers a policy without issuing a handle.
    pub fn register_policy(&self, policy: CollectionPolicy) -> SecureResult<()> {
        self.policies.register(policy).map(|_| ())
    }

    /// Registers `policy` and returns a handle to its collection.
    ///
    /// Fails with a configuration error when the collection already has a
    /// policy; use [`get_secured_collection`](Self::get_secured_collection)
    /// for those.
    pub async fn create_secured_collection(
        &self,
        policy: CollectionPolicy,
    ) -> SecureResult<SecuredCollection> {
        let name = policy.collection().to_string();
        self.policies.register(policy)?;
        info!(collection = %name, "Creating secured collection");
        self.get_secured_collection(&name).await
    }

    /// Returns a handle to a collection with a registered policy.
    pub async fn get_secured_collection(&self, name: &str) -> SecureResult<SecuredCollection> {
        self.metrics.record_operation();
        let Some(policy) = self.policies.get(name) else {
            self.metrics.record_violation();
            warn!(collection = %name, "Secured collection requested without a policy");
            return Err(SecureError::violation(format!(
                "no policy registered for {name}"
            )));
        };

        let raw = match self.store.create_collection(name).await {
            Ok(raw) => raw,
            Err(e) => {
                self.metrics.record_store_failure();
                warn!(collection = %name, error = %e, "Store failure opening collection");
                return Err(e.into());
            }
        };
        Ok(SecuredCollection::new(
            policy,
            raw,
            self.renderer.clone(),
            self.metrics.clone(),
        ))
    }

    /// Retired raw access path. Always fails.
    pub fn get_collection(&self, name: &str) -> SecureResult<Arc<dyn DocumentCollection>> {
        self.metrics.record_operation();
        self.metrics.record_violation();
        warn!(collection = %name, "Raw collection access attempted");
        Err(SecureError::violation(format!(
            "raw access to {name} is retired; use get_secured_collection"
        )))
    }

    /// Plaintext rendering of `record`, only in development mode.
    pub fn development_view<R: SecuredRecord>(&self, record: &R) -> SecureResult<Document> {
        let result = self.renderer.development_view(record);
        if matches!(&result, Err(e) if e.is_violation()) {
            self.metrics.record_operation();
            self.metrics.record_violation();
        }
        result
    }

    pub fn rendering_mode(&self) -> RenderingMode {
        self.renderer.mode()
    }

    pub fn registry(&self) -> &SecurityRegistry {
        &self.registry
    }

    pub fn export_registry(&self) -> RegistrySnapshot {
        self.registry.export()
    }

    /// Writes the registry snapshot to the configured path.
    pub fn persist_registry(&self) -> SecureResult<()> {
        let path = self.config.registry_snapshot.as_deref().ok_or_else(|| {
            SecureError::config("persist_registry requires security.registry_snapshot")
        })?;
        self.registry.save_snapshot(path)
    }

    /// Appends an [`AuditRecord`] through the secured path.
    pub async fn record_audit(
        &self,
        action: &str,
        actor: &str,
        detail: Option<&str>,
    ) -> SecureResult<String> {
        self.initialize().await?;
        let audit = self.get_secured_collection(AUDIT_COLLECTION).await?;
        let record = AuditRecord::new(action, actor, detail.map(str::to_string));
        audit.insert_secured(&record).await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operations: self.metrics.operations(),
            violations: self.metrics.violations(),
            store_failures: self.metrics.store_failures(),
            registered_collections: self.policies.len(),
            field_mappings: self.registry.len(),
        }
    }
}

impl std::fmt::Debug for SecuredInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecuredInterface")
            .field("registry", &self.registry)
            .field("mode", &self.renderer.mode())
            .field("collections", &self.policies.collections())
            .finish()
    }
}
