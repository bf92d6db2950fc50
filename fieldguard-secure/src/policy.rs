//! Collection allow-lists and the directory they are registered in.
//!
//! A policy is registered once per collection name and is read-only from
//! then on. Registering again under a taken name is a configuration error.

use crate::error::{SecureError, SecureResult};
use crate::record::SecuredRecord;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// What a caller is trying to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// A value implementing [`SecuredRecord`], identified by its kind.
    Secured(&'static str),
    /// A raw document that never went through a storage view.
    Raw,
}

impl Candidate {
    pub fn of<R: SecuredRecord>() -> Self {
        Self::Secured(R::KIND)
    }
}

/// Allow-list for one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPolicy {
    collection: String,
    allowed: BTreeSet<&'static str>,
    security_required: bool,
}

impl CollectionPolicy {
    /// An empty allow-list that requires secured records.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            allowed: BTreeSet::new(),
            security_required: true,
        }
    }

    /// Admits record type `R`.
    pub fn allow<R: SecuredRecord>(mut self) -> Self {
        self.allowed.insert(R::KIND);
        self
    }

    /// When `false`, any secured record kind is admitted. Raw documents
    /// are rejected either way.
    pub fn security_required(mut self, required: bool) -> Self {
        self.security_required = required;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn allowed_kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.allowed.iter().copied()
    }

    pub fn is_security_required(&self) -> bool {
        self.security_required
    }

    pub fn validate(&self, candidate: Candidate) -> SecureResult<()> {
        match candidate {
            Candidate::Raw => Err(SecureError::violation(format!(
                "not a secured record: raw documents cannot be written to {}",
                self.collection
            ))),
            Candidate::Secured(kind) => {
                if self.security_required && !self.allowed.contains(kind) {
                    Err(SecureError::violation(format!(
                        "type not permitted in {}: {kind}",
                        self.collection
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Shorthand for `validate(Candidate::of::<R>())`.
    pub fn validate_record<R: SecuredRecord>(&self) -> SecureResult<()> {
        self.validate(Candidate::of::<R>())
    }
}

/// Registered policies, keyed by collection name.
#[derive(Debug, Default)]
pub struct PolicyDirectory {
    policies: RwLock<BTreeMap<String, Arc<CollectionPolicy>>>,
}

impl PolicyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `policy`, returning the stored policy for its collection.
    ///
    /// Each collection name is registered once; any later registration for
    /// it is a configuration error, even an identical one.
    pub fn register(&self, policy: CollectionPolicy) -> SecureResult<Arc<CollectionPolicy>> {
        if policy.collection.trim().is_empty() {
            return Err(SecureError::config("collection name must not be empty"));
        }

        let mut policies = self.policies.write().unwrap_or_else(PoisonError::into_inner);
        if policies.contains_key(&policy.collection) {
            warn!(collection = %policy.collection, "Repeated policy registration rejected");
            return Err(SecureError::config(format!(
                "a policy is already registered for {}",
                policy.collection
            )));
        }

        info!(
            collection = %policy.collection,
            kinds = policy.allowed.len(),
            security_required = policy.security_required,
            "Registered collection policy"
        );
        let policy = Arc::new(policy);
        policies.insert(policy.collection.clone(), policy.clone());
        Ok(policy)
    }

    pub fn get(&self, collection: &str) -> Option<Arc<CollectionPolicy>> {
        self.policies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .cloned()
    }

    pub fn contains(&self, collection: &str) -> bool {
        self.get(collection).is_some()
    }

    pub fn len(&self) -> usize {
        self.policies.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn collections(&self) -> Vec<String> {
        self.policies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
