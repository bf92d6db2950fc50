//! The secured collection wrapper.
//!
//! [`SecuredCollection::insert_secured`] is the only path in the crate that
//! reaches a raw collection's insert primitive. Every other mutation the
//! document store family is known for has a shim here that always fails
//! with a security violation, so code written against a raw collection
//! fails loudly instead of silently bypassing the policy.

use crate::error::{SecureError, SecureResult};
use crate::field::{SearchCapability, Strategy};
use crate::metrics::SecurityMetrics;
use crate::policy::{Candidate, CollectionPolicy};
use crate::record::{RecordRenderer, SecuredRecord};
use fieldguard_store::{Document, DocumentCollection, Filter, ID_FIELD};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Raw mutation primitives that secured collections refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationPrimitive {
    InsertOne,
    InsertMany,
    UpdateOne,
    UpdateMany,
    ReplaceOne,
    DeleteOne,
    DeleteMany,
    FindOneAndUpdate,
    FindOneAndReplace,
    FindOneAndDelete,
    BulkWrite,
    Drop,
}

impl MutationPrimitive {
    pub const ALL: [MutationPrimitive; 12] = [
        Self::InsertOne,
        Self::InsertMany,
        Self::UpdateOne,
        Self::UpdateMany,
        Self::ReplaceOne,
        Self::DeleteOne,
        Self::DeleteMany,
        Self::FindOneAndUpdate,
        Self::FindOneAndReplace,
        Self::FindOneAndDelete,
        Self::BulkWrite,
        Self::Drop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsertOne => "insert_one",
            Self::InsertMany => "insert_many",
            Self::UpdateOne => "update_one",
            Self::UpdateMany => "update_many",
            Self::ReplaceOne => "replace_one",
            Self::DeleteOne => "delete_one",
            Self::DeleteMany => "delete_many",
            Self::FindOneAndUpdate => "find_one_and_update",
            Self::FindOneAndReplace => "find_one_and_replace",
            Self::FindOneAndDelete => "find_one_and_delete",
            Self::BulkWrite => "bulk_write",
            Self::Drop => "drop",
        }
    }
}

impl fmt::Display for MutationPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Equals(String, Value),
    InBucket(String, Value),
}

/// A query over semantic field names, translated to tokens on execution.
///
/// Only strategies that preserve equality can be matched: `NONE`,
/// `TOKEN_ONLY`, `DETERMINISTIC` and `BLIND` through
/// [`equals`](Self::equals), `BUCKETED` through [`in_bucket`](Self::in_bucket).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecureQuery {
    conditions: Vec<Condition>,
}

impl SecureQuery {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// `field == value`.
    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Equals(field.into(), value.into()));
        self
    }

    /// `field` falls in the same bucket as `value`.
    pub fn in_bucket(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::InBucket(field.into(), value.into()));
        self
    }

    fn to_filter<R: SecuredRecord>(&self, renderer: &RecordRenderer) -> SecureResult<Filter> {
        let schema = R::schema();
        let mut filter = Filter::all();
        for condition in &self.conditions {
            let (field, value) = match condition {
                Condition::Equals(field, value) | Condition::InBucket(field, value) => {
                    (field, value)
                }
            };
            let config = schema.get(field).ok_or_else(|| {
                SecureError::config(format!("{} has no field '{field}'", R::KIND))
            })?;
            let strategy = config.strategy();
            let admissible = match condition {
                Condition::Equals(..) => strategy.supports(SearchCapability::Equality),
                Condition::InBucket(..) => strategy == Strategy::Bucketed,
            };
            if !admissible {
                return Err(SecureError::config(format!(
                    "field '{field}' is {strategy} and cannot be matched this way"
                )));
            }
            let (key, stored) = renderer.store_field(field, value, config)?;
            filter = filter.eq(key, stored);
        }
        Ok(filter)
    }
}

/// The only handle through which a collection can be written.
///
/// Issued by [`SecuredInterface`](crate::SecuredInterface) for collections
/// with a registered policy.
#[derive(Clone)]
pub struct SecuredCollection {
    policy: Arc<CollectionPolicy>,
    raw: Arc<dyn DocumentCollection>,
    renderer: RecordRenderer,
    metrics: Arc<SecurityMetrics>,
}

impl SecuredCollection {
    pub(crate) fn new(
        policy: Arc<CollectionPolicy>,
        raw: Arc<dyn DocumentCollection>,
        renderer: RecordRenderer,
        metrics: Arc<SecurityMetrics>,
    ) -> Self {
        Self {
            policy,
            raw,
            renderer,
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        self.policy.collection()
    }

    pub fn policy(&self) -> &CollectionPolicy {
        &self.policy
    }

    /// Validates `record` against the policy, renders its storage view and
    /// inserts it. Returns the store-assigned id.
    pub async fn insert_secured<R: SecuredRecord>(&self, record: &R) -> SecureResult<String> {
        self.metrics.record_operation();
        let result: SecureResult<String> = async {
            self.policy.validate(Candidate::of::<R>())?;
            let view = self.renderer.storage_view(record)?;
            let id = self.raw.insert_one(view).await?;
            debug!(collection = %self.name(), kind = R::KIND, "Inserted secured record");
            Ok(id)
        }
        .await;
        self.account(result)
    }

    /// Counts documents matching a filter over stored keys.
    pub async fn count(&self, filter: &Filter) -> SecureResult<u64> {
        self.metrics.record_operation();
        let result = self.raw.count(filter).await.map_err(SecureError::from);
        self.account(result)
    }

    pub async fn exists(&self, filter: &Filter) -> SecureResult<bool> {
        self.metrics.record_operation();
        let result = self.raw.exists(filter).await.map_err(SecureError::from);
        self.account(result)
    }

    /// Finds and recovers every `R` matching `query`.
    pub async fn find_secured<R: SecuredRecord>(&self, query: &SecureQuery) -> SecureResult<Vec<R>> {
        self.metrics.record_operation();
        let result: SecureResult<Vec<R>> = async {
            self.policy.validate(Candidate::of::<R>())?;
            let filter = query.to_filter::<R>(&self.renderer)?;
            let documents = self.raw.find(&filter).await?;
            documents
                .iter()
                .map(|doc| self.renderer.recover::<R>(doc))
                .collect()
        }
        .await;
        self.account(result)
    }

    pub async fn find_one_secured<R: SecuredRecord>(
        &self,
        query: &SecureQuery,
    ) -> SecureResult<Option<R>> {
        Ok(self.find_secured::<R>(query).await?.into_iter().next())
    }

    /// Looks up one record by its store-assigned id.
    pub async fn get_secured<R: SecuredRecord>(&self, id: &str) -> SecureResult<Option<R>> {
        self.metrics.record_operation();
        let result: SecureResult<Option<R>> = async {
            self.policy.validate(Candidate::of::<R>())?;
            let filter = Filter::all().eq(ID_FIELD, id);
            match self.raw.find(&filter).await?.first() {
                Some(doc) => Ok(Some(self.renderer.recover::<R>(doc)?)),
                None => Ok(None),
            }
        }
        .await;
        self.account(result)
    }

    pub async fn insert_one(&self, _document: Value) -> SecureResult<String> {
        Err(self.blocked_raw(MutationPrimitive::InsertOne))
    }

    pub async fn insert_many(&self, _documents: Vec<Value>) -> SecureResult<Vec<String>> {
        Err(self.blocked_raw(MutationPrimitive::InsertMany))
    }

    pub async fn update_one(&self, _filter: &Filter, _update: Value) -> SecureResult<u64> {
        Err(self.blocked(MutationPrimitive::UpdateOne))
    }

    pub async fn update_many(&self, _filter: &Filter, _update: Value) -> SecureResult<u64> {
        Err(self.blocked(MutationPrimitive::UpdateMany))
    }

    pub async fn replace_one(&self, _filter: &Filter, _replacement: Value) -> SecureResult<u64> {
        Err(self.blocked(MutationPrimitive::ReplaceOne))
    }

    pub async fn delete_one(&self, _filter: &Filter) -> SecureResult<u64> {
        Err(self.blocked(MutationPrimitive::DeleteOne))
    }

    pub async fn delete_many(&self, _filter: &Filter) -> SecureResult<u64> {
        Err(self.blocked(MutationPrimitive::DeleteMany))
    }

    pub async fn find_one_and_update(
        &self,
        _filter: &Filter,
        _update: Value,
    ) -> SecureResult<Option<Document>> {
        Err(self.blocked(MutationPrimitive::FindOneAndUpdate))
    }

    pub async fn find_one_and_replace(
        &self,
        _filter: &Filter,
        _replacement: Value,
    ) -> SecureResult<Option<Document>> {
        Err(self.blocked(MutationPrimitive::FindOneAndReplace))
    }

    pub async fn find_one_and_delete(&self, _filter: &Filter) -> SecureResult<Option<Document>> {
        Err(self.blocked(MutationPrimitive::FindOneAndDelete))
    }

    pub async fn bulk_write(&self, _operations: Vec<Value>) -> SecureResult<u64> {
        Err(self.blocked(MutationPrimitive::BulkWrite))
    }

    /// Truncation is blocked like every other raw mutation.
    pub async fn drop(&self) -> SecureResult<()> {
        Err(self.blocked(MutationPrimitive::Drop))
    }

    /// The error every disabled primitive returns.
    fn blocked(&self, primitive: MutationPrimitive) -> SecureError {
        self.refuse(primitive, None)
    }

    /// Like [`blocked`](Self::blocked), for primitives carrying raw
    /// documents: the policy's verdict on them leads the message.
    fn blocked_raw(&self, primitive: MutationPrimitive) -> SecureError {
        match self.policy.validate(Candidate::Raw) {
            Err(SecureError::SecurityViolation(verdict)) => self.refuse(primitive, Some(&verdict)),
            _ => self.refuse(primitive, None),
        }
    }

    fn refuse(&self, primitive: MutationPrimitive, verdict: Option<&str>) -> SecureError {
        self.metrics.record_operation();
        self.metrics.record_violation();
        warn!(collection = %self.name(), primitive = %primitive, "Blocked raw mutation");
        let disabled = format!(
            "{primitive} is disabled on secured collection {}; use insert_secured",
            self.name()
        );
        match verdict {
            Some(verdict) => SecureError::violation(format!("{verdict}; {disabled}")),
            None => SecureError::violation(disabled),
        }
    }

    /// Counts and logs failures by kind. Violations and store failures
    /// never share a counter.
    fn account<T>(&self, result: SecureResult<T>) -> SecureResult<T> {
        if let Err(error) = &result {
            if error.is_violation() {
                self.metrics.record_violation();
                warn!(collection = %self.name(), error = %error, "Security violation");
            } else if error.is_store_failure() {
                self.metrics.record_store_failure();
                warn!(collection = %self.name(), error = %error, "Store failure");
            }
        }
        result
    }
}

impl fmt::Debug for SecuredCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecuredCollection")
            .field("policy", &self.policy)
            .field("mode", &self.renderer.mode())
            .finish()
    }
}
