//! Built-in collections registered by `SecuredInterface::initialize`.

use crate::field::{FieldSecurityConfig, SearchCapability};
use crate::policy::CollectionPolicy;
use crate::record::{RecordSchema, SecuredRecord};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Collection holding [`AuditRecord`]s.
pub const AUDIT_COLLECTION: &str = "security_audit";

/// One audited security-relevant action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_id: String,
    pub actor: String,
    pub action: String,
    #[serde(default)]
    pub detail: Option<String>,
    /// RFC 3339, UTC.
    pub occurred_at: String,
}

impl AuditRecord {
    pub fn new(action: impl Into<String>, actor: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            event_id: uuid::Uuid::now_v7().to_string(),
            actor: actor.into(),
            action: action.into(),
            detail,
            occurred_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

impl SecuredRecord for AuditRecord {
    const KIND: &'static str = "AuditRecord";

    fn schema() -> RecordSchema {
        RecordSchema::new()
            .field("event_id", FieldSecurityConfig::token_only())
            .field("actor", FieldSecurityConfig::deterministic())
            .field("action", FieldSecurityConfig::plaintext())
            .field("detail", FieldSecurityConfig::encrypted())
            .field("occurred_at", audit_timestamp())
    }
}

fn audit_timestamp() -> FieldSecurityConfig {
    // Second precision and ordering are both valid for TEMPORAL_OFFSET.
    FieldSecurityConfig::temporal_offset_with_precision("second")
        .and_then(|c| c.with_capability(SearchCapability::Ordering))
        .unwrap_or_else(|_| FieldSecurityConfig::temporal_offset())
}

/// Policies registered for every interface.
pub(crate) fn default_policies() -> Vec<CollectionPolicy> {
    vec![CollectionPolicy::new(AUDIT_COLLECTION).allow::<AuditRecord>()]
}
