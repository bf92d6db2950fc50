//! Shared test helpers for secured-layer tests.

#![allow(dead_code)]

use fieldguard_secure::{
    FieldSecurityConfig, RecordSchema, RenderingMode, SearchCapability, SecuredInterface,
    SecuredRecord, SecurityConfig, StaticSecretProvider,
};
use fieldguard_store::MemoryStore;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Once};

pub const NAMESPACE_HEX: &str = "1111111111111111111111111111111111111111111111111111111111111111";
pub const MASTER_HEX: &str = "2222222222222222222222222222222222222222222222222222222222222222";

static TRACING: Once = Once::new();

/// Installs a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Raw hex secrets under the default secret names.
pub fn secrets() -> StaticSecretProvider {
    StaticSecretProvider::new()
        .with("FIELDGUARD_NAMESPACE_SECRET", NAMESPACE_HEX)
        .with("FIELDGUARD_MASTER_KEY", MASTER_HEX)
}

pub fn interface_with(store: Arc<MemoryStore>, mode: RenderingMode) -> SecuredInterface {
    init_tracing();
    SecuredInterface::with_rendering(SecurityConfig::default(), &secrets(), store, mode).unwrap()
}

pub fn interface(store: Arc<MemoryStore>) -> SecuredInterface {
    interface_with(store, RenderingMode::Protected)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub email: String,
}

impl SecuredRecord for Person {
    const KIND: &'static str = "Person";

    fn schema() -> RecordSchema {
        RecordSchema::new()
            .field("id", FieldSecurityConfig::token_only())
            .field("email", FieldSecurityConfig::encrypted())
    }
}

/// A record exercising every strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub ward: String,
    pub mrn: String,
    pub email: String,
    #[serde(default)]
    pub ssn: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    pub admitted_at: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SecuredRecord for Patient {
    const KIND: &'static str = "Patient";

    fn schema() -> RecordSchema {
        RecordSchema::new()
            .field("ward", FieldSecurityConfig::plaintext())
            .field("mrn", FieldSecurityConfig::token_only())
            .field(
                "email",
                FieldSecurityConfig::deterministic()
                    .with_capability(SearchCapability::Equality)
                    .unwrap(),
            )
            .field("ssn", FieldSecurityConfig::blind())
            .field(
                "age",
                FieldSecurityConfig::bucketed(vec![0.0, 18.0, 65.0]).unwrap(),
            )
            .field(
                "admitted_at",
                FieldSecurityConfig::temporal_offset_with_precision("minute").unwrap(),
            )
            .field("notes", FieldSecurityConfig::encrypted())
    }
}

pub fn patient(mrn: &str, email: &str, age: u32) -> Patient {
    Patient {
        ward: "east".into(),
        mrn: mrn.into(),
        email: email.into(),
        ssn: Some("123-45-6789".into()),
        age: Some(age),
        admitted_at: "2024-05-01T08:15:00Z".into(),
        notes: Some("allergic to penicillin".into()),
    }
}

/// A type no collection in the tests admits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub total: f64,
}

impl SecuredRecord for Invoice {
    const KIND: &'static str = "Invoice";

    fn schema() -> RecordSchema {
        RecordSchema::new().field("total", FieldSecurityConfig::plaintext())
    }
}
