mod common;

use common::{interface, interface_with, patient, Patient, Person};
use fieldguard_secure::{CollectionPolicy, RenderingMode, SecuredRecord};
use fieldguard_store::{MemoryStore, ID_FIELD};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const SEMANTIC_NAMES: [&str; 6] = ["mrn", "email", "ssn", "age", "admitted_at", "notes"];

#[tokio::test]
async fn storage_view_has_one_token_per_protected_field() {
    let store = Arc::new(MemoryStore::new());
    let secured = interface(store.clone());
    secured.initialize().await.unwrap();
    let patients = secured
        .create_secured_collection(CollectionPolicy::new("patients").allow::<Patient>())
        .await
        .unwrap();

    patients
        .insert_secured(&patient("m-1", "a@example.com", 40))
        .await
        .unwrap();

    let stored = &store.raw_documents("patients").await[0];
    let protected = Patient::schema()
        .fields()
        .iter()
        .filter(|f| f.config.strategy().is_pseudonymous())
        .count();
    let tokens = stored.keys().filter(|k| k.starts_with("f_")).count();
    assert_eq!(tokens, protected);
    for name in SEMANTIC_NAMES {
        assert!(!stored.contains_key(name), "{name} leaked into storage");
    }
    assert_eq!(stored["ward"], "east");
    assert!(stored.contains_key(ID_FIELD));

    let rendered = serde_json::to_string(stored).unwrap();
    assert!(!rendered.contains("a@example.com"));
    assert!(!rendered.contains("123-45-6789"));
    assert!(!rendered.contains("penicillin"));
}

#[tokio::test]
async fn stored_shapes_per_strategy() {
    let store = Arc::new(MemoryStore::new());
    let secured = interface(store.clone());
    let patients = secured
        .create_secured_collection(CollectionPolicy::new("patients").allow::<Patient>())
        .await
        .unwrap();
    patients
        .insert_secured(&patient("m-2", "b@example.com", 70))
        .await
        .unwrap();

    let stored = &store.raw_documents("patients").await[0];
    let registry = secured.registry();
    let token = |name: &str| registry.token_for(name).unwrap();

    assert_eq!(stored[&token("mrn")], "m-2");
    assert_eq!(stored[&token("ssn")].as_str().unwrap().len(), 64);
    assert_eq!(
        stored[&token("age")],
        serde_json::json!({"min": 65.0, "max": null, "label": "[65, +inf)"})
    );
    let admitted = stored[&token("admitted_at")].as_str().unwrap();
    assert!(admitted.ends_with('Z'));
    assert_ne!(admitted, "2024-05-01T08:15:00Z");
}

#[tokio::test]
async fn reads_recover_everything_but_write_only_fields() {
    let store = Arc::new(MemoryStore::new());
    let secured = interface(store);
    let patients = secured
        .create_secured_collection(CollectionPolicy::new("patients").allow::<Patient>())
        .await
        .unwrap();
    let id = patients
        .insert_secured(&patient("m-3", "c@example.com", 12))
        .await
        .unwrap();

    let back: Patient = patients.get_secured(&id).await.unwrap().unwrap();
    assert_eq!(
        back,
        Patient {
            ssn: None,
            age: None,
            ..patient("m-3", "c@example.com", 12)
        }
    );
}

#[tokio::test]
async fn development_view_requires_explicit_mode() {
    let record = Person {
        id: "u1".into(),
        email: "dev@example.com".into(),
    };

    let protected = interface(Arc::new(MemoryStore::new()));
    assert!(protected.development_view(&record).unwrap_err().is_violation());
    assert_eq!(protected.metrics().violations, 1);

    let dev = interface_with(
        Arc::new(MemoryStore::new()),
        RenderingMode::InsecurePlaintextDevelopment,
    );
    let view = dev.development_view(&record).unwrap();
    assert_eq!(view["email"], "dev@example.com");
}

#[tokio::test]
async fn development_mode_still_stores_protected_documents() {
    let store = Arc::new(MemoryStore::new());
    let dev = interface_with(store.clone(), RenderingMode::InsecurePlaintextDevelopment);
    let people = dev
        .create_secured_collection(CollectionPolicy::new("people").allow::<Person>())
        .await
        .unwrap();
    people
        .insert_secured(&Person {
            id: "u2".into(),
            email: "dev@example.com".into(),
        })
        .await
        .unwrap();
    let stored = &store.raw_documents("people").await[0];
    assert!(!stored.contains_key("email"));
}
