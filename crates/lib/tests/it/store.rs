//! Credential store behaviour shared by every implementation.

use std::sync::Arc;

use glimpse::{
    FixedClock,
    auth::hash_password,
    store::{CredentialStore, Identity, InMemoryCredentialStore, StoreError},
};

use crate::helpers::{test_auth, test_store};

#[tokio::test]
async fn insert_then_find() {
    let store = test_store().await;
    assert_eq!(store.count().await.unwrap(), 0);
    assert!(store.find_by_email("a@x.com").await.unwrap().is_none());

    store
        .insert(Identity::new("a@x.com", "$argon2id$stub"))
        .await
        .unwrap();

    let found = store.find_by_email("a@x.com").await.unwrap().unwrap();
    assert_eq!(found, Identity::new("a@x.com", "$argon2id$stub"));
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn duplicate_insert_is_refused() {
    let store = test_store().await;
    store.insert(Identity::new("a@x.com", "h1")).await.unwrap();

    let err = store.insert(Identity::new("a@x.com", "h2")).await.unwrap_err();
    assert!(err.is_conflict());
    assert!(matches!(
        err,
        glimpse::Error::Store(StoreError::DuplicateEmail { .. })
    ));
    assert_eq!(
        store.find_by_email("a@x.com").await.unwrap().unwrap().password_hash,
        "h1"
    );
}

#[tokio::test]
async fn emails_are_matched_exactly() {
    let store = test_store().await;
    store.insert(Identity::new("a@x.com", "h")).await.unwrap();
    store.insert(Identity::new("A@x.com", "h")).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn racing_registrations_create_one_identity() {
    let auth = test_auth(Arc::new(FixedClock::default())).await;

    let attempts: Vec<_> = (0..8)
        .map(|i| {
            let auth = auth.clone();
            tokio::spawn(async move { auth.register("race@x.com", &format!("pw{i}")).await })
        })
        .collect();

    let mut created = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(()) => created += 1,
            Err(e) => assert!(e.is_conflict(), "unexpected error: {e}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(auth.store().count().await.unwrap(), 1);
}

#[tokio::test]
async fn json_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("identities.json");

    let store = InMemoryCredentialStore::load_from_file(&path).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 0);
    let hash = hash_password("pw").unwrap();
    store.insert(Identity::new("a@x.com", hash.clone())).await.unwrap();
    store.save_to_file(&path).await.unwrap();

    let reopened = InMemoryCredentialStore::load_from_file(&path).await.unwrap();
    let found = reopened.find_by_email("a@x.com").await.unwrap().unwrap();
    assert_eq!(found.password_hash, hash);
    assert!(
        reopened
            .insert(Identity::new("a@x.com", "again"))
            .await
            .unwrap_err()
            .is_conflict()
    );
}

#[tokio::test]
async fn corrupt_json_store_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("identities.json");
    std::fs::write(&path, "{\"identities\": 7}").unwrap();

    let err = InMemoryCredentialStore::load_from_file(&path).await.unwrap_err();
    assert!(err.is_store_error());
}
