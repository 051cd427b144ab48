//! Integration tests for the bulk pipeline
//!
//! These verify chunked bulk create, update and delete including:
//! - Batch-fatal duplicate detection for creates
//! - Per-item failure accounting for updates
//! - Chunk-level failures and cache invalidation after commit

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use accounts_api::domain::cache::{keys, CacheStore};
use accounts_api::domain::repositories::UserRepository;
use accounts_api::domain::user::{Email, UserFilter, UserIdentifier, UserPatch, UserStatus};
use accounts_api::infrastructure::cache::InMemoryCacheStore;
use accounts_api::services::{BulkItemError, BulkUserUpdate, ServiceConfig, UserServiceError};
use common::{
    harness, harness_with, name_filter, named_user, new_user, FlakyRepository, RacingRepository,
};

fn small_chunks() -> ServiceConfig {
    ServiceConfig {
        create_chunk_size: 2,
        mutation_chunk_size: 2,
        ..Default::default()
    }
}

fn rename(identifier: &str, name: &str) -> BulkUserUpdate {
    BulkUserUpdate::new(
        identifier,
        UserPatch {
            name: Some(name.to_string()),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_bulk_create_empty_input() {
    let h = harness();
    let result = h.service.create_bulk_users(Vec::new()).await.unwrap();

    assert_eq!(result.successful, 0);
    assert_eq!(result.failed, 0);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_bulk_create_inserts_across_chunks() {
    let h = harness_with(small_chunks());
    let users = (0..5)
        .map(|i| new_user(&format!("user{}@example.com", i)))
        .collect();

    let result = h.service.create_bulk_users(users).await.unwrap();

    assert_eq!(result.successful, 5);
    assert_eq!(result.failed, 0);
    assert!(result.errors.is_empty());
    assert_eq!(h.repo.len().await, 5);

    let stored = h.repo.find_by_email("user3@example.com").await.unwrap().unwrap();
    assert!(stored.password_hash.starts_with("$2"));
    assert!(!stored.is_verified);
}

#[tokio::test]
async fn test_bulk_create_case_insensitive_duplicate_persists_nothing() {
    let h = harness();
    let users = vec![
        new_user("ada@example.com"),
        new_user("grace@example.com"),
        new_user("ADA@example.com"),
    ];

    let err = h.service.create_bulk_users(users).await.unwrap_err();

    match err {
        UserServiceError::DuplicateEmail(emails) => {
            assert_eq!(emails, vec!["ada@example.com".to_string()])
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(h.repo.is_empty().await);
}

#[tokio::test]
async fn test_bulk_create_existing_email_aborts_but_keeps_earlier_chunks() {
    let h = harness_with(small_chunks());
    h.service.create_user(new_user("taken@example.com")).await.unwrap();

    let users = vec![
        new_user("a@example.com"),
        new_user("b@example.com"),
        new_user("taken@example.com"),
        new_user("c@example.com"),
    ];
    let err = h.service.create_bulk_users(users).await.unwrap_err();

    assert!(matches!(err, UserServiceError::DuplicateEmail(ref e) if e == &["taken@example.com"]));
    // First chunk committed, second rejected as a whole
    assert_eq!(h.repo.len().await, 3);
    assert!(h.repo.find_by_email("c@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_bulk_create_unique_violation_on_insert_is_duplicate() {
    let cache = InMemoryCacheStore::new();
    let service = common::service(
        Arc::new(RacingRepository::default()),
        Arc::new(cache.clone()),
        ServiceConfig::default(),
    );
    service.get_users(&UserFilter::default()).await.unwrap();
    let page_key = keys::users_filtered(&UserFilter::default());
    assert!(cache.get(&page_key).await.unwrap().is_some());

    let err = service
        .create_bulk_users(vec![new_user("a@example.com"), new_user("b@example.com")])
        .await
        .unwrap_err();

    assert!(matches!(err, UserServiceError::DuplicateEmail(ref e) if e.is_empty()));
    assert!(cache.get(&page_key).await.unwrap().is_some());
}

#[tokio::test]
async fn test_bulk_create_evicts_filtered_pages() {
    let h = harness();
    let before = h.service.get_users(&UserFilter::default()).await.unwrap();
    assert_eq!(before.meta.total, 0);

    h.service
        .create_bulk_users(vec![new_user("a@example.com"), new_user("b@example.com")])
        .await
        .unwrap();

    let after = h.service.get_users(&UserFilter::default()).await.unwrap();
    assert_eq!(after.meta.total, 2);
}

#[tokio::test]
async fn test_bulk_update_reports_missing_identifier_and_keeps_valid_update() {
    let h = harness();
    let ada = h
        .service
        .create_user(named_user("ada@example.com", "Ada"))
        .await
        .unwrap();

    let result = h
        .service
        .update_bulk_users(vec![
            rename(&ada.id.to_string(), "Ada Lovelace"),
            rename("999", "Nobody"),
        ])
        .await
        .unwrap();

    assert_eq!(result.successful, 1);
    assert_eq!(result.failed, 1);
    assert_eq!(
        result.errors,
        vec![BulkItemError {
            identifier: "999".to_string(),
            error: "User not found".to_string(),
        }]
    );

    let stored = h.repo.find_by_id(ada.id).await.unwrap().unwrap();
    assert_eq!(stored.name.as_deref(), Some("Ada Lovelace"));
}

#[tokio::test]
async fn test_bulk_update_errors_echo_identifier_as_sent() {
    let h = harness();
    h.service.create_user(new_user("ada@example.com")).await.unwrap();

    let result = h
        .service
        .update_bulk_users(vec![
            rename("0999", "Nobody"),
            rename("Ghost@Example.com", "Ghost"),
            rename("ADA@example.com", "Ada"),
        ])
        .await
        .unwrap();

    assert_eq!(result.successful, 1);
    let reported: Vec<&str> = result.errors.iter().map(|e| e.identifier.as_str()).collect();
    assert_eq!(reported, vec!["0999", "Ghost@Example.com"]);
}

#[tokio::test]
async fn test_bulk_update_rejects_email_owned_by_another_user() {
    let h = harness();
    h.service.create_user(new_user("a@example.com")).await.unwrap();
    h.service.create_user(new_user("b@example.com")).await.unwrap();

    let result = h
        .service
        .update_bulk_users(vec![BulkUserUpdate::new(
            "a@example.com",
            UserPatch {
                email: Some(Email::new("b@example.com").unwrap()),
                ..Default::default()
            },
        )])
        .await
        .unwrap();

    assert_eq!(result.successful, 0);
    assert_eq!(result.errors[0].identifier, "a@example.com");
    assert_eq!(result.errors[0].error, "Email already exists");
}

#[tokio::test]
async fn test_bulk_update_item_failure_does_not_roll_back_siblings() {
    let inner = accounts_api::infrastructure::repositories::InMemoryUserRepository::new();
    let seed = common::service(
        Arc::new(inner.clone()),
        Arc::new(InMemoryCacheStore::new()),
        ServiceConfig::default(),
    );
    let a = seed.create_user(new_user("a@example.com")).await.unwrap();
    let b = seed.create_user(new_user("b@example.com")).await.unwrap();
    let c = seed.create_user(new_user("c@example.com")).await.unwrap();

    let flaky = FlakyRepository {
        inner: inner.clone(),
        failing_updates: HashSet::from([b.id]),
        fail_commit: false,
    };
    let service = common::service(
        Arc::new(flaky),
        Arc::new(InMemoryCacheStore::new()),
        ServiceConfig::default(),
    );

    let result = service
        .update_bulk_users(vec![
            rename(&a.id.to_string(), "A"),
            rename(&b.id.to_string(), "B"),
            rename(&c.id.to_string(), "C"),
        ])
        .await
        .unwrap();

    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(result.errors[0].identifier, b.id.to_string());
    assert_eq!(result.errors[0].error, "Error updating user");

    let names: Vec<Option<String>> = vec![
        inner.find_by_id(a.id).await.unwrap().unwrap().name,
        inner.find_by_id(b.id).await.unwrap().unwrap().name,
        inner.find_by_id(c.id).await.unwrap().unwrap().name,
    ];
    assert_eq!(names, vec![Some("A".to_string()), None, Some("C".to_string())]);
}

#[tokio::test]
async fn test_bulk_update_commit_failure_aborts() {
    let inner = accounts_api::infrastructure::repositories::InMemoryUserRepository::new();
    let seed = common::service(
        Arc::new(inner.clone()),
        Arc::new(InMemoryCacheStore::new()),
        ServiceConfig::default(),
    );
    let a = seed.create_user(new_user("a@example.com")).await.unwrap();

    let flaky = FlakyRepository {
        inner: inner.clone(),
        failing_updates: HashSet::new(),
        fail_commit: true,
    };
    let service = common::service(
        Arc::new(flaky),
        Arc::new(InMemoryCacheStore::new()),
        ServiceConfig::default(),
    );

    let err = service
        .update_bulk_users(vec![rename(&a.id.to_string(), "A")])
        .await
        .unwrap_err();

    match err {
        UserServiceError::Internal(message) => assert_eq!(message, "Error updating users"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(inner.find_by_id(a.id).await.unwrap().unwrap().name, None);
}

#[tokio::test]
async fn test_bulk_update_spans_chunks_and_evicts_caches() {
    let h = harness_with(small_chunks());
    let mut ids = Vec::new();
    for i in 0..5 {
        let user = h
            .service
            .create_user(named_user(&format!("u{}@example.com", i), "Old"))
            .await
            .unwrap();
        ids.push(user.id);
    }

    let warm = h.service.get_users(&name_filter("old")).await.unwrap();
    assert_eq!(warm.meta.total, 5);

    let updates = ids.iter().map(|id| rename(&id.to_string(), "New")).collect();
    let result = h.service.update_bulk_users(updates).await.unwrap();
    assert_eq!(result.successful, 5);

    let stale = h.service.get_users(&name_filter("old")).await.unwrap();
    assert_eq!(stale.meta.total, 0);
    let fresh = h.service.get_users(&name_filter("new")).await.unwrap();
    assert_eq!(fresh.meta.total, 5);
}

#[tokio::test]
async fn test_bulk_update_hashes_passwords_and_sets_status() {
    let h = harness();
    let ada = h.service.create_user(new_user("ada@example.com")).await.unwrap();

    let result = h
        .service
        .update_bulk_users(vec![BulkUserUpdate::new(
            ada.id.to_string(),
            UserPatch {
                password: Some("rotated".to_string()),
                status: Some(UserStatus::Suspended),
                ..Default::default()
            },
        )])
        .await
        .unwrap();
    assert_eq!(result.successful, 1);

    let view = h
        .service
        .verify_credentials("ada@example.com", "rotated")
        .await
        .unwrap();
    assert_eq!(view.status, UserStatus::Suspended);
}

#[tokio::test]
async fn test_bulk_delete_removes_found_and_skips_missing() {
    let h = harness_with(small_chunks());
    let a = h.service.create_user(new_user("a@example.com")).await.unwrap();
    h.service.create_user(new_user("b@example.com")).await.unwrap();
    let c = h.service.create_user(new_user("c@example.com")).await.unwrap();

    let warm = h.service.get_users(&UserFilter::default()).await.unwrap();
    assert_eq!(warm.meta.total, 3);

    h.service
        .delete_bulk_users(vec![
            UserIdentifier::Id(a.id),
            UserIdentifier::parse("999"),
            UserIdentifier::parse("B@example.com"),
            UserIdentifier::parse("nobody@example.com"),
        ])
        .await
        .unwrap();

    assert_eq!(h.repo.len().await, 1);
    assert!(h.repo.find_by_id(c.id).await.unwrap().is_some());

    let page = h.service.get_users(&UserFilter::default()).await.unwrap();
    assert_eq!(page.meta.total, 1);
}

#[tokio::test]
async fn test_bulk_delete_of_nothing_is_ok() {
    let h = harness();
    h.service
        .delete_bulk_users(vec![UserIdentifier::parse("999")])
        .await
        .unwrap();
    h.service.delete_bulk_users(Vec::new()).await.unwrap();
}
