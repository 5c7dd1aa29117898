// PgReferralStore against a real database
// Skipped unless TEST_DATABASE_URL or DATABASE_URL points at a reachable Postgres

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{setup_pg_store, unique_code, unique_email};
use futures_util::future::join_all;
use referral_service::{
    services::ShortCodeGenerator,
    store::{PgReferralStore, RegisteredUser, Registration},
    ReferralStore, StoreError,
};

fn registration(email: &str, referral_code: Option<&str>) -> Registration {
    let now = Utc::now();
    Registration {
        email: email.to_string(),
        password_hash: "$2b$04$not-a-real-hash".to_string(),
        referral_code: referral_code.map(str::to_string),
        code_expires_at: now + Duration::days(30),
        now,
    }
}

async fn register(
    store: &PgReferralStore,
    email: &str,
    referral_code: Option<&str>,
) -> RegisteredUser {
    store
        .register_user(registration(email, referral_code), &ShortCodeGenerator::default())
        .await
        .unwrap()
}

/// Generator replaying `candidates`, repeating the last one once exhausted
fn scripted(candidates: Vec<String>, max_attempts: usize) -> ShortCodeGenerator {
    let next = Arc::new(AtomicUsize::new(0));
    ShortCodeGenerator::with_source(max_attempts, move || {
        let i = next.fetch_add(1, Ordering::SeqCst).min(candidates.len() - 1);
        candidates[i].clone()
    })
    .unwrap()
}

#[tokio::test]
async fn test_pg_register_with_referral_creates_edge() {
    let Some(store) = setup_pg_store().await else {
        return;
    };

    let referrer = register(&store, &unique_email("referrer"), None).await;
    let referred = register(&store, &unique_email("referred"), Some(&referrer.code.code)).await;

    assert_eq!(referred.referrer_id, Some(referrer.user.id));
    assert_eq!(referred.code.code.len(), 8);
    assert!(!referred.code.is_archived);

    let listed = store.list_referred_users(referrer.user.id).await.unwrap();
    assert_eq!(listed, vec![referred.user]);
}

#[tokio::test]
async fn test_pg_invalid_referral_code_creates_nothing() {
    let Some(store) = setup_pg_store().await else {
        return;
    };
    let email = unique_email("invalid-code");

    let result = store
        .register_user(
            registration(&email, Some(&unique_code())),
            &ShortCodeGenerator::default(),
        )
        .await;

    assert!(matches!(result, Err(StoreError::InvalidReferralCode)));
    assert!(store.find_user_by_email(&email).await.unwrap().is_none());
}

#[tokio::test]
async fn test_pg_duplicate_email_rolls_back_referral() {
    let Some(store) = setup_pg_store().await else {
        return;
    };

    let referrer = register(&store, &unique_email("referrer"), None).await;
    let taken = unique_email("taken");
    register(&store, &taken, None).await;

    // The referral code resolves, then the user insert hits users_email_key
    let result = store
        .register_user(
            registration(&taken, Some(&referrer.code.code)),
            &ShortCodeGenerator::default(),
        )
        .await;

    assert!(matches!(result, Err(StoreError::EmailTaken)));
    assert!(store
        .list_referred_users(referrer.user.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_pg_code_collision_retried_in_savepoint() {
    let Some(store) = setup_pg_store().await else {
        return;
    };

    let existing = register(&store, &unique_email("existing"), None).await;
    let fresh = unique_code();
    let generator = scripted(vec![existing.code.code.clone(), fresh.clone()], 5);

    let registered = store
        .register_user(registration(&unique_email("retry"), None), &generator)
        .await
        .unwrap();

    assert_eq!(registered.code.code, fresh);
    assert_eq!(generator.stats().collisions, 1);
}

#[tokio::test]
async fn test_pg_exhausted_code_attempts_roll_back_registration() {
    let Some(store) = setup_pg_store().await else {
        return;
    };

    let referrer = register(&store, &unique_email("referrer"), None).await;
    let generator = scripted(vec![referrer.code.code.clone()], 3);
    let email = unique_email("stuck");

    let result = store
        .register_user(registration(&email, Some(&referrer.code.code)), &generator)
        .await;

    assert!(matches!(result, Err(StoreError::CodeGenerationExhausted(3))));
    assert_eq!(generator.stats().collisions, 3);
    assert!(store.find_user_by_email(&email).await.unwrap().is_none());
    assert!(store
        .list_referred_users(referrer.user.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pg_concurrent_issue_yields_single_active_code() {
    let Some(store) = setup_pg_store().await else {
        return;
    };

    let owner = register(&store, &unique_email("owner"), None).await;
    let now = Utc::now();
    assert!(store
        .archive_active_code(owner.user.id, now)
        .await
        .unwrap()
        .is_some());

    let owner_id = owner.user.id;
    let generator = ShortCodeGenerator::default();
    let attempts = (0..8).map(|_| {
        let store = store.clone();
        let generator = generator.clone();
        tokio::spawn(async move {
            let now = Utc::now();
            store
                .issue_code(owner_id, now + Duration::days(10), now, &generator)
                .await
        })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let issued = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(StoreError::ActiveCodeExists)))
        .count();
    assert_eq!(issued, 1);
    assert_eq!(conflicts, 7);

    let codes = store
        .codes_for_users(&[owner.user.clone()])
        .await
        .unwrap();
    let now = Utc::now();
    assert_eq!(codes[0].iter().filter(|c| c.is_active_at(now)).count(), 1);
}

#[tokio::test]
async fn test_pg_archive_then_lookup() {
    let Some(store) = setup_pg_store().await else {
        return;
    };

    let owner = register(&store, &unique_email("owner"), None).await;
    let now = Utc::now();

    let archived = store
        .archive_active_code(owner.user.id, now)
        .await
        .unwrap()
        .unwrap();
    assert!(archived.is_archived);
    assert_eq!(archived.code, owner.code.code);

    assert!(store
        .find_active_code(owner.user.id, Utc::now())
        .await
        .unwrap()
        .is_none());
    assert!(store
        .archive_active_code(owner.user.id, Utc::now())
        .await
        .unwrap()
        .is_none());

    // An archived code no longer refers anyone
    let result = store
        .register_user(
            registration(&unique_email("late"), Some(&owner.code.code)),
            &ShortCodeGenerator::default(),
        )
        .await;
    assert!(matches!(result, Err(StoreError::InvalidReferralCode)));
}

#[tokio::test]
async fn test_pg_referred_users_in_insertion_order_with_codes() {
    let Some(store) = setup_pg_store().await else {
        return;
    };

    let referrer = register(&store, &unique_email("referrer"), None).await;
    let mut expected = Vec::new();
    for name in ["first", "second", "third"] {
        let referred = register(&store, &unique_email(name), Some(&referrer.code.code)).await;
        expected.push(referred.user);
    }

    let listed = store.list_referred_users(referrer.user.id).await.unwrap();
    assert_eq!(listed, expected);

    let codes = store.codes_for_users(&listed).await.unwrap();
    assert_eq!(codes.len(), 3);
    for (user, owned) in listed.iter().zip(codes.iter()) {
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].user_id, user.id);
    }
}

#[tokio::test]
async fn test_pg_delete_user_cascades() {
    let Some(store) = setup_pg_store().await else {
        return;
    };

    let referrer = register(&store, &unique_email("referrer"), None).await;
    let referred = register(&store, &unique_email("referred"), Some(&referrer.code.code)).await;

    assert!(store.delete_user(referred.user.id).await.unwrap());
    assert!(!store.delete_user(referred.user.id).await.unwrap());

    assert!(store
        .list_referred_users(referrer.user.id)
        .await
        .unwrap()
        .is_empty());
    let codes = store
        .codes_for_users(&[referred.user.clone()])
        .await
        .unwrap();
    assert!(codes[0].is_empty());
    assert!(store
        .find_user_by_email(&referred.user.email)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_pg_health_check() {
    let Some(store) = setup_pg_store().await else {
        return;
    };

    assert!(store.health_check().await);
}
