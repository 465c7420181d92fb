mod common;

use std::time::{Duration, Instant};

use common::{make_user, open};
use rusqlite::Connection;
use social_db::{CallContext, ErrorKind, StoreError, Storage};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn cancelled_context_fails_without_touching_storage() {
    let t = open();
    let token = CancellationToken::new();
    token.cancel();
    let ctx = CallContext::with_cancellation(token);

    let err = t.storage.users.get_by_id(&ctx, 1).await.unwrap_err();
    assert!(matches!(err, StoreError::Cancelled { .. }));
    assert_eq!(err.kind(), ErrorKind::Unclassified);

    let err = Storage::in_memory()
        .users
        .get_by_id(&ctx, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Cancelled { .. }));
}

#[tokio::test]
async fn expired_deadline_fails_fast() {
    let t = open();
    let ctx = CallContext::with_timeout(Duration::ZERO);
    let err = t.storage.posts.get_user_feed(&ctx, 1).await.unwrap_err();
    assert!(matches!(err, StoreError::DeadlineExceeded { .. }));
}

#[tokio::test]
async fn blocked_write_gives_up_at_the_deadline() {
    let t = open();
    let alice = make_user(&t.storage, "alice").await;
    let bob = make_user(&t.storage, "bob").await;

    let blocker = Connection::open(&t.path).unwrap();
    blocker.execute_batch("BEGIN EXCLUSIVE;").unwrap();

    let ctx = CallContext::with_timeout(Duration::from_millis(200));
    let started = Instant::now();
    let err = t
        .storage
        .followers
        .follow(&ctx, alice.id, bob.id)
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::DeadlineExceeded { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));
    blocker.execute_batch("ROLLBACK;").unwrap();
}

#[tokio::test]
async fn cancellation_interrupts_a_waiting_call() {
    let t = open();
    let alice = make_user(&t.storage, "alice").await;
    let bob = make_user(&t.storage, "bob").await;

    let blocker = Connection::open(&t.path).unwrap();
    blocker.execute_batch("BEGIN EXCLUSIVE;").unwrap();

    let token = CancellationToken::new();
    let ctx = CallContext::with_cancellation(token.clone());
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let err = t
        .storage
        .followers
        .follow(&ctx, alice.id, bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Cancelled { .. }));

    canceller.await.unwrap();
    blocker.execute_batch("ROLLBACK;").unwrap();
}

#[tokio::test]
async fn health_check_passes_on_open_database() {
    let t = open();
    t.db.health_check(&CallContext::background()).await.unwrap();
}
