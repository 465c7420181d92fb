mod common;

use common::{count, ctx, make_post, make_user, open};
use social_db::{Comment, ErrorKind, Post, StoreError};

#[tokio::test]
async fn create_populates_generated_fields() {
    let t = open();
    let alice = make_user(&t.storage, "alice").await;

    let mut post = Post::new(alice.id, "Hello", "First post", vec!["intro".into(), "rust".into()]);
    post.version = 99;
    t.storage.posts.create(&ctx(), &mut post).await.unwrap();

    assert!(post.id > 0);
    assert_eq!(post.version, 1);
    assert_eq!(post.created_at, post.updated_at);

    let stored = t.storage.posts.get_by_id(&ctx(), post.id).await.unwrap();
    assert_eq!(stored, post);
    assert_eq!(stored.tags, vec!["intro".to_string(), "rust".to_string()]);
}

#[tokio::test]
async fn delete_then_everything_is_not_found() {
    let t = open();
    let alice = make_user(&t.storage, "alice").await;
    let post = make_post(&t.storage, alice.id, "doomed").await;

    let mut comment = Comment::new(post.id, alice.id, "first!");
    t.storage.comments.create(&ctx(), &mut comment).await.unwrap();

    t.storage.posts.delete(&ctx(), post.id).await.unwrap();

    assert!(matches!(
        t.storage.posts.delete(&ctx(), post.id).await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        t.storage.posts.get_by_id(&ctx(), post.id).await,
        Err(StoreError::NotFound)
    ));
    assert_eq!(count(&t.db, "comments"), 0);
}

#[tokio::test]
async fn delete_of_absent_post_is_not_found() {
    let t = open();
    let err = t.storage.posts.delete(&ctx(), 12345).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn update_advances_version_exactly_once() {
    let t = open();
    let alice = make_user(&t.storage, "alice").await;
    let original = make_post(&t.storage, alice.id, "draft").await;

    let mut first = original.clone();
    first.title = "edited".into();
    first.tags = vec!["edited".into()];
    let version = t.storage.posts.update(&ctx(), &mut first).await.unwrap();
    assert_eq!(version, original.version + 1);
    assert_eq!(first.version, version);

    // A second writer still holding the original version loses.
    let mut replay = original.clone();
    replay.title = "clobber".into();
    let err = t.storage.posts.update(&ctx(), &mut replay).await.unwrap_err();
    assert!(matches!(err, StoreError::StaleVersion { id, version } if id == original.id && version == original.version));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(replay.version, original.version);

    let stored = t.storage.posts.get_by_id(&ctx(), original.id).await.unwrap();
    assert_eq!(stored.title, "edited");
    assert_eq!(stored.tags, vec!["edited".to_string()]);
    assert_eq!(stored.version, original.version + 1);
    assert_eq!(stored.created_at, original.created_at);
    assert!(stored.updated_at >= original.updated_at);
}

#[tokio::test]
async fn refetch_and_resubmit_succeeds_after_conflict() {
    let t = open();
    let alice = make_user(&t.storage, "alice").await;
    let post = make_post(&t.storage, alice.id, "shared").await;

    let mut a = post.clone();
    let mut b = post.clone();
    t.storage.posts.update(&ctx(), &mut a).await.unwrap();
    assert!(t.storage.posts.update(&ctx(), &mut b).await.is_err());

    let mut fresh = t.storage.posts.get_by_id(&ctx(), post.id).await.unwrap();
    fresh.content = "merged".into();
    assert_eq!(t.storage.posts.update(&ctx(), &mut fresh).await.unwrap(), 3);
}

#[tokio::test]
async fn update_of_missing_post_is_not_found() {
    let t = open();
    let alice = make_user(&t.storage, "alice").await;
    let mut ghost = Post::new(alice.id, "ghost", "boo", vec![]);
    ghost.id = 777;
    let err = t.storage.posts.update(&ctx(), &mut ghost).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}

#[tokio::test]
async fn post_for_unknown_author_is_unclassified() {
    let t = open();
    let mut post = Post::new(999, "orphan", "no author", vec![]);
    let err = t.storage.posts.create(&ctx(), &mut post).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unclassified);
    assert_eq!(count(&t.db, "posts"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_on_one_version_admit_a_single_winner() {
    let t = open();
    let alice = make_user(&t.storage, "alice").await;
    let post = make_post(&t.storage, alice.id, "contended").await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let storage = t.storage.clone();
        let mut attempt = post.clone();
        attempt.title = format!("writer {i}");
        handles.push(tokio::spawn(async move {
            storage.posts.update(&ctx(), &mut attempt).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(version) => {
                assert_eq!(version, post.version + 1);
                winners += 1;
            }
            Err(err) => assert_eq!(err.kind(), ErrorKind::Conflict, "{err}"),
        }
    }
    assert_eq!(winners, 1);

    let stored = t.storage.posts.get_by_id(&ctx(), post.id).await.unwrap();
    assert_eq!(stored.version, post.version + 1);
}
