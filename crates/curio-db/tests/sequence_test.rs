//! Integration tests for sequences and their ordered members.
//!
//! This test suite validates:
//! - Seq-001: create derives the slug from the title; duplicate slugs and
//!   unusable titles are rejected
//! - Seq-002: save recomputes the slug and keeps the creation time
//! - Seq-003: append and positioned insert keep positions contiguous from 1
//! - Seq-004: the same item cannot be a member twice
//! - Seq-005: out-of-range insert positions clamp to the ends
//! - Seq-006: remove closes the position gap it leaves
//! - Seq-007: move shifts exactly the members between the old and new slots
//! - Seq-008: deleting a sequence drops memberships, not the content

use curio_core::{ContentKind, ContentRepository, Error, SequenceRepository};
use curio_db::test_fixtures::{post_draft, TestDatabase};
use curio_db::Database;
use uuid::Uuid;

async fn seed_posts(db: &Database, count: i32) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for n in 0..count {
        let item = db
            .content
            .save_item(
                ContentKind::ObPost,
                None,
                &post_draft(&format!("2009/03/post-{n}"), &format!("Post {n}"), 16000 + n),
            )
            .await
            .expect("post should be created");
        ids.push(item.id);
    }
    ids
}

async fn positions(db: &Database, sequence_id: Uuid) -> Vec<(Uuid, i32)> {
    db.sequences
        .members(sequence_id)
        .await
        .expect("members should load")
        .into_iter()
        .map(|m| (m.content_id, m.position))
        .collect()
}

// ============================================================================
// SEQUENCES
// ============================================================================

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn create_derives_slug_and_rejects_duplicates() {
    let test_db = TestDatabase::new().await;

    let sequence = test_db
        .db
        .sequences
        .create("Signaling Series", "Posts on costly signals.")
        .await
        .expect("create should succeed");
    assert_eq!(sequence.slug, "signaling-series");
    assert_eq!(sequence.abstract_text, "Posts on costly signals.");

    let found = test_db
        .db
        .sequences
        .get_by_slug("signaling-series")
        .await
        .expect("slug lookup should succeed");
    assert_eq!(found.id, sequence.id);

    // Normalizes to the same slug
    let collision = test_db.db.sequences.create("Signaling  Series!", "").await;
    match collision {
        Err(Error::Validation(msg)) => assert!(msg.contains("already in use"), "{msg}"),
        other => panic!("expected Validation, got {:?}", other),
    }

    let unusable = test_db.db.sequences.create("!!!", "").await;
    assert!(matches!(unusable, Err(Error::InvalidInput(_))));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn save_recomputes_slug_and_keeps_created_at() {
    let test_db = TestDatabase::new().await;

    let mut sequence = test_db
        .db
        .sequences
        .create("Signaling Series", "")
        .await
        .expect("create should succeed");

    sequence.title = "Signals, Revisited".to_string();
    let saved = test_db
        .db
        .sequences
        .save(&sequence)
        .await
        .expect("save should succeed");

    assert_eq!(saved.slug, "signals-revisited");
    assert_eq!(saved.created_at_utc, sequence.created_at_utc);
    assert!(saved.updated_at_utc > saved.created_at_utc);

    let old_slug = test_db.db.sequences.get_by_slug("signaling-series").await;
    assert!(matches!(old_slug, Err(Error::NotFound(_))));

    test_db.cleanup().await;
}

// ============================================================================
// MEMBERSHIP
// ============================================================================

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn members_stay_contiguous_through_append_and_insert() {
    let test_db = TestDatabase::new().await;
    let posts = seed_posts(&test_db.db, 3).await;
    let sequence = test_db
        .db
        .sequences
        .create("Reading Order", "")
        .await
        .expect("create should succeed");

    let first = test_db
        .db
        .sequences
        .add_member(sequence.id, posts[0], None)
        .await
        .expect("append should succeed");
    assert_eq!(first.position, 1);

    let second = test_db
        .db
        .sequences
        .add_member(sequence.id, posts[1], None)
        .await
        .expect("append should succeed");
    assert_eq!(second.position, 2);

    // Insert at the head shifts both appended members down
    let inserted = test_db
        .db
        .sequences
        .add_member(sequence.id, posts[2], Some(1))
        .await
        .expect("insert should succeed");
    assert_eq!(inserted.position, 1);

    assert_eq!(
        positions(&test_db.db, sequence.id).await,
        vec![(posts[2], 1), (posts[0], 2), (posts[1], 3)]
    );

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn duplicate_member_rejected() {
    let test_db = TestDatabase::new().await;
    let posts = seed_posts(&test_db.db, 1).await;
    let sequence = test_db
        .db
        .sequences
        .create("Reading Order", "")
        .await
        .expect("create should succeed");

    test_db
        .db
        .sequences
        .add_member(sequence.id, posts[0], None)
        .await
        .expect("first add should succeed");

    let again = test_db.db.sequences.add_member(sequence.id, posts[0], None).await;
    match again {
        Err(Error::Validation(msg)) => assert!(msg.contains("already in sequence"), "{msg}"),
        other => panic!("expected Validation, got {:?}", other),
    }

    assert_eq!(positions(&test_db.db, sequence.id).await.len(), 1);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn insert_position_clamps_to_the_ends() {
    let test_db = TestDatabase::new().await;
    let posts = seed_posts(&test_db.db, 3).await;
    let sequence = test_db
        .db
        .sequences
        .create("Reading Order", "")
        .await
        .expect("create should succeed");

    test_db
        .db
        .sequences
        .add_member(sequence.id, posts[0], None)
        .await
        .expect("append should succeed");

    // Far past the end clamps to max + 1
    let tail = test_db
        .db
        .sequences
        .add_member(sequence.id, posts[1], Some(99))
        .await
        .expect("insert should succeed");
    assert_eq!(tail.position, 2);

    // Zero and below clamp to the head
    let head = test_db
        .db
        .sequences
        .add_member(sequence.id, posts[2], Some(0))
        .await
        .expect("insert should succeed");
    assert_eq!(head.position, 1);

    assert_eq!(
        positions(&test_db.db, sequence.id).await,
        vec![(posts[2], 1), (posts[0], 2), (posts[1], 3)]
    );

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn remove_member_closes_the_gap() {
    let test_db = TestDatabase::new().await;
    let posts = seed_posts(&test_db.db, 3).await;
    let sequence = test_db
        .db
        .sequences
        .create("Reading Order", "")
        .await
        .expect("create should succeed");
    for id in &posts {
        test_db
            .db
            .sequences
            .add_member(sequence.id, *id, None)
            .await
            .expect("append should succeed");
    }

    test_db
        .db
        .sequences
        .remove_member(sequence.id, posts[1])
        .await
        .expect("remove should succeed");

    assert_eq!(
        positions(&test_db.db, sequence.id).await,
        vec![(posts[0], 1), (posts[2], 2)]
    );

    let missing = test_db.db.sequences.remove_member(sequence.id, posts[1]).await;
    assert!(matches!(missing, Err(Error::NotFound(_))));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn move_member_shifts_the_span_between() {
    let test_db = TestDatabase::new().await;
    let posts = seed_posts(&test_db.db, 4).await;
    let sequence = test_db
        .db
        .sequences
        .create("Reading Order", "")
        .await
        .expect("create should succeed");
    for id in &posts {
        test_db
            .db
            .sequences
            .add_member(sequence.id, *id, None)
            .await
            .expect("append should succeed");
    }

    // Tail to slot 2: the two members in between shift down
    let moved = test_db
        .db
        .sequences
        .move_member(sequence.id, posts[3], 2)
        .await
        .expect("move should succeed");
    assert_eq!(moved.position, 2);
    assert_eq!(
        positions(&test_db.db, sequence.id).await,
        vec![(posts[0], 1), (posts[3], 2), (posts[1], 3), (posts[2], 4)]
    );

    // Past the end clamps to the tail
    let moved = test_db
        .db
        .sequences
        .move_member(sequence.id, posts[0], 99)
        .await
        .expect("move should succeed");
    assert_eq!(moved.position, 4);
    assert_eq!(
        positions(&test_db.db, sequence.id).await,
        vec![(posts[3], 1), (posts[1], 2), (posts[2], 3), (posts[0], 4)]
    );

    // Moving to the current slot is a no-op
    let unmoved = test_db
        .db
        .sequences
        .move_member(sequence.id, posts[1], 2)
        .await
        .expect("move should succeed");
    assert_eq!(unmoved.position, 2);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn delete_sequence_drops_memberships_not_content() {
    let test_db = TestDatabase::new().await;
    let posts = seed_posts(&test_db.db, 1).await;
    let sequence = test_db
        .db
        .sequences
        .create("Reading Order", "")
        .await
        .expect("create should succeed");
    test_db
        .db
        .sequences
        .add_member(sequence.id, posts[0], None)
        .await
        .expect("append should succeed");

    test_db
        .db
        .sequences
        .delete(sequence.id)
        .await
        .expect("delete should succeed");

    let gone = test_db.db.sequences.get(sequence.id).await;
    assert!(matches!(gone, Err(Error::SequenceNotFound(_))));

    let survivor = test_db.db.content.get(posts[0]).await;
    assert!(survivor.is_ok());

    test_db.cleanup().await;
}
