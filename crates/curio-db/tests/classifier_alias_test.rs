//! Integration tests for the classifier alias engine.
//!
//! This test suite validates:
//! - Alias-001: creation keeps one protected alias equal to the slug
//! - Alias-002: alias text is unique within a kind, free across kinds
//! - Alias-003: find_by_alias resolves normalized text and slugs
//! - Alias-004: renames leave the old slug behind as an unprotected alias
//! - Alias-005: a rename cannot steal a slug owned by another classifier
//! - Alias-006: merge unions aliases, descriptions and content links
//! - Alias-007: convert re-creates under the target kind; a collision
//!   aborts the conversion and leaves the source untouched
//! - Alias-008: convert_bulk counts per-item failures and continues
//! - Alias-009: the protected alias cannot be removed

use curio_core::{ClassifierKind, ClassifierRepository, ContentKind, ContentRepository, Error};
use curio_db::test_fixtures::{post_draft, TestDatabase};

// ============================================================================
// CREATION & UNIQUENESS
// ============================================================================

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn create_keeps_protected_slug_alias() {
    let test_db = TestDatabase::new().await;

    let topic = test_db
        .db
        .classifiers
        .create_with_aliases(
            ClassifierKind::Topic,
            "Law&Øther",
            None,
            // The second alias normalizes to the slug and must be discarded
            &["law-etc".to_string(), "Law Other".to_string()],
        )
        .await
        .expect("create should succeed");

    assert_eq!(topic.slug, "law-other");

    let aliases = test_db
        .db
        .classifiers
        .aliases_of(topic.id)
        .await
        .expect("aliases should load");
    assert_eq!(aliases.len(), 2);
    assert!(aliases[0].protected);
    assert_eq!(aliases[0].text, "law-other");
    assert!(!aliases[1].protected);
    assert_eq!(aliases[1].text, "law-etc");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn duplicate_alias_rejected_same_kind_allowed_cross_kind() {
    let test_db = TestDatabase::new().await;

    test_db
        .db
        .classifiers
        .create_with_aliases(ClassifierKind::Topic, "Signaling", None, &[])
        .await
        .expect("first create should succeed");

    // Same kind: the supplied alias collides with the first topic's slug,
    // and the whole transaction rolls back.
    let err = test_db
        .db
        .classifiers
        .create_with_aliases(
            ClassifierKind::Topic,
            "Signalling",
            None,
            &["signaling".to_string()],
        )
        .await
        .expect_err("colliding create should fail");
    assert!(matches!(err, Error::DuplicateAlias(_)));

    let gone = test_db
        .db
        .classifiers
        .get_by_slug(ClassifierKind::Topic, "signalling")
        .await;
    assert!(matches!(gone, Err(Error::NotFound(_))));

    // Different kind: the same text is free.
    test_db
        .db
        .classifiers
        .create_with_aliases(ClassifierKind::Tag, "Signaling", None, &[])
        .await
        .expect("cross-kind create should succeed");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn find_by_alias_resolves_normalized_text() {
    let test_db = TestDatabase::new().await;

    let topic = test_db
        .db
        .classifiers
        .create_with_aliases(
            ClassifierKind::Topic,
            "Prediction Markets",
            None,
            &["idea futures".to_string()],
        )
        .await
        .expect("create should succeed");

    // Unnormalized inputs hit the normalized alias text
    let by_alias = test_db
        .db
        .classifiers
        .find_by_alias(ClassifierKind::Topic, "Idea Futures")
        .await
        .expect("lookup should succeed")
        .expect("alias should resolve");
    assert_eq!(by_alias.id, topic.id);

    let by_slug = test_db
        .db
        .classifiers
        .find_by_alias(ClassifierKind::Topic, "PREDICTION MARKETS")
        .await
        .expect("lookup should succeed")
        .expect("slug should resolve");
    assert_eq!(by_slug.id, topic.id);

    let miss = test_db
        .db
        .classifiers
        .find_by_alias(ClassifierKind::Topic, "futarchy")
        .await
        .expect("lookup should succeed");
    assert!(miss.is_none());

    test_db.cleanup().await;
}

// ============================================================================
// RENAME
// ============================================================================

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn rename_keeps_old_slug_as_unprotected_alias() {
    let test_db = TestDatabase::new().await;

    let mut author = test_db
        .db
        .classifiers
        .create_with_aliases(ClassifierKind::Author, "Robin Hansen", None, &[])
        .await
        .expect("create should succeed");

    author.name = "Robin Hanson".to_string();
    let saved = test_db
        .db
        .classifiers
        .save(&author)
        .await
        .expect("rename should succeed");
    assert_eq!(saved.slug, "robin-hanson");

    let aliases = test_db
        .db
        .classifiers
        .aliases_of(saved.id)
        .await
        .expect("aliases should load");
    let texts: Vec<(&str, bool)> = aliases
        .iter()
        .map(|a| (a.text.as_str(), a.protected))
        .collect();
    assert_eq!(texts, vec![("robin-hanson", true), ("robin-hansen", false)]);

    // The misspelled original still resolves to the same author
    let resolved = test_db
        .db
        .classifiers
        .find_by_alias(ClassifierKind::Author, "Robin Hansen")
        .await
        .expect("lookup should succeed")
        .expect("old slug should resolve");
    assert_eq!(resolved.id, saved.id);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn rename_cannot_steal_a_slug_owned_elsewhere() {
    let test_db = TestDatabase::new().await;

    test_db
        .db
        .classifiers
        .create_with_aliases(ClassifierKind::Author, "Robin Hanson", None, &[])
        .await
        .expect("create should succeed");

    let mut other = test_db
        .db
        .classifiers
        .create_with_aliases(ClassifierKind::Author, "Tyler Cowen", None, &[])
        .await
        .expect("create should succeed");

    other.name = "Robin Hanson".to_string();
    let err = test_db
        .db
        .classifiers
        .save(&other)
        .await
        .expect_err("rename onto a taken slug should fail");
    assert!(matches!(err, Error::DuplicateAlias(_)));

    // Rollback left the original name in place
    let unchanged = test_db
        .db
        .classifiers
        .get(other.id)
        .await
        .expect("classifier should still exist");
    assert_eq!(unchanged.name, "Tyler Cowen");
    assert_eq!(unchanged.slug, "tyler-cowen");

    test_db.cleanup().await;
}

// ============================================================================
// MERGE
// ============================================================================

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn merge_unions_aliases_and_joins_descriptions() {
    let test_db = TestDatabase::new().await;

    let first = test_db
        .db
        .classifiers
        .create_with_aliases(
            ClassifierKind::Idea,
            "Signaling",
            Some("Costly displays"),
            &["status moves".to_string()],
        )
        .await
        .expect("create should succeed");
    let second = test_db
        .db
        .classifiers
        .create_with_aliases(
            ClassifierKind::Idea,
            "Countersignaling",
            Some("Showing off by not showing off"),
            &[],
        )
        .await
        .expect("create should succeed");

    let merged = test_db
        .db
        .classifiers
        .merge(ClassifierKind::Idea, &[first.id, second.id])
        .await
        .expect("merge should succeed");

    // Name from the first id, descriptions joined
    assert_eq!(merged.name, "Signaling");
    assert_eq!(
        merged.description.as_deref(),
        Some("Costly displays/Showing off by not showing off")
    );

    let alias_texts: Vec<String> = test_db
        .db
        .classifiers
        .aliases_of(merged.id)
        .await
        .expect("aliases should load")
        .into_iter()
        .map(|a| a.text)
        .collect();
    assert!(alias_texts.contains(&"signaling".to_string()));
    assert!(alias_texts.contains(&"status-moves".to_string()));
    assert!(alias_texts.contains(&"countersignaling".to_string()));

    // The inputs are gone
    assert!(matches!(
        test_db.db.classifiers.get(first.id).await,
        Err(Error::ClassifierNotFound(_))
    ));
    assert!(matches!(
        test_db.db.classifiers.get(second.id).await,
        Err(Error::ClassifierNotFound(_))
    ));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn merge_unions_content_links() {
    let test_db = TestDatabase::new().await;

    // Two posts, each tagged with a different classifier
    let mut draft_a = post_draft("2009/03/one", "One", 10001);
    draft_a.classifier_names = Some(vec!["Alpha".to_string()]);
    let item_a = test_db
        .db
        .content
        .save_item(ContentKind::ObPost, None, &draft_a)
        .await
        .expect("save should succeed");

    let mut draft_b = post_draft("2009/03/two", "Two", 10002);
    draft_b.classifier_names = Some(vec!["Beta".to_string()]);
    let item_b = test_db
        .db
        .content
        .save_item(ContentKind::ObPost, None, &draft_b)
        .await
        .expect("save should succeed");

    let alpha = test_db
        .db
        .classifiers
        .find_by_alias(ClassifierKind::Tag, "Alpha")
        .await
        .expect("lookup should succeed")
        .expect("tag should exist");
    let beta = test_db
        .db
        .classifiers
        .find_by_alias(ClassifierKind::Tag, "Beta")
        .await
        .expect("lookup should succeed")
        .expect("tag should exist");

    let merged = test_db
        .db
        .classifiers
        .merge(ClassifierKind::Tag, &[alpha.id, beta.id])
        .await
        .expect("merge should succeed");

    let mut content = test_db
        .db
        .classifiers
        .content_of(merged.id)
        .await
        .expect("content should load");
    content.sort();
    let mut expected = vec![item_a.id, item_b.id];
    expected.sort();
    assert_eq!(content, expected);

    test_db.cleanup().await;
}

// ============================================================================
// CONVERT
// ============================================================================

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn convert_recreates_under_target_kind() {
    let test_db = TestDatabase::new().await;

    let idea = test_db
        .db
        .classifiers
        .create_with_aliases(
            ClassifierKind::Idea,
            "Great Filter",
            Some("Where are they?"),
            &["fermi".to_string()],
        )
        .await
        .expect("create should succeed");

    let topic = test_db
        .db
        .classifiers
        .convert(idea.id, ClassifierKind::Topic)
        .await
        .expect("convert should succeed");

    assert_eq!(topic.kind, ClassifierKind::Topic);
    assert_eq!(topic.name, "Great Filter");
    assert_ne!(topic.id, idea.id);

    let alias_texts: Vec<String> = test_db
        .db
        .classifiers
        .aliases_of(topic.id)
        .await
        .expect("aliases should load")
        .into_iter()
        .map(|a| a.text)
        .collect();
    assert!(alias_texts.contains(&"great-filter".to_string()));
    assert!(alias_texts.contains(&"fermi".to_string()));

    assert!(matches!(
        test_db.db.classifiers.get(idea.id).await,
        Err(Error::ClassifierNotFound(_))
    ));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn convert_collision_leaves_source_intact() {
    let test_db = TestDatabase::new().await;

    test_db
        .db
        .classifiers
        .create_with_aliases(ClassifierKind::Topic, "Hanson", None, &[])
        .await
        .expect("create should succeed");
    let idea = test_db
        .db
        .classifiers
        .create_with_aliases(ClassifierKind::Idea, "Hanson", None, &[])
        .await
        .expect("create should succeed");

    let err = test_db
        .db
        .classifiers
        .convert(idea.id, ClassifierKind::Topic)
        .await
        .expect_err("colliding convert should fail");
    assert!(matches!(err, Error::DuplicateAlias(_)));

    let intact = test_db
        .db
        .classifiers
        .get(idea.id)
        .await
        .expect("source should survive the failed convert");
    assert_eq!(intact.kind, ClassifierKind::Idea);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn convert_to_same_kind_is_invalid() {
    let test_db = TestDatabase::new().await;

    let idea = test_db
        .db
        .classifiers
        .create_with_aliases(ClassifierKind::Idea, "Dreamtime", None, &[])
        .await
        .expect("create should succeed");

    let err = test_db
        .db
        .classifiers
        .convert(idea.id, ClassifierKind::Idea)
        .await
        .expect_err("no-op convert should fail");
    assert!(matches!(err, Error::InvalidInput(_)));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn convert_bulk_counts_failures_and_continues() {
    let test_db = TestDatabase::new().await;

    // "blocker" already owns the alias the second idea would need
    test_db
        .db
        .classifiers
        .create_with_aliases(ClassifierKind::Topic, "Blocker", None, &[])
        .await
        .expect("create should succeed");

    let clean = test_db
        .db
        .classifiers
        .create_with_aliases(ClassifierKind::Idea, "Futarchy", None, &[])
        .await
        .expect("create should succeed");
    let colliding = test_db
        .db
        .classifiers
        .create_with_aliases(ClassifierKind::Idea, "Blocker", None, &[])
        .await
        .expect("create should succeed");

    let outcome = test_db
        .db
        .classifiers
        .convert_bulk(
            ClassifierKind::Idea,
            &[clean.id, colliding.id],
            ClassifierKind::Topic,
        )
        .await
        .expect("bulk convert should succeed");

    assert_eq!(outcome.converted, 1);
    assert_eq!(outcome.failed, 1);

    // The clean one moved, the colliding one stayed an idea
    assert!(test_db
        .db
        .classifiers
        .get_by_slug(ClassifierKind::Topic, "futarchy")
        .await
        .is_ok());
    assert!(test_db.db.classifiers.get(colliding.id).await.is_ok());

    test_db.cleanup().await;
}

// ============================================================================
// ALIAS MUTATION
// ============================================================================

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn protected_alias_cannot_be_removed() {
    let test_db = TestDatabase::new().await;

    let tag = test_db
        .db
        .classifiers
        .create_with_aliases(ClassifierKind::Tag, "Disco Stu", None, &[])
        .await
        .expect("create should succeed");

    test_db
        .db
        .classifiers
        .add_alias(tag.id, "Stu Discotheque")
        .await
        .expect("add_alias should succeed");

    test_db
        .db
        .classifiers
        .remove_alias(tag.id, "Stu Discotheque")
        .await
        .expect("removing an unprotected alias should succeed");

    let err = test_db
        .db
        .classifiers
        .remove_alias(tag.id, "Disco Stu")
        .await
        .expect_err("removing the protected alias should fail");
    assert!(matches!(err, Error::Validation(_)));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn validate_unique_ignores_the_owner() {
    let test_db = TestDatabase::new().await;

    let topic = test_db
        .db
        .classifiers
        .create_with_aliases(ClassifierKind::Topic, "Elephant in the Brain", None, &[])
        .await
        .expect("create should succeed");

    // Checking the owner's own name passes
    test_db
        .db
        .classifiers
        .validate_unique(
            ClassifierKind::Topic,
            "Elephant in the Brain",
            Some(topic.id),
        )
        .await
        .expect("owner should pass validation");

    // Anyone else claiming it fails
    let err = test_db
        .db
        .classifiers
        .validate_unique(ClassifierKind::Topic, "Elephant in the Brain", None)
        .await
        .expect_err("foreign claim should fail");
    assert!(matches!(err, Error::Validation(_)));

    test_db.cleanup().await;
}
