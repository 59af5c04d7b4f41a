use serde_json::json;
use skillet::{CONTENT_DOC_TYPE, FILES_DOC_TYPE};

mod common;
use common::{change, testbed};

// ============================================================
// CREATE / UPDATE / DELETE ROUTING
// ============================================================

#[tokio::test]
async fn single_create_lands_in_one_language_shard() {
    let bed = testbed();
    bed.write_config("t1", "languages: [en, fr]\n");

    bed.feed.push_response(
        vec![change(
            "p1",
            json!({"type": "photo", "name": "Hello World"}),
        )],
        "1",
    );
    bed.controller.update_index("t1", "photos").await.unwrap();

    let en = bed.shard("t1", "en", "photos");
    let fr = bed.shard("t1", "fr", "photos");
    assert!(en.contains("p1").unwrap());
    assert!(!fr.contains("p1").unwrap());
    assert_eq!(en.doc_count(), 1);
    assert_eq!(fr.doc_count(), 0);

    // Every language shard of the docType carries the same cursor.
    assert_eq!(en.seq(), "1");
    assert_eq!(fr.seq(), "1");
}

#[tokio::test]
async fn directory_and_untyped_records_are_skipped() {
    let bed = testbed();
    bed.write_config("t1", "languages: [en]\n");

    bed.feed.push_response(
        vec![
            change("d1", json!({"type": "directory", "name": "Photos"})),
            change("x1", json!({"name": "no type field"})),
            change("p1", json!({"type": "photo", "name": "Hello World"})),
        ],
        "3",
    );
    bed.controller.update_index("t1", "photos").await.unwrap();

    let en = bed.shard("t1", "en", "photos");
    assert_eq!(en.doc_count(), 1);
    assert!(en.contains("p1").unwrap());
    assert_eq!(en.seq(), "3");
}

#[tokio::test]
async fn delete_before_ever_indexed_advances_cursor() {
    let bed = testbed();
    bed.write_config("t1", "languages: [en, fr]\n");

    bed.feed.push_response(
        vec![change("x", json!({"type": "photo", "_deleted": true}))],
        "1",
    );
    bed.controller.update_index("t1", "photos").await.unwrap();

    let en = bed.shard("t1", "en", "photos");
    let fr = bed.shard("t1", "fr", "photos");
    assert_eq!(en.doc_count(), 0);
    assert_eq!(fr.doc_count(), 0);
    assert_eq!(en.seq(), "1");
    assert_eq!(fr.seq(), "1");
}

#[tokio::test]
async fn update_does_not_migrate_between_shards() {
    let bed = testbed();
    bed.write_config("t1", "languages: [en, fr]\n");

    // Create lands in fr via the name classifier.
    bed.feed.push_response(
        vec![change(
            "f1",
            json!({"type": "photo", "name": "Bonjour les amis"}),
        )],
        "1",
    );
    bed.controller.update_index("t1", "photos").await.unwrap();
    assert!(bed.shard("t1", "fr", "photos").contains("f1").unwrap());

    // The new name reads as English; the document stays in fr anyway.
    bed.feed.push_response(
        vec![change(
            "f1",
            json!({"type": "photo", "name": "Good morning friends"}),
        )],
        "2",
    );
    bed.controller.update_index("t1", "photos").await.unwrap();

    let en = bed.shard("t1", "en", "photos");
    let fr = bed.shard("t1", "fr", "photos");
    assert_eq!(fr.doc_count(), 1);
    assert_eq!(en.doc_count(), 0);
    assert!(fr.contains("f1").unwrap());
    assert_eq!(fr.seq(), "2");
    assert_eq!(en.seq(), "2");
}

#[tokio::test]
async fn replay_with_no_new_changes_is_idempotent() {
    let bed = testbed();
    bed.write_config("t1", "languages: [en]\n");

    bed.feed.push_response(
        vec![
            change("p1", json!({"type": "photo", "name": "Hello World"})),
            change("p2", json!({"type": "photo", "name": "Another one"})),
        ],
        "2",
    );
    bed.controller.update_index("t1", "photos").await.unwrap();
    // Second pass: the feed reports nothing new since "2".
    bed.controller.update_index("t1", "photos").await.unwrap();

    let en = bed.shard("t1", "en", "photos");
    assert_eq!(en.doc_count(), 2);
    assert_eq!(en.seq(), "2");
}

#[tokio::test]
async fn feed_failure_aborts_the_pass_and_keeps_the_cursor() {
    let bed = testbed();
    bed.write_config("t1", "languages: [en]\n");

    bed.feed.push_response(
        vec![change("p1", json!({"type": "photo", "name": "Hello"}))],
        "1",
    );
    bed.controller.update_index("t1", "photos").await.unwrap();

    bed.feed.set_fail(true);
    assert!(bed.controller.update_index("t1", "photos").await.is_err());

    let en = bed.shard("t1", "en", "photos");
    assert_eq!(en.seq(), "1");
    assert_eq!(en.doc_count(), 1);
}

// ============================================================
// CONTENT PATH
// ============================================================

#[tokio::test]
async fn content_create_classifies_body_and_stores_fingerprint() {
    let bed = testbed();
    bed.write_config("t1", "content: true\nlanguages: [en, fr]\n");
    bed.content.set_body("f1", "Bonjour tout le monde, voici le document");

    bed.feed.push_response(
        vec![change(
            "f1",
            json!({"type": "file", "name": "doc", "md5sum": "A"}),
        )],
        "1",
    );
    bed.controller
        .update_index("t1", FILES_DOC_TYPE)
        .await
        .unwrap();

    let files_fr = bed.shard("t1", "fr", FILES_DOC_TYPE);
    let content_fr = bed.shard("t1", "fr", CONTENT_DOC_TYPE);
    assert!(files_fr.contains("f1").unwrap());
    assert!(content_fr.contains("f1").unwrap());
    assert_eq!(files_fr.md5sum("f1").as_deref(), Some("A"));
    assert_eq!(bed.content.fetch_count(), 1);

    // Content shards do not carry the docType cursor; the files shards do.
    assert_eq!(files_fr.seq(), "1");
}

#[tokio::test]
async fn unchanged_fingerprint_skips_body_refetch() {
    let bed = testbed();
    bed.write_config("t1", "content: true\nlanguages: [en, fr]\n");
    bed.content.set_body("f1", "Bonjour tout le monde, voici le document");

    let doc = json!({"type": "file", "name": "doc", "md5sum": "A"});
    bed.feed.push_response(vec![change("f1", doc.clone())], "1");
    bed.controller
        .update_index("t1", FILES_DOC_TYPE)
        .await
        .unwrap();
    assert_eq!(bed.content.fetch_count(), 1);

    // Same md5sum again: metadata is re-indexed, the body is not fetched.
    bed.feed.push_response(vec![change("f1", doc)], "2");
    bed.controller
        .update_index("t1", FILES_DOC_TYPE)
        .await
        .unwrap();

    assert_eq!(bed.content.fetch_count(), 1);
    let files_fr = bed.shard("t1", "fr", FILES_DOC_TYPE);
    let content_fr = bed.shard("t1", "fr", CONTENT_DOC_TYPE);
    assert_eq!(files_fr.doc_count(), 1);
    assert_eq!(content_fr.doc_count(), 1);
    assert_eq!(files_fr.seq(), "2");
}

#[tokio::test]
async fn changed_fingerprint_refetches_into_the_original_shard() {
    let bed = testbed();
    bed.write_config("t1", "content: true\nlanguages: [en, fr]\n");
    bed.content.set_body("f1", "Bonjour tout le monde, voici le document");

    bed.feed.push_response(
        vec![change(
            "f1",
            json!({"type": "file", "name": "doc", "md5sum": "A"}),
        )],
        "1",
    );
    bed.controller
        .update_index("t1", FILES_DOC_TYPE)
        .await
        .unwrap();

    // New body, new fingerprint. The document already lives in fr, so the
    // fresh body is indexed there even though it now reads as English.
    bed.content.set_body("f1", "A plain English body now");
    bed.feed.push_response(
        vec![change(
            "f1",
            json!({"type": "file", "name": "doc", "md5sum": "B"}),
        )],
        "2",
    );
    bed.controller
        .update_index("t1", FILES_DOC_TYPE)
        .await
        .unwrap();

    assert_eq!(bed.content.fetch_count(), 2);
    let files_fr = bed.shard("t1", "fr", FILES_DOC_TYPE);
    let content_fr = bed.shard("t1", "fr", CONTENT_DOC_TYPE);
    let content_en = bed.shard("t1", "en", CONTENT_DOC_TYPE);
    assert_eq!(files_fr.md5sum("f1").as_deref(), Some("B"));
    assert!(content_fr.contains("f1").unwrap());
    assert!(!content_en.contains("f1").unwrap());
}

#[tokio::test]
async fn trashed_file_leaves_both_shards() {
    let bed = testbed();
    bed.write_config("t1", "content: true\nlanguages: [en, fr]\n");
    bed.content.set_body("f2", "An English body for this file");

    bed.feed.push_response(
        vec![change(
            "f2",
            json!({"type": "file", "name": "notes", "md5sum": "A"}),
        )],
        "1",
    );
    bed.controller
        .update_index("t1", FILES_DOC_TYPE)
        .await
        .unwrap();
    assert!(bed.shard("t1", "en", FILES_DOC_TYPE).contains("f2").unwrap());
    assert!(bed
        .shard("t1", "en", CONTENT_DOC_TYPE)
        .contains("f2")
        .unwrap());

    bed.feed.push_response(
        vec![change(
            "f2",
            json!({"type": "file", "name": "notes", "md5sum": "A", "trashed": true}),
        )],
        "2",
    );
    bed.controller
        .update_index("t1", FILES_DOC_TYPE)
        .await
        .unwrap();

    let files_en = bed.shard("t1", "en", FILES_DOC_TYPE);
    let content_en = bed.shard("t1", "en", CONTENT_DOC_TYPE);
    assert!(!files_en.contains("f2").unwrap());
    assert!(!content_en.contains("f2").unwrap());
    assert_eq!(files_en.seq(), "2");
}

// ============================================================
// SHARD PLACEMENT INVARIANT
// ============================================================

#[tokio::test]
async fn a_document_never_appears_in_two_shards() {
    let bed = testbed();
    bed.write_config("t1", "languages: [en, fr]\n");

    bed.feed.push_response(
        vec![
            change("a", json!({"type": "photo", "name": "Hello World"})),
            change("b", json!({"type": "photo", "name": "Bonjour le monde"})),
        ],
        "1",
    );
    bed.controller.update_index("t1", "photos").await.unwrap();

    // Touch both again in a later pass.
    bed.feed.push_response(
        vec![
            change("a", json!({"type": "photo", "name": "Hello again"})),
            change("b", json!({"type": "photo", "name": "Rebonjour"})),
        ],
        "2",
    );
    bed.controller.update_index("t1", "photos").await.unwrap();

    let en = bed.shard("t1", "en", "photos");
    let fr = bed.shard("t1", "fr", "photos");
    for id in ["a", "b"] {
        let placements = [en.contains(id).unwrap(), fr.contains(id).unwrap()]
            .iter()
            .filter(|present| **present)
            .count();
        assert_eq!(placements, 1, "document {} must live in exactly one shard", id);
    }
}

#[tokio::test]
async fn concurrent_updates_on_one_instance_serialize() {
    let bed = testbed();
    bed.write_config("t1", "languages: [en]\n");

    bed.feed.push_response(
        vec![change("p1", json!({"type": "photo", "name": "first"}))],
        "1",
    );
    bed.feed.push_response(
        vec![change("p2", json!({"type": "photo", "name": "second"}))],
        "2",
    );

    let (a, b) = tokio::join!(
        bed.controller.update_index("t1", "photos"),
        bed.controller.update_index("t1", "photos"),
    );
    a.unwrap();
    b.unwrap();

    let en = bed.shard("t1", "en", "photos");
    assert_eq!(en.doc_count(), 2);
    assert_eq!(en.seq(), "2");
}
