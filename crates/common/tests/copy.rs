//! Integration tests for copying entries between directories

mod common;

use ::common::tree::{Outcome, Refusal};

#[tokio::test]
async fn test_copy_file_keeps_key() {
    let (mut tree, home, store, _) = common::setup_test_env().await;
    let docs = common::mkdir(&mut tree, home, "docs").await;
    let file = common::upload(&mut tree, home, "a.txt", b"shared bytes").await;
    let blobs = store.len();

    let copy = tree
        .copy_to(file, docs)
        .await
        .unwrap()
        .into_value()
        .unwrap();

    let original = tree.vertex(file).unwrap();
    let copied = tree.vertex(copy).unwrap();
    assert_eq!(copied.key(), original.key());
    assert_ne!(copied.location(), original.location());
    // one new record plus the rewritten target; no content was uploaded
    assert_eq!(store.len(), blobs + 1);

    assert_eq!(common::child_names(&mut tree, docs).await, vec!["a.txt"]);
    assert_eq!(tree.read_file(copy, |_| {}).await.unwrap(), b"shared bytes");
    // the original stays where it was
    assert!(tree.vertex(home).unwrap().has_child_by_name("a.txt"));
}

#[tokio::test]
async fn test_copy_directory_gets_fresh_key() {
    let (mut tree, home, _, _) = common::setup_test_env().await;
    let src = common::mkdir(&mut tree, home, "src").await;
    let nested = common::mkdir(&mut tree, src, "nested").await;
    common::upload(&mut tree, nested, "deep.txt", b"deep").await;
    let dst = common::mkdir(&mut tree, home, "dst").await;

    let copy = tree
        .copy_to(src, dst)
        .await
        .unwrap()
        .into_value()
        .unwrap();
    assert_ne!(tree.vertex(copy).unwrap().key(), tree.vertex(src).unwrap().key());
    assert_eq!(common::name_of(&tree, copy), "src");

    // the whole subtree came along, under new keys
    let deep = tree
        .resolve_path(dst, "src/nested/deep.txt")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tree.read_file(deep, |_| {}).await.unwrap(), b"deep");
    let nested_copy = tree.resolve_path(copy, "nested").await.unwrap().unwrap();
    assert_ne!(nested_copy, nested);
    assert_ne!(
        tree.vertex(nested_copy).unwrap().key(),
        tree.vertex(nested).unwrap().key()
    );

    // and it is independent of the original
    let outcome = tree.mkdir(copy, "only-in-copy", None, false).await.unwrap();
    assert!(outcome.is_done());
    assert_eq!(common::child_names(&mut tree, src).await, vec!["nested"]);
}

#[tokio::test]
async fn test_copy_refusals() {
    let (mut tree, home, store, _) = common::setup_test_env().await;
    let docs = common::mkdir(&mut tree, home, "docs").await;
    let file = common::upload(&mut tree, home, "a.txt", b"a").await;
    common::upload(&mut tree, docs, "a.txt", b"other").await;
    let puts = store.put_count();

    assert_eq!(
        tree.copy_to(file, docs).await.unwrap(),
        Outcome::Refused(Refusal::NameCollision("a.txt".to_string()))
    );
    assert_eq!(
        tree.copy_to(docs, file).await.unwrap(),
        Outcome::Refused(Refusal::NotDirectory)
    );
    assert_eq!(store.put_count(), puts);
}
