//! Integration tests for renaming entries

mod common;

use ::common::tree::{Outcome, Refusal, TreeError};

#[tokio::test]
async fn test_rename_file_keeps_properties() {
    let (mut tree, home, _, _) = common::setup_test_env().await;
    let file = common::upload(&mut tree, home, "draft.txt", b"hello world").await;
    let before = tree
        .vertex(file)
        .unwrap()
        .properties()
        .unwrap()
        .into_value()
        .unwrap();

    let outcome = tree.rename(file, "final.txt", Some(home)).await.unwrap();
    assert_eq!(outcome, Outcome::Done(()));

    let after = tree
        .vertex(file)
        .unwrap()
        .properties()
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(after.name, "final.txt");
    assert_eq!(after.size, before.size);
    assert_eq!(after.modified, before.modified);
    assert_eq!(after.attributes, before.attributes);
    assert_eq!(after.thumbnail, before.thumbnail);

    // the cache and a fresh listing agree
    assert!(tree.vertex(home).unwrap().has_child_by_name("final.txt"));
    assert!(!tree.vertex(home).unwrap().has_child_by_name("draft.txt"));
    assert_eq!(common::child_names(&mut tree, home).await, vec!["final.txt"]);
    assert_eq!(tree.read_file(file, |_| {}).await.unwrap(), b"hello world");
}

#[tokio::test]
async fn test_rename_directory() {
    let (mut tree, home, _, _) = common::setup_test_env().await;
    let dir = common::mkdir(&mut tree, home, "old").await;
    common::upload(&mut tree, dir, "inside.txt", b"x").await;

    assert!(tree.rename(dir, "new", Some(home)).await.unwrap().is_done());
    assert_eq!(common::name_of(&tree, dir), "new");
    assert_eq!(common::child_names(&mut tree, dir).await, vec!["inside.txt"]);
    assert!(tree
        .resolve_path(home, "new/inside.txt")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_rename_collision_changes_nothing() {
    let (mut tree, home, store, _) = common::setup_test_env().await;
    let a = common::upload(&mut tree, home, "a.txt", b"a").await;
    common::upload(&mut tree, home, "b.txt", b"b").await;
    let puts = store.put_count();

    let outcome = tree.rename(a, "b.txt", Some(home)).await.unwrap();
    assert_eq!(outcome, Outcome::Refused(Refusal::NameCollision("b.txt".to_string())));
    assert_eq!(store.put_count(), puts);
    assert_eq!(common::name_of(&tree, a), "a.txt");
    assert_eq!(
        common::child_names(&mut tree, home).await,
        vec!["a.txt", "b.txt"]
    );
}

#[tokio::test]
async fn test_rename_to_illegal_name() {
    let (mut tree, home, _, _) = common::setup_test_env().await;
    let a = common::upload(&mut tree, home, "a.txt", b"a").await;

    let outcome = tree.rename(a, "x/y", Some(home)).await.unwrap();
    assert_eq!(outcome, Outcome::Refused(Refusal::IllegalName("x/y".to_string())));
    assert_eq!(common::name_of(&tree, a), "a.txt");
}

#[tokio::test]
async fn test_rename_under_wrong_parent() {
    let (mut tree, home, store, _) = common::setup_test_env().await;
    let a = common::upload(&mut tree, home, "a.txt", b"a").await;
    let other = common::mkdir(&mut tree, home, "other").await;
    let puts = store.put_count();

    assert!(matches!(
        tree.rename(a, "b.txt", Some(other)).await,
        Err(TreeError::NotAChild { parent, child }) if parent == other && child == a
    ));
    assert_eq!(store.put_count(), puts);
    assert_eq!(common::name_of(&tree, a), "a.txt");
    assert_eq!(tree.vertex(other).unwrap().children().count(), 0);
    assert_eq!(tree.vertex(home).unwrap().child_by_name("a.txt"), Some(a));
}
