//! Tests for task keys

use std::collections::HashSet;

use game_sequencer::core::{ScheduledTask, TaskKey};

#[test]
fn test_new_task_has_default_key() {
    let task = ScheduledTask::from_fn(1, false, |_| Ok(())).unwrap();
    assert_eq!(task.key(), &TaskKey::DEFAULT);
    assert!(task.key().is_default());
}

#[test]
fn test_attach_replaces_key() {
    let task = ScheduledTask::from_fn(1, false, |_| Ok(()))
        .unwrap()
        .attach("minigame:castle-wars")
        .attach(42_u64);
    assert_eq!(task.key(), &TaskKey::id(42));
}

#[test]
fn test_key_conversions_agree() {
    assert_eq!(TaskKey::from("npc"), TaskKey::named("npc"));
    assert_eq!(TaskKey::from(String::from("npc")), TaskKey::named("npc"));
    assert_eq!(TaskKey::from(3_u64), TaskKey::id(3));
}

#[test]
fn test_id_and_named_keys_differ() {
    assert_ne!(TaskKey::id(1), TaskKey::named("1"));
}

#[test]
fn test_unique_keys_are_distinct() {
    let keys: HashSet<TaskKey> = (0..100).map(|_| TaskKey::unique()).collect();
    assert_eq!(keys.len(), 100);
}

#[test]
fn test_key_display() {
    assert_eq!(format!("{}", TaskKey::DEFAULT), "<default>");
    assert_eq!(format!("{}", TaskKey::id(9)), "id:9");
    assert_eq!(format!("{}", TaskKey::named("player:zezima")), "player:zezima");
}

#[test]
fn test_named_default_is_not_the_default_key() {
    let named = TaskKey::named("default");
    assert_ne!(named, TaskKey::DEFAULT);
    assert!(!named.is_default());
    assert_ne!(named.to_string(), TaskKey::DEFAULT.to_string());
}
