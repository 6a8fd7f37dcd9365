//=====================================================
// File: tests/capability.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Capability gating of world and filesystem opcodes
// Objective: Denied without a matching grant, permitted with one, and
//            confined to the granted scope
//=====================================================

mod common;

use common::{MODES, World};
use serde_json::json;
use tempfile::tempdir;
use verbscript::{EntityStore, Value};

fn write_verb() -> serde_json::Value {
    json!([
        "fs.write",
        ["get_capability", "fs.write", ["obj.new", "path", ["arg", 0]]],
        ["arg", 1],
        "hello"
    ])
}

#[tokio::test]
async fn fs_write_is_denied_without_a_grant() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("out.txt");
    for mode in MODES {
        let world = World::new(mode);
        let id = world.entity(json!({}), None);
        world.store.set_verb(id, "save", write_verb()).unwrap();

        let args = vec![
            Value::string(dir.path().to_string_lossy()),
            Value::string(target.to_string_lossy()),
        ];
        let err = world.invoke(id, "save", args).await.unwrap_err();
        assert_eq!(err.code_str(), "E201");
        assert!(!err.is_retryable());
        assert!(!target.exists());
    }
}

#[tokio::test]
async fn fs_write_succeeds_under_matching_grant() {
    for mode in MODES {
        let dir = tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let target = dir.path().join("notes.txt");
        let world = World::new(mode);
        let id = world.entity(json!({}), None);
        world.grant(id, "fs.write", json!({"path": root}));
        world.store.set_verb(id, "save", write_verb()).unwrap();

        let args = vec![Value::string(&root), Value::string(target.to_string_lossy())];
        world.invoke(id, "save", args).await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
    }
}

#[tokio::test]
async fn grant_does_not_reach_outside_its_root() {
    let granted = tempdir().unwrap();
    let other = tempdir().unwrap();
    let world = World::new(verbscript::ExecutionMode::Compiled);
    let id = world.entity(json!({}), None);
    world.grant(id, "fs.write", json!({"path": granted.path().to_string_lossy()}));
    world
        .store
        .set_verb(
            id,
            "save",
            json!(["fs.write", ["get_capability", "fs.write"], ["arg", 0], "x"]),
        )
        .unwrap();

    let outside = other.path().join("escape.txt");
    let err = world
        .invoke(id, "save", vec![Value::string(outside.to_string_lossy())])
        .await
        .unwrap_err();
    assert_eq!(err.code_str(), "E201");

    let sneaky = format!("{}/../escape.txt", granted.path().display());
    let err = world
        .invoke(id, "save", vec![Value::string(sneaky)])
        .await
        .unwrap_err();
    assert_eq!(err.code_str(), "E201");
}

#[tokio::test]
async fn read_grant_cannot_write() {
    let dir = tempdir().unwrap();
    let world = World::new(verbscript::ExecutionMode::Interpreted);
    let id = world.entity(json!({}), None);
    world.grant(id, "fs.read", json!({"*": true}));
    world
        .store
        .set_verb(
            id,
            "save",
            json!(["fs.write", ["get_capability", "fs.read"], ["arg", 0], "x"]),
        )
        .unwrap();

    let path = dir.path().join("f.txt");
    let err = world
        .invoke(id, "save", vec![Value::string(path.to_string_lossy())])
        .await
        .unwrap_err();
    assert_eq!(err.code_str(), "E201");
}

#[tokio::test]
async fn update_needs_control_of_the_target() {
    for mode in MODES {
        let world = World::new(mode);
        let actor = world.entity(json!({}), None);
        let mine = world.entity(json!({"lit": false}), None);
        let theirs = world.entity(json!({"lit": false}), None);
        world.grant(actor, "entity.control", json!({"target_id": mine}));
        world
            .store
            .set_verb(
                actor,
                "light",
                json!(["update",
                    ["get_capability", "entity.control", ["obj.new", "target_id", ["arg", 0]]],
                    ["arg", 0],
                    ["obj.new", "lit", true]
                ]),
            )
            .unwrap();

        world
            .invoke(actor, "light", vec![Value::Number(mine as f64)])
            .await
            .unwrap();
        let err = world
            .invoke(actor, "light", vec![Value::Number(theirs as f64)])
            .await
            .unwrap_err();
        assert_eq!(err.code_str(), "E201");

        let lit = |id| world.store.get_entity(id).unwrap().unwrap().props["lit"].clone();
        assert_eq!(lit(mine), json!(true));
        assert_eq!(lit(theirs), json!(false));
    }
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_inside_the_root_does_not_escape_it() {
    let granted = tempdir().unwrap();
    let outside = tempdir().unwrap();
    std::os::unix::fs::symlink(outside.path(), granted.path().join("link")).unwrap();
    for mode in MODES {
        let world = World::new(mode);
        let id = world.entity(json!({}), None);
        world.grant(id, "fs.write", json!({"path": granted.path().to_string_lossy()}));
        world.grant(id, "fs.read", json!({"path": granted.path().to_string_lossy()}));
        world
            .store
            .set_verb(
                id,
                "save",
                json!(["fs.write", ["get_capability", "fs.write"], ["arg", 0], "x"]),
            )
            .unwrap();
        world
            .store
            .set_verb(id, "peek", json!(["fs.list", ["get_capability", "fs.read"], ["arg", 0]]))
            .unwrap();

        let through_link = granted.path().join("link").join("x.txt");
        let err = world
            .invoke(id, "save", vec![Value::string(through_link.to_string_lossy())])
            .await
            .unwrap_err();
        assert_eq!(err.code_str(), "E201");
        assert!(!outside.path().join("x.txt").exists());

        let listing = granted.path().join("link");
        let err = world
            .invoke(id, "peek", vec![Value::string(listing.to_string_lossy())])
            .await
            .unwrap_err();
        assert_eq!(err.code_str(), "E201");
    }
}
