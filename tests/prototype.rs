//=====================================================
// File: tests/prototype.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Prototype chain resolution
// Objective: Check property shadowing, inherited verbs and cycle refusal
//=====================================================

mod common;

use common::{MODES, World};
use serde_json::json;
use verbscript::{EntityStore, Value};

#[tokio::test]
async fn nearest_definition_wins_along_the_chain() {
    for mode in MODES {
        let world = World::new(mode);
        let c = world.entity(json!({"color": "red", "size": 3}), None);
        let b = world.entity(json!({"color": "blue"}), Some(c));
        let a = world.entity(json!({}), Some(b));
        world
            .store
            .set_verb(
                c,
                "describe",
                json!(["str.concat",
                    ["obj.get", ["entity", ["this"]], "color"],
                    "/",
                    ["obj.get", ["entity", ["this"]], "size"]
                ]),
            )
            .unwrap();

        let props = world.engine.prototypes().resolve_props(a).unwrap();
        assert_eq!(props["color"], json!("blue"));
        assert_eq!(props["size"], json!(3));

        let described = world.invoke(a, "describe", vec![]).await.unwrap();
        assert_eq!(described, Value::string("blue/3"));
    }
}

#[tokio::test]
async fn verb_override_on_middle_link_shadows_root() {
    let world = World::new(verbscript::ExecutionMode::Compiled);
    let c = world.entity(json!({}), None);
    let b = world.entity(json!({}), Some(c));
    let a = world.entity(json!({}), Some(b));
    world.store.set_verb(c, "name", json!("root")).unwrap();
    world.store.set_verb(b, "name", json!("middle")).unwrap();

    assert_eq!(world.invoke(a, "name", vec![]).await.unwrap(), Value::string("middle"));
    assert_eq!(world.invoke(c, "name", vec![]).await.unwrap(), Value::string("root"));
}

#[tokio::test]
async fn cyclic_chain_fails_closed() {
    let world = World::new(verbscript::ExecutionMode::Interpreted);
    let a = world.entity(json!({}), None);
    let b = world.entity(json!({}), Some(a));
    world.store.set_prototype(a, Some(b)).unwrap();

    let err = world.invoke(a, "anything", vec![]).await.unwrap_err();
    assert_eq!(err.code_str(), "E401");
    assert!(world.engine.prototypes().check_link(a, Some(b)).is_err());
}

#[tokio::test]
async fn set_prototype_opcode_refuses_cycles() {
    let world = World::new(verbscript::ExecutionMode::Compiled);
    let root = world.entity(json!({}), None);
    let child = world.entity(json!({}), Some(root));
    world.grant(child, "entity.control", json!({"*": true}));
    world
        .store
        .set_verb(
            child,
            "relink",
            json!(["set_prototype", ["get_capability", "entity.control"], ["arg", 0], ["arg", 1]]),
        )
        .unwrap();

    let err = world
        .invoke(child, "relink", vec![Value::Number(root as f64), Value::Number(child as f64)])
        .await
        .unwrap_err();
    assert_eq!(err.code_str(), "E401");
    assert_eq!(world.engine.prototypes().chain(child).unwrap().len(), 2);
}
