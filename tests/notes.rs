mod common;

use common::{MODES, World};
use serde_json::json;
use verbscript::{EntityId, EntityStore, Value, transpile};

const CREATE_NOTE: &str = r#"
    let title = arg(0);
    let content = arg(1) ?? "";
    if (title == null || title == "") {
        usage("create_note <title> <content>");
    }
    let cap = get_capability("entity.control", {target_id: this});
    if (cap == null) {
        throw "no control over this entity";
    }
    let notes = entity(this).notes ?? [];
    let id = list.len(notes) + 1;
    list.push(notes, {id: id, title: title, content: content});
    update(cap, this, {notes: notes});
    send("note_created", {id: id, title: title});
    return {type: "note_created", id: id};
"#;

fn note_world(mode: verbscript::ExecutionMode, granted: bool) -> (World, EntityId) {
    let world = World::new(mode);
    let proto = world.entity(json!({"name": "Note"}), None);
    let program = transpile(CREATE_NOTE).unwrap();
    world
        .store
        .set_verb(proto, "create_note", program.to_json().unwrap())
        .unwrap();
    let note = world.entity(json!({}), Some(proto));
    if granted {
        world.grant(note, "entity.control", json!({"target_id": note}));
    }
    (world, note)
}

#[tokio::test]
async fn create_note_returns_generated_id() {
    for mode in MODES {
        let (world, note) = note_world(mode, true);
        let args = vec![Value::string("My First Note"), Value::string("Hello world!")];
        let result = world.invoke(note, "create_note", args).await.unwrap();
        assert_eq!(result.to_json().unwrap(), json!({"type": "note_created", "id": 1}));

        let second = world
            .invoke(note, "create_note", vec![Value::string("Second")])
            .await
            .unwrap();
        assert_eq!(second.to_json().unwrap()["id"], json!(2));

        let stored = world.store.get_entity(note).unwrap().unwrap();
        assert_eq!(stored.props["notes"][0]["content"], json!("Hello world!"));
        assert_eq!(stored.props["notes"][1]["content"], json!(""));

        let events = world.sink.take();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "note_created");
        assert_eq!(events[0].payload, json!({"id": 1, "title": "My First Note"}));
    }
}

#[tokio::test]
async fn create_note_without_title_is_a_usage_error() {
    for mode in MODES {
        let (world, note) = note_world(mode, true);
        let err = world.invoke(note, "create_note", vec![]).await.unwrap_err();
        assert_eq!(err.code_str(), "E301");
        assert!(err.to_string().to_lowercase().contains("usage"));
        assert!(world.sink.is_empty());
    }
}

#[tokio::test]
async fn create_note_without_grant_throws() {
    let (world, note) = note_world(verbscript::ExecutionMode::Compiled, false);
    let err = world
        .invoke(note, "create_note", vec![Value::string("t")])
        .await
        .unwrap_err();
    assert_eq!(err.code_str(), "E302");
    assert!(world.store.get_entity(note).unwrap().unwrap().props.get("notes").is_none());
}

#[tokio::test]
async fn verbs_call_each_other_with_caller_bound() {
    for mode in MODES {
        let world = World::new(mode);
        let lamp = world.entity(json!({"name": "lamp"}), None);
        let player = world.entity(json!({}), None);
        world
            .store
            .set_verb(lamp, "who", json!(["list.new", ["this"], ["caller"], ["args"]]))
            .unwrap();
        world
            .store
            .set_verb(player, "poke", json!(["call", ["arg", 0], "who", "hi"]))
            .unwrap();

        let result = world
            .invoke(player, "poke", vec![Value::Number(lamp as f64)])
            .await
            .unwrap();
        assert_eq!(result.to_json().unwrap(), json!([lamp, player, ["hi"]]));
    }
}
