//=====================================================
// File: tests/parity.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Compiler and interpreter agreement
// Objective: Run every fixture in both modes from identical starting state and
//            compare values, error codes and root-frame bindings
//=====================================================

mod common;

use common::{World, outcome};
use serde_json::{Value as JsonValue, json};
use verbscript::ExecutionMode;

fn fixtures() -> Vec<JsonValue> {
    vec![
        // literals and arithmetic
        json!(42),
        json!("text"),
        json!([1, 2, 3]),
        json!(["quote", ["+", 1, 2]]),
        json!(["+", 1, 2, 3]),
        json!(["-", 10, ["*", 2, 3], ["/", 8, 4]]),
        json!(["%", 7, 3]),
        json!(["^", 2, 10]),
        json!(["/", 1, 0]),
        json!(["+", 1, "a"]),
        // logic
        json!(["and", true, 0, ["no.such.op"]]),
        json!(["or", null, false, "fallback"]),
        json!(["not", ["==", 1, 1]]),
        json!(["<", 1, 2, 3]),
        json!([">=", 3, 3, 1]),
        json!(["??", null, null, 7]),
        // control flow
        json!(["if", ["<", 1, 2], "yes", "no"]),
        json!(["if", false, "never"]),
        json!(["seq", ["let", "x", 5], ["set", "x", ["*", ["var", "x"], 2]], ["var", "x"]]),
        json!([
            "seq",
            ["let", "i", 0],
            ["let", "sum", 0],
            ["while", ["<", ["var", "i"], 5], ["seq",
                ["set", "i", ["+", ["var", "i"], 1]],
                ["set", "sum", ["+", ["var", "sum"], ["var", "i"]]]
            ]],
            ["var", "sum"]
        ]),
        json!([
            "seq",
            ["let", "acc", ["list.new"]],
            ["for", "n", ["list.new", 1, 2, 3, 4, 5], ["seq",
                ["if", ["==", ["var", "n"], 2], ["continue"]],
                ["if", ["==", ["var", "n"], 4], ["break"]],
                ["list.push", ["var", "acc"], ["var", "n"]]
            ]],
            ["var", "acc"]
        ]),
        json!(["seq", ["let", "a", 1], ["return", ["+", ["var", "a"], 1]], ["let", "b", 2]]),
        json!(["try", ["throw", "boom"], "e", ["str.concat", "caught ", ["var", "e"]]]),
        json!(["try", ["var", "ghost"], "e", ["typeof", ["var", "e"]]]),
        json!(["throw", ["obj.new", "reason", "nope"]]),
        // closures
        json!([
            "seq",
            ["let", "a", 10],
            ["let", "add", ["lambda", ["x"], ["+", ["var", "x"], ["var", "a"]]]],
            ["let", "r", ["apply", ["var", "add"], 5]],
            ["set", "a", 20],
            ["list.new", ["var", "r"], ["apply", ["var", "add"], 5]]
        ]),
        json!([
            "seq",
            ["let", "make", ["lambda", ["n"], ["lambda", [], ["seq",
                ["set", "n", ["+", ["var", "n"], 1]],
                ["var", "n"]
            ]]]],
            ["let", "counter", ["apply", ["var", "make"], 0]],
            ["apply", ["var", "counter"]],
            ["apply", ["var", "counter"]]
        ]),
        json!(["apply", ["lambda", ["x", "y"], ["var", "y"]], 1]),
        json!(["apply", 5, 1]),
        // standard library
        json!(["list.map", ["list.new", 1, 2, 3], ["lambda", ["x"], ["*", ["var", "x"], ["var", "x"]]]]),
        json!(["list.filter", ["list.new", 1, 2, 3, 4], ["lambda", ["x"], ["==", ["%", ["var", "x"], 2], 0]]]),
        json!(["list.reduce", ["list.new", 1, 2, 3], ["lambda", ["acc", "x"], ["+", ["var", "acc"], ["var", "x"]]], 0]),
        json!(["list.reverse", ["list.new", 1, 2, 3]]),
        json!(["list.slice", ["list.new", 1, 2, 3, 4], 1, -1]),
        json!(["list.get", ["list.new", 1, 2], 5]),
        json!(["list.len", "not a list"]),
        json!(["obj.get", ["obj.merge", ["obj.new", "k", 1], ["obj.new", "k", 2, "j", 3]], "k"]),
        json!(["obj.has", ["obj.new", "k", null], "k"]),
        json!(["str.split", "a,b,c", ","]),
        json!(["str.replace", "a-b-c", "-", "+"]),
        json!(["str.slice", "verbscript", 0, 4]),
        json!(["json.parse", ["json.stringify", ["obj.new", "a", ["list.new", 1, 2]]]]),
        json!(["math.clamp", 15, 0, 10]),
        json!(["random.int", 1, 6]),
        json!(["typeof", ["lambda", [], 1]]),
        json!(["usage", "go <direction>"]),
        // failures
        json!(["var", "missing"]),
        json!(["set", "ghost", 1]),
        json!(["no.such.op", 1]),
        json!(["list.len"]),
        json!(["let", 5, 1]),
        json!(["fs.read", null, "/etc/passwd"]),
    ]
}

#[tokio::test]
async fn compiled_and_interpreted_runs_agree() {
    for fixture in fixtures() {
        let compiled = World::new(ExecutionMode::Compiled).run(&fixture).await;
        let interpreted = World::new(ExecutionMode::Interpreted).run(&fixture).await;
        assert_eq!(
            outcome(&compiled.0),
            outcome(&interpreted.0),
            "outcome differs for {fixture}"
        );
        assert_eq!(compiled.1, interpreted.1, "bindings differ for {fixture}");
    }
}

#[tokio::test]
async fn gas_usage_agrees() {
    let program = json!([
        "seq",
        ["let", "total", 0],
        ["for", "n", ["list.new", 1, 2, 3], ["set", "total", ["+", ["var", "total"], ["var", "n"]]]],
        ["var", "total"]
    ]);
    let mut used = Vec::new();
    for mode in common::MODES {
        let world = World::new(mode);
        let this = world.entity(json!({}), None);
        let mut ctx = world.engine.context(this, None, vec![], world.sink(), None);
        world
            .engine
            .run(&verbscript::Value::from_json(&program), &mut ctx)
            .await
            .unwrap();
        used.push(ctx.gas().used());
    }
    assert_eq!(used[0], used[1]);
    assert!(used[0] > 0);
}
