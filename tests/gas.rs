//=====================================================
// File: tests/gas.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Gas accounting
// Objective: Unbounded programs stop with GasExhausted within the budget and
//            nested calls draw from the same meter
//=====================================================

mod common;

use std::time::Duration;

use common::{MODES, World};
use serde_json::json;
use tokio::time::timeout;
use verbscript::{EntityStore, Value};

#[tokio::test]
async fn infinite_loop_runs_out_of_gas() {
    for mode in MODES {
        let world = World::with_gas(mode, 1_000);
        let this = world.entity(json!({}), None);
        let mut ctx = world.engine.context(this, None, vec![], world.sink(), None);
        let program = Value::from_json(&json!(["while", true, ["seq"]]));

        let result = timeout(Duration::from_secs(5), world.engine.run(&program, &mut ctx))
            .await
            .expect("loop must stop on its own");
        let err = result.unwrap_err();
        assert_eq!(err.code_str(), "E202");
        assert!(ctx.gas().used() <= 1_000);
    }
}

#[tokio::test]
async fn try_cannot_swallow_exhaustion() {
    for mode in MODES {
        let world = World::with_gas(mode, 500);
        let err = world
            .run(&json!(["try", ["while", true, ["+", 1, 1]], "e", "recovered"]))
            .await
            .0
            .unwrap_err();
        assert_eq!(err.code_str(), "E202");
    }
}

#[tokio::test]
async fn nested_calls_share_the_budget() {
    for mode in MODES {
        let world = World::with_gas(mode, 2_000);
        let id = world.entity(json!({}), None);
        world
            .store
            .set_verb(id, "spin", json!(["call", ["this"], "spin"]))
            .unwrap();
        let err = world.invoke(id, "spin", vec![]).await.unwrap_err();
        assert!(matches!(err.code_str(), "E202" | "E203"), "got {err}");
    }
}

#[tokio::test]
async fn explicit_budget_overrides_config() {
    let world = World::with_gas(verbscript::ExecutionMode::Compiled, 1_000_000);
    let this = world.entity(json!({}), None);
    let err = world
        .engine
        .execute(
            &Value::from_json(&json!(["while", true, 1])),
            this,
            None,
            vec![],
            world.sink(),
            Some(50),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "gas exhausted (budget 50)");
}

#[tokio::test]
async fn doubling_strings_and_lists_run_out_of_gas() {
    let programs = [
        json!(["seq", ["let", "s", "ab"], ["while", true, ["set", "s", ["str.concat", ["var", "s"], ["var", "s"]]]]]),
        json!(["seq", ["let", "l", ["list.new", 1, 2]], ["while", true, ["set", "l", ["list.concat", ["var", "l"], ["var", "l"]]]]]),
        json!(["seq", ["let", "l", ["list.new", "ab", "ab"]], ["while", true, ["set", "l", ["list.new", ["str.join", ["var", "l"], ""], ["str.join", ["var", "l"], ""]]]]]),
    ];
    for mode in MODES {
        for program in &programs {
            let world = World::new(mode);
            let (result, _) = timeout(Duration::from_secs(10), world.run(program))
                .await
                .expect("growth must stop on its own");
            assert_eq!(result.unwrap_err().code_str(), "E202", "{program}");
        }
    }
}

#[tokio::test]
async fn small_concatenations_cost_only_their_nodes() {
    for mode in MODES {
        let world = World::with_gas(mode, 10);
        let (result, _) = world.run(&json!(["str.concat", "a", "b"])).await;
        assert_eq!(result.unwrap(), Value::from("ab"));
    }
}
