mod common;

use common::{MODES, World, outcome};
use serde_json::json;
use verbscript::{Value, decompile, transpile};

#[tokio::test]
async fn transpiled_source_executes() {
    let source = r#"
        let total = 0;
        for (n in [1, 2, 3, 4, 5, 6]) {
            if (n % 2 == 1) { continue; }
            total = total + n;
        }
        let scale = (x) => x * 10;
        scale(total);
    "#;
    let program = transpile(source).unwrap().to_json().unwrap();
    for mode in MODES {
        let result = World::new(mode).run(&program).await.0.unwrap();
        assert_eq!(result, Value::Number(120.0));
    }
}

#[tokio::test]
async fn decompiled_programs_behave_the_same() {
    let programs = [
        json!(["seq",
            ["let", "xs", ["list.new", 3, 1, 2]],
            ["let", "best", null],
            ["for", "x", ["var", "xs"],
                ["if", ["or", ["==", ["var", "best"], null], [">", ["var", "x"], ["var", "best"]]],
                    ["set", "best", ["var", "x"]]]],
            ["obj.new", "best", ["var", "best"], "count", ["list.len", ["var", "xs"]]]
        ]),
        json!(["try",
            ["seq", ["let", "r", ["/", 1, 0]], ["var", "r"]],
            "err",
            ["str.concat", "failed: ", ["var", "err"]]
        ]),
        json!(["seq",
            ["let", "list", ["list.new", 1, 2]],
            ["list.len", ["var", "list"]]
        ]),
        json!(["<", 1, 2, ["+", 1, 2]]),
        json!(["if", ["<", 2, 1], "a", ["if", ["<", 1, 2], "b", "c"]]),
        json!(["apply", ["lambda", ["a", "b"], ["-", ["var", "a"], ["var", "b"]]], 10, 4]),
        json!(["str.concat", ["caller"], ["this"], ["quote", ["not", "evaluated"]]]),
    ];
    for program in programs {
        let source = decompile(&Value::from_json(&program));
        let again = transpile(&source)
            .unwrap_or_else(|err| panic!("{source}\n{err}"))
            .to_json()
            .unwrap();
        for mode in MODES {
            let original = World::new(mode).run(&program).await.0;
            let reparsed = World::new(mode).run(&again).await.0;
            assert_eq!(outcome(&original), outcome(&reparsed), "{source}");
        }
    }
}
