//! Browser-side checks of the JSON API, run with `wasm-pack test --headless --firefox`.

#![cfg(target_arch = "wasm32")]

use rummikub_ai::wasm_api::{apply_move_json, choose_move_json, decompose_tiles, get_build_commit};
use serde_json::Value;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn parse(s: &str) -> Value {
    serde_json::from_str(s).unwrap()
}

#[wasm_bindgen_test]
fn test_decompose_tiles() {
    let out = parse(&decompose_tiles(r#"["k13", "y13", "j"]"#));
    assert_eq!(out["success"], true);
    assert_eq!(out["result"][0]["type"], "group");
}

#[wasm_bindgen_test]
fn test_mcts_move_under_time_limit() {
    let board = r#"[{"type": "run", "tiles": ["b4", "b5", "b6"]}]"#;
    let rack = r#"["b7", "r10", "y10", "k10", "r2"]"#;
    let budget = r#"{"iterations": 20, "time_limit_ms": 200, "seed": 5}"#;
    let out = parse(&choose_move_json(board, rack, true, "mcts", budget, ""));
    assert_eq!(out["success"], true);

    let applied = parse(&apply_move_json(board, rack, true, &out["result"].to_string()));
    assert_eq!(applied["success"], true);
}

#[wasm_bindgen_test]
fn test_build_commit() {
    assert!(!get_build_commit().is_empty());
}
