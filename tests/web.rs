//! Browser-side checks of the wasm boundary. Run with `wasm-pack test --headless`.
#![cfg(target_arch = "wasm32")]

use programmable_cards::{GameEngine, GamePhase, RuleResolution, DECK_SIZE};
use serde_json::Value;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn seeded_engine_deals_and_starts() {
    let mut engine = GameEngine::new(2, Some(11), None).expect("engine should build");
    let state: Value = serde_json::from_str(&engine.state_json().expect("state json"))
        .expect("state parses");
    let deck = state["secret"]["deck"].as_array().expect("deck array");
    assert_eq!(deck.len(), DECK_SIZE - 15);

    let resolution: RuleResolution =
        serde_json::from_str(&engine.start().expect("start")).expect("resolution parses");
    assert_eq!(resolution.state.phase, GamePhase::Main);
}

#[wasm_bindgen_test]
fn draw_request_passes_the_turn() {
    let mut engine = GameEngine::new(2, Some(3), None).expect("engine should build");
    engine.start().expect("start");
    let json = engine
        .apply_move_json(0, r#"{"move": "drawCard"}"#)
        .expect("draw should be legal");
    let resolution: RuleResolution = serde_json::from_str(&json).expect("resolution parses");
    assert_eq!(resolution.state.current_player, 1);
}

#[wasm_bindgen_test]
fn illegal_request_is_rejected() {
    let mut engine = GameEngine::new(2, Some(3), None).expect("engine should build");
    engine.start().expect("start");
    assert!(engine
        .apply_move_json(0, r#"{"move": "trashCard", "args": ["player"]}"#)
        .is_err());
}

#[wasm_bindgen_test]
fn view_hides_the_deck() {
    let engine = GameEngine::new(3, Some(9), Some(r#"{"initial_hand_size": 5}"#.into()))
        .expect("engine should build");
    let view: Value = serde_json::from_str(&engine.view_json(2).expect("view json"))
        .expect("view parses");
    assert!(view.get("secret").is_none());
    assert_eq!(view["hand"].as_array().map(Vec::len), Some(5));
}
