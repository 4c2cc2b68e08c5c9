pub mod game;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

pub use game::{
    ActiveStage, CardIdentity, CardKind, CardParseError, CardQuery, CardStack, ConfigError,
    GameConfig, GameEvent, GameMove, GamePhase, GameState, Instruction, IntegrityError, Location,
    Magnitude, MoveInfo, MoveRequest, OpponentView, Operator, Player, PlayerId, PlayerView,
    ProcessorState, RuleEngine, RuleError, RuleResolution, Shuffle, StackId, Stage, DECK_SIZE,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn make_resolution_json(state: &GameState, events: Vec<GameEvent>) -> Result<String, JsValue> {
    serde_json::to_string(&RuleResolution::new(state.clone(), events)).map_err(serde_to_js_error)
}

fn checked_state(state: GameState) -> Result<GameState, JsValue> {
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))?;
    Ok(state)
}

#[wasm_bindgen]
pub struct GameEngine {
    state: GameState,
}

#[wasm_bindgen]
impl GameEngine {
    /// 新建对局。未给出种子时从宿主熵源取随机数。
    #[wasm_bindgen(constructor)]
    pub fn new(
        player_count: u8,
        seed: Option<u32>,
        config_json: Option<String>,
    ) -> Result<GameEngine, JsValue> {
        let config = match config_json {
            Some(json) => serde_json::from_str(&json).map_err(serde_to_js_error)?,
            None => GameConfig::default(),
        };
        let mut rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(u64::from(seed)),
            None => SmallRng::from_entropy(),
        };
        let state = RuleEngine::setup(usize::from(player_count), config, &mut rng)
            .map_err(to_js_error)?;

        let message = format!(
            "Programmable Cards: {player_count} players seated, {} cards left in the deck",
            state.secret.deck.len()
        );
        web_sys::console::log_1(&message.into());
        Ok(GameEngine { state })
    }

    #[wasm_bindgen(js_name = "fromStateJson")]
    pub fn from_state_json(json: &str) -> Result<GameEngine, JsValue> {
        let state: GameState = serde_json::from_str(json).map_err(serde_to_js_error)?;
        Ok(GameEngine {
            state: checked_state(state)?,
        })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state).map_err(serde_to_js_error)
    }

    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        let state: GameState = serde_json::from_str(json).map_err(serde_to_js_error)?;
        self.state = checked_state(state)?;
        Ok(())
    }

    pub fn view_json(&self, player_id: u8) -> Result<String, JsValue> {
        let view = PlayerView::for_player(&self.state, player_id)
            .ok_or_else(|| to_js_error(RuleError::PlayerNotFound { player_id }))?;
        serde_json::to_string(&view).map_err(serde_to_js_error)
    }

    pub fn processor_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state.processor_state()).map_err(serde_to_js_error)
    }

    pub fn start(&mut self) -> Result<String, JsValue> {
        let events = RuleEngine::advance_phase(&mut self.state).map_err(to_js_error)?;
        make_resolution_json(&self.state, events)
    }

    pub fn apply_move_json(&mut self, player_id: u8, move_json: &str) -> Result<String, JsValue> {
        let request: MoveRequest = serde_json::from_str(move_json).map_err(serde_to_js_error)?;
        let events =
            RuleEngine::apply_request(&mut self.state, player_id, request).map_err(to_js_error)?;
        make_resolution_json(&self.state, events)
    }

    pub fn end_stage(&mut self, player_id: u8) -> Result<String, JsValue> {
        let events = RuleEngine::end_stage(&mut self.state, player_id).map_err(to_js_error)?;
        make_resolution_json(&self.state, events)
    }

    pub fn end_turn(&mut self, player_id: u8) -> Result<String, JsValue> {
        let events = RuleEngine::end_turn(&mut self.state, player_id).map_err(to_js_error)?;
        make_resolution_json(&self.state, events)
    }
}

/// 返回未洗牌的完整牌库（编码字符串数组）。
#[wasm_bindgen(js_name = "createDeck")]
pub fn create_deck() -> Result<JsValue, JsValue> {
    to_value(&game::create_deck()).map_err(JsValue::from)
}

/// 生成指定玩家可见的状态视图。
#[wasm_bindgen(js_name = "playerView")]
pub fn player_view(state: JsValue, player_id: u8) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let view = PlayerView::for_player(&state, player_id)
        .ok_or_else(|| to_js_error(RuleError::PlayerNotFound { player_id }))?;
    to_value(&view).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "applyMove")]
pub fn apply_move(state: JsValue, player_id: u8, request: JsValue) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    let request: MoveRequest = from_value(request).map_err(JsValue::from)?;
    match RuleEngine::apply_request(&mut state, player_id, request) {
        Ok(events) => to_value(&RuleResolution::new(state, events)).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    checked_state(state).map(|_| ())
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
