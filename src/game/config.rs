use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::deck::DECK_SIZE;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 6;

const DEFAULT_INITIAL_HAND_SIZE: usize = 7;
const DEFAULT_INITIAL_GLOBAL_MEMORY: usize = 1;
const DEFAULT_MIN_MOVES_PER_TURN: u32 = 1;

/// 对局配置。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameConfig {
    pub initial_hand_size: usize,
    pub initial_global_memory: usize,
    pub min_moves_per_turn: u32,
    /// Reject processor writes whose card kind does not fit the target stack.
    pub strict_processor_kinds: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            initial_hand_size: DEFAULT_INITIAL_HAND_SIZE,
            initial_global_memory: DEFAULT_INITIAL_GLOBAL_MEMORY,
            min_moves_per_turn: DEFAULT_MIN_MOVES_PER_TURN,
            strict_processor_kinds: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum ConfigError {
    #[error("player count {count} is outside {min}..={max}")]
    PlayerCount { count: usize, min: usize, max: usize },
    #[error("dealing needs {required} cards but the deck holds {available}")]
    DeckTooSmall { required: usize, available: usize },
    #[error("global memory must start with at least one card")]
    EmptyGlobalMemory,
}

impl GameConfig {
    pub fn with_strict_processor_kinds(mut self, strict: bool) -> Self {
        self.strict_processor_kinds = strict;
        self
    }

    pub fn validate(&self, player_count: usize) -> Result<(), ConfigError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&player_count) {
            return Err(ConfigError::PlayerCount {
                count: player_count,
                min: MIN_PLAYERS,
                max: MAX_PLAYERS,
            });
        }
        if self.initial_global_memory == 0 {
            return Err(ConfigError::EmptyGlobalMemory);
        }
        let required = self.initial_hand_size * player_count + self.initial_global_memory;
        if required > DECK_SIZE {
            return Err(ConfigError::DeckTooSmall {
                required,
                available: DECK_SIZE,
            });
        }
        Ok(())
    }
}
