use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::card::{CardIdentity, CardQuery, CardStack, Instruction, Magnitude, Operator};
use super::config::GameConfig;
use super::deck::{catalog_count, DECK_SIZE};
use super::stage::{ActiveStage, Stage};

/// 玩家标识。
pub type PlayerId = u8;

/// 共享牌堆标识。玩家手牌不在此列，见 [`Location::Hand`]。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum StackId {
    Deck,
    Trash,
    ProcessorValue,
    ProcessorOperator,
    ProcessorInstruction,
    LocalMemory,
    GlobalMemory,
}

impl StackId {
    pub const ALL: [StackId; 7] = [
        StackId::Deck,
        StackId::Trash,
        StackId::ProcessorValue,
        StackId::ProcessorOperator,
        StackId::ProcessorInstruction,
        StackId::LocalMemory,
        StackId::GlobalMemory,
    ];
    pub const PROCESSOR: [StackId; 3] = [
        StackId::ProcessorValue,
        StackId::ProcessorOperator,
        StackId::ProcessorInstruction,
    ];
    pub const MEMORY: [StackId; 2] = [StackId::LocalMemory, StackId::GlobalMemory];

    pub fn as_str(self) -> &'static str {
        match self {
            StackId::Deck => "deck",
            StackId::Trash => "trash",
            StackId::ProcessorValue => "processorValue",
            StackId::ProcessorOperator => "processorOperator",
            StackId::ProcessorInstruction => "processorInstruction",
            StackId::LocalMemory => "localMemory",
            StackId::GlobalMemory => "globalMemory",
        }
    }
}

impl FromStr for StackId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or(())
    }
}

/// 卡牌所在位置：某位玩家的手牌或共享牌堆。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Location {
    Hand { player_id: PlayerId },
    Stack { stack: StackId },
}

impl From<StackId> for Location {
    fn from(stack: StackId) -> Self {
        Location::Stack { stack }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    #[serde(default)]
    pub hand: CardStack,
}

impl Player {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            hand: CardStack::new(),
        }
    }
}

/// 仅发牌流程可见的部分，玩家视图会整体剥离。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Secret {
    #[serde(default)]
    pub deck: CardStack,
}

/// 游戏阶段。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GamePhase {
    Setup,
    Main,
}

impl Default for GamePhase {
    fn default() -> Self {
        Self::Setup
    }
}

/// 处理器快照。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessorState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Magnitude>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<Instruction>,
}

impl ProcessorState {
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.operator.is_none() && self.instruction.is_none()
    }
}

/// 游戏事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    HandDealt {
        player_id: PlayerId,
        count: usize,
        shortfall: usize,
    },
    GlobalMemorySeeded {
        count: usize,
        shortfall: usize,
    },
    PhaseChanged {
        phase: GamePhase,
    },
    TurnStarted {
        player_id: PlayerId,
        turn: u32,
    },
    StageActivated {
        player_id: PlayerId,
        stage: Stage,
    },
    StageEnded {
        player_id: PlayerId,
        stage: Stage,
        #[serde(skip_serializing_if = "Option::is_none")]
        next: Option<Stage>,
    },
    GlobalMemoryWritten {
        player_id: PlayerId,
        card: CardIdentity,
        #[serde(skip_serializing_if = "Option::is_none")]
        replaced: Option<CardIdentity>,
    },
    CardTrashed {
        player_id: PlayerId,
        from: StackId,
        card: CardIdentity,
    },
    CardDrawn {
        player_id: PlayerId,
        card: CardIdentity,
    },
    DeckExhausted {
        player_id: PlayerId,
    },
    ProcessorWritten {
        player_id: PlayerId,
        stack: StackId,
        card: CardIdentity,
    },
    TurnEnded {
        player_id: PlayerId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum IntegrityError {
    #[error("current player {player_id} is not seated")]
    InvalidPlayerIndex { player_id: PlayerId },
    #[error("expected {expected} cards in play, found {actual}")]
    CardCountMismatch { expected: usize, actual: usize },
    #[error("card {card} is not part of the deck")]
    UnknownCard { card: CardIdentity },
    #[error("card {card} appears more often than the deck allows")]
    DuplicateCard { card: CardIdentity },
}

/// 游戏整体状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    #[serde(default)]
    pub secret: Secret,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub trash: CardStack,
    #[serde(default)]
    pub processor_value: CardStack,
    #[serde(default)]
    pub processor_operator: CardStack,
    #[serde(default)]
    pub processor_instruction: CardStack,
    #[serde(default)]
    pub local_memory: CardStack,
    #[serde(default)]
    pub global_memory: CardStack,
    pub current_player: PlayerId,
    pub turn: u32,
    #[serde(default)]
    pub phase: GamePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<ActiveStage>,
    #[serde(default)]
    pub moves_this_turn: u32,
    #[serde(default)]
    pub config: GameConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
}

impl GameState {
    /// Seats `player_count` players with empty hands; every stack starts empty.
    pub fn new(player_count: usize, config: GameConfig) -> Self {
        let players = (0..player_count)
            .map(|id| Player::new(id as PlayerId))
            .collect();
        Self {
            secret: Secret::default(),
            players,
            trash: CardStack::new(),
            processor_value: CardStack::new(),
            processor_operator: CardStack::new(),
            processor_instruction: CardStack::new(),
            local_memory: CardStack::new(),
            global_memory: CardStack::new(),
            current_player: 0,
            turn: 1,
            phase: GamePhase::Setup,
            active: None,
            moves_this_turn: 0,
            config,
            event_log: Vec::new(),
        }
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
    }

    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    pub fn player_index(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|player| player.id == id)
    }

    /// Next seat in play order, wrapping around.
    pub fn next_player_after(&self, id: PlayerId) -> Option<PlayerId> {
        let index = self.player_index(id)?;
        let next = (index + 1) % self.players.len();
        self.players.get(next).map(|player| player.id)
    }

    pub fn hand(&self, id: PlayerId) -> Option<&CardStack> {
        self.get_player(id).map(|player| &player.hand)
    }

    pub fn hand_mut(&mut self, id: PlayerId) -> Option<&mut CardStack> {
        self.get_player_mut(id).map(|player| &mut player.hand)
    }

    pub fn stack(&self, id: StackId) -> &CardStack {
        match id {
            StackId::Deck => &self.secret.deck,
            StackId::Trash => &self.trash,
            StackId::ProcessorValue => &self.processor_value,
            StackId::ProcessorOperator => &self.processor_operator,
            StackId::ProcessorInstruction => &self.processor_instruction,
            StackId::LocalMemory => &self.local_memory,
            StackId::GlobalMemory => &self.global_memory,
        }
    }

    pub fn stack_mut(&mut self, id: StackId) -> &mut CardStack {
        match id {
            StackId::Deck => &mut self.secret.deck,
            StackId::Trash => &mut self.trash,
            StackId::ProcessorValue => &mut self.processor_value,
            StackId::ProcessorOperator => &mut self.processor_operator,
            StackId::ProcessorInstruction => &mut self.processor_instruction,
            StackId::LocalMemory => &mut self.local_memory,
            StackId::GlobalMemory => &mut self.global_memory,
        }
    }

    pub fn location(&self, location: Location) -> Option<&CardStack> {
        match location {
            Location::Hand { player_id } => self.hand(player_id),
            Location::Stack { stack } => Some(self.stack(stack)),
        }
    }

    pub fn location_mut(&mut self, location: Location) -> Option<&mut CardStack> {
        match location {
            Location::Hand { player_id } => self.hand_mut(player_id),
            Location::Stack { stack } => Some(self.stack_mut(stack)),
        }
    }

    /// Finds where a card currently sits, hands first.
    pub fn locate(&self, card: &CardIdentity) -> Option<Location> {
        self.players
            .iter()
            .find(|player| player.hand.contains(card))
            .map(|player| Location::Hand {
                player_id: player.id,
            })
            .or_else(|| {
                StackId::ALL
                    .iter()
                    .copied()
                    .find(|id| self.stack(*id).contains(card))
                    .map(Location::from)
            })
    }

    /// Moves one card between two locations. Nothing changes unless both
    /// locations exist and `from` holds the card.
    pub fn transfer<'a>(
        &mut self,
        from: Location,
        to: Location,
        card: impl Into<CardQuery<'a>>,
    ) -> bool {
        if self.location(to).is_none() {
            return false;
        }
        let Some(taken) = self.location_mut(from).and_then(|stack| stack.take(card)) else {
            return false;
        };
        match self.location_mut(to) {
            Some(stack) => {
                stack.push(taken);
                true
            }
            None => false,
        }
    }

    pub fn processor_state(&self) -> ProcessorState {
        ProcessorState {
            value: self.processor_value.peek().map(|card| card.magnitude),
            operator: self
                .processor_operator
                .peek()
                .and_then(CardIdentity::as_operator),
            instruction: self
                .processor_instruction
                .peek()
                .and_then(CardIdentity::as_instruction),
        }
    }

    pub fn is_processor_empty(&self) -> bool {
        self.processor_state().is_empty()
    }

    pub fn stage_for(&self, player_id: PlayerId) -> Option<Stage> {
        self.active
            .filter(|active| active.player_id == player_id)
            .map(|active| active.stage)
    }

    fn all_cards(&self) -> impl Iterator<Item = &CardIdentity> {
        self.players
            .iter()
            .flat_map(|player| player.hand.iter())
            .chain(StackId::ALL.iter().flat_map(move |id| self.stack(*id).iter()))
    }

    pub fn total_cards(&self) -> usize {
        self.all_cards().count()
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        if self.get_player(self.current_player).is_none() {
            return Err(IntegrityError::InvalidPlayerIndex {
                player_id: self.current_player,
            });
        }

        let mut seen: HashMap<CardIdentity, usize> = HashMap::new();
        for card in self.all_cards() {
            let allowed = catalog_count(card);
            if allowed == 0 {
                return Err(IntegrityError::UnknownCard { card: *card });
            }
            let count = seen.entry(*card).or_insert(0);
            *count += 1;
            if *count > allowed {
                return Err(IntegrityError::DuplicateCard { card: *card });
            }
        }

        let actual = self.total_cards();
        if actual != DECK_SIZE {
            return Err(IntegrityError::CardCountMismatch {
                expected: DECK_SIZE,
                actual,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::deck::create_deck;

    fn card(id: &str) -> CardIdentity {
        id.parse().expect("test card ids are well formed")
    }

    fn full_state() -> GameState {
        let mut state = GameState::new(2, GameConfig::default());
        state.secret.deck = create_deck();
        state
    }

    #[test]
    fn stack_ids_parse_from_wire_names() {
        assert_eq!("globalMemory".parse::<StackId>(), Ok(StackId::GlobalMemory));
        assert_eq!(
            "processorOperator".parse::<StackId>(),
            Ok(StackId::ProcessorOperator)
        );
        assert_eq!("player".parse::<StackId>(), Err(()));
        for id in StackId::ALL {
            let json = serde_json::to_string(&id).expect("serialize stack id");
            assert_eq!(json, format!("\"{}\"", id.as_str()));
        }
    }

    #[test]
    fn processor_snapshot_reads_each_stack_independently() {
        let mut state = full_state();
        assert!(state.is_processor_empty());

        state.processor_value.push(card("8:VAR"));
        state.processor_instruction.push(card("4:-"));
        let snapshot = state.processor_state();
        assert_eq!(snapshot.value, Some(8));
        assert_eq!(snapshot.operator, None);
        // an operator card in the instruction slot carries no instruction
        assert_eq!(snapshot.instruction, None);
        assert!(!state.is_processor_empty());

        state.processor_value.pop();
        state.processor_instruction.push(card("2:IF"));
        assert_eq!(state.processor_state().instruction, Some(Instruction::If));
    }

    #[test]
    fn transfer_is_all_or_nothing() {
        let mut state = full_state();
        let target = card("32:IF");
        let hand = Location::Hand { player_id: 1 };

        assert!(!state.transfer(StackId::Deck.into(), Location::Hand { player_id: 9 }, target));
        assert_eq!(state.secret.deck.len(), DECK_SIZE);

        assert!(state.transfer(StackId::Deck.into(), hand, target));
        assert_eq!(state.locate(&target), Some(hand));
        assert!(!state.transfer(StackId::Deck.into(), hand, target));
        assert_eq!(state.total_cards(), DECK_SIZE);
    }

    #[test]
    fn integrity_check_counts_every_stack() {
        let mut state = full_state();
        assert_eq!(state.integrity_check(), Ok(()));

        let moved = state.secret.deck.pop().expect("deck not empty");
        state.trash.push(moved);
        assert_eq!(state.integrity_check(), Ok(()));

        state.trash.push(moved);
        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::DuplicateCard { card: moved })
        );

        state.trash.pop();
        state.trash.pop();
        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::CardCountMismatch {
                expected: DECK_SIZE,
                actual: DECK_SIZE - 1
            })
        );

        state.trash.push(card("1:LOOP"));
        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::UnknownCard {
                card: card("1:LOOP")
            })
        );
    }

    #[test]
    fn next_player_wraps_around_play_order() {
        let state = GameState::new(3, GameConfig::default());
        assert_eq!(state.next_player_after(0), Some(1));
        assert_eq!(state.next_player_after(2), Some(0));
        assert_eq!(state.next_player_after(7), None);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = full_state();
        state.transfer(StackId::Deck.into(), StackId::GlobalMemory.into(), "1:VAR");
        let json = serde_json::to_string(&state).expect("serialize state");
        assert!(json.contains("\"1:VAR\""));
        let back: GameState = serde_json::from_str(&json).expect("deserialize state");
        assert_eq!(back, state);
    }
}
