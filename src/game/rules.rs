use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{
    card::{CardIdentity, CardKind, CardParseError},
    config::{ConfigError, GameConfig},
    deck::{create_deck, Shuffle},
    stage::{ActiveStage, Stage},
    state::{GameEvent, GamePhase, GameState, IntegrityError, PlayerId, StackId},
};

/// 玩家动作。卡牌与牌堆标识在边界处已解码。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "move", content = "args", rename_all = "camelCase")]
pub enum GameMove {
    WriteToGlobalMemory(CardIdentity),
    TrashCard(StackId),
    DrawCard,
    WriteToProcessorValue(CardIdentity),
    WriteToProcessorOperator(CardIdentity),
    WriteToProcessorInstruction(CardIdentity),
}

/// Undo and authority flags the session layer enforces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveInfo {
    pub undoable: bool,
    /// Whether a client may run the move optimistically.
    pub client: bool,
}

impl GameMove {
    pub fn name(&self) -> &'static str {
        match self {
            GameMove::WriteToGlobalMemory(_) => "writeToGlobalMemory",
            GameMove::TrashCard(_) => "trashCard",
            GameMove::DrawCard => "drawCard",
            GameMove::WriteToProcessorValue(_) => "writeToProcessorValue",
            GameMove::WriteToProcessorOperator(_) => "writeToProcessorOperator",
            GameMove::WriteToProcessorInstruction(_) => "writeToProcessorInstruction",
        }
    }

    pub fn info(&self) -> MoveInfo {
        match self {
            GameMove::DrawCard => MoveInfo {
                undoable: false,
                client: false,
            },
            _ => MoveInfo {
                undoable: true,
                client: true,
            },
        }
    }
}

/// 宿主发来的原始动作：`{"move": "trashCard", "args": ["globalMemory"]}`。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveRequest {
    #[serde(rename = "move")]
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl MoveRequest {
    fn arg(&self) -> Result<&str, RuleError> {
        self.args
            .first()
            .map(String::as_str)
            .ok_or_else(|| RuleError::MissingArgument {
                move_name: self.name.clone(),
            })
    }

    fn card_arg(&self) -> Result<CardIdentity, RuleError> {
        self.arg()?
            .parse()
            .map_err(|error| RuleError::MalformedCard { error })
    }

    fn stack_arg(&self) -> Result<StackId, RuleError> {
        let raw = self.arg()?;
        raw.parse().map_err(|_| RuleError::UnknownStack {
            stack_id: raw.to_string(),
        })
    }
}

impl TryFrom<MoveRequest> for GameMove {
    type Error = RuleError;

    fn try_from(request: MoveRequest) -> Result<Self, Self::Error> {
        match request.name.as_str() {
            "writeToGlobalMemory" => Ok(GameMove::WriteToGlobalMemory(request.card_arg()?)),
            "trashCard" => Ok(GameMove::TrashCard(request.stack_arg()?)),
            "drawCard" => Ok(GameMove::DrawCard),
            "writeToProcessorValue" => Ok(GameMove::WriteToProcessorValue(request.card_arg()?)),
            "writeToProcessorOperator" => {
                Ok(GameMove::WriteToProcessorOperator(request.card_arg()?))
            }
            "writeToProcessorInstruction" => {
                Ok(GameMove::WriteToProcessorInstruction(request.card_arg()?))
            }
            _ => Err(RuleError::UnknownMove { name: request.name }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("invalid configuration: {error}")]
    InvalidConfig { error: ConfigError },
    #[error("expected phase {expected:?}, game is in {actual:?}")]
    InvalidPhase {
        expected: GamePhase,
        actual: GamePhase,
    },
    #[error("it is not player {player_id}'s turn")]
    NotPlayerTurn { player_id: PlayerId },
    #[error("player {player_id} not found")]
    PlayerNotFound { player_id: PlayerId },
    #[error("player {player_id} has no active stage")]
    NoActiveStage { player_id: PlayerId },
    #[error("move `{move_name}` is not available here")]
    MoveNotAvailable {
        move_name: String,
        phase: GamePhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<Stage>,
    },
    #[error("card {card} is not in hand")]
    CardNotInHand { card: CardIdentity },
    #[error("stack {stack:?} is empty")]
    StackEmpty { stack: StackId },
    #[error("stack {stack:?} cannot be used by this move")]
    StackNotAllowed { stack: StackId },
    #[error("card {card} is lower than global memory top {current}")]
    MagnitudeTooLow {
        card: CardIdentity,
        current: CardIdentity,
    },
    #[error("card {card} does not fit stack {stack:?}")]
    CardKindMismatch { card: CardIdentity, stack: StackId },
    #[error("turn needs {required} moves, only {made} made")]
    MinMovesNotMet { required: u32, made: u32 },
    #[error("unknown move `{name}`")]
    UnknownMove { name: String },
    #[error("move `{move_name}` is missing its argument")]
    MissingArgument { move_name: String },
    #[error("malformed card id: {error}")]
    MalformedCard { error: CardParseError },
    #[error("unknown stack id `{stack_id}`")]
    UnknownStack { stack_id: String },
    #[error("state integrity violated: {error}")]
    IntegrityViolation { error: IntegrityError },
}

impl RuleError {
    /// True for rejected moves; false for broken state or configuration.
    pub fn is_illegal_move(&self) -> bool {
        !matches!(
            self,
            RuleError::InvalidConfig { .. } | RuleError::IntegrityViolation { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
}

impl RuleResolution {
    pub fn new(state: GameState, events: Vec<GameEvent>) -> Self {
        Self { state, events }
    }
}

/// What a successful move asks of the stage machine.
enum Followup {
    Stay,
    EndStage,
    EndTurn,
}

/// Collects events for the caller while mirroring them into the state log.
struct EventSink {
    events: Vec<GameEvent>,
}

impl EventSink {
    fn new() -> Self {
        Self { events: Vec::new() }
    }

    fn push(&mut self, state: &mut GameState, event: GameEvent) {
        state.record_event(event.clone());
        self.events.push(event);
    }

    fn finish(self) -> Vec<GameEvent> {
        self.events
    }
}

pub struct RuleEngine;

impl RuleEngine {
    fn ensure_integrity(state: &GameState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    fn ensure_phase(state: &GameState, expected: GamePhase) -> Result<(), RuleError> {
        if state.phase != expected {
            return Err(RuleError::InvalidPhase {
                expected,
                actual: state.phase,
            });
        }
        Ok(())
    }

    fn ensure_turn_owner(state: &GameState, player_id: PlayerId) -> Result<(), RuleError> {
        if state.get_player(player_id).is_none() {
            return Err(RuleError::PlayerNotFound { player_id });
        }
        if state.current_player != player_id {
            return Err(RuleError::NotPlayerTurn { player_id });
        }
        Ok(())
    }

    /// 建立新对局：洗牌、每人发牌、向全局内存发一张牌。
    pub fn setup<S: Shuffle + ?Sized>(
        player_count: usize,
        config: GameConfig,
        shuffler: &mut S,
    ) -> Result<GameState, RuleError> {
        config
            .validate(player_count)
            .map_err(|error| RuleError::InvalidConfig { error })?;

        let hand_size = config.initial_hand_size;
        let memory_size = config.initial_global_memory;
        let mut state = GameState::new(player_count, config);
        state.secret.deck = create_deck();
        state.secret.deck.shuffle(shuffler);

        let mut dealt = Vec::with_capacity(player_count + 1);
        {
            let GameState {
                secret,
                players,
                global_memory,
                ..
            } = &mut state;
            for player in players.iter_mut() {
                let shortfall = secret.deck.deal(&mut player.hand, hand_size);
                dealt.push(GameEvent::HandDealt {
                    player_id: player.id,
                    count: hand_size - shortfall,
                    shortfall,
                });
            }
            let shortfall = secret.deck.deal(global_memory, memory_size);
            dealt.push(GameEvent::GlobalMemorySeeded {
                count: memory_size - shortfall,
                shortfall,
            });
        }

        for event in dealt {
            if let GameEvent::HandDealt { shortfall, .. }
            | GameEvent::GlobalMemorySeeded { shortfall, .. } = &event
            {
                if *shortfall > 0 {
                    warn!(shortfall = *shortfall, "deck ran out while dealing");
                }
            }
            state.record_event(event);
        }
        state.record_event(GameEvent::PhaseChanged {
            phase: GamePhase::Setup,
        });

        debug!(
            players = player_count,
            deck = state.secret.deck.len(),
            "setup dealt"
        );
        Self::ensure_integrity(&state)?;
        Ok(state)
    }

    /// Leaves the setup phase once global memory holds a card and opens the
    /// first turn. Stays in setup otherwise.
    pub fn advance_phase(state: &mut GameState) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_integrity(state)?;
        Self::ensure_phase(state, GamePhase::Setup)?;
        let mut sink = EventSink::new();
        Self::check_setup_end(state, &mut sink);
        Ok(sink.finish())
    }

    fn check_setup_end(state: &mut GameState, sink: &mut EventSink) {
        if state.phase != GamePhase::Setup || state.global_memory.peek().is_none() {
            return;
        }
        state.phase = GamePhase::Main;
        sink.push(
            state,
            GameEvent::PhaseChanged {
                phase: GamePhase::Main,
            },
        );
        Self::begin_turn(state, sink);
    }

    fn begin_turn(state: &mut GameState, sink: &mut EventSink) {
        let player_id = state.current_player;
        let processor = state.processor_state();
        let stage = Stage::for_instruction(processor.instruction);

        let turn = state.turn;
        state.moves_this_turn = 0;
        state.active = Some(ActiveStage { player_id, stage });
        sink.push(state, GameEvent::TurnStarted { player_id, turn });
        sink.push(state, GameEvent::StageActivated { player_id, stage });
        if !stage.is_supported() {
            debug!(stage = stage.as_str(), "stage has no moves yet");
        }
        debug!(player_id, turn, stage = stage.as_str(), "turn started");
    }

    fn advance_stage(state: &mut GameState, sink: &mut EventSink) {
        let Some(active) = state.active.take() else {
            return;
        };
        let next = active.stage.next();
        sink.push(
            state,
            GameEvent::StageEnded {
                player_id: active.player_id,
                stage: active.stage,
                next,
            },
        );
        if let Some(stage) = next {
            state.active = Some(ActiveStage {
                player_id: active.player_id,
                stage,
            });
            sink.push(
                state,
                GameEvent::StageActivated {
                    player_id: active.player_id,
                    stage,
                },
            );
        }
        debug!(
            player_id = active.player_id,
            from = active.stage.as_str(),
            to = ?next,
            "stage ended"
        );
    }

    fn finish_turn(state: &mut GameState, sink: &mut EventSink) {
        let current = state.current_player;
        state.active = None;
        sink.push(state, GameEvent::TurnEnded { player_id: current });
        if let Some(next) = state.next_player_after(current) {
            state.current_player = next;
        }
        state.turn += 1;
        Self::begin_turn(state, sink);
    }

    /// 执行一个动作；失败时状态保持不变。
    pub fn apply_move(
        state: &mut GameState,
        player_id: PlayerId,
        action: GameMove,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_integrity(state)?;
        Self::ensure_turn_owner(state, player_id)?;

        let mut sink = EventSink::new();
        let result = match state.phase {
            GamePhase::Setup => Self::apply_setup_move(state, player_id, &action, &mut sink),
            GamePhase::Main => Self::apply_stage_move(state, player_id, &action, &mut sink),
        };

        let followup = match result {
            Ok(followup) => followup,
            Err(error) => {
                debug!(player_id, action = action.name(), %error, "move rejected");
                return Err(error);
            }
        };

        state.moves_this_turn += 1;
        match followup {
            Followup::Stay => {}
            Followup::EndStage => Self::advance_stage(state, &mut sink),
            Followup::EndTurn => Self::finish_turn(state, &mut sink),
        }
        Self::check_setup_end(state, &mut sink);
        Ok(sink.finish())
    }

    pub fn apply_request(
        state: &mut GameState,
        player_id: PlayerId,
        request: MoveRequest,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let action = GameMove::try_from(request)?;
        Self::apply_move(state, player_id, action)
    }

    fn apply_setup_move(
        state: &mut GameState,
        player_id: PlayerId,
        action: &GameMove,
        sink: &mut EventSink,
    ) -> Result<Followup, RuleError> {
        match action {
            GameMove::WriteToGlobalMemory(card) => {
                let hand = state
                    .hand_mut(player_id)
                    .ok_or(RuleError::PlayerNotFound { player_id })?;
                let card = hand
                    .take(card)
                    .ok_or(RuleError::CardNotInHand { card: *card })?;
                state.global_memory.push(card);
                sink.push(
                    state,
                    GameEvent::GlobalMemoryWritten {
                        player_id,
                        card,
                        replaced: None,
                    },
                );
                Ok(Followup::Stay)
            }
            other => Err(RuleError::MoveNotAvailable {
                move_name: other.name().to_string(),
                phase: GamePhase::Setup,
                stage: None,
            }),
        }
    }

    fn apply_stage_move(
        state: &mut GameState,
        player_id: PlayerId,
        action: &GameMove,
        sink: &mut EventSink,
    ) -> Result<Followup, RuleError> {
        let stage = state
            .stage_for(player_id)
            .ok_or(RuleError::NoActiveStage { player_id })?;

        match (stage, action) {
            (Stage::FulfillVarCondition, GameMove::TrashCard(stack)) => {
                Self::trash_top(state, player_id, *stack, &StackId::MEMORY, sink)?;
                Ok(Followup::Stay)
            }
            (Stage::FulfillVarCondition, GameMove::WriteToGlobalMemory(card)) => {
                Self::write_global_memory(state, player_id, *card, false, sink)?;
                Ok(Followup::EndStage)
            }
            (Stage::FulfillBaseCondition, GameMove::DrawCard) => {
                Self::draw_card(state, player_id, sink)?;
                Ok(Followup::EndTurn)
            }
            (Stage::FulfillBaseCondition, GameMove::WriteToGlobalMemory(card)) => {
                Self::write_global_memory(state, player_id, *card, true, sink)?;
                Ok(Followup::EndStage)
            }
            (Stage::CleanProcessor, GameMove::TrashCard(stack)) => {
                Self::trash_top(state, player_id, *stack, &StackId::PROCESSOR, sink)?;
                if state.is_processor_empty() {
                    Ok(Followup::EndStage)
                } else {
                    Ok(Followup::Stay)
                }
            }
            (Stage::UpdateProcessor, GameMove::WriteToProcessorValue(card)) => {
                Self::write_processor(state, player_id, *card, StackId::ProcessorValue, sink)?;
                Ok(Followup::Stay)
            }
            (Stage::UpdateProcessor, GameMove::WriteToProcessorOperator(card)) => {
                Self::write_processor(state, player_id, *card, StackId::ProcessorOperator, sink)?;
                Ok(Followup::Stay)
            }
            (Stage::UpdateProcessor, GameMove::WriteToProcessorInstruction(card)) => {
                Self::write_processor(
                    state,
                    player_id,
                    *card,
                    StackId::ProcessorInstruction,
                    sink,
                )?;
                Ok(Followup::Stay)
            }
            (stage, other) => Err(RuleError::MoveNotAvailable {
                move_name: other.name().to_string(),
                phase: GamePhase::Main,
                stage: Some(stage),
            }),
        }
    }

    fn trash_top(
        state: &mut GameState,
        player_id: PlayerId,
        stack: StackId,
        allowed: &[StackId],
        sink: &mut EventSink,
    ) -> Result<(), RuleError> {
        if !allowed.contains(&stack) {
            return Err(RuleError::StackNotAllowed { stack });
        }
        let card = state
            .stack_mut(stack)
            .pop()
            .ok_or(RuleError::StackEmpty { stack })?;
        state.trash.push(card);
        sink.push(
            state,
            GameEvent::CardTrashed {
                player_id,
                from: stack,
                card,
            },
        );
        Ok(())
    }

    /// Replaces the top of global memory with a card from hand, trashing the
    /// old top. With `require_not_lower` the new card may not be smaller.
    fn write_global_memory(
        state: &mut GameState,
        player_id: PlayerId,
        card: CardIdentity,
        require_not_lower: bool,
        sink: &mut EventSink,
    ) -> Result<(), RuleError> {
        let in_hand = state
            .hand(player_id)
            .map(|hand| hand.contains(&card))
            .unwrap_or(false);
        if !in_hand {
            return Err(RuleError::CardNotInHand { card });
        }
        if let Some(current) = state.global_memory.peek().copied() {
            if require_not_lower && card.magnitude < current.magnitude {
                return Err(RuleError::MagnitudeTooLow { card, current });
            }
        }

        let Some(card) = state.hand_mut(player_id).and_then(|hand| hand.take(card)) else {
            return Err(RuleError::CardNotInHand { card });
        };
        let replaced = state.global_memory.pop();
        if let Some(old) = replaced {
            state.trash.push(old);
        }
        state.global_memory.push(card);
        sink.push(
            state,
            GameEvent::GlobalMemoryWritten {
                player_id,
                card,
                replaced,
            },
        );
        Ok(())
    }

    fn draw_card(
        state: &mut GameState,
        player_id: PlayerId,
        sink: &mut EventSink,
    ) -> Result<(), RuleError> {
        let GameState {
            secret, players, ..
        } = &mut *state;
        let hand = players
            .iter_mut()
            .find(|player| player.id == player_id)
            .map(|player| &mut player.hand)
            .ok_or(RuleError::PlayerNotFound { player_id })?;

        match secret.deck.pop() {
            Some(card) => {
                hand.push(card);
                sink.push(state, GameEvent::CardDrawn { player_id, card });
            }
            None => {
                // the turn still ends on an empty deck
                warn!(player_id, "draw from an exhausted deck");
                sink.push(state, GameEvent::DeckExhausted { player_id });
            }
        }
        Ok(())
    }

    fn write_processor(
        state: &mut GameState,
        player_id: PlayerId,
        card: CardIdentity,
        stack: StackId,
        sink: &mut EventSink,
    ) -> Result<(), RuleError> {
        if state.config.strict_processor_kinds && !Self::fits_processor(&card, stack) {
            return Err(RuleError::CardKindMismatch { card, stack });
        }
        let card = state
            .hand_mut(player_id)
            .and_then(|hand| hand.take(card))
            .ok_or(RuleError::CardNotInHand { card })?;
        state.stack_mut(stack).push(card);
        sink.push(
            state,
            GameEvent::ProcessorWritten {
                player_id,
                stack,
                card,
            },
        );
        Ok(())
    }

    fn fits_processor(card: &CardIdentity, stack: StackId) -> bool {
        match stack {
            StackId::ProcessorValue => true,
            StackId::ProcessorOperator => matches!(card.kind, CardKind::Operator(_)),
            StackId::ProcessorInstruction => matches!(card.kind, CardKind::Instruction(_)),
            _ => false,
        }
    }

    /// 结束当前阶段，进入下一阶段（若有）。供外部回合管理调用。
    pub fn end_stage(
        state: &mut GameState,
        player_id: PlayerId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_integrity(state)?;
        Self::ensure_phase(state, GamePhase::Main)?;
        Self::ensure_turn_owner(state, player_id)?;
        if state.stage_for(player_id).is_none() {
            return Err(RuleError::NoActiveStage { player_id });
        }
        let mut sink = EventSink::new();
        Self::advance_stage(state, &mut sink);
        Ok(sink.finish())
    }

    pub fn end_turn(
        state: &mut GameState,
        player_id: PlayerId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_integrity(state)?;
        Self::ensure_phase(state, GamePhase::Main)?;
        Self::ensure_turn_owner(state, player_id)?;
        let required = state.config.min_moves_per_turn;
        if state.moves_this_turn < required {
            return Err(RuleError::MinMovesNotMet {
                required,
                made: state.moves_this_turn,
            });
        }
        let mut sink = EventSink::new();
        Self::finish_turn(state, &mut sink);
        Ok(sink.finish())
    }
}
