use serde::Serialize;

use super::{
    card::CardStack,
    stage::Stage,
    state::{GamePhase, GameState, PlayerId, ProcessorState},
};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OpponentView {
    pub player_id: PlayerId,
    pub hand_size: usize,
}

/// 某位玩家可见的状态：牌库整体剥离，对手手牌只显示张数。
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlayerView {
    pub player_id: PlayerId,
    pub phase: GamePhase,
    pub turn: u32,
    pub current_player: PlayerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub available_moves: Vec<&'static str>,
    pub hand: CardStack,
    pub opponents: Vec<OpponentView>,
    pub trash: CardStack,
    pub processor_value: CardStack,
    pub processor_operator: CardStack,
    pub processor_instruction: CardStack,
    pub local_memory: CardStack,
    pub global_memory: CardStack,
    pub processor: ProcessorState,
}

impl PlayerView {
    pub fn for_player(state: &GameState, player_id: PlayerId) -> Option<Self> {
        let hand = state.hand(player_id)?.clone();
        let stage = state.stage_for(player_id);
        let available_moves = match state.phase {
            GamePhase::Setup if state.current_player == player_id => vec!["writeToGlobalMemory"],
            GamePhase::Setup => Vec::new(),
            GamePhase::Main => stage.map(|stage| stage.moves().to_vec()).unwrap_or_default(),
        };
        let opponents = state
            .players
            .iter()
            .filter(|player| player.id != player_id)
            .map(|player| OpponentView {
                player_id: player.id,
                hand_size: player.hand.len(),
            })
            .collect();

        Some(Self {
            player_id,
            phase: state.phase,
            turn: state.turn,
            current_player: state.current_player,
            stage,
            available_moves,
            hand,
            opponents,
            trash: state.trash.clone(),
            processor_value: state.processor_value.clone(),
            processor_operator: state.processor_operator.clone(),
            processor_instruction: state.processor_instruction.clone(),
            local_memory: state.local_memory.clone(),
            global_memory: state.global_memory.clone(),
            processor: state.processor_state(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::GameConfig;
    use crate::game::deck::DECK_SIZE;
    use crate::game::rules::RuleEngine;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn view_strips_deck_and_hides_opponent_hands() {
        let state = RuleEngine::setup(3, GameConfig::default(), &mut SmallRng::seed_from_u64(3))
            .expect("setup should succeed");
        let view = PlayerView::for_player(&state, 1).expect("seated player");

        assert_eq!(view.hand, state.players[1].hand);
        assert_eq!(
            view.opponents,
            vec![
                OpponentView {
                    player_id: 0,
                    hand_size: 7
                },
                OpponentView {
                    player_id: 2,
                    hand_size: 7
                },
            ]
        );

        let json = serde_json::to_value(&view).expect("serialize view");
        assert!(json.get("secret").is_none());
        assert!(json.get("deck").is_none());
        let visible = view.hand.len()
            + view.trash.len()
            + view.processor_value.len()
            + view.processor_operator.len()
            + view.processor_instruction.len()
            + view.local_memory.len()
            + view.global_memory.len();
        assert_eq!(visible, DECK_SIZE - state.secret.deck.len() - 14);
        assert!(view.available_moves.is_empty());
    }

    #[test]
    fn view_lists_moves_of_the_active_stage() {
        let mut state =
            RuleEngine::setup(2, GameConfig::default(), &mut SmallRng::seed_from_u64(5))
                .expect("setup should succeed");
        let setup_view = PlayerView::for_player(&state, 0).expect("seated player");
        assert_eq!(setup_view.available_moves, vec!["writeToGlobalMemory"]);

        RuleEngine::advance_phase(&mut state).expect("leave setup");
        let view = PlayerView::for_player(&state, 0).expect("seated player");
        assert_eq!(view.stage, Some(Stage::FulfillBaseCondition));
        assert_eq!(view.available_moves, vec!["drawCard", "writeToGlobalMemory"]);
        assert!(PlayerView::for_player(&state, 9).is_none());
    }
}
