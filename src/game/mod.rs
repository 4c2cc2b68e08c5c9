//! 游戏核心逻辑模块（牌堆模型、状态机、规则引擎等）。

pub mod card;
pub mod config;
pub mod deck;
pub mod rules;
pub mod stage;
pub mod state;
pub mod view;

pub use card::{
    CardIdentity,
    CardKind,
    CardParseError,
    CardQuery,
    CardStack,
    Instruction,
    Magnitude,
    Operator,
};
pub use config::{ConfigError, GameConfig};
pub use deck::{catalog, create_deck, Shuffle, DECK_SIZE};
pub use rules::{GameMove, MoveInfo, MoveRequest, RuleEngine, RuleError, RuleResolution};
pub use stage::{ActiveStage, Stage};
pub use state::{
    GameEvent,
    GamePhase,
    GameState,
    IntegrityError,
    Location,
    Player,
    PlayerId,
    ProcessorState,
    StackId,
};
pub use view::{OpponentView, PlayerView};
