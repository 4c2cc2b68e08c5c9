//! 回合内的阶段机。

use serde::{Deserialize, Serialize};

use super::card::Instruction;
use super::state::PlayerId;

/// 回合阶段，决定当前行动玩家可执行哪些动作。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    FulfillVarCondition,
    FulfillIfCondition,
    FulfillLoopCondition,
    FulfillBaseCondition,
    CleanProcessor,
    UpdateProcessor,
}

impl Stage {
    /// Picks the opening stage of a turn from the loaded instruction.
    pub fn for_instruction(instruction: Option<Instruction>) -> Self {
        match instruction {
            Some(Instruction::Var) => Stage::FulfillVarCondition,
            Some(Instruction::If) => Stage::FulfillIfCondition,
            Some(Instruction::Loop) => Stage::FulfillLoopCondition,
            // DEF and RETURN have no stage of their own yet.
            Some(Instruction::Def) | Some(Instruction::Return) | None => {
                Stage::FulfillBaseCondition
            }
        }
    }

    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::FulfillVarCondition
            | Stage::FulfillIfCondition
            | Stage::FulfillLoopCondition => Some(Stage::CleanProcessor),
            Stage::FulfillBaseCondition | Stage::CleanProcessor => Some(Stage::UpdateProcessor),
            Stage::UpdateProcessor => None,
        }
    }

    /// IF and LOOP conditions are not evaluated yet; their stages expose no
    /// moves and only advance through `end_stage`.
    pub fn is_supported(self) -> bool {
        !matches!(self, Stage::FulfillIfCondition | Stage::FulfillLoopCondition)
    }

    pub fn moves(self) -> &'static [&'static str] {
        match self {
            Stage::FulfillVarCondition => &["trashCard", "writeToGlobalMemory"],
            Stage::FulfillIfCondition | Stage::FulfillLoopCondition => &[],
            Stage::FulfillBaseCondition => &["drawCard", "writeToGlobalMemory"],
            Stage::CleanProcessor => &["trashCard"],
            Stage::UpdateProcessor => &[
                "writeToProcessorValue",
                "writeToProcessorOperator",
                "writeToProcessorInstruction",
            ],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::FulfillVarCondition => "fulfillVarCondition",
            Stage::FulfillIfCondition => "fulfillIfCondition",
            Stage::FulfillLoopCondition => "fulfillLoopCondition",
            Stage::FulfillBaseCondition => "fulfillBaseCondition",
            Stage::CleanProcessor => "cleanProcessor",
            Stage::UpdateProcessor => "updateProcessor",
        }
    }
}

/// 当前被激活阶段的玩家。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveStage {
    pub player_id: PlayerId,
    pub stage: Stage,
}
