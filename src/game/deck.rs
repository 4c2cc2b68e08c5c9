use std::collections::HashMap;

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::RngCore;

use super::card::{CardIdentity, CardStack, Instruction, Magnitude, Operator};

pub const DECK_SIZE: usize = 49;

const fn op(magnitude: Magnitude, operator: Operator) -> CardIdentity {
    CardIdentity::operator(magnitude, operator)
}

const fn ins(magnitude: Magnitude, instruction: Instruction) -> CardIdentity {
    CardIdentity::instruction(magnitude, instruction)
}

const fn val(magnitude: Magnitude) -> CardIdentity {
    CardIdentity::value(magnitude)
}

// LOOP, DEF and RETURN cards stay out of the deck until those instructions
// have stages of their own.
static CATALOG: [CardIdentity; DECK_SIZE] = [
    op(1, Operator::True),
    op(1, Operator::Greater),
    op(1, Operator::Equal),
    op(1, Operator::False),
    ins(1, Instruction::Var),
    op(1, Operator::Add),
    val(1),
    ins(2, Instruction::Var),
    ins(2, Instruction::If),
    op(2, Operator::True),
    op(2, Operator::Less),
    op(2, Operator::Add),
    val(2),
    ins(4, Instruction::Var),
    op(4, Operator::Subtract),
    op(4, Operator::And),
    op(4, Operator::True),
    op(4, Operator::Greater),
    val(4),
    ins(8, Instruction::Var),
    op(8, Operator::Equal),
    ins(8, Instruction::If),
    op(8, Operator::Less),
    op(8, Operator::False),
    op(8, Operator::True),
    val(8),
    op(16, Operator::Xor),
    op(16, Operator::Not),
    op(16, Operator::Equal),
    op(16, Operator::Multiply),
    ins(16, Instruction::Var),
    val(16),
    ins(32, Instruction::Var),
    ins(32, Instruction::If),
    op(32, Operator::Equal),
    op(32, Operator::Multiply),
    val(32),
    ins(64, Instruction::Var),
    op(64, Operator::False),
    op(64, Operator::NotEqual),
    op(64, Operator::Divide),
    op(64, Operator::Or),
    op(64, Operator::Equal),
    val(64),
    op(128, Operator::Divide),
    op(128, Operator::NotEqual),
    ins(128, Instruction::Var),
    ins(128, Instruction::If),
    op(128, Operator::False),
];

static CATALOG_COUNTS: Lazy<HashMap<CardIdentity, usize>> = Lazy::new(|| {
    let mut counts = HashMap::new();
    for card in CATALOG.iter() {
        *counts.entry(*card).or_insert(0) += 1;
    }
    counts
});

/// 完整卡表（规范顺序）。
pub fn catalog() -> &'static [CardIdentity] {
    &CATALOG
}

/// How many copies of `card` a complete deck holds.
pub fn catalog_count(card: &CardIdentity) -> usize {
    CATALOG_COUNTS.get(card).copied().unwrap_or(0)
}

/// 创建未洗牌的新牌库。
pub fn create_deck() -> CardStack {
    CardStack::from_cards(CATALOG.iter().copied())
}

/// 由宿主注入的洗牌能力。核心逻辑从不自行产生随机数。
pub trait Shuffle {
    fn shuffle_cards(&mut self, cards: &mut [CardIdentity]);
}

impl<R: RngCore + ?Sized> Shuffle for R {
    fn shuffle_cards(&mut self, cards: &mut [CardIdentity]) {
        cards.shuffle(self);
    }
}
