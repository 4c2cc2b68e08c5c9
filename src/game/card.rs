use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::deck::Shuffle;

/// 卡牌数值。
pub type Magnitude = u32;

/// 运算符牌面。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Operator {
    #[serde(rename = "TRUE")]
    True,
    #[serde(rename = "FALSE")]
    False,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
    #[serde(rename = "XOR")]
    Xor,
    #[serde(rename = "NOT")]
    Not,
}

impl Operator {
    pub const ALL: [Operator; 14] = [
        Operator::True,
        Operator::False,
        Operator::Equal,
        Operator::NotEqual,
        Operator::Greater,
        Operator::Less,
        Operator::Add,
        Operator::Subtract,
        Operator::Divide,
        Operator::Multiply,
        Operator::And,
        Operator::Or,
        Operator::Xor,
        Operator::Not,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Operator::True => "TRUE",
            Operator::False => "FALSE",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Greater => ">",
            Operator::Less => "<",
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Divide => "/",
            Operator::Multiply => "*",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Xor => "XOR",
            Operator::Not => "NOT",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.token() == token)
    }
}

/// 指令牌面。`LOOP`、`DEF`、`RETURN` 可以解析，但规则引擎暂不支持其语义。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Instruction {
    Var,
    Loop,
    If,
    Def,
    Return,
}

impl Instruction {
    pub const ALL: [Instruction; 5] = [
        Instruction::Var,
        Instruction::Loop,
        Instruction::If,
        Instruction::Def,
        Instruction::Return,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Instruction::Var => "VAR",
            Instruction::Loop => "LOOP",
            Instruction::If => "IF",
            Instruction::Def => "DEF",
            Instruction::Return => "RETURN",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|ins| ins.token() == token)
    }
}

/// 卡牌种类：纯数值、运算符或指令。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardKind {
    Value,
    Operator(Operator),
    Instruction(Instruction),
}

impl CardKind {
    /// Unknown tokens fall back to a plain value card.
    fn from_token(token: &str) -> Self {
        if let Some(op) = Operator::from_token(token) {
            CardKind::Operator(op)
        } else if let Some(ins) = Instruction::from_token(token) {
            CardKind::Instruction(ins)
        } else {
            if !token.is_empty() {
                debug!(token, "unrecognized card symbol decoded as a value card");
            }
            CardKind::Value
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum CardParseError {
    #[error("invalid card magnitude in `{input}`")]
    InvalidMagnitude { input: String },
}

/// 卡牌身份。线上编码为 `"<数值>:<符号>"`，纯数值牌的符号为空。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct CardIdentity {
    pub magnitude: Magnitude,
    pub kind: CardKind,
}

impl CardIdentity {
    pub const fn value(magnitude: Magnitude) -> Self {
        Self {
            magnitude,
            kind: CardKind::Value,
        }
    }

    pub const fn operator(magnitude: Magnitude, operator: Operator) -> Self {
        Self {
            magnitude,
            kind: CardKind::Operator(operator),
        }
    }

    pub const fn instruction(magnitude: Magnitude, instruction: Instruction) -> Self {
        Self {
            magnitude,
            kind: CardKind::Instruction(instruction),
        }
    }

    pub fn as_operator(&self) -> Option<Operator> {
        match self.kind {
            CardKind::Operator(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_instruction(&self) -> Option<Instruction> {
        match self.kind {
            CardKind::Instruction(ins) => Some(ins),
            _ => None,
        }
    }

    pub fn symbol(&self) -> Option<&'static str> {
        match self.kind {
            CardKind::Value => None,
            CardKind::Operator(op) => Some(op.token()),
            CardKind::Instruction(ins) => Some(ins.token()),
        }
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CardIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.magnitude, self.symbol().unwrap_or(""))
    }
}

impl FromStr for CardIdentity {
    type Err = CardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let (top, extra) = match upper.split_once(':') {
            Some((top, extra)) => (top, extra),
            None => (upper.as_str(), ""),
        };
        let magnitude = top
            .parse::<Magnitude>()
            .map_err(|_| CardParseError::InvalidMagnitude {
                input: s.to_string(),
            })?;
        Ok(Self {
            magnitude,
            kind: CardKind::from_token(extra),
        })
    }
}

impl TryFrom<String> for CardIdentity {
    type Error = CardParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CardIdentity> for String {
    fn from(card: CardIdentity) -> Self {
        card.encode()
    }
}

/// 按牌面或编码字符串查找卡牌。
#[derive(Debug, Clone, Copy)]
pub enum CardQuery<'a> {
    Identity(CardIdentity),
    Encoded(&'a str),
}

impl CardQuery<'_> {
    fn resolve(self) -> Option<CardIdentity> {
        match self {
            CardQuery::Identity(card) => Some(card),
            CardQuery::Encoded(id) => id.parse().ok(),
        }
    }
}

impl From<CardIdentity> for CardQuery<'_> {
    fn from(card: CardIdentity) -> Self {
        CardQuery::Identity(card)
    }
}

impl From<&CardIdentity> for CardQuery<'_> {
    fn from(card: &CardIdentity) -> Self {
        CardQuery::Identity(*card)
    }
}

impl<'a> From<&'a str> for CardQuery<'a> {
    fn from(id: &'a str) -> Self {
        CardQuery::Encoded(id)
    }
}

/// 牌堆，最后一个元素为堆顶。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct CardStack {
    cards: Vec<CardIdentity>,
}

impl CardStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cards(cards: impl IntoIterator<Item = CardIdentity>) -> Self {
        Self {
            cards: cards.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[CardIdentity] {
        &self.cards
    }

    pub fn iter(&self) -> impl Iterator<Item = &CardIdentity> {
        self.cards.iter()
    }

    pub fn contains(&self, card: &CardIdentity) -> bool {
        self.cards.contains(card)
    }

    pub fn push(&mut self, card: CardIdentity) -> usize {
        self.cards.push(card);
        self.cards.len()
    }

    pub fn pop(&mut self) -> Option<CardIdentity> {
        self.cards.pop()
    }

    pub fn peek(&self) -> Option<&CardIdentity> {
        self.cards.last()
    }

    /// Removes the first card equal to `query`, wherever it sits in the stack.
    pub fn take<'a>(&mut self, query: impl Into<CardQuery<'a>>) -> Option<CardIdentity> {
        let card = query.into().resolve()?;
        let index = self.cards.iter().position(|candidate| *candidate == card)?;
        Some(self.cards.remove(index))
    }

    pub fn move_card<'a>(&mut self, to: &mut CardStack, query: impl Into<CardQuery<'a>>) -> bool {
        match self.take(query) {
            Some(card) => {
                to.push(card);
                true
            }
            None => false,
        }
    }

    pub fn move_top(&mut self, to: &mut CardStack) -> bool {
        match self.pop() {
            Some(card) => {
                to.push(card);
                true
            }
            None => false,
        }
    }

    /// Moves up to `count` cards from the top of `self` onto `to` and
    /// returns how many of them could not be supplied.
    pub fn deal(&mut self, to: &mut CardStack, count: usize) -> usize {
        for dealt in 0..count {
            if !self.move_top(to) {
                return count - dealt;
            }
        }
        0
    }

    pub fn shuffle<S: Shuffle + ?Sized>(&mut self, shuffler: &mut S) {
        shuffler.shuffle_cards(&mut self.cards);
    }
}

impl FromIterator<CardIdentity> for CardStack {
    fn from_iter<I: IntoIterator<Item = CardIdentity>>(iter: I) -> Self {
        Self::from_cards(iter)
    }
}
