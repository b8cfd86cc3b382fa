//! Motor/servo to simulator receiver-output mapping.
//!
//! A map string is a comma separated list of six character tokens,
//! `M01-01` or `S02-03`: tag, two digit firmware output index, a dash, two
//! digit receiver output index. Both indices are 1-based.
//!
//! Slots hold one byte each. Motors are stored 0-based with [`MOTOR_TAG`]
//! set, servos are stored as given, zero marks an unset slot. Simulator
//! backends consume the raw table directly.
//!
//! A receiver output named twice keeps the last assignment.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use std::fmt;

pub const MAX_MOTORS: usize = 12;
pub const MAX_SERVOS: usize = 16;
pub const MAX_OUTPUTS: usize = MAX_MOTORS + MAX_SERVOS;

pub const MOTOR_TAG: u8 = 0x80;
pub const UNSET: u8 = 0;

const TOKEN_LEN: usize = 6;

// two decimal digits must fit below the tag bit
const_assert!(99 < MOTOR_TAG as usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputTarget {
    /// 0-based motor index
    Motor(u8),
    /// 1-based servo index
    Servo(u8),
}

impl OutputTarget {
    pub fn encode(self) -> u8 {
        match self {
            OutputTarget::Motor(index) => index | MOTOR_TAG,
            OutputTarget::Servo(index) => index,
        }
    }

    pub fn decode(raw: u8) -> Option<Self> {
        if raw == UNSET {
            None
        } else if raw & MOTOR_TAG != 0 {
            Some(OutputTarget::Motor(raw & !MOTOR_TAG))
        } else {
            Some(OutputTarget::Servo(raw))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MalformedReason {
    Length,
    Tag,
    Separator,
    Digits,
    SourceIndex,
    ReceiverIndex,
    ReceiverOutOfRange,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MalformedReason::Length => "token must be exactly 6 characters",
            MalformedReason::Tag => "tag must be M or S",
            MalformedReason::Separator => "missing '-' separator",
            MalformedReason::Digits => "indices must be two ASCII digits",
            MalformedReason::SourceIndex => "motor/servo index must be at least 1",
            MalformedReason::ReceiverIndex => "receiver output must be at least 1",
            MalformedReason::ReceiverOutOfRange => "receiver output beyond output table",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("malformed channel map token `{token}`: {reason}")]
    Malformed { token: String, reason: MalformedReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMapping {
    slots: [u8; MAX_OUTPUTS],
    count: usize,
}

impl ChannelMapping {
    pub fn new() -> Self {
        Self {
            slots: [UNSET; MAX_OUTPUTS],
            count: 0,
        }
    }

    /// Parse a map string. Any bad token rejects the whole string.
    pub fn parse(map: &str) -> Result<Self, MappingError> {
        let mut mapping = Self::new();

        // empty tokens between commas are skipped
        for token in map.split(',').filter(|t| !t.is_empty()) {
            let (slot, target) = parse_token(token)?;
            mapping.slots[slot] = target.encode();
            mapping.count += 1;
        }

        Ok(mapping)
    }

    /// Number of tokens consumed, duplicates included.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Decoded assignment for a 0-based receiver output slot.
    pub fn get(&self, slot: usize) -> Option<OutputTarget> {
        self.slots.get(slot).copied().and_then(OutputTarget::decode)
    }

    pub fn raw(&self) -> &[u8; MAX_OUTPUTS] {
        &self.slots
    }

    /// Assigned slots in receiver output order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, OutputTarget)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, &raw)| OutputTarget::decode(raw).map(|target| (slot, target)))
    }
}

impl Default for ChannelMapping {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for ChannelMapping {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_token(token: &str) -> Result<(usize, OutputTarget), MappingError> {
    let malformed = |reason| MappingError::Malformed {
        token: token.to_string(),
        reason,
    };

    let bytes = token.as_bytes();
    if bytes.len() != TOKEN_LEN {
        return Err(malformed(MalformedReason::Length));
    }
    if bytes[0] != b'M' && bytes[0] != b'S' {
        return Err(malformed(MalformedReason::Tag));
    }
    if bytes[3] != b'-' {
        return Err(malformed(MalformedReason::Separator));
    }

    let source = two_digits(bytes[1], bytes[2]).ok_or_else(|| malformed(MalformedReason::Digits))?;
    let receiver = two_digits(bytes[4], bytes[5]).ok_or_else(|| malformed(MalformedReason::Digits))?;

    if receiver == 0 {
        return Err(malformed(MalformedReason::ReceiverIndex));
    }
    if usize::from(receiver) > MAX_OUTPUTS {
        return Err(malformed(MalformedReason::ReceiverOutOfRange));
    }
    if source == 0 {
        return Err(malformed(MalformedReason::SourceIndex));
    }

    let target = if bytes[0] == b'M' {
        OutputTarget::Motor(source - 1)
    } else {
        OutputTarget::Servo(source)
    };

    Ok((usize::from(receiver) - 1, target))
}

fn two_digits(tens: u8, ones: u8) -> Option<u8> {
    if tens.is_ascii_digit() && ones.is_ascii_digit() {
        Some((tens - b'0') * 10 + (ones - b'0'))
    } else {
        None
    }
}
