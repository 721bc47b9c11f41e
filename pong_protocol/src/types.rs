// Core identity types for the pong protocol.
//
// `PlayerSlot` names one of the two peers. On the wire it is the bare number
// 1 or 2 (that is what both the `winner` field and the `player` field of an
// update carry), so it serializes through `u8` and rejects anything else.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which side of the table a peer plays. Player one created the match and is
/// authoritative for ball physics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    /// The other peer.
    pub fn opponent(self) -> Self {
        match self {
            PlayerSlot::One => PlayerSlot::Two,
            PlayerSlot::Two => PlayerSlot::One,
        }
    }

    /// Whether this peer runs the ball simulation.
    pub fn is_authoritative(self) -> bool {
        self == PlayerSlot::One
    }
}

impl From<PlayerSlot> for u8 {
    fn from(slot: PlayerSlot) -> Self {
        match slot {
            PlayerSlot::One => 1,
            PlayerSlot::Two => 2,
        }
    }
}

impl TryFrom<u8> for PlayerSlot {
    type Error = InvalidPlayerSlot;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PlayerSlot::One),
            2 => Ok(PlayerSlot::Two),
            other => Err(InvalidPlayerSlot(other)),
        }
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", u8::from(*self))
    }
}

/// A player number other than 1 or 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("invalid player number {0} (expected 1 or 2)")]
pub struct InvalidPlayerSlot(pub u8);
