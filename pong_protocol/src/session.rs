// The shared shape of a match.
//
// `Session` is exactly what the server stores under `pong:session:<id>` and
// what the `state` action returns; field names are camelCase on the wire.
// `SessionPatch` is the sparse body of an `update`: every field is optional
// and only present fields are written. Two fields (`winner`,
// `countdownStartTime`) are themselves nullable, so the patch uses
// `Option<Option<_>>` to tell "absent" apart from an explicit `null`.
//
// The patch also carries the `player` + `paddleY` convenience pair that
// clients use to move their own paddle without naming `p1Y`/`p2Y`.

use serde::{Deserialize, Deserializer, Serialize};

use crate::rules::{CENTER_X, CENTER_Y, INITIAL_BALL_VEL_X, INITIAL_BALL_VEL_Y};
use crate::types::PlayerSlot;

/// Complete state of one match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub ball_x: f64,
    pub ball_y: f64,
    pub ball_vel_x: f64,
    pub ball_vel_y: f64,
    pub ball_speed_multiplier: f64,
    pub p1_y: f64,
    pub p2_y: f64,
    pub p1_score: u32,
    pub p2_score: u32,
    pub game_started: bool,
    pub winner: Option<PlayerSlot>,
    pub countdown_active: bool,
    pub countdown_value: u32,
    /// Milliseconds since the Unix epoch.
    pub countdown_start_time: Option<u64>,
    pub ready_to_start: bool,
    /// Milliseconds since the Unix epoch; stamped by the store on every write.
    pub last_update: u64,
    pub p1_connected: bool,
    pub p2_connected: bool,
}

impl Session {
    /// A freshly created match: ball centred with the serve velocity, paddles
    /// centred, no score, no countdown, only player one present.
    pub fn new(now_ms: u64) -> Self {
        Self {
            ball_x: CENTER_X,
            ball_y: CENTER_Y,
            ball_vel_x: INITIAL_BALL_VEL_X,
            ball_vel_y: INITIAL_BALL_VEL_Y,
            ball_speed_multiplier: 1.0,
            p1_y: CENTER_Y,
            p2_y: CENTER_Y,
            p1_score: 0,
            p2_score: 0,
            game_started: false,
            winner: None,
            countdown_active: false,
            countdown_value: 0,
            countdown_start_time: None,
            ready_to_start: false,
            last_update: now_ms,
            p1_connected: true,
            p2_connected: false,
        }
    }

    /// Paddle centre for the given side.
    pub fn paddle_y(&self, slot: PlayerSlot) -> f64 {
        match slot {
            PlayerSlot::One => self.p1_y,
            PlayerSlot::Two => self.p2_y,
        }
    }

    /// Score for the given side.
    pub fn score(&self, slot: PlayerSlot) -> u32 {
        match slot {
            PlayerSlot::One => self.p1_score,
            PlayerSlot::Two => self.p2_score,
        }
    }
}

/// Sparse update to a `Session`. Absent fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ball_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ball_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ball_vel_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ball_vel_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ball_speed_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p1_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p2_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p1_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p2_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_started: Option<bool>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub winner: Option<Option<PlayerSlot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown_value: Option<u32>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub countdown_start_time: Option<Option<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_to_start: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p1_connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p2_connected: Option<bool>,
    /// Which paddle `paddle_y` moves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paddle_y: Option<f64>,
}

impl SessionPatch {
    /// Patch that only moves one paddle.
    pub fn paddle(player: PlayerSlot, y: f64) -> Self {
        Self {
            player: Some(player),
            paddle_y: Some(y),
            ..Self::default()
        }
    }
}

/// A field that is present in the JSON is `Some(value)`, where `value` may
/// itself be `None` for an explicit `null`. Combined with `#[serde(default)]`
/// an absent field stays `None`.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
