// Table geometry and game rules.
//
// Both peers and the server read these constants, so a session created by
// the server, simulated by player one, and rendered by player two all agree
// on where the walls and paddles are. Coordinates are in "table units" with
// the origin at the top-left corner; velocities are table units per tick.

/// Table width.
pub const TABLE_WIDTH: f64 = 800.0;
/// Table height.
pub const TABLE_HEIGHT: f64 = 400.0;

pub const PADDLE_WIDTH: f64 = 10.0;
pub const PADDLE_HEIGHT: f64 = 80.0;

/// Distance from a side edge to the inner face of that side's paddle. The
/// ball bounces when it crosses the face plane within the paddle's
/// half-height window.
pub const PADDLE_INSET: f64 = 30.0;

pub const BALL_RADIUS: f64 = 8.0;

/// Serve velocity at multiplier 1.0.
pub const INITIAL_BALL_VEL_X: f64 = 5.0;
pub const INITIAL_BALL_VEL_Y: f64 = 3.0;

/// Growth of `ballSpeedMultiplier` after each point.
pub const SPEED_UP_FACTOR: f64 = 1.5;

/// Cap on `|ballVelY|` at multiplier 1.0; scaled by the current multiplier.
pub const MAX_BALL_VEL_Y: f64 = 8.0;

/// How much a strike at the very tip of a paddle adds to `ballVelY`, at
/// multiplier 1.0.
pub const PADDLE_SPIN: f64 = 4.0;

/// First peer to this many points wins.
pub const WINNING_SCORE: u32 = 3;

/// Length of the pre-game countdown.
pub const COUNTDOWN_SECONDS: u32 = 3;

/// Cadence of both client timers (physics/publish and poll/reconcile).
pub const TICK_MS: u64 = 50;

/// Default lifetime of an idle session in the store.
pub const SESSION_TTL_SECS: u64 = 3600;

/// Horizontal centre of the table.
pub const CENTER_X: f64 = TABLE_WIDTH / 2.0;
/// Vertical centre of the table.
pub const CENTER_Y: f64 = TABLE_HEIGHT / 2.0;

/// Face plane of player one's (left) paddle.
pub const P1_PADDLE_FACE_X: f64 = PADDLE_INSET;
/// Face plane of player two's (right) paddle.
pub const P2_PADDLE_FACE_X: f64 = TABLE_WIDTH - PADDLE_INSET;

/// Clamp a paddle centre so the paddle stays on the table.
pub fn clamp_paddle_y(y: f64) -> f64 {
    y.clamp(PADDLE_HEIGHT / 2.0, TABLE_HEIGHT - PADDLE_HEIGHT / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paddle_faces_are_mirrored() {
        assert_eq!(P1_PADDLE_FACE_X, TABLE_WIDTH - P2_PADDLE_FACE_X);
    }

    #[test]
    fn clamp_paddle_keeps_paddle_on_table() {
        assert_eq!(clamp_paddle_y(-100.0), PADDLE_HEIGHT / 2.0);
        assert_eq!(clamp_paddle_y(10_000.0), TABLE_HEIGHT - PADDLE_HEIGHT / 2.0);
        assert_eq!(clamp_paddle_y(CENTER_Y), CENTER_Y);
    }
}
