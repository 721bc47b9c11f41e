// Client-side match state and physics.
//
// `ClientGame` is everything one peer knows about a match: its own side, the
// phase it believes the match is in, and its local copy of ball, paddles, and
// score. It performs no I/O. The runner feeds it polled server state through
// `reconcile`, asks it for the next outgoing patch with `publish_patch`, and
// (for player one only) advances the ball with `tick_physics`.
//
// Authority split:
// - Player one simulates the ball and owns ball, score, winner, and
//   `gameStarted` on the server. It only reads player two's paddle back.
// - Player two owns nothing but its paddle. Ball, score, and winner are
//   copied from every poll.
//
// Phases: Lobby → Waiting → Countdown → Playing → GameOver, and from GameOver
// back to Countdown when the match is replayed. Transitions are driven by
// polled state (presence, countdown, `readyToStart`, `gameStarted`,
// `winner`) except the win itself, which player one detects locally.
//
// Player one keeps publishing the finished match until a poll shows the
// server holding its winner, then falls back to paddle-only updates. Either
// peer may `reset` after that without having the old result written back.

use pong_prng::GameRng;
use pong_protocol::rules::{
    BALL_RADIUS, CENTER_X, CENTER_Y, INITIAL_BALL_VEL_X, INITIAL_BALL_VEL_Y, MAX_BALL_VEL_Y,
    P1_PADDLE_FACE_X, P2_PADDLE_FACE_X, PADDLE_HEIGHT, PADDLE_SPIN, SPEED_UP_FACTOR, TABLE_HEIGHT,
    TABLE_WIDTH, WINNING_SCORE, clamp_paddle_y,
};
use pong_protocol::{PlayerSlot, Session, SessionPatch};

/// Where this peer believes the match is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientPhase {
    /// No session yet.
    Lobby,
    /// In a session, waiting for the opponent or for `start`.
    Waiting,
    Countdown,
    Playing,
    GameOver,
}

/// Something the runner may want to react to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameEvent {
    /// Player two showed up (seen by player one).
    OpponentJoined,
    /// A countdown began, for the first match or a replay.
    CountdownStarted,
    CountdownTick(u32),
    MatchStarted,
    PointScored(PlayerSlot),
    MatchWon(PlayerSlot),
}

/// One peer's view of a match.
#[derive(Clone, Debug)]
pub struct ClientGame {
    player: PlayerSlot,
    session_id: Option<String>,
    phase: ClientPhase,
    ball_x: f64,
    ball_y: f64,
    ball_vel_x: f64,
    ball_vel_y: f64,
    multiplier: f64,
    p1_y: f64,
    p2_y: f64,
    p1_score: u32,
    p2_score: u32,
    winner: Option<PlayerSlot>,
    countdown_value: u32,
    opponent_connected: bool,
    /// Player one saw `readyToStart` and still has to clear it.
    ready_ack_pending: bool,
    /// Player one decided the match and the server has not echoed it yet.
    result_pending: bool,
    rng: GameRng,
}

impl ClientGame {
    pub fn new(player: PlayerSlot, rng: GameRng) -> Self {
        Self {
            player,
            session_id: None,
            phase: ClientPhase::Lobby,
            ball_x: CENTER_X,
            ball_y: CENTER_Y,
            ball_vel_x: INITIAL_BALL_VEL_X,
            ball_vel_y: INITIAL_BALL_VEL_Y,
            multiplier: 1.0,
            p1_y: CENTER_Y,
            p2_y: CENTER_Y,
            p1_score: 0,
            p2_score: 0,
            winner: None,
            countdown_value: 0,
            opponent_connected: false,
            ready_ack_pending: false,
            result_pending: false,
            rng,
        }
    }

    /// Leave the lobby for a created or joined session.
    pub fn enter_session(&mut self, session_id: impl Into<String>) {
        self.session_id = Some(session_id.into());
        self.phase = ClientPhase::Waiting;
        // Player one is in the session before player two can be.
        self.opponent_connected = self.player == PlayerSlot::Two;
    }

    pub fn player(&self) -> PlayerSlot {
        self.player
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    pub fn ball(&self) -> (f64, f64) {
        (self.ball_x, self.ball_y)
    }

    pub fn ball_velocity(&self) -> (f64, f64) {
        (self.ball_vel_x, self.ball_vel_y)
    }

    pub fn speed_multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn paddle_y(&self, slot: PlayerSlot) -> f64 {
        match slot {
            PlayerSlot::One => self.p1_y,
            PlayerSlot::Two => self.p2_y,
        }
    }

    pub fn score(&self, slot: PlayerSlot) -> u32 {
        match slot {
            PlayerSlot::One => self.p1_score,
            PlayerSlot::Two => self.p2_score,
        }
    }

    pub fn winner(&self) -> Option<PlayerSlot> {
        self.winner
    }

    pub fn countdown_value(&self) -> u32 {
        self.countdown_value
    }

    /// Player one with an opponent present and no countdown seen yet: the
    /// match still needs a `start`.
    pub fn awaiting_start(&self) -> bool {
        self.player.is_authoritative()
            && self.phase == ClientPhase::Waiting
            && self.opponent_connected
    }

    /// The match is over and this peer lost it, so it gets to call the
    /// rematch.
    pub fn can_replay(&self) -> bool {
        self.phase == ClientPhase::GameOver
            && self.winner.is_some_and(|winner| winner != self.player)
    }

    /// Move this peer's own paddle, clamped to the table.
    pub fn move_paddle(&mut self, y: f64) {
        let y = clamp_paddle_y(y);
        match self.player {
            PlayerSlot::One => self.p1_y = y,
            PlayerSlot::Two => self.p2_y = y,
        }
    }

    /// Advance the ball by one tick. Only player one simulates, and only
    /// while playing; otherwise this is a no-op.
    pub fn tick_physics(&mut self) -> Option<GameEvent> {
        if !self.player.is_authoritative() || self.phase != ClientPhase::Playing {
            return None;
        }

        let prev_x = self.ball_x;
        self.ball_x += self.ball_vel_x;
        self.ball_y += self.ball_vel_y;

        if self.ball_y - BALL_RADIUS <= 0.0 {
            self.ball_y = BALL_RADIUS;
            self.ball_vel_y = self.ball_vel_y.abs();
        } else if self.ball_y + BALL_RADIUS >= TABLE_HEIGHT {
            self.ball_y = TABLE_HEIGHT - BALL_RADIUS;
            self.ball_vel_y = -self.ball_vel_y.abs();
        }

        let half = PADDLE_HEIGHT / 2.0;
        if self.ball_vel_x < 0.0
            && prev_x - BALL_RADIUS >= P1_PADDLE_FACE_X
            && self.ball_x - BALL_RADIUS < P1_PADDLE_FACE_X
            && (self.ball_y - self.p1_y).abs() <= half
        {
            self.ball_x = P1_PADDLE_FACE_X + BALL_RADIUS;
            self.strike(self.p1_y);
        } else if self.ball_vel_x > 0.0
            && prev_x + BALL_RADIUS <= P2_PADDLE_FACE_X
            && self.ball_x + BALL_RADIUS > P2_PADDLE_FACE_X
            && (self.ball_y - self.p2_y).abs() <= half
        {
            self.ball_x = P2_PADDLE_FACE_X - BALL_RADIUS;
            self.strike(self.p2_y);
        }

        if self.ball_x < 0.0 {
            Some(self.point_to(PlayerSlot::Two))
        } else if self.ball_x > TABLE_WIDTH {
            Some(self.point_to(PlayerSlot::One))
        } else {
            None
        }
    }

    /// Send the ball back, biased by where it met the paddle.
    fn strike(&mut self, paddle_y: f64) {
        let offset = (self.ball_y - paddle_y) / (PADDLE_HEIGHT / 2.0);
        let cap = MAX_BALL_VEL_Y * self.multiplier;
        self.ball_vel_x = -self.ball_vel_x;
        self.ball_vel_y =
            (self.ball_vel_y + offset * PADDLE_SPIN * self.multiplier).clamp(-cap, cap);
    }

    fn point_to(&mut self, scorer: PlayerSlot) -> GameEvent {
        match scorer {
            PlayerSlot::One => self.p1_score += 1,
            PlayerSlot::Two => self.p2_score += 1,
        }
        if self.score(scorer) >= WINNING_SCORE {
            self.winner = Some(scorer);
            self.phase = ClientPhase::GameOver;
            self.result_pending = true;
            return GameEvent::MatchWon(scorer);
        }
        self.multiplier *= SPEED_UP_FACTOR;
        self.serve();
        GameEvent::PointScored(scorer)
    }

    /// Re-centre the ball heading in a random diagonal, at the current speed.
    fn serve(&mut self) {
        let dir_x = if self.rng.random_bool(0.5) { 1.0 } else { -1.0 };
        let dir_y = if self.rng.random_bool(0.5) { 1.0 } else { -1.0 };
        self.ball_x = CENTER_X;
        self.ball_y = CENTER_Y;
        self.ball_vel_x = dir_x * INITIAL_BALL_VEL_X * self.multiplier;
        self.ball_vel_y = dir_y * INITIAL_BALL_VEL_Y * self.multiplier;
    }

    /// The patch to send on this physics tick, or `None` in the lobby.
    pub fn publish_patch(&mut self) -> Option<SessionPatch> {
        self.session_id.as_ref()?;
        let full_state = self.player.is_authoritative()
            && match self.phase {
                ClientPhase::Playing => true,
                ClientPhase::GameOver => self.result_pending,
                _ => false,
            };
        if !full_state {
            return Some(SessionPatch::paddle(self.player, self.paddle_y(self.player)));
        }

        let mut patch = SessionPatch {
            ball_x: Some(self.ball_x),
            ball_y: Some(self.ball_y),
            ball_vel_x: Some(self.ball_vel_x),
            ball_vel_y: Some(self.ball_vel_y),
            ball_speed_multiplier: Some(self.multiplier),
            p1_y: Some(self.p1_y),
            p1_score: Some(self.p1_score),
            p2_score: Some(self.p2_score),
            winner: Some(self.winner),
            game_started: Some(self.phase == ClientPhase::Playing),
            ..SessionPatch::default()
        };
        if self.ready_ack_pending {
            patch.ready_to_start = Some(false);
            self.ready_ack_pending = false;
        }
        Some(patch)
    }

    /// Fold a polled session into local state and report what changed.
    pub fn reconcile(&mut self, state: &Session) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.phase == ClientPhase::Lobby {
            return events;
        }

        match self.player {
            PlayerSlot::One => {
                self.p2_y = state.p2_y;
                if self.result_pending && state.winner == self.winner {
                    self.result_pending = false;
                }
                if state.p2_connected && !self.opponent_connected {
                    self.opponent_connected = true;
                    events.push(GameEvent::OpponentJoined);
                }
            }
            PlayerSlot::Two => {
                self.p1_y = state.p1_y;
                self.ball_x = state.ball_x;
                self.ball_y = state.ball_y;
                self.ball_vel_x = state.ball_vel_x;
                self.ball_vel_y = state.ball_vel_y;
                self.multiplier = state.ball_speed_multiplier;
                for slot in [PlayerSlot::One, PlayerSlot::Two] {
                    if state.score(slot) > self.score(slot) && state.winner.is_none() {
                        events.push(GameEvent::PointScored(slot));
                    }
                }
                self.p1_score = state.p1_score;
                self.p2_score = state.p2_score;
            }
        }

        if state.countdown_active {
            if self.phase != ClientPhase::Countdown {
                if self.phase != ClientPhase::Waiting {
                    self.clear_match();
                }
                self.phase = ClientPhase::Countdown;
                events.push(GameEvent::CountdownStarted);
            }
            if state.countdown_value != self.countdown_value {
                self.countdown_value = state.countdown_value;
                events.push(GameEvent::CountdownTick(state.countdown_value));
            }
            return events;
        }
        self.countdown_value = state.countdown_value;

        let startable = matches!(self.phase, ClientPhase::Waiting | ClientPhase::Countdown);
        match self.player {
            PlayerSlot::One if startable && state.ready_to_start => {
                self.ball_x = state.ball_x;
                self.ball_y = state.ball_y;
                self.ball_vel_x = state.ball_vel_x;
                self.ball_vel_y = state.ball_vel_y;
                self.multiplier = state.ball_speed_multiplier;
                self.p1_score = state.p1_score;
                self.p2_score = state.p2_score;
                self.winner = None;
                self.ready_ack_pending = true;
                self.phase = ClientPhase::Playing;
                events.push(GameEvent::MatchStarted);
            }
            PlayerSlot::Two => {
                if let Some(winner) = state.winner {
                    if self.phase != ClientPhase::GameOver {
                        self.winner = Some(winner);
                        self.phase = ClientPhase::GameOver;
                        events.push(GameEvent::MatchWon(winner));
                    }
                } else if startable && (state.ready_to_start || state.game_started) {
                    self.winner = None;
                    self.phase = ClientPhase::Playing;
                    events.push(GameEvent::MatchStarted);
                }
            }
            PlayerSlot::One => {}
        }
        events
    }

    /// Local half of a replay, once `reset` went through: back to the serve
    /// state and into the countdown.
    pub fn begin_replay(&mut self) {
        self.clear_match();
        self.phase = ClientPhase::Countdown;
    }

    fn clear_match(&mut self) {
        self.ball_x = CENTER_X;
        self.ball_y = CENTER_Y;
        self.ball_vel_x = INITIAL_BALL_VEL_X;
        self.ball_vel_y = INITIAL_BALL_VEL_Y;
        self.multiplier = 1.0;
        self.p1_score = 0;
        self.p2_score = 0;
        self.winner = None;
        self.ready_ack_pending = false;
        self.result_pending = false;
    }
}
