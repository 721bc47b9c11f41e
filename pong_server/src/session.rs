// Session State Machine: the authoritative transitions of a match.
//
// `Sessions` is what the router calls. It owns the typed store and a clock
// and exposes one method per action: `create`, `join`, `start`, `reset`,
// `update`, and `read` (the `state` action). Every method except `create`
// loads the session first and fails with `SessionNotFound` if it is gone.
//
// There is no in-process state between requests: each method is a
// read-modify-write against the store, and concurrent writers race with
// last-write-wins semantics. In the steady state the two peers write
// disjoint fields (player one: ball, its paddle, scores; player two: its
// paddle), which keeps collisions rare.
//
// The pre-game countdown has no server-side timer. `start` and `reset`
// store an anchor (`countdownStartTime`) and every `read` re-derives the
// remaining seconds from it through the pure `resolve_countdown`. The edge
// to zero flips `countdownActive` off and raises the one-shot
// `readyToStart`, and that transition is persisted before the read returns.
// Any number of pollers, or a long gap between polls, resolve to the same
// answer.

use pong_prng::GameRng;
use pong_protocol::rules::{
    CENTER_X, CENTER_Y, COUNTDOWN_SECONDS, INITIAL_BALL_VEL_X, INITIAL_BALL_VEL_Y,
};
use pong_protocol::session::{Session, SessionPatch};
use pong_protocol::types::PlayerSlot;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::GameError;
use crate::store::{KvBackend, SessionStore};

/// Attempts at drawing an id that isn't already live before giving up.
const MAX_ID_ATTEMPTS: usize = 5;

/// Seconds left on a countdown anchored at `start_ms`, never negative.
pub fn countdown_remaining(start_ms: u64, now_ms: u64) -> u32 {
    let elapsed_secs = now_ms.saturating_sub(start_ms) / 1000;
    u64::from(COUNTDOWN_SECONDS).saturating_sub(elapsed_secs) as u32
}

/// Re-derive the countdown from its anchor.
///
/// Returns the session as it should be reported at `now_ms`. When the
/// countdown has reached zero the result has `countdownActive=false`,
/// `readyToStart=true`, and no anchor; the caller must persist that edge.
/// Sessions without an active countdown (or without an anchor) come back
/// unchanged.
pub fn resolve_countdown(session: &Session, now_ms: u64) -> Session {
    let mut resolved = session.clone();
    if !resolved.countdown_active {
        return resolved;
    }
    let Some(start_ms) = resolved.countdown_start_time else {
        return resolved;
    };
    let remaining = countdown_remaining(start_ms, now_ms);
    resolved.countdown_value = remaining;
    if remaining == 0 {
        resolved.countdown_active = false;
        resolved.ready_to_start = true;
        resolved.countdown_start_time = None;
    }
    resolved
}

/// Write every field present in `patch` into `session`.
pub fn apply_patch(session: &mut Session, patch: &SessionPatch) {
    if let Some(v) = patch.ball_x {
        session.ball_x = v;
    }
    if let Some(v) = patch.ball_y {
        session.ball_y = v;
    }
    if let Some(v) = patch.ball_vel_x {
        session.ball_vel_x = v;
    }
    if let Some(v) = patch.ball_vel_y {
        session.ball_vel_y = v;
    }
    if let Some(v) = patch.ball_speed_multiplier {
        session.ball_speed_multiplier = v;
    }
    if let Some(v) = patch.p1_y {
        session.p1_y = v;
    }
    if let Some(v) = patch.p2_y {
        session.p2_y = v;
    }
    if let (Some(player), Some(y)) = (patch.player, patch.paddle_y) {
        match player {
            PlayerSlot::One => session.p1_y = y,
            PlayerSlot::Two => session.p2_y = y,
        }
    }
    if let Some(v) = patch.p1_score {
        session.p1_score = v;
    }
    if let Some(v) = patch.p2_score {
        session.p2_score = v;
    }
    if let Some(v) = patch.game_started {
        session.game_started = v;
    }
    if let Some(v) = patch.winner {
        session.winner = v;
    }
    if let Some(v) = patch.countdown_active {
        session.countdown_active = v;
    }
    if let Some(v) = patch.countdown_value {
        session.countdown_value = v;
    }
    if let Some(v) = patch.countdown_start_time {
        session.countdown_start_time = v;
    }
    if let Some(v) = patch.ready_to_start {
        session.ready_to_start = v;
    }
    if let Some(v) = patch.p1_connected {
        session.p1_connected = v;
    }
    if let Some(v) = patch.p2_connected {
        session.p2_connected = v;
    }

    // A client that watched the countdown end on its own can report it.
    if patch.countdown_active == Some(false) && patch.countdown_value == Some(0) {
        session.ready_to_start = true;
    }
}

fn arm_countdown(session: &mut Session, now_ms: u64) {
    session.countdown_active = true;
    session.countdown_value = COUNTDOWN_SECONDS;
    session.countdown_start_time = Some(now_ms);
    session.ready_to_start = false;
}

/// The match state machine over a session store.
pub struct Sessions<B, C> {
    store: SessionStore<B>,
    clock: C,
}

impl<B: KvBackend, C: Clock> Sessions<B, C> {
    pub fn new(store: SessionStore<B>, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &SessionStore<B> {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Check that the store is reachable before doing any work.
    pub fn probe(&self) -> Result<(), GameError> {
        Ok(self.store.probe()?)
    }

    /// Start a new match and return its id.
    pub fn create(&self) -> Result<String, GameError> {
        let mut rng = GameRng::from_entropy();
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = rng.session_id();
            if self.store.get(&id)?.is_some() {
                debug!(session = %id, "session id collision, drawing another");
                continue;
            }
            let now = self.clock.now_ms();
            let mut session = Session::new(now);
            self.store.set(&id, &mut session, now)?;
            info!(session = %id, "session created");
            return Ok(id);
        }
        Err(GameError::Unhandled(
            "could not draw an unused session id".into(),
        ))
    }

    /// Mark player two present. Idempotent.
    pub fn join(&self, id: &str) -> Result<bool, GameError> {
        let mut session = self.load(id)?;
        if !session.p2_connected {
            info!(session = %id, "player two joined");
        }
        session.p2_connected = true;
        self.save(id, &mut session)?;
        Ok(session.p2_connected)
    }

    /// Arm (or re-arm) the pre-game countdown.
    pub fn start(&self, id: &str) -> Result<(), GameError> {
        let mut session = self.load(id)?;
        arm_countdown(&mut session, self.clock.now_ms());
        self.save(id, &mut session)?;
        info!(session = %id, "countdown started");
        Ok(())
    }

    /// Put ball, scores, and winner back to their initial values and re-arm
    /// the countdown. Paddles and presence are left alone.
    pub fn reset(&self, id: &str) -> Result<(), GameError> {
        let mut session = self.load(id)?;
        session.ball_x = CENTER_X;
        session.ball_y = CENTER_Y;
        session.ball_vel_x = INITIAL_BALL_VEL_X;
        session.ball_vel_y = INITIAL_BALL_VEL_Y;
        session.ball_speed_multiplier = 1.0;
        session.p1_score = 0;
        session.p2_score = 0;
        session.winner = None;
        session.game_started = false;
        arm_countdown(&mut session, self.clock.now_ms());
        self.save(id, &mut session)?;
        info!(session = %id, "session reset for replay");
        Ok(())
    }

    /// Apply a sparse patch.
    pub fn update(&self, id: &str, patch: &SessionPatch) -> Result<(), GameError> {
        let mut session = self.load(id)?;
        apply_patch(&mut session, patch);
        if let Some(winner) = patch.winner.flatten() {
            info!(session = %id, %winner, "match won");
        }
        self.save(id, &mut session)
    }

    /// Current state, with the countdown resolved against the clock. The
    /// countdown-to-zero edge is persisted before returning.
    pub fn read(&self, id: &str) -> Result<Session, GameError> {
        let session = self.load(id)?;
        let mut resolved = resolve_countdown(&session, self.clock.now_ms());
        if session.countdown_active && !resolved.countdown_active {
            self.save(id, &mut resolved)?;
            info!(session = %id, "countdown finished");
        }
        Ok(resolved)
    }

    fn load(&self, id: &str) -> Result<Session, GameError> {
        self.store
            .get(id)?
            .ok_or_else(|| GameError::SessionNotFound(id.to_owned()))
    }

    fn save(&self, id: &str, session: &mut Session) -> Result<(), GameError> {
        Ok(self.store.set(id, session, self.clock.now_ms())?)
    }
}
