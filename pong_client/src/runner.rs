// Drives one `ClientGame` against a live server.
//
// Two fixed-rate timers share one thread:
// - physics: let the `PaddleBrain` move our paddle, advance the ball (player
//   one only), and publish the resulting patch with `update`;
// - poll: fetch `state` and fold it in with `ClientGame::reconcile`.
//
// Both default to `TICK_MS` and are offset by half a period so requests
// interleave. `start` and `reset` are driven from the physics timer off the
// current game state, not off one-shot events:
// - player one calls `start` on every tick while the opponent is present and
//   no countdown has been seen, until a call succeeds;
// - when more than one match is requested, the peer that lost calls `reset`
//   after a short game-over pause, and keeps calling it each tick until it
//   succeeds. Only then does it move into the new countdown.
//
// Transient failures (transport errors, 503 from a store outage) are logged
// and skipped; the next tick simply tries again. Anything else ends the run.

use std::thread;
use std::time::{Duration, Instant};

use pong_prng::GameRng;
use pong_protocol::PlayerSlot;
use pong_protocol::rules::{CENTER_Y, TICK_MS};
use tracing::{debug, info, warn};

use crate::client::{ApiClient, ClientError};
use crate::game::{ClientGame, GameEvent};

/// Physics ticks between a win and the loser's `reset` for the next match.
const REPLAY_PAUSE_TICKS: u32 = 20;

/// How a bot moves its paddle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaddleBrain {
    /// Keep the paddle centred on the ball.
    Tracking,
    /// Leave the paddle in the middle of the table.
    Parked,
}

impl PaddleBrain {
    fn target(self, game: &ClientGame) -> f64 {
        match self {
            PaddleBrain::Tracking => game.ball().1,
            PaddleBrain::Parked => CENTER_Y,
        }
    }
}

/// Knobs for a run.
#[derive(Clone, Debug)]
pub struct RunnerOptions {
    pub tick: Duration,
    pub brain: PaddleBrain,
    /// Matches to play before returning; more than one means replays.
    pub matches: u32,
    /// Give up after this long.
    pub time_limit: Option<Duration>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(TICK_MS),
            brain: PaddleBrain::Tracking,
            matches: 1,
            time_limit: None,
        }
    }
}

/// Result of a finished run, describing the last match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchReport {
    pub session_id: String,
    pub player: PlayerSlot,
    pub winner: PlayerSlot,
    pub p1_score: u32,
    pub p2_score: u32,
    pub matches_played: u32,
}

pub struct MatchRunner {
    api: ApiClient,
    game: ClientGame,
    session_id: String,
    options: RunnerOptions,
    matches_played: u32,
    /// A `start` went through; the countdown is on its way.
    start_sent: bool,
    replay_in: Option<u32>,
}

impl MatchRunner {
    /// Create a new match on the server and play it as player one.
    pub fn host(api: ApiClient, options: RunnerOptions) -> Result<Self, ClientError> {
        let session_id = api.create()?;
        info!(session = %session_id, "created match");
        Ok(Self::new(api, PlayerSlot::One, session_id, options))
    }

    /// Join an existing match as player two.
    pub fn join(
        api: ApiClient,
        session_id: &str,
        options: RunnerOptions,
    ) -> Result<Self, ClientError> {
        api.join(session_id)?;
        info!(session = %session_id, "joined match");
        Ok(Self::new(api, PlayerSlot::Two, session_id.to_owned(), options))
    }

    fn new(api: ApiClient, player: PlayerSlot, session_id: String, options: RunnerOptions) -> Self {
        let mut game = ClientGame::new(player, GameRng::from_entropy());
        game.enter_session(session_id.clone());
        Self {
            api,
            game,
            session_id,
            options,
            matches_played: 0,
            start_sent: false,
            replay_in: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn game(&self) -> &ClientGame {
        &self.game
    }

    /// Play until the requested number of matches is over.
    pub fn run(&mut self) -> Result<MatchReport, ClientError> {
        let tick = self.options.tick;
        let started = Instant::now();
        let mut next_physics = started;
        let mut next_poll = started + tick / 2;

        loop {
            if let Some(limit) = self.options.time_limit {
                if started.elapsed() > limit {
                    return Err(ClientError::TimedOut(limit));
                }
            }

            let now = Instant::now();
            if now >= next_physics {
                if let Some(report) = self.physics_step()? {
                    return Ok(report);
                }
                next_physics = (next_physics + tick).max(now);
            }
            if now >= next_poll {
                if let Some(report) = self.poll_step()? {
                    return Ok(report);
                }
                next_poll = (next_poll + tick).max(now);
            }

            let wake = next_physics.min(next_poll);
            if let Some(wait) = wake.checked_duration_since(Instant::now()) {
                thread::sleep(wait);
            }
        }
    }

    fn physics_step(&mut self) -> Result<Option<MatchReport>, ClientError> {
        if self.game.awaiting_start()
            && !self.start_sent
            && tolerate(self.api.start(&self.session_id))?.is_some()
        {
            self.start_sent = true;
            info!(session = %self.session_id, "countdown requested");
        }

        if let Some(left) = self.replay_in {
            let left = left.saturating_sub(1);
            self.replay_in = Some(left);
            if left == 0 && tolerate(self.api.reset(&self.session_id))?.is_some() {
                self.replay_in = None;
                self.game.begin_replay();
                info!(session = %self.session_id, "replay requested");
            }
        }

        let target = self.options.brain.target(&self.game);
        self.game.move_paddle(target);
        let event = self.game.tick_physics();

        if let Some(patch) = self.game.publish_patch() {
            tolerate(self.api.update(&self.session_id, patch))?;
        }
        match event {
            Some(event) => self.on_event(event),
            None => Ok(None),
        }
    }

    fn poll_step(&mut self) -> Result<Option<MatchReport>, ClientError> {
        let Some(state) = tolerate(self.api.state(&self.session_id))? else {
            return Ok(None);
        };
        for event in self.game.reconcile(&state) {
            if let Some(report) = self.on_event(event)? {
                return Ok(Some(report));
            }
        }
        Ok(None)
    }

    fn on_event(&mut self, event: GameEvent) -> Result<Option<MatchReport>, ClientError> {
        match event {
            GameEvent::OpponentJoined => {
                info!(session = %self.session_id, "opponent joined");
            }
            GameEvent::MatchWon(winner) => {
                self.matches_played += 1;
                info!(
                    session = %self.session_id,
                    %winner,
                    p1 = self.game.score(PlayerSlot::One),
                    p2 = self.game.score(PlayerSlot::Two),
                    "match over"
                );
                if self.matches_played >= self.options.matches {
                    return Ok(Some(self.report(winner)));
                }
                if self.game.can_replay() {
                    self.replay_in = Some(REPLAY_PAUSE_TICKS);
                }
            }
            GameEvent::CountdownTick(value) => debug!(value, "countdown"),
            GameEvent::PointScored(scorer) => debug!(%scorer, "point"),
            GameEvent::CountdownStarted | GameEvent::MatchStarted => {
                debug!(?event, phase = ?self.game.phase(), "phase change");
            }
        }
        Ok(None)
    }

    fn report(&self, winner: PlayerSlot) -> MatchReport {
        MatchReport {
            session_id: self.session_id.clone(),
            player: self.game.player(),
            winner,
            p1_score: self.game.score(PlayerSlot::One),
            p2_score: self.game.score(PlayerSlot::Two),
            matches_played: self.matches_played,
        }
    }
}

/// Swallow transient failures as `None`, pass everything else through.
fn tolerate<T>(result: Result<T, ClientError>) -> Result<Option<T>, ClientError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_transient() => {
            warn!(error = %e, "request failed, will retry next tick");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
