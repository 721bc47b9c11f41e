// End-to-end tests: a real server, real HTTP, real client state machines.
//
// The lockstep tests step two `TestPeer`s by hand to check each leg of the
// sync protocol (join → start → countdown → play → replay). The match tests
// let two `MatchRunner`s play on their own timers until someone wins, some of
// them against a store that drops one write.

use std::thread;
use std::time::Duration;

use multiplayer_tests::{FlakyBackend, TestPeer, TestServer};
use pong_client::{
    ApiClient, ClientError, ClientPhase, GameEvent, MatchReport, MatchRunner, PaddleBrain,
    RunnerOptions,
};
use pong_protocol::PlayerSlot;
use pong_protocol::rules::WINNING_SCORE;

/// Fast timers so a full match finishes in a few seconds.
const TEST_TICK: Duration = Duration::from_millis(10);

/// Bring both peers through the countdown into play.
fn start_match(host: &mut TestPeer, joiner: &mut TestPeer) {
    let events = host.poll();
    assert!(events.contains(&GameEvent::OpponentJoined), "{events:?}");
    host.api.start(&host.session_id()).unwrap();

    let events = joiner.poll_until("countdown", |g| g.phase() == ClientPhase::Countdown);
    assert!(events.contains(&GameEvent::CountdownStarted));

    let events = host.poll_until("play", |g| g.phase() == ClientPhase::Playing);
    assert!(events.contains(&GameEvent::MatchStarted));
    host.publish();
}

fn runner_options(brain: PaddleBrain) -> RunnerOptions {
    RunnerOptions {
        tick: TEST_TICK,
        brain,
        matches: 1,
        time_limit: Some(Duration::from_secs(90)),
    }
}

/// A tracking host against a parked guest, `matches` in a row. Returns the
/// host's and the guest's reports.
fn play_bots(server: &TestServer, matches: u32) -> (MatchReport, MatchReport) {
    let url = server.url();
    let options = move |brain| RunnerOptions {
        matches,
        ..runner_options(brain)
    };

    let mut host = MatchRunner::host(ApiClient::new(&url).unwrap(), options(PaddleBrain::Tracking))
        .unwrap();
    let id = host.session_id().to_owned();

    let guest = thread::spawn(move || {
        MatchRunner::join(ApiClient::new(&url).unwrap(), &id, options(PaddleBrain::Parked))
            .unwrap()
            .run()
    });

    let host_report = host.run().unwrap();
    let guest_report = guest.join().unwrap().unwrap();
    (host_report, guest_report)
}

#[test]
fn start_sequence_reaches_play() {
    let server = TestServer::start();
    let mut host = TestPeer::host(&server.url());
    let mut joiner = TestPeer::join(&server.url(), &host.session_id());

    start_match(&mut host, &mut joiner);

    // Player one cleared readyToStart and raised gameStarted.
    let state = host.api.state(&host.session_id()).unwrap();
    assert!(!state.ready_to_start);
    assert!(state.game_started);
    assert!(!state.countdown_active);
    assert_eq!(state.countdown_value, 0);

    joiner.poll_until("play", |g| g.phase() == ClientPhase::Playing);
}

#[test]
fn player_two_sees_player_one_ball() {
    let server = TestServer::start();
    let mut host = TestPeer::host(&server.url());
    let mut joiner = TestPeer::join(&server.url(), &host.session_id());
    start_match(&mut host, &mut joiner);

    for _ in 0..10 {
        host.game.tick_physics();
    }
    host.publish();
    joiner.poll();
    assert_eq!(joiner.game.ball(), host.game.ball());
    assert_ne!(joiner.game.ball().0, 400.0);
}

#[test]
fn paddles_cross_over() {
    let server = TestServer::start();
    let mut host = TestPeer::host(&server.url());
    let mut joiner = TestPeer::join(&server.url(), &host.session_id());

    joiner.game.move_paddle(150.0);
    joiner.publish();
    host.game.move_paddle(300.0);
    host.publish();

    host.poll();
    joiner.poll();
    assert_eq!(host.game.paddle_y(PlayerSlot::Two), 150.0);
    assert_eq!(joiner.game.paddle_y(PlayerSlot::One), 300.0);

    // Player two's update moved only its own paddle.
    let state = host.api.state(&host.session_id()).unwrap();
    assert_eq!(state.p1_y, 300.0);
    assert_eq!(state.p2_y, 150.0);
}

#[test]
fn loser_calls_the_rematch() {
    let server = TestServer::start();
    let mut host = TestPeer::host(&server.url());
    let mut joiner = TestPeer::join(&server.url(), &host.session_id());
    start_match(&mut host, &mut joiner);
    joiner.poll_until("play", |g| g.phase() == ClientPhase::Playing);

    // Let player one run until somebody wins; player two's paddle is parked
    // at the centre, player one tracks the ball.
    let mut won = None;
    for _ in 0..100_000 {
        let (_, ball_y) = host.game.ball();
        host.game.move_paddle(ball_y);
        if let Some(GameEvent::MatchWon(winner)) = host.game.tick_physics() {
            won = Some(winner);
            break;
        }
    }
    assert_eq!(won, Some(PlayerSlot::One));
    assert!(!host.game.can_replay());
    host.publish();
    host.poll();

    let events = joiner.poll();
    assert!(events.contains(&GameEvent::MatchWon(PlayerSlot::One)), "{events:?}");
    assert_eq!(joiner.game.score(PlayerSlot::One), WINNING_SCORE);
    assert!(joiner.game.can_replay());

    joiner.api.reset(&joiner.session_id()).unwrap();
    joiner.game.begin_replay();

    // The winner's next publish must not put the old result back.
    host.publish();
    let state = host.api.state(&host.session_id()).unwrap();
    assert_eq!(state.winner, None);
    assert_eq!(state.p1_score, 0);
    assert!(state.countdown_active);

    let events = host.poll_until("replay countdown", |g| g.phase() == ClientPhase::Countdown);
    assert!(events.contains(&GameEvent::CountdownStarted));
    assert_eq!(host.game.winner(), None);
    assert_eq!(host.game.score(PlayerSlot::One), 0);

    host.poll_until("replay", |g| g.phase() == ClientPhase::Playing);
    host.publish();
    joiner.poll_until("replay", |g| g.phase() == ClientPhase::Playing);
}

#[test]
fn missing_session_is_not_found() {
    let server = TestServer::start();
    let api = ApiClient::new(&server.url()).unwrap();
    match api.state("doesnotexist") {
        Err(ClientError::Status { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "Session not found");
        }
        other => panic!("expected 404, got {other:?}"),
    }
}

#[test]
fn bots_play_a_full_match() {
    let server = TestServer::start();
    let (host_report, joiner_report) = play_bots(&server, 1);

    assert_eq!(host_report.winner, PlayerSlot::One);
    assert_eq!(host_report.p1_score, WINNING_SCORE);
    assert_eq!(joiner_report.player, PlayerSlot::Two);
    assert_eq!(joiner_report.winner, PlayerSlot::One);
    assert_eq!(joiner_report.p1_score, WINNING_SCORE);
    assert_eq!(joiner_report.session_id, host_report.session_id);
}

#[test]
fn bots_replay_when_asked() {
    let server = TestServer::start();
    let (host_report, joiner_report) = play_bots(&server, 2);
    assert_eq!(host_report.matches_played, 2);
    assert_eq!(joiner_report.matches_played, 2);
    assert_eq!(joiner_report.winner, PlayerSlot::One);
}

#[test]
fn start_survives_store_outage() {
    let backend = FlakyBackend::failing_arming_write(1);
    let server = TestServer::with_backend(backend.clone());
    let (host_report, joiner_report) = play_bots(&server, 1);

    assert_eq!(backend.failures(), 1);
    assert_eq!(host_report.winner, PlayerSlot::One);
    assert_eq!(joiner_report.winner, PlayerSlot::One);
}

#[test]
fn replay_survives_store_outage() {
    let backend = FlakyBackend::failing_arming_write(2);
    let server = TestServer::with_backend(backend.clone());
    let (host_report, joiner_report) = play_bots(&server, 2);

    assert_eq!(backend.failures(), 1);
    assert_eq!(host_report.matches_played, 2);
    assert_eq!(joiner_report.matches_played, 2);
}
