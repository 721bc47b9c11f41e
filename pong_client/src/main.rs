// CLI entry point for the headless pong bot.
//
// Without `--join` the bot creates a match, prints its session id, and plays
// as player one; start a second bot with `--join <ID>` (or open the server's
// page in a browser and join there) to play against it.
//
// Usage:
//   pong-bot [OPTIONS]
//     --server <URL>        Handler address (default: http://127.0.0.1:8080)
//     --join <ID>           Join this session as player two
//     --tick-ms <N>         Timer period in milliseconds (default: 50)
//     --parked              Never move the paddle
//     --matches <N>         Matches to play, replaying in between (default: 1)
//     --time-limit <SECS>   Give up after this many seconds
//
// Log verbosity follows RUST_LOG (default `info`).

use std::time::Duration;

use pong_client::{ApiClient, MatchRunner, PaddleBrain, RunnerOptions};
use tracing_subscriber::EnvFilter;

struct BotArgs {
    server: String,
    join: Option<String>,
    options: RunnerOptions,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args();
    let api = match ApiClient::new(&args.server) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let runner = match &args.join {
        Some(id) => MatchRunner::join(api, id, args.options),
        None => MatchRunner::host(api, args.options),
    };
    let mut runner = match runner {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Failed to enter a match: {e}");
            std::process::exit(1);
        }
    };

    if args.join.is_none() {
        println!("Session id: {}", runner.session_id());
        println!("Waiting for player two to join...");
    }

    match runner.run() {
        Ok(report) => {
            println!(
                "{} wins {}-{} (played {} match(es) as {})",
                report.winner, report.p1_score, report.p2_score, report.matches_played, report.player
            );
        }
        Err(e) => {
            eprintln!("Match aborted: {e}");
            std::process::exit(1);
        }
    }
}

fn parse_args() -> BotArgs {
    let mut args = BotArgs {
        server: "http://127.0.0.1:8080".into(),
        join: None,
        options: RunnerOptions::default(),
    };
    let argv: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < argv.len() {
        match argv[i].as_str() {
            "--server" => {
                i += 1;
                args.server = argv.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--server requires a URL");
                    std::process::exit(1);
                });
            }
            "--join" => {
                i += 1;
                args.join = argv.get(i).cloned().or_else(|| {
                    eprintln!("--join requires a session id");
                    std::process::exit(1);
                });
            }
            "--tick-ms" => {
                i += 1;
                let ms: u64 = argv
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .filter(|&ms| ms > 0)
                    .unwrap_or_else(|| {
                        eprintln!("--tick-ms requires a positive number");
                        std::process::exit(1);
                    });
                args.options.tick = Duration::from_millis(ms);
            }
            "--parked" => args.options.brain = PaddleBrain::Parked,
            "--matches" => {
                i += 1;
                args.options.matches = argv
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .filter(|&n| n > 0)
                    .unwrap_or_else(|| {
                        eprintln!("--matches requires a positive number");
                        std::process::exit(1);
                    });
            }
            "--time-limit" => {
                i += 1;
                let secs: u64 = argv.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--time-limit requires a number of seconds");
                    std::process::exit(1);
                });
                args.options.time_limit = Some(Duration::from_secs(secs));
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    args
}

fn print_usage() {
    println!("Usage: pong-bot [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --server <URL>        Handler address (default: http://127.0.0.1:8080)");
    println!("  --join <ID>           Join this session as player two");
    println!("  --tick-ms <N>         Timer period in milliseconds (default: 50)");
    println!("  --parked              Never move the paddle");
    println!("  --matches <N>         Matches to play, replaying in between (default: 1)");
    println!("  --time-limit <SECS>   Give up after this many seconds");
    println!("  --help, -h            Show this help");
}
