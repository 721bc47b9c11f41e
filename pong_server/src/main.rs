// CLI entry point for the pong session server.
//
// Reads `ServerConfig` from the environment (see `config.rs` for the
// variable list), applies command-line overrides, and serves until the
// process is killed.
//
// Usage:
//   pong-server [OPTIONS]
//     --port <PORT>       Listen port (default: 8080, or PONG_PORT)
//     --bind <ADDR>       Bind address (default: 127.0.0.1, or PONG_BIND)
//     --memory-store      Keep sessions in process instead of Redis
//
// Log verbosity follows RUST_LOG (default `info`).

use pong_server::{ServerConfig, build_router, start_server};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    let config = parse_args(config);

    let router = build_router(&config);
    let (handle, addr) = match start_server(&config.bind, config.port, router) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to start server: {e}");
            std::process::exit(1);
        }
    };

    println!("Pong server listening on http://{addr}/");
    println!("Press Ctrl+C to stop.");

    // The process exits on SIGINT/SIGTERM; the listener thread never
    // returns on its own.
    handle.wait();
}

/// Apply command-line overrides on top of the environment configuration.
fn parse_args(mut config: ServerConfig) -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                config.port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--port requires a valid port number");
                    std::process::exit(1);
                });
            }
            "--bind" => {
                i += 1;
                config.bind = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--bind requires an address");
                    std::process::exit(1);
                });
            }
            "--memory-store" => config.memory_store = true,
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

    config
}

fn print_usage() {
    println!("Usage: pong-server [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --port <PORT>       Listen port (default: 8080)");
    println!("  --bind <ADDR>       Bind address (default: 127.0.0.1)");
    println!("  --memory-store      Keep sessions in process instead of Redis");
    println!("  --help, -h          Show this help");
    println!();
    println!("Environment: PONG_PORT, PONG_BIND, PONG_SESSION_TTL_SECS, REDIS_HOST,");
    println!("REDIS_PORT, REDIS_USERNAME, REDIS_PASSWORD, REDIS_TLS,");
    println!("REDIS_CONNECT_TIMEOUT_MS, REDIS_RETRY_SECS. Log level: RUST_LOG.");
}
