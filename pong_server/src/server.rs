// HTTP server loop hosting the router.
//
// Architecture: one listener thread that owns the `Router` and handles
// requests one at a time, in arrival order. The handler core is stateless
// between requests, so there is nothing to share across threads except the
// store connection cached inside the backend.
//
// The loop uses `tiny_http::Server::recv_timeout` with a short interval so
// it can notice the `keep_running` flag (cleared by `ServerHandle::stop`)
// without a separate shutdown channel.
//
// Each request: read the body (capped at `MAX_BODY_BYTES`), hand method,
// URL, and body to `Router::handle`, write back status, headers, and body.
// A client that hangs up before the response is written only costs a debug
// log line.

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tiny_http::{Header, Request, Response, Server, StatusCode};
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::router::Router;
use crate::store::KvBackend;

/// Largest request body accepted. Session patches are a few hundred bytes.
pub const MAX_BODY_BYTES: u64 = 64 * 1024;

/// How often the loop checks `keep_running` while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Handle returned by `start_server` to control the running server.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Signal the server to stop and wait for it to shut down.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    /// Block until the server thread exits (it only does so after `stop`
    /// from another handle or a fatal accept error).
    pub fn wait(mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Bind `bind:port` and serve `router` on a background thread. Returns a
/// handle for stopping it and the bound address (useful when port 0 lets
/// the OS pick a free port).
pub fn start_server<B, C>(
    bind: &str,
    port: u16,
    router: Router<B, C>,
) -> std::io::Result<(ServerHandle, SocketAddr)>
where
    B: KvBackend + 'static,
    C: Clock + 'static,
{
    let server = Server::http(format!("{bind}:{port}")).map_err(std::io::Error::other)?;
    let addr = server.server_addr().to_ip().ok_or_else(|| {
        std::io::Error::other("server is not listening on an IP socket")
    })?;
    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_loop = keep_running.clone();

    let thread = thread::Builder::new()
        .name("pong-http".into())
        .spawn(move || run_server(server, router, keep_running_loop))?;

    info!(%addr, "pong server listening");
    Ok((
        ServerHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

/// Main request loop. Runs until `keep_running` is cleared.
fn run_server<B: KvBackend, C: Clock>(
    server: Server,
    router: Router<B, C>,
    keep_running: Arc<AtomicBool>,
) {
    while keep_running.load(Ordering::SeqCst) {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => handle_request(&router, request),
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "failed to accept request, stopping server");
                break;
            }
        }
    }
    info!("pong server stopped");
}

fn handle_request<B: KvBackend, C: Clock>(router: &Router<B, C>, mut request: Request) {
    let mut body = Vec::new();
    let read = request
        .as_reader()
        .take(MAX_BODY_BYTES + 1)
        .read_to_end(&mut body);

    let api = match read {
        Err(e) => {
            debug!(error = %e, "failed to read request body");
            return;
        }
        Ok(_) if body.len() as u64 > MAX_BODY_BYTES => {
            let mut response = Response::from_string(
                r#"{"success":false,"error":"Request body too large"}"#,
            )
            .with_status_code(StatusCode(413));
            if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
                response.add_header(header);
            }
            if let Err(e) = request.respond(response) {
                debug!(error = %e, "failed to write response");
            }
            return;
        }
        Ok(_) => {
            let method = request.method().to_string();
            router.handle(&method, request.url(), &body)
        }
    };

    let mut response = Response::from_data(api.body).with_status_code(StatusCode(api.status));
    for (name, value) in &api.headers {
        if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            response.add_header(header);
        }
    }
    if let Err(e) = request.respond(response) {
        debug!(error = %e, "failed to write response");
    }
}
