// Exercises the real `tiny_http` loop over loopback TCP: a bound server,
// hand-written HTTP/1.1 requests, and the JSON bodies that come back.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use pong_server::{
    ManualClock, MemoryBackend, RedisBackend, Router, SessionStore, Sessions, StoreConfig,
    start_server,
};
use serde_json::{Value, json};

struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn send(addr: SocketAddr, method: &str, target: &str, body: &str) -> Reply {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    write!(
        stream,
        "{method} {target} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
    .unwrap();
    stream.flush().unwrap();

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    let status: u16 = line.split_whitespace().nth(1).unwrap().parse().unwrap();

    let mut headers = Vec::new();
    loop {
        line.clear();
        reader.read_line(&mut line).unwrap();
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        let (name, value) = trimmed.split_once(':').unwrap();
        headers.push((name.trim().to_owned(), value.trim().to_owned()));
    }

    let len: usize = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("Content-Length"))
        .map(|(_, v)| v.parse().unwrap())
        .unwrap_or(0);
    let mut body = vec![0; len];
    reader.read_exact(&mut body).unwrap();

    Reply {
        status,
        headers,
        body,
    }
}

fn memory_server() -> (pong_server::ServerHandle, SocketAddr) {
    let store = SessionStore::new(MemoryBackend::new(), Duration::from_secs(3600));
    let router = Router::new(Sessions::new(store, ManualClock::new(1_000_000)));
    start_server("127.0.0.1", 0, router).unwrap()
}

#[test]
fn serves_client_page() {
    let (handle, addr) = memory_server();
    let reply = send(addr, "GET", "/", "");
    assert_eq!(reply.status, 200);
    assert!(reply.header("Content-Type").unwrap().starts_with("text/html"));
    assert!(String::from_utf8_lossy(&reply.body).contains("<canvas"));
    handle.stop();
}

#[test]
fn create_join_and_poll_over_http() {
    let (handle, addr) = memory_server();

    let created = send(addr, "POST", "/?action=create", "{}");
    assert_eq!(created.status, 200);
    assert_eq!(created.header("Access-Control-Allow-Origin"), Some("*"));
    let id = created.json()["sessionId"].as_str().unwrap().to_owned();

    let body = json!({ "sessionId": id }).to_string();
    let joined = send(addr, "POST", "/?action=join", &body);
    assert_eq!(joined.status, 200);
    assert_eq!(joined.json()["p2Connected"], true);

    let moved = json!({ "sessionId": id, "player": 2, "paddleY": 150 }).to_string();
    assert_eq!(send(addr, "POST", "/?action=update", &moved).status, 200);

    let polled = send(addr, "GET", &format!("/?action=state&sessionId={id}"), "");
    assert_eq!(polled.status, 200);
    let state = &polled.json()["state"];
    assert_eq!(state["p2Y"], 150.0);
    assert_eq!(state["p2Connected"], true);
    assert_eq!(state["gameStarted"], false);

    handle.stop();
}

#[test]
fn rejects_bad_requests() {
    let (handle, addr) = memory_server();

    let unknown = send(addr, "POST", "/?action=teleport", "{}");
    assert_eq!(unknown.status, 400);
    assert_eq!(unknown.json()["success"], false);

    assert_eq!(send(addr, "PUT", "/?action=state", "{}").status, 405);
    assert_eq!(send(addr, "GET", "/?action=create", "").status, 405);
    assert_eq!(send(addr, "POST", "/?action=state", "{not json").status, 400);

    let missing = send(
        addr,
        "POST",
        "/?action=state",
        &json!({ "sessionId": "nosuchgame" }).to_string(),
    );
    assert_eq!(missing.status, 404);
    assert_eq!(missing.json()["error"], "Session not found");

    handle.stop();
}

#[test]
fn unreachable_store_answers_503_for_create() {
    let config = StoreConfig {
        host: "127.0.0.1".into(),
        port: 1,
        connect_timeout: Duration::from_millis(300),
        ..StoreConfig::default()
    };
    let store = SessionStore::new(RedisBackend::new(config), Duration::from_secs(3600));
    let router = Router::new(Sessions::new(store, ManualClock::new(0)));
    let (handle, addr) = start_server("127.0.0.1", 0, router).unwrap();

    let reply = send(addr, "POST", "/?action=create", "{}");
    assert_eq!(reply.status, 503);
    let body = reply.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Session store unavailable");
    assert!(body["detail"].is_string());

    handle.stop();
}
