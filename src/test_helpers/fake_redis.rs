//! Minimal RESP server for exercising the Redis provider without a real
//! server.
//!
//! Understands the commands the provider and connection setup send: PING,
//! GET, SETEX, DEL and SCAN (single pass, cursor always 0). Every other
//! command, including AUTH and CLIENT SETINFO, is answered with `+OK`. TTLs
//! are accepted and ignored.

use crate::cache::providers::memory::glob_match;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

type Store = Arc<Mutex<BTreeMap<String, String>>>;

#[derive(Debug)]
pub struct FakeRedisServer {
    addr: SocketAddr,
    store: Store,
    accept_loop: JoinHandle<()>,
}

impl FakeRedisServer {
    /// A loopback port with nothing listening on it, at the time of the call
    pub async fn unused_port() -> std::io::Result<u16> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        Ok(listener.local_addr()?.port())
    }

    pub async fn start() -> std::io::Result<Self> {
        Self::start_on(0).await
    }

    pub async fn start_on(port: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let addr = listener.local_addr()?;
        let store: Store = Arc::default();

        let accept_store = Arc::clone(&store);
        let accept_loop = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket, Arc::clone(&accept_store)));
            }
        });

        Ok(Self {
            addr,
            store,
            accept_loop,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn keys(&self) -> Vec<String> {
        self.store.lock().keys().cloned().collect()
    }
}

impl Drop for FakeRedisServer {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn serve(mut socket: TcpStream, store: Store) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        while let Some((command, consumed)) = parse_command(&buffer) {
            buffer.drain(..consumed);
            let reply = respond(&command, &store);
            if socket.write_all(reply.as_bytes()).await.is_err() {
                return;
            }
        }

        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
    }
}

/// One `*N` array of bulk strings, with the number of bytes it used
fn parse_command(buffer: &[u8]) -> Option<(Vec<String>, usize)> {
    let mut pos = 0;
    let count: usize = read_line(buffer, &mut pos)?.strip_prefix('*')?.parse().ok()?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let len: usize = read_line(buffer, &mut pos)?.strip_prefix('$')?.parse().ok()?;
        if buffer.len() < pos + len + 2 {
            return None;
        }
        args.push(String::from_utf8_lossy(&buffer[pos..pos + len]).into_owned());
        pos += len + 2;
    }

    Some((args, pos))
}

fn read_line<'a>(buffer: &'a [u8], pos: &mut usize) -> Option<&'a str> {
    let rest = buffer.get(*pos..)?;
    let end = rest.windows(2).position(|w| w == b"\r\n")?;
    let line = std::str::from_utf8(&rest[..end]).ok()?;
    *pos += end + 2;
    Some(line)
}

fn bulk(value: &str) -> String {
    format!("${}\r\n{}\r\n", value.len(), value)
}

fn respond(args: &[String], store: &Store) -> String {
    let name = args.first().map(|a| a.to_ascii_uppercase()).unwrap_or_default();
    let mut store = store.lock();

    match (name.as_str(), args) {
        ("PING", _) => "+PONG\r\n".to_string(),
        ("GET", [_, key]) => store
            .get(key)
            .map(|value| bulk(value))
            .unwrap_or_else(|| "$-1\r\n".to_string()),
        ("SETEX", [_, key, _ttl, value]) => {
            store.insert(key.clone(), value.clone());
            "+OK\r\n".to_string()
        }
        ("DEL", [_, keys @ ..]) => {
            let removed = keys.iter().filter(|key| store.remove(*key).is_some()).count();
            format!(":{removed}\r\n")
        }
        ("SCAN", [_, _cursor, rest @ ..]) => {
            let pattern = match rest {
                [flag, pattern, ..] if flag.eq_ignore_ascii_case("MATCH") => pattern.as_str(),
                _ => "*",
            };
            let keys: Vec<&String> = store.keys().filter(|k| glob_match(pattern, k)).collect();
            let mut reply = format!("*2\r\n{}*{}\r\n", bulk("0"), keys.len());
            for key in keys {
                reply.push_str(&bulk(key));
            }
            reply
        }
        _ => "+OK\r\n".to_string(),
    }
}
