//! In-memory analysis server for driving `ResolverSession` in tests.
#![allow(dead_code)]

use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use callmap_core::services::resolver::transport::{read_message, write_message};
use callmap_core::services::resolver::{ResolverConfig, ResolverSession, SessionError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::{json, Value};

/// One direction of an in-memory byte pipe.
pub struct PipeWriter {
    tx: Sender<Vec<u8>>,
}

pub struct PipeReader {
    rx: Receiver<Vec<u8>>,
    buf: Vec<u8>,
    pos: usize,
}

pub fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = unbounded();
    (PipeWriter { tx }, PipeReader { rx, buf: Vec::new(), pos: 0 })
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for PipeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.buf.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.buf = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// How the fake server answers one request.
pub enum Reply {
    /// Standard answer: capabilities for `initialize`, `null` otherwise.
    Default,
    Result(Value),
    Error(i64, &'static str),
    /// Never answer.
    Ignore,
    /// Hold the answer until a second one is held, then send both in
    /// reverse order.
    Hold(Value),
    /// Close both pipes.
    Hangup,
}

pub struct FakeServer {
    /// Every message the client sent, in arrival order.
    pub received: Arc<Mutex<Vec<Value>>>,
    handle: Option<JoinHandle<()>>,
}

impl FakeServer {
    pub fn methods(&self) -> Vec<String> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| m["method"].as_str().map(str::to_string))
            .collect()
    }

    /// Wait for the server to exit and return the methods it saw.
    pub fn join(mut self) -> Vec<String> {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("fake server thread");
        }
        self.methods()
    }
}

pub struct Options {
    /// Send a server-initiated request before answering `initialize`.
    pub ask_configuration: bool,
    pub timeout_ms: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self { ask_configuration: false, timeout_ms: 5_000 }
    }
}

pub fn workspace_root() -> PathBuf {
    std::env::temp_dir().join("callmap-fake-workspace")
}

pub fn doc_path(name: &str) -> PathBuf {
    workspace_root().join(name)
}

pub fn config(timeout_ms: u64) -> ResolverConfig {
    ResolverConfig { request_timeout_ms: timeout_ms, ..ResolverConfig::default() }
}

/// Start a fake server and connect a session to it.
pub fn connect<F>(
    options: Options,
    handler: F,
) -> (Result<ResolverSession, SessionError>, FakeServer)
where
    F: FnMut(&str, &Value) -> Reply + Send + 'static,
{
    let (client_out, server_in) = pipe();
    let (server_out, client_in) = pipe();
    let received = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&received);
    let ask = options.ask_configuration;
    let handle = thread::spawn(move || serve(server_in, server_out, log, ask, handler));

    let config = config(options.timeout_ms);
    let session =
        ResolverSession::with_transport(client_in, client_out, &workspace_root(), &config);
    (session, FakeServer { received, handle: Some(handle) })
}

fn serve<F>(
    input: PipeReader,
    mut output: PipeWriter,
    log: Arc<Mutex<Vec<Value>>>,
    ask_configuration: bool,
    mut handler: F,
)
where
    F: FnMut(&str, &Value) -> Reply,
{
    let mut reader = BufReader::new(input);
    let mut held: Vec<Value> = Vec::new();

    while let Ok(Some(msg)) = read_message(&mut reader) {
        log.lock().unwrap().push(msg.clone());
        let Some(method) = msg["method"].as_str().map(str::to_string) else { continue };
        if method == "exit" {
            break;
        }
        let reply = handler(&method, &msg["params"]);
        let Some(id) = msg.get("id").cloned() else { continue };

        let result = match reply {
            Reply::Default => match method.as_str() {
                "initialize" => json!({
                    "capabilities": { "callHierarchyProvider": true },
                    "serverInfo": { "name": "fake" },
                }),
                _ => Value::Null,
            },
            Reply::Result(value) => value,
            Reply::Error(code, message) => {
                let body = json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": code, "message": message},
                });
                if write_message(&mut output, &body).is_err() {
                    break;
                }
                continue;
            }
            Reply::Ignore => continue,
            Reply::Hold(value) => {
                held.push(json!({"jsonrpc": "2.0", "id": id, "result": value}));
                if held.len() == 2 {
                    for body in held.drain(..).rev() {
                        if write_message(&mut output, &body).is_err() {
                            return;
                        }
                    }
                }
                continue;
            }
            Reply::Hangup => break,
        };

        if ask_configuration && method == "initialize" {
            let request = json!({
                "jsonrpc": "2.0",
                "id": "config-1",
                "method": "workspace/configuration",
                "params": {"items": []},
            });
            if write_message(&mut output, &request).is_err() {
                break;
            }
        }
        let response = json!({"jsonrpc": "2.0", "id": id, "result": result});
        if write_message(&mut output, &response).is_err() {
            break;
        }
    }
}

/// A call hierarchy item as a server would send it.
pub fn item(name: &str) -> Value {
    json!({
        "name": name,
        "kind": 12,
        "uri": "file:///callmap-fake-workspace/lib.rs",
        "range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 1}},
        "selectionRange": {
            "start": {"line": 0, "character": 0},
            "end": {"line": 0, "character": 1},
        },
        "data": {"token": name},
    })
}

pub fn outgoing(names: &[&str]) -> Value {
    Value::Array(names.iter().map(|n| json!({"to": item(n), "fromRanges": []})).collect())
}
