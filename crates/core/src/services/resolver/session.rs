use std::collections::{HashMap, HashSet};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::protocol::{self, methods, CallHierarchyItem, Message, OutgoingCall, ResponseError};
use super::transport::{self, FrameError};
use super::{CallResolver, ResolverConfig};
use crate::index::Position;
use crate::model::KnownNames;

/// Upper bound on the `shutdown` round trip during teardown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to start analysis server `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("analysis server handshake failed: {0}")]
    Handshake(#[source] Box<SessionError>),
    #[error("`{method}` timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },
    #[error("analysis server error {code}: {message}")]
    Server { code: i64, message: String },
    #[error("malformed `{method}` response: {detail}")]
    Malformed { method: String, detail: String },
    #[error("document not registered: {0}")]
    DocumentNotRegistered(PathBuf),
    #[error("path cannot be expressed as a file URI: {0}")]
    InvalidPath(PathBuf),
    #[error("connection to analysis server closed")]
    TransportClosed,
    #[error("session is closed")]
    Closed,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SessionError {
    /// Whether the session can no longer serve queries after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Spawn { .. }
                | SessionError::Handshake(_)
                | SessionError::TransportClosed
                | SessionError::Closed
                | SessionError::Io(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Handshaking,
    Ready,
    Closed,
}

type Reply = Result<Value, ResponseError>;

#[derive(Default)]
struct Pending {
    closed: bool,
    waiters: HashMap<u64, Sender<Reply>>,
}

/// State shared between the session and its reader thread.
struct Shared {
    pending: Mutex<Pending>,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn send(&self, message: &Value) -> Result<(), SessionError> {
        let mut writer = lock(&self.writer);
        let Some(out) = writer.as_mut() else {
            return Err(SessionError::TransportClosed);
        };
        if let Err(err) = transport::write_message(out, message) {
            debug!(error = %err, "write to analysis server failed");
            *writer = None;
            drop(writer);
            self.fail_pending();
            return Err(SessionError::TransportClosed);
        }
        Ok(())
    }

    /// Mark the connection closed and wake every waiter.
    fn fail_pending(&self) {
        let mut pending = lock(&self.pending);
        pending.closed = true;
        // Dropping the senders disconnects each waiting receiver.
        pending.waiters.clear();
    }

    fn is_closed(&self) -> bool {
        lock(&self.pending).closed
    }

    fn dispatch(&self, value: Value) {
        match Message::classify(value) {
            Some(Message::Response { id: Some(id), result }) => {
                let waiter = lock(&self.pending).waiters.remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(result);
                    }
                    None => debug!(id, "response for an abandoned request"),
                }
            }
            Some(Message::Response { id: None, .. }) => {
                warn!("response with an id this session never issued");
            }
            Some(Message::Request { id, method, .. }) => {
                debug!(%method, "declining server request");
                let reply = protocol::error_response(
                    id,
                    protocol::METHOD_NOT_FOUND,
                    format!("method not supported: {method}"),
                );
                if let Err(err) = self.send(&reply) {
                    debug!(error = %err, "could not answer server request");
                }
            }
            Some(Message::Notification { method, .. }) => {
                debug!(%method, "server notification");
            }
            None => warn!("unrecognized message from analysis server"),
        }
    }
}

fn reader_loop(mut reader: BufReader<Box<dyn Read + Send>>, shared: Arc<Shared>) {
    loop {
        match transport::read_message(&mut reader) {
            Ok(Some(value)) => shared.dispatch(value),
            Ok(None) => {
                debug!("analysis server closed its output");
                break;
            }
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "discarding malformed frame");
            }
            Err(FrameError::Io(err)) => {
                debug!(error = %err, "analysis server stream failed");
                break;
            }
            Err(err) => {
                warn!(error = %err, "lost framing with analysis server");
                break;
            }
        }
    }
    shared.fail_pending();
}

fn forward_stderr(stderr: ChildStderr) {
    let spawned = thread::Builder::new().name("callmap-resolver-stderr".into()).spawn(move || {
        for line in BufReader::new(stderr).lines() {
            match line {
                Ok(line) => debug!(target: "callmap::resolver::stderr", "{line}"),
                Err(_) => break,
            }
        }
    });
    if let Err(err) = spawned {
        warn!(error = %err, "could not forward analysis server stderr");
    }
}

fn document_uri(path: &Path) -> Result<Url, SessionError> {
    protocol::file_uri(path).ok_or_else(|| SessionError::InvalidPath(path.to_path_buf()))
}

/// A live connection to one code-analysis server.
///
/// Requests may be issued from several threads; responses are matched to
/// their request by id. Dropping the session tears the server down.
pub struct ResolverSession {
    shared: Arc<Shared>,
    next_id: AtomicU64,
    state: Mutex<SessionState>,
    child: Mutex<Option<Child>>,
    documents: Mutex<HashSet<PathBuf>>,
    timeout: Duration,
    language_id: String,
}

impl ResolverSession {
    /// Spawn the configured server rooted at `root` and complete the handshake.
    pub fn start(config: &ResolverConfig, root: &Path) -> Result<Self, SessionError> {
        let program = config.resolved_program();
        debug!(%program, root = %root.display(), "starting analysis server");

        let mut child = Command::new(&program)
            .args(&config.args)
            .current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SessionError::Spawn { program: program.clone(), source })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SessionError::Spawn {
                program,
                source: io::Error::new(io::ErrorKind::BrokenPipe, "stdio pipes unavailable"),
            });
        };
        if let Some(stderr) = child.stderr.take() {
            forward_stderr(stderr);
        }
        info!(pid = child.id(), %program, "analysis server started");

        let session = Self::connect(Box::new(stdout), Box::new(stdin), Some(child), config)?;
        session.handshake(root)?;
        Ok(session)
    }

    /// Run the session over an already-connected byte stream pair.
    pub fn with_transport<R, W>(
        reader: R,
        writer: W,
        root: &Path,
        config: &ResolverConfig,
    ) -> Result<Self, SessionError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let session = Self::connect(Box::new(reader), Box::new(writer), None, config)?;
        session.handshake(root)?;
        Ok(session)
    }

    fn connect(
        reader: Box<dyn Read + Send>,
        writer: Box<dyn Write + Send>,
        child: Option<Child>,
        config: &ResolverConfig,
    ) -> Result<Self, SessionError> {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending::default()),
            writer: Mutex::new(Some(writer)),
        });

        let reader = BufReader::new(reader);
        let for_reader = Arc::clone(&shared);
        let spawned = thread::Builder::new()
            .name("callmap-resolver-reader".into())
            .spawn(move || reader_loop(reader, for_reader));
        if let Err(err) = spawned {
            if let Some(mut child) = child {
                let _ = child.kill();
                let _ = child.wait();
            }
            return Err(err.into());
        }

        Ok(Self {
            shared,
            next_id: AtomicU64::new(1),
            state: Mutex::new(SessionState::Starting),
            child: Mutex::new(child),
            documents: Mutex::new(HashSet::new()),
            timeout: config.request_timeout(),
            language_id: config.language_id.clone(),
        })
    }

    fn handshake(&self, root: &Path) -> Result<(), SessionError> {
        self.set_state(SessionState::Handshaking);
        let result = self.try_handshake(root);
        if let Err(err) = result {
            self.terminate();
            return Err(SessionError::Handshake(Box::new(err)));
        }
        self.set_state(SessionState::Ready);
        Ok(())
    }

    fn try_handshake(&self, root: &Path) -> Result<(), SessionError> {
        let root_uri = document_uri(root)?;
        let params = protocol::initialize_params(&root_uri, std::process::id());
        let result = self.request(methods::INITIALIZE, params, self.timeout)?;

        let server = result
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        if result.pointer("/capabilities/callHierarchyProvider").is_none() {
            warn!(%server, "server does not advertise call hierarchy support");
        }
        self.notify(methods::INITIALIZED, json!({}))?;
        info!(%server, "analysis server ready");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    fn set_state(&self, next: SessionState) {
        let mut state = lock(&self.state);
        debug!(from = ?*state, to = ?next, "session state");
        *state = next;
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Ready => Ok(()),
            SessionState::Closed => Err(SessionError::Closed),
            _ => Err(SessionError::TransportClosed),
        }
    }

    fn request(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, SessionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = bounded(1);
        {
            let mut pending = lock(&self.shared.pending);
            if pending.closed {
                return Err(SessionError::TransportClosed);
            }
            pending.waiters.insert(id, tx);
        }

        if let Err(err) = self.shared.send(&protocol::request(id, method, params)) {
            lock(&self.shared.pending).waiters.remove(&id);
            return Err(err);
        }

        match rx.recv_timeout(timeout) {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => {
                Err(SessionError::Server { code: error.code, message: error.message })
            }
            Err(RecvTimeoutError::Timeout) => {
                lock(&self.shared.pending).waiters.remove(&id);
                Err(SessionError::Timeout { method: method.to_string(), timeout })
            }
            Err(RecvTimeoutError::Disconnected) => Err(SessionError::TransportClosed),
        }
    }

    fn notify(&self, method: &str, params: Value) -> Result<(), SessionError> {
        self.shared.send(&protocol::notification(method, params))
    }

    /// Open a document on the server. Registering the same path twice is a no-op.
    pub fn register_document(&self, path: &Path, text: &str) -> Result<(), SessionError> {
        self.ensure_ready()?;
        if lock(&self.documents).contains(path) {
            debug!(file = %path.display(), "document already registered");
            return Ok(());
        }
        let uri = document_uri(path)?;
        let params = protocol::did_open_params(&uri, &self.language_id, 1, text);
        self.notify(methods::DID_OPEN, params)?;
        lock(&self.documents).insert(path.to_path_buf());
        Ok(())
    }

    pub fn is_registered(&self, path: &Path) -> bool {
        lock(&self.documents).contains(path)
    }

    /// Call hierarchy items at a position. A `null` result yields no items.
    pub fn prepare_call_hierarchy(
        &self,
        path: &Path,
        position: Position,
    ) -> Result<Vec<CallHierarchyItem>, SessionError> {
        self.ensure_ready()?;
        if !self.is_registered(path) {
            return Err(SessionError::DocumentNotRegistered(path.to_path_buf()));
        }
        let uri = document_uri(path)?;
        let result = self.request(
            methods::PREPARE_CALL_HIERARCHY,
            protocol::position_params(&uri, position),
            self.timeout,
        )?;
        decode_list(methods::PREPARE_CALL_HIERARCHY, result)
    }

    /// Outgoing calls of an item previously returned by the server.
    pub fn outgoing_calls(
        &self,
        item: &CallHierarchyItem,
    ) -> Result<Vec<OutgoingCall>, SessionError> {
        self.ensure_ready()?;
        let result = self.request(methods::OUTGOING_CALLS, json!({ "item": item }), self.timeout)?;
        decode_list(methods::OUTGOING_CALLS, result)
    }

    /// Best-effort `shutdown`/`exit`, then release the transport and reap the
    /// server. Safe to call more than once.
    pub fn close(&self) {
        {
            let mut state = lock(&self.state);
            if *state == SessionState::Closed {
                return;
            }
            *state = SessionState::Closed;
        }
        if !self.shared.is_closed() {
            let grace = self.timeout.min(SHUTDOWN_GRACE);
            match self.request(methods::SHUTDOWN, Value::Null, grace) {
                Ok(_) => {
                    if let Err(err) = self.notify(methods::EXIT, Value::Null) {
                        debug!(error = %err, "exit notification not delivered");
                    }
                }
                Err(err) => debug!(error = %err, "shutdown not acknowledged"),
            }
        }
        self.terminate();
    }

    fn terminate(&self) {
        *lock(&self.state) = SessionState::Closed;
        lock(&self.shared.writer).take();
        self.shared.fail_pending();
        if let Some(mut child) = lock(&self.child).take() {
            if let Err(err) = child.kill() {
                debug!(error = %err, "analysis server already exited");
            }
            match child.wait() {
                Ok(status) => debug!(%status, "analysis server reaped"),
                Err(err) => warn!(error = %err, "failed to reap analysis server"),
            }
        }
    }
}

impl Drop for ResolverSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl CallResolver for ResolverSession {
    fn register_document(&self, path: &Path, text: &str) -> Result<(), SessionError> {
        ResolverSession::register_document(self, path, text)
    }

    fn resolve_callees(
        &self,
        path: &Path,
        position: Position,
        known: &KnownNames,
    ) -> Result<Vec<String>, SessionError> {
        let items = self.prepare_call_hierarchy(path, position)?;
        let Some(item) = items.first() else {
            return Ok(Vec::new());
        };
        let mut callees: Vec<String> = Vec::new();
        for call in self.outgoing_calls(item)? {
            if known.contains(&call.to.name) && !callees.contains(&call.to.name) {
                callees.push(call.to.name);
            }
        }
        Ok(callees)
    }
}

fn decode_list<T: serde::de::DeserializeOwned>(
    method: &str,
    result: Value,
) -> Result<Vec<T>, SessionError> {
    if result.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(result).map_err(|err| SessionError::Malformed {
        method: method.to_string(),
        detail: err.to_string(),
    })
}
