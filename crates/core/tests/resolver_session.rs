mod common;

use std::collections::BTreeSet;
use std::thread;
use std::time::{Duration, Instant};

use callmap_core::index::Position;
use callmap_core::services::resolver::{
    CallResolver, ResolverConfig, ResolverSession, SessionError, SessionState,
};
use common::{connect, doc_path, item, outgoing, Options, Reply};
use serde_json::{json, Value};

fn known(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn handshake_then_resolve_known_callees() {
    let (session, server) = connect(Options::default(), |method, params| match method {
        "textDocument/prepareCallHierarchy" => {
            Reply::Result(json!([item("caller"), item("other")]))
        }
        "callHierarchy/outgoingCalls" => {
            // The item must come back exactly as it was handed out.
            assert_eq!(params["item"], item("caller"));
            Reply::Result(outgoing(&["helper", "println", "helper", "caller"]))
        }
        _ => Reply::Default,
    });
    let session = session.expect("session");
    assert_eq!(session.state(), SessionState::Ready);

    let path = doc_path("lib.rs");
    session.register_document(&path, "fn caller() { helper(); }\nfn helper() {}\n").unwrap();
    let callees = session
        .resolve_callees(&path, Position::new(0, 3), &known(&["caller", "helper"]))
        .expect("resolve");
    assert_eq!(callees, vec!["helper", "caller"]);

    session.close();
    server.join();
}

#[test]
fn handshake_sends_initialize_then_initialized() {
    let (session, server) = connect(Options::default(), |_, _| Reply::Default);
    let session = session.expect("session");
    session.close();

    let init = server.received.lock().unwrap()[0].clone();
    assert!(init["params"]["capabilities"]["textDocument"]["callHierarchy"].is_object());
    assert!(init["params"]["rootUri"].as_str().unwrap().starts_with("file://"));

    let methods = server.join();
    assert_eq!(&methods[..2], &["initialize", "initialized"]);
    assert!(methods.contains(&"shutdown".to_string()));
    assert_eq!(methods.last().map(String::as_str), Some("exit"));
}

#[test]
fn zero_items_means_no_edges() {
    let mut calls = 0;
    let (session, server) = connect(Options::default(), move |method, _| match method {
        "textDocument/prepareCallHierarchy" => {
            calls += 1;
            if calls == 1 {
                Reply::Result(Value::Null)
            } else {
                Reply::Result(json!([]))
            }
        }
        _ => Reply::Default,
    });
    let session = session.expect("session");
    let path = doc_path("empty.rs");
    session.register_document(&path, "").unwrap();

    let names = known(&["a"]);
    assert!(session.resolve_callees(&path, Position::new(0, 0), &names).unwrap().is_empty());
    assert!(session.resolve_callees(&path, Position::new(0, 0), &names).unwrap().is_empty());
    drop(session);
    server.join();
}

#[test]
fn query_timeout_leaves_session_usable() {
    let mut first = true;
    let options = Options { timeout_ms: 200, ..Options::default() };
    let (session, server) = connect(options, move |method, _| match method {
        "textDocument/prepareCallHierarchy" if first => {
            first = false;
            Reply::Ignore
        }
        "textDocument/prepareCallHierarchy" => Reply::Result(json!([item("a")])),
        _ => Reply::Default,
    });
    let session = session.expect("session");
    let path = doc_path("slow.rs");
    session.register_document(&path, "fn a() {}").unwrap();

    let err = session.prepare_call_hierarchy(&path, Position::new(0, 3)).unwrap_err();
    assert!(matches!(err, SessionError::Timeout { .. }), "got {err:?}");
    assert!(!err.is_fatal());

    let items = session.prepare_call_hierarchy(&path, Position::new(0, 3)).expect("second query");
    assert_eq!(items[0].name, "a");
    session.close();
    server.join();
}

#[test]
fn server_error_is_a_per_query_failure() {
    let (session, server) = connect(Options::default(), |method, _| match method {
        "textDocument/prepareCallHierarchy" => Reply::Error(-32603, "internal"),
        _ => Reply::Default,
    });
    let session = session.expect("session");
    let path = doc_path("err.rs");
    session.register_document(&path, "fn a() {}").unwrap();

    match session.prepare_call_hierarchy(&path, Position::new(0, 3)) {
        Err(SessionError::Server { code, message }) => {
            assert_eq!(code, -32603);
            assert_eq!(message, "internal");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Ready);
    session.close();
    server.join();
}

#[test]
fn malformed_result_is_reported() {
    let (session, server) = connect(Options::default(), |method, _| match method {
        "textDocument/prepareCallHierarchy" => Reply::Result(json!({"not": "a list"})),
        _ => Reply::Default,
    });
    let session = session.expect("session");
    let path = doc_path("bad.rs");
    session.register_document(&path, "fn a() {}").unwrap();

    let err = session.prepare_call_hierarchy(&path, Position::new(0, 3)).unwrap_err();
    assert!(matches!(err, SessionError::Malformed { .. }), "got {err:?}");
    session.close();
    server.join();
}

#[test]
fn transport_closed_fails_every_later_query_promptly() {
    let options = Options { timeout_ms: 10_000, ..Options::default() };
    let (session, server) = connect(options, |method, _| match method {
        "textDocument/prepareCallHierarchy" => Reply::Hangup,
        _ => Reply::Default,
    });
    let session = session.expect("session");
    let path = doc_path("gone.rs");
    session.register_document(&path, "fn a() {}").unwrap();

    let started = Instant::now();
    let err = session.prepare_call_hierarchy(&path, Position::new(0, 3)).unwrap_err();
    assert!(matches!(err, SessionError::TransportClosed), "got {err:?}");
    assert!(err.is_fatal());

    let err = session.prepare_call_hierarchy(&path, Position::new(0, 3)).unwrap_err();
    assert!(matches!(err, SessionError::TransportClosed), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));

    session.close();
    session.close();
    server.join();
}

#[test]
fn closing_twice_is_safe_and_queries_then_fail() {
    let (session, server) = connect(Options::default(), |_, _| Reply::Default);
    let session = session.expect("session");
    session.close();
    session.close();
    assert_eq!(session.state(), SessionState::Closed);

    let err = session.register_document(&doc_path("late.rs"), "").unwrap_err();
    assert!(matches!(err, SessionError::Closed));
    let shutdowns = server.join().iter().filter(|m| *m == "shutdown").count();
    assert_eq!(shutdowns, 1);
}

#[test]
fn query_against_unregistered_document_is_rejected() {
    let (session, server) = connect(Options::default(), |_, _| Reply::Default);
    let session = session.expect("session");
    let err =
        session.prepare_call_hierarchy(&doc_path("never.rs"), Position::new(0, 0)).unwrap_err();
    assert!(matches!(err, SessionError::DocumentNotRegistered(_)));
    session.close();
    server.join();
}

#[test]
fn failed_handshake_fails_session_creation() {
    let (session, server) = connect(Options::default(), |method, _| match method {
        "initialize" => Reply::Error(-32002, "not ready"),
        _ => Reply::Default,
    });
    match session {
        Err(SessionError::Handshake(inner)) => {
            assert!(matches!(*inner, SessionError::Server { code: -32002, .. }));
        }
        Err(other) => panic!("unexpected {other:?}"),
        Ok(_) => panic!("handshake should fail"),
    }
    assert!(!server.join().contains(&"initialized".to_string()));
}

#[test]
fn server_requests_are_declined() {
    let options = Options { ask_configuration: true, ..Options::default() };
    let (session, server) = connect(options, |_, _| Reply::Default);
    let session = session.expect("session");
    let path = doc_path("config.rs");
    session.register_document(&path, "").unwrap();
    // One more round trip so the server has read everything sent before it.
    session.prepare_call_hierarchy(&path, Position::new(0, 0)).unwrap();

    let received = server.received.lock().unwrap().clone();
    let answer = received.iter().find(|m| m["id"] == "config-1").expect("request answered");
    assert_eq!(answer["error"]["code"], -32601);
    session.close();
    server.join();
}

#[test]
fn concurrent_queries_are_matched_by_id() {
    let (session, server) = connect(Options::default(), |method, params| match method {
        "textDocument/prepareCallHierarchy" => {
            let line = params["position"]["line"].as_u64().unwrap_or(0);
            Reply::Hold(json!([item(&format!("f{line}"))]))
        }
        _ => Reply::Default,
    });
    let session = session.expect("session");
    let path = doc_path("pair.rs");
    session.register_document(&path, "fn f0() {}\nfn f1() {}\n").unwrap();

    let (first, second) = std::thread::scope(|scope| {
        let a = scope.spawn(|| session.prepare_call_hierarchy(&path, Position::new(0, 3)));
        let b = scope.spawn(|| session.prepare_call_hierarchy(&path, Position::new(1, 3)));
        (a.join().unwrap(), b.join().unwrap())
    });
    assert_eq!(first.unwrap()[0].name, "f0");
    assert_eq!(second.unwrap()[0].name, "f1");
    session.close();
    server.join();
}

#[test]
fn missing_program_is_a_spawn_error() {
    let config = ResolverConfig {
        program: "/nonexistent/callmap-no-such-server".to_string(),
        ..ResolverConfig::default()
    };
    match ResolverSession::start(&config, &std::env::temp_dir()) {
        Err(SessionError::Spawn { program, .. }) => assert!(program.contains("no-such-server")),
        Err(other) => panic!("unexpected {other:?}"),
        Ok(_) => panic!("spawn should fail"),
    }
}

#[test]
fn closing_fails_a_query_in_flight() {
    let options = Options { timeout_ms: 20_000, ..Options::default() };
    let (session, server) = connect(options, |method, _| match method {
        "textDocument/prepareCallHierarchy" => Reply::Ignore,
        _ => Reply::Default,
    });
    let session = session.expect("session");
    let path = doc_path("lib.rs");
    session.register_document(&path, "fn caller() {}\n").unwrap();

    let started = Instant::now();
    let result = thread::scope(|scope| {
        let query = scope.spawn(|| session.prepare_call_hierarchy(&path, Position::new(0, 3)));
        let deadline = Instant::now() + Duration::from_secs(5);
        while !server.methods().iter().any(|m| m == "textDocument/prepareCallHierarchy") {
            assert!(Instant::now() < deadline, "query never reached the server");
            thread::sleep(Duration::from_millis(10));
        }
        session.close();
        query.join().expect("query thread")
    });

    assert!(matches!(result, Err(SessionError::TransportClosed)));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(session.state(), SessionState::Closed);
    server.join();
}

#[cfg(unix)]
#[test]
fn silent_server_times_out_the_handshake_and_is_reaped() {
    use std::fs;
    use std::path::Path;

    let dir = tempfile::tempdir().expect("tempdir");
    let pid_file = dir.path().join("server.pid");
    let config = ResolverConfig {
        program: "sh".to_string(),
        args: vec![
            "-c".to_string(),
            format!("echo $$ > '{}'; exec sleep 100", pid_file.display()),
        ],
        request_timeout_ms: 500,
        ..ResolverConfig::default()
    };

    let started = Instant::now();
    match ResolverSession::start(&config, dir.path()) {
        Err(SessionError::Handshake(inner)) => match *inner {
            SessionError::Timeout { method, .. } => assert_eq!(method, "initialize"),
            other => panic!("unexpected {other:?}"),
        },
        Err(other) => panic!("unexpected {other:?}"),
        Ok(_) => panic!("handshake should time out"),
    }
    assert!(started.elapsed() < Duration::from_secs(10));

    let pid = fs::read_to_string(&pid_file).expect("pid written");
    let proc_entry = Path::new("/proc").join(pid.trim());
    if Path::new("/proc/self").exists() {
        assert!(!proc_entry.exists(), "server process {} still present", pid.trim());
    }
}
