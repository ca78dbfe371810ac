// External imports
use serde_json::json;
use std::io::{ErrorKind, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::TempDir;

// Internal imports
use crate::constants::MAX_FRAME_BYTES;
use crate::forecast::{ForecastConfig, Forecaster};
use crate::model::Architecture;
use crate::server::protocol::ForecastResponse;
use crate::server::router::RequestRouter;
use crate::server::TransportServer;
use crate::util::model_store::ModelStore;

fn make_router(dir: &Path) -> RequestRouter {
    let config = ForecastConfig {
        look_back: 4,
        look_forward: 2,
        architecture: Architecture::Gru,
        hidden_size: 8,
        num_layers: 1,
        epochs: 2,
        batch_size: 2,
        learning_rate: 1e-3,
        dropout: 0.1,
    };
    let forecaster = Forecaster::new(config, ModelStore::new(dir.join("models")));
    RequestRouter::new(forecaster)
}

struct TestServer {
    dir: TempDir,
    socket_path: PathBuf,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("uds_socket");
        let server = TransportServer::bind(&socket_path, make_router(dir.path())).unwrap();
        let stop = server.stop_handle();
        let handle = thread::spawn(move || {
            server.run().unwrap();
        });
        Self {
            dir,
            socket_path,
            stop,
            handle: Some(handle),
        }
    }

    /// Fresh socket path under the server's tempdir for callback listeners.
    fn side_socket(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // The loop re-checks the flag when accept returns.
        let _ = UnixStream::connect(&self.socket_path);
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

/// Write one newline-terminated request and read the inbound reply bytes.
fn send_request(socket_path: &Path, request: &serde_json::Value) -> Vec<u8> {
    let mut conn = UnixStream::connect(socket_path).unwrap();
    conn.write_all(request.to_string().as_bytes()).unwrap();
    conn.write_all(b"\n").unwrap();
    let mut raw = Vec::new();
    conn.read_to_end(&mut raw).unwrap();
    raw
}

fn read_response(raw: &[u8]) -> ForecastResponse {
    serde_json::from_slice(raw).unwrap()
}

fn observations(values: impl Iterator<Item = f64>) -> serde_json::Value {
    json!(values
        .map(|v| json!({"value": v, "metric": "cpu_util"}))
        .collect::<Vec<_>>())
}

fn ramp(n: usize) -> serde_json::Value {
    observations((0..n).map(|i| i as f64))
}

#[test]
fn test_train_only_request_responds_on_the_callback_channel() {
    let mut server = TestServer::start();
    let callback_path = server.side_socket("callback.sock");
    let callback = UnixListener::bind(&callback_path).unwrap();

    let request = json!({
        "key": "cpu_util",
        "train_history": ramp(24),
        "resp_recv_address": callback_path.to_str().unwrap(),
    });

    // The inbound connection closes without a payload before training runs.
    let inbound = send_request(&server.socket_path, &request);
    assert!(inbound.is_empty());

    // The result arrives on the callback socket once training finishes.
    let (mut stream, _) = callback.accept().unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).unwrap();
    let response = read_response(&raw);

    assert!(response.is_success(), "unexpected error: {}", response.error);
    assert!(response.trained);
    assert_eq!(response.key.as_deref(), Some("cpu_util"));
    assert!(response.loss.unwrap().is_finite());
    assert!(response.prediction.is_none());

    server.stop();
}

#[test]
fn test_predict_only_request_never_contacts_the_callback() {
    let mut server = TestServer::start();

    // Train first so the prediction exercises the success path.
    let callback_path = server.side_socket("train-callback.sock");
    let callback = UnixListener::bind(&callback_path).unwrap();
    send_request(
        &server.socket_path,
        &json!({
            "key": "cpu_util",
            "train_history": ramp(24),
            "resp_recv_address": callback_path.to_str().unwrap(),
        }),
    );
    callback.accept().unwrap();

    // Canary listener the server must never dial.
    let canary_path = server.side_socket("canary.sock");
    let canary = UnixListener::bind(&canary_path).unwrap();
    canary.set_nonblocking(true).unwrap();

    let request = json!({
        "key": "cpu_util",
        "predict_history": ramp(8),
        "resp_recv_address": canary_path.to_str().unwrap(),
    });
    let response = read_response(&send_request(&server.socket_path, &request));

    assert!(response.is_success(), "unexpected error: {}", response.error);
    assert_eq!(response.prediction.as_ref().unwrap().len(), 2);
    assert!(response.loss.is_none());

    // The reply already arrived inbound, so the handler is done; nothing
    // may have dialed the canary.
    match canary.accept() {
        Err(e) => assert_eq!(e.kind(), ErrorKind::WouldBlock),
        Ok(_) => panic!("predict-only request dialed the callback address"),
    }

    server.stop();
}

#[test]
fn test_combined_request_serves_both_channels_exactly_once() {
    let mut server = TestServer::start();

    let callback_path = server.side_socket("callback.sock");
    let callback = UnixListener::bind(&callback_path).unwrap();

    // Train a model so the combined request's prediction can succeed.
    send_request(
        &server.socket_path,
        &json!({
            "key": "cpu_util",
            "train_history": ramp(24),
            "resp_recv_address": callback_path.to_str().unwrap(),
        }),
    );
    callback.accept().unwrap();

    let request = json!({
        "key": "cpu_util",
        "train_history": ramp(24),
        "predict_history": ramp(8),
        "resp_recv_address": callback_path.to_str().unwrap(),
    });

    // Prediction comes back on the inbound connection.
    let inbound = read_response(&send_request(&server.socket_path, &request));
    assert!(inbound.is_success(), "unexpected error: {}", inbound.error);
    assert_eq!(inbound.prediction.as_ref().unwrap().len(), 2);
    assert!(inbound.loss.is_none());

    // The training result is dialed out exactly once.
    let (mut stream, _) = callback.accept().unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).unwrap();
    let train_response = read_response(&raw);
    assert!(train_response.trained);
    assert!(train_response.loss.unwrap().is_finite());
    assert!(train_response.prediction.is_none());

    callback.set_nonblocking(true).unwrap();
    match callback.accept() {
        Err(e) => assert_eq!(e.kind(), ErrorKind::WouldBlock),
        Ok(_) => panic!("training result was delivered more than once"),
    }

    server.stop();
}

#[test]
fn test_predict_for_untrained_key_reports_model_not_found() {
    let mut server = TestServer::start();

    let request = json!({
        "key": "never_trained",
        "predict_history": ramp(8),
    });
    let response = read_response(&send_request(&server.socket_path, &request));

    assert!(!response.trained);
    assert!(response.prediction.is_none());
    assert!(response.error.contains("no trained model"));
    assert_eq!(response.key.as_deref(), Some("never_trained"));

    // Shutdown removes the socket file.
    let socket_path = server.socket_path.clone();
    server.stop();
    assert!(!socket_path.exists());
}

#[test]
fn test_undeliverable_training_result_still_serves_the_prediction() {
    let mut server = TestServer::start();

    let callback_path = server.side_socket("callback.sock");
    let callback = UnixListener::bind(&callback_path).unwrap();
    send_request(
        &server.socket_path,
        &json!({
            "key": "cpu_util",
            "train_history": ramp(24),
            "resp_recv_address": callback_path.to_str().unwrap(),
        }),
    );
    callback.accept().unwrap();

    // Nobody listens on this address; delivery fails after training.
    let dead_path = server.side_socket("dead.sock");
    let request = json!({
        "key": "cpu_util",
        "train_history": ramp(24),
        "predict_history": ramp(8),
        "resp_recv_address": dead_path.to_str().unwrap(),
    });

    let inbound = read_response(&send_request(&server.socket_path, &request));
    assert!(inbound.is_success(), "unexpected error: {}", inbound.error);
    assert_eq!(inbound.prediction.as_ref().unwrap().len(), 2);

    // The server keeps serving after the lost delivery.
    let followup = json!({
        "key": "cpu_util",
        "predict_history": ramp(8),
    });
    let response = read_response(&send_request(&server.socket_path, &followup));
    assert!(response.is_success());

    server.stop();
}

#[test]
fn test_training_proceeds_when_the_caller_hangs_up_early() {
    let mut server = TestServer::start();

    let callback_path = server.side_socket("callback.sock");
    let callback = UnixListener::bind(&callback_path).unwrap();
    callback.set_nonblocking(true).unwrap();

    let request = json!({
        "key": "cpu_util",
        "train_history": ramp(24),
        "predict_history": ramp(8),
        "resp_recv_address": callback_path.to_str().unwrap(),
    });

    // Write the frame and hang up without reading the inline reply.
    let mut conn = UnixStream::connect(&server.socket_path).unwrap();
    conn.write_all(request.to_string().as_bytes()).unwrap();
    conn.write_all(b"\n").unwrap();
    drop(conn);

    // The hangup forfeits only the inline reply; the training half still
    // runs and its result still reaches the callback socket.
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut stream = loop {
        match callback.accept() {
            Ok((stream, _)) => break stream,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                assert!(
                    Instant::now() < deadline,
                    "training result never reached the callback socket"
                );
                thread::sleep(Duration::from_millis(20));
            }
            Err(e) => panic!("callback accept failed: {}", e),
        }
    };
    stream.set_nonblocking(false).unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).unwrap();
    let response = read_response(&raw);

    assert!(response.is_success(), "unexpected error: {}", response.error);
    assert!(response.trained);
    assert_eq!(response.key.as_deref(), Some("cpu_util"));
    assert!(response.loss.unwrap().is_finite());

    server.stop();
}

#[test]
fn test_invalid_requests_are_answered_or_dropped() {
    let mut server = TestServer::start();

    // Malformed JSON: the connection closes with no structured reply.
    let mut conn = UnixStream::connect(&server.socket_path).unwrap();
    conn.write_all(b"{this is not json\n").unwrap();
    let mut raw = Vec::new();
    conn.read_to_end(&mut raw).unwrap();
    assert!(raw.is_empty());

    // A request asking for nothing gets a structured error.
    let response = read_response(&send_request(&server.socket_path, &json!({"key": "k"})));
    assert!(response.error.contains("neither"));

    // Missing key.
    let response = read_response(&send_request(
        &server.socket_path,
        &json!({"predict_history": ramp(8)}),
    ));
    assert!(response.error.contains("missing metric key"));

    // Train-only with nowhere to deliver the result.
    let response = read_response(&send_request(
        &server.socket_path,
        &json!({"key": "k", "train_history": ramp(24)}),
    ));
    assert!(response.error.contains("resp_recv_address"));

    server.stop();
}

#[test]
fn test_eof_terminated_frames_are_accepted() {
    let mut server = TestServer::start();

    let request = json!({
        "key": "never_trained",
        "predict_history": ramp(8),
    });

    // Terminate the frame by half-closing instead of a newline.
    let mut conn = UnixStream::connect(&server.socket_path).unwrap();
    conn.write_all(request.to_string().as_bytes()).unwrap();
    conn.shutdown(Shutdown::Write).unwrap();
    let mut raw = Vec::new();
    conn.read_to_end(&mut raw).unwrap();

    let response = read_response(&raw);
    assert!(response.error.contains("no trained model"));

    server.stop();
}

#[test]
fn test_oversized_frames_are_dropped_without_reply() {
    let mut server = TestServer::start();

    // One giant line with no newline; the read stops at the cap and the
    // truncated frame cannot decode.
    let junk = vec![b'x'; MAX_FRAME_BYTES as usize + 2];
    let mut conn = UnixStream::connect(&server.socket_path).unwrap();
    // The server may close mid-flood, so the tail of the write can fail.
    let _ = conn.write_all(&junk);
    let mut raw = Vec::new();
    conn.read_to_end(&mut raw).unwrap();
    assert!(raw.is_empty());

    // The flood did not take the server down.
    let response = read_response(&send_request(
        &server.socket_path,
        &json!({"key": "k", "predict_history": ramp(8)}),
    ));
    assert!(response.error.contains("no trained model"));

    server.stop();
}

#[test]
fn test_stale_socket_files_are_replaced_and_live_ones_refused() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("uds_socket");

    // A bind-and-drop leaves a socket file nobody serves.
    drop(UnixListener::bind(&socket_path).unwrap());
    assert!(socket_path.exists());

    // The stale file is removed and the bind succeeds.
    let server = TransportServer::bind(&socket_path, make_router(dir.path())).unwrap();
    assert!(socket_path.exists());

    // A second bind against the live socket is refused.
    let err = TransportServer::bind(&socket_path, make_router(dir.path())).unwrap_err();
    assert!(err.to_string().contains("live process"));

    // Dropping the server cleans up its socket file.
    drop(server);
    assert!(!socket_path.exists());
}

#[test]
fn test_stop_flag_and_a_wake_connection_stop_the_serve_loop() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("uds_socket");
    let server = TransportServer::bind(&socket_path, make_router(dir.path())).unwrap();
    let stop = server.stop_handle();
    let handle = thread::spawn(move || server.run());

    // Let the loop park in accept before stopping it.
    thread::sleep(Duration::from_millis(50));
    stop.store(true, Ordering::SeqCst);
    // A bare connect is enough to unpark the acceptor; no frame needed.
    drop(UnixStream::connect(&socket_path).unwrap());

    handle.join().unwrap().unwrap();
    assert!(!socket_path.exists());
}
