// Unix domain socket transport: one newline-terminated JSON request per
// connection, predictions answered inline, training results dialed back
// to the caller's socket.

pub mod callback;
pub mod protocol;
pub mod router;

// External imports
use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use nix::sys::signal::{SigSet, Signal};
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

// Internal imports
use crate::constants::MAX_FRAME_BYTES;
use protocol::{ForecastRequest, ForecastResponse};
use router::RequestRouter;

/// # Transport Server
///
/// Owns the listening socket and serves connections serially: read one
/// request, write the prediction reply (if any), half-close, then run any
/// training job and deliver its result to the caller's callback socket.
/// The socket file is removed when the server is dropped.
#[derive(Debug)]
pub struct TransportServer {
    listener: UnixListener,
    socket_path: PathBuf,
    router: RequestRouter,
    stop: Arc<AtomicBool>,
}

impl TransportServer {
    /// # Bind the Listening Socket
    ///
    /// A leftover socket file from a crashed process is detected by
    /// probing it with a connect: refusal means nothing is serving it and
    /// the file is removed before binding. A successful probe means a
    /// live process still owns the path, and binding fails rather than
    /// stealing it.
    pub fn bind(socket_path: impl Into<PathBuf>, router: RequestRouter) -> Result<Self> {
        let socket_path = socket_path.into();

        if socket_path.exists() {
            match UnixStream::connect(&socket_path) {
                Ok(_) => bail!(
                    "socket {} is already served by a live process",
                    socket_path.display()
                ),
                Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                    info!("removing stale socket file {}", socket_path.display());
                    std::fs::remove_file(&socket_path).with_context(|| {
                        format!("failed to remove stale socket {}", socket_path.display())
                    })?;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("failed to probe existing socket {}", socket_path.display())
                    })
                }
            }
        }

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("failed to bind {}", socket_path.display()))?;
        info!("listening on {}", socket_path.display());

        Ok(Self {
            listener,
            socket_path,
            router,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Flag another thread can flip to stop the serve loop. The loop
    /// checks it when `accept` returns, so pair it with a wake-up
    /// connect.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// # Watch for Termination Signals
    ///
    /// Blocks SIGINT and SIGTERM on the calling thread and parks a
    /// watcher thread on `sigwait`. When a signal arrives the watcher
    /// flips the stop flag and dials the listening socket once, so the
    /// blocked `accept` returns immediately instead of waiting for the
    /// next client.
    ///
    /// Call this before `run`, from the thread that will run the serve
    /// loop and before spawning any others; spawned threads inherit the
    /// blocked mask.
    pub fn install_signal_watcher(&self) -> Result<()> {
        let mut signals = SigSet::empty();
        signals.add(Signal::SIGINT);
        signals.add(Signal::SIGTERM);
        signals
            .thread_block()
            .context("failed to block termination signals")?;

        let stop = Arc::clone(&self.stop);
        let socket_path = self.socket_path.clone();
        thread::spawn(move || {
            match signals.wait() {
                Ok(signal) => info!("received {}, stopping", signal.as_str()),
                Err(e) => warn!("signal wait failed, stopping: {}", e),
            }
            stop.store(true, Ordering::SeqCst);
            let _ = UnixStream::connect(&socket_path);
        });
        Ok(())
    }

    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// # Serve Until Stopped
    ///
    /// Accepts and handles one connection at a time. Per-connection
    /// failures are logged and the loop keeps serving; only the stop
    /// flag ends it. The flag is re-checked after every `accept` so a
    /// wake-up connect is never served as a request.
    pub fn run(&self) -> Result<()> {
        loop {
            if self.should_stop() {
                break;
            }
            match self.listener.accept() {
                Ok((stream, _)) => {
                    if self.should_stop() {
                        break;
                    }
                    if let Err(e) = self.handle_connection(stream) {
                        error!("connection handling failed: {:#}", e);
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => error!("accept failed: {}", e),
            }
        }
        info!("shutting down");
        Ok(())
    }

    /// Handle one connection end to end.
    ///
    /// The inbound stream is half-closed before any training starts, so a
    /// train-only caller unblocks immediately and waits on its own
    /// callback socket instead.
    fn handle_connection(&self, stream: UnixStream) -> Result<()> {
        let mut reader = BufReader::new(stream.take(MAX_FRAME_BYTES));
        let mut frame = String::new();
        reader
            .read_line(&mut frame)
            .context("failed to read request frame")?;
        let mut stream = reader.into_inner().into_inner();

        let frame = frame.trim();
        if frame.is_empty() {
            warn!("empty request frame, closing connection");
            return Ok(());
        }

        let request: ForecastRequest = match serde_json::from_str(frame) {
            Ok(request) => request,
            Err(e) => {
                // Nothing well-formed to key a structured reply to. A
                // frame that overran the size cap lands here truncated.
                warn!("undecodable request frame: {}", e);
                return Ok(());
            }
        };

        let dispatch = self.router.dispatch(&request);

        // A caller that hangs up before reading forfeits its inline
        // reply and nothing else; a queued training job still runs.
        if let Err(e) = send_reply(&mut stream, dispatch.reply.as_ref()) {
            warn!("inbound reply not delivered: {:#}", e);
        }
        drop(stream);

        if let Some(job) = &dispatch.train {
            let response = self.router.run_train(job);
            if let Err(e) = callback::deliver(&job.callback_address, &response) {
                error!("training result for '{}' lost: {}", job.key, e);
            }
        }

        Ok(())
    }
}

/// Write the inline reply, if any, and half-close the stream.
fn send_reply(stream: &mut UnixStream, reply: Option<&ForecastResponse>) -> Result<()> {
    if let Some(reply) = reply {
        let payload = serde_json::to_vec(reply).context("failed to encode reply")?;
        stream
            .write_all(&payload)
            .context("failed to write reply")?;
        stream.flush().context("failed to flush reply")?;
    }
    stream
        .shutdown(Shutdown::Write)
        .context("failed to half-close connection")?;
    Ok(())
}

impl Drop for TransportServer {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(
                    "failed to remove socket file {}: {}",
                    self.socket_path.display(),
                    e
                );
            }
        }
    }
}
