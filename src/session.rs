//! Shared session state and the network-facing session loop.
//!
//! Two execution contexts touch a session: the interactive command context in
//! [`crate::client`] and the network-facing loop spawned here. All shared
//! fields live behind one `Mutex`; each context takes it for non-blocking work
//! only and never holds it across its blocking point (the stdin read on one
//! side, the `select!` below on the other), so the two sides never do work
//! concurrently.
//!
//! The original protocol design multiplexed process-internal signals and
//! socket readiness through one `select(2)` call over loopback sockets. Here
//! the same shape falls out of `tokio::select!` over [`TcpStream::ready`] and
//! two mpsc channels: an unbounded FIFO channel for outbound command payloads
//! and a capacity-one channel for the shutdown request.

use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, Interest, Ready};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::framing::{self, BUFFER_SIZE, DELIMITER};
use crate::output;

/// Connection phase gating which commands are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connected,
}

/// Session fields shared between the command and network contexts.
#[derive(Debug)]
pub struct Session {
    pub phase: Phase,
    pub broker_host: String,
    pub broker_port: u16,
    pub client_name: String,
    /// Topics this client is subscribed to; non-empty only while connected.
    pub topics: HashSet<String>,
    /// Outbound command bodies, FIFO, delimiter-free until chunking.
    pub outbound: VecDeque<String>,
    /// Reassembly buffer; holds at most one incomplete trailing fragment.
    pub inbound: String,
}

impl Session {
    pub fn new(broker_host: impl Into<String>) -> Self {
        Self {
            phase: Phase::Disconnected,
            broker_host: broker_host.into(),
            broker_port: 0,
            client_name: String::new(),
            topics: HashSet::new(),
            outbound: VecDeque::new(),
            inbound: String::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.phase == Phase::Connected
    }

    /// Enters the connected phase with a clean slate for the new session.
    pub fn begin_connection(&mut self, port: u16, name: &str) {
        self.phase = Phase::Connected;
        self.broker_port = port;
        self.client_name = name.to_string();
        self.topics.clear();
        self.outbound.clear();
        self.inbound.clear();
    }

    /// Leaves the connected phase, discarding per-connection state.
    pub fn drop_connection(&mut self) {
        self.phase = Phase::Disconnected;
        self.topics.clear();
        self.outbound.clear();
        self.inbound.clear();
    }
}

/// Command-context end of the control channel into a running session loop.
pub struct SessionHandle {
    outbound_tx: mpsc::UnboundedSender<String>,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Queues one outbound command body for transmission, in send order.
    pub fn signal_outbound(&self, payload: String) -> bool {
        self.outbound_tx.send(payload).is_ok()
    }

    /// Requests session shutdown. A signal already pending is enough, so
    /// duplicates are coalesced.
    pub fn signal_shutdown(&self) {
        let _ = self.shutdown_tx.try_send(());
    }

    /// Waits for the session loop to finish.
    pub async fn finished(self) {
        let _ = self.task.await;
    }
}

/// Spawns the network-facing loop for a freshly established connection.
pub fn spawn(stream: TcpStream, session: Arc<Mutex<Session>>) -> SessionHandle {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let task = tokio::spawn(session_loop(stream, session, outbound_rx, shutdown_rx));
    SessionHandle {
        outbound_tx,
        shutdown_tx,
        task,
    }
}

/// One wait-loop wakeup: socket readiness, a queued outbound command, or a
/// shutdown request.
enum Event {
    Socket(io::Result<Ready>),
    Outbound(Option<String>),
    Shutdown,
}

/// The protocol state machine while connected.
///
/// Each iteration blocks in one combined wait over the socket and both
/// control channels, then processes the single event that fired. The session
/// lock is taken only inside event handling, never across the wait. Write
/// interest is armed while the outbound queue is non-empty and disarmed once
/// the final chunk of the queue has been flushed.
async fn session_loop(
    mut stream: TcpStream,
    session: Arc<Mutex<Session>>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let mut write_armed = false;

    loop {
        let interest = if write_armed {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };

        let event = tokio::select! {
            ready = stream.ready(interest) => Event::Socket(ready),
            payload = outbound_rx.recv() => Event::Outbound(payload),
            _ = shutdown_rx.recv() => Event::Shutdown,
        };

        match event {
            Event::Socket(Ok(ready)) => {
                if ready.is_readable() {
                    match drain_socket(&stream, &session).await {
                        Ok(ReadOutcome::Progress) => {}
                        Ok(ReadOutcome::PeerClosed) => {
                            connection_down(&mut stream, &session).await;
                            return;
                        }
                        Err(err) => {
                            connection_lost(&mut stream, &session, err).await;
                            return;
                        }
                    }
                }
                if write_armed && ready.is_writable() {
                    match flush_chunk(&mut stream, &session).await {
                        Ok(queue_drained) => write_armed = !queue_drained,
                        Err(err) => {
                            connection_lost(&mut stream, &session, err).await;
                            return;
                        }
                    }
                }
            }
            Event::Socket(Err(err)) => {
                connection_lost(&mut stream, &session, err).await;
                return;
            }
            Event::Outbound(Some(payload)) => {
                session.lock().await.outbound.push_back(payload);
                write_armed = true;
            }
            // A closed outbound channel means the command context is gone;
            // treat it like a disconnect request.
            Event::Outbound(None) | Event::Shutdown => {
                while shutdown_rx.try_recv().is_ok() {}
                finish_disconnect(&mut stream, &session).await;
                return;
            }
        }
    }
}

enum ReadOutcome {
    Progress,
    PeerClosed,
}

/// Reads one buffer's worth of broker bytes and delivers every complete
/// message that reassembles out of them.
async fn drain_socket(
    stream: &TcpStream,
    session: &Arc<Mutex<Session>>,
) -> io::Result<ReadOutcome> {
    let mut buf = [0u8; BUFFER_SIZE];
    match stream.try_read(&mut buf) {
        Ok(0) => Ok(ReadOutcome::PeerClosed),
        Ok(count) => {
            let chunk = String::from_utf8_lossy(&buf[..count]);
            let mut session = session.lock().await;
            let messages = framing::split_inbound(&mut session.inbound, &chunk);
            deliver_messages(&session, &messages, true).await;
            Ok(ReadOutcome::Progress)
        }
        // Readiness can be spurious; an empty read is not a closed peer.
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(ReadOutcome::Progress),
        Err(err) => Err(err),
    }
}

/// Sends the next outbound chunk; returns true once the queue is drained.
async fn flush_chunk(stream: &mut TcpStream, session: &Arc<Mutex<Session>>) -> io::Result<bool> {
    let next = {
        let mut session = session.lock().await;
        framing::chunk_for_send(&mut session.outbound)
    };
    let Some((chunk, is_final)) = next else {
        return Ok(true);
    };

    stream.write_all(&chunk).await?;
    debug!(bytes = chunk.len(), "flushed outbound chunk");
    Ok(is_final)
}

/// Prints each complete message the broker delivered, gated by the topic set.
///
/// Live traffic is set off from the pending prompt line by a leading blank
/// line and followed by a fresh prompt; restoration replay skips both.
pub(crate) async fn deliver_messages(session: &Session, messages: &[String], live: bool) {
    if messages.is_empty() {
        return;
    }

    if live {
        if let Err(err) = output::print_blank_line().await {
            warn!(error = ?err, "failed to write to terminal");
        }
    }

    for message in messages {
        let (topic, data) = match message.split_once(char::is_whitespace) {
            Some((topic, data)) => (topic, data),
            None => (message.as_str(), ""),
        };

        let outcome = if session.topics.contains(topic) {
            output::print_delivery(topic, data).await
        } else {
            report(&ClientError::WrongTopic(topic.to_string())).await;
            Ok(())
        };
        if let Err(err) = outcome {
            warn!(error = ?err, "failed to write delivered message");
        }
    }

    if live {
        if let Err(err) = output::print_prompt().await {
            warn!(error = ?err, "failed to rewrite prompt");
        }
    }
}

/// Exit path for a read or readiness error on the broker connection.
async fn connection_lost(stream: &mut TcpStream, session: &Arc<Mutex<Session>>, err: io::Error) {
    warn!(error = ?err, "connection to the broker failed");
    report(&ClientError::ConnectionLost(err)).await;
    let _ = stream.shutdown().await;
    session.lock().await.drop_connection();
    let _ = output::print_prompt().await;
}

/// Exit path for a zero-length read: the broker shut the connection.
async fn connection_down(stream: &mut TcpStream, session: &Arc<Mutex<Session>>) {
    info!("broker closed the connection");
    report(&ClientError::ConnectionDown).await;
    let _ = stream.shutdown().await;
    session.lock().await.drop_connection();
    let _ = output::print_prompt().await;
}

/// Exit path for a user disconnect request: best-effort goodbye, then close.
///
/// The phase flips before the socket closes, so once the broker observes the
/// stream ending this side is already disconnected.
async fn finish_disconnect(stream: &mut TcpStream, session: &Arc<Mutex<Session>>) {
    let goodbye = format!("DISCONNECT{DELIMITER}");
    if let Err(err) = stream.write_all(goodbye.as_bytes()).await {
        debug!(error = ?err, "failed to send final disconnect");
    }
    session.lock().await.drop_connection();
    let _ = stream.shutdown().await;
    info!("disconnected from broker");
}

async fn report(error: &ClientError) {
    if let Err(err) = output::report_error(error).await {
        warn!(error = ?err, "failed to write error report");
    }
}
