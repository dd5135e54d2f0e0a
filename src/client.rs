//! Interactive command context: reads stdin lines, dispatches commands, and
//! performs the connect handshake.
//!
//! The handshake runs inline in this context; everything after it goes
//! through the control channel to the session loop in [`crate::session`].
//! This side takes the session lock only for non-blocking dispatch work and
//! releases it before waiting for the next input line.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::command::{self, Command};
use crate::error::ClientError;
use crate::framing::{self, BUFFER_SIZE, DELIMITER, MAX_MESSAGE_SIZE};
use crate::output::{self, Notice};
use crate::session::{self, Session, SessionHandle};

/// How the broker answered a CONNECT handshake.
#[derive(Debug)]
pub enum HandshakeOutcome {
    /// `OK`: a fresh session with no prior state.
    Fresh,
    /// `RESTORED`: the raw response carries the prior topic set and any
    /// messages the broker buffered while this client was offline.
    Restored(String),
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut client = Client::new(cli.host);
    client.command_loop().await
}

/// The interactive side of a client process: owns the session handle and
/// dispatches parsed commands against the current connection phase.
pub struct Client {
    session: Arc<Mutex<Session>>,
    handle: Option<SessionHandle>,
}

impl Client {
    pub fn new(broker_host: impl Into<String>) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::new(broker_host))),
            handle: None,
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_connected()
    }

    /// Snapshot of the current topic set, for inspection.
    pub async fn topics(&self) -> Vec<String> {
        let session = self.session.lock().await;
        let mut topics: Vec<String> = session.topics.iter().cloned().collect();
        topics.sort();
        topics
    }

    /// Reads newline-terminated commands from stdin until end of input.
    ///
    /// The session lock is never held while waiting for a line; it is taken
    /// per-command inside dispatch.
    pub async fn command_loop(&mut self) -> Result<()> {
        let mut stdin = BufReader::new(tokio::io::stdin());
        let mut input = String::new();

        loop {
            output::print_prompt().await?;

            input.clear();
            let bytes = stdin
                .read_line(&mut input)
                .await
                .context("failed to read command input")?;
            if bytes == 0 {
                // End of input: leave the broker cleanly if still connected.
                if let Some(handle) = self.handle.take() {
                    handle.signal_shutdown();
                    handle.finished().await;
                }
                info!("command input closed");
                return Ok(());
            }

            let line = input.trim();
            if line.is_empty() {
                continue;
            }

            match Command::parse(line) {
                Ok(command) => self.dispatch(command).await?,
                Err(err) => output::report_error(&err).await?,
            }
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Help => output::print_help().await.map_err(Into::into),
            Command::Connect { port, name } => self.connect(&port, &name).await,
            Command::Disconnect => self.disconnect().await,
            Command::Publish { topic, data } => self.publish(&topic, &data).await,
            Command::Subscribe { topic } => self.subscribe(&topic).await,
            Command::Unsubscribe { topic } => self.unsubscribe(&topic).await,
        }
    }

    /// Handles `CONNECT <port> <name>`: validates arguments, performs the
    /// handshake, and starts the session loop on success.
    pub async fn connect(&mut self, port_arg: &str, name_arg: &str) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.is_connected() {
            return notice(&Notice::AlreadyConnected).await;
        }

        let port = match command::validate_port(port_arg) {
            Ok(port) => port,
            Err(err) => return report(&err).await,
        };
        if let Err(err) = command::validate_name(name_arg) {
            return report(&err).await;
        }

        let (stream, outcome) = match establish(&session.broker_host, port, name_arg).await {
            Ok(established) => established,
            Err(err) => return report(&err).await,
        };

        session.begin_connection(port, name_arg);
        info!(port, name = name_arg, "connected to broker");

        match outcome {
            HandshakeOutcome::Fresh => {
                notice(&Notice::ConnectionEstablished).await?;
            }
            HandshakeOutcome::Restored(response) => {
                notice(&Notice::ConnectionRestored).await?;
                restore_session(&mut session, &response).await;
            }
        }

        drop(session);
        self.handle = Some(session::spawn(stream, Arc::clone(&self.session)));
        Ok(())
    }

    /// Handles `DISCONNECT`: clears the local topic set right away and lets
    /// the session loop do the authoritative teardown.
    pub async fn disconnect(&mut self) -> Result<()> {
        let mut session = self.session.lock().await;
        if !session.is_connected() {
            return report(&ClientError::NotConnected).await;
        }
        session.topics.clear();
        drop(session);

        if let Some(handle) = &self.handle {
            handle.signal_shutdown();
        }
        Ok(())
    }

    pub async fn publish(&mut self, topic: &str, data: &str) -> Result<()> {
        let session = self.session.lock().await;
        if !session.is_connected() {
            return report(&ClientError::NotConnected).await;
        }
        if topic.is_empty() {
            return report(&ClientError::EmptyTopic).await;
        }
        drop(session);

        self.queue_outbound(format!("PUBLISH {topic} {data}")).await
    }

    pub async fn subscribe(&mut self, topic: &str) -> Result<()> {
        let mut session = self.session.lock().await;
        if !session.is_connected() {
            return report(&ClientError::NotConnected).await;
        }
        if topic.is_empty() {
            return report(&ClientError::EmptyTopic).await;
        }
        if session.topics.contains(topic) {
            return notice(&Notice::AlreadySubscribed(topic.to_string())).await;
        }

        session.topics.insert(topic.to_string());
        drop(session);

        self.queue_outbound(format!("SUBSCRIBE {topic}")).await
    }

    pub async fn unsubscribe(&mut self, topic: &str) -> Result<()> {
        let mut session = self.session.lock().await;
        if !session.is_connected() {
            return report(&ClientError::NotConnected).await;
        }
        if topic.is_empty() {
            return report(&ClientError::EmptyTopic).await;
        }
        if !session.topics.remove(topic) {
            return notice(&Notice::NotSubscribed(topic.to_string())).await;
        }
        drop(session);

        self.queue_outbound(format!("UNSUBSCRIBE {topic}")).await
    }

    /// Hands one command body to the session loop, in issue order.
    async fn queue_outbound(&self, payload: String) -> Result<()> {
        if payload.len() > MAX_MESSAGE_SIZE {
            return report(&ClientError::MessageTooLong).await;
        }

        let delivered = match &self.handle {
            Some(handle) => handle.signal_outbound(payload),
            None => false,
        };
        if !delivered {
            // The loop already reported whatever ended the session; the next
            // dispatch will see the disconnected phase.
            warn!("dropped outbound command, session loop is gone");
        }
        Ok(())
    }
}

/// Opens the broker connection and performs the CONNECT handshake: one
/// request, one blocking read of the response.
pub async fn establish(
    host: &str,
    port: u16,
    name: &str,
) -> std::result::Result<(TcpStream, HandshakeOutcome), ClientError> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(ClientError::ConnectFailure)?;

    let request = format!("CONNECT {name}{DELIMITER}");
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(ClientError::ConnectFailure)?;

    let mut buf = [0u8; BUFFER_SIZE];
    let count = stream
        .read(&mut buf)
        .await
        .map_err(ClientError::ConnectFailure)?;
    if count == 0 {
        return Err(ClientError::NoResponse);
    }

    let response = String::from_utf8_lossy(&buf[..count]).into_owned();
    if response.starts_with("OK") {
        Ok((stream, HandshakeOutcome::Fresh))
    } else if response.starts_with("RESTORED") {
        Ok((stream, HandshakeOutcome::Restored(response)))
    } else if response.starts_with("ERROR") {
        Err(ClientError::NameTaken)
    } else {
        let summary = response
            .split(DELIMITER)
            .next()
            .unwrap_or_default()
            .to_string();
        Err(ClientError::UnknownResponse(summary))
    }
}

/// Applies a RESTORED handshake response: the first field is the tag, the
/// second is the prior topic set, and everything after it is replayed through
/// the normal delivery path.
async fn restore_session(session: &mut Session, response: &str) {
    let mut fields = response.splitn(3, DELIMITER);
    fields.next();

    if let Some(topic_list) = fields.next() {
        session
            .topics
            .extend(topic_list.split_whitespace().map(str::to_string));
    }

    if let Some(missed) = fields.next() {
        if !missed.is_empty() {
            // The tail may end mid-message; the fragment stays in the
            // reassembly buffer for the session loop to finish.
            let messages = framing::split_inbound(&mut session.inbound, missed);
            session::deliver_messages(session, &messages, false).await;
        }
    }
}

async fn report(error: &ClientError) -> Result<()> {
    output::report_error(error).await.map_err(Into::into)
}

async fn notice(notice: &Notice) -> Result<()> {
    output::print_notice(notice).await.map_err(Into::into)
}
