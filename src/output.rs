//! User-facing terminal output.
//!
//! Everything here is advisory text, not part of the wire contract. Delivered
//! messages and informational notices go to stdout; error reports and the
//! input prompt go to stderr, so piped stdout carries only message traffic.

use std::fmt;

use tokio::io::{self, AsyncWriteExt};

use crate::error::ClientError;

pub const PROMPT: &str = "Enter command or (-h): ";

/// Non-error conditions surfaced to the user as `INFO:` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    ConnectionEstablished,
    ConnectionRestored,
    AlreadyConnected,
    AlreadySubscribed(String),
    NotSubscribed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ConnectionEstablished => write!(f, "connection successfully established"),
            Notice::ConnectionRestored => write!(f, "connection restored"),
            Notice::AlreadyConnected => {
                write!(f, "already connected to a server, first disconnect")
            }
            Notice::AlreadySubscribed(topic) => write!(f, "already subscribed to topic: {topic}"),
            Notice::NotSubscribed(topic) => write!(f, "was not subscribed to topic: {topic}"),
        }
    }
}

/// Prints one delivered message in the `Topic: <topic> Data: <data>` shape.
pub async fn print_delivery(topic: &str, data: &str) -> io::Result<()> {
    write_stdout(&format!("Topic: {topic} Data: {data}")).await
}

pub async fn print_notice(notice: &Notice) -> io::Result<()> {
    write_stdout(&format!("INFO: {notice}")).await
}

pub async fn report_error(error: &ClientError) -> io::Result<()> {
    write_stderr(&format!("ERROR: {error}")).await
}

/// Prints the input prompt without a trailing newline.
pub async fn print_prompt() -> io::Result<()> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(PROMPT.as_bytes()).await?;
    stderr.flush().await
}

/// Separates a batch of live deliveries from the pending prompt line.
pub async fn print_blank_line() -> io::Result<()> {
    write_stdout("").await
}

pub async fn print_help() -> io::Result<()> {
    write_stdout(concat!(
        "pubsubx - list of possible client commands:\n",
        "CONNECT <port> <client_name>    : connect to a PubSubX server at the given port under a client name\n",
        "DISCONNECT                      : disconnect from the PubSubX server, all subscriptions are removed\n",
        "PUBLISH <topic_name> <message>  : publish a message to a topic on the PubSubX server\n",
        "SUBSCRIBE <topic_name>          : subscribe to a topic on the PubSubX server\n",
        "UNSUBSCRIBE <topic_name>        : remove the subscription from a topic on the PubSubX server",
    ))
    .await
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

async fn write_stderr(line: &str) -> io::Result<()> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(line.as_bytes()).await?;
    stderr.write_all(b"\n").await?;
    stderr.flush().await
}
