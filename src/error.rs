//! User-reportable error conditions.
//!
//! Three recovery classes share this enum: input validation failures leave all
//! state untouched, handshake failures abort the connection attempt, and
//! runtime failures force the session back to the disconnected phase. See
//! each variant for which class it belongs to.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Input validation: port argument is not a decimal integer in (1024, 65535].
    #[error("server port number is wrong, must be an integer with 1024 < port <= 65535")]
    WrongPort,

    /// Input validation: client name is empty or longer than 64 characters.
    #[error("client name is empty or too long, must be between 1 and 64 characters")]
    WrongName,

    /// Input validation: topic argument is missing.
    #[error("trying to publish/subscribe/unsubscribe to an empty topic")]
    EmptyTopic,

    /// Input validation: verb is not in the command set.
    #[error("wrong command entered, to see help enter -h")]
    WrongCommand,

    /// Input validation: outbound command exceeds the inter-context cap.
    #[error("trying to send a message that is too long")]
    MessageTooLong,

    /// Handshake: TCP connect or handshake I/O failed.
    #[error("connection to the server has failed, please check port and try again")]
    ConnectFailure(#[source] io::Error),

    /// Handshake: broker answered ERROR, the name is in use.
    #[error("client name is already taken, please enter another name")]
    NameTaken,

    /// Handshake: broker closed the stream before answering.
    #[error("no response from server")]
    NoResponse,

    /// Handshake: broker answered something other than OK/RESTORED/ERROR.
    #[error("unknown response from server: {0}")]
    UnknownResponse(String),

    /// Runtime: read or readiness error on the broker connection.
    #[error("client lost connection to the server, try to reconnect")]
    ConnectionLost(#[source] io::Error),

    /// Runtime: broker shut the connection down.
    #[error("server shut the connection, all subscriptions are lost")]
    ConnectionDown,

    /// A session command was issued without a live connection.
    #[error("client is not connected, only CONNECT command is accepted")]
    NotConnected,

    /// Protocol violation: broker pushed a message for an unsubscribed topic.
    #[error("received message on topic \"{0}\" without a subscription")]
    WrongTopic(String),
}
