//! Interactive client for the PubSubX publish/subscribe protocol.
//!
//! The client keeps one persistent TCP connection to a broker and multiplexes
//! it against interactive commands. Each module focuses on a concrete
//! responsibility:
//!
//! - [`cli`] parses the process arguments.
//! - [`command`] parses and validates interactive command lines.
//! - [`client`] is the command-facing context: dispatch, connect handshake,
//!   and session restoration.
//! - [`session`] holds the shared session state and runs the network-facing
//!   loop that multiplexes broker traffic against control signals.
//! - [`framing`] reassembles and chunks delimiter-framed wire messages.
//! - [`output`] prints delivered messages, notices, and error reports.
//! - [`error`] is the user-reportable error taxonomy.
//!
//! Integration tests drive this crate against a scripted broker to exercise
//! the handshake, restoration, and chunking behavior.

pub mod cli;
pub mod client;
pub mod command;
pub mod error;
pub mod framing;
pub mod output;
pub mod session;
