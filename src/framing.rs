//! Delimiter framing for the PubSubX wire protocol.
//!
//! Every unit on the wire — handshake line, command line, published message —
//! is terminated by a fixed three-byte sentinel. These are pure functions over
//! caller-owned buffers: [`split_inbound`] reassembles complete messages out
//! of an arbitrarily chunked byte stream, and [`chunk_for_send`] slices the
//! outbound queue into buffer-sized wire chunks.
//!
//! The protocol has no escaping, so a payload that happens to contain the
//! sentinel is mis-framed by the receiver. The sentinel is chosen to be
//! unlikely in normal text, not guaranteed unique.

use std::collections::VecDeque;

/// End-of-message sentinel terminating every framed unit on the wire.
pub const DELIMITER: &str = "\n\nx";

/// Size of a single send/receive buffer, and therefore of one wire chunk.
pub const BUFFER_SIZE: usize = 1024;

/// Upper bound on one outbound command handed between execution contexts.
pub const MAX_MESSAGE_SIZE: usize = 10 * BUFFER_SIZE;

/// Longest client name the handshake accepts.
pub const MAX_NAME_LEN: usize = 64;

/// Largest chunk body that still fits a buffer once the delimiter is appended.
pub const MAX_CHUNK: usize = BUFFER_SIZE - DELIMITER.len();

/// Appends `new_bytes` to the reassembly buffer and drains every complete
/// delimiter-terminated message out of it.
///
/// If the accumulated buffer does not end with the delimiter, the trailing
/// segment is an incomplete message and stays behind as the remainder for the
/// next call. Empty segments (consecutive delimiters) are dropped. The result
/// is independent of how the underlying byte stream was chunked.
pub fn split_inbound(buffer: &mut String, new_bytes: &str) -> Vec<String> {
    buffer.push_str(new_bytes);
    if !buffer.contains(DELIMITER) {
        return Vec::new();
    }

    let ends_on_boundary = buffer.ends_with(DELIMITER);
    let mut segments: Vec<String> = buffer.split(DELIMITER).map(str::to_string).collect();

    *buffer = if ends_on_boundary {
        String::new()
    } else {
        segments.pop().unwrap_or_default()
    };

    segments.retain(|segment| !segment.is_empty());
    segments
}

/// Emits the next wire chunk from the outbound queue, or `None` when the
/// queue is empty.
///
/// A head entry longer than [`MAX_CHUNK`] goes out in slices: the first
/// `MAX_CHUNK` bytes (backed off to a char boundary) are emitted and the
/// remainder stays at the queue head. Otherwise the whole head entry is
/// emitted and popped; the returned flag is true when that leaves the queue
/// empty, letting the caller disarm write interest.
///
/// The delimiter is appended to every chunk, non-final fragments included.
/// That matches the wire behavior of the deployed broker, even though it
/// makes the receiver treat each fragment as a complete message.
pub fn chunk_for_send(queue: &mut VecDeque<String>) -> Option<(Vec<u8>, bool)> {
    let head = queue.front_mut()?;

    let (body, is_final) = if head.len() > MAX_CHUNK {
        let mut cut = MAX_CHUNK;
        while !head.is_char_boundary(cut) {
            cut -= 1;
        }
        let rest = head.split_off(cut);
        (std::mem::replace(head, rest), false)
    } else {
        let body = std::mem::take(head);
        queue.pop_front();
        (body, queue.is_empty())
    };

    let mut chunk = body.into_bytes();
    chunk.extend_from_slice(DELIMITER.as_bytes());
    Some((chunk, is_final))
}
