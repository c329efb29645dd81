//! Wire types shared by the tickbridge server and its clients.
//!
//! A request is a single JSON object carrying a `type` field that names the
//! operation; every other field belongs to the handler. A response is a
//! single JSON object with a boolean `success` field and, on failure, an
//! `error` message. Both sides of the socket exchange exactly one of each per
//! connection.

mod command;
mod response;

pub use command::{Command, CommandParseError, HANDSHAKE_COMMAND};
pub use response::{Response, TIMED_OUT_MESSAGE};
