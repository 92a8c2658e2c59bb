//! Message queues used to publish device updates.

use thiserror::Error;

pub mod stateless;

/// Size of all pipes.
pub const PIPE_SIZE: usize = 10;

/// Something went wrong in Receiver.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum RecvError {
    /// The Pipe was closed.
    #[error("The pipe was closed")]
    Closed,
}
