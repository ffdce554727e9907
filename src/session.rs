// Copyright 2020 Google LLC
//
// Use of this source code is governed by an MIT-style license that can be found
// in the LICENSE file or at https://opensource.org/licenses/MIT.

//! Narrow interface between action handlers and the outside world.
//!
//! Handlers never talk to the transport directly. Everything they produce goes
//! through a `Session`: results are emitted with `reply`, file contents are
//! handed over blob by blob with `upload` and liveness is signalled with
//! `heartbeat`.

/// A type representing action results sent back through the session.
pub trait Response: std::fmt::Debug + std::fmt::Display + 'static {}

/// A piece of file contents addressed by its SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub digest: Vec<u8>,
    pub data: Vec<u8>,
}

/// An abstraction over the environment in which an action is executed.
pub trait Session {

    /// Emits a single result of the action.
    fn reply<R: Response>(&mut self, response: R) -> Result<()>;

    /// Transfers a blob of file contents to the blob store.
    fn upload(&mut self, blob: Blob) -> Result<()>;

    /// Signals that the action is still alive.
    ///
    /// Implementations may return `Error::Cancelled` to make the action stop
    /// as soon as possible.
    fn heartbeat(&mut self) -> Result<()>;
}

/// A type for errors that can occur when executing an action.
#[derive(Debug)]
pub enum Error {
    /// Action-specific failure.
    Action(Box<dyn std::error::Error>),
    /// The action was cancelled by the environment.
    Cancelled,
    /// Results or blobs could not be delivered.
    Send(std::io::Error),
}

impl Error {

    /// Converts an arbitrary action-issued error to a session error.
    pub fn action<E>(error: E) -> Error
    where
        E: std::error::Error + 'static,
    {
        Error::Action(Box::new(error))
    }
}

impl std::fmt::Display for Error {

    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Error::*;

        match *self {
            Action(ref error) => {
                write!(fmt, "action error: {}", error)
            }
            Cancelled => {
                write!(fmt, "action cancelled")
            }
            Send(ref error) => {
                write!(fmt, "failed to send data: {}", error)
            }
        }
    }
}

impl std::error::Error for Error {

    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use Error::*;

        match *self {
            Action(ref error) => Some(error.as_ref()),
            Cancelled => None,
            Send(ref error) => Some(error),
        }
    }
}

impl From<std::io::Error> for Error {

    fn from(error: std::io::Error) -> Error {
        Error::Send(error)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
