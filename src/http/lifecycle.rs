//! Client lifecycle state machine
//!
//! `Uninitialized -> Active -> Closed`. Activation is lazy (first request) or
//! explicit (`open`). Once closed, a client never becomes active again.

use crate::error::{Error, Result};

/// Lifecycle of an underlying connection handle `C`
#[derive(Debug, Default)]
pub enum ClientState<C> {
    /// No connection built yet
    #[default]
    Uninitialized,
    /// Connection ready for requests
    Active(C),
    /// Connection released; requests are rejected
    Closed,
}

impl<C> ClientState<C> {
    /// Return the active handle, building it on first use
    pub fn activate<F>(&mut self, build: F) -> Result<&C>
    where
        F: FnOnce() -> Result<C>,
    {
        if let ClientState::Uninitialized = self {
            *self = ClientState::Active(build()?);
        }
        self.handle()
    }

    /// The live handle, or `ClientClosed` when there is none
    fn handle(&self) -> Result<&C> {
        match self {
            ClientState::Active(handle) => Ok(handle),
            ClientState::Uninitialized | ClientState::Closed => Err(Error::ClientClosed),
        }
    }

    /// Transition to `Closed`, returning the handle if one was active
    ///
    /// Closing an already closed state is a no-op that returns `None`.
    pub fn close(&mut self) -> Option<C> {
        match std::mem::replace(self, ClientState::Closed) {
            ClientState::Active(handle) => Some(handle),
            ClientState::Uninitialized | ClientState::Closed => None,
        }
    }

    /// Whether the state currently holds a live handle
    pub fn is_active(&self) -> bool {
        matches!(self, ClientState::Active(_))
    }

    /// Whether the state has been closed
    pub fn is_closed(&self) -> bool {
        matches!(self, ClientState::Closed)
    }
}
