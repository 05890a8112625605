//! Device sessions: the remote CLI the collector probes.
//!
//! The collector only depends on the [`SessionFactory`] and
//! [`DeviceSession`] traits. [`SshSessionFactory`] is the production
//! implementation, driving an interactive shell over russh.

mod buffer;
mod ssh;
mod transport;

pub use buffer::PatternBuffer;
pub use ssh::{SshSession, SshSessionFactory};

use std::future::Future;

use regex::bytes::Regex;

use crate::config::DeviceDescriptor;
use crate::error::SessionError;

/// An open CLI session on one device.
pub trait DeviceSession: Send {
    /// Return the device's current prompt, e.g. `[cp-bgl-01/local]cp#`.
    fn resolve_prompt(&mut self) -> impl Future<Output = Result<String, SessionError>> + Send;

    /// Send a command and return its output once `terminator` is seen.
    ///
    /// The returned text has the command echo and the trailing prompt
    /// removed.
    fn send_command(
        &mut self,
        command: &str,
        terminator: &Regex,
    ) -> impl Future<Output = Result<String, SessionError>> + Send;

    /// Release the session.
    fn close(self) -> impl Future<Output = Result<(), SessionError>> + Send
    where
        Self: Sized;
}

/// Opens sessions from connection descriptors.
///
/// Implementations must report rejected credentials as
/// [`SessionError::AuthenticationFailed`] so they can be told apart from
/// connectivity problems.
pub trait SessionFactory: Send + Sync {
    type Session: DeviceSession;

    /// Connect and authenticate to a device.
    fn open(
        &self,
        device: &DeviceDescriptor,
    ) -> impl Future<Output = Result<Self::Session, SessionError>> + Send;
}
