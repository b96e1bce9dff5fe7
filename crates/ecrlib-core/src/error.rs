//! Error types for ecrlib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport failures, broken framing on
//! the wire, exhausted retransmissions, and faults reported by the device in
//! its status block are all captured here.

use crate::types::FaultSet;

/// The error type for all ecrlib operations.
///
/// Two groups of variants exist. Stream-level failures ([`Error::Framing`],
/// [`Error::RetryExhausted`], [`Error::ConnectionLost`]) mean the byte stream
/// to the device can no longer be trusted and the connection is gone.
/// [`Error::Device`] is a per-request failure: the device answered, but its
/// status block reported a fault for that one command.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port open/read/write).
    #[error("transport error: {0}")]
    Transport(String),

    /// A reply arrived intact but its payload could not be interpreted.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for a response from the device.
    #[error("timeout waiting for response")]
    Timeout,

    /// An invalid parameter was passed to a device command.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the device has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the device was lost, or was torn down because of
    /// an earlier stream-level failure.
    #[error("connection lost")]
    ConnectionLost,

    /// The inbound byte stream violated the frame structure. The stream is
    /// now unsynchronized.
    #[error("framing fault: {0}")]
    Framing(String),

    /// The device kept rejecting the same frame with NAK.
    #[error("retries exhausted after {retries} NAKs")]
    RetryExhausted {
        /// Number of NAKs received for the frame.
        retries: u32,
    },

    /// The device reported one or more faults in its status block.
    ///
    /// The set may be empty when a fault group flag was raised without any
    /// specific fault bit.
    #[error("device fault: {0}")]
    Device(FaultSet),

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this error means the connection is unusable and
    /// no further request on it can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Framing(_)
                | Error::RetryExhausted { .. }
                | Error::ConnectionLost
                | Error::NotConnected
        )
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Fault;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("port busy".into());
        assert_eq!(e.to_string(), "transport error: port busy");
    }

    #[test]
    fn error_display_framing() {
        let e = Error::Framing("invalid terminator 0x07".into());
        assert_eq!(e.to_string(), "framing fault: invalid terminator 0x07");
    }

    #[test]
    fn error_display_retry_exhausted() {
        let e = Error::RetryExhausted { retries: 12 };
        assert_eq!(e.to_string(), "retries exhausted after 12 NAKs");
    }

    #[test]
    fn error_display_device() {
        let faults: FaultSet = [Fault::SyntaxError].into_iter().collect();
        let e = Error::Device(faults);
        assert_eq!(e.to_string(), "device fault: syntax error");
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for response");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn fatal_classification() {
        assert!(Error::Framing("x".into()).is_fatal());
        assert!(Error::RetryExhausted { retries: 12 }.is_fatal());
        assert!(Error::ConnectionLost.is_fatal());
        assert!(!Error::Device(FaultSet::new()).is_fatal());
        assert!(!Error::Timeout.is_fatal());
        assert!(!Error::Protocol("bad reply".into()).is_fatal());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
