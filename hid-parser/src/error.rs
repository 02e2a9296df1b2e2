use thiserror::Error;

/// Errors surfaced to the device-transport and CLI collaborators.
/// Descriptor decoding itself never fails.
#[derive(Debug, Error)]
pub enum HidError {
    /// A caller-supplied ID, buffer or range failed a precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An OS-level call failed; the source carries the OS error code.
    #[error("{op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// An OS call transferred fewer bytes than requested.
    #[error("{op}: short transfer, wanted {want} bytes, got {got}")]
    ProtocolShort {
        op: &'static str,
        want: usize,
        got: usize,
    },
}

pub type Result<T> = std::result::Result<T, HidError>;
