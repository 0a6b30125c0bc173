use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("J2K encoding failed: {0}")]
    Encode(String),
    #[error("could not create J2K image container")]
    Container,
    #[error("network error: {0}")]
    Network(#[source] io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("unknown scaler `{0}`")]
    UnknownScaler(String),
    #[error("unknown post-process filter `{0}`")]
    UnknownPostProcess(String),
    #[error("unsupported pixel format {0}")]
    UnsupportedPixelFormat(i32),
    #[error("unknown colour LUT index {0}")]
    UnknownColourLut(usize),
    #[error("bad image: {0}")]
    BadImage(String),
    #[error("could not write frame file {}: {source}", path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Whether a caller may reasonably retry this frame elsewhere,
    /// e.g. by encoding locally or picking another worker.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Protocol(_))
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Network(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    pub(crate) fn encode(msg: impl Into<String>) -> Self {
        Error::Encode(msg.into())
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    pub(crate) fn bad_image(msg: impl Into<String>) -> Self {
        Error::BadImage(msg.into())
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Network(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_and_protocol_are_recoverable() {
        assert!(Error::Network(io::Error::new(io::ErrorKind::TimedOut, "slow")).is_recoverable());
        assert!(Error::protocol("garbage").is_recoverable());
        assert!(!Error::encode("empty codestream").is_recoverable());
        assert!(!Error::Container.is_recoverable());
    }

    #[test]
    fn timeouts_are_detected() {
        assert!(Error::Network(io::Error::new(io::ErrorKind::TimedOut, "slow")).is_timeout());
        assert!(!Error::Network(io::Error::new(io::ErrorKind::UnexpectedEof, "eof")).is_timeout());
    }

    #[test]
    fn write_file_names_the_path() {
        let err = Error::WriteFile {
            path: PathBuf::from("/tmp/00000001.j2c.tmp"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("00000001.j2c.tmp"));
    }
}
