use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Auth(String),
    Command { status: u16, message: String },
    Protocol(String),
    InvalidZone(String),
    InvalidMode(String),
    InvalidTemperature { value: f64, min: f64, max: f64 },
    Config(String),
    Io(std::io::Error),
}

/// Coarse classification used by entities to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credentials rejected. Retrying will not help.
    Auth,
    /// Network, timeout, 5xx or malformed response. Retried on the next poll.
    Transient,
    /// A command was rejected, remotely or by local validation.
    Command,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Auth(_) | Error::Config(_) => ErrorKind::Auth,
            Error::Command { .. }
            | Error::InvalidMode(_)
            | Error::InvalidTemperature { .. } => ErrorKind::Command,
            Error::Http(_) | Error::Protocol(_) | Error::InvalidZone(_) | Error::Io(_) => {
                ErrorKind::Transient
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Auth(msg) => write!(f, "authentication failed: {msg}"),
            Error::Command { status, message } => {
                write!(f, "command rejected (HTTP {status}): {message}")
            }
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::InvalidZone(id) => write!(f, "invalid zone: {id}"),
            Error::InvalidMode(mode) => write!(f, "invalid mode: {mode}"),
            Error::InvalidTemperature { value, min, max } => {
                write!(f, "invalid temperature: {value} not in {min}..={max}")
            }
            Error::Config(msg) => write!(f, "invalid configuration: {msg}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Protocol(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(Error::Auth("bad".into()).kind(), ErrorKind::Auth);
        assert!(Error::Auth("bad".into()).is_fatal());
        assert_eq!(Error::Protocol("x".into()).kind(), ErrorKind::Transient);
        assert_eq!(Error::InvalidZone("7".into()).kind(), ErrorKind::Transient);
        assert_eq!(Error::InvalidMode("auto".into()).kind(), ErrorKind::Command);
        assert_eq!(
            Error::Command { status: 422, message: String::new() }.kind(),
            ErrorKind::Command
        );
    }

    #[test]
    fn display_temperature() {
        let e = Error::InvalidTemperature { value: 40.0, min: 15.0, max: 30.0 };
        assert_eq!(e.to_string(), "invalid temperature: 40 not in 15..=30");
    }
}
