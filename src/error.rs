use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Network or HTTP failure talking to a vendor. Recovered by skipping
    /// that fetch for the current cycle; retried on the next one.
    Http(reqwest::Error),
    /// Transport failure on a non-HTTP channel (message stream, socket).
    Transport(String),
    /// Vendor session/token invalid or expired. The vendor client clears
    /// its session; list fetches retry a bounded number of times before
    /// surfacing this.
    Auth(String),
    /// Malformed vendor payload where structured decoding was expected.
    Decode(String),
    /// Missing or invalid service configuration. Fatal at construction.
    Config(String),
    /// Device identity not present in the registry.
    UnknownDevice(String),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Transport(msg) => write!(f, "transport error: {msg}"),
            Error::Auth(msg) => write!(f, "authentication failed: {msg}"),
            Error::Decode(msg) => write!(f, "decode error: {msg}"),
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::UnknownDevice(id) => write!(f, "unknown device: {id}"),
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
        Error::Decode(e.to_string())
    }
}

impl Error {
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
