//! error system used around the crate.
use std::{error, fmt, io, num};

#[derive(Debug, PartialEq)]
pub enum ParseErr {
    Int(num::ParseIntError),
    StatusErr,
    HeadersErr,
    UriErr,
    Invalid,
    Empty,
}

impl error::Error for ParseErr {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        use self::ParseErr::*;

        match self {
            Int(e) => Some(e),
            StatusErr | HeadersErr | UriErr | Invalid | Empty => None,
        }
    }
}

impl fmt::Display for ParseErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::ParseErr::*;

        let err = match self {
            Int(_) => "cannot parse number",
            Invalid => "invalid value",
            Empty => "nothing to parse",
            StatusErr => "status line contains invalid values",
            HeadersErr => "headers contain invalid values",
            UriErr => "URI contains invalid characters",
        };
        write!(f, "parse error: {}", err)
    }
}

impl From<num::ParseIntError> for ParseErr {
    fn from(e: num::ParseIntError) -> Self {
        ParseErr::Int(e)
    }
}

#[derive(Debug)]
pub enum Error {
    Usage(String),
    IO(io::Error),
    Parse(ParseErr),
    Scheme(String),
    Redirect(String),
    Timeout,
    Tls(String),
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        use self::Error::*;

        match self {
            IO(e) => Some(e),
            Parse(e) => Some(e),
            Usage(_) | Scheme(_) | Redirect(_) | Timeout | Tls(_) => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Error::*;

        match self {
            Usage(msg) => write!(f, "{}", msg),
            IO(e) => write!(f, "{}", e),
            Parse(e) => e.fmt(f),
            Scheme(s) => write!(f, "unsupported protocol scheme {:?}", s),
            Redirect(msg) => write!(f, "redirect error: {}", msg),
            Timeout => write!(f, "timeout exceeded"),
            Tls(msg) => write!(f, "TLS error: {}", msg),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout,
            _ => Error::IO(e),
        }
    }
}

impl From<ParseErr> for Error {
    fn from(e: ParseErr) -> Self {
        Error::Parse(e)
    }
}

#[cfg(all(feature = "rust-tls", not(feature = "native-tls")))]
impl From<rustls::Error> for Error {
    fn from(e: rustls::Error) -> Self {
        Error::Tls(e.to_string())
    }
}

#[cfg(feature = "native-tls")]
impl From<native_tls::Error> for Error {
    fn from(e: native_tls::Error) -> Self {
        Error::Tls(e.to_string())
    }
}

#[cfg(feature = "native-tls")]
impl<T> From<native_tls::HandshakeError<T>> for Error {
    fn from(e: native_tls::HandshakeError<T>) -> Self {
        match e {
            native_tls::HandshakeError::WouldBlock(_) => Error::Timeout,
            native_tls::HandshakeError::Failure(e) => Error::Tls(e.to_string()),
        }
    }
}
