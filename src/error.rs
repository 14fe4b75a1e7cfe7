use std::fmt::{self, Debug, Display};
use std::io;
use std::net::AddrParseError;
use std::result;
use std::sync::PoisonError;

/// The short codes that travel on the wire as `- <CODE>` responses.
///
/// These are not generic Rust error categories: they are the exact
/// vocabulary the protocol exposes to clients (see the error taxonomy
/// in the wire-level documentation this crate implements).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Code {
    /// caller-supplied argument violates a precondition (blank string,
    /// missing argument count, invalid numeric)
    Einval,
    /// unique-constraint violation on create (duplicate user or group name)
    Eexist,
    /// identifier did not resolve, or an update matched zero rows
    Enoent,
    /// `client auth` did not match any rule
    Eperm,
    /// command blocked by the authorization filter
    Eaccess,
    /// unexpected backend failure, malformed protocol response, or unknown command
    Efault,
    /// stored value failed to parse as an integer (`loginstats`)
    Nonint,
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Einval => "EINVAL",
            Code::Eexist => "EEXIST",
            Code::Enoent => "ENOENT",
            Code::Eperm => "EPERM",
            Code::Eaccess => "EACCES",
            Code::Efault => "EFAULT",
            Code::Nonint => "NOINT",
        }
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    err: Box<ErrorKind>, // use a Box to keep the Result type smaller
}

#[derive(Debug)]
pub enum ErrorKind {
    /// a wire-level error code, plus the message logged server-side
    Code(Code, String),
    StringError(String),
    IOError(io::Error),
    YAMLError(serde_yaml::Error),
    TlsError(rustls::Error),
    SqlError(sqlx::Error),
    RegexError(regex::Error),
    PoisonError,
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    pub fn new<S: ToString>(s: S) -> Self {
        Error {
            err: Box::new(ErrorKind::StringError(s.to_string())),
        }
    }

    pub fn code<S: ToString>(code: Code, msg: S) -> Self {
        Error {
            err: Box::new(ErrorKind::Code(code, msg.to_string())),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.err
    }

    /// The wire code this error maps to. Anything that isn't already a
    /// tagged protocol error collapses to `EFAULT`, matching the
    /// "unexpected backend failure" catch-all in the error taxonomy.
    pub fn wire_code(&self) -> Code {
        match &*self.err {
            ErrorKind::Code(code, _) => *code,
            _ => Code::Efault,
        }
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Error {
            err: Box::new(ErrorKind::StringError(String::from(err))),
        }
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error {
            err: Box::new(ErrorKind::StringError(err)),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error {
            err: Box::new(ErrorKind::IOError(err)),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error {
            err: Box::new(ErrorKind::YAMLError(err)),
        }
    }
}

impl From<AddrParseError> for Error {
    fn from(err: AddrParseError) -> Self {
        Error::new(err)
    }
}

impl<Guard> From<PoisonError<Guard>> for Error {
    fn from(_err: PoisonError<Guard>) -> Self {
        Error {
            err: Box::new(ErrorKind::PoisonError),
        }
    }
}

impl From<rustls::Error> for Error {
    fn from(err: rustls::Error) -> Self {
        Error {
            err: Box::new(ErrorKind::TlsError(err)),
        }
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error {
            err: Box::new(ErrorKind::RegexError(err)),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        // A unique-constraint violation on create is the one backend
        // failure mode with a more specific wire code than EFAULT.
        if let sqlx::Error::Database(ref dbe) = err {
            if dbe.code().as_deref() == Some("2067") // sqlite UNIQUE
                || dbe.code().as_deref() == Some("23000") // mysql duplicate entry
                || dbe.code().as_deref() == Some("23505")
            // postgres unique_violation
            {
                return Error::code(Code::Eexist, dbe.to_string());
            }
        }
        Error {
            err: Box::new(ErrorKind::SqlError(err)),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.err, f)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Code(code, msg) => write!(f, "{}: {}", code, msg),
            ErrorKind::StringError(s) => f.write_str(s),
            ErrorKind::IOError(e) => Display::fmt(&e, f),
            ErrorKind::YAMLError(e) => Display::fmt(&e, f),
            ErrorKind::TlsError(e) => Display::fmt(&e, f),
            ErrorKind::SqlError(e) => Display::fmt(&e, f),
            ErrorKind::RegexError(e) => Display::fmt(&e, f),
            ErrorKind::PoisonError => f.write_str("another thread panicked while holding the mutex"),
        }
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ErrorKind::Code(a, am), ErrorKind::Code(b, bm)) => a == b && am == bm,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl Eq for ErrorKind {}
