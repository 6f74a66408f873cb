use core::fmt::{self, Display};
use hyper::StatusCode;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The poll does not exist, or it has not been published yet.
    NotFound,
    /// The store failed in a way the handlers cannot recover from.
    Fatal,
}

impl From<db::error::Error> for Error {
    fn from(err: db::error::Error) -> Self {
        match err {
            db::error::Error::NotFound => Self::NotFound,
            db::error::Error::BadInput | db::error::Error::Fatal => Self::Fatal,
        }
    }
}

impl Error {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "Poll not found.",
            Self::Fatal => "Oops! We have encountered an unrecoverable error on our end.",
        })
    }
}

pub type Result<T> = core::result::Result<T, Error>;
