use core::fmt::{self, Display};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The entity does not exist, or is not visible yet.
    NotFound,
    /// The input violates a constraint of the schema (e.g. an empty question).
    BadInput,
    /// Unrecoverable error.
    Fatal,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "Resource not found.",
            Self::BadInput => "Unacceptable input.",
            Self::Fatal => "Unexpected database error.",
        })
    }
}

pub type Result<T> = core::result::Result<T, Error>;
