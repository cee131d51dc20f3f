//! Error types for loading, sampling and writing pairs.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PairError>;

/// A single input line that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line has no `" ,"` separating category from text.
    #[error("line {line_number}: missing \" ,\" delimiter in {line:?}")]
    MissingDelimiter {
        /// 1-based line number
        line_number: usize,
        line: String,
    },
}

#[derive(Debug, Error)]
pub enum PairError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed input: {0}")]
    Parse(#[from] ParseError),

    /// Not enough records to form a pair without self-pairing.
    #[error("insufficient data: required {required} records, actual {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// A first draw that is a multiple of 3 demands a same-category partner
    /// and the record's category has no other member.
    #[error("record {first_index} has no other record in its category")]
    NoSameCategoryPartner { first_index: usize },

    /// A redraw loop hit its cap.
    #[error("no partner accepted for record {first_index} after {redraws} redraws")]
    SamplingExhausted { first_index: usize, redraws: usize },
}

impl PairError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn insufficient_data(required: usize, actual: usize) -> Self {
        Self::InsufficientData { required, actual }
    }
}
