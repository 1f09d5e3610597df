//! Errors from decoding fonts and running font programs.

use crate::binary::read::ReadEof;
use crate::graphite::code::CodeError;
use crate::postscript::CharStringError;
use crate::tag::DisplayTag;
use std::fmt;

/// Failure of the shaping entry points that decode face data on demand.
///
/// Shaping itself recovers from anything it meets at run time.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ShapingError {
    Parse(ParseError),
    CharString(CharStringError),
    Code(CodeError),
}

impl From<ParseError> for ShapingError {
    fn from(error: ParseError) -> Self {
        ShapingError::Parse(error)
    }
}

impl From<CharStringError> for ShapingError {
    fn from(error: CharStringError) -> Self {
        ShapingError::CharString(error)
    }
}

impl From<CodeError> for ShapingError {
    fn from(error: CodeError) -> Self {
        ShapingError::Code(error)
    }
}

impl From<std::num::TryFromIntError> for ShapingError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ShapingError::Parse(ParseError::BadValue)
    }
}

impl fmt::Display for ShapingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapingError::Parse(err) => write!(f, "font data: {}", err),
            ShapingError::CharString(err) => write!(f, "charstring: {}", err),
            ShapingError::Code(err) => write!(f, "graphite code: {}", err),
        }
    }
}

impl std::error::Error for ShapingError {}

/// Problems found while decoding font data.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    /// The data ended before a read finished.
    BadEof,
    BadValue,
    BadVersion,
    /// An offset pointed outside its parent.
    BadOffset,
    /// An index read from the font is out of range for what it indexes.
    BadIndex,
    LimitExceeded,
    MissingValue,
    /// The face has no table with this tag.
    MissingTable(u32),
    /// Compressed Graphite table data could not be expanded.
    CompressionError,
    NotImplemented,
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::BadEof
    }
}

impl From<std::num::TryFromIntError> for ParseError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ParseError::BadValue
    }
}

impl From<CharStringError> for ParseError {
    fn from(_error: CharStringError) -> Self {
        ParseError::BadValue
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ParseError::BadEof => "unexpected end of data",
            ParseError::BadValue => "invalid value",
            ParseError::BadVersion => "unsupported version",
            ParseError::BadOffset => "offset out of range",
            ParseError::BadIndex => "index out of range",
            ParseError::LimitExceeded => "limit exceeded",
            ParseError::MissingValue => "required value missing",
            ParseError::MissingTable(tag) => {
                return write!(f, "no '{}' table", DisplayTag(*tag));
            }
            ParseError::CompressionError => "bad compressed data",
            ParseError::NotImplemented => "unsupported format",
        };
        f.write_str(message)
    }
}

impl std::error::Error for ParseError {}
