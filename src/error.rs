use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("syntax error at line {line}: {kind}")]
    Syntax { line: usize, kind: SyntaxError },

    #[error("unexpected end of input after line {line}, expected {expected}")]
    UnexpectedEof { line: usize, expected: &'static str },

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error("failed to write {path:?}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write BVH: {0}")]
    Write(#[source] io::Error),

    #[error("no motion is loaded")]
    NotLoaded,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("expected {expected}, found `{found}`")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },

    #[error("unbalanced `}}`")]
    UnbalancedBrace,

    #[error("unknown channel `{0}`")]
    UnknownChannel(String),

    #[error("invalid number `{0}`")]
    InvalidNumber(String),

    #[error("missing joint name")]
    MissingName,

    #[error("hierarchy has no ROOT joint")]
    MissingRoot,

    #[error("joint `{0}` declares more than one End Site")]
    DuplicateEndSite(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsistencyError {
    #[error("frame {frame} (line {line}) has {actual} values, expected {expected}")]
    RowLength {
        frame: usize,
        line: usize,
        expected: usize,
        actual: usize,
    },

    #[error("motion declares {expected} frames but only {actual} were found")]
    FrameCount { expected: usize, actual: usize },

    #[error("motion buffer holds {actual} values, expected {expected}")]
    MotionLength { expected: usize, actual: usize },

    #[error("{num_frame} frames of {num_channel} channels do not fit in memory")]
    MotionSize { num_frame: usize, num_channel: usize },

    #[error("frame {frame}, channel {channel} is not a finite number")]
    NonFinite { frame: usize, channel: usize },

    #[error("frame time {0} is not a finite, non-negative number")]
    Interval(f64),

    #[error("joint {joint}: {reason}")]
    Tree { joint: usize, reason: &'static str },

    #[error("channel {channel}: {reason}")]
    Channel { channel: usize, reason: &'static str },

    #[error("hierarchy has no joints")]
    Empty,
}

impl Error {
    pub(crate) fn syntax(line: usize, kind: SyntaxError) -> Self {
        Error::Syntax { line, kind }
    }

    pub(crate) fn unexpected(line: usize, expected: &'static str, found: &str) -> Self {
        Error::syntax(
            line,
            SyntaxError::UnexpectedToken {
                expected,
                found: found.to_owned(),
            },
        )
    }
}
