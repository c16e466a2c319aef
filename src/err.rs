use thiserror::Error;

use crate::object::{ContentKey, Field, RevisionId};

#[derive(Debug, Error)]
pub enum Error {
    /// The text handed to a patch does not match the side recorded in the script.
    #[error("script mismatch on {side} side: {detail}")]
    ScriptMismatch { side: Side, detail: String },

    #[error("revision does not belong to {expected}: predecessor is {found}")]
    IdentityMismatch {
        expected: ContentKey,
        found: ContentKey,
    },

    #[error("unknown revision {0}")]
    UnknownRevision(RevisionId),

    #[error("broken chain: {0}")]
    BrokenChain(String),

    /// A stored revision does not replay. `field` is `None` when every script
    /// applied but the result fails the revision's content hash.
    #[error("corrupt revision {revision}{}: {source}", field_suffix(.field))]
    CorruptScript {
        revision: RevisionId,
        field: Option<Field>,
        #[source]
        source: Box<Error>,
    },

    #[error("revision {revision} reconstructs to content hash {found}, recorded {expected}")]
    HashMismatch {
        revision: RevisionId,
        expected: String,
        found: String,
    },

    /// The diff engine produced a script that fails its own round trip.
    #[error("internal inconsistency (engine defect): {0}")]
    InternalInconsistency(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("codec: {0}")]
    Codec(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Before,
    After,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Before => write!(f, "before"),
            Side::After => write!(f, "after"),
        }
    }
}

fn field_suffix(field: &Option<Field>) -> String {
    match field {
        Some(field) => format!(" ({} script)", field),
        None => String::new(),
    }
}

impl Error {
    pub fn from_msg_err<E: std::error::Error>(msg: &str, err: &E) -> Self {
        Self::Storage(format!("{}: {}", msg, err))
    }

    pub fn codec<E: ToString>(err: E) -> Self {
        Self::Codec(err.to_string())
    }

    /// True only for engine bugs; every other kind is bad or corrupted input.
    pub fn is_defect(&self) -> bool {
        match self {
            Error::InternalInconsistency(_) => true,
            Error::CorruptScript { source, .. } => source.is_defect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
