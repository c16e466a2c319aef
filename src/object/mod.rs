use std::fmt;

use bincode::{Decode, Encode};
use blake2::{Blake2s256, Digest};
use serde::{Deserialize, Serialize};

use crate::{
    err::{Error, Result},
    util::to_hex,
};

pub mod chain;
pub mod revision;
pub mod timestamp;

pub use chain::RevisionChain;
pub use revision::{FieldScripts, RevisionBuilder, RevisionParts, RevisionRecord, Snapshot};
pub use timestamp::Timestamp;

/// Revision identifier, unique within one chain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Encode, Decode,
)]
#[serde(transparent)]
pub struct RevisionId(pub i64);

impl RevisionId {
    /// The id after this one. Fails once the id space is used up.
    pub fn next(self) -> Result<Self> {
        self.0
            .checked_add(1)
            .map(Self)
            .ok_or_else(|| Error::BrokenChain(format!("revision id space exhausted after {}", self)))
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The content item a chain belongs to, scoped by its site.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub struct ContentKey {
    pub site_id: i64,
    pub content_id: i64,
}

const STORAGE_PREFIX: &str = "revisions/";

impl ContentKey {
    pub fn new(site_id: i64, content_id: i64) -> Self {
        Self {
            site_id,
            content_id,
        }
    }

    pub fn storage_key(&self) -> String {
        format!("{}{}/{}", STORAGE_PREFIX, self.site_id, self.content_id)
    }

    pub fn from_storage_key(key: &[u8]) -> Option<Self> {
        let key = std::str::from_utf8(key).ok()?;
        let (site, content) = key.strip_prefix(STORAGE_PREFIX)?.split_once('/')?;
        Some(Self::new(site.parse().ok()?, content.parse().ok()?))
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site {} item {}", self.site_id, self.content_id)
    }
}

/// Editable text fields of a content item, in their fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Excerpt,
    Content,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Title, Field::Excerpt, Field::Content];
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Field::Title => "title",
                Field::Excerpt => "excerpt",
                Field::Content => "content",
            }
        )
    }
}

/// Blake2s-256 of a snapshot, hex encoded. Fields are length-prefixed so
/// moving text between fields changes the hash.
pub fn object_hash(snapshot: &Snapshot) -> String {
    let mut hasher = Blake2s256::new();
    for field in Field::ALL {
        let text = snapshot.get(field);
        hasher.update((text.len() as u64).to_be_bytes());
        hasher.update(text.as_bytes());
    }
    to_hex(&hasher.finalize())
}
