use std::collections::{HashMap, HashSet};

use super::{ContentKey, Field, RevisionId, RevisionRecord, Snapshot, object_hash};
use crate::{
    diff::patch::apply_forward,
    err::{Error, Result, Side},
};

/// Append-only, predecessor-linked revisions of one content item.
///
/// Records are kept in append order. Structure is checked lazily: a chain
/// loaded from storage may be broken, and the walk that hits the break
/// reports it.
#[derive(Debug, Clone)]
pub struct RevisionChain {
    key: ContentKey,
    records: Vec<RevisionRecord>,
    index: HashMap<RevisionId, usize>,
}

impl RevisionChain {
    pub fn new(key: ContentKey) -> Self {
        Self {
            key,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Indexes `records` without checking their links. Duplicate ids and
    /// records of another content item are rejected.
    pub fn from_records(key: ContentKey, records: Vec<RevisionRecord>) -> Result<Self> {
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if record.key() != key {
                return Err(Error::IdentityMismatch {
                    expected: key,
                    found: record.key(),
                });
            }
            if index.insert(record.id(), i).is_some() {
                return Err(Error::BrokenChain(format!(
                    "revision {} appears twice in {}",
                    record.id(),
                    key
                )));
            }
        }
        Ok(Self {
            key,
            records,
            index,
        })
    }

    pub fn key(&self) -> ContentKey {
        self.key
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[RevisionRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RevisionRecord> {
        self.records
    }

    pub fn get(&self, id: RevisionId) -> Option<&RevisionRecord> {
        self.index.get(&id).map(|&i| &self.records[i])
    }

    /// Most recently appended revision.
    pub fn head(&self) -> Option<&RevisionRecord> {
        self.records.last()
    }

    pub fn root(&self) -> Option<&RevisionRecord> {
        self.records.iter().find(|r| r.is_root())
    }

    /// Id for the next appended revision.
    pub fn next_id(&self) -> Result<RevisionId> {
        match self.records.iter().map(RevisionRecord::id).max() {
            Some(last) => last.next(),
            None => Ok(RevisionId(1)),
        }
    }

    /// Records from `id` back to the root, newest first.
    pub fn lineage(&self, id: RevisionId) -> Result<Vec<&RevisionRecord>> {
        let mut current = self.get(id).ok_or(Error::UnknownRevision(id))?;
        let mut lineage = vec![current];
        while let Some(parent) = current.parent() {
            let child = current.id();
            current = self.get(parent).ok_or_else(|| {
                log::warn!("{}: revision {} points at missing {}", self.key, child, parent);
                Error::BrokenChain(format!(
                    "revision {} points at missing predecessor {}",
                    child, parent
                ))
            })?;
            // A walk longer than the chain must revisit a record.
            if lineage.len() == self.records.len() {
                return Err(Error::BrokenChain(format!(
                    "cycle through revision {} in {}",
                    current.id(),
                    self.key
                )));
            }
            lineage.push(current);
        }
        Ok(lineage)
    }

    /// Rebuilds the three fields as of revision `id` by replaying every
    /// script from the root. Either the whole snapshot comes back or an
    /// error does.
    pub fn reconstruct(&self, id: RevisionId) -> Result<Snapshot> {
        let lineage = self.lineage(id)?;
        log::debug!("{}: reconstructing {} over {} revisions", self.key, id, lineage.len());
        let mut snapshot = Snapshot::default();
        for record in lineage.into_iter().rev() {
            snapshot = replay(record, &snapshot)?;
        }
        Ok(snapshot)
    }

    /// Snapshots of every revision from the root to the head, in one pass.
    pub fn history(&self) -> Result<Vec<(RevisionId, Snapshot)>> {
        let Some(head) = self.head() else {
            return Ok(Vec::new());
        };
        let lineage = self.lineage(head.id())?;
        let mut history = Vec::with_capacity(lineage.len());
        let mut snapshot = Snapshot::default();
        for record in lineage.into_iter().rev() {
            snapshot = replay(record, &snapshot)?;
            history.push((record.id(), snapshot.clone()));
        }
        Ok(history)
    }

    /// Checks the whole chain: one root, no forks, no dangling or cyclic
    /// links, every record reachable from the head, and every script
    /// replaying cleanly.
    pub fn validate(&self) -> Result<()> {
        let roots: Vec<_> = self.records.iter().filter(|r| r.is_root()).collect();
        match roots.len() {
            0 if self.records.is_empty() => return Ok(()),
            0 => return Err(Error::BrokenChain(format!("{} has no root revision", self.key))),
            1 => {}
            n => {
                return Err(Error::BrokenChain(format!(
                    "{} has {} root revisions",
                    self.key, n
                )));
            }
        }

        let mut children = HashSet::with_capacity(self.records.len());
        for parent in self.records.iter().filter_map(RevisionRecord::parent) {
            if !children.insert(parent) {
                return Err(Error::BrokenChain(format!(
                    "revision {} has more than one successor",
                    parent
                )));
            }
        }

        let history = self.history()?;
        if history.len() != self.records.len() {
            return Err(Error::BrokenChain(format!(
                "{} of {} revisions are unreachable from the head",
                self.records.len() - history.len(),
                self.records.len()
            )));
        }
        Ok(())
    }

    /// Appends a record that extends the current head. The record's scripts
    /// must start from the head's text.
    pub fn append(&mut self, record: RevisionRecord) -> Result<()> {
        if record.key() != self.key {
            return Err(Error::IdentityMismatch {
                expected: self.key,
                found: record.key(),
            });
        }
        if self.index.contains_key(&record.id()) {
            return Err(Error::BrokenChain(format!(
                "revision {} already exists in {}",
                record.id(),
                self.key
            )));
        }
        let base = match (self.head(), record.parent()) {
            (None, None) => Snapshot::default(),
            (Some(head), Some(parent)) if head.id() == parent => head.snapshot(),
            (head, parent) => {
                return Err(Error::BrokenChain(format!(
                    "revision {} must follow head {:?}, not {:?}",
                    record.id(),
                    head.map(RevisionRecord::id),
                    parent
                )));
            }
        };
        replay(&record, &base)?;
        log::trace!("{}: appended revision {}", self.key, record.id());
        self.index.insert(record.id(), self.records.len());
        self.records.push(record);
        Ok(())
    }
}

/// Applies one record's scripts on top of `previous`, verifying the result
/// against the record's content hash.
fn replay(record: &RevisionRecord, previous: &Snapshot) -> Result<Snapshot> {
    let mut next = Snapshot::default();
    for field in Field::ALL {
        let script = record.diffs().get(field);
        if record.is_root() && !script.is_creation() {
            return Err(corrupt(
                record,
                field,
                Error::ScriptMismatch {
                    side: Side::Before,
                    detail: "root revision scripts may only add".to_string(),
                },
            ));
        }
        let text = apply_forward(previous.get(field), script).map_err(|e| {
            log::warn!("revision {}: {} script does not apply: {}", record.id(), field, e);
            corrupt(record, field, e)
        })?;
        match field {
            Field::Title => next.title = text,
            Field::Excerpt => next.excerpt = text,
            Field::Content => next.content = text,
        }
    }
    let found = object_hash(&next);
    if found != record.hash() {
        log::warn!("revision {}: content hash does not match", record.id());
        return Err(Error::CorruptScript {
            revision: record.id(),
            field: None,
            source: Box::new(Error::HashMismatch {
                revision: record.id(),
                expected: record.hash().to_string(),
                found,
            }),
        });
    }
    Ok(next)
}

fn corrupt(record: &RevisionRecord, field: Field, source: Error) -> Error {
    Error::CorruptScript {
        revision: record.id(),
        field: Some(field),
        source: Box::new(source),
    }
}
