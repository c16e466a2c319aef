use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use super::{ContentKey, Field, RevisionId, Timestamp, object_hash};
use crate::{
    diff::{Diff, EditScript, Granularity, myers},
    err::{Error, Result},
};

/// Plain text of the three editable fields at one revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub title: String,
    pub excerpt: String,
    pub content: String,
}

impl Snapshot {
    pub fn new(
        title: impl Into<String>,
        excerpt: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            excerpt: excerpt.into(),
            content: content.into(),
        }
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Excerpt => &self.excerpt,
            Field::Content => &self.content,
        }
    }

    fn set(&mut self, field: Field, text: String) {
        match field {
            Field::Title => self.title = text,
            Field::Excerpt => self.excerpt = text,
            Field::Content => self.content = text,
        }
    }
}

/// Per-field scripts of one revision against its predecessor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct FieldScripts {
    pub title: EditScript,
    pub excerpt: EditScript,
    pub content: EditScript,
}

impl FieldScripts {
    pub fn get(&self, field: Field) -> &EditScript {
        match field {
            Field::Title => &self.title,
            Field::Excerpt => &self.excerpt,
            Field::Content => &self.content,
        }
    }

    pub fn is_creation(&self) -> bool {
        Field::ALL.iter().all(|f| self.get(*f).is_creation())
    }

    pub fn is_noop(&self) -> bool {
        Field::ALL.iter().all(|f| self.get(*f).is_noop())
    }

    /// Applies `apply` to every field, stopping at the first failure.
    fn map_fields<F>(&self, input: &Snapshot, apply: F) -> Result<Snapshot>
    where
        F: Fn(&EditScript, &str) -> Result<String>,
    {
        let mut output = Snapshot::default();
        for field in Field::ALL {
            output.set(field, apply(self.get(field), input.get(field))?);
        }
        Ok(output)
    }
}

impl Diff<Snapshot> for FieldScripts {
    fn from_compare(old: &Snapshot, new: &Snapshot, granularity: Granularity) -> Result<Self> {
        // The content body dominates the cost, so it runs beside the two short fields.
        let (content, (title, excerpt)) = rayon::join(
            || myers::compare(&old.content, &new.content, granularity),
            || {
                (
                    myers::compare(&old.title, &new.title, granularity),
                    myers::compare(&old.excerpt, &new.excerpt, granularity),
                )
            },
        );
        Ok(Self {
            title: title?,
            excerpt: excerpt?,
            content: content?,
        })
    }

    fn from_squash(base: &Self, squashing: &Self, granularity: Granularity) -> Result<Self> {
        Ok(Self {
            title: EditScript::from_squash(&base.title, &squashing.title, granularity)?,
            excerpt: EditScript::from_squash(&base.excerpt, &squashing.excerpt, granularity)?,
            content: EditScript::from_squash(&base.content, &squashing.content, granularity)?,
        })
    }

    fn patch(&self, old: &Snapshot) -> Result<Snapshot> {
        self.map_fields(old, |script, text| script.patch(text))
    }

    fn revert(&self, new: &Snapshot) -> Result<Snapshot> {
        self.map_fields(new, |script, text| script.revert(text))
    }
}

/// One immutable historical snapshot of a content item, stored as diffs
/// against its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct RevisionRecord {
    id: RevisionId,
    parent: Option<RevisionId>,
    site_id: i64,
    content_id: i64,
    author_id: Option<i64>,
    diffs: FieldScripts,
    created: Timestamp,
    modified: Timestamp,
    hash: String,
}

/// Every attribute of a record, for adapters that rebuild records from an
/// external representation. No validation happens here; chains check
/// records when they are appended or reconstructed.
#[derive(Debug, Clone)]
pub struct RevisionParts {
    pub id: RevisionId,
    pub parent: Option<RevisionId>,
    pub key: ContentKey,
    pub author_id: Option<i64>,
    pub diffs: FieldScripts,
    pub created: Timestamp,
    pub modified: Timestamp,
    pub hash: String,
}

impl RevisionRecord {
    pub fn from_parts(parts: RevisionParts) -> Self {
        Self {
            id: parts.id,
            parent: parts.parent,
            site_id: parts.key.site_id,
            content_id: parts.key.content_id,
            author_id: parts.author_id,
            diffs: parts.diffs,
            created: parts.created,
            modified: parts.modified,
            hash: parts.hash,
        }
    }

    /// First revision of a chain: every field is a pure addition.
    pub fn build_root(
        id: RevisionId,
        key: ContentKey,
        snapshot: Snapshot,
        timestamp: Timestamp,
    ) -> Result<Self> {
        RevisionBuilder::new(key)
            .snapshot(snapshot)
            .created(timestamp)
            .build_root(id)
    }

    /// Revision following `predecessor`, numbered after it.
    pub fn build_next(
        predecessor: &RevisionRecord,
        key: ContentKey,
        snapshot: Snapshot,
        timestamp: Timestamp,
    ) -> Result<Self> {
        RevisionBuilder::new(key)
            .snapshot(snapshot)
            .created(timestamp)
            .build_next(predecessor, predecessor.id.next()?)
    }

    pub fn id(&self) -> RevisionId {
        self.id
    }

    pub fn parent(&self) -> Option<RevisionId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn key(&self) -> ContentKey {
        ContentKey::new(self.site_id, self.content_id)
    }

    pub fn author_id(&self) -> Option<i64> {
        self.author_id
    }

    pub fn diffs(&self) -> &FieldScripts {
        &self.diffs
    }

    pub fn created(&self) -> Timestamp {
        self.created
    }

    pub fn modified(&self) -> Timestamp {
        self.modified
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// The text this revision leaves each field with, read off the after
    /// side of its scripts.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            title: self.diffs.title.after_text(),
            excerpt: self.diffs.excerpt.after_text(),
            content: self.diffs.content.after_text(),
        }
    }

    /// Characters added over all fields.
    pub fn total_additions(&self) -> usize {
        Field::ALL
            .iter()
            .map(|f| self.diffs.get(*f).stats().added_chars)
            .sum()
    }

    /// Characters deleted over all fields.
    pub fn total_deletions(&self) -> usize {
        Field::ALL
            .iter()
            .map(|f| self.diffs.get(*f).stats().deleted_chars)
            .sum()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::codec)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::codec)
    }
}

/// Accumulates the fields of a new revision, then validates and freezes it.
#[derive(Debug, Clone)]
pub struct RevisionBuilder {
    key: ContentKey,
    snapshot: Snapshot,
    author_id: Option<i64>,
    created: Option<Timestamp>,
    modified: Option<Timestamp>,
    granularity: Granularity,
}

impl RevisionBuilder {
    pub fn new(key: ContentKey) -> Self {
        Self {
            key,
            snapshot: Snapshot::default(),
            author_id: None,
            created: None,
            modified: None,
            granularity: Granularity::default(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.snapshot.title = title.into();
        self
    }

    pub fn excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.snapshot.excerpt = excerpt.into();
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.snapshot.content = content.into();
        self
    }

    pub fn snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn created(mut self, timestamp: Timestamp) -> Self {
        self.created = Some(timestamp);
        self
    }

    /// Defaults to the creation time.
    pub fn modified(mut self, timestamp: Timestamp) -> Self {
        self.modified = Some(timestamp);
        self
    }

    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn build_root(self, id: RevisionId) -> Result<RevisionRecord> {
        let diffs = FieldScripts::from_compare(&Snapshot::default(), &self.snapshot, self.granularity)?;
        if !diffs.is_creation() {
            return Err(Error::InternalInconsistency(
                "root revision diffs contain non-add operations".to_string(),
            ));
        }
        Ok(self.finish(id, None, diffs))
    }

    pub fn build_next(self, predecessor: &RevisionRecord, id: RevisionId) -> Result<RevisionRecord> {
        if predecessor.key() != self.key {
            return Err(Error::IdentityMismatch {
                expected: self.key,
                found: predecessor.key(),
            });
        }
        if id == predecessor.id() {
            return Err(Error::BrokenChain(format!(
                "revision {} cannot follow itself",
                id
            )));
        }
        let previous = predecessor.snapshot();
        let diffs = FieldScripts::from_compare(&previous, &self.snapshot, self.granularity)?;
        log::debug!(
            "{}: revision {} -> {}: {} title / {} excerpt / {} content ops",
            self.key,
            predecessor.id(),
            id,
            diffs.title.len(),
            diffs.excerpt.len(),
            diffs.content.len()
        );
        Ok(self.finish(id, Some(predecessor.id()), diffs))
    }

    fn finish(self, id: RevisionId, parent: Option<RevisionId>, diffs: FieldScripts) -> RevisionRecord {
        let created = self.created.unwrap_or_else(Timestamp::now);
        RevisionRecord {
            id,
            parent,
            site_id: self.key.site_id,
            content_id: self.key.content_id,
            author_id: self.author_id,
            hash: object_hash(&self.snapshot),
            diffs,
            created,
            modified: self.modified.unwrap_or(created),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffOp;

    fn key() -> ContentKey {
        ContentKey::new(6, 5)
    }

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn test_root_is_all_add() {
        let root = RevisionBuilder::new(key())
            .title("post title")
            .excerpt("post excerpt")
            .content("post content")
            .author(111111111)
            .created(ts("2018-09-04 12:19:34Z"))
            .modified(ts("2018-09-05 13:19:34Z"))
            .build_root(RevisionId(1))
            .unwrap();
        assert!(root.is_root());
        assert!(root.diffs().is_creation());
        assert_eq!(root.diffs().title.ops(), &[DiffOp::Add("post title".into())]);
        assert_eq!(root.snapshot(), Snapshot::new("post title", "post excerpt", "post content"));
        assert_eq!(root.author_id(), Some(111111111));
        assert_eq!(root.created().to_string(), "2018-09-04 12:19:34Z");
        assert_eq!(root.modified().to_string(), "2018-09-05 13:19:34Z");
        assert_eq!(root.total_additions(), "post titlepost excerptpost content".len());
        assert_eq!(root.total_deletions(), 0);
        assert_eq!(root.hash(), object_hash(&root.snapshot()));
    }

    #[test]
    fn test_empty_fields_in_root() {
        let root = RevisionRecord::build_root(
            RevisionId(1),
            key(),
            Snapshot::new("A test post", "", ""),
            ts("2018-09-04 12:19:34Z"),
        )
        .unwrap();
        assert!(root.diffs().excerpt.is_empty());
        assert!(root.diffs().is_creation());
    }

    #[test]
    fn test_build_next_diffs_against_predecessor() {
        let created = ts("2018-09-04 12:19:34Z");
        let root = RevisionRecord::build_root(
            RevisionId(1),
            key(),
            Snapshot::new("A test post", "", "Bunch of content here"),
            created,
        )
        .unwrap();
        let next = RevisionRecord::build_next(
            &root,
            key(),
            Snapshot::new("A test post", "Short", "Bunch of new content here"),
            created,
        )
        .unwrap();
        assert_eq!(next.id(), RevisionId(2));
        assert_eq!(next.parent(), Some(RevisionId(1)));
        assert!(next.diffs().title.is_noop());
        assert_eq!(next.diffs().excerpt.ops(), &[DiffOp::Add("Short".into())]);
        assert_eq!(
            next.diffs().content.ops(),
            &[
                DiffOp::Copy("Bunch of ".into()),
                DiffOp::Add("new ".into()),
                DiffOp::Copy("content here".into()),
            ]
        );
        assert_eq!(next.diffs().patch(&root.snapshot()).unwrap(), next.snapshot());
        assert_eq!(next.diffs().revert(&next.snapshot()).unwrap(), root.snapshot());
    }

    #[test]
    fn test_build_next_identity_mismatch() {
        let root = RevisionRecord::build_root(
            RevisionId(1),
            key(),
            Snapshot::new("t", "e", "c"),
            Timestamp::now(),
        )
        .unwrap();
        let other = ContentKey::new(6, 7);
        match RevisionRecord::build_next(&root, other, Snapshot::default(), Timestamp::now()) {
            Err(Error::IdentityMismatch { expected, found }) => {
                assert_eq!(expected, other);
                assert_eq!(found, key());
            }
            res => panic!("expected identity mismatch, got {:?}", res),
        }
        let other_site = ContentKey::new(9, 5);
        assert!(matches!(
            RevisionRecord::build_next(&root, other_site, Snapshot::default(), Timestamp::now()),
            Err(Error::IdentityMismatch { .. })
        ));
    }

    #[test]
    fn test_build_next_after_last_id() {
        let root = RevisionRecord::build_root(
            RevisionId(i64::MAX),
            key(),
            Snapshot::new("t", "e", "c"),
            Timestamp::now(),
        )
        .unwrap();
        assert!(matches!(
            RevisionRecord::build_next(&root, key(), Snapshot::new("t", "e", "d"), Timestamp::now()),
            Err(Error::BrokenChain(_))
        ));
    }

    #[test]
    fn test_field_scripts_squash() {
        let v0 = Snapshot::new("A test post", "", "Bunch of content here");
        let v1 = Snapshot::new("A test post", "Short", "Bunch of new content here");
        let v2 = Snapshot::new("A draft post", "Short excerpt", "Bunch of content");
        let g = Granularity::Word;
        let diff_v01 = FieldScripts::from_compare(&v0, &v1, g).unwrap();
        let diff_v12 = FieldScripts::from_compare(&v1, &v2, g).unwrap();
        let squashed = FieldScripts::from_squash(&diff_v01, &diff_v12, g).unwrap();
        assert_eq!(squashed.patch(&v0).unwrap(), v2);
        assert_eq!(squashed.revert(&v2).unwrap(), v0);
        assert!(matches!(
            FieldScripts::from_squash(&diff_v12, &diff_v01, g),
            Err(Error::ScriptMismatch { .. })
        ));
    }

    #[test]
    fn test_json_field_order() {
        let root = RevisionBuilder::new(key())
            .title("t")
            .created(ts("2018-09-04 12:19:34Z"))
            .build_root(RevisionId(1))
            .unwrap();
        let json = root.to_json().unwrap();
        let title = json.find("\"title\"").unwrap();
        let excerpt = json.find("\"excerpt\"").unwrap();
        let content = json.find("\"content\"").unwrap();
        assert!(title < excerpt && excerpt < content, "{}", json);
        assert!(json.contains(r#""created":"2018-09-04 12:19:34Z""#));
        assert_eq!(RevisionRecord::from_json(&json).unwrap(), root);
    }
}
