use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use super::{
    Diff, DiffOp, Granularity, myers,
    patch::{apply_backward, apply_forward},
};
use crate::err::{Error, Result, Side};

/// Ordered copy/add/delete operations turning one text into another.
///
/// The order is what makes reconstruction possible: copy and delete spans
/// concatenated in order give the before-text, copy and add spans give the
/// after-text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(transparent)]
pub struct EditScript {
    ops: Vec<DiffOp>,
}

/// Totals of what a script adds and removes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptStats {
    pub add_ops: usize,
    pub delete_ops: usize,
    pub added_chars: usize,
    pub deleted_chars: usize,
    pub copied_chars: usize,
}

impl From<Vec<DiffOp>> for EditScript {
    /// Takes the operations verbatim, without normalising them.
    fn from(ops: Vec<DiffOp>) -> Self {
        Self { ops }
    }
}

impl Diff<str> for EditScript {
    fn from_compare(old: &str, new: &str, granularity: Granularity) -> Result<Self> {
        myers::compare(old, new, granularity)
    }

    fn from_squash(base: &Self, squashing: &Self, granularity: Granularity) -> Result<Self> {
        let mid = base.after_text();
        if mid != squashing.before_text() {
            return Err(Error::ScriptMismatch {
                side: Side::Before,
                detail: "squashed script does not start where the base script ends".to_string(),
            });
        }
        myers::compare(&base.before_text(), &squashing.after_text(), granularity)
    }

    fn patch(&self, old: &str) -> Result<String> {
        apply_forward(old, self)
    }

    fn revert(&self, new: &str) -> Result<String> {
        apply_backward(new, self)
    }
}

impl EditScript {
    pub fn ops(&self) -> &[DiffOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// No adds and no deletes.
    pub fn is_noop(&self) -> bool {
        self.ops.iter().all(DiffOp::is_copy)
    }

    /// Only adds, as in a root revision.
    pub fn is_creation(&self) -> bool {
        self.ops.iter().all(|op| matches!(op, DiffOp::Add(_)))
    }

    pub fn before_text(&self) -> String {
        self.ops
            .iter()
            .filter(|op| op.in_before())
            .map(DiffOp::text)
            .collect()
    }

    pub fn after_text(&self) -> String {
        self.ops
            .iter()
            .filter(|op| op.in_after())
            .map(DiffOp::text)
            .collect()
    }

    pub fn stats(&self) -> ScriptStats {
        self.ops
            .iter()
            .fold(ScriptStats::default(), |mut stats, op| {
                let chars = op.text().chars().count();
                match op {
                    DiffOp::Copy(_) => stats.copied_chars += chars,
                    DiffOp::Add(_) => {
                        stats.add_ops += 1;
                        stats.added_chars += chars;
                    }
                    DiffOp::Delete(_) => {
                        stats.delete_ops += 1;
                        stats.deleted_chars += chars;
                    }
                }
                stats
            })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::codec)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::codec)
    }
}

#[cfg(test)]
mod tests {
    use rand::prelude::*;

    use super::*;
    use crate::util::test::create_test_texts;

    #[test]
    fn test_fixture_after_text_skips_delete() {
        let script = EditScript::from(vec![
            DiffOp::Copy("copy title".into()),
            DiffOp::Add("add title".into()),
            DiffOp::Delete("del title".into()),
        ]);
        assert_eq!(script.after_text(), "copy titleadd title");
        assert_eq!(script.before_text(), "copy titledel title");
        assert!(!script.is_noop());
        assert!(!script.is_creation());
    }

    #[test]
    fn test_noop_diff() {
        let text = "A test post";
        let script = EditScript::from_compare(text, text, Granularity::Word).unwrap();
        assert!(script.is_noop());
        assert_eq!(script.patch(text).unwrap(), text);
        assert_eq!(script.revert(text).unwrap(), text);
    }

    #[test]
    fn test_stats() {
        let script =
            EditScript::from_compare("A test post", "A brand new post", Granularity::Word)
                .unwrap();
        let stats = script.stats();
        assert_eq!(stats.add_ops, 1);
        assert_eq!(stats.delete_ops, 1);
        assert_eq!(stats.deleted_chars, "test".len());
        assert_eq!(stats.added_chars, "brand new".len());
        assert_eq!(stats.copied_chars, "A ".len() + " post".len());
    }

    #[test]
    fn test_json_wire_format() {
        let script =
            EditScript::from_compare("the quick fox", "the quick brown fox", Granularity::Word)
                .unwrap();
        let json = script.to_json().unwrap();
        assert_eq!(
            json,
            r#"[{"op":"Copy","text":"the quick "},{"op":"Add","text":"brown "},{"op":"Copy","text":"fox"}]"#
        );
        assert_eq!(EditScript::from_json(&json).unwrap(), script);
        assert!(EditScript::from_json(r#"{"op":"Copy"}"#).is_err());
    }

    #[test]
    fn test_squash_rejects_non_adjacent() {
        let a = EditScript::from_compare("v1", "v2", Granularity::Word).unwrap();
        let b = EditScript::from_compare("v3", "v4", Granularity::Word).unwrap();
        assert!(matches!(
            EditScript::from_squash(&a, &b, Granularity::Word),
            Err(Error::ScriptMismatch { .. })
        ));
    }

    #[test]
    fn test_diff_squash() {
        let mut rng = StdRng::seed_from_u64(114514);
        let mut texts = create_test_texts(&mut rng);
        for _ in 0..3_000 {
            let v0 = texts.next().unwrap();
            let v1 = texts.next().unwrap();
            let v2 = texts.next().unwrap();
            let diff_v01 = EditScript::from_compare(v0.as_str(), v1.as_str(), Granularity::Word).unwrap();
            let diff_v12 = EditScript::from_compare(v1.as_str(), v2.as_str(), Granularity::Word).unwrap();
            let squashed =
                EditScript::from_squash(&diff_v01, &diff_v12, Granularity::Word).unwrap();
            assert_eq!(squashed.patch(v0.as_str()).unwrap(), v2, "v0: {:?}; v1: {:?}; v2: {:?}", v0, v1, v2);
            assert_eq!(squashed.revert(v2.as_str()).unwrap(), v0, "v0: {:?}; v1: {:?}; v2: {:?}", v0, v1, v2);
        }
    }
}
