use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// One step of an edit script. Serialized as `{"op": "Copy", "text": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(tag = "op", content = "text")]
pub enum DiffOp {
    /// Present unchanged in both texts
    Copy(String),
    /// Present only in the after-text
    Add(String),
    /// Present only in the before-text
    Delete(String),
}

impl DiffOp {
    pub fn text(&self) -> &str {
        match self {
            DiffOp::Copy(text) | DiffOp::Add(text) | DiffOp::Delete(text) => text,
        }
    }

    pub fn is_copy(&self) -> bool {
        matches!(self, DiffOp::Copy(_))
    }

    /// Whether the span belongs to the before-text.
    pub fn in_before(&self) -> bool {
        !matches!(self, DiffOp::Add(_))
    }

    /// Whether the span belongs to the after-text.
    pub fn in_after(&self) -> bool {
        !matches!(self, DiffOp::Delete(_))
    }

    fn same_kind(&self, other: &DiffOp) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    fn text_mut(&mut self) -> &mut String {
        match self {
            DiffOp::Copy(text) | DiffOp::Add(text) | DiffOp::Delete(text) => text,
        }
    }
}

/// Appends `op`, merging it into the last op when both are the same kind.
/// Empty spans are dropped.
pub(crate) fn push_coalesced(ops: &mut Vec<DiffOp>, op: DiffOp) {
    if op.text().is_empty() {
        return;
    }
    match ops.last_mut() {
        Some(last) if last.same_kind(&op) => last.text_mut().push_str(op.text()),
        _ => ops.push(op),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let op = DiffOp::Add("brown ".to_string());
        assert_eq!(
            serde_json::to_string(&op).unwrap(),
            r#"{"op":"Add","text":"brown "}"#
        );
        let de: DiffOp = serde_json::from_str(r#"{"op":"Delete","text":"del title"}"#).unwrap();
        assert_eq!(de, DiffOp::Delete("del title".to_string()));
        assert!(serde_json::from_str::<DiffOp>(r#"{"op":"Move","text":"x"}"#).is_err());
    }

    #[test]
    fn test_push_coalesced() {
        let mut ops = Vec::new();
        push_coalesced(&mut ops, DiffOp::Copy("the".into()));
        push_coalesced(&mut ops, DiffOp::Copy(" ".into()));
        push_coalesced(&mut ops, DiffOp::Add("".into()));
        push_coalesced(&mut ops, DiffOp::Delete("a".into()));
        push_coalesced(&mut ops, DiffOp::Add("b".into()));
        assert_eq!(
            ops,
            vec![
                DiffOp::Copy("the ".into()),
                DiffOp::Delete("a".into()),
                DiffOp::Add("b".into()),
            ]
        );
    }
}
