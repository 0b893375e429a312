use serde::{Deserialize, Serialize};

use crate::Position;

/// A recorded line mutation, carrying enough text to be reverted and reapplied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOperation {
    Insert {
        position: Position,
        inserted: String,
    },
    Delete {
        position: Position,
        removed: String,
    },
    Update {
        position: Position,
        old_text: String,
        new_text: String,
    },
}

impl EditOperation {
    pub fn position(&self) -> Position {
        match self {
            EditOperation::Insert { position, .. }
            | EditOperation::Delete { position, .. }
            | EditOperation::Update { position, .. } => *position,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            EditOperation::Insert { .. } => "insert",
            EditOperation::Delete { .. } => "delete",
            EditOperation::Update { .. } => "update",
        }
    }
}

/// Undo and redo stacks of recorded operations.
///
/// Operations move between the two stacks by value; nothing is ever copied
/// from one to the other.
#[derive(Debug, Default, Clone)]
pub struct OperationLog {
    undo_stack: Vec<EditOperation>,
    redo_stack: Vec<EditOperation>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a freshly recorded operation and drop the redo branch.
    pub fn record(&mut self, operation: EditOperation) {
        self.undo_stack.push(operation);
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Most recent operation that `undo` would revert.
    pub fn peek_undo(&self) -> Option<&EditOperation> {
        self.undo_stack.last()
    }

    pub fn peek_redo(&self) -> Option<&EditOperation> {
        self.redo_stack.last()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub(crate) fn pop_undo(&mut self) -> Option<EditOperation> {
        self.undo_stack.pop()
    }

    pub(crate) fn pop_redo(&mut self) -> Option<EditOperation> {
        self.redo_stack.pop()
    }

    pub(crate) fn push_undo(&mut self, operation: EditOperation) {
        self.undo_stack.push(operation);
    }

    pub(crate) fn push_redo(&mut self, operation: EditOperation) {
        self.redo_stack.push(operation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(position: Position, text: &str) -> EditOperation {
        EditOperation::Insert {
            position,
            inserted: text.to_string(),
        }
    }

    #[test]
    fn test_record_clears_redo() {
        let mut log = OperationLog::new();
        log.record(insert(0, "a"));
        let op = log.pop_undo().unwrap();
        log.push_redo(op);
        assert!(log.can_redo());

        log.record(insert(0, "b"));
        assert!(!log.can_redo());
        assert_eq!(log.undo_depth(), 1);
        assert_eq!(log.peek_undo(), Some(&insert(0, "b")));
    }

    #[test]
    fn test_stacks_are_lifo() {
        let mut log = OperationLog::new();
        log.record(insert(0, "first"));
        log.record(insert(1, "second"));

        assert_eq!(log.pop_undo(), Some(insert(1, "second")));
        assert_eq!(log.pop_undo(), Some(insert(0, "first")));
        assert_eq!(log.pop_undo(), None);
    }

    #[test]
    fn test_operation_accessors() {
        let op = EditOperation::Update {
            position: 3,
            old_text: "old".to_string(),
            new_text: "new".to_string(),
        };
        assert_eq!(op.position(), 3);
        assert_eq!(op.verb(), "update");
    }

    #[test]
    fn test_operation_serializes_with_tag() {
        let op = EditOperation::Delete {
            position: 2,
            removed: "gone".to_string(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "delete");
        assert_eq!(json["removed"], "gone");
    }
}
