use crate::{DocumentError, EditOperation, OperationLog, Position, Result};

/// Ordered line store with undo/redo history.
///
/// The `*_silent` operations mutate without touching the history and are what
/// undo/redo replay through. `insert`, `delete` and `update` record an
/// [`EditOperation`] first and discard the redo branch.
#[derive(Debug, Default, Clone)]
pub struct Document {
    lines: Vec<String>,
    history: OperationLog,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from existing lines, with an empty history.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            history: OperationLog::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, position: Position) -> Option<&str> {
        self.lines.get(position).map(String::as_str)
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn history(&self) -> &OperationLog {
        &self.history
    }

    /// Insert positions range over `[0, len]`.
    pub fn is_valid_insert_position(&self, position: Position) -> bool {
        position <= self.lines.len()
    }

    /// Delete and update positions range over `[0, len - 1]`.
    pub fn is_valid_mutate_position(&self, position: Position) -> bool {
        position < self.lines.len()
    }

    /// Returns false and leaves the document untouched if `position` is out of range.
    pub fn insert_silent(&mut self, position: Position, text: impl Into<String>) -> bool {
        if !self.is_valid_insert_position(position) {
            return false;
        }
        self.lines.insert(position, text.into());
        true
    }

    /// Returns the removed line, or `None` if `position` is out of range.
    pub fn delete_silent(&mut self, position: Position) -> Option<String> {
        if !self.is_valid_mutate_position(position) {
            return None;
        }
        Some(self.lines.remove(position))
    }

    /// Returns the replaced line, or `None` if `position` is out of range.
    pub fn update_silent(&mut self, position: Position, text: impl Into<String>) -> Option<String> {
        let slot = self.lines.get_mut(position)?;
        Some(std::mem::replace(slot, text.into()))
    }

    pub fn insert(&mut self, position: Position, text: impl Into<String>) -> Result<()> {
        if !self.is_valid_insert_position(position) {
            return Err(DocumentError::InvalidPosition(position));
        }
        let text = text.into();
        self.history.record(EditOperation::Insert {
            position,
            inserted: text.clone(),
        });
        self.insert_silent(position, text);
        Ok(())
    }

    /// Delete the line at `position`, returning its text.
    pub fn delete(&mut self, position: Position) -> Result<String> {
        let removed = self
            .line(position)
            .ok_or(DocumentError::InvalidPosition(position))?
            .to_string();
        self.history.record(EditOperation::Delete {
            position,
            removed: removed.clone(),
        });
        self.delete_silent(position);
        Ok(removed)
    }

    /// Replace the line at `position`, returning the previous text.
    pub fn update(&mut self, position: Position, text: impl Into<String>) -> Result<String> {
        let old_text = self
            .line(position)
            .ok_or(DocumentError::InvalidPosition(position))?
            .to_string();
        let new_text = text.into();
        self.history.record(EditOperation::Update {
            position,
            old_text: old_text.clone(),
            new_text: new_text.clone(),
        });
        self.update_silent(position, new_text);
        Ok(old_text)
    }

    /// Revert the most recent recorded operation and move it to the redo stack.
    pub fn undo(&mut self) -> Result<&EditOperation> {
        let operation = self
            .history
            .pop_undo()
            .ok_or(DocumentError::HistoryEmpty("undo stack"))?;
        match &operation {
            EditOperation::Insert { position, .. } => {
                self.delete_silent(*position);
            }
            EditOperation::Delete { position, removed } => {
                self.insert_silent(*position, removed.clone());
            }
            EditOperation::Update {
                position, old_text, ..
            } => {
                self.update_silent(*position, old_text.clone());
            }
        }
        self.history.push_redo(operation);
        self.history
            .peek_redo()
            .ok_or(DocumentError::HistoryEmpty("redo stack"))
    }

    /// Reapply the most recently undone operation and move it back to the undo stack.
    pub fn redo(&mut self) -> Result<&EditOperation> {
        let operation = self
            .history
            .pop_redo()
            .ok_or(DocumentError::HistoryEmpty("redo stack"))?;
        match &operation {
            EditOperation::Insert { position, inserted } => {
                self.insert_silent(*position, inserted.clone());
            }
            EditOperation::Delete { position, .. } => {
                self.delete_silent(*position);
            }
            EditOperation::Update {
                position, new_text, ..
            } => {
                self.update_silent(*position, new_text.clone());
            }
        }
        self.history.push_undo(operation);
        self.history
            .peek_undo()
            .ok_or(DocumentError::HistoryEmpty("undo stack"))
    }

    /// Every line followed by `\n`; an empty document serializes to `""`.
    pub fn serialize(&self) -> String {
        let capacity = self.lines.iter().map(|l| l.len() + 1).sum();
        let mut out = String::with_capacity(capacity);
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// `"<n>: <line>"` for every line, as shown on the server console.
    pub fn numbered_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .enumerate()
            .map(|(idx, line)| format!("{}: {}", idx, line))
            .collect()
    }

    /// Replace the whole content with `text` split on `\n`, dropping all history.
    pub fn replace_with_text(&mut self, text: &str) {
        self.lines = text.split_terminator('\n').map(str::to_string).collect();
        self.history.clear();
    }
}
