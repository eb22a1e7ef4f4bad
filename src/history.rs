/// Undo/redo stacks of whole snapshots.
#[derive(Clone, Debug)]
pub struct History<T> {
    undo_stack: Vec<T>,
    redo_stack: Vec<T>,
    limit: usize,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::with_limit(100)
    }
}

impl<T> History<T> {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record the state as it was before a change.
    pub fn push(&mut self, before: T) {
        self.undo_stack.push(before);
        if self.undo_stack.len() > self.limit {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    /// Swap `current` for the previous state, if any.
    pub fn undo(&mut self, current: T) -> Option<T> {
        let prev = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        Some(prev)
    }

    pub fn redo(&mut self, current: T) -> Option<T> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::History;

    #[test]
    fn undo_redo_flow() {
        let mut history = History::default();
        history.push(vec![1]);
        history.push(vec![1, 2]);
        let current = vec![1, 2, 3];

        let current = history.undo(current).expect("undo to [1, 2]");
        assert_eq!(current, vec![1, 2]);
        let current = history.undo(current).expect("undo to [1]");
        assert_eq!(current, vec![1]);
        assert!(!history.can_undo());

        let current = history.redo(current).expect("redo to [1, 2]");
        assert_eq!(current, vec![1, 2]);

        history.push(current);
        assert!(!history.can_redo());
    }

    #[test]
    fn limit_drops_oldest() {
        let mut history = History::with_limit(2);
        history.push(1);
        history.push(2);
        history.push(3);
        assert_eq!(history.undo(4), Some(3));
        assert_eq!(history.undo(3), Some(2));
        assert_eq!(history.undo(2), None);
    }
}
