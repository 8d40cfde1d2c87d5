// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Undo log for speculative allocation.
//!
//! Each mutation of the `Allocation` records the change it made. A
//! checkpoint marks a position in the log; rewinding hands back every change
//! made since the most recent checkpoint, newest first, so that the caller
//! can undo them exactly. Nothing is recorded while no checkpoint is open.

/// The undo log, generic over the change record.
#[derive(Debug, Clone)]
pub struct Trail<E> {
    /// All changes recorded since the oldest open checkpoint.
    entries: Vec<E>,
    /// Stack of checkpoint positions for nested speculation.
    checkpoints: Vec<usize>,
    /// Once frozen, nothing further is recorded or undone.
    frozen: bool,
}

impl<E> Trail<E> {
    /// Create a new empty trail.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            checkpoints: Vec::new(),
            frozen: false,
        }
    }

    /// Record a checkpoint for later rewinding.
    ///
    /// Returns the checkpoint position.
    pub fn checkpoint(&mut self) -> usize {
        let checkpoint = self.entries.len();
        self.checkpoints.push(checkpoint);
        checkpoint
    }

    /// Record a change, if any checkpoint is open.
    pub fn record(&mut self, change: E) {
        if !self.checkpoints.is_empty() && !self.frozen {
            self.entries.push(change);
        }
    }

    /// Pop the most recent checkpoint, returning the changes made since it,
    /// newest first.
    ///
    /// Returns None if there was no checkpoint to rewind to.
    pub fn rewind(&mut self) -> Option<Vec<E>> {
        let checkpoint = self.checkpoints.pop()?;
        let mut undone = self.entries.split_off(checkpoint);
        undone.reverse();
        Some(undone)
    }

    /// Pop the most recent checkpoint, keeping its changes.
    ///
    /// The changes stay undoable by any enclosing checkpoint. Returns false
    /// if there was no checkpoint.
    pub fn commit(&mut self) -> bool {
        if self.checkpoints.pop().is_none() {
            return false;
        }
        if self.checkpoints.is_empty() {
            self.entries.clear();
        }
        true
    }

    /// Discard all history. No further changes are recorded.
    pub fn freeze(&mut self) {
        self.entries.clear();
        self.checkpoints.clear();
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Get the current number of entries in the trail.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the number of open checkpoints.
    pub fn checkpoint_depth(&self) -> usize {
        self.checkpoints.len()
    }
}

impl<E> Default for Trail<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trail_new() {
        let trail: Trail<u32> = Trail::new();
        assert_eq!(trail.len(), 0);
        assert_eq!(trail.checkpoint_depth(), 0);
        assert!(trail.is_empty());
    }

    #[test]
    fn test_nothing_recorded_without_checkpoint() {
        let mut trail = Trail::new();
        trail.record(1);
        assert!(trail.is_empty());
    }

    #[test]
    fn test_checkpoint_and_rewind() {
        let mut trail = Trail::new();
        let checkpoint = trail.checkpoint();
        assert_eq!(checkpoint, 0);

        trail.record(10);
        trail.record(20);
        assert_eq!(trail.len(), 2);

        assert_eq!(trail.rewind(), Some(vec![20, 10]));
        assert_eq!(trail.len(), 0);
        assert_eq!(trail.checkpoint_depth(), 0);
    }

    #[test]
    fn test_nested_checkpoints() {
        let mut trail = Trail::new();

        trail.checkpoint();
        trail.record(1);
        let inner = trail.checkpoint();
        assert_eq!(inner, 1);
        trail.record(2);
        trail.record(3);
        assert_eq!(trail.checkpoint_depth(), 2);

        // Rewind inner checkpoint
        assert_eq!(trail.rewind(), Some(vec![3, 2]));
        assert_eq!(trail.len(), 1);

        // Rewind outer checkpoint
        assert_eq!(trail.rewind(), Some(vec![1]));
        assert_eq!(trail.checkpoint_depth(), 0);
    }

    #[test]
    fn test_rewind_empty() {
        let mut trail: Trail<u32> = Trail::new();
        assert_eq!(trail.rewind(), None);
    }

    #[test]
    fn test_commit_keeps_changes_for_outer_checkpoint() {
        let mut trail = Trail::new();
        trail.checkpoint();
        trail.record(1);
        trail.checkpoint();
        trail.record(2);

        assert!(trail.commit());
        assert_eq!(trail.len(), 2);
        assert_eq!(trail.rewind(), Some(vec![2, 1]));
        assert!(!trail.commit());
    }

    #[test]
    fn test_outermost_commit_discards_history() {
        let mut trail = Trail::new();
        trail.checkpoint();
        trail.record(1);
        assert!(trail.commit());
        assert!(trail.is_empty());
    }

    #[test]
    fn test_freeze() {
        let mut trail = Trail::new();
        trail.checkpoint();
        trail.record(1);
        trail.freeze();

        assert!(trail.is_frozen());
        assert!(trail.is_empty());
        assert_eq!(trail.rewind(), None);

        trail.checkpoint();
        trail.record(2);
        assert!(trail.is_empty());
    }
}
