//! Transactions and the bounded undo/redo history.
//!
//! A [`CommandGroup`] is one undo/redo unit: the commands submitted between
//! begin and commit. [`History`] holds two double-ended queues of committed
//! groups plus the saved/autosaved marks used to answer "does the document
//! have unsaved changes" without diffing content.

use std::collections::VecDeque;

use crate::command::Command;

/// Identity of a committed group. Saved/autosaved points reference groups by
/// id so position comparisons survive the groups moving between queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupId(u64);

/// An ordered batch of commands applied and undone as a unit.
pub struct CommandGroup {
    id: GroupId,
    commands: Vec<Box<dyn Command>>,
    defer_validate: bool,
}

impl CommandGroup {
    pub(crate) fn new(id: GroupId, defer_validate: bool) -> Self {
        Self {
            id,
            commands: Vec::new(),
            defer_validate,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn defer_validate(&self) -> bool {
        self.defer_validate
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub(crate) fn push(&mut self, command: Box<dyn Command>) {
        self.commands.push(command);
    }

    pub(crate) fn commands_mut(&mut self) -> &mut [Box<dyn Command>] {
        &mut self.commands
    }

    pub(crate) fn commands(&self) -> &[Box<dyn Command>] {
        &self.commands
    }

    /// Take all commands out, leaving the group open but empty (rollback).
    pub(crate) fn take_commands(&mut self) -> Vec<Box<dyn Command>> {
        std::mem::take(&mut self.commands)
    }

    /// Coalesce adjacent compatible commands via [`Command::merge`].
    /// Run once at commit so a continuous drag collapses into one entry.
    pub(crate) fn merge(&mut self) {
        let mut merged: Vec<Box<dyn Command>> = Vec::with_capacity(self.commands.len());
        for command in self.commands.drain(..) {
            match merged.last_mut() {
                Some(last) => {
                    if let Err(rejected) = last.merge(command) {
                        merged.push(rejected);
                    }
                }
                None => merged.push(command),
            }
        }
        self.commands = merged;
    }
}

/// Bounded undo/redo queues of committed groups.
pub struct History {
    undo: VecDeque<CommandGroup>,
    redo: VecDeque<CommandGroup>,
    saved_point: Option<GroupId>,
    autosaved_point: Option<GroupId>,
    next_id: u64,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            saved_point: None,
            autosaved_point: None,
            next_id: 0,
        }
    }

    pub(crate) fn next_group_id(&mut self) -> GroupId {
        let id = GroupId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Commit a finished group. Non-empty groups append to the undo queue
    /// and clear redo; empty groups are dropped. The cap is enforced either
    /// way — the limit is read live and may have shrunk since last commit.
    pub(crate) fn commit(&mut self, group: CommandGroup, limit: usize) {
        if !group.is_empty() {
            self.undo.push_back(group);
            self.redo.clear();
        }
        while self.undo.len() > limit {
            self.undo.pop_front();
        }
    }

    pub(crate) fn pop_undo(&mut self) -> Option<CommandGroup> {
        self.undo.pop_back()
    }

    pub(crate) fn push_redo(&mut self, group: CommandGroup) {
        self.redo.push_back(group);
    }

    pub(crate) fn pop_redo(&mut self) -> Option<CommandGroup> {
        self.redo.pop_back()
    }

    /// Return a redone group to the undo queue. Unlike [`Self::commit`] this
    /// must not clear the redo queue.
    pub(crate) fn restore_undo(&mut self, group: CommandGroup) {
        self.undo.push_back(group);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub(crate) fn undo_tail(&self) -> Option<GroupId> {
        self.undo.back().map(CommandGroup::id)
    }

    /// Record the current undo tail as the last-saved position.
    pub(crate) fn mark_saved(&mut self) {
        self.saved_point = self.undo_tail();
    }

    /// Record the current undo tail as the last-autosaved position.
    pub(crate) fn mark_autosaved(&mut self) {
        self.autosaved_point = self.undo_tail();
    }

    /// True when something has committed since the last autosave, compared
    /// by position, never by content.
    pub(crate) fn autosave_pending(&self) -> bool {
        self.undo_tail() != self.autosaved_point
    }

    /// True when the undo tail is the last-saved group. Holds for the
    /// empty-queue/never-saved case too.
    pub fn changes_saved(&self) -> bool {
        self.undo_tail() == self.saved_point
    }

    /// Forget everything: queues, saved and autosaved points. Used when the
    /// document is replaced on load.
    pub(crate) fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.saved_point = None;
        self.autosaved_point = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandError};
    use cadenza_types::Project;

    struct Noop;

    impl std::fmt::Display for Noop {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "noop")
        }
    }

    impl Command for Noop {
        fn apply(&mut self, _: &mut Project) -> Result<(), CommandError> {
            Ok(())
        }
        fn revert(&mut self, _: &mut Project) -> Result<(), CommandError> {
            Ok(())
        }
    }

    fn group_with(history: &mut History, n: usize) -> CommandGroup {
        let mut group = CommandGroup::new(history.next_group_id(), false);
        for _ in 0..n {
            group.push(Box::new(Noop));
        }
        group
    }

    #[test]
    fn empty_group_never_appended() {
        let mut history = History::new();
        let group = group_with(&mut history, 0);
        history.commit(group, 10);
        assert!(!history.can_undo());
        assert!(history.changes_saved());
    }

    #[test]
    fn commit_clears_redo() {
        let mut history = History::new();
        let g1 = group_with(&mut history, 1);
        history.commit(g1, 10);
        let popped = history.pop_undo().unwrap();
        history.push_redo(popped);
        assert!(history.can_redo());

        let g2 = group_with(&mut history, 1);
        history.commit(g2, 10);
        assert!(!history.can_redo());
    }

    #[test]
    fn cap_evicts_from_oldest_end() {
        let mut history = History::new();
        let g1 = group_with(&mut history, 1);
        let g1_id = g1.id();
        let g2 = group_with(&mut history, 1);
        let g2_id = g2.id();
        let g3 = group_with(&mut history, 1);
        let g3_id = g3.id();

        history.commit(g1, 2);
        history.commit(g2, 2);
        history.commit(g3, 2);

        assert_eq!(history.undo_len(), 2);
        assert_eq!(history.undo_tail(), Some(g3_id));
        let older = history.undo.front().unwrap().id();
        assert_eq!(older, g2_id);
        assert_ne!(older, g1_id);
    }

    #[test]
    fn shrunk_limit_applies_on_next_commit() {
        let mut history = History::new();
        for _ in 0..5 {
            let g = group_with(&mut history, 1);
            history.commit(g, 10);
        }
        assert_eq!(history.undo_len(), 5);

        // Even an empty group enforces the (shrunk) cap.
        let empty = group_with(&mut history, 0);
        history.commit(empty, 2);
        assert_eq!(history.undo_len(), 2);
    }

    #[test]
    fn saved_point_tracks_tail_identity() {
        let mut history = History::new();
        assert!(history.changes_saved());

        let g1 = group_with(&mut history, 1);
        history.commit(g1, 10);
        assert!(!history.changes_saved());

        history.mark_saved();
        assert!(history.changes_saved());

        let g2 = group_with(&mut history, 1);
        history.commit(g2, 10);
        assert!(!history.changes_saved());

        // Undo back to the saved group.
        let popped = history.pop_undo().unwrap();
        history.push_redo(popped);
        assert!(history.changes_saved());
    }

    #[test]
    fn autosave_pending_by_position_only() {
        let mut history = History::new();
        assert!(!history.autosave_pending());

        let g1 = group_with(&mut history, 1);
        history.commit(g1, 10);
        assert!(history.autosave_pending());

        history.mark_autosaved();
        assert!(!history.autosave_pending());
    }

    #[test]
    fn merge_coalesces_adjacent_commands() {
        struct Step(i32);
        impl std::fmt::Display for Step {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "step {}", self.0)
            }
        }
        impl Command for Step {
            fn apply(&mut self, _: &mut Project) -> Result<(), CommandError> {
                Ok(())
            }
            fn revert(&mut self, _: &mut Project) -> Result<(), CommandError> {
                Ok(())
            }
            fn merge(&mut self, next: Box<dyn Command>) -> Result<(), Box<dyn Command>> {
                // Absorb anything that formats like a step.
                if next.to_string().starts_with("step") {
                    self.0 += 1;
                    Ok(())
                } else {
                    Err(next)
                }
            }
        }

        let mut history = History::new();
        let mut group = CommandGroup::new(history.next_group_id(), false);
        group.push(Box::new(Step(0)));
        group.push(Box::new(Step(1)));
        group.push(Box::new(Noop));
        group.push(Box::new(Step(2)));
        group.merge();
        assert_eq!(group.len(), 3); // step+step merged, noop breaks the run
    }

    #[test]
    fn clear_resets_points() {
        let mut history = History::new();
        let g = group_with(&mut history, 1);
        history.commit(g, 10);
        history.mark_saved();
        history.mark_autosaved();

        history.clear();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.changes_saved());
        assert!(!history.autosave_pending());
    }
}
