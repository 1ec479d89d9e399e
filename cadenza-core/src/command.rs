//! The command contract: an atomic, reversible document mutation.
//!
//! Concrete edit operations (note moves, track renames, ...) live with their
//! frontends; the engine only sees this trait. `apply` and `revert` must be
//! exact inverses when run back-to-back — undo/redo correctness depends on it.

use std::any::Any;
use std::fmt;

use thiserror::Error;

use cadenza_types::Project;

/// What subset of the document to re-check after a command executes.
///
/// The default re-checks everything. Commands that only touch one part
/// should scope validation to it — full revalidation on every drag step
/// is what makes large documents feel sluggish.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    pub skip_timing: bool,
    pub skip_phonemizer: bool,
    pub skip_phoneme: bool,
    /// Index into `Project::parts` to scope the pass to, `None` for all.
    pub part: Option<usize>,
}

impl ValidateOptions {
    /// Scope validation to a single part.
    pub fn part(part: usize) -> Self {
        Self {
            part: Some(part),
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("track {0} out of range")]
    TrackOutOfRange(usize),
    #[error("part {0} out of range")]
    PartOutOfRange(usize),
    #[error("{0}")]
    Other(String),
}

/// An atomic, reversible mutation request.
///
/// A command is created by a caller, handed to the engine through
/// [`crate::manager::DocManager::submit`], and owned by the transaction it
/// lands in from then on. The `Display` impl is used for the command log.
/// `Any` is a supertrait so [`Command::merge`] implementations can downcast
/// the incoming command to their own type.
pub trait Command: fmt::Display + Any {
    fn apply(&mut self, project: &mut Project) -> Result<(), CommandError>;

    fn revert(&mut self, project: &mut Project) -> Result<(), CommandError>;

    /// Silent commands are still executed, delivered and recorded in history;
    /// only logging is suppressed. Used for high-frequency gestures.
    fn silent(&self) -> bool {
        false
    }

    fn validate_options(&self) -> ValidateOptions {
        ValidateOptions::default()
    }

    /// Commit-time coalescing: try to absorb `next` into `self`, returning
    /// it back when the two are not compatible. Adjacent steps of a
    /// continuous drag merge into one history entry this way.
    fn merge(&mut self, next: Box<dyn Command>) -> Result<(), Box<dyn Command>> {
        Err(next)
    }
}
