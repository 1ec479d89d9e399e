//! System events delivered through the same bus as commands.
//!
//! Notifications never enter undo history. The set is closed on purpose:
//! cascade handling in the manager is an exhaustive match, so adding a
//! variant forces every cascade site to take a position on it.

use std::fmt;
use std::path::PathBuf;

use cadenza_types::Project;

#[derive(Debug)]
pub enum Notification {
    /// Persist the document to `path`, or to its last-known path when `None`.
    SaveRequested { path: Option<PathBuf> },
    /// Replace the document wholesale; history and saved points reset.
    LoadRequested { project: Box<Project> },
    /// Transport moved. Transient — touches nothing but the play position.
    PlayPositionChanged { tick: i32 },
    /// Run a full validation pass with no document mutation.
    ValidateRequested,
    /// The extension catalog was rescanned; re-resolve capability
    /// availability for every track, then revalidate.
    ExtensionCatalogChanged,
    /// A singer/voice-bank resource changed on disk. Like
    /// `ExtensionCatalogChanged`, plus a pre-render request.
    VoiceResourceChanged,
    /// Downstream collaborators should prepare playback output. Fired by the
    /// engine after every commit/undo/redo; may also be submitted directly.
    PreRender,
    /// Passive progress reporting from background work. The only message
    /// exempt from the owner-thread check.
    Progress {
        done: usize,
        total: usize,
        message: String,
    },
}

impl Notification {
    /// Silent notifications skip the info log on delivery. High-frequency
    /// kinds only — delivery itself is never suppressed.
    pub fn silent(&self) -> bool {
        matches!(
            self,
            Notification::PlayPositionChanged { .. }
                | Notification::PreRender
                | Notification::Progress { .. }
        )
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::SaveRequested { path: Some(p) } => {
                write!(f, "save requested to {}", p.display())
            }
            Notification::SaveRequested { path: None } => write!(f, "save requested"),
            Notification::LoadRequested { project } => {
                write!(f, "load requested: {}", project.name)
            }
            Notification::PlayPositionChanged { tick } => write!(f, "play position {tick}"),
            Notification::ValidateRequested => write!(f, "validate requested"),
            Notification::ExtensionCatalogChanged => write!(f, "extension catalog changed"),
            Notification::VoiceResourceChanged => write!(f, "voice resource changed"),
            Notification::PreRender => write!(f, "pre-render"),
            Notification::Progress { done, total, message } => {
                write!(f, "progress {done}/{total}: {message}")
            }
        }
    }
}
