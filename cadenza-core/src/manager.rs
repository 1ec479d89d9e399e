//! The document manager: the single ingestion point for every edit and
//! system event.
//!
//! All mutation of the shared document flows through [`DocManager::submit`].
//! The manager serializes edits, groups them into undoable transactions,
//! fans every accepted mutation out to subscribers, and cooperates with the
//! persistence guard. It is owner-thread-bound: the thread that constructs
//! it is the only one allowed to drive transactions, and violations are
//! logged and refused rather than risked.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use cadenza_types::Project;

use crate::bus::{Event, SubscriberHandle, SubscriberList};
use crate::command::Command;
use crate::config::Preferences;
use crate::history::{CommandGroup, History};
use crate::notification::Notification;
use crate::persistence::{self, PersistError};
use crate::phonemizer::PhonemizerCatalog;
use crate::validate;

/// What collaborators hand to [`DocManager::submit`].
pub enum Message {
    Command(Box<dyn Command>),
    Notification(Notification),
}

impl From<Notification> for Message {
    fn from(notification: Notification) -> Self {
        Message::Notification(notification)
    }
}

impl From<Box<dyn Command>> for Message {
    fn from(command: Box<dyn Command>) -> Self {
        Message::Command(command)
    }
}

pub struct DocManager {
    document: Arc<Mutex<Project>>,
    play_pos: i32,
    open_group: Option<CommandGroup>,
    history: History,
    subscribers: SubscriberList,
    preferences: Arc<Preferences>,
    catalog: Arc<PhonemizerCatalog>,
    owner: ThreadId,
}

impl DocManager {
    /// Construct the manager on the owner (event-loop) thread. There is no
    /// global instance — the host creates one at startup and passes it to
    /// whoever needs to submit or subscribe.
    pub fn new(preferences: Arc<Preferences>, catalog: Arc<PhonemizerCatalog>) -> Self {
        Self {
            document: Arc::new(Mutex::new(Project::new())),
            play_pos: 0,
            open_group: None,
            history: History::new(),
            subscribers: SubscriberList::new(),
            preferences,
            catalog,
            owner: thread::current().id(),
        }
    }

    /// Register the crash-backup panic hook for this manager's document.
    pub fn install_crash_guard(&self) {
        persistence::install_crash_guard(Arc::clone(&self.document));
    }

    /// Swap the extension catalog after a rescan. Follow up with an
    /// `ExtensionCatalogChanged` notification so availability is re-checked.
    pub fn set_catalog(&mut self, catalog: Arc<PhonemizerCatalog>) {
        self.catalog = catalog;
    }

    pub fn catalog(&self) -> &PhonemizerCatalog {
        &self.catalog
    }

    /// Read access to the document. Takes the mutation lock for the duration
    /// of the closure; keep closures short.
    pub fn with_document<R>(&self, f: impl FnOnce(&Project) -> R) -> R {
        let doc = persistence::lock_document(&self.document);
        f(&doc)
    }

    pub fn play_pos(&self) -> i32 {
        self.play_pos
    }

    pub fn has_open_transaction(&self) -> bool {
        self.open_group.is_some()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn add_subscriber(&mut self, subscriber: SubscriberHandle) {
        self.subscribers.add(subscriber);
    }

    pub fn remove_subscriber(&mut self, subscriber: &SubscriberHandle) {
        self.subscribers.remove(subscriber);
    }

    /// True when the document matches what is on disk: nothing editable yet,
    /// or the undo tail sits at the saved point.
    pub fn changes_saved(&self) -> bool {
        let doc = persistence::lock_document(&self.document);
        (doc.saved || doc.tracks.is_empty()) && self.history.changes_saved()
    }

    fn on_owner_thread(&self, operation: &str) -> bool {
        if thread::current().id() == self.owner {
            true
        } else {
            log::error!(target: "doc", "{operation} called off the owner thread; refusing");
            false
        }
    }

    /// The single ingestion entry point. Commands require an open
    /// transaction; notifications run their cascade and bypass history.
    pub fn submit(&mut self, message: Message) {
        let exempt = matches!(
            &message,
            Message::Notification(Notification::Progress { .. })
        );
        if !exempt && !self.on_owner_thread("submit") {
            return;
        }
        match message {
            Message::Notification(notification) => self.handle_notification(notification),
            Message::Command(command) => self.execute_command(command),
        }
    }

    /// Sugar over [`Self::submit`] for concrete command types.
    pub fn submit_command(&mut self, command: impl Command) {
        self.submit(Message::Command(Box::new(command)));
    }

    /// Sugar over [`Self::submit`] for notifications.
    pub fn notify(&mut self, notification: Notification) {
        self.submit(Message::Notification(notification));
    }

    /// Open a transaction. At most one may be open; a stale one is force
    /// committed first — never silently nested.
    pub fn begin_transaction(&mut self, defer_validate: bool) {
        if !self.on_owner_thread("begin_transaction") {
            return;
        }
        if self.open_group.is_some() {
            log::error!(target: "doc", "transaction already open; committing it first");
            self.commit();
        }
        let id = self.history.next_group_id();
        self.open_group = Some(CommandGroup::new(id, defer_validate));
        log::info!(target: "doc", "transaction started");
    }

    /// Close the open transaction and append it to undo history. Always
    /// finishes with a pre-render notification, even for an empty group.
    pub fn commit(&mut self) {
        if !self.on_owner_thread("commit") {
            return;
        }
        let Some(mut group) = self.open_group.take() else {
            log::error!(target: "doc", "no open transaction to commit");
            return;
        };
        let defer_validate = group.defer_validate();
        group.merge();
        // The limit is read live on purpose: a settings change applies to
        // this very commit.
        let limit = self.preferences.undo_limit();
        self.history.commit(group, limit);
        if defer_validate {
            self.validate_full();
        }
        log::info!(target: "doc", "transaction committed");
        self.submit(Message::Notification(Notification::PreRender));
    }

    /// Revert the open transaction's commands in reverse order, leaving the
    /// transaction open but empty and history untouched. The document ends
    /// identical to its state just before `begin_transaction`.
    pub fn rollback(&mut self) {
        if !self.on_owner_thread("rollback") {
            return;
        }
        let Some(group) = self.open_group.as_mut() else {
            log::error!(target: "doc", "no open transaction to roll back");
            return;
        };
        let mut commands = group.take_commands();
        self.revert_commands(&mut commands);
    }

    /// Revert the most recent committed group. No-op when history is empty.
    pub fn undo(&mut self) {
        if !self.on_owner_thread("undo") {
            return;
        }
        let Some(mut group) = self.history.pop_undo() else {
            return;
        };
        self.revert_commands(group.commands_mut());
        self.history.push_redo(group);
        self.submit(Message::Notification(Notification::PreRender));
    }

    /// Re-apply the most recent undone group. No-op when redo is empty.
    pub fn redo(&mut self) {
        if !self.on_owner_thread("redo") {
            return;
        }
        let Some(mut group) = self.history.pop_redo() else {
            return;
        };
        let len = group.len();
        for i in 0..len {
            let applied = {
                let mut doc = persistence::lock_document(&self.document);
                group.commands_mut()[i].apply(&mut doc)
            };
            if let Err(e) = applied {
                log::error!(target: "doc", "redo failed: {e}");
            }
            if i + 1 == len {
                self.validate_full();
            }
            self.subscribers.publish(&Event::Command(&*group.commands()[i]), false);
        }
        self.history.restore_undo(group);
        self.submit(Message::Notification(Notification::PreRender));
    }

    /// Explicit save for interactive callers: same cascade as submitting
    /// `SaveRequested`, but the I/O result is surfaced instead of only
    /// logged. Autosave and crash failures never reach here.
    pub fn save_project(&mut self, path: Option<PathBuf>) -> Result<(), PersistError> {
        if !self.on_owner_thread("save_project") {
            return Err(PersistError::WrongThread);
        }
        let result = self.save_to(path.clone());
        let notification = Notification::SaveRequested { path };
        self.subscribers.publish(&Event::Notification(&notification), false);
        log::info!(target: "doc", "published notification: {notification}");
        result
    }

    /// Periodic snapshot, driven by the host when the autosave timer ticks.
    /// Skipped when the project has never been saved or nothing has
    /// committed since the last autosave (compared by history position).
    pub fn autosave(&mut self) {
        if !self.on_owner_thread("autosave") {
            return;
        }
        // Snapshot under the same lock as mutation, write outside it.
        let (primary, snapshot) = {
            let doc = persistence::lock_document(&self.document);
            match (&doc.file_path, doc.saved) {
                (Some(path), true) => (path.clone(), doc.clone()),
                _ => return,
            }
        };
        if !self.history.autosave_pending() {
            log::info!(target: "persistence", "autosave skipped");
            return;
        }
        let target = persistence::autosave_path(&primary);
        log::info!(target: "persistence", "autosave {}", target.display());
        match persistence::save_project(&target, &snapshot) {
            Ok(()) => {
                self.history.mark_autosaved();
                log::info!(target: "persistence", "autosaved {}", target.display());
            }
            Err(e) => log::error!(target: "persistence", "autosave failed: {e}"),
        }
    }

    fn handle_notification(&mut self, notification: Notification) {
        // Cascade side effects run before delivery.
        match &notification {
            Notification::SaveRequested { path } => {
                if let Err(e) = self.save_to(path.clone()) {
                    log::error!(target: "doc", "save failed: {e}");
                }
            }
            Notification::LoadRequested { project } => {
                self.history.clear();
                self.open_group = None;
                *persistence::lock_document(&self.document) = project.as_ref().clone();
                self.play_pos = 0;
            }
            Notification::PlayPositionChanged { tick } => {
                self.play_pos = *tick;
            }
            Notification::ValidateRequested => {
                self.validate_full();
            }
            Notification::ExtensionCatalogChanged => {
                self.refresh_track_capabilities();
                self.validate_full();
            }
            Notification::VoiceResourceChanged => {
                self.refresh_track_capabilities();
                self.validate_full();
                // Delivered (and fully handled) before this notification.
                self.submit(Message::Notification(Notification::PreRender));
            }
            Notification::PreRender | Notification::Progress { .. } => {}
        }
        self.subscribers.publish(&Event::Notification(&notification), false);
        if !notification.silent() {
            log::info!(target: "doc", "published notification: {notification}");
        }
    }

    fn execute_command(&mut self, mut command: Box<dyn Command>) {
        let Some(group) = self.open_group.as_ref() else {
            log::error!(target: "doc", "no open transaction for command: {command}");
            return;
        };
        let defer_validate = group.defer_validate();
        let applied = {
            let mut doc = persistence::lock_document(&self.document);
            command.apply(&mut doc)
        };
        if let Err(e) = applied {
            // The failed command took no effect and is dropped; unwind the
            // rest and close the transaction so the pre-render still fires.
            log::error!(target: "doc", "command failed: {e}; rolling back transaction");
            self.rollback();
            self.commit();
            return;
        }
        if !command.silent() {
            log::info!(target: "doc", "executed command: {command}");
        }
        let options = command.validate_options();
        self.subscribers.publish(&Event::Command(&*command), false);
        if let Some(group) = self.open_group.as_mut() {
            group.push(command);
        }
        if !defer_validate {
            let catalog = Arc::clone(&self.catalog);
            let mut doc = persistence::lock_document(&self.document);
            validate::validate(&mut doc, &catalog, &options);
        }
    }

    /// Revert `commands` back-to-front, validating once after the first
    /// applied command and publishing each as an undo replay.
    fn revert_commands(&mut self, commands: &mut [Box<dyn Command>]) {
        for i in (0..commands.len()).rev() {
            let reverted = {
                let mut doc = persistence::lock_document(&self.document);
                commands[i].revert(&mut doc)
            };
            if let Err(e) = reverted {
                log::error!(target: "doc", "revert failed: {e}");
            }
            if i == 0 {
                self.validate_full();
            }
            self.subscribers.publish(&Event::Command(&*commands[i]), true);
        }
    }

    fn save_to(&mut self, path: Option<PathBuf>) -> Result<(), PersistError> {
        self.history.mark_saved();
        let (target, snapshot) = {
            let doc = persistence::lock_document(&self.document);
            let target = match path.or_else(|| doc.file_path.clone()) {
                Some(p) => p,
                None => return Err(PersistError::NoPath),
            };
            (target, doc.clone())
        };
        persistence::save_project(&target, &snapshot)?;
        let mut doc = persistence::lock_document(&self.document);
        doc.file_path = Some(target);
        doc.saved = true;
        Ok(())
    }

    fn refresh_track_capabilities(&self) {
        let doc = persistence::lock_document(&self.document);
        for track in &doc.tracks {
            if !self.catalog.contains(&track.phonemizer) {
                log::warn!(
                    target: "doc",
                    "track {} references unavailable phonemizer {}",
                    track.name,
                    track.phonemizer
                );
            }
        }
    }

    fn validate_full(&mut self) {
        let catalog = Arc::clone(&self.catalog);
        let mut doc = persistence::lock_document(&self.document);
        validate::validate_full(&mut doc, &catalog);
    }
}
