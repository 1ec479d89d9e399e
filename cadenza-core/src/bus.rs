//! Synchronous publish/subscribe fan-out for accepted commands and
//! notifications. Delivery happens in registration order on the calling
//! thread; a misbehaving subscriber is isolated so the rest still hear
//! about the mutation.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::command::Command;
use crate::notification::Notification;

/// A single delivery: either an executed (or replayed) command, or a system
/// notification. Borrowed — subscribers observe, they don't own.
pub enum Event<'a> {
    Command(&'a dyn Command),
    Notification(&'a Notification),
}

/// An external observer registered with the bus. Receives every delivered
/// command and notification; `is_undo` marks undo-replay deliveries so views
/// can distinguish a reverted edit from a fresh one.
pub trait Subscriber {
    fn on_event(&mut self, event: &Event<'_>, is_undo: bool);
}

/// Shared subscriber handle. Callers keep a clone to unregister later;
/// identity is the allocation, so add/remove are idempotent.
pub type SubscriberHandle = Rc<RefCell<dyn Subscriber>>;

#[derive(Default)]
pub struct SubscriberList {
    subscribers: Vec<SubscriberHandle>,
}

impl SubscriberList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Adding one that is already present is a no-op.
    pub fn add(&mut self, subscriber: SubscriberHandle) {
        if !self.subscribers.iter().any(|s| Rc::ptr_eq(s, &subscriber)) {
            self.subscribers.push(subscriber);
        }
    }

    /// Unregister a subscriber. Removing one that is absent is a no-op.
    pub fn remove(&mut self, subscriber: &SubscriberHandle) {
        self.subscribers.retain(|s| !Rc::ptr_eq(s, subscriber));
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver to every subscriber in registration order. A panicking
    /// subscriber is logged and skipped; it must not starve the others.
    pub fn publish(&self, event: &Event<'_>, is_undo: bool) {
        for subscriber in &self.subscribers {
            let result = catch_unwind(AssertUnwindSafe(|| {
                subscriber.borrow_mut().on_event(event, is_undo);
            }));
            if result.is_err() {
                log::error!(target: "bus", "subscriber panicked during delivery");
            }
        }
    }
}
