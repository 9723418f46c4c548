//! Typed event notification
//!
//! Each [`Document`](crate::Document) owns its own notifier instance, so
//! two documents in one process never observe each other's events.

use dom::NodeId;

/// Handle returned by [`EventNotifier::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Events emitted while operations execute against a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    /// New steps exist at or after `position`
    StepsInserted { position: usize },
    /// Steps at or after `position` are gone
    StepsRemoved { position: usize },
    /// A paragraph's content or style changed
    ParagraphChanged {
        paragraph: NodeId,
        member_id: String,
    },
    CursorAdded { member_id: String },
    CursorMoved { member_id: String },
    CursorRemoved { member_id: String },
    MemberAdded { member_id: String },
    MemberRemoved { member_id: String },
    StyleCreated { name: String, family: String },
    StyleDeleted { name: String, family: String },
    MetadataUpdated,
}

type Callback<E> = Box<dyn FnMut(&E) + Send>;

/// Instance-scoped observer registry
pub struct EventNotifier<E> {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Callback<E>)>,
}

impl<E> Default for EventNotifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventNotifier<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&E) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|(sid, _)| *sid != id);
    }

    pub fn emit(&mut self, event: &E) {
        for (_, callback) in &mut self.subscribers {
            callback(event);
        }
    }
}

impl<E> std::fmt::Debug for EventNotifier<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventNotifier")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut notifier = EventNotifier::<u32>::new();
        let c = count.clone();
        let id = notifier.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        notifier.emit(&1);
        notifier.emit(&2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        notifier.unsubscribe(id);
        notifier.emit(&3);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
