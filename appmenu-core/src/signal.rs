use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

type Listener<E> = Rc<dyn Fn(&E)>;

struct Slots<E: 'static> {
    next_id: u64,
    listeners: Vec<(u64, Listener<E>)>,
}

/// Typed event emitter based on [Rc] and [RefCell].
///
/// Listeners are attached with [Emitter::subscribe] and stay attached for as long as the
/// returned [Subscription] lives. Emitting clones the listener list first, so a listener may
/// subscribe or drop subscriptions while it is being called.
pub struct Emitter<E: 'static> {
    slots: Rc<RefCell<Slots<E>>>,
}

impl<E: 'static> Emitter<E> {
    /// Creates an emitter without listeners.
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                listeners: Vec::with_capacity(1),
            })),
        }
    }

    /// Attach a listener. It is detached again when the returned handle is dropped.
    #[must_use = "dropping the subscription detaches the listener immediately"]
    pub fn subscribe(&self, listener: impl Fn(&E) + 'static) -> Subscription {
        let id = {
            let mut slots = self.slots.borrow_mut();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.listeners.push((id, Rc::new(listener)));
            id
        };

        let weak: Weak<RefCell<Slots<E>>> = Rc::downgrade(&self.slots);
        Subscription {
            detach: Some(Box::new(move || {
                if let Some(slots) = weak.upgrade() {
                    slots.borrow_mut().listeners.retain(|(slot, _)| *slot != id);
                }
            })),
        }
    }

    /// Attach an [Inbox] that collects every emitted event for later draining.
    #[must_use = "dropping the subscription detaches the inbox immediately"]
    pub fn queue(&self) -> (Subscription, Inbox<E>)
    where
        E: Clone,
    {
        let inbox = Inbox::new();
        let sink = inbox.clone();
        let subscription = self.subscribe(move |event: &E| sink.push(event.clone()));
        (subscription, inbox)
    }

    /// Call every attached listener with the event, in subscription order.
    pub fn emit(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self
            .slots
            .borrow()
            .listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(event);
        }
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.slots.borrow().listeners.len()
    }
}

impl<E: 'static> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle of an attached listener. Dropping it detaches the listener.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Detach the listener now.
    pub fn cancel(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }

    /// Keep the listener attached for the lifetime of the emitter.
    pub fn forget(mut self) {
        self.detach = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

/// Shared FIFO of events, filled by an emitter listener and drained by its owner.
pub struct Inbox<E> {
    queue: Rc<RefCell<VecDeque<E>>>,
}

impl<E> Inbox<E> {
    /// Creates an empty inbox.
    pub fn new() -> Self {
        Self {
            queue: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Append an event.
    pub fn push(&self, event: E) {
        self.queue.borrow_mut().push_back(event);
    }

    /// Take all queued events in arrival order.
    pub fn drain(&self) -> Vec<E> {
        self.queue.borrow_mut().drain(..).collect()
    }

    /// Whether there is nothing queued.
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl<E> Clone for Inbox<E> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<E> Default for Inbox<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_listener_detached_on_drop() {
        let emitter = Emitter::<u32>::new();
        let hits = Rc::new(Cell::new(0));

        let counter = hits.clone();
        let subscription = emitter.subscribe(move |value| counter.set(counter.get() + *value));
        emitter.emit(&2);
        assert_eq!(hits.get(), 2);
        assert_eq!(emitter.listener_count(), 1);

        drop(subscription);
        emitter.emit(&5);
        assert_eq!(hits.get(), 2);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_subscription_outlives_emitter() {
        let emitter = Emitter::<()>::new();
        let subscription = emitter.subscribe(|_| {});
        drop(emitter);
        subscription.cancel();
    }

    #[test]
    fn test_inbox_preserves_order() {
        let emitter = Emitter::<&'static str>::new();
        let (_subscription, inbox) = emitter.queue();
        emitter.emit(&"a");
        emitter.emit(&"b");
        emitter.emit(&"c");
        assert_eq!(inbox.drain(), vec!["a", "b", "c"]);
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_listener_may_subscribe_while_emitting() {
        let emitter = Rc::new(Emitter::<u8>::new());
        let late = Rc::new(RefCell::new(Vec::new()));

        let inner = emitter.clone();
        let keep = late.clone();
        let _outer = emitter.subscribe(move |_| {
            keep.borrow_mut().push(inner.subscribe(|_| {}));
        });

        emitter.emit(&1);
        assert_eq!(emitter.listener_count(), 2);
    }
}
