use std::fmt;

/// Identifies a subscription on an [`EventBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Box<dyn FnMut(&T) + Send>;

/// Synchronous observer registry.
///
/// Subscribers are called in registration order on the emitting thread.
/// Registration survives re-renders; there is nothing to re-bind.
pub struct EventBus<T> {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler<T>)>,
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            handlers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&T) + Send + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(subscribed, _)| *subscribed != id);
        self.handlers.len() != before
    }

    pub fn emit(&mut self, event: &T) {
        for (_, handler) in self.handlers.iter_mut() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::<u32>::new();

        let first = {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |event| seen.lock().unwrap().push(("first", *event)))
        };
        {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |event| seen.lock().unwrap().push(("second", *event)));
        }

        bus.emit(&1);
        assert!(bus.unsubscribe(first));
        assert!(!bus.unsubscribe(first));
        bus.emit(&2);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", 1), ("second", 1), ("second", 2)]
        );
        assert_eq!(bus.len(), 1);
    }
}
