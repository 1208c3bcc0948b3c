//! In-process publish/subscribe with unsubscribe tokens.
//!
//! Handlers run synchronously in registration order. A failing or panicking
//! handler is logged and skipped; it never interrupts the other handlers or
//! the mutation that triggered them.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ListenerError, ListenerResult};

// Handler isolation relies on unwinding.
#[cfg(panic = "abort")]
compile_error!("zonesync-core must be built with panic = \"unwind\"");

type Handler<T> = Arc<dyn Fn(&T) -> ListenerResult + Send + Sync>;

/// Token returned by [`Listeners::subscribe`]; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use = "dropping the token makes the subscription permanent"]
pub struct Subscription(u64);

/// Ordered set of handlers for one kind of notification.
pub struct Listeners<T> {
    label: &'static str,
    next_id: AtomicU64,
    handlers: RwLock<Vec<(u64, Handler<T>)>>,
}

impl<T> Listeners<T> {
    /// Creates an empty set. `label` prefixes log lines for failing handlers.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            next_id: AtomicU64::new(1),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Registers a handler after all existing ones.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) -> ListenerResult + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.write().push((id, Arc::new(handler)));
        Subscription(id)
    }

    /// Removes a handler. Returns false if the token was already removed.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != subscription.0);
        handlers.len() < before
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Calls every handler with `value` and returns the failures.
    ///
    /// The handler list is snapshotted first, so handlers may subscribe or
    /// unsubscribe re-entrantly without deadlocking.
    pub fn trigger(&self, value: &T) -> Vec<ListenerError> {
        let handlers: Vec<Handler<T>> = self
            .handlers
            .read()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();

        let mut failures = Vec::new();
        for handler in handlers {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(value)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(payload) => ListenerError::Panicked(panic_message(payload.as_ref())),
            };
            log::warn!("[{}] Listener error: {}", self.label, error);
            failures.push(error);
        }
        failures
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn handlers_run_in_registration_order() {
        let listeners = Listeners::<u32>::new("test");
        let calls = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let calls = Arc::clone(&calls);
            let _ = listeners.subscribe(move |v: &u32| {
                calls.lock().push(format!("{tag}{v}"));
                Ok(())
            });
        }

        listeners.trigger(&1);
        assert_eq!(*calls.lock(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn unsubscribe_removes_only_that_handler() {
        let listeners = Listeners::<u32>::new("test");
        let calls = Arc::new(Mutex::new(Vec::new()));

        let c = Arc::clone(&calls);
        let first = listeners.subscribe(move |_| {
            c.lock().push("first");
            Ok(())
        });
        let c = Arc::clone(&calls);
        let _second = listeners.subscribe(move |_| {
            c.lock().push("second");
            Ok(())
        });

        assert!(listeners.unsubscribe(first));
        assert!(!listeners.unsubscribe(first));
        listeners.trigger(&0);

        assert_eq!(*calls.lock(), vec!["second"]);
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn failing_handler_does_not_stop_the_others() {
        let listeners = Listeners::<u32>::new("test");
        let reached = Arc::new(Mutex::new(false));

        let _ = listeners.subscribe(|_| Err(ListenerError::Failed("nope".into())));
        let _ = listeners.subscribe(|_| panic!("boom"));
        let r = Arc::clone(&reached);
        let _ = listeners.subscribe(move |_| {
            *r.lock() = true;
            Ok(())
        });

        let failures = listeners.trigger(&0);

        assert!(*reached.lock());
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0], ListenerError::Failed("nope".into()));
        assert_eq!(failures[1], ListenerError::Panicked("boom".into()));
    }

    #[test]
    fn handler_may_unsubscribe_itself_during_trigger() {
        let listeners = Arc::new(Listeners::<u32>::new("test"));
        let token = Arc::new(Mutex::new(None));

        let l = Arc::clone(&listeners);
        let t = Arc::clone(&token);
        let sub = listeners.subscribe(move |_| {
            if let Some(sub) = t.lock().take() {
                l.unsubscribe(sub);
            }
            Ok(())
        });
        *token.lock() = Some(sub);

        listeners.trigger(&0);
        assert!(listeners.is_empty());
    }
}
