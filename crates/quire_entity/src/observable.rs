//! Event channels and ordered notification.
//!
//! Notifications raised while another one is being dispatched are queued and
//! dispatched after it, in the order they were raised.

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use quire_foundation::Value;

/// A field or property changed. Argument: object of new values by name.
pub const ON_PROPERTY_CHANGE: &str = "onPropertyChange";
/// The lifecycle state changed. Argument: the new state name.
pub const ON_STATE_CHANGE: &str = "onStateChange";
/// An enum or flags value changed. Arguments depend on the source.
pub const ON_CHANGE: &str = "onChange";
/// Event raising was switched. Argument: the new setting.
pub const ON_EVENT_RAISING_CHANGE: &str = "onEventRaisingChange";
/// Rows of a recordset were added, removed or replaced. Arguments: the
/// action name and the row index.
pub const ON_COLLECTION_CHANGE: &str = "onCollectionChange";

/// A raised event.
#[derive(Clone, Debug)]
pub struct Event {
    /// Event name.
    pub name: Arc<str>,
    /// Event arguments.
    pub args: Vec<Value>,
}

impl Event {
    /// Creates an event.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Event handler.
pub type Handler = Rc<dyn Fn(&Event)>;

/// Identifies a subscription for later removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Publish/subscribe channel.
#[derive(Default)]
pub struct EventChannel {
    published: RefCell<HashSet<Arc<str>>>,
    handlers: RefCell<Vec<(SubscriptionId, Arc<str>, Handler)>>,
    next_id: Cell<u64>,
}

impl EventChannel {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an event name as published by this channel.
    pub fn publish(&self, name: impl Into<Arc<str>>) {
        self.published.borrow_mut().insert(name.into());
    }

    /// Returns true if the event name was published.
    #[must_use]
    pub fn is_published(&self, name: &str) -> bool {
        self.published.borrow().contains(name)
    }

    /// Subscribes a handler to an event.
    pub fn subscribe(&self, name: impl Into<Arc<str>>, handler: impl Fn(&Event) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers
            .borrow_mut()
            .push((id, name.into(), Rc::new(handler)));
        id
    }

    /// Removes a subscription. Returns false if it did not exist.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(existing, _, _)| *existing != id);
        handlers.len() != before
    }

    /// Returns true if anyone listens to the event.
    #[must_use]
    pub fn has_handlers(&self, name: &str) -> bool {
        self.handlers
            .borrow()
            .iter()
            .any(|(_, event, _)| &**event == name)
    }

    /// Calls every handler of the event immediately. Returns how many ran.
    pub fn notify(&self, event: &Event) -> usize {
        let handlers: Vec<Handler> = self
            .handlers
            .borrow()
            .iter()
            .filter(|(_, name, _)| *name == event.name)
            .map(|(_, _, handler)| handler.clone())
            .collect();
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("handlers", &self.handlers.borrow().len())
            .finish()
    }
}

/// Serializes notifications of one entity through a FIFO queue.
#[derive(Debug)]
pub struct Notifier {
    channel: EventChannel,
    queue: RefCell<VecDeque<Event>>,
    draining: Cell<bool>,
    enabled: Cell<bool>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    /// Creates a notifier publishing the standard entity events.
    #[must_use]
    pub fn new() -> Self {
        let channel = EventChannel::new();
        for name in [
            ON_PROPERTY_CHANGE,
            ON_STATE_CHANGE,
            ON_CHANGE,
            ON_EVENT_RAISING_CHANGE,
            ON_COLLECTION_CHANGE,
        ] {
            channel.publish(name);
        }
        Self {
            channel,
            queue: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
            enabled: Cell::new(true),
        }
    }

    /// The underlying channel.
    #[must_use]
    pub fn channel(&self) -> &EventChannel {
        &self.channel
    }

    /// Returns true if events are raised.
    #[must_use]
    pub fn is_event_raising(&self) -> bool {
        self.enabled.get()
    }

    /// Switches event raising on or off and announces the switch.
    pub fn set_event_raising(&self, enabled: bool) {
        if self.enabled.replace(enabled) == enabled {
            return;
        }
        self.dispatch(Event::new(ON_EVENT_RAISING_CHANGE, vec![Value::Bool(enabled)]));
    }

    /// Raises an event, or drops it while event raising is off.
    pub fn notify(&self, name: &str, args: Vec<Value>) {
        if !self.enabled.get() || !self.channel.has_handlers(name) {
            return;
        }
        self.dispatch(Event::new(name, args));
    }

    fn dispatch(&self, event: Event) {
        self.queue.borrow_mut().push_back(event);
        if self.draining.replace(true) {
            return;
        }
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            self.channel.notify(&event);
        }
        self.draining.set(false);
    }
}
