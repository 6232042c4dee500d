//! Boot lifecycle events.
//!
//! # Responsibility
//! - Deliver kernel lifecycle notifications to in-process subscribers.
//!
//! # Invariants
//! - Delivery is synchronous, on the publishing thread, in subscription order.
//! - Dispatch iterates a snapshot of the subscriber list, so a callback may
//!   subscribe further callbacks without corrupting the running dispatch.
//! - No replay: late subscribers only observe later publishes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Aggregate load counts carried by the boot-complete event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub total: usize,
    pub loaded: usize,
    pub failed: usize,
}

/// Discriminant used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KernelEventKind {
    ModulesLoaded,
}

impl KernelEventKind {
    /// Stable wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ModulesLoaded => EVENT_MODULES_LOADED,
        }
    }
}

/// Wire name of the boot-complete event.
pub const EVENT_MODULES_LOADED: &str = "modules:loaded";

/// Closed set of kernel lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelEvent {
    /// Emitted once per boot after discovery and loading have settled.
    ModulesLoaded {
        summary: LoadSummary,
        /// Kernel uptime at emission.
        uptime_ms: u128,
    },
}

impl KernelEvent {
    pub fn kind(&self) -> KernelEventKind {
        match self {
            Self::ModulesLoaded { .. } => KernelEventKind::ModulesLoaded,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }
}

type Callback = Rc<dyn Fn(&KernelEvent)>;

/// In-process publish/subscribe bus keyed by event kind.
#[derive(Default)]
pub struct EventBus {
    subscribers: RefCell<BTreeMap<KernelEventKind, Vec<Callback>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `callback` to the ordered subscriber list of `kind`.
    pub fn subscribe(&self, kind: KernelEventKind, callback: impl Fn(&KernelEvent) + 'static) {
        self.subscribers
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(Rc::new(callback));
    }

    /// Invokes every current subscriber of the event's kind.
    ///
    /// Subscriber panics are not caught here.
    pub fn publish(&self, event: &KernelEvent) {
        let snapshot: Vec<Callback> = self
            .subscribers
            .borrow()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        for callback in snapshot {
            callback(event);
        }
    }

    pub fn subscriber_count(&self, kind: KernelEventKind) -> usize {
        self.subscribers
            .borrow()
            .get(&kind)
            .map_or(0, |callbacks| callbacks.len())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<&'static str, usize> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(kind, callbacks)| (kind.as_str(), callbacks.len()))
            .collect();
        f.debug_struct("EventBus")
            .field("subscribers", &counts)
            .finish()
    }
}
