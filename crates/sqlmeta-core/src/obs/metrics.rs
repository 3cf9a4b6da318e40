use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::BTreeMap};

///
/// EventState
/// Ephemeral, thread-local counters for framework operations.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub kinds: BTreeMap<String, KindCounters>,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventOps {
    // Population
    pub populate_calls: u64,
    pub populate_failures: u64,
    pub members_loaded: u64,

    // Collection mutation
    pub mutations_rejected: u64,
    pub renumber_calls: u64,
    pub members_shifted: u64,

    // Dependency ordering
    pub orders_computed: u64,
    pub nodes_ordered: u64,
    pub hard_edges: u64,
    pub cycles_detected: u64,
}

///
/// KindCounters
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct KindCounters {
    pub populate_calls: u64,
    pub members_loaded: u64,
    pub mutations_rejected: u64,
    pub members_shifted: u64,
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventReport {
    pub ops: EventOps,
    pub kinds: Vec<(String, KindCounters)>,
}

impl EventReport {
    #[must_use]
    pub fn kind(&self, type_name: &str) -> Option<&KindCounters> {
        self.kinds
            .iter()
            .find(|(name, _)| name == type_name)
            .map(|(_, counters)| counters)
    }
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

/// Build a report from the in-memory counters.
#[must_use]
pub(crate) fn report() -> EventReport {
    with_state(|m| EventReport {
        ops: m.ops.clone(),
        kinds: m
            .kinds
            .iter()
            .map(|(name, counters)| (name.clone(), counters.clone()))
            .collect(),
    })
}
