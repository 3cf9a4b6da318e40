//! Metrics sink boundary.
//!
//! All instrumentation flows through MetricsEvent and MetricsSink.
//! This module is the only bridge between framework logic and the
//! thread-local counter state.

use crate::{kind::ObjectKind, obs::metrics};
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = const { RefCell::new(None) };
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    PopulateStart {
        kind: ObjectKind,
    },
    PopulateFinish {
        kind: ObjectKind,
        members: u64,
    },
    PopulateFailed {
        kind: ObjectKind,
    },
    MutationRejected {
        kind: ObjectKind,
    },
    Renumbered {
        kind: ObjectKind,
        shifted: u64,
    },
    OrderComputed {
        nodes: u64,
        hard_edges: u64,
    },
    CycleDetected,
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default sink that writes into the thread-local counters.
/// Used whenever no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::PopulateStart { kind } => {
                metrics::with_state_mut(|m| {
                    m.ops.populate_calls = m.ops.populate_calls.saturating_add(1);
                    let entry = m.kinds.entry(kind.to_string()).or_default();
                    entry.populate_calls = entry.populate_calls.saturating_add(1);
                });
            }

            MetricsEvent::PopulateFinish { kind, members } => {
                metrics::with_state_mut(|m| {
                    m.ops.members_loaded = m.ops.members_loaded.saturating_add(members);
                    let entry = m.kinds.entry(kind.to_string()).or_default();
                    entry.members_loaded = entry.members_loaded.saturating_add(members);
                });
            }

            MetricsEvent::PopulateFailed { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.populate_failures = m.ops.populate_failures.saturating_add(1);
                });
            }

            MetricsEvent::MutationRejected { kind } => {
                metrics::with_state_mut(|m| {
                    m.ops.mutations_rejected = m.ops.mutations_rejected.saturating_add(1);
                    let entry = m.kinds.entry(kind.to_string()).or_default();
                    entry.mutations_rejected = entry.mutations_rejected.saturating_add(1);
                });
            }

            MetricsEvent::Renumbered { kind, shifted } => {
                metrics::with_state_mut(|m| {
                    m.ops.renumber_calls = m.ops.renumber_calls.saturating_add(1);
                    m.ops.members_shifted = m.ops.members_shifted.saturating_add(shifted);
                    let entry = m.kinds.entry(kind.to_string()).or_default();
                    entry.members_shifted = entry.members_shifted.saturating_add(shifted);
                });
            }

            MetricsEvent::OrderComputed { nodes, hard_edges } => {
                metrics::with_state_mut(|m| {
                    m.ops.orders_computed = m.ops.orders_computed.saturating_add(1);
                    m.ops.nodes_ordered = m.ops.nodes_ordered.saturating_add(nodes);
                    m.ops.hard_edges = m.ops.hard_edges.saturating_add(hard_edges);
                });
            }

            MetricsEvent::CycleDetected => {
                metrics::with_state_mut(|m| {
                    m.ops.cycles_detected = m.ops.cycles_detected.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());

    match sink {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the current thread's counters.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all counters on the current thread.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
/// The previous sink is restored on every exit, including unwinding.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let prev = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = prev;
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}
