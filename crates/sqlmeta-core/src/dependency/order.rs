use super::{DependencyError, DependencyList, DependencyNode};
use crate::{
    error::Error,
    lifecycle::ScriptIntent,
    obs::sink::{self, MetricsEvent},
};
use tracing::{debug, warn};

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OrderDirection {
    /// Dependencies before the objects that need them.
    Create,

    /// Exact reverse of `Create`.
    Drop,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

///
/// DependencyOrderer
///
/// Stable depth-first topological sort over schema-bound edges. Soft edges
/// never constrain the order. Nodes are started in list order and each
/// node's dependencies are visited in edge order, so the same list always
/// yields the same sequence.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct DependencyOrderer;

impl DependencyOrderer {
    pub fn order(list: &DependencyList, direction: OrderDirection) -> Result<Vec<DependencyNode>, Error> {
        let order = Self::order_indices(list, direction)?;

        Ok(order.into_iter().map(|i| list.nodes()[i].clone()).collect())
    }

    /// Ordered indexes into `list.nodes()`.
    pub fn order_indices(list: &DependencyList, direction: OrderDirection) -> Result<Vec<usize>, Error> {
        let len = list.len();

        let mut needs: Vec<Vec<usize>> = vec![Vec::new(); len];
        let mut hard_edges = 0u64;
        for edge in list.edges().iter().filter(|edge| edge.schema_bound) {
            needs[edge.dependent].push(edge.dependency);
            hard_edges += 1;
        }

        let mut sort = Sort {
            list,
            needs,
            marks: vec![Mark::Unvisited; len],
            stack: Vec::new(),
            sorted: Vec::with_capacity(len),
        };
        for index in 0..len {
            sort.visit(index)?;
        }

        let mut sorted = sort.sorted;
        if direction == OrderDirection::Drop {
            sorted.reverse();
        }

        debug!(nodes = len, hard_edges, direction = ?direction, "dependency order computed");
        sink::record(MetricsEvent::OrderComputed {
            nodes: len as u64,
            hard_edges,
        });

        Ok(sorted)
    }
}

struct Sort<'a> {
    list: &'a DependencyList,
    needs: Vec<Vec<usize>>,
    marks: Vec<Mark>,
    stack: Vec<usize>,
    sorted: Vec<usize>,
}

impl Sort<'_> {
    fn visit(&mut self, index: usize) -> Result<(), DependencyError> {
        match self.marks[index] {
            Mark::Done => return Ok(()),
            Mark::InProgress => return Err(self.cycle(index)),
            Mark::Unvisited => {}
        }

        self.marks[index] = Mark::InProgress;
        self.stack.push(index);

        for i in 0..self.needs[index].len() {
            let dependency = self.needs[index][i];
            self.visit(dependency)?;
        }

        self.stack.pop();
        self.marks[index] = Mark::Done;
        self.sorted.push(index);

        Ok(())
    }

    // the cycle is the stack suffix starting at the repeated node
    fn cycle(&self, index: usize) -> DependencyError {
        let start = self.stack.iter().position(|&i| i == index).unwrap_or(0);
        let nodes: Vec<String> = self.stack[start..]
            .iter()
            .chain(std::iter::once(&index))
            .map(|&i| self.list.nodes()[i].urn.to_string())
            .collect();

        warn!(nodes = %nodes.join(" -> "), "schema-bound dependency cycle");
        sink::record(MetricsEvent::CycleDetected);

        DependencyError::Cycle { nodes }
    }
}

///
/// PlanStep
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlanStep {
    pub node: DependencyNode,
    pub intent: ScriptIntent,
}

///
/// ScriptPlan
///
/// Ordered create and drop sequences for a dependency list. Nodes whose
/// intent is `Ignore` are left out together with every edge touching them.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScriptPlan {
    creates: Vec<PlanStep>,
    drops: Vec<PlanStep>,
}

impl ScriptPlan {
    pub fn build(
        list: &DependencyList,
        intent_of: impl Fn(&DependencyNode) -> ScriptIntent,
    ) -> Result<Self, Error> {
        let mut active = DependencyList::new();
        let mut intents = Vec::new();
        let mut remap = vec![None; list.len()];

        for (i, node) in list.nodes().iter().enumerate() {
            let intent = intent_of(node);
            if intent != ScriptIntent::Ignore {
                remap[i] = Some(active.push_node(node.clone()));
                intents.push(intent);
            }
        }
        for edge in list.edges() {
            if let (Some(a), Some(b)) = (remap[edge.dependent], remap[edge.dependency]) {
                active.push_edge(a, b, edge.schema_bound)?;
            }
        }

        let order = DependencyOrderer::order_indices(&active, OrderDirection::Create)?;
        let step = |i: usize| PlanStep {
            node: active.nodes()[i].clone(),
            intent: intents[i],
        };

        let creates = order
            .iter()
            .copied()
            .filter(|&i| matches!(intents[i], ScriptIntent::Create | ScriptIntent::Alter))
            .map(step)
            .collect();
        let drops = order
            .iter()
            .rev()
            .copied()
            .filter(|&i| intents[i] == ScriptIntent::Drop)
            .map(step)
            .collect();

        Ok(Self { creates, drops })
    }

    /// Creates and alters, dependencies first.
    #[must_use]
    pub fn creates(&self) -> &[PlanStep] {
        &self.creates
    }

    /// Drops, dependents first.
    #[must_use]
    pub fn drops(&self) -> &[PlanStep] {
        &self.drops
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.drops.is_empty()
    }
}
