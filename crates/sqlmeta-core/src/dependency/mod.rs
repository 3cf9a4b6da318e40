//! Dependency discovery, walking and ordering.
//!
//! Discovery (an external collaborator) expands a root set into a
//! [`DependencyTree`]. The [`DependencyWalker`] flattens the tree into a
//! deduplicated [`DependencyList`] in discovery order, and the
//! [`DependencyOrderer`] sorts that list over its schema-bound edges.

mod order;
mod walker;


pub use order::{DependencyOrderer, OrderDirection, PlanStep, ScriptPlan};
pub use walker::{DependencyWalker, DiscoveryProgress};

use crate::{
    error::{BoxError, ErrorClass, ErrorOrigin},
    kind::ObjectKind,
    urn::Urn,
};
use thiserror::Error as ThisError;

///
/// DependencyError
///

#[derive(Debug, ThisError)]
#[remain::sorted]
pub enum DependencyError {
    #[error("schema-bound dependency cycle: {}", nodes.join(" -> "))]
    Cycle { nodes: Vec<String> },

    #[error("{urn} is on server '{found}', expected '{expected}'")]
    ServerMismatch {
        urn: String,
        expected: String,
        found: String,
    },

    #[error("dependency edge references unknown node {index} (list has {len})")]
    UnknownNode { index: usize, len: usize },
}

impl DependencyError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Cycle { .. } | Self::UnknownNode { .. } => ErrorClass::Graph,
            Self::ServerMismatch { .. } => ErrorClass::State,
        }
    }

    #[must_use]
    pub const fn origin(&self) -> ErrorOrigin {
        ErrorOrigin::Dependency
    }
}

///
/// DiscoveryDirection
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiscoveryDirection {
    /// Expand each root into the objects it depends on.
    Parents,

    /// Expand each root into the objects that depend on it.
    Children,
}

///
/// DependencyDiscovery
///
/// External service expanding a root set into a dependency tree.
///

pub trait DependencyDiscovery {
    fn discover(
        &self,
        roots: &[Urn],
        direction: DiscoveryDirection,
    ) -> Result<DependencyTree, BoxError>;
}

///
/// DependencyTree
///
/// Tree as returned by discovery. The same object may appear more than
/// once; the walker removes duplicates.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DependencyTree {
    pub direction: DiscoveryDirection,
    pub roots: Vec<DependencyTreeNode>,
}

impl DependencyTree {
    #[must_use]
    pub const fn new(direction: DiscoveryDirection, roots: Vec<DependencyTreeNode>) -> Self {
        Self { direction, roots }
    }

    /// Number of nodes in the tree, duplicates included.
    #[must_use]
    pub fn count(&self) -> usize {
        self.roots.iter().map(DependencyTreeNode::count).sum()
    }
}

///
/// DependencyTreeNode
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DependencyTreeNode {
    pub urn: Urn,
    pub schema_bound: bool,
    pub children: Vec<Self>,
}

impl DependencyTreeNode {
    pub fn new(urn: impl Into<Urn>, schema_bound: bool) -> Self {
        Self {
            urn: urn.into(),
            schema_bound,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    fn count(&self) -> usize {
        1 + self.children.iter().map(Self::count).sum::<usize>()
    }
}

///
/// DependencyNode
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DependencyNode {
    pub urn: Urn,
    pub kind: ObjectKind,
    pub schema_bound: bool,

    /// Part of the original root set.
    pub root: bool,

    /// Whether the kind may be created or dropped inside a user transaction.
    pub transactable: bool,
}

impl DependencyNode {
    pub fn new(urn: impl Into<Urn>, kind: ObjectKind) -> Self {
        Self {
            urn: urn.into(),
            kind,
            schema_bound: false,
            root: false,
            transactable: kind.is_transactable(),
        }
    }

    #[must_use]
    pub const fn schema_bound(mut self, schema_bound: bool) -> Self {
        self.schema_bound = schema_bound;
        self
    }

    #[must_use]
    pub const fn root(mut self, root: bool) -> Self {
        self.root = root;
        self
    }
}

///
/// DependencyEdge
///
/// `dependent` needs `dependency`; both are indexes into the owning list.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DependencyEdge {
    pub dependent: usize,
    pub dependency: usize,
    pub schema_bound: bool,
}

impl DependencyEdge {
    /// Soft edges may be split across a transaction boundary; hard edges
    /// may only when both endpoints are transactable.
    #[must_use]
    pub fn may_cross_transaction(&self, list: &DependencyList) -> bool {
        if !self.schema_bound {
            return true;
        }

        [self.dependent, self.dependency]
            .iter()
            .filter_map(|&i| list.nodes.get(i))
            .all(|node| node.transactable)
    }
}

///
/// DependencyList
///
/// Deduplicated nodes in discovery order plus the edges between them.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DependencyList {
    nodes: Vec<DependencyNode>,
    edges: Vec<DependencyEdge>,
}

impl DependencyList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &[DependencyNode] {
        &self.nodes
    }

    #[must_use]
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a node; returns its index.
    pub fn push_node(&mut self, node: DependencyNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Record that `dependent` needs `dependency`.
    pub fn push_edge(
        &mut self,
        dependent: usize,
        dependency: usize,
        schema_bound: bool,
    ) -> Result<(), DependencyError> {
        let len = self.nodes.len();
        if let Some(&index) = [dependent, dependency].iter().find(|&&i| i >= len) {
            return Err(DependencyError::UnknownNode { index, len });
        }

        let edge = DependencyEdge {
            dependent,
            dependency,
            schema_bound,
        };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }

        Ok(())
    }

    /// Index of the first node with exactly this URN.
    #[must_use]
    pub fn position(&self, urn: &Urn) -> Option<usize> {
        self.nodes.iter().position(|node| &node.urn == urn)
    }
}
