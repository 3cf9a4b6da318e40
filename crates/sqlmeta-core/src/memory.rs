//! In-memory collaborators.
//!
//! Offline stand-ins for the populator, the dependency discovery service and
//! the script executor. They back design-time models built without a server
//! and drive the test suites.

use crate::{
    capability::{ScriptAction, ScriptExecutor, ScriptRequest},
    collection::{MemberDescriptor, PopulateRequest, Populator},
    dependency::{DependencyDiscovery, DependencyTree, DependencyTreeNode, DiscoveryDirection},
    error::BoxError,
    key::ObjectKey,
    kind::ObjectKind,
    urn::Urn,
};
use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
};
use thiserror::Error as ThisError;

///
/// MemoryError
///

#[derive(Debug, ThisError)]
#[error("{0}")]
pub struct MemoryError(pub String);

///
/// MemoryPopulator
///
/// Members keyed by parent URN and kind, returned in insertion order.
/// A filter keeps the members whose key filter expression contains it.
///

#[derive(Debug, Default)]
pub struct MemoryPopulator {
    members: RefCell<BTreeMap<(String, ObjectKind), Vec<MemberDescriptor>>>,
    requests: RefCell<Vec<PopulateRequest>>,
    failing: Cell<bool>,
}

impl MemoryPopulator {
    pub fn insert(&self, parent: &str, kind: ObjectKind, member: MemberDescriptor) {
        self.members
            .borrow_mut()
            .entry((parent.to_string(), kind))
            .or_default()
            .push(member);
    }

    /// Forget a member; returns whether it was present.
    pub fn remove(&self, parent: &str, kind: ObjectKind, key: &ObjectKey) -> bool {
        let mut members = self.members.borrow_mut();
        let Some(list) = members.get_mut(&(parent.to_string(), kind)) else {
            return false;
        };

        let before = list.len();
        list.retain(|member| &member.key != key);

        list.len() != before
    }

    /// Make every following call fail until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    #[must_use]
    pub fn requests(&self) -> Vec<PopulateRequest> {
        self.requests.borrow().clone()
    }
}

impl Populator for MemoryPopulator {
    fn populate(&self, request: &PopulateRequest) -> Result<Vec<MemberDescriptor>, BoxError> {
        self.requests.borrow_mut().push(request.clone());

        if self.failing.get() {
            return Err(Box::new(MemoryError(format!(
                "store unavailable while reading {}",
                request.target()
            ))));
        }

        let members = self.members.borrow();
        let found = members
            .get(&(request.parent.to_string(), request.kind))
            .map(|list| {
                list.iter()
                    .filter(|member| {
                        request
                            .filter
                            .as_deref()
                            .is_none_or(|filter| member.key.filter_expression().contains(filter))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(found)
    }
}

///
/// MemoryDiscovery
///
/// Dependency edges registered up front. Discovery expands each root along
/// them in registration order; a node already on the current path is emitted
/// without children so cyclic graphs stay finite.
///

#[derive(Debug, Default)]
pub struct MemoryDiscovery {
    edges: RefCell<Vec<(Urn, Urn, bool)>>,
    failing: Cell<bool>,
}

impl MemoryDiscovery {
    /// Record that `dependent` needs `dependency`.
    pub fn depends_on(
        &self,
        dependent: impl Into<Urn>,
        dependency: impl Into<Urn>,
        schema_bound: bool,
    ) {
        self.edges
            .borrow_mut()
            .push((dependent.into(), dependency.into(), schema_bound));
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    fn expand(
        &self,
        urn: &Urn,
        schema_bound: bool,
        direction: DiscoveryDirection,
        path: &mut Vec<Urn>,
    ) -> DependencyTreeNode {
        let mut node = DependencyTreeNode::new(urn.clone(), schema_bound);
        if path.contains(urn) {
            return node;
        }

        let next: Vec<(Urn, bool)> = self
            .edges
            .borrow()
            .iter()
            .filter_map(|(dependent, dependency, bound)| match direction {
                DiscoveryDirection::Parents if dependent == urn => Some((dependency.clone(), *bound)),
                DiscoveryDirection::Children if dependency == urn => Some((dependent.clone(), *bound)),
                _ => None,
            })
            .collect();

        path.push(urn.clone());
        for (child, bound) in next {
            node.children.push(self.expand(&child, bound, direction, path));
        }
        path.pop();

        node
    }
}

impl DependencyDiscovery for MemoryDiscovery {
    fn discover(
        &self,
        roots: &[Urn],
        direction: DiscoveryDirection,
    ) -> Result<DependencyTree, BoxError> {
        if self.failing.get() {
            return Err(Box::new(MemoryError("dependency service unavailable".to_string())));
        }

        let mut path = Vec::new();
        let nodes = roots
            .iter()
            .map(|root| self.expand(root, false, direction, &mut path))
            .collect();

        Ok(DependencyTree::new(direction, nodes))
    }
}

///
/// RecordingExecutor
///
/// Records every script it accepts. Optionally rejects one action.
///

#[derive(Debug, Default)]
pub struct RecordingExecutor {
    requests: RefCell<Vec<ScriptRequest>>,
    fail_on: Option<ScriptAction>,
}

impl RecordingExecutor {
    #[must_use]
    pub fn failing_on(action: ScriptAction) -> Self {
        Self {
            fail_on: Some(action),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn requests(&self) -> Vec<ScriptRequest> {
        self.requests.borrow().clone()
    }
}

impl ScriptExecutor for RecordingExecutor {
    fn execute(&self, request: &ScriptRequest) -> Result<(), BoxError> {
        if self.fail_on == Some(request.action) {
            return Err(Box::new(MemoryError(format!(
                "{} of {} rejected",
                request.action, request.urn
            ))));
        }

        self.requests.borrow_mut().push(request.clone());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populator_filters_by_key_expression() {
        let populator = MemoryPopulator::default();
        for name in ["a", "b"] {
            populator.insert(
                "Server[@Name='s']",
                ObjectKind::Login,
                MemberDescriptor::new(ObjectKey::named(name)),
            );
        }

        let members = populator
            .populate(&PopulateRequest {
                parent: Urn::new("Server[@Name='s']"),
                kind: ObjectKind::Login,
                filter: Some("@Name='b'".to_string()),
                extra_fields: Vec::new(),
            })
            .expect("populate should succeed");

        assert_eq!(members.len(), 1);
        assert_eq!(members[0].key.name(), Some("b"));
        assert_eq!(populator.calls(), 1);
    }

    #[test]
    fn discovery_stops_at_cycles() {
        let discovery = MemoryDiscovery::default();
        discovery.depends_on("A", "B", true);
        discovery.depends_on("B", "A", true);

        let tree = discovery
            .discover(&[Urn::new("A")], DiscoveryDirection::Parents)
            .expect("discover should succeed");

        assert_eq!(tree.count(), 3, "A -> B -> A, then stop");
    }

    #[test]
    fn discovery_follows_direction() {
        let discovery = MemoryDiscovery::default();
        discovery.depends_on("X", "Y", true);

        let parents = discovery
            .discover(&[Urn::new("X")], DiscoveryDirection::Parents)
            .expect("discover should succeed");
        let children = discovery
            .discover(&[Urn::new("Y")], DiscoveryDirection::Children)
            .expect("discover should succeed");

        assert_eq!(parents.roots[0].children[0].urn.as_str(), "Y");
        assert_eq!(children.roots[0].children[0].urn.as_str(), "X");
    }
}
