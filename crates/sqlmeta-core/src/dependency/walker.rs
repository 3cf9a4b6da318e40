use super::{
    DependencyDiscovery, DependencyError, DependencyList, DependencyNode, DependencyTree,
    DependencyTreeNode, DiscoveryDirection,
};
use crate::{
    Settings,
    comparer::KeyComparer,
    error::{Error, ErrorOrigin},
    urn::{PathError, PathResolver, ResolvedAddress, Urn},
};
use std::{cmp::Ordering, fmt};
use tracing::{debug, trace};

///
/// DiscoveryProgress
///
/// Reported once per node kept by the walk.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiscoveryProgress {
    pub current: Urn,

    /// The node that led to `current`; roots report themselves.
    pub parent: Urn,
    pub schema_bound: bool,
    pub sub_total_count: usize,
    pub sub_total: usize,
    pub total_count: usize,
    pub total: usize,
}

type Filter<'a> = Box<dyn Fn(&Urn) -> bool + 'a>;
type Progress<'a> = Box<dyn Fn(&DiscoveryProgress) + 'a>;

///
/// DependencyWalker
///
/// Flattens a discovery tree into a deduplicated list. Children are listed
/// before their parent, so for `Parents` discovery every dependency precedes
/// the objects that need it.
///

pub struct DependencyWalker<'a> {
    resolver: &'a dyn PathResolver,
    settings: &'a Settings,
    server_name: Option<String>,
    filter: Option<Filter<'a>>,
    progress: Option<Progress<'a>>,
}

impl<'a> DependencyWalker<'a> {
    #[must_use]
    pub fn new(resolver: &'a dyn PathResolver, settings: &'a Settings) -> Self {
        Self {
            resolver,
            settings,
            server_name: None,
            filter: None,
            progress: None,
        }
    }

    /// Require every root to live on `server_name`.
    #[must_use]
    pub fn on_server(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    /// Keep only nodes for which `filter` returns true. An excluded node
    /// takes its whole subtree with it.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Fn(&Urn) -> bool + 'a) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: impl Fn(&DiscoveryProgress) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Ask `discovery` to expand `roots`.
    pub fn discover(
        &self,
        discovery: &dyn DependencyDiscovery,
        roots: &[Urn],
        direction: DiscoveryDirection,
    ) -> Result<DependencyTree, Error> {
        self.check_server(roots)?;
        debug!(roots = roots.len(), direction = ?direction, "discovering dependencies");

        discovery.discover(roots, direction).map_err(|source| {
            let target = roots
                .iter()
                .map(Urn::as_str)
                .collect::<Vec<_>>()
                .join(", ");

            Error::external(ErrorOrigin::Discovery, "discover", target, source)
        })
    }

    fn check_server(&self, roots: &[Urn]) -> Result<(), Error> {
        let Some(expected) = self.server_name.as_deref() else {
            return Ok(());
        };
        if !self.settings.check_server_name() {
            return Ok(());
        }

        let strings = self.settings.comparer().strings();
        for urn in roots {
            let address = ResolvedAddress::resolve(self.resolver, urn)?;
            let found = address.server_name().unwrap_or_default();

            if !strings.equals(found, expected) {
                return Err(DependencyError::ServerMismatch {
                    urn: urn.to_string(),
                    expected: expected.to_string(),
                    found: found.to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Post-order walk with duplicate suppression by resolved address.
    pub fn walk(&self, tree: &DependencyTree) -> Result<DependencyList, Error> {
        let roots = tree
            .roots
            .iter()
            .map(|node| ResolvedAddress::resolve(self.resolver, &node.urn))
            .collect::<Result<Vec<_>, _>>()?;

        let mut walk = Walk {
            direction: tree.direction,
            roots,
            known: Vec::new(),
            slots: Vec::new(),
            edges: Vec::new(),
            list: DependencyList::new(),
            total_count: 0,
            total: tree.count(),
        };

        let mut sub_total_count = 0;
        for node in &tree.roots {
            self.visit(&mut walk, node, None, &mut sub_total_count, tree.roots.len())?;
        }

        let list = walk.finish()?;
        debug!(
            nodes = list.len(),
            edges = list.edges().len(),
            "dependency walk complete"
        );

        Ok(list)
    }

    fn visit(
        &self,
        walk: &mut Walk,
        node: &DependencyTreeNode,
        parent: Option<(usize, &Urn)>,
        sub_total_count: &mut usize,
        sub_total: usize,
    ) -> Result<(), Error> {
        let address = ResolvedAddress::resolve(self.resolver, &node.urn)?;
        let comparer = self.settings.comparer();

        if let Some(slot) = walk.find(&address, &comparer) {
            trace!(urn = %node.urn, "dependency already walked");
            if let Some((parent_slot, _)) = parent {
                walk.connect(parent_slot, slot, node.schema_bound);
            }
            *sub_total_count += 1;

            return Ok(());
        }

        let kind = address.kind().ok_or(PathError::Empty)?;
        let root = walk
            .roots
            .iter()
            .any(|r| r.compare(&address, &comparer) == Ordering::Equal);
        let slot = walk.register(address);

        if self.filter.as_ref().is_some_and(|keep| !keep(&node.urn)) {
            trace!(urn = %node.urn, "dependency filtered out");
            walk.total = walk.total.saturating_sub(1);

            return Ok(());
        }

        *sub_total_count += 1;
        walk.total_count += 1;
        if let Some(progress) = &self.progress {
            let parent_urn = match parent {
                Some((_, urn)) if !root => urn.clone(),
                _ => node.urn.clone(),
            };
            progress(&DiscoveryProgress {
                current: node.urn.clone(),
                parent: parent_urn,
                schema_bound: node.schema_bound,
                sub_total_count: *sub_total_count,
                sub_total,
                total_count: walk.total_count,
                total: walk.total,
            });
        }

        if let Some((parent_slot, _)) = parent {
            walk.connect(parent_slot, slot, node.schema_bound);
        }

        let mut child_count = 0;
        for child in &node.children {
            self.visit(
                walk,
                child,
                Some((slot, &node.urn)),
                &mut child_count,
                node.children.len(),
            )?;
        }

        let index = walk.list.push_node(
            DependencyNode::new(node.urn.clone(), kind)
                .schema_bound(node.schema_bound)
                .root(root),
        );
        walk.slots[slot] = Some(index);

        Ok(())
    }
}

impl fmt::Debug for DependencyWalker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyWalker")
            .field("server_name", &self.server_name)
            .field("filter", &self.filter.is_some())
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

///
/// Walk
///
/// Mutable state of one walk. Nodes get a slot when first seen and a list
/// index once all their children are listed; edges are kept by slot until
/// then. Filtered nodes keep an empty slot so later sightings stay excluded.
///

struct Walk {
    direction: DiscoveryDirection,
    roots: Vec<ResolvedAddress>,
    known: Vec<(ResolvedAddress, usize)>,
    slots: Vec<Option<usize>>,
    edges: Vec<(usize, usize, bool)>,
    list: DependencyList,
    total_count: usize,
    total: usize,
}

impl Walk {
    fn find(&self, address: &ResolvedAddress, comparer: &KeyComparer) -> Option<usize> {
        self.known
            .iter()
            .find(|(known, _)| known.compare(address, comparer) == Ordering::Equal)
            .map(|(_, slot)| *slot)
    }

    fn register(&mut self, address: ResolvedAddress) -> usize {
        let slot = self.slots.len();
        self.slots.push(None);
        self.known.push((address, slot));

        slot
    }

    // tree edges point from parent to child; store them as dependent -> dependency
    fn connect(&mut self, parent: usize, child: usize, schema_bound: bool) {
        let edge = match self.direction {
            DiscoveryDirection::Parents => (parent, child, schema_bound),
            DiscoveryDirection::Children => (child, parent, schema_bound),
        };
        self.edges.push(edge);
    }

    fn finish(mut self) -> Result<DependencyList, DependencyError> {
        for (dependent, dependency, schema_bound) in self.edges {
            if let (Some(Some(a)), Some(Some(b))) =
                (self.slots.get(dependent), self.slots.get(dependency))
            {
                self.list.push_edge(*a, *b, schema_bound)?;
            }
        }

        Ok(self.list)
    }
}
