use petgraph::algo::{has_path_connecting, tarjan_scc};
use petgraph::graph::{DiGraph, EdgeReference, NodeIndex};
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{Bfs, EdgeFiltered, EdgeRef, IntoNeighbors};
use petgraph::Direction;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::model::{
    Declaration, DeclarationRef, DependencyEdge, Interpretation, ModuleId, ResolvedImport,
};
use crate::parsers::ExtractedModule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Imports,
    Extends,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphNode {
    Module(ModuleId),
    Class(DeclarationRef),
}

/// One base reference of a class and the declaration it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseLink {
    pub name: String,
    pub target: Option<DeclarationRef>,
}

/// An import cycle, rotated so the smallest module id comes first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ImportCycle {
    pub modules: Vec<ModuleId>,
}

impl ImportCycle {
    pub fn new(mut modules: Vec<ModuleId>) -> Self {
        if let Some(start) = modules
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.cmp(b.1))
            .map(|(idx, _)| idx)
        {
            modules.rotate_left(start);
        }
        Self { modules }
    }
}

pub struct GraphBuilder {
    graph: DiGraph<GraphNode, EdgeKind>,
    node_map: HashMap<GraphNode, NodeIndex>,
    edges: BTreeSet<DependencyEdge>,
    bases: BTreeMap<DeclarationRef, Vec<BaseLink>>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
            edges: BTreeSet::new(),
            bases: BTreeMap::new(),
        }
    }

    pub fn add_module(&mut self, id: &str) -> NodeIndex {
        self.ensure_node(GraphNode::Module(id.to_string()))
    }

    fn ensure_node(&mut self, node: GraphNode) -> NodeIndex {
        if let Some(&index) = self.node_map.get(&node) {
            return index;
        }
        let index = self.graph.add_node(node.clone());
        self.node_map.insert(node, index);
        index
    }

    /// Add an `imports` edge between two registered modules.
    ///
    /// Returns `None` when either module is unknown; repeated pairs are
    /// stored once.
    pub fn add_import(&mut self, from: &str, to: &str) -> Option<petgraph::graph::EdgeIndex> {
        let source = *self.node_map.get(&GraphNode::Module(from.to_string()))?;
        let target = *self.node_map.get(&GraphNode::Module(to.to_string()))?;

        if let Some(existing) = self.graph.find_edge(source, target) {
            return Some(existing);
        }

        let self_import = from == to;
        if self_import {
            tracing::warn!("Module `{}` imports itself", from);
        }
        self.edges.insert(DependencyEdge::Imports {
            from: from.to_string(),
            to: to.to_string(),
            self_import,
        });
        Some(self.graph.add_edge(source, target, EdgeKind::Imports))
    }

    /// Add edges for every successful resolution; failures never become edges.
    pub fn add_resolved_imports(&mut self, module: &str, imports: &[ResolvedImport]) {
        for target in imports.iter().filter_map(|resolved| resolved.target()) {
            if self.add_import(module, target).is_none() {
                tracing::debug!("Dropping edge {} -> {}: endpoint not in graph", module, target);
            }
        }
    }

    /// Record a class's base references and add `extends` edges for the resolved ones.
    pub fn add_bases(&mut self, class: DeclarationRef, links: Vec<BaseLink>) {
        let source = self.ensure_node(GraphNode::Class(class.clone()));
        for target in links.iter().filter_map(|link| link.target.clone()) {
            let target_index = self.ensure_node(GraphNode::Class(target.clone()));
            if self.graph.find_edge(source, target_index).is_none() {
                self.graph.add_edge(source, target_index, EdgeKind::Extends);
                self.edges.insert(DependencyEdge::Extends {
                    from: class.clone(),
                    to: target,
                });
            }
        }
        self.bases.insert(class, links);
    }

    pub fn build(self) -> DependencyGraph {
        let modules = self
            .node_map
            .iter()
            .filter_map(|(node, &index)| match node {
                GraphNode::Module(id) => Some((id.clone(), index)),
                GraphNode::Class(_) => None,
            })
            .collect();
        DependencyGraph {
            graph: self.graph,
            modules,
            node_map: self.node_map,
            edges: self.edges,
            bases: self.bases,
        }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable module/class graph with `imports` and `extends` edges.
pub struct DependencyGraph {
    graph: DiGraph<GraphNode, EdgeKind>,
    /// Module nodes in id order.
    modules: BTreeMap<ModuleId, NodeIndex>,
    node_map: HashMap<GraphNode, NodeIndex>,
    edges: BTreeSet<DependencyEdge>,
    bases: BTreeMap<DeclarationRef, Vec<BaseLink>>,
}

impl DependencyGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All edges, ordered by kind, then source, then target.
    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter()
    }

    pub fn import_edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().filter_map(|edge| match edge {
            DependencyEdge::Imports { from, to, .. } => Some((from.as_str(), to.as_str())),
            DependencyEdge::Extends { .. } => None,
        })
    }

    /// Modules `id` imports directly, sorted.
    pub fn dependencies(&self, id: &str) -> Vec<&str> {
        self.module_neighbors(id, Direction::Outgoing)
    }

    /// Modules importing `id` directly, sorted.
    pub fn dependents(&self, id: &str) -> Vec<&str> {
        self.module_neighbors(id, Direction::Incoming)
    }

    /// Everything reachable from `id` over imports edges, excluding `id`, sorted.
    pub fn transitive_dependencies(&self, id: &str) -> Vec<&str> {
        let Some(&start) = self.modules.get(id) else {
            return Vec::new();
        };
        let imports = self.imports_only();
        let mut bfs = Bfs::new(&imports, start);
        let mut reachable = BTreeSet::new();
        while let Some(index) = bfs.next(&imports) {
            if index == start {
                continue;
            }
            if let Some(id) = self.module_id(index) {
                reachable.insert(id);
            }
        }
        reachable.into_iter().collect()
    }

    /// Whether `to` is reachable from `from` over one or more imports edges.
    ///
    /// `has_path(a, a)` holds exactly when `a` sits on an import cycle or
    /// imports itself.
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        let (Some(&start), Some(&goal)) = (self.modules.get(from), self.modules.get(to)) else {
            return false;
        };
        let imports = self.imports_only();
        let found = (&imports)
            .neighbors(start)
            .any(|next| has_path_connecting(&imports, next, goal, None));
        found
    }

    /// Modules ordered so each comes after everything it imports.
    ///
    /// `None` when an import cycle makes such an order impossible. Self
    /// imports are ignored; ties break by module id.
    pub fn topological_order(&self) -> Option<Vec<&str>> {
        let mut pending: BTreeMap<&str, usize> = BTreeMap::new();
        let mut importers: HashMap<&str, Vec<&str>> = HashMap::new();
        for id in self.modules.keys() {
            pending.insert(id.as_str(), 0);
        }
        for (from, to) in self.import_edges().filter(|(from, to)| from != to) {
            *pending.entry(from).or_insert(0) += 1;
            importers.entry(to).or_default().push(from);
        }

        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut order = Vec::with_capacity(pending.len());
        while let Some(id) = ready.pop_first() {
            order.push(id);
            for importer in importers.get(id).into_iter().flatten() {
                if let Some(count) = pending.get_mut(importer) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*importer);
                    }
                }
            }
        }

        (order.len() == pending.len()).then_some(order)
    }

    /// Every elementary import cycle, rotated to its smallest module id.
    ///
    /// Strongly connected components bound the search. Inside each one a
    /// depth-first circuit search (Johnson) starts from every member in id
    /// order and only walks members with larger ids, so each cycle is found
    /// exactly once whatever order the imports were added in. Self imports are
    /// flagged on their edge instead.
    pub fn import_cycles(&self) -> Vec<ImportCycle> {
        let mut imports: DiGraphMap<&str, ()> = DiGraphMap::new();
        for id in self.modules.keys() {
            imports.add_node(id.as_str());
        }
        for (from, to) in self.import_edges().filter(|(from, to)| from != to) {
            imports.add_edge(from, to, ());
        }

        let mut cycles = BTreeSet::new();
        for component in tarjan_scc(&imports) {
            if component.len() < 2 {
                continue;
            }
            let mut members = component;
            members.sort_unstable();
            for (position, &start) in members.iter().enumerate() {
                let mut search = CircuitSearch {
                    graph: &imports,
                    allowed: members[position..].iter().copied().collect(),
                    blocked: HashSet::new(),
                    blocked_by: HashMap::new(),
                    path: Vec::new(),
                };
                search.circuits(start, start, &mut cycles);
            }
        }

        cycles.into_iter().collect()
    }

    /// Base links of a class in declaration order, resolved or not.
    pub fn bases_of(&self, class: &DeclarationRef) -> &[BaseLink] {
        self.bases.get(class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolved base declarations of a class, in declaration order.
    pub fn resolved_bases<'g>(
        &'g self,
        class: &DeclarationRef,
    ) -> impl Iterator<Item = &'g DeclarationRef> + 'g {
        self.bases_of(class)
            .iter()
            .filter_map(|link| link.target.as_ref())
    }

    /// Classes directly extending `class`, sorted.
    pub fn subclasses_of(&self, class: &DeclarationRef) -> Vec<&DeclarationRef> {
        let Some(&index) = self.node_map.get(&GraphNode::Class(class.clone())) else {
            return Vec::new();
        };
        let mut subclasses: Vec<&DeclarationRef> = self
            .graph
            .edges_directed(index, Direction::Incoming)
            .filter(|edge| *edge.weight() == EdgeKind::Extends)
            .filter_map(|edge| match &self.graph[edge.source()] {
                GraphNode::Class(declaration) => Some(declaration),
                GraphNode::Module(_) => None,
            })
            .collect();
        subclasses.sort();
        subclasses
    }

    fn imports_only(
        &self,
    ) -> EdgeFiltered<&DiGraph<GraphNode, EdgeKind>, fn(EdgeReference<'_, EdgeKind>) -> bool> {
        fn is_import(edge: EdgeReference<'_, EdgeKind>) -> bool {
            *edge.weight() == EdgeKind::Imports
        }
        EdgeFiltered(&self.graph, is_import as fn(EdgeReference<'_, EdgeKind>) -> bool)
    }

    fn module_neighbors(&self, id: &str, direction: Direction) -> Vec<&str> {
        let Some(&index) = self.modules.get(id) else {
            return Vec::new();
        };
        let mut neighbors: Vec<&str> = self
            .graph
            .edges_directed(index, direction)
            .filter(|edge| *edge.weight() == EdgeKind::Imports)
            .map(|edge| match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            })
            .filter_map(|neighbor| self.module_id(neighbor))
            .collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }

    fn module_id(&self, index: NodeIndex) -> Option<&str> {
        match &self.graph[index] {
            GraphNode::Module(id) => Some(id),
            GraphNode::Class(_) => None,
        }
    }
}

/// State of one circuit search rooted at a single start module.
struct CircuitSearch<'g> {
    graph: &'g DiGraphMap<&'g str, ()>,
    allowed: HashSet<&'g str>,
    blocked: HashSet<&'g str>,
    /// Modules to unblock once the key module is unblocked.
    blocked_by: HashMap<&'g str, HashSet<&'g str>>,
    path: Vec<&'g str>,
}

impl<'g> CircuitSearch<'g> {
    fn circuits(&mut self, node: &'g str, start: &'g str, cycles: &mut BTreeSet<ImportCycle>) -> bool {
        let mut closed = false;
        self.path.push(node);
        self.blocked.insert(node);

        let successors: Vec<&'g str> = self
            .graph
            .neighbors(node)
            .filter(|next| self.allowed.contains(next))
            .collect();
        for &next in &successors {
            if next == start {
                cycles.insert(ImportCycle::new(
                    self.path.iter().map(|id| id.to_string()).collect(),
                ));
                closed = true;
            } else if !self.blocked.contains(next) && self.circuits(next, start, cycles) {
                closed = true;
            }
        }

        if closed {
            self.unblock(node);
        } else {
            for next in successors {
                self.blocked_by.entry(next).or_default().insert(node);
            }
        }
        self.path.pop();
        closed
    }

    fn unblock(&mut self, node: &'g str) {
        self.blocked.remove(node);
        if let Some(waiting) = self.blocked_by.remove(node) {
            for other in waiting {
                if self.blocked.contains(other) {
                    self.unblock(other);
                }
            }
        }
    }
}

/// Resolves textual base references to class declarations.
///
/// Lookup order: a class of that name in the same module, then a class
/// reached through the module's imports (following re-exports). Dotted bases
/// (`models.Model`) go through the module bound to the prefix.
pub struct BaseResolver<'a> {
    modules: &'a BTreeMap<ModuleId, ExtractedModule>,
    imports: &'a BTreeMap<ModuleId, Vec<ResolvedImport>>,
}

impl<'a> BaseResolver<'a> {
    pub fn new(
        modules: &'a BTreeMap<ModuleId, ExtractedModule>,
        imports: &'a BTreeMap<ModuleId, Vec<ResolvedImport>>,
    ) -> Self {
        Self { modules, imports }
    }

    /// Base links for every class in the analysis.
    pub fn resolve_all(&self) -> BTreeMap<DeclarationRef, Vec<BaseLink>> {
        let per_module: Vec<Vec<(DeclarationRef, Vec<BaseLink>)>> = self
            .modules
            .par_iter()
            .map(|(module, extracted)| {
                extracted
                    .declarations
                    .iter()
                    .filter(|declaration| declaration.is_class())
                    .map(|class| {
                        let links = class
                            .bases
                            .iter()
                            .map(|base| BaseLink {
                                name: base.clone(),
                                target: self.resolve_base(module, extracted, class, base),
                            })
                            .collect();
                        (DeclarationRef::new(module, class), links)
                    })
                    .collect()
            })
            .collect();
        per_module.into_iter().flatten().collect()
    }

    fn resolve_base(
        &self,
        module: &str,
        extracted: &ExtractedModule,
        class: &Declaration,
        base: &str,
    ) -> Option<DeclarationRef> {
        let mut visited = HashSet::new();

        if let Some((prefix, name)) = base.rsplit_once('.') {
            let target = self.bound_module(module, prefix)?;
            return self.lookup_class(target, name, &mut visited);
        }

        if let Some(sibling) = sibling_class(extracted, class, base) {
            return Some(DeclarationRef::new(module, sibling));
        }

        self.lookup_imported(module, base, &mut visited)
    }

    /// A module-level class of `module`, or one it imports under that name.
    fn lookup_class(
        &self,
        module: &str,
        name: &str,
        visited: &mut HashSet<(String, String)>,
    ) -> Option<DeclarationRef> {
        if !visited.insert((module.to_string(), name.to_string())) {
            return None;
        }
        let extracted = self.modules.get(module)?;
        if let Some(class) = extracted.top_level_class(name) {
            return Some(DeclarationRef::new(module, class));
        }
        self.lookup_imported(module, name, visited)
    }

    fn lookup_imported(
        &self,
        module: &str,
        name: &str,
        visited: &mut HashSet<(String, String)>,
    ) -> Option<DeclarationRef> {
        let imports = self.imports.get(module)?;
        // Later imports rebind earlier ones.
        for resolved in imports.iter().rev() {
            let Some(target) = resolved.target() else {
                continue;
            };
            if resolved.interpretation() != Some(Interpretation::Symbol) {
                continue;
            }
            let reference = &resolved.reference;
            let original = if reference.is_wildcard() {
                name
            } else if reference.binding() == Some(name) {
                match reference.symbol.as_deref() {
                    Some(symbol) => symbol,
                    None => continue,
                }
            } else {
                continue;
            };
            if let Some(found) = self.lookup_class(target, original, visited) {
                return Some(found);
            }
        }
        None
    }

    /// Module bound to `prefix` by an import of `module`.
    fn bound_module(&self, module: &str, prefix: &str) -> Option<&'a str> {
        let imports = self.imports.get(module)?;
        imports.iter().rev().find_map(|resolved| {
            let target = resolved.target()?;
            let reference = &resolved.reference;
            let bound = match resolved.interpretation()? {
                Interpretation::Module => match &reference.alias {
                    Some(alias) => alias == prefix,
                    None => reference.path == prefix,
                },
                Interpretation::Submodule => reference.binding() == Some(prefix),
                Interpretation::Symbol => false,
            };
            bound.then_some(target)
        })
    }
}

/// Class named `name` defined in the same scope as `class` or at module level.
///
/// Prefers the last such class defined before `class`, then any later one.
fn sibling_class<'m>(
    extracted: &'m ExtractedModule,
    class: &Declaration,
    name: &str,
) -> Option<&'m Declaration> {
    let mut candidates = extracted.declarations.iter().filter(|candidate| {
        candidate.is_class()
            && candidate.name == name
            && candidate.index != class.index
            && (candidate.enclosing.is_none() || candidate.enclosing == class.enclosing)
    });
    let before = candidates
        .clone()
        .filter(|candidate| candidate.index < class.index)
        .last();
    before.or_else(|| candidates.next())
}
