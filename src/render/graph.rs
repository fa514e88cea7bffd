//! Nesting graph between templates.
//!
//! An edge `parent → child` means `parent` embeds `child` as a nested stack,
//! so `child` must be rendered first. Edges come from the targets declared
//! on nested stack builders; nothing has to be built to know them.

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::template::TemplateDef;

/// Color states for the depth-first walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not visited yet.
    White,
    /// On the current DFS path.
    Gray,
    /// Finished.
    Black,
}

/// Directed graph of template nesting.
#[derive(Debug, Default)]
pub struct TemplateGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl TemplateGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph of every definition and the templates it embeds, in the order given.
    pub fn from_definitions<'a>(defs: impl IntoIterator<Item = &'a TemplateDef>) -> Self {
        let mut graph = Self::new();
        for def in defs {
            graph.add_template(def.name());
            for child in def.nested_templates() {
                graph.add_dependency(def.name(), child);
            }
        }
        graph
    }

    fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&index) = self.node_map.get(name) {
            index
        } else {
            let index = self.graph.add_node(name.to_string());
            self.node_map.insert(name.to_string(), index);
            index
        }
    }

    /// Add a template with no edges.
    pub fn add_template(&mut self, name: &str) {
        self.ensure_node(name);
    }

    /// Record that `parent` embeds `child`.
    pub fn add_dependency(&mut self, parent: &str, child: &str) {
        let from = self.ensure_node(parent);
        let to = self.ensure_node(child);
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
    }

    /// Templates `name` embeds directly, sorted.
    pub fn direct_deps(&self, name: &str) -> Vec<String> {
        let Some(&index) = self.node_map.get(name) else {
            return Vec::new();
        };
        let mut deps: Vec<_> = self.graph.neighbors(index).map(|i| self.graph[i].clone()).collect();
        deps.sort();
        deps
    }

    /// Templates that sit on a nesting cycle, each mapped to a description of
    /// its cycle.
    pub fn cyclic_templates(&self) -> BTreeMap<String, String> {
        let mut cyclic = BTreeMap::new();
        for component in tarjan_scc(&self.graph) {
            let self_loop =
                component.len() == 1 && self.graph.contains_edge(component[0], component[0]);
            if component.len() < 2 && !self_loop {
                continue;
            }
            let mut names: Vec<_> = component.iter().map(|&i| self.graph[i].clone()).collect();
            names.sort();
            let mut chain = names.join(" → ");
            chain.push_str(" → ");
            chain.push_str(&names[0]);
            for name in names {
                cyclic.insert(name, chain.clone());
            }
        }
        cyclic
    }

    /// Every template with the ones it embeds before it.
    ///
    /// Ties are broken by insertion order, so the same catalogue always
    /// renders in the same order. Edges that close a cycle are ignored; use
    /// [`TemplateGraph::cyclic_templates`] to find those templates.
    pub fn render_order(&self) -> Vec<String> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|i| (i, Color::White)).collect();
        let mut order = Vec::with_capacity(self.graph.node_count());

        for node in self.graph.node_indices() {
            if matches!(colors.get(&node), Some(Color::White)) {
                self.dfs_visit(node, &mut colors, &mut order);
            }
        }
        order
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        order: &mut Vec<String>,
    ) {
        colors.insert(node, Color::Gray);

        let mut children: Vec<_> = self.graph.neighbors(node).collect();
        children.sort();
        for child in children {
            if matches!(colors.get(&child), Some(Color::White)) {
                self.dfs_visit(child, colors, order);
            }
        }

        colors.insert(node, Color::Black);
        order.push(self.graph[node].clone());
    }

    /// Indented tree of the templates `root` embeds.
    pub fn to_tree_string(&self, root: &str) -> String {
        let mut result = format!("{root}\n");
        let mut path = HashSet::new();
        path.insert(root.to_string());
        self.build_tree_string(root, &mut result, "", &mut path);
        result
    }

    fn build_tree_string(
        &self,
        name: &str,
        result: &mut String,
        prefix: &str,
        path: &mut HashSet<String>,
    ) {
        let deps = self.direct_deps(name);
        for (i, dep) in deps.iter().enumerate() {
            let is_last = i == deps.len() - 1;
            let connector = if is_last {
                "└── "
            } else {
                "├── "
            };
            result.push_str(&format!("{prefix}{connector}{dep}\n"));

            let child_prefix = if is_last {
                format!("{prefix}    ")
            } else {
                format!("{prefix}│   ")
            };
            if path.insert(dep.clone()) {
                self.build_tree_string(dep, result, &child_prefix, path);
                path.remove(dep);
            } else {
                result.push_str(&format!("{child_prefix}└── (cycle)\n"));
            }
        }
    }
}
