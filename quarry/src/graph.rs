//! The module graph builder: composes the modules of every resolved package
//! into a typed, acyclic "uses at compile time" graph.

use std::collections::HashMap;

use itertools::Itertools;
use petgraph::graphmap::DiGraphMap;
use smol_str::SmolStr;
use tracing::trace;

use crate::core::errors::GraphError;
use crate::core::{CanonicalUrl, Manifest, PackageName, to_c99_identifier};
use crate::layout::Module;

/// The modules of a single package, as produced by the layout walker,
/// together with the package context the graph builder needs.
#[derive(Debug)]
pub struct PackageModules {
    pub name: PackageName,
    /// `None` for the root package, which is identified by its path rather
    /// than a repository URL.
    pub url: Option<CanonicalUrl>,
    pub manifest: Manifest,
    pub modules: Vec<Module>,
    pub is_root: bool,
}

/// A module together with its owning package.
#[derive(Clone, Debug)]
pub struct ModuleNode {
    pub module: Module,
    pub package: PackageName,
    pub package_url: Option<CanonicalUrl>,
}

/// A directed acyclic graph over modules, edges denoting compile-time use.
///
/// Test modules of non-root packages are not part of the graph. The node
/// order returned by [`ModuleGraph::modules_in_build_order`] is
/// reverse-topological and fully determined by the inputs.
#[derive(Debug)]
pub struct ModuleGraph {
    nodes: Vec<ModuleNode>,
    edges: DiGraphMap<usize, ()>,
    order: Vec<usize>,
}

impl ModuleGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Modules in the order a build executor should compile them: every
    /// module appears after all modules it depends on.
    pub fn modules_in_build_order(&self) -> impl Iterator<Item = &ModuleNode> {
        self.order.iter().map(|&idx| &self.nodes[idx])
    }

    /// The modules `node` uses at compile time.
    pub fn dependencies_of(&self, node_idx: usize) -> impl Iterator<Item = &ModuleNode> {
        self.edges
            .neighbors_directed(node_idx, petgraph::Direction::Outgoing)
            .map(|idx| &self.nodes[idx])
    }

    pub fn nodes(&self) -> &[ModuleNode] {
        &self.nodes
    }

    /// Position of a module in the node list, looked up by mangled name.
    pub fn find(&self, package: &PackageName, module_name: &str) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n.package == *package && n.module.name == module_name)
    }
}

/// Builds the module graph. Packages are expected root-first, dependencies
/// following in resolution order.
pub fn build(packages: Vec<PackageModules>) -> Result<ModuleGraph, GraphError> {
    validate_products(&packages)?;

    // Test modules of non-root packages exist in the layout but are not
    // part of the graph.
    let mut nodes = Vec::new();
    let mut package_of_node = Vec::new();
    let mut module_index: Vec<HashMap<SmolStr, usize>> = Vec::new();
    for (package_idx, package) in packages.iter().enumerate() {
        let mut index = HashMap::new();
        for module in &package.modules {
            if !package.is_root && module.is_test() {
                continue;
            }
            let node_idx = nodes.len();
            index.insert(module.name.clone(), node_idx);
            nodes.push(ModuleNode {
                module: module.clone(),
                package: package.name.clone(),
                package_url: package.url.clone(),
            });
            package_of_node.push(package_idx);
        }
        module_index.push(index);
    }

    // Cross-package product index: (package index, product name) -> members.
    let mut product_index: HashMap<(usize, SmolStr), Vec<usize>> = HashMap::new();
    for (package_idx, package) in packages.iter().enumerate() {
        for product in &package.manifest.products {
            let members = product
                .targets
                .iter()
                .filter_map(|name| lookup_module(&module_index[package_idx], name))
                .collect();
            product_index.insert((package_idx, product.name.clone()), members);
        }
    }

    // Which package indexes each package may take products from: its
    // directly declared dependencies, not transitive ones.
    let url_to_package: HashMap<&CanonicalUrl, usize> = packages
        .iter()
        .enumerate()
        .filter_map(|(idx, p)| p.url.as_ref().map(|url| (url, idx)))
        .collect();
    let direct_deps: Vec<Vec<usize>> = packages
        .iter()
        .map(|package| {
            package
                .manifest
                .dependencies
                .iter()
                .filter_map(|dep| url_to_package.get(&dep.url).copied())
                .collect()
        })
        .collect();

    let mut edges = DiGraphMap::new();
    for node_idx in 0..nodes.len() {
        edges.add_node(node_idx);
    }
    for (node_idx, node) in nodes.iter().enumerate() {
        let package_idx = package_of_node[node_idx];
        for dep_name in &node.module.dependencies {
            // Sibling targets shadow dependency products of the same name.
            if let Some(target_idx) = lookup_module(&module_index[package_idx], dep_name) {
                if target_idx != node_idx {
                    edges.add_edge(node_idx, target_idx, ());
                }
                continue;
            }

            let mut found = false;
            for &dep_package_idx in &direct_deps[package_idx] {
                if let Some(members) = product_index.get(&(dep_package_idx, dep_name.clone())) {
                    for &member in members {
                        edges.add_edge(node_idx, member, ());
                    }
                    found = true;
                    break;
                }
            }
            if !found {
                return Err(GraphError::UnknownModuleDependency {
                    module: node.module.name.clone(),
                    name: dep_name.clone(),
                });
            }
        }
    }

    let order = toposort(&nodes, &edges)?;
    trace!(modules = nodes.len(), "built module graph");

    Ok(ModuleGraph {
        nodes,
        edges,
        order,
    })
}

fn lookup_module(index: &HashMap<SmolStr, usize>, name: &str) -> Option<usize> {
    index
        .get(name)
        .or_else(|| index.get(to_c99_identifier(name).as_str()))
        .copied()
}

fn validate_products(packages: &[PackageModules]) -> Result<(), GraphError> {
    for package in packages {
        for product in &package.manifest.products {
            if product.targets.is_empty() {
                return Err(GraphError::ProductWithNoModules {
                    product: product.name.clone(),
                });
            }
            let missing: Vec<SmolStr> = product
                .targets
                .iter()
                .filter(|name| {
                    !package.modules.iter().any(|m| {
                        m.name == **name || m.name == to_c99_identifier(name)
                    })
                })
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(GraphError::ProductWithMissingModules {
                    product: product.name.clone(),
                    missing,
                });
            }
        }
    }
    Ok(())
}

/// Reverse-topological order via DFS coloring; detects cycles and reports
/// the offending path.
fn toposort(nodes: &[ModuleNode], edges: &DiGraphMap<usize, ()>) -> Result<Vec<usize>, GraphError> {
    #[derive(Copy, Clone, Eq, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    fn visit(
        node: usize,
        nodes: &[ModuleNode],
        edges: &DiGraphMap<usize, ()>,
        colors: &mut [Color],
        stack: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<(), GraphError> {
        match colors[node] {
            Color::Black => return Ok(()),
            Color::Gray => {
                let start = stack
                    .iter()
                    .position(|&n| n == node)
                    .expect("gray nodes are always on the stack");
                let path = stack[start..]
                    .iter()
                    .chain([&node])
                    .map(|&n| nodes[n].module.name.clone())
                    .collect_vec();
                return Err(GraphError::CyclicModuleGraph { path });
            }
            Color::White => {}
        }

        colors[node] = Color::Gray;
        stack.push(node);
        for next in edges.neighbors_directed(node, petgraph::Direction::Outgoing) {
            visit(next, nodes, edges, colors, stack, order)?;
        }
        stack.pop();
        colors[node] = Color::Black;
        order.push(node);
        Ok(())
    }

    let mut colors = vec![Color::White; nodes.len()];
    let mut stack = Vec::new();
    let mut order = Vec::new();
    for node in 0..nodes.len() {
        visit(node, nodes, edges, &mut colors, &mut stack, &mut order)?;
    }
    Ok(order)
}
