//! Resource dependency graph
//!
//! The graph records which compiled resources include which others. It is an
//! arena: every resource url owns exactly one [`ResourceNode`], addressed by a
//! [`NodeId`], and edges are stored as index lists on both ends. A resource
//! shared by several collections therefore has several parents instead of
//! being duplicated.
//!
//! A synthetic root node sits above the top-level resources. It has no url
//! and never counts as a dependent.
//!
//! ```text
//! <root>
//!   └── /main.collectionc
//!         └── /level1.collectionproxyc
//!               ├── /level1.goc
//!               └── /level2.collectionproxyc
//!                     └── /level2.goc
//! ```
//!
//! # Example
//!
//! ```
//! use livepack_formats::graph::ResourceGraph;
//!
//! let mut graph = ResourceGraph::new();
//! graph.add_child(None, "/main.collectionc").expect("valid url");
//! graph
//!     .add_child(Some("/main.collectionc"), "/level1.collectionproxyc")
//!     .expect("valid url");
//! graph
//!     .add_child(Some("/level1.collectionproxyc"), "/level1.goc")
//!     .expect("valid url");
//!
//! let chains = graph.parent_proxy_chains("/level1.goc");
//! assert_eq!(chains, vec![vec!["/level1.collectionproxyc".to_string()]]);
//! ```

mod error;
mod exclusion;

pub use error::{GraphError, GraphResult};
pub use exclusion::{ExclusionPlan, Inclusion};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

/// Suffix of compiled collections
pub const COLLECTION_SUFFIX: &str = ".collectionc";
/// Suffix of compiled collection proxies
pub const COLLECTION_PROXY_SUFFIX: &str = ".collectionproxyc";

/// Index of a node inside a [`ResourceGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Resource type derived from the url suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Synthetic root
    Root,
    /// Compiled collection (`.collectionc`)
    Collection,
    /// Lazy loader for a sub-collection (`.collectionproxyc`)
    CollectionProxy,
    /// Any other compiled resource
    Other,
}

impl ResourceKind {
    /// Classify a url by its suffix
    pub fn from_url(url: &str) -> Self {
        if url.ends_with(COLLECTION_PROXY_SUFFIX) {
            Self::CollectionProxy
        } else if url.ends_with(COLLECTION_SUFFIX) {
            Self::Collection
        } else {
            Self::Other
        }
    }

    /// Collection proxies load their children lazily
    pub fn is_proxy(self) -> bool {
        self == Self::CollectionProxy
    }
}

/// One resource in the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNode {
    /// Archive-relative url, empty for the root
    pub url: String,
    /// Source file on disk, when known
    pub source_path: Option<PathBuf>,
    /// Resource type
    pub kind: ResourceKind,
    children: Vec<NodeId>,
    parents: Vec<NodeId>,
}

impl ResourceNode {
    fn new(url: String, kind: ResourceKind) -> Self {
        Self {
            url,
            source_path: None,
            kind,
            children: Vec::new(),
            parents: Vec::new(),
        }
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Distinct direct parents, the root included
    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }
}

/// Arena of resources and their inclusion edges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGraph {
    nodes: Vec<ResourceNode>,
    by_url: HashMap<String, NodeId>,
}

impl Default for ResourceGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceGraph {
    const ROOT: NodeId = NodeId(0);

    /// Create a graph holding only the synthetic root
    pub fn new() -> Self {
        Self {
            nodes: vec![ResourceNode::new(String::new(), ResourceKind::Root)],
            by_url: HashMap::new(),
        }
    }

    /// The synthetic root
    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    /// Number of resources, the root excluded
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Whether only the root exists
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a node
    pub fn node(&self, id: NodeId) -> &ResourceNode {
        &self.nodes[id.0]
    }

    /// Find a node by url
    pub fn find(&self, url: &str) -> Option<NodeId> {
        self.by_url.get(url).copied()
    }

    /// Whether a url is part of the graph
    pub fn contains(&self, url: &str) -> bool {
        self.by_url.contains_key(url)
    }

    /// All resource nodes in insertion order, the root excluded
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &ResourceNode)> {
        self.nodes
            .iter()
            .enumerate()
            .skip(1)
            .map(|(index, node)| (NodeId(index), node))
    }

    /// Return the node for `url`, creating an unlinked one if needed
    pub fn insert(&mut self, url: &str) -> GraphResult<NodeId> {
        if let Some(id) = self.find(url) {
            return Ok(id);
        }
        if !url.starts_with('/') || url.len() < 2 {
            return Err(GraphError::InvalidUrl(url.to_string()));
        }

        let id = NodeId(self.nodes.len());
        self.nodes
            .push(ResourceNode::new(url.to_string(), ResourceKind::from_url(url)));
        self.by_url.insert(url.to_string(), id);
        Ok(id)
    }

    /// Record where a resource comes from on disk
    pub fn set_source_path(&mut self, id: NodeId, path: impl Into<PathBuf>) {
        self.nodes[id.0].source_path = Some(path.into());
    }

    /// Add an inclusion edge
    ///
    /// Repeated edges are ignored so parent lists stay distinct. Edges that
    /// would make a node its own ancestor are rejected.
    pub fn link(&mut self, parent: NodeId, child: NodeId) -> GraphResult<()> {
        if self.nodes[child.0].parents.contains(&parent) {
            return Ok(());
        }
        if child == Self::ROOT || parent == child || self.reaches(child, parent) {
            return Err(GraphError::Cycle {
                parent: self.nodes[parent.0].url.clone(),
                child: self.nodes[child.0].url.clone(),
            });
        }

        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parents.push(parent);
        Ok(())
    }

    /// Add `url` below `parent_url`, or below the root when `None`
    pub fn add_child(&mut self, parent_url: Option<&str>, url: &str) -> GraphResult<NodeId> {
        let parent = match parent_url {
            Some(parent_url) => self
                .find(parent_url)
                .ok_or_else(|| GraphError::UnknownParent(parent_url.to_string()))?,
            None => Self::ROOT,
        };
        let child = self.insert(url)?;
        self.link(parent, child)?;
        Ok(child)
    }

    fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if seen.insert(id) {
                stack.extend_from_slice(&self.nodes[id.0].children);
            }
        }
        false
    }

    /// Number of distinct resources that directly include `url`
    ///
    /// The synthetic root does not count; unknown urls have no dependents.
    pub fn dependents_count(&self, url: &str) -> usize {
        self.find(url).map_or(0, |id| {
            self.nodes[id.0]
                .parents
                .iter()
                .filter(|&&parent| parent != Self::ROOT)
                .count()
        })
    }

    /// Proxy chains above `url`, one per distinct root-to-resource path
    ///
    /// Each chain lists the collection proxy urls met while walking up that
    /// path, nearest first. A path without proxies yields an empty chain; an
    /// unknown url yields no chains.
    pub fn parent_proxy_chains(&self, url: &str) -> Vec<Vec<String>> {
        let Some(id) = self.find(url) else {
            return Vec::new();
        };
        let mut memo = HashMap::new();
        self.chains_above(id, &mut memo)
    }

    fn chains_above(
        &self,
        id: NodeId,
        memo: &mut HashMap<NodeId, Vec<Vec<String>>>,
    ) -> Vec<Vec<String>> {
        if let Some(chains) = memo.get(&id) {
            return chains.clone();
        }

        let mut chains = Vec::new();
        for &parent in &self.nodes[id.0].parents {
            if parent == Self::ROOT {
                chains.push(Vec::new());
                continue;
            }
            let parent_node = &self.nodes[parent.0];
            for upper in self.chains_above(parent, memo) {
                let mut chain = Vec::with_capacity(upper.len() + 1);
                if parent_node.kind.is_proxy() {
                    chain.push(parent_node.url.clone());
                }
                chain.extend(upper);
                chains.push(chain);
            }
        }

        memo.insert(id, chains.clone());
        chains
    }

    /// Resources that must be present before `url` can be loaded
    ///
    /// Walks down from `url` depth-first. Collection proxies below it are
    /// listed but not descended into, since what they load is fetched
    /// separately. Each url appears once, in first-visit order.
    pub fn dependants(&self, url: &str) -> Vec<String> {
        let Some(id) = self.find(url) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_dependants(id, &mut seen, &mut out);
        out
    }

    fn collect_dependants(&self, id: NodeId, seen: &mut HashSet<NodeId>, out: &mut Vec<String>) {
        for &child in &self.nodes[id.0].children {
            if !seen.insert(child) {
                continue;
            }
            let node = &self.nodes[child.0];
            out.push(node.url.clone());
            if !node.kind.is_proxy() {
                self.collect_dependants(child, seen, out);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    /// Shared resource reachable through two proxies of different depth and
    /// directly from the top collection
    fn shared_graph() -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        graph.add_child(None, "/main.collectionc").unwrap();
        graph
            .add_child(Some("/main.collectionc"), "/level1.collectionproxyc")
            .unwrap();
        graph
            .add_child(Some("/level1.collectionproxyc"), "/level2.collectionproxyc")
            .unwrap();
        graph
            .add_child(Some("/level2.collectionproxyc"), "/shared.goc")
            .unwrap();
        graph
            .add_child(Some("/level1.collectionproxyc"), "/shared.goc")
            .unwrap();
        graph.add_child(None, "/shared.goc").unwrap();
        graph
    }

    #[test]
    fn test_kind_from_url() {
        assert_eq!(
            ResourceKind::from_url("/a/b.collectionproxyc"),
            ResourceKind::CollectionProxy
        );
        assert_eq!(
            ResourceKind::from_url("/main.collectionc"),
            ResourceKind::Collection
        );
        assert_eq!(ResourceKind::from_url("/hero.goc"), ResourceKind::Other);
        assert!(ResourceKind::CollectionProxy.is_proxy());
        assert!(!ResourceKind::Collection.is_proxy());
    }

    #[test]
    fn test_insert_reuses_nodes() {
        let mut graph = ResourceGraph::new();
        let first = graph.insert("/a.goc").unwrap();
        let second = graph.insert("/a.goc").unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.len(), 1);
        assert!(graph.contains("/a.goc"));
    }

    #[test]
    fn test_invalid_urls_rejected() {
        let mut graph = ResourceGraph::new();
        assert_eq!(
            graph.insert("relative.goc"),
            Err(GraphError::InvalidUrl("relative.goc".to_string()))
        );
        assert!(graph.insert("/").is_err());
        assert!(graph.insert("").is_err());
    }

    #[test]
    fn test_unknown_parent() {
        let mut graph = ResourceGraph::new();
        assert_eq!(
            graph.add_child(Some("/missing.collectionc"), "/a.goc"),
            Err(GraphError::UnknownParent("/missing.collectionc".to_string()))
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let mut graph = ResourceGraph::new();
        graph.add_child(None, "/a.collectionc").unwrap();
        graph.add_child(Some("/a.collectionc"), "/b.collectionc").unwrap();
        let err = graph
            .add_child(Some("/b.collectionc"), "/a.collectionc")
            .unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
    }

    #[test]
    fn test_duplicate_edges_counted_once() {
        let mut graph = shared_graph();
        graph
            .add_child(Some("/level1.collectionproxyc"), "/shared.goc")
            .unwrap();
        // level1 proxy and level2 proxy; the root does not count
        assert_eq!(graph.dependents_count("/shared.goc"), 2);
        assert_eq!(graph.dependents_count("/main.collectionc"), 0);
        assert_eq!(graph.dependents_count("/unknown.goc"), 0);
    }

    #[test]
    fn test_parent_proxy_chains_per_path() {
        let graph = shared_graph();
        let chains = graph.parent_proxy_chains("/shared.goc");
        assert_eq!(
            chains,
            vec![
                strings(&["/level2.collectionproxyc", "/level1.collectionproxyc"]),
                strings(&["/level1.collectionproxyc"]),
                Vec::<String>::new(),
            ]
        );
    }

    #[test]
    fn test_parent_proxy_chains_unknown_and_top_level() {
        let graph = shared_graph();
        assert!(graph.parent_proxy_chains("/missing.goc").is_empty());
        assert_eq!(
            graph.parent_proxy_chains("/main.collectionc"),
            vec![Vec::<String>::new()]
        );
    }

    #[test]
    fn test_parent_proxy_chains_skip_plain_resources() {
        let mut graph = ResourceGraph::new();
        graph.add_child(None, "/hero.goc").unwrap();
        graph.add_child(Some("/hero.goc"), "/hero.spritec").unwrap();
        assert_eq!(
            graph.parent_proxy_chains("/hero.spritec"),
            vec![Vec::<String>::new()]
        );
    }

    #[test]
    fn test_dependants_stop_at_proxies() {
        let mut graph = ResourceGraph::new();
        graph.add_child(None, "/main.collectionc").unwrap();
        graph
            .add_child(Some("/main.collectionc"), "/level1.collectionproxyc")
            .unwrap();
        graph
            .add_child(Some("/level1.collectionproxyc"), "/level1.collectionc")
            .unwrap();
        graph
            .add_child(Some("/level1.collectionc"), "/level1.goc")
            .unwrap();
        graph
            .add_child(Some("/level1.collectionc"), "/level2.collectionproxyc")
            .unwrap();
        graph
            .add_child(Some("/level2.collectionproxyc"), "/level2.collectionc")
            .unwrap();
        graph
            .add_child(Some("/level1.goc"), "/level1.spritec")
            .unwrap();

        assert_eq!(
            graph.dependants("/level1.collectionproxyc"),
            strings(&[
                "/level1.collectionc",
                "/level1.goc",
                "/level1.spritec",
                "/level2.collectionproxyc"
            ])
        );
        assert_eq!(
            graph.dependants("/main.collectionc"),
            strings(&["/level1.collectionproxyc"])
        );
        assert!(graph.dependants("/missing.goc").is_empty());
    }
}
