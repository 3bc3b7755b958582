//! Live-update exclusion rule
//!
//! Given a set of excluded urls, every resource falls into one of three
//! groups:
//!
//! - **Bundled**: reachable from the root along some path that never enters
//!   an excluded resource
//! - **Excluded**: in the excluded set and not dropped; keeps an index entry
//!   flagged as live update while its payload goes to the resource pack
//! - **Dropped**: strictly below an excluded resource on every root path;
//!   removed from the archive entirely
//!
//! A shared resource is dropped only when every path to it crosses an
//! excluded resource. Resources unknown to the graph are bundled unless they
//! are themselves excluded.

use super::{NodeId, ResourceGraph};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Where a resource ends up after exclusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Inclusion {
    /// Payload stored in the main data file
    Bundled,
    /// Index entry kept, payload moved to the resource pack
    Excluded,
    /// Left out of the index, payload moved to the resource pack
    Dropped,
}

impl Inclusion {
    /// Whether the resource has an entry in the archive index
    pub fn in_index(self) -> bool {
        matches!(self, Self::Bundled | Self::Excluded)
    }

    /// Whether the payload belongs in the resource pack
    pub fn in_resource_pack(self) -> bool {
        matches!(self, Self::Excluded | Self::Dropped)
    }
}

/// Result of applying an excluded-url set to a graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionPlan {
    excluded: HashSet<String>,
    dropped: HashSet<String>,
}

impl ExclusionPlan {
    /// Plan that keeps everything bundled
    pub fn none() -> Self {
        Self::default()
    }

    /// Classify a url
    pub fn inclusion(&self, url: &str) -> Inclusion {
        if self.dropped.contains(url) {
            Inclusion::Dropped
        } else if self.excluded.contains(url) {
            Inclusion::Excluded
        } else {
            Inclusion::Bundled
        }
    }

    /// Urls requested for exclusion
    pub fn excluded(&self) -> &HashSet<String> {
        &self.excluded
    }

    /// Urls removed from the archive entirely
    pub fn dropped(&self) -> &HashSet<String> {
        &self.dropped
    }

    /// Whether nothing is excluded
    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty()
    }
}

impl ResourceGraph {
    /// Apply the exclusion rule for `excluded`
    pub fn exclusion_plan<I, S>(&self, excluded: I) -> ExclusionPlan
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let excluded: HashSet<String> = excluded.into_iter().map(Into::into).collect();

        // Breadth-first from the root, never entering below an excluded node
        let mut reached: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<NodeId> = VecDeque::from([self.root()]);
        while let Some(id) = queue.pop_front() {
            if !reached.insert(id) {
                continue;
            }
            let node = self.node(id);
            if excluded.contains(&node.url) {
                continue;
            }
            queue.extend(node.children().iter().copied());
        }

        // Everything strictly below an excluded node
        let mut below: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<NodeId> = excluded
            .iter()
            .filter_map(|url| self.find(url))
            .flat_map(|id| self.node(id).children().iter().copied())
            .collect();
        while let Some(id) = stack.pop() {
            if below.insert(id) {
                stack.extend(self.node(id).children().iter().copied());
            }
        }

        let dropped: HashSet<String> = below
            .into_iter()
            .filter(|id| !reached.contains(id))
            .map(|id| self.node(id).url.clone())
            .collect();

        debug!(
            "Exclusion plan: {} excluded urls, {} dropped resources",
            excluded.len(),
            dropped.len()
        );

        ExclusionPlan { excluded, dropped }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    /// `main → level1 proxy → level2 proxy`, `level1.goc` under the level1
    /// proxy and `level2.goc` under the level2 proxy
    fn deep_proxies() -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        graph.add_child(None, "/main.collectionc").unwrap();
        graph
            .add_child(Some("/main.collectionc"), "/level1.collectionproxyc")
            .unwrap();
        graph
            .add_child(Some("/level1.collectionproxyc"), "/level1.goc")
            .unwrap();
        graph
            .add_child(Some("/level1.collectionproxyc"), "/level2.collectionproxyc")
            .unwrap();
        graph
            .add_child(Some("/level2.collectionproxyc"), "/level2.goc")
            .unwrap();
        graph
    }

    fn kept(graph: &ResourceGraph, plan: &ExclusionPlan) -> BTreeSet<String> {
        graph
            .nodes()
            .filter(|(_, node)| plan.inclusion(&node.url).in_index())
            .map(|(_, node)| node.url.clone())
            .collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_exclude_nested_proxy() {
        let graph = deep_proxies();
        let plan = graph.exclusion_plan(["/level2.collectionproxyc"]);
        assert_eq!(
            kept(&graph, &plan),
            set(&[
                "/level1.collectionproxyc",
                "/main.collectionc",
                "/level2.collectionproxyc",
                "/level1.goc"
            ])
        );
        assert_eq!(
            plan.inclusion("/level2.collectionproxyc"),
            Inclusion::Excluded
        );
        assert_eq!(plan.inclusion("/level2.goc"), Inclusion::Dropped);
    }

    #[test]
    fn test_exclude_outer_proxy_drops_whole_subtree() {
        let graph = deep_proxies();
        let plan = graph.exclusion_plan(["/level1.collectionproxyc"]);
        assert_eq!(
            kept(&graph, &plan),
            set(&["/level1.collectionproxyc", "/main.collectionc"])
        );
        assert_eq!(
            plan.inclusion("/level2.collectionproxyc"),
            Inclusion::Dropped
        );
    }

    #[test]
    fn test_excluding_both_levels() {
        let graph = deep_proxies();
        let plan = graph.exclusion_plan(["/level1.collectionproxyc", "/level2.collectionproxyc"]);
        // The inner proxy is only reachable through the outer one
        assert_eq!(
            plan.inclusion("/level2.collectionproxyc"),
            Inclusion::Dropped
        );
        assert_eq!(
            kept(&graph, &plan),
            set(&["/level1.collectionproxyc", "/main.collectionc"])
        );
    }

    #[test]
    fn test_sibling_proxies() {
        let mut graph = ResourceGraph::new();
        graph.add_child(None, "/main.collectionc").unwrap();
        for level in ["level1", "level2"] {
            let proxy = format!("/{level}.collectionproxyc");
            graph.add_child(Some("/main.collectionc"), &proxy).unwrap();
            graph
                .add_child(Some(&proxy), &format!("/{level}.goc"))
                .unwrap();
        }

        let plan = graph.exclusion_plan(["/level1.collectionproxyc"]);
        assert_eq!(
            kept(&graph, &plan),
            set(&[
                "/main.collectionc",
                "/level1.collectionproxyc",
                "/level2.collectionproxyc",
                "/level2.goc"
            ])
        );
    }

    #[test]
    fn test_shared_resource_kept_when_any_path_avoids_exclusion() {
        let mut graph = deep_proxies();
        graph
            .add_child(Some("/level1.collectionproxyc"), "/shared.goc")
            .unwrap();
        graph
            .add_child(Some("/level2.collectionproxyc"), "/shared.goc")
            .unwrap();

        let plan = graph.exclusion_plan(["/level2.collectionproxyc"]);
        assert_eq!(plan.inclusion("/shared.goc"), Inclusion::Bundled);
        assert_eq!(plan.inclusion("/level2.goc"), Inclusion::Dropped);

        let plan = graph.exclusion_plan(["/level1.collectionproxyc"]);
        assert_eq!(plan.inclusion("/shared.goc"), Inclusion::Dropped);
    }

    #[test]
    fn test_shared_resource_under_two_excluded_siblings() {
        let mut graph = ResourceGraph::new();
        graph.add_child(None, "/main.collectionc").unwrap();
        graph
            .add_child(Some("/main.collectionc"), "/a.collectionproxyc")
            .unwrap();
        graph
            .add_child(Some("/main.collectionc"), "/b.collectionproxyc")
            .unwrap();
        graph
            .add_child(Some("/a.collectionproxyc"), "/shared.goc")
            .unwrap();
        graph
            .add_child(Some("/b.collectionproxyc"), "/shared.goc")
            .unwrap();

        let plan = graph.exclusion_plan(["/a.collectionproxyc"]);
        assert_eq!(plan.inclusion("/shared.goc"), Inclusion::Bundled);

        let plan = graph.exclusion_plan(["/a.collectionproxyc", "/b.collectionproxyc"]);
        assert_eq!(plan.inclusion("/shared.goc"), Inclusion::Dropped);
    }

    #[test]
    fn test_unknown_urls() {
        let graph = deep_proxies();
        let plan = graph.exclusion_plan(["/not_in_graph.goc"]);
        assert_eq!(plan.inclusion("/not_in_graph.goc"), Inclusion::Excluded);
        assert_eq!(plan.inclusion("/other.goc"), Inclusion::Bundled);
        assert!(plan.dropped().is_empty());
    }

    #[test]
    fn test_no_exclusions() {
        let graph = deep_proxies();
        let plan = graph.exclusion_plan(Vec::<String>::new());
        assert!(plan.is_empty());
        assert_eq!(kept(&graph, &plan).len(), 5);
        assert_eq!(ExclusionPlan::none().inclusion("/level2.goc"), Inclusion::Bundled);
    }
}
