//! Tileset traversal driver

use std::collections::VecDeque;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::Tiles3dResult;
use crate::issues::{IssueKind, IssueSink, ValidationIssue};
use crate::resolver::ResourceResolver;
use crate::tile::Tile;
use crate::tileset::Tileset;
use crate::traversed::{TraversalContext, TraversedTile};

/// Order in which tiles are visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraversalOrder {
    /// A tile's whole subtree is visited before its next sibling
    #[default]
    DepthFirst,
    /// Tiles are visited in the order they were discovered
    BreadthFirst,
}

/// Tileset traverser
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TilesetTraverser {
    pub order: TraversalOrder,
    /// Report branches whose children fail to resolve and keep going
    pub continue_on_error: bool,
    /// Tiles at this level are visited but not expanded
    pub max_level: Option<u32>,
}

impl TilesetTraverser {
    pub fn new(order: TraversalOrder) -> Self {
        Self {
            order,
            ..Default::default()
        }
    }

    pub fn depth_first() -> Self {
        Self::new(TraversalOrder::DepthFirst)
    }

    pub fn breadth_first() -> Self {
        Self::new(TraversalOrder::BreadthFirst)
    }

    pub fn with_order(mut self, order: TraversalOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    /// Set maximum traversal level
    pub fn with_max_level(mut self, max_level: Option<u32>) -> Self {
        self.max_level = max_level;
        self
    }

    /// Traverse a tileset, resolving its schema and resources with `resolver`
    pub fn traverse_tileset<F>(
        &self,
        tileset: &Tileset,
        resolver: &dyn ResourceResolver,
        issues: &dyn IssueSink,
        callback: F,
    ) -> Tiles3dResult<TraversalStats>
    where
        F: FnMut(&TraversedTile<'_>) -> bool,
    {
        let schema = tileset.resolve_schema(resolver)?;
        let context = TraversalContext::new(resolver, issues).with_schema(schema.as_ref());
        self.traverse(tileset.root(), context, callback)
    }

    /// Visit `root` and its descendants
    ///
    /// The callback decides per tile whether its children are visited;
    /// returning `false` prunes that branch only.
    pub fn traverse<'a, F>(
        &self,
        root: &'a Tile,
        context: TraversalContext<'a>,
        mut callback: F,
    ) -> Tiles3dResult<TraversalStats>
    where
        F: FnMut(&TraversedTile<'a>) -> bool,
    {
        let mut stats = TraversalStats::default();
        let mut pending = VecDeque::from([Rc::new(TraversedTile::root(root, context))]);

        while let Some(tile) = self.next(&mut pending) {
            stats.record(&tile);
            log::trace!("Visiting {} at level {}", tile.path(), tile.level());

            if !callback(tile.as_ref()) {
                continue;
            }
            if self.max_level.is_some_and(|max| tile.level() >= max) {
                continue;
            }

            match TraversedTile::children(&tile) {
                Ok(children) => match self.order {
                    // reversed so the first child is visited first
                    TraversalOrder::DepthFirst => pending.extend(children.into_iter().rev()),
                    TraversalOrder::BreadthFirst => pending.extend(children),
                },
                Err(e) if self.continue_on_error => {
                    log::warn!("Skipping children of {}: {}", tile.path(), e);
                    context.issues.add_issue(ValidationIssue::new(
                        IssueKind::TraversalBranchFailed,
                        tile.path(),
                        e.to_string(),
                    ));
                    stats.failed_branches += 1;
                }
                Err(e) => return Err(e),
            }
        }

        log::debug!(
            "Traversal visited {} tiles ({} explicit, {} implicit, {} subtrees)",
            stats.visited,
            stats.explicit_tiles,
            stats.implicit_tiles,
            stats.subtree_roots
        );
        Ok(stats)
    }

    fn next<T>(&self, pending: &mut VecDeque<T>) -> Option<T> {
        match self.order {
            TraversalOrder::DepthFirst => pending.pop_back(),
            TraversalOrder::BreadthFirst => pending.pop_front(),
        }
    }
}

/// Statistics from a traversal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalStats {
    /// Number of tiles passed to the callback
    pub visited: usize,
    pub explicit_tiles: usize,
    pub implicit_tiles: usize,
    /// Implicit tiles that root a subtree
    pub subtree_roots: usize,
    /// Deepest level visited
    pub max_level: u32,
    /// Branches skipped under `continue_on_error`
    pub failed_branches: usize,
}

impl TraversalStats {
    fn record(&mut self, tile: &TraversedTile<'_>) {
        self.visited += 1;
        match tile {
            TraversedTile::Explicit(_) => self.explicit_tiles += 1,
            TraversedTile::Implicit(t) => {
                self.implicit_tiles += 1;
                if t.local_coordinates().level() == 0 {
                    self.subtree_roots += 1;
                }
            }
        }
        self.max_level = self.max_level.max(tile.level());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::IssueCollector;
    use crate::resolver::MemoryResourceResolver;
    use std::path::PathBuf;

    const TILESET: &str = r#"{
        "asset": { "version": "1.1" },
        "geometricError": 500.0,
        "root": {
            "boundingVolume": { "sphere": [0, 0, 0, 100] },
            "geometricError": 100.0,
            "content": { "uri": "root.glb" },
            "children": [
                {
                    "boundingVolume": { "sphere": [-50, 0, 0, 50] },
                    "geometricError": 10.0,
                    "children": [
                        {
                            "boundingVolume": { "sphere": [-50, 0, 0, 25] },
                            "geometricError": 1.0,
                            "content": { "uri": "leaf.glb" }
                        }
                    ]
                },
                {
                    "boundingVolume": { "sphere": [50, 0, 0, 50] },
                    "geometricError": 10.0,
                    "content": { "uri": "tile2.glb" }
                }
            ]
        }
    }"#;

    fn visit(traverser: &TilesetTraverser) -> Vec<String> {
        let tileset = Tileset::from_json(TILESET, PathBuf::from(".")).unwrap();
        let resolver = MemoryResourceResolver::new();
        let issues = IssueCollector::new();
        let mut paths = Vec::new();
        traverser
            .traverse_tileset(&tileset, &resolver, &issues, |tile| {
                paths.push(tile.path().to_string());
                true
            })
            .unwrap();
        paths
    }

    #[test]
    fn test_traverser_default() {
        let traverser = TilesetTraverser::default();
        assert_eq!(traverser.order, TraversalOrder::DepthFirst);
        assert!(!traverser.continue_on_error);
        assert_eq!(traverser.max_level, None);
    }

    #[test]
    fn test_depth_first_order() {
        let paths = visit(&TilesetTraverser::depth_first());
        assert_eq!(
            paths,
            vec![
                "/root",
                "/root/children/0",
                "/root/children/0/children/0",
                "/root/children/1",
            ]
        );
    }

    #[test]
    fn test_breadth_first_order() {
        let paths = visit(&TilesetTraverser::breadth_first());
        assert_eq!(
            paths,
            vec![
                "/root",
                "/root/children/0",
                "/root/children/1",
                "/root/children/0/children/0",
            ]
        );
    }

    #[test]
    fn test_max_level_stops_expansion() {
        let paths = visit(&TilesetTraverser::default().with_max_level(Some(1)));
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn test_pruning_skips_branch_only() {
        let tileset = Tileset::from_json(TILESET, PathBuf::from(".")).unwrap();
        let resolver = MemoryResourceResolver::new();
        let issues = IssueCollector::new();
        let mut paths = Vec::new();
        let stats = TilesetTraverser::default()
            .traverse_tileset(&tileset, &resolver, &issues, |tile| {
                paths.push(tile.path().to_string());
                tile.path() != "/root/children/0"
            })
            .unwrap();
        assert_eq!(paths, vec!["/root", "/root/children/0", "/root/children/1"]);
        assert_eq!(stats.visited, 3);
        assert_eq!(stats.explicit_tiles, 3);
        assert_eq!(stats.max_level, 1);
    }

    #[test]
    fn test_parent_links() {
        let tileset = Tileset::from_json(TILESET, PathBuf::from(".")).unwrap();
        let resolver = MemoryResourceResolver::new();
        let issues = IssueCollector::new();
        let mut parents = Vec::new();
        TilesetTraverser::default()
            .traverse_tileset(&tileset, &resolver, &issues, |tile| {
                parents.push(tile.parent().map(|p| p.path().to_string()));
                true
            })
            .unwrap();
        assert_eq!(parents[0], None);
        assert_eq!(parents[2].as_deref(), Some("/root/children/0"));
    }

    #[test]
    fn test_config_serde() {
        let traverser: TilesetTraverser =
            serde_json::from_str(r#"{ "order": "breadthFirst", "maxLevel": 4 }"#).unwrap();
        assert_eq!(traverser.order, TraversalOrder::BreadthFirst);
        assert_eq!(traverser.max_level, Some(4));
        assert!(!traverser.continue_on_error);
    }
}
