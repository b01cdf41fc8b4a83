//! Tile structure for 3D Tiles

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bounds::BoundingVolume;
use crate::error::{Tiles3dError, Tiles3dResult};
use crate::metadata::MetadataEntity;

/// Refinement strategy for child tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TileRefine {
    /// Replace parent tile with children
    #[default]
    Replace,
    /// Add children to parent tile
    Add,
}

/// Content description for a tile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// URI to the tile content, a template URI for implicit tiling roots
    pub uri: String,
    /// Optional bounding volume for the content (tighter than tile bounds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_volume: Option<BoundingVolume>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataEntity>,
    /// Index into the tileset's `groups`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<BTreeMap<String, serde_json::Value>>,
}

/// Subdivision scheme of an implicit tileset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubdivisionScheme {
    Quadtree,
    Octree,
}

impl SubdivisionScheme {
    /// Number of children per node
    pub fn branching_factor(self) -> u64 {
        match self {
            Self::Quadtree => 4,
            Self::Octree => 8,
        }
    }

    /// Deepest tree, counted in levels, whose node indices fit in a `u64`
    pub fn max_levels(self) -> u32 {
        match self {
            Self::Quadtree => 31,
            Self::Octree => 21,
        }
    }

    /// Number of nodes in a complete tree of `levels` levels, for
    /// `levels <= max_levels()`
    pub fn node_count(self, levels: u32) -> u64 {
        let n = self.branching_factor();
        (n.pow(levels) - 1) / (n - 1)
    }

    /// Number of nodes on a single level
    pub fn level_node_count(self, level: u32) -> u64 {
        self.branching_factor().pow(level)
    }
}

impl FromStr for SubdivisionScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUADTREE" => Ok(Self::Quadtree),
            "OCTREE" => Ok(Self::Octree),
            other => Err(format!("invalid subdivision scheme '{}'", other)),
        }
    }
}

impl fmt::Display for SubdivisionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quadtree => write!(f, "QUADTREE"),
            Self::Octree => write!(f, "OCTREE"),
        }
    }
}

/// Location of the subtree resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtreesUri {
    /// Template URI with `{level}`, `{x}`, `{y}` and for octrees `{z}`
    pub uri: String,
}

/// Implicit tiling descriptor of a tile that roots an implicit tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplicitTiling {
    /// `QUADTREE` or `OCTREE`; kept as a string so invalid values surface as
    /// structural errors during traversal rather than as parse failures
    pub subdivision_scheme: String,
    pub subtree_levels: u32,
    pub available_levels: u32,
    pub subtrees: SubtreesUri,
}

impl ImplicitTiling {
    pub fn scheme(&self, path: &str) -> Tiles3dResult<SubdivisionScheme> {
        self.subdivision_scheme
            .parse()
            .map_err(|msg: String| Tiles3dError::structural(path, msg))
    }

    /// Check the level bounds and the subdivision scheme
    pub fn validate(&self, path: &str) -> Tiles3dResult<SubdivisionScheme> {
        let scheme = self.scheme(path)?;
        if self.subtree_levels < 1 {
            return Err(Tiles3dError::structural(path, "subtreeLevels must be at least 1"));
        }
        if self.available_levels < 1 {
            return Err(Tiles3dError::structural(path, "availableLevels must be at least 1"));
        }
        if self.available_levels > scheme.max_levels() {
            return Err(Tiles3dError::structural(
                path,
                format!(
                    "availableLevels ({}) exceeds the {} levels a {} can index",
                    self.available_levels,
                    scheme.max_levels(),
                    scheme
                ),
            ));
        }
        if self.subtree_levels > self.available_levels {
            return Err(Tiles3dError::structural(
                path,
                format!(
                    "subtreeLevels ({}) exceeds availableLevels ({})",
                    self.subtree_levels, self.available_levels
                ),
            ));
        }
        Ok(scheme)
    }
}

/// A single tile in the 3D Tiles hierarchy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    /// Bounding volume enclosing the tile
    pub bounding_volume: BoundingVolume,
    /// Geometric error in meters (controls LOD selection)
    pub geometric_error: f64,
    /// Optional refinement strategy (inherited from parent if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refine: Option<TileRefine>,
    /// Optional 4x4 transform matrix (column-major)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<[f64; 16]>,
    /// Viewer request volume (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_request_volume: Option<BoundingVolume>,
    /// Single content (mutually exclusive with `contents`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    /// Multiple contents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<Content>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implicit_tiling: Option<ImplicitTiling>,
    /// Child tiles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Tile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<serde_json::Value>,
}

impl Tile {
    /// `content` and `contents` as one list
    pub fn contents(&self) -> Vec<Content> {
        match (&self.content, &self.contents) {
            (Some(content), _) => vec![content.clone()],
            (None, Some(contents)) => contents.clone(),
            (None, None) => Vec::new(),
        }
    }

    /// Count total explicit tiles in this subtree
    pub fn count_tiles(&self) -> usize {
        1 + self.children.iter().map(|c| c.count_tiles()).sum::<usize>()
    }

    /// Check the tile-local invariants
    pub fn validate(&self, path: &str) -> Tiles3dResult<()> {
        if !(self.geometric_error >= 0.0) {
            return Err(Tiles3dError::structural(
                path,
                format!("geometricError must be >= 0, found {}", self.geometric_error),
            ));
        }
        if self.content.is_some() && self.contents.is_some() {
            return Err(Tiles3dError::structural(
                path,
                "tile defines both 'content' and 'contents'",
            ));
        }
        Ok(())
    }

    /// Copy of this tile without its children
    pub(crate) fn snapshot(&self) -> Tile {
        Tile {
            bounding_volume: self.bounding_volume.clone(),
            geometric_error: self.geometric_error,
            refine: self.refine,
            transform: self.transform,
            viewer_request_volume: self.viewer_request_volume.clone(),
            content: self.content.clone(),
            contents: self.contents.clone(),
            metadata: self.metadata.clone(),
            implicit_tiling: self.implicit_tiling.clone(),
            children: Vec::new(),
            extensions: self.extensions.clone(),
            extras: self.extras.clone(),
        }
    }
}
