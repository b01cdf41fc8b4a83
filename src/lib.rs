//! Traversal of OGC 3D Tiles tilesets
//!
//! This crate walks a tileset whose tree is described explicitly (nested JSON
//! tiles), implicitly (quadtree/octree subtrees with availability bitstreams),
//! or as a mix of both. Implicit tiles are synthesized on demand from their
//! tree coordinates, so arbitrarily deep implicit trees are never
//! materialized.

pub mod bounds;
pub mod error;
pub mod implicit;
pub mod issues;
pub mod metadata;
pub mod resolver;
pub mod tile;
pub mod tileset;
pub mod traversal;
pub mod traversed;

pub use bounds::{
    BoundingBox, BoundingRegion, BoundingShape, BoundingSphere, BoundingVolume, S2Volume,
};
pub use error::{Tiles3dError, Tiles3dResult};
pub use implicit::{
    derive_bounding_volume, AvailabilityInfo, OctreeCoordinates, QuadtreeCoordinates, S2CellId,
    Subtree, SubtreeInfo, TreeCoordinates,
};
pub use issues::{
    IssueCollector, IssueKind, IssueSeverity, IssueSink, LogIssueSink, ValidationIssue,
};
pub use metadata::{JsonMetadataEntityModel, MetadataEntity, MetadataEntityModel, Schema};
pub use resolver::{FileResourceResolver, MemoryResourceResolver, ResourceResolver};
pub use tile::{Content, ImplicitTiling, SubdivisionScheme, Tile, TileRefine};
pub use tileset::Tileset;
pub use traversal::{TilesetTraverser, TraversalOrder, TraversalStats};
pub use traversed::{TraversalContext, TraversedTile};
