//! Tiles as seen during traversal
//!
//! A [`TraversedTile`] is either backed by a tile of the tileset JSON or
//! synthesized from implicit tiling coordinates and subtree availability.
//! Both kinds answer the same questions: their path, level, parent, the tile
//! they stand for, their contents and their children.

mod explicit;
mod implicit;

use std::fmt;
use std::rc::Rc;

pub use explicit::ExplicitTraversedTile;
pub use implicit::ImplicitTraversedTile;

use crate::error::Tiles3dResult;
use crate::implicit::TreeCoordinates;
use crate::issues::IssueSink;
use crate::metadata::Schema;
use crate::resolver::ResourceResolver;
use crate::tile::{Content, ImplicitTiling, Tile};

/// Path of the tileset root tile
pub const ROOT_PATH: &str = "/root";

/// What tiles need from their surroundings to resolve children
#[derive(Clone, Copy)]
pub struct TraversalContext<'a> {
    /// Resolves subtree and buffer URIs relative to the tileset
    pub resolver: &'a dyn ResourceResolver,
    /// Schema for tile metadata semantics
    pub schema: Option<&'a Schema>,
    /// Receives template and availability issues
    pub issues: &'a dyn IssueSink,
}

impl<'a> TraversalContext<'a> {
    pub fn new(resolver: &'a dyn ResourceResolver, issues: &'a dyn IssueSink) -> Self {
        Self {
            resolver,
            schema: None,
            issues,
        }
    }

    pub fn with_schema(mut self, schema: Option<&'a Schema>) -> Self {
        self.schema = schema;
        self
    }
}

impl fmt::Debug for TraversalContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraversalContext")
            .field("schema", &self.schema.map(|s| s.id.as_deref().unwrap_or("")))
            .finish_non_exhaustive()
    }
}

/// A tile visited during traversal
#[derive(Debug)]
pub enum TraversedTile<'a> {
    Explicit(ExplicitTraversedTile<'a>),
    Implicit(ImplicitTraversedTile<'a>),
}

impl<'a> TraversedTile<'a> {
    /// Wrap the root tile of a tileset
    pub fn root(tile: &'a Tile, context: TraversalContext<'a>) -> Self {
        Self::Explicit(ExplicitTraversedTile::new(
            tile,
            ROOT_PATH.to_string(),
            0,
            None,
            context,
        ))
    }

    /// Depth below the tileset root, counting explicit and implicit levels
    pub fn level(&self) -> u32 {
        match self {
            Self::Explicit(t) => t.level(),
            Self::Implicit(t) => t.level(),
        }
    }

    /// Diagnostic path, such as `/root/children/1/[implicit]/2/1/3`
    pub fn path(&self) -> &str {
        match self {
            Self::Explicit(t) => t.path(),
            Self::Implicit(t) => t.path(),
        }
    }

    pub fn parent(&self) -> Option<&Rc<TraversedTile<'a>>> {
        match self {
            Self::Explicit(t) => t.parent(),
            Self::Implicit(t) => t.parent(),
        }
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self, Self::Implicit(_))
    }

    /// Global coordinates of implicit tiles
    pub fn coordinates(&self) -> Option<TreeCoordinates> {
        match self {
            Self::Explicit(_) => None,
            Self::Implicit(t) => Some(t.coordinates()),
        }
    }

    /// The tile this node stands for, without children
    ///
    /// Explicit tiles carry their metadata overrides; implicit tiles carry the
    /// bounding volume, geometric error and contents derived for their
    /// coordinates.
    pub fn as_tile(&self) -> Tiles3dResult<Tile> {
        match self {
            Self::Explicit(t) => t.as_tile(),
            Self::Implicit(t) => t.as_tile(),
        }
    }

    /// Resolve the children of `tile`
    ///
    /// For implicit tiles at the last level of a subtree this loads the child
    /// subtrees.
    pub fn children(tile: &Rc<Self>) -> Tiles3dResult<Vec<Rc<Self>>> {
        match tile.as_ref() {
            Self::Explicit(t) => t.children(tile),
            Self::Implicit(t) => t.children(tile),
        }
    }

    /// Contents with resolved URIs
    pub fn contents(&self) -> Vec<Content> {
        match self {
            Self::Explicit(t) => t.contents(),
            Self::Implicit(t) => t.contents(),
        }
    }

    /// URI of the subtree this tile roots, if it roots one
    pub fn subtree_uri(&self) -> Option<String> {
        match self {
            Self::Explicit(t) => t.subtree_uri(),
            Self::Implicit(t) => t.subtree_uri().map(str::to_string),
        }
    }

    /// Implicit tiling of the tree this tile roots, if it roots one
    pub fn implicit_tiling(&self) -> Option<&ImplicitTiling> {
        match self {
            Self::Explicit(t) => t.implicit_tiling(),
            Self::Implicit(t) => t.implicit_tiling(),
        }
    }
}
