use std::rc::Rc;

use super::implicit::ImplicitTraversedTile;
use super::{TraversalContext, TraversedTile};
use crate::error::Tiles3dResult;
use crate::implicit::template::substitute;
use crate::implicit::TreeCoordinates;
use crate::metadata::{apply_tile_overrides, JsonMetadataEntityModel};
use crate::tile::{Content, ImplicitTiling, Tile};

/// A tile of the tileset JSON
#[derive(Debug)]
pub struct ExplicitTraversedTile<'a> {
    tile: &'a Tile,
    path: String,
    level: u32,
    /// Owning upward link; tiles never point down, so no cycle can form
    parent: Option<Rc<TraversedTile<'a>>>,
    context: TraversalContext<'a>,
}

impl<'a> ExplicitTraversedTile<'a> {
    pub(crate) fn new(
        tile: &'a Tile,
        path: String,
        level: u32,
        parent: Option<Rc<TraversedTile<'a>>>,
        context: TraversalContext<'a>,
    ) -> Self {
        Self {
            tile,
            path,
            level,
            parent,
            context,
        }
    }

    /// The JSON tile, as written in the tileset
    pub fn tile(&self) -> &'a Tile {
        self.tile
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<&Rc<TraversedTile<'a>>> {
        self.parent.as_ref()
    }

    /// The tile with metadata semantics applied
    pub fn as_tile(&self) -> Tiles3dResult<Tile> {
        self.tile.validate(&self.path)?;
        let mut tile = self.tile.snapshot();
        match (self.context.schema, &self.tile.metadata) {
            (Some(schema), Some(entity)) => {
                let model = JsonMetadataEntityModel::new(schema, entity, &self.path)?;
                apply_tile_overrides(&mut tile, &model, &self.path)?;
            }
            (None, Some(_)) => {
                log::debug!("No schema for the metadata of {}; not applying semantics", self.path);
            }
            _ => {}
        }
        Ok(tile)
    }

    /// Children from the JSON, or the root of the implicit tree this tile
    /// defines. Implicit tiling takes precedence over explicit children.
    pub(super) fn children(
        &self,
        this: &Rc<TraversedTile<'a>>,
    ) -> Tiles3dResult<Vec<Rc<TraversedTile<'a>>>> {
        if let Some(tiling) = &self.tile.implicit_tiling {
            if !self.tile.children.is_empty() {
                log::warn!(
                    "Ignoring {} explicit children of implicit root {}",
                    self.tile.children.len(),
                    self.path
                );
            }
            let root = ImplicitTraversedTile::implicit_root(
                self.as_tile()?,
                tiling,
                &self.path,
                self.level + 1,
                Rc::clone(this),
                self.context,
            )?;
            return Ok(vec![Rc::new(TraversedTile::Implicit(root))]);
        }

        let children = self
            .tile
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| {
                Rc::new(TraversedTile::Explicit(Self::new(
                    child,
                    format!("{}/children/{}", self.path, i),
                    self.level + 1,
                    Some(Rc::clone(this)),
                    self.context,
                )))
            })
            .collect();
        Ok(children)
    }

    /// Contents of the tile; empty for implicit roots, whose content URIs
    /// are templates
    pub fn contents(&self) -> Vec<Content> {
        if self.tile.implicit_tiling.is_some() {
            return Vec::new();
        }
        self.tile.contents()
    }

    /// URI of the root subtree when this tile defines implicit tiling
    pub fn subtree_uri(&self) -> Option<String> {
        let tiling = self.tile.implicit_tiling.as_ref()?;
        let scheme = tiling.scheme(&self.path).ok()?;
        substitute(&tiling.subtrees.uri, &TreeCoordinates::root(scheme)).uri
    }

    pub fn implicit_tiling(&self) -> Option<&'a ImplicitTiling> {
        self.tile.implicit_tiling.as_ref()
    }
}
