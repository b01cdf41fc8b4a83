use std::rc::Rc;

use super::{TraversalContext, TraversedTile};
use crate::error::{Tiles3dError, Tiles3dResult};
use crate::implicit::derivation::{derive_bounding_volume, is_subdividable};
use crate::implicit::template::{substitute, substitute_reporting};
use crate::implicit::{SubtreeInfo, TreeCoordinates};
use crate::tile::{Content, ImplicitTiling, SubdivisionScheme, Tile};

/// The explicit tile an implicit tree hangs off
#[derive(Debug)]
struct ImplicitRoot<'a> {
    /// Explicit tile with metadata semantics applied
    tile: Tile,
    tiling: &'a ImplicitTiling,
    scheme: SubdivisionScheme,
    path: String,
}

/// A tile synthesized from implicit tiling
#[derive(Debug)]
pub struct ImplicitTraversedTile<'a> {
    root: Rc<ImplicitRoot<'a>>,
    subtree: Rc<SubtreeInfo>,
    subtree_uri: Rc<str>,
    /// Global coordinates of the root of `subtree`
    subtree_root: TreeCoordinates,
    /// Coordinates within `subtree`
    local: TreeCoordinates,
    global: TreeCoordinates,
    path: String,
    level: u32,
    /// Owning upward link; tiles never point down, so no cycle can form
    parent: Option<Rc<TraversedTile<'a>>>,
    context: TraversalContext<'a>,
}

fn implicit_path(explicit_path: &str, coordinates: &TreeCoordinates) -> String {
    format!("{}/[implicit]/{}", explicit_path, coordinates)
}

impl<'a> ImplicitTraversedTile<'a> {
    /// Root of the implicit tree defined by the explicit tile `tile`
    pub(super) fn implicit_root(
        tile: Tile,
        tiling: &'a ImplicitTiling,
        explicit_path: &str,
        level: u32,
        parent: Rc<TraversedTile<'a>>,
        context: TraversalContext<'a>,
    ) -> Tiles3dResult<Self> {
        let scheme = tiling.validate(explicit_path)?;
        if !is_subdividable(&tile.bounding_volume) {
            return Err(Tiles3dError::structural(
                explicit_path,
                "implicit tiling requires a box, region or S2 bounding volume",
            ));
        }
        let root = Rc::new(ImplicitRoot {
            tile,
            tiling,
            scheme,
            path: explicit_path.to_string(),
        });
        let coordinates = TreeCoordinates::root(scheme);
        let path = implicit_path(explicit_path, &coordinates);
        Self::subtree_root(root, coordinates, path, level, parent, context)
    }

    /// Load the subtree rooted at `global` and wrap its root tile
    fn subtree_root(
        root: Rc<ImplicitRoot<'a>>,
        global: TreeCoordinates,
        path: String,
        level: u32,
        parent: Rc<TraversedTile<'a>>,
        context: TraversalContext<'a>,
    ) -> Tiles3dResult<Self> {
        let template = &root.tiling.subtrees.uri;
        let uri = substitute_reporting(template, &global, &path, context.issues).ok_or_else(|| {
            Tiles3dError::structural(
                path.as_str(),
                format!("cannot substitute subtree template URI '{}'", template),
            )
        })?;
        let subtree = SubtreeInfo::load(
            context.resolver,
            &uri,
            root.scheme,
            root.tiling.subtree_levels,
            &path,
            context.issues,
        )?;
        Ok(Self {
            local: TreeCoordinates::root(root.scheme),
            root,
            subtree: Rc::new(subtree),
            subtree_uri: Rc::from(uri),
            subtree_root: global,
            global,
            path,
            level,
            parent: Some(parent),
            context,
        })
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

    /// Coordinates in the whole implicit tree
    pub fn coordinates(&self) -> TreeCoordinates {
        self.global
    }

    /// Coordinates within the subtree holding this tile
    pub fn local_coordinates(&self) -> TreeCoordinates {
        self.local
    }

    pub fn subtree(&self) -> &SubtreeInfo {
        &self.subtree
    }

    pub fn as_tile(&self) -> Tiles3dResult<Tile> {
        let bounding_volume =
            derive_bounding_volume(&self.root.tile.bounding_volume, &self.global, &self.path)?;
        let geometric_error =
            self.root.tile.geometric_error / 2f64.powi(self.global.level() as i32);
        let mut contents = self.resolve_contents(false);
        let (content, contents) = match contents.len() {
            0 => (None, None),
            1 => (contents.pop(), None),
            _ => (None, Some(contents)),
        };
        Ok(Tile {
            bounding_volume,
            geometric_error,
            refine: self.root.tile.refine,
            content,
            contents,
            ..Default::default()
        })
    }

    pub(super) fn children(
        &self,
        this: &Rc<TraversedTile<'a>>,
    ) -> Tiles3dResult<Vec<Rc<TraversedTile<'a>>>> {
        let tiling = self.root.tiling;
        if self.global.level() + 1 >= tiling.available_levels {
            return Ok(Vec::new());
        }

        let mut children = Vec::new();
        if self.local.level() + 1 < tiling.subtree_levels {
            for local in self.local.children() {
                if !self.subtree.tile_availability().is_available(local.to_index()) {
                    continue;
                }
                let global = self.subtree_root.globalize(&local).map_err(|e| e.at(&self.path))?;
                children.push(Rc::new(TraversedTile::Implicit(Self {
                    root: Rc::clone(&self.root),
                    subtree: Rc::clone(&self.subtree),
                    subtree_uri: Rc::clone(&self.subtree_uri),
                    subtree_root: self.subtree_root,
                    local,
                    global,
                    path: implicit_path(&self.root.path, &global),
                    level: self.level + 1,
                    parent: Some(Rc::clone(this)),
                    context: self.context,
                })));
            }
        } else {
            // last level of the subtree: children root the child subtrees
            for local in self.local.children() {
                let available = self
                    .subtree
                    .child_subtree_availability()
                    .is_available(local.to_index_in_level());
                if !available {
                    continue;
                }
                let global = self.subtree_root.globalize(&local).map_err(|e| e.at(&self.path))?;
                let child = Self::subtree_root(
                    Rc::clone(&self.root),
                    global,
                    implicit_path(&self.root.path, &global),
                    self.level + 1,
                    Rc::clone(this),
                    self.context,
                )?;
                children.push(Rc::new(TraversedTile::Implicit(child)));
            }
        }
        Ok(children)
    }

    /// Available contents, with template URIs substituted
    pub fn contents(&self) -> Vec<Content> {
        self.resolve_contents(true)
    }

    fn resolve_contents(&self, report: bool) -> Vec<Content> {
        let index = self.local.to_index();
        self.root
            .tile
            .contents()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| {
                self.subtree
                    .content_availability(*i)
                    .is_some_and(|availability| availability.is_available(index))
            })
            .filter_map(|(_, content)| {
                let uri = if report {
                    let issues = self.context.issues;
                    substitute_reporting(&content.uri, &self.global, &self.path, issues)
                } else {
                    substitute(&content.uri, &self.global).uri
                }?;
                Some(Content {
                    uri,
                    bounding_volume: None,
                    ..content
                })
            })
            .collect()
    }

    /// URI of the subtree, for tiles that root one
    pub fn subtree_uri(&self) -> Option<&str> {
        (self.local.level() == 0).then_some(&*self.subtree_uri)
    }

    /// Implicit tiling, for tiles that root a subtree
    pub fn implicit_tiling(&self) -> Option<&ImplicitTiling> {
        (self.local.level() == 0).then_some(self.root.tiling)
    }
}
