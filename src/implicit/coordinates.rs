//! Quadtree and octree coordinates
//!
//! Coordinates are plain values: `(level, x, y)` for quadtrees and
//! `(level, x, y, z)` for octrees, with every axis in `[0, 2^level)`. Indices
//! follow implicit tiling conventions: nodes of one level are ordered by their
//! Morton index, and levels are concatenated from the root down.

use std::collections::VecDeque;
use std::fmt;
use std::iter::FusedIterator;

use super::morton;
use crate::error::{Tiles3dError, Tiles3dResult};
use crate::tile::SubdivisionScheme;
use crate::traversal::TraversalOrder;

/// Address of a node in a quadtree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QuadtreeCoordinates {
    pub level: u32,
    pub x: u64,
    pub y: u64,
}

/// Address of a node in an octree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OctreeCoordinates {
    pub level: u32,
    pub x: u64,
    pub y: u64,
    pub z: u64,
}

impl QuadtreeCoordinates {
    pub fn new(level: u32, x: u64, y: u64) -> Self {
        Self { level, x, y }
    }

    /// Child `index` in Morton order (0..4)
    pub fn child(&self, index: u8) -> Self {
        let index = u64::from(index);
        Self {
            level: self.level + 1,
            x: (self.x << 1) + (index & 1),
            y: (self.y << 1) + ((index >> 1) & 1),
        }
    }

    /// Get child coordinates (one level down)
    pub fn children(&self) -> [Self; 4] {
        [self.child(0), self.child(1), self.child(2), self.child(3)]
    }

    /// Get parent coordinates (one level up)
    pub fn parent(&self) -> Option<Self> {
        if self.level > 0 {
            Some(Self {
                level: self.level - 1,
                x: self.x >> 1,
                y: self.y >> 1,
            })
        } else {
            None
        }
    }

    pub fn index_in_level(&self) -> u64 {
        morton::encode_2d(self.x, self.y)
    }

    pub fn index(&self) -> u64 {
        SubdivisionScheme::Quadtree.node_count(self.level) + self.index_in_level()
    }

    pub fn is_valid(&self) -> bool {
        self.level < 64 && self.x >> self.level == 0 && self.y >> self.level == 0
    }

    /// Combine this subtree root with coordinates local to its subtree
    pub fn globalize(&self, local: &Self) -> Self {
        Self {
            level: self.level + local.level,
            x: (self.x << local.level) + local.x,
            y: (self.y << local.level) + local.y,
        }
    }
}

impl OctreeCoordinates {
    pub fn new(level: u32, x: u64, y: u64, z: u64) -> Self {
        Self { level, x, y, z }
    }

    /// Child `index` in Morton order (0..8)
    pub fn child(&self, index: u8) -> Self {
        let index = u64::from(index);
        Self {
            level: self.level + 1,
            x: (self.x << 1) + (index & 1),
            y: (self.y << 1) + ((index >> 1) & 1),
            z: (self.z << 1) + ((index >> 2) & 1),
        }
    }

    pub fn children(&self) -> [Self; 8] {
        std::array::from_fn(|i| self.child(i as u8))
    }

    pub fn parent(&self) -> Option<Self> {
        if self.level > 0 {
            Some(Self {
                level: self.level - 1,
                x: self.x >> 1,
                y: self.y >> 1,
                z: self.z >> 1,
            })
        } else {
            None
        }
    }

    pub fn index_in_level(&self) -> u64 {
        morton::encode_3d(self.x, self.y, self.z)
    }

    pub fn index(&self) -> u64 {
        SubdivisionScheme::Octree.node_count(self.level) + self.index_in_level()
    }

    pub fn is_valid(&self) -> bool {
        self.level < 64
            && self.x >> self.level == 0
            && self.y >> self.level == 0
            && self.z >> self.level == 0
    }

    pub fn globalize(&self, local: &Self) -> Self {
        Self {
            level: self.level + local.level,
            x: (self.x << local.level) + local.x,
            y: (self.y << local.level) + local.y,
            z: (self.z << local.level) + local.z,
        }
    }
}

/// Coordinates in either kind of tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeCoordinates {
    Quadtree(QuadtreeCoordinates),
    Octree(OctreeCoordinates),
}

impl TreeCoordinates {
    /// The root node `(0, 0, 0[, 0])`
    pub fn root(scheme: SubdivisionScheme) -> Self {
        match scheme {
            SubdivisionScheme::Quadtree => Self::Quadtree(QuadtreeCoordinates::default()),
            SubdivisionScheme::Octree => Self::Octree(OctreeCoordinates::default()),
        }
    }

    pub fn scheme(&self) -> SubdivisionScheme {
        match self {
            Self::Quadtree(_) => SubdivisionScheme::Quadtree,
            Self::Octree(_) => SubdivisionScheme::Octree,
        }
    }

    pub fn level(&self) -> u32 {
        match self {
            Self::Quadtree(c) => c.level,
            Self::Octree(c) => c.level,
        }
    }

    pub fn x(&self) -> u64 {
        match self {
            Self::Quadtree(c) => c.x,
            Self::Octree(c) => c.x,
        }
    }

    pub fn y(&self) -> u64 {
        match self {
            Self::Quadtree(c) => c.y,
            Self::Octree(c) => c.y,
        }
    }

    /// The z coordinate of octree nodes
    pub fn z(&self) -> Option<u64> {
        match self {
            Self::Quadtree(_) => None,
            Self::Octree(c) => Some(c.z),
        }
    }

    pub fn child_count(&self) -> u8 {
        self.scheme().branching_factor() as u8
    }

    pub fn child(&self, index: u8) -> Self {
        match self {
            Self::Quadtree(c) => Self::Quadtree(c.child(index)),
            Self::Octree(c) => Self::Octree(c.child(index)),
        }
    }

    /// The 4 or 8 children one level down, in Morton order
    pub fn children(&self) -> Children {
        Children {
            parent: *self,
            next: 0,
            end: self.child_count(),
        }
    }

    /// Parent coordinates; `None` at level 0
    pub fn parent(&self) -> Option<Self> {
        match self {
            Self::Quadtree(c) => c.parent().map(Self::Quadtree),
            Self::Octree(c) => c.parent().map(Self::Octree),
        }
    }

    /// This node and all its descendants down to `max_level_inclusive`
    pub fn descendants(&self, max_level_inclusive: u32, order: TraversalOrder) -> Descendants {
        Descendants {
            pending: VecDeque::from([*self]),
            max_level_inclusive,
            order,
        }
    }

    /// Index of this node among all nodes of its tree, levels concatenated
    pub fn to_index(&self) -> u64 {
        match self {
            Self::Quadtree(c) => c.index(),
            Self::Octree(c) => c.index(),
        }
    }

    /// Index of this node among the nodes of its own level
    pub fn to_index_in_level(&self) -> u64 {
        match self {
            Self::Quadtree(c) => c.index_in_level(),
            Self::Octree(c) => c.index_in_level(),
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Self::Quadtree(c) => c.is_valid(),
            Self::Octree(c) => c.is_valid(),
        }
    }

    /// Coordinates of `local`, relative to the subtree rooted at `self`, in
    /// the address space of the whole tree
    pub fn globalize(&self, local: &Self) -> Tiles3dResult<Self> {
        match (self, local) {
            (Self::Quadtree(root), Self::Quadtree(local)) => {
                Ok(Self::Quadtree(root.globalize(local)))
            }
            (Self::Octree(root), Self::Octree(local)) => Ok(Self::Octree(root.globalize(local))),
            _ => Err(Tiles3dError::invalid_input(format!(
                "cannot combine {} coordinates {} with {} coordinates {}",
                self.scheme(),
                self,
                local.scheme(),
                local
            ))),
        }
    }
}

impl fmt::Display for TreeCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quadtree(c) => write!(f, "{}/{}/{}", c.level, c.x, c.y),
            Self::Octree(c) => write!(f, "{}/{}/{}/{}", c.level, c.x, c.y, c.z),
        }
    }
}

/// Iterator over the children of a node
#[derive(Debug, Clone)]
pub struct Children {
    parent: TreeCoordinates,
    next: u8,
    end: u8,
}

impl Iterator for Children {
    type Item = TreeCoordinates;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let child = self.parent.child(self.next);
        self.next += 1;
        Some(child)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::from(self.end - self.next);
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for Children {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        self.end -= 1;
        Some(self.parent.child(self.end))
    }
}

impl ExactSizeIterator for Children {}

impl FusedIterator for Children {}

/// Iterator over a node and its descendants down to a fixed level
#[derive(Debug, Clone)]
pub struct Descendants {
    pending: VecDeque<TreeCoordinates>,
    max_level_inclusive: u32,
    order: TraversalOrder,
}

impl Iterator for Descendants {
    type Item = TreeCoordinates;

    fn next(&mut self) -> Option<Self::Item> {
        let current = match self.order {
            TraversalOrder::DepthFirst => self.pending.pop_back()?,
            TraversalOrder::BreadthFirst => self.pending.pop_front()?,
        };
        if current.level() < self.max_level_inclusive {
            match self.order {
                // reversed so the first child is popped first
                TraversalOrder::DepthFirst => self.pending.extend(current.children().rev()),
                TraversalOrder::BreadthFirst => self.pending.extend(current.children()),
            }
        }
        Some(current)
    }
}

impl FusedIterator for Descendants {}
