//! Implicit tiling: tree coordinates, subtree availability, template URIs
//! and bounding volume derivation

pub mod availability;
pub mod coordinates;
pub mod derivation;
pub mod hilbert;
pub mod morton;
pub mod s2;
pub mod subtree;
pub mod template;

pub use availability::AvailabilityInfo;
pub use coordinates::{OctreeCoordinates, QuadtreeCoordinates, TreeCoordinates};
pub use derivation::derive_bounding_volume;
pub use s2::S2CellId;
pub use subtree::{Subtree, SubtreeInfo};
pub use template::substitute;
