//! Bounding volumes of implicit tiles
//!
//! The volume of a descendant is computed directly from the root volume and
//! the descendant's coordinates, so deep tiles do not accumulate rounding
//! from repeated halving.

use std::f64::consts::{PI, TAU};

use super::coordinates::TreeCoordinates;
use super::hilbert;
use super::s2::{S2CellId, POSITION_BITS};
use crate::bounds::{BoundingBox, BoundingRegion, BoundingShape, BoundingVolume, S2Volume};
use crate::error::{Tiles3dError, Tiles3dResult};

/// Wrap an angle into `[-PI, PI]`
pub fn negative_pi_to_pi(angle: f64) -> f64 {
    if (-PI..=PI).contains(&angle) {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // keep PI for angles that land exactly on the positive boundary
    if wrapped == -PI && angle > 0.0 {
        PI
    } else {
        wrapped
    }
}

/// Whether implicit descendants of `volume` can be derived
pub fn is_subdividable(volume: &BoundingVolume) -> bool {
    matches!(
        volume.shape(),
        Some(BoundingShape::Box(_) | BoundingShape::Region(_) | BoundingShape::S2(_))
    )
}

/// Bounding volume of the tile at `coordinates` below the implicit root `root`
pub fn derive_bounding_volume(
    root: &BoundingVolume,
    coordinates: &TreeCoordinates,
    path: &str,
) -> Tiles3dResult<BoundingVolume> {
    if coordinates.level() == 0 {
        return Ok(root.clone());
    }
    let shape = match root.shape() {
        Some(BoundingShape::Box(b)) => BoundingShape::Box(derive_box(&b, coordinates)),
        Some(BoundingShape::Region(r)) => BoundingShape::Region(derive_region(&r, coordinates)),
        Some(BoundingShape::S2(s2)) => {
            BoundingShape::S2(derive_s2(&s2, coordinates).map_err(|e| e.at(path))?)
        }
        Some(BoundingShape::Sphere(_)) => {
            return Err(Tiles3dError::structural(
                path,
                "bounding spheres cannot be subdivided for implicit tiling",
            ))
        }
        None => {
            return Err(Tiles3dError::structural(
                path,
                "implicit root has no box, region or S2 bounding volume",
            ))
        }
    };

    let mut volume = root.clone();
    volume.set_shape(shape);
    Ok(volume)
}

fn derive_box(root: &BoundingBox, coordinates: &TreeCoordinates) -> BoundingBox {
    let scale = 0.5f64.powi(coordinates.level() as i32);
    let cells = [Some(coordinates.x()), Some(coordinates.y()), coordinates.z()];

    let mut center = root.center;
    let mut half_axes = root.half_axes;
    for (axis, cell) in cells.into_iter().enumerate() {
        // quadtrees keep the full z extent
        let Some(cell) = cell else { continue };
        let model_space = -1.0 + (2.0 * cell as f64 + 1.0) * scale;
        center += root.half_axes[axis] * model_space;
        half_axes[axis] = root.half_axes[axis] * scale;
    }
    BoundingBox { center, half_axes }
}

fn derive_region(root: &BoundingRegion, coordinates: &TreeCoordinates) -> BoundingRegion {
    let scale = 0.5f64.powi(coordinates.level() as i32);
    let width = root.width() * scale;
    let height = root.height() * scale;

    let west = negative_pi_to_pi(root.west + coordinates.x() as f64 * width);
    let east = negative_pi_to_pi(west + width);
    let south = root.south + coordinates.y() as f64 * height;
    let north = south + height;
    let (minimum_height, maximum_height) =
        split_heights(root.minimum_height, root.maximum_height, coordinates, scale);

    BoundingRegion {
        west,
        south,
        east,
        north,
        minimum_height,
        maximum_height,
    }
}

fn derive_s2(root: &S2Volume, coordinates: &TreeCoordinates) -> Tiles3dResult<S2Volume> {
    let level = coordinates.level();
    let root_id = S2CellId::from_token(&root.token)?;
    let face = (root_id.id() >> POSITION_BITS) as u8;

    let (x, y) = if face % 2 == 1 {
        (coordinates.y(), coordinates.x())
    } else {
        (coordinates.x(), coordinates.y())
    };
    let position = hilbert::encode_2d(level, x, y)?;
    let cell = S2CellId::from_face_position_level(face, position, level)?;

    let scale = 0.5f64.powi(level as i32);
    let (minimum_height, maximum_height) =
        split_heights(root.minimum_height, root.maximum_height, coordinates, scale);
    Ok(S2Volume {
        token: cell.to_token(),
        minimum_height,
        maximum_height,
    })
}

/// Height range of an octree node; quadtrees keep the root range.
///
/// Each z bit halves the range selected by the bits above it, which is the
/// slice `z` of `2^level` equal slices.
fn split_heights(
    minimum: f64,
    maximum: f64,
    coordinates: &TreeCoordinates,
    scale: f64,
) -> (f64, f64) {
    match coordinates.z() {
        Some(z) => {
            let slice = (maximum - minimum) * scale;
            let lower = minimum + z as f64 * slice;
            (lower, lower + slice)
        }
        None => (minimum, maximum),
    }
}
