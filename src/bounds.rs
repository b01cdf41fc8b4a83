//! Bounding volume types for 3D Tiles

use std::collections::BTreeMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Extension name of S2 cell bounding volumes
pub const S2_EXTENSION: &str = "3DTILES_bounding_volume_S2";

/// Bounding volume as it appears in tileset JSON
///
/// Exactly one of `box`, `region`, `sphere` or the S2 extension is expected to
/// be populated; [`BoundingVolume::shape`] picks the typed shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingVolume {
    /// 12 numbers: center (3) followed by the x, y and z half-axes (3 each)
    #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<[f64; 12]>,
    /// 6 numbers: west, south, east, north (radians), min and max height (meters)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<[f64; 6]>,
    /// 4 numbers: center (3) and radius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sphere: Option<[f64; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<BTreeMap<String, serde_json::Value>>,
}

/// Typed view of a bounding volume
#[derive(Debug, Clone, PartialEq)]
pub enum BoundingShape {
    /// Oriented bounding box
    Box(BoundingBox),
    /// Geographic region (WGS84)
    Region(BoundingRegion),
    /// Bounding sphere
    Sphere(BoundingSphere),
    /// S2 cell with a height range
    S2(S2Volume),
}

/// Oriented bounding box defined by center and half-axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub center: DVec3,
    /// Half-axis vectors; the box spans `center ± half_axes[i]` along each
    pub half_axes: [DVec3; 3],
}

/// Geographic bounding region in WGS84
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingRegion {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    pub minimum_height: f64,
    pub maximum_height: f64,
}

/// Bounding sphere defined by center and radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

/// S2 cell bounding volume (`3DTILES_bounding_volume_S2`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S2Volume {
    /// Hexadecimal cell token
    pub token: String,
    pub minimum_height: f64,
    pub maximum_height: f64,
}

impl BoundingBox {
    pub fn from_array(data: &[f64; 12]) -> Self {
        Self {
            center: DVec3::new(data[0], data[1], data[2]),
            half_axes: [
                DVec3::new(data[3], data[4], data[5]),
                DVec3::new(data[6], data[7], data[8]),
                DVec3::new(data[9], data[10], data[11]),
            ],
        }
    }

    pub fn to_array(&self) -> [f64; 12] {
        let [x, y, z] = self.half_axes;
        [
            self.center.x, self.center.y, self.center.z,
            x.x, x.y, x.z,
            y.x, y.y, y.z,
            z.x, z.y, z.z,
        ]
    }
}

impl BoundingRegion {
    pub fn from_array(data: &[f64; 6]) -> Self {
        Self {
            west: data[0],
            south: data[1],
            east: data[2],
            north: data[3],
            minimum_height: data[4],
            maximum_height: data[5],
        }
    }

    pub fn to_array(&self) -> [f64; 6] {
        [
            self.west,
            self.south,
            self.east,
            self.north,
            self.minimum_height,
            self.maximum_height,
        ]
    }

    /// Angular width in radians, accounting for regions crossing the antimeridian
    pub fn width(&self) -> f64 {
        let mut east = self.east;
        if east < self.west {
            east += std::f64::consts::TAU;
        }
        east - self.west
    }

    /// Angular height in radians
    pub fn height(&self) -> f64 {
        self.north - self.south
    }
}

impl BoundingSphere {
    pub fn from_array(data: &[f64; 4]) -> Self {
        Self {
            center: DVec3::new(data[0], data[1], data[2]),
            radius: data[3],
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.center.x, self.center.y, self.center.z, self.radius]
    }
}

impl BoundingVolume {
    /// Typed shape of this volume.
    ///
    /// When several fields are populated the box wins over the region, the
    /// region over the S2 extension, and the S2 extension over the sphere.
    pub fn shape(&self) -> Option<BoundingShape> {
        if let Some(data) = &self.bounding_box {
            return Some(BoundingShape::Box(BoundingBox::from_array(data)));
        }
        if let Some(data) = &self.region {
            return Some(BoundingShape::Region(BoundingRegion::from_array(data)));
        }
        if let Some(s2) = self.s2() {
            return Some(BoundingShape::S2(s2));
        }
        self.sphere
            .as_ref()
            .map(|data| BoundingShape::Sphere(BoundingSphere::from_array(data)))
    }

    /// The S2 extension object, if present and well formed
    pub fn s2(&self) -> Option<S2Volume> {
        let value = self.extensions.as_ref()?.get(S2_EXTENSION)?;
        match serde_json::from_value(value.clone()) {
            Ok(s2) => Some(s2),
            Err(e) => {
                log::warn!("Ignoring malformed {} bounding volume: {}", S2_EXTENSION, e);
                None
            }
        }
    }

    /// Replace the populated shape, keeping unrelated extensions
    pub fn set_shape(&mut self, shape: BoundingShape) {
        self.bounding_box = None;
        self.region = None;
        self.sphere = None;
        if let Some(extensions) = &mut self.extensions {
            extensions.remove(S2_EXTENSION);
            if extensions.is_empty() {
                self.extensions = None;
            }
        }
        match shape {
            BoundingShape::Box(b) => self.bounding_box = Some(b.to_array()),
            BoundingShape::Region(r) => self.region = Some(r.to_array()),
            BoundingShape::Sphere(s) => self.sphere = Some(s.to_array()),
            BoundingShape::S2(s2) => {
                let value = serde_json::json!({
                    "token": s2.token,
                    "minimumHeight": s2.minimum_height,
                    "maximumHeight": s2.maximum_height,
                });
                self.extensions
                    .get_or_insert_with(BTreeMap::new)
                    .insert(S2_EXTENSION.to_string(), value);
            }
        }
    }
}

impl From<BoundingShape> for BoundingVolume {
    fn from(shape: BoundingShape) -> Self {
        let mut volume = Self::default();
        volume.set_shape(shape);
        volume
    }
}
