//! Metadata entities and semantic overrides
//!
//! Only the part of the metadata model that traversal consumes lives here: a
//! schema whose class properties may carry a `semantic`, tile metadata
//! entities, and the overrides that well-known tile semantics apply to a tile.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bounds::{S2Volume, S2_EXTENSION};
use crate::error::{Tiles3dError, Tiles3dResult};
use crate::implicit::s2::S2CellId;
use crate::tile::{Tile, TileRefine};

pub const TILE_BOUNDING_BOX: &str = "TILE_BOUNDING_BOX";
pub const TILE_BOUNDING_REGION: &str = "TILE_BOUNDING_REGION";
pub const TILE_BOUNDING_SPHERE: &str = "TILE_BOUNDING_SPHERE";
pub const TILE_BOUNDING_S2_CELL: &str = "TILE_BOUNDING_S2_CELL";
pub const TILE_MINIMUM_HEIGHT: &str = "TILE_MINIMUM_HEIGHT";
pub const TILE_MAXIMUM_HEIGHT: &str = "TILE_MAXIMUM_HEIGHT";
pub const TILE_GEOMETRIC_ERROR: &str = "TILE_GEOMETRIC_ERROR";
pub const TILE_REFINE: &str = "TILE_REFINE";
pub const TILE_TRANSFORM: &str = "TILE_TRANSFORM";

/// Metadata schema (the subset needed to look properties up by semantic)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub classes: BTreeMap<String, MetadataClass>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataClass {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, ClassProperty>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassProperty {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<String>,
    /// Value used when an entity omits the property
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Metadata attached to a tile or content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntity {
    pub class: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

/// Access to the property values of one metadata entity
pub trait MetadataEntityModel {
    fn property_value_by_semantic(&self, semantic: &str) -> Option<Value>;
}

/// Entity model over a JSON metadata entity and its schema class
#[derive(Debug, Clone, Copy)]
pub struct JsonMetadataEntityModel<'a> {
    class: &'a MetadataClass,
    entity: &'a MetadataEntity,
}

impl<'a> JsonMetadataEntityModel<'a> {
    pub fn new(schema: &'a Schema, entity: &'a MetadataEntity, path: &str) -> Tiles3dResult<Self> {
        let class = schema.classes.get(&entity.class).ok_or_else(|| {
            Tiles3dError::structural(
                path,
                format!("metadata class '{}' is not defined in the schema", entity.class),
            )
        })?;
        Ok(Self { class, entity })
    }
}

impl MetadataEntityModel for JsonMetadataEntityModel<'_> {
    fn property_value_by_semantic(&self, semantic: &str) -> Option<Value> {
        let (name, property) = self
            .class
            .properties
            .iter()
            .find(|(_, p)| p.semantic.as_deref() == Some(semantic))?;
        self.entity
            .properties
            .get(name)
            .or(property.default.as_ref())
            .cloned()
    }
}

fn number_array<const N: usize>(
    value: &Value,
    semantic: &str,
    path: &str,
) -> Tiles3dResult<[f64; N]> {
    let invalid = || {
        Tiles3dError::structural(
            path,
            format!("{} must be an array of {} numbers", semantic, N),
        )
    };
    let items = value.as_array().ok_or_else(invalid)?;
    if items.len() != N {
        return Err(invalid());
    }
    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item.as_f64().ok_or_else(invalid)?;
    }
    Ok(out)
}

fn number(value: &Value, semantic: &str, path: &str) -> Tiles3dResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| Tiles3dError::structural(path, format!("{} must be a number", semantic)))
}

fn cell_id(value: &Value, path: &str) -> Tiles3dResult<S2CellId> {
    let id = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse::<u64>().ok(),
        _ => None,
    };
    id.map(S2CellId::new).ok_or_else(|| {
        Tiles3dError::structural(
            path,
            format!("{} must be a 64-bit cell id", TILE_BOUNDING_S2_CELL),
        )
    })
}

/// Apply tile metadata semantics to a tile snapshot
///
/// Values that are absent from the entity leave the tile unchanged.
pub fn apply_tile_overrides(
    tile: &mut Tile,
    model: &dyn MetadataEntityModel,
    path: &str,
) -> Tiles3dResult<()> {
    if let Some(value) = model.property_value_by_semantic(TILE_BOUNDING_BOX) {
        tile.bounding_volume.bounding_box = Some(number_array(&value, TILE_BOUNDING_BOX, path)?);
    }
    if let Some(value) = model.property_value_by_semantic(TILE_BOUNDING_REGION) {
        tile.bounding_volume.region = Some(number_array(&value, TILE_BOUNDING_REGION, path)?);
    }
    if let Some(value) = model.property_value_by_semantic(TILE_BOUNDING_SPHERE) {
        tile.bounding_volume.sphere = Some(number_array(&value, TILE_BOUNDING_SPHERE, path)?);
    }

    let minimum_height = model
        .property_value_by_semantic(TILE_MINIMUM_HEIGHT)
        .map(|v| number(&v, TILE_MINIMUM_HEIGHT, path))
        .transpose()?;
    let maximum_height = model
        .property_value_by_semantic(TILE_MAXIMUM_HEIGHT)
        .map(|v| number(&v, TILE_MAXIMUM_HEIGHT, path))
        .transpose()?;

    if let Some(value) = model.property_value_by_semantic(TILE_BOUNDING_S2_CELL) {
        let id = cell_id(&value, path)?;
        let previous = tile.bounding_volume.s2();
        let s2 = S2Volume {
            token: id.to_token(),
            minimum_height: previous.as_ref().map_or(0.0, |p| p.minimum_height),
            maximum_height: previous.as_ref().map_or(0.0, |p| p.maximum_height),
        };
        tile.bounding_volume
            .extensions
            .get_or_insert_with(BTreeMap::new)
            .insert(S2_EXTENSION.to_string(), serde_json::to_value(&s2)?);
    }

    if minimum_height.is_some() || maximum_height.is_some() {
        if let Some(region) = &mut tile.bounding_volume.region {
            region[4] = minimum_height.unwrap_or(region[4]);
            region[5] = maximum_height.unwrap_or(region[5]);
        }
        if let Some(mut s2) = tile.bounding_volume.s2() {
            s2.minimum_height = minimum_height.unwrap_or(s2.minimum_height);
            s2.maximum_height = maximum_height.unwrap_or(s2.maximum_height);
            if let Some(extensions) = &mut tile.bounding_volume.extensions {
                extensions.insert(S2_EXTENSION.to_string(), serde_json::to_value(&s2)?);
            }
        }
    }

    if let Some(value) = model.property_value_by_semantic(TILE_GEOMETRIC_ERROR) {
        tile.geometric_error = number(&value, TILE_GEOMETRIC_ERROR, path)?;
    }
    if let Some(value) = model.property_value_by_semantic(TILE_REFINE) {
        tile.refine = match value.as_u64() {
            Some(0) => Some(TileRefine::Add),
            Some(1) => Some(TileRefine::Replace),
            _ => {
                return Err(Tiles3dError::structural(
                    path,
                    format!("{} must be 0 (ADD) or 1 (REPLACE), found {}", TILE_REFINE, value),
                ))
            }
        };
    }
    if let Some(value) = model.property_value_by_semantic(TILE_TRANSFORM) {
        tile.transform = Some(number_array(&value, TILE_TRANSFORM, path)?);
    }
    Ok(())
}
