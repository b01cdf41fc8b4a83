//! Tileset parsing for 3D Tiles

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Tiles3dError, Tiles3dResult};
use crate::metadata::Schema;
use crate::resolver::{FileResourceResolver, ResourceResolver};
use crate::tile::Tile;

/// Asset metadata for the tileset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TilesetAsset {
    /// 3D Tiles version
    pub version: String,
    /// Application-specific version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tileset_version: Option<String>,
}

/// Properties metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilesetProperties {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

/// Root tileset.json structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TilesetJson {
    pub asset: TilesetAsset,
    /// Geometric error of the tileset
    pub geometric_error: f64,
    pub root: Tile,
    /// Inline metadata schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    /// External metadata schema, relative to the tileset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, TilesetProperties>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions_used: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions_required: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<serde_json::Value>,
}

/// A loaded 3D Tiles tileset
#[derive(Debug, Clone)]
pub struct Tileset {
    /// Base path for resolving relative URIs
    pub base_path: PathBuf,
    /// Parsed tileset.json
    pub json: TilesetJson,
}

impl Tileset {
    /// Load a tileset from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Tiles3dResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let base_path = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        log::debug!("Loaded tileset {} ({} bytes)", path.display(), data.len());
        Self::from_slice(&data, base_path)
    }

    /// Load a tileset from JSON string with a base path
    pub fn from_json(json_str: &str, base_path: PathBuf) -> Tiles3dResult<Self> {
        let json: TilesetJson = serde_json::from_str(json_str)?;
        Ok(Self { base_path, json })
    }

    pub fn from_slice(data: &[u8], base_path: PathBuf) -> Tiles3dResult<Self> {
        let json: TilesetJson = serde_json::from_slice(data)?;
        Ok(Self { base_path, json })
    }

    /// Resolve `uri` with `resolver` and parse it as a tileset
    pub fn from_resolver(resolver: &dyn ResourceResolver, uri: &str) -> Tiles3dResult<Self> {
        let data = resolver
            .resolve_data(uri)
            .ok_or_else(|| Tiles3dError::unavailable("/", uri))?;
        Self::from_slice(&data, PathBuf::from(crate::resolver::uri_directory(uri)))
    }

    /// Get the root tile
    pub fn root(&self) -> &Tile {
        &self.json.root
    }

    /// Get the tileset version
    pub fn version(&self) -> &str {
        &self.json.asset.version
    }

    /// Get the root geometric error
    pub fn geometric_error(&self) -> f64 {
        self.json.geometric_error
    }

    /// Resolver for resources relative to the tileset file
    pub fn resolver(&self) -> FileResourceResolver {
        FileResourceResolver::new(&self.base_path)
    }

    /// The inline schema, or the one `schemaUri` points to
    pub fn resolve_schema(&self, resolver: &dyn ResourceResolver) -> Tiles3dResult<Option<Schema>> {
        if let Some(schema) = &self.json.schema {
            return Ok(Some(schema.clone()));
        }
        let Some(uri) = &self.json.schema_uri else {
            return Ok(None);
        };
        let data = resolver
            .resolve_data(uri)
            .ok_or_else(|| Tiles3dError::unavailable("/schemaUri", uri.as_str()))?;
        let schema =
            serde_json::from_slice(&data).map_err(|e| Tiles3dError::from(e).at("/schemaUri"))?;
        Ok(Some(schema))
    }

    /// Number of explicit tiles
    pub fn tile_count(&self) -> usize {
        self.json.root.count_tiles()
    }

    /// Get list of required extensions
    pub fn required_extensions(&self) -> &[String] {
        self.json.extensions_required.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MemoryResourceResolver;
    use crate::tile::TileRefine;

    #[test]
    fn test_parse_minimal_tileset() {
        let json = r#"{
            "asset": { "version": "1.0" },
            "geometricError": 500.0,
            "root": {
                "boundingVolume": {
                    "sphere": [0.0, 0.0, 0.0, 100.0]
                },
                "geometricError": 100.0,
                "refine": "REPLACE"
            }
        }"#;

        let tileset = Tileset::from_json(json, PathBuf::from(".")).unwrap();
        assert_eq!(tileset.version(), "1.0");
        assert_eq!(tileset.geometric_error(), 500.0);
        assert_eq!(tileset.tile_count(), 1);
        assert_eq!(tileset.root().refine, Some(TileRefine::Replace));
        assert!(tileset.required_extensions().is_empty());
    }

    #[test]
    fn test_parse_tileset_with_children() {
        let json = r#"{
            "asset": { "version": "1.1" },
            "geometricError": 500.0,
            "extensionsRequired": ["3DTILES_bounding_volume_S2"],
            "root": {
                "boundingVolume": { "sphere": [0, 0, 0, 100] },
                "geometricError": 100.0,
                "children": [
                    {
                        "boundingVolume": { "sphere": [-50, 0, 0, 50] },
                        "geometricError": 10.0,
                        "content": { "uri": "tile1.glb" }
                    },
                    {
                        "boundingVolume": { "sphere": [50, 0, 0, 50] },
                        "geometricError": 10.0,
                        "contents": [{ "uri": "tile2.glb" }, { "uri": "tile2.pnts" }]
                    }
                ]
            }
        }"#;

        let tileset = Tileset::from_json(json, PathBuf::from("/data")).unwrap();
        assert_eq!(tileset.tile_count(), 3);
        assert_eq!(tileset.required_extensions(), ["3DTILES_bounding_volume_S2"]);

        let children = &tileset.root().children;
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].contents()[0].uri, "tile1.glb");
        assert_eq!(children[1].contents().len(), 2);
    }

    #[test]
    fn test_resolve_external_schema() {
        let json = r#"{
            "asset": { "version": "1.1" },
            "geometricError": 1.0,
            "schemaUri": "schema/schema.json",
            "root": { "boundingVolume": { "sphere": [0, 0, 0, 1] }, "geometricError": 1.0 }
        }"#;
        let schema = r#"{ "id": "s", "classes": { "tile": { "properties": {} } } }"#;
        let tileset = Tileset::from_json(json, PathBuf::from(".")).unwrap();

        let resolver = MemoryResourceResolver::new().with_entry("schema/schema.json", schema);
        let resolved = tileset.resolve_schema(&resolver).unwrap().unwrap();
        assert_eq!(resolved.id.as_deref(), Some("s"));
        assert!(resolved.classes.contains_key("tile"));

        let missing = tileset.resolve_schema(&MemoryResourceResolver::new());
        assert!(matches!(missing, Err(Tiles3dError::ResourceUnavailable { .. })));
    }

    #[test]
    fn test_from_resolver() {
        let json = r#"{
            "asset": { "version": "1.1" },
            "geometricError": 1.0,
            "root": { "boundingVolume": { "sphere": [0, 0, 0, 1] }, "geometricError": 1.0 }
        }"#;
        let resolver = MemoryResourceResolver::new().with_entry("data/tileset.json", json);
        let tileset = Tileset::from_resolver(&resolver, "data/tileset.json").unwrap();
        assert_eq!(tileset.base_path, PathBuf::from("data/"));
        assert!(Tileset::from_resolver(&resolver, "other.json").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("tileset-load-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tileset.json");
        std::fs::write(
            &path,
            r#"{ "asset": { "version": "1.0" }, "geometricError": 2.0,
                 "root": { "boundingVolume": { "region": [0, 0, 1, 1, 0, 1] },
                           "geometricError": 1.0 } }"#,
        )
        .unwrap();
        let tileset = Tileset::load(&path).unwrap();
        assert_eq!(tileset.base_path, dir);
        assert_eq!(tileset.resolver().base_path(), dir.as_path());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
