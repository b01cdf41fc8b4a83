//! Subtree resources and their availability
//!
//! A subtree is either a JSON document or a binary `.subtree` container: a
//! 24-byte header, a JSON chunk and a binary chunk. Availability bitstreams
//! live in buffer views over the binary chunk or over external buffers.

use std::collections::{BTreeMap, BTreeSet};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use super::availability::AvailabilityInfo;
use crate::error::{Tiles3dError, Tiles3dResult};
use crate::issues::{IssueKind, IssueSink, ValidationIssue};
use crate::resolver::{uri_directory, ResourceResolver};
use crate::tile::SubdivisionScheme;

/// Magic bytes of binary subtrees
pub const SUBTREE_MAGIC: [u8; 4] = *b"subt";

/// Size of the binary subtree header in bytes
pub const SUBTREE_HEADER_LENGTH: usize = 24;

/// Binary subtree header (24 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SubtreeHeader {
    /// Magic bytes "subt"
    pub magic: [u8; 4],
    /// Version (should be 1)
    pub version: u32,
    /// Length of the JSON chunk, including padding
    pub json_byte_length: u64,
    /// Length of the binary chunk, including padding
    pub binary_byte_length: u64,
}

/// Subtree JSON document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtree {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<Buffer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffer_views: Vec<BufferView>,
    pub tile_availability: Availability,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_availability: Vec<Availability>,
    pub child_subtree_availability: Availability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_tables: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_metadata: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_metadata: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtree_metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    /// External buffer location; absent for the binary chunk of a `.subtree`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub byte_length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: u64,
    pub byte_length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Availability as declared in the subtree JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    /// Buffer view holding the bitstream
    #[serde(default, alias = "bufferView", skip_serializing_if = "Option::is_none")]
    pub bitstream: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_count: Option<u64>,
    /// 0 when nothing is available, 1 when everything is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<u8>,
}

/// Split a subtree resource into its JSON document and binary chunk
pub fn parse_subtree<'d>(
    data: &'d [u8],
    path: &str,
) -> Tiles3dResult<(Subtree, Option<&'d [u8]>)> {
    if data.starts_with(&SUBTREE_MAGIC) {
        return parse_binary_subtree(data, path);
    }
    match data.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') | Some(b'[') => {
            let subtree = serde_json::from_slice(data).map_err(|e| Tiles3dError::from(e).at(path))?;
            Ok((subtree, None))
        }
        _ => Err(Tiles3dError::structural(
            path,
            "subtree data is neither JSON nor a binary subtree",
        )),
    }
}

fn parse_binary_subtree<'d>(
    data: &'d [u8],
    path: &str,
) -> Tiles3dResult<(Subtree, Option<&'d [u8]>)> {
    if data.len() < SUBTREE_HEADER_LENGTH {
        return Err(Tiles3dError::structural(
            path,
            format!("binary subtree has {} bytes, too small for its header", data.len()),
        ));
    }
    let header: SubtreeHeader = bytemuck::pod_read_unaligned(&data[..SUBTREE_HEADER_LENGTH]);
    if header.version != 1 {
        return Err(Tiles3dError::structural(
            path,
            format!("unsupported binary subtree version {}", header.version),
        ));
    }

    let json_start = SUBTREE_HEADER_LENGTH as u64;
    let json_end = json_start.checked_add(header.json_byte_length);
    let binary_end = json_end.and_then(|end| end.checked_add(header.binary_byte_length));
    let (json_end, binary_end) = match (json_end, binary_end) {
        (Some(json_end), Some(binary_end)) if binary_end <= data.len() as u64 => {
            (json_end, binary_end)
        }
        _ => {
            return Err(Tiles3dError::structural(
                path,
                format!(
                    "binary subtree declares JSON and binary chunks of {} and {} bytes, \
                     but has {} bytes after its header",
                    header.json_byte_length,
                    header.binary_byte_length,
                    data.len() - SUBTREE_HEADER_LENGTH
                ),
            ))
        }
    };

    let json = &data[json_start as usize..json_end as usize];
    // padding may be spaces or zeros
    let trimmed_len = json
        .iter()
        .rposition(|b| *b != 0 && !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    let subtree: Subtree =
        serde_json::from_slice(&json[..trimmed_len]).map_err(|e| Tiles3dError::from(e).at(path))?;

    let binary = if header.binary_byte_length > 0 {
        Some(&data[json_end as usize..binary_end as usize])
    } else {
        None
    };
    Ok((subtree, binary))
}

/// Resolved availability of one subtree
#[derive(Debug, Clone)]
pub struct SubtreeInfo {
    subtree: Subtree,
    tile_availability: AvailabilityInfo,
    content_availability: Vec<AvailabilityInfo>,
    child_subtree_availability: AvailabilityInfo,
}

impl SubtreeInfo {
    /// Resolve and decode the subtree at `uri`
    ///
    /// External buffers are resolved relative to the subtree's own location.
    pub fn load(
        resolver: &dyn ResourceResolver,
        uri: &str,
        scheme: SubdivisionScheme,
        subtree_levels: u32,
        path: &str,
        issues: &dyn IssueSink,
    ) -> Tiles3dResult<Self> {
        let data = resolver
            .resolve_data(uri)
            .ok_or_else(|| Tiles3dError::unavailable(path, uri))?;
        log::debug!("Loaded subtree {} ({} bytes) for {}", uri, data.len(), path);
        let buffer_resolver = resolver.derive(uri_directory(uri));
        Self::from_bytes(&data, buffer_resolver.as_ref(), scheme, subtree_levels, path, issues)
    }

    pub fn from_bytes(
        data: &[u8],
        buffer_resolver: &dyn ResourceResolver,
        scheme: SubdivisionScheme,
        subtree_levels: u32,
        path: &str,
        issues: &dyn IssueSink,
    ) -> Tiles3dResult<Self> {
        let (subtree, binary) = parse_subtree(data, path)?;
        Self::from_subtree(subtree, binary, buffer_resolver, scheme, subtree_levels, path, issues)
    }

    pub fn from_subtree(
        subtree: Subtree,
        binary: Option<&[u8]>,
        buffer_resolver: &dyn ResourceResolver,
        scheme: SubdivisionScheme,
        subtree_levels: u32,
        path: &str,
        issues: &dyn IssueSink,
    ) -> Tiles3dResult<Self> {
        if subtree_levels == 0 || subtree_levels > scheme.max_levels() {
            return Err(Tiles3dError::structural(
                path,
                format!(
                    "subtreeLevels must be in 1..={} for {}, found {}",
                    scheme.max_levels(),
                    scheme,
                    subtree_levels
                ),
            ));
        }
        let buffers = resolve_buffers(&subtree, binary, buffer_resolver, path)?;
        let node_count = scheme.node_count(subtree_levels);
        let child_count = scheme.level_node_count(subtree_levels);

        let decode = |availability: &Availability, length: u64, what: &str| {
            decode_availability(&subtree, &buffers, availability, length, what, path, issues)
        };

        let tile_availability = decode(&subtree.tile_availability, node_count, "tileAvailability")?;
        let content_availability = subtree
            .content_availability
            .iter()
            .enumerate()
            .map(|(i, a)| decode(a, node_count, &format!("contentAvailability[{}]", i)))
            .collect::<Tiles3dResult<Vec<_>>>()?;
        let child_subtree_availability = decode(
            &subtree.child_subtree_availability,
            child_count,
            "childSubtreeAvailability",
        )?;

        log::debug!(
            "Subtree at {}: {} of {} tiles, {} content layers, {} of {} child subtrees",
            path,
            tile_availability.available_count(),
            node_count,
            content_availability.len(),
            child_subtree_availability.available_count(),
            child_count
        );

        Ok(Self {
            subtree,
            tile_availability,
            content_availability,
            child_subtree_availability,
        })
    }

    /// The subtree JSON, for metadata consumers
    pub fn subtree(&self) -> &Subtree {
        &self.subtree
    }

    pub fn tile_availability(&self) -> &AvailabilityInfo {
        &self.tile_availability
    }

    /// Availability of the content at `index` in the tile's content list
    pub fn content_availability(&self, index: usize) -> Option<&AvailabilityInfo> {
        self.content_availability.get(index)
    }

    pub fn content_availability_count(&self) -> usize {
        self.content_availability.len()
    }

    pub fn child_subtree_availability(&self) -> &AvailabilityInfo {
        &self.child_subtree_availability
    }
}

/// Load the buffers referenced by availability bitstreams
fn resolve_buffers(
    subtree: &Subtree,
    binary: Option<&[u8]>,
    resolver: &dyn ResourceResolver,
    path: &str,
) -> Tiles3dResult<BTreeMap<usize, Vec<u8>>> {
    let referenced: BTreeSet<usize> = std::iter::once(&subtree.tile_availability)
        .chain(subtree.content_availability.iter())
        .chain(std::iter::once(&subtree.child_subtree_availability))
        .filter_map(|a| a.bitstream)
        .map(|view| {
            subtree
                .buffer_views
                .get(view)
                .map(|v| v.buffer)
                .ok_or_else(|| {
                    Tiles3dError::structural(
                        path,
                        format!("bitstream refers to missing buffer view {}", view),
                    )
                })
        })
        .collect::<Tiles3dResult<_>>()?;

    let mut buffers = BTreeMap::new();
    for index in referenced {
        let buffer = subtree.buffers.get(index).ok_or_else(|| {
            Tiles3dError::structural(
                path,
                format!("buffer view refers to missing buffer {}", index),
            )
        })?;
        let data = match &buffer.uri {
            Some(uri) => resolver
                .resolve_data(uri)
                .ok_or_else(|| Tiles3dError::unavailable(path, uri.as_str()))?,
            None => {
                if index != 0 {
                    return Err(Tiles3dError::structural(
                        path,
                        format!(
                            "buffer {} has no uri; only buffer 0 may refer to the binary chunk",
                            index
                        ),
                    ));
                }
                binary
                    .ok_or_else(|| {
                        Tiles3dError::structural(
                            path,
                            "buffer 0 has no uri and the subtree has no binary chunk",
                        )
                    })?
                    .to_vec()
            }
        };
        if (data.len() as u64) < buffer.byte_length {
            return Err(Tiles3dError::structural(
                path,
                format!(
                    "buffer {} has {} bytes, but declares byteLength {}",
                    index,
                    data.len(),
                    buffer.byte_length
                ),
            ));
        }
        buffers.insert(index, data);
    }
    Ok(buffers)
}

fn decode_availability(
    subtree: &Subtree,
    buffers: &BTreeMap<usize, Vec<u8>>,
    availability: &Availability,
    length: u64,
    what: &str,
    path: &str,
    issues: &dyn IssueSink,
) -> Tiles3dResult<AvailabilityInfo> {
    let info = match (availability.bitstream, availability.constant) {
        (Some(_), Some(_)) => {
            return Err(Tiles3dError::structural(
                path,
                format!("{} defines both 'bitstream' and 'constant'", what),
            ))
        }
        (None, None) => {
            return Err(Tiles3dError::structural(
                path,
                format!("{} defines neither 'bitstream' nor 'constant'", what),
            ))
        }
        (None, Some(constant)) => match constant {
            0 => AvailabilityInfo::constant(false, length),
            1 => AvailabilityInfo::constant(true, length),
            other => {
                return Err(Tiles3dError::structural(
                    path,
                    format!("{} constant must be 0 or 1, found {}", what, other),
                ))
            }
        },
        (Some(view_index), None) => {
            let bytes = buffer_view_bytes(subtree, buffers, view_index, path)?;
            AvailabilityInfo::bitstream(bytes.to_vec(), length, path)?
        }
    };

    if let Some(declared) = availability.available_count {
        let actual = info.available_count();
        if declared != actual {
            issues.add_issue(ValidationIssue::new(
                IssueKind::AvailableCountMismatch,
                path,
                format!(
                    "{} declares availableCount {}, but {} are available",
                    what, declared, actual
                ),
            ));
        }
    }
    Ok(info)
}

fn buffer_view_bytes<'b>(
    subtree: &Subtree,
    buffers: &'b BTreeMap<usize, Vec<u8>>,
    view_index: usize,
    path: &str,
) -> Tiles3dResult<&'b [u8]> {
    let view = subtree.buffer_views.get(view_index).ok_or_else(|| {
        Tiles3dError::structural(path, format!("missing buffer view {}", view_index))
    })?;
    let data = buffers.get(&view.buffer).ok_or_else(|| {
        Tiles3dError::structural(path, format!("missing buffer {}", view.buffer))
    })?;
    let declared = subtree
        .buffers
        .get(view.buffer)
        .map_or(data.len() as u64, |buffer| buffer.byte_length);
    let end = match view.byte_offset.checked_add(view.byte_length) {
        Some(end) if end <= declared && end <= data.len() as u64 => end,
        _ => {
            return Err(Tiles3dError::structural(
                path,
                format!(
                    "buffer view {} (byteOffset {}, byteLength {}) exceeds buffer {} of {} bytes",
                    view_index,
                    view.byte_offset,
                    view.byte_length,
                    view.buffer,
                    declared.min(data.len() as u64)
                ),
            ))
        }
    };
    Ok(&data[view.byte_offset as usize..end as usize])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::IssueCollector;
    use crate::resolver::MemoryResourceResolver;

    fn binary_subtree(json: &str, binary: &[u8]) -> Vec<u8> {
        let mut json = json.as_bytes().to_vec();
        while json.len() % 8 != 0 {
            json.push(b' ');
        }
        let mut bin = binary.to_vec();
        while bin.len() % 8 != 0 {
            bin.push(0);
        }
        let header = SubtreeHeader {
            magic: SUBTREE_MAGIC,
            version: 1,
            json_byte_length: json.len() as u64,
            binary_byte_length: bin.len() as u64,
        };
        let mut out = bytemuck::bytes_of(&header).to_vec();
        out.extend_from_slice(&json);
        out.extend_from_slice(&bin);
        out
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(std::mem::size_of::<SubtreeHeader>(), SUBTREE_HEADER_LENGTH);
    }

    #[test]
    fn test_constant_json_subtree() {
        let json = r#" {
            "tileAvailability": { "constant": 1 },
            "contentAvailability": [{ "constant": 0 }],
            "childSubtreeAvailability": { "constant": 0 }
        }"#;
        let issues = IssueCollector::new();
        let info = SubtreeInfo::from_bytes(
            json.as_bytes(),
            &MemoryResourceResolver::new(),
            SubdivisionScheme::Quadtree,
            2,
            "/root",
            &issues,
        )
        .unwrap();
        assert_eq!(info.tile_availability().len(), 5);
        assert!(info.tile_availability().is_available(4));
        assert_eq!(info.content_availability_count(), 1);
        assert!(!info.content_availability(0).unwrap().is_available(0));
        assert_eq!(info.child_subtree_availability().len(), 16);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_binary_subtree_internal_buffer() {
        let json = r#"{
            "buffers": [{ "byteLength": 2 }],
            "bufferViews": [
                { "buffer": 0, "byteOffset": 0, "byteLength": 1 },
                { "buffer": 0, "byteOffset": 1, "byteLength": 1 }
            ],
            "tileAvailability": { "bitstream": 0, "availableCount": 1 },
            "childSubtreeAvailability": { "bitstream": 1, "availableCount": 1 }
        }"#;
        let data = binary_subtree(json, &[0b0000_0001, 0b0000_0100]);
        let issues = IssueCollector::new();
        let info = SubtreeInfo::from_bytes(
            &data,
            &MemoryResourceResolver::new(),
            SubdivisionScheme::Quadtree,
            1,
            "/root",
            &issues,
        )
        .unwrap();
        assert!(info.tile_availability().is_available(0));
        let children: Vec<bool> = (0..4)
            .map(|i| info.child_subtree_availability().is_available(i))
            .collect();
        assert_eq!(children, vec![false, false, true, false]);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_external_buffer_and_count_mismatch() {
        let json = r#"{
            "buffers": [{ "uri": "../buffers/availability.bin", "byteLength": 1 }],
            "bufferViews": [{ "buffer": 0, "byteLength": 1 }],
            "tileAvailability": { "bufferView": 0, "availableCount": 5 },
            "childSubtreeAvailability": { "constant": 0 }
        }"#;
        let resolver = MemoryResourceResolver::new()
            .with_entry("subtrees/0.0.0.json", json.as_bytes().to_vec())
            .with_entry("buffers/availability.bin", vec![0b0001_0011]);
        let issues = IssueCollector::new();
        let info = SubtreeInfo::load(
            &resolver,
            "subtrees/0.0.0.json",
            SubdivisionScheme::Quadtree,
            2,
            "/root",
            &issues,
        )
        .unwrap();
        assert_eq!(info.tile_availability().available_count(), 3);
        assert_eq!(issues.count_of(IssueKind::AvailableCountMismatch), 1);
    }

    #[test]
    fn test_bitstream_length_must_match() {
        let json = r#"{
            "buffers": [{ "byteLength": 8 }],
            "bufferViews": [{ "buffer": 0, "byteLength": 8 }],
            "tileAvailability": { "bitstream": 0 },
            "childSubtreeAvailability": { "constant": 0 }
        }"#;
        let data = binary_subtree(json, &[0xFF; 8]);
        let result = SubtreeInfo::from_bytes(
            &data,
            &MemoryResourceResolver::new(),
            SubdivisionScheme::Quadtree,
            2,
            "/root/[implicit]",
            &IssueCollector::new(),
        );
        assert!(matches!(result, Err(Tiles3dError::Structural { .. })));
    }

    #[test]
    fn test_structural_errors() {
        let both = r#"{ "tileAvailability": { "constant": 1, "bitstream": 0 },
                        "childSubtreeAvailability": { "constant": 0 } }"#;
        let neither = r#"{ "tileAvailability": {},
                           "childSubtreeAvailability": { "constant": 0 } }"#;
        let bad_constant = r#"{ "tileAvailability": { "constant": 2 },
                                "childSubtreeAvailability": { "constant": 0 } }"#;
        for json in [both, neither, bad_constant] {
            let result = SubtreeInfo::from_bytes(
                json.as_bytes(),
                &MemoryResourceResolver::new(),
                SubdivisionScheme::Octree,
                1,
                "/root",
                &IssueCollector::new(),
            );
            assert!(result.is_err(), "{}", json);
        }

        assert!(parse_subtree(b"glTF....", "/root").is_err());
        assert!(parse_subtree(b"subt", "/root").is_err());
    }

    fn decode_quadtree(data: &[u8]) -> Tiles3dResult<SubtreeInfo> {
        SubtreeInfo::from_bytes(
            data,
            &MemoryResourceResolver::new(),
            SubdivisionScheme::Quadtree,
            1,
            "/root",
            &IssueCollector::new(),
        )
    }

    #[test]
    fn test_oversized_chunk_lengths_are_structural() {
        let json = r#"{ "tileAvailability": { "constant": 1 },
                        "childSubtreeAvailability": { "constant": 0 } }"#;
        let valid = binary_subtree(json, &[]);
        assert!(decode_quadtree(&valid).is_ok());

        let mut huge_json = valid.clone();
        huge_json[8..16].copy_from_slice(&(u64::MAX - 10).to_le_bytes());
        let mut huge_binary = valid.clone();
        huge_binary[16..24].copy_from_slice(&u64::MAX.to_le_bytes());
        let mut truncated = valid.clone();
        truncated[16..24].copy_from_slice(&1000u64.to_le_bytes());

        for data in [huge_json, huge_binary, truncated] {
            assert!(matches!(
                parse_subtree(&data, "/root"),
                Err(Tiles3dError::Structural { .. })
            ));
        }
    }

    #[test]
    fn test_buffer_view_out_of_range_is_structural() {
        let view = |offset: &str, length: u64| {
            let json = format!(
                r#"{{
                    "buffers": [{{ "byteLength": 2 }}],
                    "bufferViews": [{{ "buffer": 0, "byteOffset": {}, "byteLength": {} }}],
                    "tileAvailability": {{ "bitstream": 0 }},
                    "childSubtreeAvailability": {{ "constant": 0 }}
                }}"#,
                offset, length
            );
            decode_quadtree(&binary_subtree(&json, &[1, 1]))
        };
        assert!(view("1", 1).is_ok());
        // inside the padded chunk but past the declared byteLength
        assert!(matches!(view("2", 1), Err(Tiles3dError::Structural { .. })));
        assert!(matches!(view("9", 1), Err(Tiles3dError::Structural { .. })));
        assert!(matches!(
            view(&u64::MAX.to_string(), 2),
            Err(Tiles3dError::Structural { .. })
        ));
    }

    #[test]
    fn test_subtree_levels_out_of_range() {
        let json = r#"{ "tileAvailability": { "constant": 1 },
                        "childSubtreeAvailability": { "constant": 0 } }"#;
        for (scheme, levels) in [
            (SubdivisionScheme::Quadtree, 0),
            (SubdivisionScheme::Quadtree, 32),
            (SubdivisionScheme::Octree, 22),
        ] {
            let result = SubtreeInfo::from_bytes(
                json.as_bytes(),
                &MemoryResourceResolver::new(),
                scheme,
                levels,
                "/root",
                &IssueCollector::new(),
            );
            assert!(matches!(result, Err(Tiles3dError::Structural { .. })));
        }
    }

    #[test]
    fn test_missing_subtree_is_unavailable() {
        let result = SubtreeInfo::load(
            &MemoryResourceResolver::new(),
            "missing.subtree",
            SubdivisionScheme::Quadtree,
            1,
            "/root",
            &IssueCollector::new(),
        );
        assert!(matches!(result, Err(Tiles3dError::ResourceUnavailable { .. })));
    }
}
