//! Static die dataset: node names, node groups and per-layer geometry
//!
//! The dataset is produced offline from the chip's layout (v6502r's
//! `nodenames`, `nodegroups` and `segdefs` tables) and loaded once at
//! startup. Nothing in here is mutated after loading.

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use crate::constants::{NODE_TEXTURE_HEIGHT, NODE_TEXTURE_WIDTH};

/// Index of a simulated node
pub type NodeIndex = u16;

/// One vertex of pre-triangulated layer geometry
///
/// Positions are normalized to the full `u16` range. The node a vertex
/// belongs to is stored as a texel coordinate into the node texture.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize)]
pub struct SegVertex {
    pub x: u16,
    pub y: u16,
    pub u: i16,
    pub v: i16,
}

impl SegVertex {
    pub fn new(x: u16, y: u16, node: NodeIndex) -> Self {
        let width = NODE_TEXTURE_WIDTH as u16;
        Self {
            x,
            y,
            u: (node % width) as i16,
            v: (node / width) as i16,
        }
    }

    /// Node index encoded in the texel coordinate, `None` when the
    /// coordinate lies outside the node texture
    pub fn node_index(&self) -> Option<NodeIndex> {
        let u = u32::try_from(self.u).ok().filter(|&u| u < NODE_TEXTURE_WIDTH)?;
        let v = u32::try_from(self.v).ok().filter(|&v| v < NODE_TEXTURE_HEIGHT)?;
        NodeIndex::try_from(v * NODE_TEXTURE_WIDTH + u).ok()
    }
}

/// Triangles of a single silicon layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerGeometry {
    #[serde(default)]
    pub name: String,
    pub vertices: Vec<SegVertex>,
}

impl LayerGeometry {
    pub fn new(name: impl Into<String>, vertices: Vec<SegVertex>) -> Self {
        Self {
            name: name.into(),
            vertices,
        }
    }

    /// Decode a raw little-endian `u16` dump of `(x, y, u, v)` quadruples
    pub fn from_le_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        if bytes.len() % std::mem::size_of::<SegVertex>() != 0 {
            bail!(
                "layer geometry is {} bytes, not a multiple of the {}-byte vertex size",
                bytes.len(),
                std::mem::size_of::<SegVertex>()
            );
        }

        let mut cursor = Cursor::new(bytes);
        let mut vertices = Vec::with_capacity(bytes.len() / std::mem::size_of::<SegVertex>());
        while (cursor.position() as usize) < bytes.len() {
            let x = cursor.read_u16::<LittleEndian>()?;
            let y = cursor.read_u16::<LittleEndian>()?;
            let u = cursor.read_i16::<LittleEndian>()?;
            let v = cursor.read_i16::<LittleEndian>()?;
            vertices.push(SegVertex { x, y, u, v });
        }

        let layer = Self::new(name, vertices);
        layer.validate()?;
        Ok(layer)
    }

    /// Check that every vertex points at a texel of the node texture
    pub fn validate(&self) -> Result<()> {
        if let Some((i, vertex)) = self
            .vertices
            .iter()
            .enumerate()
            .find(|(_, vertex)| vertex.node_index().is_none())
        {
            bail!(
                "layer '{}' vertex {} has node texel ({}, {}) outside the {}x{} node texture",
                self.name,
                i,
                vertex.u,
                vertex.v,
                NODE_TEXTURE_WIDTH,
                NODE_TEXTURE_HEIGHT
            );
        }
        Ok(())
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Bounding box of all layer geometry in normalized units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SegBounds {
    pub min_x: u16,
    pub min_y: u16,
    pub max_x: u16,
    pub max_y: u16,
}

impl SegBounds {
    pub fn from_layers(layers: &[LayerGeometry]) -> Self {
        let mut vertices = layers.iter().flat_map(|layer| layer.vertices.iter());
        let Some(first) = vertices.next() else {
            return Self::default();
        };

        vertices.fold(
            Self {
                min_x: first.x,
                min_y: first.y,
                max_x: first.x,
                max_y: first.y,
            },
            |b, v| Self {
                min_x: b.min_x.min(v.x),
                min_y: b.min_y.min(v.y),
                max_x: b.max_x.max(v.x),
                max_y: b.max_y.max(v.y),
            },
        )
    }

    /// Half the extent in shader units, as used by the vertex stage
    pub fn half_size(&self) -> [f32; 2] {
        [
            f32::from(self.max_x >> 1) / 65535.0,
            f32::from(self.max_y >> 1) / 65535.0,
        ]
    }
}

/// The complete die dataset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChipData {
    /// Symbolic name per node index; unnamed nodes hold an empty string
    #[serde(default)]
    pub node_names: Vec<String>,
    /// Bit groups by name, least significant bit first, `-1` for absent bits
    #[serde(default)]
    pub node_groups: BTreeMap<String, Vec<i32>>,
    #[serde(default)]
    pub layers: Vec<LayerGeometry>,
    #[serde(default)]
    pub bounds: Option<SegBounds>,
}

impl ChipData {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut data: ChipData =
            serde_json::from_str(json).context("Failed to parse chip data JSON")?;
        for layer in &data.layers {
            layer.validate()?;
        }
        if data.bounds.is_none() {
            data.bounds = Some(SegBounds::from_layers(&data.layers));
        }
        Ok(data)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read chip data {}", path.display()))?;
        let data = Self::from_json_str(&json)
            .with_context(|| format!("Invalid chip data in {}", path.display()))?;
        log::info!(
            "Loaded chip data from {}: {} node names, {} groups, {} layers",
            path.display(),
            data.node_names.len(),
            data.node_groups.len(),
            data.layers.len()
        );
        Ok(data)
    }

    /// Bounding box, computed from the layers if the dataset carries none
    pub fn bounds(&self) -> SegBounds {
        self.bounds
            .unwrap_or_else(|| SegBounds::from_layers(&self.layers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_node_encoding() {
        let vertex = SegVertex::new(10, 20, 1000);
        assert_eq!(vertex.u, 1000 % 256);
        assert_eq!(vertex.v, 1000 / 256);
        assert_eq!(vertex.node_index(), Some(1000));
        assert_eq!(std::mem::size_of::<SegVertex>(), 8);
    }

    #[test]
    fn test_layer_from_le_bytes() {
        let bytes = [0x34, 0x12, 0x02, 0x00, 0x05, 0x00, 0x01, 0x00];
        let layer = LayerGeometry::from_le_bytes("metal", &bytes).unwrap();
        assert_eq!(layer.vertices.len(), 1);
        assert_eq!(layer.vertices[0].x, 0x1234);
        assert_eq!(layer.vertices[0].y, 2);
        assert_eq!(layer.vertices[0].node_index(), Some(256 + 5));

        assert!(LayerGeometry::from_le_bytes("broken", &bytes[..6]).is_err());
    }

    #[test]
    fn test_out_of_range_texels_are_rejected() {
        let vertex = |u, v| SegVertex { x: 0, y: 0, u, v };
        assert_eq!(vertex(255, 31).node_index(), Some(8191));
        assert_eq!(vertex(0, 300).node_index(), None);
        assert_eq!(vertex(-1, 0).node_index(), None);
        assert_eq!(vertex(256, 0).node_index(), None);

        // u = 5, v = 0x0100
        let bytes = [0x00, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x01];
        assert!(LayerGeometry::from_le_bytes("metal", &bytes).is_err());

        let json = r#"{ "layers": [ { "vertices": [ { "x": 0, "y": 0, "u": 3, "v": -2 } ] } ] }"#;
        assert!(ChipData::from_json_str(json).is_err());
    }

    #[test]
    fn test_bounds_from_layers() {
        let layers = vec![
            LayerGeometry::new("a", vec![SegVertex::new(100, 50, 0), SegVertex::new(300, 10, 1)]),
            LayerGeometry::new("b", vec![SegVertex::new(20, 900, 2)]),
            LayerGeometry::default(),
        ];
        let bounds = SegBounds::from_layers(&layers);
        assert_eq!(
            bounds,
            SegBounds { min_x: 20, min_y: 10, max_x: 300, max_y: 900 }
        );
        assert_eq!(SegBounds::from_layers(&[]), SegBounds::default());
    }

    #[test]
    fn test_json_without_bounds() {
        let json = r#"{
            "node_names": ["", "vcc", "a0"],
            "node_groups": { "a": [2, -1] },
            "layers": [ { "name": "diff", "vertices": [ { "x": 4, "y": 8, "u": 2, "v": 0 } ] } ]
        }"#;
        let data = ChipData::from_json_str(json).unwrap();
        assert_eq!(data.node_names[2], "a0");
        assert_eq!(data.node_groups["a"], vec![2, -1]);
        assert_eq!(data.bounds().max_y, 8);

        assert!(ChipData::from_json_str("{ not json").is_err());
    }
}
