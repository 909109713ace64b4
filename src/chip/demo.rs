//! Small synthetic die used when no real layout dataset is available
//!
//! Every register and audio output bit becomes one square node, one row per
//! group. Rows are spread over the upper layers on top of a background
//! plate on layer 0; layer 2 is left empty like on the real die.

use super::data::{ChipData, LayerGeometry, NodeIndex, SegBounds, SegVertex};
use crate::constants::MAX_LAYERS;

/// `(group name, node name prefix, bit count)` in row order
const DEMO_GROUPS: &[(&str, &str, usize)] = &[
    ("a", "a", 8),
    ("x", "x", 8),
    ("y", "y", 8),
    ("sp", "s", 8),
    ("p", "p", 8),
    ("pcl", "pcl", 8),
    ("pch", "pch", 8),
    ("db", "db", 8),
    ("ab", "ab", 16),
    ("sq0", "sq0_out", 4),
    ("sq1", "sq1_out", 4),
    ("tri", "tri_out", 4),
    ("noi", "noi_out", 4),
    ("pcm", "pcm_out", 7),
];

const ROW_LAYERS: [usize; 4] = [1, 3, 4, 5];
const CELL: u16 = 800;
const SQUARE: u16 = 640;
const MARGIN: u16 = 400;

pub const DEMO_VSS: NodeIndex = 2;

pub fn demo_chip() -> ChipData {
    let mut data = ChipData {
        node_names: vec![String::new(), "vcc".to_string(), "vss".to_string()],
        ..Default::default()
    };
    let mut layers: Vec<Vec<SegVertex>> = vec![Vec::new(); MAX_LAYERS];

    let columns = DEMO_GROUPS.iter().map(|&(_, _, bits)| bits).max().unwrap_or(0) as u16;
    let width = 2 * MARGIN + columns * CELL;
    let height = 2 * MARGIN + DEMO_GROUPS.len() as u16 * CELL;
    push_quad(&mut layers[0], 0, 0, width, height, DEMO_VSS);

    for (row, &(group, prefix, bits)) in DEMO_GROUPS.iter().enumerate() {
        let layer = ROW_LAYERS[row % ROW_LAYERS.len()];
        let mut indices = Vec::with_capacity(bits);
        for bit in 0..bits {
            // The status register has no flip-flop behind bit 5
            if group == "p" && bit == 5 {
                indices.push(-1);
                continue;
            }
            let node = data.node_names.len() as NodeIndex;
            data.node_names.push(format!("{}{}", prefix, bit));
            indices.push(i32::from(node));

            // Most significant bit on the left, like a register diagram
            let column = (bits - 1 - bit) as u16;
            let x = MARGIN + column * CELL;
            // Clip space y points up; first group on top
            let y = MARGIN + (DEMO_GROUPS.len() - 1 - row) as u16 * CELL;
            push_quad(&mut layers[layer], x, y, x + SQUARE, y + SQUARE, node);
        }
        data.node_groups.insert(group.to_string(), indices);
    }

    data.layers = layers
        .into_iter()
        .enumerate()
        .map(|(i, vertices)| LayerGeometry::new(format!("Layer {}", i), vertices))
        .collect();
    data.bounds = Some(SegBounds::from_layers(&data.layers));
    data
}

fn push_quad(vertices: &mut Vec<SegVertex>, x0: u16, y0: u16, x1: u16, y1: u16, node: NodeIndex) {
    let corners = [
        SegVertex::new(x0, y0, node),
        SegVertex::new(x1, y0, node),
        SegVertex::new(x1, y1, node),
        SegVertex::new(x0, y1, node),
    ];
    vertices.extend_from_slice(&[corners[0], corners[1], corners[2]]);
    vertices.extend_from_slice(&[corners[2], corners[3], corners[0]]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::NodeRegistry;

    #[test]
    fn test_demo_chip_layout() {
        let data = demo_chip();
        assert_eq!(data.layers.len(), MAX_LAYERS);
        assert!(data.layers[2].is_empty());
        assert_eq!(data.layers[0].vertex_count(), 6);
        assert!(data.layers.iter().all(|l| l.vertex_count() % 3 == 0));

        let registry = NodeRegistry::new(&data);
        assert_eq!(registry.find_node_by_name("a0"), Some(3));
        assert_eq!(registry.cpu_groups().p.get(5), None);
        assert_eq!(registry.cpu_groups().ab.iter().count(), 16);
        assert_eq!(registry.apu_groups().pcm.iter().count(), 7);
    }

    #[test]
    fn test_demo_vertices_reference_named_nodes() {
        let data = demo_chip();
        let registry = NodeRegistry::new(&data);
        for layer in &data.layers[1..] {
            for vertex in &layer.vertices {
                let node = vertex.node_index().map(usize::from);
                assert!(node.and_then(|n| registry.node_name(n)).is_some());
            }
        }
    }
}
