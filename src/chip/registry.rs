//! Node name lookup and pre-resolved register bit groups
//!
//! Built once from a [`ChipData`] and read-only afterwards.

use fnv::FnvHashMap;

use super::data::{ChipData, NodeIndex};
use crate::constants::MAX_NODES;

/// Node indices of one multi-bit signal, least significant bit first
///
/// A bit without a physical node is `None` and is skipped by every
/// consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeGroup<const N: usize> {
    bits: [Option<NodeIndex>; N],
}

impl<const N: usize> NodeGroup<N> {
    /// Group where no bit has a node
    pub fn absent() -> Self {
        Self { bits: [None; N] }
    }

    /// Resolve a raw table entry; negative or out-of-range indices become `None`
    pub fn from_raw(raw: &[i32]) -> Self {
        let mut bits = [None; N];
        for (slot, &index) in bits.iter_mut().zip(raw) {
            if index >= 0 && (index as usize) < MAX_NODES {
                *slot = Some(index as NodeIndex);
            }
        }
        Self { bits }
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Node for a bit position, `None` when absent or out of range
    pub fn get(&self, bit: usize) -> Option<NodeIndex> {
        self.bits.get(bit).copied().flatten()
    }

    /// `(bit, node)` pairs for every bit that has a node
    pub fn iter(&self) -> impl Iterator<Item = (usize, NodeIndex)> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(bit, node)| node.map(|node| (bit, node)))
    }
}

impl<const N: usize> Default for NodeGroup<N> {
    fn default() -> Self {
        Self::absent()
    }
}

/// Register and bus groups of the CPU core
#[derive(Debug, Clone, Default)]
pub struct CpuGroups {
    pub a: NodeGroup<8>,
    pub x: NodeGroup<8>,
    pub y: NodeGroup<8>,
    pub sp: NodeGroup<8>,
    pub p: NodeGroup<8>,
    pub pcl: NodeGroup<8>,
    pub pch: NodeGroup<8>,
    pub db: NodeGroup<8>,
    pub ab: NodeGroup<16>,
}

/// Output groups of the audio channels
#[derive(Debug, Clone, Default)]
pub struct ApuGroups {
    pub sq0: NodeGroup<4>,
    pub sq1: NodeGroup<4>,
    pub tri: NodeGroup<4>,
    pub noi: NodeGroup<4>,
    pub pcm: NodeGroup<7>,
}

/// Maps symbolic node names to indices and owns the resolved groups
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    names: Vec<String>,
    index_by_name: FnvHashMap<String, NodeIndex>,
    cpu: CpuGroups,
    apu: ApuGroups,
}

impl NodeRegistry {
    pub fn new(data: &ChipData) -> Self {
        let mut index_by_name = FnvHashMap::default();
        for (index, name) in data.node_names.iter().enumerate() {
            if name.is_empty() {
                continue;
            }
            // Duplicate names keep the last index
            if let Ok(index) = NodeIndex::try_from(index) {
                index_by_name.insert(name.clone(), index);
            }
        }

        let cpu = CpuGroups {
            a: resolve_group(data, "a"),
            x: resolve_group(data, "x"),
            y: resolve_group(data, "y"),
            sp: resolve_group(data, "sp"),
            p: resolve_group(data, "p"),
            pcl: resolve_group(data, "pcl"),
            pch: resolve_group(data, "pch"),
            db: resolve_group(data, "db"),
            ab: resolve_group(data, "ab"),
        };

        let apu = ApuGroups {
            sq0: resolve_group(data, "sq0"),
            sq1: resolve_group(data, "sq1"),
            tri: resolve_group(data, "tri"),
            noi: resolve_group(data, "noi"),
            pcm: resolve_group(data, "pcm"),
        };

        log::info!(
            "Node registry built: {} node slots, {} named nodes",
            data.node_names.len(),
            index_by_name.len()
        );

        Self {
            names: data.node_names.clone(),
            index_by_name,
            cpu,
            apu,
        }
    }

    pub fn find_node_by_name(&self, name: &str) -> Option<NodeIndex> {
        self.index_by_name.get(name).copied()
    }

    /// Symbolic name of a node, `None` for unnamed or unknown indices
    pub fn node_name(&self, index: usize) -> Option<&str> {
        self.names
            .get(index)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn named_node_count(&self) -> usize {
        self.index_by_name.len()
    }

    pub fn cpu_groups(&self) -> &CpuGroups {
        &self.cpu
    }

    pub fn apu_groups(&self) -> &ApuGroups {
        &self.apu
    }
}

fn resolve_group<const N: usize>(data: &ChipData, name: &str) -> NodeGroup<N> {
    match data.node_groups.get(name) {
        Some(raw) => {
            if raw.len() != N {
                log::warn!(
                    "Node group '{}' has {} entries, expected {}",
                    name,
                    raw.len(),
                    N
                );
            }
            NodeGroup::from_raw(raw)
        }
        None => {
            log::warn!("Node group '{}' missing from chip data", name);
            NodeGroup::absent()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> ChipData {
        let mut data = ChipData::default();
        data.node_names = vec![
            String::new(),
            "vcc".to_string(),
            "a0".to_string(),
            String::new(),
            "a1".to_string(),
            "vcc".to_string(),
        ];
        data.node_groups.insert("a".to_string(), vec![2, 4, -1, 9000, 7]);
        data.node_groups.insert("pcm".to_string(), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        data
    }

    #[test]
    fn test_find_node_by_name() {
        let registry = NodeRegistry::new(&sample_data());
        assert_eq!(registry.find_node_by_name("a0"), Some(2));
        assert_eq!(registry.find_node_by_name("a1"), Some(4));
        assert_eq!(registry.find_node_by_name("nope"), None);
        assert_eq!(registry.find_node_by_name(""), None);
    }

    #[test]
    fn test_duplicate_name_keeps_last_index() {
        let registry = NodeRegistry::new(&sample_data());
        assert_eq!(registry.find_node_by_name("vcc"), Some(5));
        assert_eq!(registry.named_node_count(), 3);
    }

    #[test]
    fn test_node_name_bounds() {
        let registry = NodeRegistry::new(&sample_data());
        assert_eq!(registry.node_name(2), Some("a0"));
        assert_eq!(registry.node_name(3), None);
        assert_eq!(registry.node_name(6), None);
        assert_eq!(registry.node_name(usize::MAX), None);
    }

    #[test]
    fn test_group_resolution() {
        let registry = NodeRegistry::new(&sample_data());
        let a = registry.cpu_groups().a;
        assert_eq!(a.get(0), Some(2));
        assert_eq!(a.get(1), Some(4));
        assert_eq!(a.get(2), None);
        assert_eq!(a.get(3), None); // beyond MAX_NODES
        assert_eq!(a.get(4), Some(7));
        assert_eq!(a.get(5), None); // padded
        assert_eq!(a.get(8), None);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![(0, 2), (1, 4), (4, 7)]);

        // Overlong groups are truncated to their width
        let pcm = registry.apu_groups().pcm;
        assert_eq!(pcm.iter().count(), 7);

        // Missing groups resolve to all-absent
        assert_eq!(registry.cpu_groups().ab.iter().count(), 0);
    }
}
