//! Transistor netlist consumed by the switch-level simulator

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::chip::NodeIndex;

/// Largest node count addressable by a [`NodeIndex`]
pub const MAX_NETLIST_NODES: usize = NodeIndex::MAX as usize + 1;

/// Nodes driven from outside the chip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetlistPins {
    pub clk0: NodeIndex,
    #[serde(default)]
    pub rw: Option<NodeIndex>,
    #[serde(default)]
    pub res: Option<NodeIndex>,
    #[serde(default)]
    pub rdy: Option<NodeIndex>,
    #[serde(default)]
    pub so: Option<NodeIndex>,
    #[serde(default)]
    pub irq: Option<NodeIndex>,
    #[serde(default)]
    pub nmi: Option<NodeIndex>,
}

/// Nodes, pull-ups and transistors of a chip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Netlist {
    pub node_count: usize,
    pub vcc: NodeIndex,
    pub vss: NodeIndex,
    #[serde(default)]
    pub pullups: Vec<NodeIndex>,
    /// `[gate, c1, c2]` per transistor
    pub transistors: Vec<[NodeIndex; 3]>,
    /// Optional charge area per node, used to settle floating groups
    #[serde(default)]
    pub areas: Vec<i64>,
    pub pins: NetlistPins,
    /// External address bus, least significant bit first
    #[serde(default)]
    pub address_bus: Vec<NodeIndex>,
    /// External data bus, least significant bit first
    #[serde(default)]
    pub data_bus: Vec<NodeIndex>,
}

impl Netlist {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let netlist: Netlist = serde_json::from_str(json).context("Failed to parse netlist JSON")?;
        netlist.validate()?;
        Ok(netlist)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read netlist {}", path.display()))?;
        let netlist = Self::from_json_str(&json)
            .with_context(|| format!("Invalid netlist in {}", path.display()))?;
        log::info!(
            "Loaded netlist from {}: {} nodes, {} transistors",
            path.display(),
            netlist.node_count,
            netlist.transistors.len()
        );
        Ok(netlist)
    }

    /// Check that every referenced node exists and the buses have full width
    pub fn validate(&self) -> Result<()> {
        if self.node_count > MAX_NETLIST_NODES {
            bail!("netlist has {} nodes, at most {} can be indexed", self.node_count, MAX_NETLIST_NODES);
        }

        let check = |what: &str, node: NodeIndex| -> Result<()> {
            if usize::from(node) >= self.node_count {
                bail!("{} references node {} but the netlist has {} nodes", what, node, self.node_count);
            }
            Ok(())
        };

        check("vcc", self.vcc)?;
        check("vss", self.vss)?;
        check("clk0", self.pins.clk0)?;
        for (name, pin) in [
            ("rw", self.pins.rw),
            ("res", self.pins.res),
            ("rdy", self.pins.rdy),
            ("so", self.pins.so),
            ("irq", self.pins.irq),
            ("nmi", self.pins.nmi),
        ] {
            if let Some(node) = pin {
                check(name, node)?;
            }
        }
        for &node in &self.pullups {
            check("pullup", node)?;
        }
        for (i, transistor) in self.transistors.iter().enumerate() {
            for &node in transistor {
                check(&format!("transistor {}", i), node)?;
            }
        }
        for &node in self.address_bus.iter().chain(&self.data_bus) {
            check("bus", node)?;
        }

        if !self.address_bus.is_empty() && self.address_bus.len() != 16 {
            bail!("address bus has {} bits, expected 16", self.address_bus.len());
        }
        if !self.data_bus.is_empty() && self.data_bus.len() != 8 {
            bail!("data bus has {} bits, expected 8", self.data_bus.len());
        }
        if !self.areas.is_empty() && self.areas.len() != self.node_count {
            bail!("{} node areas for {} nodes", self.areas.len(), self.node_count);
        }
        Ok(())
    }
}
