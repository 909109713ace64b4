//! Switch-level simulation of an NMOS netlist
//!
//! Nodes connected through conducting transistors form a group that
//! settles to a single level: ground wins over power, power over pull-ups
//! and pull-downs, and a floating group keeps the level of its larger
//! charged area. Changing a node recalculates its group and every group
//! whose transistors switched as a result, until nothing changes.

use super::{Netlist, NetlistPins, SimFactory, TransistorSim};
use crate::chip::NodeIndex;

/// Recalculation passes before a change is considered oscillating
const MAX_RECALC_DEPTH: usize = 100;

/// Half-cycles the reset line is held low during power-up
const RESET_HALF_CYCLES: usize = 16;

#[derive(Debug, Clone, Default)]
struct SimNode {
    state: bool,
    pullup: bool,
    pulldown: bool,
    area: i64,
    /// Transistors gated by this node
    gates: Vec<u32>,
    /// Transistors with this node on either channel terminal
    c1c2s: Vec<u32>,
}

#[derive(Debug, Clone)]
struct SimTransistor {
    c1: NodeIndex,
    c2: NodeIndex,
    on: bool,
}

pub struct SwitchLevelSim {
    nodes: Vec<SimNode>,
    transistors: Vec<SimTransistor>,
    pullups: Vec<bool>,
    vcc: NodeIndex,
    vss: NodeIndex,
    pins: NetlistPins,
    address_bus: Vec<NodeIndex>,
    data_bus: Vec<NodeIndex>,
    memory: Box<[u8; 0x10000]>,
    group: Vec<NodeIndex>,
    in_group: Vec<bool>,
    has_power: bool,
    has_ground: bool,
    processed: Vec<bool>,
    cycle: u64,
}

impl SwitchLevelSim {
    /// Build the chip and run its power-up reset sequence
    pub fn new(netlist: &Netlist) -> Option<Self> {
        if let Err(err) = netlist.validate() {
            log::warn!("Refusing to simulate invalid netlist: {:#}", err);
            return None;
        }

        let mut nodes = vec![SimNode::default(); netlist.node_count];
        let mut pullups = vec![false; netlist.node_count];
        for &node in &netlist.pullups {
            pullups[usize::from(node)] = true;
        }
        for (i, node) in nodes.iter_mut().enumerate() {
            node.area = netlist.areas.get(i).copied().unwrap_or(1);
        }

        let mut transistors = Vec::with_capacity(netlist.transistors.len());
        for (i, &[gate, c1, c2]) in netlist.transistors.iter().enumerate() {
            let i = i as u32;
            nodes[usize::from(gate)].gates.push(i);
            nodes[usize::from(c1)].c1c2s.push(i);
            if c2 != c1 {
                nodes[usize::from(c2)].c1c2s.push(i);
            }
            transistors.push(SimTransistor { c1, c2, on: false });
        }

        let mut sim = Self {
            in_group: vec![false; nodes.len()],
            processed: vec![false; nodes.len()],
            nodes,
            transistors,
            pullups,
            vcc: netlist.vcc,
            vss: netlist.vss,
            pins: netlist.pins.clone(),
            address_bus: netlist.address_bus.clone(),
            data_bus: netlist.data_bus.clone(),
            memory: Box::new([0; 0x10000]),
            group: Vec::new(),
            has_power: false,
            has_ground: false,
            cycle: 0,
        };
        sim.reset();
        Some(sim)
    }

    /// Power-up sequence: hold reset for a few clocks, then release it
    pub fn reset(&mut self) {
        for (node, &pullup) in self.nodes.iter_mut().zip(&self.pullups) {
            node.state = false;
            node.pullup = pullup;
            node.pulldown = false;
        }
        self.nodes[usize::from(self.vcc)].state = true;
        for transistor in self.transistors.iter_mut() {
            transistor.on = false;
        }

        if let Some(res) = self.pins.res {
            self.set_level(res, false);
        }
        self.set_level(self.pins.clk0, true);
        for (pin, level) in [
            (self.pins.rdy, true),
            (self.pins.so, false),
            (self.pins.irq, true),
            (self.pins.nmi, true),
        ] {
            if let Some(node) = pin {
                self.set_level(node, level);
            }
        }

        let all_nodes: Vec<NodeIndex> = (0..self.nodes.len())
            .filter_map(|n| NodeIndex::try_from(n).ok())
            .filter(|&n| n != self.vcc && n != self.vss)
            .collect();
        self.recalc_node_list(&all_nodes);

        for _ in 0..RESET_HALF_CYCLES {
            self.step();
        }

        if let Some(res) = self.pins.res {
            self.set_level(res, true);
        }
        self.cycle = 0;
    }

    pub fn is_node_high(&self, node: NodeIndex) -> bool {
        self.nodes
            .get(usize::from(node))
            .is_some_and(|n| n.state)
    }

    pub fn read_memory(&self, addr: u16) -> u8 {
        self.memory[usize::from(addr)]
    }

    /// Half-cycles since the last reset
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn address_bus_value(&self) -> u16 {
        self.read_bus(&self.address_bus)
    }

    fn read_bus(&self, bus: &[NodeIndex]) -> u16 {
        bus.iter()
            .enumerate()
            .filter(|&(_, &node)| self.is_node_high(node))
            .fold(0, |acc, (bit, _)| acc | (1 << bit))
    }

    fn write_bus(&mut self, bus: &[NodeIndex], value: u16) {
        for (bit, &node) in bus.iter().enumerate() {
            let node = &mut self.nodes[usize::from(node)];
            let high = value & (1 << bit) != 0;
            node.pullup = high;
            node.pulldown = !high;
        }
        self.recalc_node_list(bus);
    }

    fn handle_memory(&mut self) {
        let Some(rw) = self.pins.rw else {
            return;
        };
        if self.address_bus.is_empty() || self.data_bus.is_empty() {
            return;
        }

        let addr = usize::from(self.address_bus_value());
        if self.is_node_high(rw) {
            let data_bus = std::mem::take(&mut self.data_bus);
            self.write_bus(&data_bus, u16::from(self.memory[addr]));
            self.data_bus = data_bus;
        } else {
            let value = self.read_bus(&self.data_bus) as u8;
            self.memory[addr] = value;
        }
    }

    fn set_level(&mut self, node: NodeIndex, high: bool) {
        let Some(n) = self.nodes.get_mut(usize::from(node)) else {
            return;
        };
        n.pullup = high;
        n.pulldown = !high;
        self.recalc_node_list(&[node]);
    }

    fn recalc_node_list(&mut self, list: &[NodeIndex]) {
        let mut current = list.to_vec();
        for _ in 0..MAX_RECALC_DEPTH {
            if current.is_empty() {
                return;
            }
            let mut next = Vec::new();
            for &node in &current {
                self.recalc_node(node, &mut next);
            }
            for &node in &next {
                self.processed[usize::from(node)] = false;
            }
            current = next;
        }
        log::warn!(
            "Node recalculation did not settle after {} passes (cycle {})",
            MAX_RECALC_DEPTH,
            self.cycle
        );
    }

    fn recalc_node(&mut self, node: NodeIndex, next: &mut Vec<NodeIndex>) {
        if node == self.vcc || node == self.vss {
            return;
        }

        self.build_group(node);
        let new_state = self.group_value();

        let group = std::mem::take(&mut self.group);
        for &member in &group {
            let member = usize::from(member);
            if self.nodes[member].state == new_state {
                continue;
            }
            self.nodes[member].state = new_state;
            for gate_index in 0..self.nodes[member].gates.len() {
                let t = self.nodes[member].gates[gate_index] as usize;
                if new_state {
                    self.turn_transistor_on(t, next);
                } else {
                    self.turn_transistor_off(t, next);
                }
            }
        }
        self.group = group;
    }

    fn turn_transistor_on(&mut self, t: usize, next: &mut Vec<NodeIndex>) {
        if !self.transistors[t].on {
            self.transistors[t].on = true;
            self.add_recalc_node(self.transistors[t].c1, next);
        }
    }

    fn turn_transistor_off(&mut self, t: usize, next: &mut Vec<NodeIndex>) {
        if self.transistors[t].on {
            self.transistors[t].on = false;
            self.add_recalc_node(self.transistors[t].c1, next);
            self.add_recalc_node(self.transistors[t].c2, next);
        }
    }

    fn add_recalc_node(&mut self, node: NodeIndex, next: &mut Vec<NodeIndex>) {
        if node == self.vcc || node == self.vss {
            return;
        }
        let processed = &mut self.processed[usize::from(node)];
        if !*processed {
            *processed = true;
            next.push(node);
        }
    }

    fn build_group(&mut self, start: NodeIndex) {
        for &member in &self.group {
            self.in_group[usize::from(member)] = false;
        }
        self.group.clear();
        self.has_power = false;
        self.has_ground = false;

        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if node == self.vss {
                self.has_ground = true;
                continue;
            }
            if node == self.vcc {
                self.has_power = true;
                continue;
            }
            let index = usize::from(node);
            if self.in_group[index] {
                continue;
            }
            self.in_group[index] = true;
            self.group.push(node);

            for &t in &self.nodes[index].c1c2s {
                let transistor = &self.transistors[t as usize];
                if transistor.on {
                    stack.push(if transistor.c1 == node {
                        transistor.c2
                    } else {
                        transistor.c1
                    });
                }
            }
        }
    }

    fn group_value(&self) -> bool {
        if self.has_ground {
            return false;
        }
        if self.has_power {
            return true;
        }

        let mut hi_area = 0_i64;
        let mut lo_area = 0_i64;
        for &member in &self.group {
            let node = &self.nodes[usize::from(member)];
            if node.pullup {
                return true;
            } else if node.pulldown {
                return false;
            } else if node.state {
                hi_area += node.area;
            } else {
                lo_area += node.area;
            }
        }
        hi_area > lo_area
    }
}

impl TransistorSim for SwitchLevelSim {
    fn step(&mut self) {
        let clk = self.is_node_high(self.pins.clk0);
        self.set_level(self.pins.clk0, !clk);
        // Bus traffic happens on the rising edge of clk0
        if !clk {
            self.handle_memory();
        }
        self.cycle += 1;
    }

    fn write_node(&mut self, node: NodeIndex, high: bool) {
        self.set_level(node, high);
    }

    fn write_memory(&mut self, addr: u16, value: u8) {
        self.memory[usize::from(addr)] = value;
    }

    fn read_node_states(&self, active: u8, inactive: u8, out: &mut [u8]) {
        for (i, slot) in out.iter_mut().enumerate() {
            let high = self.nodes.get(i).is_some_and(|n| n.state);
            *slot = if high { active } else { inactive };
        }
    }
}

/// Factory that builds a fresh simulator from the netlist on every call
pub fn netlist_factory(netlist: Netlist) -> SimFactory {
    Box::new(move || {
        SwitchLevelSim::new(&netlist).map(|sim| Box::new(sim) as Box<dyn TransistorSim>)
    })
}
