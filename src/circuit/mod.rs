//! Reference circuit loader.
//!
//! A small Modified Nodal Analysis (MNA) assembler used to drive the
//! integrator in tests and the demo binary. Unknowns are the node voltages
//! (ground excluded) followed by the branch currents of voltage sources and
//! inductors.
//!
//! ```
//! use tia_core::circuit::{Circuit, Waveform};
//!
//! let mut c = Circuit::new();
//! let vin = c.node("in");
//! let out = c.node("out");
//! c.voltage_source("V1", vin, Circuit::GROUND, Waveform::Dc(1.0));
//! c.resistor("R1", vin, out, 1e3);
//! c.capacitor("C1", out, Circuit::GROUND, 1e-6);
//! assert_eq!(c.matrix_size(), 3);
//! ```

mod components;
mod waveform;

pub use components::{
    pnjlim, Capacitor, Component, CurrentSource, Diode, DiodeParams, Inductor, Resistor,
    VoltageSource,
};
pub use waveform::Waveform;

use std::collections::HashMap;
use std::fmt;

use components::node_index;

use crate::error::{Result, TiaError};
use crate::loader::{DaeLoad, Loader, StateLoad};

/// A node of the circuit. Node 0 is always ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The ground node (always index 0).
    pub const GROUND: NodeId = NodeId(0);

    /// Check if this is the ground node.
    pub fn is_ground(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "N{}", self.0)
        }
    }
}

/// Index of a branch current unknown (voltage sources, inductors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchId(pub usize);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I{}", self.0)
    }
}

/// A circuit ready for transient analysis.
#[derive(Debug, Clone)]
pub struct Circuit {
    /// All components in the circuit
    pub components: Vec<Component>,
    /// Mapping from node names to node IDs
    node_map: HashMap<String, NodeId>,
    /// Reverse mapping from node IDs to names
    node_names: Vec<String>,
    /// Number of branch current variables
    num_branches: usize,
    /// Apply junction limiting during Newton iterations
    pub limiting: bool,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl Circuit {
    /// The ground node.
    pub const GROUND: NodeId = NodeId::GROUND;

    /// Empty circuit containing only ground.
    pub fn new() -> Self {
        let mut node_map = HashMap::new();
        node_map.insert("0".to_string(), NodeId::GROUND);
        node_map.insert("GND".to_string(), NodeId::GROUND);
        Self {
            components: Vec::new(),
            node_map,
            node_names: vec!["0".to_string()],
            num_branches: 0,
            limiting: true,
        }
    }

    /// Look up a node by name, creating it if needed.
    pub fn node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.node_map.get(name) {
            return id;
        }
        let id = NodeId(self.node_names.len());
        self.node_map.insert(name.to_string(), id);
        self.node_names.push(name.to_string());
        id
    }

    fn next_branch(&mut self) -> BranchId {
        let b = BranchId(self.num_branches);
        self.num_branches += 1;
        b
    }

    pub fn resistor(&mut self, name: &str, a: NodeId, b: NodeId, resistance: f64) -> &mut Self {
        self.components
            .push(Component::Resistor(Resistor::new(name, [a, b], resistance)));
        self
    }

    pub fn capacitor(&mut self, name: &str, a: NodeId, b: NodeId, capacitance: f64) -> &mut Self {
        self.components
            .push(Component::Capacitor(Capacitor::new(name, [a, b], capacitance)));
        self
    }

    pub fn inductor(&mut self, name: &str, a: NodeId, b: NodeId, inductance: f64) -> &mut Self {
        let branch = self.next_branch();
        self.components.push(Component::Inductor(Inductor::new(
            name, [a, b], inductance, branch,
        )));
        self
    }

    pub fn voltage_source(&mut self, name: &str, p: NodeId, n: NodeId, waveform: Waveform) -> &mut Self {
        let branch = self.next_branch();
        self.components.push(Component::VoltageSource(VoltageSource::new(
            name,
            [p, n],
            waveform,
            branch,
        )));
        self
    }

    pub fn current_source(&mut self, name: &str, p: NodeId, n: NodeId, waveform: Waveform) -> &mut Self {
        self.components
            .push(Component::CurrentSource(CurrentSource::new(name, [p, n], waveform)));
        self
    }

    /// Add a diode from `anode` to `cathode`.
    pub fn diode(&mut self, name: &str, anode: NodeId, cathode: NodeId, params: DiodeParams) -> &mut Self {
        self.components
            .push(Component::Diode(Diode::new(name, [anode, cathode], params)));
        self
    }

    /// Number of nodes including ground.
    pub fn num_nodes(&self) -> usize {
        self.node_names.len()
    }

    /// Get the total size of the MNA solution vector.
    pub fn matrix_size(&self) -> usize {
        // Nodes (excluding ground) + branch currents
        (self.num_nodes() - 1) + self.num_branches
    }

    /// Solution index of a node voltage, `None` for ground.
    pub fn node_index(&self, node: NodeId) -> Option<usize> {
        node_index(node)
    }

    /// Solution index of a branch current.
    pub fn branch_index(&self, branch: BranchId) -> usize {
        (self.num_nodes() - 1) + branch.0
    }

    /// Find a node ID by name.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.node_map.get(name).copied()
    }

    /// Get the name of a node.
    pub fn node_name(&self, node: NodeId) -> &str {
        &self.node_names[node.0]
    }

    /// Column labels of the solution vector.
    pub fn unknown_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.node_names[1..].iter().map(|n| format!("V({n})")).collect();
        names.resize(self.matrix_size(), String::new());
        for c in &self.components {
            let branch = match c {
                Component::VoltageSource(v) => v.branch,
                Component::Inductor(l) => l.branch,
                _ => continue,
            };
            names[self.branch_index(branch)] = format!("I({})", c.name());
        }
        names
    }

    /// Check the circuit can be simulated.
    pub fn validate(&self) -> Result<()> {
        if self.components.is_empty() {
            return Err(TiaError::invalid_parameter("circuit", "circuit has no components"));
        }
        if self.matrix_size() == 0 {
            return Err(TiaError::invalid_parameter("circuit", "circuit has no unknowns"));
        }
        for c in &self.components {
            let nodes = match c {
                Component::Resistor(d) => d.nodes,
                Component::Capacitor(d) => d.nodes,
                Component::Inductor(d) => d.nodes,
                Component::VoltageSource(d) => d.nodes,
                Component::CurrentSource(d) => d.nodes,
                Component::Diode(d) => d.nodes,
            };
            if let Some(bad) = nodes.iter().find(|n| n.0 >= self.num_nodes()) {
                return Err(TiaError::invalid_parameter(
                    c.name(),
                    format!("unknown node {bad}"),
                ));
            }
        }
        Ok(())
    }

    /// Devices reporting a lead current: capacitors and diodes, in order.
    fn lead_devices(&self) -> impl Iterator<Item = &Component> + '_ {
        self.components
            .iter()
            .filter(|c| matches!(c, Component::Capacitor(_) | Component::Diode(_)))
    }

    fn diodes(&self) -> impl Iterator<Item = &Diode> + '_ {
        self.components.iter().filter_map(|c| match c {
            Component::Diode(d) => Some(d),
            _ => None,
        })
    }
}

impl Loader for Circuit {
    fn solution_size(&self) -> usize {
        self.matrix_size()
    }

    /// One junction voltage per diode.
    fn state_size(&self) -> usize {
        self.diodes().count()
    }

    /// One lead current per capacitor and diode.
    fn store_size(&self) -> usize {
        self.lead_devices().count()
    }

    fn load(&mut self, time: f64, x: &[f64], out: &mut DaeLoad) -> Result<()> {
        TiaError::check_len("circuit solution", self.matrix_size(), x.len())?;
        out.clear();
        let offset = self.num_nodes() - 1;
        let limit = self.limiting;
        for c in &mut self.components {
            c.load(time, x, offset, limit, out);
        }
        if out.f.iter().chain(&out.q).any(|v| !v.is_finite()) {
            return Err(TiaError::loader(format!("non-finite device output at t={time:.6e}")));
        }
        Ok(())
    }

    /// Junction voltages, resistive lead currents and lead charges.
    fn load_state(&mut self, _time: f64, x: &[f64], out: StateLoad<'_>) -> Result<()> {
        for (s, d) in out.state.iter_mut().zip(self.diodes()) {
            *s = d.junction_voltage(x);
        }
        for (k, c) in self.lead_devices().enumerate() {
            match c {
                Component::Capacitor(cap) => {
                    out.store[k] = 0.0;
                    out.lead_q[k] = cap.capacitance * cap.branch_voltage(x);
                }
                Component::Diode(d) => {
                    let v = d.junction_voltage(x);
                    out.store[k] = d.current(v).0;
                    out.lead_q[k] = d.params.cj * v;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn breakpoints(&self, t0: f64, tf: f64) -> Vec<f64> {
        let mut points: Vec<f64> = self
            .components
            .iter()
            .filter_map(Component::waveform)
            .flat_map(|w| w.breakpoints(t0, tf))
            .collect();
        points.sort_by(f64::total_cmp);
        points
    }

    fn accept_step(&mut self, _time: f64, x: &[f64]) {
        for c in &mut self.components {
            if let Component::Diode(d) = c {
                d.v_last = d.junction_voltage(x);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn divider() -> Circuit {
        let mut c = Circuit::new();
        let vin = c.node("in");
        let out = c.node("out");
        c.voltage_source("V1", vin, Circuit::GROUND, Waveform::Dc(2.0))
            .resistor("R1", vin, out, 1e3)
            .resistor("R2", out, Circuit::GROUND, 1e3)
            .capacitor("C1", out, Circuit::GROUND, 1e-6);
        c
    }

    #[test]
    fn test_node_naming() {
        let mut c = divider();
        assert_eq!(c.node("out"), NodeId(2));
        assert_eq!(c.find_node("GND"), Some(NodeId::GROUND));
        assert_eq!(c.node_name(NodeId(1)), "in");
        assert_eq!(c.unknown_names(), vec!["V(in)", "V(out)", "I(V1)"]);
    }

    #[test]
    fn test_divider_is_consistent_at_dc_solution() {
        let mut c = divider();
        c.validate().unwrap();
        // V(in) = 2, V(out) = 1, source current 1 mA flowing into its + node.
        let x = [2.0, 1.0, -1e-3];
        let mut out = DaeLoad::new(3);
        c.load(0.0, &x, &mut out).unwrap();
        for f in &out.f {
            assert_relative_eq!(*f, 0.0, epsilon = 1e-15);
        }
        assert_relative_eq!(out.q[1], 1e-6);
        assert_relative_eq!(out.dq_dx.get(1, 1), 1e-6);
    }

    #[test]
    fn test_store_vectors() {
        let mut c = divider();
        c.diode("D1", NodeId(2), Circuit::GROUND, DiodeParams::default());
        assert_eq!(c.state_size(), 1);
        assert_eq!(c.store_size(), 2);
        let mut state = [0.0];
        let mut store = [0.0; 2];
        let mut lead_q = [0.0; 2];
        c.load_state(
            0.0,
            &[2.0, 0.5, 0.0],
            StateLoad {
                state: &mut state,
                store: &mut store,
                lead_q: &mut lead_q,
            },
        )
        .unwrap();
        assert_eq!(state, [0.5]);
        assert_relative_eq!(lead_q[0], 0.5e-6);
        assert!(store[1] > 0.0);
    }

    #[test]
    fn test_source_breakpoints_sorted() {
        let mut c = Circuit::new();
        let a = c.node("a");
        c.voltage_source("V1", a, Circuit::GROUND, Waveform::step(0.0, 1.0, 0.5, 0.1))
            .current_source("I1", a, Circuit::GROUND, Waveform::step(0.0, 1e-3, 0.2, 0.0))
            .resistor("R1", a, Circuit::GROUND, 1.0);
        assert_eq!(c.breakpoints(0.0, 1.0), vec![0.2, 0.2, 0.5, 0.6]);
    }

    #[test]
    fn test_empty_circuit_invalid() {
        assert!(Circuit::new().validate().is_err());
    }
}
