//! Device models of the reference circuit.
//!
//! Every device stamps its contribution to the DAE
//!
//! ```text
//! F(x) + dQ(x)/dt = 0
//! ```
//!
//! where node rows are Kirchhoff current sums (current leaving the node is
//! positive) and branch rows hold the branch voltage equations.

use super::waveform::Waveform;
use super::{BranchId, NodeId};
use crate::loader::DaeLoad;
use crate::THERMAL_VOLTAGE;

/// Solution index of a node, `None` for ground.
pub(crate) fn node_index(node: NodeId) -> Option<usize> {
    if node.is_ground() {
        None
    } else {
        Some(node.0 - 1)
    }
}

fn voltage(x: &[f64], node: Option<usize>) -> f64 {
    node.map_or(0.0, |i| x[i])
}

/// Add `+value` to row `p` and `-value` to row `n`.
fn stamp_pair(v: &mut [f64], p: Option<usize>, n: Option<usize>, value: f64) {
    if let Some(i) = p {
        v[i] += value;
    }
    if let Some(j) = n {
        v[j] -= value;
    }
}

/// Resistor.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub name: String,
    pub nodes: [NodeId; 2],
    pub resistance: f64,
}

impl Resistor {
    /// Create a new resistor.
    pub fn new(name: impl Into<String>, nodes: [NodeId; 2], resistance: f64) -> Self {
        Self {
            name: name.into(),
            nodes,
            // Minimum resistance to avoid singularity
            resistance: resistance.max(1e-12),
        }
    }

    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }

    fn load(&self, x: &[f64], out: &mut DaeLoad) {
        let (p, n) = (node_index(self.nodes[0]), node_index(self.nodes[1]));
        let g = self.conductance();
        stamp_pair(&mut out.f, p, n, g * (voltage(x, p) - voltage(x, n)));
        out.df_dx.stamp_conductance(p, n, g);
    }
}

/// Capacitor holding charge `C * (v+ - v-)`.
#[derive(Debug, Clone)]
pub struct Capacitor {
    pub name: String,
    pub nodes: [NodeId; 2],
    pub capacitance: f64,
}

impl Capacitor {
    /// Create a new capacitor.
    pub fn new(name: impl Into<String>, nodes: [NodeId; 2], capacitance: f64) -> Self {
        Self {
            name: name.into(),
            nodes,
            capacitance,
        }
    }

    pub(crate) fn branch_voltage(&self, x: &[f64]) -> f64 {
        voltage(x, node_index(self.nodes[0])) - voltage(x, node_index(self.nodes[1]))
    }

    fn load(&self, x: &[f64], out: &mut DaeLoad) {
        let (p, n) = (node_index(self.nodes[0]), node_index(self.nodes[1]));
        stamp_pair(&mut out.q, p, n, self.capacitance * self.branch_voltage(x));
        out.dq_dx.stamp_conductance(p, n, self.capacitance);
    }
}

/// Inductor with its current as an extra unknown.
///
/// Branch row: `v+ - v- - d(L i)/dt = 0`.
#[derive(Debug, Clone)]
pub struct Inductor {
    pub name: String,
    pub nodes: [NodeId; 2],
    pub inductance: f64,
    pub branch: BranchId,
}

impl Inductor {
    /// Create a new inductor.
    pub fn new(name: impl Into<String>, nodes: [NodeId; 2], inductance: f64, branch: BranchId) -> Self {
        Self {
            name: name.into(),
            nodes,
            inductance,
            branch,
        }
    }

    fn load(&self, x: &[f64], br: usize, out: &mut DaeLoad) {
        let (p, n) = (node_index(self.nodes[0]), node_index(self.nodes[1]));
        let i = x[br];
        stamp_branch(out, x, p, n, br, i);
        out.q[br] -= self.inductance * i;
        out.dq_dx.add(br, br, -self.inductance);
    }
}

/// KCL contribution of a branch current and the `v+ - v-` part of the
/// branch row.
fn stamp_branch(out: &mut DaeLoad, x: &[f64], p: Option<usize>, n: Option<usize>, br: usize, i: f64) {
    stamp_pair(&mut out.f, p, n, i);
    out.f[br] += voltage(x, p) - voltage(x, n);
    if let Some(a) = p {
        out.df_dx.add(a, br, 1.0);
        out.df_dx.add(br, a, 1.0);
    }
    if let Some(b) = n {
        out.df_dx.add(b, br, -1.0);
        out.df_dx.add(br, b, -1.0);
    }
}

/// Independent voltage source enforcing `v+ - v- = V(t)`.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub name: String,
    pub nodes: [NodeId; 2],
    pub waveform: Waveform,
    pub branch: BranchId,
}

impl VoltageSource {
    /// Create a new voltage source.
    pub fn new(name: impl Into<String>, nodes: [NodeId; 2], waveform: Waveform, branch: BranchId) -> Self {
        Self {
            name: name.into(),
            nodes,
            waveform,
            branch,
        }
    }

    fn load(&self, time: f64, x: &[f64], br: usize, out: &mut DaeLoad) {
        let (p, n) = (node_index(self.nodes[0]), node_index(self.nodes[1]));
        stamp_branch(out, x, p, n, br, x[br]);
        out.f[br] -= self.waveform.value(time);
    }
}

/// Independent current source; the current flows from `+` to `-` through
/// the source.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    pub name: String,
    pub nodes: [NodeId; 2],
    pub waveform: Waveform,
}

impl CurrentSource {
    /// Create a new current source.
    pub fn new(name: impl Into<String>, nodes: [NodeId; 2], waveform: Waveform) -> Self {
        Self {
            name: name.into(),
            nodes,
            waveform,
        }
    }

    fn load(&self, time: f64, out: &mut DaeLoad) {
        let (p, n) = (node_index(self.nodes[0]), node_index(self.nodes[1]));
        stamp_pair(&mut out.f, p, n, self.waveform.value(time));
    }
}

/// Parameters for a diode model.
#[derive(Debug, Clone, PartialEq)]
pub struct DiodeParams {
    /// Saturation current (Is), typically 1e-14 to 1e-12 A
    pub is: f64,
    /// Ideality factor (n), typically 1.0 to 2.0
    pub n: f64,
    /// Linear junction capacitance
    pub cj: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self {
            is: 1e-14,
            n: 1.0,
            cj: 0.0,
        }
    }
}

impl DiodeParams {
    /// Parameters for a germanium diode (lower forward voltage).
    pub fn germanium() -> Self {
        Self {
            is: 1e-9,
            n: 1.5,
            cj: 0.0,
        }
    }

    /// Thermal voltage times ideality factor.
    pub fn n_vt(&self) -> f64 {
        self.n * THERMAL_VOLTAGE
    }

    /// Voltage above which Newton steps are limited.
    pub fn v_crit(&self) -> f64 {
        let n_vt = self.n_vt();
        n_vt * (n_vt / (std::f64::consts::SQRT_2 * self.is)).ln()
    }
}

/// Junction voltage limiting of a Newton update.
///
/// Returns the limited voltage and whether it differs from `v_new`.
pub fn pnjlim(v_new: f64, v_old: f64, vt: f64, v_crit: f64) -> (f64, bool) {
    if v_new > v_crit && (v_new - v_old).abs() > 2.0 * vt {
        let limited = if v_old > 0.0 {
            let arg = 1.0 + (v_new - v_old) / vt;
            if arg > 0.0 {
                v_old + vt * arg.ln()
            } else {
                v_crit
            }
        } else {
            vt * (v_new / vt).ln()
        };
        (limited, true)
    } else {
        (v_new, false)
    }
}

/// Shockley junction diode, anode first.
///
/// `I = Is (exp(V / (n Vt)) - 1)` with a linear junction charge `cj V`.
#[derive(Debug, Clone)]
pub struct Diode {
    pub name: String,
    pub nodes: [NodeId; 2],
    pub params: DiodeParams,
    /// Junction voltage of the last evaluation, the reference for limiting
    pub v_last: f64,
}

impl Diode {
    /// Create a new diode.
    pub fn new(name: impl Into<String>, nodes: [NodeId; 2], params: DiodeParams) -> Self {
        Self {
            name: name.into(),
            nodes,
            params,
            v_last: 0.0,
        }
    }

    /// Current and conductance at junction voltage `v`.
    pub fn current(&self, v: f64) -> (f64, f64) {
        let n_vt = self.params.n_vt();
        let e = (v / n_vt).exp();
        let i = self.params.is * (e - 1.0);
        // Minimum conductance keeps a reverse-biased junction from
        // decoupling its nodes.
        let g = self.params.is / n_vt * e + 1e-12;
        (i + 1e-12 * v, g)
    }

    pub(crate) fn junction_voltage(&self, x: &[f64]) -> f64 {
        voltage(x, node_index(self.nodes[0])) - voltage(x, node_index(self.nodes[1]))
    }

    /// Stamp at `x`, limiting the junction voltage against the previous
    /// evaluation. The limiter correction goes to the `*_dvp` vectors.
    fn load(&mut self, x: &[f64], limit: bool, out: &mut DaeLoad) {
        let (p, n) = (node_index(self.nodes[0]), node_index(self.nodes[1]));
        let vd = self.junction_voltage(x);
        let (v, limited) = if limit {
            pnjlim(vd, self.v_last, self.params.n_vt(), self.params.v_crit())
        } else {
            (vd, false)
        };
        self.v_last = v;

        let (i, g) = self.current(v);
        stamp_pair(&mut out.f, p, n, i);
        out.df_dx.stamp_conductance(p, n, g);
        stamp_pair(&mut out.q, p, n, self.params.cj * v);
        out.dq_dx.stamp_conductance(p, n, self.params.cj);

        if limited {
            let dv = v - vd;
            stamp_pair(&mut out.df_dx_dvp, p, n, g * dv);
            stamp_pair(&mut out.dq_dx_dvp, p, n, self.params.cj * dv);
            out.limiting = true;
        }
    }
}

/// A device of the reference circuit.
#[derive(Debug, Clone)]
pub enum Component {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    VoltageSource(VoltageSource),
    CurrentSource(CurrentSource),
    Diode(Diode),
}

impl Component {
    /// Device name.
    pub fn name(&self) -> &str {
        match self {
            Component::Resistor(c) => &c.name,
            Component::Capacitor(c) => &c.name,
            Component::Inductor(c) => &c.name,
            Component::VoltageSource(c) => &c.name,
            Component::CurrentSource(c) => &c.name,
            Component::Diode(c) => &c.name,
        }
    }

    /// Stamp `Q`, `F` and their Jacobians. `branch_offset` is the solution
    /// index of branch 0.
    pub(crate) fn load(&mut self, time: f64, x: &[f64], branch_offset: usize, limit: bool, out: &mut DaeLoad) {
        match self {
            Component::Resistor(r) => r.load(x, out),
            Component::Capacitor(c) => c.load(x, out),
            Component::Inductor(l) => l.load(x, branch_offset + l.branch.0, out),
            Component::VoltageSource(v) => v.load(time, x, branch_offset + v.branch.0, out),
            Component::CurrentSource(i) => i.load(time, out),
            Component::Diode(d) => d.load(x, limit, out),
        }
    }

    /// Source waveform, if this is an independent source.
    pub fn waveform(&self) -> Option<&Waveform> {
        match self {
            Component::VoltageSource(v) => Some(&v.waveform),
            Component::CurrentSource(i) => Some(&i.waveform),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_resistor_stamp() {
        let r = Resistor::new("R1", [NodeId(1), NodeId(2)], 1e3);
        let mut out = DaeLoad::new(2);
        r.load(&[2.0, 1.0], &mut out);
        assert_relative_eq!(out.f[0], 1e-3);
        assert_relative_eq!(out.f[1], -1e-3);
        assert_relative_eq!(out.df_dx.get(0, 1), -1e-3);
    }

    #[test]
    fn test_diode_forward_bias() {
        let d = Diode::new("D1", [NodeId(1), NodeId::GROUND], DiodeParams::default());
        let (i0, _) = d.current(0.0);
        assert!(i0.abs() < 1e-10);
        let (i_small, _) = d.current(0.3);
        let (i_large, g) = d.current(0.6);
        assert!(i_large > i_small * 100.0);
        assert!(g > 0.0);
    }

    #[test]
    fn test_pnjlim_limits_large_forward_steps() {
        let p = DiodeParams::default();
        let vt = p.n_vt();
        let (v, limited) = pnjlim(5.0, 0.6, vt, p.v_crit());
        assert!(limited);
        assert!(v < 1.0 && v > 0.6);
        let (v, limited) = pnjlim(0.3, 0.2, vt, p.v_crit());
        assert!(!limited);
        assert_eq!(v, 0.3);
    }

    #[test]
    fn test_limited_diode_reports_correction() {
        let mut d = Diode::new("D1", [NodeId(1), NodeId::GROUND], DiodeParams::default());
        let mut out = DaeLoad::new(1);
        d.load(&[5.0], true, &mut out);
        assert!(out.limiting);
        let (i, g) = d.current(d.v_last);
        assert_relative_eq!(out.f[0], i);
        assert_relative_eq!(out.df_dx_dvp[0], g * (d.v_last - 5.0));
    }

    #[test]
    fn test_voltage_source_branch_row() {
        let v = VoltageSource::new("V1", [NodeId(1), NodeId::GROUND], Waveform::Dc(5.0), BranchId(0));
        let mut out = DaeLoad::new(2);
        v.load(0.0, &[3.0, 0.1], 1, &mut out);
        assert_relative_eq!(out.f[0], 0.1);
        assert_relative_eq!(out.f[1], 3.0 - 5.0);
        assert_eq!(out.df_dx.get(1, 0), 1.0);
        assert_eq!(out.df_dx.get(0, 1), 1.0);
    }
}
