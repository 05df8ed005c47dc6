//! Membrane voltage integrators
//!
//! The explicit integrator updates every compartment on its own with the
//! exponential Euler rule, reading neighbours from the snapshot taken in the
//! compartment init phase. The implicit integrator solves the backward Euler
//! system of the whole tree in one pass (Hines elimination); parents are
//! always stored before their children, so the matrix needs no reordering.

use crate::cell::CellInstance;

/// Voltage integration method of one cell instance
#[derive(Debug, Clone, PartialEq)]
pub enum Integrator {
    /// Per-compartment exponential Euler
    Explicit,
    /// Backward Euler over the tree
    Implicit(HinesSolver),
}

impl Integrator {
    /// Integrator for `cell`
    pub fn for_cell(cell: &CellInstance, implicit: bool) -> Self {
        if implicit {
            Integrator::Implicit(HinesSolver::new(cell.compartments.len()))
        } else {
            Integrator::Explicit
        }
    }

    /// Advance every membrane potential of `cell` by `dt`
    pub fn advance(&mut self, cell: &mut CellInstance, dt: f64) {
        match self {
            Integrator::Explicit => explicit_step(cell, dt),
            Integrator::Implicit(solver) => solver.step(cell, dt),
        }
    }
}

/// `V' = A/B + (V - A/B)·exp(-B·dt/Cm)` for every compartment, where
/// `A` and `B` collect leak, channel, synaptic, injected and axial terms
pub fn explicit_step(cell: &mut CellInstance, dt: f64) {
    let n = cell.compartments.len();
    for i in 0..n {
        let (mut a, mut b) = {
            let comp = &cell.compartments[i];
            let (g, ge) = comp.active_terms();
            (comp.em * comp.gm + comp.inject + ge, comp.gm + g)
        };
        if let Some(p) = cell.compartments[i].parent {
            let ga = cell.compartments[i].ga;
            a += ga * cell.snapshot[p];
            b += ga;
        }
        for &child in &cell.children[i] {
            let ga = cell.compartments[child].ga;
            a += ga * cell.snapshot[child];
            b += ga;
        }
        let comp = &mut cell.compartments[i];
        let steady = a / b;
        comp.vm = steady + (comp.vm - steady) * (-b * dt / comp.cm).exp();
    }
}

/// Backward Euler tree solver with reusable scratch space
#[derive(Debug, Clone, PartialEq)]
pub struct HinesSolver {
    diag: Vec<f64>,
    rhs: Vec<f64>,
}

impl HinesSolver {
    /// Solver for a tree of `n` compartments
    pub fn new(n: usize) -> Self {
        Self {
            diag: vec![0.0; n],
            rhs: vec![0.0; n],
        }
    }

    /// One backward Euler step of the whole tree
    pub fn step(&mut self, cell: &mut CellInstance, dt: f64) {
        let comps = &mut cell.compartments;
        let n = comps.len();
        self.diag.resize(n, 0.0);
        self.rhs.resize(n, 0.0);

        for (i, comp) in comps.iter().enumerate() {
            let (g, ge) = comp.active_terms();
            let c = comp.cm / dt;
            self.diag[i] = c + comp.gm + g;
            self.rhs[i] = c * comp.vm + comp.em * comp.gm + comp.inject + ge;
        }
        // axial coupling enters both ends of each edge
        for (i, comp) in comps.iter().enumerate() {
            if let Some(p) = comp.parent {
                self.diag[i] += comp.ga;
                self.diag[p] += comp.ga;
            }
        }

        // eliminate leaves towards the root
        for i in (1..n).rev() {
            if let Some(p) = comps[i].parent {
                let f = comps[i].ga / self.diag[i];
                self.diag[p] -= comps[i].ga * f;
                self.rhs[p] += f * self.rhs[i];
            }
        }

        // back substitution from the root
        for i in 0..n {
            let coupled = comps[i].parent.map_or(0.0, |p| comps[i].ga * comps[p].vm);
            comps[i].vm = (self.rhs[i] + coupled) / self.diag[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Compartment;
    use crate::sources::{SpikeDetectorConfig, SpikeGenerator};
    use smallvec::SmallVec;

    fn passive(name: &str, parent: Option<usize>, ga: f64) -> Compartment {
        Compartment {
            name: name.into(),
            parent,
            vm: -0.07,
            cm: 1e-12,
            gm: 1e-9,
            em: -0.07,
            ga,
            inject: 0.0,
            channels: Vec::new(),
            pool: None,
            synapses: Vec::new(),
        }
    }

    fn tree(parents: &[Option<usize>]) -> CellInstance {
        let compartments: Vec<Compartment> = parents
            .iter()
            .enumerate()
            .map(|(i, p)| passive(&format!("c{}", i), *p, if p.is_some() { 5e-9 } else { 0.0 }))
            .collect();
        let mut children = vec![SmallVec::new(); parents.len()];
        for (i, p) in parents.iter().enumerate() {
            if let Some(p) = p {
                children[*p].push(i);
            }
        }
        CellInstance {
            path: "/chain_0".into(),
            cell_type: "chain".into(),
            compartments,
            spikes: SpikeGenerator::new(SpikeDetectorConfig::default()),
            snapshot: vec![-0.07; parents.len()],
            children,
        }
    }

    fn chain(n: usize) -> CellInstance {
        let parents: Vec<Option<usize>> = (0..n).map(|i| i.checked_sub(1)).collect();
        tree(&parents)
    }

    fn steady_state(cell: &CellInstance) -> f64 {
        // single passive compartment driven by its injection
        let c = &cell.compartments[0];
        c.em + c.inject / c.gm
    }

    #[test]
    fn test_explicit_relaxes_to_steady_state() {
        let mut cell = chain(1);
        cell.compartments[0].inject = 10e-12;
        for _ in 0..2000 {
            cell.take_snapshot();
            explicit_step(&mut cell, 25e-6);
        }
        let expected = steady_state(&cell);
        assert!((cell.compartments[0].vm - expected).abs() < 1e-9);
    }

    #[test]
    fn test_implicit_relaxes_to_steady_state() {
        let mut cell = chain(1);
        cell.compartments[0].inject = 10e-12;
        let mut solver = HinesSolver::new(1);
        for _ in 0..2000 {
            solver.step(&mut cell, 25e-6);
        }
        let expected = steady_state(&cell);
        assert!((cell.compartments[0].vm - expected).abs() < 1e-9);
    }

    #[test]
    fn test_solvers_agree_on_chain() {
        let mut explicit = chain(4);
        let mut implicit = chain(4);
        explicit.compartments[0].inject = 20e-12;
        implicit.compartments[0].inject = 20e-12;
        let mut solver = HinesSolver::new(4);
        for _ in 0..4000 {
            explicit.take_snapshot();
            explicit_step(&mut explicit, 5e-6);
            solver.step(&mut implicit, 5e-6);
        }
        for (e, i) in explicit.compartments.iter().zip(&implicit.compartments) {
            assert!((e.vm - i.vm).abs() < 1e-6, "{} vs {}", e.vm, i.vm);
        }
        // current flows away from the injection site
        let v: Vec<f64> = implicit.compartments.iter().map(|c| c.vm).collect();
        assert!(v.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_branching_tree_is_symmetric() {
        let mut cell = tree(&[None, Some(0), Some(0)]);
        cell.compartments[0].inject = 20e-12;
        let mut solver = HinesSolver::new(3);
        for _ in 0..1000 {
            solver.step(&mut cell, 25e-6);
        }
        let (a, b) = (cell.compartments[1].vm, cell.compartments[2].vm);
        assert!((a - b).abs() < 1e-12);
    }
}
