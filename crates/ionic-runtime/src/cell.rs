//! Instantiated cells: compartments with their channels, pools and synapses

use crate::{
    calcium::CalciumPool,
    error::*,
    model::{instance_path, CellType, ModelDefinition},
    sources::{SpikeGenerator, TimeTable},
    synapse::SynapticChannel,
};
use ionic_core::{
    CalciumPlasticityRule, ConductanceSet, GateValues, PlasticityRule, PlasticityState, RateTable,
    TableCache, TableGrids,
};
use rand::Rng;
use smallvec::SmallVec;
use std::sync::Arc;

/// One channel in one compartment
#[derive(Debug, Clone)]
pub struct ChannelInstance {
    table: Arc<RateTable>,
    powers: (u32, u32, u32),
    /// Peak conductance (S)
    pub gbar: f64,
    /// Gate state
    pub gates: GateValues,
    /// Present conductance (S)
    pub g: f64,
    /// Inward current at the last voltage update (A)
    pub current: f64,
}

impl ChannelInstance {
    /// Channel at steady state for `v` and `ca`
    pub fn new(table: Arc<RateTable>, gbar: f64, v: f64, ca: f64) -> Self {
        let gates = table.steady_state(v, ca);
        let powers = table.spec().powers();
        let mut channel = Self {
            table,
            powers,
            gbar,
            gates,
            g: 0.0,
            current: 0.0,
        };
        channel.update_conductance();
        channel
    }

    /// Channel name
    pub fn name(&self) -> &str {
        &self.table.spec().name
    }

    /// Reversal potential (V)
    pub fn reversal(&self) -> f64 {
        self.table.spec().reversal
    }

    /// Whether the current feeds the calcium pool
    pub fn is_calcium_permeable(&self) -> bool {
        self.table.spec().calcium_permeable
    }

    fn update_conductance(&mut self) {
        let (xp, yp, zp) = self.powers;
        self.g = self.gbar
            * self.gates.x.powi(xp as i32)
            * self.gates.y.powi(yp as i32)
            * self.gates.z.powi(zp as i32);
    }

    /// Advance the gates by `dt` at voltage `v` and calcium `ca`
    pub fn advance(&mut self, v: f64, ca: f64, dt: f64) {
        self.table.advance(&mut self.gates, v, ca, dt);
        self.update_conductance();
    }
}

/// Synapse with its optional plasticity state
#[derive(Debug, Clone)]
pub struct SynapseInstance {
    /// Synapse name
    pub name: String,
    /// Conductance dynamics
    pub channel: SynapticChannel,
    /// Event weight before plasticity
    pub weight: f64,
    /// Plasticity state of a plastic synapse
    pub plasticity: Option<PlasticityState>,
    pub(crate) events: TimeTable,
}

impl SynapseInstance {
    /// Weight applied to the next event
    pub fn effective_weight(&self) -> f64 {
        self.weight * self.plasticity.map_or(1.0, |p| p.weight_factor)
    }
}

/// Electrical state of one compartment
#[derive(Debug, Clone)]
pub struct Compartment {
    /// Name
    pub name: String,
    /// Parent index
    pub parent: Option<usize>,
    /// Membrane potential (V)
    pub vm: f64,
    /// Membrane capacitance (F)
    pub cm: f64,
    /// Leak conductance (S)
    pub gm: f64,
    /// Leak reversal (V)
    pub em: f64,
    /// Axial conductance to the parent (S)
    pub ga: f64,
    /// Injected current for the next voltage update (A)
    pub inject: f64,
    /// Ion channels
    pub channels: Vec<ChannelInstance>,
    /// Calcium pool
    pub pool: Option<CalciumPool>,
    /// Synapses
    pub synapses: Vec<SynapseInstance>,
}

impl Compartment {
    /// Calcium concentration (mM), zero without a pool
    pub fn calcium(&self) -> f64 {
        self.pool.as_ref().map_or(0.0, |p| p.ca)
    }

    /// Sum of active conductances and of conductance-weighted reversals
    pub(crate) fn active_terms(&self) -> (f64, f64) {
        let channels = self.channels.iter().map(|c| (c.g, c.reversal()));
        let synapses = self.synapses.iter().map(|s| (s.channel.g, s.channel.erev()));
        channels
            .chain(synapses)
            .fold((0.0, 0.0), |(g, ge), (gk, ek)| (g + gk, ge + gk * ek))
    }

    /// Recompute channel currents at the present voltage and hand calcium
    /// currents to the pool
    pub(crate) fn settle_currents(&mut self) {
        let vm = self.vm;
        for channel in &mut self.channels {
            channel.current = channel.g * (channel.reversal() - vm);
            if channel.is_calcium_permeable() {
                if let Some(pool) = &mut self.pool {
                    pool.add_current(channel.current);
                }
            }
        }
    }
}

/// One instance of a cell type
#[derive(Debug, Clone)]
pub struct CellInstance {
    /// Instance path, `/<cell>_<index>`
    pub path: String,
    /// Cell type name
    pub cell_type: String,
    /// Compartments, parents first
    pub compartments: Vec<Compartment>,
    /// Spike detector on the root compartment
    pub spikes: SpikeGenerator,
    pub(crate) snapshot: Vec<f64>,
    pub(crate) children: Vec<SmallVec<[usize; 4]>>,
}

impl CellInstance {
    /// Build one instance; channel densities are drawn from `rng`
    pub fn build<R: Rng + ?Sized>(
        def: &ModelDefinition,
        cell: &CellType,
        index: usize,
        cache: &mut TableCache,
        grids: &TableGrids,
        rng: &mut R,
    ) -> Result<Self> {
        let path = instance_path(&cell.name, index);
        let passive = &cell.passive;
        let v0 = passive.initial_vm.unwrap_or(passive.em);
        let conductances: &ConductanceSet = &def.conductances;

        let mut compartments = Vec::with_capacity(cell.morphology.len());
        for (i, seg) in cell.morphology.segments().iter().enumerate() {
            let area = seg.area();
            let pool = cell
                .calcium
                .as_ref()
                .map(|config| CalciumPool::new(config, seg.shell_volume(config.shell_thickness)));
            let ca = pool.as_ref().map_or(0.0, |p| p.ca);

            let mut channels = Vec::new();
            let location = seg.location();
            for spec in &def.channels {
                let density = conductances.instance_density(&cell.name, &spec.name, &location, rng)?;
                if density == 0.0 {
                    continue;
                }
                if spec.is_calcium_gated() && pool.is_none() {
                    return Err(RuntimeError::invalid_model(format!(
                        "{} in {}/{} reads calcium but the cell has no calcium pool",
                        spec.name, cell.name, seg.name
                    )));
                }
                let table = cache.get_or_build(spec, grids)?;
                channels.push(ChannelInstance::new(table, density * area, v0, ca));
            }

            let synapses = def
                .synapses
                .iter()
                .filter(|s| s.cell == cell.name && s.instance == index && s.compartment == seg.name)
                .map(|s| SynapseInstance {
                    name: s.name.clone(),
                    channel: SynapticChannel::new(s),
                    weight: s.weight,
                    plasticity: s.plastic.then(PlasticityState::default),
                    events: TimeTable::new(s.spike_times.clone()),
                })
                .collect();

            compartments.push(Compartment {
                name: seg.name.clone(),
                parent: seg.parent,
                vm: v0,
                cm: passive.cm * area,
                gm: area / passive.rm,
                em: passive.em,
                ga: cell.morphology.coupling(i, passive.ra).unwrap_or(0.0),
                inject: 0.0,
                channels,
                pool,
                synapses,
            });
        }

        log::debug!(
            "Built {} with {} compartments and {} channel instances",
            path,
            compartments.len(),
            compartments.iter().map(|c| c.channels.len()).sum::<usize>()
        );

        Ok(Self {
            path,
            cell_type: cell.name.clone(),
            snapshot: vec![v0; compartments.len()],
            children: cell.morphology.segments().iter().map(|s| s.children.clone()).collect(),
            compartments,
            spikes: SpikeGenerator::new(cell.spike_detector),
        })
    }

    /// Index of a named compartment
    pub fn compartment_index(&self, name: &str) -> Option<usize> {
        self.compartments.iter().position(|c| c.name == name)
    }

    /// Root membrane potential (V)
    pub fn soma_vm(&self) -> f64 {
        self.compartments.first().map_or(f64::NAN, |c| c.vm)
    }

    /// Copy every membrane potential for the axial exchange
    pub(crate) fn take_snapshot(&mut self) {
        for (slot, comp) in self.snapshot.iter_mut().zip(&self.compartments) {
            *slot = comp.vm;
        }
    }

    /// Advance calcium pools by `dt`
    pub(crate) fn advance_pools(&mut self, dt: f64) {
        for comp in &mut self.compartments {
            comp.settle_currents();
            if let Some(pool) = &mut comp.pool {
                pool.advance(dt);
            }
        }
    }

    /// Advance channel gates by `dt` at the present voltage and calcium
    pub(crate) fn advance_channels(&mut self, dt: f64) {
        for comp in &mut self.compartments {
            let (vm, ca) = (comp.vm, comp.calcium());
            for channel in &mut comp.channels {
                channel.advance(vm, ca, dt);
            }
        }
    }

    /// Advance synaptic conductances by `dt`
    pub(crate) fn advance_synapses(&mut self, dt: f64) {
        for syn in self.compartments.iter_mut().flat_map(|c| c.synapses.iter_mut()) {
            syn.channel.advance(dt);
        }
    }

    /// Apply the plasticity rule to every plastic synapse
    pub(crate) fn apply_plasticity(&mut self, rule: &CalciumPlasticityRule, dt: f64) {
        for comp in &mut self.compartments {
            let ca = comp.calcium();
            for syn in &mut comp.synapses {
                if let Some(state) = &mut syn.plasticity {
                    rule.update(state, ca, dt);
                }
            }
        }
    }

    /// Deliver spikes that became due up to `t`
    pub(crate) fn deliver_events(&mut self, t: f64) {
        for comp in &mut self.compartments {
            for syn in &mut comp.synapses {
                let due = syn.events.process(t);
                if due > 0 {
                    let weight = syn.effective_weight();
                    for _ in 0..due {
                        syn.channel.deliver(weight);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfig;
    use rand::{rngs::StdRng, SeedableRng};
    use std::path::Path;

    const MODEL: &str = r#"
name = "pair"

[[channels]]
preset = "HHNa"

[[variants.default.bands]]
cell = "hh"
channel = "HHNa"
upper = 1.0
density = 600.0

[[cells]]
name = "hh"
passive = { cm = 0.01, rm = 0.02, ra = 1.0, em = -0.07 }
compartments = [
    { name = "soma", length = 5e-6, diameter = 5e-6, region = "soma" },
    { name = "dend", parent = "soma", length = 20e-6, diameter = 1e-6 },
]
"#;

    fn build() -> CellInstance {
        let def = ModelConfig::from_toml_str(MODEL, Path::new("pair.toml"))
            .unwrap()
            .into_definition(None)
            .unwrap();
        let mut cache = TableCache::new();
        let mut rng = StdRng::seed_from_u64(7);
        let grids = TableGrids::voltage_only(ionic_core::Grid::VOLTAGE);
        CellInstance::build(&def, &def.cells[0], 0, &mut cache, &grids, &mut rng).unwrap()
    }

    #[test]
    fn test_instance_layout() {
        let cell = build();
        assert_eq!(cell.path, "/hh_0");
        assert_eq!(cell.compartments.len(), 2);
        assert_eq!(cell.compartment_index("dend"), Some(1));
        assert_eq!(cell.compartments[0].ga, 0.0);
        assert!(cell.compartments[1].ga > 0.0);
        assert_eq!(cell.compartments[0].channels.len(), 1);
        assert_eq!(cell.compartments[0].channels[0].name(), "HHNa");
    }

    #[test]
    fn test_channels_start_at_steady_state() {
        let mut cell = build();
        let before = cell.compartments[0].channels[0].gates;
        cell.advance_channels(25e-6);
        let after = cell.compartments[0].channels[0].gates;
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn test_sodium_current_is_inward_at_rest() {
        let mut cell = build();
        cell.advance_pools(25e-6);
        assert!(cell.compartments[0].channels[0].current > 0.0);
    }
}
