//! Declarative model files and their validated form
//!
//! A model file is TOML. Channels are given inline or by built-in name,
//! conductances are grouped in named variants, and every cross reference
//! (cell, channel, compartment) is resolved when the file is turned into a
//! [`ModelDefinition`].

use crate::{
    calcium::CalciumPoolConfig,
    error::*,
    morphology::{CompartmentSpec, Morphology},
    sources::{PulseConfig, SpikeDetectorConfig},
    synapse::SynapseConfig,
};
use ionic_core::{
    presets, CalciumPlasticityRule, ChannelKineticsSpec, ClockConfig, ConductanceSet,
    DistanceBand, GapPolicy, OverlapPolicy, PlasticityParams, Region,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Model file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name
    pub name: String,
    /// Conductance variant used when none is requested
    #[serde(default)]
    pub variant: Option<String>,
    /// Clock timesteps
    #[serde(default)]
    pub clocks: ClockSettings,
    /// Channel definitions
    pub channels: Vec<ChannelConfig>,
    /// Band policies shared by every variant
    #[serde(default)]
    pub conductance: ConductancePolicies,
    /// Named conductance variants
    pub variants: BTreeMap<String, VariantConfig>,
    /// Cell types
    pub cells: Vec<CellConfig>,
    /// Current pulses
    #[serde(default)]
    pub stimuli: Vec<PulseConfig>,
    /// Synapses
    #[serde(default)]
    pub synapses: Vec<SynapseConfig>,
    /// Plasticity rule for synapses marked plastic
    #[serde(default)]
    pub plasticity: Option<PlasticityParams>,
    /// What to record
    #[serde(default)]
    pub recording: RecordingConfig,
}

/// Clock section of a model file; unset slots default to `sim_dt`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockSettings {
    /// Voltage timestep (s)
    #[serde(default = "default_sim_dt")]
    pub sim_dt: f64,
    /// Gating timestep (s)
    #[serde(default)]
    pub gating_dt: Option<f64>,
    /// Spike source timestep (s)
    #[serde(default)]
    pub spike_dt: Option<f64>,
    /// Stimulus timestep (s)
    #[serde(default)]
    pub stimulus_dt: Option<f64>,
    /// Recording timestep (s)
    #[serde(default = "default_plot_dt")]
    pub plot_dt: f64,
    /// Use the implicit tree solver
    #[serde(default)]
    pub implicit: bool,
}

fn default_sim_dt() -> f64 {
    25e-6
}

fn default_plot_dt() -> f64 {
    100e-6
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            sim_dt: default_sim_dt(),
            gating_dt: None,
            spike_dt: None,
            stimulus_dt: None,
            plot_dt: default_plot_dt(),
            implicit: false,
        }
    }
}

impl ClockSettings {
    /// Resolve to a full clock configuration
    pub fn to_config(&self) -> ClockConfig {
        ClockConfig::new(self.sim_dt, self.plot_dt)
            .with_gating_dt(self.gating_dt.unwrap_or(self.sim_dt))
            .with_spike_dt(self.spike_dt.unwrap_or(self.sim_dt))
            .with_stimulus_dt(self.stimulus_dt.unwrap_or(self.sim_dt))
            .with_implicit(self.implicit)
    }
}

/// A channel given by built-in name or inline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelConfig {
    /// Built-in channel, see [`ionic_core::presets::names`]
    Preset {
        /// Built-in name
        preset: String,
    },
    /// Full inline definition
    Inline(ChannelKineticsSpec),
}

impl ChannelConfig {
    fn resolve(&self) -> Result<ChannelKineticsSpec> {
        match self {
            ChannelConfig::Preset { preset } => presets::channel(preset).ok_or_else(|| {
                RuntimeError::invalid_model(format!(
                    "unknown built-in channel {} (known: {})",
                    preset,
                    presets::names().join(", ")
                ))
            }),
            ChannelConfig::Inline(spec) => Ok(spec.clone()),
        }
    }
}

/// Overlap and gap policies
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConductancePolicies {
    /// Overlapping band handling
    #[serde(default)]
    pub overlap: OverlapPolicy,
    /// Coverage gap handling
    #[serde(default)]
    pub gap: GapPolicy,
}

/// One named conductance configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VariantConfig {
    /// Bands, in declaration order
    #[serde(default)]
    pub bands: Vec<BandConfig>,
    /// Per-channel coefficients of variation
    #[serde(default)]
    pub variance: Vec<VarianceConfig>,
}

/// Peak density of a channel over one distance band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandConfig {
    /// Cell type
    pub cell: String,
    /// Channel name
    pub channel: String,
    /// Inclusive lower path distance (m)
    #[serde(default)]
    pub lower: f64,
    /// Exclusive upper path distance (m)
    pub upper: f64,
    /// Region restriction
    #[serde(default)]
    pub region: Option<Region>,
    /// Peak density (S/m²)
    pub density: f64,
}

/// Coefficient of variation of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceConfig {
    /// Cell type
    pub cell: String,
    /// Channel name
    pub channel: String,
    /// Coefficient of variation
    pub cv: f64,
}

/// Passive membrane and cable parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassiveConfig {
    /// Specific membrane capacitance (F/m²)
    pub cm: f64,
    /// Specific membrane resistance (Ω·m²)
    pub rm: f64,
    /// Specific axial resistivity (Ω·m)
    pub ra: f64,
    /// Leak reversal potential (V)
    pub em: f64,
    /// Initial membrane potential (V), defaults to `em`
    #[serde(default)]
    pub initial_vm: Option<f64>,
}

impl PassiveConfig {
    /// Validate parameters
    pub fn validate(&self, cell: &str) -> Result<()> {
        for (name, value) in [("cm", self.cm), ("rm", self.rm), ("ra", self.ra)] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(RuntimeError::invalid_parameter(
                    format!("{} {}", cell, name),
                    value.to_string(),
                    "> 0.0",
                ));
            }
        }
        if !self.em.is_finite() || !self.initial_vm.map_or(true, f64::is_finite) {
            return Err(RuntimeError::invalid_parameter(
                format!("{} em", cell),
                self.em.to_string(),
                "finite",
            ));
        }
        Ok(())
    }
}

/// Cell type section of a model file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellConfig {
    /// Cell type name
    pub name: String,
    /// Number of instances
    #[serde(default = "default_instances")]
    pub instances: usize,
    /// Passive parameters
    pub passive: PassiveConfig,
    /// Calcium pool in every compartment
    #[serde(default)]
    pub calcium: Option<CalciumPoolConfig>,
    /// Spike detector on the root compartment
    #[serde(default)]
    pub spike_detector: SpikeDetectorConfig,
    /// Compartments, parents first
    pub compartments: Vec<CompartmentSpec>,
}

fn default_instances() -> usize {
    1
}

/// Recording selection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Compartments to record; empty records every compartment
    #[serde(default)]
    pub compartments: Vec<String>,
    /// Also record every channel current in recorded compartments
    #[serde(default)]
    pub currents: bool,
}

/// Validated cell type
#[derive(Debug, Clone, PartialEq)]
pub struct CellType {
    /// Name
    pub name: String,
    /// Number of instances
    pub instances: usize,
    /// Passive parameters
    pub passive: PassiveConfig,
    /// Calcium pool parameters
    pub calcium: Option<CalciumPoolConfig>,
    /// Spike detector parameters
    pub spike_detector: SpikeDetectorConfig,
    /// Compartment tree
    pub morphology: Morphology,
}

/// Validated, self-consistent model
#[derive(Debug, Clone)]
pub struct ModelDefinition {
    /// Model name
    pub name: String,
    /// Selected conductance variant
    pub variant: String,
    /// Channel definitions, shared by every instance
    pub channels: Vec<Arc<ChannelKineticsSpec>>,
    /// Conductances of the selected variant; may be calibrated before a run
    pub conductances: ConductanceSet,
    /// Cell types
    pub cells: Vec<CellType>,
    /// Current pulses
    pub stimuli: Vec<PulseConfig>,
    /// Synapses
    pub synapses: Vec<SynapseConfig>,
    /// Plasticity rule
    pub plasticity: Option<CalciumPlasticityRule>,
    /// Clock timesteps
    pub clocks: ClockConfig,
    /// Recording selection
    pub recording: RecordingConfig,
}

impl ModelConfig {
    /// Parse a model from TOML text; `origin` names the source in errors
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| RuntimeError::parse(origin, e.to_string()))
    }

    /// Read and parse a model file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        log::debug!("Loaded model file {}", path.display());
        Self::from_toml_str(&text, path)
    }

    /// Names of the declared variants
    pub fn variant_names(&self) -> Vec<&str> {
        self.variants.keys().map(String::as_str).collect()
    }

    fn select_variant(&self, requested: Option<&str>) -> Result<(&str, &VariantConfig)> {
        let name = match requested.or(self.variant.as_deref()) {
            Some(name) => name,
            None if self.variants.len() == 1 => self.variants.keys().next().map(String::as_str).unwrap_or_default(),
            None if self.variants.contains_key("default") => "default",
            None if self.variants.is_empty() => {
                return Err(RuntimeError::invalid_model(format!(
                    "model {} declares no conductance variants",
                    self.name
                )))
            }
            None => {
                return Err(RuntimeError::invalid_model(format!(
                    "model {} has several variants ({}); select one",
                    self.name,
                    self.variant_names().join(", ")
                )))
            }
        };
        self.variants
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| {
                RuntimeError::invalid_model(format!(
                    "unknown variant {} (known: {})",
                    name,
                    self.variant_names().join(", ")
                ))
            })
    }

    /// Validate the model and resolve it against one conductance variant
    pub fn into_definition(self, variant: Option<&str>) -> Result<ModelDefinition> {
        // channels
        let mut channels = Vec::with_capacity(self.channels.len());
        let mut channel_names = HashSet::new();
        for config in &self.channels {
            let spec = config.resolve()?;
            spec.validate()?;
            if !channel_names.insert(spec.name.clone()) {
                return Err(ionic_core::CoreError::ConflictingChannel { channel: spec.name }.into());
            }
            channels.push(Arc::new(spec));
        }

        // cells
        let mut cells: Vec<CellType> = Vec::with_capacity(self.cells.len());
        for cell in &self.cells {
            if cells.iter().any(|c| c.name == cell.name) {
                return Err(RuntimeError::invalid_model(format!("duplicate cell type {}", cell.name)));
            }
            if cell.instances == 0 {
                return Err(RuntimeError::invalid_parameter(
                    format!("{} instances", cell.name),
                    "0",
                    ">= 1",
                ));
            }
            cell.passive.validate(&cell.name)?;
            cell.spike_detector
                .validate()
                .map_err(|e| RuntimeError::invalid_model(format!("cell {}: {}", cell.name, e)))?;
            if let Some(ca) = &cell.calcium {
                ca.validate()?;
            }
            let morphology = Morphology::build(&cell.compartments)
                .map_err(|e| RuntimeError::invalid_model(format!("cell {}: {}", cell.name, e)))?;
            cells.push(CellType {
                name: cell.name.clone(),
                instances: cell.instances,
                passive: cell.passive,
                calcium: cell.calcium,
                spike_detector: cell.spike_detector,
                morphology,
            });
        }
        if cells.is_empty() {
            return Err(RuntimeError::invalid_model(format!("model {} has no cell types", self.name)));
        }

        // conductances
        let (variant_name, selected) = self.select_variant(variant)?;
        let mut builder = ConductanceSet::builder()
            .overlap_policy(self.conductance.overlap)
            .gap_policy(self.conductance.gap);
        for cell in &cells {
            builder = builder.cell_type(cell.name.clone());
        }
        for band in &selected.bands {
            check_reference(&cells, &channel_names, &band.cell, &band.channel)?;
            let range = DistanceBand {
                lower: band.lower,
                upper: band.upper,
                region: band.region,
            };
            builder = builder.band(band.cell.clone(), band.channel.clone(), range, band.density);
        }
        for var in &selected.variance {
            check_reference(&cells, &channel_names, &var.cell, &var.channel)?;
            builder = builder.variance(var.cell.clone(), var.channel.clone(), var.cv);
        }
        let conductances = builder.build()?;
        let variant_name = variant_name.to_string();

        // stimuli and synapses
        for pulse in &self.stimuli {
            pulse.validate()?;
            check_compartment(&cells, &pulse.cell, pulse.instance, &pulse.compartment)?;
        }
        for syn in &self.synapses {
            syn.validate()?;
            let cell = check_compartment(&cells, &syn.cell, syn.instance, &syn.compartment)?;
            if syn.plastic && (self.plasticity.is_none() || cell.calcium.is_none()) {
                return Err(RuntimeError::invalid_model(format!(
                    "plastic synapse {} needs a [plasticity] section and a calcium pool in {}",
                    syn.name, syn.cell
                )));
            }
        }
        let plasticity = self.plasticity.map(CalciumPlasticityRule::new).transpose()?;

        for name in &self.recording.compartments {
            if !cells.iter().any(|c| c.morphology.index_of(name).is_some()) {
                return Err(RuntimeError::invalid_model(format!(
                    "recorded compartment {} does not exist in any cell type",
                    name
                )));
            }
        }

        let clocks = self.clocks.to_config();
        clocks.validate()?;

        log::info!(
            "Model {} (variant {}): {} channels, {} cell types",
            self.name,
            variant_name,
            channels.len(),
            cells.len()
        );

        Ok(ModelDefinition {
            name: self.name,
            variant: variant_name,
            channels,
            conductances,
            cells,
            stimuli: self.stimuli,
            synapses: self.synapses,
            plasticity,
            clocks,
            recording: self.recording,
        })
    }
}

fn check_reference(
    cells: &[CellType],
    channels: &HashSet<String>,
    cell: &str,
    channel: &str,
) -> Result<()> {
    if !cells.iter().any(|c| c.name == cell) {
        return Err(ionic_core::CoreError::UnknownCellType {
            cell_type: cell.to_string(),
        }
        .into());
    }
    if !channels.contains(channel) {
        return Err(RuntimeError::invalid_model(format!(
            "conductance for {}/{} refers to an undefined channel",
            cell, channel
        )));
    }
    Ok(())
}

fn check_compartment<'a>(
    cells: &'a [CellType],
    cell: &str,
    instance: usize,
    compartment: &str,
) -> Result<&'a CellType> {
    let found = cells
        .iter()
        .find(|c| c.name == cell)
        .ok_or_else(|| RuntimeError::invalid_model(format!("unknown cell type {}", cell)))?;
    if instance >= found.instances {
        return Err(RuntimeError::invalid_model(format!(
            "{} has {} instances, index {} requested",
            cell, found.instances, instance
        )));
    }
    if found.morphology.index_of(compartment).is_none() {
        return Err(RuntimeError::invalid_model(format!(
            "{} has no compartment {}",
            cell, compartment
        )));
    }
    Ok(found)
}

impl ModelDefinition {
    /// Load, validate and resolve a model file
    pub fn load(path: impl AsRef<Path>, variant: Option<&str>) -> Result<Self> {
        ModelConfig::load(path)?.into_definition(variant)
    }

    /// Channel definition by name
    pub fn channel(&self, name: &str) -> Option<&Arc<ChannelKineticsSpec>> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Cell type by name
    pub fn cell(&self, name: &str) -> Option<&CellType> {
        self.cells.iter().find(|c| c.name == name)
    }

    /// Keep only the cell types named in `keep`, with their stimuli, synapses
    /// and conductances. Unknown names are logged and ignored. Returns the
    /// names of the removed cell types.
    pub fn limit_cells(&mut self, keep: &[&str]) -> Vec<String> {
        for name in keep {
            if self.cell(name).is_none() {
                log::warn!("{} is not a cell type of model {}; ignored", name, self.name);
            }
        }
        let (kept, removed): (Vec<CellType>, Vec<CellType>) = std::mem::take(&mut self.cells)
            .into_iter()
            .partition(|c| keep.contains(&c.name.as_str()));
        self.cells = kept;
        let removed: Vec<String> = removed.into_iter().map(|c| c.name).collect();
        for name in &removed {
            log::info!("Removing cell type {} from model {}", name, self.name);
        }

        self.stimuli.retain(|p| keep.contains(&p.cell.as_str()));
        self.synapses.retain(|s| keep.contains(&s.cell.as_str()));
        self.conductances.restrict_to(keep);
        removed
    }

    /// Instance paths, used as scheduling targets
    pub fn instance_paths(&self) -> Vec<String> {
        self.cells
            .iter()
            .flat_map(|c| (0..c.instances).map(move |i| instance_path(&c.name, i)))
            .collect()
    }
}

/// Path of the `index`-th instance of a cell type
pub fn instance_path(cell: &str, index: usize) -> String {
    format!("/{}_{}", cell, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"
name = "two_variants"
variant = "fit"

[clocks]
sim_dt = 25e-6
plot_dt = 100e-6

[[channels]]
preset = "HHNa"

[[channels]]
name = "Leakish"
reversal = -0.09
[channels.x]
power = 1
[channels.x.law]
form = "tau_inf"
tau = { rate = 5e-3, c = 1.0, vhalf = 0.0, vslope = 1.0 }
inf = { rate = 1.0, c = 1.0, vhalf = 0.04, vslope = -0.01 }

[[variants.fit.bands]]
cell = "hh"
channel = "HHNa"
upper = 1.0
density = 600.0

[[variants.alt.bands]]
cell = "hh"
channel = "HHNa"
upper = 1.0
density = 800.0

[[variants.alt.variance]]
cell = "hh"
channel = "HHNa"
cv = 0.04

[[cells]]
name = "hh"
passive = { cm = 0.01, rm = 0.02, ra = 1.0, em = -0.07 }
compartments = [{ name = "soma", length = 5e-6, diameter = 5e-6, region = "soma" }]
"#;

    fn parse() -> ModelConfig {
        ModelConfig::from_toml_str(MODEL, Path::new("inline.toml")).unwrap()
    }

    #[test]
    fn test_parse_channels() {
        let config = parse();
        assert!(matches!(config.channels[0], ChannelConfig::Preset { .. }));
        assert!(matches!(config.channels[1], ChannelConfig::Inline(_)));
    }

    #[test]
    fn test_variant_selection() {
        let def = parse().into_definition(None).unwrap();
        assert_eq!(def.variant, "fit");
        let soma = ionic_core::Location::new(0.0, Region::Soma);
        assert_eq!(def.conductances.lookup("hh", "HHNa", &soma).unwrap(), 600.0);

        let alt = parse().into_definition(Some("alt")).unwrap();
        assert_eq!(alt.conductances.lookup("hh", "HHNa", &soma).unwrap(), 800.0);

        assert!(parse().into_definition(Some("missing")).is_err());
    }

    #[test]
    fn test_unknown_channel_in_band() {
        let mut config = parse();
        config.variants.get_mut("fit").unwrap().bands[0].channel = "KaF".into();
        let err = config.into_definition(None).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("hh/KaF"));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = parse();
        config.plasticity = Some(PlasticityParams {
            high_threshold: 0.4e-3,
            low_threshold: 0.6e-3,
            high_factor: 1.0,
            low_factor: 1.0,
        });
        let err = config.into_definition(None).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Core(ionic_core::CoreError::InvalidThresholds { .. })
        ));
    }

    #[test]
    fn test_bad_clocks_rejected() {
        let mut config = parse();
        config.clocks.plot_dt = 30e-6;
        assert!(config.into_definition(None).is_err());
    }

    #[test]
    fn test_spike_detector_checked() {
        let mut config = parse();
        config.cells[0].spike_detector.refractory = -1.0;
        let err = config.into_definition(None).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("hh"));
    }

    #[test]
    fn test_limit_cells() {
        let mut config = parse();
        let mut second = config.cells[0].clone();
        second.name = "ball".into();
        config.cells.push(second);
        let mut band = config.variants["fit"].bands[0].clone();
        band.cell = "ball".into();
        config.variants.get_mut("fit").unwrap().bands.push(band);

        let def = config.into_definition(None).unwrap();
        assert_eq!(def.instance_paths(), vec!["/hh_0", "/ball_0"]);

        let mut limited = def.clone();
        assert_eq!(limited.limit_cells(&["ball", "gp"]), vec!["hh".to_string()]);
        assert_eq!(limited.instance_paths(), vec!["/ball_0"]);
        assert_eq!(limited.conductances.cell_types().collect::<Vec<_>>(), vec!["ball"]);

        let mut unchanged = def.clone();
        assert!(unchanged.limit_cells(&["hh", "ball"]).is_empty());
        assert_eq!(unchanged.cells.len(), 2);
    }

    #[test]
    fn test_instance_paths() {
        let mut config = parse();
        config.cells[0].instances = 2;
        let def = config.into_definition(None).unwrap();
        assert_eq!(def.instance_paths(), vec!["/hh_0", "/hh_1"]);
    }
}
