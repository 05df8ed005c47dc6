//! Model validation and summary

use clap::Args;
use ionic_core::ChannelKineticsSpec;
use ionic_runtime::{ModelConfig, ModelDefinition};
use std::path::PathBuf;
use tracing::info;

use crate::error::CliResult;

/// Validate a model file
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Model file (.toml)
    pub model: PathBuf,

    /// Conductance variant (defaults to the one the file selects)
    #[arg(long)]
    pub variant: Option<String>,
}

impl CheckCommand {
    pub fn execute(self) -> CliResult<()> {
        let config = ModelConfig::load(&self.model)?;
        let variants: Vec<String> = config.variant_names().into_iter().map(String::from).collect();
        let def = config.into_definition(self.variant.as_deref())?;
        info!("{} is valid", self.model.display());
        print!("{}", summary(&def, &variants));
        Ok(())
    }
}

fn gate_signature(spec: &ChannelKineticsSpec) -> String {
    let mut parts = Vec::new();
    if let Some(x) = &spec.x {
        parts.push(format!("X^{}", x.power));
    }
    if let Some(y) = &spec.y {
        parts.push(format!("Y^{}", y.power));
    }
    if let Some(z) = &spec.z {
        let axis = if z.is_calcium() { "(Ca)" } else { "" };
        parts.push(format!("Z{}^{}", axis, z.power()));
    }
    if parts.is_empty() {
        "ungated".to_string()
    } else {
        parts.join(" ")
    }
}

/// Human-readable description of a resolved model
pub fn summary(def: &ModelDefinition, variants: &[String]) -> String {
    let mut out = String::new();
    out.push_str(&format!("model {} (variant {})\n", def.name, def.variant));
    if variants.len() > 1 {
        out.push_str(&format!("variants: {}\n", variants.join(", ")));
    }

    out.push_str(&format!("channels: {}\n", def.channels.len()));
    for spec in &def.channels {
        out.push_str(&format!(
            "  {:<8} E={:+.1} mV  {}{}\n",
            spec.name,
            spec.reversal * 1e3,
            gate_signature(spec),
            if spec.calcium_permeable { "  Ca-permeable" } else { "" }
        ));
    }

    out.push_str(&format!("cells: {}\n", def.cells.len()));
    for cell in &def.cells {
        out.push_str(&format!(
            "  {} x{}: {} compartments{}\n",
            cell.name,
            cell.instances,
            cell.morphology.len(),
            if cell.calcium.is_some() { ", calcium pool" } else { "" }
        ));
        if let Ok(conductances) = def.conductances.cell(&cell.name) {
            for channel in conductances.channels() {
                let bands = conductances.bands(channel).map_or(0, |b| b.bands().len());
                let variance = conductances
                    .variance(channel)
                    .map(|cv| format!(", cv {}", cv))
                    .unwrap_or_default();
                out.push_str(&format!("    {} in {} band(s){}\n", channel, bands, variance));
            }
        }
    }

    out.push_str(&format!(
        "stimuli: {}, synapses: {}, plasticity: {}\n",
        def.stimuli.len(),
        def.synapses.len(),
        if def.plasticity.is_some() { "on" } else { "off" }
    ));
    out.push_str(&format!(
        "clocks: sim_dt {:e} s, plot_dt {:e} s, {}\n",
        def.clocks.sim_dt,
        def.clocks.plot_dt,
        if def.clocks.implicit { "implicit" } else { "explicit" }
    ));
    out
}
