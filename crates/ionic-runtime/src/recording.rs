//! Trace recording and run results

use crate::{cell::CellInstance, error::*};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Recorded quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    /// Membrane potential (V)
    Voltage,
    /// Calcium concentration (mM)
    Calcium,
    /// Plasticity weight factor
    PlasticityWeight,
    /// Inward channel current (A)
    ChannelCurrent,
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TraceKind::Voltage => "Vm",
            TraceKind::Calcium => "Ca",
            TraceKind::PlasticityWeight => "weight",
            TraceKind::ChannelCurrent => "Ik",
        };
        write!(f, "{}", name)
    }
}

/// Identity of one trace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TraceKey {
    /// Cell instance path
    pub instance: String,
    /// Compartment, `compartment/channel` or `compartment/synapse`
    pub element: String,
    /// Quantity
    pub kind: TraceKind,
}

impl fmt::Display for TraceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.instance, self.element, self.kind)
    }
}

/// One recorded trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Identity
    pub key: TraceKey,
    /// Samples, one per entry of [`RunResult::times`]
    pub values: Vec<f64>,
}

impl Trace {
    /// Largest sample
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Last sample
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Number of upward crossings of `level`
    pub fn upward_crossings(&self, level: f64) -> usize {
        self.values
            .windows(2)
            .filter(|w| w[0] <= level && w[1] > level)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Probe {
    Voltage { cell: usize, comp: usize },
    Calcium { cell: usize, comp: usize },
    Current { cell: usize, comp: usize, channel: usize },
    Weight { cell: usize, comp: usize, synapse: usize },
}

impl Probe {
    fn sample(&self, cells: &[CellInstance]) -> f64 {
        match *self {
            Probe::Voltage { cell, comp } => cells[cell].compartments[comp].vm,
            Probe::Calcium { cell, comp } => cells[cell].compartments[comp].calcium(),
            Probe::Current { cell, comp, channel } => {
                cells[cell].compartments[comp].channels[channel].current
            }
            Probe::Weight { cell, comp, synapse } => {
                cells[cell].compartments[comp].synapses[synapse].effective_weight()
            }
        }
    }
}

/// Samples every probe on the recording clock
#[derive(Debug, Clone)]
pub struct Recorder {
    probes: Vec<Probe>,
    times: Vec<f64>,
    traces: Vec<Trace>,
}

impl Recorder {
    /// Probe `compartments` (all when empty) of every cell; channel currents
    /// only when `currents` is set
    pub fn new(cells: &[CellInstance], compartments: &[String], currents: bool) -> Self {
        let mut probes = Vec::new();
        let mut traces = Vec::new();
        let mut add = |probe: Probe, instance: &str, element: String, kind: TraceKind| {
            probes.push(probe);
            traces.push(Trace {
                key: TraceKey {
                    instance: instance.to_string(),
                    element,
                    kind,
                },
                values: Vec::new(),
            });
        };

        for (ci, cell) in cells.iter().enumerate() {
            for (k, comp) in cell.compartments.iter().enumerate() {
                if !compartments.is_empty() && !compartments.contains(&comp.name) {
                    continue;
                }
                add(Probe::Voltage { cell: ci, comp: k }, &cell.path, comp.name.clone(), TraceKind::Voltage);
                if comp.pool.is_some() {
                    add(Probe::Calcium { cell: ci, comp: k }, &cell.path, comp.name.clone(), TraceKind::Calcium);
                }
                if currents {
                    for (h, channel) in comp.channels.iter().enumerate() {
                        add(
                            Probe::Current { cell: ci, comp: k, channel: h },
                            &cell.path,
                            format!("{}/{}", comp.name, channel.name()),
                            TraceKind::ChannelCurrent,
                        );
                    }
                }
            }
            // plastic weights are always recorded
            for (k, comp) in cell.compartments.iter().enumerate() {
                for (s, syn) in comp.synapses.iter().enumerate() {
                    if syn.plasticity.is_some() {
                        add(
                            Probe::Weight { cell: ci, comp: k, synapse: s },
                            &cell.path,
                            format!("{}/{}", comp.name, syn.name),
                            TraceKind::PlasticityWeight,
                        );
                    }
                }
            }
        }
        log::debug!("Recording {} traces", traces.len());
        Self {
            probes,
            times: Vec::new(),
            traces,
        }
    }

    /// Take one sample of every probe at time `t`
    pub fn sample(&mut self, t: f64, cells: &[CellInstance]) {
        self.times.push(t);
        for (probe, trace) in self.probes.iter().zip(&mut self.traces) {
            trace.values.push(probe.sample(cells));
        }
    }

    /// Number of samples taken
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether no sample was taken yet
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub(crate) fn finish(self) -> (Vec<f64>, Vec<Trace>) {
        (self.times, self.traces)
    }
}

/// Outcome of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Model name
    pub model: String,
    /// Conductance variant
    pub variant: String,
    /// Seed of the instance variance draw
    pub seed: u64,
    /// Simulated time (s)
    pub stop_time: f64,
    /// Integration ticks executed
    pub ticks: u64,
    /// Sample times (s)
    pub times: Vec<f64>,
    /// Recorded traces
    pub traces: Vec<Trace>,
    /// Detected spike times per cell instance (s)
    pub spikes: BTreeMap<String, Vec<f64>>,
}

impl RunResult {
    /// All traces
    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    /// Trace by identity
    pub fn trace(&self, instance: &str, element: &str, kind: TraceKind) -> Option<&Trace> {
        self.traces
            .iter()
            .find(|t| t.key.kind == kind && t.key.instance == instance && t.key.element == element)
    }

    /// Spike times of one instance
    pub fn spikes_for(&self, instance: &str) -> &[f64] {
        self.spikes.get(instance).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total detected spikes
    pub fn total_spikes(&self) -> usize {
        self.spikes.values().map(Vec::len).sum()
    }

    /// Whitespace-separated table: a header line, then one row per sample
    /// with the time followed by every trace
    pub fn write_text<W: Write>(&self, mut out: W) -> Result<()> {
        write!(out, "# time")?;
        for trace in &self.traces {
            write!(out, " {}", trace.key)?;
        }
        writeln!(out)?;
        for (row, t) in self.times.iter().enumerate() {
            write!(out, "{:e}", t)?;
            for trace in &self.traces {
                write!(out, " {:e}", trace.values[row])?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Write the text table to `path`
    pub fn save_text(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = BufWriter::new(File::create(path.as_ref())?);
        self.write_text(&mut out)?;
        out.flush()?;
        log::info!("Wrote {} traces to {}", self.traces.len(), path.as_ref().display());
        Ok(())
    }

    /// Write the whole result as JSON to `path`
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }
}
