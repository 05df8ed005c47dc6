//! Rate table dumps

use clap::Args;
use ionic_core::{GateId, RateTable, TableGrids};
use ionic_runtime::ModelDefinition;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

use crate::error::{CliError, CliResult};

/// Dump the tabulated steady states and time constants of one channel
#[derive(Args, Debug)]
pub struct TablesCommand {
    /// Model file (.toml)
    pub model: PathBuf,

    /// Channel name
    pub channel: String,

    /// Output directory; tables go to stdout when omitted
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

impl TablesCommand {
    pub fn execute(self) -> CliResult<()> {
        let def = ModelDefinition::load(&self.model, None)?;
        let spec = def.channel(&self.channel).cloned().ok_or_else(|| {
            CliError::invalid_args(format!(
                "model {} has no channel {}",
                def.name, self.channel
            ))
        })?;
        let table = RateTable::build(spec, &TableGrids::standard())?;

        match &self.out {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let path = dir.join(format!("{}_tables.txt", self.channel));
                let mut writer = BufWriter::new(File::create(&path)?);
                write_tables(&table, &mut writer)?;
                writer.flush()?;
                info!("Tables of {} written to {}", self.channel, path.display());
            }
            None => {
                let stdout = io::stdout();
                let mut lock = stdout.lock();
                write_tables(&table, &mut lock)?;
            }
        }
        Ok(())
    }
}

/// Write one block per gate: axis value, steady state and time constant
pub fn write_tables<W: Write>(table: &RateTable, out: &mut W) -> io::Result<()> {
    let spec = table.spec();
    for id in [GateId::X, GateId::Y, GateId::Z] {
        let Some(gate) = table.gate(id) else {
            continue;
        };
        let axis = if id == GateId::Z && spec.is_calcium_gated() {
            "ca"
        } else {
            "vm"
        };
        writeln!(out, "# {} gate {}: {} inf tau", spec.name, id, axis)?;
        for (i, x) in gate.grid().points().enumerate() {
            let (a, b) = (gate.a()[i], gate.b()[i]);
            writeln!(out, "{:e} {:e} {:e}", x, a / b, 1.0 / b)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ionic_core::{presets, Grid};
    use std::sync::Arc;

    #[test]
    fn test_write_tables_blocks() {
        let grids = TableGrids::voltage_only(Grid::new(-0.1, 0.05, 16).unwrap());
        let table = RateTable::build(Arc::new(presets::hh_naf()), &grids).unwrap();
        let mut out = Vec::new();
        write_tables(&table, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let headers: Vec<&str> = text.lines().filter(|l| l.starts_with('#')).collect();
        assert_eq!(headers.len(), 2);
        assert!(headers[0].contains("gate X: vm"));
        assert!(headers[1].contains("gate Y: vm"));
        assert_eq!(text.lines().count(), 2 + 2 * 16);

        for line in text.lines().filter(|l| !l.starts_with('#')) {
            let cols: Vec<f64> = line.split(' ').map(|c| c.parse().unwrap()).collect();
            assert!(cols[1] >= 0.0 && cols[1] <= 1.0 + 1e-12);
            assert!(cols[2] > 0.0);
        }
    }
}
