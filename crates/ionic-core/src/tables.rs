//! Tabulated gate rates and the per-run table cache
//!
//! Tables store `A = inf/tau` and `B = 1/tau` at every grid point. A gate is
//! advanced with the exponential Euler step
//! `x' = A/B + (x - A/B)·exp(-B·dt)`.

use crate::{
    error::*,
    grid::{Grid, GridKey},
    kinetics::{ChannelKineticsSpec, GateId, GateRates, GateValues, ZGate},
};
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A/B arrays of one gate over one grid
#[derive(Debug, Clone, PartialEq)]
pub struct GateTable {
    grid: Grid,
    a: Vec<f64>,
    b: Vec<f64>,
}

impl GateTable {
    /// Evaluate `rates` on every point of `grid`
    pub fn build<F>(grid: Grid, rates: F) -> Self
    where
        F: Fn(f64) -> GateRates + Sync,
    {
        #[cfg(feature = "parallel")]
        let values: Vec<GateRates> = (0..grid.divs)
            .into_par_iter()
            .map(|i| rates(grid.point(i)))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let values: Vec<GateRates> = (0..grid.divs).map(|i| rates(grid.point(i))).collect();

        let a = values.iter().map(GateRates::a).collect();
        let b = values.iter().map(GateRates::b).collect();
        Self { grid, a, b }
    }

    /// Grid the table was built on
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Forward terms, one per grid point
    pub fn a(&self) -> &[f64] {
        &self.a
    }

    /// Total rates, one per grid point
    pub fn b(&self) -> &[f64] {
        &self.b
    }

    /// Interpolated `(A, B)` at `x`; values outside the grid use the edge
    pub fn lookup(&self, x: f64) -> (f64, f64) {
        (self.grid.interpolate(&self.a, x), self.grid.interpolate(&self.b, x))
    }

    /// Steady state at `x`
    pub fn inf(&self, x: f64) -> f64 {
        let (a, b) = self.lookup(x);
        a / b
    }

    /// Time constant at `x`
    pub fn tau(&self, x: f64) -> f64 {
        1.0 / self.lookup(x).1
    }

    /// Advance gate `state` by `dt` at axis value `x`
    pub fn advance(&self, state: f64, x: f64, dt: f64) -> f64 {
        let (a, b) = self.lookup(x);
        let inf = a / b;
        inf + (state - inf) * (-b * dt).exp()
    }
}

/// Grids a rate table is built against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableGrids {
    /// Membrane voltage grid
    pub voltage: Grid,
    /// Calcium grid, required for calcium-gated channels
    pub calcium: Option<Grid>,
}

impl TableGrids {
    /// The process-wide voltage and calcium grids
    pub fn standard() -> Self {
        Self {
            voltage: Grid::VOLTAGE,
            calcium: Some(Grid::CALCIUM),
        }
    }

    /// Voltage grid only; calcium-gated channels cannot be built
    pub fn voltage_only(voltage: Grid) -> Self {
        Self {
            voltage,
            calcium: None,
        }
    }
}

impl Default for TableGrids {
    fn default() -> Self {
        Self::standard()
    }
}

/// Tabulated kinetics of one channel
#[derive(Debug, Clone)]
pub struct RateTable {
    spec: Arc<ChannelKineticsSpec>,
    x: Option<GateTable>,
    y: Option<GateTable>,
    z: Option<GateTable>,
}

impl RateTable {
    /// Validate `spec` and tabulate every gate it defines
    pub fn build(spec: Arc<ChannelKineticsSpec>, grids: &TableGrids) -> Result<Self> {
        spec.validate()?;

        let x = spec.x.map(|g| GateTable::build(grids.voltage, move |v| g.law.rates(v)));
        let y = spec.y.map(|g| GateTable::build(grids.voltage, move |v| g.law.rates(v)));
        let z = match spec.z {
            None => None,
            Some(ZGate::Voltage(g)) => {
                Some(GateTable::build(grids.voltage, move |v| g.law.rates(v)))
            }
            Some(ZGate::Calcium(g)) => {
                let grid = grids.calcium.ok_or_else(|| CoreError::MissingCalciumGrid {
                    channel: spec.name.clone(),
                })?;
                Some(GateTable::build(grid, move |ca| g.rates(ca)))
            }
        };

        log::debug!(
            "Tabulated channel {} ({} voltage points{})",
            spec.name,
            grids.voltage.divs,
            if spec.is_calcium_gated() { ", calcium-gated Z" } else { "" }
        );

        Ok(Self { spec, x, y, z })
    }

    /// Channel definition behind the table
    pub fn spec(&self) -> &Arc<ChannelKineticsSpec> {
        &self.spec
    }

    /// Table of one gate, if the channel has it
    pub fn gate(&self, id: GateId) -> Option<&GateTable> {
        match id {
            GateId::X => self.x.as_ref(),
            GateId::Y => self.y.as_ref(),
            GateId::Z => self.z.as_ref(),
        }
    }

    fn z_axis(&self, v: f64, ca: f64) -> f64 {
        if self.spec.is_calcium_gated() {
            ca
        } else {
            v
        }
    }

    /// Gate values at rest, used to initialise channel instances
    pub fn steady_state(&self, v: f64, ca: f64) -> GateValues {
        let za = self.z_axis(v, ca);
        GateValues {
            x: self.x.as_ref().map_or(1.0, |t| t.inf(v)),
            y: self.y.as_ref().map_or(1.0, |t| t.inf(v)),
            z: self.z.as_ref().map_or(1.0, |t| t.inf(za)),
        }
    }

    /// Advance all gates by `dt`
    pub fn advance(&self, gates: &mut GateValues, v: f64, ca: f64, dt: f64) {
        if let Some(t) = &self.x {
            gates.x = t.advance(gates.x, v, dt);
        }
        if let Some(t) = &self.y {
            gates.y = t.advance(gates.y, v, dt);
        }
        if let Some(t) = &self.z {
            gates.z = t.advance(gates.z, self.z_axis(v, ca), dt);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    channel: String,
    voltage: GridKey,
    calcium: Option<GridKey>,
}

/// Lazily built rate tables, shared by every instance of a channel
#[derive(Debug, Default)]
pub struct TableCache {
    tables: HashMap<CacheKey, Arc<RateTable>>,
    specs: HashMap<String, Arc<ChannelKineticsSpec>>,
}

impl TableCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the table for `spec` on `grids`, building it on first use.
    ///
    /// A second, different definition under an existing channel name is
    /// rejected with [`CoreError::ConflictingChannel`].
    pub fn get_or_build(
        &mut self,
        spec: &Arc<ChannelKineticsSpec>,
        grids: &TableGrids,
    ) -> Result<Arc<RateTable>> {
        match self.specs.get(&spec.name) {
            Some(known) if known.as_ref() != spec.as_ref() => {
                return Err(CoreError::ConflictingChannel {
                    channel: spec.name.clone(),
                });
            }
            Some(_) => {}
            None => {
                spec.validate()?;
                self.specs.insert(spec.name.clone(), Arc::clone(spec));
            }
        }

        // calcium grid only distinguishes tables that read it
        let calcium = if spec.is_calcium_gated() {
            grids.calcium.map(|g| g.key())
        } else {
            None
        };
        let key = CacheKey {
            channel: spec.name.clone(),
            voltage: grids.voltage.key(),
            calcium,
        };

        if let Some(table) = self.tables.get(&key) {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(RateTable::build(Arc::clone(spec), grids)?);
        self.tables.insert(key, Arc::clone(&table));
        Ok(table)
    }

    /// Number of distinct tables built so far
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no table has been built
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
