//! Tabulation grids shared by every rate table

use crate::error::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lower voltage bound of the shared grid (V)
pub const VMIN: f64 = -120e-3;
/// Upper voltage bound of the shared grid (V)
pub const VMAX: f64 = 50e-3;
/// Voltage grid points (0.05 mV spacing)
pub const VDIVS: usize = 3401;

/// Lower calcium bound of the shared grid (mM, 10 nM)
pub const CAMIN: f64 = 0.01e-3;
/// Upper calcium bound of the shared grid (mM, 40 µM)
pub const CAMAX: f64 = 40e-3;
/// Calcium grid points (10 nM spacing)
pub const CADIVS: usize = 4000;

/// Evenly spaced tabulation axis, inclusive of both bounds
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grid {
    /// First grid point
    pub min: f64,
    /// Last grid point
    pub max: f64,
    /// Number of points
    pub divs: usize,
}

/// Hashable identity of a grid, used to key cached tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridKey {
    min_bits: u64,
    max_bits: u64,
    divs: usize,
}

impl Grid {
    /// Process-wide membrane voltage grid
    pub const VOLTAGE: Grid = Grid {
        min: VMIN,
        max: VMAX,
        divs: VDIVS,
    };

    /// Process-wide calcium concentration grid
    pub const CALCIUM: Grid = Grid {
        min: CAMIN,
        max: CAMAX,
        divs: CADIVS,
    };

    /// Create a grid with validation
    pub fn new(min: f64, max: f64, divs: usize) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || max <= min {
            return Err(CoreError::invalid_parameter(
                "grid bounds",
                format!("[{}, {}]", min, max),
                "finite with max > min",
            ));
        }
        if divs < 2 {
            return Err(CoreError::invalid_parameter(
                "grid divs",
                divs.to_string(),
                ">= 2",
            ));
        }
        Ok(Self { min, max, divs })
    }

    /// Distance between neighbouring points
    pub fn step(&self) -> f64 {
        (self.max - self.min) / (self.divs - 1) as f64
    }

    /// Value of the i-th grid point
    pub fn point(&self, i: usize) -> f64 {
        self.min + i as f64 * self.step()
    }

    /// Iterate over all grid points
    pub fn points(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.divs).map(move |i| self.point(i))
    }

    /// Identity key for caching
    pub fn key(&self) -> GridKey {
        GridKey {
            min_bits: self.min.to_bits(),
            max_bits: self.max.to_bits(),
            divs: self.divs,
        }
    }

    /// Lower neighbour index and fractional offset for `x`, clamped to the grid
    pub fn locate(&self, x: f64) -> (usize, f64) {
        if !(x > self.min) {
            return (0, 0.0);
        }
        if x >= self.max {
            return (self.divs - 2, 1.0);
        }
        let pos = (x - self.min) / self.step();
        let i = (pos.floor() as usize).min(self.divs - 2);
        (i, pos - i as f64)
    }

    /// Linear interpolation of `values` (one per grid point) at `x`
    pub fn interpolate(&self, values: &[f64], x: f64) -> f64 {
        debug_assert_eq!(values.len(), self.divs);
        let (i, frac) = self.locate(x);
        values[i] + frac * (values[i + 1] - values[i])
    }
}
