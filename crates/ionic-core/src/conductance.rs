//! Peak conductance densities by cell type, channel and distance band

use crate::error::*;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Morphological region of a compartment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Region {
    /// Cell body
    Soma,
    /// Dendritic tree
    Dendrite,
    /// Axon
    Axon,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Soma => write!(f, "soma"),
            Region::Dendrite => write!(f, "dendrite"),
            Region::Axon => write!(f, "axon"),
        }
    }
}

/// Position of a compartment: path distance from the soma and region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Path distance from the soma centre (m)
    pub distance: f64,
    /// Region of the compartment
    pub region: Region,
}

impl Location {
    /// Create a location
    pub fn new(distance: f64, region: Region) -> Self {
        Self { distance, region }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {:e} m", self.region, self.distance)
    }
}

/// Half-open path-distance interval `[lower, upper)`, optionally region tagged
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DistanceBand {
    /// Inclusive lower bound (m)
    pub lower: f64,
    /// Exclusive upper bound (m)
    pub upper: f64,
    /// Region the band is restricted to; untagged bands match any region
    #[cfg_attr(feature = "serde", serde(default))]
    pub region: Option<Region>,
}

impl DistanceBand {
    /// Untagged band `[lower, upper)`
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            region: None,
        }
    }

    /// Band restricted to one region
    pub fn in_region(lower: f64, upper: f64, region: Region) -> Self {
        Self {
            lower,
            upper,
            region: Some(region),
        }
    }

    /// Validate bounds
    pub fn validate(&self) -> Result<()> {
        if !self.lower.is_finite() || self.lower < 0.0 {
            return Err(CoreError::invalid_parameter(
                "band lower bound",
                self.lower.to_string(),
                "finite and >= 0",
            ));
        }
        if self.upper.is_nan() || self.upper <= self.lower {
            return Err(CoreError::invalid_parameter(
                "band upper bound",
                format!("{}", self),
                "upper > lower",
            ));
        }
        Ok(())
    }

    /// Whether `location` falls inside the band
    pub fn contains(&self, location: &Location) -> bool {
        let region_ok = self.region.map_or(true, |r| r == location.region);
        region_ok && location.distance >= self.lower && location.distance < self.upper
    }

    /// Whether two bands can both match one location
    pub fn overlaps(&self, other: &DistanceBand) -> bool {
        self.region == other.region && self.lower < other.upper && other.lower < self.upper
    }
}

impl fmt::Display for DistanceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:e}, {:e})", self.lower, self.upper)?;
        if let Some(region) = self.region {
            write!(f, " {}", region)?;
        }
        Ok(())
    }
}

/// How overlapping bands of one channel are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OverlapPolicy {
    /// Overlaps are a configuration error; bands are sorted by lower bound
    #[default]
    Reject,
    /// Overlaps allowed; the first band in declaration order wins
    DeclaredOrder,
}

/// What a lookup does when no band covers a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GapPolicy {
    /// Log a warning and use zero conductance
    #[default]
    ZeroWithWarning,
    /// Fail with [`CoreError::CoverageGap`]
    Strict,
}

/// Ordered `(band, density)` pairs of one channel in one cell type
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BandTable {
    bands: Vec<(DistanceBand, f64)>,
}

impl BandTable {
    /// Bands in matching order
    pub fn bands(&self) -> &[(DistanceBand, f64)] {
        &self.bands
    }

    /// First matching density; region-tagged bands take precedence
    pub fn density_at(&self, location: &Location) -> Option<f64> {
        let tagged = self
            .bands
            .iter()
            .find(|(band, _)| band.region.is_some() && band.contains(location));
        tagged
            .or_else(|| {
                self.bands
                    .iter()
                    .find(|(band, _)| band.region.is_none() && band.contains(location))
            })
            .map(|(_, density)| *density)
    }

    fn check_overlaps(&self, cell_type: &str, channel: &str) -> Result<()> {
        for (i, (first, _)) in self.bands.iter().enumerate() {
            for (second, _) in &self.bands[i + 1..] {
                if first.overlaps(second) {
                    return Err(CoreError::OverlappingBands {
                        cell_type: cell_type.to_string(),
                        channel: channel.to_string(),
                        first: first.to_string(),
                        second: second.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn sort(&mut self) {
        self.bands.sort_by(|(a, _), (b, _)| {
            a.region
                .cmp(&b.region)
                .then(a.lower.total_cmp(&b.lower))
        });
    }
}

/// Conductances of every channel of one cell type
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellConductances {
    channels: BTreeMap<String, BandTable>,
    variance: BTreeMap<String, f64>,
}

impl CellConductances {
    /// Channel names with at least one band
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Band table of one channel
    pub fn bands(&self, channel: &str) -> Option<&BandTable> {
        self.channels.get(channel)
    }

    /// Coefficient of variation of one channel, if configured
    pub fn variance(&self, channel: &str) -> Option<f64> {
        self.variance.get(channel).copied()
    }
}

/// Peak conductance densities (S/m²) keyed by cell type, channel and band.
///
/// A set is mutable (for calibration and sweeps) while owned by the caller.
/// Simulations copy the densities into their channel instances at setup,
/// so a running simulation never sees later changes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConductanceSet {
    cells: BTreeMap<String, CellConductances>,
    overlap: OverlapPolicy,
    gap: GapPolicy,
}

impl ConductanceSet {
    /// Start building a set
    pub fn builder() -> ConductanceSetBuilder {
        ConductanceSetBuilder::default()
    }

    /// Cell type names
    pub fn cell_types(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    /// Conductances of one cell type
    pub fn cell(&self, cell_type: &str) -> Result<&CellConductances> {
        self.cells
            .get(cell_type)
            .ok_or_else(|| CoreError::UnknownCellType {
                cell_type: cell_type.to_string(),
            })
    }

    /// Overlap policy the set was built with
    pub fn overlap_policy(&self) -> OverlapPolicy {
        self.overlap
    }

    /// Gap policy applied by [`ConductanceSet::lookup`]
    pub fn gap_policy(&self) -> GapPolicy {
        self.gap
    }

    /// Peak density of `channel` in `cell_type` at `location`.
    ///
    /// A channel not listed for the cell type is absent and yields 0. A listed
    /// channel with no band covering the location is a coverage gap, handled
    /// by the gap policy.
    pub fn lookup(&self, cell_type: &str, channel: &str, location: &Location) -> Result<f64> {
        let cell = self.cell(cell_type)?;
        let Some(table) = cell.channels.get(channel) else {
            return Ok(0.0);
        };
        match table.density_at(location) {
            Some(density) => Ok(density),
            None => match self.gap {
                GapPolicy::ZeroWithWarning => {
                    log::warn!(
                        "No band of {}/{} covers {}, using zero conductance",
                        cell_type,
                        channel,
                        location
                    );
                    Ok(0.0)
                }
                GapPolicy::Strict => Err(CoreError::CoverageGap {
                    cell_type: cell_type.to_string(),
                    channel: channel.to_string(),
                    location: location.to_string(),
                }),
            },
        }
    }

    /// Density for one compartment instance, perturbed by `|N(1, cv)|` when a
    /// coefficient of variation is configured for the channel
    pub fn instance_density<R: Rng + ?Sized>(
        &self,
        cell_type: &str,
        channel: &str,
        location: &Location,
        rng: &mut R,
    ) -> Result<f64> {
        let density = self.lookup(cell_type, channel, location)?;
        let cv = self.cell(cell_type)?.variance(channel).unwrap_or(0.0);
        if cv <= 0.0 {
            return Ok(density);
        }
        let normal = Normal::new(1.0, cv).map_err(|e| {
            CoreError::invalid_parameter("coefficient of variation", cv.to_string(), e.to_string())
        })?;
        Ok(density * normal.sample(rng).abs())
    }

    fn table_mut(&mut self, cell_type: &str, channel: &str) -> Result<&mut BandTable> {
        let cell = self
            .cells
            .get_mut(cell_type)
            .ok_or_else(|| CoreError::UnknownCellType {
                cell_type: cell_type.to_string(),
            })?;
        cell.channels.get_mut(channel).ok_or_else(|| {
            CoreError::invalid_parameter(
                "channel",
                format!("{}/{}", cell_type, channel),
                "a channel listed for the cell type",
            )
        })
    }

    /// Multiply every band of a channel by `factor`
    pub fn scale_channel(&mut self, cell_type: &str, channel: &str, factor: f64) -> Result<()> {
        check_factor(factor)?;
        for (_, density) in &mut self.table_mut(cell_type, channel)?.bands {
            *density *= factor;
        }
        log::debug!("Scaled {}/{} by {}", cell_type, channel, factor);
        Ok(())
    }

    /// Multiply a single band of a channel by `factor`
    pub fn scale_band(
        &mut self,
        cell_type: &str,
        channel: &str,
        band: &DistanceBand,
        factor: f64,
    ) -> Result<()> {
        check_factor(factor)?;
        let table = self.table_mut(cell_type, channel)?;
        let entry = table
            .bands
            .iter_mut()
            .find(|(b, _)| b == band)
            .ok_or_else(|| {
                CoreError::invalid_parameter(
                    "band",
                    format!("{}/{} {}", cell_type, channel, band),
                    "a band declared for the channel",
                )
            })?;
        entry.1 *= factor;
        Ok(())
    }

    /// Drop every cell type not named in `cell_types`
    pub fn restrict_to(&mut self, cell_types: &[&str]) {
        self.cells.retain(|name, _| cell_types.contains(&name.as_str()));
    }
}

fn check_factor(factor: f64) -> Result<()> {
    if !factor.is_finite() || factor < 0.0 {
        return Err(CoreError::invalid_parameter(
            "scale factor",
            factor.to_string(),
            "finite and >= 0",
        ));
    }
    Ok(())
}

/// Validating builder for [`ConductanceSet`]
#[derive(Debug, Clone, Default)]
pub struct ConductanceSetBuilder {
    cells: BTreeMap<String, CellConductances>,
    overlap: OverlapPolicy,
    gap: GapPolicy,
}

impl ConductanceSetBuilder {
    /// Declare a cell type, possibly without channels
    pub fn cell_type(mut self, cell_type: impl Into<String>) -> Self {
        self.cells.entry(cell_type.into()).or_default();
        self
    }

    /// Add a band with its peak density (S/m²)
    pub fn band(
        mut self,
        cell_type: impl Into<String>,
        channel: impl Into<String>,
        band: DistanceBand,
        density: f64,
    ) -> Self {
        self.cells
            .entry(cell_type.into())
            .or_default()
            .channels
            .entry(channel.into())
            .or_default()
            .bands
            .push((band, density));
        self
    }

    /// Per-instance coefficient of variation for a channel
    pub fn variance(mut self, cell_type: impl Into<String>, channel: impl Into<String>, cv: f64) -> Self {
        self.cells
            .entry(cell_type.into())
            .or_default()
            .variance
            .insert(channel.into(), cv);
        self
    }

    /// Set the overlap policy
    pub fn overlap_policy(mut self, policy: OverlapPolicy) -> Self {
        self.overlap = policy;
        self
    }

    /// Set the gap policy
    pub fn gap_policy(mut self, policy: GapPolicy) -> Self {
        self.gap = policy;
        self
    }

    /// Validate and build the set
    pub fn build(mut self) -> Result<ConductanceSet> {
        for (cell_type, cell) in &mut self.cells {
            for (channel, table) in &mut cell.channels {
                for (band, density) in &table.bands {
                    band.validate()?;
                    if !density.is_finite() || *density < 0.0 {
                        return Err(CoreError::invalid_parameter(
                            format!("{}/{} density", cell_type, channel),
                            density.to_string(),
                            "finite and >= 0",
                        ));
                    }
                }
                if self.overlap == OverlapPolicy::Reject {
                    table.check_overlaps(cell_type, channel)?;
                    table.sort();
                }
            }
            for (channel, cv) in &cell.variance {
                if !cv.is_finite() || *cv < 0.0 {
                    return Err(CoreError::invalid_parameter(
                        format!("{}/{} variance", cell_type, channel),
                        cv.to_string(),
                        "finite and >= 0",
                    ));
                }
            }
        }
        log::debug!(
            "Built conductance set with {} cell types ({:?}, {:?})",
            self.cells.len(),
            self.overlap,
            self.gap
        );
        Ok(ConductanceSet {
            cells: self.cells,
            overlap: self.overlap,
            gap: self.gap,
        })
    }
}
