//! Compartment trees

use crate::error::*;
use ionic_core::{Location, Region};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::f64::consts::PI;

/// Declared compartment of a cell type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentSpec {
    /// Name, unique within the cell
    pub name: String,
    /// Parent compartment; exactly one compartment (the root) has none
    #[serde(default)]
    pub parent: Option<String>,
    /// Length (m); 0 makes the root a sphere
    pub length: f64,
    /// Diameter (m)
    pub diameter: f64,
    /// Region used for conductance lookup
    #[serde(default = "default_region")]
    pub region: Region,
}

fn default_region() -> Region {
    Region::Dendrite
}

/// Compartment with resolved topology
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Name
    pub name: String,
    /// Index of the parent, `None` for the root
    pub parent: Option<usize>,
    /// Indices of the children
    pub children: SmallVec<[usize; 4]>,
    /// Length (m)
    pub length: f64,
    /// Diameter (m)
    pub diameter: f64,
    /// Region
    pub region: Region,
    /// Path distance from the root centre (m)
    pub distance: f64,
}

impl Segment {
    /// Membrane area (m²); a zero-length segment is a sphere
    pub fn area(&self) -> f64 {
        if self.length == 0.0 {
            PI * self.diameter * self.diameter
        } else {
            PI * self.diameter * self.length
        }
    }

    /// Axial resistance end to end (Ω) for specific resistivity `ra` (Ω·m)
    pub fn axial_resistance(&self, ra: f64) -> f64 {
        4.0 * ra * self.length / (PI * self.diameter * self.diameter)
    }

    /// Volume of a submembrane shell of `thickness` (m³)
    pub fn shell_volume(&self, thickness: f64) -> f64 {
        let r = self.diameter / 2.0;
        let inner = (r - thickness).max(0.0);
        if self.length == 0.0 {
            4.0 / 3.0 * PI * (r.powi(3) - inner.powi(3))
        } else {
            PI * self.length * (r * r - inner * inner)
        }
    }

    /// Conductance lookup location
    pub fn location(&self) -> Location {
        Location::new(self.distance, self.region)
    }
}

/// Compartment tree, parents always stored before their children
#[derive(Debug, Clone, PartialEq)]
pub struct Morphology {
    segments: Vec<Segment>,
}

impl Morphology {
    /// Resolve names to indices and validate the tree
    pub fn build(specs: &[CompartmentSpec]) -> Result<Self> {
        if specs.is_empty() {
            return Err(RuntimeError::invalid_model("cell has no compartments"));
        }
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut segments: Vec<Segment> = Vec::with_capacity(specs.len());

        for spec in specs {
            if index.contains_key(spec.name.as_str()) {
                return Err(RuntimeError::invalid_model(format!(
                    "duplicate compartment {}",
                    spec.name
                )));
            }
            if !(spec.diameter > 0.0) || !spec.diameter.is_finite() {
                return Err(RuntimeError::invalid_parameter(
                    format!("{} diameter", spec.name),
                    spec.diameter.to_string(),
                    "> 0.0",
                ));
            }
            if !(spec.length >= 0.0) || !spec.length.is_finite() {
                return Err(RuntimeError::invalid_parameter(
                    format!("{} length", spec.name),
                    spec.length.to_string(),
                    ">= 0.0",
                ));
            }

            let parent = match &spec.parent {
                None if segments.is_empty() => None,
                None => {
                    return Err(RuntimeError::invalid_model(format!(
                        "compartment {} has no parent; only the first compartment may be the root",
                        spec.name
                    )))
                }
                Some(p) => Some(*index.get(p.as_str()).ok_or_else(|| {
                    RuntimeError::invalid_model(format!(
                        "parent {} of {} must be declared before it",
                        p, spec.name
                    ))
                })?),
            };
            if parent.is_some() && spec.length == 0.0 {
                return Err(RuntimeError::invalid_parameter(
                    format!("{} length", spec.name),
                    "0",
                    "> 0.0 for non-root compartments",
                ));
            }

            let i = segments.len();
            let distance = match parent {
                None => 0.0,
                Some(p) => {
                    segments[p].children.push(i);
                    segments[p].distance + segments[p].length / 2.0 + spec.length / 2.0
                }
            };
            segments.push(Segment {
                name: spec.name.clone(),
                parent,
                children: SmallVec::new(),
                length: spec.length,
                diameter: spec.diameter,
                region: spec.region,
                distance,
            });
            index.insert(spec.name.as_str(), i);
        }

        Ok(Self { segments })
    }

    /// Number of compartments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the tree is empty (never true for a built tree)
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// All compartments, parents first
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Compartment at `i`
    pub fn segment(&self, i: usize) -> &Segment {
        &self.segments[i]
    }

    /// Index of a named compartment
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.segments.iter().position(|s| s.name == name)
    }

    /// Axial conductance between compartment `i` and its parent (S)
    pub fn coupling(&self, i: usize, ra: f64) -> Option<f64> {
        let seg = &self.segments[i];
        let parent = &self.segments[seg.parent?];
        let r = (seg.axial_resistance(ra) + parent.axial_resistance(ra)) / 2.0;
        Some(1.0 / r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(name: &str, parent: Option<&str>, length: f64, region: Region) -> CompartmentSpec {
        CompartmentSpec {
            name: name.into(),
            parent: parent.map(String::from),
            length,
            diameter: 2e-6,
            region,
        }
    }

    #[test]
    fn test_path_distance() {
        let m = Morphology::build(&[
            comp("soma", None, 0.0, Region::Soma),
            comp("d1", Some("soma"), 20e-6, Region::Dendrite),
            comp("d2", Some("d1"), 40e-6, Region::Dendrite),
            comp("ax", Some("soma"), 10e-6, Region::Axon),
        ])
        .unwrap();
        assert_eq!(m.segment(0).distance, 0.0);
        assert!((m.segment(1).distance - 10e-6).abs() < 1e-15);
        assert!((m.segment(2).distance - 40e-6).abs() < 1e-15);
        assert_eq!(m.segment(0).children.as_slice(), &[1, 3]);
        assert_eq!(m.segment(3).location().region, Region::Axon);
    }

    #[test]
    fn test_sphere_area() {
        let m = Morphology::build(&[comp("soma", None, 0.0, Region::Soma)]).unwrap();
        assert!((m.segment(0).area() - PI * 4e-12).abs() < 1e-24);
        assert!(m.coupling(0, 1.0).is_none());
    }

    #[test]
    fn test_invalid_trees() {
        assert!(Morphology::build(&[]).is_err());
        assert!(Morphology::build(&[
            comp("soma", None, 0.0, Region::Soma),
            comp("d1", Some("d2"), 20e-6, Region::Dendrite),
            comp("d2", Some("soma"), 20e-6, Region::Dendrite),
        ])
        .is_err());
        assert!(Morphology::build(&[
            comp("soma", None, 0.0, Region::Soma),
            comp("soma", Some("soma"), 20e-6, Region::Dendrite),
        ])
        .is_err());
        assert!(Morphology::build(&[
            comp("soma", None, 0.0, Region::Soma),
            comp("d1", Some("soma"), 0.0, Region::Dendrite),
        ])
        .is_err());
    }

    #[test]
    fn test_coupling() {
        let m = Morphology::build(&[
            comp("soma", None, 10e-6, Region::Soma),
            comp("d1", Some("soma"), 10e-6, Region::Dendrite),
        ])
        .unwrap();
        let g = m.coupling(1, 1.0).unwrap();
        let expected = 1.0 / m.segment(1).axial_resistance(1.0);
        assert!((g - expected).abs() / expected < 1e-12);
    }
}
