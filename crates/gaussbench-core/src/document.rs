//! Serializable form of a bench.
//!
//! A [`BenchDocument`] is the plain-data image of an [`OpticsBench`]:
//! elements refer to their lock parents and cavity membership by id, so a
//! document can be written by hand or by another tool. Loading runs in two
//! passes. The first creates every element, the second resolves lock
//! parents, which may therefore point forward in the list.

use std::collections::HashSet;

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::beam::{Beam, TargetBeam};
use crate::bench::OpticsBench;
use crate::fit::{Fit, FitDataType};
use crate::lock;
use crate::optics::{sort_by_position, Optics, OpticsId, OpticsKind, OpticsType};
use crate::optimizer::OptimizerConfig;
use crate::types::Orientation;

/// Format version written by [`OpticsBench::to_document`].
pub const DOCUMENT_VERSION: u32 = 1;

/// Reasons a document cannot be turned into a bench.
#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("Unsupported document version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Invalid wavelength: {0}")]
    InvalidWavelength(f64),

    #[error("The first element must be a beam source")]
    MissingSource,

    #[error("Element {0} is a beam source but not the first element")]
    MisplacedSource(u32),

    #[error("Duplicate element id {0}")]
    DuplicateId(u32),

    #[error("Element {id} is locked to unknown element {parent}")]
    UnknownLockParent { id: u32, parent: u32 },

    #[error("Locking element {0} would create a lock cycle")]
    LockCycle(u32),

    #[error("Cavity refers to unknown element {0}")]
    UnknownCavityOptics(u32),

    #[error("Element {0} cannot be part of a cavity")]
    InvalidCavityOptics(u32),

    #[error("Element {0} has invalid parameters")]
    InvalidOptics(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchDocument {
    pub version: u32,
    /// Vacuum wavelength (m).
    pub wavelength: f64,
    #[serde(default = "default_left_boundary")]
    pub left_boundary: f64,
    #[serde(default = "default_right_boundary")]
    pub right_boundary: f64,
    #[serde(default)]
    pub target: Option<TargetDocument>,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub fits: Vec<FitDocument>,
    /// Elements, the beam source first.
    pub optics: Vec<OpticsDocument>,
    #[serde(default)]
    pub cavity: Option<CavityDocument>,
}

fn default_left_boundary() -> f64 {
    -0.1
}

fn default_right_boundary() -> f64 {
    0.7
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticsDocument {
    pub id: u32,
    #[serde(flatten)]
    pub kind: OpticsKind,
    pub position: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default)]
    pub orientation: Orientation,
    /// Empty names get an automatic one.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub absolute_lock: bool,
    #[serde(default)]
    pub lock_parent: Option<u32>,
}

impl OpticsDocument {
    fn to_optics(&self) -> Result<Optics, DocumentError> {
        if !self.kind.is_valid() {
            return Err(DocumentError::InvalidOptics(self.id));
        }
        let mut optics = Optics::new(self.kind.clone(), self.position)
            .with_width(self.width)
            .with_angle(self.angle)
            .with_name(self.name.clone());
        if !optics.set_orientation(self.orientation) {
            return Err(DocumentError::InvalidOptics(self.id));
        }
        optics.set_id(OpticsId(self.id));
        Ok(optics)
    }

    fn from_optics(optics: &Optics) -> Self {
        Self {
            id: optics.id().0,
            kind: optics.kind().clone(),
            position: optics.position(),
            width: optics.width(),
            angle: optics.angle(),
            orientation: optics.orientation(),
            name: optics.name().to_string(),
            absolute_lock: optics.absolute_lock(),
            lock_parent: optics.lock_parent().map(|p| p.0),
        }
    }
}

/// Target beam and reach criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDocument {
    /// Horizontal and vertical waist (m).
    pub waist: [f64; 2],
    pub waist_position: [f64; 2],
    #[serde(default = "default_m2")]
    pub m2: f64,
    #[serde(default = "default_true")]
    pub overlap_criterion: bool,
    #[serde(default = "default_min_overlap")]
    pub min_overlap: f64,
    #[serde(default = "default_waist_tolerance")]
    pub waist_tolerance: f64,
    #[serde(default = "default_position_tolerance")]
    pub position_tolerance: f64,
}

fn default_m2() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_min_overlap() -> f64 {
    0.98
}

fn default_waist_tolerance() -> f64 {
    0.05
}

fn default_position_tolerance() -> f64 {
    0.1
}

impl TargetDocument {
    fn to_target(&self, wavelength: f64) -> TargetBeam {
        let beam = Beam::ellipsoidal(self.waist, self.waist_position, wavelength, 1.0, self.m2);
        TargetBeam {
            beam,
            overlap_criterion: self.overlap_criterion,
            min_overlap: self.min_overlap,
            waist_tolerance: self.waist_tolerance,
            position_tolerance: self.position_tolerance,
        }
    }

    fn from_target(target: &TargetBeam) -> Self {
        let directions = Orientation::DIRECTIONS;
        Self {
            waist: directions.map(|d| target.beam.waist(d)),
            waist_position: directions.map(|d| target.beam.waist_position(d)),
            m2: target.beam.m2(),
            overlap_criterion: target.overlap_criterion,
            min_overlap: target.min_overlap,
            waist_tolerance: target.waist_tolerance,
            position_tolerance: target.position_tolerance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDocument {
    pub name: String,
    #[serde(default)]
    pub data_type: FitDataType,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub orientation: Orientation,
    /// `[position, value]` samples.
    #[serde(default)]
    pub data: Vec<[f64; 2]>,
}

impl FitDocument {
    fn to_fit(&self) -> Fit {
        let mut fit = Fit::new(self.name.clone());
        fit.set_data_type(self.data_type);
        fit.set_color(self.color);
        fit.set_orientation(self.orientation);
        for &[position, value] in &self.data {
            fit.add_data(position, value);
        }
        fit
    }

    fn from_fit(fit: &Fit) -> Self {
        Self {
            name: fit.name().to_string(),
            data_type: fit.data_type(),
            color: fit.color(),
            orientation: fit.orientation(),
            data: fit.data().map(|(z, v)| [z, v]).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CavityDocument {
    #[serde(default = "default_true")]
    pub ring: bool,
    /// Member element ids.
    pub optics: Vec<u32>,
}

impl OpticsBench {
    /// Build a bench from `document`.
    pub fn from_document(document: &BenchDocument) -> Result<Self, DocumentError> {
        if document.version != DOCUMENT_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                found: document.version,
                expected: DOCUMENT_VERSION,
            });
        }
        let wavelength = document.wavelength;
        if !(wavelength > 0.0 && wavelength.is_finite()) {
            return Err(DocumentError::InvalidWavelength(wavelength));
        }

        // First pass: every element, without locks.
        let (source, others) = document
            .optics
            .split_first()
            .ok_or(DocumentError::MissingSource)?;
        if source.kind.optics_type() != OpticsType::CreateBeam {
            return Err(DocumentError::MissingSource);
        }
        let mut bench = Self::with_source(source.to_optics()?, wavelength);
        bench.optics[0].set_id(OpticsId(source.id));

        let mut ids = HashSet::from([source.id]);
        for entry in others {
            if entry.kind.optics_type() == OpticsType::CreateBeam {
                return Err(DocumentError::MisplacedSource(entry.id));
            }
            if !ids.insert(entry.id) {
                return Err(DocumentError::DuplicateId(entry.id));
            }
            bench.optics.push(entry.to_optics()?);
        }
        bench.next_id = ids.iter().max().map_or(0, |&id| id + 1);
        bench.beams = vec![Beam::wavelength_only(wavelength); bench.optics.len()];
        bench.sensitivity = vec![0.0; bench.optics.len()];

        for optics in &document.optics {
            bench.reserve_name(&optics.name);
        }
        for i in 0..bench.optics.len() {
            let name = bench.optics[i].name().to_string();
            let taken = bench.optics[..i].iter().any(|o| o.name() == name);
            if name.is_empty() || taken {
                let fresh = bench.next_name(bench.optics[i].optics_type());
                if taken {
                    warn!("Renaming duplicate element name {} to {}", name, fresh);
                }
                bench.optics[i].set_name(fresh);
            }
        }

        // Second pass: lock parents may refer to any element.
        for entry in &document.optics {
            let Some(parent) = entry.lock_parent else {
                continue;
            };
            if !ids.contains(&parent) {
                return Err(DocumentError::UnknownLockParent {
                    id: entry.id,
                    parent,
                });
            }
            if !lock::relative_lock_to(&mut bench.optics, OpticsId(entry.id), OpticsId(parent)) {
                return Err(DocumentError::LockCycle(entry.id));
            }
        }
        for entry in &document.optics {
            if entry.absolute_lock && entry.lock_parent.is_none() {
                lock::set_absolute_lock(&mut bench.optics, OpticsId(entry.id), true);
            }
        }

        if let Some(target) = &document.target {
            bench.target = target.to_target(wavelength);
        }
        bench.fits = document.fits.iter().map(FitDocument::to_fit).collect();
        bench.optimizer_config = document.optimizer.clone();

        if let Some(cavity) = &document.cavity {
            bench.cavity.set_ring(cavity.ring);
            for &id in &cavity.optics {
                let index = lock::find(&bench.optics, OpticsId(id))
                    .ok_or(DocumentError::UnknownCavityOptics(id))?;
                if !bench.cavity.add_optics(&bench.optics[index]) {
                    return Err(DocumentError::InvalidCavityOptics(id));
                }
            }
        }

        bench.left_boundary = document.left_boundary;
        bench.right_boundary = document.right_boundary;
        sort_by_position(&mut bench.optics);
        bench.compute_beams(0, false);
        Ok(bench)
    }

    /// Plain-data image of the bench. Loading it gives back an equivalent
    /// bench.
    pub fn to_document(&self) -> BenchDocument {
        BenchDocument {
            version: DOCUMENT_VERSION,
            wavelength: self.wavelength,
            left_boundary: self.left_boundary,
            right_boundary: self.right_boundary,
            target: Some(TargetDocument::from_target(&self.target)),
            optimizer: self.optimizer_config.clone(),
            fits: self.fits.iter().map(FitDocument::from_fit).collect(),
            optics: self.optics.iter().map(OpticsDocument::from_optics).collect(),
            cavity: (!self.cavity.members().is_empty()).then(|| CavityDocument {
                ring: self.cavity.is_ring(),
                optics: self.cavity.members().iter().map(|id| id.0).collect(),
            }),
        }
    }
}
