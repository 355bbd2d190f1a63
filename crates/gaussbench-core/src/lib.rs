//! # GaussBench Core
//!
//! The numerical backbone of GaussBench. This crate propagates Gaussian laser
//! beams through paraxial optical elements laid out along an axis, and solves
//! for element placements that reach a target beam.
//!
//! ## Architecture
//!
//! An [`bench::OpticsBench`] owns an ordered list of [`optics::Optics`] and
//! one derived [`beam::Beam`] per element. Every mutation re-runs the ABCD
//! propagation synchronously, so the beams are never stale. Cavities,
//! optimisation and waist fits read the bench on demand.
//!
//! ## Modules
//!
//! - [`types`] — Orientations, 2D points and small numeric helpers.
//! - [`beam`] — Gaussian beam value type and target beam criteria.
//! - [`optics`] — ABCD matrices and the closed set of optical elements.
//! - [`lock`] — Rigid locking trees between elements.
//! - [`bench`] — The optics bench and its propagation protocol.
//! - [`cavity`] — Round-trip matrix, stability and eigenmode.
//! - [`function`] — Beam as a function of the free element positions.
//! - [`optimizer`] — Random search and local refinement ("magic waist").
//! - [`fit`] — Waist fit from measured beam radii.
//! - [`document`] — Serialisable bench document with two-pass loading.

pub mod beam;
pub mod bench;
pub mod cavity;
pub mod document;
pub mod fit;
pub mod function;
pub mod lock;
pub mod optics;
pub mod optimizer;
pub mod types;

pub use beam::{Beam, TargetBeam};
pub use bench::{BenchEvent, BenchListener, OpticsBench};
pub use cavity::Cavity;
pub use fit::{Fit, FitDataType};
pub use optics::{AbcdMatrix, Optics, OpticsId, OpticsKind, OpticsType};
pub use types::{Orientation, Point};
