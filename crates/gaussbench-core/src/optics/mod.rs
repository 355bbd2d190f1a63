//! Optical elements.
//!
//! The element set is closed: every [`Optics`] carries an [`OpticsKind`]
//! holding the parameters of one of nine kinds. Each kind yields a single
//! [`AbcdMatrix`] and an index jump from which [`Optics::image`] and
//! [`Optics::antecedent`] are derived. The source element ([`CreateBeam`]) is
//! not a transform: its image is its own configured beam.

pub mod abcd;

pub use abcd::AbcdMatrix;

use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::beam::Beam;
use crate::types::{normalize_angle, Orientation, Point};

/// Bench-scoped, never reused element handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpticsId(pub u32);

impl fmt::Display for OpticsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Discriminant of [`OpticsKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpticsType {
    CreateBeam,
    FreeSpace,
    Lens,
    FlatMirror,
    CurvedMirror,
    FlatInterface,
    CurvedInterface,
    DielectricSlab,
    GenericAbcd,
}

impl OpticsType {
    pub const ALL: [OpticsType; 9] = [
        OpticsType::CreateBeam,
        OpticsType::FreeSpace,
        OpticsType::Lens,
        OpticsType::FlatMirror,
        OpticsType::CurvedMirror,
        OpticsType::FlatInterface,
        OpticsType::CurvedInterface,
        OpticsType::DielectricSlab,
        OpticsType::GenericAbcd,
    ];

    /// Prefix of auto-generated element names.
    pub fn name_prefix(self) -> &'static str {
        match self {
            OpticsType::CreateBeam => "w",
            OpticsType::FreeSpace => "F",
            OpticsType::Lens => "L",
            OpticsType::FlatMirror => "M",
            OpticsType::CurvedMirror => "R",
            OpticsType::FlatInterface => "I",
            OpticsType::CurvedInterface => "C",
            OpticsType::DielectricSlab => "D",
            OpticsType::GenericAbcd => "G",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OpticsType::CreateBeam => "Input beam",
            OpticsType::FreeSpace => "Free space",
            OpticsType::Lens => "Lens",
            OpticsType::FlatMirror => "Flat mirror",
            OpticsType::CurvedMirror => "Curved mirror",
            OpticsType::FlatInterface => "Flat interface",
            OpticsType::CurvedInterface => "Curved interface",
            OpticsType::DielectricSlab => "Dielectric slab",
            OpticsType::GenericAbcd => "Generic ABCD",
        }
    }

    /// Position in [`OpticsType::ALL`], used to index per-kind counters.
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

fn default_index() -> f64 {
    1.0
}

fn default_m2() -> f64 {
    1.0
}

/// Parameters of the input beam source.
///
/// The horizontal waist sits at the element position; `astigmatism` offsets
/// the vertical waist along the axis when the source is ellipsoidal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBeam {
    waist: [f64; 2],
    #[serde(default)]
    astigmatism: f64,
    #[serde(default = "default_index")]
    index: f64,
    #[serde(default = "default_m2")]
    m2: f64,
}

impl CreateBeam {
    pub fn new(waist: f64, index: f64) -> Self {
        Self {
            waist: [waist; 2],
            astigmatism: 0.0,
            index,
            m2: 1.0,
        }
    }

    pub fn waist(&self, orientation: Orientation) -> f64 {
        self.waist[orientation.slot()]
    }

    pub fn set_waist(&mut self, waist: f64, orientation: Orientation) {
        if waist > 0.0 {
            for &slot in orientation.slots() {
                self.waist[slot] = waist;
            }
        }
    }

    /// Vertical waist position relative to the horizontal one (m).
    pub fn astigmatism(&self) -> f64 {
        self.astigmatism
    }

    pub fn set_astigmatism(&mut self, astigmatism: f64) {
        self.astigmatism = astigmatism;
    }

    pub fn index(&self) -> f64 {
        self.index
    }

    pub fn set_index(&mut self, index: f64) {
        if index > 0.0 {
            self.index = index;
        }
    }

    pub fn m2(&self) -> f64 {
        self.m2
    }

    pub fn set_m2(&mut self, m2: f64) {
        if m2 >= 1.0 {
            self.m2 = m2;
        }
    }

    /// The emitted beam for a source placed at `position`.
    pub fn beam(&self, position: f64, wavelength: f64, orientation: Orientation) -> Beam {
        if orientation == Orientation::Ellipsoidal {
            Beam::ellipsoidal(
                self.waist,
                [position, position + self.astigmatism],
                wavelength,
                self.index,
                self.m2,
            )
        } else {
            Beam::new(self.waist[0], position, wavelength, self.index, self.m2)
        }
    }

    fn is_valid(&self) -> bool {
        self.waist.iter().all(|&w| w > 0.0) && self.index > 0.0 && self.m2 >= 1.0
    }
}

/// Thin lens of focal length `focal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lens {
    focal: f64,
}

impl Lens {
    pub fn new(focal: f64) -> Self {
        Self { focal }
    }

    pub fn focal(&self) -> f64 {
        self.focal
    }

    pub fn set_focal(&mut self, focal: f64) {
        if focal != 0.0 {
            self.focal = focal;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvedMirror {
    curvature_radius: f64,
}

impl CurvedMirror {
    pub fn new(curvature_radius: f64) -> Self {
        Self { curvature_radius }
    }

    pub fn curvature_radius(&self) -> f64 {
        self.curvature_radius
    }

    pub fn set_curvature_radius(&mut self, curvature_radius: f64) {
        if curvature_radius > 0.0 {
            self.curvature_radius = curvature_radius;
        }
    }
}

/// Plane boundary between two media; `index_ratio` is n_out / n_in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatInterface {
    index_ratio: f64,
}

impl FlatInterface {
    pub fn new(index_ratio: f64) -> Self {
        Self { index_ratio }
    }

    pub fn index_ratio(&self) -> f64 {
        self.index_ratio
    }

    pub fn set_index_ratio(&mut self, index_ratio: f64) {
        if index_ratio > 0.0 {
            self.index_ratio = index_ratio;
        }
    }
}

/// Spherical boundary between two media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvedInterface {
    surface_radius: f64,
    index_ratio: f64,
}

impl CurvedInterface {
    pub fn new(surface_radius: f64, index_ratio: f64) -> Self {
        Self {
            surface_radius,
            index_ratio,
        }
    }

    pub fn surface_radius(&self) -> f64 {
        self.surface_radius
    }

    pub fn set_surface_radius(&mut self, surface_radius: f64) {
        if surface_radius != 0.0 {
            self.surface_radius = surface_radius;
        }
    }

    pub fn index_ratio(&self) -> f64 {
        self.index_ratio
    }

    pub fn set_index_ratio(&mut self, index_ratio: f64) {
        if index_ratio > 0.0 {
            self.index_ratio = index_ratio;
        }
    }
}

/// Block of dielectric with parallel faces, surrounded by the same medium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DielectricSlab {
    index_ratio: f64,
}

impl DielectricSlab {
    pub fn new(index_ratio: f64) -> Self {
        Self { index_ratio }
    }

    pub fn index_ratio(&self) -> f64 {
        self.index_ratio
    }

    pub fn set_index_ratio(&mut self, index_ratio: f64) {
        if index_ratio > 0.0 {
            self.index_ratio = index_ratio;
        }
    }
}

/// User supplied ray-transfer matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericAbcd {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl GenericAbcd {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }
}

/// Kind and physical parameters of an optical element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpticsKind {
    CreateBeam(CreateBeam),
    FreeSpace,
    Lens(Lens),
    FlatMirror,
    CurvedMirror(CurvedMirror),
    FlatInterface(FlatInterface),
    CurvedInterface(CurvedInterface),
    DielectricSlab(DielectricSlab),
    GenericAbcd(GenericAbcd),
}

impl OpticsKind {
    pub fn optics_type(&self) -> OpticsType {
        match self {
            OpticsKind::CreateBeam(_) => OpticsType::CreateBeam,
            OpticsKind::FreeSpace => OpticsType::FreeSpace,
            OpticsKind::Lens(_) => OpticsType::Lens,
            OpticsKind::FlatMirror => OpticsType::FlatMirror,
            OpticsKind::CurvedMirror(_) => OpticsType::CurvedMirror,
            OpticsKind::FlatInterface(_) => OpticsType::FlatInterface,
            OpticsKind::CurvedInterface(_) => OpticsType::CurvedInterface,
            OpticsKind::DielectricSlab(_) => OpticsType::DielectricSlab,
            OpticsKind::GenericAbcd(_) => OpticsType::GenericAbcd,
        }
    }

    /// Ray-transfer matrix of an element of the given `width`.
    pub fn matrix(&self, width: f64) -> AbcdMatrix {
        match self {
            OpticsKind::CreateBeam(_) | OpticsKind::FlatMirror => AbcdMatrix::identity(),
            OpticsKind::FreeSpace => AbcdMatrix::free_space(width),
            OpticsKind::Lens(lens) => AbcdMatrix::new(1.0, 0.0, -1.0 / lens.focal, 1.0),
            OpticsKind::CurvedMirror(mirror) => {
                AbcdMatrix::new(1.0, 0.0, -2.0 / mirror.curvature_radius, 1.0)
            }
            OpticsKind::FlatInterface(interface) => {
                AbcdMatrix::new(1.0, 0.0, 0.0, 1.0 / interface.index_ratio)
            }
            OpticsKind::CurvedInterface(interface) => AbcdMatrix::new(
                1.0,
                0.0,
                (1.0 / interface.index_ratio - 1.0) / interface.surface_radius,
                1.0 / interface.index_ratio,
            ),
            OpticsKind::DielectricSlab(slab) => {
                AbcdMatrix::new(1.0, width / slab.index_ratio, 0.0, 1.0)
            }
            OpticsKind::GenericAbcd(m) => AbcdMatrix::new(m.a, m.b, m.c, m.d),
        }
    }

    /// Ratio of the output to the input refractive index.
    pub fn index_jump(&self) -> f64 {
        match self {
            OpticsKind::FlatInterface(interface) => interface.index_ratio,
            OpticsKind::CurvedInterface(interface) => interface.index_ratio,
            _ => 1.0,
        }
    }

    /// Whether the element transforms an incoming beam through its matrix.
    pub fn is_abcd(&self) -> bool {
        !matches!(self, OpticsKind::CreateBeam(_))
    }

    pub fn is_mirror(&self) -> bool {
        matches!(self, OpticsKind::FlatMirror | OpticsKind::CurvedMirror(_))
    }

    /// Whether the element can have a non-zero width.
    pub fn is_thick(&self) -> bool {
        matches!(
            self,
            OpticsKind::FreeSpace | OpticsKind::DielectricSlab(_) | OpticsKind::GenericAbcd(_)
        )
    }

    pub fn accepts_orientation(&self, orientation: Orientation) -> bool {
        match orientation {
            Orientation::Spherical => true,
            Orientation::Ellipsoidal => matches!(self, OpticsKind::CreateBeam(_)),
            Orientation::Horizontal | Orientation::Vertical => matches!(
                self,
                OpticsKind::Lens(_)
                    | OpticsKind::CurvedMirror(_)
                    | OpticsKind::CurvedInterface(_)
                    | OpticsKind::GenericAbcd(_)
            ),
        }
    }

    /// Whether the parameters satisfy the same guards as the setters.
    pub fn is_valid(&self) -> bool {
        match self {
            OpticsKind::CreateBeam(source) => source.is_valid(),
            OpticsKind::FreeSpace | OpticsKind::FlatMirror => true,
            OpticsKind::Lens(lens) => lens.focal != 0.0 && lens.focal.is_finite(),
            OpticsKind::CurvedMirror(mirror) => mirror.curvature_radius > 0.0,
            OpticsKind::FlatInterface(interface) => interface.index_ratio > 0.0,
            OpticsKind::CurvedInterface(interface) => {
                interface.surface_radius != 0.0 && interface.index_ratio > 0.0
            }
            OpticsKind::DielectricSlab(slab) => slab.index_ratio > 0.0,
            OpticsKind::GenericAbcd(m) => [m.a, m.b, m.c, m.d].iter().all(|x| x.is_finite()),
        }
    }

    /// Parameters and width of a freshly inserted element of type `t`.
    pub fn default_for(t: OpticsType) -> (OpticsKind, f64) {
        match t {
            OpticsType::CreateBeam => (OpticsKind::CreateBeam(CreateBeam::new(100e-6, 1.0)), 0.0),
            OpticsType::FreeSpace => (OpticsKind::FreeSpace, 0.1),
            OpticsType::Lens => (OpticsKind::Lens(Lens::new(0.1)), 0.0),
            OpticsType::FlatMirror => (OpticsKind::FlatMirror, 0.0),
            OpticsType::CurvedMirror => (OpticsKind::CurvedMirror(CurvedMirror::new(0.05)), 0.0),
            OpticsType::FlatInterface => (OpticsKind::FlatInterface(FlatInterface::new(1.5)), 0.0),
            OpticsType::CurvedInterface => (
                OpticsKind::CurvedInterface(CurvedInterface::new(0.1, 1.5)),
                0.0,
            ),
            OpticsType::DielectricSlab => {
                (OpticsKind::DielectricSlab(DielectricSlab::new(1.5)), 0.01)
            }
            OpticsType::GenericAbcd => (
                OpticsKind::GenericAbcd(GenericAbcd::new(1.0, 0.2, 0.0, 1.0)),
                0.1,
            ),
        }
    }
}

/// An optical element placed on the bench axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Optics {
    id: OpticsId,
    kind: OpticsKind,
    /// Axial coordinate of the left edge (m).
    position: f64,
    width: f64,
    name: String,
    angle: f64,
    orientation: Orientation,
    pub(crate) absolute_lock: bool,
    pub(crate) lock_parent: Option<OpticsId>,
    pub(crate) lock_children: Vec<OpticsId>,
}

impl Optics {
    /// Create an unnamed, thin element. The bench assigns id and name.
    pub fn new(kind: OpticsKind, position: f64) -> Self {
        Self {
            id: OpticsId(0),
            kind,
            position,
            width: 0.0,
            name: String::new(),
            angle: 0.0,
            orientation: Orientation::Spherical,
            absolute_lock: false,
            lock_parent: None,
            lock_children: Vec::new(),
        }
    }

    /// Create an element of type `t` with default parameters.
    pub fn default_for(t: OpticsType, position: f64) -> Self {
        let (kind, width) = OpticsKind::default_for(t);
        Self::new(kind, position).with_width(width)
    }

    pub fn create_beam(waist: f64, position: f64, index: f64) -> Self {
        Self::new(OpticsKind::CreateBeam(CreateBeam::new(waist, index)), position)
    }

    pub fn free_space(width: f64, position: f64) -> Self {
        Self::new(OpticsKind::FreeSpace, position).with_width(width)
    }

    pub fn lens(focal: f64, position: f64) -> Self {
        Self::new(OpticsKind::Lens(Lens::new(focal)), position)
    }

    pub fn flat_mirror(position: f64) -> Self {
        Self::new(OpticsKind::FlatMirror, position)
    }

    pub fn curved_mirror(curvature_radius: f64, position: f64) -> Self {
        Self::new(
            OpticsKind::CurvedMirror(CurvedMirror::new(curvature_radius)),
            position,
        )
    }

    pub fn flat_interface(index_ratio: f64, position: f64) -> Self {
        Self::new(
            OpticsKind::FlatInterface(FlatInterface::new(index_ratio)),
            position,
        )
    }

    pub fn curved_interface(surface_radius: f64, index_ratio: f64, position: f64) -> Self {
        Self::new(
            OpticsKind::CurvedInterface(CurvedInterface::new(surface_radius, index_ratio)),
            position,
        )
    }

    pub fn dielectric_slab(index_ratio: f64, width: f64, position: f64) -> Self {
        Self::new(
            OpticsKind::DielectricSlab(DielectricSlab::new(index_ratio)),
            position,
        )
        .with_width(width)
    }

    pub fn generic_abcd(a: f64, b: f64, c: f64, d: f64, width: f64, position: f64) -> Self {
        Self::new(
            OpticsKind::GenericAbcd(GenericAbcd::new(a, b, c, d)),
            position,
        )
        .with_width(width)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.set_width(width);
        self
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.set_orientation(orientation);
        self
    }

    pub fn id(&self) -> OpticsId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: OpticsId) {
        self.id = id;
    }

    pub fn kind(&self) -> &OpticsKind {
        &self.kind
    }

    pub fn optics_type(&self) -> OpticsType {
        self.kind.optics_type()
    }

    /// Replace the parameters, keeping the element type.
    ///
    /// Returns false (and changes nothing) for a different type or for
    /// parameters that fail the setter guards.
    pub fn set_kind(&mut self, kind: OpticsKind) -> bool {
        if kind.optics_type() != self.optics_type() || !kind.is_valid() {
            return false;
        }
        self.kind = kind;
        true
    }

    pub(crate) fn create_beam_mut(&mut self) -> Option<&mut CreateBeam> {
        match &mut self.kind {
            OpticsKind::CreateBeam(source) => Some(source),
            _ => None,
        }
    }

    /// Reconfigure a source so that it emits `beam`. Other kinds are left
    /// untouched.
    pub(crate) fn set_source_beam(&mut self, beam: &Beam) {
        let Some(source) = self.create_beam_mut() else {
            return;
        };
        for direction in Orientation::DIRECTIONS {
            source.set_waist(beam.waist(direction), direction);
        }
        source.set_astigmatism(
            beam.waist_position(Orientation::Vertical) - beam.waist_position(Orientation::Horizontal),
        );
        source.set_index(beam.index());
        source.set_m2(beam.m2());
        self.position = beam.waist_position(Orientation::Horizontal);
        self.orientation = if beam.is_spherical() {
            Orientation::Spherical
        } else {
            Orientation::Ellipsoidal
        };
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: f64) {
        self.position = position;
    }

    /// Axial coordinate of the right edge.
    pub fn end_position(&self) -> f64 {
        self.position + self.width
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// Set the width of a thick element. Negative widths are ignored.
    pub fn set_width(&mut self, width: f64) {
        if width >= 0.0 && self.kind.is_thick() {
            self.width = width;
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f64) {
        self.angle = angle;
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) -> bool {
        if !self.kind.accepts_orientation(orientation) {
            return false;
        }
        self.orientation = orientation;
        true
    }

    pub fn absolute_lock(&self) -> bool {
        self.absolute_lock
    }

    pub fn lock_parent(&self) -> Option<OpticsId> {
        self.lock_parent
    }

    pub fn lock_children(&self) -> &[OpticsId] {
        &self.lock_children
    }

    pub fn is_abcd(&self) -> bool {
        self.kind.is_abcd()
    }

    /// Matrix seen by a beam travelling in `direction`.
    ///
    /// An element restricted to one direction acts as free space of its own
    /// width in the other one.
    pub fn matrix(&self, direction: Orientation) -> AbcdMatrix {
        let inactive = matches!(
            (self.orientation, direction),
            (Orientation::Horizontal, Orientation::Vertical)
                | (Orientation::Vertical, Orientation::Horizontal)
        );
        if inactive {
            AbcdMatrix::free_space(self.width)
        } else {
            self.kind.matrix(self.width)
        }
    }

    /// Beam leaving this element when `input` arrives on it.
    pub fn image(&self, input: &Beam) -> Beam {
        if let OpticsKind::CreateBeam(source) = &self.kind {
            return self.emitted_beam(source, input.wavelength());
        }

        let mut beam = input.clone();
        let reflection = self.reflected_angle(input.angle());
        beam.set_index(input.index() * self.kind.index_jump());
        if !self.kind.is_mirror() || reflection.is_some() {
            for &direction in self.directions(input) {
                let q = self
                    .matrix(direction)
                    .transform(input.q(self.position, direction));
                beam.set_q(q, self.end_position(), direction);
            }
        }
        if let Some(angle) = reflection {
            beam.set_angle(angle);
        }
        beam.set_origin(input.point_at(self.end_position()));
        beam.set_start(self.end_position());
        beam.set_stop(f64::INFINITY);
        beam
    }

    /// Beam arriving on this element given the `output` it produces.
    pub fn antecedent(&self, output: &Beam) -> Beam {
        if let OpticsKind::CreateBeam(source) = &self.kind {
            return self.emitted_beam(source, output.wavelength());
        }

        let mut beam = output.clone();
        // Reflection is an involution. If the candidate incoming angle would
        // not be reflected, the beam went through from behind.
        let incoming = Some(self.reflection(output.angle()))
            .filter(|&angle| self.kind.is_mirror() && self.reflected_angle(angle).is_some());
        beam.set_index(output.index() / self.kind.index_jump());
        if !self.kind.is_mirror() || incoming.is_some() {
            for &direction in self.directions(output) {
                let q = self
                    .matrix(direction)
                    .inverse_transform(output.q(self.end_position(), direction));
                beam.set_q(q, self.position, direction);
            }
        }
        if let Some(angle) = incoming {
            beam.set_angle(angle);
        }
        beam.set_stop(self.position);
        beam
    }

    fn emitted_beam(&self, source: &CreateBeam, wavelength: f64) -> Beam {
        let mut beam = source.beam(self.position, wavelength, self.orientation);
        beam.set_origin(Point::new(self.position, 0.0));
        beam.set_angle(self.angle);
        beam.set_start(self.position);
        beam
    }

    /// Directions to transform: one spherical pass when nothing breaks the
    /// symmetry, otherwise horizontal and vertical separately.
    fn directions(&self, beam: &Beam) -> &'static [Orientation] {
        if beam.is_spherical() && self.orientation == Orientation::Spherical {
            &[Orientation::Spherical]
        } else {
            &Orientation::DIRECTIONS
        }
    }

    /// New propagation angle after a mirror, or `None` when the element does
    /// not reflect a beam travelling at `beam_angle`.
    fn reflected_angle(&self, beam_angle: f64) -> Option<f64> {
        if !self.kind.is_mirror() {
            return None;
        }
        let wrapped = normalize_angle(self.angle - beam_angle);
        if wrapped > FRAC_PI_2 && wrapped < 3.0 * FRAC_PI_2 {
            return None;
        }
        Some(self.reflection(beam_angle))
    }

    /// Axis rotation by `2·relative + π`, relative to the mirror angle.
    fn reflection(&self, beam_angle: f64) -> f64 {
        normalize_angle(beam_angle + 2.0 * (self.angle - beam_angle) + PI)
    }
}

/// Sort elements after the source by position. The sort is stable.
pub(crate) fn sort_by_position(optics: &mut [Optics]) {
    if optics.len() > 1 {
        optics[1..].sort_by(|a, b| a.position.total_cmp(&b.position));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const LAMBDA: f64 = 1064e-9;

    fn input() -> Beam {
        Beam::new(150e-6, 0.02, LAMBDA, 1.0, 1.0)
    }

    fn assert_same_beam(a: &Beam, b: &Beam) {
        for direction in Orientation::DIRECTIONS {
            assert_relative_eq!(a.waist(direction), b.waist(direction), max_relative = 1e-9);
            assert_relative_eq!(
                a.waist_position(direction),
                b.waist_position(direction),
                epsilon = 1e-9
            );
        }
        assert_relative_eq!(a.index(), b.index(), max_relative = 1e-12);
    }

    #[test]
    fn test_round_trip_all_abcd_kinds() {
        let elements = [
            Optics::free_space(0.1, 0.2),
            Optics::lens(0.05, 0.2),
            Optics::lens(-0.08, 0.2),
            Optics::flat_mirror(0.2),
            Optics::curved_mirror(0.1, 0.2),
            Optics::flat_interface(1.5, 0.2),
            Optics::curved_interface(0.05, 1.45, 0.2),
            Optics::dielectric_slab(1.5, 0.01, 0.2),
            Optics::generic_abcd(1.0, 0.02, -5.0, 0.9, 0.03, 0.2),
            Optics::lens(0.05, 0.2).with_orientation(Orientation::Horizontal),
        ];
        for optics in &elements {
            let image = optics.image(&input());
            let back = optics.antecedent(&image);
            assert_same_beam(&back, &input());
        }
    }

    #[test]
    fn test_flat_interface_scales_index_and_rayleigh() {
        let interface = Optics::flat_interface(1.5, 0.02);
        let out = interface.image(&input());
        assert_relative_eq!(out.index(), 1.5);
        // Waist is at the interface: q' = n q, so the waist is unchanged.
        assert_relative_eq!(out.waist(Orientation::Spherical), 150e-6, max_relative = 1e-12);
        assert_relative_eq!(
            out.rayleigh(Orientation::Spherical),
            1.5 * input().rayleigh(Orientation::Spherical),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_cylindrical_lens_makes_beam_ellipsoidal() {
        let lens = Optics::lens(0.05, 0.1).with_orientation(Orientation::Vertical);
        let out = lens.image(&input());
        assert_eq!(out.orientation(), Orientation::Ellipsoidal);

        let free = Optics::free_space(0.0, 0.1).image(&input());
        assert_relative_eq!(
            out.waist(Orientation::Horizontal),
            free.waist(Orientation::Horizontal),
            max_relative = 1e-12
        );
        assert!(out.waist(Orientation::Vertical) < out.waist(Orientation::Horizontal));
    }

    #[test]
    fn test_orientation_guards() {
        let mut mirror = Optics::flat_mirror(0.0);
        assert!(!mirror.set_orientation(Orientation::Horizontal));
        assert!(!mirror.set_orientation(Orientation::Ellipsoidal));
        assert_eq!(mirror.orientation(), Orientation::Spherical);

        let mut source = Optics::create_beam(100e-6, 0.0, 1.0);
        assert!(source.set_orientation(Orientation::Ellipsoidal));
        assert!(!source.set_orientation(Orientation::Vertical));
    }

    #[test]
    fn test_parameter_guards() {
        let mut lens = Lens::new(0.1);
        lens.set_focal(0.0);
        assert_eq!(lens.focal(), 0.1);

        let mut mirror = CurvedMirror::new(0.1);
        mirror.set_curvature_radius(-0.2);
        assert_eq!(mirror.curvature_radius(), 0.1);

        let mut thin = Optics::lens(0.1, 0.0);
        thin.set_width(0.2);
        assert_eq!(thin.width(), 0.0);

        let mut slab = Optics::dielectric_slab(1.5, 0.01, 0.0);
        slab.set_width(-1.0);
        assert_eq!(slab.width(), 0.01);
        assert!(!slab.set_kind(OpticsKind::Lens(Lens::new(0.1))));
        assert!(!slab.set_kind(OpticsKind::DielectricSlab(DielectricSlab::new(-1.0))));
    }

    #[test]
    fn test_mirror_reflects_front_and_passes_back() {
        let mirror = Optics::flat_mirror(0.1).with_angle(PI / 4.0);
        let out = mirror.image(&input());
        assert_relative_eq!(out.angle(), 3.0 * PI / 2.0, epsilon = 1e-12);

        let behind = Optics::curved_mirror(0.1, 0.1).with_angle(PI);
        let through = behind.image(&input());
        assert_relative_eq!(through.angle(), 0.0);
        assert_same_beam(&through, &input());
    }

    #[test]
    fn test_source_ignores_input() {
        let source = Optics::create_beam(180e-6, 0.01, 1.0);
        let out = source.image(&Beam::new(1e-3, 5.0, LAMBDA, 2.0, 1.0));
        assert_eq!(out.waist(Orientation::Spherical), 180e-6);
        assert_eq!(out.waist_position(Orientation::Spherical), 0.01);
        assert_eq!(out.wavelength(), LAMBDA);
        assert_eq!(out.index(), 1.0);
    }

    #[test]
    fn test_sort_keeps_source_first() {
        let mut optics = vec![
            Optics::create_beam(1e-4, 0.5, 1.0),
            Optics::lens(0.1, 0.3),
            Optics::lens(0.1, 0.1),
        ];
        sort_by_position(&mut optics);
        assert_eq!(optics[0].optics_type(), OpticsType::CreateBeam);
        assert_eq!(optics[1].position(), 0.1);
    }

    #[test]
    fn test_kind_serde_is_tagged() {
        let json = serde_json::to_string(&OpticsKind::Lens(Lens::new(0.05))).unwrap();
        assert_eq!(json, r#"{"type":"lens","focal":0.05}"#);
        let back: OpticsKind = serde_json::from_str(r#"{"type":"flat_mirror"}"#).unwrap();
        assert_eq!(back, OpticsKind::FlatMirror);
    }
}
