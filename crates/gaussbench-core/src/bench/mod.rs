//! The optics bench: elements, derived beams and the propagation protocol.
//!
//! [`OpticsBench`] owns an ordered list of elements and one beam per element,
//! the beam leaving that element. Element 0 is always the input beam source
//! and is exempt from position sorting; the others are kept sorted by
//! position. Every mutation ends with a synchronous recomputation so that
//! `beams[i]` is always the image of `beams[i - 1]` through `optics[i]`.
//!
//! Two recomputation modes exist:
//!
//! - **Forward**, after element edits: re-propagate from the changed row.
//! - **Backward**, after a beam edit at row `k`: propagate the edited beam
//!   forward from `k + 1`, take antecedents down to row 0, and reconfigure
//!   the source so that it emits the resulting beam.

mod notify;

pub use notify::{BenchEvent, BenchListener};

use log::debug;

use crate::beam::{Beam, TargetBeam};
use crate::cavity::Cavity;
use crate::fit::Fit;
use crate::function::propagate;
use crate::lock;
use crate::optics::{sort_by_position, Optics, OpticsId, OpticsType};
use crate::optimizer::OptimizerConfig;
use crate::types::Orientation;

use notify::Listeners;

/// Default vacuum wavelength of a new bench (m).
pub const DEFAULT_WAVELENGTH: f64 = 461e-9;

/// Axial step used for the sensitivity second difference (m).
const SENSITIVITY_STEP: f64 = 1e-5;

/// Axial offset of an element added after another one (m).
const INSERT_OFFSET: f64 = 0.05;

#[derive(Debug)]
pub struct OpticsBench {
    pub(crate) wavelength: f64,
    pub(crate) optics: Vec<Optics>,
    pub(crate) beams: Vec<Beam>,
    pub(crate) sensitivity: Vec<f64>,
    pub(crate) left_boundary: f64,
    pub(crate) right_boundary: f64,
    pub(crate) target: TargetBeam,
    pub(crate) fits: Vec<Fit>,
    pub(crate) cavity: Cavity,
    pub(crate) next_id: u32,
    pub(crate) name_counters: [u32; 9],
    pub(crate) optimizer_config: OptimizerConfig,
    listeners: Listeners,
}

impl Default for OpticsBench {
    fn default() -> Self {
        Self::new()
    }
}

impl OpticsBench {
    /// A bench holding only the default source, "w0": a 180 µm waist at
    /// 10 mm, absolutely locked.
    pub fn new() -> Self {
        let mut source = Optics::create_beam(180e-6, 10e-3, 1.0).with_name("w0");
        source.absolute_lock = true;
        let mut bench = Self::with_source(source, DEFAULT_WAVELENGTH);
        bench.compute_beams(0, false);
        bench
    }

    /// A bench whose element list is just `source`, without any
    /// recomputation. The caller must run `compute_beams`.
    pub(crate) fn with_source(mut source: Optics, wavelength: f64) -> Self {
        source.set_id(OpticsId(0));
        let target = TargetBeam::new(Beam::new(100e-6, 0.6, wavelength, 1.0, 1.0));
        Self {
            wavelength,
            optics: vec![source],
            beams: vec![Beam::wavelength_only(wavelength)],
            sensitivity: vec![0.0],
            left_boundary: -0.1,
            right_boundary: 0.7,
            target,
            fits: Vec::new(),
            cavity: Cavity::new(),
            next_id: 1,
            name_counters: [0; 9],
            optimizer_config: OptimizerConfig::default(),
            listeners: Listeners::default(),
        }
    }

    // ----- Queries -----

    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    pub fn len(&self) -> usize {
        self.optics.len()
    }

    /// Always false: the source is never removed.
    pub fn is_empty(&self) -> bool {
        self.optics.is_empty()
    }

    pub fn elements(&self) -> &[Optics] {
        &self.optics
    }

    pub fn beams(&self) -> &[Beam] {
        &self.beams
    }

    /// Element at `index`. Panics when out of range.
    pub fn optics(&self, index: usize) -> &Optics {
        &self.optics[index]
    }

    /// Beam leaving element `index`. Panics when out of range.
    pub fn beam(&self, index: usize) -> &Beam {
        &self.beams[index]
    }

    pub fn get_optics(&self, index: usize) -> Option<&Optics> {
        self.optics.get(index)
    }

    pub fn optics_index(&self, id: OpticsId) -> Option<usize> {
        lock::find(&self.optics, id)
    }

    pub fn find_optics(&self, name: &str) -> Option<usize> {
        self.optics.iter().position(|o| o.name() == name)
    }

    pub fn left_boundary(&self) -> f64 {
        self.left_boundary
    }

    pub fn right_boundary(&self) -> f64 {
        self.right_boundary
    }

    pub fn target(&self) -> &TargetBeam {
        &self.target
    }

    pub fn optimizer_config(&self) -> &OptimizerConfig {
        &self.optimizer_config
    }

    pub fn set_optimizer_config(&mut self, config: OptimizerConfig) {
        self.optimizer_config = config;
    }

    /// Curvature of the target overlap with respect to element `index`.
    pub fn optics_sensitivity(&self, index: usize) -> f64 {
        self.sensitivity[index]
    }

    /// Sum of the per-element sensitivities.
    pub fn sensitivity(&self) -> f64 {
        self.sensitivity.iter().sum()
    }

    // ----- Listeners -----

    /// Register a listener. It immediately receives `OpticsAdded` for every
    /// existing element.
    pub fn register_listener(&mut self, listener: Box<dyn BenchListener>) {
        self.listeners.push(listener);
        if let Some(listener) = self.listeners.last_mut() {
            for index in 0..self.optics.len() {
                listener.on_event(&BenchEvent::OpticsAdded { index });
            }
        }
    }

    fn emit(&mut self, event: BenchEvent) {
        self.listeners.emit(event);
    }

    fn emit_all_changed(&mut self) {
        let end = self.optics.len() - 1;
        self.emit(BenchEvent::DataChanged { start: 0, end });
    }

    // ----- Global parameters -----

    /// Set the vacuum wavelength. Non-positive values are ignored.
    pub fn set_wavelength(&mut self, wavelength: f64) {
        if wavelength <= 0.0 || !wavelength.is_finite() {
            return;
        }
        self.wavelength = wavelength;
        self.target.beam.set_wavelength(wavelength);
        self.emit(BenchEvent::WavelengthChanged);
        self.emit(BenchEvent::TargetBeamChanged);
        self.compute_beams(0, false);
    }

    pub fn set_left_boundary(&mut self, boundary: f64) {
        self.left_boundary = boundary;
    }

    pub fn set_right_boundary(&mut self, boundary: f64) {
        self.right_boundary = boundary;
    }

    /// Replace the target. Its wavelength follows the bench.
    pub fn set_target_beam(&mut self, target: TargetBeam) {
        self.target = target;
        self.target.beam.set_wavelength(self.wavelength);
        self.compute_sensitivity();
        self.emit(BenchEvent::TargetBeamChanged);
    }

    // ----- Elements -----

    /// Insert an element at its sorted position and return its index.
    ///
    /// The bench assigns a fresh id. An empty or already used name is
    /// replaced by an automatic one. Sources and elements with invalid
    /// parameters are rejected.
    pub fn add_optics(&mut self, optics: Optics) -> Option<usize> {
        if optics.optics_type() == OpticsType::CreateBeam || !optics.kind().is_valid() {
            return None;
        }
        let mut optics = optics;
        optics.set_id(OpticsId(self.next_id));
        self.next_id += 1;
        optics.lock_parent = None;
        optics.lock_children.clear();
        if optics.name().is_empty() || self.find_optics(optics.name()).is_some() {
            let name = self.next_name(optics.optics_type());
            optics.set_name(name);
        }

        let position = optics.position();
        let index = 1 + self.optics[1..].partition_point(|o| o.position() <= position);
        debug!("Adding {} at row {}", optics.name(), index);
        self.optics.insert(index, optics);
        self.beams.insert(index, Beam::default());
        self.sensitivity.insert(index, 0.0);
        self.emit(BenchEvent::OpticsAdded { index });
        self.compute_beams(index, false);
        Some(index)
    }

    /// Insert a default element of type `t` after row `index - 1`.
    pub fn add_optics_kind(&mut self, t: OpticsType, index: usize) -> Option<usize> {
        let previous = index.clamp(1, self.optics.len()) - 1;
        let position = self.optics[previous].position() + INSERT_OFFSET;
        self.add_optics(Optics::default_for(t, position))
    }

    /// Remove `count` elements starting at `index`. The source cannot be
    /// removed. Returns the number of elements removed.
    pub fn remove_optics(&mut self, index: usize, count: usize) -> usize {
        if index == 0 || index >= self.optics.len() {
            return 0;
        }
        let count = count.min(self.optics.len() - index);
        let ids: Vec<OpticsId> = self.optics[index..index + count]
            .iter()
            .map(|o| o.id())
            .collect();
        for &id in &ids {
            lock::detach(&mut self.optics, id);
            self.cavity.remove_optics(id);
        }
        self.optics.drain(index..index + count);
        self.beams.drain(index..index + count);
        self.sensitivity.drain(index..index + count);
        self.emit(BenchEvent::OpticsRemoved { index, count });
        self.compute_beams(index, false);
        count
    }

    /// Move element `index` (with its lock tree) and return its new row.
    pub fn set_optics_position(
        &mut self,
        index: usize,
        position: f64,
        respect_absolute_lock: bool,
    ) -> usize {
        let id = self.optics[index].id();
        lock::move_tree(&mut self.optics, id, position, respect_absolute_lock);
        sort_by_position(&mut self.optics);
        self.compute_beams(0, false);
        self.optics_index(id).unwrap_or(index)
    }

    /// Rename element `index`. Empty or already used names are refused.
    pub fn set_optics_name(&mut self, index: usize, name: &str) -> bool {
        if name.is_empty() || self.find_optics(name).is_some_and(|i| i != index) {
            return false;
        }
        self.optics[index].set_name(name);
        self.emit_all_changed();
        true
    }

    /// Lock element `index` to the element called `parent`.
    pub fn lock_to(&mut self, index: usize, parent: &str) -> bool {
        let Some(parent_index) = self.find_optics(parent) else {
            return false;
        };
        let child = self.optics[index].id();
        let parent = self.optics[parent_index].id();
        let locked = lock::relative_lock_to(&mut self.optics, child, parent);
        if locked {
            self.emit_all_changed();
        }
        locked
    }

    pub fn unlock(&mut self, index: usize) -> bool {
        let id = self.optics[index].id();
        let unlocked = lock::relative_unlock(&mut self.optics, id);
        if unlocked {
            self.emit_all_changed();
        }
        unlocked
    }

    pub fn set_absolute_lock(&mut self, index: usize, absolute_lock: bool) {
        let id = self.optics[index].id();
        lock::set_absolute_lock(&mut self.optics, id, absolute_lock);
        self.emit_all_changed();
    }

    /// Edit element `index` in place, then recompute from it.
    ///
    /// ```
    /// use gaussbench_core::{Optics, OpticsBench, OpticsKind};
    /// use gaussbench_core::optics::Lens;
    ///
    /// let mut bench = OpticsBench::new();
    /// let index = bench.add_optics(Optics::lens(0.1, 0.2)).unwrap();
    /// bench.update_optics(index, |lens| {
    ///     lens.set_kind(OpticsKind::Lens(Lens::new(0.05)));
    /// });
    /// ```
    pub fn update_optics<F>(&mut self, index: usize, edit: F)
    where
        F: FnOnce(&mut Optics),
    {
        edit(&mut self.optics[index]);
        self.compute_beams(index, false);
    }

    /// Reconfigure the source so that it emits `beam`.
    ///
    /// Elements locked to the source follow it.
    pub fn set_input_beam(&mut self, beam: &Beam) {
        let id = self.optics[0].id();
        lock::move_tree(
            &mut self.optics,
            id,
            beam.waist_position(Orientation::Horizontal),
            false,
        );
        self.optics[0].set_source_beam(beam);
        sort_by_position(&mut self.optics);
        self.compute_beams(0, false);
    }

    /// Overwrite the beam leaving element `index` and re-derive all other
    /// beams, including the source, from it.
    pub fn set_beam(&mut self, beam: &Beam, index: usize) {
        let mut beam = beam.clone();
        beam.set_wavelength(self.wavelength);
        self.beams[index] = beam;
        self.compute_beams(index, true);
    }

    // ----- Fits -----

    pub fn fits(&self) -> &[Fit] {
        &self.fits
    }

    pub fn fit(&self, index: usize) -> &Fit {
        &self.fits[index]
    }

    pub fn add_fit(&mut self, fit: Fit) -> usize {
        self.fits.push(fit);
        let index = self.fits.len() - 1;
        self.emit(BenchEvent::FitChanged { index });
        index
    }

    /// Edit fit `index` in place and notify listeners.
    pub fn update_fit<F>(&mut self, index: usize, edit: F)
    where
        F: FnOnce(&mut Fit),
    {
        edit(&mut self.fits[index]);
        self.emit(BenchEvent::FitChanged { index });
    }

    pub fn remove_fit(&mut self, index: usize) -> Option<Fit> {
        if index >= self.fits.len() {
            return None;
        }
        let fit = self.fits.remove(index);
        self.emit(BenchEvent::FitChanged { index });
        Some(fit)
    }

    /// Beam fitted on the data of fit `index`, at the bench wavelength.
    pub fn fit_beam(&self, index: usize) -> Option<Beam> {
        self.fits.get(index)?.beam(self.wavelength)
    }

    // ----- Cavity -----

    pub fn cavity(&self) -> &Cavity {
        &self.cavity
    }

    pub fn add_cavity_optics(&mut self, index: usize) -> bool {
        let added = self.cavity.add_optics(&self.optics[index]);
        if added {
            self.cavity.compute_matrix(&self.optics);
            self.emit_all_changed();
        }
        added
    }

    pub fn remove_cavity_optics(&mut self, index: usize) -> bool {
        let removed = self.cavity.remove_optics(self.optics[index].id());
        if removed {
            self.cavity.compute_matrix(&self.optics);
            self.emit_all_changed();
        }
        removed
    }

    pub fn set_ring_cavity(&mut self, ring: bool) {
        self.cavity.set_ring(ring);
        self.emit_all_changed();
    }

    pub fn is_cavity_stable(&self) -> bool {
        self.cavity.is_stable()
    }

    /// Cavity eigen beam leaving element `index`, if `index` is inside a
    /// stable cavity.
    pub fn cavity_eigen_beam(&self, index: usize) -> Option<Beam> {
        let first = self.optics_index(self.cavity.first_member()?)?;
        let medium_index = self.beams[first].index();
        self.cavity
            .eigen_beam(&self.optics, self.wavelength, medium_index, index)
    }

    // ----- Propagation -----

    /// Restore `beams[i] == optics[i].image(beams[i - 1])` from row
    /// `changed` on, then refresh the derived data and notify.
    pub(crate) fn compute_beams(&mut self, changed: usize, backward: bool) {
        let last = self.optics.len() - 1;
        let changed = changed.min(last);

        if backward {
            let mut beam = self.beams[changed].clone();
            for i in changed + 1..=last {
                beam = self.optics[i].image(&beam);
                self.beams[i] = beam.clone();
            }
            let mut beam = self.beams[changed].clone();
            for i in (0..changed).rev() {
                beam = self.optics[i + 1].antecedent(&beam);
                self.beams[i] = beam.clone();
            }
            self.optics[0].set_source_beam(&beam);
            // Replay the whole bench so that every row is an exact image of
            // the previous one, the source included.
            self.propagate_from(0);
            debug!("Backward recomputation from row {}", changed);
        } else {
            self.propagate_from(changed);
            debug!("Forward recomputation from row {}", changed);
        }

        self.compute_sensitivity();
        self.cavity.compute_matrix(&self.optics);
        let start = if backward { 0 } else { changed };
        self.emit(BenchEvent::DataChanged { start, end: last });
    }

    fn propagate_from(&mut self, start: usize) {
        let mut beam = if start == 0 {
            Beam::wavelength_only(self.wavelength)
        } else {
            self.beams[start - 1].clone()
        };
        for i in start..self.optics.len() {
            beam = self.optics[i].image(&beam);
            self.beams[i] = beam.clone();
        }
        for i in 0..self.optics.len() - 1 {
            let stop = self.optics[i + 1].position();
            self.beams[i].set_stop(stop);
        }
    }

    /// Second difference of the target overlap with respect to each element
    /// position.
    fn compute_sensitivity(&mut self) {
        let Some(last) = self.beams.last() else {
            return;
        };
        let base = Beam::overlap(last, &self.target.beam, 0.0);
        let h = SENSITIVITY_STEP;
        let mut probe = self.optics.clone();
        let mut sensitivity = Vec::with_capacity(probe.len());
        for i in 0..probe.len() {
            let position = probe[i].position();
            probe[i].set_position(position + h);
            let ahead = Beam::overlap(&propagate(&probe, self.wavelength), &self.target.beam, 0.0);
            probe[i].set_position(position - h);
            let behind = Beam::overlap(&propagate(&probe, self.wavelength), &self.target.beam, 0.0);
            probe[i].set_position(position);
            sensitivity.push((ahead - 2.0 * base + behind) / (h * h));
        }
        self.sensitivity = sensitivity;
    }

    /// Next never used automatic name for type `t`.
    pub(crate) fn next_name(&mut self, t: OpticsType) -> String {
        loop {
            let counter = &mut self.name_counters[t.index()];
            *counter += 1;
            let name = format!("{}{}", t.name_prefix(), counter);
            if self.find_optics(&name).is_none() {
                return name;
            }
        }
    }

    /// Make sure automatic names never collide with `name`, a name loaded
    /// from elsewhere.
    pub(crate) fn reserve_name(&mut self, name: &str) {
        for t in OpticsType::ALL {
            let Some(number) = name.strip_prefix(t.name_prefix()) else {
                continue;
            };
            if let Ok(n) = number.parse::<u32>() {
                let counter = &mut self.name_counters[t.index()];
                *counter = (*counter).max(n);
            }
        }
    }

    /// Move the trees rooted at `free` to `positions` and recompute.
    pub(crate) fn apply_positions(&mut self, free: &[OpticsId], positions: &[f64]) {
        for (&id, &position) in free.iter().zip(positions) {
            lock::move_tree(&mut self.optics, id, position, false);
        }
        sort_by_position(&mut self.optics);
        self.compute_beams(0, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder(Rc<RefCell<Vec<BenchEvent>>>);

    impl BenchListener for Recorder {
        fn on_event(&mut self, event: &BenchEvent) {
            self.0.borrow_mut().push(*event);
        }
    }

    #[test]
    fn test_new_bench_has_locked_source() {
        let bench = OpticsBench::new();
        assert_eq!(bench.len(), 1);
        assert_eq!(bench.optics(0).name(), "w0");
        assert!(bench.optics(0).absolute_lock());
        assert_eq!(bench.beam(0).waist(Orientation::Spherical), 180e-6);
        assert_eq!(bench.beam(0).wavelength(), DEFAULT_WAVELENGTH);
    }

    #[test]
    fn test_add_inserts_sorted() {
        let mut bench = OpticsBench::new();
        assert_eq!(bench.add_optics(Optics::lens(0.1, 0.3)), Some(1));
        assert_eq!(bench.add_optics(Optics::lens(0.1, 0.1)), Some(1));
        assert_eq!(bench.add_optics(Optics::lens(0.1, 0.5)), Some(3));
        assert_eq!(bench.optics(2).position(), 0.3);
        assert_eq!(bench.add_optics(Optics::create_beam(1e-4, 0.2, 1.0)), None);
        assert_eq!(bench.add_optics(Optics::lens(0.0, 0.2)), None);
    }

    #[test]
    fn test_add_kind_places_after_previous() {
        let mut bench = OpticsBench::new();
        let index = bench.add_optics_kind(OpticsType::CurvedMirror, 1).unwrap();
        assert!((bench.optics(index).position() - 0.06).abs() < 1e-12);
        assert_eq!(bench.optics(index).name(), "R1");
        assert!(bench.add_optics_kind(OpticsType::CreateBeam, 1).is_none());
    }

    #[test]
    fn test_names_unique_and_never_reused() {
        let mut bench = OpticsBench::new();
        bench.add_optics(Optics::lens(0.1, 0.1));
        bench.add_optics(Optics::lens(0.1, 0.2));
        assert_eq!(bench.optics(2).name(), "L2");
        bench.remove_optics(2, 1);
        let index = bench.add_optics(Optics::lens(0.1, 0.3)).unwrap();
        assert_eq!(bench.optics(index).name(), "L3");

        assert!(!bench.set_optics_name(index, "L1"));
        assert!(bench.set_optics_name(index, "focus"));
        // Keeping its own name is not a clash.
        assert!(bench.set_optics_name(index, "focus"));
        let renamed = bench.add_optics(Optics::lens(0.1, 0.4).with_name("focus")).unwrap();
        assert_eq!(bench.optics(renamed).name(), "L4");
    }

    #[test]
    fn test_set_position_returns_new_index() {
        let mut bench = OpticsBench::new();
        bench.add_optics(Optics::lens(0.1, 0.1));
        bench.add_optics(Optics::lens(0.1, 0.2));
        let name = bench.optics(1).name().to_string();
        let index = bench.set_optics_position(1, 0.3, true);
        assert_eq!(index, 2);
        assert_eq!(bench.optics(index).name(), name);
    }

    #[test]
    fn test_source_respects_absolute_lock() {
        let mut bench = OpticsBench::new();
        bench.set_optics_position(0, 0.05, true);
        assert_eq!(bench.optics(0).position(), 10e-3);
        bench.set_optics_position(0, 0.05, false);
        assert_eq!(bench.optics(0).position(), 0.05);
    }

    #[test]
    fn test_events_are_emitted() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut bench = OpticsBench::new();
        bench.register_listener(Box::new(Recorder(events.clone())));
        assert_eq!(events.borrow()[0], BenchEvent::OpticsAdded { index: 0 });

        bench.add_optics(Optics::lens(0.1, 0.2));
        let recorded = events.borrow().clone();
        assert!(recorded.contains(&BenchEvent::OpticsAdded { index: 1 }));
        assert_eq!(
            recorded.last(),
            Some(&BenchEvent::DataChanged { start: 1, end: 1 })
        );

        bench.set_wavelength(1064e-9);
        assert!(events.borrow().contains(&BenchEvent::WavelengthChanged));
        assert_eq!(bench.target().beam.wavelength(), 1064e-9);
    }

    #[test]
    fn test_invalid_wavelength_ignored() {
        let mut bench = OpticsBench::new();
        bench.set_wavelength(-1.0);
        bench.set_wavelength(0.0);
        assert_eq!(bench.wavelength(), DEFAULT_WAVELENGTH);
    }

    #[test]
    fn test_reserve_name_bumps_counter() {
        let mut bench = OpticsBench::new();
        bench.reserve_name("L7");
        bench.reserve_name("Lfoo");
        let index = bench.add_optics(Optics::lens(0.1, 0.2)).unwrap();
        assert_eq!(bench.optics(index).name(), "L8");
    }

    #[test]
    fn test_sensitivity_has_one_entry_per_element() {
        let mut bench = OpticsBench::new();
        bench.add_optics(Optics::lens(0.1, 0.2));
        bench.add_optics(Optics::lens(0.1, 0.4));
        assert_eq!(bench.sensitivity.len(), bench.len());
        assert!(bench.sensitivity().is_finite());
    }
}
