//! Progressive meshes: a mesh together with the log of edge collapses that
//! simplified it, so that any level of detail can be reached by replaying
//! collapses (coarsening) or undoing them (refining).
//!
//! Collapses are done by detaching the two triangles of the collapsed edge
//! ([`Phi2::extract_triangle_pair`][crate::core::Phi2::extract_triangle_pair])
//! instead of deleting them. The detached darts are marked inactive and keep
//! their embeddings, so refining only has to sew them back and restore the
//! rows of the split vertices and edges. Rows are never freed while the
//! progressive mesh exists.
//!
//! With predictors, the split vertex positions are not restored from their
//! rows but predicted from the coarse mesh and corrected by the stored detail
//! vectors. This makes it possible to compress or scale the details.

use failure::Fail;
use log::{debug, info, trace};

use crate::{
    algo::{
        decimation::{
            self, create_selector, Approximators, ApproximatorType, EdgeSelector, SelectorType,
        },
        geometry::vertex_local_frame,
    },
    container::AttributeHandle,
    core::SurfaceMap,
    handle::{hsize, Dart},
    marker::{Marker, MarkerError},
    math::{invert_or_identity, Mat33, Real, Vec3},
    orbit::Orbit,
};

mod quantization;

#[cfg(test)]
mod tests;

pub use self::quantization::{Quantization, Quantizer, VectorQuantizer};


/// Strategies of a [`ProgressiveMesh`].
#[derive(Clone, Debug, PartialEq)]
pub struct PmConfig {
    pub selector: SelectorType,
    pub approximator: ApproximatorType,
    /// Store detail vectors, if the approximator has a predictor.
    pub predictors: bool,
    pub seed: u64,
}

impl Default for PmConfig {
    fn default() -> Self {
        Self {
            selector: SelectorType::Qem,
            approximator: ApproximatorType::Qem,
            predictors: true,
            seed: 0,
        }
    }
}

#[derive(Debug, Fail, Clone, PartialEq, Eq)]
pub enum Error {
    #[fail(display = "selector {:?} could not be initialized", _0)]
    SelectorInit(SelectorType),

    #[fail(display = "approximator for '{}' could not be initialized", _0)]
    ApproximatorInit(String),

    #[fail(display = "detail vectors are not stored (approximator {:?} without predictor)", _0)]
    MissingPredictor(ApproximatorType),

    #[fail(display = "vertex attribute '{}' is required but missing", _0)]
    MissingAttribute(String),

    #[fail(display = "progressive meshes need a triangulated surface")]
    NotTriangulated,

    #[fail(display = "{}", _0)]
    Marker(#[cause] MarkerError),
}

impl From<decimation::Error> for Error {
    fn from(src: decimation::Error) -> Self {
        match src {
            decimation::Error::SelectorInit(s) => Error::SelectorInit(s),
            decimation::Error::ApproximatorInit(name) => Error::ApproximatorInit(name),
            decimation::Error::MissingAttribute(name) => Error::MissingAttribute(name),
            decimation::Error::MissingPredictor(a) => Error::MissingPredictor(a),
        }
    }
}

impl From<MarkerError> for Error {
    fn from(src: MarkerError) -> Self {
        Error::Marker(src)
    }
}


/// One collapse of the log.
///
/// `edge` is the collapsed edge, `left` and `right` are the darts
/// `phi2(phi_1(edge))` and `phi2(phi_1(phi2(edge)))` which start at the
/// merged vertex and border the removed triangles. The rows are those given
/// to the merged vertex and the two merged edge pairs.
///
/// The detail vector and offset belong to the split itself: the rows of
/// `edge` change between levels, so they cannot hold them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VSplit {
    edge: Dart,
    left: Dart,
    right: Dart,
    vertex: hsize,
    left_edge: hsize,
    right_edge: hsize,
    detail: Vec3,
    offset: Vec3,
}

impl VSplit {
    pub fn edge(&self) -> Dart {
        self.edge
    }

    pub fn left(&self) -> Dart {
        self.left
    }

    pub fn right(&self) -> Dart {
        self.right
    }

    /// Row of the merged vertex.
    pub fn vertex_row(&self) -> hsize {
        self.vertex
    }

    /// Rows of the edges of `left` and `right` on the coarse side.
    pub fn edge_rows(&self) -> (hsize, hsize) {
        (self.left_edge, self.right_edge)
    }

    /// Zero if the progressive mesh stores no details.
    pub fn detail(&self) -> Vec3 {
        self.detail
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum QuantizationRequest {
    Classes(usize),
    Distortion(Real),
}

/// What [`ProgressiveMesh::quantize_detail_vectors`] achieved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuantizationReport {
    pub differential_entropy: Real,
    pub discrete_entropy: Real,
    pub distinct_vectors: usize,
}


/// A surface with a log of vertex splits.
///
/// Levels count collapses: level 0 is the input mesh, level
/// [`nb_splits`][ProgressiveMesh::nb_splits] the coarsest mesh.
pub struct ProgressiveMesh<M: SurfaceMap> {
    map: M,
    position: AttributeHandle<Vec3>,
    config: PmConfig,
    selector: Box<dyn EdgeSelector<M>>,
    approximators: Approximators,
    quantizer: Box<dyn Quantizer>,
    inactive: Marker,

    splits: Vec<VSplit>,
    cur: usize,
    detail_amount: Real,
    local_frame: bool,
    original_details: Vec<Vec3>,
    quantization: Option<QuantizationRequest>,
}

impl<M: SurfaceMap> ProgressiveMesh<M> {
    /// Takes ownership of a closed or open triangulated surface and prepares
    /// the strategies. The log is empty until
    /// [`create_pm`][ProgressiveMesh::create_pm] is called.
    pub fn new(mut map: M, position: AttributeHandle<Vec3>, config: PmConfig) -> Result<Self, Error> {
        if map.orbits(Orbit::Face).into_iter().any(|f| map.face_degree(f) != 3) {
            return Err(Error::NotTriangulated);
        }

        let mut approximators = Approximators::new(&mut map, config.approximator, position, config.predictors)?;
        let mut selector = create_selector::<M>(config.selector, position, config.seed);
        approximators.init(&mut map)?;
        if !selector.init(&mut map, &mut approximators) {
            return Err(Error::SelectorInit(config.selector));
        }
        let inactive = map.base().new_marker(Orbit::Dart)?;

        Ok(Self {
            map,
            position,
            config,
            selector,
            approximators,
            quantizer: Box::new(VectorQuantizer::default()),
            inactive,
            splits: Vec::new(),
            cur: 0,
            detail_amount: 1.0,
            local_frame: false,
            original_details: Vec::new(),
            quantization: None,
        })
    }

    /// Replaces the quantizer used by the `quantize_*` methods.
    pub fn set_quantizer(&mut self, quantizer: Box<dyn Quantizer>) {
        self.quantizer = quantizer;
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    /// Mutable access to the map. Only attribute values may be changed, the
    /// topology belongs to the progressive mesh.
    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    /// Returns the map at the current level and releases the inactive-dart
    /// marker. The inactive darts of coarser levels stay allocated but are
    /// detached from the surface.
    ///
    /// There is no `Drop` impl: dropping the progressive mesh drops the map
    /// together with its mark bits.
    pub fn into_map(self) -> M {
        self.map.base().release_marker(self.inactive);
        self.map
    }

    pub fn position(&self) -> AttributeHandle<Vec3> {
        self.position
    }

    pub fn config(&self) -> &PmConfig {
        &self.config
    }

    pub fn splits(&self) -> &[VSplit] {
        &self.splits
    }

    pub fn nb_splits(&self) -> usize {
        self.splits.len()
    }

    pub fn current_level(&self) -> usize {
        self.cur
    }

    pub fn detail_amount(&self) -> Real {
        self.detail_amount
    }

    pub fn has_local_frames(&self) -> bool {
        self.local_frame
    }

    pub fn is_active(&self, d: Dart) -> bool {
        !self.map.base().is_marked(self.inactive, d)
    }

    /// Number of vertices of the current level.
    pub fn nb_vertices(&self) -> usize {
        let base = self.map.base();
        let inactive = self.inactive;
        self.map.nb_orbits_where(Orbit::Vertex, &|d| !base.is_marked(inactive, d))
    }

    // ===========================================================================================
    // ===== Creation
    // ===========================================================================================

    /// Collapses edges until `percent_wanted` percent of the vertices are
    /// left (or the selector is exhausted), logging every collapse. Returns
    /// the number of splits. The mesh is left at the coarsest level.
    pub fn create_pm(&mut self, percent_wanted: u32) -> usize {
        let mut nb_vertices = self.nb_vertices();
        let nb_wanted = nb_vertices * percent_wanted.min(100) as usize / 100;
        info!("creating progressive mesh: {} vertices to {}", nb_vertices, nb_wanted);

        while nb_vertices > nb_wanted {
            let d = match self.selector.next_edge(&self.map) {
                Some(d) => d,
                None => {
                    debug!("selector exhausted with {} vertices left", nb_vertices);
                    break;
                }
            };
            nb_vertices -= 1;

            let d2 = self.map.phi2(self.map.phi_1(d));
            let dd2 = self.map.phi2(self.map.phi_1(self.map.phi2(d)));

            self.approximators.approximate(&mut self.map, d);
            self.approximators.save_approx(&self.map, d);
            let (detail, offset) = {
                let pos = self.approximators.position();
                let zero = Vec3::new(0.0, 0.0, 0.0);
                (pos.detail(&self.map, d).unwrap_or(zero), pos.offset(&self.map, d).unwrap_or(zero))
            };
            self.selector.update_before_collapse(&self.map, d);

            self.edge_collapse(d);
            let vertex = self.embed_copied_orbit(Orbit::Vertex, d2);
            let left_edge = self.embed_copied_orbit(Orbit::Edge, d2);
            let right_edge = self.embed_copied_orbit(Orbit::Edge, dd2);

            self.approximators.affect_approx(&mut self.map, d2);
            self.selector.update_after_collapse(&mut self.map, &mut self.approximators, d2, dd2);

            self.splits.push(VSplit {
                edge: d,
                left: d2,
                right: dd2,
                vertex,
                left_edge,
                right_edge,
                detail,
                offset,
            });
            if self.splits.len() % 1000 == 0 {
                debug!("{} collapses done, {} vertices left", self.splits.len(), nb_vertices);
            }
        }

        self.cur = self.splits.len();
        info!("progressive mesh created: {} splits, {} vertices at the coarsest level", self.splits.len(), nb_vertices);

        if self.has_details() {
            self.init_quantization();
        }
        self.splits.len()
    }

    /// Gives the orbit of `d` a new row holding a copy of its current values.
    fn embed_copied_orbit(&mut self, orbit: Orbit, d: Dart) -> hsize {
        let old = self.map.embedding(d, orbit);
        let row = self.map.embed_new_orbit(orbit, d);
        self.map.base_mut().container_mut(orbit).copy_line(row, old);
        row
    }

    fn edge_collapse(&mut self, d: Dart) {
        let e = self.map.phi2(d);
        let base = self.map.base();
        for x in self.map.face_darts(d).into_iter().chain(self.map.face_darts(e)) {
            base.mark(self.inactive, x);
        }
        self.map.extract_triangle_pair(d);
    }

    fn vertex_split(&mut self, vs: &VSplit) {
        let d = vs.edge;
        let e = self.map.phi2(d);
        self.map.insert_triangle_pair(d, vs.left, vs.right);
        let base = self.map.base();
        for x in self.map.face_darts(d).into_iter().chain(self.map.face_darts(e)) {
            base.unmark(self.inactive, x);
        }
    }

    // ===========================================================================================
    // ===== Level walk
    // ===========================================================================================

    /// Replays the next collapse. Does nothing at the coarsest level.
    pub fn coarsen(&mut self) {
        if self.cur == self.splits.len() {
            return;
        }
        let vs = self.splits[self.cur];
        self.cur += 1;

        self.edge_collapse(vs.edge);
        self.map.embed_orbit(Orbit::Vertex, vs.left, vs.vertex);
        self.map.embed_orbit(Orbit::Edge, vs.left, vs.left_edge);
        self.map.embed_orbit(Orbit::Edge, vs.right, vs.right_edge);
    }

    /// Undoes the last collapse. Does nothing at level 0.
    pub fn refine(&mut self) {
        if self.cur == 0 {
            return;
        }
        self.cur -= 1;
        let vs = self.splits[self.cur];
        let (d, d2, dd2) = (vs.edge, vs.left, vs.right);
        let dd = self.map.phi2(d);

        // The detached darts still carry the rows they had before the
        // collapse.
        let (v1, v2, e1, e2, e3, e4) = {
            let m = &self.map;
            let b = m.base();
            (
                b.dart_embedding(d, Orbit::Vertex),
                b.dart_embedding(dd, Orbit::Vertex),
                b.dart_embedding(m.phi1(d), Orbit::Edge),
                b.dart_embedding(m.phi_1(d), Orbit::Edge),
                b.dart_embedding(m.phi1(dd), Orbit::Edge),
                b.dart_embedding(m.phi_1(dd), Orbit::Edge),
            )
        };

        let prediction = if self.has_details() {
            self.approximators.position().predict_split(&self.map, d2, dd2)
        } else {
            None
        };
        let transform = if self.local_frame {
            Some(invert_or_identity(&vertex_local_frame(&self.map, self.position, dd2)))
        } else {
            None
        };

        let d1 = self.map.phi2(d2);
        let dd1 = self.map.phi2(dd2);
        self.vertex_split(&vs);

        self.map.embed_orbit(Orbit::Vertex, d, v1);
        self.map.embed_orbit(Orbit::Vertex, dd, v2);
        self.map.embed_orbit(Orbit::Edge, d1, e1);
        self.map.embed_orbit(Orbit::Edge, d2, e2);
        self.map.embed_orbit(Orbit::Edge, dd1, e3);
        self.map.embed_orbit(Orbit::Edge, dd2, e4);

        if let Some(p) = prediction {
            self.approximators.position().add_detail(
                &mut self.map,
                d,
                p,
                (vs.detail, vs.offset),
                self.detail_amount,
                transform.as_ref(),
            );
        }
    }

    /// Coarsens or refines until `level` is reached. Levels above
    /// [`nb_splits`][ProgressiveMesh::nb_splits] are ignored.
    pub fn goto_level(&mut self, level: usize) {
        if level == self.cur || level > self.splits.len() {
            return;
        }
        trace!("going from level {} to {}", self.cur, level);
        while self.cur < level {
            self.coarsen();
        }
        while self.cur > level {
            self.refine();
        }
    }

    /// Scales all detail vectors by `amount` (1 reproduces the input). The
    /// current level is rebuilt with the new amount.
    pub fn set_detail_amount(&mut self, amount: Real) {
        let level = self.cur;
        self.goto_level(self.splits.len());
        self.detail_amount = amount;
        self.goto_level(level);
    }

    // ===========================================================================================
    // ===== Detail vectors
    // ===========================================================================================

    fn has_details(&self) -> bool {
        self.approximators.predictor().is_some()
    }

    fn require_details(&self) -> Result<(), Error> {
        if self.has_details() {
            Ok(())
        } else {
            Err(Error::MissingPredictor(self.config.approximator))
        }
    }

    /// The current detail vector of every split, in log order. Empty without
    /// predictor.
    pub fn detail_vectors(&self) -> Vec<Vec3> {
        if !self.has_details() {
            return Vec::new();
        }
        self.splits.iter().map(|vs| vs.detail).collect()
    }

    /// The detail vectors as computed when the log was created (or as
    /// converted by the last change of frames).
    pub fn original_detail_vectors(&self) -> &[Vec3] {
        &self.original_details
    }

    fn write_details(&mut self, details: &[Vec3]) {
        for (vs, &v) in self.splits.iter_mut().zip(details) {
            vs.detail = v;
        }
    }

    /// Expresses every detail vector in the local frame of its split vertex
    /// on the coarse mesh. Refining transforms them back.
    pub fn localize_detail_vectors(&mut self) -> Result<(), Error> {
        self.change_frames(true)
    }

    /// Inverse of
    /// [`localize_detail_vectors`][ProgressiveMesh::localize_detail_vectors].
    pub fn globalize_detail_vectors(&mut self) -> Result<(), Error> {
        self.change_frames(false)
    }

    fn change_frames(&mut self, local: bool) -> Result<(), Error> {
        self.require_details()?;
        if self.local_frame == local {
            return Ok(());
        }

        let level = self.cur;
        let requantize = self.quantization;
        if requantize.is_some() {
            self.reset_detail_vectors()?;
        }

        // The frames are computed on the same coarse mesh refine sees, so
        // the new mode has to be active while walking down.
        self.goto_level(self.splits.len());
        self.local_frame = local;
        while self.cur > 0 {
            let vs = &mut self.splits[self.cur - 1];
            let frame = vertex_local_frame(&self.map, self.position, vs.right);
            let frame: Mat33 = if local { frame } else { invert_or_identity(&frame) };
            vs.detail = frame * vs.detail;
            self.refine();
        }
        debug!("detail vectors expressed in {} frames", if local { "local" } else { "global" });

        self.init_quantization();
        match requantize {
            Some(QuantizationRequest::Classes(n)) => { self.quantize_detail_vectors(n)?; }
            Some(QuantizationRequest::Distortion(d)) => { self.quantize_detail_vectors_distortion(d)?; }
            None => {}
        }
        self.goto_level(level);
        Ok(())
    }

    /// Takes the current detail vectors as the originals that quantization
    /// starts from and [`reset_detail_vectors`] restores.
    ///
    /// [`reset_detail_vectors`]: ProgressiveMesh::reset_detail_vectors
    pub fn init_quantization(&mut self) {
        self.goto_level(self.splits.len());
        self.original_details = self.detail_vectors();
        self.quantization = None;
    }

    /// Replaces the detail vectors by at most `nb_classes` distinct vectors
    /// and goes to level 0.
    pub fn quantize_detail_vectors(&mut self, nb_classes: usize) -> Result<QuantizationReport, Error> {
        self.require_details()?;
        let q = self.quantizer.quantize_classes(&self.original_details, nb_classes);
        let report = self.apply_quantization(q, QuantizationRequest::Classes(nb_classes));
        Ok(report)
    }

    /// Replaces the detail vectors by as few distinct vectors as needed to
    /// keep the mean squared error below `max_distortion` and goes to
    /// level 0.
    pub fn quantize_detail_vectors_distortion(&mut self, max_distortion: Real) -> Result<QuantizationReport, Error> {
        self.require_details()?;
        let q = self.quantizer.quantize_distortion(&self.original_details, max_distortion);
        let report = self.apply_quantization(q, QuantizationRequest::Distortion(max_distortion));
        Ok(report)
    }

    fn apply_quantization(&mut self, q: Quantization, request: QuantizationRequest) -> QuantizationReport {
        self.goto_level(self.splits.len());
        self.write_details(&q.vectors);
        self.quantization = Some(request);
        self.goto_level(0);

        let mut distinct: Vec<Vec3> = Vec::new();
        for v in &q.vectors {
            if !distinct.contains(v) {
                distinct.push(*v);
            }
        }
        let report = QuantizationReport {
            differential_entropy: q.differential_entropy,
            discrete_entropy: q.discrete_entropy,
            distinct_vectors: distinct.len(),
        };
        info!(
            "quantized {} detail vectors to {} values (differential entropy {:.3}, discrete entropy {:.3})",
            q.vectors.len(),
            report.distinct_vectors,
            report.differential_entropy,
            report.discrete_entropy,
        );
        report
    }

    /// Restores the detail vectors saved by
    /// [`init_quantization`][ProgressiveMesh::init_quantization] and goes
    /// to level 0.
    pub fn reset_detail_vectors(&mut self) -> Result<(), Error> {
        self.require_details()?;
        self.goto_level(self.splits.len());
        let originals = std::mem::take(&mut self.original_details);
        self.write_details(&originals);
        self.original_details = originals;
        self.quantization = None;
        self.goto_level(0);
        Ok(())
    }
}
