use cgmath::SquareMatrix;

use crate::{
    container::AttributeHandle,
    core::SurfaceMap,
    handle::Dart,
    math::{orthonormalize_frame, Mat33, Mat36, Vec3},
    orbit::Orbit,
};
use super::{
    predictor::{Predictor, SplitNeighbourhood},
    quadric::{compute_vertex_quadrics, Quadric},
    ApproximatorType, Error, FRAME_ATTRIBUTE, QUADRIC_ATTRIBUTE, RGB_ATTRIBUTE,
};


/// Computes the value of one vertex attribute for the vertex resulting from
/// an edge collapse.
///
/// The value for the edge of `d` is computed by `approximate` and stored in
/// an edge attribute, so that selectors can look at it. `save_approx` copies
/// it out of the map right before the collapse and `affect_approx` writes it
/// onto the merged vertex afterwards.
pub trait Approximator<M: SurfaceMap> {
    /// Name of the approximated vertex attribute.
    fn attribute_name(&self) -> &'static str;

    fn init(&mut self, map: &mut M) -> bool;
    fn approximate(&mut self, map: &mut M, d: Dart);
    fn save_approx(&mut self, map: &M, d: Dart);
    fn affect_approx(&mut self, map: &mut M, d: Dart);
}


/// How the merged position is computed from the edge `(v0, v1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PositionRule {
    /// Minimizer of the summed quadrics, or the midpoint if there is none.
    Qem,
    MidEdge,
    /// Midpoint pushed away from the centroid of the surrounding ring.
    CornerCutting,
    /// The position of `v0`.
    HalfCollapse,
}

#[derive(Clone, Copy, Debug)]
struct DetailAttributes {
    detail: AttributeHandle<Vec3>,
    offset: AttributeHandle<Vec3>,
}

/// Approximates vertex positions. With a predictor, it also stores the
/// detail vectors needed to split the merged vertex again.
#[derive(Clone, Debug)]
pub struct PositionApproximator {
    rule: PositionRule,
    position: AttributeHandle<Vec3>,
    approx: AttributeHandle<Vec3>,
    predictor: Option<Predictor>,
    details: Option<DetailAttributes>,
    quadric: Option<AttributeHandle<Quadric>>,
    saved: Vec3,
    saved_quadric: Quadric,
}

impl PositionApproximator {
    pub fn new<M: SurfaceMap>(
        map: &mut M,
        rule: PositionRule,
        position: AttributeHandle<Vec3>,
        predictor: Option<Predictor>,
    ) -> Self {
        let details = predictor.map(|_| DetailAttributes {
            detail: map.add_attribute(Orbit::Edge, "detail_position"),
            offset: map.add_attribute(Orbit::Edge, "offset_position"),
        });
        let quadric = if rule == PositionRule::Qem {
            Some(map.add_attribute(Orbit::Vertex, QUADRIC_ATTRIBUTE))
        } else {
            None
        };

        Self {
            rule,
            position,
            approx: map.add_attribute(Orbit::Edge, "approx_position"),
            predictor,
            details,
            quadric,
            saved: Vec3::new(0.0, 0.0, 0.0),
            saved_quadric: Quadric::zero(),
        }
    }

    pub fn rule(&self) -> PositionRule {
        self.rule
    }

    pub fn position(&self) -> AttributeHandle<Vec3> {
        self.position
    }

    pub fn predictor(&self) -> Option<Predictor> {
        self.predictor
    }

    /// The vertex quadrics, maintained by the `Qem` rule.
    pub fn quadric(&self) -> Option<AttributeHandle<Quadric>> {
        self.quadric
    }

    /// The last position computed for the edge of `d`.
    pub fn approximation<M: SurfaceMap>(&self, map: &M, d: Dart) -> Vec3 {
        *map.attr(self.approx, d)
    }

    /// The detail vector of the edge of `d`, if details are stored.
    pub fn detail<M: SurfaceMap>(&self, map: &M, d: Dart) -> Option<Vec3> {
        self.details.map(|h| *map.attr(h.detail, d))
    }

    pub fn offset<M: SurfaceMap>(&self, map: &M, d: Dart) -> Option<Vec3> {
        self.details.map(|h| *map.attr(h.offset, d))
    }

    /// Predicts the split vertices of a collapsed edge on the coarse mesh.
    /// `d2` and `dd2` are the darts of the merged vertex bounding the two
    /// removed triangles.
    pub fn predict_split<M: SurfaceMap>(&self, map: &M, d2: Dart, dd2: Dart) -> Option<(Vec3, Vec3)> {
        let predictor = self.predictor?;
        let a = *map.attr(self.position, d2);
        let ring = SplitNeighbourhood::after_collapse(map, self.position, d2, dd2);
        Some(predictor.predict(a, &ring))
    }

    /// Writes the positions of a split vertex pair. `d` is the collapsed edge
    /// (already reinserted), `d` and `phi2(d)` get `p0 + s*(offset + t)` and
    /// `p1 + s*(offset - t)` with `t` the (optionally transformed) detail.
    pub fn add_detail<M: SurfaceMap>(
        &self,
        map: &mut M,
        d: Dart,
        (p0, p1): (Vec3, Vec3),
        (detail, offset): (Vec3, Vec3),
        amount: f64,
        transform: Option<&Mat33>,
    ) {
        let detail = transform.map(|t| *t * detail).unwrap_or(detail);
        let dd = map.phi2(d);
        map.set_attr(self.position, d, p0 + (offset + detail) * amount);
        map.set_attr(self.position, dd, p1 + (offset - detail) * amount);
    }

    fn merged_position<M: SurfaceMap>(&self, map: &M, d: Dart) -> Vec3 {
        let e = map.phi2(d);
        let p0 = *map.attr(self.position, d);
        let p1 = *map.attr(self.position, e);
        let mid = (p0 + p1) * 0.5;

        match self.rule {
            PositionRule::Qem => match self.quadric {
                Some(q) => (*map.attr(q, d) + *map.attr(q, e)).optimal_point().unwrap_or(mid),
                None => mid,
            },
            PositionRule::MidEdge => mid,
            PositionRule::HalfCollapse => p0,
            PositionRule::CornerCutting => {
                let ring = SplitNeighbourhood::before_collapse(map, self.position, d);
                mid + (mid - ring.centroid()) * 0.25
            }
        }
    }
}

impl<M: SurfaceMap> Approximator<M> for PositionApproximator {
    fn attribute_name(&self) -> &'static str {
        "position"
    }

    fn init(&mut self, map: &mut M) -> bool {
        if self.position.orbit() != Orbit::Vertex {
            return false;
        }
        if let Some(q) = self.quadric {
            compute_vertex_quadrics(map, self.position, q);
        }
        true
    }

    fn approximate(&mut self, map: &mut M, d: Dart) {
        let a = self.merged_position(map, d);
        map.set_attr(self.approx, d, a);

        if let (Some(predictor), Some(h)) = (self.predictor, self.details) {
            let ring = SplitNeighbourhood::before_collapse(map, self.position, d);
            let (q0, q1) = predictor.predict(a, &ring);
            let e0 = *map.attr(self.position, d) - q0;
            let e1 = *map.attr(self.position, map.phi2(d)) - q1;
            map.set_attr(h.detail, d, (e0 - e1) * 0.5);
            map.set_attr(h.offset, d, (e0 + e1) * 0.5);
        }
    }

    fn save_approx(&mut self, map: &M, d: Dart) {
        self.saved = *map.attr(self.approx, d);
        if let Some(q) = self.quadric {
            self.saved_quadric = *map.attr(q, d) + *map.attr(q, map.phi2(d));
        }
    }

    fn affect_approx(&mut self, map: &mut M, d: Dart) {
        map.set_attr(self.position, d, self.saved);
        if let Some(q) = self.quadric {
            map.set_attr(q, d, self.saved_quadric);
        }
    }
}


/// Approximates the local frames of a light field: the re-orthonormalized
/// mean of the two frames.
#[derive(Clone, Debug)]
pub struct FrameApproximator {
    frame: AttributeHandle<Mat33>,
    approx: AttributeHandle<Mat33>,
    saved: Mat33,
}

impl FrameApproximator {
    pub fn new<M: SurfaceMap>(map: &mut M, frame: AttributeHandle<Mat33>) -> Self {
        Self {
            frame,
            approx: map.add_attribute(Orbit::Edge, "approx_frame"),
            saved: Mat33::identity(),
        }
    }

    pub fn frame(&self) -> AttributeHandle<Mat33> {
        self.frame
    }

    pub fn approximation<M: SurfaceMap>(&self, map: &M, d: Dart) -> Mat33 {
        *map.attr(self.approx, d)
    }
}

impl<M: SurfaceMap> Approximator<M> for FrameApproximator {
    fn attribute_name(&self) -> &'static str {
        FRAME_ATTRIBUTE
    }

    fn init(&mut self, _map: &mut M) -> bool {
        self.frame.orbit() == Orbit::Vertex
    }

    fn approximate(&mut self, map: &mut M, d: Dart) {
        let f0 = *map.attr(self.frame, d);
        let f1 = *map.attr(self.frame, map.phi2(d));
        let mean = (f0 + f1) * 0.5;
        map.set_attr(self.approx, d, orthonormalize_frame(&mean));
    }

    fn save_approx(&mut self, map: &M, d: Dart) {
        self.saved = *map.attr(self.approx, d);
    }

    fn affect_approx(&mut self, map: &mut M, d: Dart) {
        map.set_attr(self.frame, d, self.saved);
    }
}


/// Approximates the color functions of a light field by their mean.
#[derive(Clone, Debug)]
pub struct RgbFunctionsApproximator {
    rgb: AttributeHandle<Mat36>,
    approx: AttributeHandle<Mat36>,
    saved: Mat36,
}

impl RgbFunctionsApproximator {
    pub fn new<M: SurfaceMap>(map: &mut M, rgb: AttributeHandle<Mat36>) -> Self {
        Self {
            rgb,
            approx: map.add_attribute(Orbit::Edge, "approx_RGBfunctions"),
            saved: Mat36::zero(),
        }
    }

    pub fn functions(&self) -> AttributeHandle<Mat36> {
        self.rgb
    }

    pub fn approximation<M: SurfaceMap>(&self, map: &M, d: Dart) -> Mat36 {
        *map.attr(self.approx, d)
    }
}

impl<M: SurfaceMap> Approximator<M> for RgbFunctionsApproximator {
    fn attribute_name(&self) -> &'static str {
        RGB_ATTRIBUTE
    }

    fn init(&mut self, _map: &mut M) -> bool {
        self.rgb.orbit() == Orbit::Vertex
    }

    fn approximate(&mut self, map: &mut M, d: Dart) {
        let r0 = *map.attr(self.rgb, d);
        let r1 = *map.attr(self.rgb, map.phi2(d));
        map.set_attr(self.approx, d, r0.lerp(&r1, 0.5));
    }

    fn save_approx(&mut self, map: &M, d: Dart) {
        self.saved = *map.attr(self.approx, d);
    }

    fn affect_approx(&mut self, map: &mut M, d: Dart) {
        map.set_attr(self.rgb, d, self.saved);
    }
}


/// The approximators of one [`ApproximatorType`], driven together.
#[derive(Clone, Debug)]
pub struct Approximators {
    kind: ApproximatorType,
    position: PositionApproximator,
    frame: Option<FrameApproximator>,
    rgb: Option<RgbFunctionsApproximator>,
}

impl Approximators {
    /// Creates the approximators and their helper attributes. With
    /// `with_predictor`, the predictor of `kind` (if it has one) is used and
    /// detail vectors are stored.
    ///
    /// Fails if `kind` needs vertex attributes the map does not have.
    pub fn new<M: SurfaceMap>(
        map: &mut M,
        kind: ApproximatorType,
        position: AttributeHandle<Vec3>,
        with_predictor: bool,
    ) -> Result<Self, Error> {
        let (frame, rgb) = if kind.is_lightfield() {
            let frame = map.base().attribute::<Mat33>(Orbit::Vertex, FRAME_ATTRIBUTE)
                .ok_or_else(|| Error::MissingAttribute(FRAME_ATTRIBUTE.into()))?;
            let rgb = map.base().attribute::<Mat36>(Orbit::Vertex, RGB_ATTRIBUTE)
                .ok_or_else(|| Error::MissingAttribute(RGB_ATTRIBUTE.into()))?;
            (
                Some(FrameApproximator::new(map, frame)),
                Some(RgbFunctionsApproximator::new(map, rgb)),
            )
        } else {
            (None, None)
        };

        let predictor = if with_predictor { kind.predictor().map(Predictor::new) } else { None };
        Ok(Self {
            kind,
            position: PositionApproximator::new(map, kind.position_rule(), position, predictor),
            frame,
            rgb,
        })
    }

    pub fn kind(&self) -> ApproximatorType {
        self.kind
    }

    pub fn position(&self) -> &PositionApproximator {
        &self.position
    }

    pub fn frame(&self) -> Option<&FrameApproximator> {
        self.frame.as_ref()
    }

    pub fn rgb(&self) -> Option<&RgbFunctionsApproximator> {
        self.rgb.as_ref()
    }

    pub fn predictor(&self) -> Option<Predictor> {
        self.position.predictor()
    }

    fn each<M: SurfaceMap>(&mut self, mut f: impl FnMut(&mut dyn Approximator<M>)) {
        f(&mut self.position as &mut dyn Approximator<M>);
        if let Some(a) = &mut self.frame {
            f(a as &mut dyn Approximator<M>);
        }
        if let Some(a) = &mut self.rgb {
            f(a as &mut dyn Approximator<M>);
        }
    }

    pub fn init<M: SurfaceMap>(&mut self, map: &mut M) -> Result<(), Error> {
        let mut failed = None;
        self.each::<M>(|a| {
            if failed.is_none() && !a.init(map) {
                failed = Some(a.attribute_name());
            }
        });
        match failed {
            Some(name) => Err(Error::ApproximatorInit(name.into())),
            None => Ok(()),
        }
    }

    pub fn approximate<M: SurfaceMap>(&mut self, map: &mut M, d: Dart) {
        self.each::<M>(|a| a.approximate(map, d));
    }

    pub fn save_approx<M: SurfaceMap>(&mut self, map: &M, d: Dart) {
        self.each::<M>(|a| a.save_approx(map, d));
    }

    pub fn affect_approx<M: SurfaceMap>(&mut self, map: &mut M, d: Dart) {
        self.each::<M>(|a| a.affect_approx(map, d));
    }
}
