//! Mesh simplification by successive edge collapses.
//!
//! Three strategies cooperate:
//!
//! - a **selector** decides which edge to collapse next,
//! - **approximators** compute the attribute values of the merged vertex
//!   (position, and for light fields also frame and color functions),
//! - an optional **predictor** guesses the split vertices back from the
//!   merged one. Approximators store the difference to the real positions
//!   as *detail vectors*, which makes the collapse reversible (see
//!   [`pmesh`][super::pmesh]).
//!
//! All strategies are chosen by enum tags and created by [`decimate`] and
//! [`ProgressiveMesh`][super::pmesh::ProgressiveMesh].

use failure::Fail;
use log::{debug, info};

use crate::{
    container::AttributeHandle,
    core::SurfaceMap,
    math::Vec3,
    orbit::Orbit,
};

mod approximator;
mod predictor;
mod quadric;
mod selector;


pub use self::{
    approximator::{
        Approximator, Approximators, FrameApproximator, PositionApproximator,
        PositionRule, RgbFunctionsApproximator,
    },
    predictor::{Predictor, SplitNeighbourhood},
    quadric::Quadric,
    selector::{create_selector, Cost, CostKind, CostSelector, EdgeSelector, MapOrderSelector, RandomSelector},
};


/// Name of the vertex attribute holding the accumulated quadrics.
pub const QUADRIC_ATTRIBUTE: &str = "QEMquadric";
/// Vertex attribute with the local frames of a light field.
pub const FRAME_ATTRIBUTE: &str = "frame";
/// Vertex attribute with the color functions of a light field.
pub const RGB_ATTRIBUTE: &str = "RGBfunctions";


/// Which edge to collapse next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SelectorType {
    /// First collapsible edge in dart order.
    MapOrder,
    /// Collapsible edges in a seeded random order.
    Random,
    /// Shortest edge first.
    EdgeLength,
    /// Smallest quadric error of the approximated position first.
    Qem,
    /// Quadric error plus the change of frames and color functions.
    Lightfield,
    /// Short edges in flat regions first.
    Curvature,
    /// Smallest position detail vector first. Needs a predictor.
    MinDetail,
}

/// How the attributes of the merged vertex are computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApproximatorType {
    Qem,
    MidEdge,
    CornerCutting,
    TangentPredict1,
    TangentPredict2,
    HalfCollapse,
    /// Qem for positions, plus frames and color functions.
    LightfieldFull,
}

impl ApproximatorType {
    /// The rule used for the merged position.
    pub fn position_rule(self) -> PositionRule {
        match self {
            ApproximatorType::Qem | ApproximatorType::LightfieldFull => PositionRule::Qem,
            ApproximatorType::MidEdge
            | ApproximatorType::TangentPredict1
            | ApproximatorType::TangentPredict2 => PositionRule::MidEdge,
            ApproximatorType::CornerCutting => PositionRule::CornerCutting,
            ApproximatorType::HalfCollapse => PositionRule::HalfCollapse,
        }
    }

    /// The predictor that goes with this approximator, if any.
    pub fn predictor(self) -> Option<PredictorType> {
        match self {
            ApproximatorType::Qem | ApproximatorType::LightfieldFull | ApproximatorType::MidEdge => None,
            ApproximatorType::CornerCutting => Some(PredictorType::CornerCutting),
            ApproximatorType::TangentPredict1 => Some(PredictorType::TangentPredict1),
            ApproximatorType::TangentPredict2 => Some(PredictorType::TangentPredict2),
            ApproximatorType::HalfCollapse => Some(PredictorType::HalfCollapse),
        }
    }

    pub fn is_lightfield(self) -> bool {
        self == ApproximatorType::LightfieldFull
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PredictorType {
    HalfCollapse,
    CornerCutting,
    TangentPredict1,
    TangentPredict2,
}


/// Strategies for [`decimate`].
#[derive(Clone, Debug, PartialEq)]
pub struct DecimationConfig {
    pub selector: SelectorType,
    pub approximator: ApproximatorType,
    /// Seed of [`SelectorType::Random`].
    pub seed: u64,
}

impl Default for DecimationConfig {
    fn default() -> Self {
        Self {
            selector: SelectorType::Qem,
            approximator: ApproximatorType::Qem,
            seed: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecimationReport {
    /// Number of edges collapsed.
    pub collapses: usize,
    /// Number of vertices left.
    pub vertices: usize,
}


#[derive(Debug, Fail, Clone, PartialEq, Eq)]
pub enum Error {
    #[fail(display = "selector {:?} could not be initialized", _0)]
    SelectorInit(SelectorType),

    #[fail(display = "approximator for '{}' could not be initialized", _0)]
    ApproximatorInit(String),

    #[fail(display = "vertex attribute '{}' is required but missing", _0)]
    MissingAttribute(String),

    #[fail(display = "the selected strategy needs a predictor, but approximator {:?} has none", _0)]
    MissingPredictor(ApproximatorType),
}


/// Collapses edges of `map` until at most `nb_wanted_vertices` vertices are
/// left or the selector runs out of collapsible edges.
///
/// `position` is the vertex position attribute. Approximators and selectors
/// add helper attributes to the map (quadrics, approximated values, detail
/// vectors) which are left in place.
pub fn decimate<M: SurfaceMap>(
    map: &mut M,
    position: AttributeHandle<Vec3>,
    nb_wanted_vertices: usize,
    config: &DecimationConfig,
) -> Result<DecimationReport, Error> {
    let mut approximators = Approximators::new(map, config.approximator, position, true)?;
    let mut selector = create_selector::<M>(config.selector, position, config.seed);

    approximators.init(map)?;
    if !selector.init(map, &mut approximators) {
        return Err(Error::SelectorInit(config.selector));
    }

    let mut nb_vertices = map.nb_orbits(Orbit::Vertex);
    info!(
        "decimating {} vertices to {} ({:?} selector, {:?} approximator)",
        nb_vertices,
        nb_wanted_vertices,
        config.selector,
        config.approximator,
    );

    let mut collapses = 0;
    while nb_vertices > nb_wanted_vertices {
        let d = match selector.next_edge(map) {
            Some(d) => d,
            None => {
                debug!("selector exhausted with {} vertices left", nb_vertices);
                break;
            }
        };
        nb_vertices -= 1;

        let d2 = map.phi2(map.phi_1(d));
        let dd2 = map.phi2(map.phi_1(map.phi2(d)));

        approximators.approximate(map, d);
        approximators.save_approx(map, d);
        selector.update_before_collapse(map, d);

        map.collapse_edge(d);

        approximators.affect_approx(map, d2);
        selector.update_after_collapse(map, &mut approximators, d2, dd2);
        collapses += 1;
    }

    info!("decimation done: {} collapses, {} vertices left", collapses, nb_vertices);
    Ok(DecimationReport {
        collapses,
        vertices: nb_vertices,
    })
}
