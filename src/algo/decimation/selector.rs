use std::{cmp::Ordering, collections::BTreeSet};

use cgmath::InnerSpace;
use fxhash::{FxHashMap, FxHashSet};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{
    algo::geometry::{edge_length, mean_curvature},
    container::AttributeHandle,
    core::SurfaceMap,
    handle::Dart,
    math::{frobenius_norm33, Real, Vec3},
    orbit::Orbit,
};
use super::{
    approximator::Approximators,
    quadric::{compute_vertex_quadrics, Quadric},
    SelectorType, QUADRIC_ATTRIBUTE,
};


/// Chooses the edges to collapse.
///
/// The collapse loop calls `next_edge`, then `update_before_collapse` right
/// before changing the topology and `update_after_collapse` with the darts
/// `d2 = phi2(phi_1(d))` and `dd2 = phi2(phi_1(phi2(d)))` of the merged
/// vertex afterwards.
pub trait EdgeSelector<M: SurfaceMap> {
    fn kind(&self) -> SelectorType;

    /// Prepares the selector. Returns `false` if it cannot work on this map
    /// (no edges, or the approximators lack something it needs).
    fn init(&mut self, map: &mut M, approx: &mut Approximators) -> bool;

    /// The next edge to collapse, or `None` if no edge can be collapsed.
    fn next_edge(&mut self, map: &M) -> Option<Dart>;

    fn update_before_collapse(&mut self, map: &M, d: Dart);

    fn update_after_collapse(&mut self, map: &mut M, approx: &mut Approximators, d2: Dart, dd2: Dart);
}

/// Creates the selector for `kind`.
pub fn create_selector<M: SurfaceMap>(
    kind: SelectorType,
    position: AttributeHandle<Vec3>,
    seed: u64,
) -> Box<dyn EdgeSelector<M>> {
    let cost = match kind {
        SelectorType::MapOrder => return Box::new(MapOrderSelector::new()),
        SelectorType::Random => return Box::new(RandomSelector::new(seed)),
        SelectorType::EdgeLength => CostKind::EdgeLength,
        SelectorType::Qem => CostKind::Qem,
        SelectorType::Lightfield => CostKind::Lightfield,
        SelectorType::Curvature => CostKind::Curvature,
        SelectorType::MinDetail => CostKind::MinDetail,
    };
    Box::new(CostSelector::new(cost, position))
}

fn has_edges<M: SurfaceMap>(map: &M) -> bool {
    map.nb_orbits(Orbit::Edge) > 0
}


// ===============================================================================================
// ===== MapOrder
// ===============================================================================================

/// Collapses the first collapsible edge in dart order.
#[derive(Clone, Debug, Default)]
pub struct MapOrderSelector {
    cur: Option<Dart>,
}

impl MapOrderSelector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M: SurfaceMap> EdgeSelector<M> for MapOrderSelector {
    fn kind(&self) -> SelectorType {
        SelectorType::MapOrder
    }

    fn init(&mut self, map: &mut M, _: &mut Approximators) -> bool {
        self.cur = None;
        has_edges(map)
    }

    fn next_edge(&mut self, map: &M) -> Option<Dart> {
        let base = map.base();
        let mut d = self.cur.filter(|&d| base.is_dart_valid(d)).unwrap_or_else(|| base.begin());
        while d != base.end() {
            if map.edge_can_collapse(d) {
                self.cur = Some(d);
                return Some(d);
            }
            d = base.next(d);
        }
        self.cur = None;
        None
    }

    fn update_before_collapse(&mut self, _: &M, _: Dart) {}

    fn update_after_collapse(&mut self, _: &mut M, _: &mut Approximators, _: Dart, _: Dart) {
        // Collapses change what is collapsible before the cursor.
        self.cur = None;
    }
}


// ===============================================================================================
// ===== Random
// ===============================================================================================

/// Visits the edges in a random order fixed at `init`. Passes over the
/// list are repeated as long as the previous pass collapsed something.
#[derive(Clone, Debug)]
pub struct RandomSelector {
    seed: u64,
    darts: Vec<Dart>,
    cur: usize,
    progressed: bool,
}

impl RandomSelector {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            darts: Vec::new(),
            cur: 0,
            progressed: false,
        }
    }
}

impl<M: SurfaceMap> EdgeSelector<M> for RandomSelector {
    fn kind(&self) -> SelectorType {
        SelectorType::Random
    }

    fn init(&mut self, map: &mut M, _: &mut Approximators) -> bool {
        self.darts = map.orbits(Orbit::Edge);
        self.darts.shuffle(&mut StdRng::seed_from_u64(self.seed));
        self.cur = 0;
        self.progressed = false;
        !self.darts.is_empty()
    }

    fn next_edge(&mut self, map: &M) -> Option<Dart> {
        loop {
            while let Some(&d) = self.darts.get(self.cur) {
                if map.base().is_dart_valid(d) && map.edge_can_collapse(d) {
                    return Some(d);
                }
                self.cur += 1;
            }

            if !self.progressed {
                return None;
            }
            self.progressed = false;
            self.cur = 0;
        }
    }

    fn update_before_collapse(&mut self, _: &M, _: Dart) {}

    fn update_after_collapse(&mut self, _: &mut M, _: &mut Approximators, _: Dart, _: Dart) {
        self.progressed = true;
    }
}


// ===============================================================================================
// ===== Cost based selectors
// ===============================================================================================

/// A collapse cost, totally ordered.
#[derive(Clone, Copy, Debug)]
pub struct Cost(pub Real);

impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cost {}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CostKind {
    /// Squared edge length.
    EdgeLength,
    /// Quadric error of the approximated position.
    Qem,
    /// Quadric error plus the squared change of frames and color functions.
    Lightfield,
    /// Edge length times one plus the mean curvature of the end points.
    Curvature,
    /// Norm of the position detail vector.
    MinDetail,
}

impl CostKind {
    pub fn selector_type(self) -> SelectorType {
        match self {
            CostKind::EdgeLength => SelectorType::EdgeLength,
            CostKind::Qem => SelectorType::Qem,
            CostKind::Lightfield => SelectorType::Lightfield,
            CostKind::Curvature => SelectorType::Curvature,
            CostKind::MinDetail => SelectorType::MinDetail,
        }
    }

    fn needs_quadrics(self) -> bool {
        match self {
            CostKind::Qem | CostKind::Lightfield => true,
            _ => false,
        }
    }
}

/// Collapses the edge of minimal cost. Edges are identified by their
/// smaller dart.
///
/// After a collapse the costs of all edges around the merged vertex and its
/// neighbours are recomputed, since both the positions and the
/// collapsibility of those edges may have changed.
#[derive(Clone, Debug)]
pub struct CostSelector {
    kind: CostKind,
    position: AttributeHandle<Vec3>,
    quadric: Option<AttributeHandle<Quadric>>,
    queue: BTreeSet<(Cost, Dart)>,
    costs: FxHashMap<Dart, Cost>,
    saved_quadric: Quadric,
}

impl CostSelector {
    pub fn new(kind: CostKind, position: AttributeHandle<Vec3>) -> Self {
        Self {
            kind,
            position,
            quadric: None,
            queue: BTreeSet::new(),
            costs: FxHashMap::default(),
            saved_quadric: Quadric::zero(),
        }
    }

    pub fn cost_kind(&self) -> CostKind {
        self.kind
    }

    /// Number of edges currently ranked.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The stored cost of the edge of `d`.
    pub fn cost_of<M: SurfaceMap>(&self, map: &M, d: Dart) -> Option<Real> {
        self.costs.get(&edge_key(map, d)).map(|c| c.0)
    }

    fn forget(&mut self, key: Dart) {
        if let Some(c) = self.costs.remove(&key) {
            self.queue.remove(&(c, key));
        }
    }

    fn update_edge<M: SurfaceMap>(&mut self, map: &mut M, approx: &mut Approximators, d: Dart) {
        let key = edge_key(map, d);
        self.forget(key);
        if !map.edge_can_collapse(key) {
            return;
        }
        if let Some(cost) = self.compute_cost(map, approx, key) {
            self.costs.insert(key, cost);
            self.queue.insert((cost, key));
        }
    }

    fn compute_cost<M: SurfaceMap>(&self, map: &mut M, approx: &mut Approximators, d: Dart) -> Option<Cost> {
        let e = map.phi2(d);
        let cost = match self.kind {
            CostKind::EdgeLength => edge_length(map, self.position, d).powi(2),

            CostKind::Curvature => {
                let h = (mean_curvature(map, self.position, d) + mean_curvature(map, self.position, e)) / 2.0;
                edge_length(map, self.position, d) * (1.0 + h)
            }

            CostKind::Qem | CostKind::Lightfield => {
                let q = self.quadric?;
                approx.approximate(map, d);
                let a = approx.position().approximation(map, d);
                let mut cost = (*map.attr(q, d) + *map.attr(q, e)).evaluate(a);

                if self.kind == CostKind::Lightfield {
                    let frame = approx.frame()?;
                    let fa = frame.approximation(map, d);
                    let (f0, f1) = (*map.attr(frame.frame(), d), *map.attr(frame.frame(), e));
                    cost += frobenius_norm33(&(fa - f0)).powi(2) + frobenius_norm33(&(fa - f1)).powi(2);

                    let rgb = approx.rgb()?;
                    let ra = rgb.approximation(map, d);
                    let (r0, r1) = (*map.attr(rgb.functions(), d), *map.attr(rgb.functions(), e));
                    cost += (ra - r0).frobenius_norm().powi(2) + (ra - r1).frobenius_norm().powi(2);
                }
                cost
            }

            CostKind::MinDetail => {
                approx.approximate(map, d);
                approx.position().detail(map, d)?.magnitude()
            }
        };
        Some(Cost(cost))
    }
}

/// The smaller dart of the edge of `d`.
fn edge_key<M: SurfaceMap>(map: &M, d: Dart) -> Dart {
    d.min(map.phi2(d))
}

/// Adds the keys of all edges incident to the vertex of `d` or to one of
/// its neighbours.
fn collect_ring_edges<M: SurfaceMap>(map: &M, d: Dart, out: &mut FxHashSet<Dart>) {
    for x in map.vertex_darts(d) {
        out.insert(edge_key(map, x));
        for y in map.vertex_darts(map.phi1(x)) {
            out.insert(edge_key(map, y));
        }
    }
}

impl<M: SurfaceMap> EdgeSelector<M> for CostSelector {
    fn kind(&self) -> SelectorType {
        self.kind.selector_type()
    }

    fn init(&mut self, map: &mut M, approx: &mut Approximators) -> bool {
        match self.kind {
            CostKind::MinDetail if approx.predictor().is_none() => return false,
            CostKind::Lightfield if approx.frame().is_none() || approx.rgb().is_none() => return false,
            _ => {}
        }
        if !has_edges(map) {
            return false;
        }

        self.quadric = None;
        if self.kind.needs_quadrics() {
            let q = match approx.position().quadric() {
                // Already computed by the approximator.
                Some(q) => q,
                None => {
                    let q = map.add_attribute(Orbit::Vertex, QUADRIC_ATTRIBUTE);
                    compute_vertex_quadrics(map, self.position, q);
                    q
                }
            };
            self.quadric = Some(q);
        }

        self.queue.clear();
        self.costs.clear();
        for d in map.orbits(Orbit::Edge) {
            self.update_edge(map, approx, d);
        }
        true
    }

    fn next_edge(&mut self, map: &M) -> Option<Dart> {
        loop {
            let (cost, d) = match self.queue.iter().next() {
                Some(&entry) => entry,
                None => return None,
            };
            if map.base().is_dart_valid(d) && map.edge_can_collapse(d) {
                return Some(d);
            }
            self.queue.remove(&(cost, d));
            self.costs.remove(&d);
        }
    }

    fn update_before_collapse(&mut self, map: &M, d: Dart) {
        let mut touched = FxHashSet::default();
        collect_ring_edges(map, d, &mut touched);
        collect_ring_edges(map, map.phi2(d), &mut touched);
        for key in touched {
            self.forget(key);
        }

        if let Some(q) = self.quadric {
            self.saved_quadric = *map.attr(q, d) + *map.attr(q, map.phi2(d));
        }
    }

    fn update_after_collapse(&mut self, map: &mut M, approx: &mut Approximators, d2: Dart, _: Dart) {
        if let Some(q) = self.quadric {
            map.set_attr(q, d2, self.saved_quadric);
        }

        let mut touched = FxHashSet::default();
        collect_ring_edges(map, d2, &mut touched);
        let mut touched: Vec<_> = touched.into_iter().collect();
        touched.sort();
        for key in touched {
            self.update_edge(map, approx, key);
        }
    }
}
