use cgmath::{vec3, InnerSpace};

use crate::{
    core::{CombinatorialMap, Map2, Phi1},
    handle::Dart,
    math::Vec3,
    orbit::Orbit,
    test_utils::{assert_valid_map, sphere},
};
use super::*;


fn snapshot(map: &Map2, pos: AttributeHandle<Vec3>) -> Vec<(Dart, Vec3)> {
    map.base().darts().map(|d| (d, *map.attr(pos, d))).collect()
}

fn max_deviation(map: &Map2, pos: AttributeHandle<Vec3>, snapshot: &[(Dart, Vec3)]) -> f64 {
    snapshot.iter()
        .map(|&(d, p)| (*map.attr(pos, d) - p).magnitude())
        .fold(0.0, f64::max)
}

fn distinct(vectors: &[Vec3]) -> usize {
    let mut out: Vec<Vec3> = Vec::new();
    for &v in vectors {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out.len()
}

fn config(approximator: ApproximatorType, predictors: bool) -> PmConfig {
    PmConfig {
        selector: SelectorType::EdgeLength,
        approximator,
        predictors,
        seed: 0,
    }
}

/// A progressive mesh of the level 2 sphere (66 vertices) reduced to half of
/// its vertices, plus the input positions.
fn half_sphere_pm(config: PmConfig) -> (ProgressiveMesh<Map2>, Vec<(Dart, Vec3)>) {
    let (map, pos) = sphere(2);
    let before = snapshot(&map, pos);
    let mut pm = ProgressiveMesh::new(map, pos, config).unwrap();
    pm.create_pm(50);
    (pm, before)
}

#[test]
fn create_pm() {
    let (mut pm, _) = half_sphere_pm(config(ApproximatorType::Qem, false));
    assert!(pm.nb_splits() > 0);
    assert!(pm.nb_vertices() >= 33);
    assert_eq!(pm.nb_vertices(), 66 - pm.nb_splits());
    assert_eq!(pm.current_level(), pm.nb_splits());
    assert_valid_map(pm.map());

    for f in pm.map().orbits_where(Orbit::Face, &|d| pm.is_active(d)) {
        assert_eq!(pm.map().face_degree(f), 3);
    }

    // Later collapses may detach the faces of `left` or `right`, so they are
    // only on the surface when their own split is undone.
    while pm.current_level() > 0 {
        let vs = pm.splits()[pm.current_level() - 1];
        assert!(!pm.is_active(vs.edge()));
        assert!(pm.is_active(vs.left()));
        assert!(pm.is_active(vs.right()));
        pm.refine();
    }
}

#[test]
fn refine_restores_input() {
    let (mut pm, before) = half_sphere_pm(config(ApproximatorType::Qem, false));
    pm.goto_level(0);
    assert_eq!(pm.current_level(), 0);
    assert_eq!(pm.nb_vertices(), 66);
    assert_valid_map(pm.map());
    assert!(pm.map().base().darts().all(|d| pm.is_active(d)));
    assert_eq!(max_deviation(pm.map(), pm.position(), &before), 0.0);
    assert!(pm.detail_vectors().is_empty());
}

#[test]
fn refine_with_predictors() {
    for &a in &[
        ApproximatorType::HalfCollapse,
        ApproximatorType::CornerCutting,
        ApproximatorType::TangentPredict1,
        ApproximatorType::TangentPredict2,
    ] {
        let (mut pm, before) = half_sphere_pm(config(a, true));
        assert_eq!(pm.detail_vectors().len(), pm.nb_splits());
        assert_eq!(pm.original_detail_vectors(), &pm.detail_vectors()[..]);

        pm.goto_level(0);
        assert_valid_map(pm.map());
        let dev = max_deviation(pm.map(), pm.position(), &before);
        assert!(dev < 1e-9, "{:?}: deviation {}", a, dev);
    }
}

#[test]
fn goto_level() {
    let (mut pm, before) = half_sphere_pm(config(ApproximatorType::MidEdge, false));
    let n = pm.nb_splits();

    for &level in &[n / 2, 1, n, 0, n / 3] {
        pm.goto_level(level);
        assert_eq!(pm.current_level(), level);
        assert_eq!(pm.nb_vertices(), 66 - level);
    }

    // Out of range levels are ignored, as are steps past either end.
    pm.goto_level(n + 1);
    assert_eq!(pm.current_level(), n / 3);
    pm.goto_level(0);
    pm.refine();
    assert_eq!(pm.current_level(), 0);
    pm.goto_level(n);
    pm.coarsen();
    assert_eq!(pm.current_level(), n);

    pm.goto_level(0);
    assert_eq!(max_deviation(pm.map(), pm.position(), &before), 0.0);
}

#[test]
fn coarse_levels_are_reproducible() {
    let (mut pm, _) = half_sphere_pm(config(ApproximatorType::CornerCutting, true));
    let level = pm.nb_splits() / 2;
    pm.goto_level(level);
    let first = snapshot(pm.map(), pm.position());
    pm.goto_level(0);
    pm.goto_level(pm.nb_splits());
    pm.goto_level(level);
    assert!(max_deviation(pm.map(), pm.position(), &first) < 1e-12);
}

#[test]
fn detail_amount() {
    let (mut pm, before) = half_sphere_pm(config(ApproximatorType::TangentPredict1, true));
    pm.goto_level(0);

    pm.set_detail_amount(1.0);
    assert_eq!(pm.current_level(), 0);
    assert!(max_deviation(pm.map(), pm.position(), &before) < 1e-9);

    // Without details, the split vertices land on their predictions.
    pm.set_detail_amount(0.0);
    assert_eq!(pm.detail_amount(), 0.0);
    assert!(max_deviation(pm.map(), pm.position(), &before) > 1e-6);

    pm.set_detail_amount(1.0);
    assert!(max_deviation(pm.map(), pm.position(), &before) < 1e-9);
}

#[test]
fn quantization() {
    let (mut pm, before) = half_sphere_pm(config(ApproximatorType::TangentPredict2, true));
    let originals = pm.original_detail_vectors().to_vec();
    assert!(distinct(&originals) > 4);

    let report = pm.quantize_detail_vectors(4).unwrap();
    assert_eq!(pm.current_level(), 0);
    assert!(report.distinct_vectors <= 4);
    assert!(distinct(&pm.detail_vectors()) <= 4);
    assert_eq!(pm.original_detail_vectors(), &originals[..]);
    assert!(report.discrete_entropy <= 2.0 + 1e-12);

    // Lossy, but still a sphere.
    assert!(max_deviation(pm.map(), pm.position(), &before) > 0.0);
    for d in pm.map().orbits(Orbit::Vertex) {
        let r = pm.map().attr(pm.position(), d).magnitude();
        assert!(r > 0.5 && r < 1.5, "vertex at distance {}", r);
    }

    pm.reset_detail_vectors().unwrap();
    assert_eq!(pm.current_level(), 0);
    assert_eq!(pm.detail_vectors(), originals);
    assert!(max_deviation(pm.map(), pm.position(), &before) < 1e-9);
}

#[test]
fn detail_vectors_belong_to_splits() {
    let (mut pm, _) = half_sphere_pm(config(ApproximatorType::CornerCutting, true));
    let coarse = pm.detail_vectors();
    assert!(coarse.iter().any(|v| v.magnitude() > 0.0));

    let n = pm.nb_splits();
    for &level in &[0, n / 2, 1, n] {
        pm.goto_level(level);
        assert_eq!(pm.detail_vectors(), coarse);
    }
    for (vs, d) in pm.splits().iter().zip(&coarse) {
        assert_eq!(vs.detail(), *d);
    }
}

#[test]
fn quantization_of_a_hundred_splits() {
    let (map, pos) = sphere(3);
    let before = snapshot(&map, pos);
    let mut pm = ProgressiveMesh::new(map, pos, config(ApproximatorType::TangentPredict2, true)).unwrap();
    pm.create_pm(50);
    assert!(pm.nb_splits() >= 100, "only {} splits", pm.nb_splits());
    let originals = pm.original_detail_vectors().to_vec();
    assert_eq!(originals.len(), pm.nb_splits());

    let report = pm.quantize_detail_vectors(4).unwrap();
    assert!(report.distinct_vectors <= 4);
    assert!(distinct(&pm.detail_vectors()) <= 4);
    assert_eq!(pm.detail_vectors().len(), pm.nb_splits());

    pm.reset_detail_vectors().unwrap();
    assert_eq!(pm.current_level(), 0);
    assert_eq!(pm.detail_vectors(), originals);
    assert!(max_deviation(pm.map(), pm.position(), &before) < 1e-9);
}

#[test]
fn quantization_by_distortion() {
    let (mut pm, before) = half_sphere_pm(config(ApproximatorType::CornerCutting, true));

    let report = pm.quantize_detail_vectors_distortion(0.0).unwrap();
    assert_eq!(report.distinct_vectors, distinct(pm.original_detail_vectors()));
    assert!(max_deviation(pm.map(), pm.position(), &before) < 1e-9);

    let coarse = pm.quantize_detail_vectors_distortion(1e-4).unwrap();
    assert!(coarse.distinct_vectors <= report.distinct_vectors);
    let mse = pm.detail_vectors().iter()
        .zip(pm.original_detail_vectors())
        .map(|(a, b)| (a - b).magnitude2())
        .sum::<f64>() / pm.nb_splits() as f64;
    assert!(mse <= 1e-4);
}

#[test]
fn custom_quantizer() {
    struct Zero;
    impl Quantizer for Zero {
        fn quantize_classes(&self, vectors: &[Vec3], _: usize) -> Quantization {
            Quantization {
                vectors: vec![vec3(0.0, 0.0, 0.0); vectors.len()],
                differential_entropy: 0.0,
                discrete_entropy: 0.0,
            }
        }

        fn quantize_distortion(&self, vectors: &[Vec3], _: f64) -> Quantization {
            self.quantize_classes(vectors, 1)
        }
    }

    let (mut pm, _) = half_sphere_pm(config(ApproximatorType::HalfCollapse, true));
    pm.set_quantizer(Box::new(Zero));
    let report = pm.quantize_detail_vectors(8).unwrap();
    assert_eq!(report.distinct_vectors, 1);
    assert!(pm.detail_vectors().iter().all(|v| *v == vec3(0.0, 0.0, 0.0)));
}

#[test]
fn local_frames() {
    let (mut pm, before) = half_sphere_pm(config(ApproximatorType::TangentPredict1, true));
    let global = pm.detail_vectors();
    pm.goto_level(3);

    pm.localize_detail_vectors().unwrap();
    assert!(pm.has_local_frames());
    assert_eq!(pm.current_level(), 3);
    let local = pm.detail_vectors();
    assert_ne!(local, global);
    // Frames are rotations.
    for (l, g) in local.iter().zip(&global) {
        assert!((l.magnitude() - g.magnitude()).abs() < 1e-9);
    }

    // Refining through local frames reproduces the input.
    pm.goto_level(0);
    assert!(max_deviation(pm.map(), pm.position(), &before) < 1e-9);

    pm.globalize_detail_vectors().unwrap();
    assert!(!pm.has_local_frames());
    for (a, b) in pm.detail_vectors().iter().zip(&global) {
        assert!((a - b).magnitude() < 1e-9);
    }
    assert!(max_deviation(pm.map(), pm.position(), &before) < 1e-9);
}

#[test]
fn local_frames_keep_quantization() {
    let (mut pm, _) = half_sphere_pm(config(ApproximatorType::TangentPredict2, true));
    pm.quantize_detail_vectors(3).unwrap();
    pm.localize_detail_vectors().unwrap();
    assert!(distinct(&pm.detail_vectors()) <= 3);
}

#[test]
fn details_need_a_predictor() {
    let (mut pm, _) = half_sphere_pm(config(ApproximatorType::TangentPredict1, false));
    let err = Error::MissingPredictor(ApproximatorType::TangentPredict1);
    assert_eq!(pm.localize_detail_vectors(), Err(err.clone()));
    assert_eq!(pm.quantize_detail_vectors(4), Err(err.clone()));
    assert_eq!(pm.reset_detail_vectors(), Err(err));
    assert!(pm.original_detail_vectors().is_empty());
}

#[test]
fn construction_errors() {
    let positions = vec![
        vec3(0.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0), vec3(1.0, 1.0, 0.0), vec3(0.0, 1.0, 0.0),
        vec3(0.0, 0.0, 1.0), vec3(1.0, 0.0, 1.0), vec3(1.0, 1.0, 1.0), vec3(0.0, 1.0, 1.0),
    ];
    let faces = [
        [0, 3, 2, 1], [4, 5, 6, 7], [0, 1, 5, 4],
        [1, 2, 6, 5], [2, 3, 7, 6], [3, 0, 4, 7],
    ];
    let (cube, pos) = Map2::from_polygons(&positions, &faces).unwrap();
    let res = ProgressiveMesh::new(cube, pos, PmConfig::default());
    assert_eq!(res.err(), Some(Error::NotTriangulated));

    let (map, pos) = sphere(1);
    let config = PmConfig {
        selector: SelectorType::MinDetail,
        approximator: ApproximatorType::Qem,
        ..PmConfig::default()
    };
    let res = ProgressiveMesh::new(map, pos, config);
    assert_eq!(res.err(), Some(Error::SelectorInit(SelectorType::MinDetail)));
}

#[test]
fn into_map_releases_marker() {
    let (pm, _) = half_sphere_pm(PmConfig::default());
    assert_eq!(pm.map().base().marker_pool(Orbit::Dart).nb_leased(), 1);
    let map = pm.into_map();
    assert_eq!(map.base().marker_pool(Orbit::Dart).nb_leased(), 0);
}
