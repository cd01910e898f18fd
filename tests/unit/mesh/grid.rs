use super::*;
use crate::physics::config::PhysicsKind;

fn mesh_100(rows: u32) -> GridMesh {
    GridMesh::new(Extent::new(100, 100).unwrap(), rows).unwrap()
}

fn single_layer(kind: PhysicsKind) -> (LayerStack, LayerId) {
    let s = LayerStack::new("l", LayerConfig::preset(kind));
    let id = s.first_id();
    (s, id)
}

#[test]
fn lattice_dimensions_follow_aspect_ratio() {
    let m = GridMesh::new(Extent::new(200, 100).unwrap(), 10).unwrap();
    assert_eq!(m.rows(), 10);
    assert_eq!(m.cols(), 20);
    assert_eq!(m.point_count(), 11 * 21);
    assert_eq!(m.triangle_count(), 10 * 20 * 2);
    assert_eq!(m.triangles().count(), m.triangle_count());

    let last = m.point(10, 20).unwrap();
    assert_eq!(last.origin, Point::new(200.0, 100.0));
    assert!(m.point(11, 0).is_none());
}

#[test]
fn lattice_spacing_is_uniform() {
    let m = GridMesh::new(Extent::new(150, 90).unwrap(), 6).unwrap();
    let s = m.spacing();
    for r in 0..m.rows() {
        for c in 0..m.cols() {
            let p = m.point(r, c).unwrap().origin;
            let right = m.point(r, c + 1).unwrap().origin;
            let down = m.point(r + 1, c).unwrap().origin;
            assert!(((right.x - p.x) - s.x).abs() < 1e-9);
            assert!(((down.y - p.y) - s.y).abs() < 1e-9);
        }
    }
}

#[test]
fn invalid_construction_is_rejected() {
    assert!(GridMesh::new(Extent { width: 0, height: 10 }, 4).is_err());
    assert!(GridMesh::new(Extent::new(10, 10).unwrap(), 0).is_err());
    assert!(GridMesh::new(Extent::new(10, 10).unwrap(), MAX_ROWS + 1).is_err());

    let tall = GridMesh::new(Extent::new(10, 1000).unwrap(), 4).unwrap();
    assert_eq!(tall.cols(), 1);
}

#[test]
fn overly_wide_images_are_rejected_instead_of_capped() {
    let widest = GridMesh::new(Extent::new(MAX_COLS, 1).unwrap(), 1).unwrap();
    assert_eq!(widest.cols(), MAX_COLS);
    assert!(matches!(
        GridMesh::new(Extent::new(MAX_COLS + 1, 1).unwrap(), 1),
        Err(MeshWarpError::Validation(_))
    ));
}

#[test]
fn paint_applies_linear_falloff_inside_radius_only() {
    let mut m = mesh_100(10);
    let id = LayerId(1);
    let touched = m.paint(50.0, 50.0, 25.0, 1.0, false, id);
    assert!(touched > 0);

    for (i, p) in m.points().iter().enumerate() {
        let d = p.origin.distance(Point::new(50.0, 50.0));
        let w = f64::from(m.weight(id, i));
        if d >= 25.0 {
            assert_eq!(w, 0.0);
        } else {
            assert!((w - (1.0 - d / 25.0)).abs() < 1e-6, "d={d} w={w}");
        }
    }
}

#[test]
fn paint_accumulates_clamps_and_erases() {
    let mut m = mesh_100(10);
    let id = LayerId(1);
    let center = m.index(5, 5);
    m.paint(50.0, 50.0, 30.0, 0.6, false, id);
    m.paint(50.0, 50.0, 30.0, 0.6, false, id);
    assert_eq!(m.weight(id, center), 1.0);

    m.paint(50.0, 50.0, 30.0, 0.3, true, id);
    assert!((m.weight(id, center) - 0.7).abs() < 1e-6);
    m.paint(50.0, 50.0, 30.0, 5.0, true, id);
    assert_eq!(m.weight(id, center), 0.0);
}

#[test]
fn paint_ignores_degenerate_brush() {
    let mut m = mesh_100(4);
    assert_eq!(m.paint(10.0, 10.0, 0.0, 1.0, false, LayerId(1)), 0);
    assert_eq!(m.paint(f64::NAN, 10.0, 5.0, 1.0, false, LayerId(1)), 0);
    assert_eq!(m.paint(10.0, 10.0, -3.0, 1.0, false, LayerId(1)), 0);
}

#[test]
fn cleared_layer_leaves_every_point_at_rest() {
    let mut m = mesh_100(10);
    let (layers, id) = single_layer(PhysicsKind::Wobble);
    m.fill(id);
    m.update(7.0, &layers);
    assert!(!m.is_at_rest());

    m.clear(id);
    for t in 0..30 {
        m.update(f64::from(t), &layers);
        for p in m.points() {
            assert_eq!(p.position, p.origin);
        }
    }
}

#[test]
fn hidden_layers_do_not_contribute() {
    let mut m = mesh_100(6);
    let (mut layers, id) = single_layer(PhysicsKind::Wobble);
    m.fill(id);
    layers.set_visible(id, false).unwrap();
    m.update(3.0, &layers);
    assert!(m.is_at_rest());
}

#[test]
fn weights_below_epsilon_are_ignored() {
    let mut m = mesh_100(4);
    let (layers, id) = single_layer(PhysicsKind::Wobble);
    m.weights.layer_mut(id).fill(WEIGHT_EPSILON);
    m.update(2.0, &layers);
    assert!(m.is_at_rest());
}

#[test]
fn update_is_deterministic_for_full_weight() {
    let (layers, id) = single_layer(PhysicsKind::Fire);
    let mut a = mesh_100(8);
    let mut b = mesh_100(8);
    a.fill(id);
    b.fill(id);
    a.update(11.0, &layers);
    b.update(3.0, &layers);
    b.update(11.0, &layers);
    assert_eq!(a.points(), b.points());
}

#[test]
fn painted_region_bounds_the_displacement() {
    let mut m = mesh_100(10);
    let (layers, id) = single_layer(PhysicsKind::Wobble);
    let radius = 30.0;
    let brush = Point::new(50.0, 50.0);
    m.paint(brush.x, brush.y, radius, 1.0, false, id);
    m.update(4.0, &layers);

    for (i, p) in m.points().iter().enumerate() {
        let d = p.origin.distance(brush);
        if d > radius {
            assert_eq!(p.offset(), Vec2::ZERO);
        } else if m.weight(id, i) > WEIGHT_EPSILON {
            assert!(p.offset().hypot() > 0.0, "point {i} at d={d} did not move");
        }
    }
}

#[test]
fn weights_scale_layer_offsets_and_layers_sum() {
    let mut m = mesh_100(4);
    let mut layers = LayerStack::new("a", LayerConfig::preset(PhysicsKind::Wobble));
    let a = layers.first_id();
    let b = layers.add("b", LayerConfig::preset(PhysicsKind::Water)).unwrap();

    m.weights.layer_mut(a).fill(0.5);
    m.update(1.5, &layers);
    let half: Vec<Vec2> = m.points().iter().map(MeshPoint::offset).collect();

    m.fill(a);
    m.update(1.5, &layers);
    let full: Vec<Vec2> = m.points().iter().map(MeshPoint::offset).collect();
    for (h, f) in half.iter().zip(&full) {
        assert!((*h * 2.0 - *f).hypot() < 1e-9);
    }

    m.fill(b);
    m.update(1.5, &layers);
    let ctx = m.displacement_ctx();
    let cfg_b = layers.get(b).unwrap().config;
    for (p, f) in m.points().iter().zip(&full) {
        let expect = *f + displacement(p.origin, cfg_b.layer_time(1.5), &cfg_b, &ctx);
        assert!((p.offset() - expect).hypot() < 1e-9);
    }
}

#[test]
fn drop_layer_forgets_weights_and_reset_restores_rest_pose() {
    let mut m = mesh_100(4);
    let (layers, id) = single_layer(PhysicsKind::Spiral);
    m.fill(id);
    m.update(20.0, &layers);
    m.reset();
    assert!(m.is_at_rest());

    m.drop_layer(id);
    assert_eq!(m.weight(id, 0), 0.0);
    m.update(20.0, &layers);
    assert!(m.is_at_rest());
}
