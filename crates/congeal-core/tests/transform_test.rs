use congeal_core::transform::{AffineParameters, Subspace};
use congeal_core::{Fiber, Point};
use proptest::prelude::*;

fn make_params(rot: [f64; 3], trans: [f64; 3], scale: [f64; 3], shear: [f64; 6]) -> AffineParameters {
    let mut p = AffineParameters::identity();
    p.set_block(Subspace::Rotation, &rot);
    p.set_block(Subspace::Translation, &trans);
    p.set_block(Subspace::Scale, &scale);
    p.set_block(Subspace::Shear, &shear);
    p
}

#[test]
fn test_pure_translation_moves_every_point() {
    let params = make_params([0.0; 3], [1.0, -2.0, 3.0], [1.0; 3], [0.0; 6]);
    let fiber = Fiber::new(vec![Point::new(0.0, 0.0, 0.0), Point::new(10.0, 0.0, 0.0)]);
    let moved = fiber.transformed(&params.to_transform());
    assert_eq!(moved.points()[0], Point::new(1.0, -2.0, 3.0));
    assert_eq!(moved.points()[1], Point::new(11.0, -2.0, 3.0));
    assert!((moved.length() - fiber.length()).abs() < 1e-12);
}

#[test]
fn test_rotation_preserves_length() {
    let params = make_params([0.3, -0.7, 1.1], [0.0; 3], [1.0; 3], [0.0; 6]);
    let fiber = Fiber::new(vec![
        Point::new(0.0, 0.0, 0.0),
        Point::new(3.0, 4.0, 0.0),
        Point::new(3.0, 4.0, 12.0),
    ]);
    let rotated = fiber.transformed(&params.to_transform());
    assert!((rotated.length() - 17.0).abs() < 1e-9);
}

proptest! {
    #[test]
    fn test_inverse_roundtrip(
        rx in -0.5f64..0.5, ry in -0.5f64..0.5, rz in -0.5f64..0.5,
        tx in -50.0f64..50.0, ty in -50.0f64..50.0, tz in -50.0f64..50.0,
        kx in 0.8f64..1.2, ky in 0.8f64..1.2, kz in 0.8f64..1.2,
        px in -80.0f64..80.0, py in -80.0f64..80.0, pz in -80.0f64..80.0
    ) {
        let params = make_params([rx, ry, rz], [tx, ty, tz], [kx, ky, kz], [0.1, 0.0, 0.0, -0.05, 0.0, 0.1]);
        let transform = params.to_transform();
        let inverse = transform.inverse().expect("well-conditioned transform");
        let point = Point::new(px, py, pz);
        let recovered = inverse.apply(&transform.apply(&point));
        prop_assert!((recovered - point).norm() < 1e-6, "{:?} vs {:?}", recovered, point);
    }

    #[test]
    fn test_resample_preserves_length(
        n in 2usize..20,
        a in 1.0f64..30.0, b in 1.0f64..30.0
    ) {
        let fiber = Fiber::new(vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(a, 0.0, 0.0),
            Point::new(a, b, 0.0),
        ]);
        let resampled = fiber.resample(n).unwrap();
        prop_assert_eq!(resampled.len(), n);
        // Resampling cuts corners, never lengthens.
        prop_assert!(resampled.length() <= fiber.length() + 1e-9);
        let first = resampled.points()[0];
        let last = resampled.points()[n - 1];
        prop_assert!((first - Point::origin()).norm() < 1e-12);
        prop_assert!((last - Point::new(a, b, 0.0)).norm() < 1e-9);
    }
}
