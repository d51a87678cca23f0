use std::f64::consts::TAU;

use lietraj_core::{Iso3, Real, Vec3};
use lietraj_sim::{SimuConfig, SimuTrajectory};
use nalgebra::{Translation3, UnitQuaternion};

/// Largest position and rotation (degrees) deviation of the fitted spline from the samples.
fn fit_errors(traj: &SimuTrajectory) -> (Real, Real) {
    let mut max_pos: Real = 0.0;
    let mut max_rot: Real = 0.0;
    for sample in traj.pose_sequence() {
        let fitted = traj
            .spline()
            .pose(sample.timestamp)
            .expect("samples lie inside the spline range");
        max_pos = max_pos.max((fitted.translation - sample.translation).norm());
        max_rot = max_rot.max(fitted.rotation.angle_to(&sample.rotation).to_degrees());
    }
    (max_pos, max_rot)
}

fn assert_good_fit(traj: &SimuTrajectory, name: &str) {
    assert!(traj.fit_summary().converged, "{name}: fit did not converge");
    let (pos, rot) = fit_errors(traj);
    assert!(pos < 1e-3, "{name}: position error {pos}");
    assert!(rot < 0.1, "{name}: rotation error {rot} deg");
}

#[test]
fn circular_fit_tracks_samples() {
    let traj = SimuTrajectory::circular(2.0, &SimuConfig::default()).unwrap();
    assert_eq!(traj.hz(), 10.0);
    assert!(traj.pose_sequence().len() >= 62);
    for pose in traj.pose_sequence() {
        let radial = pose.translation.xy().norm();
        assert!((radial - 2.0).abs() < 1e-12, "radius {radial}");
        assert!(pose.translation.z.abs() < 1e-12);
    }
    assert_good_fit(&traj, "circular");
}

#[test]
fn spiral_climbs_per_turn() {
    let config = SimuConfig::new(0.0, 2.0 * TAU, 10.0);
    let traj = SimuTrajectory::spiral(1.5, 0.8, &config).unwrap();
    let last = traj.pose_sequence().last().unwrap();
    let expected_z = 0.8 * last.timestamp / TAU;
    assert!((last.translation.z - expected_z).abs() < 1e-9);
    assert_good_fit(&traj, "spiral");
}

#[test]
fn wave_fit_completes_at_default_rate() {
    // At 10 Hz the knots are 0.2 s apart, only five per 1 Hz wave cycle, so
    // the vertical oscillation is approximated to about 2e-3.
    let traj = SimuTrajectory::wave(1.0, 0.3, &SimuConfig::default()).unwrap();
    assert!(!traj.pose_sequence().is_empty());
    assert!(traj.fit_summary().final_cost <= traj.fit_summary().initial_cost);
    let (pos, _) = fit_errors(&traj);
    assert!(pos < 5e-3, "position error {pos}");
}

#[test]
fn wave_fit_tracks_samples_at_high_rate() {
    let config = SimuConfig::new(0.0, 6.0, 100.0);
    let traj = SimuTrajectory::wave(1.0, 0.3, &config).unwrap();
    assert_good_fit(&traj, "wave @100Hz");
}

#[test]
fn linear_motions_fit() {
    let config = SimuConfig::new(0.0, 10.0, 10.0);
    let from = Vec3::new(0.0, 0.0, 0.0);
    let to = Vec3::new(4.0, -2.0, 1.0);

    let linear = SimuTrajectory::uniform_linear(from, to, &config).unwrap();
    assert!((linear.pose_sequence()[0].translation - from).norm() < 1e-12);
    assert_good_fit(&linear, "uniform linear");

    let accelerated = SimuTrajectory::uniform_accelerated(from, to, &config).unwrap();
    assert_good_fit(&accelerated, "uniform accelerated");
    let v_early = accelerated.spline().linear_velocity(1.0).unwrap().norm();
    let v_late = accelerated.spline().linear_velocity(8.0).unwrap().norm();
    assert!(v_late > v_early, "speed should grow: {v_early} -> {v_late}");
}

#[test]
fn drunkard_is_reproducible() {
    let config = SimuConfig::new(0.0, 5.0, 10.0);
    let a = SimuTrajectory::drunkard(Vec3::zeros(), 0.05, 2.0, 42, &config).unwrap();
    let b = SimuTrajectory::drunkard(Vec3::zeros(), 0.05, 2.0, 42, &config).unwrap();
    assert_eq!(a.pose_sequence(), b.pose_sequence());
    for (ka, kb) in a.spline().knots().iter().zip(b.spline().knots()) {
        assert!((ka.translation.vector - kb.translation.vector).norm() < 1e-9);
        assert!(ka.rotation.angle_to(&kb.rotation) < 1e-9);
    }

    let c = SimuTrajectory::drunkard(Vec3::zeros(), 0.05, 2.0, 43, &config).unwrap();
    assert_ne!(a.pose_sequence(), c.pose_sequence());
}

#[test]
fn drunkard_fit_stays_close_to_every_sample() {
    let config = SimuConfig::new(0.0, 5.0, 10.0);
    for seed in 1..=6 {
        let traj = SimuTrajectory::drunkard(Vec3::zeros(), 0.05, 2.0, seed, &config).unwrap();
        let (pos, rot) = fit_errors(&traj);
        assert!(rot < 4.0, "seed {seed}: rotation error {rot} deg");
        assert!(pos < 0.15, "seed {seed}: position error {pos}");

        // Neighbouring knots stay far from the half-turn where `log` flips.
        for pair in traj.spline().knots().windows(2) {
            let angle = pair[0].rotation.angle_to(&pair[1].rotation).to_degrees();
            assert!(angle < 60.0, "seed {seed}: knot step {angle} deg");
        }
    }
}

#[test]
fn operators_transform_samples_and_spline() {
    let traj = SimuTrajectory::circular(1.0, &SimuConfig::default()).unwrap();
    let transform = Iso3::from_parts(
        Translation3::new(0.5, -1.0, 2.0),
        UnitQuaternion::from_euler_angles(0.1, -0.2, 0.3),
    );

    let left = transform * traj.clone();
    let left_ref = traj.left_multiplied(&transform);
    assert_eq!(left.pose_sequence(), left_ref.pose_sequence());
    let t = 1.3;
    let expected = transform * traj.spline().pose(t).unwrap().to_iso3();
    let actual = left.spline().pose(t).unwrap().to_iso3();
    assert!((expected.translation.vector - actual.translation.vector).norm() < 1e-9);
    assert!(expected.rotation.angle_to(&actual.rotation) < 1e-9);

    let right = traj.clone() * transform;
    for (orig, moved) in traj.pose_sequence().iter().zip(right.pose_sequence()) {
        let expected = orig.to_iso3() * transform;
        assert!((expected.translation.vector - moved.translation).norm() < 1e-12);
        assert!(expected.rotation.angle_to(&moved.rotation) < 1e-12);
    }

    let inverted = !traj.clone();
    let twice = inverted.inverted();
    for (orig, back) in traj.pose_sequence().iter().zip(twice.pose_sequence()) {
        assert!((orig.translation - back.translation).norm() < 1e-12);
        assert!(orig.rotation.angle_to(&back.rotation) < 1e-12);
    }
}

#[test]
fn invalid_configurations_are_rejected() {
    let config = SimuConfig::default();
    assert!(SimuTrajectory::circular(-1.0, &config).is_err());
    assert!(SimuTrajectory::spiral(0.0, 1.0, &config).is_err());
    assert!(SimuTrajectory::wave(0.0, 1.0, &config).is_err());
    assert!(SimuTrajectory::uniform_accelerated(Vec3::x(), Vec3::x(), &config).is_err());
    assert!(SimuTrajectory::drunkard(Vec3::zeros(), -0.1, 1.0, 0, &config).is_err());

    let reversed = SimuConfig::new(1.0, 0.0, 10.0);
    assert!(SimuTrajectory::circular(1.0, &reversed).is_err());
}
