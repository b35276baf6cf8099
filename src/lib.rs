//! Slither Arena - simulation kernel for a circular-arena snake game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (movement, pellets, bots, collisions, game state)
//! - `config`: Data-driven tuning with deep-merge overrides

pub mod config;
pub mod sim;

pub use config::{ConfigError, SlitherConfig};

use glam::Vec2;
use rand::Rng;

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Signed shortest rotation from `from` to `to`, in [-π, π)
#[inline]
pub fn angle_delta(from: f32, to: f32) -> f32 {
    normalize_angle(to - from)
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Convert cartesian (x, y) to polar (r, theta)
#[inline]
pub fn cartesian_to_polar(pos: Vec2) -> (f32, f32) {
    (pos.length(), pos.y.atan2(pos.x))
}

/// Unit vector pointing along `theta`
#[inline]
pub fn heading(theta: f32) -> Vec2 {
    polar_to_cartesian(1.0, theta)
}

/// Angle of a direction vector (0 for the zero vector)
#[inline]
pub fn angle_of(v: Vec2) -> f32 {
    v.y.atan2(v.x)
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Interpolate between two angles along the shortest arc
#[inline]
pub fn lerp_angle(a: f32, b: f32, t: f32) -> f32 {
    normalize_angle(a + angle_delta(a, b) * t)
}

/// Hermite smoothstep, 0 below `edge0` and 1 above `edge1`
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Area-uniform random point inside a disc of `radius` around `center`
///
/// Uses `r = sqrt(u) * radius` so density is constant per unit area rather
/// than bunching toward the center.
pub fn random_in_disc<R: Rng + ?Sized>(rng: &mut R, center: Vec2, radius: f32) -> Vec2 {
    let r = rng.random::<f32>().sqrt() * radius;
    let theta = rng.random::<f32>() * std::f32::consts::TAU;
    center + polar_to_cartesian(r, theta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::f32::consts::PI;

    #[test]
    fn test_normalize_angle_wraps() {
        // Odd multiples of PI land on the seam; either sign is fine
        assert!((normalize_angle(3.0 * PI).abs() - PI).abs() < 1e-5);
        assert!((normalize_angle(2.5 * PI) - (0.5 * PI)).abs() < 1e-5);
        assert!((normalize_angle(-3.5 * PI) - (0.5 * PI)).abs() < 1e-5);
        assert_eq!(normalize_angle(0.25), 0.25);
    }

    #[test]
    fn test_angle_delta_takes_short_way() {
        let d = angle_delta(170.0_f32.to_radians(), -170.0_f32.to_radians());
        assert!((d - 20.0_f32.to_radians()).abs() < 1e-4);
    }

    #[test]
    fn test_lerp_angle_crosses_seam() {
        let mid = lerp_angle(PI - 0.1, -PI + 0.1, 0.5);
        assert!(mid.abs() > PI - 0.01);
    }

    #[test]
    fn test_smoothstep_edges() {
        assert_eq!(smoothstep(0.82, 1.0, 0.5), 0.0);
        assert_eq!(smoothstep(0.82, 1.0, 1.2), 1.0);
        let mid = smoothstep(0.0, 1.0, 0.5);
        assert!((mid - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_random_in_disc_stays_inside() {
        let mut rng = Pcg32::seed_from_u64(7);
        let center = Vec2::new(10.0, -4.0);
        for _ in 0..500 {
            let p = random_in_disc(&mut rng, center, 25.0);
            assert!(p.distance(center) <= 25.0 + 1e-3);
        }
    }

    #[test]
    fn test_zero_vector_normalizes_to_zero() {
        assert_eq!(Vec2::ZERO.normalize_or_zero(), Vec2::ZERO);
        assert_eq!(angle_of(Vec2::ZERO), 0.0);
    }
}
