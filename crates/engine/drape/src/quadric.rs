//! Quadric error metric
//!
//! A quadric accumulates squared distances to a set of planes:
//! `Q(p) = pᵀ A p + 2 bᵀ p + c`.

use glam::{DMat3, DVec3};
use std::ops::{Add, AddAssign, Mul};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadric {
    a: DMat3,
    b: DVec3,
    c: f64,
}

impl Default for Quadric {
    fn default() -> Self {
        Self {
            a: DMat3::ZERO,
            b: DVec3::ZERO,
            c: 0.0,
        }
    }
}

impl Quadric {
    /// Quadric of the plane `n · p + d = 0`; `normal` must be unit length
    pub fn from_plane(normal: DVec3, d: f64) -> Self {
        Self {
            a: DMat3::from_cols(normal * normal.x, normal * normal.y, normal * normal.z),
            b: normal * d,
            c: d * d,
        }
    }

    /// Quadric of the plane through `point` with unit `normal`
    pub fn from_point_normal(point: DVec3, normal: DVec3) -> Self {
        Self::from_plane(normal, -normal.dot(point))
    }

    /// Sum of squared plane distances at `p`
    pub fn evaluate(&self, p: DVec3) -> f64 {
        p.dot(self.a * p) + 2.0 * self.b.dot(p) + self.c
    }

    /// Point minimizing the error, or `None` when `A` is near singular
    /// (flat or cylindrical neighborhoods).
    pub fn optimal_point(&self) -> Option<DVec3> {
        let det = self.a.determinant();
        if det.abs() < 1e-10 {
            return None;
        }
        Some(self.a.inverse() * -self.b)
    }
}

impl Add for Quadric {
    type Output = Self;
    fn add(self, o: Self) -> Self {
        Self {
            a: self.a + o.a,
            b: self.b + o.b,
            c: self.c + o.c,
        }
    }
}

impl AddAssign for Quadric {
    fn add_assign(&mut self, o: Self) {
        *self = *self + o;
    }
}

impl Mul<f64> for Quadric {
    type Output = Self;
    fn mul(self, s: f64) -> Self {
        Self {
            a: self.a * s,
            b: self.b * s,
            c: self.c * s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_quadric() {
        let q = Quadric::default();
        assert!(q.evaluate(DVec3::new(1.0, 2.0, 3.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_plane_distance() {
        // Plane z = 0
        let q = Quadric::from_plane(DVec3::Z, 0.0);
        assert!(q.evaluate(DVec3::new(1.0, 2.0, 0.0)).abs() < 1e-10);
        assert!((q.evaluate(DVec3::new(0.0, 0.0, 2.0)) - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_point_normal_offset() {
        let q = Quadric::from_point_normal(DVec3::new(0.0, 0.0, 1.0), DVec3::Z);
        assert!(q.evaluate(DVec3::new(5.0, -3.0, 1.0)).abs() < 1e-10);
        assert!((q.evaluate(DVec3::ZERO) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_optimal_point_three_planes() {
        let p = DVec3::new(1.0, -2.0, 3.0);
        let q = Quadric::from_point_normal(p, DVec3::X)
            + Quadric::from_point_normal(p, DVec3::Y)
            + Quadric::from_point_normal(p, DVec3::Z);
        let opt = q.optimal_point().unwrap();
        assert!((opt - p).length() < 1e-9);
    }

    #[test]
    fn test_single_plane_is_singular() {
        let q = Quadric::from_plane(DVec3::Z, 0.0);
        assert!(q.optimal_point().is_none());
    }

    #[test]
    fn test_scaling() {
        let q = Quadric::from_plane(DVec3::Z, 0.0) * 10.0;
        assert!((q.evaluate(DVec3::new(0.0, 0.0, 1.0)) - 10.0).abs() < 1e-10);
    }
}
