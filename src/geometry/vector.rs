//! Small fixed-size vector helpers shared by the geometry types.
//!
//! Points live in 3-space; 2D meshes keep `z = 0`.

/// A point or vector in physical space.
pub type Global = [f64; 3];

pub(crate) const EPS: f64 = 1e-12;

#[inline]
pub fn add(a: Global, b: Global) -> Global {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub(a: Global, b: Global) -> Global {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn scale(a: Global, s: f64) -> Global {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
pub fn dot(a: Global, b: Global) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: Global, b: Global) -> Global {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn norm(a: Global) -> f64 {
    dot(a, a).sqrt()
}

/// Arithmetic mean of a non-empty point list.
pub fn average(points: &[Global]) -> Global {
    let sum = points.iter().fold([0.0; 3], |acc, p| add(acc, *p));
    scale(sum, 1.0 / points.len() as f64)
}

/// Signed volume of the tetrahedron `(a, b, c, d)`.
#[inline]
pub fn signed_volume(a: Global, b: Global, c: Global, d: Global) -> f64 {
    dot(sub(b, a), cross(sub(c, a), sub(d, a))) / 6.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_tetrahedron_volume() {
        let v = signed_volume([0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]);
        assert!((v - 1.0 / 6.0).abs() < 1e-15);
    }

    #[test]
    fn cross_follows_right_hand_rule() {
        assert_eq!(cross([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]), [0.0, 0.0, 1.0]);
        assert_eq!(average(&[[0.0; 3], [2.0, 4.0, 6.0]]), [1.0, 2.0, 3.0]);
    }
}
