//! Integration rules on cells and faces.
//!
//! Every element is split into simplices around its node average; each
//! simplex contributes one point (its centroid) weighted by its measure. The
//! rule integrates linear functions exactly on elements with planar faces,
//! and gives exact volumes, areas and centroids there.

use crate::geometry::coordinate::Coordinate;
use crate::geometry::vector::{EPS, Global, add, cross, norm, scale, signed_volume, sub};
use crate::mesh_error::MeshPartError;

/// Quadrature points and weights in physical space, plus cached moments.
#[derive(Clone, Debug, PartialEq)]
pub struct Integrator {
    points: Vec<Global>,
    weights: Vec<f64>,
    measure: f64,
    center: Global,
    /// Unit normal for faces; `None` for cells.
    normal: Option<Global>,
}

impl Integrator {
    /// Build the rule for a 2D or 3D cell.
    ///
    /// Fails on degenerate or inverted cells, whose outward face convention
    /// would produce non-positive sub-volumes.
    pub fn for_cell(coordinate: &Coordinate) -> Result<Self, MeshPartError> {
        let kind = coordinate.kind();
        let c0 = coordinate.center();
        let mut points = Vec::new();
        let mut weights = Vec::new();
        match kind.dimension() {
            3 => {
                for local in kind.local_faces() {
                    let face: Vec<Global> = local.iter().map(|&k| coordinate.global(k)).collect();
                    for [a, b, c] in fan(&face) {
                        let v = signed_volume(c0, a, b, c);
                        points.push(scale(add(add(c0, a), add(b, c)), 0.25));
                        weights.push(v);
                    }
                }
            }
            2 => {
                for local in kind.local_faces() {
                    let (a, b) = (coordinate.global(local[0]), coordinate.global(local[1]));
                    let area = 0.5 * cross(sub(a, c0), sub(b, c0))[2];
                    points.push(scale(add(add(c0, a), b), 1.0 / 3.0));
                    weights.push(area);
                }
            }
            _ => {
                return Err(MeshPartError::InvalidMesh(format!(
                    "{kind:?} cannot be used as a cell"
                )));
            }
        }
        if weights.iter().any(|&w| w <= 0.0) {
            return Err(MeshPartError::InvalidMesh(format!(
                "{kind:?} centered at {c0:?} is degenerate or inverted"
            )));
        }
        Ok(Self::from_points(points, weights, None))
    }

    /// Build the rule for a face; its normal follows the node order.
    pub fn for_face(coordinate: &Coordinate) -> Result<Self, MeshPartError> {
        let kind = coordinate.kind();
        match kind.dimension() {
            1 => {
                let (a, b) = (coordinate.global(0), coordinate.global(1));
                let t = sub(b, a);
                let len = norm(t);
                if len <= EPS {
                    return Err(MeshPartError::InvalidMesh("zero-length edge".into()));
                }
                let normal = [t[1] / len, -t[0] / len, 0.0];
                Ok(Self::from_points(
                    vec![coordinate.center()],
                    vec![len],
                    Some(normal),
                ))
            }
            2 => {
                let mut points = Vec::new();
                let mut weights = Vec::new();
                let mut area_vec = [0.0; 3];
                for [a, b, c] in fan(coordinate.nodes()) {
                    let av = scale(cross(sub(b, a), sub(c, a)), 0.5);
                    area_vec = add(area_vec, av);
                    points.push(scale(add(add(a, b), c), 1.0 / 3.0));
                    weights.push(norm(av));
                }
                let len = norm(area_vec);
                if len <= EPS {
                    return Err(MeshPartError::InvalidMesh("zero-area face".into()));
                }
                Ok(Self::from_points(
                    points,
                    weights,
                    Some(scale(area_vec, 1.0 / len)),
                ))
            }
            _ => Err(MeshPartError::InvalidMesh(format!(
                "{kind:?} cannot be used as a face"
            ))),
        }
    }

    fn from_points(points: Vec<Global>, weights: Vec<f64>, normal: Option<Global>) -> Self {
        let measure: f64 = weights.iter().sum();
        let moment = points
            .iter()
            .zip(&weights)
            .fold([0.0; 3], |acc, (p, w)| add(acc, scale(*p, *w)));
        Self {
            center: scale(moment, 1.0 / measure),
            points,
            weights,
            measure,
            normal,
        }
    }

    #[inline]
    pub fn count_points(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn global(&self, q: usize) -> Global {
        self.points[q]
    }

    #[inline]
    pub fn global_weight(&self, q: usize) -> f64 {
        self.weights[q]
    }

    /// Volume of a 3D cell, area of a 2D cell or face, length of an edge.
    #[inline]
    pub fn measure(&self) -> f64 {
        self.measure
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        self.measure
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.measure
    }

    /// Centroid.
    #[inline]
    pub fn center(&self) -> Global {
        self.center
    }

    /// Unit normal of a face (zero vector for cells).
    #[inline]
    pub fn normal(&self) -> Global {
        self.normal.unwrap_or([0.0; 3])
    }

    /// `∫ f` over the element.
    pub fn integrate<F: Fn(Global) -> f64>(&self, f: F) -> f64 {
        self.points
            .iter()
            .zip(&self.weights)
            .map(|(p, w)| f(*p) * w)
            .sum()
    }
}

/// Split a planar polygon into triangles that keep its orientation.
fn fan(polygon: &[Global]) -> Vec<[Global; 3]> {
    if polygon.len() == 3 {
        return vec![[polygon[0], polygon[1], polygon[2]]];
    }
    let f0 = crate::geometry::vector::average(polygon);
    (0..polygon.len())
        .map(|i| [f0, polygon[i], polygon[(i + 1) % polygon.len()]])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::coordinate::Prototype;
    use crate::topology::element::ElementKind;

    fn unit_cube() -> Vec<Global> {
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ]
    }

    #[test]
    fn hexahedron_volume_and_center() {
        let (_, integ) = Prototype::cell(ElementKind::Hexahedron8)
            .instantiate(unit_cube())
            .unwrap();
        assert!((integ.volume() - 1.0).abs() < 1e-12);
        for (c, e) in integ.center().iter().zip([0.5, 0.5, 0.5]) {
            assert!((c - e).abs() < 1e-12);
        }
        // ∫ x over the unit cube
        assert!((integ.integrate(|p| p[0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn inverted_hexahedron_is_rejected() {
        let mut nodes = unit_cube();
        nodes.swap(1, 3);
        nodes.swap(5, 7);
        let err = Prototype::cell(ElementKind::Hexahedron8)
            .instantiate(nodes)
            .unwrap_err();
        assert!(matches!(err, MeshPartError::InvalidMesh(_)));
    }

    #[test]
    fn quadrangle_face_normal_and_area() {
        let nodes = vec![
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [2.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let (_, integ) = Prototype::face(ElementKind::Quadrangle4)
            .instantiate(nodes)
            .unwrap();
        assert!((integ.area() - 2.0).abs() < 1e-12);
        assert_eq!(integ.normal(), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn triangle_cell_and_edge() {
        let tri = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let (_, integ) = Prototype::cell(ElementKind::Triangle3)
            .instantiate(tri)
            .unwrap();
        assert!((integ.area() - 0.5).abs() < 1e-12);
        let (_, edge) = Prototype::face(ElementKind::Line2)
            .instantiate(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]])
            .unwrap();
        assert_eq!(edge.normal(), [0.0, -1.0, 0.0]);
        assert!((edge.area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tetrahedron_volume() {
        let nodes = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let (_, integ) = Prototype::cell(ElementKind::Tetrahedron4)
            .instantiate(nodes)
            .unwrap();
        assert!((integ.volume() - 1.0 / 6.0).abs() < 1e-12);
    }
}
