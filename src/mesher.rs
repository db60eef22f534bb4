//! Triangulation of the body solid and the auxiliary surfaces. The body is
//! swept along x: between consecutive feature stations every cross-section
//! is the rectangle spanned by the plan and elevation profiles, so the
//! boundary is four ruled strips plus two end caps. Domain walls are
//! subdivided planar quads and the legs are open cylinder shells.

use anyhow::{ensure, Context, Result};
use nalgebra::{Point3, Vector3};

use crate::csg::{PatchTag, Solid, Span};
use crate::Float;

const AREA_EPS: Float = 1e-12;

/// Plain triangle soup; vertices are duplicated per triangle and merged by
/// the writers that need connectivity.
#[derive(Debug, Clone, Default)]
pub struct TriMesh {
    pub triangles: Vec<[Point3<Float>; 3]>,
}

impl TriMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn normal(tri: &[Point3<Float>; 3]) -> Vector3<Float> {
        (tri[1] - tri[0]).cross(&(tri[2] - tri[0]))
    }

    /// Push a triangle with the winding as given; degenerate triangles are
    /// dropped.
    pub fn push_tri(&mut self, tri: [Point3<Float>; 3]) {
        if Self::normal(&tri).norm() > AREA_EPS {
            self.triangles.push(tri);
        }
    }

    /// Push a triangle wound so its normal has a positive component along
    /// `outward`.
    pub fn push_tri_oriented(&mut self, tri: [Point3<Float>; 3], outward: Vector3<Float>) {
        if Self::normal(&tri).dot(&outward) < 0.0 {
            self.push_tri([tri[0], tri[2], tri[1]]);
        } else {
            self.push_tri(tri);
        }
    }

    /// Split a (possibly non-planar) quad given in loop order into two
    /// triangles, both wound towards `outward`.
    pub fn push_quad_oriented(
        &mut self,
        quad: [Point3<Float>; 4],
        outward: Vector3<Float>,
    ) {
        self.push_tri_oriented([quad[0], quad[1], quad[2]], outward);
        self.push_tri_oriented([quad[0], quad[2], quad[3]], outward);
    }

    pub fn extend(&mut self, other: &TriMesh) {
        self.triangles.extend_from_slice(&other.triangles);
    }

    pub fn area(&self) -> Float {
        self.triangles
            .iter()
            .map(|t| 0.5 * Self::normal(t).norm())
            .sum()
    }

    pub fn bounds(&self) -> Option<(Point3<Float>, Point3<Float>)> {
        let mut lo = Point3::new(Float::INFINITY, Float::INFINITY, Float::INFINITY);
        let mut hi = Point3::new(
            Float::NEG_INFINITY,
            Float::NEG_INFINITY,
            Float::NEG_INFINITY,
        );
        for tri in &self.triangles {
            for p in tri {
                for i in 0..3 {
                    lo[i] = lo[i].min(p[i]);
                    hi[i] = hi[i].max(p[i]);
                }
            }
        }
        if self.is_empty() {
            None
        } else {
            Some((lo, hi))
        }
    }
}

/// Triangles belonging to one named surface of the body.
#[derive(Debug, Clone)]
pub struct SurfacePatch {
    pub tag: PatchTag,
    pub mesh: TriMesh,
}

fn patch_mesh<'a>(patches: &'a mut Vec<SurfacePatch>, tag: PatchTag) -> &'a mut TriMesh {
    if let Some(i) = patches.iter().position(|p| p.tag == tag) {
        return &mut patches[i].mesh;
    }
    patches.push(SurfacePatch {
        tag,
        mesh: TriMesh::new(),
    });
    let last = patches.len() - 1;
    &mut patches[last].mesh
}

fn subdivisions(extent: Float, size: Float) -> usize {
    ((extent / size).ceil() as usize).max(1)
}

fn find_span<'a>(spans: &'a [Span], u: Float) -> Result<&'a Span> {
    spans
        .iter()
        .find(|s| u >= s.u0 - 1e-9 && u <= s.u1 + 1e-9)
        .with_context(|| format!("no cross-section at x = {u}"))
}

/// One ruled strip between stations xa and xb, transversely subdivided.
/// `at` maps (x, t in 0..1) to a surface point; `outward` orients winding.
#[allow(clippy::too_many_arguments)]
fn ruled_strip(
    mesh: &mut TriMesh,
    xa: Float,
    xb: Float,
    transverse_extent: Float,
    size: Float,
    outward: Vector3<Float>,
    at: impl Fn(Float, Float) -> Point3<Float>,
) {
    let n = subdivisions(transverse_extent, size);
    for j in 0..n {
        let t0 = j as Float / n as Float;
        let t1 = (j + 1) as Float / n as Float;
        mesh.push_quad_oriented(
            [at(xa, t0), at(xb, t0), at(xb, t1), at(xa, t1)],
            outward,
        );
    }
}

/// Triangulate the boundary of a swept solid into tagged patches. Strips
/// inherit the tag of the profile edge that generates them; the end faces
/// get `front_cap_tag` (low x) and `rear_cap_tag` (high x).
pub fn mesh_solid(
    solid: &Solid,
    size: Float,
    front_cap_tag: PatchTag,
    rear_cap_tag: PatchTag,
) -> Result<Vec<SurfacePatch>> {
    ensure!(size > 0.0, "mesh size must be positive");
    let plan_spans = solid.plan.spans()?;
    let elev_spans = solid.elevation.spans()?;
    ensure!(!plan_spans.is_empty(), "empty plan profile");
    ensure!(!elev_spans.is_empty(), "empty elevation profile");

    // Merged station grid: every x where either profile changes boundary.
    let mut stations: Vec<Float> = plan_spans
        .iter()
        .chain(elev_spans.iter())
        .flat_map(|s| [s.u0, s.u1])
        .collect();
    stations.sort_by(Float::total_cmp);
    stations.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

    let mut patches: Vec<SurfacePatch> = Vec::new();

    for pair in stations.windows(2) {
        let (x0, x1) = (pair[0], pair[1]);
        if x1 - x0 < 1e-9 {
            continue;
        }
        let xm = 0.5 * (x0 + x1);
        let plan = find_span(&plan_spans, xm)?;
        let elev = find_span(&elev_spans, xm)?;

        let y_lo = &plan.lower;
        let y_hi = &plan.upper;
        let z_lo = &elev.lower;
        let z_hi = &elev.upper;

        let nx = subdivisions(x1 - x0, size);
        for i in 0..nx {
            let xa = x0 + (x1 - x0) * i as Float / nx as Float;
            let xb = x0 + (x1 - x0) * (i + 1) as Float / nx as Float;

            let z_extent = (z_hi.v_at(xa) - z_lo.v_at(xa))
                .max(z_hi.v_at(xb) - z_lo.v_at(xb));
            let y_extent = (y_hi.v_at(xa) - y_lo.v_at(xa))
                .max(y_hi.v_at(xb) - y_lo.v_at(xb));
            let xc = 0.5 * (xa + xb);

            // Side wall on the lower-y boundary; in-plane outward direction
            // for v = f(u) with the section above is (f', -1).
            ruled_strip(
                patch_mesh(&mut patches, y_lo.tag),
                xa,
                xb,
                z_extent,
                size,
                Vector3::new(y_lo.slope(xc), -1.0, 0.0),
                |x, t| {
                    let z = z_lo.v_at(x) + t * (z_hi.v_at(x) - z_lo.v_at(x));
                    Point3::new(x, y_lo.v_at(x), z)
                },
            );
            // Side wall on the upper-y boundary.
            ruled_strip(
                patch_mesh(&mut patches, y_hi.tag),
                xa,
                xb,
                z_extent,
                size,
                Vector3::new(-y_hi.slope(xc), 1.0, 0.0),
                |x, t| {
                    let z = z_lo.v_at(x) + t * (z_hi.v_at(x) - z_lo.v_at(x));
                    Point3::new(x, y_hi.v_at(x), z)
                },
            );
            // Underside.
            ruled_strip(
                patch_mesh(&mut patches, z_lo.tag),
                xa,
                xb,
                y_extent,
                size,
                Vector3::new(z_lo.slope(xc), 0.0, -1.0),
                |x, t| {
                    let y = y_lo.v_at(x) + t * (y_hi.v_at(x) - y_lo.v_at(x));
                    Point3::new(x, y, z_lo.v_at(x))
                },
            );
            // Roof (or slant, behind the rear break).
            ruled_strip(
                patch_mesh(&mut patches, z_hi.tag),
                xa,
                xb,
                y_extent,
                size,
                Vector3::new(-z_hi.slope(xc), 0.0, 1.0),
                |x, t| {
                    let y = y_lo.v_at(x) + t * (y_hi.v_at(x) - y_lo.v_at(x));
                    Point3::new(x, y, z_hi.v_at(x))
                },
            );
        }
    }

    // End caps. The extreme cross-sections are exact rectangles because the
    // bounding curves are evaluated at their clamped endpoints.
    let front = stations[0];
    let rear = stations[stations.len() - 1];
    for (x, tag, sign) in [
        (front, front_cap_tag, -1.0),
        (rear, rear_cap_tag, 1.0),
    ] {
        let plan = find_span(&plan_spans, x)?;
        let elev = find_span(&elev_spans, x)?;
        let (y0, y1) = (plan.lower.v_at(x), plan.upper.v_at(x));
        let (z0, z1) = (elev.lower.v_at(x), elev.upper.v_at(x));
        if y1 - y0 < 1e-9 || z1 - z0 < 1e-9 {
            continue;
        }
        let mesh = patch_mesh(&mut patches, tag);
        let ny = subdivisions(y1 - y0, size);
        let nz = subdivisions(z1 - z0, size);
        let outward = Vector3::new(sign, 0.0, 0.0);
        for j in 0..ny {
            for k in 0..nz {
                let ya = y0 + (y1 - y0) * j as Float / ny as Float;
                let yb = y0 + (y1 - y0) * (j + 1) as Float / ny as Float;
                let za = z0 + (z1 - z0) * k as Float / nz as Float;
                let zb = z0 + (z1 - z0) * (k + 1) as Float / nz as Float;
                mesh.push_quad_oriented(
                    [
                        Point3::new(x, ya, za),
                        Point3::new(x, yb, za),
                        Point3::new(x, yb, zb),
                        Point3::new(x, ya, zb),
                    ],
                    outward,
                );
            }
        }
    }

    patches.retain(|p| !p.mesh.is_empty());
    Ok(patches)
}

/// Subdivide a planar quad given in loop order; the corner winding fixes the
/// normal. With no target size the wall becomes a single pair of triangles.
pub fn mesh_quad(corners: [Point3<Float>; 4], size: Option<Float>) -> TriMesh {
    let mut mesh = TriMesh::new();
    let (ns, nt) = match size {
        Some(s) if s > 0.0 => {
            let du = (corners[1] - corners[0])
                .norm()
                .max((corners[2] - corners[3]).norm());
            let dv = (corners[3] - corners[0])
                .norm()
                .max((corners[2] - corners[1]).norm());
            (subdivisions(du, s), subdivisions(dv, s))
        }
        _ => (1, 1),
    };
    let at = |s: Float, t: Float| {
        let bottom = corners[0] + (corners[1] - corners[0]) * s;
        let top = corners[3] + (corners[2] - corners[3]) * s;
        bottom + (top - bottom) * t
    };
    for i in 0..ns {
        for j in 0..nt {
            let s0 = i as Float / ns as Float;
            let s1 = (i + 1) as Float / ns as Float;
            let t0 = j as Float / nt as Float;
            let t1 = (j + 1) as Float / nt as Float;
            mesh.push_tri([at(s0, t0), at(s1, t0), at(s1, t1)]);
            mesh.push_tri([at(s0, t0), at(s1, t1), at(s0, t1)]);
        }
    }
    mesh
}

/// Open cylinder shell for a leg: lateral surface only, no caps, outward
/// radial normals.
pub fn mesh_tube(
    center_x: Float,
    center_y: Float,
    z0: Float,
    dz: Float,
    radius: Float,
    size: Float,
) -> TriMesh {
    let mut mesh = TriMesh::new();
    if dz.abs() < 1e-12 || radius <= 0.0 {
        return mesh;
    }
    let n_theta = subdivisions(2.0 * std::f64::consts::PI * radius, size).max(8);
    let n_z = subdivisions(dz.abs(), size);
    let z1 = z0 + dz;
    let at = |i: usize, k: usize| {
        let theta = 2.0 * std::f64::consts::PI * i as Float / n_theta as Float;
        let z = z0 + (z1 - z0) * k as Float / n_z as Float;
        Point3::new(
            center_x + radius * theta.cos(),
            center_y + radius * theta.sin(),
            z,
        )
    };
    for i in 0..n_theta {
        let theta_mid = 2.0 * std::f64::consts::PI * (i as Float + 0.5) / n_theta as Float;
        let outward = Vector3::new(theta_mid.cos(), theta_mid.sin(), 0.0);
        for k in 0..n_z {
            mesh.push_quad_oriented(
                [at(i, k), at(i + 1, k), at(i + 1, k + 1), at(i, k + 1)],
                outward,
            );
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csg::{Axis, Prism, Sketch, SketchPlane};
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    fn box_solid(l: Float, w: Float, h: Float) -> Solid {
        let footprint = Sketch::rectangle(
            SketchPlane {
                normal: Axis::Z,
                offset: 0.0,
            },
            Point2::new(-l, -w),
            Point2::new(0.0, 0.0),
            "side_neg",
            "side_pos",
        )
        .unwrap();
        Solid::extrude(footprint, h, "bottom", "top").unwrap()
    }

    #[test]
    fn box_mesh_is_closed_and_has_the_right_area() {
        let solid = box_solid(4.0, 2.0, 1.0);
        let patches = mesh_solid(&solid, 0.5, "nose", "base").unwrap();
        let tags: Vec<_> = patches.iter().map(|p| p.tag).collect();
        assert!(tags.contains(&"side_neg"));
        assert!(tags.contains(&"top"));
        assert!(tags.contains(&"nose"));
        assert!(tags.contains(&"base"));

        let total: Float = patches.iter().map(|p| p.mesh.area()).sum();
        // 2*(4*2 + 4*1 + 2*1)
        assert_relative_eq!(total, 28.0, epsilon = 1e-9);
    }

    #[test]
    fn box_mesh_normals_point_outwards() {
        let solid = box_solid(4.0, 2.0, 1.0);
        let patches = mesh_solid(&solid, 1.0, "nose", "base").unwrap();
        // Centroid of the box.
        let c = Point3::new(-2.0, -1.0, 0.5);
        for patch in &patches {
            for tri in &patch.mesh.triangles {
                let n = TriMesh::normal(tri);
                let mid = Point3::from((tri[0].coords + tri[1].coords + tri[2].coords) / 3.0);
                assert!(
                    n.dot(&(mid - c)) > 0.0,
                    "inward-facing triangle on {}",
                    patch.tag
                );
            }
        }
    }

    #[test]
    fn slanted_roof_area_matches_the_hypotenuse() {
        let mut solid = box_solid(10.0, 2.0, 4.0);
        let mut wedge = Sketch::new(
            SketchPlane {
                normal: Axis::Y,
                offset: 0.0,
            },
            Point2::new(0.0, 4.0),
        );
        wedge.line_to(Point2::new(0.0, 2.0), "");
        wedge.line_to(Point2::new(-3.0, 4.0), "slant");
        wedge.line_to(Point2::new(0.0, 4.0), "");
        wedge.close().unwrap();
        solid.cut(Prism::new(wedge, -2.0)).unwrap();

        let patches = mesh_solid(&solid, 0.25, "nose", "base").unwrap();
        let slant = patches.iter().find(|p| p.tag == "slant").unwrap();
        let hyp = (3.0f64 * 3.0 + 2.0 * 2.0).sqrt();
        assert_relative_eq!(slant.mesh.area(), hyp * 2.0, epsilon = 1e-9);
        // The rear face shrinks to the height below the slant break.
        let base = patches.iter().find(|p| p.tag == "base").unwrap();
        assert_relative_eq!(base.mesh.area(), 2.0 * 2.0, epsilon = 1e-9);
    }

    #[test]
    fn quad_with_no_size_is_two_triangles() {
        let mesh = mesh_quad(
            [
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            None,
        );
        assert_eq!(mesh.len(), 2);
        assert_relative_eq!(mesh.area(), 1.0);
        for tri in &mesh.triangles {
            assert!(TriMesh::normal(tri).z > 0.0);
        }
    }

    #[test]
    fn quad_subdivision_respects_the_target_size() {
        let mesh = mesh_quad(
            [
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(4.0, 0.0, 0.0),
                Point3::new(4.0, 2.0, 0.0),
                Point3::new(0.0, 2.0, 0.0),
            ],
            Some(1.0),
        );
        assert_eq!(mesh.len(), 2 * 4 * 2);
        assert_relative_eq!(mesh.area(), 8.0, epsilon = 1e-12);
    }

    #[test]
    fn tube_area_approaches_the_cylinder() {
        let mesh = mesh_tube(0.0, 0.0, 0.0, 5.0, 1.0, 0.1);
        let exact = 2.0 * std::f64::consts::PI * 1.0 * 5.0;
        assert!(mesh.area() < exact);
        assert!(mesh.area() > 0.99 * exact);
        // Open shell: no triangle lies in a z = const plane.
        for tri in &mesh.triangles {
            let n = TriMesh::normal(tri);
            assert!(n.z.abs() < 1e-6 * n.norm());
        }
    }
}
