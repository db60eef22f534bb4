//! Ahmed body case generation: builds the body solid through the extrude /
//! cut sequence, triangulates it into tagged surfaces and writes the STL /
//! VTK / MSH files a CFD case expects, together with the flow-domain wall
//! patches.

use std::path::PathBuf;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use nalgebra::{Point2, Point3};

use crate::config::{CaseConfig, CasePaths, DomainExtents, Symmetry};
use crate::csg::{Axis, PatchTag, Prism, Sketch, SketchPlane, Solid};
use crate::dims::BodyDims;
use crate::mesher::{mesh_quad, mesh_solid, mesh_tube, SurfacePatch, TriMesh};
use crate::output::MeshWriter;
use crate::Float;

/// Body surface tags in export order; `wallAhmed_<i>.stl` numbering follows
/// this list, skipping tags the case does not produce.
pub const BODY_PATCH_ORDER: [PatchTag; 12] = [
    "base",
    "slant",
    "top",
    "bottom",
    "sideNeg",
    "sidePos",
    "centerPlane",
    "noseTop",
    "noseBottom",
    "noseSideNeg",
    "noseSidePos",
    "noseCap",
];

fn patch_rank(tag: PatchTag) -> usize {
    BODY_PATCH_ORDER
        .iter()
        .position(|t| *t == tag)
        .unwrap_or(BODY_PATCH_ORDER.len())
}

pub struct AhmedGenerator {
    config: CaseConfig,
    dims: BodyDims,
    extents: DomainExtents,
    paths: CasePaths,
    writer: MeshWriter,
}

impl AhmedGenerator {
    pub fn new(config: CaseConfig) -> Self {
        let dims = if config.is_freestream {
            BodyDims::with_slant_angle_freestream(config.slant_angle_deg)
        } else {
            BodyDims::with_slant_angle(config.slant_angle_deg)
        };
        let extents = config.domain_extents(&dims);
        let paths = config.case_paths();
        Self {
            config,
            dims,
            extents,
            paths,
            writer: MeshWriter::new(),
        }
    }

    pub fn dims(&self) -> &BodyDims {
        &self.dims
    }

    pub fn paths(&self) -> &CasePaths {
        &self.paths
    }

    fn geometry_file(&self, name: &str) -> PathBuf {
        self.paths.geometry_dir.join(name)
    }

    /// The half- or full-width body solid: footprint extrusion, rear slant
    /// wedge, rounded nose cut seen from above, rounded nose cut seen from
    /// the side.
    pub fn build_body_solid(&self) -> Result<Solid> {
        let d = &self.dims;
        let half_w = 0.5 * d.w_overall;
        let (y_min, y_max, center_tag) = match self.config.symmetry {
            Symmetry::Half => (-half_w, 0.0, "centerPlane"),
            Symmetry::Full => (-half_w, half_w, "sidePos"),
        };

        let footprint = Sketch::rectangle(
            SketchPlane {
                normal: Axis::Z,
                offset: d.h_legs,
            },
            Point2::new(-d.l_overall, y_min),
            Point2::new(0.0, y_max),
            "sideNeg",
            center_tag,
        )?;
        let mut body = Solid::extrude(footprint, d.dh_body, "bottom", "top")
            .context("extruding body footprint")?;

        // Rear slant wedge; degenerate at zero slant angle, skipped like the
        // zero-angle body has no slant break at all.
        if d.slant_angle_deg != 0.0 {
            let mut wedge = Sketch::new(
                SketchPlane {
                    normal: Axis::Y,
                    offset: y_max,
                },
                Point2::new(0.0, d.h_overall),
            );
            wedge.line_to(Point2::new(0.0, d.h_overall - d.dz_cut), "");
            wedge.line_to(Point2::new(-d.dx_cut, d.h_overall), "slant");
            wedge.line_to(Point2::new(0.0, d.h_overall), "");
            wedge.close().context("closing slant wedge")?;
            body.cut(Prism::new(wedge, y_min - y_max))
                .context("cutting rear slant")?;
        }

        // Nose cut seen from above: the tool keeps everything outside two
        // quarter arcs blending the front face into the sides. The straight
        // closing edges sit 1 mm beyond the nose so they never coincide with
        // the front face.
        let yc = half_w - d.r_front;
        let arc_x = -(d.l_overall - d.r_front);
        let margin_x = -(d.l_overall + 1.0);
        let mut top_cut = Sketch::new(
            SketchPlane {
                normal: Axis::Z,
                offset: d.h_overall,
            },
            Point2::new(arc_x, -half_w),
        );
        top_cut.arc_to(
            Point2::new(arc_x, -yc),
            Point2::new(-d.l_overall, -yc),
            "noseSideNeg",
        );
        top_cut.line_to(Point2::new(-d.l_overall, yc), "");
        top_cut.arc_to(
            Point2::new(arc_x, yc),
            Point2::new(arc_x, half_w),
            "noseSidePos",
        );
        top_cut.line_to(Point2::new(margin_x, half_w), "");
        top_cut.line_to(Point2::new(margin_x, -half_w), "");
        top_cut.line_to(Point2::new(arc_x, -half_w), "");
        top_cut.close().context("closing nose top-down cutter")?;
        body.cut(Prism::new(top_cut, -d.h_overall))
            .context("cutting nose from above")?;

        // Nose cut seen from the side, same construction rotated into the
        // vertical plane.
        let zc1 = d.h_legs + d.r_front;
        let zc2 = d.h_overall - d.r_front;
        let mut side_cut = Sketch::new(
            SketchPlane {
                normal: Axis::Y,
                offset: -half_w,
            },
            Point2::new(arc_x, d.h_legs),
        );
        side_cut.arc_to(
            Point2::new(arc_x, zc1),
            Point2::new(-d.l_overall, zc1),
            "noseBottom",
        );
        side_cut.line_to(Point2::new(-d.l_overall, zc2), "");
        side_cut.arc_to(
            Point2::new(arc_x, zc2),
            Point2::new(arc_x, d.h_overall),
            "noseTop",
        );
        side_cut.line_to(Point2::new(margin_x, d.h_overall), "");
        side_cut.line_to(Point2::new(margin_x, d.h_legs), "");
        side_cut.line_to(Point2::new(arc_x, d.h_legs), "");
        side_cut.close().context("closing nose side cutter")?;
        body.cut(Prism::new(side_cut, d.w_overall))
            .context("cutting nose from the side")?;

        Ok(body)
    }

    /// Triangulated body surfaces in canonical export order.
    pub fn body_patches(&self) -> Result<Vec<SurfacePatch>> {
        let solid = self.build_body_solid()?;
        let mut patches = mesh_solid(&solid, self.config.body_mesh_size, "noseCap", "base")
            .context("meshing body")?;
        patches.sort_by_key(|p| patch_rank(p.tag));
        Ok(patches)
    }

    /// Write `body_full.vtk` and `body_full.msh` carrying all body surfaces.
    pub fn generate_body(&self) -> Result<Vec<SurfacePatch>> {
        let patches = self.body_patches()?;
        let vtk = self.geometry_file("body_full.vtk");
        let msh = self.geometry_file("body_full.msh");
        self.writer.write_vtk(&vtk, &patches)?;
        self.writer.write_msh(&msh, &patches)?;
        info!(
            "wrote body mesh ({} surfaces, {} triangles) to {}",
            patches.len(),
            patches.iter().map(|p| p.mesh.len()).sum::<usize>(),
            self.paths.geometry_dir.display()
        );
        Ok(patches)
    }

    /// Write one `wallAhmed_<i>.stl` per body surface, numbered by the
    /// canonical order.
    pub fn body_surface_stls(&self, patches: &[SurfacePatch]) -> Result<()> {
        for (i, patch) in patches.iter().enumerate() {
            let path = self.geometry_file(&format!("wallAhmed_{i}.stl"));
            self.writer.write_stl(&path, &patch.mesh)?;
            info!("wrote {} ({})", path.display(), patch.tag);
        }
        Ok(())
    }

    /// Write `wallLegsMesh.stl`: open cylinder shells, two per side. Skipped
    /// when the legs have collapsed (freestream cases).
    pub fn generate_legs(&self) -> Result<()> {
        let d = &self.dims;
        if d.h_legs == 0.0 {
            warn!("legs have zero height, skipping wallLegsMesh.stl");
            return Ok(());
        }
        let leg_y = 0.5 * d.w_overall - d.dw_legs_outer;
        let leg_xs = [-(d.l_overall - d.dl_legs_front), -d.dl_legs_back];
        let mut ys = vec![-leg_y];
        if self.config.symmetry == Symmetry::Full {
            ys.push(leg_y);
        }
        let mut mesh = TriMesh::new();
        for &x in &leg_xs {
            for &y in &ys {
                mesh.extend(&mesh_tube(
                    x,
                    y,
                    self.extents.bottom_z,
                    d.h_legs,
                    d.r_legs,
                    self.config.legs_mesh_size,
                ));
            }
        }
        let path = self.geometry_file("wallLegsMesh.stl");
        self.writer.write_stl(&path, &mesh)?;
        info!("wrote {}", path.display());
        Ok(())
    }

    fn write_wall(&self, name: &str, corners: [Point3<Float>; 4]) -> Result<()> {
        let mesh = mesh_quad(corners, self.config.domain_mesh_size);
        let path = self.geometry_file(name);
        self.writer.write_stl(&path, &mesh)?;
        info!("wrote {}", path.display());
        Ok(())
    }

    /// Inner y ordinate of the spanwise walls: the symmetry plane for half
    /// cases, the mirrored side wall for full-width cases.
    fn inner_y(&self) -> Float {
        match self.config.symmetry {
            Symmetry::Half => self.extents.symmetry_y,
            Symmetry::Full => -self.extents.side_y,
        }
    }

    pub fn generate_inlet(&self) -> Result<()> {
        let e = &self.extents;
        let y0 = self.inner_y();
        self.write_wall(
            "inletMesh.stl",
            [
                Point3::new(e.inlet_x, y0, e.bottom_z),
                Point3::new(e.inlet_x, e.side_y, e.bottom_z),
                Point3::new(e.inlet_x, e.side_y, e.top_z),
                Point3::new(e.inlet_x, y0, e.top_z),
            ],
        )
    }

    pub fn generate_outlet(&self) -> Result<()> {
        let e = &self.extents;
        let y0 = self.inner_y();
        self.write_wall(
            "outletMesh.stl",
            [
                Point3::new(e.outlet_x, y0, e.bottom_z),
                Point3::new(e.outlet_x, e.side_y, e.bottom_z),
                Point3::new(e.outlet_x, e.side_y, e.top_z),
                Point3::new(e.outlet_x, y0, e.top_z),
            ],
        )
    }

    pub fn generate_top(&self) -> Result<()> {
        let e = &self.extents;
        let y0 = self.inner_y();
        self.write_wall(
            "slipWallTop.stl",
            [
                Point3::new(e.inlet_x, y0, e.top_z),
                Point3::new(e.inlet_x, e.side_y, e.top_z),
                Point3::new(e.outlet_x, e.side_y, e.top_z),
                Point3::new(e.outlet_x, y0, e.top_z),
            ],
        )
    }

    /// Floor of the domain; a no-slip wall when the body stands on the
    /// ground, a slip wall when it floats in freestream.
    pub fn generate_bottom(&self) -> Result<()> {
        let e = &self.extents;
        let y0 = self.inner_y();
        let name = if self.config.is_freestream {
            "slipWallBottom.stl"
        } else {
            "wallBottom.stl"
        };
        self.write_wall(
            name,
            [
                Point3::new(e.inlet_x, y0, e.bottom_z),
                Point3::new(e.inlet_x, e.side_y, e.bottom_z),
                Point3::new(e.outlet_x, e.side_y, e.bottom_z),
                Point3::new(e.outlet_x, y0, e.bottom_z),
            ],
        )
    }

    pub fn generate_symmetry_plane(&self) -> Result<()> {
        let e = &self.extents;
        self.write_wall(
            "symmetryMesh.stl",
            [
                Point3::new(e.inlet_x, e.symmetry_y, e.bottom_z),
                Point3::new(e.outlet_x, e.symmetry_y, e.bottom_z),
                Point3::new(e.outlet_x, e.symmetry_y, e.top_z),
                Point3::new(e.inlet_x, e.symmetry_y, e.top_z),
            ],
        )
    }

    fn side_wall(&self, name: &str, y: Float) -> Result<()> {
        let e = &self.extents;
        self.write_wall(
            name,
            [
                Point3::new(e.inlet_x, y, e.bottom_z),
                Point3::new(e.outlet_x, y, e.bottom_z),
                Point3::new(e.outlet_x, y, e.top_z),
                Point3::new(e.inlet_x, y, e.top_z),
            ],
        )
    }

    /// Write every domain wall for the configured symmetry mode.
    pub fn generate_domain(&self) -> Result<()> {
        self.generate_inlet()?;
        self.generate_outlet()?;
        self.generate_bottom()?;
        self.generate_top()?;
        match self.config.symmetry {
            Symmetry::Half => {
                self.generate_symmetry_plane()?;
                self.side_wall("slipWallSide.stl", self.extents.side_y)?;
            }
            Symmetry::Full => {
                self.side_wall("slipWallSidePos.stl", self.extents.side_y)?;
                self.side_wall("slipWallSideNeg.stl", -self.extents.side_y)?;
            }
        }
        Ok(())
    }

    /// Full case export: body mesh, per-surface STLs, legs and domain walls.
    pub fn generate_all(&self) -> Result<()> {
        info!(
            "generating slant angle {:.2} into {}",
            self.config.slant_angle_deg,
            self.paths.case_dir.display()
        );
        self.paths.create_geometry_dir()?;

        let bar = ProgressBar::new(4);
        bar.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} {msg}",
        )?);

        bar.set_message("body");
        let patches = self.generate_body()?;
        bar.inc(1);

        bar.set_message("body surfaces");
        self.body_surface_stls(&patches)?;
        bar.inc(1);

        bar.set_message("legs");
        self.generate_legs()?;
        bar.inc(1);

        bar.set_message("domain");
        self.generate_domain()?;
        bar.inc(1);

        bar.finish_with_message("done");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn coarse_config(slant: Float, base: &std::path::Path) -> CaseConfig {
        let mut config = CaseConfig::new(slant, base);
        config.body_mesh_size = 150.0;
        config.legs_mesh_size = 20.0;
        config
    }

    #[test]
    fn body_solid_has_the_right_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let generator = AhmedGenerator::new(coarse_config(25.0, dir.path()));
        let patches = generator.body_patches().unwrap();

        let mut all = TriMesh::new();
        for p in &patches {
            all.extend(&p.mesh);
        }
        let (lo, hi) = all.bounds().unwrap();
        assert_relative_eq!(lo.x, -1044.0, epsilon = 1e-6);
        assert_relative_eq!(hi.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(lo.y, -194.5, epsilon = 1e-6);
        assert_relative_eq!(hi.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(lo.z, 50.0, epsilon = 1e-6);
        assert_relative_eq!(hi.z, 338.0, epsilon = 1e-6);
    }

    #[test]
    fn patch_tags_follow_the_canonical_order() {
        let dir = tempfile::tempdir().unwrap();
        let generator = AhmedGenerator::new(coarse_config(25.0, dir.path()));
        let patches = generator.body_patches().unwrap();
        let tags: Vec<_> = patches.iter().map(|p| p.tag).collect();
        assert_eq!(
            tags,
            vec![
                "base",
                "slant",
                "top",
                "bottom",
                "sideNeg",
                "centerPlane",
                "noseTop",
                "noseBottom",
                "noseSideNeg",
                "noseCap",
            ]
        );
    }

    #[test]
    fn zero_slant_has_no_slant_surface() {
        let dir = tempfile::tempdir().unwrap();
        let generator = AhmedGenerator::new(coarse_config(0.0, dir.path()));
        let patches = generator.body_patches().unwrap();
        assert!(patches.iter().all(|p| p.tag != "slant"));
        // The roof then runs the whole length behind the nose blend.
        let top = patches.iter().find(|p| p.tag == "top").unwrap();
        let (lo, hi) = top.mesh.bounds().unwrap();
        assert_relative_eq!(hi.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(lo.x, -944.0, epsilon = 1e-6);
    }

    #[test]
    fn full_width_body_is_mirrored() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = coarse_config(25.0, dir.path());
        config.symmetry = Symmetry::Full;
        let generator = AhmedGenerator::new(config);
        let patches = generator.body_patches().unwrap();
        let tags: Vec<_> = patches.iter().map(|p| p.tag).collect();
        assert!(tags.contains(&"sidePos"));
        assert!(tags.contains(&"noseSidePos"));
        assert!(!tags.contains(&"centerPlane"));

        let mut all = TriMesh::new();
        for p in &patches {
            all.extend(&p.mesh);
        }
        let (lo, hi) = all.bounds().unwrap();
        assert_relative_eq!(lo.y, -194.5, epsilon = 1e-6);
        assert_relative_eq!(hi.y, 194.5, epsilon = 1e-6);
    }

    #[test]
    fn slant_surface_has_the_diagonal_area() {
        let dir = tempfile::tempdir().unwrap();
        let generator = AhmedGenerator::new(coarse_config(25.0, dir.path()));
        let patches = generator.body_patches().unwrap();
        let slant = patches.iter().find(|p| p.tag == "slant").unwrap();
        // Half body: l_diag * w/2.
        assert_relative_eq!(slant.mesh.area(), 222.0 * 194.5, epsilon = 1e-6);
    }

    #[test]
    fn freestream_case_writes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = coarse_config(5.0, dir.path());
        config.is_freestream = true;
        let generator = AhmedGenerator::new(config);
        generator.generate_all().unwrap();

        let geo = generator.paths().geometry_dir.clone();
        assert!(geo.ends_with("slant_angle_5.00/geometry"));
        for name in [
            "inletMesh.stl",
            "outletMesh.stl",
            "slipWallTop.stl",
            "slipWallBottom.stl",
            "slipWallSide.stl",
            "symmetryMesh.stl",
            "body_full.vtk",
            "body_full.msh",
            "wallAhmed_0.stl",
            "wallAhmed_9.stl",
        ] {
            assert!(geo.join(name).exists(), "missing {name}");
        }
        // Collapsed legs: no legs file.
        assert!(!geo.join("wallLegsMesh.stl").exists());
        assert!(!geo.join("wallBottom.stl").exists());
    }

    #[test]
    fn grounded_case_writes_legs_and_a_no_slip_floor() {
        let dir = tempfile::tempdir().unwrap();
        let generator = AhmedGenerator::new(coarse_config(25.0, dir.path()));
        generator.generate_all().unwrap();
        let geo = generator.paths().geometry_dir.clone();
        assert!(geo.join("wallLegsMesh.stl").exists());
        assert!(geo.join("wallBottom.stl").exists());
        assert!(!geo.join("slipWallBottom.stl").exists());
    }
}
