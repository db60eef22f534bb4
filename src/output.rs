//! File export: binary STL per surface, plus ASCII VTK and Gmsh MSH dumps of
//! the whole tagged body for inspection. Geometry is modelled in
//! millimeters and written out in meters.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use nalgebra::Point3;

use crate::mesher::{SurfacePatch, TriMesh};
use crate::Float;

/// Node-merge resolution in output units.
const MERGE_RES: Float = 1e-9;

pub struct MeshWriter {
    /// Model-to-file length scale; millimeter input, meter output.
    pub unit_scale: Float,
}

impl Default for MeshWriter {
    fn default() -> Self {
        Self { unit_scale: 1e-3 }
    }
}

/// Shared-vertex view of a triangle soup, used by the formats that want
/// connectivity.
struct IndexedMesh {
    nodes: Vec<Point3<Float>>,
    /// Per-triangle node indices plus the index of the source patch.
    cells: Vec<([usize; 3], usize)>,
}

impl IndexedMesh {
    fn build(patches: &[SurfacePatch], scale: Float) -> Self {
        let mut nodes = Vec::new();
        let mut cells = Vec::new();
        let mut index: HashMap<(i64, i64, i64), usize> = HashMap::new();
        let mut node_id = |p: Point3<Float>, nodes: &mut Vec<Point3<Float>>| {
            let key = (
                (p.x / MERGE_RES).round() as i64,
                (p.y / MERGE_RES).round() as i64,
                (p.z / MERGE_RES).round() as i64,
            );
            *index.entry(key).or_insert_with(|| {
                nodes.push(p);
                nodes.len() - 1
            })
        };
        for (patch_id, patch) in patches.iter().enumerate() {
            for tri in &patch.mesh.triangles {
                let ids = [
                    node_id(tri[0] * scale, &mut nodes),
                    node_id(tri[1] * scale, &mut nodes),
                    node_id(tri[2] * scale, &mut nodes),
                ];
                cells.push((ids, patch_id));
            }
        }
        Self { nodes, cells }
    }
}

impl MeshWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binary STL of one surface.
    pub fn write_stl(&self, path: &Path, mesh: &TriMesh) -> Result<()> {
        let scale = self.unit_scale;
        let faces: Vec<stl_io::Triangle> = mesh
            .triangles
            .iter()
            .map(|tri| {
                let n = TriMesh::normal(tri).normalize();
                stl_io::Triangle {
                    normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                    vertices: [
                        vertex(tri[0], scale),
                        vertex(tri[1], scale),
                        vertex(tri[2], scale),
                    ],
                }
            })
            .collect();
        let mut file = File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        stl_io::write_stl(&mut file, faces.iter())
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Legacy ASCII VTK unstructured grid carrying every patch, with a
    /// SurfaceId cell field identifying the patch each triangle belongs to.
    pub fn write_vtk(&self, path: &Path, patches: &[SurfacePatch]) -> Result<()> {
        let indexed = IndexedMesh::build(patches, self.unit_scale);
        let file = File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);

        writeln!(out, "# vtk DataFile Version 3.0")?;
        writeln!(out, "Ahmed body surface mesh")?;
        writeln!(out, "ASCII")?;
        writeln!(out, "DATASET UNSTRUCTURED_GRID")?;

        writeln!(out, "POINTS {} double", indexed.nodes.len())?;
        for p in &indexed.nodes {
            writeln!(out, "{} {} {}", p.x, p.y, p.z)?;
        }

        let n_cells = indexed.cells.len();
        writeln!(out, "CELLS {} {}", n_cells, 4 * n_cells)?;
        for (ids, _) in &indexed.cells {
            writeln!(out, "3 {} {} {}", ids[0], ids[1], ids[2])?;
        }
        writeln!(out, "CELL_TYPES {}", n_cells)?;
        for _ in &indexed.cells {
            writeln!(out, "5")?;
        }

        writeln!(out, "CELL_DATA {}", n_cells)?;
        writeln!(out, "SCALARS SurfaceId int 1")?;
        writeln!(out, "LOOKUP_TABLE default")?;
        for (_, patch_id) in &indexed.cells {
            writeln!(out, "{}", patch_id)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Gmsh 4.1 ASCII mesh with one discrete surface entity per patch, so
    /// downstream tools can pick surfaces apart again.
    pub fn write_msh(&self, path: &Path, patches: &[SurfacePatch]) -> Result<()> {
        let scale = self.unit_scale;
        let file = File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);

        writeln!(out, "$MeshFormat")?;
        writeln!(out, "4.1 0 8")?;
        writeln!(out, "$EndMeshFormat")?;

        // One indexed mesh per patch; node tags are global and 1-based.
        let per_patch: Vec<IndexedMesh> = patches
            .iter()
            .map(|p| IndexedMesh::build(std::slice::from_ref(p), scale))
            .collect();

        writeln!(out, "$Entities")?;
        writeln!(out, "0 0 {} 0", patches.len())?;
        for (i, patch) in patches.iter().enumerate() {
            let (lo, hi) = patch
                .mesh
                .bounds()
                .map(|(lo, hi)| (lo * scale, hi * scale))
                .unwrap_or((Point3::origin(), Point3::origin()));
            writeln!(
                out,
                "{} {} {} {} {} {} {} 0 0",
                i + 1,
                lo.x,
                lo.y,
                lo.z,
                hi.x,
                hi.y,
                hi.z
            )?;
        }
        writeln!(out, "$EndEntities")?;

        let total_nodes: usize = per_patch.iter().map(|m| m.nodes.len()).sum();
        let total_elems: usize = per_patch.iter().map(|m| m.cells.len()).sum();

        writeln!(out, "$Nodes")?;
        writeln!(out, "{} {} 1 {}", per_patch.len(), total_nodes, total_nodes)?;
        let mut node_base = 0usize;
        for (i, mesh) in per_patch.iter().enumerate() {
            writeln!(out, "2 {} 0 {}", i + 1, mesh.nodes.len())?;
            for j in 0..mesh.nodes.len() {
                writeln!(out, "{}", node_base + j + 1)?;
            }
            for p in &mesh.nodes {
                writeln!(out, "{} {} {}", p.x, p.y, p.z)?;
            }
            node_base += mesh.nodes.len();
        }
        writeln!(out, "$EndNodes")?;

        writeln!(out, "$Elements")?;
        writeln!(out, "{} {} 1 {}", per_patch.len(), total_elems, total_elems)?;
        let mut elem_tag = 1usize;
        node_base = 0;
        for (i, mesh) in per_patch.iter().enumerate() {
            writeln!(out, "2 {} 2 {}", i + 1, mesh.cells.len())?;
            for (ids, _) in &mesh.cells {
                writeln!(
                    out,
                    "{} {} {} {}",
                    elem_tag,
                    node_base + ids[0] + 1,
                    node_base + ids[1] + 1,
                    node_base + ids[2] + 1
                )?;
                elem_tag += 1;
            }
            node_base += mesh.nodes.len();
        }
        writeln!(out, "$EndElements")?;
        out.flush()?;
        Ok(())
    }
}

fn vertex(p: Point3<Float>, scale: Float) -> stl_io::Vertex {
    stl_io::Vertex::new([
        (p.x * scale) as f32,
        (p.y * scale) as f32,
        (p.z * scale) as f32,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesher::mesh_quad;
    use nalgebra::Point3;
    use std::fs;

    fn unit_quad() -> TriMesh {
        // 1 m square in model units (mm).
        mesh_quad(
            [
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1000.0, 0.0, 0.0),
                Point3::new(1000.0, 1000.0, 0.0),
                Point3::new(0.0, 1000.0, 0.0),
            ],
            None,
        )
    }

    #[test]
    fn stl_round_trips_in_meters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.stl");
        MeshWriter::new().write_stl(&path, &unit_quad()).unwrap();

        let mut file = fs::File::open(&path).unwrap();
        let stl = stl_io::read_stl(&mut file).unwrap();
        assert_eq!(stl.faces.len(), 2);
        let max_x = stl
            .vertices
            .iter()
            .map(|v| v[0])
            .fold(f32::MIN, f32::max);
        assert!((max_x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn vtk_has_merged_nodes_and_surface_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.vtk");
        let patches = vec![
            SurfacePatch {
                tag: "a",
                mesh: unit_quad(),
            },
            SurfacePatch {
                tag: "b",
                mesh: unit_quad(),
            },
        ];
        MeshWriter::new().write_vtk(&path, &patches).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        // Two coincident quads share 4 merged nodes.
        assert!(text.contains("POINTS 4 double"));
        assert!(text.contains("CELLS 4 16"));
        assert!(text.contains("SCALARS SurfaceId int 1"));
        let ids: Vec<&str> = text.lines().rev().take(4).collect();
        assert!(ids.contains(&"0") && ids.contains(&"1"));
    }

    #[test]
    fn msh_declares_one_entity_per_patch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.msh");
        let patches = vec![
            SurfacePatch {
                tag: "a",
                mesh: unit_quad(),
            },
            SurfacePatch {
                tag: "b",
                mesh: unit_quad(),
            },
        ];
        MeshWriter::new().write_msh(&path, &patches).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("$MeshFormat\n4.1 0 8\n"));
        assert!(text.contains("\n0 0 2 0\n"));
        assert!(text.contains("$EndElements"));
        // 4 merged nodes per patch, 8 total.
        assert!(text.contains("\n2 8 1 8\n"));
    }
}
