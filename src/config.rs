use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dims::BodyDims;
use crate::Float;

/// Whether the body is modelled as one half against a symmetry plane or in
/// full width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symmetry {
    #[default]
    Half,
    Full,
}

/// One generation case: slant angle, mesh fineness per region, domain extent
/// multipliers and the output root. All lengths in millimeters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseConfig {
    pub slant_angle_deg: Float,
    /// Suspend the body in the flow domain instead of resting it on a ground
    /// plane; legs collapse and the domain extends below the body.
    #[serde(default)]
    pub is_freestream: bool,
    #[serde(default)]
    pub symmetry: Symmetry,
    #[serde(default = "default_body_mesh_size")]
    pub body_mesh_size: Float,
    #[serde(default = "default_legs_mesh_size")]
    pub legs_mesh_size: Float,
    /// Target edge length on the domain walls; coarsest possible when unset.
    #[serde(default)]
    pub domain_mesh_size: Option<Float>,
    #[serde(default = "default_multiplier_width")]
    pub domain_multiplier_width: Float,
    #[serde(default = "default_multiplier_height")]
    pub domain_multiplier_height: Float,
    #[serde(default = "default_multiplier_after_body")]
    pub domain_multiplier_after_body: Float,
    #[serde(default = "default_multiplier_before_body")]
    pub domain_multiplier_before_body: Float,
    /// Root directory for all case output; the binary resolves this from
    /// `AHMED_SLANT_PATH`, the library never reads the environment.
    pub save_path_base: PathBuf,
}

fn default_body_mesh_size() -> Float {
    2.0
}

fn default_legs_mesh_size() -> Float {
    2.0
}

fn default_multiplier_width() -> Float {
    6.0
}

fn default_multiplier_height() -> Float {
    3.0
}

fn default_multiplier_after_body() -> Float {
    10.0
}

fn default_multiplier_before_body() -> Float {
    3.0
}

impl CaseConfig {
    pub fn new(slant_angle_deg: Float, save_path_base: impl Into<PathBuf>) -> Self {
        Self {
            slant_angle_deg,
            is_freestream: false,
            symmetry: Symmetry::default(),
            body_mesh_size: default_body_mesh_size(),
            legs_mesh_size: default_legs_mesh_size(),
            domain_mesh_size: None,
            domain_multiplier_width: default_multiplier_width(),
            domain_multiplier_height: default_multiplier_height(),
            domain_multiplier_after_body: default_multiplier_after_body(),
            domain_multiplier_before_body: default_multiplier_before_body(),
            save_path_base: save_path_base.into(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading case config {}", path.display()))?;
        let config: CaseConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing case config {}", path.display()))?;
        Ok(config)
    }

    pub fn case_paths(&self) -> CasePaths {
        CasePaths::new(&self.save_path_base, self.slant_angle_deg)
    }

    /// Flow-domain corner coordinates derived from the body dimensions and
    /// the extent multipliers.
    pub fn domain_extents(&self, dims: &BodyDims) -> DomainExtents {
        let inlet_x = -dims.l_overall * (1.0 + self.domain_multiplier_before_body);
        let outlet_x = dims.l_overall * self.domain_multiplier_after_body;
        let top_z = dims.h_overall * self.domain_multiplier_height;
        let bottom_z = if self.is_freestream {
            -dims.h_overall * self.domain_multiplier_height
        } else {
            0.0
        };
        let side_y = match self.symmetry {
            Symmetry::Half => -0.5 * dims.w_overall * self.domain_multiplier_width,
            Symmetry::Full => dims.w_overall * self.domain_multiplier_width,
        };
        DomainExtents {
            inlet_x,
            outlet_x,
            bottom_z,
            top_z,
            side_y,
            symmetry_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainExtents {
    pub inlet_x: Float,
    pub outlet_x: Float,
    pub bottom_z: Float,
    pub top_z: Float,
    /// Half mode: the single (negative-y) side wall. Full mode: the positive
    /// wall, mirrored for the negative one.
    pub side_y: Float,
    pub symmetry_y: Float,
}

/// Per-case directory layout: `<base>/slant_angle_<angle:2dp>/{geometry,residuals}`.
#[derive(Debug, Clone)]
pub struct CasePaths {
    pub case_dir: PathBuf,
    pub geometry_dir: PathBuf,
    pub residuals_dir: PathBuf,
}

impl CasePaths {
    pub fn new(base: &Path, slant_angle_deg: Float) -> Self {
        let case_dir = base.join(format!("slant_angle_{slant_angle_deg:.2}"));
        let geometry_dir = case_dir.join("geometry");
        let residuals_dir = case_dir.join("residuals");
        Self {
            case_dir,
            geometry_dir,
            residuals_dir,
        }
    }

    /// Idempotent; must run before any geometry export.
    pub fn create_geometry_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.geometry_dir)
            .with_context(|| format!("creating {}", self.geometry_dir.display()))
    }

    pub fn create_residuals_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.residuals_dir)
            .with_context(|| format!("creating {}", self.residuals_dir.display()))
    }
}
