use serde::{Deserialize, Serialize};

use crate::Float;

/// Base lengths of the Ahmed reference body, in millimeters.
///
/// Defaults are the standard benchmark dimensions; only the slant angle and
/// the leg height are normally varied (legs collapse to zero height in
/// freestream cases).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyParams {
    pub w_overall: Float,
    pub l_overall: Float,
    pub l_middle: Float,
    pub dl_legs_front: Float,
    pub dl_legs_back: Float,
    pub dw_legs_outer: Float,
    pub r_front: Float,
    pub r_legs: Float,
    pub h_legs: Float,
    pub dh_body: Float,
    pub l_diag: Float,
    pub slant_angle_deg: Float,
}

impl Default for BodyParams {
    fn default() -> Self {
        Self {
            w_overall: 389.0,
            l_overall: 1044.0,
            l_middle: 640.0,
            dl_legs_front: 202.0,
            dl_legs_back: 372.0,
            dw_legs_outer: 31.0,
            r_front: 100.0,
            r_legs: 15.0,
            h_legs: 50.0,
            dh_body: 288.0,
            l_diag: 222.0,
            slant_angle_deg: 25.0,
        }
    }
}

/// Complete named dimension set: the base parameters plus every derived
/// quantity the generator reads. Derived values are fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyDims {
    pub w_overall: Float,
    pub l_overall: Float,
    pub l_middle: Float,
    pub dl_legs_front: Float,
    pub dl_legs_back: Float,
    pub dw_legs_outer: Float,
    pub r_front: Float,
    pub r_legs: Float,
    pub h_legs: Float,
    pub dh_body: Float,
    pub l_diag: Float,
    pub slant_angle_deg: Float,
    /// Leg height plus body height.
    pub h_overall: Float,
    pub slant_angle_rad: Float,
    /// Horizontal extent of the rear slant cut.
    pub dx_cut: Float,
    /// Vertical extent of the rear slant cut.
    pub dz_cut: Float,
    /// Top of the rear base face, where the slant meets it.
    pub p0_z: Float,
}

impl BodyDims {
    pub fn from_params(p: &BodyParams) -> Self {
        let h_overall = p.h_legs + p.dh_body;
        let slant_angle_rad = p.slant_angle_deg * std::f64::consts::PI / 180.0;
        let dx_cut = p.l_diag * slant_angle_rad.cos();
        let dz_cut = p.l_diag * slant_angle_rad.sin();
        Self {
            w_overall: p.w_overall,
            l_overall: p.l_overall,
            l_middle: p.l_middle,
            dl_legs_front: p.dl_legs_front,
            dl_legs_back: p.dl_legs_back,
            dw_legs_outer: p.dw_legs_outer,
            r_front: p.r_front,
            r_legs: p.r_legs,
            h_legs: p.h_legs,
            dh_body: p.dh_body,
            l_diag: p.l_diag,
            slant_angle_deg: p.slant_angle_deg,
            h_overall,
            slant_angle_rad,
            dx_cut,
            dz_cut,
            p0_z: h_overall - dz_cut,
        }
    }

    /// Standard body at the given slant angle.
    pub fn with_slant_angle(slant_angle_deg: Float) -> Self {
        Self::from_params(&BodyParams {
            slant_angle_deg,
            ..BodyParams::default()
        })
    }

    /// Freestream variant: legs collapse so the body underside sits at z = 0.
    pub fn with_slant_angle_freestream(slant_angle_deg: Float) -> Self {
        Self::from_params(&BodyParams {
            slant_angle_deg,
            h_legs: 0.0,
            ..BodyParams::default()
        })
    }
}
