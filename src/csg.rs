//! Minimal constructive kernel for the body build: closed planar sketches of
//! lines and circular arcs in axis-aligned planes, prisms swept along the
//! plane normal, and solids formed by cutting prisms out of an extruded
//! footprint. A solid is held as the intersection of two generalized
//! cylinders (plan and elevation profiles), which is exactly the class of
//! shapes the cut sequence produces: every tool sweeps through the solid's
//! full extent along its own axis, so a boolean cut reduces to a 2D profile
//! subtraction.

use anyhow::{bail, ensure, Result};
use nalgebra::Point2;

use crate::Float;

const EPS: Float = 1e-9;
/// Tolerance for merging feature coordinates and validating cut coverage, in
/// model units (millimeters).
const GEOM_TOL: Float = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Axis-aligned sketch plane. Sketch coordinates (u, v) map to world axes in
/// fixed order: normal Z -> (x, y), normal Y -> (x, z), normal X -> (y, z).
#[derive(Debug, Clone, Copy)]
pub struct SketchPlane {
    pub normal: Axis,
    pub offset: Float,
}

/// Semantic surface identity attached to every sketch edge; meshed panels
/// generated by an edge inherit its tag, which is what makes per-surface
/// export order stable across runs.
pub type PatchTag = &'static str;

#[derive(Debug, Clone, Copy)]
pub enum Curve {
    Line {
        a: Point2<Float>,
        b: Point2<Float>,
    },
    /// Circular arc from `a` to `b` around `center`, taking the shorter
    /// sweep. Restricted to arcs that stay within one quadrant relative to
    /// the center, so every arc is monotone in both u and v.
    Arc {
        a: Point2<Float>,
        center: Point2<Float>,
        b: Point2<Float>,
    },
}

impl Curve {
    pub fn start(&self) -> Point2<Float> {
        match self {
            Curve::Line { a, .. } | Curve::Arc { a, .. } => *a,
        }
    }

    pub fn end(&self) -> Point2<Float> {
        match self {
            Curve::Line { b, .. } | Curve::Arc { b, .. } => *b,
        }
    }

    pub fn u_range(&self) -> (Float, Float) {
        let (ua, ub) = (self.start().x, self.end().x);
        (ua.min(ub), ua.max(ub))
    }

    pub fn v_range(&self) -> (Float, Float) {
        let (va, vb) = (self.start().y, self.end().y);
        (va.min(vb), va.max(vb))
    }

    fn is_u_active(&self) -> bool {
        let (u0, u1) = self.u_range();
        u1 - u0 > GEOM_TOL
    }

    fn validate(&self) -> Result<()> {
        match self {
            Curve::Line { a, b } => {
                ensure!((b - a).norm() > GEOM_TOL, "degenerate line segment");
            }
            Curve::Arc { a, center, b } => {
                let ra = (a - center).norm();
                let rb = (b - center).norm();
                ensure!(ra > GEOM_TOL, "degenerate arc radius");
                ensure!(
                    (ra - rb).abs() < 1e-6 * ra.max(1.0),
                    "arc endpoints are not equidistant from the center"
                );
                let (ta, sweep) = self.arc_angles();
                ensure!(
                    sweep.abs() > EPS && sweep.abs() <= std::f64::consts::FRAC_PI_2 + 1e-9,
                    "arc sweep must be within a quarter turn"
                );
                // No axis direction strictly inside the sweep, otherwise the
                // arc is not monotone and the slicing below breaks down.
                let (lo, hi) = (ta.min(ta + sweep), ta.max(ta + sweep));
                for k in -3i32..=3 {
                    let axis = k as Float * std::f64::consts::FRAC_PI_2;
                    ensure!(
                        !(axis > lo + 1e-9 && axis < hi - 1e-9),
                        "arc crosses an axis extreme and is not monotone"
                    );
                }
            }
        }
        Ok(())
    }

    /// Start angle and signed sweep (shorter direction) for an arc.
    fn arc_angles(&self) -> (Float, Float) {
        let Curve::Arc { a, center, b } = self else {
            unreachable!("arc_angles on a line");
        };
        let ta = (a.y - center.y).atan2(a.x - center.x);
        let tb = (b.y - center.y).atan2(b.x - center.x);
        let mut sweep = tb - ta;
        while sweep > std::f64::consts::PI {
            sweep -= 2.0 * std::f64::consts::PI;
        }
        while sweep < -std::f64::consts::PI {
            sweep += 2.0 * std::f64::consts::PI;
        }
        (ta, sweep)
    }

    /// Height of the curve above the u axis at `u`; callers keep `u` inside
    /// the curve's u range.
    pub fn v_at(&self, u: Float) -> Float {
        match self {
            Curve::Line { a, b } => {
                let du = b.x - a.x;
                if du.abs() < EPS {
                    return a.y;
                }
                a.y + (u - a.x) * (b.y - a.y) / du
            }
            Curve::Arc { a, center, b: _ } => {
                let r = (a - center).norm();
                let d = (r * r - (u - center.x) * (u - center.x)).max(0.0).sqrt();
                let (ta, sweep) = self.arc_angles();
                let side = (ta + 0.5 * sweep).sin();
                if side >= 0.0 {
                    center.y + d
                } else {
                    center.y - d
                }
            }
        }
    }

    /// dv/du at `u`, used to orient meshed panels; saturates near vertical
    /// tangents.
    pub fn slope(&self, u: Float) -> Float {
        match self {
            Curve::Line { a, b } => {
                let du = b.x - a.x;
                if du.abs() < EPS {
                    return 0.0;
                }
                (b.y - a.y) / du
            }
            Curve::Arc { a, center, .. } => {
                let r = (a - center).norm();
                let v = self.v_at(u);
                let dv = v - center.y;
                if dv.abs() < 1e-12 * r.max(1.0) {
                    // Vertical tangent; the limit sign depends on which
                    // branch of the circle the arc sits on.
                    let (ta, sweep) = self.arc_angles();
                    let side = (ta + 0.5 * sweep).sin();
                    return if (u - center.x) * side >= 0.0 {
                        -1e12
                    } else {
                        1e12
                    };
                }
                -(u - center.x) / dv
            }
        }
    }
}

/// Closed loop of tagged edges in one axis-aligned plane, built in the order
/// the construction sequence draws them.
#[derive(Debug, Clone)]
pub struct Sketch {
    pub plane: SketchPlane,
    start: Point2<Float>,
    cursor: Point2<Float>,
    edges: Vec<(Curve, PatchTag)>,
    closed: bool,
}

impl Sketch {
    pub fn new(plane: SketchPlane, start: Point2<Float>) -> Self {
        Self {
            plane,
            start,
            cursor: start,
            edges: Vec::new(),
            closed: false,
        }
    }

    /// Axis-aligned rectangle between two opposite corners. The lower- and
    /// upper-v edges carry the given tags; the vertical edges never generate
    /// surface panels and stay untagged.
    pub fn rectangle(
        plane: SketchPlane,
        min: Point2<Float>,
        max: Point2<Float>,
        lower_tag: PatchTag,
        upper_tag: PatchTag,
    ) -> Result<Self> {
        let mut sketch = Sketch::new(plane, min);
        sketch.line_to(Point2::new(max.x, min.y), lower_tag);
        sketch.line_to(max, "");
        sketch.line_to(Point2::new(min.x, max.y), upper_tag);
        sketch.line_to(min, "");
        sketch.close()?;
        Ok(sketch)
    }

    pub fn line_to(&mut self, p: Point2<Float>, tag: PatchTag) -> &mut Self {
        self.edges.push((Curve::Line { a: self.cursor, b: p }, tag));
        self.cursor = p;
        self
    }

    pub fn arc_to(&mut self, center: Point2<Float>, p: Point2<Float>, tag: PatchTag) -> &mut Self {
        self.edges.push((
            Curve::Arc {
                a: self.cursor,
                center,
                b: p,
            },
            tag,
        ));
        self.cursor = p;
        self
    }

    pub fn close(&mut self) -> Result<()> {
        ensure!(
            (self.cursor - self.start).norm() < GEOM_TOL,
            "sketch loop does not close"
        );
        ensure!(self.edges.len() >= 3, "sketch needs at least three edges");
        for (curve, _) in &self.edges {
            curve.validate()?;
        }
        self.closed = true;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn u_range(&self) -> (Float, Float) {
        let mut lo = Float::INFINITY;
        let mut hi = Float::NEG_INFINITY;
        for (curve, _) in &self.edges {
            let (u0, u1) = curve.u_range();
            lo = lo.min(u0);
            hi = hi.max(u1);
        }
        (lo, hi)
    }

    pub fn v_range(&self) -> (Float, Float) {
        let mut lo = Float::INFINITY;
        let mut hi = Float::NEG_INFINITY;
        for (curve, _) in &self.edges {
            let (v0, v1) = curve.v_range();
            lo = lo.min(v0);
            hi = hi.max(v1);
        }
        (lo, hi)
    }

    fn feature_us(&self) -> Vec<Float> {
        let mut us = Vec::with_capacity(2 * self.edges.len());
        for (curve, _) in &self.edges {
            us.push(curve.start().x);
            us.push(curve.end().x);
        }
        us
    }

    /// Sorted v crossings of the vertical line at a generic `u` (strictly
    /// between feature coordinates), with the generating edge index.
    fn crossings(&self, u: Float) -> Result<Vec<(Float, usize)>> {
        let mut vs = Vec::new();
        for (i, (curve, _)) in self.edges.iter().enumerate() {
            if !curve.is_u_active() {
                continue;
            }
            let (u0, u1) = curve.u_range();
            if u > u0 && u < u1 {
                vs.push((curve.v_at(u), i));
            }
        }
        vs.sort_by(|a, b| a.0.total_cmp(&b.0));
        ensure!(
            vs.len() % 2 == 0,
            "open or self-intersecting sketch: odd crossing count at u = {u}"
        );
        Ok(vs)
    }

    fn boundary(&self, edge: usize) -> Boundary {
        let (curve, tag) = self.edges[edge];
        Boundary { curve, tag }
    }
}

/// One side of a cross-section interval: the curve it lives on plus its
/// surface tag.
#[derive(Debug, Clone, Copy)]
pub struct Boundary {
    pub curve: Curve,
    pub tag: PatchTag,
}

impl Boundary {
    pub fn v_at(&self, u: Float) -> Float {
        self.curve.v_at(u)
    }

    pub fn slope(&self, u: Float) -> Float {
        self.curve.slope(u)
    }
}

/// Maximal u interval over which the section keeps the same lower and upper
/// boundary curves.
#[derive(Debug, Clone)]
pub struct Span {
    pub u0: Float,
    pub u1: Float,
    pub lower: Boundary,
    pub upper: Boundary,
}

#[derive(Debug, Clone, Copy)]
struct Interval {
    lo: (Float, Boundary),
    hi: (Float, Boundary),
}

fn subtract(intervals: Vec<Interval>, tool: &Interval) -> Vec<Interval> {
    let mut out = Vec::with_capacity(intervals.len() + 1);
    for iv in intervals {
        if tool.hi.0 <= iv.lo.0 + EPS || tool.lo.0 >= iv.hi.0 - EPS {
            out.push(iv);
            continue;
        }
        if tool.lo.0 > iv.lo.0 + EPS {
            // The tool's lower boundary becomes the new upper boundary.
            out.push(Interval {
                lo: iv.lo,
                hi: tool.lo,
            });
        }
        if tool.hi.0 < iv.hi.0 - EPS {
            out.push(Interval {
                lo: tool.hi,
                hi: iv.hi,
            });
        }
    }
    out
}

/// A base profile minus any number of tool profiles, all in the same plane.
#[derive(Debug, Clone)]
pub struct Region {
    pub base: Sketch,
    pub tools: Vec<Sketch>,
}

impl Region {
    pub fn new(base: Sketch) -> Self {
        Self {
            base,
            tools: Vec::new(),
        }
    }

    pub fn u_range(&self) -> (Float, Float) {
        self.base.u_range()
    }

    fn pairs(sketch: &Sketch, u: Float) -> Result<Vec<Interval>> {
        let crossings = sketch.crossings(u)?;
        Ok(crossings
            .chunks_exact(2)
            .map(|pair| Interval {
                lo: (pair[0].0, sketch.boundary(pair[0].1)),
                hi: (pair[1].0, sketch.boundary(pair[1].1)),
            })
            .collect())
    }

    /// Cross-section spans over the base profile's u range. Each span must
    /// slice to at most one interval; the construction sequence never makes
    /// shapes whose sections split.
    pub fn spans(&self) -> Result<Vec<Span>> {
        let (ub0, ub1) = self.base.u_range();
        let mut us: Vec<Float> = self
            .base
            .feature_us()
            .into_iter()
            .chain(self.tools.iter().flat_map(|t| t.feature_us()))
            .filter(|&u| u > ub0 - GEOM_TOL && u < ub1 + GEOM_TOL)
            .collect();
        us.push(ub0);
        us.push(ub1);
        us.sort_by(Float::total_cmp);
        us.dedup_by(|a, b| (*a - *b).abs() < GEOM_TOL);

        let mut spans = Vec::new();
        for pair in us.windows(2) {
            let (u0, u1) = (pair[0], pair[1]);
            if u1 - u0 < GEOM_TOL {
                continue;
            }
            let um = 0.5 * (u0 + u1);
            let mut intervals = Self::pairs(&self.base, um)?;
            for tool in &self.tools {
                for t in Self::pairs(tool, um)? {
                    intervals = subtract(intervals, &t);
                }
            }
            match intervals.len() {
                0 => {}
                1 => spans.push(Span {
                    u0,
                    u1,
                    lower: intervals[0].lo.1,
                    upper: intervals[0].hi.1,
                }),
                n => bail!("cross-section splits into {n} intervals at u = {um}"),
            }
        }
        Ok(spans)
    }
}

/// A closed sketch swept along its plane normal.
#[derive(Debug, Clone)]
pub struct Prism {
    pub profile: Sketch,
    pub length: Float,
}

impl Prism {
    pub fn new(profile: Sketch, length: Float) -> Self {
        Self { profile, length }
    }

    fn sweep_range(&self) -> (Float, Float) {
        let w0 = self.profile.plane.offset;
        let w1 = w0 + self.length;
        (w0.min(w1), w0.max(w1))
    }
}

/// Solid body as the intersection of a plan cylinder (xy profile swept along
/// z) and an elevation cylinder (xz profile swept along y).
#[derive(Debug, Clone)]
pub struct Solid {
    pub plan: Region,
    pub elevation: Region,
}

impl Solid {
    /// Extrude a z-normal footprint along z. The synthesized elevation
    /// profile is the footprint's x extent times the sweep range; its lower
    /// and upper edges become the bottom and top surfaces.
    pub fn extrude(
        footprint: Sketch,
        dz: Float,
        bottom_tag: PatchTag,
        top_tag: PatchTag,
    ) -> Result<Self> {
        ensure!(footprint.is_closed(), "footprint sketch is not closed");
        ensure!(
            footprint.plane.normal == Axis::Z,
            "extrusion footprint must lie in a z-normal plane"
        );
        ensure!(dz.abs() > GEOM_TOL, "zero-height extrusion");
        let z0 = footprint.plane.offset;
        let (z_lo, z_hi) = ((z0).min(z0 + dz), (z0).max(z0 + dz));
        let (x_lo, x_hi) = footprint.u_range();
        let elevation = Sketch::rectangle(
            SketchPlane {
                normal: Axis::Y,
                offset: 0.0,
            },
            Point2::new(x_lo, z_lo),
            Point2::new(x_hi, z_hi),
            bottom_tag,
            top_tag,
        )?;
        Ok(Self {
            plan: Region::new(footprint),
            elevation: Region::new(elevation),
        })
    }

    pub fn y_extent(&self) -> (Float, Float) {
        self.plan.base.v_range()
    }

    pub fn z_extent(&self) -> (Float, Float) {
        self.elevation.base.v_range()
    }

    /// Subtract a prism. The tool must sweep through the solid's full extent
    /// along its own axis, which turns the cut into a 2D profile
    /// subtraction on the orthogonal face.
    pub fn cut(&mut self, tool: Prism) -> Result<()> {
        ensure!(tool.profile.is_closed(), "cut tool sketch is not closed");
        let (w0, w1) = tool.sweep_range();
        match tool.profile.plane.normal {
            Axis::Z => {
                let (z0, z1) = self.z_extent();
                ensure!(
                    w0 <= z0 + GEOM_TOL && w1 >= z1 - GEOM_TOL,
                    "z-swept cut tool does not cover the solid (tool {w0}..{w1}, solid {z0}..{z1})"
                );
                self.plan.tools.push(tool.profile);
            }
            Axis::Y => {
                let (y0, y1) = self.y_extent();
                ensure!(
                    w0 <= y0 + GEOM_TOL && w1 >= y1 - GEOM_TOL,
                    "y-swept cut tool does not cover the solid (tool {w0}..{w1}, solid {y0}..{y1})"
                );
                self.elevation.tools.push(tool.profile);
            }
            Axis::X => bail!("cuts swept along x are not supported"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn xy_plane(z: Float) -> SketchPlane {
        SketchPlane {
            normal: Axis::Z,
            offset: z,
        }
    }

    fn xz_plane(y: Float) -> SketchPlane {
        SketchPlane {
            normal: Axis::Y,
            offset: y,
        }
    }

    #[test]
    fn quarter_arc_evaluates_on_the_right_branch() {
        // Upper-right quadrant, from (1, 0) up to (0, 1).
        let arc = Curve::Arc {
            a: Point2::new(1.0, 0.0),
            center: Point2::new(0.0, 0.0),
            b: Point2::new(0.0, 1.0),
        };
        arc.validate().unwrap();
        assert_relative_eq!(arc.v_at(0.5), 0.75f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(arc.v_at(1.0), 0.0, epsilon = 1e-9);
        assert!(arc.slope(0.5) < 0.0);
    }

    #[test]
    fn half_arc_is_rejected() {
        let arc = Curve::Arc {
            a: Point2::new(1.0, 0.0),
            center: Point2::new(0.0, 0.0),
            b: Point2::new(-1.0, 0.0),
        };
        assert!(arc.validate().is_err());
    }

    #[test]
    fn rectangle_region_has_one_span() {
        let sketch = Sketch::rectangle(
            xy_plane(0.0),
            Point2::new(-4.0, -1.0),
            Point2::new(0.0, 1.0),
            "low",
            "high",
        )
        .unwrap();
        let region = Region::new(sketch);
        let spans = region.spans().unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.lower.tag, "low");
        assert_eq!(span.upper.tag, "high");
        assert_relative_eq!(span.lower.v_at(-2.0), -1.0);
        assert_relative_eq!(span.upper.v_at(-2.0), 1.0);
    }

    #[test]
    fn wedge_cut_replaces_the_upper_boundary() {
        let footprint = Sketch::rectangle(
            xy_plane(0.0),
            Point2::new(-10.0, -1.0),
            Point2::new(0.0, 1.0),
            "side_lo",
            "side_hi",
        )
        .unwrap();
        let mut solid = Solid::extrude(footprint, 4.0, "bottom", "top").unwrap();

        // Wedge at the rear: top edge dropping from z=4 at x=-3 to z=2 at x=0.
        let mut wedge = Sketch::new(xz_plane(1.0), Point2::new(0.0, 4.0));
        wedge.line_to(Point2::new(0.0, 2.0), "");
        wedge.line_to(Point2::new(-3.0, 4.0), "slant");
        wedge.line_to(Point2::new(0.0, 4.0), "");
        wedge.close().unwrap();
        solid.cut(Prism::new(wedge, -2.0)).unwrap();

        let spans = solid.elevation.spans().unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].upper.tag, "top");
        assert_eq!(spans[1].upper.tag, "slant");
        assert_relative_eq!(spans[1].upper.v_at(-1.5), 3.0, epsilon = 1e-9);
        assert_relative_eq!(spans[1].upper.v_at(0.0), 2.0, epsilon = 1e-9);
        assert_relative_eq!(spans[1].lower.v_at(-1.5), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn two_piece_tool_cuts_both_sides() {
        // Rounded-nose cutter: removes the two front corners of a rectangle
        // in one tool, leaving arcs on both sides.
        let footprint = Sketch::rectangle(
            xy_plane(0.0),
            Point2::new(-10.0, -2.0),
            Point2::new(0.0, 2.0),
            "side_lo",
            "side_hi",
        )
        .unwrap();
        let mut solid = Solid::extrude(footprint, 1.0, "bottom", "top").unwrap();

        let r = 1.0;
        let mut cutter = Sketch::new(xy_plane(1.0), Point2::new(-9.0, -2.0));
        cutter.arc_to(Point2::new(-9.0, -1.0), Point2::new(-10.0, -1.0), "arc_lo");
        cutter.line_to(Point2::new(-10.0, 1.0), "");
        cutter.arc_to(Point2::new(-9.0, 1.0), Point2::new(-9.0, 2.0), "arc_hi");
        cutter.line_to(Point2::new(-11.0, 2.0), "");
        cutter.line_to(Point2::new(-11.0, -2.0), "");
        cutter.line_to(Point2::new(-9.0, -2.0), "");
        cutter.close().unwrap();
        solid.cut(Prism::new(cutter, -1.0)).unwrap();

        let spans = solid.plan.spans().unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].lower.tag, "arc_lo");
        assert_eq!(spans[0].upper.tag, "arc_hi");
        assert_eq!(spans[1].lower.tag, "side_lo");
        // At the very nose the arcs meet their centers' ordinate.
        assert_relative_eq!(spans[0].lower.v_at(-10.0 + r), -2.0, epsilon = 1e-9);
        assert_relative_eq!(spans[0].lower.v_at(-10.0), -1.0, epsilon = 1e-9);
        assert_relative_eq!(spans[0].upper.v_at(-10.0), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn short_cut_tool_is_rejected() {
        let footprint = Sketch::rectangle(
            xy_plane(0.0),
            Point2::new(-10.0, -1.0),
            Point2::new(0.0, 1.0),
            "lo",
            "hi",
        )
        .unwrap();
        let mut solid = Solid::extrude(footprint, 4.0, "bottom", "top").unwrap();
        let mut wedge = Sketch::new(xz_plane(0.0), Point2::new(0.0, 4.0));
        wedge.line_to(Point2::new(0.0, 2.0), "");
        wedge.line_to(Point2::new(-3.0, 4.0), "slant");
        wedge.line_to(Point2::new(0.0, 4.0), "");
        wedge.close().unwrap();
        // Sweeps only half of the solid's width.
        assert!(solid.cut(Prism::new(wedge, -1.0)).is_err());
    }
}
