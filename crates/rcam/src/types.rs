use crate::error::CancelReason;
use crate::geometry::{approx_eq, Point3};
use serde::{Deserialize, Serialize};

/// Defines the geometric type of the cutter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CutterKind {
    /// A flat-bottomed cylindrical end mill.
    Cylinder,
    /// A cylindrical cutter with a hemispherical tip.
    Ball,
    /// A flat end mill with rounded corners (`corner_radius`).
    Bull,
    /// A pointed cone.
    Cone,
    /// A flat tip of `lower_diameter` widening into a cone.
    CylinderCone,
    /// A ball tip of `lower_diameter` widening into a cone.
    BallCone,
    /// A bull tip of `lower_diameter` widening into a cone.
    BullCone,
    /// An engraving V-bit.
    VCarve,
    Drill,
    Laser,
    Plasma,
}

impl CutterKind {
    pub fn is_tapered(self) -> bool {
        matches!(
            self,
            CutterKind::Cone
                | CutterKind::CylinderCone
                | CutterKind::BallCone
                | CutterKind::BullCone
                | CutterKind::VCarve
        )
    }
}

/// Shape descriptor of a cutter, resolved from a tool id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cutter {
    pub name: String,
    pub kind: CutterKind,
    /// Full cutting diameter.
    pub diameter: f64,
    /// Tip diameter for the combined cone shapes.
    #[serde(default)]
    pub lower_diameter: f64,
    /// Shaft/flute length.
    #[serde(default)]
    pub length: f64,
    /// Included angle of the cone in degrees.
    #[serde(default)]
    pub angle_degrees: f64,
    /// Fillet radius of bull-nosed cutters.
    #[serde(default)]
    pub corner_radius: f64,
}

impl Default for Cutter {
    fn default() -> Self {
        Self {
            name: "Cylinder 3mm".to_string(),
            kind: CutterKind::Cylinder,
            diameter: 3.0,
            lower_diameter: 0.0,
            length: 10.0,
            angle_degrees: 60.0,
            corner_radius: 0.0,
        }
    }
}

impl Cutter {
    pub fn new(kind: CutterKind, diameter: f64) -> Self {
        Self {
            name: format!("{kind:?} {diameter}mm"),
            kind,
            diameter,
            ..Self::default()
        }
    }

    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }

    fn half_angle_tan(&self) -> f64 {
        (self.angle_degrees.to_radians() / 2.0).tan()
    }

    /// Effective cutting radius `depth` above the tip.
    pub fn radius_at(&self, depth: f64) -> f64 {
        let r = self.radius();
        let depth = depth.max(0.0);
        let tip = (self.lower_diameter / 2.0).min(r);
        let rounded = |corner: f64, flat: f64, h: f64| {
            if h < corner {
                flat + (corner * corner - (corner - h).powi(2)).sqrt()
            } else {
                flat + corner
            }
        };
        let radius = match self.kind {
            CutterKind::Cylinder | CutterKind::Drill | CutterKind::Laser | CutterKind::Plasma => r,
            CutterKind::Ball => rounded(r, 0.0, depth),
            CutterKind::Bull => {
                let corner = self.corner_radius.clamp(0.0, r);
                rounded(corner, r - corner, depth)
            }
            CutterKind::Cone | CutterKind::VCarve => depth * self.half_angle_tan(),
            CutterKind::CylinderCone => tip + depth * self.half_angle_tan(),
            CutterKind::BallCone => {
                if depth < tip {
                    rounded(tip, 0.0, depth)
                } else {
                    tip + (depth - tip) * self.half_angle_tan()
                }
            }
            CutterKind::BullCone => {
                let corner = self.corner_radius.clamp(0.0, tip);
                if depth < corner {
                    rounded(corner, tip - corner, depth)
                } else {
                    tip + (depth - corner) * self.half_angle_tan()
                }
            }
        };
        radius.min(r)
    }

    /// Height above the tip at which the cutter reaches `radius`.
    ///
    /// `None` for cutters whose radius does not grow with depth.
    pub fn depth_at_radius(&self, radius: f64) -> Option<f64> {
        if self.kind == CutterKind::Ball {
            let r = self.radius();
            let radius = radius.clamp(0.0, r);
            return Some(r - (r * r - radius * radius).sqrt());
        }
        if !self.kind.is_tapered() {
            return None;
        }
        let tan = self.half_angle_tan();
        if tan <= 0.0 {
            return None;
        }
        let radius = radius.clamp(0.0, self.radius());
        let tip = (self.lower_diameter / 2.0).min(self.radius());
        let depth = match self.kind {
            CutterKind::Cone | CutterKind::VCarve => radius / tan,
            CutterKind::CylinderCone => (radius - tip).max(0.0) / tan,
            CutterKind::BallCone => {
                if radius < tip {
                    tip - (tip * tip - radius * radius).sqrt()
                } else {
                    tip + (radius - tip) / tan
                }
            }
            CutterKind::BullCone => {
                let corner = self.corner_radius.clamp(0.0, tip);
                corner + (radius - tip).max(0.0) / tan
            }
            _ => return None,
        };
        Some(depth)
    }
}

/// Output length unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    /// Cutting feed rate in mm/min.
    pub rate: f64,
    /// Fraction of `rate` used for downward plunges.
    pub plunge_scale: f64,
}

impl Default for Feed {
    fn default() -> Self {
        Self {
            rate: 1000.0,
            plunge_scale: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MovementKind {
    #[default]
    Climb,
    Conventional,
    /// Alternate direction between passes, winding untouched.
    Meander,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub kind: MovementKind,
    /// Z above which every move is safe to perform at rapid speed.
    pub rapid_height: f64,
}

impl Default for Movement {
    fn default() -> Self {
        Self {
            kind: MovementKind::Climb,
            rapid_height: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpindleDirection {
    #[default]
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spindle {
    pub direction: SpindleDirection,
    pub rpm: u32,
}

impl Default for Spindle {
    fn default() -> Self {
        Self {
            direction: SpindleDirection::Clockwise,
            rpm: 12_000,
        }
    }
}

/// How the bottom of an operation is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DepthEnd {
    /// Fixed Z.
    Custom(f64),
    /// Bottom of the operation's source geometry.
    Source,
    /// Bottom of the job stock.
    Stock,
}

/// Which area the pattern strategies may cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Ambient {
    /// Only over the source footprint.
    Inside,
    /// Footprint grown by the cutter radius.
    Around,
    /// The whole source bounding rectangle.
    #[default]
    All,
}

/// Vertical machining policy of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkArea {
    /// Top bound; `None` starts at the source top, never above Z=0.
    #[serde(default)]
    pub depth_start: Option<f64>,
    pub depth_end: DepthEnd,
    /// Z step between layers, 0 for a single pass.
    pub layer_size: f64,
    #[serde(default)]
    pub ambient: Ambient,
}

impl Default for WorkArea {
    fn default() -> Self {
        Self {
            depth_start: None,
            depth_end: DepthEnd::Custom(-1.0),
            layer_size: 0.0,
            ambient: Ambient::All,
        }
    }
}

/// Feed and spindle limits of the target machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub feed_rate_min: f64,
    pub feed_rate_max: f64,
    pub spindle_rpm_min: u32,
    pub spindle_rpm_max: u32,
}

impl Default for Machine {
    fn default() -> Self {
        Self {
            feed_rate_min: 1.0,
            feed_rate_max: 2000.0,
            spindle_rpm_min: 500,
            spindle_rpm_max: 25_000,
        }
    }
}

/// Machine state attached to every computed point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    pub rapid_height: f64,
    pub feed_rate: f64,
    pub plunge_scale: f64,
    pub spindle_direction: SpindleDirection,
    pub spindle_rpm: u32,
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            rapid_height: Movement::default().rapid_height,
            feed_rate: Feed::default().rate,
            plunge_scale: Feed::default().plunge_scale,
            spindle_direction: SpindleDirection::Clockwise,
            spindle_rpm: Spindle::default().rpm,
        }
    }
}

/// One position of the final toolpath.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComputedPoint {
    pub position: Point3,
    pub state: MachineState,
    /// Seconds to wait once the position is reached.
    pub dwell: f64,
}

impl ComputedPoint {
    pub fn new(position: Point3, state: MachineState) -> Self {
        Self {
            position,
            state,
            dwell: 0.0,
        }
    }

    pub fn with_dwell(mut self, dwell: f64) -> Self {
        self.dwell = dwell;
        self
    }

    pub fn is_at_rapid_height(&self) -> bool {
        approx_eq(self.position.z, self.state.rapid_height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComputeStatus {
    Finished,
    Cancelled(CancelReason),
}

impl ComputeStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, ComputeStatus::Finished)
    }

    /// `Finished` when any status finished, otherwise the first cancellation.
    pub fn reduce<'a>(statuses: impl IntoIterator<Item = &'a ComputeStatus>) -> ComputeStatus {
        let mut first_cancel = None;
        for status in statuses {
            match status {
                ComputeStatus::Finished => return ComputeStatus::Finished,
                ComputeStatus::Cancelled(reason) => {
                    first_cancel.get_or_insert_with(|| reason.clone());
                }
            }
        }
        ComputeStatus::Cancelled(first_cancel.unwrap_or(CancelReason::EmptySource))
    }
}

/// Output of one strategy run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeResult {
    pub status: ComputeStatus,
    pub points: Vec<ComputedPoint>,
    /// Rejected candidates and other notes, also present on success.
    pub diagnostics: Vec<String>,
}

impl ComputeResult {
    pub fn finished(points: Vec<ComputedPoint>) -> Self {
        Self {
            status: ComputeStatus::Finished,
            points,
            diagnostics: Vec::new(),
        }
    }

    pub fn cancelled(reason: CancelReason) -> Self {
        Self {
            status: ComputeStatus::Cancelled(reason),
            points: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<String>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn last_position(&self) -> Option<Point3> {
        self.points.last().map(|p| p.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cylinder_radius_is_constant() {
        let cutter = Cutter::new(CutterKind::Cylinder, 6.0);
        assert_eq!(cutter.radius_at(0.0), 3.0);
        assert_eq!(cutter.radius_at(10.0), 3.0);
        assert_eq!(cutter.depth_at_radius(1.0), None);
    }

    #[test]
    fn test_ball_radius_grows_to_full_width() {
        let cutter = Cutter::new(CutterKind::Ball, 6.0);
        assert_eq!(cutter.radius_at(0.0), 0.0);
        assert!((cutter.radius_at(3.0) - 3.0).abs() < 1e-12);
        assert!((cutter.radius_at(1.0) - 5.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_vcarve_radius_and_inverse() {
        let cutter = Cutter {
            angle_degrees: 90.0,
            ..Cutter::new(CutterKind::VCarve, 10.0)
        };
        assert!((cutter.radius_at(2.0) - 2.0).abs() < 1e-12);
        assert!((cutter.radius_at(20.0) - 5.0).abs() < 1e-12, "clamped to diameter");
        let depth = cutter.depth_at_radius(2.0).expect("tapered");
        assert!((depth - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_bull_corner() {
        let cutter = Cutter {
            corner_radius: 1.0,
            ..Cutter::new(CutterKind::Bull, 6.0)
        };
        assert_eq!(cutter.radius_at(0.0), 2.0);
        assert_eq!(cutter.radius_at(1.5), 3.0);
        assert_eq!(cutter.depth_at_radius(2.5), None);
    }

    #[test]
    fn test_ball_depth_at_radius() {
        let cutter = Cutter::new(CutterKind::Ball, 6.0);
        let depth = cutter.depth_at_radius(5.0f64.sqrt()).expect("ball grows with depth");
        assert!((depth - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_status_reduction() {
        let cancelled = ComputeStatus::Cancelled(CancelReason::EmptySource);
        assert!(ComputeStatus::reduce([&cancelled, &ComputeStatus::Finished]).is_finished());
        assert_eq!(
            ComputeStatus::reduce([&cancelled, &cancelled]),
            cancelled,
            "all cancelled stays cancelled"
        );
    }

    #[test]
    fn test_work_area_round_trips_through_json() {
        let area = WorkArea {
            depth_start: Some(-0.5),
            depth_end: DepthEnd::Stock,
            layer_size: 0.25,
            ambient: Ambient::Around,
        };
        let json = serde_json::to_string(&area).expect("serialize");
        let back: WorkArea = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(area, back);
    }
}
