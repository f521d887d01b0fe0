use crate::error::CancelReason;
use crate::geometry::mesh::meshes_bounds;
use crate::geometry::{OperationId, Point3, SourceId};
use crate::source::SourceProvider;
use crate::strategy::{Strategy, StrategyContext};
use crate::tool_library::ToolResolver;
use crate::types::{ComputeResult, DepthEnd, Feed, Machine, MachineState, Movement, Spindle, WorkArea};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One machining step of a job: what to cut, with which tool and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub id: OperationId,
    pub name: String,
    /// Tool reference handed to the [`ToolResolver`], -1 when unassigned.
    pub tool_id: i64,
    pub strategy: Strategy,
    pub source: Vec<SourceId>,
    #[serde(default)]
    pub work_area: WorkArea,
    #[serde(default)]
    pub feed: Feed,
    #[serde(default)]
    pub movement: Movement,
    #[serde(default)]
    pub spindle: Spindle,
}

impl Default for Operation {
    fn default() -> Self {
        Self {
            id: OperationId::new(),
            name: "Operation".to_string(),
            tool_id: -1,
            strategy: Strategy::default(),
            source: Vec::new(),
            work_area: WorkArea::default(),
            feed: Feed::default(),
            movement: Movement::default(),
            spindle: Spindle::default(),
        }
    }
}

/// What an operation needs from its job to compute.
#[derive(Clone, Copy)]
pub struct OperationEnv<'a> {
    pub sources: &'a dyn SourceProvider,
    pub tools: &'a dyn ToolResolver,
    pub machine: &'a Machine,
    /// Stock bounds of the job, when known.
    pub stock: Option<(Point3, Point3)>,
}

impl Operation {
    pub fn new(name: impl Into<String>, strategy: Strategy, tool_id: i64, source: Vec<SourceId>) -> Self {
        Self {
            name: name.into(),
            strategy,
            tool_id,
            source,
            ..Self::default()
        }
    }

    /// Machine state of every point of this operation, within the machine
    /// limits.
    pub fn zero(&self, machine: &Machine) -> MachineState {
        MachineState {
            rapid_height: self.movement.rapid_height,
            feed_rate: self
                .feed
                .rate
                .clamp(machine.feed_rate_min, machine.feed_rate_max.max(machine.feed_rate_min)),
            plunge_scale: self.feed.plunge_scale,
            spindle_direction: self.spindle.direction,
            spindle_rpm: self
                .spindle
                .rpm
                .clamp(machine.spindle_rpm_min, machine.spindle_rpm_max.max(machine.spindle_rpm_min)),
        }
    }

    /// Compute the toolpath of this operation, starting where the previous
    /// operation left the tool.
    ///
    /// Expected problems (no tool, no geometry, nothing between the depth
    /// bounds, no valid feature) come back as a cancelled result.
    pub fn execute_compute(&self, env: OperationEnv<'_>, last_position: Point3) -> Result<ComputeResult> {
        info!("Computing operation {} ({})", self.name, self.strategy.kind());

        let Some(cutter) = env.tools.resolve(self.tool_id) else {
            return Ok(ComputeResult::cancelled(CancelReason::UnresolvedTool {
                tool_id: self.tool_id,
            }));
        };
        if !self.strategy.accepts(cutter.kind) {
            return Ok(ComputeResult::cancelled(CancelReason::IncompatibleCutter {
                strategy: self.strategy.kind().to_string(),
                cutter: format!("{:?}", cutter.kind),
            }));
        }

        let sources = env.sources.evaluate(&self.source);
        if sources.is_empty() {
            return Ok(ComputeResult::cancelled(CancelReason::EmptySource));
        }
        let curves = env.sources.evaluate(self.strategy.curve_sources());
        let bounds = meshes_bounds(&sources);

        let depth_end = match self.work_area.depth_end {
            DepthEnd::Custom(z) => z,
            DepthEnd::Source => bounds.0.z,
            DepthEnd::Stock => env.stock.map_or(bounds.0.z, |(min, _)| min.z),
        };
        let top = self.work_area.depth_start.unwrap_or(bounds.1.z.min(0.0));
        if top < depth_end {
            return Ok(ComputeResult::cancelled(CancelReason::InfeasibleDepth { top, depth_end }));
        }
        debug!("Operation {}: top {:.5}, depth end {:.5}", self.name, top, depth_end);

        let ctx = StrategyContext {
            sources: &sources,
            curves: &curves,
            cutter: &cutter,
            zero: self.zero(env.machine),
            movement: self.movement.kind,
            spindle: self.spindle.direction,
            ambient: self.work_area.ambient,
            layer_size: self.work_area.layer_size,
            top,
            depth_end,
            bounds,
            stock: env.stock,
        };
        self.strategy
            .execute_compute(&ctx, last_position)
            .with_context(|| format!("{} strategy of operation {} failed", self.strategy.kind(), self.name))
    }
}
