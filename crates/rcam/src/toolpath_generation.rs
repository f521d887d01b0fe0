use crate::error::CancelReason;
use crate::geometry::Point3;
use crate::job::{Job, Toolpath};
use crate::operation::OperationEnv;
use crate::source::SourceProvider;
use crate::tool_library::ToolResolver;
use crate::types::ComputeStatus;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct ComputeOptions {
    /// Skip the remaining operations after the first cancelled one.
    pub stop_on_cancelled: bool,
    /// Checked between operations; once set, the remaining operations are
    /// reported as interrupted.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl ComputeOptions {
    fn interrupted(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationReport {
    pub operation_index: usize,
    pub name: String,
    pub status: ComputeStatus,
    pub point_count: usize,
    pub diagnostics: Vec<String>,
}

/// Compute every operation of the job in order and store the merged,
/// grid-replicated toolpath in [`Job::computed`].
///
/// Each operation starts where the previous finished one left the tool. A
/// cancelled operation is reported and skipped; the job is finished when at
/// least one operation finished. Unexpected failures abort the job.
pub fn compute_job(
    job: &mut Job,
    sources: &dyn SourceProvider,
    tools: &dyn ToolResolver,
    options: &ComputeOptions,
) -> Result<Vec<OperationReport>> {
    info!("Computing job {} ({} operation(s))", job.name, job.operations.len());
    job.computed = None;

    let env = OperationEnv {
        sources,
        tools,
        machine: &job.machine,
        stock: job.stock_bounds(sources),
    };
    let mut last_position = job
        .operations
        .first()
        .map_or(Point3::ZERO, |op| Point3::new(0.0, 0.0, op.movement.rapid_height));

    let mut reports = Vec::new();
    let mut points = Vec::new();
    for (operation_index, operation) in job.operations.iter().enumerate() {
        if options.interrupted() {
            warn!("Job {} interrupted before operation {}", job.name, operation.name);
            reports.push(OperationReport {
                operation_index,
                name: operation.name.clone(),
                status: ComputeStatus::Cancelled(CancelReason::Interrupted),
                point_count: 0,
                diagnostics: Vec::new(),
            });
            continue;
        }

        let result = operation
            .execute_compute(env, last_position)
            .with_context(|| format!("operation {operation_index} failed"))?;

        match &result.status {
            ComputeStatus::Finished => {
                if let Some(end) = result.last_position() {
                    last_position = end;
                }
                info!("Operation {}: {} point(s)", operation.name, result.points.len());
            }
            ComputeStatus::Cancelled(reason) => {
                warn!("Operation {} cancelled: {}", operation.name, reason);
            }
        }

        let cancelled = !result.status.is_finished();
        reports.push(OperationReport {
            operation_index,
            name: operation.name.clone(),
            status: result.status,
            point_count: result.points.len(),
            diagnostics: result.diagnostics,
        });
        points.extend(result.points);

        if cancelled && options.stop_on_cancelled {
            break;
        }
    }

    let status = ComputeStatus::reduce(reports.iter().map(|r| &r.status));
    let points = job.replicate(&points);
    info!("Job {} computed: {} point(s)", job.name, points.len());
    job.computed = Some(Toolpath { status, points });
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Mesh;
    use crate::operation::Operation;
    use crate::source::SourceRegistry;
    use crate::strategy::{Strategy, StrategyKind};
    use crate::tool_library::ToolLibrary;
    use crate::types::{Cutter, CutterKind, DepthEnd};

    fn plate(sources: &mut SourceRegistry) -> crate::geometry::SourceId {
        sources.add_mesh(Mesh::from_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(20.0, 0.0, 0.0),
                Point3::new(20.0, 20.0, 0.0),
                Point3::new(0.0, 20.0, 0.0),
            ],
            vec![vec![0, 1, 2, 3]],
        ))
    }

    #[test]
    fn test_cancelled_operation_keeps_siblings() {
        let mut sources = SourceRegistry::new();
        let id = plate(&mut sources);
        let mut tools = ToolLibrary::new();
        let tool = tools.add_tool(Cutter::new(CutterKind::Cylinder, 3.0));

        let mut job = Job::new("mixed");
        job.add_operation(Operation::new("No tool", Strategy::default(), -1, vec![id]));
        let mut profile = Operation::new("Profile", Strategy::default(), tool, vec![id]);
        profile.work_area.depth_end = DepthEnd::Custom(-2.0);
        job.add_operation(profile);

        let reports = compute_job(&mut job, &sources, &tools, &ComputeOptions::default()).expect("compute job");
        assert_eq!(reports.len(), 2);
        assert!(!reports[0].status.is_finished());
        assert!(reports[1].status.is_finished());
        let computed = job.computed.as_ref().expect("job computed");
        assert!(computed.status.is_finished());
        assert_eq!(computed.points.len(), reports[1].point_count);
    }

    #[test]
    fn test_stop_on_cancelled() {
        let mut sources = SourceRegistry::new();
        let id = plate(&mut sources);
        let mut tools = ToolLibrary::new();
        let tool = tools.add_tool(Cutter::default());

        let mut job = Job::new("stop");
        job.add_operation(Operation::new("Empty", Strategy::default(), tool, vec![]));
        job.add_operation(Operation::new("Profile", Strategy::default(), tool, vec![id]));
        let options = ComputeOptions {
            stop_on_cancelled: true,
            ..ComputeOptions::default()
        };

        let reports = compute_job(&mut job, &sources, &tools, &options).expect("compute job");
        assert_eq!(reports.len(), 1);
        assert_eq!(
            job.computed.map(|t| t.status),
            Some(ComputeStatus::Cancelled(CancelReason::EmptySource))
        );
    }

    #[test]
    fn test_cancel_flag_interrupts_remaining_operations() {
        let mut sources = SourceRegistry::new();
        let id = plate(&mut sources);
        let mut tools = ToolLibrary::new();
        let tool = tools.add_tool(Cutter::default());

        let mut job = Job::new("interrupted");
        job.add_operation(Operation::new(
            "Pocket",
            Strategy::default_for(StrategyKind::Pocket),
            tool,
            vec![id],
        ));
        let options = ComputeOptions {
            cancel: Some(Arc::new(AtomicBool::new(true))),
            ..ComputeOptions::default()
        };

        let reports = compute_job(&mut job, &sources, &tools, &options).expect("compute job");
        assert_eq!(
            reports[0].status,
            ComputeStatus::Cancelled(CancelReason::Interrupted)
        );
        assert!(job.computed.expect("stored").points.is_empty());
    }
}
