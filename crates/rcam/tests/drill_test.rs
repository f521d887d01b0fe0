use kurbo::{Circle, Point};
use rcam::strategy::DrillParams;
use rcam::*;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn hole(sources: &mut SourceRegistry, x: f64, y: f64, diameter: f64) -> SourceId {
    sources.add_curve(Curve::Circle(Circle::new(Point::new(x, y), diameter / 2.0)))
}

fn drill_job(sources: &mut SourceRegistry, tools: &mut ToolLibrary) -> Job {
    let wide = hole(sources, 0.0, 0.0, 5.0);
    let narrow = hole(sources, 20.0, 0.0, 2.0);
    let tool = tools.add_tool(Cutter::new(CutterKind::Drill, 3.0));

    let mut operation = Operation::new(
        "Drill holes",
        Strategy::Drill(DrillParams { dwell: 1.0 }),
        tool,
        vec![wide, narrow],
    );
    operation.work_area.depth_end = DepthEnd::Custom(-10.0);
    operation.work_area.layer_size = 0.0;

    let mut job = Job::new("Drilling");
    job.add_operation(operation);
    job
}

#[test]
fn test_only_holes_wider_than_the_drill_are_cut() {
    init_logging();
    let mut sources = SourceRegistry::new();
    let mut tools = ToolLibrary::new();
    let mut job = drill_job(&mut sources, &mut tools);

    let reports = compute_job(&mut job, &sources, &tools, &ComputeOptions::default()).expect("compute job");
    assert_eq!(reports.len(), 1);
    assert!(reports[0].status.is_finished());
    assert_eq!(reports[0].diagnostics.len(), 1, "the 2mm hole is reported as rejected");

    let toolpath = job.computed.expect("job computed");
    let positions: Vec<(f64, f64, f64)> = toolpath
        .points
        .iter()
        .map(|p| (p.position.x, p.position.y, p.position.z))
        .collect();
    assert_eq!(positions.len(), 3, "approach, plunge and retract: {positions:?}");
    for (x, y, _) in &positions {
        assert!(x.abs() < 1e-6 && y.abs() < 1e-6, "only the 5mm hole is drilled");
    }
    assert_eq!(positions[0].2, 5.0);
    assert_eq!(positions[1].2, -10.0);
    assert_eq!(positions[2].2, 5.0);

    let dwells: Vec<f64> = toolpath.points.iter().map(|p| p.dwell).collect();
    assert_eq!(dwells, vec![0.0, 1.0, 0.0]);
}

#[test]
fn test_no_hole_wide_enough_is_cancelled() {
    let mut sources = SourceRegistry::new();
    let narrow = hole(&mut sources, 0.0, 0.0, 2.0);
    let mut tools = ToolLibrary::new();
    let tool = tools.add_tool(Cutter::new(CutterKind::Drill, 3.0));

    let mut job = Job::new("Too small");
    job.add_operation(Operation::new(
        "Drill",
        Strategy::default_for(StrategyKind::Drill),
        tool,
        vec![narrow],
    ));

    let reports = compute_job(&mut job, &sources, &tools, &ComputeOptions::default()).expect("compute job");
    match &reports[0].status {
        ComputeStatus::Cancelled(CancelReason::NoValidFeature { rejected }) => {
            assert_eq!(rejected.len(), 1);
        }
        other => panic!("expected a cancelled drill, got {other:?}"),
    }
    assert!(!job.computed.expect("job computed").status.is_finished());
}

#[test]
fn test_drill_exports_dwell() {
    let mut sources = SourceRegistry::new();
    let mut tools = ToolLibrary::new();
    let mut job = drill_job(&mut sources, &mut tools);
    compute_job(&mut job, &sources, &tools, &ComputeOptions::default()).expect("compute job");

    let gcode = post_process(job.computed.as_ref().expect("computed"), &ExportOptions::default())
        .expect("post process");
    let dwells: Vec<&String> = gcode.lines.iter().filter(|l| l.starts_with("G4")).collect();
    assert_eq!(dwells, vec!["G4 P1.00000"]);
    assert_eq!(gcode.lines.last().map(String::as_str), Some("M2"));
}
