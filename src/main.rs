// src/main.rs
mod config;
mod geometry;
mod handoff;
mod model;
mod planner;
mod report;
mod scene;
mod solver;
mod types;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use geometry::GeometryExtractor;
use handoff::{HandoffServer, TcpAcceptor};
use planner::LayoutPlanner;
use report::{Delivery, RunReport};
use scene::Scene;
use solver::MaxRectsSolver;

#[derive(Parser)]
#[command(name = "object_packing")]
#[command(about = "Plans pick and drop poses for detected objects and serves them to a robot controller")]
#[command(version)]
struct Args {
    /// Scene file with the detected boxes (overrides OBJECT_PACKING_SCENE)
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Where to write the JSON run report (overrides OBJECT_PACKING_REPORT)
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("⚠️ Could not load .env: {}", err);
        }
    }

    let args = Args::parse();
    let app_config = AppConfig::from_env();
    let scene_path = args
        .scene
        .or(app_config.paths.scene.clone())
        .context("no scene file given (use --scene or OBJECT_PACKING_SCENE)")?;
    let report_path = args.report.or(app_config.paths.report.clone());

    println!("🚀 Object packing starts...");

    let scene = Scene::load(&scene_path)?;
    let boxes = scene.boxes(app_config.calibration.min_area());
    info!(
        detections = scene.detections.len(),
        accepted = boxes.len(),
        scene = %scene_path.display(),
        "scene loaded"
    );

    let extractor = GeometryExtractor::new(app_config.calibration.pixels_per_metric())?;
    let extraction = extractor.extract_all(&boxes);

    let planner = LayoutPlanner::new(
        MaxRectsSolver::new(app_config.layout.solver_config()),
        app_config.layout.bin(),
    );
    let plan = planner.plan(&extraction.poses);
    report::log_plan(&extraction.poses, &plan);
    if !plan.is_complete() {
        warn!(
            unplaced = plan.unplaced.len(),
            "some objects do not fit in the bin and will not be served"
        );
    }
    let schedule = plan.schedule(&extraction.poses);

    let addr = app_config.handoff.socket_addr();
    let acceptor = TcpAcceptor::bind(addr)
        .await
        .with_context(|| format!("could not bind handoff server to {}", addr))?;
    let local_addr = acceptor.local_addr().unwrap_or(addr);
    info!(addr = %local_addr, objects = schedule.len(), "handoff server listening");

    let outcome = HandoffServer::new(acceptor, schedule, app_config.handoff.retry_limit())
        .run()
        .await;

    let delivery = Delivery::from_outcome(&outcome);
    let run_report = RunReport::new(boxes.len(), &extraction, plan, delivery);
    run_report.log_summary();
    if let Some(path) = report_path {
        run_report
            .write_json(&path)
            .with_context(|| format!("could not write report to {}", path.display()))?;
        info!(report = %path.display(), "report written");
    }

    if let Err(err) = outcome {
        bail!(err);
    }
    println!("Program finished");
    Ok(())
}
