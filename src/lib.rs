// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod graph;
pub mod logging;
pub mod node;
pub mod types;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::EngineConfig;
use crate::config::loader::load_or_default;
use crate::engine::{Engine, ExecutionPlan};
use crate::events::{ChannelSink, EngineEvent, EventSink, NoopSink};
use crate::graph::WorkflowGraph;
use crate::node::NodeRegistry;

/// How often the CLI checks whether the loop ended on its own.
const LOOP_POLL: Duration = Duration::from_millis(200);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - node registry + module discovery
/// - the engine and its event channel
/// - Ctrl-C handling for continuous mode
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone();
    let cfg = load_or_default(&config_path)?;

    let registry = Arc::new(build_registry(&cfg, &config_path, args.node_dir.as_deref()));

    if args.list_nodes {
        print_node_list(&registry);
        return Ok(());
    }

    let workflow_path = args
        .workflow
        .as_deref()
        .ok_or_else(|| anyhow!("no workflow file given"))?;
    let graph = read_workflow(workflow_path)?;

    if args.dry_run {
        print_dry_run(&graph, &registry)?;
        return Ok(());
    }

    let (sink, mut events) = ChannelSink::channel(cfg.engine.event_capacity);
    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let engine = Arc::new(Engine::new(registry, Arc::new(sink), &cfg));
    if let Some(interval) = args.interval {
        engine.set_interval(interval)?;
    }

    let outcome = if args.once {
        run_single(Arc::clone(&engine), graph).await
    } else {
        run_continuous(Arc::clone(&engine), graph).await
    };

    // Dropping the engine closes the event channel; give the logger a moment
    // to drain.
    drop(engine);
    if tokio::time::timeout(Duration::from_secs(1), event_task)
        .await
        .is_err()
    {
        debug!("event logger did not drain in time");
    }

    outcome
}

async fn run_single(engine: Arc<Engine>, graph: WorkflowGraph) -> Result<()> {
    let report = tokio::task::spawn_blocking(move || engine.run_once(graph)).await??;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.success {
        bail!(
            "workflow failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn run_continuous(engine: Arc<Engine>, graph: WorkflowGraph) -> Result<()> {
    engine.load_workflow(graph)?;

    let starter = Arc::clone(&engine);
    if !tokio::task::spawn_blocking(move || starter.start()).await?? {
        bail!("continuous execution did not start");
    }
    info!("continuous execution started; press Ctrl+C to stop");

    let mut poll = tokio::time::interval(LOOP_POLL);
    let interrupted = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                }
                break true;
            }
            _ = poll.tick() => {
                if !engine.is_running() {
                    break false;
                }
            }
        }
    };

    let stopper = Arc::clone(&engine);
    tokio::task::spawn_blocking(move || stopper.shutdown()).await?;

    let status = engine.status();
    info!(
        iterations = status.iteration_count,
        last_duration = status.last_duration_seconds,
        "continuous execution finished"
    );

    if interrupted {
        Ok(())
    } else {
        Err(anyhow!(
            "continuous execution stopped after {} iterations because a pass failed",
            status.iteration_count
        ))
    }
}

/// Built-in nodes plus whatever the node directory provides.
///
/// `--node-dir` wins over `[registry].node_dir`; a relative config path is
/// resolved against the config file's directory.
fn build_registry(cfg: &EngineConfig, config_path: &Path, node_dir: Option<&Path>) -> NodeRegistry {
    let mut registry = NodeRegistry::with_builtins(cfg.registry.duplicate_policy);

    let dir = match node_dir {
        Some(dir) => Some(dir.to_path_buf()),
        None => cfg
            .registry
            .node_dir
            .as_ref()
            .map(|dir| config_root_dir(config_path).join(dir)),
    };

    if let Some(dir) = dir {
        let report = registry.discover(&dir);
        let failed = report.failed().count();
        info!(
            dir = %dir.display(),
            registered = report.registered().len(),
            failed,
            "node discovery complete"
        );
    }

    info!(count = registry.len(), "node registry ready");
    registry
}

/// Directory of the config file, or `.` for a bare file name.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn read_workflow(path: &Path) -> Result<WorkflowGraph> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read workflow {}", path.display()))?;
    let graph = WorkflowGraph::from_json_str(&contents)
        .with_context(|| format!("invalid workflow {}", path.display()))?;
    Ok(graph)
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::NodeState {
            node_id,
            state,
            data,
        } => debug!(node = %node_id, ?state, ?data, "node state"),
        EngineEvent::IterationStarting { iteration_number } => {
            debug!(iteration = iteration_number, "iteration starting")
        }
        EngineEvent::IterationCompleted {
            iteration_number,
            duration_seconds,
        } => debug!(
            iteration = iteration_number,
            duration = duration_seconds,
            "iteration completed"
        ),
        EngineEvent::WorkflowError {
            workflow_id,
            message,
            trace,
        } => error!(?workflow_id, %message, %trace, "workflow error"),
        other => info!(event = other.event_type(), ?other, "engine event"),
    }
}

fn print_node_list(registry: &NodeRegistry) {
    println!("flowloop node types ({}):", registry.len());
    for info in registry.describe_all() {
        println!(
            "  {:<24} {:<12} {}",
            info.name.unwrap_or_default(),
            info.category.unwrap_or_default(),
            info.description.unwrap_or_default()
        );
    }
}

/// Compile the workflow and print its plan without running anything.
fn print_dry_run(graph: &WorkflowGraph, registry: &NodeRegistry) -> Result<()> {
    let sink: Arc<dyn EventSink> = Arc::new(NoopSink);
    let plan = ExecutionPlan::build(0, graph, registry, &sink)?;

    println!("flowloop dry-run");
    println!("  nodes = {}", graph.nodes.len());
    println!("  edges = {}", graph.edges.len());
    println!();

    println!("execution order:");
    for (position, id) in plan.order().iter().enumerate() {
        let Some(node) = plan.node(id) else {
            continue;
        };
        println!("  {}. {id} ({})", position + 1, node.type_name);
        for edge in plan.incoming(id) {
            println!(
                "      {}.{} -> {}",
                edge.source,
                edge.output_handle(),
                edge.input_handle()
            );
        }
        let params = node.parameters();
        if !params.is_empty() {
            println!("      parameters: {}", serde_json::Value::Object(params));
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
