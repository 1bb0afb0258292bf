mod common;

use std::time::Duration;

use flowloop::errors::FlowloopError;
use flowloop::events::EngineEvent;
use flowloop_test_utils::{EngineBuilder, GraphBuilder, recorded_values, recorder, test_registry};
use serde_json::json;

use common::WAIT;

#[test]
fn start_twice_runs_a_single_worker() {
    common::init_tracing();
    let (engine, sink) = EngineBuilder::new(test_registry()).build();
    engine
        .load_workflow(
            GraphBuilder::new()
                .node_with("c", "Constant", &[("value", json!(1))])
                .build(),
        )
        .unwrap();

    assert!(engine.start().unwrap());
    assert!(!engine.start().unwrap());
    assert!(engine.is_running());

    assert!(sink.wait_for(WAIT, |events| {
        events
            .iter()
            .filter(|e| e.event_type() == "iterationCompleted")
            .count()
            >= 3
    }));

    assert!(engine.stop());
    assert!(!engine.is_running());
    assert_eq!(sink.count("loopStarted"), 1);
    assert_eq!(sink.count("loopStopped"), 1);

    // One worker means strictly increasing, gap-free iteration numbers.
    let completed = sink.completed_iterations();
    let expected: Vec<u64> = (1..=completed.len() as u64).collect();
    assert_eq!(completed, expected);
    assert_eq!(engine.status().iteration_count, completed.len() as u64);
}

#[test]
fn failure_on_third_iteration_stops_the_loop() {
    let (engine, sink) = EngineBuilder::new(test_registry()).build();
    engine
        .load_workflow(
            GraphBuilder::new()
                .node_with("f", "FailOnCall", &[("fail_on", json!(3))])
                .build(),
        )
        .unwrap();

    assert!(engine.start().unwrap());
    assert!(sink.wait_for(WAIT, |events| {
        events.iter().any(|e| e.event_type() == "loopStopped")
    }));

    assert!(!engine.is_running());
    assert_eq!(sink.completed_iterations(), vec![1, 2]);
    assert_eq!(sink.count("workflowError"), 1);

    let error = sink
        .events()
        .into_iter()
        .find_map(|e| match e {
            EngineEvent::WorkflowError {
                workflow_id,
                message,
                trace,
            } => Some((workflow_id, message, trace)),
            _ => None,
        })
        .unwrap();
    assert!(error.0.is_some());
    assert!(error.1.contains("'f'"));
    assert!(error.2.contains("scripted failure on call 3"));

    // Already stopped by the worker itself.
    assert!(!engine.stop());
    assert_eq!(engine.status().iteration_count, 2);
}

#[test]
fn live_parameter_updates_reach_the_next_iteration() {
    let mut registry = test_registry();
    let (rec, store) = recorder("Recorder");
    registry.register(rec).unwrap();
    let (engine, sink) = EngineBuilder::new(registry).build();

    engine
        .load_workflow(
            GraphBuilder::new()
                .node_with("src", "Constant", &[("value", json!(1))])
                .node("rec", "Recorder")
                .edge("src", "rec")
                .build(),
        )
        .unwrap();
    assert!(engine.start().unwrap());
    assert!(sink.wait_for(WAIT, |events| {
        events.iter().any(|e| e.event_type() == "iterationCompleted")
    }));

    assert!(engine.update_node_parameter("src", "value", json!(7)));
    assert!(!engine.update_node_parameter("ghost", "value", json!(7)));

    let seen_update = || recorded_values(&store, "input").contains(&json!(7));
    let deadline = std::time::Instant::now() + WAIT;
    while !seen_update() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    engine.stop();

    let values = recorded_values(&store, "input");
    assert_eq!(values.first(), Some(&json!(1)));
    assert!(values.contains(&json!(7)));
}

#[test]
fn interval_changes_are_validated() {
    let (engine, _sink) = EngineBuilder::new(test_registry()).interval(0.05).build();

    assert!(matches!(
        engine.set_interval(-1.0),
        Err(FlowloopError::InvalidInterval(v)) if v == -1.0
    ));
    assert_eq!(engine.status().interval_seconds, 0.05);

    engine.set_interval(2.0).unwrap();
    assert_eq!(engine.status().interval_seconds, 2.0);
}

#[test]
fn stop_interrupts_a_long_sleep() {
    let (engine, sink) = EngineBuilder::new(test_registry()).interval(60.0).build();
    engine
        .load_workflow(GraphBuilder::new().node("c", "Constant").build())
        .unwrap();

    assert!(engine.start().unwrap());
    assert!(sink.wait_for(WAIT, |events| {
        events.iter().any(|e| e.event_type() == "iterationCompleted")
    }));

    let started = std::time::Instant::now();
    assert!(engine.stop());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(sink.completed_iterations(), vec![1]);
}

#[test]
fn run_once_is_rejected_while_running() {
    let (engine, sink) = EngineBuilder::new(test_registry()).build();
    let graph = GraphBuilder::new().node("c", "Constant").build();
    engine.load_workflow(graph.clone()).unwrap();
    assert!(engine.start().unwrap());

    assert!(matches!(
        engine.run_once(graph),
        Err(FlowloopError::AlreadyRunning)
    ));

    engine.stop();
    assert!(sink.count("loopStopped") >= 1);
}

#[test]
fn reloading_while_running_swaps_the_plan() {
    let (engine, sink) = EngineBuilder::new(test_registry()).build();
    engine
        .load_workflow(GraphBuilder::new().node("first", "Constant").build())
        .unwrap();
    assert!(engine.start().unwrap());
    assert!(sink.wait_for(WAIT, |events| {
        events.iter().any(|e| e.event_type() == "iterationCompleted")
    }));

    engine
        .load_workflow(GraphBuilder::new().node("second", "Constant").build())
        .unwrap();
    assert!(sink.wait_for(WAIT, |events| {
        events.iter().any(|e| matches!(
            e,
            EngineEvent::NodeState { node_id, .. } if node_id == "second"
        ))
    }));

    engine.stop();
    assert!(engine.status().last_results.contains_key("second")
        || engine.status().last_results.contains_key("first"));
}

#[test]
fn status_reflects_the_loop() {
    let (engine, sink) = EngineBuilder::new(test_registry()).build();
    let before = engine.status();
    assert!(!before.running);
    assert!(!before.has_workflow);
    assert!(!before.plan_ready);

    engine
        .load_workflow(
            GraphBuilder::new()
                .node_with("c", "Constant", &[("value", json!(3))])
                .build(),
        )
        .unwrap();
    assert!(engine.start().unwrap());
    assert!(sink.wait_for(WAIT, |events| {
        events.iter().any(|e| e.event_type() == "iterationCompleted")
    }));

    let during = engine.status();
    assert!(during.running);
    assert!(during.plan_ready);
    assert!(during.iteration_count >= 1);
    assert_eq!(during.last_results["c"], json!(3));
    assert!(during.recent_logs.len() <= 10);

    engine.stop();
    assert!(!engine.status().running);
}

#[test]
fn oversized_intervals_are_rejected_and_huge_ones_still_stop() {
    let (engine, sink) = EngineBuilder::new(test_registry()).build();
    engine
        .load_workflow(GraphBuilder::new().node("c", "Constant").build())
        .unwrap();

    assert!(matches!(
        engine.set_interval(1e300),
        Err(FlowloopError::InvalidInterval(_))
    ));

    // Representable but effectively forever: the worker must still sleep
    // and wake on stop instead of dying.
    engine.set_interval(1e12).unwrap();
    assert!(engine.start().unwrap());
    assert!(sink.wait_for(WAIT, |events| {
        events.iter().any(|e| e.event_type() == "iterationCompleted")
    }));
    assert!(engine.stop());
    assert!(!engine.is_running());

    assert!(engine.start().unwrap());
    assert!(engine.is_running());
    assert!(engine.stop());
}
