//! Shared fixtures for flowloop's integration tests: scripted node types,
//! an event sink that records everything, and graph/engine builders.

pub mod builders;
pub mod fake_nodes;
pub mod recording_sink;

use std::sync::Once;

use tracing_subscriber::EnvFilter;

use flowloop::logging::LOG_ENV_VAR;

pub use builders::{EngineBuilder, GraphBuilder};
pub use fake_nodes::{TestLibrary, recorded_values, recorder, test_registry};
pub use recording_sink::RecordingSink;

static TRACING: Once = Once::new();

/// Route engine logs through the test harness's captured output.
///
/// Filtered by `FLOWLOOP_LOG` (default `warn`), e.g.
/// `FLOWLOOP_LOG=flowloop::engine=debug cargo test -- --nocapture`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_thread_names(true)
            .try_init();
    });
}
