//! Built-in tool executors.

pub mod schedule;

pub use schedule::TrainingScheduleTools;

use std::sync::Arc;

use pacer_core::ToolRegistry;

/// Registry with every built-in executor.
pub fn default_registry() -> ToolRegistry {
    ToolRegistry::new().with_executor(Arc::new(TrainingScheduleTools::new()))
}
