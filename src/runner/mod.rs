//! Asynchronous execution of lifecycle actions.

mod executor;
mod job;

pub use executor::{
    ActionExecutor, ExecutionOutputs, JobContext, LogSink, PipelineExecutor, SimulatedExecutor,
};
pub use job::{JobRunner, LOG_FLUSH_EVERY};
