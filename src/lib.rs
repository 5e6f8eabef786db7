#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod core;
mod engine;
mod error;
mod graph;
mod scheduler;
mod utils;

pub use crate::core::TaskId;
pub use crate::engine::{
    Arguments, Binding, Bindings, Callable, Diagnostics, FutureResult, IntoBinding, Literal,
    TaskExecution,
};
pub use crate::error::{RuntimeError, SchedulerError};
pub use crate::scheduler::{Scheduler, TaskDef};

#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
