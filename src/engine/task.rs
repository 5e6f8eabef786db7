use std::borrow::Cow;
use std::rc::Rc;

use crate::core::{Dynamic, TaskId};
use crate::engine::Bindings;
use crate::engine::node::Invocation;
use crate::error::{RuntimeError, SchedulerError};

pub(crate) trait TypedTask {
    /// The concrete output type of this task.
    type Output: 'static;

    fn get_name(&self) -> &str;

    fn dependencies(&self) -> Vec<TaskId>;

    fn execute(&self, call: Invocation<'_>) -> Result<Self::Output, SchedulerError>;
}

/// The core trait for all tasks stored in the scheduler.
///
/// Callers only ever see the typed [`Scheduler::add`](crate::Scheduler::add)
/// API, this trait is the type-erased foundation that lets one registry hold
/// tasks with different signatures and output types.
pub(crate) trait Task {
    fn get_name(&self) -> &str;

    fn get_output_type_name(&self) -> &'static str;

    fn dependencies(&self) -> Vec<TaskId>;

    fn execute(&self, call: Invocation<'_>) -> Result<Dynamic, SchedulerError>;
}

// A blanket implementation to automatically bridge the two. This is where the
// type erasure actually happens.
impl<T> Task for T
where
    T: TypedTask + 'static,
{
    fn get_name(&self) -> &str {
        T::get_name(self)
    }

    fn get_output_type_name(&self) -> &'static str {
        std::any::type_name::<T::Output>()
    }

    fn dependencies(&self) -> Vec<TaskId> {
        T::dependencies(self)
    }

    fn execute(&self, call: Invocation<'_>) -> Result<Dynamic, SchedulerError> {
        // Call the typed method, then erase the result.
        let output = T::execute(self, call)?;
        Ok(Rc::new(output))
    }
}

/// A callable together with the bindings that feed it.
pub(crate) struct TaskNode<B, F> {
    pub name: Cow<'static, str>,
    pub bindings: B,
    pub callback: F,
}

impl<B, F, R> TypedTask for TaskNode<B, F>
where
    B: Bindings,
    F: Fn(B::Values) -> Result<R, RuntimeError>,
    R: 'static,
{
    type Output = R;

    fn get_name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> Vec<TaskId> {
        self.bindings.dependencies()
    }

    fn execute(&self, call: Invocation<'_>) -> Result<Self::Output, SchedulerError> {
        // Upstream failures are passed through untouched, only our own
        // callback's error gets attributed to this task.
        let values = self.bindings.produce()?;
        call.run(|| (self.callback)(values))
    }
}
