use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::Level;

use crate::core::{Dynamic, TaskId};
use crate::engine::task::Task;
use crate::error::{RuntimeError, SchedulerError};

/// Timing of the evaluation that produced a node's cached result.
#[derive(Debug, Clone, Copy)]
pub struct TaskExecution {
    pub start: Instant,
    pub duration: Duration,
}

/// A registered task plus its memoized result.
///
/// A node is either unevaluated (`output` is empty) or evaluated, and once it
/// is evaluated it stays that way. The `running` flag only lives for the
/// duration of a single evaluation, it is how re-entrance is detected.
pub(crate) struct Node {
    pub(crate) id: TaskId,
    task: Box<dyn Task>,
    output: RefCell<Option<Dynamic>>,
    running: Cell<bool>,
    attempts: Cell<u32>,
    execution: Cell<Option<TaskExecution>>,
}

/// Clears the in-progress marker on every exit path, unwinding included.
struct RunningGuard<'a>(&'a Cell<bool>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A single call of a node's callable, handed to the task once its
/// arguments are produced.
///
/// Spans, timing and attempt counting live here, off the recursive path
/// through [`Node::force`].
pub(crate) struct Invocation<'a> {
    node: &'a Node,
}

impl Invocation<'_> {
    #[inline(never)]
    pub(crate) fn run<R>(
        self,
        callback: impl FnOnce() -> Result<R, RuntimeError>,
    ) -> Result<R, SchedulerError> {
        let node = self.node;

        let span = tracing::span!(Level::DEBUG, "task", id = %node.id, name = node.name());
        let _enter = span.enter();

        node.attempts.set(node.attempts.get() + 1);
        tracing::debug!("running");

        let start = Instant::now();
        match callback() {
            Ok(output) => {
                let duration = start.elapsed();
                tracing::debug!("finished in {duration:.2?}");
                node.execution.set(Some(TaskExecution { start, duration }));
                Ok(output)
            }
            Err(source) => {
                tracing::warn!("failed: {source}");
                Err(SchedulerError::Task {
                    id: node.id,
                    name: node.name().to_string(),
                    source,
                })
            }
        }
    }
}

impl Node {
    pub(crate) fn new(id: TaskId, task: Box<dyn Task>) -> Self {
        Self {
            id,
            task,
            output: RefCell::new(None),
            running: Cell::new(false),
            attempts: Cell::new(0),
            execution: Cell::new(None),
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.task.get_name()
    }

    pub(crate) fn output_type_name(&self) -> &'static str {
        self.task.get_output_type_name()
    }

    pub(crate) fn dependencies(&self) -> Vec<TaskId> {
        self.task.dependencies()
    }

    pub(crate) fn is_evaluated(&self) -> bool {
        self.output.borrow().is_some()
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts.get()
    }

    pub(crate) fn execution(&self) -> Option<TaskExecution> {
        self.execution.get()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Returns the cached result, evaluating the task first if needed.
    ///
    /// Dependencies are forced as a side effect of the task reading its
    /// bindings, so this is a depth-first traversal that stops at every node
    /// which already holds a result. Keep this frame small, it is repeated
    /// once per level of that traversal.
    pub(crate) fn force(&self) -> Result<Dynamic, SchedulerError> {
        if let Some(output) = self.cached() {
            return Ok(output);
        }

        if self.running.replace(true) {
            return Err(self.cycle());
        }
        let _guard = RunningGuard(&self.running);

        // No borrow of `output` is held here, the task may read other nodes.
        let output = self.task.execute(Invocation { node: self })?;
        *self.output.borrow_mut() = Some(output.clone());

        Ok(output)
    }

    #[inline(never)]
    fn cached(&self) -> Option<Dynamic> {
        let output = self.output.borrow().clone()?;
        tracing::trace!(id = %self.id, "cache hit");
        Some(output)
    }

    #[cold]
    #[inline(never)]
    fn cycle(&self) -> SchedulerError {
        tracing::warn!(id = %self.id, name = self.name(), "cycle detected");
        SchedulerError::Cycle {
            id: self.id,
            name: self.name().to_string(),
        }
    }

    /// Forces the node and projects its result as `T`.
    pub(crate) fn read<T: 'static>(&self) -> Result<Rc<T>, SchedulerError> {
        self.force()?
            .downcast::<T>()
            .map_err(|_| SchedulerError::TypeMismatch {
                id: self.id,
                name: self.name().to_string(),
                expected: type_name::<T>(),
                actual: self.output_type_name(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Literal;
    use crate::engine::task::TaskNode;

    fn counting_node(count: Rc<Cell<usize>>) -> Node {
        let task = TaskNode {
            name: "count".into(),
            bindings: (Literal::new(20),),
            callback: move |(x,): (i32,)| -> anyhow::Result<i32> {
                count.set(count.get() + 1);
                Ok(x + 1)
            },
        };

        Node::new(TaskId::new(0), Box::new(task))
    }

    #[test]
    fn test_force_memoizes() {
        let count = Rc::new(Cell::new(0));
        let node = counting_node(count.clone());

        assert!(!node.is_evaluated());
        assert_eq!(*node.read::<i32>().unwrap(), 21);
        assert_eq!(*node.read::<i32>().unwrap(), 21);
        assert!(node.is_evaluated());
        assert_eq!(count.get(), 1);
        assert_eq!(node.attempts(), 1);
        assert!(node.execution().is_some());
    }

    #[test]
    fn test_read_wrong_type() {
        let node = counting_node(Rc::new(Cell::new(0)));

        match node.read::<String>() {
            Err(SchedulerError::TypeMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, "alloc::string::String");
                assert_eq!(actual, "i32");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }

        // the mismatch does not undo the evaluation
        assert!(node.is_evaluated());
    }

    #[test]
    fn test_failure_is_not_cached() {
        let calls = Rc::new(Cell::new(0));
        let task = TaskNode {
            name: "flaky".into(),
            bindings: (),
            callback: {
                let calls = calls.clone();
                move |()| -> anyhow::Result<&'static str> {
                    calls.set(calls.get() + 1);
                    if calls.get() == 1 {
                        anyhow::bail!("first call fails");
                    }
                    Ok("ok")
                }
            },
        };
        let node = Node::new(TaskId::new(2), Box::new(task));

        assert!(node.force().is_err());
        assert!(!node.is_evaluated());
        assert_eq!(*node.read::<&str>().unwrap(), "ok");
        assert_eq!(calls.get(), 2);
        assert_eq!(node.attempts(), 2);
    }
}
