use std::any::type_name;
use std::borrow::Cow;
use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::core::TaskId;
use crate::engine::task::{Task, TaskNode};
use crate::engine::{
    Arguments, Bindings, Callable, Diagnostics, FutureResult, Node, Table, prime, run_all,
};
use crate::error::{RuntimeError, SchedulerError};

/// A lazy, memoizing registry of tasks.
///
/// Tasks are registered with [`add`](Self::add) together with their
/// arguments, which can be plain values or [`FutureResult`]s pointing at other
/// tasks. Nothing runs at registration time. A task is evaluated the first
/// time its result is needed, either because it was requested through
/// [`get_result`](Self::get_result), because a task reading it was evaluated,
/// or by [`execute_all`](Self::execute_all). Every task runs at most once,
/// later reads are served from the cache.
///
/// # Example
///
/// ```rust
/// use tsunagi::Scheduler;
///
/// let mut scheduler = Scheduler::new();
///
/// let sum = scheduler.add(|a: i32, b: i32| a + b, (1, 2));
/// let square = scheduler.add(|x: i32| x * x, (scheduler.get_future_result::<i32>(sum),));
///
/// assert_eq!(scheduler.get_result::<i32>(square).unwrap(), 9);
/// ```
///
/// # Cloning
///
/// Cloning a scheduler copies the list of tasks, not the tasks themselves.
/// The clone shares every node with the original, so whatever one of them
/// evaluates is cached for both. Tasks added afterwards are only visible in
/// the scheduler they were added to.
pub struct Scheduler {
    tasks: Rc<Table>,
}

impl Scheduler {
    /// Creates a new, empty scheduler.
    pub fn new() -> Self {
        Self {
            tasks: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// The entry point for a configurable registration.
    ///
    /// ```rust
    /// # use tsunagi::Scheduler;
    /// let mut scheduler = Scheduler::new();
    /// let id = scheduler.task().name("answer").add(|| 42, ());
    /// assert_eq!(scheduler.name(id).unwrap(), "answer");
    /// ```
    pub fn task(&mut self) -> TaskDef<'_> {
        TaskDef {
            scheduler: self,
            name: None,
        }
    }

    /// Registers a task and returns its id.
    ///
    /// `args` is a tuple whose elements are handed to `func` in order. Each
    /// element is either a plain value, captured as is, or a
    /// [`FutureResult`] that is resolved when the task runs. The parameter
    /// types of `func` have to match the argument tuple exactly.
    ///
    /// Plain values are accepted as is for the primitive types, `String`,
    /// `&'static str`, `Vec`, `Option`, `Rc` and `Arc`. Any other `Clone`
    /// type, such as your own structs, tuples or arrays, is passed wrapped in
    /// a [`Literal`](crate::Literal):
    ///
    /// ```rust
    /// use tsunagi::{Literal, Scheduler};
    ///
    /// #[derive(Clone)]
    /// struct Point(i32, i32);
    ///
    /// let mut scheduler = Scheduler::new();
    /// let id = scheduler.add(|p: Point| p.0 + p.1, (Literal::new(Point(1, 2)),));
    ///
    /// assert_eq!(scheduler.get_result::<i32>(id).unwrap(), 3);
    /// ```
    ///
    /// The task is not evaluated here, and no check for cyclic dependencies
    /// is made.
    pub fn add<F, A>(&mut self, func: F, args: A) -> TaskId
    where
        A: Arguments,
        F: Callable<<A::Bindings as Bindings>::Values>,
        F::Output: 'static,
    {
        self.task().add(func, args)
    }

    /// Registers a task whose body can fail.
    ///
    /// Same as [`add`](Self::add), but `func` returns an `anyhow::Result`.
    /// The task's result type is the `Ok` type, an `Err` is reported as
    /// [`SchedulerError::Task`] to whoever triggered the evaluation.
    pub fn try_add<F, A, R>(&mut self, func: F, args: A) -> TaskId
    where
        A: Arguments,
        F: Callable<<A::Bindings as Bindings>::Values, Output = Result<R, RuntimeError>>,
        R: 'static,
    {
        self.task().try_add(func, args)
    }

    /// Returns the id the next registered task will receive.
    pub fn next_id(&self) -> TaskId {
        self.nth_next_id(0)
    }

    /// Returns the id the `n`-th registration from now will receive, counting
    /// from zero, so `nth_next_id(0)` is [`next_id`](Self::next_id).
    ///
    /// Combined with [`get_future_result`](Self::get_future_result) this lets
    /// a task read the result of a task that is registered after it:
    ///
    /// ```rust
    /// # use tsunagi::Scheduler;
    /// let mut scheduler = Scheduler::new();
    ///
    /// let target = scheduler.nth_next_id(1);
    /// let reader = scheduler.add(|x: i32| x * 2, (scheduler.get_future_result::<i32>(target),));
    /// scheduler.add(|| 20, ());
    ///
    /// assert_eq!(scheduler.get_result::<i32>(reader).unwrap(), 40);
    /// ```
    pub fn nth_next_id(&self, n: usize) -> TaskId {
        TaskId::new(self.tasks.borrow().len() + n)
    }

    /// Creates a handle to the future result of a task, read as `T`.
    ///
    /// The handle can be passed as an argument to other tasks or read
    /// directly. Reading it with a `T` other than the task's result type
    /// fails with [`SchedulerError::TypeMismatch`], and reading a handle to a
    /// task that still isn't registered fails with
    /// [`SchedulerError::UnknownTask`].
    pub fn get_future_result<T>(&self, id: TaskId) -> FutureResult<T> {
        FutureResult::new(id, &self.tasks)
    }

    /// Evaluates every task that has not been evaluated yet, in registration
    /// order.
    ///
    /// Stops at the first failure, tasks evaluated before it keep their
    /// results.
    pub fn execute_all(&self) -> Result<(), SchedulerError> {
        // Snapshot, so the table is not borrowed while tasks run.
        let nodes: Vec<Rc<Node>> = self.tasks.borrow().clone();
        run_all(&nodes)?;
        Ok(())
    }

    /// Returns the result of a task, evaluating it (and whatever it depends
    /// on) first if needed.
    pub fn get_result<T: Clone + 'static>(&self, id: TaskId) -> Result<T, SchedulerError> {
        let output = self.get_shared::<T>(id)?;
        Ok(T::clone(&output))
    }

    /// Like [`get_result`](Self::get_result), but returns the cached value
    /// itself instead of a clone.
    pub fn get_shared<T: 'static>(&self, id: TaskId) -> Result<Rc<T>, SchedulerError> {
        let node = self.node(id)?;
        prime(&self.tasks.borrow(), &node)?;
        node.read::<T>()
    }

    /// Whether the task already holds a cached result.
    pub fn is_evaluated(&self, id: TaskId) -> Result<bool, SchedulerError> {
        Ok(self.node(id)?.is_evaluated())
    }

    /// The task's name, either given through [`TaskDef::name`] or derived
    /// from the type of its callable.
    pub fn name(&self, id: TaskId) -> Result<String, SchedulerError> {
        Ok(self.node(id)?.name().to_string())
    }

    /// The name of the type the task produces.
    pub fn output_type_name(&self, id: TaskId) -> Result<&'static str, SchedulerError> {
        Ok(self.node(id)?.output_type_name())
    }

    /// The tasks read by this task's arguments, in argument order.
    pub fn dependencies(&self, id: TaskId) -> Result<Vec<TaskId>, SchedulerError> {
        Ok(self.node(id)?.dependencies())
    }

    /// All registered ids, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = TaskId> + use<> {
        (0..self.len()).map(TaskId::new)
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Collects timing and attempt counts of every task evaluated so far.
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics::collect(self)
    }

    pub(crate) fn nodes(&self) -> Ref<'_, Vec<Rc<Node>>> {
        self.tasks.borrow()
    }

    fn node(&self, id: TaskId) -> Result<Rc<Node>, SchedulerError> {
        self.tasks
            .borrow()
            .get(id.index())
            .cloned()
            .ok_or(SchedulerError::UnknownTask(id))
    }

    fn push<T>(&mut self, task: T) -> TaskId
    where
        T: Task + 'static,
    {
        let id = self.next_id();
        tracing::trace!(%id, name = task.get_name(), "registered");

        let node = Rc::new(Node::new(id, Box::new(task)));
        self.tasks.borrow_mut().push(node);
        id
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Newest first: a node is then never the last owner of the nodes it
        // reads, and dropping a long chain does not recurse through it.
        let nodes = std::mem::take(&mut *self.tasks.borrow_mut());
        nodes.into_iter().rev().for_each(drop);
    }
}

impl Clone for Scheduler {
    fn clone(&self) -> Self {
        // New table, same nodes.
        Self {
            tasks: Rc::new(RefCell::new(self.tasks.borrow().clone())),
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tasks = self.tasks.borrow();
        let evaluated = tasks.iter().filter(|node| node.is_evaluated()).count();

        f.debug_struct("Scheduler")
            .field("tasks", &tasks.len())
            .field("evaluated", &evaluated)
            .finish()
    }
}

/// A task registration in progress, see [`Scheduler::task`].
pub struct TaskDef<'a> {
    scheduler: &'a mut Scheduler,
    name: Option<Cow<'static, str>>,
}

impl TaskDef<'_> {
    /// Names the task, the name shows up in logs, errors and diagrams.
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Registers the task, see [`Scheduler::add`].
    pub fn add<F, A>(self, func: F, args: A) -> TaskId
    where
        A: Arguments,
        F: Callable<<A::Bindings as Bindings>::Values>,
        F::Output: 'static,
    {
        let name = self.name.unwrap_or(type_name::<F>().into());

        self.scheduler.push(TaskNode {
            name,
            bindings: args.into_bindings(),
            callback: move |values: <A::Bindings as Bindings>::Values| {
                Ok::<_, RuntimeError>(func.call(values))
            },
        })
    }

    /// Registers a fallible task, see [`Scheduler::try_add`].
    pub fn try_add<F, A, R>(self, func: F, args: A) -> TaskId
    where
        A: Arguments,
        F: Callable<<A::Bindings as Bindings>::Values, Output = Result<R, RuntimeError>>,
        R: 'static,
    {
        let name = self.name.unwrap_or(type_name::<F>().into());

        self.scheduler.push(TaskNode {
            name,
            bindings: args.into_bindings(),
            callback: move |values: <A::Bindings as Bindings>::Values| func.call(values),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_ids_are_dense() {
        let mut scheduler = Scheduler::new();
        assert_eq!(scheduler.next_id(), TaskId::new(0));

        let a = scheduler.add(|| 1, ());
        let b = scheduler.add(|| 2, ());

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(scheduler.len(), 2);
        assert_eq!(scheduler.ids().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn test_add_does_not_evaluate() {
        let count = Rc::new(Cell::new(0));
        let mut scheduler = Scheduler::new();

        let id = scheduler.add(
            {
                let count = count.clone();
                move || count.set(count.get() + 1)
            },
            (),
        );

        assert_eq!(count.get(), 0);
        assert!(!scheduler.is_evaluated(id).unwrap());

        scheduler.get_result::<()>(id).unwrap();
        assert_eq!(count.get(), 1);
        assert!(scheduler.is_evaluated(id).unwrap());
    }

    #[test]
    fn test_default_name_is_callable_type() {
        fn double(x: i64) -> i64 {
            x * 2
        }

        let mut scheduler = Scheduler::new();
        let id = scheduler.add(double, (21_i64,));

        assert!(scheduler.name(id).unwrap().ends_with("double"));
        assert_eq!(scheduler.output_type_name(id).unwrap(), "i64");
        assert_eq!(scheduler.get_result::<i64>(id).unwrap(), 42);
    }

    #[test]
    fn test_unknown_task() {
        let scheduler = Scheduler::new();
        let mut other = Scheduler::new();
        let foreign = other.add(|| 0, ());

        assert!(matches!(
            scheduler.get_result::<i32>(foreign),
            Err(SchedulerError::UnknownTask(id)) if id == foreign
        ));
        assert!(scheduler.dependencies(foreign).is_err());
    }

    #[test]
    fn test_dependencies_in_argument_order() {
        let mut scheduler = Scheduler::new();
        let a = scheduler.add(|| 1, ());
        let b = scheduler.add(|| 2, ());
        let c = scheduler.add(
            |x: i32, k: i32, y: i32| x + k + y,
            (
                scheduler.get_future_result::<i32>(b),
                10,
                scheduler.get_future_result::<i32>(a),
            ),
        );

        assert_eq!(scheduler.dependencies(c).unwrap(), vec![b, a]);
        assert_eq!(scheduler.get_result::<i32>(c).unwrap(), 13);
    }

    #[test]
    fn test_get_shared_non_clone() {
        struct Opaque(u32);

        let mut scheduler = Scheduler::new();
        let id = scheduler.add(|| Opaque(7), ());

        let first = scheduler.get_shared::<Opaque>(id).unwrap();
        let second = scheduler.get_shared::<Opaque>(id).unwrap();

        assert_eq!(first.0, 7);
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_clone_shares_nodes_not_table() {
        let count = Rc::new(Cell::new(0));
        let mut scheduler = Scheduler::new();
        let id = scheduler.add(
            {
                let count = count.clone();
                move || {
                    count.set(count.get() + 1);
                    5
                }
            },
            (),
        );

        let mut copy = scheduler.clone();
        copy.execute_all().unwrap();

        assert!(scheduler.is_evaluated(id).unwrap());
        assert_eq!(scheduler.get_result::<i32>(id).unwrap(), 5);
        assert_eq!(count.get(), 1);

        copy.add(|| 6, ());
        assert_eq!(copy.len(), 2);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_debug_summary() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.add(|| 'x', ());
        scheduler.add(|| 'y', ());
        scheduler.get_result::<char>(id).unwrap();

        assert_eq!(
            format!("{scheduler:?}"),
            "Scheduler { tasks: 2, evaluated: 1 }"
        );
    }
}
