use std::cell::OnceCell;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::core::TaskId;
use crate::engine::node::Node;
use crate::engine::{Table, prime};
use crate::error::SchedulerError;

/// A source of one input value for a task.
///
/// Bindings are read every time the task they feed is evaluated, which
/// happens at most once per successful evaluation.
pub trait Binding {
    /// The type handed to the task's callable.
    type Value;

    /// Produces the value, evaluating upstream tasks if this binding refers
    /// to one.
    fn produce(&self) -> Result<Self::Value, SchedulerError>;

    /// The task this binding reads from, if any.
    fn dependency(&self) -> Option<TaskId> {
        None
    }
}

/// Anything that can be passed as an argument to
/// [`Scheduler::add`](crate::Scheduler::add).
///
/// Plain values become a [`Literal`], a [`FutureResult`] is kept as is.
pub trait IntoBinding {
    type Binding: Binding + 'static;

    fn into_binding(self) -> Self::Binding;
}

/// A concrete value captured at registration time.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal<T>(T);

impl<T> Literal<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &T {
        &self.0
    }
}

impl<T: Clone> Binding for Literal<T> {
    type Value = T;

    fn produce(&self) -> Result<T, SchedulerError> {
        Ok(self.0.clone())
    }
}

impl<T: Clone + 'static> IntoBinding for Literal<T> {
    type Binding = Self;

    fn into_binding(self) -> Self {
        self
    }
}

macro_rules! impl_literal {
    ($($T:ty),*) => {
        $(
            impl IntoBinding for $T {
                type Binding = Literal<$T>;

                fn into_binding(self) -> Self::Binding {
                    Literal(self)
                }
            }
        )*
    };
}

impl_literal!(bool, char, String, &'static str);
impl_literal!(i8, i16, i32, i64, i128, isize);
impl_literal!(u8, u16, u32, u64, u128, usize);
impl_literal!(f32, f64);

impl<T: Clone + 'static> IntoBinding for Vec<T> {
    type Binding = Literal<Vec<T>>;

    fn into_binding(self) -> Self::Binding {
        Literal(self)
    }
}

impl<T: Clone + 'static> IntoBinding for Option<T> {
    type Binding = Literal<Option<T>>;

    fn into_binding(self) -> Self::Binding {
        Literal(self)
    }
}

impl<T: ?Sized + 'static> IntoBinding for Rc<T> {
    type Binding = Literal<Rc<T>>;

    fn into_binding(self) -> Self::Binding {
        Literal(self)
    }
}

impl<T: ?Sized + 'static> IntoBinding for Arc<T> {
    type Binding = Literal<Arc<T>>;

    fn into_binding(self) -> Self::Binding {
        Literal(self)
    }
}

/// A typed reference to the future result of a task.
///
/// A `FutureResult<T>` is a cheap, cloneable handle. Passing it as an argument
/// wires the referenced task in as a dependency. Reading it (either as a task
/// argument or directly through [`FutureResult::get`]) evaluates the
/// referenced task if it has not been evaluated yet and returns its result.
///
/// # Diamond dependencies
///
/// If two tasks read the same `FutureResult`, the referenced task is still
/// only evaluated once and both readers observe the same cached value.
///
/// # Late binding
///
/// The referenced task does not have to exist yet when the handle is created
/// (see [`Scheduler::next_id`](crate::Scheduler::next_id)). It is resolved on
/// the first read, against the scheduler that created the handle.
pub struct FutureResult<T> {
    id: TaskId,
    node: OnceCell<Rc<Node>>,
    table: Weak<Table>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> FutureResult<T> {
    pub(crate) fn new(id: TaskId, table: &Rc<Table>) -> Self {
        let node = OnceCell::new();
        if let Some(found) = table.borrow().get(id.index()) {
            let _ = node.set(found.clone());
        }

        Self {
            id,
            node,
            table: Rc::downgrade(table),
            _phantom: PhantomData,
        }
    }

    /// The id of the referenced task.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Whether the referenced task already holds a result.
    ///
    /// `false` while the referenced task is not registered yet.
    pub fn is_ready(&self) -> bool {
        self.resolve().is_ok_and(|node| node.is_evaluated())
    }

    fn resolve(&self) -> Result<&Rc<Node>, SchedulerError> {
        if let Some(node) = self.node.get() {
            return Ok(node);
        }

        let table = self.table.upgrade().ok_or(SchedulerError::UnknownTask(self.id))?;
        let found = table
            .borrow()
            .get(self.id.index())
            .cloned()
            .ok_or(SchedulerError::UnknownTask(self.id))?;

        Ok(self.node.get_or_init(|| found))
    }
}

impl<T: Clone + 'static> FutureResult<T> {
    /// Reads the referenced result, evaluating its task if needed.
    pub fn get(&self) -> Result<T, SchedulerError> {
        self.produce()
    }
}

impl<T> Clone for FutureResult<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            node: self.node.clone(),
            table: self.table.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for FutureResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FutureResult")
            .field("id", &self.id)
            .field("type", &std::any::type_name::<T>())
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl<T: Clone + 'static> Binding for FutureResult<T> {
    type Value = T;

    fn produce(&self) -> Result<T, SchedulerError> {
        let node = self.resolve()?;
        if !node.is_evaluated() {
            if let Some(table) = self.table.upgrade() {
                prime(&table.borrow(), node)?;
            }
        }

        let output = node.read::<T>()?;
        Ok(T::clone(&output))
    }

    fn dependency(&self) -> Option<TaskId> {
        Some(self.id)
    }
}

impl<T: Clone + 'static> IntoBinding for FutureResult<T> {
    type Binding = Self;

    fn into_binding(self) -> Self {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::task::TaskNode;
    use std::cell::RefCell;

    fn table_with_const(value: i32) -> Rc<Table> {
        let task = TaskNode {
            name: "const".into(),
            bindings: (),
            callback: move |()| -> anyhow::Result<i32> { Ok(value) },
        };
        let node = Rc::new(Node::new(TaskId::new(0), Box::new(task)));
        Rc::new(RefCell::new(vec![node]))
    }

    #[test]
    fn test_literal_produces_clones() {
        let literal = "hello".to_string().into_binding();
        assert_eq!(literal.produce().unwrap(), "hello");
        assert_eq!(literal.produce().unwrap(), "hello");
        assert_eq!(literal.dependency(), None);
    }

    #[test]
    fn test_future_result_reads_node() {
        let table = table_with_const(42);
        let future = FutureResult::<i32>::new(TaskId::new(0), &table);

        assert!(!future.is_ready());
        assert_eq!(future.get().unwrap(), 42);
        assert!(future.is_ready());
        assert_eq!(future.dependency(), Some(TaskId::new(0)));
    }

    #[test]
    fn test_future_result_wrong_type() {
        let table = table_with_const(1);
        let future = FutureResult::<f32>::new(TaskId::new(0), &table);

        assert!(matches!(
            future.get(),
            Err(SchedulerError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_future_result_resolves_late() {
        let table: Rc<Table> = Rc::new(RefCell::new(Vec::new()));
        let future = FutureResult::<i32>::new(TaskId::new(0), &table);

        assert!(matches!(future.get(), Err(SchedulerError::UnknownTask(_))));

        let filled = table_with_const(9);
        table.borrow_mut().extend(filled.borrow().iter().cloned());

        assert_eq!(future.get().unwrap(), 9);
    }

    #[test]
    fn test_future_result_ready_before_first_read() {
        let table: Rc<Table> = Rc::new(RefCell::new(Vec::new()));
        let future = FutureResult::<i32>::new(TaskId::new(0), &table);
        assert!(!future.is_ready());

        let filled = table_with_const(3);
        table.borrow_mut().extend(filled.borrow().iter().cloned());
        assert!(!future.is_ready());

        // evaluated through the table, never through this handle
        table.borrow()[0].force().unwrap();
        assert!(future.is_ready());
    }

    #[test]
    fn test_future_result_outlives_table() {
        let table = table_with_const(5);
        let future = FutureResult::<i32>::new(TaskId::new(0), &table);
        drop(table);

        // already resolved, so the handle keeps the node alive on its own
        assert_eq!(future.get().unwrap(), 5);
    }
}
