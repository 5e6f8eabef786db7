use std::any::Any;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// A type-erased, reference-counted task result.
pub(crate) type Dynamic = Rc<dyn Any>;

/// Opaque identifier of a task registered in a [`Scheduler`](crate::Scheduler).
///
/// Ids are handed out by the scheduler in registration order, starting from
/// zero, and are never reused. They are only meaningful for the scheduler that
/// produced them (and its clones).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(usize);

impl TaskId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the position of the task in registration order.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Debug for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
