mod binding;
pub(crate) mod node;
mod runner;
pub(crate) mod task;

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::TaskId;
use crate::error::SchedulerError;

pub use crate::engine::binding::{Binding, FutureResult, IntoBinding, Literal};
pub use crate::engine::node::TaskExecution;
pub use crate::engine::runner::Diagnostics;

pub(crate) use crate::engine::node::Node;
pub(crate) use crate::engine::runner::{prime, run_all};

/// The node storage of a single scheduler, in registration order.
pub(crate) type Table = RefCell<Vec<Rc<Node>>>;

/// A tuple of [`Binding`]s feeding one task.
///
/// The bindings are produced left to right, and the first failure stops the
/// whole tuple, so a task never runs with a partially produced argument list.
pub trait Bindings {
    /// The produced values, in the same order as the bindings.
    type Values;

    /// Produces every value in the tuple.
    fn produce(&self) -> Result<Self::Values, SchedulerError>;

    /// Returns the tasks this tuple reads from, in argument order.
    fn dependencies(&self) -> Vec<TaskId>;
}

/// A tuple of arguments accepted by [`Scheduler::add`](crate::Scheduler::add).
///
/// Implemented for tuples of up to twelve [`IntoBinding`] values, mixing plain
/// values and [`FutureResult`]s freely.
pub trait Arguments {
    type Bindings: Bindings + 'static;

    fn into_bindings(self) -> Self::Bindings;
}

/// A function that can be registered as a task body.
///
/// Implemented for every `Fn` whose parameters match the argument tuple
/// component-wise, so `|a: f32, b: f32| a + b` is a `Callable<(f32, f32)>`.
pub trait Callable<Args>: 'static {
    type Output;

    fn call(&self, args: Args) -> Self::Output;
}

impl Bindings for () {
    type Values = ();

    fn produce(&self) -> Result<(), SchedulerError> {
        Ok(())
    }

    fn dependencies(&self) -> Vec<TaskId> {
        vec![]
    }
}

impl Arguments for () {
    type Bindings = ();

    fn into_bindings(self) -> Self::Bindings {}
}

impl<Func, Out> Callable<()> for Func
where
    Func: Fn() -> Out + 'static,
{
    type Output = Out;

    fn call(&self, _: ()) -> Out {
        (self)()
    }
}

macro_rules! impl_args {
    ($($A:ident),*) => {
        #[allow(non_snake_case)]
        impl<$($A),*> Bindings for ($($A,)*)
        where
            $($A: Binding),* {
            type Values = ($($A::Value,)*);

            fn produce(&self) -> Result<Self::Values, SchedulerError> {
                let ($($A,)*) = self;
                Ok(($($A.produce()?,)*))
            }

            fn dependencies(&self) -> Vec<TaskId> {
                let ($($A,)*) = self;
                let mut dependencies = Vec::new();
                $(dependencies.extend($A.dependency());)*
                dependencies
            }
        }

        #[allow(non_snake_case)]
        impl<$($A),*> Arguments for ($($A,)*)
        where
            $($A: IntoBinding),* {
            type Bindings = ($($A::Binding,)*);

            fn into_bindings(self) -> Self::Bindings {
                let ($($A,)*) = self;
                ($($A.into_binding(),)*)
            }
        }

        #[allow(non_snake_case)]
        impl<Func, Out, $($A),*> Callable<($($A,)*)> for Func
        where
            Func: Fn($($A),*) -> Out + 'static {
            type Output = Out;

            fn call(&self, ($($A,)*): ($($A,)*)) -> Out {
                (self)($($A),*)
            }
        }
    };
}

impl_args!(A);
impl_args!(A, B);
impl_args!(A, B, C);
impl_args!(A, B, C, D);
impl_args!(A, B, C, D, E);
impl_args!(A, B, C, D, E, F);
impl_args!(A, B, C, D, E, F, G);
impl_args!(A, B, C, D, E, F, G, H);
impl_args!(A, B, C, D, E, F, G, H, I);
impl_args!(A, B, C, D, E, F, G, H, I, J);
impl_args!(A, B, C, D, E, F, G, H, I, J, K);
impl_args!(A, B, C, D, E, F, G, H, I, J, K, L);
