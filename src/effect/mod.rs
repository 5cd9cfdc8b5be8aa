//! Typed, lazy, interruptible effects.
//!
//! An [`Effect`] describes a computation that needs an environment, succeeds
//! with a value, or fails with a [`Cause`]. A cause separates the three ways
//! a run can go wrong:
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | [`Cause::Fail`] | an expected, typed failure (`Effect::Error`) |
//! | [`Cause::Die`] | a [`Defect`]: a panic or a broken invariant |
//! | [`Cause::Interrupt`] | the run was cancelled |
//! | [`Cause::Parallel`] | two concurrent branches both failed |
//!
//! Combinators return concrete types and allocate nothing; call `.boxed()`
//! when you need type erasure:
//!
//! ```rust,ignore
//! use stillwater_query::effect::prelude::*;
//!
//! let effect = pure::<_, String, ()>(42)
//!     .map(|x| x + 1)
//!     .and_then(|x| pure(x * 2))
//!     .map(|x| x.to_string());
//! ```
//!
//! # Resources and interruption
//!
//! Effects are run as fibers by a [`Runtime`](crate::runtime::Runtime).
//! When a run is cancelled through its signal, its future is dropped and the
//! finalizers registered by [`acquire_release`], [`scoped`] and
//! [`EffectExt::on_interrupt`] run to completion before the caller observes
//! [`Cause::Interrupt`].
//!
//! # Environment cloning
//!
//! The environment (`Env`) must implement `Clone`. Boxing clones it into the
//! boxed future. For [`Context`](crate::context::Context) this is an `Arc`
//! bump.

pub mod boxed;
pub mod bracket;
pub mod cause;
pub mod combinators;
pub mod constructors;
pub mod exit;
pub mod ext;
pub(crate) mod fiber;
pub mod prelude;
pub mod reader;
pub mod scope;
pub mod tracing;
pub(crate) mod trait_def;

pub use trait_def::Effect;

pub use ext::EffectExt;

pub use boxed::{BoxFuture, BoxedEffect};

pub use cause::{Cause, CauseCategory, Defect};
pub use exit::Exit;

pub use combinators::{
    AndThen, Die, Fail, FromAsync, FromFn, FromResult, Map, MapErr, OnInterrupt, OrElse, Pure,
    Tap, ZipPar,
};

pub use reader::{Asks, Local};

pub use bracket::{acquire_release, AcquireRelease};

pub use scope::{scoped, Finalizer, Scope, Scoped};

pub use constructors::{asks, die, fail, from_async, from_fn, from_result, local, pure};

pub use self::tracing::{EffectTracingExt, Instrument};

#[cfg(test)]
mod tests;
