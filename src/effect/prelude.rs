//! Convenient re-exports for writing effects.
//!
//! ```rust,ignore
//! use stillwater_query::effect::prelude::*;
//! ```

pub use crate::effect::boxed::{BoxFuture, BoxedEffect};
pub use crate::effect::bracket::acquire_release;
pub use crate::effect::cause::{Cause, CauseCategory, Defect};
pub use crate::effect::constructors::{
    asks, die, fail, from_async, from_fn, from_result, local, pure,
};
pub use crate::effect::exit::Exit;
pub use crate::effect::ext::EffectExt;
pub use crate::effect::scope::{scoped, Scope};
pub use crate::effect::tracing::EffectTracingExt;
pub use crate::effect::trait_def::Effect;

pub use crate::context::{service, Context, Tag};
