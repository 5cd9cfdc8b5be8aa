//! Zero-cost combinator types for effect composition.
//!
//! This module contains concrete types returned by effect combinators.
//! Unlike boxed effects, these types don't allocate on the heap and can be
//! optimized by the compiler.
//!
//! Most users won't need to work with these types directly. Instead,
//! use the combinator methods on `EffectExt` which return these types
//! behind `impl Effect<...>`.

mod and_then;
mod die;
mod fail;
mod from_async;
mod from_fn;
mod from_result;
mod map;
mod map_err;
mod on_interrupt;
mod or_else;
mod pure;
mod tap;
mod zip_par;

pub use and_then::AndThen;
pub use die::Die;
pub use fail::Fail;
pub use from_async::FromAsync;
pub use from_fn::FromFn;
pub use from_result::FromResult;
pub use map::Map;
pub use map_err::MapErr;
pub use on_interrupt::OnInterrupt;
pub use or_else::OrElse;
pub use pure::Pure;
pub use tap::Tap;
pub use zip_par::ZipPar;
