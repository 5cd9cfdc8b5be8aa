//! ZipPar combinator - runs two effects concurrently.

use crate::effect::cause::Cause;
use crate::effect::trait_def::Effect;

/// Runs two effects concurrently and pairs their results.
///
/// Both effects always run to completion. When both fail, the failures
/// are combined into [`Cause::Parallel`], left before right.
pub struct ZipPar<Left, Right> {
    pub(crate) left: Left,
    pub(crate) right: Right,
}

impl<Left, Right> std::fmt::Debug for ZipPar<Left, Right> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipPar")
            .field("left", &"<effect>")
            .field("right", &"<effect>")
            .finish()
    }
}

impl<Left, Right> Effect for ZipPar<Left, Right>
where
    Left: Effect,
    Right: Effect<Error = Left::Error, Env = Left::Env>,
{
    type Output = (Left::Output, Right::Output);
    type Error = Left::Error;
    type Env = Left::Env;

    async fn run(self, env: &Self::Env) -> Result<Self::Output, Cause<Self::Error>> {
        let (left, right) = futures::join!(self.left.run(env), self.right.run(env));
        match (left, right) {
            (Ok(l), Ok(r)) => Ok((l, r)),
            (Err(l), Err(r)) => Err(Cause::both(l, r)),
            (Err(c), Ok(_)) | (Ok(_), Err(c)) => Err(c),
        }
    }
}
