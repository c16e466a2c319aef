pub mod myers;
pub mod op;
pub mod patch;
pub mod script;
pub mod token;

pub use op::DiffOp;
pub use script::{EditScript, ScriptStats};
pub use token::{Granularity, tokenize};

use crate::err::Result;

/// A reversible difference between two values of `T`.
///
/// `patch` turns the old value into the new one and `revert` goes the other
/// way. Both check that their input is the value the diff was computed
/// against, so a diff applied to the wrong base fails instead of producing
/// garbage.
pub trait Diff<T: ?Sized + ToOwned> {
    fn from_compare(old: &T, new: &T, granularity: Granularity) -> Result<Self>
    where
        Self: Sized;
    /// Composes two adjacent diffs (old → mid, mid → new) into old → new.
    fn from_squash(base: &Self, squashing: &Self, granularity: Granularity) -> Result<Self>
    where
        Self: Sized;
    fn patch(&self, old: &T) -> Result<T::Owned>;
    fn revert(&self, new: &T) -> Result<T::Owned>;
}
