//! Per-unit fault isolation
//!
//! A panic inside one unit of work is caught at the unit boundary and
//! reported as that unit's result. Sibling units and the caller keep running.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::strategy::{ParallelError, ParallelStrategy};

/// A unit of work that panicked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panicked {
    pub message: String,
}

impl Panicked {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { message }
    }
}

impl fmt::Display for Panicked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panicked: {}", self.message)
    }
}

impl std::error::Error for Panicked {}

/// Map `f` over `items` with `strategy`, catching panics per item.
///
/// The outer `Result` fails only when the pool cannot be set up. Units must
/// not share mutable state; each owns whatever it opens.
pub fn map_isolated<S, I, T, F>(
    strategy: &S,
    items: &[I],
    f: F,
) -> Result<Vec<Result<T, Panicked>>, ParallelError>
where
    S: ParallelStrategy,
    I: Sync,
    T: Send,
    F: Fn(&I) -> T + Sync + Send,
{
    strategy.par_map(items, |item| {
        panic::catch_unwind(AssertUnwindSafe(|| f(item))).map_err(Panicked::from_payload)
    })
}
