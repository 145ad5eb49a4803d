//! Value model shared by the parser, the evaluator and the caches.

pub mod objects;
pub mod state;

pub use objects::{Dict, ObjRef, Object, StreamObject};
pub use state::{ContentState, EvalState, StateManager, TextState};
