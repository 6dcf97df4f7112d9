//! Client-side view state.
//!
//! DESIGN
//! ======
//! The symbolic view names and the router that holds the current one are plain
//! values so the resolver can be tested without a rendering environment.

pub mod router;
pub mod view;
