//! Auth-flow services used by the controller.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the decision logic so the controller only wires
//! results into the view router. Everything here talks to the outside world
//! exclusively through the [`crate::provider`] traits.

pub mod account;
pub mod gate;
pub mod register;
pub mod resolver;
