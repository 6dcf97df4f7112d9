//! Client-side authentication and session bootstrapping for the expense
//! approval app.
//!
//! ARCHITECTURE
//! ============
//! A redirect artifact in the URL, the ambient provider session and the
//! user's profile row are reconciled by [`services::resolver`] into a single
//! [`state::view::Resolution`]. The [`app::AuthController`] applies that
//! resolution to the [`state::router::ViewRouter`] at mount and again for
//! every provider event, so both entry points share one code path.
//!
//! The identity provider and the profile store are external collaborators
//! behind the traits in [`provider`].

pub mod app;
pub mod config;
pub mod error;
pub mod provider;
pub mod redirect;
pub mod services;
pub mod state;
pub mod storage;
