//! API clients for external services
//!
//! - TMDB: Movie/TV metadata, search and discovery
//! - Backend: optional accounts and remote persistence (Supabase-style)

pub mod backend;
pub mod tmdb;

pub use backend::{BackendClient, BackendError, Session};
pub use tmdb::{TmdbClient, TmdbError};
