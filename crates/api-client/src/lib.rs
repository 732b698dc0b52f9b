//! REST gateway for the tourism directory backend.
//!
//! One client implements the three gateway ports from `turismo-core`. Every
//! request is signed with the bearer token read from the session store at
//! call time; an absent token sends the request unauthenticated and lets the
//! server decide. Wire payloads use the backend's Spanish JSON field names
//! and are converted to the core models at the boundary.

mod client;
mod types;

pub use client::{ApiClient, BASE_URL_ENV};
