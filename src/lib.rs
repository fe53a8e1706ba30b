//! # nearby - location tools for LLM agents
//!
//! An MCP server exposing location lookups as callable tools: nearby place
//! search, geocoding, travel distance (Google Maps) and weather (Meteoblue).
//!
//! ## Architecture
//!
//! 1. **Provider clients** ([`places::PlacesClient`], [`weather::WeatherService`])
//!    wrap the upstream web services behind trait seams, with deterministic
//!    fixtures when the mock switches are enabled.
//! 2. **Shaping** ([`shape::shape`]) derives photo and map links, sorts by
//!    rating and caps the result set.
//! 3. **The tool surface** ([`server::LocationServer`]) registers the four
//!    tools and renders plain text for the calling agent.
//!
//! Weather responses are cached per coordinate for an hour, with stale
//! entries served as a fallback when a refetch fails.
//!
//! ## Example
//! ```no_run
//! use nearby::{Config, LocationServer};
//! use rmcp::ServiceExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = Config::from_env();
//!     let server = LocationServer::from_config(&config)?;
//!     let service = server.serve(rmcp::transport::stdio()).await?;
//!     service.waiting().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod http;
pub mod places;
pub mod server;
pub mod shape;
pub mod weather;

pub use config::{Config, Transport};
pub use places::{PlacesClient, PlacesError, RankBy, SearchQuery};
pub use server::LocationServer;
pub use shape::{shape, PlaceRecord, MAX_RESULTS};
pub use weather::{WeatherError, WeatherService};
