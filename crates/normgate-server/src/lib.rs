//! Normgate HTTP server.
//!
//! The gateway fronts a Dify LLM platform and a Neo4j standards graph,
//! adding identity, task lifecycle, file custody, result persistence and
//! asynchronous job execution on top of the two stateless upstreams.

pub mod extractors;
pub mod files;
pub mod graph;
pub mod jobs;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use routes::build_router;
pub use state::AppState;
