//! API server and routes

mod mcp;
pub mod middleware;
pub mod routes;
mod server;

pub use server::ApiServer;
