#![deny(unused)]
//! Agent Gateway and HTTP surface for Workbench.
//!
//! [`AgentGateway`] is the façade composing the tool registry, command runner
//! and provider router; [`GatewayServer`] exposes it over HTTP.

pub mod agent;
pub mod server;

pub use agent::{AgentGateway, Caller};
pub use server::{AppState, GatewayServer, USER_HEADER};
