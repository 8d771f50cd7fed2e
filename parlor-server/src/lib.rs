#![cfg_attr(not(test), forbid(unsafe_code))]

//! Parlor server library: the chat room core plus its HTTP surface.

pub mod app_state;
pub mod domain;
pub mod handlers;
pub mod http;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod tracer;
