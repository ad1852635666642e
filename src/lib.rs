//! Data layer of a microblogging service: a post store, a follow graph and a
//! fan-out-on-write activity feed with cursor pagination and a cache-aside
//! layer, served over HTTP.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub(crate) mod util;
