//! Real-time proctoring alerts for an exam portal.
//!
//! Student clients report tab switches over a WebSocket channel; each report
//! is appended to the alert store and fanned out to every connected teacher.
//! A read-only dashboard snapshot is served over HTTP.

pub mod api;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod proctor;
pub mod store;
pub mod telemetry;

pub use error::{ProctorError, Result};
