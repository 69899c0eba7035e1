//! MQTT IP Reporter Library
//!
//! Core functionality for the `mqtt-ip-reporter` CLI tool: a publisher that
//! announces a host's interface address over MQTT, and a monitor that
//! collects those announcements and keeps an HTML status page current.
//! It includes modules for config loading, MQTT client operations, message
//! aggregation, page rendering, and interface lookup.

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod error;
pub mod interface;
pub mod logging;
pub mod monitor;
pub mod mqtt;
pub mod publisher;
pub mod render;
pub mod util;
