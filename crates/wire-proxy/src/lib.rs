//! Transparent TCP interception proxy engine for the dbtap project.
//!
//! This crate implements the generic accept/relay core that sits between a
//! client application and a real backend server. Every byte is forwarded
//! unmodified in both directions; a copy of each direction's stream is
//! mirrored into a pluggable [`TapEndpoint`] pair so protocol-aware
//! extractors can reconstruct messages out-of-band.
//!
//! # Architecture
//!
//! ```text
//! Client  <--TCP-->  wire-proxy  <--TCP-->  Backend
//!                       |
//!                 [Observer taps]
//!                       |
//!                 [Ledger Sink]
//! ```
//!
//! The engine accepts a client connection, creates a [`DialogContext`], asks
//! the configured [`ObserverFactory`] for a matched pair of tap endpoints,
//! dials the backend through a [`ConnectionBuilder`], and runs two concurrent
//! relay legs until either side closes or errors. The proxy never alters
//! traffic based on tap output; taps are a pure mirror.

pub mod builder;
pub mod dialog;
pub mod engine;
pub mod observer;

// Re-export the primary public types at the crate root for convenience.
pub use builder::{BuildError, ConnectionBuilder, TcpConnectionBuilder};
pub use dialog::DialogContext;
pub use engine::{EngineConfig, ProxyEngine};
pub use observer::{DumpObserverFactory, ObserverFactory, ObserverPair, TapEndpoint, TapError};
