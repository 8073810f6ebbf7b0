//! Shared-memory benchmark common library
//!
//! Constants, segment layout and configuration loading shared by the IPC
//! crate, the server and the probe client.
//!
//! # Module Structure
//!
//! - [`consts`] - Segment size, trial count, markers, default key
//! - [`layout`] - Marker decoding, acknowledgement frame, result encoding
//! - [`config`] - Configuration loading traits and types
//!
//! # Usage
//!
//! ```rust
//! use shm_bench_common::consts::{BUFSIZE, TRIALS};
//! use shm_bench_common::layout::ack_frame;
//!
//! let frame = ack_frame();
//! assert_eq!(frame.len(), BUFSIZE);
//! assert!(TRIALS > 0);
//! ```

#![deny(missing_docs)]

pub mod config;
pub mod consts;
pub mod layout;

pub use config::{
    BenchConfig, ConfigError, ConfigLoader, LogLevel, ServerConfig, SharedConfig, parse_ipc_key,
};
pub use layout::Marker;
