//! # SITL Host
//!
//! The hosted real-time substrate that lets flight-controller firmware run
//! as an ordinary process and fly against an external flight-dynamics
//! simulator instead of real hardware.
//!
//! ## Features
//!
//! - **Monotonic clock**: microsecond and wrapping millisecond time from a captured epoch
//! - **Simulator bridge**: backend selection, output-limit checks and a one-shot handshake
//! - **Channel mapping**: motor/servo to simulator receiver-output table
//! - **Endpoint resolution**: deterministic IPv6-first lookup and URI-style display
//! - **Main-loop guard**: non-blocking single-permit lock for the control step
//! - **Process lifecycle**: re-exec reset, clean shutdown, and lock-up failure mode
//!
//! ## Quick Start
//!
//! ```rust
//! use sitl_host::{BridgeConfig, ChannelMapping, SimulatorBackend, SimulatorBridge, TaskTable};
//! use sitl_host::bridge::SocketLink;
//!
//! let config = BridgeConfig {
//!     backend: SimulatorBackend::None,
//!     mapping: ChannelMapping::parse("M01-01,S01-02").unwrap(),
//!     ..BridgeConfig::default()
//! };
//!
//! let mut tasks = TaskTable::new();
//! let mut bridge = SimulatorBridge::new(config);
//! bridge.start(SocketLink::new(), &mut tasks);
//! assert!(!bridge.io_enabled());
//! ```
//!
//! ## Architecture
//!
//! - [`clock`] - Monotonic time source
//! - [`address`] - Endpoint resolution and formatting
//! - [`chanmap`] - Output channel mapping
//! - [`bridge`] - Simulator backend selection and handshake
//! - [`guard`] - Main-loop mutual exclusion
//! - [`lifecycle`] - Reset, shutdown and failure mode
//! - [`context`] - Per-process context tying the above together
//! - [`config`] - Command-line settings
//! - [`scheduler`] - Hosted task table
//! - [`platform`] - Hosted answers to hardware queries

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod address;
pub mod bridge;
pub mod chanmap;
pub mod clock;
pub mod config;
pub mod context;
pub mod guard;
pub mod lifecycle;
pub mod platform;
pub mod scheduler;

// Re-export main public types for convenience
pub use address::{ResolvedAddress, SocketKind};
pub use bridge::{BridgeConfig, BridgeState, SimulatorBackend, SimulatorBridge};
pub use chanmap::{ChannelMapping, MappingError, OutputTarget};
pub use clock::Clock;
pub use config::HostSettings;
pub use context::HostContext;
pub use guard::MainLoopGuard;
pub use lifecycle::{FailureMode, SystemRequest};
pub use scheduler::{TaskId, TaskScheduler, TaskTable};
