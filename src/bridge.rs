//! Connection to an external flight-dynamics simulator.
//!
//! The bridge decides which backend is active, checks the channel mapping
//! against what that backend can drive, and runs the backend's handshake
//! once. Wire framing belongs to the backend-specific [`SimulatorLink`];
//! the bridge only sees whether init succeeded.
//!
//! ```text
//! Unselected --backend None------------------> Disabled
//! Unselected --backend set--> Connecting --ok--> Connected
//!                                 |
//!                                 +--limit exceeded / handshake failed--> Disabled
//! ```
//!
//! A failed attempt is not retried. The firmware keeps running in
//! configurator-only mode until the process is restarted.

use crate::address::{self, AddressError, SocketKind};
use crate::chanmap::ChannelMapping;
use crate::scheduler::{TaskId, TaskScheduler};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{SocketAddr, TcpStream, UdpSocket};
use tracing::{debug, error, info, warn};

pub const DEFAULT_SIM_HOST: &str = "127.0.0.1";

/// Serial task cadence on a host, whatever the backend.
pub const SERIAL_TASK_PERIOD_US: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SimulatorBackend {
    #[default]
    None,
    RealFlight,
    XPlane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub name: &'static str,
    pub cli_name: &'static str,
    pub transport: SocketKind,
    pub default_port: u16,
    pub max_outputs: usize,
    pub io_period_us: u32,
}

const REALFLIGHT: BackendDescriptor = BackendDescriptor {
    name: "RealFlight",
    cli_name: "rf",
    transport: SocketKind::Stream,
    default_port: 18083,
    max_outputs: 12,
    io_period_us: 10_000,
};

const XPLANE: BackendDescriptor = BackendDescriptor {
    name: "X-Plane",
    cli_name: "xp",
    transport: SocketKind::Datagram,
    default_port: 49000,
    max_outputs: 16,
    io_period_us: 5_000,
};

impl SimulatorBackend {
    /// Backend selected by a `--sim` value, `None` if unrecognised.
    pub fn from_cli_name(name: &str) -> Option<Self> {
        [SimulatorBackend::RealFlight, SimulatorBackend::XPlane]
            .into_iter()
            .find(|backend| backend.descriptor().is_some_and(|d| d.cli_name == name))
    }

    pub fn descriptor(self) -> Option<&'static BackendDescriptor> {
        match self {
            SimulatorBackend::None => None,
            SimulatorBackend::RealFlight => Some(&REALFLIGHT),
            SimulatorBackend::XPlane => Some(&XPLANE),
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().map_or("none", |d| d.name)
    }
}

impl fmt::Display for SimulatorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeState {
    Unselected,
    Connecting,
    Connected,
    /// Configurator-only; terminal for this process.
    Disabled,
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("{backend} supports a maximum of {max} PWM outputs, mapping has {count}")]
    MappingLimit {
        backend: &'static str,
        count: usize,
        max: usize,
    },

    #[error("address error: {0}")]
    Address(#[from] AddressError),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Simulator selection and wiring, fixed once startup is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub backend: SimulatorBackend,
    pub host: String,
    /// `None` uses the backend's default port.
    pub port: Option<u16>,
    pub use_imu: bool,
    pub mapping: ChannelMapping,
}

impl BridgeConfig {
    pub fn effective_port(&self) -> u16 {
        self.port
            .filter(|&port| port != 0)
            .or_else(|| self.backend.descriptor().map(|d| d.default_port))
            .unwrap_or(0)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            backend: SimulatorBackend::None,
            host: DEFAULT_SIM_HOST.to_string(),
            port: None,
            use_imu: false,
            mapping: ChannelMapping::new(),
        }
    }
}

/// What a backend's init sees.
#[derive(Debug, Clone, Copy)]
pub struct LinkParams<'a> {
    pub backend: SimulatorBackend,
    pub host: &'a str,
    pub port: u16,
    pub mapping: &'a ChannelMapping,
    pub use_imu: bool,
}

/// Backend-specific side of the bridge.
pub trait SimulatorLink: Send {
    /// Connect and handshake. Blocks for as long as the simulator takes.
    fn init(&mut self, params: &LinkParams<'_>) -> Result<(), BridgeError>;

    /// Exchange actuator and sensor data for one cycle.
    fn service(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    pub backend: SimulatorBackend,
    pub state: BridgeState,
    pub mapping_count: usize,
    pub last_error: Option<String>,
    pub io_errors: u64,
}

pub struct SimulatorBridge {
    config: BridgeConfig,
    state: BridgeState,
    last_error: Option<BridgeError>,
    io_errors: u64,
    link: Option<Box<dyn SimulatorLink>>,
}

impl SimulatorBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            state: BridgeState::Unselected,
            last_error: None,
            io_errors: 0,
            link: None,
        }
    }

    /// Run the selection and handshake. Only acts from `Unselected`.
    pub fn start<L>(&mut self, link: L, scheduler: &mut dyn TaskScheduler) -> BridgeState
    where
        L: SimulatorLink + 'static,
    {
        if self.state != BridgeState::Unselected {
            warn!(state = ?self.state, "[SIM] Bridge already started");
            return self.state;
        }

        scheduler.reschedule(TaskId::Serial, SERIAL_TASK_PERIOD_US);

        let Some(descriptor) = self.config.backend.descriptor() else {
            info!("[SIM] No interface specified. Configurator only.");
            self.state = BridgeState::Disabled;
            return self.state;
        };

        let count = self.config.mapping.count();
        if count > descriptor.max_outputs {
            let err = BridgeError::MappingLimit {
                backend: descriptor.name,
                count,
                max: descriptor.max_outputs,
            };
            error!("[SIM] Mapping error. {}", err);
            self.last_error = Some(err);
            self.state = BridgeState::Disabled;
            return self.state;
        }

        self.state = BridgeState::Connecting;
        info!("[SIM] Waiting for connection...");

        let mut link = link;
        let params = LinkParams {
            backend: self.config.backend,
            host: &self.config.host,
            port: self.config.effective_port(),
            mapping: &self.config.mapping,
            use_imu: self.config.use_imu,
        };

        match link.init(&params) {
            Ok(()) => {
                info!("[SIM] Connection with {} successfully established.", descriptor.name);
                self.link = Some(Box::new(link));
                self.state = BridgeState::Connected;
                scheduler.reschedule(TaskId::SimulatorIo, descriptor.io_period_us);
            }
            Err(e) => {
                error!("[SIM] Connection with {} NOT established: {}", descriptor.name, e);
                self.last_error = Some(e);
                self.state = BridgeState::Disabled;
            }
        }

        self.state
    }

    /// One cycle of simulator I/O. A no-op unless connected; failures are
    /// transient, counted, and leave the state alone.
    pub fn service(&mut self) -> Result<(), BridgeError> {
        if self.state != BridgeState::Connected {
            return Ok(());
        }

        match self.link.as_mut() {
            Some(link) => link.service().map_err(|e| {
                self.io_errors += 1;
                warn!("[SIM] I/O error: {}", e);
                e
            }),
            None => Ok(()),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn backend(&self) -> SimulatorBackend {
        self.config.backend
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn io_enabled(&self) -> bool {
        self.state == BridgeState::Connected
    }

    pub fn last_error(&self) -> Option<&BridgeError> {
        self.last_error.as_ref()
    }

    /// Failed [`service`](Self::service) cycles since connecting.
    pub fn io_errors(&self) -> u64 {
        self.io_errors
    }

    pub fn status(&self) -> BridgeStatus {
        BridgeStatus {
            backend: self.config.backend,
            state: self.state,
            mapping_count: self.config.mapping.count(),
            last_error: self.last_error.as_ref().map(ToString::to_string),
            io_errors: self.io_errors,
        }
    }
}

impl fmt::Debug for SimulatorBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatorBridge")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("last_error", &self.last_error)
            .field("io_errors", &self.io_errors)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum Transport {
    Stream(TcpStream),
    Datagram(UdpSocket),
}

/// Transport-level link: resolves the simulator endpoint and opens the
/// backend's socket. Payload framing is left to the backend modules.
#[derive(Debug, Default)]
pub struct SocketLink {
    transport: Option<Transport>,
}

impl SocketLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Local end of the open socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self.transport.as_ref()? {
            Transport::Stream(stream) => stream.local_addr().ok(),
            Transport::Datagram(socket) => socket.local_addr().ok(),
        }
    }
}

impl SimulatorLink for SocketLink {
    fn init(&mut self, params: &LinkParams<'_>) -> Result<(), BridgeError> {
        let descriptor = params
            .backend
            .descriptor()
            .ok_or_else(|| BridgeError::Handshake("no simulator backend selected".to_string()))?;

        let endpoint = address::resolve(Some(params.host), params.port, descriptor.transport)?;
        info!("[SIM] Connecting to {} at {}", descriptor.name, endpoint);
        debug!(use_imu = params.use_imu, outputs = params.mapping.count(), "[SIM] link parameters");

        let transport = match descriptor.transport {
            SocketKind::Stream => Transport::Stream(TcpStream::connect(endpoint.socket_addr())?),
            SocketKind::Datagram => {
                let socket = UdpSocket::bind(endpoint.local_wildcard())?;
                socket.connect(endpoint.socket_addr())?;
                Transport::Datagram(socket)
            }
        };

        self.transport = Some(transport);
        Ok(())
    }
}
