//! The single per-process context shared by every hosted component.
//!
//! Built once at startup and handed out by reference (or `Arc`) instead of
//! living in statics. Settings are immutable after construction; the guard
//! and the pending system request are the only interior state.

use crate::clock::Clock;
use crate::config::HostSettings;
use crate::guard::MainLoopGuard;
use crate::lifecycle::{self, FailureMode, LaunchArgs, Lifecycle, SystemRequest};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

#[derive(Debug)]
pub struct HostContext {
    clock: Clock,
    guard: MainLoopGuard,
    lifecycle: Lifecycle,
    settings: HostSettings,
    pending: Mutex<Option<SystemRequest>>,
}

impl HostContext {
    /// Arms the clock; the epoch is the moment of construction.
    pub fn new(settings: HostSettings, args: LaunchArgs) -> Self {
        Self::with_clock(Clock::start(), settings, args)
    }

    pub fn with_clock(clock: Clock, settings: HostSettings, args: LaunchArgs) -> Self {
        Self {
            clock,
            guard: MainLoopGuard::new(),
            lifecycle: Lifecycle::new(args),
            settings,
            pending: Mutex::new(None),
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn guard(&self) -> &MainLoopGuard {
        &self.guard
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn settings(&self) -> &HostSettings {
        &self.settings
    }

    /// Queue a request for the entry point. The first request wins; later
    /// ones are dropped and `false` is returned.
    pub fn request(&self, request: SystemRequest) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.is_some() {
            debug!(?request, "system request already pending");
            return false;
        }
        *pending = Some(request);
        true
    }

    pub fn request_reset(&self) -> bool {
        self.request(self.lifecycle.reset())
    }

    pub fn request_reset_to_bootloader(&self) -> bool {
        self.request(self.lifecycle.reset_to_bootloader())
    }

    pub fn take_request(&self) -> Option<SystemRequest> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn failure_mode(&self, mode: FailureMode) -> ! {
        lifecycle::failure_mode(&self.clock, mode)
    }
}
