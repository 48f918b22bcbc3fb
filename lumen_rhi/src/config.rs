//! Configuration for context creation and validation output

use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use crate::error::{Error, Result};

/// Presentation target and GPU selection options
///
/// Built from any window type exposing raw handles (winit, sdl, ...).
/// The handles are borrowed: the window must outlive every context
/// created from this configuration.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceConfig {
    /// Native window handle
    pub window: RawWindowHandle,
    /// Native display/instance handle
    pub display: RawDisplayHandle,
    /// Let the backend pick the physical device (discrete GPUs first)
    pub gpu_autodetect: bool,
    /// Number of GPUs the application requires
    pub required_gpus: u32,
}

impl SurfaceConfig {
    /// Capture the raw handles of `window`, with autodetection and one GPU
    pub fn from_window<W: HasWindowHandle + HasDisplayHandle>(window: &W) -> Result<Self> {
        let window_handle = window.window_handle()
            .map_err(|e| Error::InitializationFailed(format!("Failed to get window handle: {}", e)))?;
        let display_handle = window.display_handle()
            .map_err(|e| Error::InitializationFailed(format!("Failed to get display handle: {}", e)))?;

        Ok(Self {
            window: window_handle.as_raw(),
            display: display_handle.as_raw(),
            gpu_autodetect: true,
            required_gpus: 1,
        })
    }
}

/// Validation message severity filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything, including info and verbose
    All,
}

/// Destination of validation messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutput {
    /// Colored output on stderr
    Console,
    /// Plain text appended to a file
    File(String),
    /// Both console and file
    Both(String),
}

/// Validation message category filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: true,
        }
    }
}

/// Counters collected by the validation messenger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

/// Context configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Enable the validation layer and debug messenger
    pub enable_validation: bool,
    /// Application name reported to the driver
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Number of frames the CPU may record ahead of the GPU
    pub frames_in_flight: u32,
    /// FIFO presentation when true, mailbox/immediate when available otherwise
    pub vsync: bool,
    pub debug_severity: DebugSeverity,
    pub debug_output: DebugOutput,
    pub debug_message_filter: DebugMessageFilter,
    /// Panic inside the validation callback on any error message
    pub panic_on_error: bool,
    /// Abort the process on validation errors (for debugger attachment)
    pub break_on_validation_error: bool,
    pub enable_validation_stats: bool,
}

impl Config {
    /// Check the values that would otherwise fail deep inside the backend
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::InitializationFailed(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Lumen Application".to_string(),
            app_version: (1, 0, 0),
            frames_in_flight: 2,
            vsync: true,
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            debug_output: DebugOutput::Console,
            debug_message_filter: DebugMessageFilter::default(),
            panic_on_error: false,
            break_on_validation_error: false,
            enable_validation_stats: false,
        }
    }
}
