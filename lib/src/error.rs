//! Custom Error and Result types for this library

use std::{any::Any, sync::PoisonError};
use thiserror::Error;

use crate::device::{CaptureConfigBuilderError, CaptureDeviceBuilderError};

/// Custom Error type for this library
#[derive(Error, Debug)]
pub enum RCapLibError {
    /// The device was asked to open while it already holds a native handle
    #[error("device already open: {_0}")]
    AlreadyOpen(String),

    /// The operation requires an open device
    #[error("device not open: {_0}")]
    NotOpen(String),

    /// A capture was started without any consumer for its packets
    #[error("device not ready: {_0}")]
    DeviceNotReady(String),

    /// The operation conflicts with a running background capture
    #[error("invalid operation during background capture: {_0}")]
    InvalidOperationDuringCapture(String),

    /// No interface with the requested name exists on this host
    #[error("device not found: {_0}")]
    DeviceNotFound(String),

    /// Error coming directly off the wire (native capture layer)
    #[error("wire error: {_0}")]
    Wire(String),

    /// Error obtaining a lock on shared capture state
    #[error("failed to get lock: {_0}")]
    Lock(String),

    /// Generic thread error
    #[error("thread error: {_0}")]
    ThreadError(String),

    /// Error resulting from failure to build a capture device
    #[error("failed to build capture device: {_0}")]
    CaptureDeviceBuild(#[from] CaptureDeviceBuilderError),

    /// Error resulting from failure to build a capture config
    #[error("failed to build capture config: {_0}")]
    CaptureConfigBuild(#[from] CaptureConfigBuilderError),
}

impl From<Box<dyn Any + Send>> for RCapLibError {
    fn from(value: Box<dyn Any + Send>) -> Self {
        if let Some(s) = value.downcast_ref::<&'static str>() {
            Self::ThreadError(format!("Thread panicked with: {}", s))
        } else if let Some(s) = value.downcast_ref::<String>() {
            Self::ThreadError(format!("Thread panicked with: {}", s))
        } else {
            Self::ThreadError("Thread panicked with an unknown type".into())
        }
    }
}

impl<T> From<PoisonError<T>> for RCapLibError {
    fn from(value: PoisonError<T>) -> Self {
        Self::Lock(value.to_string())
    }
}

impl From<std::io::Error> for RCapLibError {
    fn from(value: std::io::Error) -> Self {
        Self::Wire(value.to_string())
    }
}

/// Custom Result type for this library. All Errors exposed by this library
/// will be returned as [`RCapLibError`]
pub type Result<T> = std::result::Result<T, RCapLibError>;
