//! Error types for the acquisition pipeline.
//!
//! Library code reports failures through the typed errors
//! below. The binaries wrap them in [`anyhow`] and only
//! surface a [`Fatal`] to decide the process exit status.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures of the serial handshake channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("could not open serial device `{address}`: {source}")]
    Unavailable {
        address: String,
        #[source]
        source: serialport::Error,
    },

    #[error("incomplete write: {written} of {expected} bytes sent")]
    WriteIncomplete { written: usize, expected: usize },

    #[error("no reply within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("channel is closed")]
    Closed,

    #[error("serial i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Failures reported by the camera collaborator.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("license invalid: {0}")]
    License(String),

    #[error("could not connect camera: {0}")]
    Connect(String),

    #[error("invalid resolution {width}x{height}, core detection error")]
    Resolution { width: usize, height: usize },

    #[error("default settings failed: {0}")]
    Settings(String),

    #[error("could not set thermal range: {0}")]
    Range(String),

    #[error("sensor temperature unavailable: {0}")]
    SensorTemperature(String),

    #[error("frame grabber error: {0}")]
    FrameGrabber(String),

    #[error("capture failed: {0}")]
    Capture(String),
}

/// Result type for camera operations.
pub type CameraResult<T> = Result<T, CameraError>;

/// Failures of the artifact storage sink.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: expected {expected} bytes, found {found}", path.display())]
    Length {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
}

/// Start-up failures that abort the whole run.
///
/// Each variant maps to its own process exit status so
/// operators can tell them apart without reading logs.
#[derive(Debug, Error)]
pub enum Fatal {
    #[error("serial channel unavailable: {0}")]
    Channel(#[source] ChannelError),

    #[error("{0}")]
    LicenseInvalid(#[source] CameraError),

    #[error("{0}")]
    CameraConnect(#[source] CameraError),

    #[error("{0}")]
    ZeroResolution(#[source] CameraError),

    #[error("{0}")]
    DefaultSettings(#[source] CameraError),

    #[error("{0}")]
    FrameGrabber(#[source] CameraError),

    #[error("invalid configuration: {0:#}")]
    Config(anyhow::Error),

    #[error("session i/o failed: {0:#}")]
    Session(anyhow::Error),
}

impl Fatal {
    pub fn exit_code(&self) -> i32 {
        match self {
            Fatal::Channel(_) => 1,
            Fatal::LicenseInvalid(_) => 2,
            Fatal::CameraConnect(_) => 3,
            Fatal::ZeroResolution(_) => 4,
            Fatal::DefaultSettings(_) => 5,
            Fatal::FrameGrabber(_) => 6,
            Fatal::Config(_) => 10,
            Fatal::Session(_) => 11,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let cam = || CameraError::Connect("x".into());
        let fatals = vec![
            Fatal::Channel(ChannelError::Closed),
            Fatal::LicenseInvalid(cam()),
            Fatal::CameraConnect(cam()),
            Fatal::ZeroResolution(cam()),
            Fatal::DefaultSettings(cam()),
            Fatal::FrameGrabber(cam()),
            Fatal::Config(anyhow::anyhow!("bad")),
            Fatal::Session(anyhow::anyhow!("io")),
        ];
        let mut codes: Vec<i32> = fatals.iter().map(Fatal::exit_code).collect();
        assert_eq!(&codes[..6], &[1, 2, 3, 4, 5, 6]);
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), fatals.len());
        assert!(codes.iter().all(|&c| c != 0));
    }

    #[test]
    fn write_incomplete_message() {
        let err = ChannelError::WriteIncomplete {
            written: 3,
            expected: 11,
        };
        assert_eq!(err.to_string(), "incomplete write: 3 of 11 bytes sent");
    }
}
