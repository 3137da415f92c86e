//! Per-session artifact storage.
//!
//! Every captured cell produces three flat, native-endian
//! dumps without header or checksum:
//!
//! ```text
//! <root>/<session>/frame_<row>_<col>__flux.bin
//! <root>/<session>/calibrated_data_binary/frame_<row>_<col>_calibrated.bin
//! <root>/<session>/temperature_data_binary/frame_<row>_<col>_temperature.bin
//! ```
//!
//! The session name is the local start time,
//! `%Y-%m-%d_%H-%M-%S`.

use std::{
    fs::{self, File},
    io::{BufWriter, Cursor, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use byteordered::ByteOrdered;
use chrono::Local;
use ndarray::Array2;
use serde::Serialize;
use tracing::{info, warn};
use zerocopy::AsBytes;

use crate::{camera::Resolution, error::StorageError, grid::GridIndex};

pub const CALIBRATED_DIR: &str = "calibrated_data_binary";
pub const TEMPERATURE_DIR: &str = "temperature_data_binary";
pub const REPORT_FILE: &str = "scan_report.json";

pub const SESSION_NAME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Where the three artifacts of one cell go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub raw: PathBuf,
    pub calibrated: PathBuf,
    pub temperature: PathBuf,
}

/// Output directory of one scan run.
#[derive(Debug, Clone)]
pub struct Session {
    name: String,
    dir: PathBuf,
}

impl Session {
    /// Start a session under `root`, named by the current
    /// local time. A session started within the same second
    /// as an earlier one gets a `_<n>` suffix.
    pub fn create(root: &Path) -> Result<Self, StorageError> {
        let stamp = Local::now().format(SESSION_NAME_FORMAT).to_string();
        Self::create_unique(root, &stamp)
    }

    /// Start a session named `base`, or `base_1`, `base_2`, ...
    /// if that directory already exists.
    pub fn create_unique(root: &Path, base: &str) -> Result<Self, StorageError> {
        let mut name = base.to_string();
        let mut n = 0;
        while root.join(&name).exists() {
            n += 1;
            name = format!("{}_{}", base, n);
        }
        Self::create_named(root, &name)
    }

    /// Start a session with an explicit name. Existing
    /// directories are reused and their artifacts overwritten.
    pub fn create_named(root: &Path, name: &str) -> Result<Self, StorageError> {
        let dir = root.join(name);
        if dir.exists() {
            warn!(dir = %dir.display(), "session directory exists; artifacts will be overwritten");
        }
        create_dir(&dir)?;
        info!(dir = %dir.display(), "session started");
        Ok(Session {
            name: name.to_string(),
            dir,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_paths(&self, index: GridIndex) -> ArtifactPaths {
        ArtifactPaths {
            raw: self.dir.join(format!("frame_{}__flux.bin", index)),
            calibrated: self
                .dir
                .join(CALIBRATED_DIR)
                .join(format!("frame_{}_calibrated.bin", index)),
            temperature: self
                .dir
                .join(TEMPERATURE_DIR)
                .join(format!("frame_{}_temperature.bin", index)),
        }
    }

    /// Write the artifacts of one cell, creating the
    /// sub-directories on demand. Either all three files are
    /// written or none is left behind.
    pub fn store(
        &self,
        index: GridIndex,
        raw: &[u8],
        calibrated: &[u16],
        temperature: &[f32],
    ) -> Result<ArtifactPaths, StorageError> {
        let paths = self.artifact_paths(index);
        let writes: [(&Path, &[u8]); 3] = [
            (paths.raw.as_path(), raw),
            (paths.calibrated.as_path(), calibrated.as_bytes()),
            (paths.temperature.as_path(), temperature.as_bytes()),
        ];

        for (done, (path, bytes)) in writes.iter().enumerate() {
            if let Err(e) = write_bytes(path, bytes) {
                for (written, _) in &writes[..done] {
                    if let Err(rm) = fs::remove_file(written) {
                        warn!(path = %written.display(), "could not remove partial artifact: {}", rm);
                    }
                }
                return Err(e);
            }
        }
        Ok(paths)
    }

    /// Serialize `report` as pretty JSON at the session root.
    pub fn write_report<T: Serialize>(&self, report: &T) -> Result<PathBuf> {
        let path = self.dir.join(REPORT_FILE);
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.flush()?;
        Ok(path)
    }
}

fn create_dir(dir: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(dir).map_err(|source| StorageError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    let write = || -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(bytes)?;
        writer.flush()
    };
    write().map_err(|source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn read_exact_len(path: &Path, expected: usize) -> Result<Vec<u8>, StorageError> {
    let bytes = fs::read(path).map_err(|source| StorageError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.len() != expected {
        return Err(StorageError::Length {
            path: path.to_path_buf(),
            expected,
            found: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Read a raw or calibrated artifact of `pixels` samples.
pub fn read_samples(path: &Path, pixels: usize) -> Result<Vec<u16>, StorageError> {
    let bytes = read_exact_len(path, pixels * 2)?;
    let mut rdr = ByteOrdered::native(Cursor::new(bytes));
    (0..pixels)
        .map(|_| rdr.read_u16())
        .collect::<std::io::Result<_>>()
        .map_err(|source| StorageError::Read {
            path: path.to_path_buf(),
            source,
        })
}

/// Read a temperature artifact as a `(height, width)` map.
pub fn read_temperature_map(path: &Path, resolution: Resolution) -> Result<Array2<f32>> {
    let pixels = resolution.pixels();
    let bytes = read_exact_len(path, pixels * 4)?;
    let mut rdr = ByteOrdered::native(Cursor::new(bytes));
    let values = (0..pixels)
        .map(|_| rdr.read_f32())
        .collect::<std::io::Result<Vec<f32>>>()
        .with_context(|| format!("decoding {}", path.display()))?;
    Ok(Array2::from_shape_vec(
        (resolution.height, resolution.width),
        values,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn artifact_layout() {
        let session = Session {
            name: "2025-01-01_00-00-00".into(),
            dir: PathBuf::from("/out/2025-01-01_00-00-00"),
        };
        let paths = session.artifact_paths(GridIndex::new(3, 4));
        assert_eq!(
            paths.raw,
            Path::new("/out/2025-01-01_00-00-00/frame_3_4__flux.bin")
        );
        assert_eq!(
            paths.calibrated,
            Path::new("/out/2025-01-01_00-00-00/calibrated_data_binary/frame_3_4_calibrated.bin")
        );
        assert_eq!(
            paths.temperature,
            Path::new("/out/2025-01-01_00-00-00/temperature_data_binary/frame_3_4_temperature.bin")
        );
    }

    #[test]
    fn session_name_is_a_timestamp() -> Result<()> {
        let root = TempDir::new()?;
        let session = Session::create(root.path())?;
        assert!(chrono::NaiveDateTime::parse_from_str(session.name(), SESSION_NAME_FORMAT).is_ok());
        assert!(session.dir().is_dir());
        Ok(())
    }

    #[test]
    fn store_and_read_back() -> Result<()> {
        let root = TempDir::new()?;
        let session = Session::create_named(root.path(), "s")?;
        let res = Resolution {
            width: 3,
            height: 2,
        };

        let calibrated: Vec<u16> = vec![1, 2, 3, 400, 500, 60000];
        let raw = calibrated.as_bytes().to_vec();
        let temps: Vec<f32> = vec![20.5, 21., -3.25, 100., 0., 37.125];
        let paths = session.store(GridIndex::new(0, 1), &raw, &calibrated, &temps)?;

        assert_eq!(fs::metadata(&paths.raw)?.len(), 12);
        assert_eq!(fs::metadata(&paths.calibrated)?.len(), 12);
        assert_eq!(fs::metadata(&paths.temperature)?.len(), 24);

        assert_eq!(read_samples(&paths.calibrated, res.pixels())?, calibrated);
        let map = read_temperature_map(&paths.temperature, res)?;
        assert_eq!(map.dim(), (2, 3));
        assert_eq!(map[(1, 2)], 37.125);
        assert_eq!(map[(0, 2)], -3.25);
        Ok(())
    }

    #[test]
    fn short_artifact_is_rejected() -> Result<()> {
        let root = TempDir::new()?;
        let path = root.path().join("frame.bin");
        fs::write(&path, [0u8; 5])?;
        let err = read_samples(&path, 3).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Length {
                expected: 6,
                found: 5,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn failed_store_leaves_no_artifacts() -> Result<()> {
        let root = TempDir::new()?;
        let session = Session::create_named(root.path(), "s")?;
        let index = GridIndex::new(2, 3);
        let paths = session.artifact_paths(index);
        // A directory in place of the temperature file makes
        // the last write fail.
        fs::create_dir_all(&paths.temperature)?;

        let err = session
            .store(index, &[0; 4], &[0; 2], &[0.; 2])
            .unwrap_err();
        assert!(matches!(err, StorageError::Write { .. }));
        assert!(!paths.raw.exists());
        assert!(!paths.calibrated.exists());
        Ok(())
    }

    #[test]
    fn timestamped_sessions_never_share_a_directory() -> Result<()> {
        let root = TempDir::new()?;
        let first = Session::create_unique(root.path(), "2025-01-01_00-00-00")?;
        let second = Session::create_unique(root.path(), "2025-01-01_00-00-00")?;
        let third = Session::create_unique(root.path(), "2025-01-01_00-00-00")?;
        assert_eq!(first.name(), "2025-01-01_00-00-00");
        assert_eq!(second.name(), "2025-01-01_00-00-00_1");
        assert_eq!(third.name(), "2025-01-01_00-00-00_2");
        assert!(second.dir().is_dir());
        Ok(())
    }

    #[test]
    fn sessions_reuse_existing_directories() -> Result<()> {
        let root = TempDir::new()?;
        for _ in 0..2 {
            let session = Session::create_named(root.path(), "same")?;
            session.store(GridIndex::new(0, 0), &[0, 0], &[0], &[0.])?;
        }
        Ok(())
    }
}
