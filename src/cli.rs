//! Helpers shared by the accompanying binaries.
//!
//! APIs here shouldn't be considered stable / used as a
//! library.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
pub use clap::{App, Arg};
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
pub use inflector::Inflector;
use lazy_static::lazy_static;
use ndarray::Array2;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use regex::Regex;
use tracing_subscriber::EnvFilter;

use crate::{
    camera::Resolution,
    grid::GridIndex,
    storage::{read_temperature_map, TEMPERATURE_DIR},
};

#[macro_export]
macro_rules! args_parser {
    ($name:expr) => {{
        $crate::cli::App::new($name)
            .version(clap::crate_version!())
            .author(clap::crate_authors!())
    }};
}

#[macro_export]
macro_rules! arg {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name).value_name(&$name.to_screaming_snake_case())
    }};
}

#[macro_export]
macro_rules! opt {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name)
            .long(&$name.to_kebab_case())
            .value_name(&$name.to_screaming_snake_case())
    }};
}

/// Log to stderr, filtered by `RUST_LOG` (`info` when
/// unset).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call (e.g. from tests) keeps the first
    // subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A temperature artifact found in a session directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemperatureFile {
    pub index: GridIndex,
    pub path: PathBuf,
}

/// The grid index encoded in a temperature artifact name.
pub fn index_from_file_name(path: &Path) -> Option<GridIndex> {
    lazy_static! {
        static ref RE: Regex = Regex::new(r"^frame_(\d+)_(\d+)_temperature\.bin$").unwrap();
    }
    let name = path.file_name()?.to_str()?;
    let caps = RE.captures(name)?;
    Some(GridIndex::new(caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Every temperature artifact of `session`, in grid order.
pub fn temperature_files(session: &Path) -> Result<Vec<TemperatureFile>> {
    let pattern = session.join(TEMPERATURE_DIR).join("frame_*_temperature.bin");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| anyhow!("session path is not valid unicode: {}", session.display()))?;

    let mut files = vec![];
    for entry in glob(pattern)? {
        let path = entry?;
        if let Some(index) = index_from_file_name(&path) {
            files.push(TemperatureFile { index, path });
        }
    }
    files.sort_by_key(|f| f.index);
    Ok(files)
}

/// Load temperature maps in parallel, with a progress bar
/// on stderr.
pub fn read_maps_par(
    files: Vec<TemperatureFile>,
    resolution: Resolution,
) -> impl ParallelIterator<Item = Result<(TemperatureFile, Array2<f32>)>> {
    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {wide_bar:cyan/blue} {pos:>7}/{len:7}"),
    );

    files
        .into_par_iter()
        .map(move |file| {
            let map = read_temperature_map(&file.path, resolution)
                .with_context(|| format!("reading cell {}", file.index))?;
            Ok((file, map))
        })
        .inspect(move |_| bar.inc(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Session;
    use tempfile::TempDir;

    #[test]
    fn file_names() {
        assert_eq!(
            index_from_file_name(Path::new("/x/frame_3_12_temperature.bin")),
            Some(GridIndex::new(3, 12))
        );
        assert_eq!(index_from_file_name(Path::new("frame_3_4__flux.bin")), None);
        assert_eq!(
            index_from_file_name(Path::new("frame_3_4_calibrated.bin")),
            None
        );
    }

    #[test]
    fn discovers_and_reads_session_maps() -> Result<()> {
        let root = TempDir::new()?;
        let session = Session::create_named(root.path(), "s")?;
        let resolution = Resolution {
            width: 3,
            height: 2,
        };
        for (row, col) in [(1u32, 0u32), (0, 1), (0, 0)].iter() {
            let temps = vec![*row as f32 * 10. + *col as f32; 6];
            session.store(GridIndex::new(*row, *col), &[0; 12], &[0; 6], &temps)?;
        }

        let files = temperature_files(session.dir())?;
        let order: Vec<_> = files.iter().map(|f| f.index.token()).collect();
        assert_eq!(order, vec!["0_0", "0_1", "1_0"]);

        let mut maps = read_maps_par(files, resolution).collect::<Result<Vec<_>>>()?;
        maps.sort_by_key(|(f, _)| f.index);
        assert_eq!(maps[2].1.dim(), (2, 3));
        assert!(maps[2].1.iter().all(|&t| t == 10.));
        Ok(())
    }
}
