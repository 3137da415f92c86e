mod args;
mod preview;

use std::fs;

use anyhow::{ensure, Context, Result};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde_derive::*;
use tracing::info;

use thermal_scan::{
    cli::{init_logging, read_maps_par, temperature_files},
    stats::{Stats, Summary},
    storage::read_temperature_map,
    GridIndex,
};

use crate::{args::Args, preview::PreviewScale};

fn main() -> Result<()> {
    init_logging();
    let args = Args::from_cmd_line()?;

    let files = temperature_files(&args.session)?;
    ensure!(
        !files.is_empty(),
        "no temperature artifacts under {}",
        args.session.display()
    );
    info!(cells = files.len(), session = %args.session.display(), "reading session");

    let (mut cells, cumulative) = read_maps_par(files.clone(), args.resolution)
        .map(|item| -> Result<_> {
            let (file, map) = item?;
            let stats = Stats::from_values(map.iter().map(|&t| t as f64));
            Ok(CellStats {
                index: file.index,
                path: file.path.display().to_string(),
                stats,
            })
        })
        .try_fold(
            || (vec![], Stats::default()),
            |mut acc, cell| -> Result<_> {
                let cell = cell?;
                acc.1 += &cell.stats;
                acc.0.push(cell);
                Ok(acc)
            },
        )
        .try_reduce(
            || (vec![], Stats::default()),
            |mut acc1, acc2| -> Result<_> {
                acc1.0.extend(acc2.0);
                acc1.1 += &acc2.1;
                Ok(acc1)
            },
        )?;
    cells.sort_by_key(|c| c.index);

    #[derive(Debug, Serialize)]
    struct OutputJson {
        session: String,
        width: usize,
        height: usize,
        cells: Vec<CellJson>,
        cumulative: Summary,
    }

    #[derive(Debug, Serialize)]
    struct CellJson {
        index: GridIndex,
        path: String,
        #[serde(flatten)]
        stats: Summary,
    }

    serde_json::to_writer_pretty(
        std::io::stdout().lock(),
        &OutputJson {
            session: args.session.display().to_string(),
            width: args.resolution.width,
            height: args.resolution.height,
            cells: cells
                .iter()
                .map(|c| CellJson {
                    index: c.index,
                    path: c.path.clone(),
                    stats: Summary::from(&c.stats),
                })
                .collect(),
            cumulative: Summary::from(&cumulative),
        },
    )?;
    println!();

    if let Some(dir) = &args.preview {
        let min = args.min.unwrap_or(cumulative.min);
        let max = args.max.unwrap_or(cumulative.max);
        let scale = PreviewScale::new(min, max, dir.clone())?;
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

        let resolution = args.resolution;
        let written = files
            .into_par_iter()
            .map(|file| -> Result<()> {
                let map = read_temperature_map(&file.path, resolution)?;
                scale.write_png(file.index, &map)?;
                Ok(())
            })
            .try_fold(
                || 0usize,
                |acc, res| -> Result<_> {
                    res?;
                    Ok(acc + 1)
                },
            )
            .try_reduce(|| 0, |a, b| Ok(a + b))?;

        eprintln!("Wrote {} previews to {}", written, dir.display());
        eprintln!(
            "Transform equation: V = {} + {} C",
            scale.coeffs[0], scale.coeffs[1]
        );
        eprintln!(
            "Inverse equation: C = {} + {} V",
            -scale.coeffs[0] / scale.coeffs[1],
            1. / scale.coeffs[1]
        );
    }

    Ok(())
}

struct CellStats {
    index: GridIndex,
    path: String,
    stats: Stats,
}
