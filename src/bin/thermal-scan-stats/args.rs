use anyhow::{ensure, Result};
use clap::value_t_or_exit;
use std::path::PathBuf;
use thermal_scan::{arg, args_parser, camera::Resolution, opt};

pub struct Args {
    pub session: PathBuf,
    pub resolution: Resolution,
    pub preview: Option<PathBuf>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("thermal-scan-stats")
            .setting(clap::AppSettings::AllowLeadingHyphen)
            .about("Compute temperature stats of a recorded scan session.")
            .arg(opt!("width").required(true).help("Frame width in pixels"))
            .arg(opt!("height").required(true).help("Frame height in pixels"))
            .arg(
                opt!("preview")
                    .short("p")
                    .help("Write a 16-bit grayscale PNG per cell into this directory"),
            )
            .arg(opt!("min").help("Temperature mapped to black (default: session minimum)"))
            .arg(opt!("max").help("Temperature mapped to white (default: session maximum)"))
            .arg(
                arg!("session")
                    .required(true)
                    .help("Session directory written by thermal-scan"),
            )
            .get_matches();

        let session = value_t_or_exit!(matches, "session", PathBuf);
        let width = value_t_or_exit!(matches, "width", usize);
        let height = value_t_or_exit!(matches, "height", usize);
        ensure!(width > 0 && height > 0, "frame size must be non-zero");

        let preview = matches.value_of("preview").map(PathBuf::from);
        let min = matches
            .is_present("min")
            .then(|| value_t_or_exit!(matches.value_of("min"), f64));
        let max = matches
            .is_present("max")
            .then(|| value_t_or_exit!(matches.value_of("max"), f64));
        if let (Some(min), Some(max)) = (min, max) {
            ensure!(min < max, "--min must be below --max");
        }

        Ok(Args {
            session,
            resolution: Resolution { width, height },
            preview,
            min,
            max,
        })
    }
}
