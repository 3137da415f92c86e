use std::{ffi::OsString, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{anyhow, Result};
use clap::{ArgMatches, ErrorKind};
use thermal_scan::{args_parser, cli::Inflector, opt, ScanConfig};

pub struct Args {
    pub config: ScanConfig,
    pub wait_trigger: bool,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        Self::from_iter(std::env::args_os())
    }

    pub fn from_iter<I, T>(args: I) -> Result<Args>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let parsed = args_parser!("thermal-scan")
            .about("Scan a grid, capturing one thermal frame per cell.")
            .arg(
                opt!("config")
                    .short("c")
                    .help("JSON config file; command line options override it"),
            )
            .arg(opt!("serial address").short("p").help("Serial device of the stage controller"))
            .arg(opt!("baud rate").help("Serial baud rate (default: 115200)"))
            .arg(opt!("license path").short("l").help("Camera license file"))
            .arg(opt!("output root").short("o").help("Directory receiving session folders"))
            .arg(opt!("rows").short("r").help("Inclusive row range, `start-end` or `n`"))
            .arg(opt!("cols").short("k").help("Inclusive column range, `start-end` or `n`"))
            .arg(opt!("ack timeout ms").help("Acknowledgement timeout (default: 1000)"))
            .arg(opt!("capture timeout ms").help("Frame capture timeout (default: 1000)"))
            .arg(opt!("ack marker").help("Text that acknowledges a ping (default: pong)"))
            .arg(opt!("range").help("Thermal range, `low` or `high`"))
            .arg(opt!("simulated width").help("Sensor width of the simulated camera"))
            .arg(opt!("simulated height").help("Sensor height of the simulated camera"))
            .arg(
                opt!("strict ack")
                    .takes_value(false)
                    .help("Skip a cell whose reply lacks the acknowledgement marker"),
            )
            .arg(
                opt!("wait trigger")
                    .short("t")
                    .takes_value(false)
                    .help("Run a session on every <RUN> from the controller, until <STOP>"),
            )
            .get_matches_from_safe(args);

        let matches = match parsed {
            Ok(m) => m,
            Err(e) if e.kind == ErrorKind::HelpDisplayed || e.kind == ErrorKind::VersionDisplayed => {
                e.exit()
            }
            Err(e) => return Err(anyhow!("{}", e.message)),
        };

        let mut config = match matches.value_of("config") {
            Some(path) => ScanConfig::from_json_path(&PathBuf::from(path))?,
            None => ScanConfig::default(),
        };

        override_with(&matches, "serial address", &mut config.serial_address)?;
        override_with(&matches, "baud rate", &mut config.baud_rate)?;
        override_with(&matches, "license path", &mut config.license_path)?;
        override_with(&matches, "output root", &mut config.output_root)?;
        override_with(&matches, "rows", &mut config.rows)?;
        override_with(&matches, "cols", &mut config.cols)?;
        override_with(&matches, "ack timeout ms", &mut config.ack_timeout_ms)?;
        override_with(&matches, "capture timeout ms", &mut config.capture_timeout_ms)?;
        override_with(&matches, "ack marker", &mut config.ack_marker)?;
        override_with(&matches, "range", &mut config.range)?;
        override_with(&matches, "simulated width", &mut config.simulated_width)?;
        override_with(&matches, "simulated height", &mut config.simulated_height)?;
        if matches.is_present("strict ack") {
            config.accept_partial_reply = false;
        }

        Ok(Args {
            config,
            wait_trigger: matches.is_present("wait trigger"),
        })
    }
}

fn override_with<T>(matches: &ArgMatches, name: &str, field: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: Display,
{
    if let Some(val) = matches.value_of(name) {
        *field = val
            .parse()
            .map_err(|e| anyhow!("invalid --{} `{}`: {}", name.to_kebab_case(), val, e))?;
    }
    Ok(())
}
