mod args;

use std::process;

use anyhow::anyhow;
use tracing::{error, info};

use thermal_scan::{
    camera::{Camera, CameraSession},
    config::Backend,
    error::Fatal,
    handshake::{HandshakeChannel, Link, DEFAULT_POLL_INTERVAL},
    scan::{ScanController, ScanSettings},
    sim::SimulatedConnector,
    storage::Session,
    trigger::{Command, TriggerListener},
    ScanConfig,
};

use args::Args;

fn main() {
    thermal_scan::cli::init_logging();

    let code = match run() {
        Ok(()) => 0,
        Err(e) => {
            error!(code = e.exit_code(), "{}", e);
            e.exit_code()
        }
    };
    process::exit(code);
}

fn run() -> Result<(), Fatal> {
    let args = Args::from_cmd_line().map_err(Fatal::Config)?;
    let config = args.config;
    config.validate().map_err(Fatal::Config)?;

    let mut channel = HandshakeChannel::open(&config.serial_address, config.baud_rate)
        .map_err(Fatal::Channel)?
        .with_marker(config.ack_marker.clone());

    let connector = match config.backend {
        Backend::Simulated => SimulatedConnector::new(config.simulated_resolution()),
    };
    let mut camera = CameraSession::open(&connector, &config.license_path, config.range)?;
    info!(serial = camera.serial_number(), "camera session open");

    if !args.wait_trigger {
        return run_session(&mut channel, &mut camera, &config);
    }

    let mut listener = TriggerListener::new();
    loop {
        info!("waiting for <RUN>");
        let command = listener
            .wait(&mut channel, DEFAULT_POLL_INTERVAL * 10, None)
            .map_err(|e| Fatal::Session(anyhow!("trigger link failed: {}", e)))?;
        match command {
            Some(Command::Run) => run_session(&mut channel, &mut camera, &config)?,
            Some(Command::Stop) => {
                info!("stop requested");
                return Ok(());
            }
            None => continue,
        }
    }
}

fn run_session<L: Link, C: Camera>(
    channel: &mut HandshakeChannel<L>,
    camera: &mut CameraSession<C>,
    config: &ScanConfig,
) -> Result<(), Fatal> {
    let session =
        Session::create(&config.output_root).map_err(|e| Fatal::Session(e.into()))?;

    let report = ScanController::new(channel, camera, config.grid(), ScanSettings::from(config))
        .run(&session);

    let path = session.write_report(&report).map_err(Fatal::Session)?;
    info!(
        report = %path.display(),
        captured = report.captured(),
        skipped = report.skipped(),
        "session complete"
    );
    Ok(())
}
