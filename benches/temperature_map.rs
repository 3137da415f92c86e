use std::{path::Path, time::Duration};

use criterion::*;
use thermal_scan::{
    camera::{Camera, CameraConnector, Resolution},
    scan::samples_from_bytes,
    sim::SimulatedConnector,
};

fn temperature(c: &mut Criterion) {
    let resolution = Resolution {
        width: 640,
        height: 480,
    };
    let connector = SimulatedConnector::new(resolution);
    let license = connector
        .load_license(Path::new("license_BENCH.wlic"))
        .expect("license");
    let mut camera = connector.connect(&license).expect("camera");
    camera.start_frame_grabber().expect("grabber");

    let mut raw = vec![0u8; resolution.frame_len()];
    camera
        .capture_frame(&mut raw, Duration::from_secs(1))
        .expect("frame");
    let samples = samples_from_bytes(&raw);

    c.bench_function("capture_frame", |b| {
        b.iter(|| {
            camera
                .capture_frame(&mut raw, Duration::from_secs(1))
                .unwrap();
        })
    });

    c.bench_function("calibrate", |b| {
        b.iter_batched_ref(
            || samples.clone(),
            |frame| camera.calibrate_in_place(frame, 31.5),
            BatchSize::LargeInput,
        )
    });

    c.bench_function("raw_to_celsius", |b| {
        let res = camera.temperature_resolution();
        b.iter(|| {
            samples
                .iter()
                .map(|&s| camera.raw_to_celsius(s, res))
                .collect::<Vec<f32>>()
        })
    });
}

criterion_group! {
    name = temperature_map;
    config = Criterion::default().sample_size(10);
    targets = temperature
}

criterion_main!(temperature_map);
