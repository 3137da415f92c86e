use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Result};
use byteordered::ByteOrdered;
use ndarray::Array2;
use thermal_scan::GridIndex;

/// Linear map from Celsius onto the full 16-bit gray scale.
pub struct PreviewScale {
    pub coeffs: [f64; 2],
    pub output: PathBuf,
}

impl PreviewScale {
    pub fn new(min: f64, max: f64, output: PathBuf) -> Result<Self> {
        ensure!(
            min.is_finite() && max.is_finite() && min < max,
            "preview range [{}, {}] is empty",
            min,
            max
        );
        let factor = u16::MAX as f64 / (max - min);
        Ok(PreviewScale {
            coeffs: [-min * factor, factor],
            output,
        })
    }

    pub fn transform(&self, val: f64) -> u16 {
        if !val.is_finite() {
            return 0;
        }
        let tval = self.coeffs[0] + self.coeffs[1] * val;
        tval.max(0.).min(u16::MAX as f64) as u16
    }

    pub fn output_path_for(&self, index: GridIndex) -> PathBuf {
        self.output.join(format!("frame_{}_temperature.png", index))
    }

    pub fn write_png(&self, index: GridIndex, map: &Array2<f32>) -> Result<PathBuf> {
        let path = self.output_path_for(index);
        write_png(&path, map, |t| self.transform(t as f64))?;
        Ok(path)
    }
}

fn write_png<F: Fn(f32) -> u16>(path: &Path, map: &Array2<f32>, scale: F) -> Result<()> {
    let image_writer = BufWriter::new(File::create(path)?);
    let mut png_writer = {
        let (ht, wid) = map.dim();
        let mut encoder = png::Encoder::new(image_writer, wid as u32, ht as u32);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::Sixteen);
        encoder.write_header()?
    };
    let mut png_streamer = ByteOrdered::be(png_writer.stream_writer());

    for &val in map.iter() {
        png_streamer.write_u16(scale(val))?;
    }
    png_streamer.into_inner().finish()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_maps_onto_full_scale() {
        let scale = PreviewScale::new(20., 40., PathBuf::new()).unwrap();
        assert_eq!(scale.transform(20.), 0);
        assert_eq!(scale.transform(40.), u16::MAX);
        assert_eq!(scale.transform(-5.), 0);
        assert_eq!(scale.transform(90.), u16::MAX);
        assert_eq!(scale.transform(f64::NAN), 0);
        let mid = scale.transform(30.) as i32;
        assert!((mid - u16::MAX as i32 / 2).abs() <= 1);
    }

    #[test]
    fn empty_range_is_rejected() {
        assert!(PreviewScale::new(30., 30., PathBuf::new()).is_err());
    }

    #[test]
    fn writes_decodable_png() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let scale = PreviewScale::new(0., 10., dir.path().to_path_buf())?;
        let map = Array2::from_shape_fn((2, 3), |(r, c)| (r * 3 + c) as f32);
        let path = scale.write_png(GridIndex::new(1, 2), &map)?;
        assert!(path.ends_with("frame_1_2_temperature.png"));

        let decoder = png::Decoder::new(File::open(&path)?);
        let (info, _) = decoder.read_info()?;
        assert_eq!((info.width, info.height), (3, 2));
        assert_eq!(info.bit_depth, png::BitDepth::Sixteen);
        Ok(())
    }
}
