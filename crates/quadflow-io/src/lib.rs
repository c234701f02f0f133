use std::{io::Write, path::{Path, PathBuf}};

use encode::{EncodingError, FluidFrameEncoder};
use quadflow_fluids::eulerian::QuadtreeFluid2D;

pub mod as_bytes;
pub mod decode;
pub mod encode;

pub trait EncodeFluid {
    fn encode_state<W: Write>(&self, encoder: &mut FluidFrameEncoder<W>) -> Result<(), EncodingError>;
}

impl EncodeFluid for QuadtreeFluid2D {
    fn encode_state<W: Write>(&self, encoder: &mut FluidFrameEncoder<W>) -> Result<(), EncodingError> {
        let samples: Vec<_> = self.samples().collect();

        encoder.encode_section(samples.len(), samples.iter().map(|s| s.region))?;
        encoder.encode_section(samples.len(), samples.iter().map(|s| s.density))?;

        Ok(())
    }
}

/// Frame files are numbered from zero and padded to the width of the last frame number.
fn frame_path(dir: &Path, num_frames: u64, frame: u64) -> PathBuf {
    let max_digits = num_frames.saturating_sub(1).checked_ilog10().unwrap_or(0) + 1;
    let digits = frame.checked_ilog10().unwrap_or(0) + 1;
    let zeros = max_digits.saturating_sub(digits);

    dir.join(format!("{}{frame}.dat", "0".repeat(zeros as usize)))
}
