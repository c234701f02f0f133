use std::{fs::File, io::{BufWriter, Write}, path::PathBuf};

use thiserror::Error;

use quadflow_fluids::{scene::Scene, Fluid};

use crate::{frame_path, EncodeFluid};

use super::as_bytes::AsBytes;

pub struct FluidDataEncoder {
    /// The path to the directory into which the fluid data will be placed.
    path: PathBuf,
    num_frames: u64,
    current_frame: u64,
}

impl FluidDataEncoder {
    pub fn new(path: PathBuf, num_frames: u64) -> Result<FluidDataEncoder, EncodingError> {
        std::fs::create_dir_all(&path)?;

        Ok(Self {
            path,
            num_frames,
            current_frame: 0,
        })
    }

    #[inline]
    pub fn frames_written(&self) -> u64 {
        self.current_frame
    }

    pub fn encode_metadata<F: Fluid>(&mut self, scene: &Scene<F>, dt: f32) -> Result<(), EncodingError> {
        let path = self.path.join("_meta");
        let mut writer = File::create(path)?;

        writer.write_all(&scene.fluid.resolution().to_bytes())?;
        writer.write_all(&self.num_frames.to_bytes())?;
        writer.write_all(&dt.to_bytes())?;

        Ok(())
    }

    pub fn encode_frame<F>(&mut self, scene: &Scene<F>) -> Result<(), EncodingError>
    where
        F: Fluid + EncodeFluid,
    {
        if self.current_frame >= self.num_frames {
            return Err(EncodingError::TooManyFrames(self.num_frames));
        }

        let path = frame_path(&self.path, self.num_frames, self.current_frame);
        let writer = BufWriter::new(File::create(path)?);

        let mut encoder = FluidFrameEncoder { writer };
        scene.fluid.encode_state(&mut encoder)?;
        encoder.writer.flush()?;

        self.current_frame += 1;

        Ok(())
    }
}

pub struct FluidFrameEncoder<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> FluidFrameEncoder<W> {
    pub fn encode_section<const N: usize, T, I>(&mut self, len: usize, values: I) -> Result<(), EncodingError>
    where
        I: Iterator<Item = T>,
        T: AsBytes<N>,
    {
        self.writer.write_all(&(len as u64).to_ne_bytes())?;

        let bytes: Vec<_> = values.flat_map(|v| v.to_bytes()).collect();
        self.writer.write_all(&bytes)?;

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("export was opened for {0} frames")]
    TooManyFrames(u64),
}
