use std::{fs::File, io::{BufReader, Read}, path::PathBuf};

use thiserror::Error;

use quadflow_fluids::region::Region;

use crate::{as_bytes::AsBytes, frame_path};

pub struct FluidDataDecoder {
    /// The path to the directory in which the fluid data resides.
    path: PathBuf,
    num_frames: u64,
    current_frame: u64,
}

impl FluidDataDecoder {
    pub fn new(path: PathBuf) -> FluidDataDecoder {
        Self {
            path,
            num_frames: 0,
            current_frame: 0,
        }
    }

    fn read_value<const N: usize, T: AsBytes<N>, R: Read>(reader: &mut R) -> Result<T, DecodingError> {
        let mut bytes = [0; N];
        reader.read_exact(&mut bytes)?;

        Ok(T::from_bytes(bytes))
    }

    /// Reads a length-prefixed section, refusing lengths the remaining bytes cannot hold.
    fn read_section<const N: usize, T: AsBytes<N>>(bytes: &mut &[u8], frame: u64) -> Result<Vec<T>, DecodingError> {
        let len = Self::read_value::<8, u64, _>(bytes)?;
        let needed = usize::try_from(len).ok().and_then(|len| len.checked_mul(N));

        let (section, rest) = match needed {
            Some(needed) if needed <= bytes.len() => bytes.split_at(needed),
            _ => {
                return Err(DecodingError::Truncated {
                    frame,
                    len,
                    available: bytes.len(),
                })
            }
        };
        *bytes = rest;

        Ok(section
            .chunks_exact(N)
            .map(|b| T::from_bytes(std::array::from_fn(|k| b[k])))
            .collect())
    }

    pub fn decode_metadata(&mut self) -> Result<FluidMetadata, DecodingError> {
        let path = self.path.join("_meta");
        let mut reader = BufReader::new(File::open(path)?);

        let resolution = Self::read_value::<4, u32, _>(&mut reader)?;
        let num_frames = Self::read_value::<8, u64, _>(&mut reader)?;
        let dt = Self::read_value::<4, f32, _>(&mut reader)?;

        self.num_frames = num_frames;

        Ok(FluidMetadata {
            resolution,
            num_frames,
            dt,
        })
    }

    /// Reads the next frame, or `None` once every frame announced by the metadata was read.
    pub fn decode_frame(&mut self) -> Result<Option<FluidFrameData>, DecodingError> {
        if self.current_frame >= self.num_frames {
            return Ok(None);
        }

        let frame = self.current_frame;
        let data = std::fs::read(frame_path(&self.path, self.num_frames, frame))?;
        let mut bytes = data.as_slice();

        let regions = Self::read_section::<16, Region>(&mut bytes, frame)?;
        let densities = Self::read_section::<4, f32>(&mut bytes, frame)?;
        if regions.len() != densities.len() {
            return Err(DecodingError::SectionMismatch {
                frame,
                regions: regions.len(),
                densities: densities.len(),
            });
        }

        if let Some(&region) = regions.iter().find(|r| r.start.cmpge(r.end).any()) {
            return Err(DecodingError::EmptyRegion { frame, region });
        }

        self.current_frame += 1;

        Ok(Some(FluidFrameData { regions, densities }))
    }

    pub fn reset(&mut self) {
        self.current_frame = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluidMetadata {
    pub resolution: u32,
    pub num_frames: u64,
    pub dt: f32,
}

/// One exported tick: every leaf rectangle and its density, in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct FluidFrameData {
    pub regions: Vec<Region>,
    pub densities: Vec<f32>,
}

impl FluidFrameData {
    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.regions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Region, f32)> + '_ {
        self.regions.iter().copied().zip(self.densities.iter().copied())
    }

    /// Density integrated over the domain.
    pub fn total_mass(&self) -> f32 {
        self.iter().map(|(region, density)| density * region.area() as f32).sum()
    }
}

#[derive(Debug, Error)]
pub enum DecodingError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("frame {frame} announces {len} entries but only {available} bytes remain")]
    Truncated {
        frame: u64,
        len: u64,
        available: usize,
    },
    #[error("frame {frame} holds an empty region {region}")]
    EmptyRegion {
        frame: u64,
        region: Region,
    },
    #[error("frame {frame} holds {regions} regions but {densities} densities")]
    SectionMismatch {
        frame: u64,
        regions: usize,
        densities: usize,
    },
}
