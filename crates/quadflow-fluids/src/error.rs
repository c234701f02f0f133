use std::fmt;

use thiserror::Error;

use crate::{fields::Field, region::Region};

pub const MIN_RESOLUTION: u32 = 2;
/// Largest grid whose neighbour table (`4·N²` entries) is reserved up front.
pub const MAX_RESOLUTION: u32 = 1 << 10;

/// A stage of the solver pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Diffuse,
    Project,
    Advect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Diffuse => "diffuse",
            Stage::Project => "project",
            Stage::Advect => "advect",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum FluidError {
    #[error("grid resolution {0} must be a power of two in [{min}, {max}]", min = MIN_RESOLUTION, max = MAX_RESOLUTION)]
    InvalidResolution(u32),
    #[error("{stage} produced a non-finite {field:?} ({value}) in cell {region}")]
    NonFinite {
        stage: Stage,
        field: Field,
        region: Region,
        value: f32,
    },
}
