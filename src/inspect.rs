use std::{error::Error, path::PathBuf};

use log::info;
use quadflow_io::decode::FluidDataDecoder;

pub fn inspect(path: PathBuf) -> Result<(), Box<dyn Error>> {
    let mut decoder = FluidDataDecoder::new(path.clone());
    let meta = decoder.decode_metadata()?;
    info!("{}: {}x{} grid, {} frames, dt {}", path.display(), meta.resolution, meta.resolution, meta.num_frames, meta.dt);

    println!("{:>6} {:>8} {:>12}", "frame", "leaves", "mass");

    let mut frame = 0;
    while let Some(data) = decoder.decode_frame()? {
        println!("{frame:>6} {:>8} {:>12.3}", data.leaf_count(), data.total_mass());
        frame += 1;
    }

    Ok(())
}
