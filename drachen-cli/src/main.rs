// Drachen
// Copyright (c) The Project Drachen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand};
use log::{info, warn};

use drachen_codec::perm::image_permutation;
use drachen_codec::{
    BlockSchedule, DecoderOptions, EncoderOptions, FrameDecoder, FrameEncoder,
};

#[derive(Parser)]
#[command(name = "drachen", version, about = "Drachen frame-stream codec tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode input files into a Drachen stream, one frame per file.
    Encode {
        /// Output stream path.
        #[arg(short, long)]
        output: PathBuf,

        /// Frame size in bytes. Defaults to the length of the first input.
        #[arg(long)]
        frame_size: Option<u32>,

        /// Uniform heuristic block size.
        #[arg(long)]
        block_size: Option<u32>,

        /// Image geometry ROWSxCOLSxCOMPONENTS[+OFFSET][:BWxBH]; reorders
        /// frame bytes into per-component tiles before encoding.
        #[arg(long)]
        image: Option<String>,

        /// Input files, one frame each, in stream order.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Decode a Drachen stream, writing one file per frame.
    Decode {
        /// Input stream path.
        input: PathBuf,

        /// Directory the frames are written into, named by their recorded
        /// frame names.
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Fail unless the stream's frame size matches.
        #[arg(long)]
        frame_size: Option<u32>,
    },
}

fn main() {
    pretty_env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Encode { output, frame_size, block_size, image, inputs } => {
            encode(&output, frame_size, block_size, image.as_deref(), &inputs)
        }
        Command::Decode { input, out_dir, frame_size } => decode(&input, &out_dir, frame_size),
    };

    if let Err(err) = result {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}

fn encode(
    output: &Path,
    frame_size: Option<u32>,
    block_size: Option<u32>,
    image: Option<&str>,
    inputs: &[PathBuf],
) -> Result<(), Box<dyn Error>> {
    let frame_size = match frame_size {
        Some(size) => size,
        None => {
            let len = fs::metadata(&inputs[0])?.len();
            u32::try_from(len).map_err(|_| "first input is too large for a frame")?
        }
    };

    let mut options = EncoderOptions::default();

    if let Some(block_size) = block_size {
        options.schedule = BlockSchedule::uniform(block_size)?;
    }

    if let Some(spec) = image {
        let geometry = ImageGeometry::parse(spec)?;
        options.permutation = Some(image_permutation(
            frame_size,
            geometry.offset,
            geometry.rows,
            geometry.cols,
            geometry.components,
            geometry.block_w,
            geometry.block_h,
        )?);
    }

    let start = Instant::now();

    // The encoder buffers its own writes.
    let mut encoder = FrameEncoder::try_new(File::create(output)?, frame_size, options)?;

    let mut bytes_in = 0u64;
    for input in inputs {
        let frame = fs::read(input)?;
        if frame.len() != frame_size as usize {
            return Err(format!(
                "{}: expected {} bytes, found {}",
                input.display(),
                frame_size,
                frame.len()
            )
            .into());
        }

        bytes_in += frame.len() as u64;
        encoder.encode(input.to_string_lossy().as_bytes(), &frame)?;
    }

    let bytes_out = encoder.bytes_written();
    encoder.finish()?;

    info!(
        "encoded {} frames: {} bytes in, {} bytes out ({:.1}%) in {:.3}s",
        inputs.len(),
        bytes_in,
        bytes_out,
        100.0 * bytes_out as f64 / bytes_in.max(1) as f64,
        start.elapsed().as_secs_f64(),
    );

    Ok(())
}

fn decode(input: &Path, out_dir: &Path, frame_size: Option<u32>) -> Result<(), Box<dyn Error>> {
    let start = Instant::now();

    // The decoder buffers its own reads.
    let mut decoder = FrameDecoder::try_new(File::open(input)?, DecoderOptions { frame_size })?;

    fs::create_dir_all(out_dir)?;

    let mut frames = 0u64;
    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let path = out_dir.join(output_name(&frame.name_lossy(), frames));
                fs::write(&path, frame.data())?;
                frames += 1;
            }
            Err(drachen_core::errors::Error::EndOfStream) => break,
            Err(err) => return Err(err.into()),
        }
    }

    info!(
        "decoded {} frames of {} bytes in {:.3}s",
        frames,
        decoder.frame_size(),
        start.elapsed().as_secs_f64(),
    );

    Ok(())
}

/// Reduce a recorded frame name to a bare file name, so that a stream cannot
/// write outside the output directory.
fn output_name(name: &str, index: u64) -> PathBuf {
    match Path::new(name).file_name() {
        Some(file_name) => PathBuf::from(file_name),
        None => {
            warn!("frame {} has no usable name, writing it as frame-{}", index, index);
            PathBuf::from(format!("frame-{}", index))
        }
    }
}

struct ImageGeometry {
    rows: u32,
    cols: u32,
    components: u32,
    offset: u32,
    block_w: u32,
    block_h: u32,
}

impl ImageGeometry {
    /// Parse `ROWSxCOLSxCOMPONENTS[+OFFSET][:BWxBH]`.
    fn parse(spec: &str) -> Result<ImageGeometry, String> {
        let bad = || format!("invalid image geometry: {}", spec);

        let (dims, blocks) = match spec.split_once(':') {
            Some((dims, blocks)) => (dims, Some(blocks)),
            None => (spec, None),
        };

        let (dims, offset) = match dims.split_once('+') {
            Some((dims, offset)) => (dims, offset.parse().map_err(|_| bad())?),
            None => (dims, 0),
        };

        let mut parts = dims.split('x');
        let mut next = || -> Result<u32, String> {
            parts.next().and_then(|part| part.parse().ok()).ok_or_else(bad)
        };
        let rows = next()?;
        let cols = next()?;
        let components = next()?;
        if parts.next().is_some() {
            return Err(bad());
        }

        let (block_w, block_h) = match blocks {
            Some(blocks) => {
                let (w, h) = blocks.split_once('x').ok_or_else(bad)?;
                (w.parse().map_err(|_| bad())?, h.parse().map_err(|_| bad())?)
            }
            None => (8, 8),
        };

        Ok(ImageGeometry { rows, cols, components, offset, block_w, block_h })
    }
}

#[cfg(test)]
mod tests {
    use super::{output_name, ImageGeometry};
    use std::path::PathBuf;

    #[test]
    fn verify_image_geometry_parse() {
        let geometry = ImageGeometry::parse("480x640x3").unwrap();
        assert_eq!(
            (geometry.rows, geometry.cols, geometry.components),
            (480, 640, 3)
        );
        assert_eq!((geometry.offset, geometry.block_w, geometry.block_h), (0, 8, 8));

        let geometry = ImageGeometry::parse("16x16x1+32:4x2").unwrap();
        assert_eq!(geometry.offset, 32);
        assert_eq!((geometry.block_w, geometry.block_h), (4, 2));

        assert!(ImageGeometry::parse("16x16").is_err());
        assert!(ImageGeometry::parse("16x16x1x9").is_err());
        assert!(ImageGeometry::parse("16x16x1:4").is_err());
    }

    #[test]
    fn verify_output_name_is_sanitized() {
        assert_eq!(output_name("../../etc/passwd", 0), PathBuf::from("passwd"));
        assert_eq!(output_name("shots/frame-1.raw", 1), PathBuf::from("frame-1.raw"));
        assert_eq!(output_name("..", 2), PathBuf::from("frame-2"));
    }
}
