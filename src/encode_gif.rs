use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    composite::unpremultiply_rgba8_in_place,
    encode::{AnimationSink, SinkConfig},
    error::{TilecycleError, TilecycleResult},
    render::FrameRgba,
};

/// Options for [`GifSink`] animated GIF output.
#[derive(Clone, Debug)]
pub struct GifSinkOpts {
    /// Output GIF file path.
    pub out_path: PathBuf,
    /// Overwrite the output file if it already exists.
    pub overwrite: bool,
    /// Quantization speed passed to the GIF palette builder (1 = best
    /// quality, 30 = fastest).
    pub quantize_speed: i32,
}

impl GifSinkOpts {
    /// Create options for writing a GIF to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            quantize_speed: 10,
        }
    }
}

/// Sink that encodes frames into an animated GIF file.
///
/// Hold durations are carried in milliseconds but GIF delays have 10 ms
/// granularity; the remainder of each division is carried into the next
/// frame's delay so the total animation length stays exact.
pub struct GifSink {
    opts: GifSinkOpts,

    encoder: Option<gif::Encoder<BufWriter<File>>>,
    cfg: Option<SinkConfig>,
    carry_ms: u64,
    frames_written: u64,
}

impl GifSink {
    /// Create a new sink writing to the configured path.
    pub fn new(opts: GifSinkOpts) -> Self {
        Self {
            opts,
            encoder: None,
            cfg: None,
            carry_ms: 0,
            frames_written: 0,
        }
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl AnimationSink for GifSink {
    fn begin(&mut self, cfg: SinkConfig) -> TilecycleResult<()> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(TilecycleError::validation(
                "gif sink width/height must be non-zero",
            ));
        }
        if cfg.width > u32::from(u16::MAX) || cfg.height > u32::from(u16::MAX) {
            return Err(TilecycleError::validation(format!(
                "gif sink canvas {}x{} exceeds the format's 65535px limit",
                cfg.width, cfg.height
            )));
        }

        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(TilecycleError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }

        let file = File::create(&self.opts.out_path)
            .with_context(|| format!("create gif file '{}'", self.opts.out_path.display()))?;
        let mut encoder = gif::Encoder::new(
            BufWriter::new(file),
            cfg.width as u16,
            cfg.height as u16,
            &[],
        )
        .map_err(|e| TilecycleError::encode(format!("start gif stream: {e}")))?;

        if cfg.loop_forever {
            encoder
                .set_repeat(gif::Repeat::Infinite)
                .map_err(|e| TilecycleError::encode(format!("set gif loop flag: {e}")))?;
        }

        self.encoder = Some(encoder);
        self.cfg = Some(cfg);
        self.carry_ms = 0;
        self.frames_written = 0;
        Ok(())
    }

    fn push_frame(&mut self, frame: &FrameRgba, hold_ms: u64) -> TilecycleResult<()> {
        let cfg = self
            .cfg
            .ok_or_else(|| TilecycleError::encode("push_frame called before begin"))?;
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(TilecycleError::validation(format!(
                "frame is {}x{} but the sink was configured for {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }

        // The GIF quantizer wants straight alpha.
        let mut pixels = frame.data.clone();
        if frame.premultiplied {
            unpremultiply_rgba8_in_place(&mut pixels);
        }

        let (delay_cs, carry) = split_delay(hold_ms, self.carry_ms);
        self.carry_ms = carry;

        let mut gif_frame = gif::Frame::from_rgba_speed(
            frame.width as u16,
            frame.height as u16,
            &mut pixels,
            self.opts.quantize_speed,
        );
        gif_frame.delay = delay_cs;
        gif_frame.dispose = gif::DisposalMethod::Background;

        self.encoder
            .as_mut()
            .ok_or_else(|| TilecycleError::encode("push_frame called before begin"))?
            .write_frame(&gif_frame)
            .map_err(|e| TilecycleError::encode(format!("write gif frame: {e}")))?;

        self.frames_written += 1;
        Ok(())
    }

    fn end(&mut self) -> TilecycleResult<()> {
        if self.frames_written == 0 {
            return Err(TilecycleError::encode(
                "gif stream ended without any frames",
            ));
        }
        // Dropping the encoder writes the GIF trailer and flushes the file.
        self.encoder = None;
        Ok(())
    }
}

/// Convert a hold duration to GIF centiseconds, carrying the sub-10ms
/// remainder forward.
fn split_delay(hold_ms: u64, carry_ms: u64) -> (u16, u64) {
    let total = hold_ms + carry_ms;
    let delay_cs = (total / 10).min(u64::from(u16::MAX));
    let carry = if delay_cs == u64::from(u16::MAX) {
        0
    } else {
        total % 10
    };
    (delay_cs as u16, carry)
}

fn ensure_parent_dir(path: &Path) -> TilecycleResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output directory '{}'", parent.display()))?;
    }
    Ok(())
}
