//! Frame producers bundled with the binary.
//!
//! Each source emits a new frame every `frame_interval` of wall time and
//! reports [`Readiness::EnoughData`] once it has one to show.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use scheduler::{Frame, FrameSource, Readiness};
use viewconfig::{SourceKind, ViewConfig};

const SOLID_PALETTE: [[u8; 4]; 4] = [
    [200, 40, 40, 255],
    [40, 200, 40, 255],
    [40, 40, 200, 255],
    [220, 220, 220, 255],
];

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

pub fn from_config(config: &ViewConfig) -> Result<Box<dyn FrameSource>> {
    let source = &config.source;
    let producer: Box<dyn FrameSource> = match source.kind {
        SourceKind::Pattern => Box::new(PatternSource::new(
            source.width,
            source.height,
            source.frame_interval,
            source.resize_every,
        )),
        SourceKind::Solid => Box::new(SolidSource::new(
            source.width,
            source.height,
            source.frame_interval,
            source.switch_after,
        )),
        SourceKind::Images => {
            let Some(dir) = &source.directory else {
                bail!("images source requires a directory");
            };
            Box::new(ImageSequenceSource::open(dir, source.frame_interval)?)
        }
    };
    Ok(producer)
}

/// Wall-clock pacing shared by the sources.
#[derive(Debug, Clone)]
struct Cadence {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Cadence {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// True when a new frame should be produced at `now`.
    fn advance(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now < due => false,
            _ => {
                self.next_due = Some(now + self.interval);
                true
            }
        }
    }
}

/// Gradient backdrop with a bright block sweeping left and right.
pub struct PatternSource {
    width: u32,
    height: u32,
    resize_every: Option<u32>,
    cadence: Cadence,
    emitted: u64,
    frame: Option<Frame>,
}

impl PatternSource {
    pub fn new(width: u32, height: u32, frame_interval: Duration, resize_every: Option<u32>) -> Self {
        Self {
            width,
            height,
            resize_every,
            cadence: Cadence::new(frame_interval),
            emitted: 0,
            frame: None,
        }
    }

    /// Alternates between full and half size every `resize_every` frames.
    fn current_size(&self) -> (u32, u32) {
        match self.resize_every {
            Some(period) if (self.emitted / u64::from(period)) % 2 == 1 => {
                ((self.width / 2).max(1), (self.height / 2).max(1))
            }
            _ => (self.width, self.height),
        }
    }

    fn render(&self) -> Frame {
        let (width, height) = self.current_size();
        let block = (width / 6).max(1);
        let travel = u64::from(width.saturating_sub(block).max(1));
        let phase = (self.emitted * 4) % (travel * 2);
        let block_x = (if phase < travel { phase } else { travel * 2 - phase }) as u32;
        let block_top = height / 3;
        let block_bottom = (block_top + height / 3).max(block_top + 1);

        let mut frame = Frame::solid(width, height, [0, 0, 0, 255]);
        for (index, px) in frame
            .pixels_mut()
            .chunks_exact_mut(Frame::BYTES_PER_PIXEL)
            .enumerate()
        {
            let x = index as u32 % width;
            let y = index as u32 / width;
            let inside = (block_x..block_x + block).contains(&x) && (block_top..block_bottom).contains(&y);
            if inside {
                px[..3].fill(255);
            } else {
                px[0] = (x * 127 / width) as u8;
                px[1] = (y * 127 / height) as u8;
                px[2] = 64;
            }
        }
        frame
    }
}

impl FrameSource for PatternSource {
    fn poll(&mut self, now: Instant) {
        if self.cadence.advance(now) {
            self.frame = Some(self.render());
            self.emitted += 1;
        }
    }

    fn readiness(&self) -> Readiness {
        if self.frame.is_some() {
            Readiness::EnoughData
        } else {
            Readiness::Nothing
        }
    }

    fn current_frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }
}

/// Solid frames that step through a small palette every `switch_after` frames.
pub struct SolidSource {
    width: u32,
    height: u32,
    switch_after: u32,
    cadence: Cadence,
    emitted: u64,
    frame: Option<Frame>,
}

impl SolidSource {
    pub fn new(width: u32, height: u32, frame_interval: Duration, switch_after: u32) -> Self {
        Self {
            width,
            height,
            switch_after: switch_after.max(1),
            cadence: Cadence::new(frame_interval),
            emitted: 0,
            frame: None,
        }
    }

    fn colour(&self) -> [u8; 4] {
        let step = self.emitted / u64::from(self.switch_after);
        SOLID_PALETTE[(step % SOLID_PALETTE.len() as u64) as usize]
    }
}

impl FrameSource for SolidSource {
    fn poll(&mut self, now: Instant) {
        if !self.cadence.advance(now) {
            return;
        }
        let colour = self.colour();
        if self.frame.as_ref().map(|frame| frame.pixel(0, 0)) != Some(colour) {
            tracing::debug!(?colour, frame = self.emitted, "solid source switched colour");
            self.frame = Some(Frame::solid(self.width, self.height, colour));
        }
        self.emitted += 1;
    }

    fn readiness(&self) -> Readiness {
        if self.frame.is_some() {
            Readiness::EnoughData
        } else {
            Readiness::Nothing
        }
    }

    fn current_frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }
}

/// Still images from a directory, decoded up front and cycled in name order.
pub struct ImageSequenceSource {
    frames: Vec<Frame>,
    cadence: Cadence,
    index: Option<usize>,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, frame_interval: Duration) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("failed to read image directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in &paths {
            let image = image::open(path)
                .with_context(|| format!("failed to decode {}", path.display()))?
                .to_rgba8();
            let (width, height) = image.dimensions();
            let frame = Frame::new(width, height, image.into_raw())
                .with_context(|| format!("unusable image {}", path.display()))?;
            frames.push(frame);
        }
        if frames.is_empty() {
            bail!("no images found in {}", dir.display());
        }
        tracing::info!(count = frames.len(), dir = %dir.display(), "loaded image sequence");

        Ok(Self {
            frames,
            cadence: Cadence::new(frame_interval),
            index: None,
        })
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn poll(&mut self, now: Instant) {
        if self.cadence.advance(now) {
            self.index = Some(self.index.map_or(0, |index| (index + 1) % self.frames.len()));
        }
    }

    fn readiness(&self) -> Readiness {
        if self.index.is_some() {
            Readiness::EnoughData
        } else {
            Readiness::Metadata
        }
    }

    fn current_frame(&self) -> Option<&Frame> {
        self.index.and_then(|index| self.frames.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use scheduler::Dimensions;
    use tempfile::TempDir;

    const FRAME: Duration = Duration::from_millis(33);

    #[test]
    fn nothing_ready_before_first_poll() {
        let source = PatternSource::new(8, 8, FRAME, None);
        assert_eq!(source.readiness(), Readiness::Nothing);
        assert!(source.current_frame().is_none());
    }

    #[test]
    fn pattern_block_moves_between_frames() {
        let mut source = PatternSource::new(60, 30, FRAME, None);
        let start = Instant::now();
        source.poll(start);
        let first = source.current_frame().unwrap().clone();
        source.poll(start + FRAME);
        let second = source.current_frame().unwrap();
        assert_eq!(source.readiness(), Readiness::EnoughData);
        assert!(first.max_rgb_delta(second).unwrap() > 0);
    }

    #[test]
    fn pattern_holds_frame_until_interval_elapses() {
        let mut source = PatternSource::new(60, 30, FRAME, None);
        let start = Instant::now();
        source.poll(start);
        let first = source.current_frame().unwrap().clone();
        source.poll(start + Duration::from_millis(5));
        assert_eq!(source.current_frame(), Some(&first));
    }

    #[test]
    fn pattern_alternates_size_when_asked() {
        let mut source = PatternSource::new(40, 20, FRAME, Some(2));
        let start = Instant::now();
        let mut sizes = Vec::new();
        for i in 0..6u32 {
            source.poll(start + FRAME * i);
            sizes.push(source.current_frame().unwrap().dimensions());
        }
        let full = Dimensions::new(40, 20);
        let half = Dimensions::new(20, 10);
        assert_eq!(sizes, vec![full, full, half, half, full, full]);
    }

    #[test]
    fn solid_switches_after_configured_frames() {
        let mut source = SolidSource::new(4, 4, FRAME, 3);
        let start = Instant::now();
        let mut colours = Vec::new();
        for i in 0..7u32 {
            source.poll(start + FRAME * i);
            colours.push(source.current_frame().unwrap().pixel(0, 0));
        }
        assert_eq!(colours[..3], [SOLID_PALETTE[0]; 3]);
        assert_eq!(colours[3..6], [SOLID_PALETTE[1]; 3]);
        assert_eq!(colours[6], SOLID_PALETTE[2]);
    }

    #[test]
    fn image_sequence_cycles_sorted_files() {
        let dir = TempDir::new().unwrap();
        RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]))
            .save(dir.path().join("b.png"))
            .unwrap();
        RgbaImage::from_pixel(5, 4, Rgba([200, 100, 50, 255]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), FRAME).unwrap();
        assert_eq!(source.frames.len(), 2);
        assert_eq!(source.readiness(), Readiness::Metadata);

        let start = Instant::now();
        source.poll(start);
        assert_eq!(
            source.current_frame().unwrap().dimensions(),
            Dimensions::new(5, 4)
        );
        source.poll(start + FRAME);
        assert_eq!(source.current_frame().unwrap().pixel(0, 0), [10, 20, 30, 255]);
        source.poll(start + FRAME * 2);
        assert_eq!(
            source.current_frame().unwrap().dimensions(),
            Dimensions::new(5, 4)
        );
    }

    #[test]
    fn empty_image_directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(ImageSequenceSource::open(dir.path(), FRAME).is_err());
    }
}
