use std::time::{Duration, Instant};

use scheduler::{
    Compositor, Dimensions, Frame, FrameScheduler, FrameSource, InputMode, PipelineError,
    Readiness, SchedulerSettings, TargetKind, TickOutcome,
};

#[derive(Default)]
struct CountingCompositor {
    dims: Option<Dimensions>,
    resizes: Vec<Dimensions>,
}

impl Compositor for CountingCompositor {
    fn dimensions(&self) -> Dimensions {
        self.dims.unwrap_or(Dimensions::PLACEHOLDER)
    }

    fn target_dimensions(&self, _target: TargetKind) -> Dimensions {
        self.dimensions()
    }

    fn resize(&mut self, dims: Dimensions) -> Result<(), PipelineError> {
        self.dims = Some(dims);
        self.resizes.push(dims);
        Ok(())
    }

    fn upload_frame(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        assert_eq!(
            frame.dimensions(),
            self.dimensions(),
            "upload must never see a stale target size"
        );
        Ok(())
    }

    fn render_grayscale(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }

    fn render_difference(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }

    fn read_pixels(&mut self, _target: TargetKind) -> Result<Frame, PipelineError> {
        let dims = self.dimensions();
        Ok(Frame::solid(dims.width, dims.height, [0, 0, 0, 255]))
    }

    fn render_edges(&mut self, input: &Frame) -> Result<(), PipelineError> {
        assert_eq!(input.dimensions(), self.dimensions());
        Ok(())
    }

    fn refresh_reference(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }

    fn present(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }
}

struct ScriptedSource {
    frame: Frame,
}

impl FrameSource for ScriptedSource {
    fn readiness(&self) -> Readiness {
        Readiness::EnoughData
    }

    fn current_frame(&self) -> Option<&Frame> {
        Some(&self.frame)
    }
}

/// Small deterministic generator so the schedule is reproducible.
struct Lcg(u64);

impl Lcg {
    fn next_millis(&mut self, max: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) % max + 1
    }
}

fn build(delay: Duration) -> FrameScheduler<CountingCompositor, ScriptedSource> {
    let mut scheduler = FrameScheduler::new(
        CountingCompositor::default(),
        ScriptedSource {
            frame: Frame::solid(8, 8, [50, 60, 70, 255]),
        },
        SchedulerSettings {
            delay,
            input_mode: InputMode::Grayscale,
        },
    );
    scheduler.start();
    scheduler
}

#[test]
fn refreshes_respect_interval_under_irregular_ticks() {
    for (seed, delay_ms) in [(1u64, 0u64), (7, 33), (42, 100), (99, 250), (1234, 1000)] {
        let delay = Duration::from_millis(delay_ms);
        let mut scheduler = build(delay);
        let mut rng = Lcg(seed);
        let start = Instant::now();
        let mut now = start;
        let mut refreshes = Vec::new();
        let mut max_gap = Duration::ZERO;

        for _ in 0..400 {
            let gap = Duration::from_millis(rng.next_millis(40));
            max_gap = max_gap.max(gap);
            now += gap;
            if let TickOutcome::Rendered(report) = scheduler.tick(now).unwrap() {
                if report.reference_refreshed {
                    refreshes.push(now);
                }
            }
        }

        assert!(!refreshes.is_empty());
        for pair in refreshes.windows(2) {
            let spacing = pair[1] - pair[0];
            assert!(
                spacing >= delay,
                "delay {delay:?}: refreshes only {spacing:?} apart"
            );
            assert!(
                spacing <= delay + max_gap,
                "delay {delay:?}: refresh overdue by {:?}",
                spacing - delay
            );
        }
    }
}

#[test]
fn zero_delay_refreshes_every_tick() {
    let mut scheduler = build(Duration::ZERO);
    let start = Instant::now();
    for i in 0..10 {
        let outcome = scheduler.tick(start + Duration::from_millis(i * 16)).unwrap();
        assert!(matches!(
            outcome,
            TickOutcome::Rendered(report) if report.reference_refreshed
        ));
    }
    assert_eq!(scheduler.totals().refreshes, 10);
}

#[test]
fn resize_happens_first_and_recaptures_reference() {
    let mut scheduler = build(Duration::from_secs(60));
    let start = Instant::now();
    scheduler.tick(start).unwrap();
    scheduler.tick(start + Duration::from_millis(16)).unwrap();
    assert_eq!(scheduler.totals().refreshes, 1);

    scheduler.source_mut().frame = Frame::solid(16, 9, [0, 0, 0, 255]);
    let outcome = scheduler.tick(start + Duration::from_millis(32)).unwrap();
    match outcome {
        TickOutcome::Rendered(report) => {
            assert!(report.resized);
            assert!(report.reference_refreshed);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    for target in TargetKind::ALL {
        assert_eq!(
            scheduler.compositor().target_dimensions(target),
            Dimensions::new(16, 9)
        );
    }
    assert_eq!(
        scheduler.compositor().resizes,
        vec![Dimensions::new(8, 8), Dimensions::new(16, 9)]
    );
}
