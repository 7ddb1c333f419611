use std::time::{Duration, Instant};

use renderer::{filters, SoftwareCompositor};
use scheduler::{
    Compositor, Dimensions, Frame, FrameScheduler, FrameSource, InputMode, Readiness,
    SchedulerSettings, TargetKind, TickOutcome,
};

const C0: [u8; 4] = [200, 40, 40, 255];
const C1: [u8; 4] = [40, 200, 40, 255];

struct SwitchableSource {
    frame: Frame,
}

impl FrameSource for SwitchableSource {
    fn readiness(&self) -> Readiness {
        Readiness::EnoughData
    }

    fn current_frame(&self) -> Option<&Frame> {
        Some(&self.frame)
    }
}

fn build(
    frame: Frame,
    delay: Duration,
    input_mode: InputMode,
) -> FrameScheduler<SoftwareCompositor, SwitchableSource> {
    let mut scheduler = FrameScheduler::new(
        SoftwareCompositor::new(),
        SwitchableSource { frame },
        SchedulerSettings { delay, input_mode },
    );
    scheduler.start();
    scheduler
}

fn motion_peak(scheduler: &FrameScheduler<SoftwareCompositor, SwitchableSource>) -> u8 {
    scheduler.compositor().canvas(TargetKind::Motion).max_rgb()
}

#[test]
fn solid_colour_switch_settles_after_delay() {
    let mut scheduler = build(
        Frame::solid(8, 6, C0),
        Duration::from_secs(1),
        InputMode::Grayscale,
    );
    let start = Instant::now();
    let at = |tick: u64| start + Duration::from_millis(tick * 100);

    // The first tick captures the reference after the difference pass.
    scheduler.tick(at(0)).unwrap();
    for tick in 1..3 {
        scheduler.tick(at(tick)).unwrap();
        assert_eq!(motion_peak(&scheduler), 0, "tick {tick} before the switch");
    }

    scheduler.source_mut().frame = Frame::solid(8, 6, C1);
    for tick in 3..=10 {
        let outcome = scheduler.tick(at(tick)).unwrap();
        let motion = scheduler.compositor().canvas(TargetKind::Motion);
        assert_eq!(motion.pixel(4, 3), [160, 160, 0, 255], "tick {tick}");
        if let TickOutcome::Rendered(report) = outcome {
            assert_eq!(report.reference_refreshed, tick == 10, "tick {tick}");
        }
    }

    scheduler.tick(at(11)).unwrap();
    assert_eq!(motion_peak(&scheduler), 0);
    assert_eq!(scheduler.compositor().reference().pixel(0, 0), C1);
}

#[test]
fn edge_input_follows_selected_mode() {
    let mut scheduler = build(
        Frame::solid(4, 4, C0),
        Duration::from_secs(5),
        InputMode::Grayscale,
    );
    let start = Instant::now();
    scheduler.tick(start).unwrap();
    let gray = scheduler.compositor().canvas(TargetKind::Grayscale).clone();
    assert_eq!(scheduler.compositor().edge_input(), &gray);

    scheduler.source_mut().frame = Frame::solid(4, 4, C1);
    scheduler.controls().toggle_input_mode();
    scheduler.tick(start + Duration::from_millis(16)).unwrap();
    let compositor = scheduler.compositor();
    assert_eq!(
        compositor.edge_input(),
        compositor.canvas(TargetKind::Motion)
    );
    assert_eq!(compositor.edge_input().pixel(0, 0), [160, 160, 0, 255]);
}

#[test]
fn flat_input_produces_no_edges() {
    let mut scheduler = build(
        Frame::solid(9, 7, [90, 120, 30, 255]),
        Duration::ZERO,
        InputMode::Grayscale,
    );
    scheduler.tick(Instant::now()).unwrap();
    let edge = scheduler.compositor().canvas(TargetKind::Edge);
    assert_eq!(edge.max_rgb(), 0);
    assert_eq!(edge.pixel(8, 6)[3], 255);
}

#[test]
fn edge_canvas_matches_filters_on_a_step() {
    let mut pixels = Vec::new();
    for _y in 0..6 {
        for x in 0..6 {
            let value = if x < 3 { 0 } else { 255 };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    let frame = Frame::new(6, 6, pixels).unwrap();
    let expected = filters::laplacian_of_gaussian(&filters::grayscale(&frame));

    let mut scheduler = build(frame, Duration::ZERO, InputMode::Grayscale);
    scheduler.tick(Instant::now()).unwrap();
    assert_eq!(scheduler.compositor().canvas(TargetKind::Edge), &expected);
    assert!(expected.max_rgb() > 0);
}

#[test]
fn every_target_tracks_frame_size() {
    let mut scheduler = build(
        Frame::solid(3, 2, C0),
        Duration::from_secs(60),
        InputMode::Difference,
    );
    let start = Instant::now();
    for (tick, (w, h)) in [(3, 2), (3, 2), (10, 4), (1, 1), (10, 4)].into_iter().enumerate() {
        scheduler.source_mut().frame = Frame::solid(w, h, C1);
        scheduler
            .tick(start + Duration::from_millis(tick as u64 * 20))
            .unwrap();
        for target in TargetKind::ALL {
            assert_eq!(
                scheduler.compositor().target_dimensions(target),
                Dimensions::new(w, h)
            );
        }
        assert_eq!(
            scheduler.compositor().reference().dimensions(),
            Dimensions::new(w, h)
        );
    }
    assert_eq!(scheduler.totals().resizes, 4);
}
