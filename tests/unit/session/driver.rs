use super::*;
use crate::assets::mask::{AlphaMask, PrecomputedMask};
use crate::encode::sink::InMemorySink;
use crate::foundation::core::Extent;
use crate::physics::config::PhysicsKind;

fn checker(w: u32, h: u32) -> SourceImage {
    let mut data = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            let v = if (x / 4 + y / 4) % 2 == 0 { 220 } else { 30 };
            data.extend_from_slice(&[v, 255 - v, 64, 255]);
        }
    }
    SourceImage::from_straight_rgba8(w, h, data).unwrap()
}

fn loaded(rows: u32) -> Session {
    let mut s = Session::new(SessionOpts {
        rows,
        ..SessionOpts::default()
    });
    s.load_image(checker(40, 40)).unwrap();
    s
}

fn wobbling(rows: u32) -> Session {
    let mut s = loaded(rows);
    let id = s.active_layer();
    s.set_layer_config(id, LayerConfig::preset(PhysicsKind::Wobble))
        .unwrap();
    s.fill_layer(id).unwrap();
    s
}

#[derive(Default)]
struct FailingSink {
    fail_begin: bool,
    fail_at: u64,
    pushed: u64,
    aborted: u32,
}

impl FrameSink for FailingSink {
    fn begin(&mut self, _cfg: SinkConfig) -> MeshWarpResult<()> {
        if self.fail_begin {
            return Err(MeshWarpError::encode("no encoder"));
        }
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, _f: &FrameRGBA, _d: u32) -> MeshWarpResult<()> {
        if idx.0 == self.fail_at {
            return Err(MeshWarpError::encode("disk full"));
        }
        self.pushed += 1;
        Ok(())
    }

    fn end(&mut self) -> MeshWarpResult<Vec<u8>> {
        Ok(vec![1, 2, 3])
    }

    fn abort(&mut self) {
        self.aborted += 1;
    }
}

#[test]
fn new_session_is_idle_and_rejects_loops() {
    let mut s = Session::default();
    assert_eq!(s.mode(), DriverMode::Idle);
    assert!(s.mesh().is_none());
    assert!(matches!(s.start_animation(), Err(MeshWarpError::State(_))));
    assert!(matches!(s.tick(), Err(MeshWarpError::State(_))));
    let mut sink = InMemorySink::new();
    let opts = ExportOpts::new(1.0, Fps::whole(10).unwrap());
    assert!(matches!(
        s.export(&opts, &mut sink, &mut |_| {}),
        Err(MeshWarpError::State(_))
    ));
    assert_eq!(s.mode(), DriverMode::Idle);
}

#[test]
fn loading_builds_the_mesh_and_enters_loaded() {
    let s = loaded(4);
    assert_eq!(s.mode(), DriverMode::Loaded);
    let mesh = s.mesh().unwrap();
    assert_eq!((mesh.rows(), mesh.cols()), (4, 4));
    assert!(mesh.is_at_rest());
}

#[test]
fn oversized_images_are_downscaled_on_load() {
    let mut s = Session::new(SessionOpts {
        rows: 4,
        max_dimension: 20,
        ..SessionOpts::default()
    });
    s.load_image(checker(80, 40)).unwrap();
    assert_eq!(s.source().unwrap().extent(), Extent::new(20, 10).unwrap());
    assert_eq!(s.mesh().unwrap().extent(), Extent::new(20, 10).unwrap());
}

#[test]
fn failed_reload_keeps_the_previous_mesh() {
    let mut s = loaded(4);
    let id = s.active_layer();
    s.fill_layer(id).unwrap();
    s.opts.rows = 0;
    assert!(s.load_image(checker(10, 10)).is_err());
    assert_eq!(s.mesh().unwrap().extent().width, 40);
    assert_eq!(s.mesh().unwrap().weight(id, 0), 1.0);
}

#[test]
fn reload_replaces_mesh_and_weights() {
    let mut s = loaded(4);
    let id = s.active_layer();
    s.fill_layer(id).unwrap();
    s.load_image(checker(20, 10)).unwrap();
    let mesh = s.mesh().unwrap();
    assert_eq!(mesh.extent(), Extent::new(20, 10).unwrap());
    assert_eq!(mesh.weight(id, 0), 0.0);
}

#[test]
fn image_cannot_be_replaced_while_animating() {
    let mut s = loaded(4);
    s.start_animation().unwrap();
    assert!(matches!(
        s.load_image(checker(10, 10)),
        Err(MeshWarpError::State(_))
    ));
}

#[test]
fn pointer_strokes_paint_the_active_layer() {
    let mut s = loaded(4);
    let id = s.active_layer();
    s.set_brush(BrushSettings {
        radius: 15.0,
        strength: 1.0,
        erase: false,
    })
    .unwrap();

    assert_eq!(
        s.pointer(PointerEvent::Move { x: 0.0, y: 0.0 }),
        PaintOutcome::Ignored
    );
    assert!(matches!(
        s.pointer(PointerEvent::Down { x: 20.0, y: 20.0 }),
        PaintOutcome::Painted { touched } if touched > 0
    ));
    let mesh = s.mesh().unwrap();
    let center = mesh.index(2, 2);
    assert_eq!(mesh.weight(id, center), 1.0);
    assert_eq!(mesh.weight(id, 0), 0.0);
    assert_eq!(s.pointer(PointerEvent::Up), PaintOutcome::StrokeEnded);
    assert_eq!(s.pointer(PointerEvent::Up), PaintOutcome::Ignored);
}

#[test]
fn painting_is_disabled_while_animating() {
    let mut s = loaded(4);
    let id = s.active_layer();
    s.start_animation().unwrap();
    assert_eq!(
        s.pointer(PointerEvent::Down { x: 20.0, y: 20.0 }),
        PaintOutcome::Ignored
    );
    assert!(matches!(s.fill_layer(id), Err(MeshWarpError::State(_))));
    let dab = BrushDab {
        x: 20.0,
        y: 20.0,
        radius: 10.0,
        strength: 1.0,
        erase: false,
    };
    assert!(s.paint(&dab, id).is_err());
    assert_eq!(s.mesh().unwrap().weights().coverage(id, 0.0), 0);

    s.stop_animation();
    assert!(matches!(s.paint(&dab, id), Ok(n) if n > 0));
}

#[test]
fn a_stroke_does_not_survive_an_animation_run() {
    let mut s = loaded(4);
    s.pointer(PointerEvent::Down { x: 5.0, y: 5.0 });
    s.start_animation().unwrap();
    s.stop_animation();
    assert_eq!(
        s.pointer(PointerEvent::Move { x: 20.0, y: 20.0 }),
        PaintOutcome::Ignored
    );
}

#[test]
fn ticks_advance_time_and_stop_resets_the_pose() {
    let mut s = wobbling(4);
    s.start_animation().unwrap();
    s.start_animation().unwrap();
    for _ in 0..3 {
        let frame = s.tick().unwrap();
        assert_eq!((frame.width, frame.height), (40, 40));
    }
    assert_eq!(s.current_tick(), Tick(3));
    assert!(!s.mesh().unwrap().is_at_rest());

    s.stop_animation();
    assert_eq!(s.mode(), DriverMode::Loaded);
    assert!(s.mesh().unwrap().is_at_rest());
    assert!(matches!(s.tick(), Err(MeshWarpError::State(_))));
}

#[test]
fn config_edits_while_animating_apply_on_the_next_tick() {
    let mut s = wobbling(4);
    let id = s.active_layer();
    s.start_animation().unwrap();
    s.tick().unwrap();
    let mut still = LayerConfig::preset(PhysicsKind::Wobble);
    still.amplitude = 0.0;
    s.set_layer_config(id, still).unwrap();
    s.tick().unwrap();
    assert!(s.mesh().unwrap().is_at_rest());
}

#[test]
fn layer_structure_is_frozen_while_animating() {
    let mut s = loaded(4);
    s.start_animation().unwrap();
    assert!(matches!(
        s.add_layer("wind", LayerConfig::preset(PhysicsKind::Wind)),
        Err(MeshWarpError::State(_))
    ));
    s.stop_animation();
    assert!(s.add_layer("wind", LayerConfig::preset(PhysicsKind::Wind)).is_ok());
}

#[test]
fn removing_a_layer_drops_its_weights_and_active_selection() {
    let mut s = loaded(4);
    let first = s.active_layer();
    let second = s
        .add_layer("fire", LayerConfig::preset(PhysicsKind::Fire))
        .unwrap();
    s.set_active_layer(second).unwrap();
    s.fill_layer(second).unwrap();

    s.remove_layer(second).unwrap();
    assert_eq!(s.active_layer(), first);
    assert!(s.mesh().unwrap().weights().layer(second).is_none());
    assert!(matches!(
        s.remove_layer(first),
        Err(MeshWarpError::Validation(_))
    ));
    assert!(matches!(
        s.set_active_layer(second),
        Err(MeshWarpError::Validation(_))
    ));
}

#[test]
fn render_at_leaves_the_mesh_at_rest() {
    let mut s = wobbling(4);
    let rest = s.render_current().unwrap().clone();
    let moved = s.render_at(Tick(7)).unwrap();
    assert_ne!(rest.data, moved.data);
    assert!(s.mesh().unwrap().is_at_rest());
    assert_eq!(s.current_tick(), Tick(0));
}

#[test]
fn export_runs_every_tick_and_rolls_back() {
    let mut s = wobbling(4);
    let mut sink = InMemorySink::new();
    let mut seen = Vec::new();
    let opts = ExportOpts::new(0.5, Fps::whole(10).unwrap());
    let report = s
        .export(&opts, &mut sink, &mut |p| seen.push(p.frame))
        .unwrap();

    assert_eq!(report.frames, 5);
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    let frames = sink.frames();
    assert_eq!(frames.len(), 5);
    assert!(frames.iter().all(|f| f.delay_ms == 100));
    assert_eq!(frames[0].idx, FrameIndex(0));
    assert_eq!(sink.config().unwrap().total_frames, 5);
    assert!(sink.is_ended());

    assert_eq!(s.mode(), DriverMode::Loaded);
    assert_eq!(s.current_tick(), Tick(0));
    assert!(s.mesh().unwrap().is_at_rest());
}

#[test]
fn export_from_animating_stops_the_loop_first() {
    let mut s = wobbling(4);
    s.start_animation().unwrap();
    s.tick().unwrap();
    let mut sink = InMemorySink::new();
    let opts = ExportOpts::new(0.2, Fps::whole(10).unwrap());
    s.export(&opts, &mut sink, &mut |_| {}).unwrap();
    assert_eq!(sink.frames().len(), 2);
    assert_eq!(s.mode(), DriverMode::Loaded);
}

#[test]
fn exports_are_deterministic() {
    let opts = ExportOpts::new(0.3, Fps::whole(10).unwrap());
    let mut a = InMemorySink::new();
    let mut b = InMemorySink::new();
    let mut s = wobbling(4);
    s.export(&opts, &mut a, &mut |_| {}).unwrap();
    s.export(&opts, &mut b, &mut |_| {}).unwrap();
    for (fa, fb) in a.frames().iter().zip(b.frames()) {
        assert_eq!(fa.frame.data, fb.frame.data);
    }
}

#[test]
fn opaque_export_flattens_onto_the_background() {
    let mut s = wobbling(4);
    let mut sink = InMemorySink::new();
    let mut opts = ExportOpts::new(0.1, Fps::whole(10).unwrap());
    opts.background_rgb = [1, 2, 3];
    s.export(&opts, &mut sink, &mut |_| {}).unwrap();
    let frame = &sink.frames()[0].frame;
    assert!(frame.data.chunks_exact(4).all(|px| px[3] == 255));
}

#[test]
fn transparent_export_keeps_alpha_for_alpha_sinks() {
    let mut s = wobbling(4);
    let mut sink = InMemorySink::new();
    let mut opts = ExportOpts::new(0.1, Fps::whole(10).unwrap());
    opts.transparent = true;
    s.export(&opts, &mut sink, &mut |_| {}).unwrap();
    assert!(sink.config().unwrap().transparent_background);
    let frame = &sink.frames()[0].frame;
    assert!(frame.premultiplied);
}

#[test]
fn invalid_export_options_do_not_mutate() {
    let mut s = wobbling(4);
    s.start_animation().unwrap();
    s.tick().unwrap();
    let mut sink = InMemorySink::new();
    let opts = ExportOpts::new(0.0, Fps::whole(10).unwrap());
    assert!(matches!(
        s.export(&opts, &mut sink, &mut |_| {}),
        Err(MeshWarpError::Validation(_))
    ));
    assert_eq!(s.mode(), DriverMode::Animating);
    assert_eq!(s.current_tick(), Tick(1));
    assert!(sink.config().is_none());
}

#[test]
fn sink_failure_rolls_back_to_loaded() {
    let mut s = wobbling(4);
    let mut sink = FailingSink {
        fail_at: 2,
        ..FailingSink::default()
    };
    let opts = ExportOpts::new(1.0, Fps::whole(10).unwrap());
    let err = s.export(&opts, &mut sink, &mut |_| {}).unwrap_err();
    assert!(matches!(err, MeshWarpError::Encode(_)));
    assert_eq!(sink.pushed, 2);
    assert_eq!(sink.aborted, 1);
    assert_eq!(s.mode(), DriverMode::Loaded);
    assert_eq!(s.current_tick(), Tick(0));
    assert!(s.mesh().unwrap().is_at_rest());

    let mut retry = InMemorySink::new();
    assert!(s.export(&opts, &mut retry, &mut |_| {}).is_ok());
}

#[test]
fn timeout_aborts_the_export() {
    let mut s = wobbling(4);
    let mut sink = InMemorySink::new();
    let mut opts = ExportOpts::new(1.0, Fps::whole(10).unwrap());
    opts.timeout = Some(Duration::ZERO);
    assert!(matches!(
        s.export(&opts, &mut sink, &mut |_| {}),
        Err(MeshWarpError::State(_))
    ));
    assert!(sink.frames().is_empty());
    assert_eq!(s.mode(), DriverMode::Loaded);
    assert!(s.mesh().unwrap().is_at_rest());
}

#[test]
fn timed_out_export_aborts_the_sink() {
    let mut s = wobbling(4);
    let mut sink = FailingSink {
        fail_at: u64::MAX,
        ..FailingSink::default()
    };
    let mut opts = ExportOpts::new(1.0, Fps::whole(10).unwrap());
    opts.timeout = Some(Duration::ZERO);
    assert!(matches!(
        s.export(&opts, &mut sink, &mut |_| {}),
        Err(MeshWarpError::State(_))
    ));
    assert_eq!(sink.pushed, 0);
    assert_eq!(sink.aborted, 1);
}

#[test]
fn sink_is_only_aborted_after_a_successful_begin() {
    let mut s = wobbling(4);
    let opts = ExportOpts::new(1.0, Fps::whole(10).unwrap());

    let mut refused = FailingSink {
        fail_begin: true,
        fail_at: u64::MAX,
        ..FailingSink::default()
    };
    assert!(s.export(&opts, &mut refused, &mut |_| {}).is_err());
    assert_eq!(refused.aborted, 0);

    let mut fine = FailingSink {
        fail_at: u64::MAX,
        ..FailingSink::default()
    };
    let report = s.export(&opts, &mut fine, &mut |_| {}).unwrap();
    assert_eq!(report.bytes, vec![1, 2, 3]);
    assert_eq!(fine.pushed, 10);
    assert_eq!(fine.aborted, 0);
}

#[test]
fn segmentation_keeps_mesh_and_weights() {
    let mut s = wobbling(4);
    let id = s.active_layer();
    let mask = AlphaMask::from_luma_bytes(1, 1, vec![0]).unwrap();
    s.apply_segmentation(&PrecomputedMask(mask)).unwrap();
    assert!(s.source().unwrap().data().iter().all(|&b| b == 0));
    assert_eq!(s.mesh().unwrap().weight(id, 0), 1.0);
}
