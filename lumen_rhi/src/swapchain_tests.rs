/// Tests for the Swapchain frame loop against a scripted MockSurface

use super::*;
use crate::command::record_in_parallel;
use crate::device::mock_device::{MockDevice, MockSurface, SurfaceScript, temp_shader_pair};
use crate::mesh::StaticMesh;
use crate::pipeline::PipelineBuilder;
use std::sync::Mutex;

// ============================================================================
// Helper Functions
// ============================================================================

fn swapchain(frames: u32, images: u32) -> (Swapchain, Arc<Mutex<SurfaceScript>>, Arc<dyn Device>) {
    let (_mock, device) = MockDevice::shared(frames);
    let surface = MockSurface::new(frames, images, Extent2D::new(800, 600));
    let script = surface.script();
    let swapchain = Swapchain::new(Arc::clone(&device), Box::new(surface)).unwrap();
    (swapchain, script, device)
}

/// Run one frame recording a single 3-vertex draw; returns (slot, image) or None
fn run_frame(swapchain: &mut Swapchain) -> Option<(u32, u32)> {
    let ids = {
        let frame = swapchain.begin_frame().unwrap()?;
        frame.command_buffer.draw_vertices(3, 1, 0, 0).unwrap();
        (frame.frame_index, frame.image_index)
    };
    swapchain.end_frame().unwrap();
    Some(ids)
}

fn surface_events(script: &Arc<Mutex<SurfaceScript>>) -> Vec<String> {
    script.lock().unwrap().events.clone()
}

// ============================================================================
// Frame loop
// ============================================================================

#[test]
fn test_frame_sequence() {
    let (mut swapchain, script, _) = swapchain(2, 3);

    assert_eq!(run_frame(&mut swapchain), Some((0, 0)));

    assert_eq!(surface_events(&script), vec![
        "wait slot=0",
        "acquire slot=0 -> Acquired { image_index: 0, suboptimal: false }",
        "submit slot=0 image=0",
        "present slot=0 image=0 -> Presented",
    ]);
    assert_eq!(script.lock().unwrap().submitted[0], vec!["begin 800x600 subpass=0", "draw 3 1 0 0", "end"]);
}

#[test]
fn test_slots_and_images_rotate() {
    let (mut swapchain, _, _) = swapchain(2, 3);
    let frames: Vec<_> = (0..4).map(|_| run_frame(&mut swapchain).unwrap()).collect();
    assert_eq!(frames, vec![(0, 0), (1, 1), (0, 2), (1, 0)]);
    assert_eq!(swapchain.frame_index(), 0);
}

#[test]
fn test_command_buffer_is_reused_after_submission() {
    let (mut swapchain, script, _) = swapchain(1, 2);
    run_frame(&mut swapchain).unwrap();
    run_frame(&mut swapchain).unwrap();

    let script = script.lock().unwrap();
    assert_eq!(script.submitted.len(), 2);
    assert_eq!(script.submitted[1].len(), 3);
}

#[test]
fn test_default_framebuffer_only_inside_frame() {
    let (mut swapchain, _, _) = swapchain(2, 2);
    assert!(swapchain.default_framebuffer().is_none());

    swapchain.begin_frame().unwrap().unwrap();
    assert_eq!(swapchain.default_framebuffer().map(|f| f.extent()), Some(Extent2D::new(800, 600)));
    swapchain.end_frame().unwrap();
    assert!(swapchain.default_framebuffer().is_none());
}

// ============================================================================
// Misuse
// ============================================================================

#[test]
fn test_begin_twice_and_end_without_begin() {
    let (mut swapchain, _, _) = swapchain(2, 2);
    assert!(matches!(swapchain.end_frame(), Err(Error::InvalidState(_))));

    swapchain.begin_frame().unwrap().unwrap();
    assert!(matches!(swapchain.begin_frame(), Err(Error::InvalidState(_))));
    swapchain.end_frame().unwrap();
}

#[test]
fn test_zero_frames_in_flight_is_rejected() {
    let (_mock, device) = MockDevice::shared(0);
    let surface = MockSurface::new(0, 2, Extent2D::new(800, 600));
    assert!(matches!(Swapchain::new(device, Box::new(surface)), Err(Error::InitializationFailed(_))));
}

// ============================================================================
// Rebuild
// ============================================================================

#[test]
fn test_out_of_date_acquire_rebuilds_and_skips_frame() {
    let (mut swapchain, script, _) = swapchain(2, 3);
    script.lock().unwrap().acquire.push_back(AcquireResult::OutOfDate);

    assert!(swapchain.begin_frame().unwrap().is_none());
    assert_eq!(script.lock().unwrap().rebuilds, 1);
    assert_eq!(swapchain.generation(), 1);

    assert_eq!(run_frame(&mut swapchain), Some((0, 0)));
}

#[test]
fn test_suboptimal_present_rebuilds_before_next_frame() {
    let (mut swapchain, script, _) = swapchain(2, 3);
    script.lock().unwrap().present.push_back(PresentResult::Suboptimal);

    run_frame(&mut swapchain).unwrap();
    assert!(swapchain.needs_rebuild());
    assert_eq!(script.lock().unwrap().rebuilds, 0);

    run_frame(&mut swapchain).unwrap();
    assert!(!swapchain.needs_rebuild());
    assert_eq!(script.lock().unwrap().rebuilds, 1);
    assert_eq!(swapchain.generation(), 1);
}

#[test]
fn test_suboptimal_acquire_still_records_frame() {
    let (mut swapchain, script, _) = swapchain(2, 3);
    script.lock().unwrap().acquire.push_back(AcquireResult::Acquired { image_index: 2, suboptimal: true });

    assert_eq!(run_frame(&mut swapchain), Some((0, 2)));
    assert!(swapchain.needs_rebuild());
}

#[test]
fn test_invalidate_applies_new_extent() {
    let (mut swapchain, script, _) = swapchain(2, 2);
    script.lock().unwrap().resize_to = Some(Extent2D::new(1024, 768));

    swapchain.invalidate();
    run_frame(&mut swapchain).unwrap();

    assert_eq!(swapchain.extent(), Extent2D::new(1024, 768));
    assert_eq!(script.lock().unwrap().submitted[0][0], "begin 1024x768 subpass=0");
}

#[test]
fn test_minimized_surface_skips_frames() {
    let (mut swapchain, script, _) = swapchain(2, 2);
    script.lock().unwrap().resize_to = Some(Extent2D::new(0, 0));
    swapchain.invalidate();

    assert!(swapchain.begin_frame().unwrap().is_none());
    assert!(!surface_events(&script).iter().any(|e| e.starts_with("acquire")));
    assert!(swapchain.needs_rebuild());

    script.lock().unwrap().resize_to = Some(Extent2D::new(640, 480));
    let frame = swapchain.begin_frame().unwrap().unwrap();
    assert_eq!(frame.extent, Extent2D::new(640, 480));
}

#[test]
fn test_failed_submit_resets_frame() {
    let (mut swapchain, script, _) = swapchain(1, 2);
    script.lock().unwrap().fail_submit = Some(-4);

    swapchain.begin_frame().unwrap().unwrap();
    let err = swapchain.end_frame().unwrap_err();
    assert_eq!(err.native_code(), Some(-4));

    assert_eq!(run_frame(&mut swapchain), Some((0, 1)));
    assert_eq!(script.lock().unwrap().submitted.len(), 1);
}

#[test]
fn test_aborted_frame_is_still_presented() {
    let (mut swapchain, script, _) = swapchain(2, 2);

    {
        let frame = swapchain.begin_frame().unwrap().unwrap();
        frame.command_buffer.draw_vertices(3, 1, 0, 0).unwrap();
        frame.command_buffer.reset().unwrap();
    }
    swapchain.end_frame().unwrap();

    assert_eq!(surface_events(&script), vec![
        "wait slot=0",
        "acquire slot=0 -> Acquired { image_index: 0, suboptimal: false }",
        "submit slot=0 image=0",
        "present slot=0 image=0 -> Presented",
    ]);
    // The discarded draw is gone; only an empty pass over the image remains
    assert_eq!(script.lock().unwrap().submitted[0], vec!["begin 800x600 subpass=0", "end"]);

    assert_eq!(run_frame(&mut swapchain), Some((1, 1)));
    assert_eq!(run_frame(&mut swapchain), Some((0, 0)));
}

// ============================================================================
// Thread-local recording inside a frame
// ============================================================================

#[test]
fn test_parallel_recording_into_frame() {
    let (mut swapchain, script, device) = swapchain(2, 2);
    let mut builder = PipelineBuilder::new(device);
    for (stage, path) in temp_shader_pair() {
        builder.attach_shader(stage, path);
    }
    let pipeline = builder
        .shader_api::<StaticMesh>()
        .build(swapchain.render_pass().as_ref(), 0)
        .unwrap();
    let mut workers: Vec<_> = (0..2).map(|_| swapchain.create_command_buffer().unwrap()).collect();
    let items = [5u32, 6, 7, 8];

    {
        let frame = swapchain.begin_frame().unwrap().unwrap();
        frame.command_buffer.end_writing().unwrap();
        record_in_parallel(frame.command_buffer, &mut workers, &items, frame.framebuffer, &pipeline, |_, cmd, chunk| {
            for &count in chunk {
                cmd.draw_vertices(count, 1, 0, 0)?;
            }
            Ok(())
        })
        .unwrap();
    }
    swapchain.end_frame().unwrap();

    let submitted = script.lock().unwrap().submitted[0].clone();
    let draws: Vec<&str> = submitted.iter().filter(|c| c.starts_with("draw")).map(String::as_str).collect();
    assert_eq!(draws, vec!["draw 5 1 0 0", "draw 6 1 0 0", "draw 7 1 0 0", "draw 8 1 0 0"]);

    // Each merged worker stream binds the pipeline and dynamic state itself
    let worker_starts: Vec<usize> = submitted
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, c)| c.starts_with("begin"))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(worker_starts.len(), 2);
    for start in worker_starts {
        assert!(submitted[start + 1].starts_with("bind_pipeline #"));
        assert_eq!(submitted[start + 2], "set_viewport 800x600");
        assert_eq!(submitted[start + 3], "set_scissor 0,0 800x600");
    }
}
