//! End-to-end tests: configuration files in, observer values out
//!
//! These tests run complete pipelines against the loopback engine:
//! - Device capture with observers on several streams
//! - Empty captures in the middle of a run
//! - PPM file playback
//! - Overlay presentation through a channel surface
//! - Configuration split over several resources

mod common;

use common::builders::{GraphTextBuilder, TestRigBuilder};
use common::mock_helpers::{ppm_frame, OpenRequest, SyntheticOpener};
use common::{resource_dir, wait_for, write_file};
use mediagraph_rs::render::ChannelSurfaceFactory;
use mediagraph_rs::{AppConfig, Payload, PixelFormat, PipelineState};
use serial_test::serial;
use std::sync::Arc;
use std::thread;

#[test]
#[serial]
fn test_two_observers_five_frames() {
    let graph = GraphTextBuilder::new()
        .output("X")
        .node("LandmarkCalculator", "input_video", "Y")
        .build();
    let dir = resource_dir(&[("pose.pbtxt", &graph)]);
    let rig = TestRigBuilder::new()
        .resource_dir(dir.path())
        .opener(Arc::new(SyntheticOpener::new(5)))
        .build();

    let mut pipeline = rig.context.create_pipeline();
    pipeline.set_graph_configuration("pose.pbtxt");
    let x = pipeline.register_observer("X").unwrap();
    let y = pipeline.register_observer("Y").unwrap();
    assert!(x.latest().is_none());

    pipeline.start().unwrap();
    assert!(wait_for(|| rig.probe.submission_count() == 5));
    pipeline.stop();

    let x_latest = x.latest().expect("X holds a value");
    let y_latest = y.latest().expect("Y holds a value");
    assert!(x_latest.payload.as_landmarks().is_some());
    assert!(y_latest.payload.as_landmarks().is_some());

    let submissions = rig.probe.submissions();
    assert_eq!(submissions.len(), 5);
    assert!(submissions.iter().all(|s| s.stream == "input_video"));
    assert!(submissions
        .windows(2)
        .all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(x_latest.timestamp, submissions[4].timestamp);
    assert_eq!(y_latest.timestamp, submissions[4].timestamp);
    assert!(rig.errors().is_empty());
}

#[test]
#[serial]
fn test_empty_captures_keep_run_alive() {
    let graph = GraphTextBuilder::new().output("landmarks").build();
    let dir = resource_dir(&[("graph.pbtxt", &graph)]);
    let rig = TestRigBuilder::new()
        .resource_dir(dir.path())
        .opener(Arc::new(SyntheticOpener::new(4).with_empty_reads(&[0, 2, 3])))
        .build();

    let mut pipeline = rig.context.create_pipeline();
    pipeline.set_graph_configuration("graph.pbtxt");
    pipeline.start().unwrap();
    assert!(wait_for(|| rig.probe.submission_count() == 4));
    assert_eq!(pipeline.state(), PipelineState::Running);
    pipeline.stop();

    let timestamps = rig.probe.timestamps();
    assert_eq!(timestamps.len(), 4);
    assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
    let stats = pipeline.stats();
    assert!(stats.empty_captures >= 3);
    assert_eq!(stats.runs_failed, 0);
}

#[test]
#[serial]
fn test_observer_readable_from_other_threads() {
    let graph = GraphTextBuilder::new().output("landmarks").build();
    let dir = resource_dir(&[("graph.pbtxt", &graph)]);
    let rig = TestRigBuilder::new()
        .resource_dir(dir.path())
        .opener(Arc::new(SyntheticOpener::unlimited()))
        .build();

    let mut pipeline = rig.context.create_pipeline();
    pipeline.set_graph_configuration("graph.pbtxt");
    let observer = pipeline.register_observer("landmarks").unwrap();
    pipeline.start().unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let observer = observer.clone();
            thread::spawn(move || {
                let mut seen = 0u64;
                let mut last_ts = None;
                while seen < 20 {
                    if let Some((seq, packet)) = observer.latest_if_newer(seen) {
                        assert!(seq > seen);
                        if let Some(prev) = last_ts {
                            assert!(packet.timestamp > prev);
                        }
                        last_ts = Some(packet.timestamp);
                        seen = seq;
                    } else {
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    for reader in readers {
        reader.join().unwrap();
    }
    pipeline.stop();
    assert!(observer.sequence() >= 20);
}

#[test]
#[serial]
fn test_ppm_file_playback() {
    let graph = GraphTextBuilder::new().output("landmarks").build();
    let dir = resource_dir(&[("graph.pbtxt", &graph)]);
    let mut clip = Vec::new();
    for shade in [10u8, 20, 30] {
        clip.extend(ppm_frame(6, 4, [shade, shade, shade]));
    }
    write_file(dir.path(), "clip.ppm", &clip);

    let opener = Arc::new(SyntheticOpener::unlimited());
    let rig = TestRigBuilder::new()
        .resource_dir(dir.path())
        .opener(opener.clone())
        .build();

    let mut pipeline = rig.context.create_pipeline();
    pipeline.set_graph_configuration("graph.pbtxt");
    pipeline.set_capture_from_file(dir.path().join("clip.ppm"));
    let observer = pipeline.register_observer("landmarks").unwrap();
    pipeline.start().unwrap();
    assert!(wait_for(|| rig.probe.submission_count() == 3));
    pipeline.stop();

    assert_eq!(
        opener.requests(),
        vec![OpenRequest::File(dir.path().join("clip.ppm"))]
    );
    let submissions = rig.probe.submissions();
    assert!(submissions.iter().all(|s| (s.width, s.height) == (6, 4)));
    assert_eq!(observer.sequence(), 3);
}

#[test]
#[serial]
fn test_overlay_frames_reach_surface() {
    let graph = GraphTextBuilder::new().output("output_video").build();
    let dir = resource_dir(&[("overlay.pbtxt", &graph)]);
    let (surfaces, frames) = ChannelSurfaceFactory::new(64);
    let rig = TestRigBuilder::new()
        .resource_dir(dir.path())
        .opener(Arc::new(SyntheticOpener::new(4)))
        .surfaces(Arc::new(surfaces.clone()))
        .build();

    let mut pipeline = rig.context.create_pipeline();
    pipeline.set_graph_configuration("overlay.pbtxt");
    pipeline.set_overlay(true);
    let rendered = pipeline.register_observer("output_video").unwrap();
    pipeline.start().unwrap();
    assert!(wait_for(|| pipeline.stats().frames_presented == 4));
    pipeline.stop();

    let presented: Vec<_> = frames.try_iter().collect();
    assert_eq!(presented.len(), 4);
    assert!(presented.iter().all(|f| f.format() == PixelFormat::Bgr8));
    assert_eq!(surfaces.dropped(), 0);

    // observers see the graph's own layout
    let latest = rendered.latest().unwrap();
    match &latest.payload {
        Payload::Image(frame) => assert_eq!(frame.format(), PixelFormat::Rgb8),
        other => panic!("expected image, got {}", other.kind()),
    }
}

#[test]
#[serial]
fn test_split_configuration_from_app_config() {
    let dir = resource_dir(&[
        ("base.pbtxt", "input_stream: \"input_video\"\n"),
        (
            "subgraphs/landmarks.pbtxt",
            "node {\n  calculator: \"LandmarkCalculator\"\n  input_stream: \"IMAGE:input_video\"\n  output_stream: \"LANDMARKS:face\"\n}\n",
        ),
    ]);
    let config = AppConfig::from_toml(&format!(
        r#"
[context]
resource_root = {:?}

[pipeline]
graph = "base.pbtxt;subgraphs/landmarks.pbtxt;"
observers = ["face"]

[pipeline.capture.device]
id = 3
width = 32
height = 16
"#,
        dir.path().display().to_string()
    ))
    .unwrap();

    let opener = Arc::new(SyntheticOpener::new(2));
    let rig = TestRigBuilder::new().opener(opener.clone()).build();
    rig.context.set_resource_dir(config.context.resource_root.clone());

    let mut pipeline = rig.context.create_pipeline();
    let observers = pipeline.configure(&config.pipeline).unwrap();
    pipeline.start().unwrap();
    assert!(wait_for(|| rig.probe.submission_count() == 2));
    pipeline.stop();

    assert_eq!(observers.len(), 1);
    assert_eq!(observers[0].sequence(), 2);
    // resolution was applied to the synthetic device
    assert!(rig
        .probe
        .submissions()
        .iter()
        .all(|s| (s.width, s.height) == (32, 16)));
    assert!(matches!(
        opener.requests()[0],
        OpenRequest::Device { id: 3, .. }
    ));
}
