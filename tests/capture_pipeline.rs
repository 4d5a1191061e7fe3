//! Capture Pipeline Tests
//!
//! End-to-end tests of negotiation, decoding, conversion and the paced
//! pull/push loop, driven by a scripted camera:
//! - Size/frame-rate hints and driver fallback
//! - Buffer geometry tracking across resolution changes
//! - Consumer-driven termination (interrupt, rejection)
//! - Timeout and error outcomes
//! - Pacing of delivered frames


use capture_test_utils::*;
use picamera_capture::capture::CodecId;
use picamera_capture::{create_display_with_driver, CaptureImage, CaptureStatus, Display, VideoConfig};
use std::cell::Cell;
use std::time::Duration;

/// Fast frame rate so scripted runs finish quickly
fn fast_config() -> VideoConfig {
    VideoConfig {
        width: 0,
        height: 0,
        framerate: 500,
    }
}

/// Zero width/height must not reach the driver as a size hint
#[test]
fn test_zero_size_passes_no_hints() {
    let driver = ScriptedDriver::rgb((640, 480), vec![]);
    let config = VideoConfig {
        width: 0,
        height: 0,
        framerate: 0,
    };

    let display = create_display_with_driver(Some(&driver), MOCK_DEVICE, &config);
    assert!(display.is_some());

    let log = driver.log.borrow();
    assert_eq!(log.hints.len(), 1);
    assert_eq!(log.hints[0].video_size, None);
    assert_eq!(log.hints[0].framerate, None);
}

/// 1080p request against a 720p-only camera falls back to 720p
#[test]
fn test_requested_size_falls_back_to_device_size() {
    let frames = (0..3)
        .map(|_| ReadStep::Frame(rgb_frame(1280, 720, [10, 20, 30])))
        .collect();
    let driver = ScriptedDriver::rgb((1280, 720), frames);
    let config = VideoConfig {
        width: 1920,
        height: 1080,
        framerate: 30,
    };

    let mut display = create_display_with_driver(Some(&driver), MOCK_DEVICE, &config)
        .expect("negotiation should succeed");
    assert_eq!(driver.log.borrow().hints[0].video_size, Some((1920, 1080)));
    assert_eq!((display.width(), display.height()), (1280, 720));

    let (status, deliveries) = run_capture(&mut display, 2, 3);
    assert_eq!(status, CaptureStatus::Ok);
    assert_eq!(deliveries.len(), 3);
    for delivery in &deliveries {
        assert!(delivery.fresh);
        assert_eq!((delivery.width, delivery.height), (1280, 720));
        assert_eq!(delivery.row_pitch, 1280 * 4);
        assert_eq!(delivery.data_len, 1280 * 4 * 720);
        assert_eq!(delivery.first_pixel, Some([30, 20, 10, 255]));
    }
}

/// Buffers follow the geometry of the most recently decoded frame
#[test]
fn test_buffer_geometry_tracks_decoded_frames() {
    let driver = ScriptedDriver::mjpeg(
        (64, 48),
        vec![
            ReadStep::Frame(jpeg_frame(64, 48)),
            ReadStep::Frame(jpeg_frame(32, 16)),
            ReadStep::Frame(jpeg_frame(32, 16)),
            ReadStep::Frame(jpeg_frame(80, 8)),
        ],
    );

    let mut display =
        create_display_with_driver(Some(&driver), MOCK_DEVICE, &fast_config()).unwrap();

    // One recycled buffer: every resize happens in place on the same buffer
    let (status, deliveries) = run_capture(&mut display, 1, 4);
    assert_eq!(status, CaptureStatus::Ok);

    let geometry: Vec<_> = deliveries
        .iter()
        .map(|d| (d.row_pitch, d.height, d.data_len))
        .collect();
    assert_eq!(
        geometry,
        vec![
            (64 * 4, 48, 64 * 4 * 48),
            (32 * 4, 16, 32 * 4 * 16),
            (32 * 4, 16, 32 * 4 * 16),
            (80 * 4, 8, 80 * 4 * 8),
        ]
    );
    assert_eq!((display.width(), display.height()), (80, 8));
    assert_eq!((display.env_width(), display.env_height()), (80, 8));
    assert_eq!(display.stats().geometry_changes, 2);
    assert_eq!(display.alloc_img().row_pitch, 80 * 4);
}

/// No buffer from the host stops the loop before any read
#[test]
fn test_empty_pull_interrupts() {
    let driver = ScriptedDriver::rgb((4, 4), vec![ReadStep::Frame(rgb_frame(4, 4, [0, 0, 0]))]);
    let mut display =
        create_display_with_driver(Some(&driver), MOCK_DEVICE, &fast_config()).unwrap();

    let pushes = Cell::new(0);
    let status = display.capture(
        &mut |_img: CaptureImage, _fresh: bool| {
            pushes.set(pushes.get() + 1);
            true
        },
        &mut || -> Option<CaptureImage> { None },
        false,
    );

    assert_eq!(status, CaptureStatus::Interrupted);
    assert_eq!(pushes.get(), 0);
    assert_eq!(driver.reads(), 0);
}

/// Interrupt after a few frames performs no further reads
#[test]
fn test_pull_revoked_mid_stream() {
    let frames = (0..10)
        .map(|_| ReadStep::Frame(rgb_frame(4, 4, [1, 2, 3])))
        .collect();
    let driver = ScriptedDriver::rgb((4, 4), frames);
    let mut display =
        create_display_with_driver(Some(&driver), MOCK_DEVICE, &fast_config()).unwrap();

    let lent = Cell::new(0);
    let status = display.capture(
        &mut |_img: CaptureImage, _fresh: bool| true,
        &mut || {
            lent.set(lent.get() + 1);
            (lent.get() <= 3).then(CaptureImage::default)
        },
        false,
    );

    assert_eq!(status, CaptureStatus::Interrupted);
    assert_eq!(driver.reads(), 3);
}

/// Rejecting a new frame ends capture with Ok
#[test]
fn test_push_rejection_on_frame_stops() {
    let frames = (0..5)
        .map(|_| ReadStep::Frame(rgb_frame(4, 4, [9, 9, 9])))
        .collect();
    let driver = ScriptedDriver::rgb((4, 4), frames);
    let mut display =
        create_display_with_driver(Some(&driver), MOCK_DEVICE, &fast_config()).unwrap();

    let (status, deliveries) = run_capture(&mut display, 1, 1);
    assert_eq!(status, CaptureStatus::Ok);
    assert_eq!(deliveries.len(), 1);
    assert!(deliveries[0].fresh);
    assert_eq!(driver.reads(), 1);
}

/// Rejecting a "no new frame" delivery also ends capture with Ok
#[test]
fn test_push_rejection_on_timeout_stops() {
    let driver = ScriptedDriver::rgb((4, 4), vec![ReadStep::NotReady]);
    let mut display =
        create_display_with_driver(Some(&driver), MOCK_DEVICE, &fast_config()).unwrap();

    let (status, deliveries) = run_capture(&mut display, 1, 1);
    assert_eq!(status, CaptureStatus::Ok);
    assert_eq!(deliveries.len(), 1);
    assert!(!deliveries[0].fresh);
    assert_eq!(driver.reads(), 1);
}

/// An intermittently silent stream yields paced "no new frame" pushes, never an error
#[test]
fn test_intermittent_not_ready() {
    let frame = || ReadStep::Frame(rgb_frame(4, 4, [5, 5, 5]));
    let driver = ScriptedDriver::rgb(
        (4, 4),
        vec![
            ReadStep::NotReady,
            frame(),
            ReadStep::NotReady,
            ReadStep::NotReady,
            frame(),
        ],
    );
    let mut display =
        create_display_with_driver(Some(&driver), MOCK_DEVICE, &fast_config()).unwrap();

    let (status, deliveries) = run_capture(&mut display, 2, 6);
    assert_eq!(status, CaptureStatus::Ok);

    let flags: Vec<bool> = deliveries.iter().map(|d| d.fresh).collect();
    assert_eq!(flags, vec![false, true, false, false, true, false]);

    let stats = display.stats();
    assert_eq!(stats.frames_captured, 2);
    assert_eq!(stats.timeouts, 4);
}

/// A "no new frame" push keeps the previous contents of the buffer
#[test]
fn test_timeout_preserves_buffer_contents() {
    let driver = ScriptedDriver::rgb(
        (2, 2),
        vec![ReadStep::Frame(rgb_frame(2, 2, [0, 0, 255])), ReadStep::NotReady],
    );
    let mut display =
        create_display_with_driver(Some(&driver), MOCK_DEVICE, &fast_config()).unwrap();

    let (_, deliveries) = run_capture(&mut display, 1, 2);
    assert!(deliveries[0].fresh);
    assert!(!deliveries[1].fresh);
    assert_eq!(deliveries[1].first_pixel, Some([255, 0, 0, 255]));
    assert_eq!(deliveries[1].timestamp, deliveries[0].timestamp);
}

/// Units from other streams are dropped and reported as timeouts
#[test]
fn test_other_stream_packets_are_discarded() {
    let driver = ScriptedDriver::rgb(
        (2, 2),
        vec![
            ReadStep::OtherStream(vec![1, 2, 3]),
            ReadStep::Frame(rgb_frame(2, 2, [1, 1, 1])),
        ],
    );
    let mut display =
        create_display_with_driver(Some(&driver), MOCK_DEVICE, &fast_config()).unwrap();

    let (status, deliveries) = run_capture(&mut display, 1, 2);
    assert_eq!(status, CaptureStatus::Ok);
    assert!(!deliveries[0].fresh);
    assert!(deliveries[1].fresh);
    assert_eq!(display.stats().packets_discarded, 1);
}

/// A hard read failure ends capture with Error and no partial delivery
#[test]
fn test_read_failure_is_error() {
    let driver = ScriptedDriver::rgb(
        (2, 2),
        vec![ReadStep::Frame(rgb_frame(2, 2, [1, 1, 1])), ReadStep::Fail],
    );
    let mut display =
        create_display_with_driver(Some(&driver), MOCK_DEVICE, &fast_config()).unwrap();

    let (status, deliveries) = run_capture(&mut display, 1, 10);
    assert_eq!(status, CaptureStatus::Error);
    assert_eq!(deliveries.len(), 1);
    assert_eq!(driver.reads(), 2);

    // Teardown after a terminal error
    display.close();
    display.close();
}

/// A corrupt unit is a hard decode error
#[test]
fn test_decode_failure_is_error() {
    let driver = ScriptedDriver::mjpeg((16, 16), vec![ReadStep::Frame(vec![0xFF, 0xD8, 0x00, 0x13])]);
    let mut display =
        create_display_with_driver(Some(&driver), MOCK_DEVICE, &fast_config()).unwrap();

    let (status, deliveries) = run_capture(&mut display, 1, 10);
    assert_eq!(status, CaptureStatus::Error);
    assert!(deliveries.is_empty());
}

/// Missing device: no session, nothing probed
#[test]
fn test_missing_device_creates_no_session() {
    let driver = ScriptedDriver::rgb((640, 480), vec![]);

    let display = create_display_with_driver(Some(&driver), "/dev/does-not-exist", &fast_config());
    assert!(display.is_none());

    let log = driver.log.borrow();
    assert_eq!(log.opens, 1);
    assert_eq!(log.probes, 0);
    assert_eq!(log.reads, 0);
}

/// A stream without a decoder fails session construction
#[test]
fn test_unknown_codec_creates_no_session() {
    let driver = ScriptedDriver::new(CodecId::Unknown(*b"GREY"), (640, 480), vec![]);
    let display = create_display_with_driver(Some(&driver), MOCK_DEVICE, &fast_config());
    assert!(display.is_none());
    assert_eq!(driver.log.borrow().probes, 1);
}

/// Delivered frames are spaced by the frame interval
#[test]
fn test_frames_are_paced() {
    const FRAMES: usize = 6;
    let frames = (0..FRAMES)
        .map(|_| ReadStep::Frame(rgb_frame(4, 4, [0, 0, 0])))
        .collect();
    let driver = ScriptedDriver::rgb((4, 4), frames);
    let config = VideoConfig {
        width: 0,
        height: 0,
        framerate: 50,
    };
    let mut display = create_display_with_driver(Some(&driver), MOCK_DEVICE, &config).unwrap();
    let interval = display.frame_interval();
    assert_eq!(interval, Duration::from_millis(20));

    let (status, deliveries) = run_capture(&mut display, 2, FRAMES);
    assert_eq!(status, CaptureStatus::Ok);

    let stamps: Vec<_> = deliveries.iter().map(|d| d.timestamp.unwrap()).collect();
    let gaps: Vec<Duration> = stamps.windows(2).map(|w| w[1] - w[0]).collect();
    for gap in &gaps {
        assert!(*gap >= interval - Duration::from_millis(5), "gap {:?} too short", gap);
    }
    let average = gaps.iter().sum::<Duration>() / gaps.len() as u32;
    assert!(average <= interval * 2, "average gap {:?} too long", average);
}

/// Rows padded by the driver are repacked, not sheared
#[test]
fn test_padded_rows_are_repacked() {
    // 2x2 RGB24, row 0 red, row 1 blue, rows padded to 8 bytes
    let padded = vec![
        255, 0, 0, 255, 0, 0, 0xAA, 0xAA, //
        0, 0, 255, 0, 0, 255, 0xAA, 0xAA,
    ];
    let driver = ScriptedDriver::rgb((2, 2), vec![ReadStep::Frame(padded)]).with_stride(8);
    let mut display =
        create_display_with_driver(Some(&driver), MOCK_DEVICE, &fast_config()).unwrap();

    let (status, deliveries) = run_capture(&mut display, 1, 1);
    assert_eq!(status, CaptureStatus::Ok);
    assert!(deliveries[0].fresh);
    assert_eq!(deliveries[0].first_pixel, Some([0, 0, 255, 255]));
    assert_eq!(deliveries[0].last_pixel, Some([255, 0, 0, 255]));
}

/// A raw unit of the wrong size is an error, never a sheared frame
#[test]
fn test_raw_size_mismatch_is_error() {
    let driver = ScriptedDriver::rgb((2, 2), vec![ReadStep::Frame(vec![0u8; 16])]);
    let mut display =
        create_display_with_driver(Some(&driver), MOCK_DEVICE, &fast_config()).unwrap();

    let (status, deliveries) = run_capture(&mut display, 1, 1);
    assert_eq!(status, CaptureStatus::Error);
    assert!(deliveries.is_empty());
}

/// A host buffer whose storage disagrees with its geometry fields is reallocated
#[test]
fn test_short_host_buffer_is_reallocated() {
    let driver = ScriptedDriver::rgb(
        (2, 2),
        vec![ReadStep::Frame(rgb_frame(2, 2, [1, 2, 3]))],
    );
    let mut display =
        create_display_with_driver(Some(&driver), MOCK_DEVICE, &fast_config()).unwrap();

    let mut short = CaptureImage::new(2, 2);
    short.data.truncate(4);
    let mut lent = Some(short);
    let fresh = Cell::new(None);
    let status = display.capture(
        &mut |img: CaptureImage, is_fresh: bool| {
            fresh.set(Some((is_fresh, img.data.len())));
            false
        },
        &mut || lent.take(),
        false,
    );

    assert_eq!(status, CaptureStatus::Ok);
    assert_eq!(fresh.get(), Some((true, 2 * 4 * 2)));
}
