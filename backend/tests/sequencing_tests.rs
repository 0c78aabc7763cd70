mod support;

use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime};

use proptest::prelude::*;

use skycam::camera::{Camera, MockCamera};
use skycam::models::{read_json, FileInfo, FILE_INFO_FILE};
use skycam::services::sequencer::{padding_width, sequence_frames, FramePattern};

fn touch(dir: &Path, name: &str, mtime_offset: u64) {
    let file = File::create(dir.join(name)).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + mtime_offset))
        .unwrap();
}

#[test]
fn test_night_of_37_frames() {
    let dir = tempfile::tempdir().unwrap();
    let mut camera = MockCamera::new();
    for i in 0..37 {
        // Capture-time names, written in capture order.
        let name = format!("20240621_{:06}.jpg", 223_000 + i * 430);
        camera.capture(30_000_000, &dir.path().join(name)).unwrap();
    }

    let info = sequence_frames(dir.path(), ".jpg", None).unwrap();
    assert_eq!(info, FileInfo { image_count: 37, padding: 4 });

    let mut expected: Vec<String> = (1..=37).map(|i| format!("{:04}.jpg", i)).collect();
    expected.push(FILE_INFO_FILE.to_string());
    expected.sort();
    assert_eq!(support::file_names(dir.path()), expected);

    let stored: FileInfo = read_json(dir.path(), FILE_INFO_FILE).unwrap();
    assert_eq!(stored, info);
}

#[test]
fn test_capture_order_survives_renaming() {
    let dir = tempfile::tempdir().unwrap();
    // Names sort opposite to capture order.
    touch(dir.path(), "c.jpg", 1);
    touch(dir.path(), "b.jpg", 2);
    touch(dir.path(), "a.jpg", 3);
    std::fs::write(dir.path().join("c.jpg"), "first").unwrap();
    File::options()
        .write(true)
        .open(dir.path().join("c.jpg"))
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_001))
        .unwrap();

    sequence_frames(dir.path(), ".jpg", None).unwrap();
    assert_eq!(std::fs::read_to_string(dir.path().join("0001.jpg")).unwrap(), "first");
}

#[test]
fn test_zero_frames() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("capture_log_20240621.log"), "").unwrap();

    let info = sequence_frames(dir.path(), ".jpg", None).unwrap();
    assert_eq!(info, FileInfo { image_count: 0, padding: 4 });
    assert!(dir.path().join("capture_log_20240621.log").exists());
}

#[test]
fn test_second_pass_keeps_the_same_frames() {
    // Re-sequencing an already sequenced directory is not idempotent when
    // frames share a modification time: their relative order is not
    // defined. Only the set of contents and the numbering are stable.
    let dir = tempfile::tempdir().unwrap();
    for i in 0..12 {
        let path = dir.path().join(format!("frame_{:02}.jpg", i));
        std::fs::write(&path, format!("payload {}", i)).unwrap();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000))
            .unwrap();
    }

    sequence_frames(dir.path(), ".jpg", None).unwrap();
    let info = sequence_frames(dir.path(), ".jpg", None).unwrap();
    assert_eq!(info.image_count, 12);

    let pattern = FramePattern::new(info.padding, ".jpg");
    let frames = pattern.list(dir.path()).unwrap();
    assert_eq!(frames.len(), 12);

    let contents: BTreeSet<String> = frames
        .iter()
        .map(|p| std::fs::read_to_string(p).unwrap())
        .collect();
    let expected: BTreeSet<String> = (0..12).map(|i| format!("payload {}", i)).collect();
    assert_eq!(contents, expected);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_sequence_is_contiguous(count in 1usize..150) {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..count {
            touch(dir.path(), &format!("shot_{}.png", i), (count - i) as u64);
        }

        let info = sequence_frames(dir.path(), ".png", None).unwrap();
        prop_assert_eq!(info.image_count, count);
        prop_assert_eq!(info.padding, padding_width(count));

        let pattern = FramePattern::new(info.padding, ".png");
        let names: Vec<String> = pattern
            .list(dir.path())
            .unwrap()
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        let expected: Vec<String> = (1..=count).map(|i| format!("{:04}.png", i)).collect();
        prop_assert_eq!(names, expected);
    }

    #[test]
    fn prop_padding_width(count in 1usize..10_000_000) {
        let width = padding_width(count);
        prop_assert!(width >= 4);
        // Every index up to `count` fits in `width` digits.
        prop_assert!(count.to_string().len() <= width || count == 10usize.pow(width as u32));
        if width > 4 {
            prop_assert!(count > 10usize.pow(width as u32 - 1));
        }
    }
}
