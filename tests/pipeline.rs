use image::{Rgb, RgbImage};
use std::path::Path;
use vidscii::pool::frame_path;
use vidscii::{
    map_frames, AppConfig, CancelToken, FrameCache, FrameMapper, Gradient, Pipeline, PipelineOptions, SchedulingMode,
    StopReason, VideoSource,
};

/// Write `values.len()` uniform grey 4x2 frames, numbered like the transcoder does.
fn write_frames(dir: &Path, values: &[u8]) {
    for (i, v) in values.iter().enumerate() {
        RgbImage::from_pixel(4, 2, Rgb([*v, *v, *v]))
            .save(frame_path(dir, i))
            .unwrap();
    }
}

#[test]
fn test_mapped_frames_survive_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let values = [0u8, 255, 128, 0, 255];
    write_frames(dir.path(), &values);

    let mapper = FrameMapper::new(Gradient::new("#. ").unwrap());
    let frames = map_frames(dir.path(), values.len(), &mapper, 3, None::<fn(usize, usize)>, &CancelToken::new()).unwrap();
    assert_eq!(frames.len(), 5);
    assert_eq!(frames[0], "        \n        \n");
    assert_eq!(frames[1], "########\n########\n");
    assert_eq!(frames[2], "........\n........\n");
    assert_eq!(frames[3], frames[0]);

    let cache = FrameCache::new(dir.path().join("frames.dat"));
    cache.save(&frames).unwrap();
    assert_eq!(cache.load().unwrap(), frames);
}

#[test]
fn test_replay_from_cache_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        cache_path: dir.path().join("frames.dat"),
        work_dir: dir.path().join("work"),
        scheduling: SchedulingMode::PerTick,
        ..AppConfig::default()
    };
    let frames: Vec<String> = (0..4).map(|i| format!("frame {}\n", i)).collect();
    FrameCache::new(&config.cache_path).save(&frames).unwrap();

    let render = config.render_settings(None).unwrap();
    let mut options = PipelineOptions::from_config(&config, VideoSource::Path(dir.path().join("none.mp4")), render);
    options.map_frames = false;
    options.play_audio = false;
    options.fps = Some(200);

    let mut out: Vec<u8> = Vec::new();
    let report = Pipeline::new(options)
        .run_to(&mut out, &CancelToken::new(), None::<fn(usize, usize)>)
        .unwrap();
    assert_eq!(report.stop, StopReason::Exhausted);
    assert_eq!(report.frames_shown, 4);

    let text = String::from_utf8(out).unwrap();
    let mut last = 0;
    for frame in &frames {
        let at = text[last..].find(frame.as_str()).expect("frame missing or out of order") + last;
        last = at + frame.len();
    }
    assert_eq!(text.matches("00:00:00 / 00:00:00 [").count(), 4);
}

#[test]
fn test_cancelled_before_start_shows_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        cache_path: dir.path().join("frames.dat"),
        ..AppConfig::default()
    };
    FrameCache::new(&config.cache_path)
        .save(&["a\n".to_string(), "b\n".to_string()])
        .unwrap();

    let render = config.render_settings(None).unwrap();
    let mut options = PipelineOptions::from_config(&config, VideoSource::Path(dir.path().join("none.mp4")), render);
    options.map_frames = false;
    options.play_audio = false;
    options.fps = Some(10);

    let cancel = CancelToken::new();
    cancel.cancel();
    let mut out: Vec<u8> = Vec::new();
    let report = Pipeline::new(options).run_to(&mut out, &cancel, None::<fn(usize, usize)>).unwrap();
    assert_eq!(report.stop, StopReason::Cancelled);
    assert_eq!(report.frames_shown, 0);
    assert!(out.is_empty());
}
