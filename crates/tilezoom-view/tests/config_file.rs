//! Zoom config persistence.

use tilezoom_view::{ScaleMode, ViewError, ZoomConfig};

#[test]
fn load_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zoom.ron");
    std::fs::write(
        &path,
        "(scale_mode: FitStart, read_mode: true, tiles: (tile_edge: 512), decode_threads: 2)",
    )
    .unwrap();

    let config = ZoomConfig::load(&path).unwrap();
    assert_eq!(config.scale_mode, ScaleMode::FitStart);
    assert!(config.read_mode);
    assert_eq!(config.tiles.tile_edge, 512);
    assert_eq!(config.tiles.max_bitmap_edge, 4096);
    assert_eq!(config.decode_thread_count(), 2);
    assert_eq!(config.zoom_duration_ms, 200);
}

#[test]
fn round_trips_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zoom.ron");
    let config = ZoomConfig {
        scale_mode: ScaleMode::CenterCrop,
        clean_at_min_scale: true,
        tile_cache_bytes: 0,
        ..ZoomConfig::default()
    };
    std::fs::write(&path, config.to_ron_string().unwrap()).unwrap();
    assert_eq!(ZoomConfig::load(&path).unwrap(), config);
}

#[test]
fn invalid_values_are_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zoom.ron");
    std::fs::write(&path, "(rubber_band_factor: 7.0, tiles: (tile_edge: 1))").unwrap();

    let config = ZoomConfig::load(&path).unwrap();
    assert_eq!(config.rubber_band_factor, 0.4);
    assert_eq!(config.tiles.tile_edge, 1024);
}

#[test]
fn malformed_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zoom.ron");
    std::fs::write(&path, "(scale_mode: Sideways)").unwrap();

    let err = ZoomConfig::load(&path).unwrap_err();
    assert!(matches!(err, ViewError::Config { .. }));
    assert!(err.to_string().contains("zoom.ron"));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ZoomConfig::load(dir.path().join("absent.ron")).unwrap_err();
    assert!(matches!(err, ViewError::Io(_)));
}
