// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use camera_vid::backends::camera::ColourSpace;
use camera_vid::config::{MetadataFormat, SourceKind};
use camera_vid::{Codec, Config};
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.codec, Codec::Yuv420);
    assert_eq!(config.source, SourceKind::V4l2);
    assert!(!config.keypress, "Keypress mode should be off by default");
    assert!(!config.signal, "Signal mode should be off by default");
    assert!(config.output.is_none(), "No output unless asked for");
}

#[test]
fn test_config_json_roundtrip_keeps_fields() {
    let config = Config {
        frames: 25,
        codec: Codec::Mjpeg,
        signal: true,
        metadata_format: MetadataFormat::Txt,
        ..Config::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(Config::from_json(&json).unwrap(), config);
}

#[test]
fn test_partial_json_uses_defaults() {
    let config = Config::from_json(r#"{ "codec": "raw", "source": "pattern" }"#).unwrap();
    assert_eq!(config.codec, Codec::Raw);
    assert_eq!(config.source, SourceKind::Pattern);
    assert_eq!(config.width, Config::default().width);
    assert_eq!(config.colour_space(), ColourSpace::Raw);
    assert!(config.stream_flags().raw);
}

#[test]
fn test_unknown_codec_is_rejected() {
    assert!(Config::from_json(r#"{ "codec": "h265" }"#).is_err());
    assert!("h265".parse::<Codec>().is_err());
    assert_eq!("MJPEG".parse::<Codec>().unwrap(), Codec::Mjpeg);
}

#[test]
fn test_watchdog_zero_falls_back_to_default() {
    let config = Config {
        watchdog_ms: 0,
        ..Config::default()
    };
    assert_eq!(config.watchdog(), Duration::from_millis(1000));
}

#[test]
fn test_load_reports_path_on_missing_file() {
    let err = Config::load(std::path::Path::new("/nonexistent/camera.json")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/camera.json"));
}
