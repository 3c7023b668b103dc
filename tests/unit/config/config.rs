use super::*;

#[test]
fn empty_object_is_the_default() {
    assert_eq!(PipelineConfig::from_json("{}").unwrap(), PipelineConfig::default());
}

#[test]
fn partial_sections_keep_other_defaults() {
    let cfg = PipelineConfig::from_json(
        r#"{"encode": {"crf": 18}, "render": {"parallel": true, "threads": 3}, "jobs": {"output_dir": "/tmp/clips"}}"#,
    )
    .unwrap();
    assert_eq!(cfg.encode.crf, 18);
    assert_eq!(cfg.encode.preset, "veryfast");
    assert!(cfg.render.parallel);
    assert_eq!(cfg.render.threads, Some(3));
    assert_eq!(cfg.render.chunk_size, 64);
    assert_eq!(cfg.jobs.output_dir, PathBuf::from("/tmp/clips"));
    assert_eq!(cfg.jobs.retention_secs, 3600);
}

#[test]
fn invalid_values_are_validation_errors() {
    for text in [
        r#"{"encode": {"crf": 60}}"#,
        r#"{"encode": {"preset": "fast; rm"}}"#,
        r#"{"render": {"threads": 0}}"#,
        r#"{"sanitize": {"hr_min_bpm": 200, "hr_max_bpm": 100}}"#,
        r#"{"style": {"outline_px": -1}}"#,
        r#"{"encode": "#,
    ] {
        assert!(
            matches!(PipelineConfig::from_json(text), Err(PulseError::Validation(_))),
            "{text}"
        );
    }
}

#[test]
fn missing_file_reports_path() {
    let err = PipelineConfig::from_path(Path::new("/nonexistent/pulseclip.json")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/pulseclip.json"));
}

#[test]
fn sink_opts_carry_encode_settings() {
    let enc = EncodeOpts {
        overwrite: false,
        crf: 23,
        preset: "medium".to_string(),
    };
    let opts = enc.sink_opts("/tmp/a.mp4", [1, 2, 3, 255]);
    assert_eq!(opts.out_path, PathBuf::from("/tmp/a.mp4"));
    assert!(!opts.overwrite);
    assert_eq!((opts.crf, opts.preset.as_str()), (23, "medium"));
    assert_eq!(opts.bg_rgba, [1, 2, 3, 255]);
}
