//! End-to-end scenarios, built from synthetic FITS/XISF byte buffers the
//! same way the component crates build their own in-test fixtures — no
//! external binary test assets.

use std::path::Path;

use chrono::Utc;
use flatcal::{CalibrationRunner, ProcessingConfiguration};
use flatcal_grid::{ImageData, Keywords};
use flatcal_match::match_dark;
use flatcal_meta::{FrameType, ImageMetadata};
use flatcal_scan::{CancellationToken, DarkFrame, ExposureGroup};
use flatcal_threadpool::BoundedPool;

fn write_fits(path: &Path, value: f64, image_type: &str, exposure: Option<&str>) {
    let mut kw = Keywords::new();
    kw.set("IMAGETYP", image_type);
    if let Some(e) = exposure {
        kw.set("EXPTIME", e);
    }
    flatcal_image::write_fits(path, &ImageData::new(2, 2, 1, vec![value; 4], kw)).unwrap();
}

fn write_xisf(path: &Path, value: f64, image_type: &str, exposure: &str) {
    let mut kw = Keywords::new();
    kw.set("IMAGETYP", image_type);
    kw.set("EXPTIME", exposure);
    flatcal_image::write_xisf(path, &ImageData::new(2, 2, 1, vec![value; 4], kw)).unwrap();
}

/// Scenario 1: three flats and one matching dark produce a single uniform
/// master flat, named from today's date and the "Unknown" directory
/// fallback since none of the filenames carry a recognizable filter token.
#[test]
fn three_flats_and_one_dark_produce_a_uniform_master() {
    let root = tempfile::tempdir().unwrap();
    let flats_root = root.path().join("Session");
    let flats_dir = flats_root.join("Unknown");
    std::fs::create_dir_all(&flats_dir).unwrap();
    write_fits(&flats_dir.join("flat_001.fits"), 0.5, "Flat", Some("1.5"));
    write_fits(&flats_dir.join("flat_002.fits"), 0.5, "Flat", Some("1.5"));
    write_fits(&flats_dir.join("flat_003.fits"), 0.5, "Flat", Some("1.5"));

    let darks_root = root.path().join("Darks");
    std::fs::create_dir_all(&darks_root).unwrap();
    write_xisf(&darks_root.join("masterdark_1.5s.xisf"), 0.1, "Master Dark", "1.5");

    let summary = CalibrationRunner::new(vec![flats_root])
        .dark_roots(vec![darks_root])
        .pool_degree(1)
        .run_blocking()
        .unwrap();

    assert_eq!(summary.groups_total, 1);
    assert_eq!(summary.groups_succeeded, 1);
    assert_eq!(summary.output_paths.len(), 1);

    let output_path = &summary.output_paths[0];
    let today = Utc::now().format("%Y-%m-%d").to_string();
    let expected_name = format!("MasterFlat_{today}_UNKNOWN_Bin1_1.5s.xisf");
    assert_eq!(output_path.file_name().unwrap().to_str().unwrap(), expected_name);

    let written = flatcal_image::read(output_path).unwrap();
    assert_eq!(written.keywords().get("IMAGETYP"), Some("Master Flat"));
    let first = written.pixels()[0];
    assert!(written.pixels().iter().all(|p| (p - first).abs() < 1e-9));
}

/// Scenario 2: a dark-only directory is cataloged as darks and contributes
/// no flat job, because it was never given to the runner as a flat root.
#[test]
fn dark_only_directory_is_cataloged_but_never_a_flat_job() {
    let root = tempfile::tempdir().unwrap();
    let darks_root = root.path().join("Darks");
    std::fs::create_dir_all(&darks_root).unwrap();
    write_fits(&darks_root.join("dark_001.fits"), 0.1, "Dark", Some("1.0"));
    write_fits(&darks_root.join("dark_002.fits"), 0.1, "Dark", Some("1.0"));
    write_fits(&darks_root.join("dark_003.fits"), 0.1, "Dark", Some("1.0"));

    let cache = flatcal_meta::MetadataCache::new();
    let pool = BoundedPool::with_degree(1);
    let cancel = CancellationToken::new();
    let (tx, _rx) = flatcal_scan::channel(16);
    let dark_outcome = flatcal_scan::scan_darks(&[darks_root.clone()], &cache, &pool, &cancel, &tx);
    assert_eq!(dark_outcome.catalog.len(), 3);
    assert!(dark_outcome.catalog.iter().all(|d| d.frame_type == FrameType::Dark));

    let flats_root = root.path().join("Flats");
    std::fs::create_dir_all(&flats_root).unwrap();
    let summary = CalibrationRunner::new(vec![flats_root])
        .dark_roots(vec![darks_root])
        .pool_degree(1)
        .run_blocking()
        .unwrap();
    assert_eq!(summary.groups_total, 0);
}

/// Scenario 3: a WBPP-style already-produced master flat is filtered out of
/// both the flat scan and the dark catalog, and forms no group.
#[test]
fn wbpp_master_flat_output_is_filtered_from_both_scans() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("Mixed");
    std::fs::create_dir_all(&dir).unwrap();
    write_xisf(
        &dir.join("masterFlat_BIN-1_9576x6388_FILTER-Blue_mono.xisf"),
        1.0,
        "Master Flat",
        "1.5",
    );

    let cache = flatcal_meta::MetadataCache::new();
    let pool = BoundedPool::with_degree(1);
    let cancel = CancellationToken::new();
    let (tx, _rx) = flatcal_scan::channel(16);

    let flat_outcome = flatcal_scan::scan_flats(&[dir.clone()], None, &cache, &pool, &cancel, &tx);
    assert!(flat_outcome.jobs.is_empty());

    let dark_outcome = flatcal_scan::scan_darks(&[dir], &cache, &pool, &cancel, &tx);
    assert!(dark_outcome.catalog.is_empty());
}

fn flat_group(exposure: f64) -> ExposureGroup {
    let record = ImageMetadata {
        path: std::path::PathBuf::from("flat_001.fits"),
        frame_type: FrameType::Flat,
        exposure: Some(exposure),
        binning: None,
        gain: None,
        offset: None,
        temperature: None,
        filter: None,
        date_obs: None,
    };
    let mut records = vec![record.clone(), record.clone(), record];
    records[1].path = std::path::PathBuf::from("flat_002.fits");
    records[2].path = std::path::PathBuf::from("flat_003.fits");
    ExposureGroup::from_records(exposure, records).unwrap()
}

fn dark_frame(path: &str, frame_type: FrameType, exposure: f64) -> DarkFrame {
    DarkFrame {
        path: std::path::PathBuf::from(path),
        frame_type,
        exposure,
        binning: None,
        gain: None,
        offset: None,
        temperature: None,
        user_selected: false,
        origin_dir: std::path::PathBuf::from("/darks"),
    }
}

/// Scenario 4: a 15s group with 8s and 30s masters available and
/// `allow_nearest_with_optimize = true` selects the 8s master, scaled.
#[test]
fn fifteen_second_group_picks_nearest_eight_second_master_with_optimize() {
    let catalog = vec![
        dark_frame("master_8s.fits", FrameType::MasterDark, 8.0),
        dark_frame("master_30s.fits", FrameType::MasterDark, 30.0),
    ];
    let config = ProcessingConfiguration::default().dark_matching_allow_nearest_with_optimize(true);
    let (result, _diagnostic) = match_dark(&flat_group(15.0), &catalog, &config);

    assert_eq!(result.path.unwrap(), std::path::PathBuf::from("master_8s.fits"));
    assert!(result.optimize);
    assert_eq!(result.kind, "MasterDark(nearest<=10s+optimize,8.000s)");
}

/// Scenario 5: a 15s group with only an 8s master and
/// `allow_nearest_with_optimize = false` falls back to the library's bias.
#[test]
fn fifteen_second_group_falls_back_to_bias_when_optimize_disabled() {
    let catalog = vec![
        dark_frame("master_8s.fits", FrameType::MasterDark, 8.0),
        dark_frame("masterbias.fits", FrameType::MasterBias, 0.0),
    ];
    let config = ProcessingConfiguration::default();
    let (result, _diagnostic) = match_dark(&flat_group(15.0), &catalog, &config);

    assert_eq!(result.path.unwrap(), std::path::PathBuf::from("masterbias.fits"));
    assert_eq!(result.kind, "MasterBias");
    assert!(!result.optimize);
}

/// Scenario 6 (pipeline wiring): a six-frame group at E=2s with one
/// per-column outlier still integrates to completion through the full
/// winsorized-sigma-clip tier (n>=6), producing a single master. The exact
/// numeric rejection behavior of the default 5-sigma band is covered by
/// `flatcal-integrate`'s own `rejection` unit tests, including the
/// self-masking caveat for a lone extreme value in a small stack.
#[test]
fn six_frame_group_with_outliers_integrates_through_the_winsorized_tier() {
    let root = tempfile::tempdir().unwrap();
    let flats_dir = root.path().join("Flats");
    std::fs::create_dir_all(&flats_dir).unwrap();
    for i in 0..6 {
        let mut pixels = vec![1000.0; 4];
        pixels[i % 4] = 50_000.0;
        let mut kw = Keywords::new();
        kw.set("IMAGETYP", "Flat");
        kw.set("EXPTIME", "2.0");
        flatcal_image::write_fits(&flats_dir.join(format!("flat_{i:03}.fits")), &ImageData::new(2, 2, 1, pixels, kw)).unwrap();
    }

    let darks_root = root.path().join("Darks");
    std::fs::create_dir_all(&darks_root).unwrap();
    write_fits(&darks_root.join("dark_2s.fits"), 0.0, "Dark", Some("2.0"));

    let summary = CalibrationRunner::new(vec![flats_dir])
        .dark_roots(vec![darks_root])
        .config(ProcessingConfiguration::default())
        .pool_degree(1)
        .run_blocking()
        .unwrap();

    assert_eq!(summary.groups_succeeded, 1);
    let output = flatcal_image::read(&summary.output_paths[0]).unwrap();
    assert_eq!(output.pixels().len(), 4);
    assert!(output.pixels().iter().all(|p| p.is_finite() && *p > 0.0));
}

/// Grounds the exposure-key rendering invariant from the testable
/// properties list against the literal examples given there.
#[test]
fn exposure_key_matches_the_documented_examples() {
    assert_eq!(flatcal_meta::exposure_key(Some(1.0)), "1s");
    assert_eq!(flatcal_meta::exposure_key(Some(1.001)), "1.001s");
    assert_eq!(flatcal_meta::exposure_key(Some(0.5)), "0.5s");
    assert_eq!(flatcal_meta::exposure_key(Some(10.125)), "10.125s");
    assert_eq!(flatcal_meta::exposure_key(None), "Unknown");
}
