// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::io::Write;

use approx::assert_abs_diff_eq;
use indoc::indoc;
use tempfile::NamedTempFile;

use super::*;

fn layout_file(contents: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f
}

#[test]
fn test_read_layout() {
    let f = layout_file(indoc! {"
        # east north height
        0.0 0.0
        10.5, -3.0, 1.0

        -7   2 # trailing comment
    "});
    let enhs = read_layout(f.path()).unwrap();
    assert_eq!(enhs.len(), 3);
    assert_abs_diff_eq!(enhs[1].e, 10.5);
    assert_abs_diff_eq!(enhs[1].n, -3.0);
    assert_abs_diff_eq!(enhs[1].h, 1.0);
    assert_abs_diff_eq!(enhs[2].e, -7.0);
    assert_abs_diff_eq!(enhs[2].h, 0.0);
}

#[test]
fn test_read_bad_layouts() {
    let f = layout_file("0 0\n1 2 3 4\n");
    let result = read_layout(f.path());
    assert!(matches!(
        result,
        Err(CommonArgsError::BadLayoutLine { line_num: 2, .. })
    ));

    let f = layout_file("0 north\n");
    assert!(matches!(
        read_layout(f.path()),
        Err(CommonArgsError::BadLayoutLine { line_num: 1, .. })
    ));

    let f = layout_file("# nothing here\n");
    assert!(matches!(
        read_layout(f.path()),
        Err(CommonArgsError::EmptyLayout(_))
    ));

    assert!(matches!(
        read_layout(Path::new("/does/not/exist.txt")),
        Err(CommonArgsError::IO(_))
    ));
}

#[test]
fn test_telescope_defaults() {
    let telescope = TelescopeArgs::default().parse(false).unwrap();
    assert_eq!(telescope.num_stations(), 1);
    assert_eq!(telescope.num_antennas_per_station(), 1);
    assert_eq!(telescope.element_pattern, ElementPattern::Isotropic);
    assert_abs_diff_eq!(
        telescope.array_position.latitude_rad,
        DEFAULT_ARRAY_LAT_DEG.to_radians()
    );

    assert!(matches!(
        TelescopeArgs::default().parse(true),
        Err(CommonArgsError::NoStations)
    ));
}

#[test]
fn test_telescope_from_inline_and_files() {
    let stations = layout_file("0 0\n100 0\n0 100\n");
    let args = TelescopeArgs {
        array_position: Some(vec![21.4, -30.7, 1000.0]),
        station_layout: Some(stations.path().to_path_buf()),
        antennas: Some(vec![vec![0.0, 0.0], vec![1.0, 1.0, 0.5]]),
        element_pattern: Some("Dipole".to_string()),
        ..Default::default()
    };
    let telescope = args.parse(true).unwrap();
    assert_eq!(telescope.num_stations(), 3);
    assert_eq!(telescope.num_baselines(), 3);
    assert_eq!(telescope.num_antennas_per_station(), 2);
    assert_eq!(telescope.element_pattern, ElementPattern::Dipole);
    assert_abs_diff_eq!(telescope.array_position.height_metres, 1000.0);
    assert_abs_diff_eq!(telescope.antenna_enhs[1].h, 0.5);
}

#[test]
fn test_bad_telescope_args() {
    let args = TelescopeArgs {
        array_position: Some(vec![21.4, -30.7]),
        ..Default::default()
    };
    assert!(matches!(
        args.parse(false),
        Err(CommonArgsError::BadArrayPosition { .. })
    ));

    let stations = layout_file("0 0\n");
    let args = TelescopeArgs {
        stations: Some(vec![vec![0.0, 0.0]]),
        station_layout: Some(stations.path().to_path_buf()),
        ..Default::default()
    };
    assert!(matches!(
        args.parse(true),
        Err(CommonArgsError::InlineAndLayout("stations"))
    ));

    let args = TelescopeArgs {
        stations: Some(vec![vec![0.0]]),
        ..Default::default()
    };
    assert!(matches!(
        args.parse(true),
        Err(CommonArgsError::BadPosition { what: "stations", .. })
    ));

    let args = TelescopeArgs {
        element_pattern: Some("helix".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        args.parse(false),
        Err(CommonArgsError::BadElementPattern(_))
    ));
}

#[test]
fn test_merge_prefers_the_first_args() {
    let cli = TelescopeArgs {
        element_pattern: Some("dipole".to_string()),
        ..Default::default()
    };
    let file = TelescopeArgs {
        element_pattern: Some("isotropic".to_string()),
        stations: Some(vec![vec![0.0, 0.0]]),
        ..Default::default()
    };
    let merged = cli.merge(file);
    assert_eq!(merged.element_pattern.as_deref(), Some("dipole"));
    assert!(merged.stations.is_some());

    let merged = ComputeArgs {
        precision: None,
        gpu: false,
    }
    .merge(ComputeArgs {
        precision: Some("single".to_string()),
        gpu: false,
    });
    assert_eq!(merged.precision.as_deref(), Some("single"));
}

#[test]
fn test_compute_args() {
    let (precision, location) = ComputeArgs {
        precision: Some("SINGLE".to_string()),
        gpu: false,
    }
    .parse()
    .unwrap();
    assert_eq!(precision, Precision::Single);
    assert_eq!(location, Location::Cpu);

    let result = ComputeArgs {
        precision: Some("half".to_string()),
        gpu: false,
    }
    .parse();
    assert!(matches!(result, Err(OskarError::Generic(_))));
}

#[test]
#[cfg(not(any(feature = "cuda", feature = "hip")))]
fn test_gpu_is_unavailable() {
    let result = ComputeArgs {
        precision: None,
        gpu: true,
    }
    .parse();
    assert_eq!(
        result.err().unwrap().code(),
        crate::ErrorCode::BackendUnavailable
    );
}

#[test]
fn test_arg_file_types() {
    assert!(matches!(
        ArgFileTypes::from_str("toml"),
        Ok(ArgFileTypes::Toml)
    ));
    assert!(ArgFileTypes::from_str("yaml").is_err());
    assert_eq!(*ARG_FILE_TYPES_COMMA_SEPARATED, "toml, json");
}
