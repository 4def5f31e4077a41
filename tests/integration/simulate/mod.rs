// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use hifitime::{Duration, Epoch};
use indoc::formatdoc;
use marlu::precession::get_lmst;
use tempfile::TempDir;

use crate::{get_cmd_output, make_file_in_dir, oskar, read_fits_image};
use oskar::{constants::*, ErrorCode};

/// The RA of the zenith at the middle of the first default timestep
/// [degrees].
fn zenith_ra_deg() -> f64 {
    let epoch = Epoch::from_gpst_seconds(DEFAULT_START_GPS_SECONDS + DEFAULT_TIME_RES_SECONDS / 2.0);
    get_lmst(DEFAULT_ARRAY_LONG_DEG.to_radians(), epoch, Duration::default()).to_degrees()
}

/// An argument file for three stations observing one source at the phase
/// centre.
fn args_file(dir: &TempDir, algorithm: &str) -> std::path::PathBuf {
    let ra = zenith_ra_deg();
    let dec = DEFAULT_ARRAY_LAT_DEG;
    let output = dir.path().join("sim");
    make_file_in_dir(
        "sim.toml",
        dir.path(),
        &formatdoc! {r#"
            [telescope]
            stations = [[0.0, 0.0], [120.0, 10.0], [-30.0, 85.0, 1.0]]

            [observation]
            ra = {ra}
            dec = {dec}
            num_timesteps = 2
            num_channels = 2

            [imager]
            image_size = 32
            fov = 1.0
            algorithm = "{algorithm}"
            output = "{output}"

            [[sky]]
            ra = {ra}
            dec = {dec}
            i = 3.0
        "#, output = output.display()},
    )
}

#[test]
fn test_simulate_writes_images() {
    let dir = TempDir::new().unwrap();
    let args_file = args_file(&dir, "dft2d");
    let cmd = oskar()
        .args(["simulate", &args_file.display().to_string(), "--no-progress-bars"])
        .ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
    assert!(stdout.contains("oskar simulate complete."), "{stdout}");

    let image = dir.path().join("sim_I.fits");
    assert!(image.exists());
    let (shape, data) = read_fits_image(&image);
    assert_eq!(shape, vec![2, 32, 32]);
    // Both channels have the source flux at the centre pixel.
    for channel in 0..2 {
        let centre = channel * 32 * 32 + 16 * 32 + 16;
        assert_abs_diff_eq!(data[centre], 3.0, epsilon = 1e-6);
    }
}

#[test]
fn test_simulate_fft_and_cli_overrides() {
    let dir = TempDir::new().unwrap();
    let args_file = args_file(&dir, "dft2d");
    let output = dir.path().join("override");
    let cmd = oskar()
        .args([
            "simulate",
            &args_file.display().to_string(),
            "--algorithm",
            "fft",
            "--image-size",
            "64",
            "-o",
            &output.display().to_string(),
            "--write-grids",
            "--no-progress-bars",
        ])
        .ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}\n{stdout}");

    let (shape, data) = read_fits_image(&dir.path().join("override_I.fits"));
    assert_eq!(shape, vec![2, 64, 64]);
    let peak = data[..64 * 64]
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |(i_max, max), (i, &v)| {
            if v > max {
                (i, v)
            } else {
                (i_max, max)
            }
        })
        .0;
    assert_eq!(peak, 32 * 64 + 32);
    assert!(dir.path().join("override_I_GRID.fits").exists());
}

#[test]
fn test_dry_run_and_save_toml() {
    let dir = TempDir::new().unwrap();
    let args_file = args_file(&dir, "dft3d");
    let saved = dir.path().join("saved.toml");
    let cmd = oskar()
        .args([
            "simulate",
            &args_file.display().to_string(),
            "--dry-run",
            "--save-toml",
            &saved.display().to_string(),
        ])
        .ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
    assert!(stdout.contains("Dry run -- exiting now."), "{stdout}");
    assert!(!dir.path().join("sim_I.fits").exists());

    // The saved arguments reproduce the run.
    let saved_contents = std::fs::read_to_string(&saved).unwrap();
    assert!(saved_contents.contains("[[sky]]"), "{saved_contents}");
    let cmd = oskar()
        .args(["simulate", &saved.display().to_string(), "--dry-run"])
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
}

#[test]
fn test_bad_args_exit_with_a_status_code() {
    let dir = TempDir::new().unwrap();

    // No sources.
    let args_file = make_file_in_dir(
        "empty.toml",
        dir.path(),
        "[telescope]\nstations = [[0.0, 0.0], [10.0, 0.0]]\n",
    );
    let output = oskar()
        .args(["simulate", &args_file.display().to_string()])
        .output()
        .unwrap();
    assert_eq!(
        output.status.code(),
        Some(ErrorCode::InvalidArgument.code())
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No sources"), "{stderr}");

    // An unrecognised argument file type.
    let args_file = make_file_in_dir("args.yaml", dir.path(), "");
    let output = oskar()
        .args(["simulate", &args_file.display().to_string()])
        .output()
        .unwrap();
    assert_eq!(
        output.status.code(),
        Some(ErrorCode::InvalidArgument.code())
    );
}
