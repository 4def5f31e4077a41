// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use indoc::indoc;
use tempfile::TempDir;

use crate::{get_cmd_output, make_file_in_dir, oskar, read_fits_image};

#[test]
fn test_beam_pattern_writes_a_cube() {
    let dir = TempDir::new().unwrap();
    let antennas = make_file_in_dir(
        "antennas.txt",
        dir.path(),
        indoc! {"
            # A 2x2 station
            0.0 0.0
            1.1 0.0
            0.0 1.1
            1.1 1.1
        "},
    );
    let output = dir.path().join("beam.fits");
    let cmd = oskar()
        .args([
            "beam-pattern",
            "--antenna-layout",
            &antennas.display().to_string(),
            "--freqs",
            "100",
            "200",
            "--image-size",
            "32",
            "-o",
            &output.display().to_string(),
            "--no-progress-bars",
        ])
        .ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
    assert!(stdout.contains("oskar beam-pattern complete."), "{stdout}");

    let (shape, data) = read_fits_image(&output);
    assert_eq!(shape, vec![2, 32, 32]);
    for channel in 0..2 {
        // The beam points at the zenith, in the centre of the image.
        assert_abs_diff_eq!(
            data[channel * 32 * 32 + 16 * 32 + 16],
            1.0,
            epsilon = 1e-10
        );
        // The corners are off the sky.
        assert!(data[channel * 32 * 32].is_nan());
    }
}
