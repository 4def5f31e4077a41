// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Image the beam of a station.


use std::path::PathBuf;

use clap::Parser;
use hifitime::{Duration, Epoch};
use log::{debug, info, trace};
use marlu::{precession::get_lmst, Jones, RADec};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vec1::Vec1;

use super::{
    common::{display_warnings, ComputeArgs, InfoPrinter, TelescopeArgs, ARG_FILE_HELP},
    OskarError,
};
use crate::{
    constants::*,
    imager::{write_cube, CubeHeader},
    jones::{evaluate_station_beam, HorizonDirections},
    mem::{Location, Mem, Precision},
    run_log::RunLog,
    telescope::{ElementPattern, Telescope},
};

const DEFAULT_BEAM_IMAGE_SIZE: usize = 128;
const DEFAULT_BEAM_FOV_DEG: f64 = 180.0;

lazy_static::lazy_static! {
    static ref TIME_HELP: String =
        format!("The GPS time at which the beam is evaluated [seconds]. Default: {DEFAULT_START_GPS_SECONDS}");

    static ref FREQS_HELP: String =
        format!("The frequencies at which the beam is evaluated [MHz]. Each frequency is a plane of the output cube. Default: {DEFAULT_START_FREQ_MHZ}");

    static ref IMAGE_SIZE_HELP: String =
        format!("The side length of the output image [pixels]. Default: {DEFAULT_BEAM_IMAGE_SIZE}");

    static ref FOV_HELP: String =
        format!("The field of view of the output image [degrees]. Default: {DEFAULT_BEAM_FOV_DEG}");

    static ref OUTPUT_HELP: String =
        format!("The FITS file to write. Default: {DEFAULT_BEAM_PATTERN_FILENAME}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct BeamPatternCliArgs {
    /// The right ascension that the beam points at, which is also the centre
    /// of the image [degrees]. Default: the zenith.
    #[clap(short, long, help_heading = "BEAM")]
    pub(super) ra: Option<f64>,

    /// The declination that the beam points at, which is also the centre of
    /// the image [degrees]. Default: the zenith.
    #[clap(short, long, allow_hyphen_values = true, help_heading = "BEAM")]
    pub(super) dec: Option<f64>,

    #[clap(long, help = TIME_HELP.as_str(), help_heading = "BEAM")]
    pub(super) time: Option<f64>,

    /// Use this value as the DUT1 [seconds]. Default: 0
    #[clap(long, allow_hyphen_values = true, help_heading = "BEAM")]
    pub(super) dut1: Option<f64>,

    #[clap(short, long, multiple_values(true), help = FREQS_HELP.as_str(), help_heading = "BEAM")]
    pub(super) freqs: Option<Vec<f64>>,

    #[clap(long, help = IMAGE_SIZE_HELP.as_str(), help_heading = "OUTPUT")]
    pub(super) image_size: Option<usize>,

    #[clap(long, help = FOV_HELP.as_str(), help_heading = "OUTPUT")]
    pub(super) fov: Option<f64>,

    #[clap(short, long, help = OUTPUT_HELP.as_str(), help_heading = "OUTPUT")]
    pub(super) output: Option<PathBuf>,
}

impl BeamPatternCliArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            ra: self.ra.or(other.ra),
            dec: self.dec.or(other.dec),
            time: self.time.or(other.time),
            dut1: self.dut1.or(other.dut1),
            freqs: self.freqs.or(other.freqs),
            image_size: self.image_size.or(other.image_size),
            fov: self.fov.or(other.fov),
            output: self.output.or(other.output),
        }
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct BeamPatternArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "telescope")]
    #[serde(default)]
    pub(super) telescope_args: TelescopeArgs,

    #[clap(flatten)]
    #[serde(rename = "compute")]
    #[serde(default)]
    pub(super) compute_args: ComputeArgs,

    #[clap(flatten)]
    #[serde(rename = "beam-pattern")]
    #[serde(default)]
    pub(super) beam_args: BeamPatternCliArgs,
}

impl BeamPatternArgs {
    pub(super) fn merge(self) -> Result<BeamPatternArgs, OskarError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let BeamPatternArgs {
                args_file: _,
                telescope_args,
                compute_args,
                beam_args,
            } = unpack_arg_file!(arg_file);

            Ok(BeamPatternArgs {
                args_file: None,
                telescope_args: cli_args.telescope_args.merge(telescope_args),
                compute_args: cli_args.compute_args.merge(compute_args),
                beam_args: cli_args.beam_args.merge(beam_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<BeamPatternParams, OskarError> {
        debug!("{:#?}", self);

        let BeamPatternArgs {
            args_file: _,
            telescope_args,
            compute_args,
            beam_args:
                BeamPatternCliArgs {
                    ra,
                    dec,
                    time,
                    dut1,
                    freqs,
                    image_size,
                    fov,
                    output,
                },
        } = self;

        // A beam pattern only needs one station.
        let telescope = telescope_args.parse(false)?;
        let (precision, location) = compute_args.parse()?;

        let epoch = Epoch::from_gpst_seconds(time.unwrap_or(DEFAULT_START_GPS_SECONDS));
        let dut1 = dut1.map(Duration::from_seconds).unwrap_or_default();
        let lst_rad = get_lmst(telescope.array_position.longitude_rad, epoch, dut1);
        let pointing = match (ra, dec) {
            (Some(ra), Some(dec)) => {
                if !(0.0..=360.0).contains(&ra) || !(-90.0..=90.0).contains(&dec) {
                    return Err(BeamPatternArgsError::BadPointing { ra, dec }.into());
                }
                RADec::from_degrees(ra, dec)
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(BeamPatternArgsError::OnlyOneRAOrDec.into())
            }
            (None, None) => RADec {
                ra: lst_rad,
                dec: telescope.array_position.latitude_rad,
            },
        };

        let freqs_hz = {
            let freqs = freqs.unwrap_or_else(|| vec![DEFAULT_START_FREQ_MHZ]);
            if let Some(&f) = freqs.iter().find(|&&f| !(f > 0.0)) {
                return Err(BeamPatternArgsError::BadFreq(f).into());
            }
            let freqs = freqs.into_iter().map(|f| f * 1e6).collect(); // MHz -> Hz
            Vec1::try_from_vec(freqs).map_err(|_| BeamPatternArgsError::NoFreqs)?
        };

        let image_size = image_size.unwrap_or(DEFAULT_BEAM_IMAGE_SIZE);
        if image_size == 0 {
            return Err(BeamPatternArgsError::BadImageSize.into());
        }
        let fov_deg = fov.unwrap_or(DEFAULT_BEAM_FOV_DEG);
        if !(fov_deg > 0.0 && fov_deg <= 180.0) {
            return Err(BeamPatternArgsError::BadFov(fov_deg).into());
        }
        let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_BEAM_PATTERN_FILENAME));

        let mut printer = InfoPrinter::new("Beam pattern".into());
        printer.push_block(vec![
            format!(
                "Pointing centre:   {:>8.4}° {:>8.4}°",
                pointing.ra.to_degrees(),
                pointing.dec.to_degrees()
            )
            .into(),
            format!(
                "GPS time {}, LMST {:.6}°",
                epoch.to_gpst_seconds(),
                lst_rad.to_degrees()
            )
            .into(),
        ]);
        printer.push_line(
            format!(
                "{} frequencies from {:.3} MHz",
                freqs_hz.len(),
                *freqs_hz.first() / 1e6
            )
            .into(),
        );
        printer.push_line(
            format!(
                "{image_size}x{image_size} pixels over {fov_deg}°, written to {}",
                output.display()
            )
            .into(),
        );
        printer.display();

        display_warnings();

        Ok(BeamPatternParams {
            telescope,
            pointing,
            epoch,
            lst_rad,
            freqs_hz,
            image_size,
            fov_deg,
            output,
            precision,
            location,
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), OskarError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let params = self.parse()?;

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        params.run()
    }
}

struct BeamPatternParams {
    telescope: Telescope,
    pointing: RADec,
    epoch: Epoch,
    lst_rad: f64,
    freqs_hz: Vec1<f64>,
    image_size: usize,
    fov_deg: f64,
    output: PathBuf,
    precision: Precision,
    location: Location,
}

impl BeamPatternParams {
    fn run(self) -> Result<(), OskarError> {
        let mut log = RunLog::new();
        log.timer_resume("Beam pattern");
        let planes = self.evaluate(&mut log)?;

        log.info(format!("Writing {}", self.output.display()));
        let history = log.history_records();
        let planes = planes
            .iter()
            .map(|p| {
                Mem::from_real(p.iter().copied().collect::<Vec<f64>>())
                    .into_target(self.precision, Location::Cpu)
            })
            .collect::<Result<Vec<_>, _>>()?;
        write_cube(
            &self.output,
            &planes.iter().collect::<Vec<_>>(),
            &CubeHeader {
                size: self.image_size,
                cellsize_deg: self.fov_deg / self.image_size as f64,
                phase_centre: self.pointing,
                freq_start_hz: *self.freqs_hz.first(),
                freq_inc_hz: match self.freqs_hz.as_slice() {
                    [f0, f1, ..] => f1 - f0,
                    _ => 1.0,
                },
                obs_start: Some(self.epoch),
                bunit: "",
                history: &history,
            },
        )?;
        log.timer_pause("Beam pattern");
        log.timing_summary("Beam pattern", &[]);
        info!("Wrote {}", self.output.display());
        Ok(())
    }

    /// Evaluate the normalised beam magnitude at every pixel, one plane per
    /// frequency. Pixels that don't correspond to a direction on the sky are
    /// NaN.
    fn evaluate(&self, log: &mut RunLog) -> Result<Vec<Array2<f64>>, OskarError> {
        let BeamPatternParams {
            telescope,
            pointing,
            lst_rad,
            freqs_hz,
            image_size,
            fov_deg,
            precision,
            location,
            ..
        } = self;
        let (size, lst_rad) = (*image_size, *lst_rad);
        let latitude_rad = telescope.array_position.latitude_rad;
        let cellsize_rad = fov_deg.to_radians() / size as f64;

        let pixel_radecs = pixel_radecs(size, cellsize_rad, *pointing);
        let (sky_pixels, radecs): (Vec<usize>, Vec<RADec>) = pixel_radecs
            .into_iter()
            .enumerate()
            .filter_map(|(i, radec)| radec.map(|r| (i, r)))
            .unzip();
        let directions = HorizonDirections::from_radecs(&radecs, lst_rad, latitude_rad);
        let beam_direction = pointing.to_hadec(lst_rad).to_azel(latitude_rad);
        log.info(format!(
            "Evaluating the beam of a {}-antenna station at {} of {} pixels",
            telescope.num_antennas_per_station(),
            sky_pixels.len(),
            size * size
        ));

        let mut planes = Vec::with_capacity(freqs_hz.len());
        for &freq_hz in freqs_hz.iter() {
            debug!("Evaluating the beam at {:.3} MHz", freq_hz / 1e6);
            let wavenumber = TAU * freq_hz / VEL_C;
            let beam = evaluate_station_beam(
                telescope,
                wavenumber,
                beam_direction,
                &directions,
                *precision,
                *location,
            )?
            .convert_precision(Precision::Double)?;
            let magnitudes = beam_magnitudes(&beam, telescope.element_pattern)?;

            let mut plane = Array2::from_elem((size, size), f64::NAN);
            for (&pixel, &magnitude) in sky_pixels.iter().zip(magnitudes.iter()) {
                plane[(pixel / size, pixel % size)] = magnitude;
            }
            planes.push(plane);
        }
        Ok(planes)
    }
}

/// The sky position of every pixel of a `size * size` orthographic image
/// centred on `centre`, ordered row by row. `None` for pixels beyond the
/// edge of the celestial sphere.
fn pixel_radecs(size: usize, cellsize_rad: f64, centre: RADec) -> Vec<Option<RADec>> {
    let half = (size / 2) as f64;
    let (s_dec0, c_dec0) = centre.dec.sin_cos();
    let mut radecs = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            let l = (x as f64 - half) * cellsize_rad;
            let m = (y as f64 - half) * cellsize_rad;
            let r2 = l * l + m * m;
            if r2 >= 1.0 {
                radecs.push(None);
                continue;
            }
            let n = (1.0 - r2).sqrt();
            let dec = (m * c_dec0 + n * s_dec0).asin();
            let ra = centre.ra + l.atan2(n * c_dec0 - m * s_dec0);
            radecs.push(Some(RADec::from_radians(ra, dec)));
        }
    }
    radecs
}

/// A real, positive measure of a station beam: its magnitude for isotropic
/// elements, and the RMS of the two dipoles' responses to both field
/// components for dipoles. Both are 1 for a single antenna at zenith.
fn beam_magnitudes(beam: &Mem, element_pattern: ElementPattern) -> Result<Vec<f64>, OskarError> {
    Ok(match element_pattern {
        ElementPattern::Isotropic => beam.complex::<f64>()?.iter().map(|e| e.norm()).collect(),
        ElementPattern::Dipole => beam
            .jones::<f64>()?
            .iter()
            .map(|j: &Jones<f64>| {
                ((j[0].norm_sqr() + j[1].norm_sqr() + j[2].norm_sqr() + j[3].norm_sqr()) / 2.0)
                    .sqrt()
            })
            .collect(),
    })
}

#[derive(Error, Debug)]
pub(super) enum BeamPatternArgsError {
    #[error("Beam pointing ({ra}°, {dec}°) is invalid; RA must be within 0 to 360 and Dec within -90 to 90")]
    BadPointing { ra: f64, dec: f64 },

    #[error("One of RA and Dec was specified, but none or both are required!")]
    OnlyOneRAOrDec,

    #[error("Frequency {0} MHz is not positive")]
    BadFreq(f64),

    #[error("No frequencies were given")]
    NoFreqs,

    #[error("The image size cannot be 0")]
    BadImageSize,

    #[error("The field of view must be between 0 and 180 degrees; got {0}")]
    BadFov(f64),
}
