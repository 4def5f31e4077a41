// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Simulate visibilities of a sky model and image them.


use std::{
    path::PathBuf,
    str::FromStr,
    thread::{self, ScopedJoinHandle},
};

use clap::Parser;
use console::style;
use crossbeam_channel::bounded;
use crossbeam_utils::atomic::AtomicCell;
use hifitime::{Duration, Epoch};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::Itertools;
use log::{debug, info, trace};
use marlu::{precession::get_lmst, RADec};
use scopeguard::defer_on_unwind;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use thiserror::Error;
use vec1::Vec1;

use super::{
    common::{display_warnings, ComputeArgs, InfoPrinter, TelescopeArgs, Warn, ARG_FILE_HELP},
    OskarError,
};
use crate::{
    constants::*,
    imager::{GridKernelType, Imager, ImagerError, ImagerSettings, ImagingAlgorithm, Polarisation},
    interferometer::{Observation, SimulationError, Simulator, VisBlock},
    mem::{Location, Precision},
    run_log::RunLog,
    sky::{GaussianShape, Sky, Source},
    telescope::{ElementPattern, Telescope},
    PROGRESS_BARS,
};

lazy_static::lazy_static! {
    static ref START_TIME_HELP: String =
        format!("The GPS time of the start of the observation [seconds]. Default: {DEFAULT_START_GPS_SECONDS}");

    static ref NUM_TIMESTEPS_HELP: String =
        format!("The number of timesteps to simulate. Default: {DEFAULT_NUM_TIMESTEPS}");

    static ref TIME_RES_HELP: String =
        format!("The time resolution [seconds]. Default: {DEFAULT_TIME_RES_SECONDS}");

    static ref START_FREQ_HELP: String =
        format!("The centre frequency of the first channel [MHz]. Default: {DEFAULT_START_FREQ_MHZ}");

    static ref FREQ_RES_HELP: String =
        format!("The channel width and spacing [kHz]. Default: {DEFAULT_FREQ_RES_KHZ}");

    static ref NUM_CHANNELS_HELP: String =
        format!("The number of channels to simulate. Default: {DEFAULT_NUM_CHANNELS}");

    static ref IMAGE_SIZE_HELP: String =
        format!("The side length of the output images [pixels]. Default: {DEFAULT_IMAGE_SIZE}");

    static ref FOV_HELP: String =
        format!("The field of view of the output images [degrees]. Default: {DEFAULT_FOV_DEG}");

    static ref ALGORITHM_HELP: String =
        format!("The imaging algorithm. Supported algorithms: {}. Default: {}",
                ImagingAlgorithm::iter().join(", "), ImagingAlgorithm::default());

    static ref KERNEL_HELP: String =
        format!("The gridding kernel of the fft algorithm. Supported kernels: {}. Default: {}",
                GridKernelType::iter().join(", "), GridKernelType::default());

    static ref OVERSAMPLE_HELP: String =
        format!("The oversampling factor of W-projection kernels. Default: {DEFAULT_OVERSAMPLE}");

    static ref SUPPORT_HELP: String =
        format!("The half-width of W-projection kernels [grid cells]. Default: {DEFAULT_SUPPORT}");

    static ref W_PLANES_HELP: String =
        format!("The number of W-projection planes. Default: {DEFAULT_NUM_W_PLANES}");

    static ref POLS_HELP: String =
        format!("The polarisations to image. Only I is available with isotropic elements. Supported polarisations: {}. Default: I",
                Polarisation::iter().join(", "));

    static ref OUTPUT_HELP: String =
        format!("Images are written to <OUTPUT>_<POL>.fits. Default: {DEFAULT_OUTPUT_IMAGE_ROOT}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct SimulateCliArgs {
    /// The phase centre right ascension [degrees]. If this is not specified,
    /// the zenith at the start of the observation is used.
    #[clap(short, long, help_heading = "OBSERVATION")]
    pub(super) ra: Option<f64>,

    /// The phase centre declination [degrees]. If this is not specified, the
    /// zenith at the start of the observation is used.
    #[clap(short, long, allow_hyphen_values = true, help_heading = "OBSERVATION")]
    pub(super) dec: Option<f64>,

    #[clap(long, help = START_TIME_HELP.as_str(), help_heading = "OBSERVATION")]
    pub(super) start_time: Option<f64>,

    #[clap(short = 't', long, help = NUM_TIMESTEPS_HELP.as_str(), help_heading = "OBSERVATION")]
    pub(super) num_timesteps: Option<usize>,

    #[clap(long, help = TIME_RES_HELP.as_str(), help_heading = "OBSERVATION")]
    pub(super) time_res: Option<f64>,

    #[clap(long, help = START_FREQ_HELP.as_str(), help_heading = "OBSERVATION")]
    pub(super) start_freq: Option<f64>,

    #[clap(short, long, help = FREQ_RES_HELP.as_str(), help_heading = "OBSERVATION")]
    pub(super) freq_res: Option<f64>,

    #[clap(short = 'c', long, help = NUM_CHANNELS_HELP.as_str(), help_heading = "OBSERVATION")]
    pub(super) num_channels: Option<usize>,

    /// Use this value as the DUT1 [seconds]. Default: 0
    #[clap(long, allow_hyphen_values = true, help_heading = "OBSERVATION")]
    pub(super) dut1: Option<f64>,
}

impl SimulateCliArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            ra: self.ra.or(other.ra),
            dec: self.dec.or(other.dec),
            start_time: self.start_time.or(other.start_time),
            num_timesteps: self.num_timesteps.or(other.num_timesteps),
            time_res: self.time_res.or(other.time_res),
            start_freq: self.start_freq.or(other.start_freq),
            freq_res: self.freq_res.or(other.freq_res),
            num_channels: self.num_channels.or(other.num_channels),
            dut1: self.dut1.or(other.dut1),
        }
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct ImagerArgs {
    #[clap(long, help = IMAGE_SIZE_HELP.as_str(), help_heading = "IMAGING")]
    pub(super) image_size: Option<usize>,

    #[clap(long, help = FOV_HELP.as_str(), help_heading = "IMAGING")]
    pub(super) fov: Option<f64>,

    #[clap(long, help = ALGORITHM_HELP.as_str(), help_heading = "IMAGING")]
    pub(super) algorithm: Option<String>,

    #[clap(long, help = KERNEL_HELP.as_str(), help_heading = "IMAGING")]
    pub(super) kernel: Option<String>,

    #[clap(long, help = OVERSAMPLE_HELP.as_str(), help_heading = "IMAGING")]
    pub(super) oversample: Option<usize>,

    #[clap(long, help = SUPPORT_HELP.as_str(), help_heading = "IMAGING")]
    pub(super) support: Option<usize>,

    #[clap(long, help = W_PLANES_HELP.as_str(), help_heading = "IMAGING")]
    pub(super) w_planes: Option<usize>,

    /// The largest |w| covered by W-projection planes [wavelengths]. Default:
    /// determined from the first block of visibilities.
    #[clap(long, help_heading = "IMAGING")]
    pub(super) w_max: Option<f64>,

    /// Grids are this factor larger than the output images. Default: 1
    #[clap(long, help_heading = "IMAGING")]
    pub(super) padding: Option<f64>,

    #[clap(long, multiple_values(true), help = POLS_HELP.as_str(), help_heading = "IMAGING")]
    pub(super) pols: Option<Vec<String>>,

    #[clap(short, long, help = OUTPUT_HELP.as_str(), help_heading = "IMAGING")]
    pub(super) output: Option<PathBuf>,

    /// Also write the uv grids to <OUTPUT>_<POL>_GRID.fits.
    #[clap(long, help_heading = "IMAGING")]
    #[serde(default)]
    pub(super) write_grids: bool,

    /// Don't make images. Only useful with --write-grids.
    #[clap(long, help_heading = "IMAGING")]
    #[serde(default)]
    pub(super) no_images: bool,
}

impl ImagerArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            image_size: self.image_size.or(other.image_size),
            fov: self.fov.or(other.fov),
            algorithm: self.algorithm.or(other.algorithm),
            kernel: self.kernel.or(other.kernel),
            oversample: self.oversample.or(other.oversample),
            support: self.support.or(other.support),
            w_planes: self.w_planes.or(other.w_planes),
            w_max: self.w_max.or(other.w_max),
            padding: self.padding.or(other.padding),
            pols: self.pols.or(other.pols),
            output: self.output.or(other.output),
            write_grids: self.write_grids || other.write_grids,
            no_images: self.no_images || other.no_images,
        }
    }

    fn parse(
        self,
        num_channels: usize,
        element_pattern: ElementPattern,
        precision: Precision,
        location: Location,
    ) -> Result<ImagerSettings, SimulateArgsError> {
        let ImagerArgs {
            image_size,
            fov,
            algorithm,
            kernel,
            oversample,
            support,
            w_planes,
            w_max,
            padding,
            pols,
            output,
            write_grids,
            no_images,
        } = self;

        let defaults = ImagerSettings::default();
        let algorithm = match algorithm {
            Some(a) => ImagingAlgorithm::from_str(&a).map_err(|_| SimulateArgsError::BadAlgorithm(a))?,
            None => defaults.algorithm,
        };
        let kernel_given = kernel.is_some();
        let kernel = match kernel {
            Some(k) => GridKernelType::from_str(&k).map_err(|_| SimulateArgsError::BadKernel(k))?,
            None => defaults.kernel,
        };
        let polarisations = match pols {
            Some(pols) => pols
                .into_iter()
                .map(|p| Polarisation::from_str(&p).map_err(|_| SimulateArgsError::BadPolarisation(p)))
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.polarisations.clone(),
        };
        if element_pattern == ElementPattern::Isotropic {
            if let Some(p) = polarisations.iter().find(|&&p| p != Polarisation::I) {
                return Err(SimulateArgsError::PolarisationNeedsDipoles(*p));
            }
        }
        if no_images && !write_grids {
            return Err(SimulateArgsError::NothingToWrite);
        }
        if algorithm != ImagingAlgorithm::Fft {
            let ignored = [
                ("--kernel", kernel_given),
                ("--oversample", oversample.is_some()),
                ("--support", support.is_some()),
                ("--w-planes", w_planes.is_some()),
                ("--w-max", w_max.is_some()),
                ("--padding", padding.is_some()),
            ]
            .into_iter()
            .filter(|(_, given)| *given)
            .map(|(arg, _)| arg)
            .join(", ");
            if !ignored.is_empty() {
                vec![
                    format!("Gridding options are ignored by the {algorithm} algorithm:").into(),
                    ignored.into(),
                ]
                .warn();
            }
        }

        Ok(ImagerSettings {
            image_size: image_size.unwrap_or(defaults.image_size),
            fov_deg: fov.unwrap_or(defaults.fov_deg),
            algorithm,
            kernel,
            oversample: oversample.unwrap_or(defaults.oversample),
            support: support.unwrap_or(defaults.support),
            num_w_planes: w_planes.unwrap_or(defaults.num_w_planes),
            w_max,
            padding: padding.unwrap_or(defaults.padding),
            precision,
            polarisations,
            num_channels,
            freq_start_hz: None,
            freq_inc_hz: None,
            scale_norm_with_num_input_files: false,
            use_gpu: location == Location::Gpu,
            output_root: Some(output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_IMAGE_ROOT))),
            want_images: !no_images,
            want_grids: write_grids,
        })
    }
}

/// A source in an argument file's sky model, e.g.
///
/// ```toml
/// [[sky]]
/// ra = 0.0
/// dec = -27.0
/// i = 1.0
/// ```
///
/// If `fwhm_maj` is given, the source is a Gaussian.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(super) struct SourceArgs {
    /// \[degrees\]
    pub(super) ra: f64,
    /// \[degrees\]
    pub(super) dec: f64,
    /// Stokes I \[Jy\]
    pub(super) i: f64,
    #[serde(default)]
    pub(super) q: f64,
    #[serde(default)]
    pub(super) u: f64,
    #[serde(default)]
    pub(super) v: f64,
    /// \[arcseconds\]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) fwhm_maj: Option<f64>,
    /// \[arcseconds\]. Defaults to `fwhm_maj`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) fwhm_min: Option<f64>,
    /// \[degrees\]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) pa: Option<f64>,
}

impl SourceArgs {
    fn parse(&self, index: usize) -> Result<Source, SimulateArgsError> {
        if !(0.0..=360.0).contains(&self.ra) || !(-90.0..=90.0).contains(&self.dec) {
            return Err(SimulateArgsError::BadSourcePosition {
                index,
                ra: self.ra,
                dec: self.dec,
            });
        }
        let radec = RADec::from_degrees(self.ra, self.dec);
        let stokes = [self.i, self.q, self.u, self.v];
        match self.fwhm_maj {
            None => Ok(Source::point(radec, stokes)),
            Some(maj) => {
                let min = self.fwhm_min.unwrap_or(maj);
                if !(maj > 0.0 && min > 0.0) {
                    return Err(SimulateArgsError::BadSourceShape { index });
                }
                Ok(Source::gaussian(
                    radec,
                    stokes,
                    GaussianShape {
                        fwhm_maj_rad: (maj / 3600.0).to_radians(),
                        fwhm_min_rad: (min / 3600.0).to_radians(),
                        pa_rad: self.pa.unwrap_or_default().to_radians(),
                    },
                ))
            }
        }
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct SimulateArgs {
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
    #[serde(rename = "observation")]
    #[serde(default)]
    pub(super) simulate_args: SimulateCliArgs,

    #[clap(flatten)]
    #[serde(rename = "imager")]
    #[serde(default)]
    pub(super) imager_args: ImagerArgs,

    /// The sky model can only be given in an argument file.
    #[clap(skip)]
    #[serde(default)]
    pub(super) sky: Vec<SourceArgs>,
}

impl SimulateArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified
    /// into a single struct. Where applicable, it will prefer CLI parameters
    /// over those in the file.
    pub(super) fn merge(self) -> Result<SimulateArgs, OskarError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let SimulateArgs {
                args_file: _,
                telescope_args,
                compute_args,
                simulate_args,
                imager_args,
                sky,
            } = unpack_arg_file!(arg_file);

            Ok(SimulateArgs {
                args_file: None,
                telescope_args: cli_args.telescope_args.merge(telescope_args),
                compute_args: cli_args.compute_args.merge(compute_args),
                simulate_args: cli_args.simulate_args.merge(simulate_args),
                imager_args: cli_args.imager_args.merge(imager_args),
                sky: if cli_args.sky.is_empty() {
                    sky
                } else {
                    cli_args.sky
                },
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<SimulateParams, OskarError> {
        debug!("{:#?}", self);

        let SimulateArgs {
            args_file: _,
            telescope_args,
            compute_args,
            simulate_args:
                SimulateCliArgs {
                    ra,
                    dec,
                    start_time,
                    num_timesteps,
                    time_res,
                    start_freq,
                    freq_res,
                    num_channels,
                    dut1,
                },
            imager_args,
            sky,
        } = self;

        let telescope = telescope_args.parse(true)?;
        let (precision, location) = compute_args.parse()?;

        let time_res = time_res.unwrap_or(DEFAULT_TIME_RES_SECONDS);
        if !(time_res > 0.0) {
            return Err(SimulateArgsError::BadTimeRes(time_res).into());
        }
        let time_res = Duration::from_seconds(time_res);
        let start = Epoch::from_gpst_seconds(start_time.unwrap_or(DEFAULT_START_GPS_SECONDS));
        let timestamps = {
            let num_timesteps = num_timesteps.unwrap_or(DEFAULT_NUM_TIMESTEPS);
            let timestamps = (0..num_timesteps)
                .map(|i| start + time_res / 2 + time_res * i as i64)
                .collect();
            Vec1::try_from_vec(timestamps).map_err(|_| SimulateArgsError::ZeroTimesteps)?
        };
        let dut1 = dut1.map(Duration::from_seconds).unwrap_or_default();

        let phase_centre = match (ra, dec) {
            (Some(ra), Some(dec)) => {
                if !(0.0..=360.0).contains(&ra) {
                    return Err(SimulateArgsError::RaInvalid.into());
                }
                if !(-90.0..=90.0).contains(&dec) {
                    return Err(SimulateArgsError::DecInvalid.into());
                }
                RADec::from_degrees(ra, dec)
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(SimulateArgsError::OnlyOneRAOrDec.into())
            }
            (None, None) => {
                "No phase centre was given; using the zenith at the start of the observation"
                    .warn();
                RADec {
                    ra: get_lmst(telescope.array_position.longitude_rad, start, dut1),
                    dec: telescope.array_position.latitude_rad,
                }
            }
        };

        let mut coord_printer = InfoPrinter::new("Coordinates".into());
        coord_printer.push_block(vec![
            style("                   RA        Dec")
                .bold()
                .to_string()
                .into(),
            format!(
                "Phase centre:      {:>8.4}° {:>8.4}°",
                phase_centre.ra.to_degrees(),
                phase_centre.dec.to_degrees()
            )
            .into(),
        ]);
        coord_printer.display();

        let mut time_printer = InfoPrinter::new("Time info".into());
        time_printer.push_line(format!("Simulating at resolution: {time_res}").into());
        time_printer.push_block(vec![
            format!("Number of timesteps: {}", timestamps.len()).into(),
            format!(
                "First timestamp (GPS): {}",
                timestamps.first().to_gpst_seconds()
            )
            .into(),
            format!(
                "Last timestamp (GPS):  {}",
                timestamps.last().to_gpst_seconds()
            )
            .into(),
        ]);
        time_printer.push_line(format!("DUT1: {:.10} s", dut1.to_seconds()).into());
        time_printer.display();

        let freq_res = freq_res.unwrap_or(DEFAULT_FREQ_RES_KHZ);
        if !(freq_res > 0.0) {
            return Err(SimulateArgsError::BadFreqRes(freq_res).into());
        }
        let freq_res = freq_res * 1e3; // kHz -> Hz
        let start_freq = start_freq.unwrap_or(DEFAULT_START_FREQ_MHZ) * 1e6; // MHz -> Hz
        let freqs_hz = {
            let num_channels = num_channels.unwrap_or(DEFAULT_NUM_CHANNELS);
            let freqs = (0..num_channels)
                .map(|i| start_freq + freq_res * i as f64)
                .collect();
            Vec1::try_from_vec(freqs).map_err(|_| SimulateArgsError::ZeroChannels)?
        };
        let mut chan_printer = InfoPrinter::new("Channel info".into());
        chan_printer
            .push_line(format!("Simulating at resolution: {:.2} kHz", freq_res / 1e3).into());
        chan_printer.push_block(vec![
            format!("Number of channels: {}", freqs_hz.len()).into(),
            format!("First channel: {:.3} MHz", *freqs_hz.first() / 1e6).into(),
            format!("Last channel:  {:.3} MHz", *freqs_hz.last() / 1e6).into(),
        ]);
        chan_printer.display();

        if sky.is_empty() {
            return Err(SimulateArgsError::NoSources.into());
        }
        let sky = Sky {
            sources: sky
                .iter()
                .enumerate()
                .map(|(i, s)| s.parse(i))
                .collect::<Result<_, _>>()?,
        };
        let num_gaussians = sky.sources.iter().filter(|s| s.shape.is_some()).count();
        let mut sky_printer = InfoPrinter::new("Sky model".into());
        sky_printer.push_block(vec![
            format!("{} point sources", sky.sources.len() - num_gaussians).into(),
            format!("{num_gaussians} Gaussian sources").into(),
        ]);
        sky_printer.display();

        let mut settings = imager_args.parse(
            freqs_hz.len(),
            telescope.element_pattern,
            precision,
            location,
        )?;
        settings.freq_start_hz = Some(*freqs_hz.first());
        settings.freq_inc_hz = Some(freq_res);
        let mut imager_printer = InfoPrinter::new("Imaging".into());
        imager_printer.push_block(vec![
            format!(
                "{} pixels on a side, {}° field of view",
                settings.image_size, settings.fov_deg
            )
            .into(),
            format!("Algorithm: {}", settings.algorithm).into(),
            format!("Polarisations: {}", settings.polarisations.iter().join(", ")).into(),
        ]);
        if let Some(root) = &settings.output_root {
            imager_printer.push_line(format!("Output root: {}", root.display()).into());
        }
        imager_printer.display();
        let imager = Imager::new(settings, phase_centre, Some(*timestamps.first()))?;

        display_warnings();

        Ok(SimulateParams {
            telescope,
            sky,
            observation: Observation {
                phase_centre,
                timestamps,
                freqs_hz,
                channel_width_hz: freq_res,
                dut1,
            },
            imager,
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

struct SimulateParams {
    telescope: Telescope,
    sky: Sky,
    observation: Observation,
    imager: Imager,
    precision: Precision,
    location: Location,
}

impl SimulateParams {
    fn run(self) -> Result<(), OskarError> {
        let SimulateParams {
            telescope,
            sky,
            observation,
            mut imager,
            precision,
            location,
        } = self;

        let num_timesteps = observation.timestamps.len();
        let simulator = Simulator::new(&telescope, &sky, observation, precision, location)?;
        let num_blocks = simulator.num_blocks();

        // Channel for handing simulated visibilities to the imager.
        let (tx, rx) = bounded::<VisBlock>(5);

        // Progress bars.
        let multi_progress = MultiProgress::with_draw_target(if PROGRESS_BARS.load() {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        });
        let simulate_progress =
            multi_progress.add(progress_bar(num_timesteps, "timesteps", "Simulating"));
        let image_progress = multi_progress.add(progress_bar(num_blocks, "blocks", "Imaging"));
        let simulator = simulator.with_progress_bar(simulate_progress);

        // Use a variable to track whether any threads have an issue.
        let error = AtomicCell::new(false);
        let mut log = RunLog::new();
        let mut image_log = RunLog::new();

        info!("Simulating and imaging visibilities");
        thread::scope(|scope| -> Result<(), OskarError> {
            let simulate_handle: ScopedJoinHandle<Result<(), SimulationError>> =
                thread::Builder::new()
                    .name("simulate".to_string())
                    .spawn_scoped(scope, || {
                        // If a panic happens, update our atomic error.
                        defer_on_unwind! { error.store(true); }
                        // The simulator's buffers are only ever touched by
                        // this thread.
                        let simulator = simulator;

                        let result = simulator.run(&mut log, |block| {
                            // Should we continue?
                            if error.load() {
                                return Err(SimulationError::ConsumerStopped);
                            }
                            // A closed channel means the imager has exited
                            // due to error.
                            tx.send(block)
                                .map_err(|_| SimulationError::ConsumerStopped)
                        });
                        drop(tx);
                        match result {
                            Ok(()) | Err(SimulationError::ConsumerStopped) => Ok(()),
                            Err(e) => {
                                error.store(true);
                                Err(e)
                            }
                        }
                    })?;

            let image_handle: ScopedJoinHandle<Result<(), ImagerError>> = thread::Builder::new()
                .name("image".to_string())
                .spawn_scoped(scope, || {
                    defer_on_unwind! { error.store(true); }
                    image_progress.tick();

                    for block in rx {
                        let result = imager.update(
                            &block.uvws,
                            &block.vis,
                            None,
                            block.channel,
                            block.freq_hz,
                            &mut image_log,
                        );
                        if result.is_err() {
                            error.store(true);
                        }
                        result?;
                        image_progress.inc(1);
                    }

                    debug!("Finished imaging");
                    image_progress.abandon_with_message("Finished gridding visibilities");
                    Ok(())
                })?;

            // Join all thread handles. This propagates any errors and lets
            // us know if any threads panicked.
            let image_result = image_handle
                .join()
                .map_err(|_| OskarError::Generic("The imaging thread panicked".to_string()))?;
            let simulate_result = simulate_handle
                .join()
                .map_err(|_| OskarError::Generic("The simulation thread panicked".to_string()))?;
            simulate_result?;
            image_result?;
            Ok(())
        })?;

        log.merge(image_log);
        let output = imager.finalise(&mut log)?;
        for file in &output.files {
            info!("Wrote {}", file.display());
        }

        Ok(())
    }
}

fn progress_bar(len: usize, unit: &str, message: &'static str) -> ProgressBar {
    let template = format!(
        "{{msg:17}}: [{{wide_bar:.blue}}] {{pos:2}}/{{len:2}} {unit} ({{elapsed_precise}}<{{eta_precise}})"
    );
    ProgressBar::new(len as _)
        .with_style(
            ProgressStyle::default_bar()
                .template(&template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        )
        .with_position(0)
        .with_message(message)
}

#[derive(Error, Debug)]
pub(super) enum SimulateArgsError {
    #[error("No sources were given; add [[sky]] tables to an argument file")]
    NoSources,

    #[error("Source {index} has position ({ra}°, {dec}°); RA must be within 0 to 360 and Dec within -90 to 90")]
    BadSourcePosition { index: usize, ra: f64, dec: f64 },

    #[error("Source {index} has a non-positive FWHM")]
    BadSourceShape { index: usize },

    #[error("Right Ascension was not within 0 to 360!")]
    RaInvalid,

    #[error("Declination was not within -90 to 90!")]
    DecInvalid,

    #[error("One of RA and Dec was specified, but none or both are required!")]
    OnlyOneRAOrDec,

    #[error("Number of timesteps cannot be 0!")]
    ZeroTimesteps,

    #[error("The time resolution must be positive; got {0}")]
    BadTimeRes(f64),

    #[error("Number of channels cannot be 0!")]
    ZeroChannels,

    #[error("The channel resolution must be positive; got {0}")]
    BadFreqRes(f64),

    #[error("Imaging algorithm '{0}' is not recognised")]
    BadAlgorithm(String),

    #[error("Gridding kernel '{0}' is not recognised")]
    BadKernel(String),

    #[error("Polarisation '{0}' is not recognised")]
    BadPolarisation(String),

    #[error("Polarisation {0} can only be imaged with dipole elements")]
    PolarisationNeedsDipoles(Polarisation),

    #[error("--no-images was given without --write-grids; nothing would be written")]
    NothingToWrite,
}
