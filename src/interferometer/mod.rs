// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Simulate the visibilities that a telescope would measure of a sky model.
//!
//! Every (timestep, channel) pair is a block. For each block, the Jones terms
//! of every station towards every source are evaluated, correlated into
//! cross-correlation visibilities and handed to a consumer (typically the
//! [`Imager`](crate::imager::Imager)).

mod error;
#[cfg(test)]
mod tests;

pub use error::SimulationError;

use hifitime::{Duration, Epoch};
use indicatif::ProgressBar;
use log::debug;
use marlu::{precession::get_lmst, AzEl, RADec, LMN, UVW};
use vec1::Vec1;

use crate::{
    constants::{TAU, VEL_C},
    correlate::{correlate, StationCoords},
    error::KernelError,
    jones::{evaluate_jones_k, evaluate_station_beam, join, HorizonDirections},
    math::cross_correlation_baseline_to_stations,
    mem::{Location, Mem, MemType, Precision},
    run_log::RunLog,
    sky::{Sky, SkyArrays, SourceArrays},
    telescope::{ElementPattern, Telescope},
};

/// When and at which frequencies to observe.
#[derive(Debug, Clone)]
pub struct Observation {
    pub phase_centre: RADec,

    /// The centroid of every timestep.
    pub timestamps: Vec1<Epoch>,

    /// The centre frequency of every channel \[Hz\].
    pub freqs_hz: Vec1<f64>,

    /// \[Hz\]
    pub channel_width_hz: f64,

    /// UT1 - UTC.
    pub dut1: Duration,
}

/// The visibilities of every cross-correlation baseline at one timestep and
/// one channel.
#[derive(Debug)]
pub struct VisBlock {
    pub timestep: usize,
    pub channel: usize,
    pub freq_hz: f64,
    pub epoch: Epoch,
    pub lst_rad: f64,

    /// Baseline coordinates \[metres\], ordered (0,1), (0,2), ..., (1,2), ...
    pub uvws: Vec<UVW>,

    /// One element per baseline, always in host memory. Complex scalars for
    /// isotropic elements, Jones matrices for dipoles.
    pub vis: Mem,
}

pub struct Simulator<'a> {
    telescope: &'a Telescope,
    observation: Observation,
    sky: SkyArrays,
    /// The direction cosines of the sources in `sky`, in the same order.
    lmns: [Vec<LMN>; 2],
    precision: Precision,
    location: Location,
    progress_bar: Option<ProgressBar>,
}

impl<'a> Simulator<'a> {
    pub fn new(
        telescope: &'a Telescope,
        sky: &Sky,
        observation: Observation,
        precision: Precision,
        location: Location,
    ) -> Result<Simulator<'a>, SimulationError> {
        if observation.channel_width_hz <= 0.0 || !observation.channel_width_hz.is_finite() {
            return Err(SimulationError::BadChannelWidth(observation.channel_width_hz));
        }
        if let Some(&f) = observation.freqs_hz.iter().find(|&&f| f <= 0.0 || !f.is_finite()) {
            return Err(SimulationError::BadFrequency(f));
        }
        location.check_available()?;

        let sky = sky.to_arrays(observation.phase_centre, precision, location)?;
        let lmn = |a: &SourceArrays| -> Vec<LMN> {
            a.radecs
                .iter()
                .map(|radec| radec.to_lmn(observation.phase_centre))
                .collect()
        };
        let lmns = [lmn(&sky.points), lmn(&sky.gaussians)];

        Ok(Simulator {
            telescope,
            observation,
            sky,
            lmns,
            precision,
            location,
            progress_bar: None,
        })
    }

    /// Increment this progress bar after every timestep.
    pub fn with_progress_bar(mut self, progress_bar: ProgressBar) -> Simulator<'a> {
        self.progress_bar = Some(progress_bar);
        self
    }

    pub fn observation(&self) -> &Observation {
        &self.observation
    }

    pub fn num_blocks(&self) -> usize {
        self.observation.timestamps.len() * self.observation.freqs_hz.len()
    }

    /// Simulate every block in time-major order, handing each to `consumer`.
    /// The first error from either the simulation or the consumer stops the
    /// run.
    pub fn run<E, F>(&self, log: &mut RunLog, mut consumer: F) -> Result<(), E>
    where
        E: From<SimulationError>,
        F: FnMut(VisBlock) -> Result<(), E>,
    {
        let Observation {
            phase_centre,
            timestamps,
            freqs_hz,
            channel_width_hz: _,
            dut1,
        } = &self.observation;
        let array_position = self.telescope.array_position;
        let baselines = cross_correlation_baseline_to_stations(self.telescope.num_stations());

        log.info(format!(
            "Simulating {} timesteps and {} channels: {} stations ({} baselines), {} point and {} Gaussian sources",
            timestamps.len(),
            freqs_hz.len(),
            self.telescope.num_stations(),
            baselines.len(),
            self.sky.points.len(),
            self.sky.gaussians.len(),
        ));

        for (timestep, &epoch) in timestamps.iter().enumerate() {
            let lst_rad = get_lmst(array_position.longitude_rad, epoch, *dut1);
            debug!(
                "Simulating GPS timestamp {}, LMST {}°",
                epoch.to_gpst_seconds(),
                lst_rad.to_degrees()
            );
            let station_uvws = self.telescope.station_uvws(lst_rad, *phase_centre);
            let uvws: Vec<UVW> = baselines
                .iter()
                .map(|&(p, q)| UVW {
                    u: station_uvws[p].u - station_uvws[q].u,
                    v: station_uvws[p].v - station_uvws[q].v,
                    w: station_uvws[p].w - station_uvws[q].w,
                })
                .collect();
            let beam_direction = phase_centre
                .to_hadec(lst_rad)
                .to_azel(array_position.latitude_rad);
            let directions: Vec<HorizonDirections> = self
                .sky
                .iter()
                .map(|s| {
                    HorizonDirections::from_radecs(&s.radecs, lst_rad, array_position.latitude_rad)
                })
                .collect();

            for (channel, &freq_hz) in freqs_hz.iter().enumerate() {
                let vis = self
                    .simulate_block(&station_uvws, beam_direction, &directions, freq_hz)
                    .map_err(SimulationError::from)?;
                consumer(VisBlock {
                    timestep,
                    channel,
                    freq_hz,
                    epoch,
                    lst_rad,
                    uvws: uvws.clone(),
                    vis,
                })?;
            }

            if let Some(progress_bar) = &self.progress_bar {
                progress_bar.inc(1);
            }
        }

        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.abandon_with_message("Finished simulating visibilities");
        }
        Ok(())
    }

    fn simulate_block(
        &self,
        station_uvws: &[UVW],
        beam_direction: AzEl,
        directions: &[HorizonDirections],
        freq_hz: f64,
    ) -> Result<Mem, KernelError> {
        let Simulator {
            telescope,
            precision,
            location,
            ..
        } = self;
        let (precision, location) = (*precision, *location);
        let num_stations = telescope.num_stations();
        let wavenumber = TAU * freq_hz / VEL_C;
        let frac_bandwidth = self.observation.channel_width_hz / freq_hz;

        let mem_type = match telescope.element_pattern {
            ElementPattern::Isotropic => MemType::complex(precision),
            ElementPattern::Dipole => MemType::matrix(precision),
        };
        let mut vis = Mem::new(mem_type, location, telescope.num_baselines())?;

        let scaled = |f: fn(&UVW) -> f64| {
            Mem::from_real(
                station_uvws
                    .iter()
                    .map(|uvw| f(uvw) * wavenumber)
                    .collect::<Vec<f64>>(),
            )
            .into_target(precision, location)
        };
        let (u, v) = (scaled(|uvw| uvw.u)?, scaled(|uvw| uvw.v)?);
        let stations = StationCoords {
            num: num_stations,
            u: &u,
            v: &v,
        };

        for ((sources, lmns), dirs) in self.sky.iter().zip(self.lmns.iter()).zip(directions) {
            if sources.is_empty() {
                continue;
            }
            let e = evaluate_station_beam(
                telescope,
                wavenumber,
                beam_direction,
                dirs,
                precision,
                location,
            )?;
            let k = evaluate_jones_k(station_uvws, wavenumber, lmns, precision)?;
            let jones = join(&k, &e, num_stations, sources.len())?.into_target(precision, location)?;
            correlate(
                sources.kind,
                &sources.as_correlate_sources(),
                &jones,
                &stations,
                frac_bandwidth,
                &mut vis,
            )?;
        }

        match location {
            Location::Cpu => Ok(vis),
            Location::Gpu => vis.copy_to_location(Location::Cpu),
        }
    }
}
