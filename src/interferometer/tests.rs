// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use marlu::{c64, Jones, LatLngHeight, ENH};
use vec1::vec1;

use super::*;
use crate::{
    constants::DEFAULT_START_GPS_SECONDS,
    error::ErrorCode,
    sky::{GaussianShape, Source},
};

fn enh(e: f64, n: f64) -> ENH {
    ENH { e, n, h: 0.0 }
}

/// Two stations of a single antenna each.
fn telescope(element_pattern: ElementPattern) -> Telescope {
    Telescope::new(
        LatLngHeight::mwa(),
        vec![enh(0.0, 0.0), enh(100.0, 20.0)],
        vec![enh(0.0, 0.0)],
        element_pattern,
    )
    .unwrap()
}

fn start() -> Epoch {
    Epoch::from_gpst_seconds(DEFAULT_START_GPS_SECONDS)
}

/// The direction of the zenith at the start of the observation.
fn zenith(telescope: &Telescope) -> RADec {
    let lst = get_lmst(
        telescope.array_position.longitude_rad,
        start(),
        Duration::default(),
    );
    RADec {
        ra: lst,
        dec: telescope.array_position.latitude_rad,
    }
}

fn observation(phase_centre: RADec, num_timesteps: usize, num_channels: usize) -> Observation {
    let timestamps: Vec<Epoch> = (0..num_timesteps)
        .map(|i| start() + Duration::from_seconds(8.0 * i as f64))
        .collect();
    let freqs: Vec<f64> = (0..num_channels)
        .map(|i| 150e6 + 40e3 * i as f64)
        .collect();
    Observation {
        phase_centre,
        timestamps: Vec1::try_from_vec(timestamps).unwrap(),
        freqs_hz: Vec1::try_from_vec(freqs).unwrap(),
        channel_width_hz: 40e3,
        dut1: Duration::default(),
    }
}

fn collect(sim: &Simulator) -> Vec<VisBlock> {
    let mut blocks = vec![];
    let mut log = RunLog::new();
    sim.run::<SimulationError, _>(&mut log, |block| {
        blocks.push(block);
        Ok(())
    })
    .unwrap();
    blocks
}

#[test]
fn test_source_at_phase_centre_gives_its_flux() {
    let telescope = telescope(ElementPattern::Isotropic);
    let phase_centre = zenith(&telescope);
    let sky = Sky {
        sources: vec![Source::point(phase_centre, [2.5, 0.0, 0.0, 0.0])],
    };
    let sim = Simulator::new(
        &telescope,
        &sky,
        observation(phase_centre, 2, 3),
        Precision::Double,
        Location::Cpu,
    )
    .unwrap();
    assert_eq!(sim.num_blocks(), 6);

    let blocks = collect(&sim);
    assert_eq!(blocks.len(), 6);
    for (i, block) in blocks.iter().enumerate() {
        assert_eq!(block.timestep, i / 3);
        assert_eq!(block.channel, i % 3);
        assert_abs_diff_eq!(block.freq_hz, 150e6 + 40e3 * (i % 3) as f64);
        assert_eq!(block.uvws.len(), 1);
        assert!(block.vis.is_complex());
        assert_eq!(block.vis.location(), Location::Cpu);

        let vis = block.vis.complex::<f64>().unwrap();
        assert_eq!(vis.len(), 1);
        assert_abs_diff_eq!(vis[0].re, 2.5, epsilon = 1e-6);
        assert_abs_diff_eq!(vis[0].im, 0.0, epsilon = 1e-6);
    }
}

#[test]
fn test_baseline_uvws_are_station_differences() {
    let telescope = telescope(ElementPattern::Isotropic);
    let phase_centre = zenith(&telescope);
    let sky = Sky {
        sources: vec![Source::point(phase_centre, [1.0, 0.0, 0.0, 0.0])],
    };
    let sim = Simulator::new(
        &telescope,
        &sky,
        observation(phase_centre, 2, 1),
        Precision::Double,
        Location::Cpu,
    )
    .unwrap();
    let blocks = collect(&sim);
    for block in blocks {
        let lst = get_lmst(
            telescope.array_position.longitude_rad,
            block.epoch,
            Duration::default(),
        );
        assert_abs_diff_eq!(block.lst_rad, lst);
        let station_uvws = telescope.station_uvws(lst, phase_centre);
        assert_abs_diff_eq!(block.uvws[0].u, station_uvws[0].u - station_uvws[1].u);
        assert_abs_diff_eq!(block.uvws[0].v, station_uvws[0].v - station_uvws[1].v);
        assert_abs_diff_eq!(block.uvws[0].w, station_uvws[0].w - station_uvws[1].w);
    }
}

#[test]
fn test_single_precision() {
    let telescope = telescope(ElementPattern::Isotropic);
    let phase_centre = zenith(&telescope);
    let sky = Sky {
        sources: vec![Source::point(phase_centre, [1.5, 0.0, 0.0, 0.0])],
    };
    let sim = Simulator::new(
        &telescope,
        &sky,
        observation(phase_centre, 1, 1),
        Precision::Single,
        Location::Cpu,
    )
    .unwrap();
    let blocks = collect(&sim);
    let vis = blocks[0].vis.complex::<f32>().unwrap();
    assert_abs_diff_eq!(vis[0].re, 1.5, epsilon = 1e-5);
    assert_abs_diff_eq!(vis[0].im, 0.0, epsilon = 1e-5);
}

#[test]
fn test_dipoles_give_matrix_visibilities() {
    let telescope = telescope(ElementPattern::Dipole);
    let phase_centre = zenith(&telescope);
    let sky = Sky {
        sources: vec![Source::point(phase_centre, [2.0, 0.0, 0.0, 0.0])],
    };
    let sim = Simulator::new(
        &telescope,
        &sky,
        observation(phase_centre, 1, 1),
        Precision::Double,
        Location::Cpu,
    )
    .unwrap();
    let blocks = collect(&sim);
    assert!(blocks[0].vis.is_matrix());
    let vis = blocks[0].vis.jones::<f64>().unwrap();
    // Unpolarised emission from the zenith is seen equally by both dipoles.
    let expected = Jones::from([
        c64::new(2.0, 0.0),
        c64::default(),
        c64::default(),
        c64::new(2.0, 0.0),
    ]);
    assert_abs_diff_eq!(vis[0], expected, epsilon = 1e-6);
}

#[test]
fn test_offset_source_changes_phase_not_amplitude() {
    let telescope = telescope(ElementPattern::Isotropic);
    let phase_centre = zenith(&telescope);
    let offset = RADec {
        ra: phase_centre.ra + 0.02,
        dec: phase_centre.dec + 0.01,
    };
    let sky = Sky {
        sources: vec![Source::point(offset, [1.0, 0.0, 0.0, 0.0])],
    };
    let mut obs = observation(phase_centre, 1, 1);
    // Practically no bandwidth smearing.
    obs.channel_width_hz = 1.0;
    let sim = Simulator::new(&telescope, &sky, obs, Precision::Double, Location::Cpu).unwrap();
    let blocks = collect(&sim);
    let vis = blocks[0].vis.complex::<f64>().unwrap();
    assert_abs_diff_eq!(vis[0].norm(), 1.0, epsilon = 1e-6);
    assert!(vis[0].im.abs() > 1e-3);
}

#[test]
fn test_gaussian_sources_are_attenuated() {
    let telescope = telescope(ElementPattern::Isotropic);
    let phase_centre = zenith(&telescope);
    let shape = GaussianShape {
        fwhm_maj_rad: 0.005,
        fwhm_min_rad: 0.002,
        pa_rad: 0.3,
    };
    let sky = Sky {
        sources: vec![
            Source::gaussian(phase_centre, [1.0, 0.0, 0.0, 0.0], shape),
            Source::point(phase_centre, [1.0, 0.0, 0.0, 0.0]),
        ],
    };
    let sim = Simulator::new(
        &telescope,
        &sky,
        observation(phase_centre, 1, 1),
        Precision::Double,
        Location::Cpu,
    )
    .unwrap();
    let blocks = collect(&sim);
    let vis = blocks[0].vis.complex::<f64>().unwrap();
    // The point source contributes 1, the Gaussian less than 1.
    assert!(vis[0].re > 1.0);
    assert!(vis[0].re < 2.0);
}

#[test]
fn test_empty_sky_gives_zero_visibilities() {
    let telescope = telescope(ElementPattern::Isotropic);
    let phase_centre = zenith(&telescope);
    let sim = Simulator::new(
        &telescope,
        &Sky::default(),
        observation(phase_centre, 1, 2),
        Precision::Double,
        Location::Cpu,
    )
    .unwrap();
    let blocks = collect(&sim);
    assert_eq!(blocks.len(), 2);
    for block in blocks {
        assert_eq!(block.vis.complex::<f64>().unwrap(), [c64::default()]);
    }
}

#[test]
fn test_consumer_errors_stop_the_run() {
    let telescope = telescope(ElementPattern::Isotropic);
    let phase_centre = zenith(&telescope);
    let sim = Simulator::new(
        &telescope,
        &Sky::default(),
        observation(phase_centre, 3, 3),
        Precision::Double,
        Location::Cpu,
    )
    .unwrap();
    let mut num_blocks = 0;
    let result = sim.run(&mut RunLog::new(), |_| {
        num_blocks += 1;
        if num_blocks == 2 {
            Err(SimulationError::ConsumerStopped)
        } else {
            Ok(())
        }
    });
    assert!(matches!(result, Err(SimulationError::ConsumerStopped)));
    assert_eq!(num_blocks, 2);
}

#[test]
fn test_bad_observations_are_rejected() {
    let telescope = telescope(ElementPattern::Isotropic);
    let phase_centre = zenith(&telescope);

    let mut obs = observation(phase_centre, 1, 1);
    obs.channel_width_hz = 0.0;
    let result = Simulator::new(&telescope, &Sky::default(), obs, Precision::Double, Location::Cpu);
    let err = result.err().unwrap();
    assert!(matches!(err, SimulationError::BadChannelWidth(_)));
    assert_eq!(err.code(), ErrorCode::InvalidArgument);

    let mut obs = observation(phase_centre, 1, 1);
    obs.freqs_hz = vec1![150e6, -1.0];
    let result = Simulator::new(&telescope, &Sky::default(), obs, Precision::Double, Location::Cpu);
    assert!(matches!(result, Err(SimulationError::BadFrequency(f)) if f == -1.0));
}

#[test]
#[cfg(not(any(feature = "cuda", feature = "hip")))]
fn test_gpu_location_is_unavailable() {
    let telescope = telescope(ElementPattern::Isotropic);
    let phase_centre = zenith(&telescope);
    let result = Simulator::new(
        &telescope,
        &Sky::default(),
        observation(phase_centre, 1, 1),
        Precision::Double,
        Location::Gpu,
    );
    let err = result.err().unwrap();
    assert_eq!(err.code(), ErrorCode::BackendUnavailable);
}

#[test]
fn test_run_log_records_the_simulation() {
    let telescope = telescope(ElementPattern::Isotropic);
    let phase_centre = zenith(&telescope);
    let sim = Simulator::new(
        &telescope,
        &Sky::default(),
        observation(phase_centre, 2, 1),
        Precision::Double,
        Location::Cpu,
    )
    .unwrap();
    let mut log = RunLog::new();
    sim.run::<SimulationError, _>(&mut log, |_| Ok(())).unwrap();
    assert!(log.lines()[0].starts_with("Simulating 2 timesteps and 1 channels"));
}
