// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-station, per-source Jones terms.
//!
//! The station beam (E) is an aperture-array beamformed response evaluated
//! with [`dftw`], and the interferometric phase (K) depends on each station's
//! UVW. Their product J = K E is what gets correlated.


use log::trace;
use marlu::{c64, AzEl, Jones, RADec, LMN, UVW};
use num_complex::Complex;

use crate::{
    dftw::{dftw, DftwDirections, DftwInputs},
    error::KernelError,
    math::{cexp, jones_scale},
    mem::{Location, Mem, MemType, Precision, Real},
    telescope::{ElementPattern, Telescope},
};

/// Horizon-frame direction cosines of a set of sources: `x` is towards east,
/// `y` towards north and `z` towards zenith.
#[derive(Debug, Clone, Default)]
pub struct HorizonDirections {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl HorizonDirections {
    pub fn from_azels(azels: &[AzEl]) -> HorizonDirections {
        let mut dirs = HorizonDirections {
            x: Vec::with_capacity(azels.len()),
            y: Vec::with_capacity(azels.len()),
            z: Vec::with_capacity(azels.len()),
        };
        for azel in azels {
            let (x, y, z) = azel_to_xyz(*azel);
            dirs.x.push(x);
            dirs.y.push(y);
            dirs.z.push(z);
        }
        dirs
    }

    pub fn from_radecs(radecs: &[RADec], lst_rad: f64, latitude_rad: f64) -> HorizonDirections {
        let azels: Vec<AzEl> = radecs
            .iter()
            .map(|radec| radec.to_hadec(lst_rad).to_azel(latitude_rad))
            .collect();
        Self::from_azels(&azels)
    }

    pub fn len(&self) -> usize {
        self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }

    pub fn above_horizon(&self, i: usize) -> bool {
        self.z[i] > 0.0
    }
}

fn azel_to_xyz(azel: AzEl) -> (f64, f64, f64) {
    let (s_az, c_az) = azel.az.sin_cos();
    let (s_el, c_el) = azel.el.sin_cos();
    (c_el * s_az, c_el * c_az, s_el)
}

/// The response of a pair of crossed dipoles towards a horizon direction.
/// Rows are the X (east-west) and Y (north-south) dipoles, columns the theta
/// and phi components of the incident field.
fn dipole_response(x: f64, y: f64, z: f64) -> Jones<f64> {
    let cos_theta = z;
    let phi = y.atan2(x);
    let (s_phi, c_phi) = phi.sin_cos();
    Jones::from([
        c64::new(cos_theta * c_phi, 0.0),
        c64::new(-s_phi, 0.0),
        c64::new(cos_theta * s_phi, 0.0),
        c64::new(c_phi, 0.0),
    ])
}

/// Evaluate the beam of a station pointed at `beam_direction` towards every
/// source. All stations share a layout, so this is the E-Jones term of every
/// station.
///
/// The DFT runs at `location`; the returned host buffer holds one element per
/// source (complex for isotropic elements, a matrix for dipoles). Sources
/// below the horizon get a zero response.
pub fn evaluate_station_beam(
    telescope: &Telescope,
    wavenumber: f64,
    beam_direction: AzEl,
    sources: &HorizonDirections,
    precision: Precision,
    location: Location,
) -> Result<Mem, KernelError> {
    let num_antennas = telescope.num_antennas_per_station();
    let visible: Vec<usize> = (0..sources.len())
        .filter(|&i| sources.above_horizon(i))
        .collect();
    let mem_type = match telescope.element_pattern {
        ElementPattern::Isotropic => MemType::complex(precision),
        ElementPattern::Dipole => MemType::matrix(precision),
    };
    trace!(
        "Station beam: {num_antennas} antennas, {} of {} sources above the horizon",
        visible.len(),
        sources.len()
    );

    // Beamforming weights towards the beam direction.
    let (x0, y0, z0) = azel_to_xyz(beam_direction);
    let weights: Vec<c64> = telescope
        .antenna_enhs
        .iter()
        .map(|a| cexp(-wavenumber * (a.e * x0 + a.n * y0 + a.h * z0)) / num_antennas as f64)
        .collect();
    let weights = Mem::from_complex(weights).into_target(precision, location)?;
    let [e, n, h] = telescope.antenna_coords(precision, location)?;

    let column = |v: &[f64]| {
        Mem::from_real(visible.iter().map(|&i| v[i]).collect::<Vec<f64>>())
            .into_target(precision, location)
    };
    let (x, y, z) = (column(&sources.x)?, column(&sources.y)?, column(&sources.z)?);

    let data = match telescope.element_pattern {
        ElementPattern::Isotropic => None,
        ElementPattern::Dipole => {
            let responses: Vec<Jones<f64>> = visible
                .iter()
                .map(|&i| dipole_response(sources.x[i], sources.y[i], sources.z[i]))
                .collect();
            // Every antenna has the same element response.
            let data: Vec<Jones<f64>> = (0..num_antennas)
                .flat_map(|_| responses.iter().copied())
                .collect();
            Some(Mem::from_jones(data).into_target(precision, location)?)
        }
    };

    let mut beam = Mem::new(mem_type, location, visible.len())?;
    dftw(
        false,
        wavenumber,
        &DftwInputs {
            num: num_antennas,
            weights: &weights,
            x: &e,
            y: &n,
            z: Some(&h),
        },
        &DftwDirections {
            offset: 0,
            num: visible.len(),
            x: &x,
            y: &y,
            z: Some(&z),
        },
        data.as_ref(),
        0,
        &mut beam,
    )?;
    let beam = match location {
        Location::Cpu => beam,
        Location::Gpu => beam.copy_to_location(Location::Cpu)?,
    };

    let mut full = Mem::new(mem_type, Location::Cpu, sources.len())?;
    match precision {
        Precision::Single => scatter::<f32>(&visible, &beam, &mut full)?,
        Precision::Double => scatter::<f64>(&visible, &beam, &mut full)?,
    }
    Ok(full)
}

/// Copy element `k` of `compact` to element `indices[k]` of `full`.
fn scatter<F: Real>(indices: &[usize], compact: &Mem, full: &mut Mem) -> Result<(), KernelError> {
    if full.is_matrix() {
        let compact = compact.jones::<F>()?;
        let full = full.jones_mut::<F>()?;
        for (&i, j) in indices.iter().zip(compact) {
            full[i] = *j;
        }
    } else {
        let compact = compact.complex::<F>()?;
        let full = full.complex_mut::<F>()?;
        for (&i, c) in indices.iter().zip(compact) {
            full[i] = *c;
        }
    }
    Ok(())
}

/// The interferometric phase of every source at every station,
/// `exp(i k (u l + v m + w (n - 1)))`, laid out `[station][source]`.
/// `station_uvws` are in metres.
pub fn evaluate_jones_k(
    station_uvws: &[UVW],
    wavenumber: f64,
    lmns: &[LMN],
    precision: Precision,
) -> Result<Mem, KernelError> {
    match precision {
        Precision::Single => Ok(Mem::from_complex(jones_k::<f32>(station_uvws, wavenumber, lmns))),
        Precision::Double => Ok(Mem::from_complex(jones_k::<f64>(station_uvws, wavenumber, lmns))),
    }
}

fn jones_k<F: Real>(station_uvws: &[UVW], wavenumber: f64, lmns: &[LMN]) -> Vec<Complex<F>> {
    station_uvws
        .iter()
        .flat_map(|uvw| {
            lmns.iter().map(move |lmn| {
                let phase = uvw.u * lmn.l + uvw.v * lmn.m + uvw.w * (lmn.n - 1.0);
                cexp(F::from_f64(wavenumber * phase))
            })
        })
        .collect()
}

/// Combine the K (`[station][source]`) and E (`[source]`, shared by every
/// station) terms into J = K E. The output has the element kind of `e`.
pub fn join(k: &Mem, e: &Mem, num_stations: usize, num_sources: usize) -> Result<Mem, KernelError> {
    k.meta().check_len("jones_k", num_stations * num_sources)?;
    e.meta().check_len("jones_e", num_sources)?;
    k.meta().check_type("jones_k", MemType::complex(e.precision()))?;
    match e.precision() {
        Precision::Single => join_inner::<f32>(k, e, num_stations, num_sources),
        Precision::Double => join_inner::<f64>(k, e, num_stations, num_sources),
    }
}

fn join_inner<F: Real>(
    k: &Mem,
    e: &Mem,
    num_stations: usize,
    num_sources: usize,
) -> Result<Mem, KernelError> {
    let k = &k.complex::<F>()?[..num_stations * num_sources];
    if e.is_matrix() {
        let e = &e.jones::<F>()?[..num_sources];
        let j = k
            .chunks_exact(num_sources.max(1))
            .flat_map(|k_station| k_station.iter().zip(e).map(|(k, e)| jones_scale(e, *k)))
            .collect();
        Ok(Mem::from_jones::<F>(j))
    } else {
        let e = &e.complex::<F>()?[..num_sources];
        let j = k
            .chunks_exact(num_sources.max(1))
            .flat_map(|k_station| k_station.iter().zip(e).map(|(k, e)| k * e))
            .collect();
        Ok(Mem::from_complex::<F>(j))
    }
}
