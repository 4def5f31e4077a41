// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Cross-correlation of per-station Jones terms into baseline visibilities.
//!
//! For every baseline (p, q) and every source s,
//!
//! `V_pq += J_ps * B_s * J_qs^H * smearing * envelope`
//!
//! where `B_s` is the source's brightness matrix built from its Stokes
//! parameters. Visibilities are accumulated, never overwritten, so sources can
//! be correlated in batches.

mod cpu;
#[cfg(any(feature = "cuda", feature = "hip"))]
mod gpu;
#[cfg(test)]
mod tests;

use log::trace;
use strum_macros::{Display, EnumString};

use crate::{
    error::KernelError,
    math::num_cross_baselines,
    mem::{Location, Mem, MemMeta, MemType, Precision, Real},
};

/// The type of sources being correlated. A single call handles one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum SourceKind {
    Point,

    /// Sources with an elliptical Gaussian brightness profile. These need the
    /// (a, b, c) shape parameters.
    Gaussian,
}

/// Per-source inputs of the correlator. All buffers must hold at least `num`
/// real elements.
#[derive(Clone, Copy)]
pub struct CorrelateSources<'a> {
    pub num: usize,
    pub i: &'a Mem,
    pub q: &'a Mem,
    pub u: &'a Mem,
    pub v: &'a Mem,
    /// Direction cosines.
    pub l: &'a Mem,
    pub m: &'a Mem,
    /// Gaussian shape parameters; see [`GaussianShape::abc`].
    ///
    /// [`GaussianShape::abc`]: crate::sky::GaussianShape::abc
    pub a: Option<&'a Mem>,
    pub b: Option<&'a Mem>,
    pub c: Option<&'a Mem>,
}

/// Per-station coordinates, already multiplied by the wavenumber.
#[derive(Clone, Copy)]
pub struct StationCoords<'a> {
    pub num: usize,
    pub u: &'a Mem,
    pub v: &'a Mem,
}

/// Correlate `jones` (laid out `[station][source]`) into `vis`, which must
/// hold at least one element per cross-correlation baseline. `jones` and `vis`
/// must have the same type; complex scalar Jones terms only pick up Stokes I.
///
/// Everything is validated before any memory is touched, so `vis` is
/// unmodified on error.
pub fn correlate(
    kind: SourceKind,
    sources: &CorrelateSources,
    jones: &Mem,
    stations: &StationCoords,
    frac_bandwidth: f64,
    vis: &mut Mem,
) -> Result<(), KernelError> {
    validate(kind, sources, jones, stations, vis)?;
    let num_baselines = num_cross_baselines(stations.num);
    trace!(
        "correlate: {} {kind} sources, {num_baselines} baselines, {} {}",
        sources.num,
        vis.mem_type(),
        vis.location()
    );
    if sources.num == 0 || num_baselines == 0 {
        return Ok(());
    }

    match vis.location() {
        Location::Cpu => match vis.precision() {
            Precision::Single => {
                correlate_host::<f32>(kind, sources, jones, stations, frac_bandwidth, vis)
            }
            Precision::Double => {
                correlate_host::<f64>(kind, sources, jones, stations, frac_bandwidth, vis)
            }
        },

        #[cfg(any(feature = "cuda", feature = "hip"))]
        Location::Gpu => gpu::correlate(kind, sources, jones, stations, frac_bandwidth, vis),

        #[cfg(not(any(feature = "cuda", feature = "hip")))]
        Location::Gpu => Err(KernelError::BackendUnavailable("CUDA/HIP")),
    }
}

fn validate(
    kind: SourceKind,
    sources: &CorrelateSources,
    jones: &Mem,
    stations: &StationCoords,
    vis: &Mem,
) -> Result<(), KernelError> {
    let shape = match kind {
        SourceKind::Point => None,
        SourceKind::Gaussian => match (sources.a, sources.b, sources.c) {
            (Some(a), Some(b), Some(c)) => Some([
                ("source_a", a.meta()),
                ("source_b", b.meta()),
                ("source_c", c.meta()),
            ]),
            _ => {
                return Err(KernelError::InvalidArgument(
                    "Gaussian sources need the a, b and c shape parameters".to_string(),
                ))
            }
        },
    };

    let mut source_arrays = vec![
        ("source_i", sources.i.meta()),
        ("source_q", sources.q.meta()),
        ("source_u", sources.u.meta()),
        ("source_v", sources.v.meta()),
        ("source_l", sources.l.meta()),
        ("source_m", sources.m.meta()),
    ];
    source_arrays.extend(shape.into_iter().flatten());
    let station_arrays = [
        ("station_u", stations.u.meta()),
        ("station_v", stations.v.meta()),
    ];
    check_operands(
        vis.meta(),
        jones.meta(),
        &source_arrays,
        &station_arrays,
        sources.num,
        stations.num,
    )
}

/// Check the operands of a correlation: locations, then lengths, then types.
fn check_operands(
    vis: MemMeta,
    jones: MemMeta,
    source_arrays: &[(&'static str, MemMeta)],
    station_arrays: &[(&'static str, MemMeta)],
    num_sources: usize,
    num_stations: usize,
) -> Result<(), KernelError> {
    let location = vis.location;
    jones.check_location("jones", location)?;
    for &(name, m) in source_arrays.iter().chain(station_arrays) {
        m.check_location(name, location)?;
    }

    jones.check_len("jones", num_stations * num_sources)?;
    for &(name, m) in source_arrays {
        m.check_len(name, num_sources)?;
    }
    for &(name, m) in station_arrays {
        m.check_len(name, num_stations)?;
    }
    vis.check_len("vis", num_cross_baselines(num_stations))?;

    if !vis.mem_type.is_complex() {
        return Err(KernelError::TypeMismatch {
            name: "vis",
            expected: "complex or matrix".to_string(),
            actual: vis.mem_type,
        });
    }
    jones.check_type("jones", vis.mem_type)?;
    let real = MemType::real(vis.mem_type.precision);
    for &(name, m) in source_arrays.iter().chain(station_arrays) {
        m.check_type(name, real)?;
    }
    Ok(())
}

fn correlate_host<F: Real>(
    kind: SourceKind,
    sources: &CorrelateSources,
    jones: &Mem,
    stations: &StationCoords,
    frac_bandwidth: f64,
    vis: &mut Mem,
) -> Result<(), KernelError> {
    let n = sources.num;
    let shape = match (kind, sources.a, sources.b, sources.c) {
        (SourceKind::Gaussian, Some(a), Some(b), Some(c)) => Some(cpu::Shapes {
            a: &a.real::<F>()?[..n],
            b: &b.real::<F>()?[..n],
            c: &c.real::<F>()?[..n],
        }),
        _ => None,
    };
    let inputs = cpu::Inputs {
        num_sources: n,
        i: &sources.i.real::<F>()?[..n],
        q: &sources.q.real::<F>()?[..n],
        u: &sources.u.real::<F>()?[..n],
        v: &sources.v.real::<F>()?[..n],
        l: &sources.l.real::<F>()?[..n],
        m: &sources.m.real::<F>()?[..n],
        shape,
        station_u: &stations.u.real::<F>()?[..stations.num],
        station_v: &stations.v.real::<F>()?[..stations.num],
        frac_bandwidth: F::from_f64(frac_bandwidth),
    };
    let num_baselines = num_cross_baselines(stations.num);

    if vis.is_matrix() {
        cpu::correlate_matrix(
            &inputs,
            jones.jones::<F>()?,
            &mut vis.jones_mut::<F>()?[..num_baselines],
        );
    } else {
        cpu::correlate_scalar(
            &inputs,
            jones.complex::<F>()?,
            &mut vis.complex_mut::<F>()?[..num_baselines],
        );
    }
    Ok(())
}
