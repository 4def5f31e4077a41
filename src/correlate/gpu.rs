// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::ffi::c_int;
use std::ptr::null;

use super::{CorrelateSources, SourceKind, StationCoords};
use crate::{
    error::KernelError,
    gpu::{self, gpu_kernel_call, DeviceBuffer},
    math::cross_correlation_baseline_to_stations,
    mem::{Mem, Precision},
};

pub(super) fn correlate(
    kind: SourceKind,
    sources: &CorrelateSources,
    jones: &Mem,
    stations: &StationCoords,
    frac_bandwidth: f64,
    vis: &mut Mem,
) -> Result<(), KernelError> {
    let (baseline_p, baseline_q): (Vec<c_int>, Vec<c_int>) =
        cross_correlation_baseline_to_stations(stations.num)
            .into_iter()
            .map(|(p, q)| (p as c_int, q as c_int))
            .unzip();
    let num_baselines = baseline_p.len();
    let d_baseline_p = DeviceBuffer::upload(&baseline_p)?;
    let d_baseline_q = DeviceBuffer::upload(&baseline_q)?;

    let i = sources.i.device_ptr()?.as_ptr();
    let q = sources.q.device_ptr()?.as_ptr();
    let u = sources.u.device_ptr()?.as_ptr();
    let v = sources.v.device_ptr()?.as_ptr();
    let l = sources.l.device_ptr()?.as_ptr();
    let m = sources.m.device_ptr()?.as_ptr();
    let station_u = stations.u.device_ptr()?.as_ptr();
    let station_v = stations.v.device_ptr()?.as_ptr();

    let (a, b, c) = match (kind, sources.a, sources.b, sources.c) {
        (SourceKind::Gaussian, Some(a), Some(b), Some(c)) => (
            a.device_ptr()?.as_ptr(),
            b.device_ptr()?.as_ptr(),
            c.device_ptr()?.as_ptr(),
        ),
        _ => (null(), null(), null()),
    };
    let is_gaussian = matches!(kind, SourceKind::Gaussian) as c_int;
    let is_matrix = vis.is_matrix() as c_int;
    let jones = jones.device_ptr()?.as_ptr();
    let precision = vis.precision();
    let vis = vis.device_ptr_mut()?.as_mut_ptr();

    match precision {
        Precision::Single => gpu_kernel_call!(
            gpu::oskar_correlate_f,
            is_gaussian,
            is_matrix,
            sources.num as c_int,
            stations.num as c_int,
            num_baselines as c_int,
            d_baseline_p.as_ptr().cast(),
            d_baseline_q.as_ptr().cast(),
            jones,
            i.cast(),
            q.cast(),
            u.cast(),
            v.cast(),
            l.cast(),
            m.cast(),
            a.cast(),
            b.cast(),
            c.cast(),
            station_u.cast(),
            station_v.cast(),
            frac_bandwidth as f32,
            vis,
        )?,
        Precision::Double => gpu_kernel_call!(
            gpu::oskar_correlate_d,
            is_gaussian,
            is_matrix,
            sources.num as c_int,
            stations.num as c_int,
            num_baselines as c_int,
            d_baseline_p.as_ptr().cast(),
            d_baseline_q.as_ptr().cast(),
            jones,
            i.cast(),
            q.cast(),
            u.cast(),
            v.cast(),
            l.cast(),
            m.cast(),
            a.cast(),
            b.cast(),
            c.cast(),
            station_u.cast(),
            station_v.cast(),
            frac_bandwidth,
            vis,
        )?,
    }
    Ok(())
}
