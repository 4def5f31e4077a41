// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use marlu::Jones;
use num_complex::Complex;
use rayon::prelude::*;

use crate::{
    math::{cross_correlation_baseline_to_stations, jones_mul, jones_mul_hermitian, sinc},
    mem::Real,
};

pub(super) struct Shapes<'a, F> {
    pub(super) a: &'a [F],
    pub(super) b: &'a [F],
    pub(super) c: &'a [F],
}

pub(super) struct Inputs<'a, F> {
    pub(super) num_sources: usize,
    pub(super) i: &'a [F],
    pub(super) q: &'a [F],
    pub(super) u: &'a [F],
    pub(super) v: &'a [F],
    pub(super) l: &'a [F],
    pub(super) m: &'a [F],
    pub(super) shape: Option<Shapes<'a, F>>,
    pub(super) station_u: &'a [F],
    pub(super) station_v: &'a [F],
    pub(super) frac_bandwidth: F,
}

impl<F: Real> Inputs<'_, F> {
    /// The product of the bandwidth-smearing and Gaussian envelope terms for
    /// source `s` on a baseline with (wavenumber-scaled) coordinates `uu, vv`.
    #[inline]
    fn attenuation(&self, s: usize, uu: F, vv: F) -> F {
        let half = F::from_f64(0.5);
        let mut f = sinc(half * self.frac_bandwidth * (uu * self.l[s] + vv * self.m[s]));
        if let Some(shape) = &self.shape {
            f *= (-(shape.a[s] * uu * uu + shape.b[s] * uu * vv + shape.c[s] * vv * vv)).exp();
        }
        f
    }

    #[inline]
    fn brightness(&self, s: usize) -> Jones<F> {
        let (i, q, u, v) = (self.i[s], self.q[s], self.u[s], self.v[s]);
        Jones::from([
            Complex::new(i + q, F::zero()),
            Complex::new(u, v),
            Complex::new(u, -v),
            Complex::new(i - q, F::zero()),
        ])
    }
}

pub(super) fn correlate_scalar<F: Real>(
    inputs: &Inputs<F>,
    jones: &[Complex<F>],
    vis: &mut [Complex<F>],
) {
    let n = inputs.num_sources;
    let baselines = cross_correlation_baseline_to_stations(inputs.station_u.len());
    vis.par_iter_mut()
        .zip(baselines.par_iter())
        .for_each(|(vis, &(p, q))| {
            let uu = inputs.station_u[p] - inputs.station_u[q];
            let vv = inputs.station_v[p] - inputs.station_v[q];
            let jones_p = &jones[p * n..(p + 1) * n];
            let jones_q = &jones[q * n..(q + 1) * n];

            let mut sum = Complex::new(F::zero(), F::zero());
            for (s, (j1, j2)) in jones_p.iter().zip(jones_q).enumerate() {
                let f = inputs.attenuation(s, uu, vv);
                sum += (j1 * j2.conj()).scale(f * inputs.i[s]);
            }
            *vis += sum;
        });
}

pub(super) fn correlate_matrix<F: Real>(
    inputs: &Inputs<F>,
    jones: &[Jones<F>],
    vis: &mut [Jones<F>],
) {
    let n = inputs.num_sources;
    let baselines = cross_correlation_baseline_to_stations(inputs.station_u.len());
    vis.par_iter_mut()
        .zip(baselines.par_iter())
        .for_each(|(vis, &(p, q))| {
            let uu = inputs.station_u[p] - inputs.station_u[q];
            let vv = inputs.station_v[p] - inputs.station_v[q];
            let jones_p = &jones[p * n..(p + 1) * n];
            let jones_q = &jones[q * n..(q + 1) * n];

            let mut sum = [Complex::new(F::zero(), F::zero()); 4];
            for (s, (j1, j2)) in jones_p.iter().zip(jones_q).enumerate() {
                let f = inputs.attenuation(s, uu, vv);
                let m = jones_mul_hermitian(&jones_mul(j1, &inputs.brightness(s)), j2);
                sum.iter_mut()
                    .zip(m.iter())
                    .for_each(|(sum, m)| *sum += m.scale(f));
            }
            *vis = Jones::from([
                vis[0] + sum[0],
                vis[1] + sum[1],
                vis[2] + sum[2],
                vis[3] + sum[3],
            ]);
        });
}
