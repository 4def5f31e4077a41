// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.

mod fft;
pub(crate) mod spheroidal;

pub(crate) use fft::Fft2d;

use marlu::Jones;
use num_complex::Complex;

use crate::mem::Real;

/// The number of cross-correlation baselines formed by `num_stations`
/// stations.
#[inline]
pub fn num_cross_baselines(num_stations: usize) -> usize {
    (num_stations * num_stations.saturating_sub(1)) / 2
}

/// Map each cross-correlation baseline index to its pair of station indices.
/// Baselines are ordered (0,1), (0,2), ..., (0,S-1), (1,2), ...
pub fn cross_correlation_baseline_to_stations(num_stations: usize) -> Vec<(usize, usize)> {
    let mut map = Vec::with_capacity(num_cross_baselines(num_stations));
    for station1 in 0..num_stations {
        for station2 in station1 + 1..num_stations {
            map.push((station1, station2));
        }
    }
    map
}

/// `sin(x) / x`, with `sinc(0) = 1`.
#[inline]
pub(crate) fn sinc<F: Real>(x: F) -> F {
    if x == F::zero() {
        F::one()
    } else {
        x.sin() / x
    }
}

/// Complex exponential. The argument is assumed to be purely imaginary.
///
/// This function doesn't actually use complex numbers; it just returns the real
/// and imag components from Euler's formula (i.e. e^{ix} = cos{x} + i sin{x}).
#[inline]
pub(crate) fn cexp<F: Real>(x: F) -> Complex<F> {
    let (im, re) = x.sin_cos();
    Complex::new(re, im)
}

/// Multiply every cell of a square plane by (-1)^(x+y). Applied before and
/// after an FFT, this moves the zero-frequency term to the centre of the
/// plane.
pub(crate) fn fftphase<F: Real>(plane: &mut [Complex<F>], size: usize) {
    plane
        .chunks_exact_mut(size)
        .enumerate()
        .for_each(|(y, row)| {
            row.iter_mut()
                .enumerate()
                .filter(|(x, _)| (x + y) % 2 == 1)
                .for_each(|(_, c)| *c = -*c);
        });
}

/// `a * b` for 2x2 complex matrices.
#[inline]
pub(crate) fn jones_mul<F: Real>(a: &Jones<F>, b: &Jones<F>) -> Jones<F> {
    Jones::from([
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
    ])
}

/// `a * b^H` for 2x2 complex matrices.
#[inline]
pub(crate) fn jones_mul_hermitian<F: Real>(a: &Jones<F>, b: &Jones<F>) -> Jones<F> {
    Jones::from([
        a[0] * b[0].conj() + a[1] * b[1].conj(),
        a[0] * b[2].conj() + a[1] * b[3].conj(),
        a[2] * b[0].conj() + a[3] * b[1].conj(),
        a[2] * b[2].conj() + a[3] * b[3].conj(),
    ])
}

/// `a * c` for a 2x2 complex matrix and a complex scalar.
#[inline]
pub(crate) fn jones_scale<F: Real>(a: &Jones<F>, c: Complex<F>) -> Jones<F> {
    Jones::from([a[0] * c, a[1] * c, a[2] * c, a[3] * c])
}

/// `a += b` for 2x2 complex matrices.
#[inline]
pub(crate) fn jones_add_assign<F: Real>(a: &mut Jones<F>, b: &Jones<F>) {
    *a = Jones::from([a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3]]);
}
