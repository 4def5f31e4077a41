// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The prolate-spheroidal wave function used for gridding, and grid-correction
//! functions.
//!
//! The rational approximation is the one of Schwab (1984), with alpha = 1 and
//! a kernel width of 6 cells.

use crate::constants::TAU;

const P: [[f64; 5]; 2] = [
    [8.203343e-2, -3.644705e-1, 6.278660e-1, -5.335581e-1, 2.312756e-1],
    [4.028559e-3, -3.697768e-2, 1.021332e-1, -1.201436e-1, 6.412774e-2],
];
const Q: [[f64; 3]; 2] = [[1.0, 8.212018e-1, 2.078043e-1], [1.0, 9.599102e-1, 2.918724e-1]];

/// The prolate-spheroidal function at `nu` (in `[0, 1]`). This is the form
/// without the `(1 - nu^2)` factor, i.e. the grid-correction form. Zero
/// outside of `[0, 1]`.
pub(crate) fn grdsf(nu: f64) -> f64 {
    let nu = nu.abs();
    let (part, nu_end) = if nu < 0.75 {
        (0, 0.75)
    } else if nu <= 1.0 {
        (1, 1.0)
    } else {
        return 0.0;
    };

    let del_nu_sq = nu * nu - nu_end * nu_end;
    let top = P[part]
        .iter()
        .rev()
        .fold(0.0, |acc, &p| acc * del_nu_sq + p);
    let bot = Q[part]
        .iter()
        .rev()
        .fold(0.0, |acc, &q| acc * del_nu_sq + q);
    if bot == 0.0 {
        0.0
    } else {
        top / bot
    }
}

/// The gridding form of the function, `(1 - eta^2) grdsf(eta)`. Zero at and
/// beyond `|eta| = 1`.
pub(crate) fn spheroidal_kernel(eta: f64) -> f64 {
    let eta = eta.abs();
    if eta >= 1.0 {
        0.0
    } else {
        (1.0 - eta * eta) * grdsf(eta)
    }
}

/// Grid correction for the spheroidal gridding kernel, for each pixel of a
/// plane of side `size`. Normalised to 1 at the centre pixel.
pub(crate) fn spheroidal_correction(size: usize) -> Vec<f64> {
    let half = (size / 2) as f64;
    let centre = grdsf(0.0);
    (0..size)
        .map(|i| {
            let nu = (i as f64 - half) / half;
            grdsf(nu) / centre
        })
        .collect()
}

/// Grid correction for the pillbox (nearest-cell) kernel.
pub(crate) fn pillbox_correction(size: usize) -> Vec<f64> {
    vec![1.0; size]
}

/// Grid correction for an oversampled, separable kernel. `kernel` holds one
/// axis of the kernel sampled every `1 / oversample` cells, centred on its
/// middle element. The correction at each pixel is the cosine transform of
/// the kernel, normalised to its peak.
pub(crate) fn oversampled_correction(kernel: &[f64], oversample: usize, size: usize) -> Vec<f64> {
    let centre = (kernel.len() / 2) as f64;
    let oversample = oversample.max(1) as f64;
    let half = (size / 2) as f64;
    let mut correction: Vec<f64> = (0..size)
        .map(|i| {
            let nu = (i as f64 - half) / size as f64;
            kernel
                .iter()
                .enumerate()
                .map(|(k, &c)| {
                    let offset = (k as f64 - centre) / oversample;
                    c * (TAU * offset * nu).cos()
                })
                .sum()
        })
        .collect();

    let peak = correction
        .iter()
        .fold(0.0_f64, |acc, &c| if c.abs() > acc.abs() { c } else { acc });
    if peak != 0.0 {
        correction.iter_mut().for_each(|c| *c /= peak);
    }
    correction
}
