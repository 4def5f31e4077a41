// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Host implementation of the DFT. Each output direction is an independent
//! rayon task.

use marlu::Jones;
use num_complex::Complex;
use rayon::prelude::*;

use crate::{
    math::{cexp, jones_add_assign, jones_scale},
    mem::Real,
};

pub(super) struct Points<'a, F> {
    pub(super) x: &'a [F],
    pub(super) y: &'a [F],
    pub(super) z: Option<&'a [F]>,
}

impl<F: Real> Points<'_, F> {
    /// The phase of input `i` towards a direction already scaled by the
    /// wavenumber.
    #[inline]
    fn phase(&self, i: usize, xo: F, yo: F, zo: F) -> F {
        let p = xo * self.x[i] + yo * self.y[i];
        match self.z {
            Some(z) => p + zo * z[i],
            None => p,
        }
    }

    #[inline]
    fn scaled(&self, i: usize, k: F) -> (F, F, F) {
        (
            k * self.x[i],
            k * self.y[i],
            self.z.map(|z| k * z[i]).unwrap_or_else(F::zero),
        )
    }
}

pub(super) fn dftw_scalar<F: Real>(
    wavenumber: F,
    weights: &[Complex<F>],
    inputs: &Points<F>,
    outputs: &Points<F>,
    data: Option<&[Complex<F>]>,
    out: &mut [Complex<F>],
) {
    let num_out = out.len();
    out.par_iter_mut().enumerate().for_each(|(i_out, out)| {
        let (xo, yo, zo) = outputs.scaled(i_out, wavenumber);
        let mut sum = Complex::new(F::zero(), F::zero());
        for (i_in, &weight) in weights.iter().enumerate() {
            let w = weight * cexp(inputs.phase(i_in, xo, yo, zo));
            sum += match data {
                Some(data) => w * data[i_in * num_out + i_out],
                None => w,
            };
        }
        *out = sum;
    });
}

pub(super) fn dftw_matrix<F: Real>(
    wavenumber: F,
    weights: &[Complex<F>],
    inputs: &Points<F>,
    outputs: &Points<F>,
    data: &[Jones<F>],
    out: &mut [Jones<F>],
) {
    let num_out = out.len();
    out.par_iter_mut().enumerate().for_each(|(i_out, out)| {
        let (xo, yo, zo) = outputs.scaled(i_out, wavenumber);
        let mut sum = Jones::default();
        for (i_in, &weight) in weights.iter().enumerate() {
            let w = weight * cexp(inputs.phase(i_in, xo, yo, zo));
            jones_add_assign(&mut sum, &jones_scale(&data[i_in * num_out + i_out], w));
        }
        *out = sum;
    });
}
