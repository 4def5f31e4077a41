// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! In-place two-dimensional FFTs of square complex planes.

use std::sync::Arc;

use num_complex::Complex;
use rustfft::{Fft, FftNum, FftPlanner};

use crate::{
    error::KernelError,
    mem::{Location, Mem, MemType, Precision},
};

enum Plan {
    Single(Arc<dyn Fft<f32>>),
    Double(Arc<dyn Fft<f64>>),
}

/// A forward 2D FFT plan for `size` x `size` planes. Rows are transformed,
/// the plane transposed, rows transformed again and the plane transposed
/// back.
pub(crate) struct Fft2d {
    size: usize,
    plan: Plan,
}

impl Fft2d {
    pub(crate) fn new(size: usize, precision: Precision) -> Fft2d {
        let plan = match precision {
            Precision::Single => Plan::Single(FftPlanner::new().plan_fft_forward(size)),
            Precision::Double => Plan::Double(FftPlanner::new().plan_fft_forward(size)),
        };
        Fft2d { size, plan }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn precision(&self) -> Precision {
        match self.plan {
            Plan::Single(_) => Precision::Single,
            Plan::Double(_) => Precision::Double,
        }
    }

    /// Transform a host plane in place. The plane must be complex, of this
    /// plan's precision and hold exactly `size * size` elements.
    pub(crate) fn process(&self, plane: &mut Mem) -> Result<(), KernelError> {
        let meta = plane.meta();
        meta.check_location("plane", Location::Cpu)?;
        meta.check_type("plane", MemType::complex(self.precision()))?;
        let num_cells = self.size * self.size;
        if meta.len != num_cells {
            return Err(KernelError::DimensionMismatch {
                name: "plane",
                required: num_cells,
                actual: meta.len,
            });
        }

        match &self.plan {
            Plan::Single(fft) => fft_2d(fft.as_ref(), plane.complex_mut::<f32>()?, self.size),
            Plan::Double(fft) => fft_2d(fft.as_ref(), plane.complex_mut::<f64>()?, self.size),
        }
        Ok(())
    }
}

fn fft_2d<F: FftNum>(fft: &dyn Fft<F>, data: &mut [Complex<F>], size: usize) {
    let mut scratch = vec![Complex::new(F::zero(), F::zero()); fft.get_inplace_scratch_len()];
    // The buffer is a whole number of rows, so each row is transformed.
    fft.process_with_scratch(data, &mut scratch);
    transpose(data, size);
    fft.process_with_scratch(data, &mut scratch);
    transpose(data, size);
}

fn transpose<T>(data: &mut [T], size: usize) {
    for y in 0..size {
        for x in y + 1..size {
            data.swap(y * size + x, x * size + y);
        }
    }
}
