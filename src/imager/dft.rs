// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Imaging by direct Fourier transform of visibilities onto pixels.

use marlu::{c64, UVW};

use crate::{
    dftw::{dftw, DftwDirections, DftwInputs},
    error::KernelError,
    mem::{Location, Mem, MemType, Precision, Real},
};

/// The direction cosines of every image pixel, ready for [`dftw`].
pub(super) struct DftPixels {
    precision: Precision,
    location: Location,
    num_pixels: usize,
    l: Mem,
    m: Mem,
    /// n - 1. Only used in 3D.
    n: Option<Mem>,
}

impl DftPixels {
    pub(super) fn new(
        image_size: usize,
        cellsize_rad: f64,
        is_3d: bool,
        precision: Precision,
        location: Location,
    ) -> Result<DftPixels, KernelError> {
        let num_pixels = image_size * image_size;
        let half = (image_size / 2) as f64;
        let mut l = Vec::with_capacity(num_pixels);
        let mut m = Vec::with_capacity(num_pixels);
        let mut n = Vec::with_capacity(num_pixels);
        for y in 0..image_size {
            for x in 0..image_size {
                let pl = (x as f64 - half) * cellsize_rad;
                let pm = (y as f64 - half) * cellsize_rad;
                l.push(pl);
                m.push(pm);
                n.push((1.0 - pl * pl - pm * pm).max(0.0).sqrt() - 1.0);
            }
        }
        let to_target = |v: Vec<f64>| Mem::from_real(v).into_target(precision, location);
        Ok(DftPixels {
            precision,
            location,
            num_pixels,
            l: to_target(l)?,
            m: to_target(m)?,
            n: if is_3d { Some(to_target(n)?) } else { None },
        })
    }

    /// Add `Re(sum_k values[k] exp(-i wavenumber (u l + v m [+ w (n-1)])))`
    /// to every pixel of `plane`. `uvws` are in metres.
    pub(super) fn accumulate(
        &self,
        uvws: &[UVW],
        values: Vec<c64>,
        wavenumber: f64,
        plane: &mut Mem,
    ) -> Result<(), KernelError> {
        let to_target = |v: Vec<f64>| Mem::from_real(v).into_target(self.precision, self.location);
        // The transform has a positive exponent, so the coordinates are
        // negated.
        let u = to_target(uvws.iter().map(|uvw| -uvw.u).collect())?;
        let v = to_target(uvws.iter().map(|uvw| -uvw.v).collect())?;
        let w = to_target(uvws.iter().map(|uvw| -uvw.w).collect())?;
        let weights = Mem::from_complex(values).into_target(self.precision, self.location)?;

        let mut out = Mem::new(MemType::complex(self.precision), self.location, self.num_pixels)?;
        dftw(
            false,
            wavenumber,
            &DftwInputs {
                num: uvws.len(),
                weights: &weights,
                x: &u,
                y: &v,
                z: self.n.as_ref().map(|_| &w),
            },
            &DftwDirections {
                offset: 0,
                num: self.num_pixels,
                x: &self.l,
                y: &self.m,
                z: self.n.as_ref(),
            },
            None,
            0,
            &mut out,
        )?;
        let out = match self.location {
            Location::Cpu => out,
            Location::Gpu => out.copy_to_location(Location::Cpu)?,
        };

        match self.precision {
            Precision::Single => add_real_part::<f32>(&out, plane),
            Precision::Double => add_real_part::<f64>(&out, plane),
        }
    }
}

fn add_real_part<F: Real>(values: &Mem, plane: &mut Mem) -> Result<(), KernelError> {
    let values = values.complex::<F>()?;
    let plane = plane.real_mut::<F>()?;
    plane
        .iter_mut()
        .zip(values)
        .for_each(|(p, v)| *p += v.re);
    Ok(())
}
