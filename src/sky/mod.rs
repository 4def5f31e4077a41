// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sky models: point and elliptical-Gaussian sources with full-Stokes flux
//! densities.


use log::{debug, warn};
use marlu::{RADec, LMN};
use serde::{Deserialize, Serialize};

use crate::{
    constants::FWHM_TO_SIGMA,
    correlate::{CorrelateSources, SourceKind},
    error::KernelError,
    mem::{Location, Mem, Precision},
};

/// The shape of an elliptical Gaussian source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianShape {
    /// Full width at half maximum of the major axis \[radians\].
    pub fwhm_maj_rad: f64,
    /// Full width at half maximum of the minor axis \[radians\].
    pub fwhm_min_rad: f64,
    /// Position angle of the major axis, east of north \[radians\].
    pub pa_rad: f64,
}

impl GaussianShape {
    /// The (a, b, c) parameters of the visibility-plane envelope
    /// `exp(-(a uu^2 + b uu vv + c vv^2))`, where `uu` and `vv` are baseline
    /// coordinates multiplied by the wavenumber.
    pub fn abc(&self) -> (f64, f64, f64) {
        let sigma_maj = self.fwhm_maj_rad * FWHM_TO_SIGMA;
        let sigma_min = self.fwhm_min_rad * FWHM_TO_SIGMA;
        let (s_pa, c_pa) = self.pa_rad.sin_cos();
        let (maj2, min2) = (sigma_maj * sigma_maj, sigma_min * sigma_min);
        let a = 0.5 * (maj2 * s_pa * s_pa + min2 * c_pa * c_pa);
        let b = (maj2 - min2) * s_pa * c_pa;
        let c = 0.5 * (maj2 * c_pa * c_pa + min2 * s_pa * s_pa);
        (a, b, c)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub radec: RADec,

    /// Stokes I, Q, U and V \[Jy\].
    pub stokes: [f64; 4],

    /// If this is `None`, the source is a point source.
    pub shape: Option<GaussianShape>,
}

impl Source {
    pub fn point(radec: RADec, stokes: [f64; 4]) -> Source {
        Source {
            radec,
            stokes,
            shape: None,
        }
    }

    pub fn gaussian(radec: RADec, stokes: [f64; 4], shape: GaussianShape) -> Source {
        Source {
            radec,
            stokes,
            shape: Some(shape),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self.shape {
            None => SourceKind::Point,
            Some(_) => SourceKind::Gaussian,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sky {
    pub sources: Vec<Source>,
}

/// Sources of a single type, with their parameters in (possibly device)
/// buffers ready for the correlator.
#[derive(Debug)]
pub struct SourceArrays {
    pub kind: SourceKind,
    pub radecs: Vec<RADec>,
    pub i: Mem,
    pub q: Mem,
    pub u: Mem,
    pub v: Mem,
    pub l: Mem,
    pub m: Mem,
    pub n: Mem,
    pub a: Option<Mem>,
    pub b: Option<Mem>,
    pub c: Option<Mem>,
}

impl SourceArrays {
    pub fn len(&self) -> usize {
        self.radecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radecs.is_empty()
    }

    pub fn as_correlate_sources(&self) -> CorrelateSources {
        CorrelateSources {
            num: self.len(),
            i: &self.i,
            q: &self.q,
            u: &self.u,
            v: &self.v,
            l: &self.l,
            m: &self.m,
            a: self.a.as_ref(),
            b: self.b.as_ref(),
            c: self.c.as_ref(),
        }
    }
}

/// A [`Sky`] split by source type.
#[derive(Debug)]
pub struct SkyArrays {
    pub points: SourceArrays,
    pub gaussians: SourceArrays,
}

impl SkyArrays {
    pub fn iter(&self) -> impl Iterator<Item = &SourceArrays> {
        [&self.points, &self.gaussians].into_iter()
    }

    pub fn num_sources(&self) -> usize {
        self.points.len() + self.gaussians.len()
    }
}

impl Sky {
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Get the direction cosines of every source relative to `phase_centre`,
    /// and put everything into buffers of the requested precision and
    /// location. Sources on the far side of the tangent plane (n <= 0) are
    /// dropped.
    pub fn to_arrays(
        &self,
        phase_centre: RADec,
        precision: Precision,
        location: Location,
    ) -> Result<SkyArrays, KernelError> {
        let mut points = Columns::default();
        let mut gaussians = Columns::default();
        let mut num_dropped = 0;
        for source in &self.sources {
            let lmn = source.radec.to_lmn(phase_centre);
            if lmn.n <= 0.0 {
                num_dropped += 1;
                continue;
            }
            match source.shape {
                None => points.push(source, lmn, None),
                Some(shape) => gaussians.push(source, lmn, Some(shape.abc())),
            }
        }
        if num_dropped > 0 {
            warn!("{num_dropped} sources are more than 90 degrees from the phase centre and will be ignored");
        }
        debug!(
            "Sky model: {} point sources, {} Gaussian sources",
            points.radecs.len(),
            gaussians.radecs.len()
        );

        Ok(SkyArrays {
            points: points.into_arrays(SourceKind::Point, precision, location)?,
            gaussians: gaussians.into_arrays(SourceKind::Gaussian, precision, location)?,
        })
    }
}

#[derive(Default)]
struct Columns {
    radecs: Vec<RADec>,
    stokes: [Vec<f64>; 4],
    lmn: [Vec<f64>; 3],
    abc: [Vec<f64>; 3],
}

impl Columns {
    fn push(&mut self, source: &Source, lmn: LMN, abc: Option<(f64, f64, f64)>) {
        self.radecs.push(source.radec);
        for (col, s) in self.stokes.iter_mut().zip(source.stokes) {
            col.push(s);
        }
        self.lmn[0].push(lmn.l);
        self.lmn[1].push(lmn.m);
        self.lmn[2].push(lmn.n);
        if let Some((a, b, c)) = abc {
            self.abc[0].push(a);
            self.abc[1].push(b);
            self.abc[2].push(c);
        }
    }

    fn into_arrays(
        self,
        kind: SourceKind,
        precision: Precision,
        location: Location,
    ) -> Result<SourceArrays, KernelError> {
        let to_mem = |v: Vec<f64>| Mem::from_real(v).into_target(precision, location);
        let [i, q, u, v] = self.stokes;
        let [l, m, n] = self.lmn;
        let [a, b, c] = self.abc;
        let shape = match kind {
            SourceKind::Point => None,
            SourceKind::Gaussian => Some((to_mem(a)?, to_mem(b)?, to_mem(c)?)),
        };
        let (a, b, c) = match shape {
            Some((a, b, c)) => (Some(a), Some(b), Some(c)),
            None => (None, None, None),
        };
        Ok(SourceArrays {
            kind,
            radecs: self.radecs,
            i: to_mem(i)?,
            q: to_mem(q)?,
            u: to_mem(u)?,
            v: to_mem(v)?,
            l: to_mem(l)?,
            m: to_mem(m)?,
            n: to_mem(n)?,
            a,
            b,
            c,
        })
    }
}
