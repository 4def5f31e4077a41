// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Phase-weighted direct Fourier transforms ("DFTW"), used for beamforming and
//! DFT imaging.
//!
//! For every output direction `j`, the sum over inputs `k` of
//!
//! `weight[k] * exp(i * wavenumber * (x_in[k] x_out[j] + y_in[k] y_out[j] [+ z_in[k] z_out[j]]))`
//!
//! is computed, optionally multiplied per input/output pair by a complex
//! scalar or 2x2 matrix data term. The same algorithm runs on the host (over
//! output directions with rayon) or on a CUDA/HIP device; which one runs is
//! decided by the location of the operands.

mod cpu;
#[cfg(any(feature = "cuda", feature = "hip"))]
mod gpu;

use log::trace;

use crate::{
    error::KernelError,
    mem::{ElementKind, Location, Mem, MemMeta, MemType, Precision, Real},
};

/// Input points: antenna positions (or baseline coordinates) with their
/// complex weights.
#[derive(Clone, Copy)]
pub struct DftwInputs<'a> {
    /// The number of input points.
    pub num: usize,
    /// Complex scalar weight of each point.
    pub weights: &'a Mem,
    pub x: &'a Mem,
    pub y: &'a Mem,
    /// If this and the output `z` are both given, the transform is 3D.
    pub z: Option<&'a Mem>,
}

/// Output directions. Only the directions `offset..offset + num` of the
/// coordinate buffers are used.
#[derive(Clone, Copy)]
pub struct DftwDirections<'a> {
    pub offset: usize,
    pub num: usize,
    pub x: &'a Mem,
    pub y: &'a Mem,
    pub z: Option<&'a Mem>,
}

/// Which combination of data and output types is being transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DftwMode {
    /// No data; complex scalar output.
    O2C,
    /// Complex scalar data and output.
    C2C,
    /// 2x2 matrix data and output.
    M2M,
}

impl DftwMode {
    pub(crate) fn as_int(self) -> i32 {
        match self {
            DftwMode::O2C => 0,
            DftwMode::C2C => 1,
            DftwMode::M2M => 2,
        }
    }
}

/// Kernel launch parameters for device backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LaunchConfig {
    /// Threads per block; one thread per output direction.
    pub(crate) block_size: usize,
    /// The number of input points staged through shared memory at a time.
    pub(crate) max_in_chunk: usize,
}

pub(crate) fn launch_config(
    num_out: usize,
    is_3d: bool,
    precision: Precision,
    has_data: bool,
) -> LaunchConfig {
    const WARP: usize = 32;
    const MAX_BLOCK: usize = 256;
    let block_size = ((num_out + WARP - 1) / WARP * WARP).clamp(WARP, MAX_BLOCK);

    let max_in_chunk = match (is_3d, precision) {
        (true, Precision::Double) => 384,
        (true, Precision::Single) => {
            if has_data {
                768
            } else {
                800
            }
        }
        (false, Precision::Double) => 448,
        (false, Precision::Single) => 896,
    };

    LaunchConfig {
        block_size,
        max_in_chunk,
    }
}

/// Run the transform, overwriting elements `offset_out..offset_out +
/// directions.num` of `output` (which is grown if it's too small).
///
/// `data`, if given, must have the same type as `output` and is indexed
/// `[i_in * directions.num + i_out]`. Without data, the output must be a
/// complex scalar buffer. If `normalise` is set, the output is divided by the
/// number of inputs.
///
/// Nothing is computed (and no memory is touched) if any operand is in the
/// wrong location or has the wrong type or size.
pub fn dftw(
    normalise: bool,
    wavenumber: f64,
    inputs: &DftwInputs,
    directions: &DftwDirections,
    data: Option<&Mem>,
    offset_out: usize,
    output: &mut Mem,
) -> Result<(), KernelError> {
    let mode = validate(inputs, directions, data, output)?;
    let is_3d = inputs.z.is_some() && directions.z.is_some();
    trace!(
        "dftw: {mode:?}, {} inputs, {} outputs, 3D: {is_3d}, {} {}",
        inputs.num,
        directions.num,
        output.precision(),
        output.location()
    );

    output.ensure(offset_out + directions.num)?;
    if directions.num == 0 {
        return Ok(());
    }

    match output.location() {
        Location::Cpu => match output.precision() {
            Precision::Single => {
                dftw_host::<f32>(mode, wavenumber, inputs, directions, data, offset_out, output)?
            }
            Precision::Double => {
                dftw_host::<f64>(mode, wavenumber, inputs, directions, data, offset_out, output)?
            }
        },

        #[cfg(any(feature = "cuda", feature = "hip"))]
        Location::Gpu => {
            gpu::dftw(mode, is_3d, wavenumber, inputs, directions, data, offset_out, output)?
        }

        #[cfg(not(any(feature = "cuda", feature = "hip")))]
        Location::Gpu => return Err(KernelError::BackendUnavailable("CUDA/HIP")),
    }

    if normalise && inputs.num > 0 {
        output.scale_real(1.0 / inputs.num as f64, offset_out, directions.num)?;
    }
    Ok(())
}

fn validate(
    inputs: &DftwInputs,
    directions: &DftwDirections,
    data: Option<&Mem>,
    output: &Mem,
) -> Result<DftwMode, KernelError> {
    check_operands(
        output.meta(),
        inputs.weights.meta(),
        [
            ("x_in", Some(inputs.x.meta())),
            ("y_in", Some(inputs.y.meta())),
            ("z_in", inputs.z.map(Mem::meta)),
            ("x_out", Some(directions.x.meta())),
            ("y_out", Some(directions.y.meta())),
            ("z_out", directions.z.map(Mem::meta)),
        ],
        data.map(Mem::meta),
        inputs.num,
        directions.offset,
        directions.num,
    )
}

/// Check the operands of a transform: types, then locations, precisions, data
/// and finally lengths. `coords` are the input then output coordinates.
fn check_operands(
    out: MemMeta,
    weights: MemMeta,
    coords: [(&'static str, Option<MemMeta>); 6],
    data: Option<MemMeta>,
    num_in: usize,
    offset_out: usize,
    num_out: usize,
) -> Result<DftwMode, KernelError> {
    // Types.
    if !out.mem_type.is_complex() {
        return Err(KernelError::TypeMismatch {
            name: "output",
            expected: "complex or matrix".to_string(),
            actual: out.mem_type,
        });
    }
    if weights.mem_type.kind != ElementKind::Complex {
        return Err(KernelError::TypeMismatch {
            name: "weights",
            expected: "complex".to_string(),
            actual: weights.mem_type,
        });
    }

    // Locations.
    weights.check_location("weights", out.location)?;
    for (name, m) in coords {
        if let Some(m) = m {
            m.check_location(name, out.location)?;
        }
    }

    // Precisions.
    let precision = out.mem_type.precision;
    weights.check_precision("weights", precision)?;
    for (name, m) in coords {
        if let Some(m) = m {
            m.check_type(name, MemType::real(precision))?;
        }
    }

    // Data.
    if let Some(data) = data {
        data.check_location("data", out.location)?;
        data.check_type("data", out.mem_type)?;
    }

    // Dimensions.
    weights.check_len("weights", num_in)?;
    for &(name, m) in &coords[..3] {
        if let Some(m) = m {
            m.check_len(name, num_in)?;
        }
    }
    for &(name, m) in &coords[3..] {
        if let Some(m) = m {
            m.check_len(name, offset_out + num_out)?;
        }
    }
    if let Some(data) = data {
        data.check_len("data", num_in * num_out)?;
    }

    match (data.is_some(), out.mem_type.kind) {
        (false, ElementKind::Complex) => Ok(DftwMode::O2C),
        (true, ElementKind::Complex) => Ok(DftwMode::C2C),
        (true, ElementKind::Matrix) => Ok(DftwMode::M2M),
        (false, _) => Err(KernelError::UnsupportedConfiguration(
            "a matrix DFT without data".to_string(),
        )),
        (true, ElementKind::Real) => Err(KernelError::UnsupportedConfiguration(
            "a real-valued DFT output".to_string(),
        )),
    }
}

fn dftw_host<F: Real>(
    mode: DftwMode,
    wavenumber: f64,
    inputs: &DftwInputs,
    directions: &DftwDirections,
    data: Option<&Mem>,
    offset_out: usize,
    output: &mut Mem,
) -> Result<(), KernelError> {
    let num_in = inputs.num;
    let out_range = directions.offset..directions.offset + directions.num;
    let weights = &inputs.weights.complex::<F>()?[..num_in];
    let points_in = cpu::Points {
        x: &inputs.x.real::<F>()?[..num_in],
        y: &inputs.y.real::<F>()?[..num_in],
        z: match (inputs.z, directions.z) {
            (Some(z), Some(_)) => Some(&z.real::<F>()?[..num_in]),
            _ => None,
        },
    };
    let points_out = cpu::Points {
        x: &directions.x.real::<F>()?[out_range.clone()],
        y: &directions.y.real::<F>()?[out_range.clone()],
        z: match (inputs.z, directions.z) {
            (Some(_), Some(z)) => Some(&z.real::<F>()?[out_range]),
            _ => None,
        },
    };
    let k = F::from_f64(wavenumber);
    let out_range = offset_out..offset_out + directions.num;

    match (mode, data) {
        (DftwMode::O2C, _) => cpu::dftw_scalar(
            k,
            weights,
            &points_in,
            &points_out,
            None,
            &mut output.complex_mut::<F>()?[out_range],
        ),
        (DftwMode::C2C, Some(data)) => cpu::dftw_scalar(
            k,
            weights,
            &points_in,
            &points_out,
            Some(data.complex::<F>()?),
            &mut output.complex_mut::<F>()?[out_range],
        ),
        (DftwMode::M2M, Some(data)) => cpu::dftw_matrix(
            k,
            weights,
            &points_in,
            &points_out,
            data.jones::<F>()?,
            &mut output.jones_mut::<F>()?[out_range],
        ),
        (_, None) => {
            return Err(KernelError::InvalidArgument(
                "data is required for this DFT mode".to_string(),
            ))
        }
    }
    Ok(())
}
