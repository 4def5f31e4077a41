// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Device dispatch of the DFT. All operands have already been validated to be
//! in device memory with matching precision.

use std::ffi::c_int;
use std::ptr::null;

use super::{launch_config, DftwDirections, DftwInputs, DftwMode};
use crate::{
    error::KernelError,
    gpu::{self, gpu_kernel_call},
    mem::{Mem, Precision},
};

#[allow(clippy::too_many_arguments)]
pub(super) fn dftw(
    mode: DftwMode,
    is_3d: bool,
    wavenumber: f64,
    inputs: &DftwInputs,
    directions: &DftwDirections,
    data: Option<&Mem>,
    offset_out: usize,
    output: &mut Mem,
) -> Result<(), KernelError> {
    let precision = output.precision();
    let config = launch_config(directions.num, is_3d, precision, data.is_some());

    let weights = inputs.weights.device_ptr()?.as_ptr();
    let x_in = inputs.x.device_ptr()?.as_ptr();
    let y_in = inputs.y.device_ptr()?.as_ptr();
    let x_out = directions.x.device_ptr()?.as_ptr();
    let y_out = directions.y.device_ptr()?.as_ptr();
    let (z_in, z_out) = match (inputs.z, directions.z) {
        (Some(z_in), Some(z_out)) if is_3d => {
            (z_in.device_ptr()?.as_ptr(), z_out.device_ptr()?.as_ptr())
        }
        _ => (null(), null()),
    };
    let data = match data {
        Some(d) => d.device_ptr()?.as_ptr(),
        None => null(),
    };
    let output = output.device_ptr_mut()?.as_mut_ptr();

    match precision {
        Precision::Single => gpu_kernel_call!(
            gpu::oskar_dftw_f,
            mode.as_int() as c_int,
            is_3d as c_int,
            inputs.num as c_int,
            wavenumber as f32,
            weights,
            x_in.cast(),
            y_in.cast(),
            z_in.cast(),
            directions.offset as c_int,
            directions.num as c_int,
            x_out.cast(),
            y_out.cast(),
            z_out.cast(),
            data,
            offset_out as c_int,
            output,
            config.block_size as c_int,
            config.max_in_chunk as c_int,
        )?,
        Precision::Double => gpu_kernel_call!(
            gpu::oskar_dftw_d,
            mode.as_int() as c_int,
            is_3d as c_int,
            inputs.num as c_int,
            wavenumber,
            weights,
            x_in.cast(),
            y_in.cast(),
            z_in.cast(),
            directions.offset as c_int,
            directions.num as c_int,
            x_out.cast(),
            y_out.cast(),
            z_out.cast(),
            data,
            offset_out as c_int,
            output,
            config.block_size as c_int,
            config.max_in_chunk as c_int,
        )?,
    }
    Ok(())
}
