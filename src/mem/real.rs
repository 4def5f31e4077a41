// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The floating-point types that kernels can be instantiated with.

use std::{
    fmt::{Debug, Display},
    iter::Sum,
};

use marlu::Jones;
use num_complex::Complex;
use num_traits::{FloatConst, NumAssign};

use super::{HostData, Precision};

/// A real floating-point type that buffers can hold and kernels can compute
/// with. Only [`f32`] and [`f64`] implement this; the precision of a [`Mem`]
/// is known at runtime and is matched to one of these types at the top of
/// each kernel.
///
/// [`Mem`]: super::Mem
pub trait Real:
    num_traits::Float
    + FloatConst
    + NumAssign
    + Default
    + Debug
    + Display
    + Sum
    + Send
    + Sync
    + 'static
{
    const PRECISION: Precision;

    fn from_f64(x: f64) -> Self;

    fn to_f64(self) -> f64;

    fn host_real(data: &HostData) -> Option<&Vec<Self>>;
    fn host_real_mut(data: &mut HostData) -> Option<&mut Vec<Self>>;
    fn host_complex(data: &HostData) -> Option<&Vec<Complex<Self>>>;
    fn host_complex_mut(data: &mut HostData) -> Option<&mut Vec<Complex<Self>>>;
    fn host_jones(data: &HostData) -> Option<&Vec<Jones<Self>>>;
    fn host_jones_mut(data: &mut HostData) -> Option<&mut Vec<Jones<Self>>>;

    fn wrap_real(v: Vec<Self>) -> HostData;
    fn wrap_complex(v: Vec<Complex<Self>>) -> HostData;
    fn wrap_jones(v: Vec<Jones<Self>>) -> HostData;
}

macro_rules! impl_real {
    ($t:ty, $prec:expr, $r:ident, $c:ident, $j:ident) => {
        impl Real for $t {
            const PRECISION: Precision = $prec;

            #[inline(always)]
            fn from_f64(x: f64) -> Self {
                x as $t
            }

            #[inline(always)]
            fn to_f64(self) -> f64 {
                self as f64
            }

            fn host_real(data: &HostData) -> Option<&Vec<Self>> {
                match data {
                    HostData::$r(v) => Some(v),
                    _ => None,
                }
            }

            fn host_real_mut(data: &mut HostData) -> Option<&mut Vec<Self>> {
                match data {
                    HostData::$r(v) => Some(v),
                    _ => None,
                }
            }

            fn host_complex(data: &HostData) -> Option<&Vec<Complex<Self>>> {
                match data {
                    HostData::$c(v) => Some(v),
                    _ => None,
                }
            }

            fn host_complex_mut(data: &mut HostData) -> Option<&mut Vec<Complex<Self>>> {
                match data {
                    HostData::$c(v) => Some(v),
                    _ => None,
                }
            }

            fn host_jones(data: &HostData) -> Option<&Vec<Jones<Self>>> {
                match data {
                    HostData::$j(v) => Some(v),
                    _ => None,
                }
            }

            fn host_jones_mut(data: &mut HostData) -> Option<&mut Vec<Jones<Self>>> {
                match data {
                    HostData::$j(v) => Some(v),
                    _ => None,
                }
            }

            fn wrap_real(v: Vec<Self>) -> HostData {
                HostData::$r(v)
            }

            fn wrap_complex(v: Vec<Complex<Self>>) -> HostData {
                HostData::$c(v)
            }

            fn wrap_jones(v: Vec<Jones<Self>>) -> HostData {
                HostData::$j(v)
            }
        }
    };
}

impl_real!(f32, Precision::Single, RealF32, ComplexF32, JonesF32);
impl_real!(f64, Precision::Double, RealF64, ComplexF64, JonesF64);
