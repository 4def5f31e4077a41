// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Typed, location-aware buffers.
//!
//! A [`Mem`] holds real, complex or 2x2-matrix ([`Jones`]) elements in single
//! or double precision, either in host memory or in the memory of a CUDA/HIP
//! device. Device memory is held behind a [`DeviceBuffer`] and has no host
//! accessor; asking for a host slice of a device buffer yields
//! [`KernelError::BadLocation`].
//!
//! Buffers handed to kernels are borrowed (`&Mem`/`&mut Mem`); only the owner
//! of a [`Mem`] can drop it.
//!
//! [`DeviceBuffer`]: crate::gpu::DeviceBuffer

mod real;

pub use real::Real;

use marlu::{c32, c64, Jones};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::KernelError;
#[cfg(any(feature = "cuda", feature = "hip"))]
use crate::gpu::DeviceBuffer;

// Device buffers of matrices are copied as runs of 4 complex numbers.
static_assertions::assert_eq_size!(Jones<f64>, [c64; 4]);
static_assertions::assert_eq_size!(Jones<f32>, [c32; 4]);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Single,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ElementKind {
    Real,
    Complex,
    /// A 2x2 complex matrix.
    Matrix,
}

/// The type of every element in a [`Mem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemType {
    pub kind: ElementKind,
    pub precision: Precision,
}

impl std::fmt::Display for MemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.precision, self.kind)
    }
}

impl MemType {
    pub const fn new(kind: ElementKind, precision: Precision) -> MemType {
        MemType { kind, precision }
    }

    pub const fn real(precision: Precision) -> MemType {
        MemType::new(ElementKind::Real, precision)
    }

    pub const fn complex(precision: Precision) -> MemType {
        MemType::new(ElementKind::Complex, precision)
    }

    pub const fn matrix(precision: Precision) -> MemType {
        MemType::new(ElementKind::Matrix, precision)
    }

    /// The number of real scalars in a single element.
    pub const fn num_real_components(self) -> usize {
        match self.kind {
            ElementKind::Real => 1,
            ElementKind::Complex => 2,
            ElementKind::Matrix => 8,
        }
    }

    /// The size of a single element \[bytes\].
    pub const fn element_size(self) -> usize {
        let scalar = match self.precision {
            Precision::Single => std::mem::size_of::<f32>(),
            Precision::Double => std::mem::size_of::<f64>(),
        };
        scalar * self.num_real_components()
    }

    pub const fn is_complex(self) -> bool {
        matches!(self.kind, ElementKind::Complex | ElementKind::Matrix)
    }

    pub const fn is_matrix(self) -> bool {
        matches!(self.kind, ElementKind::Matrix)
    }
}

/// Where the memory behind a [`Mem`] lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Location {
    #[strum(serialize = "CPU")]
    Cpu,

    /// A CUDA- or HIP-capable device. Buffers can only be allocated here if
    /// the crate was compiled with the "cuda" or "hip" feature.
    #[strum(serialize = "GPU")]
    Gpu,
}

impl Location {
    /// Can buffers be allocated at this location in this build?
    pub fn is_available(self) -> bool {
        match self {
            Location::Cpu => true,
            Location::Gpu => cfg!(any(feature = "cuda", feature = "hip")),
        }
    }

    pub(crate) fn check_available(self) -> Result<(), KernelError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(KernelError::BackendUnavailable("CUDA/HIP"))
        }
    }

    /// Get a formatted string with information on the device behind this
    /// location.
    pub fn get_device_info(self) -> Result<String, KernelError> {
        match self {
            Location::Cpu => Ok(get_cpu_info()),

            #[cfg(any(feature = "cuda", feature = "hip"))]
            Location::Gpu => Ok(crate::gpu::get_device_info()?.to_string()),

            #[cfg(not(any(feature = "cuda", feature = "hip")))]
            Location::Gpu => Err(KernelError::BackendUnavailable("CUDA/HIP")),
        }
    }
}

/// Get a formatted string with information on the host CPU.
pub(crate) fn get_cpu_info() -> String {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        // Non-exhaustive but perhaps most-interesting CPU features.
        let avx = std::arch::is_x86_feature_detected!("avx");
        let avx2 = std::arch::is_x86_feature_detected!("avx2");
        let avx512 = std::arch::is_x86_feature_detected!("avx512f");

        match (avx512, avx2, avx) {
            (true, _, _) => format!("{} CPU (AVX512 available)", std::env::consts::ARCH),
            (false, true, _) => format!("{} CPU (AVX2 available)", std::env::consts::ARCH),
            (false, false, true) => format!("{} CPU (AVX available)", std::env::consts::ARCH),
            (false, false, false) => format!("{} CPU (AVX unavailable!)", std::env::consts::ARCH),
        }
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    format!("{} CPU", std::env::consts::ARCH)
}

/// Host-resident element storage.
#[derive(Debug, Clone)]
pub enum HostData {
    RealF32(Vec<f32>),
    RealF64(Vec<f64>),
    ComplexF32(Vec<c32>),
    ComplexF64(Vec<c64>),
    JonesF32(Vec<Jones<f32>>),
    JonesF64(Vec<Jones<f64>>),
}

/// Run the same expression against whichever vector is inside a [`HostData`].
macro_rules! with_host_vec {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            HostData::RealF32($v) => $body,
            HostData::RealF64($v) => $body,
            HostData::ComplexF32($v) => $body,
            HostData::ComplexF64($v) => $body,
            HostData::JonesF32($v) => $body,
            HostData::JonesF64($v) => $body,
        }
    };
}

impl HostData {
    fn zeroed(mem_type: MemType, len: usize) -> HostData {
        match (mem_type.kind, mem_type.precision) {
            (ElementKind::Real, Precision::Single) => HostData::RealF32(vec![0.0; len]),
            (ElementKind::Real, Precision::Double) => HostData::RealF64(vec![0.0; len]),
            (ElementKind::Complex, Precision::Single) => {
                HostData::ComplexF32(vec![c32::default(); len])
            }
            (ElementKind::Complex, Precision::Double) => {
                HostData::ComplexF64(vec![c64::default(); len])
            }
            (ElementKind::Matrix, Precision::Single) => {
                HostData::JonesF32(vec![Jones::default(); len])
            }
            (ElementKind::Matrix, Precision::Double) => {
                HostData::JonesF64(vec![Jones::default(); len])
            }
        }
    }

    fn mem_type(&self) -> MemType {
        match self {
            HostData::RealF32(_) => MemType::real(Precision::Single),
            HostData::RealF64(_) => MemType::real(Precision::Double),
            HostData::ComplexF32(_) => MemType::complex(Precision::Single),
            HostData::ComplexF64(_) => MemType::complex(Precision::Double),
            HostData::JonesF32(_) => MemType::matrix(Precision::Single),
            HostData::JonesF64(_) => MemType::matrix(Precision::Double),
        }
    }

    fn len(&self) -> usize {
        with_host_vec!(self, v => v.len())
    }
}

enum Storage {
    Host(HostData),

    /// Raw bytes on the device; the element type is carried by the owning
    /// [`Mem`].
    #[cfg(any(feature = "cuda", feature = "hip"))]
    Device(DeviceBuffer),
}

/// The location, type and length of a [`Mem`], without its data. Validation of
/// kernel operands is done against these so that nothing is touched before
/// every precondition has been checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemMeta {
    pub mem_type: MemType,
    pub location: Location,
    pub len: usize,
}

impl MemMeta {
    pub(crate) fn check_location(
        &self,
        name: &'static str,
        expected: Location,
    ) -> Result<(), KernelError> {
        if self.location == expected {
            Ok(())
        } else {
            Err(KernelError::BadLocation {
                name,
                expected,
                actual: self.location,
            })
        }
    }

    pub(crate) fn check_type(
        &self,
        name: &'static str,
        expected: MemType,
    ) -> Result<(), KernelError> {
        if self.mem_type == expected {
            Ok(())
        } else {
            Err(KernelError::TypeMismatch {
                name,
                expected: expected.to_string(),
                actual: self.mem_type,
            })
        }
    }

    pub(crate) fn check_precision(
        &self,
        name: &'static str,
        expected: Precision,
    ) -> Result<(), KernelError> {
        if self.mem_type.precision == expected {
            Ok(())
        } else {
            Err(KernelError::TypeMismatch {
                name,
                expected: format!("{expected} precision"),
                actual: self.mem_type,
            })
        }
    }

    pub(crate) fn check_len(&self, name: &'static str, required: usize) -> Result<(), KernelError> {
        if self.len >= required {
            Ok(())
        } else {
            Err(KernelError::DimensionMismatch {
                name,
                required,
                actual: self.len,
            })
        }
    }
}

/// A typed buffer in host or device memory.
pub struct Mem {
    mem_type: MemType,
    len: usize,
    storage: Storage,
}

impl std::fmt::Debug for Mem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mem")
            .field("mem_type", &self.mem_type)
            .field("location", &self.location())
            .field("len", &self.len)
            .finish()
    }
}

impl Mem {
    /// Allocate a zero-initialised buffer.
    pub fn new(mem_type: MemType, location: Location, len: usize) -> Result<Mem, KernelError> {
        location.check_available()?;
        let storage = match location {
            Location::Cpu => Storage::Host(HostData::zeroed(mem_type, len)),

            #[cfg(any(feature = "cuda", feature = "hip"))]
            Location::Gpu => {
                Storage::Device(DeviceBuffer::zeroed(len * mem_type.element_size())?)
            }

            #[cfg(not(any(feature = "cuda", feature = "hip")))]
            Location::Gpu => return Err(KernelError::BackendUnavailable("CUDA/HIP")),
        };
        Ok(Mem {
            mem_type,
            len,
            storage,
        })
    }

    pub fn from_host_data(data: HostData) -> Mem {
        Mem {
            mem_type: data.mem_type(),
            len: data.len(),
            storage: Storage::Host(data),
        }
    }

    pub fn from_real<F: Real>(v: Vec<F>) -> Mem {
        Mem::from_host_data(F::wrap_real(v))
    }

    pub fn from_complex<F: Real>(v: Vec<Complex<F>>) -> Mem {
        Mem::from_host_data(F::wrap_complex(v))
    }

    pub fn from_jones<F: Real>(v: Vec<Jones<F>>) -> Mem {
        Mem::from_host_data(F::wrap_jones(v))
    }

    pub fn mem_type(&self) -> MemType {
        self.mem_type
    }

    pub fn precision(&self) -> Precision {
        self.mem_type.precision
    }

    pub fn is_complex(&self) -> bool {
        self.mem_type.is_complex()
    }

    pub fn is_matrix(&self) -> bool {
        self.mem_type.is_matrix()
    }

    pub fn location(&self) -> Location {
        match self.storage {
            Storage::Host(_) => Location::Cpu,
            #[cfg(any(feature = "cuda", feature = "hip"))]
            Storage::Device(_) => Location::Gpu,
        }
    }

    /// The number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn meta(&self) -> MemMeta {
        MemMeta {
            mem_type: self.mem_type,
            location: self.location(),
            len: self.len,
        }
    }

    fn type_error<F: Real>(&self, kind: ElementKind) -> KernelError {
        KernelError::TypeMismatch {
            name: "buffer",
            expected: MemType::new(kind, F::PRECISION).to_string(),
            actual: self.mem_type,
        }
    }

    pub fn host_data(&self) -> Result<&HostData, KernelError> {
        match &self.storage {
            Storage::Host(h) => Ok(h),
            #[cfg(any(feature = "cuda", feature = "hip"))]
            Storage::Device(_) => Err(KernelError::BadLocation {
                name: "buffer",
                expected: Location::Cpu,
                actual: Location::Gpu,
            }),
        }
    }

    pub fn host_data_mut(&mut self) -> Result<&mut HostData, KernelError> {
        match &mut self.storage {
            Storage::Host(h) => Ok(h),
            #[cfg(any(feature = "cuda", feature = "hip"))]
            Storage::Device(_) => Err(KernelError::BadLocation {
                name: "buffer",
                expected: Location::Cpu,
                actual: Location::Gpu,
            }),
        }
    }

    pub fn real<F: Real>(&self) -> Result<&[F], KernelError> {
        let h = self.host_data()?;
        F::host_real(h)
            .map(|v| v.as_slice())
            .ok_or_else(|| self.type_error::<F>(ElementKind::Real))
    }

    pub fn real_mut<F: Real>(&mut self) -> Result<&mut [F], KernelError> {
        let e = self.type_error::<F>(ElementKind::Real);
        let h = self.host_data_mut()?;
        F::host_real_mut(h).map(|v| v.as_mut_slice()).ok_or(e)
    }

    pub fn complex<F: Real>(&self) -> Result<&[Complex<F>], KernelError> {
        let h = self.host_data()?;
        F::host_complex(h)
            .map(|v| v.as_slice())
            .ok_or_else(|| self.type_error::<F>(ElementKind::Complex))
    }

    pub fn complex_mut<F: Real>(&mut self) -> Result<&mut [Complex<F>], KernelError> {
        let e = self.type_error::<F>(ElementKind::Complex);
        let h = self.host_data_mut()?;
        F::host_complex_mut(h).map(|v| v.as_mut_slice()).ok_or(e)
    }

    pub fn jones<F: Real>(&self) -> Result<&[Jones<F>], KernelError> {
        let h = self.host_data()?;
        F::host_jones(h)
            .map(|v| v.as_slice())
            .ok_or_else(|| self.type_error::<F>(ElementKind::Matrix))
    }

    pub fn jones_mut<F: Real>(&mut self) -> Result<&mut [Jones<F>], KernelError> {
        let e = self.type_error::<F>(ElementKind::Matrix);
        let h = self.host_data_mut()?;
        F::host_jones_mut(h).map(|v| v.as_mut_slice()).ok_or(e)
    }

    #[cfg(any(feature = "cuda", feature = "hip"))]
    pub(crate) fn device_ptr(&self) -> Result<&DeviceBuffer, KernelError> {
        match &self.storage {
            Storage::Device(d) => {
                if d.is_null() && self.len > 0 {
                    Err(KernelError::MemoryNotAllocated("buffer"))
                } else {
                    Ok(d)
                }
            }
            Storage::Host(_) => Err(KernelError::BadLocation {
                name: "buffer",
                expected: Location::Gpu,
                actual: Location::Cpu,
            }),
        }
    }

    #[cfg(any(feature = "cuda", feature = "hip"))]
    pub(crate) fn device_ptr_mut(&mut self) -> Result<&mut DeviceBuffer, KernelError> {
        let len = self.len;
        match &mut self.storage {
            Storage::Device(d) => {
                if d.is_null() && len > 0 {
                    Err(KernelError::MemoryNotAllocated("buffer"))
                } else {
                    Ok(d)
                }
            }
            Storage::Host(_) => Err(KernelError::BadLocation {
                name: "buffer",
                expected: Location::Gpu,
                actual: Location::Cpu,
            }),
        }
    }

    /// Change the number of elements. Existing leading elements are kept, and
    /// any new elements are zero.
    pub fn realloc(&mut self, len: usize) -> Result<(), KernelError> {
        if len == self.len {
            return Ok(());
        }

        match &mut self.storage {
            Storage::Host(h) => {
                let extra = len.saturating_sub(self.len);
                with_host_vec!(h, v => {
                    v.try_reserve_exact(extra)
                        .map_err(|_| KernelError::AllocFailure {
                            bytes: extra * self.mem_type.element_size(),
                        })?;
                    v.resize(len, Default::default());
                });
            }

            #[cfg(any(feature = "cuda", feature = "hip"))]
            Storage::Device(d) => {
                let element_size = self.mem_type.element_size();
                let mut new = DeviceBuffer::zeroed(len * element_size)?;
                new.copy_prefix_from(d, self.len.min(len) * element_size)?;
                // The old buffer is freed when `new` is dropped.
                std::mem::swap(d, &mut new);
            }
        }
        self.len = len;
        Ok(())
    }

    /// Grow the buffer to at least `len` elements.
    pub fn ensure(&mut self, len: usize) -> Result<(), KernelError> {
        if self.len < len {
            self.realloc(len)
        } else {
            Ok(())
        }
    }

    /// Set every element to zero.
    pub fn clear(&mut self) -> Result<(), KernelError> {
        match &mut self.storage {
            Storage::Host(h) => {
                with_host_vec!(h, v => v.iter_mut().for_each(|x| *x = Default::default()));
            }
            #[cfg(any(feature = "cuda", feature = "hip"))]
            Storage::Device(d) => d.zero()?,
        }
        Ok(())
    }

    /// Copy this buffer to a (possibly different) location.
    pub fn copy_to_location(&self, location: Location) -> Result<Mem, KernelError> {
        location.check_available()?;
        match (&self.storage, location) {
            (Storage::Host(h), Location::Cpu) => Ok(Mem::from_host_data(h.clone())),

            #[cfg(any(feature = "cuda", feature = "hip"))]
            (Storage::Host(h), Location::Gpu) => {
                let d = with_host_vec!(h, v => DeviceBuffer::upload(v)?);
                Ok(Mem {
                    mem_type: self.mem_type,
                    len: self.len,
                    storage: Storage::Device(d),
                })
            }

            #[cfg(any(feature = "cuda", feature = "hip"))]
            (Storage::Device(d), Location::Cpu) => {
                let mut h = HostData::zeroed(self.mem_type, self.len);
                with_host_vec!(&mut h, v => d.download(v)?);
                Ok(Mem::from_host_data(h))
            }

            #[cfg(any(feature = "cuda", feature = "hip"))]
            (Storage::Device(d), Location::Gpu) => {
                Ok(Mem {
                    mem_type: self.mem_type,
                    len: self.len,
                    storage: Storage::Device(d.try_clone()?),
                })
            }

            #[cfg(not(any(feature = "cuda", feature = "hip")))]
            (_, Location::Gpu) => Err(KernelError::BackendUnavailable("CUDA/HIP")),
        }
    }

    /// Duplicate this buffer in the same location.
    pub fn try_clone(&self) -> Result<Mem, KernelError> {
        self.copy_to_location(self.location())
    }

    /// Copy this buffer into a new host buffer of a different precision. The
    /// element kind is unchanged.
    pub fn convert_precision(&self, precision: Precision) -> Result<Mem, KernelError> {
        let h = self.host_data()?;
        let converted = match (h, precision) {
            (HostData::RealF32(v), Precision::Single) => HostData::RealF32(v.clone()),
            (HostData::RealF64(v), Precision::Double) => HostData::RealF64(v.clone()),
            (HostData::ComplexF32(v), Precision::Single) => HostData::ComplexF32(v.clone()),
            (HostData::ComplexF64(v), Precision::Double) => HostData::ComplexF64(v.clone()),
            (HostData::JonesF32(v), Precision::Single) => HostData::JonesF32(v.clone()),
            (HostData::JonesF64(v), Precision::Double) => HostData::JonesF64(v.clone()),

            (HostData::RealF32(v), Precision::Double) => {
                HostData::RealF64(v.iter().map(|&x| x as f64).collect())
            }
            (HostData::RealF64(v), Precision::Single) => {
                HostData::RealF32(v.iter().map(|&x| x as f32).collect())
            }
            (HostData::ComplexF32(v), Precision::Double) => HostData::ComplexF64(
                v.iter()
                    .map(|c| c64::new(c.re as f64, c.im as f64))
                    .collect(),
            ),
            (HostData::ComplexF64(v), Precision::Single) => HostData::ComplexF32(
                v.iter()
                    .map(|c| c32::new(c.re as f32, c.im as f32))
                    .collect(),
            ),
            (HostData::JonesF32(v), Precision::Double) => {
                HostData::JonesF64(v.iter().map(|&j| Jones::<f64>::from(j)).collect())
            }
            (HostData::JonesF64(v), Precision::Single) => {
                HostData::JonesF32(v.iter().map(|&j| Jones::<f32>::from(j)).collect())
            }
        };
        Ok(Mem::from_host_data(converted))
    }

    /// Consume this host buffer and give it the requested precision and
    /// location.
    pub fn into_target(self, precision: Precision, location: Location) -> Result<Mem, KernelError> {
        let m = if self.precision() == precision {
            self
        } else {
            self.convert_precision(precision)?
        };
        if m.location() == location {
            Ok(m)
        } else {
            m.copy_to_location(location)
        }
    }

    /// Multiply every real scalar of elements `offset..offset + num` by
    /// `factor`.
    pub fn scale_real(&mut self, factor: f64, offset: usize, num: usize) -> Result<(), KernelError> {
        self.meta().check_len("buffer", offset + num)?;
        match &mut self.storage {
            Storage::Host(h) => {
                match h {
                    HostData::RealF32(v) => scale_slice(&mut v[offset..offset + num], factor as f32),
                    HostData::RealF64(v) => scale_slice(&mut v[offset..offset + num], factor),
                    HostData::ComplexF32(v) => {
                        scale_complex(&mut v[offset..offset + num], factor as f32)
                    }
                    HostData::ComplexF64(v) => scale_complex(&mut v[offset..offset + num], factor),
                    HostData::JonesF32(v) => scale_jones(&mut v[offset..offset + num], factor as f32),
                    HostData::JonesF64(v) => scale_jones(&mut v[offset..offset + num], factor),
                }
                Ok(())
            }

            #[cfg(any(feature = "cuda", feature = "hip"))]
            Storage::Device(d) => {
                let c = self.mem_type.num_real_components();
                crate::gpu::scale_real(
                    d,
                    self.mem_type.precision,
                    factor,
                    offset * c,
                    num * c,
                )?;
                Ok(())
            }
        }
    }

    /// Divide every element by the magnitude of the element at `index`. For
    /// real buffers that is the value itself, for complex buffers its modulus,
    /// and for matrix buffers `sqrt(sum(|a_k|^2) / 2)`.
    pub fn normalise(&mut self, index: usize) -> Result<(), KernelError> {
        self.meta().check_len("buffer", index + 1)?;
        let h = self.host_data_mut()?;
        match h {
            HostData::RealF32(v) => {
                let s = v[index];
                scale_slice(v, s.recip())
            }
            HostData::RealF64(v) => {
                let s = v[index];
                scale_slice(v, s.recip())
            }
            HostData::ComplexF32(v) => {
                let s = v[index].norm();
                scale_complex(v, s.recip())
            }
            HostData::ComplexF64(v) => {
                let s = v[index].norm();
                scale_complex(v, s.recip())
            }
            HostData::JonesF32(v) => {
                let s = jones_norm(&v[index]);
                scale_jones(v, s.recip())
            }
            HostData::JonesF64(v) => {
                let s = jones_norm(&v[index]);
                scale_jones(v, s.recip())
            }
        }
        Ok(())
    }

    /// Replace complex elements with their real parts, in place. Real buffers
    /// are untouched; matrix buffers cannot be converted.
    pub(crate) fn take_real_part(&mut self) -> Result<(), KernelError> {
        let mem_type = self.mem_type;
        let h = self.host_data_mut()?;
        let real = match h {
            HostData::RealF32(_) | HostData::RealF64(_) => return Ok(()),
            HostData::ComplexF32(v) => HostData::RealF32(v.iter().map(|c| c.re).collect()),
            HostData::ComplexF64(v) => HostData::RealF64(v.iter().map(|c| c.re).collect()),
            HostData::JonesF32(_) | HostData::JonesF64(_) => {
                return Err(KernelError::TypeMismatch {
                    name: "plane",
                    expected: "real or complex".to_string(),
                    actual: mem_type,
                })
            }
        };
        *h = real;
        self.mem_type = MemType::real(mem_type.precision);
        Ok(())
    }
}

fn scale_slice<F: Real>(v: &mut [F], factor: F) {
    v.iter_mut().for_each(|x| *x *= factor);
}

fn scale_complex<F: Real>(v: &mut [Complex<F>], factor: F) {
    v.iter_mut().for_each(|c| *c = c.scale(factor));
}

fn scale_jones<F: Real>(v: &mut [Jones<F>], factor: F) {
    v.iter_mut().for_each(|j| {
        *j = Jones::from([
            j[0].scale(factor),
            j[1].scale(factor),
            j[2].scale(factor),
            j[3].scale(factor),
        ])
    });
}

fn jones_norm<F: Real>(j: &Jones<F>) -> F {
    let sum: F = j.iter().map(|c| c.norm_sqr()).sum();
    (sum / F::from_f64(2.0)).sqrt()
}
