// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Writing image cubes to FITS files.

use std::{ffi::CString, path::Path};

use fitsio::{
    errors::check_status as fits_check_status,
    images::{ImageDescription, ImageType},
    FitsFile,
};
use hifitime::Epoch;
use log::{debug, warn};
use marlu::RADec;

use super::ImagerError;
use crate::mem::{Mem, Precision};

/// Everything needed to describe the axes of an image cube.
pub(crate) struct CubeHeader<'a> {
    pub(crate) size: usize,
    pub(crate) cellsize_deg: f64,
    pub(crate) phase_centre: RADec,
    pub(crate) freq_start_hz: f64,
    pub(crate) freq_inc_hz: f64,
    pub(crate) obs_start: Option<Epoch>,
    pub(crate) bunit: &'a str,
    pub(crate) history: &'a [String],
}

/// Write real `size * size` planes, one per channel, into a new FITS file.
/// Any existing file is replaced.
pub(crate) fn write_cube(
    path: &Path,
    planes: &[&Mem],
    header: &CubeHeader,
) -> Result<(), ImagerError> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let precision = planes
        .first()
        .map(|p| p.precision())
        .unwrap_or(Precision::Double);
    let dim = [planes.len(), header.size, header.size];
    let image_description = ImageDescription {
        data_type: match precision {
            Precision::Single => ImageType::Float,
            Precision::Double => ImageType::Double,
        },
        dimensions: &dim,
    };
    debug!("Writing {}", path.display());
    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&image_description)
        .open()?;
    let hdu = fptr.primary_hdu()?;

    let half = (header.size / 2) as f64;
    let ra_deg = header.phase_centre.ra.to_degrees();
    let dec_deg = header.phase_centre.dec.to_degrees();
    hdu.write_key(&mut fptr, "BUNIT", header.bunit)?;
    hdu.write_key(&mut fptr, "CTYPE1", "RA---SIN")?;
    hdu.write_key(&mut fptr, "CRVAL1", ra_deg)?;
    hdu.write_key(&mut fptr, "CDELT1", header.cellsize_deg)?;
    hdu.write_key(&mut fptr, "CRPIX1", half + 1.0)?;
    hdu.write_key(&mut fptr, "CUNIT1", "deg")?;
    hdu.write_key(&mut fptr, "CTYPE2", "DEC--SIN")?;
    hdu.write_key(&mut fptr, "CRVAL2", dec_deg)?;
    hdu.write_key(&mut fptr, "CDELT2", header.cellsize_deg)?;
    hdu.write_key(&mut fptr, "CRPIX2", half + 1.0)?;
    hdu.write_key(&mut fptr, "CUNIT2", "deg")?;
    hdu.write_key(&mut fptr, "CTYPE3", "FREQ")?;
    hdu.write_key(&mut fptr, "CRVAL3", header.freq_start_hz)?;
    hdu.write_key(&mut fptr, "CDELT3", header.freq_inc_hz)?;
    hdu.write_key(&mut fptr, "CRPIX3", 1.0)?;
    hdu.write_key(&mut fptr, "CUNIT3", "Hz")?;
    hdu.write_key(&mut fptr, "EQUINOX", 2000.0)?;
    hdu.write_key(&mut fptr, "OBSRA", ra_deg)?;
    hdu.write_key(&mut fptr, "OBSDEC", dec_deg)?;
    if let Some(epoch) = header.obs_start {
        let (y, mo, d, h, mi, s, ns) = epoch.to_gregorian_utc();
        hdu.write_key(
            &mut fptr,
            "DATE-OBS",
            format!(
                "{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{:06.3}",
                s as f64 + ns as f64 / 1e9
            ),
        )?;
    }
    hdu.write_key(
        &mut fptr,
        "SOFTWARE",
        format!(
            "Created by {} v{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ),
    )?;

    // Channel c is at frequency-axis pixel 1 + c.
    let num_pixels = header.size * header.size;
    for (c, plane) in planes.iter().enumerate() {
        let (start, end) = (c * num_pixels, (c + 1) * num_pixels);
        match precision {
            Precision::Single => {
                let p = plane.real::<f32>()?;
                hdu.write_section(&mut fptr, start, end, &p[..num_pixels])?
            }
            Precision::Double => {
                let p = plane.real::<f64>()?;
                hdu.write_section(&mut fptr, start, end, &p[..num_pixels])?
            }
        }
    }

    write_history(&mut fptr, header.history)?;
    Ok(())
}

fn write_history(fptr: &mut FitsFile, records: &[String]) -> Result<(), ImagerError> {
    let mut status = 0;
    for record in records {
        let record = match CString::new(record.as_str()) {
            Ok(r) => r,
            Err(_) => {
                warn!("Not writing a HISTORY record containing a NUL byte");
                continue;
            }
        };
        unsafe {
            // ffphis = fits_write_history
            fitsio_sys::ffphis(
                fptr.as_raw(),   /* I - FITS file pointer  */
                record.as_ptr(), /* I - history string     */
                &mut status,     /* IO - error status      */
            );
        }
        fits_check_status(status)?;
    }
    Ok(())
}
