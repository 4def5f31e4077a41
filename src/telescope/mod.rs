// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Interferometer array layouts.

#[cfg(test)]
mod tests;

use marlu::{pos::xyz::xyzs_to_uvws, LatLngHeight, RADec, XyzGeodetic, ENH, UVW};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::{
    error::KernelError,
    math::num_cross_baselines,
    mem::{Location, Mem, Precision},
};

/// The response of each antenna within a station.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ElementPattern {
    /// Unit response in every direction above the horizon. Station beams are
    /// complex scalars.
    #[default]
    Isotropic,

    /// Crossed short dipoles aligned east-west (X) and north-south (Y).
    /// Station beams are 2x2 Jones matrices.
    Dipole,
}

#[derive(Debug, Clone)]
pub struct Telescope {
    /// The array centre.
    pub array_position: LatLngHeight,

    /// The position of every station relative to the array centre.
    pub station_enhs: Vec<ENH>,

    /// `station_enhs` in geocentric coordinates.
    pub station_xyzs: Vec<XyzGeodetic>,

    /// The positions of the antennas within a station, relative to the
    /// station centre. Every station has this same layout.
    pub antenna_enhs: Vec<ENH>,

    pub element_pattern: ElementPattern,
}

impl Telescope {
    pub fn new(
        array_position: LatLngHeight,
        station_enhs: Vec<ENH>,
        antenna_enhs: Vec<ENH>,
        element_pattern: ElementPattern,
    ) -> Result<Telescope, TelescopeError> {
        if station_enhs.is_empty() {
            return Err(TelescopeError::NoStations);
        }
        if antenna_enhs.is_empty() {
            return Err(TelescopeError::NoAntennas);
        }
        let station_xyzs = station_enhs
            .iter()
            .map(|enh| enh.to_xyz(array_position.latitude_rad))
            .collect();
        Ok(Telescope {
            array_position,
            station_enhs,
            station_xyzs,
            antenna_enhs,
            element_pattern,
        })
    }

    pub fn num_stations(&self) -> usize {
        self.station_xyzs.len()
    }

    pub fn num_antennas_per_station(&self) -> usize {
        self.antenna_enhs.len()
    }

    pub fn num_baselines(&self) -> usize {
        num_cross_baselines(self.num_stations())
    }

    /// The UVW coordinates of every station towards `phase_centre` at the
    /// given local sidereal time \[metres\]. Baseline coordinates are
    /// differences of these.
    pub fn station_uvws(&self, lst_rad: f64, phase_centre: RADec) -> Vec<UVW> {
        xyzs_to_uvws(&self.station_xyzs, phase_centre.to_hadec(lst_rad))
    }

    /// The (east, north, height) antenna coordinates as three buffers
    /// \[metres\].
    pub fn antenna_coords(
        &self,
        precision: Precision,
        location: Location,
    ) -> Result<[Mem; 3], KernelError> {
        let column = |f: fn(&ENH) -> f64| {
            Mem::from_real(self.antenna_enhs.iter().map(f).collect::<Vec<f64>>())
                .into_target(precision, location)
        };
        Ok([column(|enh| enh.e)?, column(|enh| enh.n)?, column(|enh| enh.h)?])
    }
}

#[derive(Error, Debug)]
pub enum TelescopeError {
    #[error("The telescope has no stations")]
    NoStations,

    #[error("Stations have no antennas")]
    NoAntennas,
}
