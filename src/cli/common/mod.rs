// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Common arguments for command-line interfaces. Both `simulate` and
//! `beam-pattern` need a telescope and somewhere to run the kernels, so the
//! same arguments are shared between them.

mod printers;
#[cfg(test)]
mod tests;

pub(super) use printers::{display_warnings, InfoPrinter, Warn};

use std::{path::Path, path::PathBuf, str::FromStr};

use clap::Parser;
use itertools::Itertools;
use log::debug;
use marlu::{LatLngHeight, ENH};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use super::OskarError;
use crate::{
    constants::{DEFAULT_ARRAY_HEIGHT_M, DEFAULT_ARRAY_LAT_DEG, DEFAULT_ARRAY_LONG_DEG},
    mem::{Location, Precision},
    telescope::{ElementPattern, Telescope, TelescopeError},
};

lazy_static::lazy_static! {
    pub(super) static ref ARG_FILE_TYPES_COMMA_SEPARATED: String = ArgFileTypes::iter().join(", ");

    pub(super) static ref ARG_FILE_HELP: String =
        format!("All arguments may be specified in a file. Any CLI arguments override arguments set in the file. Supported formats: {}", *ARG_FILE_TYPES_COMMA_SEPARATED);

    static ref ARRAY_POSITION_HELP: String =
        format!("The Earth longitude, latitude, and height of the array centre [degrees, degrees, meters]. Default: ({DEFAULT_ARRAY_LONG_DEG}°, {DEFAULT_ARRAY_LAT_DEG}°, {DEFAULT_ARRAY_HEIGHT_M}m)");

    static ref ELEMENT_PATTERN_HELP: String =
        format!("The response of every antenna in a station. Supported patterns: {}. Default: {}",
                ElementPattern::iter().join(", "), ElementPattern::default());

    static ref PRECISION_HELP: String =
        format!("The floating-point precision of the kernels. Supported precisions: {}. Default: {}",
                Precision::iter().join(", "), Precision::Double);
}

#[derive(Debug, Display, EnumIter, EnumString)]
pub(super) enum ArgFileTypes {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

macro_rules! unpack_arg_file {
    ($arg_file:expr) => ({
        use std::{fs::File, io::Read, str::FromStr};

        use crate::cli::{common::{ArgFileTypes, ARG_FILE_TYPES_COMMA_SEPARATED}, OskarError};

        log::debug!("Attempting to parse argument file {}", $arg_file.display());

        let mut contents = String::new();
        let arg_file_type = $arg_file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArgFileTypes::from_str(&e).ok());

        match arg_file_type {
            Some(ArgFileTypes::Toml) => {
                log::debug!("Parsing toml file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match toml::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(OskarError::ArgFile(format!(
                            "Couldn't decode toml structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }
            Some(ArgFileTypes::Json) => {
                log::debug!("Parsing json file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match serde_json::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(OskarError::ArgFile(format!(
                            "Couldn't decode json structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }

            _ => {
                return Err(OskarError::ArgFile(format!(
                    "Argument file '{:?}' doesn't have a recognised file extension! Valid extensions are: {}", $arg_file, *ARG_FILE_TYPES_COMMA_SEPARATED)
                ))
            }
        }
    });
}

/// Arguments describing the interferometer.
///
/// Station and antenna positions are (east, north, height) offsets in metres;
/// height may be omitted. They are given either inline in an argument file
/// (`stations = [[0, 0], [100, 20, 1]]`) or as layout files with one position
/// per line.
#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct TelescopeArgs {
    #[clap(long, help = ARRAY_POSITION_HELP.as_str(), help_heading = "TELESCOPE",
        number_of_values = 3,
        allow_hyphen_values = true,
        value_names = &["LONG_DEG", "LAT_DEG", "HEIGHT_M"]
    )]
    pub(super) array_position: Option<Vec<f64>>,

    /// A text file of station positions relative to the array centre, one
    /// "east north [height]" per line [metres]. Lines starting with # are
    /// ignored.
    #[clap(long, help_heading = "TELESCOPE", parse(from_os_str))]
    pub(super) station_layout: Option<PathBuf>,

    /// A text file of antenna positions relative to each station's centre,
    /// in the same format as the station layout. Every station has the same
    /// antennas. Default: one antenna at the station centre.
    #[clap(long, help_heading = "TELESCOPE", parse(from_os_str))]
    pub(super) antenna_layout: Option<PathBuf>,

    #[clap(long, help = ELEMENT_PATTERN_HELP.as_str(), help_heading = "TELESCOPE")]
    pub(super) element_pattern: Option<String>,

    #[clap(skip)]
    pub(super) stations: Option<Vec<Vec<f64>>>,

    #[clap(skip)]
    pub(super) antennas: Option<Vec<Vec<f64>>>,
}

impl TelescopeArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            array_position: self.array_position.or(other.array_position),
            station_layout: self.station_layout.or(other.station_layout),
            antenna_layout: self.antenna_layout.or(other.antenna_layout),
            element_pattern: self.element_pattern.or(other.element_pattern),
            stations: self.stations.or(other.stations),
            antennas: self.antennas.or(other.antennas),
        }
    }

    /// Make a [`Telescope`]. If `require_stations` is false and no stations
    /// were given, the telescope is a single station at the array centre.
    pub(super) fn parse(self, require_stations: bool) -> Result<Telescope, CommonArgsError> {
        let TelescopeArgs {
            array_position,
            station_layout,
            antenna_layout,
            element_pattern,
            stations,
            antennas,
        } = self;

        let array_position = match array_position {
            Some(v) => {
                if v.len() != 3 {
                    return Err(CommonArgsError::BadArrayPosition { pos: v });
                }
                LatLngHeight {
                    longitude_rad: v[0].to_radians(),
                    latitude_rad: v[1].to_radians(),
                    height_metres: v[2],
                }
            }
            None => LatLngHeight {
                longitude_rad: DEFAULT_ARRAY_LONG_DEG.to_radians(),
                latitude_rad: DEFAULT_ARRAY_LAT_DEG.to_radians(),
                height_metres: DEFAULT_ARRAY_HEIGHT_M,
            },
        };

        let station_enhs = match positions("stations", stations, station_layout)? {
            Some(s) => s,
            None if require_stations => return Err(CommonArgsError::NoStations),
            None => vec![ENH::default()],
        };
        let antenna_enhs = match positions("antennas", antennas, antenna_layout)? {
            Some(a) => a,
            None => {
                "No antenna layout was given; every station is a single antenna at its centre"
                    .warn();
                vec![ENH::default()]
            }
        };

        let element_pattern = match element_pattern {
            Some(p) => ElementPattern::from_str(&p.to_lowercase())
                .map_err(|_| CommonArgsError::BadElementPattern(p))?,
            None => ElementPattern::default(),
        };

        let mut printer = InfoPrinter::new("Telescope".into());
        printer.push_line(
            format!(
                "Array position:    {:>8.4}° {:>8.4}° {:.4}m",
                array_position.longitude_rad.to_degrees(),
                array_position.latitude_rad.to_degrees(),
                array_position.height_metres
            )
            .into(),
        );
        printer.push_block(vec![
            format!("{} stations", station_enhs.len()).into(),
            format!(
                "{} antennas per station ({} elements)",
                antenna_enhs.len(),
                element_pattern
            )
            .into(),
        ]);
        printer.display();

        Ok(Telescope::new(
            array_position,
            station_enhs,
            antenna_enhs,
            element_pattern,
        )?)
    }
}

/// Get positions from either inline values or a layout file, but not both.
fn positions(
    what: &'static str,
    inline: Option<Vec<Vec<f64>>>,
    layout: Option<PathBuf>,
) -> Result<Option<Vec<ENH>>, CommonArgsError> {
    match (inline, layout) {
        (Some(_), Some(_)) => Err(CommonArgsError::InlineAndLayout(what)),
        (Some(inline), None) => inline
            .into_iter()
            .map(|v| {
                to_enh(&v).ok_or_else(|| CommonArgsError::BadPosition {
                    what,
                    pos: v.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        (None, Some(layout)) => read_layout(&layout).map(Some),
        (None, None) => Ok(None),
    }
}

fn to_enh(v: &[f64]) -> Option<ENH> {
    match *v {
        [e, n] => Some(ENH { e, n, h: 0.0 }),
        [e, n, h] => Some(ENH { e, n, h }),
        _ => None,
    }
}

/// Read a layout file of "east north [height]" lines. Values may be
/// separated by whitespace or commas.
pub(super) fn read_layout(file: &Path) -> Result<Vec<ENH>, CommonArgsError> {
    debug!("Reading layout file {}", file.display());
    let contents = std::fs::read_to_string(file)?;
    let mut enhs = vec![];
    for (i_line, line) in contents.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let values: Result<Vec<f64>, _> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(f64::from_str)
            .collect();
        match values.ok().as_deref().and_then(to_enh) {
            Some(enh) => enhs.push(enh),
            None => {
                return Err(CommonArgsError::BadLayoutLine {
                    file: file.display().to_string(),
                    line_num: i_line + 1,
                    line: line.to_string(),
                })
            }
        }
    }
    if enhs.is_empty() {
        return Err(CommonArgsError::EmptyLayout(file.display().to_string()));
    }
    Ok(enhs)
}

/// Where and how the kernels run.
#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct ComputeArgs {
    #[clap(long, help = PRECISION_HELP.as_str(), help_heading = "COMPUTE")]
    pub(super) precision: Option<String>,

    /// Run the DFT and correlation kernels on the GPU. Only available if
    /// compiled with the "cuda" or "hip" feature.
    #[clap(long, help_heading = "COMPUTE")]
    #[serde(default)]
    pub(super) gpu: bool,
}

impl ComputeArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            precision: self.precision.or(other.precision),
            gpu: self.gpu || other.gpu,
        }
    }

    pub(super) fn parse(self) -> Result<(Precision, Location), OskarError> {
        let precision = match self.precision {
            Some(p) => Precision::from_str(&p.to_lowercase())
                .map_err(|_| CommonArgsError::BadPrecision(p))?,
            None => Precision::Double,
        };
        let location = if self.gpu {
            Location::Gpu
        } else {
            Location::Cpu
        };

        let mut printer = InfoPrinter::new("Compute".into());
        printer.push_line(format!("Using {location} memory, {precision} precision").into());
        printer.push_line(location.get_device_info()?.into());
        printer.display();

        Ok((precision, location))
    }
}

#[derive(Error, Debug)]
pub(super) enum CommonArgsError {
    #[error("No stations were specified; give them inline in an argument file or with --station-layout")]
    NoStations,

    #[error("Array position specified as {pos:?}, not [<Longitude>, <Latitude>, <Height>]")]
    BadArrayPosition { pos: Vec<f64> },

    #[error("Both inline {0} and a layout file were given; only one can be used")]
    InlineAndLayout(&'static str),

    #[error("Position {pos:?} in {what} is not [<East>, <North>] or [<East>, <North>, <Height>]")]
    BadPosition { what: &'static str, pos: Vec<f64> },

    #[error("Line {line_num} of layout file '{file}' is not 'east north [height]': {line}")]
    BadLayoutLine {
        file: String,
        line_num: usize,
        line: String,
    },

    #[error("Layout file '{0}' has no positions")]
    EmptyLayout(String),

    #[error("Element pattern '{0}' is not recognised")]
    BadElementPattern(String),

    #[error("Precision '{0}' is not recognised; use single or double")]
    BadPrecision(String),

    #[error(transparent)]
    Telescope(#[from] TelescopeError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
