// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;

use super::*;

fn array_position() -> LatLngHeight {
    LatLngHeight {
        longitude_rad: 116.67_f64.to_radians(),
        latitude_rad: (-26.7_f64).to_radians(),
        height_metres: 377.0,
    }
}

fn telescope() -> Telescope {
    Telescope::new(
        array_position(),
        vec![
            ENH {
                e: 0.0,
                n: 0.0,
                h: 0.0,
            },
            ENH {
                e: 100.0,
                n: 0.0,
                h: 0.0,
            },
            ENH {
                e: 0.0,
                n: 50.0,
                h: 2.0,
            },
        ],
        vec![
            ENH {
                e: -0.5,
                n: 0.0,
                h: 0.0,
            },
            ENH {
                e: 0.5,
                n: 0.0,
                h: 0.0,
            },
        ],
        ElementPattern::Isotropic,
    )
    .unwrap()
}

#[test]
fn test_counts() {
    let t = telescope();
    assert_eq!(t.num_stations(), 3);
    assert_eq!(t.num_baselines(), 3);
    assert_eq!(t.num_antennas_per_station(), 2);
}

#[test]
fn test_uvws_at_zenith_are_enh() {
    let t = telescope();
    let lst = 1.2;
    // A phase centre at zenith.
    let phase_centre = RADec::from_radians(lst, t.array_position.latitude_rad);
    let uvws = t.station_uvws(lst, phase_centre);
    assert_eq!(uvws.len(), 3);
    for (uvw, enh) in uvws.iter().zip(&t.station_enhs) {
        assert_abs_diff_eq!(uvw.u, enh.e, epsilon = 1e-9);
        assert_abs_diff_eq!(uvw.v, enh.n, epsilon = 1e-9);
        assert_abs_diff_eq!(uvw.w, enh.h, epsilon = 1e-9);
    }
}

#[test]
fn test_baseline_length_is_independent_of_pointing() {
    let t = telescope();
    for (lst, ra, dec) in [(0.0, 0.3, -0.5), (2.0, 1.0, 0.2), (4.0, 3.5, -1.2)] {
        let uvws = t.station_uvws(lst, RADec::from_radians(ra, dec));
        let d = uvws[1] - uvws[0];
        let len = (d.u * d.u + d.v * d.v + d.w * d.w).sqrt();
        assert_abs_diff_eq!(len, 100.0, epsilon = 1e-9);
    }
}

#[test]
fn test_antenna_coords() {
    let t = telescope();
    let [e, n, h] = t.antenna_coords(Precision::Single, Location::Cpu).unwrap();
    assert_eq!(e.real::<f32>().unwrap(), &[-0.5, 0.5]);
    assert_eq!(n.real::<f32>().unwrap(), &[0.0, 0.0]);
    assert_eq!(h.len(), 2);
}

#[test]
fn test_empty_layouts_are_rejected() {
    let result = Telescope::new(array_position(), vec![], vec![ENH { e: 0.0, n: 0.0, h: 0.0 }], ElementPattern::Dipole);
    assert!(matches!(result, Err(TelescopeError::NoStations)));
    let result = Telescope::new(array_position(), vec![ENH { e: 0.0, n: 0.0, h: 0.0 }], vec![], ElementPattern::Dipole);
    assert!(matches!(result, Err(TelescopeError::NoAntennas)));
}

#[test]
fn test_element_pattern_parsing() {
    use std::str::FromStr;
    assert_eq!(ElementPattern::from_str("dipole").unwrap(), ElementPattern::Dipole);
    assert_eq!(ElementPattern::Isotropic.to_string(), "isotropic");
    assert_eq!(ElementPattern::default(), ElementPattern::Isotropic);
}
