// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use marlu::{c32, c64, Jones};

use super::*;
use crate::{error::ErrorCode, mem::MemMeta};

/// Host buffers for a set of sources.
struct Sky {
    num: usize,
    i: Mem,
    q: Mem,
    u: Mem,
    v: Mem,
    l: Mem,
    m: Mem,
    a: Mem,
    b: Mem,
    c: Mem,
}

impl Sky {
    fn new(stokes: &[[f64; 4]], lm: &[(f64, f64)]) -> Sky {
        let col = |k: usize| Mem::from_real(stokes.iter().map(|s| s[k]).collect::<Vec<f64>>());
        Sky {
            num: stokes.len(),
            i: col(0),
            q: col(1),
            u: col(2),
            v: col(3),
            l: Mem::from_real(lm.iter().map(|p| p.0).collect::<Vec<f64>>()),
            m: Mem::from_real(lm.iter().map(|p| p.1).collect::<Vec<f64>>()),
            a: Mem::from_real(vec![0.0_f64; stokes.len()]),
            b: Mem::from_real(vec![0.0_f64; stokes.len()]),
            c: Mem::from_real(vec![0.0_f64; stokes.len()]),
        }
    }

    fn with_shape(mut self, a: f64, b: f64, c: f64) -> Sky {
        self.a = Mem::from_real(vec![a; self.num]);
        self.b = Mem::from_real(vec![b; self.num]);
        self.c = Mem::from_real(vec![c; self.num]);
        self
    }

    fn sources(&self) -> CorrelateSources {
        CorrelateSources {
            num: self.num,
            i: &self.i,
            q: &self.q,
            u: &self.u,
            v: &self.v,
            l: &self.l,
            m: &self.m,
            a: Some(&self.a),
            b: Some(&self.b),
            c: Some(&self.c),
        }
    }
}

struct Stations {
    num: usize,
    u: Mem,
    v: Mem,
}

impl Stations {
    fn new(u: Vec<f64>, v: Vec<f64>) -> Stations {
        Stations {
            num: u.len(),
            u: Mem::from_real(u),
            v: Mem::from_real(v),
        }
    }

    fn coords(&self) -> StationCoords {
        StationCoords {
            num: self.num,
            u: &self.u,
            v: &self.v,
        }
    }
}

fn unit_scalar_jones(num_stations: usize, num_sources: usize) -> Mem {
    Mem::from_complex(vec![c64::new(1.0, 0.0); num_stations * num_sources])
}

fn identity_jones(num_stations: usize, num_sources: usize) -> Mem {
    Mem::from_jones(vec![Jones::<f64>::identity(); num_stations * num_sources])
}

#[test]
fn test_source_at_phase_centre_gives_stokes_i() {
    let sky = Sky::new(&[[2.5, 0.0, 0.0, 0.0]], &[(0.0, 0.0)]);
    let stations = Stations::new(vec![0.0, 150.0], vec![0.0, -80.0]);
    let mut vis = Mem::new(MemType::complex(Precision::Double), Location::Cpu, 1).unwrap();
    correlate(
        SourceKind::Point,
        &sky.sources(),
        &unit_scalar_jones(2, 1),
        &stations.coords(),
        0.0,
        &mut vis,
    )
    .unwrap();
    assert_abs_diff_eq!(vis.complex::<f64>().unwrap()[0], c64::new(2.5, 0.0));

    // The matrix form gives the brightness matrix.
    let sky = Sky::new(&[[2.5, 0.5, -0.25, 0.125]], &[(0.0, 0.0)]);
    let mut vis = Mem::new(MemType::matrix(Precision::Double), Location::Cpu, 1).unwrap();
    correlate(
        SourceKind::Point,
        &sky.sources(),
        &identity_jones(2, 1),
        &stations.coords(),
        0.3,
        &mut vis,
    )
    .unwrap();
    let v = vis.jones::<f64>().unwrap()[0];
    assert_abs_diff_eq!(v[0], c64::new(3.0, 0.0), epsilon = 1e-15);
    assert_abs_diff_eq!(v[1], c64::new(-0.25, 0.125), epsilon = 1e-15);
    assert_abs_diff_eq!(v[2], c64::new(-0.25, -0.125), epsilon = 1e-15);
    assert_abs_diff_eq!(v[3], c64::new(2.0, 0.0), epsilon = 1e-15);
}

#[test]
fn test_single_precision() {
    let sky = Sky::new(&[[1.5, 0.0, 0.0, 0.0]], &[(0.0, 0.0)]);
    let single = |m: &Mem| m.convert_precision(Precision::Single).unwrap();
    let (i, q, u, v, l, m) = (
        single(&sky.i),
        single(&sky.q),
        single(&sky.u),
        single(&sky.v),
        single(&sky.l),
        single(&sky.m),
    );
    let stations = Stations::new(vec![0.0, 10.0, 20.0], vec![0.0, 5.0, 0.0]);
    let (su, sv) = (single(&stations.u), single(&stations.v));
    let jones = single(&unit_scalar_jones(3, 1));
    let mut vis = Mem::new(MemType::complex(Precision::Single), Location::Cpu, 3).unwrap();
    correlate(
        SourceKind::Point,
        &CorrelateSources {
            num: 1,
            i: &i,
            q: &q,
            u: &u,
            v: &v,
            l: &l,
            m: &m,
            a: None,
            b: None,
            c: None,
        },
        &jones,
        &StationCoords {
            num: 3,
            u: &su,
            v: &sv,
        },
        0.0,
        &mut vis,
    )
    .unwrap();
    for v in vis.complex::<f32>().unwrap() {
        assert_abs_diff_eq!(v.re, 1.5);
        assert_abs_diff_eq!(v.im, 0.0);
    }
}

#[test]
fn test_scalar_uses_conjugate_of_second_station() {
    let sky = Sky::new(&[[1.0, 0.0, 0.0, 0.0]], &[(0.0, 0.0)]);
    let stations = Stations::new(vec![0.0, 1.0], vec![0.0, 0.0]);
    let jones = Mem::from_complex(vec![c64::new(0.0, 1.0), c64::new(2.0, 1.0)]);
    let mut vis = Mem::new(MemType::complex(Precision::Double), Location::Cpu, 1).unwrap();
    correlate(
        SourceKind::Point,
        &sky.sources(),
        &jones,
        &stations.coords(),
        0.0,
        &mut vis,
    )
    .unwrap();
    // i * (2 - i) = 1 + 2i
    assert_abs_diff_eq!(vis.complex::<f64>().unwrap()[0], c64::new(1.0, 2.0));
}

#[test]
fn test_matrix_matches_direct_product() {
    let sky = Sky::new(&[[1.0, 0.2, 0.3, -0.1]], &[(0.0, 0.0)]);
    let stations = Stations::new(vec![0.0, 1.0], vec![0.0, 0.0]);
    let j1 = Jones::from([
        c64::new(1.0, 0.5),
        c64::new(0.1, -0.2),
        c64::new(-0.3, 0.0),
        c64::new(0.9, 0.1),
    ]);
    let j2 = Jones::from([
        c64::new(0.8, -0.1),
        c64::new(0.0, 0.3),
        c64::new(0.2, 0.2),
        c64::new(1.1, 0.0),
    ]);
    let jones = Mem::from_jones(vec![j1, j2]);
    let mut vis = Mem::new(MemType::matrix(Precision::Double), Location::Cpu, 1).unwrap();
    correlate(
        SourceKind::Point,
        &sky.sources(),
        &jones,
        &stations.coords(),
        0.0,
        &mut vis,
    )
    .unwrap();

    let b = Jones::from([
        c64::new(1.2, 0.0),
        c64::new(0.3, -0.1),
        c64::new(0.3, 0.1),
        c64::new(0.8, 0.0),
    ]);
    let expected = j1 * b * j2.h();
    let result = vis.jones::<f64>().unwrap()[0];
    for k in 0..4 {
        assert_abs_diff_eq!(result[k], expected[k], epsilon = 1e-14);
    }
}

#[test]
fn test_gaussian_envelope_attenuates_off_centre() {
    let stations = Stations::new(vec![0.0, 30.0], vec![0.0, 40.0]);
    let jones = unit_scalar_jones(2, 1);

    let point = Sky::new(&[[1.0, 0.0, 0.0, 0.0]], &[(0.0, 0.0)]);
    let gaussian = Sky::new(&[[1.0, 0.0, 0.0, 0.0]], &[(0.0, 0.0)]).with_shape(1e-4, 2e-5, 3e-4);

    let mut vis_point = Mem::new(MemType::complex(Precision::Double), Location::Cpu, 1).unwrap();
    let mut vis_gauss = Mem::new(MemType::complex(Precision::Double), Location::Cpu, 1).unwrap();
    correlate(
        SourceKind::Point,
        &point.sources(),
        &jones,
        &stations.coords(),
        0.0,
        &mut vis_point,
    )
    .unwrap();
    correlate(
        SourceKind::Gaussian,
        &gaussian.sources(),
        &jones,
        &stations.coords(),
        0.0,
        &mut vis_gauss,
    )
    .unwrap();

    let point = vis_point.complex::<f64>().unwrap()[0];
    let gauss = vis_gauss.complex::<f64>().unwrap()[0];
    assert_abs_diff_eq!(point, c64::new(1.0, 0.0));
    let (uu, vv): (f64, f64) = (-30.0, -40.0);
    let expected = (-(1e-4 * uu * uu + 2e-5 * uu * vv + 3e-4 * vv * vv)).exp();
    assert!(expected < 1.0);
    assert_abs_diff_eq!(gauss, c64::new(expected, 0.0), epsilon = 1e-14);
}

#[test]
fn test_bandwidth_smearing_attenuates_off_centre() {
    let stations = Stations::new(vec![0.0, 300.0], vec![0.0, 100.0]);
    let jones = unit_scalar_jones(2, 1);
    let sky = Sky::new(&[[1.0, 0.0, 0.0, 0.0]], &[(0.05, -0.02)]);

    let mut unsmeared = Mem::new(MemType::complex(Precision::Double), Location::Cpu, 1).unwrap();
    correlate(
        SourceKind::Point,
        &sky.sources(),
        &jones,
        &stations.coords(),
        0.0,
        &mut unsmeared,
    )
    .unwrap();
    assert_abs_diff_eq!(unsmeared.complex::<f64>().unwrap()[0], c64::new(1.0, 0.0));

    let mut smeared = Mem::new(MemType::complex(Precision::Double), Location::Cpu, 1).unwrap();
    correlate(
        SourceKind::Point,
        &sky.sources(),
        &jones,
        &stations.coords(),
        0.01,
        &mut smeared,
    )
    .unwrap();
    let x: f64 = 0.5 * 0.01 * (-300.0 * 0.05 + -100.0 * -0.02);
    let expected = x.sin() / x;
    let smeared = smeared.complex::<f64>().unwrap()[0];
    assert!(smeared.re < 1.0);
    assert_abs_diff_eq!(smeared, c64::new(expected, 0.0), epsilon = 1e-14);
}

#[test]
fn test_accumulates_and_batches_are_associative() {
    let stokes = [
        [1.0, 0.1, 0.0, 0.0],
        [0.5, 0.0, 0.2, 0.0],
        [2.0, -0.3, 0.1, 0.05],
        [0.7, 0.0, 0.0, -0.1],
    ];
    let lm = [(0.01, 0.02), (-0.03, 0.0), (0.0, -0.05), (0.04, 0.04)];
    let stations = Stations::new(vec![0.0, 50.0, -20.0, 75.0], vec![0.0, 10.0, 60.0, -35.0]);
    let num_baselines = 6;

    // Station-dependent Jones terms.
    let jones_for = |sources: std::ops::Range<usize>| {
        let mut v = vec![];
        for station in 0..4 {
            for s in sources.clone() {
                let x = 0.1 * (station + 1) as f64 + 0.01 * s as f64;
                v.push(Jones::from([
                    c64::new(1.0, x),
                    c64::new(x, 0.0),
                    c64::new(0.0, -x),
                    c64::new(1.0 - x, 0.0),
                ]));
            }
        }
        Mem::from_jones(v)
    };

    let all = Sky::new(&stokes, &lm).with_shape(1e-5, 0.0, 2e-5);
    let mut vis_all = Mem::new(MemType::matrix(Precision::Double), Location::Cpu, num_baselines).unwrap();
    correlate(
        SourceKind::Gaussian,
        &all.sources(),
        &jones_for(0..4),
        &stations.coords(),
        0.02,
        &mut vis_all,
    )
    .unwrap();

    let mut vis_batched =
        Mem::new(MemType::matrix(Precision::Double), Location::Cpu, num_baselines).unwrap();
    for range in [2..4, 0..2] {
        let batch = Sky::new(&stokes[range.clone()], &lm[range.clone()]).with_shape(1e-5, 0.0, 2e-5);
        correlate(
            SourceKind::Gaussian,
            &batch.sources(),
            &jones_for(range),
            &stations.coords(),
            0.02,
            &mut vis_batched,
        )
        .unwrap();
    }

    for (a, b) in vis_all
        .jones::<f64>()
        .unwrap()
        .iter()
        .zip(vis_batched.jones::<f64>().unwrap())
    {
        assert_abs_diff_eq!(a, b, epsilon = 1e-12);
    }
}

#[test]
fn test_no_sources_or_baselines_is_a_no_op() {
    let initial = vec![c64::new(3.0, -1.0); 3];

    let sky = Sky::new(&[], &[]);
    let stations = Stations::new(vec![0.0, 1.0, 2.0], vec![0.0, 0.0, 0.0]);
    let mut vis = Mem::from_complex(initial.clone());
    correlate(
        SourceKind::Point,
        &sky.sources(),
        &unit_scalar_jones(3, 0),
        &stations.coords(),
        0.0,
        &mut vis,
    )
    .unwrap();
    assert_eq!(vis.complex::<f64>().unwrap(), initial.as_slice());

    let sky = Sky::new(&[[1.0, 0.0, 0.0, 0.0]], &[(0.0, 0.0)]);
    let stations = Stations::new(vec![0.0], vec![0.0]);
    correlate(
        SourceKind::Point,
        &sky.sources(),
        &unit_scalar_jones(1, 1),
        &stations.coords(),
        0.0,
        &mut vis,
    )
    .unwrap();
    assert_eq!(vis.complex::<f64>().unwrap(), initial.as_slice());
}

#[test]
fn test_validation_errors_leave_vis_untouched() {
    let sky = Sky::new(&[[1.0, 0.0, 0.0, 0.0]; 2], &[(0.0, 0.0); 2]);
    let stations = Stations::new(vec![0.0, 1.0, 2.0], vec![0.0, 0.0, 0.0]);
    let initial = vec![c64::new(0.5, 0.5); 3];
    let mut vis = Mem::from_complex(initial.clone());

    // Gaussian sources without a shape.
    let sources = CorrelateSources {
        a: None,
        ..sky.sources()
    };
    let e = correlate(
        SourceKind::Gaussian,
        &sources,
        &unit_scalar_jones(3, 2),
        &stations.coords(),
        0.0,
        &mut vis,
    )
    .unwrap_err();
    assert_eq!(e.code(), ErrorCode::InvalidArgument);

    // Too few Jones terms.
    let e = correlate(
        SourceKind::Point,
        &sky.sources(),
        &unit_scalar_jones(3, 1),
        &stations.coords(),
        0.0,
        &mut vis,
    )
    .unwrap_err();
    assert_eq!(e.code(), ErrorCode::DimensionMismatch);

    // Too few visibilities.
    let mut short_vis = Mem::from_complex(vec![c64::default(); 2]);
    let e = correlate(
        SourceKind::Point,
        &sky.sources(),
        &unit_scalar_jones(3, 2),
        &stations.coords(),
        0.0,
        &mut short_vis,
    )
    .unwrap_err();
    assert_eq!(e.code(), ErrorCode::DimensionMismatch);

    // Dimensions are checked before types.
    let e = correlate(
        SourceKind::Point,
        &sky.sources(),
        &identity_jones(3, 1),
        &stations.coords(),
        0.0,
        &mut vis,
    )
    .unwrap_err();
    assert_eq!(e.code(), ErrorCode::DimensionMismatch);

    // Matrix Jones with scalar visibilities.
    let e = correlate(
        SourceKind::Point,
        &sky.sources(),
        &identity_jones(3, 2),
        &stations.coords(),
        0.0,
        &mut vis,
    )
    .unwrap_err();
    assert_eq!(e.code(), ErrorCode::TypeMismatch);

    // Single-precision fluxes with double-precision visibilities.
    let single_i = sky.i.convert_precision(Precision::Single).unwrap();
    let sources = CorrelateSources {
        i: &single_i,
        ..sky.sources()
    };
    let e = correlate(
        SourceKind::Point,
        &sources,
        &unit_scalar_jones(3, 2),
        &stations.coords(),
        0.0,
        &mut vis,
    )
    .unwrap_err();
    assert_eq!(e.code(), ErrorCode::TypeMismatch);

    assert_eq!(vis.complex::<f64>().unwrap(), initial.as_slice());
}

#[test]
fn test_bad_location_checked_before_lengths_and_types() {
    let sky = Sky::new(&[[1.0, 0.0, 0.0, 0.0]; 2], &[(0.0, 0.0); 2]);
    let stations = Stations::new(vec![0.0, 1.0, 2.0], vec![0.0, 0.0, 0.0]);
    let on_device = |m: &Mem| MemMeta {
        location: Location::Gpu,
        ..m.meta()
    };
    // Single-precision visibilities for only one baseline, with Jones terms
    // for only one source: wrong precision and too short.
    let vis = Mem::from_complex(vec![c32::default(); 1]).meta();
    let jones = Mem::from_complex(vec![c32::default(); 3]).meta();
    let sources = |i: MemMeta| {
        vec![
            ("source_i", i),
            ("source_q", sky.q.meta()),
            ("source_u", sky.u.meta()),
            ("source_v", sky.v.meta()),
            ("source_l", sky.l.meta()),
            ("source_m", sky.m.meta()),
        ]
    };
    let station_arrays = |u: MemMeta| [("station_u", u), ("station_v", stations.v.meta())];

    let e = check_operands(
        vis,
        jones,
        &sources(on_device(&sky.i)),
        &station_arrays(stations.u.meta()),
        2,
        3,
    )
    .unwrap_err();
    assert!(matches!(e, KernelError::BadLocation { name: "source_i", .. }));
    assert_eq!(e.code(), ErrorCode::BadLocation);

    let e = check_operands(
        vis,
        jones,
        &sources(sky.i.meta()),
        &station_arrays(on_device(&stations.u)),
        2,
        3,
    )
    .unwrap_err();
    assert!(matches!(e, KernelError::BadLocation { name: "station_u", .. }));

    let e = check_operands(
        vis,
        on_device(&unit_scalar_jones(3, 2)),
        &sources(sky.i.meta()),
        &station_arrays(stations.u.meta()),
        2,
        3,
    )
    .unwrap_err();
    assert!(matches!(e, KernelError::BadLocation { name: "jones", .. }));

    // On the host, the lengths are the first problem.
    let e = check_operands(
        vis,
        jones,
        &sources(sky.i.meta()),
        &station_arrays(stations.u.meta()),
        2,
        3,
    )
    .unwrap_err();
    assert!(matches!(e, KernelError::DimensionMismatch { name: "jones", .. }));

    // Through the correlator itself, with long enough buffers, the precision
    // is reported and nothing is written.
    let initial = vec![c32::new(0.5, 0.5); 3];
    let mut single_vis = Mem::from_complex(initial.clone());
    let e = correlate(
        SourceKind::Point,
        &sky.sources(),
        &Mem::from_complex(vec![c32::new(1.0, 0.0); 6]),
        &stations.coords(),
        0.0,
        &mut single_vis,
    )
    .unwrap_err();
    assert_eq!(e.code(), ErrorCode::TypeMismatch);
    assert_eq!(single_vis.complex::<f32>().unwrap(), initial.as_slice());
}

#[cfg(any(feature = "cuda", feature = "hip"))]
#[test]
#[serial_test::serial]
fn test_device_jones_with_host_vis() {
    let sky = Sky::new(&[[1.0, 0.0, 0.0, 0.0]; 2], &[(0.0, 0.0); 2]);
    let stations = Stations::new(vec![0.0, 1.0, 2.0], vec![0.0, 0.0, 0.0]);
    let jones = unit_scalar_jones(3, 2)
        .copy_to_location(Location::Gpu)
        .unwrap();
    let mut vis = Mem::from_complex(vec![c32::default(); 3]);
    let e = correlate(
        SourceKind::Point,
        &sky.sources(),
        &jones,
        &stations.coords(),
        0.0,
        &mut vis,
    )
    .unwrap_err();
    assert!(matches!(e, KernelError::BadLocation { name: "jones", .. }));
}

#[cfg(any(feature = "cuda", feature = "hip"))]
#[test]
#[serial_test::serial]
fn test_gpu_matches_cpu() {
    let stokes = [[1.0, 0.1, 0.2, 0.0], [0.5, 0.0, 0.0, 0.3]];
    let lm = [(0.01, -0.02), (-0.04, 0.03)];
    let sky = Sky::new(&stokes, &lm).with_shape(1e-5, 1e-6, 2e-5);
    let stations = Stations::new(vec![0.0, 50.0, -20.0], vec![0.0, 10.0, 60.0]);
    let jones = identity_jones(3, 2);

    let mut cpu_vis = Mem::new(MemType::matrix(Precision::Double), Location::Cpu, 3).unwrap();
    correlate(
        SourceKind::Gaussian,
        &sky.sources(),
        &jones,
        &stations.coords(),
        0.01,
        &mut cpu_vis,
    )
    .unwrap();

    let gpu = |m: &Mem| m.copy_to_location(Location::Gpu).unwrap();
    let (i, q, u, v, l, m, a, b, c) = (
        gpu(&sky.i),
        gpu(&sky.q),
        gpu(&sky.u),
        gpu(&sky.v),
        gpu(&sky.l),
        gpu(&sky.m),
        gpu(&sky.a),
        gpu(&sky.b),
        gpu(&sky.c),
    );
    let (su, sv) = (gpu(&stations.u), gpu(&stations.v));
    let mut gpu_vis = Mem::new(MemType::matrix(Precision::Double), Location::Gpu, 3).unwrap();
    correlate(
        SourceKind::Gaussian,
        &CorrelateSources {
            num: 2,
            i: &i,
            q: &q,
            u: &u,
            v: &v,
            l: &l,
            m: &m,
            a: Some(&a),
            b: Some(&b),
            c: Some(&c),
        },
        &gpu(&jones),
        &StationCoords {
            num: 3,
            u: &su,
            v: &sv,
        },
        0.01,
        &mut gpu_vis,
    )
    .unwrap();
    let gpu_vis = gpu_vis.copy_to_location(Location::Cpu).unwrap();
    for (c, g) in cpu_vis
        .jones::<f64>()
        .unwrap()
        .iter()
        .zip(gpu_vis.jones::<f64>().unwrap())
    {
        assert_abs_diff_eq!(c, g, epsilon = 1e-12);
    }
}
