// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use marlu::c64;
use serial_test::serial;

use super::*;

#[test]
#[serial]
fn upload_and_download() {
    let heap: Vec<f64> = (0..100).map(|i| i as f64 * 0.5).collect();
    let d = DeviceBuffer::upload(&heap).unwrap();
    assert_eq!(d.size(), 800);
    let mut heap2 = vec![-1.0_f64; 100];
    d.download(&mut heap2).unwrap();
    assert_eq!(heap, heap2);
}

#[test]
#[serial]
fn download_with_wrong_size_fails() {
    let d = DeviceBuffer::upload(&[1.0_f32; 10]).unwrap();
    let mut dest = [0.0_f32; 9];
    let err = d.download(&mut dest).unwrap_err().to_string();
    assert!(err.contains("40 bytes into 36 bytes"), "{err}");
}

#[test]
#[serial]
fn huge_alloc_fails() {
    let result = DeviceBuffer::alloc(1024_usize.pow(4));
    assert!(matches!(
        result,
        Err(GpuError::Runtime {
            op: GpuOp::Alloc,
            ..
        })
    ));
}

#[test]
#[serial]
fn download_from_null_pointer_fails() {
    let d = DeviceBuffer {
        ptr: null_mut(),
        size: 1,
    };
    let mut dest = [0_u8; 1];
    let err = d.download(&mut dest).unwrap_err().to_string();
    assert!(err.contains("null device pointer"), "{err}");
}

#[test]
#[serial]
fn zeroing() {
    let buffer = [1_u32; 10];
    let mut d = DeviceBuffer::upload(&buffer).unwrap();
    let mut copy = [2_u32; 10];
    d.download(&mut copy).unwrap();
    assert_eq!(&buffer, &copy);

    d.zero().unwrap();
    d.download(&mut copy).unwrap();
    assert_eq!(&[0_u32; 10], &copy);
}

#[test]
#[serial]
fn copy_prefix_between_buffers() {
    let a = DeviceBuffer::upload(&[7_u16; 8]).unwrap();
    let mut b = DeviceBuffer::zeroed(16).unwrap();
    b.copy_prefix_from(&a, 8).unwrap();
    let mut dest = [9_u16; 8];
    b.download(&mut dest).unwrap();
    assert_eq!(dest, [7, 7, 7, 7, 0, 0, 0, 0]);

    let mut small = DeviceBuffer::alloc(4).unwrap();
    assert!(small.copy_prefix_from(&a, 8).is_err());

    let c = a.try_clone().unwrap();
    let mut dest = [0_u16; 8];
    c.download(&mut dest).unwrap();
    assert_eq!(dest, [7; 8]);
}

#[test]
#[serial]
fn scale_real_on_device() {
    let values = vec![c64::new(1.0, -2.0), c64::new(3.0, 4.0), c64::new(-5.0, 6.0)];
    let mut d = DeviceBuffer::upload(&values).unwrap();
    // Scale only the middle complex number (scalars 2 and 3).
    scale_real(&mut d, Precision::Double, 0.5, 2, 2).unwrap();
    let mut result = vec![c64::default(); 3];
    d.download(&mut result).unwrap();
    assert_abs_diff_eq!(result[0], c64::new(1.0, -2.0));
    assert_abs_diff_eq!(result[1], c64::new(1.5, 2.0));
    assert_abs_diff_eq!(result[2], c64::new(-5.0, 6.0));
}

#[test]
#[serial]
fn device_info_is_available() {
    let info = get_device_info().unwrap();
    assert!(!info.name.is_empty());
    assert!(info.runtime_version > 0);
}
