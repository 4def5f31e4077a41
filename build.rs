// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// Use the "built" crate to generate some useful build-time information,
// including the git hash and compiler version.
fn write_built() {
    built::write_built_file().expect("Failed to acquire build-time information");
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    write_built();

    #[cfg(any(feature = "cuda", feature = "hip"))]
    gpu::build();
}

#[cfg(any(feature = "cuda", feature = "hip"))]
mod gpu {
    use std::{env, path::PathBuf};

    #[cfg(feature = "cuda")]
    const DEFAULT_CUDA_ARCHES: &[u16] = &[60, 70, 80];
    #[cfg(feature = "cuda")]
    const DEFAULT_CUDA_SMS: &[u16] = &[60, 70, 75, 80, 86];

    #[cfg(feature = "cuda")]
    fn parse_and_validate_compute(c: &str, var: &str) -> Vec<u16> {
        let mut out = vec![];
        for compute in c.trim().split(',') {
            // Check that there's only two numeric characters.
            if compute.len() != 2 {
                panic!("When parsing {var}, found '{compute}', which is not a two-digit number!")
            }

            match compute.parse() {
                Ok(p) => out.push(p),
                Err(_) => panic!("'{compute}', part of {var}, couldn't be parsed into a number!"),
            }
        }
        out
    }

    /// Find all of the GPU source files and tell cargo to watch them.
    fn gpu_sources() -> Vec<PathBuf> {
        let mut gpu_files = vec![];
        for entry in std::fs::read_dir("src/gpu").expect("src/gpu directory doesn't exist!") {
            let entry = entry.expect("Couldn't access file in src/gpu directory");
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            match path.extension().and_then(|os_str| os_str.to_str()) {
                Some("cu") => {
                    println!("cargo:rerun-if-changed={}", path.display());
                    gpu_files.push(path);
                }

                Some("h" | "cuh") => {
                    println!("cargo:rerun-if-changed={}", path.display());
                }

                _ => (),
            }
        }
        gpu_files
    }

    pub(super) fn build() {
        #[cfg(all(feature = "cuda", feature = "hip"))]
        compile_error!("Both 'cuda' and 'hip' features are enabled; only one can be used.");

        let gpu_files = gpu_sources();

        #[cfg(feature = "cuda")]
        let mut gpu_target = {
            println!("cargo:rerun-if-env-changed=OSKAR_CUDA_COMPUTE");
            let (arches, sms) = match env::var("OSKAR_CUDA_COMPUTE") {
                Ok(c) => {
                    let compute = parse_and_validate_compute(&c, "OSKAR_CUDA_COMPUTE");
                    let sms = compute.clone();
                    (compute, sms)
                }
                Err(_) => {
                    println!("cargo:warning=No OSKAR_CUDA_COMPUTE; Passing arch=compute_{DEFAULT_CUDA_ARCHES:?} and code=sm_{DEFAULT_CUDA_SMS:?} to nvcc");
                    (DEFAULT_CUDA_ARCHES.to_vec(), DEFAULT_CUDA_SMS.to_vec())
                }
            };

            let mut cuda_target = cc::Build::new();
            cuda_target.cuda(true).cudart("shared");
            for arch in arches {
                for &sm in &sms {
                    if sm < arch {
                        continue;
                    }

                    cuda_target.flag("-gencode");
                    cuda_target.flag(&format!("arch=compute_{arch},code=sm_{sm}"));
                }
            }
            cuda_target
        };

        #[cfg(feature = "hip")]
        let mut gpu_target = {
            let hip_path = hip_sys::hiprt::get_hip_path();
            let compiler = hip_path.join("bin/hipcc");
            println!("cargo:rerun-if-env-changed=OSKAR_HIP_ARCH");

            let mut hip_target = cc::Build::new();
            hip_target
                .compiler(compiler)
                .include(hip_path.join("include/hip"))
                .define("__HIP_PLATFORM_AMD__", None);
            if let Ok(arch) = env::var("OSKAR_HIP_ARCH") {
                hip_target.flag(&format!("--offload-arch={arch}"));
            }
            hip_target
        };

        // The DEBUG env. variable is set by cargo. If running "cargo build
        // --release", DEBUG is "false", otherwise "true". C/C++/CUDA like the
        // compile option "NDEBUG" to be defined when using assert.h, so if
        // appropriate, define that here. We also define "DEBUG" so that can be
        // used.
        gpu_target.define(
            match env::var("DEBUG").as_deref() {
                Ok("false") => "NDEBUG",
                _ => "DEBUG",
            },
            None,
        );

        for file in gpu_files {
            gpu_target.file(file);
        }
        gpu_target.compile("oskar_gpu");
    }
}
