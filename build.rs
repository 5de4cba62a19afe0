//! Build script for `git-guard`.
//!
//! Emits `VERGEN_BUILD_TIMESTAMP`, `VERGEN_RUSTC_SEMVER` and
//! `VERGEN_CARGO_TARGET_TRIPLE`, the three values `--version` prints.
//! Missing metadata is a warning, never a build failure.

use std::fmt::Display;

use vergen_gix::{BuildBuilder, CargoBuilder, Emitter, RustcBuilder};

fn warn(stage: &str, err: impl Display) {
    println!("cargo:warning=git-guard: no {stage} metadata for --version: {err}");
}

fn main() {
    let mut emitter = Emitter::default();

    match BuildBuilder::default().build_timestamp(true).build() {
        Ok(build) => {
            if let Err(e) = emitter.add_instructions(&build) {
                warn("build", e);
            }
        }
        Err(e) => warn("build", e),
    }

    match CargoBuilder::default().target_triple(true).build() {
        Ok(cargo) => {
            if let Err(e) = emitter.add_instructions(&cargo) {
                warn("cargo", e);
            }
        }
        Err(e) => warn("cargo", e),
    }

    match RustcBuilder::default().semver(true).build() {
        Ok(rustc) => {
            if let Err(e) = emitter.add_instructions(&rustc) {
                warn("rustc", e);
            }
        }
        Err(e) => warn("rustc", e),
    }

    if let Err(e) = emitter.emit() {
        warn("emitted", e);
    }
}
