//! Shared helpers: build fixture modules with the toolchain running the tests

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX, EXE_SUFFIX};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

/// Path to the compiled `sample_suite` module, built once per test binary
pub fn sample_suite() -> &'static Path {
    static BUILT: OnceLock<PathBuf> = OnceLock::new();
    BUILT.get_or_init(|| compile_fixture("sample_suite"))
}

fn compile_fixture(name: &str) -> PathBuf {
    // Fixtures live with the runtime crate
    let source = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("unithost-runtime")
        .join("tests")
        .join("fixtures")
        .join(format!("{}.rs", name));

    let out_dir = Path::new(env!("CARGO_TARGET_TMPDIR"))
        .join(env!("CARGO_PKG_NAME"))
        .join("fixtures");
    fs::create_dir_all(&out_dir).unwrap();

    let output = out_dir.join(format!("{}{}{}", DLL_PREFIX, name, DLL_SUFFIX));
    let status = Command::new(rustc())
        .args(["--edition", "2021", "--crate-type", "cdylib", "--crate-name", name])
        .arg("-o")
        .arg(&output)
        .arg(&source)
        .status()
        .expect("failed to launch rustc");
    assert!(status.success(), "fixture {} did not compile", name);

    output
}

/// The rustc next to the cargo driving this build, else whatever is on PATH
fn rustc() -> PathBuf {
    let sibling = Path::new(env!("CARGO")).with_file_name(format!("rustc{}", EXE_SUFFIX));
    if sibling.exists() {
        sibling
    } else {
        PathBuf::from("rustc")
    }
}
