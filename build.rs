// build.rs - Build metadata for SIRENE
//
// Exports the build timestamp, compiler version, target and profile so the
// binary can report exactly what is running on a node.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-changed=build.rs");

    set_build_env_vars();

    if env::var("CARGO_FEATURE_MQTT").is_err() {
        println!("cargo:warning=Building without the `mqtt` feature: the sirene binary is disabled");
    }
}

/// Set build environment variables that lib.rs::build_info expects
fn set_build_env_vars() {
    println!(
        "cargo:rustc-env=SIRENE_BUILD_TIMESTAMP={}",
        chrono::Utc::now().to_rfc3339()
    );

    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let rustc_version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=SIRENE_RUST_VERSION={}", rustc_version);

    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=SIRENE_TARGET={}", target);

    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=SIRENE_PROFILE={}", profile);

    let git_hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    if !git_hash.is_empty() {
        println!("cargo:rustc-env=SIRENE_GIT_HASH={}", git_hash);
    }
}
