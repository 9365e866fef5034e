// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=CAMERA_VID_VERSION");

    // Packagers building from a tarball can pin the version string
    let version = std::env::var("CAMERA_VID_VERSION")
        .ok()
        .or_else(describe)
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// "v0.2.0" -> "0.2.0-abcdef1", "v0.2.0-5-gabcdef1" -> "0.2.0-dirty-abcdef1"
fn describe() -> Option<String> {
    let described = git(&["describe", "--tags", "--always", "--match", "v*"])?;
    let described = described.strip_prefix('v').unwrap_or(&described);

    let parts: Vec<&str> = described.rsplitn(3, '-').collect();
    if let [hash, _commits, base] = parts.as_slice() {
        let hash = hash.strip_prefix('g').unwrap_or(hash);
        return Some(format!("{}-dirty-{}", base, hash));
    }

    let commit = git(&["rev-parse", "--short", "HEAD"])?;
    if described == commit {
        Some(format!("{}-{}", env!("CARGO_PKG_VERSION"), commit))
    } else {
        Some(format!("{}-{}", described, commit))
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}
