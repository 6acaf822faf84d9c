use std::process::Command;

// Release tarballs have no .git; packagers pass the hash in instead.
const HASH_OVERRIDE: &str = "FAST_CLIP_GIT_HASH";

fn git_hash() -> Option<String> {
    let out = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())?;
    let hash = String::from_utf8(out.stdout).ok()?.trim().to_string();
    (!hash.is_empty()).then_some(hash)
}

fn main() {
    let hash = std::env::var(HASH_OVERRIDE)
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(git_hash)
        .unwrap_or_default();

    println!("cargo:rustc-env=GIT_HASH={hash}");
    println!("cargo:rerun-if-env-changed={HASH_OVERRIDE}");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/refs/heads");
}
