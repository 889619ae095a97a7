// Build script stamping the defectscope version into the CLI
//
// The value ends up in `--version` and in the `generator` field of every
// metrics bundle the CLI writes. Resolution order: DEFECTSCOPE_RELEASE_VERSION,
// then `git describe` against `v*` release tags, then CARGO_PKG_VERSION.

use std::path::PathBuf;
use std::process::Command;

const RELEASE_VERSION_VAR: &str = "DEFECTSCOPE_RELEASE_VERSION";

fn main() {
    let version = std::env::var(RELEASE_VERSION_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(git_version)
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=DEFECTSCOPE_VERSION={}", version);
    println!("cargo:rerun-if-env-changed={}", RELEASE_VERSION_VAR);

    // Build scripts run in the package dir; the repository lives one level up
    if let Some(git_dir) = workspace_git_dir() {
        for watched in ["HEAD", "refs/heads", "refs/tags"] {
            println!("cargo:rerun-if-changed={}", git_dir.join(watched).display());
        }
    }
}

fn workspace_git_dir() -> Option<PathBuf> {
    let manifest_dir = PathBuf::from(std::env::var_os("CARGO_MANIFEST_DIR")?);
    let git_dir = manifest_dir.parent()?.join(".git");
    git_dir.is_dir().then_some(git_dir)
}

/// "0.3.0" on a release tag or past one ("v0.3.0-5-gabc123"),
/// "<pkg>-<sha>[-dirty]" when no release tag is reachable
fn git_version() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--match", "v[0-9]*", "--always", "--dirty"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8(output.stdout).ok()?;
    let described = described.trim();

    match described.strip_prefix('v') {
        Some(tagged) => Some(match tagged.find('-') {
            Some(dash) => tagged[..dash].to_string(),
            None => tagged.to_string(),
        }),
        None => {
            let base_version = env!("CARGO_PKG_VERSION");
            Some(match described.strip_suffix("-dirty") {
                Some(sha) => format!("{}-{}-dirty", base_version, sha),
                None => format!("{}-{}", base_version, described),
            })
        }
    }
}
