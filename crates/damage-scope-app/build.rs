//! Exposes the workspace `VERSION` file as `DAMAGE_SCOPE_VERSION`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn version_file() -> Result<PathBuf, String> {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").map_err(|error| error.to_string())?;
    Path::new(&manifest_dir)
        .ancestors()
        .nth(2)
        .map(|root| root.join("VERSION"))
        .ok_or_else(|| format!("no workspace root above {manifest_dir}"))
}

fn read_version(path: &Path) -> Result<String, String> {
    let raw = fs::read_to_string(path).map_err(|error| format!("{}: {error}", path.display()))?;
    let version = raw.trim();
    let well_formed = version.split('.').count() == 3
        && version
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    if !well_formed {
        return Err(format!(
            "{} must hold a MAJOR.MINOR.PATCH version, found '{version}'",
            path.display()
        ));
    }
    Ok(version.to_string())
}

fn main() {
    let version = version_file().and_then(|path| {
        println!("cargo:rerun-if-changed={}", path.display());
        read_version(&path)
    });

    match version {
        Ok(version) => println!("cargo:rustc-env=DAMAGE_SCOPE_VERSION={version}"),
        Err(message) => panic!("damage-scope version: {message}"),
    }
}
