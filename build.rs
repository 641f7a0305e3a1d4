use anyhow::{Context, Result, bail};
use chrono::TimeZone;
use std::env;
use std::fs;
use std::process::Command;
use vergen_gitcl::{Emitter, GitclBuilder};

const LIBRARY: &str = "ac3";

fn main() -> Result<()> {
    let gitcl = GitclBuilder::default()
        .describe(true, true, Some("[0-9]*"))
        .build()?;

    let gitcl_res = Emitter::default()
        .idempotent()
        .fail_on_error()
        .add_instructions(&gitcl)
        .and_then(|emitter| emitter.emit());

    if let Err(e) = gitcl_res {
        eprintln!("error occurred while generating instructions: {e:?}");
        Emitter::default().idempotent().fail_on_error().emit()?;
    }

    // Reproducible builds pin the timestamp through SOURCE_DATE_EPOCH.
    let now = match env::var("SOURCE_DATE_EPOCH") {
        Ok(val) => {
            let secs = val.parse::<i64>().context("SOURCE_DATE_EPOCH is not a number")?;
            chrono::Utc
                .timestamp_opt(secs, 0)
                .single()
                .context("SOURCE_DATE_EPOCH is out of range")?
        }
        Err(_) => chrono::Utc::now(),
    };

    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let version = library_version_from_metadata()
        .or_else(|_| library_version_from_manifest())
        .unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=AC3_VERSION={version}");

    println!("cargo:rerun-if-changed={LIBRARY}/Cargo.toml");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    Ok(())
}

/// Library version from `cargo metadata`, for both path and registry dependencies.
fn library_version_from_metadata() -> Result<String> {
    let output = Command::new(env::var("CARGO").unwrap_or_else(|_| "cargo".to_string()))
        .args(["metadata", "--format-version", "1"])
        .output()?;

    if !output.status.success() {
        bail!("cargo metadata failed");
    }

    let metadata: serde_json::Value = serde_json::from_slice(&output.stdout)?;

    let version = metadata["packages"]
        .as_array()
        .into_iter()
        .flatten()
        .find(|package| package["name"].as_str() == Some(LIBRARY))
        .and_then(|package| package["version"].as_str());

    match version {
        Some(version) => Ok(version.to_string()),
        None => bail!("{LIBRARY} package not found in metadata"),
    }
}

fn library_version_from_manifest() -> Result<String> {
    let manifest = fs::read_to_string(format!("{LIBRARY}/Cargo.toml"))?;

    manifest
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("version"))
        .find_map(|line| line.split_once('='))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .with_context(|| format!("no version in {LIBRARY}/Cargo.toml"))
}
