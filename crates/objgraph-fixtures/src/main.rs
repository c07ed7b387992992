//! Fixture generator for object-graph decoders.
//!
//! Builds the sample graphs (primitives, enums, arrays, nested records,
//! shared references and cycles) and writes each one to its own stream file.

#![allow(clippy::approx_constant)]

mod samples;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use objgraph::{EncodeOptions, SchemaContext, Value, encode_with_options, validate_value};
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Parser)]
#[command(
    name = "objgraph-fixtures",
    about = "Write sample object-graph streams for decoder tests"
)]
struct Args {
    /// Directory to write the stream files into (created if missing)
    out_dir: PathBuf,

    /// Wrap each stream in a zstd envelope at this level
    #[arg(long)]
    compress: Option<i32>,

    /// Also write manifest.json describing every file
    #[arg(long)]
    manifest: bool,
}

#[derive(Debug, Serialize)]
struct ManifestEntry {
    name: &'static str,
    file: String,
    bytes: usize,
    root: &'static str,
    sha256: String,
}

fn schema() -> SchemaContext {
    let mut schema = SchemaContext::new();
    schema.add_record_type(samples::foo_type());
    schema.add_record_type(samples::bar_type());
    schema.add_record_type(samples::node_type());
    schema.add_enum_type(samples::status_type());
    schema.add_enum_type(samples::prefix_type());
    schema
}

fn write_sample(
    dir: &Path,
    name: &'static str,
    value: &Value,
    options: EncodeOptions,
    schema: &SchemaContext,
) -> Result<ManifestEntry, String> {
    validate_value(value, schema).map_err(|e| format!("validation failed: {}", e))?;

    let bytes = encode_with_options(value, options).map_err(|e| e.to_string())?;
    let extension = if options.compression_level.is_some() { "ogz" } else { "og" };
    let file = format!("{}.{}", name, extension);
    fs::write(dir.join(&file), &bytes).map_err(|e| format!("writing {}: {}", file, e))?;

    let sha256 = Sha256::digest(&bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    Ok(ManifestEntry {
        name,
        file,
        bytes: bytes.len(),
        root: value.kind_name(),
        sha256,
    })
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = fs::create_dir_all(&args.out_dir) {
        eprintln!("Failed to create {}: {}", args.out_dir.display(), e);
        return ExitCode::FAILURE;
    }

    let options = EncodeOptions {
        compression_level: args.compress,
    };
    let schema = schema();
    let samples = samples::all();

    println!("Writing {} samples to {}", samples.len(), args.out_dir.display());
    let start = Instant::now();

    let mut entries = Vec::with_capacity(samples.len());
    let mut failures = 0;
    for sample in &samples {
        match write_sample(&args.out_dir, sample.name, &sample.value, options, &schema) {
            Ok(entry) => {
                println!("  {:<12} {:>8} bytes  {}", entry.name, entry.bytes, entry.file);
                entries.push(entry);
            }
            Err(e) => {
                eprintln!("  {}: {}", sample.name, e);
                failures += 1;
            }
        }
    }

    // Samples share objects and one of them is cyclic.
    for sample in &samples {
        objgraph::detach(&sample.value);
    }

    if args.manifest {
        let path = args.out_dir.join("manifest.json");
        let written = serde_json::to_string_pretty(&entries)
            .map_err(|e| e.to_string())
            .and_then(|json| fs::write(&path, json).map_err(|e| e.to_string()));
        if let Err(e) = written {
            eprintln!("Failed to write {}: {}", path.display(), e);
            failures += 1;
        }
    }

    println!(
        "Wrote {} files in {:?} ({} failed)",
        entries.len(),
        start.elapsed(),
        failures
    );

    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
