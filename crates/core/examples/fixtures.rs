use std::{fs, path::PathBuf};

use clap::Parser;
use mints::{StripConfig, transform};

#[derive(Parser, Debug)]
#[command(name = "fixtures")]
#[command(about = "Create or validate fixture files", long_about = None)]
struct Args {
    /// Write fixtures instead of validating them
    #[arg(long, short)]
    write: bool,

    /// Path to the fixtures directory (defaults to "./fixtures")
    #[arg(long, default_value = "fixtures")]
    dir: PathBuf,
}

/// Fixtures named `preserve-exports*` keep type-only exports and comments.
fn config_for(basename: &str) -> StripConfig {
    StripConfig {
        preserve_exports: basename.starts_with("preserve-exports"),
        preserve_comments: basename.starts_with("preserve-exports"),
        ..StripConfig::default()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let mut input_files = Vec::new();
    for entry in fs::read_dir(&args.dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "ts") {
            input_files.push(path);
        }
    }
    input_files.sort();

    if args.write {
        println!("Creating fixtures...");
    } else {
        println!("Validating fixtures...");
    }

    let mut mismatches = Vec::new();
    for input_path in &input_files {
        let filename = input_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or("invalid filename")?;
        let basename = filename
            .strip_suffix(".ts")
            .ok_or("filename missing extension")?;

        let source = fs::read_to_string(input_path)?;
        let res = transform(&source, &config_for(basename))?;
        let out_path = args.dir.join(format!("{basename}.out.js"));

        if args.write {
            fs::write(&out_path, &res.code)?;
            println!("  Created {}", out_path.display());
            continue;
        }

        if !out_path.exists() {
            mismatches.push(format!(
                "{filename}: missing output file {}",
                out_path.display()
            ));
        } else if res.code.as_bytes() != fs::read(&out_path)? {
            mismatches.push(format!("{filename}: code mismatch"));
        } else {
            println!("  ✓ {filename}");
        }
    }

    if args.write {
        println!("Done creating {} fixtures.", input_files.len());
        return Ok(());
    }

    if !mismatches.is_empty() {
        eprintln!("\nValidation failed:");
        for mismatch in &mismatches {
            eprintln!("  ✗ {mismatch}");
        }
        return Err(format!("{} validation error(s)", mismatches.len()).into());
    }

    println!(
        "\nAll {} fixtures validated successfully!",
        input_files.len()
    );
    Ok(())
}
