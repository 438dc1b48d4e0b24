//! CSV import command

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use nudge_core::{import_csv, Database, SignConvention};

pub fn cmd_import(db: &Database, user_id: &str, file: &Path, sign: SignConvention) -> Result<()> {
    println!("📥 Importing {} for {}...", file.display(), user_id);

    let reader = File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let report = import_csv(db, user_id, reader, sign).context("Import failed")?;

    println!("   Parsed:     {}", report.parsed);
    println!("   Inserted:   {}", report.inserted);
    if report.duplicates > 0 {
        println!("   Duplicates: {} (skipped)", report.duplicates);
    }
    println!("✅ Import complete");

    Ok(())
}
