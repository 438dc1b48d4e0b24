//! Persona dataset commands

use anyhow::{Context, Result};
use nudge_core::{Database, LoadOptions, PersonaLibrary};

pub fn cmd_persona_list(library: &PersonaLibrary) -> Result<()> {
    let personas = library.list().context("Failed to list personas")?;
    if personas.is_empty() {
        println!("No personas found in {}", library.directory().display());
        return Ok(());
    }

    println!("🎭 Personas ({})", library.directory().display());
    println!();
    for p in personas {
        let range = match (p.first_date, p.last_date) {
            (Some(first), Some(last)) => format!("{} → {}", first, last),
            _ => "no transactions".to_string(),
        };
        println!("  {:<12} {:>4} txns  {}", p.name, p.transactions, range);
        if let Some(desc) = p.description {
            println!("  {:<12} {}", "", desc);
        }
    }

    Ok(())
}

pub fn cmd_persona_load(
    db: &Database,
    library: &PersonaLibrary,
    user_id: &str,
    name: &str,
    options: LoadOptions,
) -> Result<()> {
    println!("🎭 Loading persona '{}' for {}...", name, user_id);

    let report = library
        .load_into_db(db, user_id, name, options)
        .with_context(|| format!("Failed to load persona '{}'", name))?;

    println!("   Transactions: {} new", report.inserted);
    if report.duplicates > 0 {
        println!("   Duplicates:   {} (skipped)", report.duplicates);
    }
    if report.synthesized > 0 {
        println!("   Synthesized:  {}", report.synthesized);
    }
    println!("   Budgets:      {}", report.budgets);
    if report.salary {
        println!("   Salary:       recorded");
    }
    println!("✅ Persona loaded");

    Ok(())
}
