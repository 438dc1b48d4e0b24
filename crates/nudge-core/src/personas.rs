//! Persona datasets
//!
//! A persona is a canned financial life stored as `<dir>/<name>.json`:
//!
//! ```json
//! {
//!   "persona": "student",
//!   "description": "Part-time barista, tight budget",
//!   "savings_goal": 0.1,
//!   "salary": { "amount": 1400, "frequency": "monthly", "effective_date": "2026-01-01" },
//!   "budgets": [{ "category": "Food & Dining", "limit": 250 }],
//!   "transactions": [
//!     { "date": "2026-01-03", "amount": 6.5, "merchant": "Blue Bottle", "category": "coffee shops", "hour": 8 }
//!   ]
//! }
//! ```
//!
//! Raw categories go through `normalize`. Gaps in the timeline can be filled
//! with synthetic rows drawn from the persona's own category mix, using a
//! seeded RNG so the same persona and seed always produce the same rows.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PersonaConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    BudgetPeriod, Category, Mood, NewBudget, NewSalary, NewTransaction, NewUser,
    TransactionSource,
};
use crate::normalize::{normalize_category, resolve_category};

/// Longest window, in days, that synthesis will fill
pub const MAX_SYNTHESIS_DAYS: i64 = 366;

/// A persona dataset as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaDataset {
    pub persona: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub savings_goal: Option<f64>,
    #[serde(default)]
    pub salary: Option<NewSalary>,
    #[serde(default)]
    pub budgets: Vec<PersonaBudget>,
    #[serde(default)]
    pub transactions: Vec<PersonaTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaBudget {
    /// Raw category label
    pub category: String,
    pub limit: f64,
    #[serde(default)]
    pub period: BudgetPeriod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaTransaction {
    pub date: NaiveDate,
    pub amount: f64,
    pub merchant: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub hour: Option<u8>,
}

impl PersonaTransaction {
    pub fn to_new(&self, source: TransactionSource) -> NewTransaction {
        NewTransaction {
            date: self.date,
            amount: self.amount,
            merchant: self.merchant.clone(),
            category: resolve_category(self.category.as_deref(), &self.merchant),
            raw_category: self.category.clone(),
            mood: self.mood,
            hour: self.hour.map(|h| h.min(23)),
            source,
        }
    }
}

/// Listing entry for one persona
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaSummary {
    pub name: String,
    pub description: Option<String>,
    pub transactions: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// What `load_into_db` changed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaLoadReport {
    pub persona: String,
    pub inserted: usize,
    pub duplicates: usize,
    pub synthesized: usize,
    pub budgets: usize,
    pub salary: bool,
}

/// Options for loading a persona into a user's account
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Fill days without transactions with synthetic rows
    pub synthesize: bool,
}

/// FNV-1a, so the per-persona seed doesn't depend on std's hasher
fn name_hash(name: &str) -> u64 {
    name.bytes().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

impl PersonaDataset {
    pub fn from_json(content: &str) -> Result<Self> {
        let dataset: Self = serde_json::from_str(content)?;
        if let Some(tx) = dataset
            .transactions
            .iter()
            .find(|t| !t.amount.is_finite() || t.merchant.trim().is_empty())
        {
            return Err(Error::InvalidData(format!(
                "persona {}: bad transaction on {}",
                dataset.persona, tx.date
            )));
        }
        Ok(dataset)
    }

    /// Keep only transactions inside an inclusive window
    pub fn filter_by_date(&mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) {
        self.transactions.retain(|t| {
            from.map_or(true, |f| t.date >= f) && to.map_or(true, |end| t.date <= end)
        });
    }

    /// Earliest and latest transaction date
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.transactions.iter().map(|t| t.date).min()?;
        let last = self.transactions.iter().map(|t| t.date).max()?;
        Some((first, last))
    }

    pub fn summary(&self) -> PersonaSummary {
        let range = self.date_range();
        PersonaSummary {
            name: self.persona.clone(),
            description: self.description.clone(),
            transactions: self.transactions.len(),
            first_date: range.map(|r| r.0),
            last_date: range.map(|r| r.1),
        }
    }

    /// Budgets mapped to canonical categories
    pub fn new_budgets(&self) -> Vec<NewBudget> {
        self.budgets
            .iter()
            .filter(|b| b.limit > 0.0)
            .map(|b| NewBudget {
                category: normalize_category(&b.category),
                limit: b.limit,
                period: b.period,
            })
            .collect()
    }

    pub fn new_transactions(&self) -> Vec<NewTransaction> {
        self.transactions
            .iter()
            .map(|t| t.to_new(TransactionSource::Persona))
            .collect()
    }

    /// Generate 1-3 rows for every day in the window with no transactions
    ///
    /// Categories are drawn in proportion to how often they occur in the
    /// dataset, merchants from those seen in the chosen category, and
    /// amounts within 40% of the category's average spend. Windows longer
    /// than [`MAX_SYNTHESIS_DAYS`] are rejected.
    pub fn synthesize_missing(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        seed: u64,
    ) -> Result<Vec<NewTransaction>> {
        let days = (to - from).num_days() + 1;
        if days > MAX_SYNTHESIS_DAYS {
            return Err(Error::InvalidData(format!(
                "synthesis window of {} days exceeds {} days",
                days, MAX_SYNTHESIS_DAYS
            )));
        }

        let mut mix: BTreeMap<Category, (usize, f64, Vec<String>)> = BTreeMap::new();
        for tx in self.new_transactions() {
            if tx.amount <= 0.0 || tx.category == Category::Income {
                continue;
            }
            let entry = mix.entry(tx.category).or_insert_with(|| (0, 0.0, Vec::new()));
            entry.0 += 1;
            entry.1 += tx.amount;
            if !entry.2.contains(&tx.merchant) {
                entry.2.push(tx.merchant);
            }
        }
        if mix.is_empty() || from > to {
            return Ok(Vec::new());
        }

        let categories: Vec<(Category, f64, Vec<String>)> = mix
            .into_iter()
            .map(|(cat, (count, total, merchants))| (cat, total / count as f64, merchants))
            .collect();
        let weights: Vec<usize> = self
            .new_transactions()
            .iter()
            .filter(|t| t.amount > 0.0 && t.category != Category::Income)
            .fold(vec![0usize; categories.len()], |mut acc, t| {
                if let Some(i) = categories.iter().position(|c| c.0 == t.category) {
                    acc[i] += 1;
                }
                acc
            });
        let Ok(dist) = WeightedIndex::new(&weights) else {
            return Ok(Vec::new());
        };

        let busy: HashSet<NaiveDate> = self.transactions.iter().map(|t| t.date).collect();
        let mut rng = Pcg64::seed_from_u64(seed ^ name_hash(&self.persona));
        let mut out = Vec::new();

        let mut day = from;
        while day <= to {
            if !busy.contains(&day) {
                for _ in 0..rng.gen_range(1..=3) {
                    let (category, average, merchants) = &categories[dist.sample(&mut rng)];
                    let merchant = merchants
                        .choose(&mut rng)
                        .cloned()
                        .unwrap_or_else(|| category.label().to_string());
                    let amount = (average * rng.gen_range(0.6..1.4) * 100.0).round() / 100.0;
                    out.push(NewTransaction {
                        date: day,
                        amount: amount.max(0.01),
                        merchant,
                        category: *category,
                        raw_category: None,
                        mood: None,
                        hour: Some(rng.gen_range(8..22)),
                        source: TransactionSource::Synthetic,
                    });
                }
            }
            day += Duration::days(1);
        }

        debug!(persona = %self.persona, count = out.len(), "Synthesized filler transactions");
        Ok(out)
    }
}

/// Directory of persona datasets
#[derive(Debug, Clone)]
pub struct PersonaLibrary {
    directory: PathBuf,
    seed: u64,
}

impl PersonaLibrary {
    pub fn new(directory: impl Into<PathBuf>, seed: u64) -> Self {
        Self {
            directory: directory.into(),
            seed,
        }
    }

    pub fn from_config(config: &PersonaConfig) -> Self {
        Self::new(config.directory.clone(), config.seed)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Every readable dataset in the directory, sorted by name
    ///
    /// Files that fail to parse are logged and skipped.
    pub fn list(&self) -> Result<Vec<PersonaSummary>> {
        if !self.directory.exists() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(Error::from)
                .and_then(|c| PersonaDataset::from_json(&c))
            {
                Ok(dataset) => summaries.push(dataset.summary()),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable persona"),
            }
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    /// Load one persona by name
    pub fn load(&self, name: &str) -> Result<PersonaDataset> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidData(format!("invalid persona name: {}", name)));
        }
        let path = self.directory.join(format!("{}.json", name));
        if !path.exists() {
            return Err(Error::NotFound(format!("persona {}", name)));
        }
        PersonaDataset::from_json(&fs::read_to_string(path)?)
    }

    /// Load a persona into a user's account
    ///
    /// Creates the user when missing. Transactions are deduped by import
    /// hash, so loading twice is harmless.
    pub fn load_into_db(
        &self,
        db: &Database,
        user_id: &str,
        name: &str,
        options: LoadOptions,
    ) -> Result<PersonaLoadReport> {
        let mut dataset = self.load(name)?;
        dataset.filter_by_date(options.from, options.to);

        // Build synthetic rows up front so an oversized window writes nothing
        let mut synthetic = Vec::new();
        if options.synthesize {
            let window = match (options.from, options.to, dataset.date_range()) {
                (Some(f), Some(t), _) => Some((f, t)),
                (f, t, Some((first, last))) => Some((f.unwrap_or(first), t.unwrap_or(last))),
                _ => None,
            };
            if let Some((from, to)) = window {
                synthetic = dataset.synthesize_missing(from, to, self.seed)?;
            }
        }

        let existing = db.get_user(user_id)?;
        db.upsert_user(&NewUser {
            user_id: user_id.to_string(),
            name: existing
                .map(|u| u.name)
                .unwrap_or_else(|| user_id.to_string()),
            email: None,
            persona: Some(dataset.persona.clone()),
            savings_goal: dataset.savings_goal,
        })?;

        let mut report = PersonaLoadReport {
            persona: dataset.persona.clone(),
            ..Default::default()
        };

        for budget in dataset.new_budgets() {
            db.upsert_budget(user_id, &budget)?;
            report.budgets += 1;
        }

        if let Some(salary) = &dataset.salary {
            let already = db.latest_salary(user_id)?.is_some_and(|s| {
                s.effective_date == salary.effective_date
                    && s.frequency == salary.frequency
                    && (s.amount - salary.amount).abs() < 0.005
            });
            if !already {
                db.insert_salary(user_id, salary)?;
                report.salary = true;
            }
        }

        let mut txs = dataset.new_transactions();
        report.synthesized = synthetic.len();
        txs.extend(synthetic);

        let (inserted, duplicates) = db.insert_transactions(user_id, &txs)?;
        report.inserted = inserted;
        report.duplicates = duplicates;

        info!(
            user_id,
            persona = %report.persona,
            inserted,
            duplicates,
            synthesized = report.synthesized,
            "Loaded persona"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const STUDENT: &str = r#"{
        "persona": "student",
        "description": "Part-time barista",
        "savings_goal": 0.1,
        "salary": { "amount": 1400, "frequency": "monthly", "effective_date": "2026-01-01" },
        "budgets": [
            { "category": "Food & Dining", "limit": 250 },
            { "category": "groceries", "limit": 60, "period": "weekly" }
        ],
        "transactions": [
            { "date": "2026-01-02", "amount": 6.5, "merchant": "Blue Bottle", "category": "coffee shops", "hour": 8 },
            { "date": "2026-01-02", "amount": 42.1, "merchant": "Trader Joe's", "category": "Groceries" },
            { "date": "2026-01-05", "amount": 18.0, "merchant": "Uber", "mood": "stressed", "hour": 23 },
            { "date": "2026-01-09", "amount": 12.0, "merchant": "Chipotle", "category": "restaurants" }
        ]
    }"#;

    fn library() -> (TempDir, PersonaLibrary) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("student.json"), STUDENT).unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let lib = PersonaLibrary::new(dir.path(), 7);
        (dir, lib)
    }

    #[test]
    fn test_list_skips_broken_files() {
        let (_dir, lib) = library();
        let personas = lib.list().unwrap();
        assert_eq!(personas.len(), 1);
        assert_eq!(personas[0].name, "student");
        assert_eq!(personas[0].transactions, 4);
        assert_eq!(personas[0].first_date, NaiveDate::from_ymd_opt(2026, 1, 2));
    }

    #[test]
    fn test_load_rejects_bad_names() {
        let (_dir, lib) = library();
        assert!(matches!(lib.load("../etc/passwd"), Err(Error::InvalidData(_))));
        assert!(matches!(lib.load("retiree"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_categories_normalized() {
        let dataset = PersonaDataset::from_json(STUDENT).unwrap();
        let txs = dataset.new_transactions();
        assert_eq!(txs[0].category, Category::Dining);
        assert_eq!(txs[1].category, Category::Groceries);
        // No raw category: merchant rules apply
        assert_eq!(txs[2].category, Category::Transport);
        assert_eq!(txs[2].source, TransactionSource::Persona);

        let budgets = dataset.new_budgets();
        assert_eq!(budgets[0].category, Category::Dining);
        assert_eq!(budgets[1].period, BudgetPeriod::Weekly);
    }

    #[test]
    fn test_filter_by_date() {
        let mut dataset = PersonaDataset::from_json(STUDENT).unwrap();
        dataset.filter_by_date(NaiveDate::from_ymd_opt(2026, 1, 3), None);
        assert_eq!(dataset.transactions.len(), 2);
        dataset.filter_by_date(None, NaiveDate::from_ymd_opt(2026, 1, 5));
        assert_eq!(dataset.transactions.len(), 1);
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let dataset = PersonaDataset::from_json(STUDENT).unwrap();
        let from = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();

        let a = dataset.synthesize_missing(from, to, 42).unwrap();
        let b = dataset.synthesize_missing(from, to, 42).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!((x.date, x.amount, &x.merchant), (y.date, y.amount, &y.merchant));
        }

        // 7 empty days in the window, 1-3 rows each
        assert!(a.len() >= 7 && a.len() <= 21);
        assert!(a.iter().all(|t| t.source == TransactionSource::Synthetic));
        let busy = [2, 5, 9];
        assert!(a.iter().all(|t| !busy.contains(&chrono::Datelike::day(&t.date))));
    }

    #[test]
    fn test_synthesis_window_is_capped() {
        let dataset = PersonaDataset::from_json(STUDENT).unwrap();
        let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        let year = dataset
            .synthesize_missing(from, from + Duration::days(MAX_SYNTHESIS_DAYS - 1), 7)
            .unwrap();
        assert!(!year.is_empty());

        let err = dataset
            .synthesize_missing(from, from + Duration::days(MAX_SYNTHESIS_DAYS), 7)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));

        let ancient = NaiveDate::from_ymd_opt(1000, 1, 1).unwrap();
        assert!(dataset
            .synthesize_missing(ancient, NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(), 7)
            .is_err());
    }

    #[test]
    fn test_oversized_synthesis_writes_nothing() {
        let (_dir, lib) = library();
        let db = Database::in_memory().unwrap();
        let options = LoadOptions {
            from: NaiveDate::from_ymd_opt(2020, 1, 1),
            to: NaiveDate::from_ymd_opt(2026, 12, 31),
            synthesize: true,
        };

        let err = lib.load_into_db(&db, "sam", "student", options).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
        assert!(db.get_user("sam").unwrap().is_none());
        assert_eq!(db.count_transactions("sam").unwrap(), 0);
    }

    #[test]
    fn test_load_into_db_is_idempotent() {
        let (_dir, lib) = library();
        let db = Database::in_memory().unwrap();

        let first = lib
            .load_into_db(&db, "sam", "student", LoadOptions::default())
            .unwrap();
        assert_eq!(first.inserted, 4);
        assert_eq!(first.budgets, 2);
        assert!(first.salary);

        let again = lib
            .load_into_db(&db, "sam", "student", LoadOptions::default())
            .unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.duplicates, 4);
        assert!(!again.salary);

        let user = db.get_user("sam").unwrap().unwrap();
        assert_eq!(user.persona.as_deref(), Some("student"));
        assert_eq!(user.savings_goal, Some(0.1));
        assert_eq!(db.count_transactions("sam").unwrap(), 4);
    }

    #[test]
    fn test_load_with_synthesis() {
        let (_dir, lib) = library();
        let db = Database::in_memory().unwrap();
        let report = lib
            .load_into_db(
                &db,
                "sam",
                "student",
                LoadOptions {
                    from: NaiveDate::from_ymd_opt(2026, 1, 1),
                    to: NaiveDate::from_ymd_opt(2026, 1, 14),
                    synthesize: true,
                },
            )
            .unwrap();
        assert!(report.synthesized >= 11);
        assert_eq!(report.inserted + report.duplicates, 4 + report.synthesized);
    }
}
