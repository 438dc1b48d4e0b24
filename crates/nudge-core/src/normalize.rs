//! Budget and category normalization
//!
//! Transactions arrive from persona datasets, CSV exports and the API with
//! free-form category strings. Everything downstream (analytics, rules,
//! budgets) works on the canonical [`Category`] set, and on monthly amounts.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::{Budget, BudgetPeriod, Category, PayFrequency, Salary};

/// Average number of days in a month, used to prorate monthly limits
const DAYS_PER_MONTH: f64 = 365.25 / 12.0;

/// Alias table for raw category strings (already lowercased, alnum only)
const CATEGORY_ALIASES: &[(&str, Category)] = &[
    ("groceries", Category::Groceries),
    ("grocery", Category::Groceries),
    ("supermarket", Category::Groceries),
    ("supermarkets", Category::Groceries),
    ("food", Category::Groceries),
    ("dining", Category::Dining),
    ("fooddining", Category::Dining),
    ("restaurant", Category::Dining),
    ("restaurants", Category::Dining),
    ("coffee", Category::Dining),
    ("coffeeshops", Category::Dining),
    ("fastfood", Category::Dining),
    ("takeout", Category::Dining),
    ("delivery", Category::Dining),
    ("transport", Category::Transport),
    ("transportation", Category::Transport),
    ("gas", Category::Transport),
    ("fuel", Category::Transport),
    ("autotransport", Category::Transport),
    ("rideshare", Category::Transport),
    ("taxi", Category::Transport),
    ("parking", Category::Transport),
    ("publictransit", Category::Transport),
    ("shopping", Category::Shopping),
    ("clothing", Category::Shopping),
    ("electronics", Category::Shopping),
    ("retail", Category::Shopping),
    ("merchandise", Category::Shopping),
    ("entertainment", Category::Entertainment),
    ("movies", Category::Entertainment),
    ("games", Category::Entertainment),
    ("gaming", Category::Entertainment),
    ("music", Category::Entertainment),
    ("nightlife", Category::Entertainment),
    ("utilities", Category::Utilities),
    ("bills", Category::Utilities),
    ("billsutilities", Category::Utilities),
    ("phone", Category::Utilities),
    ("internet", Category::Utilities),
    ("electricity", Category::Utilities),
    ("housing", Category::Housing),
    ("rent", Category::Housing),
    ("mortgage", Category::Housing),
    ("home", Category::Housing),
    ("health", Category::Health),
    ("healthcare", Category::Health),
    ("medical", Category::Health),
    ("pharmacy", Category::Health),
    ("fitness", Category::Health),
    ("gym", Category::Health),
    ("subscriptions", Category::Subscriptions),
    ("subscription", Category::Subscriptions),
    ("streaming", Category::Subscriptions),
    ("travel", Category::Travel),
    ("hotel", Category::Travel),
    ("hotels", Category::Travel),
    ("flights", Category::Travel),
    ("airfare", Category::Travel),
    ("education", Category::Education),
    ("tuition", Category::Education),
    ("books", Category::Education),
    ("income", Category::Income),
    ("salary", Category::Income),
    ("paycheck", Category::Income),
    ("payroll", Category::Income),
    ("other", Category::Other),
    ("misc", Category::Other),
    ("miscellaneous", Category::Other),
    ("uncategorized", Category::Other),
];

/// Merchant keyword rules, checked in order
const MERCHANT_RULES: &[(&str, Category)] = &[
    (r"(?i)\b(netflix|spotify|hulu|disney\+?|youtube premium|icloud|prime video)\b", Category::Subscriptions),
    (r"(?i)\b(uber eats|doordash|grubhub|deliveroo)\b", Category::Dining),
    (r"(?i)\b(uber|lyft|shell|chevron|exxon|bp|metro|transit)\b", Category::Transport),
    (r"(?i)\b(whole foods|trader joe'?s|kroger|safeway|aldi|walmart grocery|costco)\b", Category::Groceries),
    (r"(?i)\b(starbucks|cafe|coffee|pizza|burger|restaurant|grill|bistro|mcdonald'?s)\b", Category::Dining),
    (r"(?i)\b(amazon|target|best buy|ikea|zara|h&m|mall)\b", Category::Shopping),
    (r"(?i)\b(cinema|theat(er|re)|steam|playstation|xbox|concert|ticketmaster)\b", Category::Entertainment),
    (r"(?i)\b(electric|water|comcast|verizon|at&t|t-mobile|utility)\b", Category::Utilities),
    (r"(?i)\b(rent|landlord|mortgage|property)\b", Category::Housing),
    (r"(?i)\b(pharmacy|cvs|walgreens|clinic|dental|gym|fitness)\b", Category::Health),
    (r"(?i)\b(airbnb|hotel|airlines?|expedia|booking\.com)\b", Category::Travel),
    (r"(?i)\b(udemy|coursera|tuition|bookstore)\b", Category::Education),
    (r"(?i)\b(payroll|salary|direct dep(osit)?)\b", Category::Income),
];

fn merchant_rules() -> &'static [(Regex, Category)] {
    static RULES: OnceLock<Vec<(Regex, Category)>> = OnceLock::new();
    RULES.get_or_init(|| {
        MERCHANT_RULES
            .iter()
            .filter_map(|(pattern, cat)| match Regex::new(pattern) {
                Ok(re) => Some((re, *cat)),
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "Skipping invalid merchant rule");
                    None
                }
            })
            .collect()
    })
}

/// Map a free-form category string onto a canonical category
///
/// Matching ignores case, whitespace and punctuation, so "Food & Dining",
/// "food_dining" and "FOOD-DINING" all land on [`Category::Dining`].
pub fn normalize_category(raw: &str) -> Category {
    let key: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if key.is_empty() {
        return Category::Other;
    }

    CATEGORY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, cat)| *cat)
        .unwrap_or(Category::Other)
}

/// Guess a category from the merchant name
pub fn categorize_merchant(merchant: &str) -> Category {
    merchant_rules()
        .iter()
        .find(|(re, _)| re.is_match(merchant))
        .map(|(_, cat)| *cat)
        .unwrap_or(Category::Other)
}

/// Resolve the canonical category for a transaction
///
/// The raw category wins when it maps to something specific; otherwise the
/// merchant keyword rules get a chance.
pub fn resolve_category(raw_category: Option<&str>, merchant: &str) -> Category {
    match raw_category.map(normalize_category) {
        Some(cat) if cat != Category::Other => cat,
        _ => categorize_merchant(merchant),
    }
}

/// Convert a budget limit to its monthly equivalent
pub fn monthly_limit(budget: &Budget) -> f64 {
    monthly_amount(budget.limit, budget.period)
}

fn monthly_amount(limit: f64, period: BudgetPeriod) -> f64 {
    match period {
        BudgetPeriod::Weekly => limit * 52.0 / 12.0,
        BudgetPeriod::Monthly => limit,
        BudgetPeriod::Yearly => limit / 12.0,
    }
}

/// Monthly limit scaled to an inclusive date window
pub fn prorated_limit(budget: &Budget, from: NaiveDate, to: NaiveDate) -> f64 {
    let days = ((to - from).num_days() + 1).max(0) as f64;
    monthly_limit(budget) * days / DAYS_PER_MONTH
}

/// Convert a salary record to monthly income
pub fn monthly_income(salary: &Salary) -> f64 {
    match salary.frequency {
        PayFrequency::Weekly => salary.amount * 52.0 / 12.0,
        PayFrequency::Biweekly => salary.amount * 26.0 / 12.0,
        PayFrequency::Monthly => salary.amount,
        PayFrequency::Yearly => salary.amount / 12.0,
    }
}

/// Merge budgets into one monthly limit per canonical category
///
/// Users can end up with several budgets for what is the same category after
/// normalization (e.g. a weekly "coffee" budget and a monthly "dining" one).
/// Limits are summed after conversion to monthly amounts.
pub fn normalize_budgets(budgets: &[Budget]) -> BTreeMap<Category, f64> {
    let mut merged = BTreeMap::new();
    for budget in budgets {
        if budget.limit <= 0.0 {
            continue;
        }
        *merged.entry(budget.category).or_insert(0.0) += monthly_limit(budget);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn budget(category: Category, limit: f64, period: BudgetPeriod) -> Budget {
        Budget {
            id: 0,
            user_id: "u".into(),
            category,
            limit,
            period,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_normalize_category_aliases() {
        assert_eq!(normalize_category("Food & Dining"), Category::Dining);
        assert_eq!(normalize_category("  GROCERIES "), Category::Groceries);
        assert_eq!(normalize_category("Auto & Transport"), Category::Transport);
        assert_eq!(normalize_category("bills_utilities"), Category::Utilities);
        assert_eq!(normalize_category("something odd"), Category::Other);
        assert_eq!(normalize_category(""), Category::Other);
    }

    #[test]
    fn test_categorize_merchant() {
        assert_eq!(categorize_merchant("NETFLIX.COM"), Category::Subscriptions);
        assert_eq!(categorize_merchant("Uber Eats 1234"), Category::Dining);
        assert_eq!(categorize_merchant("UBER TRIP"), Category::Transport);
        assert_eq!(categorize_merchant("Whole Foods Market"), Category::Groceries);
        assert_eq!(categorize_merchant("Unknown Vendor"), Category::Other);
    }

    #[test]
    fn test_resolve_category_prefers_specific_raw() {
        assert_eq!(resolve_category(Some("Travel"), "Starbucks"), Category::Travel);
        assert_eq!(resolve_category(Some("misc"), "Starbucks"), Category::Dining);
        assert_eq!(resolve_category(None, "Shell Oil"), Category::Transport);
    }

    #[test]
    fn test_monthly_conversions() {
        assert!((monthly_limit(&budget(Category::Dining, 120.0, BudgetPeriod::Weekly)) - 520.0).abs() < 1e-9);
        assert_eq!(monthly_limit(&budget(Category::Travel, 1200.0, BudgetPeriod::Yearly)), 100.0);

        let salary = Salary {
            id: 0,
            user_id: "u".into(),
            amount: 2000.0,
            frequency: PayFrequency::Biweekly,
            effective_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            created_at: Utc::now(),
        };
        assert!((monthly_income(&salary) - 4333.333).abs() < 0.01);
    }

    #[test]
    fn test_prorated_limit() {
        let b = budget(Category::Groceries, 600.0, BudgetPeriod::Monthly);
        let from = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let prorated = prorated_limit(&b, from, to);
        assert!(prorated > 195.0 && prorated < 200.0);
        assert_eq!(prorated_limit(&b, to, from), 0.0);
    }

    #[test]
    fn test_normalize_budgets_merges_and_skips_zero() {
        let merged = normalize_budgets(&[
            budget(Category::Dining, 50.0, BudgetPeriod::Weekly),
            budget(Category::Dining, 100.0, BudgetPeriod::Monthly),
            budget(Category::Travel, 0.0, BudgetPeriod::Monthly),
        ]);
        assert_eq!(merged.len(), 1);
        assert!((merged[&Category::Dining] - (50.0 * 52.0 / 12.0 + 100.0)).abs() < 1e-9);
    }
}
