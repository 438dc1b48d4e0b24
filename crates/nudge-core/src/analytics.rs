//! Spending analytics
//!
//! Pure functions over transaction slices. Callers pick the window; nothing
//! here touches the database.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::insights::predictive::{daily_totals, days_in_month, month_start};
use crate::models::{Category, Mood, Transaction};

/// Hours counted as late night: 22:00 - 04:59
pub fn is_late_night(hour: u8) -> bool {
    hour >= 22 || hour < 5
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpend {
    pub category: Category,
    pub total: f64,
    pub count: usize,
    /// Fraction of all spend
    pub share: f64,
}

/// Spend per category, largest first
pub fn spending_by_category(txs: &[Transaction]) -> Vec<CategorySpend> {
    let mut totals: BTreeMap<Category, (f64, usize)> = BTreeMap::new();
    for tx in txs.iter().filter(|t| t.spend() > 0.0) {
        let entry = totals.entry(tx.category).or_insert((0.0, 0));
        entry.0 += tx.spend();
        entry.1 += 1;
    }

    let grand_total: f64 = totals.values().map(|(t, _)| t).sum();
    let mut result: Vec<CategorySpend> = totals
        .into_iter()
        .map(|(category, (total, count))| CategorySpend {
            category,
            total: round2(total),
            count,
            share: if grand_total > 0.0 {
                total / grand_total
            } else {
                0.0
            },
        })
        .collect();

    result.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.category.cmp(&b.category))
    });
    result
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekdaySpend {
    pub weekday: Weekday,
    pub total: f64,
    /// Occurrences of this weekday in the window
    pub days: usize,
    /// Average spend per occurrence
    pub daily_average: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayOfWeekPattern {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub by_weekday: Vec<WeekdaySpend>,
    pub weekday_daily_average: f64,
    pub weekend_daily_average: f64,
    /// Weekend over weekday daily average; `None` without weekday spend
    pub weekend_ratio: Option<f64>,
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

/// Spend per weekday over an inclusive window
pub fn day_of_week_pattern(txs: &[Transaction], from: NaiveDate, to: NaiveDate) -> DayOfWeekPattern {
    let mut sums: BTreeMap<u32, (Weekday, f64, usize)> = BTreeMap::new();
    let (mut weekday_total, mut weekday_days) = (0.0, 0usize);
    let (mut weekend_total, mut weekend_days) = (0.0, 0usize);

    for (day, total) in daily_totals(txs, from, to) {
        let wd = day.weekday();
        let entry = sums
            .entry(wd.num_days_from_monday())
            .or_insert((wd, 0.0, 0));
        entry.1 += total;
        entry.2 += 1;

        if is_weekend(wd) {
            weekend_total += total;
            weekend_days += 1;
        } else {
            weekday_total += total;
            weekday_days += 1;
        }
    }

    let avg = |total: f64, days: usize| if days == 0 { 0.0 } else { total / days as f64 };
    let weekday_daily_average = avg(weekday_total, weekday_days);
    let weekend_daily_average = avg(weekend_total, weekend_days);

    DayOfWeekPattern {
        from,
        to,
        by_weekday: sums
            .into_values()
            .map(|(weekday, total, days)| WeekdaySpend {
                weekday,
                total: round2(total),
                days,
                daily_average: round2(avg(total, days)),
            })
            .collect(),
        weekday_daily_average: round2(weekday_daily_average),
        weekend_daily_average: round2(weekend_daily_average),
        weekend_ratio: (weekday_daily_average > 0.0)
            .then(|| weekend_daily_average / weekday_daily_average),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourPattern {
    /// Spend per hour of day (transactions without an hour are skipped)
    pub by_hour: Vec<f64>,
    pub late_night_count: usize,
    pub late_night_total: f64,
}

pub fn hour_pattern(txs: &[Transaction]) -> HourPattern {
    let mut by_hour = vec![0.0; 24];
    let mut late_night_count = 0;
    let mut late_night_total = 0.0;

    for tx in txs.iter().filter(|t| t.spend() > 0.0) {
        let Some(hour) = tx.hour.filter(|h| *h < 24) else {
            continue;
        };
        by_hour[hour as usize] += tx.spend();
        if is_late_night(hour) {
            late_night_count += 1;
            late_night_total += tx.spend();
        }
    }

    HourPattern {
        by_hour: by_hour.into_iter().map(round2).collect(),
        late_night_count,
        late_night_total: round2(late_night_total),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthTrend {
    /// `YYYY-MM`
    pub month: String,
    pub total: f64,
    pub transaction_count: usize,
    /// Percent change from the previous month, when it had spend
    pub change_pct: Option<f64>,
}

/// Monthly totals for the `months` months ending with the month of `as_of`
pub fn monthly_trends(txs: &[Transaction], months: u32, as_of: NaiveDate) -> Vec<MonthTrend> {
    let mut starts = Vec::new();
    let mut cursor = month_start(as_of);
    for _ in 0..months.max(1) {
        starts.push(cursor);
        cursor = month_start(cursor - Duration::days(1));
    }
    starts.reverse();

    let mut trends: Vec<MonthTrend> = Vec::with_capacity(starts.len());
    for start in starts {
        let end = start + Duration::days(days_in_month(start) as i64 - 1);
        let in_month: Vec<&Transaction> = txs
            .iter()
            .filter(|t| t.date >= start && t.date <= end && t.spend() > 0.0)
            .collect();
        let total: f64 = in_month.iter().map(|t| t.spend()).sum();

        let change_pct = trends
            .last()
            .filter(|prev| prev.total > 0.0)
            .map(|prev| round2((total - prev.total) / prev.total * 100.0));

        trends.push(MonthTrend {
            month: start.format("%Y-%m").to_string(),
            total: round2(total),
            transaction_count: in_month.len(),
            change_pct,
        });
    }
    trends
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthScore {
    /// 0 - 100
    pub score: u8,
    pub grade: String,
    pub label: String,
    /// Out of 40
    pub savings_component: f64,
    /// Out of 35
    pub budget_component: f64,
    /// Out of 25
    pub volatility_component: f64,
    pub savings_rate: Option<f64>,
}

/// Heuristic financial health score
///
/// - savings (40): average monthly savings rate over the last three months,
///   full marks at 20% or more; half marks without income data
/// - budget adherence (35): month-to-date spend against prorated limits;
///   half marks without budgets
/// - volatility (25): coefficient of variation of the last eight weekly
///   totals; full marks without spend
pub fn health_score(
    txs: &[Transaction],
    budgets: &BTreeMap<Category, f64>,
    monthly_income: Option<f64>,
    as_of: NaiveDate,
) -> HealthScore {
    // Savings
    let window_start = as_of - Duration::days(89);
    let spent_90: f64 = txs
        .iter()
        .filter(|t| t.date >= window_start && t.date <= as_of)
        .map(|t| t.spend())
        .sum();
    let monthly_spend = spent_90 / 3.0;
    let savings_rate = monthly_income
        .filter(|i| *i > 0.0)
        .map(|income| (income - monthly_spend) / income);
    let savings_component = match savings_rate {
        Some(rate) => 40.0 * (rate / 0.2).clamp(0.0, 1.0),
        None => 20.0,
    };

    // Budget adherence
    let start = month_start(as_of);
    let elapsed = as_of.day() as f64 / days_in_month(as_of) as f64;
    let adherence: Vec<f64> = budgets
        .iter()
        .filter(|(cat, limit)| **limit > 0.0 && **cat != Category::Income)
        .map(|(cat, limit)| {
            let spent: f64 = txs
                .iter()
                .filter(|t| t.category == *cat && t.date >= start && t.date <= as_of)
                .map(|t| t.spend())
                .sum();
            let usage = spent / (limit * elapsed);
            if usage <= 1.0 {
                1.0
            } else {
                (2.0 - usage).max(0.0)
            }
        })
        .collect();
    let budget_component = if adherence.is_empty() {
        17.5
    } else {
        35.0 * adherence.iter().sum::<f64>() / adherence.len() as f64
    };

    // Volatility
    let weekly: Vec<f64> = (0..8)
        .map(|w| {
            let end = as_of - Duration::days(w * 7);
            let begin = end - Duration::days(6);
            txs.iter()
                .filter(|t| t.date >= begin && t.date <= end)
                .map(|t| t.spend())
                .sum::<f64>()
        })
        .collect();
    let mean = weekly.iter().sum::<f64>() / weekly.len() as f64;
    let volatility_component = if mean <= 0.0 {
        25.0
    } else {
        let variance = weekly.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / weekly.len() as f64;
        let cv = variance.sqrt() / mean;
        25.0 * (1.0 - cv.min(1.0))
    };

    let total = savings_component + budget_component + volatility_component;
    let score = total.round().clamp(0.0, 100.0) as u8;
    let (grade, label) = match score {
        80..=100 => ("A", "Excellent"),
        65..=79 => ("B", "Good"),
        50..=64 => ("C", "Fair"),
        35..=49 => ("D", "Needs attention"),
        _ => ("F", "At risk"),
    };

    HealthScore {
        score,
        grade: grade.to_string(),
        label: label.to_string(),
        savings_component: round2(savings_component),
        budget_component: round2(budget_component),
        volatility_component: round2(volatility_component),
        savings_rate: savings_rate.map(round2),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodSpend {
    pub mood: Mood,
    pub count: usize,
    pub total: f64,
    /// Average spend per transaction
    pub average: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekdayAverage {
    pub weekday: Weekday,
    pub count: usize,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodCorrelation {
    /// Average spend per transaction across all moods
    pub overall_average: f64,
    pub by_mood: Vec<MoodSpend>,
    pub by_weekday: Vec<WeekdayAverage>,
    /// Mood whose average is at least `trigger_ratio` times the overall one
    pub trigger: Option<Mood>,
    pub trigger_ratio: Option<f64>,
}

impl MoodCorrelation {
    pub fn mood(&self, mood: Mood) -> Option<&MoodSpend> {
        self.by_mood.iter().find(|m| m.mood == mood)
    }
}

/// Average spend per mood and per weekday
pub fn mood_correlation(txs: &[Transaction], trigger_ratio: f64) -> MoodCorrelation {
    let spends: Vec<&Transaction> = txs.iter().filter(|t| t.spend() > 0.0).collect();
    let overall_average = if spends.is_empty() {
        0.0
    } else {
        spends.iter().map(|t| t.spend()).sum::<f64>() / spends.len() as f64
    };

    let mut moods: BTreeMap<Mood, (f64, usize)> = BTreeMap::new();
    let mut weekdays: HashMap<Weekday, (f64, usize)> = HashMap::new();
    for tx in &spends {
        if let Some(mood) = tx.mood {
            let e = moods.entry(mood).or_insert((0.0, 0));
            e.0 += tx.spend();
            e.1 += 1;
        }
        let e = weekdays.entry(tx.date.weekday()).or_insert((0.0, 0));
        e.0 += tx.spend();
        e.1 += 1;
    }

    let by_mood: Vec<MoodSpend> = moods
        .into_iter()
        .map(|(mood, (total, count))| MoodSpend {
            mood,
            count,
            total: round2(total),
            average: round2(total / count as f64),
        })
        .collect();

    let mut by_weekday: Vec<WeekdayAverage> = weekdays
        .into_iter()
        .map(|(weekday, (total, count))| WeekdayAverage {
            weekday,
            count,
            average: round2(total / count as f64),
        })
        .collect();
    by_weekday.sort_by_key(|w| w.weekday.num_days_from_monday());

    let top = by_mood.iter().max_by(|a, b| {
        a.average
            .partial_cmp(&b.average)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.mood.cmp(&a.mood))
    });
    let (trigger, ratio) = match top {
        Some(m) if overall_average > 0.0 && m.average >= trigger_ratio * overall_average => {
            (Some(m.mood), Some(round2(m.average / overall_average)))
        }
        _ => (None, None),
    };

    MoodCorrelation {
        overall_average: round2(overall_average),
        by_mood,
        by_weekday,
        trigger,
        trigger_ratio: ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionSource;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(d: NaiveDate, amount: f64, category: Category) -> Transaction {
        Transaction {
            id: 0,
            user_id: "u".into(),
            date: d,
            amount,
            merchant: "m".into(),
            category,
            raw_category: None,
            mood: None,
            hour: None,
            source: TransactionSource::Manual,
            import_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_spending_by_category() {
        let txs = vec![
            tx(date(2026, 3, 1), 30.0, Category::Dining),
            tx(date(2026, 3, 2), 70.0, Category::Groceries),
            tx(date(2026, 3, 3), 2000.0, Category::Income),
            tx(date(2026, 3, 4), -10.0, Category::Dining),
        ];
        let result = spending_by_category(&txs);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].category, Category::Groceries);
        assert!((result[0].share - 0.7).abs() < 1e-9);
        assert_eq!(result[1].count, 1);
    }

    #[test]
    fn test_day_of_week_pattern_weekend_ratio() {
        // March 2026: the 7th and 8th are a weekend
        let txs = vec![
            tx(date(2026, 3, 2), 10.0, Category::Dining),
            tx(date(2026, 3, 3), 10.0, Category::Dining),
            tx(date(2026, 3, 4), 10.0, Category::Dining),
            tx(date(2026, 3, 5), 10.0, Category::Dining),
            tx(date(2026, 3, 6), 10.0, Category::Dining),
            tx(date(2026, 3, 7), 40.0, Category::Dining),
            tx(date(2026, 3, 8), 20.0, Category::Dining),
        ];
        let p = day_of_week_pattern(&txs, date(2026, 3, 2), date(2026, 3, 8));
        assert_eq!(p.by_weekday.len(), 7);
        assert_eq!(p.by_weekday[0].weekday, Weekday::Mon);
        assert_eq!(p.weekday_daily_average, 10.0);
        assert_eq!(p.weekend_daily_average, 30.0);
        assert_eq!(p.weekend_ratio, Some(3.0));
    }

    #[test]
    fn test_hour_pattern_counts_late_night() {
        let mut a = tx(date(2026, 3, 1), 20.0, Category::Shopping);
        a.hour = Some(23);
        let mut b = tx(date(2026, 3, 2), 15.0, Category::Dining);
        b.hour = Some(2);
        let mut c = tx(date(2026, 3, 2), 15.0, Category::Dining);
        c.hour = Some(12);
        let p = hour_pattern(&[a, b, c, tx(date(2026, 3, 3), 9.0, Category::Other)]);
        assert_eq!(p.late_night_count, 2);
        assert_eq!(p.late_night_total, 35.0);
        assert_eq!(p.by_hour[12], 15.0);
    }

    #[test]
    fn test_monthly_trends() {
        let txs = vec![
            tx(date(2026, 1, 10), 100.0, Category::Dining),
            tx(date(2026, 2, 10), 150.0, Category::Dining),
            tx(date(2026, 3, 10), 75.0, Category::Dining),
        ];
        let trends = monthly_trends(&txs, 3, date(2026, 3, 15));
        let months: Vec<_> = trends.iter().map(|t| t.month.as_str()).collect();
        assert_eq!(months, vec!["2026-01", "2026-02", "2026-03"]);
        assert_eq!(trends[0].change_pct, None);
        assert_eq!(trends[1].change_pct, Some(50.0));
        assert_eq!(trends[2].change_pct, Some(-50.0));
    }

    #[test]
    fn test_health_score_bounds_and_grades() {
        let as_of = date(2026, 3, 28);
        // Steady 100/week, well within income and budget
        let steady: Vec<_> = (0..8)
            .map(|w| tx(as_of - Duration::days(w * 7), 100.0, Category::Groceries))
            .collect();
        let mut budgets = BTreeMap::new();
        budgets.insert(Category::Groceries, 600.0);

        let good = health_score(&steady, &budgets, Some(3000.0), as_of);
        assert_eq!(good.score, 100);
        assert_eq!(good.grade, "A");

        // No data at all lands in the middle
        let empty = health_score(&[], &BTreeMap::new(), None, as_of);
        assert_eq!(empty.score, 63);
        assert_eq!(empty.grade, "C");

        // Spending more than income zeroes the savings component
        let broke = health_score(&steady, &budgets, Some(100.0), as_of);
        assert_eq!(broke.savings_component, 0.0);
        assert!(broke.score < good.score);
    }

    #[test]
    fn test_mood_correlation_trigger() {
        let mut txs = Vec::new();
        for _ in 0..4 {
            let mut t = tx(date(2026, 3, 2), 20.0, Category::Dining);
            t.mood = Some(Mood::Happy);
            txs.push(t);
        }
        for _ in 0..2 {
            let mut t = tx(date(2026, 3, 3), 80.0, Category::Shopping);
            t.mood = Some(Mood::Stressed);
            txs.push(t);
        }
        let c = mood_correlation(&txs, 1.25);
        assert_eq!(c.trigger, Some(Mood::Stressed));
        assert_eq!(c.mood(Mood::Stressed).unwrap().average, 80.0);
        assert_eq!(c.by_weekday.len(), 2);

        // Even spending has no trigger
        let even: Vec<_> = txs
            .iter()
            .cloned()
            .map(|mut t| {
                t.amount = 10.0;
                t
            })
            .collect();
        assert_eq!(mood_correlation(&even, 1.25).trigger, None);
    }
}
