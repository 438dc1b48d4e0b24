//! Predictive analytics
//!
//! Spend projections built from dense daily series:
//! - month-end projection from the recent daily average plus a linear trend
//! - per-category budget overrun forecasts with the date the limit is crossed
//! - next-week expectation from day-of-week averages

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::{Category, Transaction};

/// Number of days needed before a projection is considered well sampled
const FULL_CONFIDENCE_DAYS: f64 = 14.0;

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Number of days in the month containing `date`
pub fn days_in_month(date: NaiveDate) -> u32 {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .map(|next| (next - month_start(date)).num_days() as u32)
        .unwrap_or(30)
}

/// Spend per day over an inclusive range, zero-filled
pub fn daily_totals(txs: &[Transaction], from: NaiveDate, to: NaiveDate) -> Vec<(NaiveDate, f64)> {
    if to < from {
        return Vec::new();
    }

    let mut by_day: HashMap<NaiveDate, f64> = HashMap::new();
    for tx in txs.iter().filter(|t| t.date >= from && t.date <= to) {
        *by_day.entry(tx.date).or_insert(0.0) += tx.spend();
    }

    from.iter_days()
        .take_while(|d| *d <= to)
        .map(|d| (d, by_day.get(&d).copied().unwrap_or(0.0)))
        .collect()
}

/// Least-squares line over an evenly spaced series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    /// Change per step
    pub slope: f64,
    /// Value at step 0
    pub intercept: f64,
}

pub fn linear_trend(series: &[f64]) -> Trend {
    let n = series.len();
    if n == 0 {
        return Trend {
            slope: 0.0,
            intercept: 0.0,
        };
    }
    let mean_y = series.iter().sum::<f64>() / n as f64;
    if n == 1 {
        return Trend {
            slope: 0.0,
            intercept: mean_y,
        };
    }

    let mean_x = (n - 1) as f64 / 2.0;
    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in series.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    let slope = if den == 0.0 { 0.0 } else { num / den };

    Trend {
        slope,
        intercept: mean_y - slope * mean_x,
    }
}

fn mean_and_cv(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean <= 0.0 {
        return (mean, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    (mean, variance.sqrt() / mean)
}

/// Expected spend for the month containing `as_of`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthEndProjection {
    pub month_start: NaiveDate,
    pub as_of: NaiveDate,
    pub spent_to_date: f64,
    pub daily_average: f64,
    pub trend_slope: f64,
    pub remaining_days: u32,
    pub projected_total: f64,
    /// 0.0 - 1.0; grows with sample size, shrinks with volatility
    pub confidence: f64,
}

/// Project month-end spend
///
/// `spent_to_date + (daily_average + slope * remaining / 2) * remaining`,
/// where the average and slope come from the last `window_days` days. The
/// result never drops below what has already been spent.
pub fn project_month_end(
    txs: &[Transaction],
    as_of: NaiveDate,
    window_days: i64,
) -> MonthEndProjection {
    let start = month_start(as_of);
    let remaining_days = days_in_month(as_of).saturating_sub(as_of.day());

    let spent_to_date: f64 = txs
        .iter()
        .filter(|t| t.date >= start && t.date <= as_of)
        .map(|t| t.spend())
        .sum();

    let window_start = as_of - Duration::days(window_days.max(1) - 1);
    let series: Vec<f64> = daily_totals(txs, window_start, as_of)
        .into_iter()
        .map(|(_, v)| v)
        .collect();

    let (daily_average, cv) = mean_and_cv(&series);
    let trend = linear_trend(&series);
    let remaining = remaining_days as f64;

    let daily_rate = (daily_average + trend.slope * remaining / 2.0).max(0.0);
    let projected_total = (spent_to_date + daily_rate * remaining).max(spent_to_date);

    let active_days = series.iter().filter(|v| **v > 0.0).count() as f64;
    let sample_factor = (active_days / FULL_CONFIDENCE_DAYS).min(1.0);
    let confidence = (sample_factor / (1.0 + cv)).clamp(0.0, 1.0);

    MonthEndProjection {
        month_start: start,
        as_of,
        spent_to_date,
        daily_average,
        trend_slope: trend.slope,
        remaining_days,
        projected_total,
        confidence: (confidence * 100.0).round() / 100.0,
    }
}

/// Projected month-end position of one budget category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetForecast {
    pub category: Category,
    pub monthly_limit: f64,
    pub spent_to_date: f64,
    pub projected_total: f64,
    /// `projected_total - monthly_limit`, zero when under
    pub projected_overrun: f64,
    /// Day the limit is (or was) crossed this month
    pub crossing_date: Option<NaiveDate>,
    pub confidence: f64,
}

impl BudgetForecast {
    pub fn will_overrun(&self) -> bool {
        self.projected_overrun > 0.0
    }
}

/// Forecast every budgeted category against its monthly limit
pub fn forecast_budget_overruns(
    txs: &[Transaction],
    budgets: &BTreeMap<Category, f64>,
    as_of: NaiveDate,
    window_days: i64,
) -> Vec<BudgetForecast> {
    let start = month_start(as_of);

    budgets
        .iter()
        .filter(|(_, limit)| **limit > 0.0)
        .map(|(category, limit)| {
            let category_txs: Vec<Transaction> = txs
                .iter()
                .filter(|t| t.category == *category)
                .cloned()
                .collect();
            let projection = project_month_end(&category_txs, as_of, window_days);

            let crossing_date = if projection.spent_to_date >= *limit {
                // Already over: find the day cumulative spend passed the limit
                let mut running = 0.0;
                daily_totals(&category_txs, start, as_of)
                    .into_iter()
                    .find(|(_, v)| {
                        running += v;
                        running >= *limit
                    })
                    .map(|(d, _)| d)
            } else if projection.remaining_days > 0 {
                let daily =
                    (projection.projected_total - projection.spent_to_date) / projection.remaining_days as f64;
                if daily > 0.0 {
                    let days_needed = ((limit - projection.spent_to_date) / daily).ceil() as i64;
                    (days_needed <= projection.remaining_days as i64)
                        .then(|| as_of + Duration::days(days_needed))
                } else {
                    None
                }
            } else {
                None
            };

            BudgetForecast {
                category: *category,
                monthly_limit: *limit,
                spent_to_date: projection.spent_to_date,
                projected_total: projection.projected_total,
                projected_overrun: (projection.projected_total - limit).max(0.0),
                crossing_date,
                confidence: projection.confidence,
            }
        })
        .collect()
}

/// Expected spend over the 7 days after `as_of`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekPrediction {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub expected_total: f64,
    pub by_day: Vec<(NaiveDate, f64)>,
}

/// Predict next week's spend from day-of-week averages over `lookback_weeks`
pub fn predict_next_week(txs: &[Transaction], as_of: NaiveDate, lookback_weeks: i64) -> WeekPrediction {
    let history_start = as_of - Duration::days(lookback_weeks.max(1) * 7 - 1);
    let history = daily_totals(txs, history_start, as_of);

    let mut sums: HashMap<Weekday, (f64, usize)> = HashMap::new();
    for (day, total) in &history {
        let entry = sums.entry(day.weekday()).or_insert((0.0, 0));
        entry.0 += total;
        entry.1 += 1;
    }

    let by_day: Vec<(NaiveDate, f64)> = (1..=7)
        .map(|offset| {
            let day = as_of + Duration::days(offset);
            let expected = sums
                .get(&day.weekday())
                .filter(|(_, n)| *n > 0)
                .map(|(sum, n)| sum / *n as f64)
                .unwrap_or(0.0);
            (day, expected)
        })
        .collect();

    WeekPrediction {
        from: as_of + Duration::days(1),
        to: as_of + Duration::days(7),
        expected_total: by_day.iter().map(|(_, v)| v).sum(),
        by_day,
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
    fn test_month_helpers() {
        assert_eq!(days_in_month(date(2026, 2, 10)), 28);
        assert_eq!(days_in_month(date(2028, 2, 1)), 29);
        assert_eq!(days_in_month(date(2026, 12, 31)), 31);
        assert_eq!(month_start(date(2026, 3, 17)), date(2026, 3, 1));
    }

    #[test]
    fn test_daily_totals_zero_fill() {
        let txs = vec![
            tx(date(2026, 3, 1), 10.0, Category::Dining),
            tx(date(2026, 3, 1), 5.0, Category::Dining),
            tx(date(2026, 3, 3), 7.0, Category::Dining),
            tx(date(2026, 3, 3), 100.0, Category::Income),
        ];
        let series = daily_totals(&txs, date(2026, 3, 1), date(2026, 3, 4));
        let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![15.0, 0.0, 7.0, 0.0]);
        assert!(daily_totals(&txs, date(2026, 3, 4), date(2026, 3, 1)).is_empty());
    }

    #[test]
    fn test_linear_trend() {
        let t = linear_trend(&[1.0, 3.0, 5.0, 7.0]);
        assert!((t.slope - 2.0).abs() < 1e-9);
        assert!((t.intercept - 1.0).abs() < 1e-9);

        let flat = linear_trend(&[4.0]);
        assert_eq!(flat.slope, 0.0);
        assert_eq!(flat.intercept, 4.0);
    }

    #[test]
    fn test_project_month_end_flat_spend() {
        // 10/day from March 1 to March 10
        let txs: Vec<_> = (1..=10)
            .map(|d| tx(date(2026, 3, d), 10.0, Category::Groceries))
            .collect();
        let p = project_month_end(&txs, date(2026, 3, 10), 10);
        assert_eq!(p.spent_to_date, 100.0);
        assert_eq!(p.remaining_days, 21);
        assert!((p.projected_total - 310.0).abs() < 1e-6);
        // Perfectly regular but under two weeks of samples
        assert!(p.confidence > 0.6 && p.confidence < 0.8);
    }

    #[test]
    fn test_project_month_end_never_below_spent() {
        // Spending fell off a cliff: negative trend must not reduce the total
        let mut txs: Vec<_> = (1..=5)
            .map(|d| tx(date(2026, 3, d), 100.0, Category::Shopping))
            .collect();
        txs.push(tx(date(2026, 3, 6), 0.5, Category::Shopping));
        let p = project_month_end(&txs, date(2026, 3, 14), 14);
        assert!(p.projected_total >= p.spent_to_date);
    }

    #[test]
    fn test_forecast_budget_overruns() {
        let txs: Vec<_> = (1..=10)
            .map(|d| tx(date(2026, 3, d), 20.0, Category::Dining))
            .collect();
        let mut budgets = BTreeMap::new();
        budgets.insert(Category::Dining, 300.0);
        budgets.insert(Category::Travel, 500.0);

        let forecasts = forecast_budget_overruns(&txs, &budgets, date(2026, 3, 10), 10);
        let dining = forecasts.iter().find(|f| f.category == Category::Dining).unwrap();
        assert!(dining.will_overrun());
        assert!((dining.projected_overrun - 320.0).abs() < 1e-6);
        // 200 spent, 20/day: 300 reached 5 days later
        assert_eq!(dining.crossing_date, Some(date(2026, 3, 15)));

        let travel = forecasts.iter().find(|f| f.category == Category::Travel).unwrap();
        assert!(!travel.will_overrun());
        assert_eq!(travel.crossing_date, None);
    }

    #[test]
    fn test_forecast_reports_past_crossing() {
        let txs = vec![
            tx(date(2026, 3, 2), 60.0, Category::Entertainment),
            tx(date(2026, 3, 4), 60.0, Category::Entertainment),
        ];
        let mut budgets = BTreeMap::new();
        budgets.insert(Category::Entertainment, 100.0);
        let forecasts = forecast_budget_overruns(&txs, &budgets, date(2026, 3, 8), 14);
        assert_eq!(forecasts[0].crossing_date, Some(date(2026, 3, 4)));
    }

    #[test]
    fn test_predict_next_week_uses_weekday_averages() {
        // Spend 30 every Saturday for four weeks; March 7 2026 is a Saturday
        let txs: Vec<_> = [7, 14, 21, 28]
            .iter()
            .map(|d| tx(date(2026, 3, *d), 30.0, Category::Entertainment))
            .collect();
        let p = predict_next_week(&txs, date(2026, 3, 31), 4);
        assert_eq!(p.from, date(2026, 4, 1));
        assert_eq!(p.to, date(2026, 4, 7));
        assert!((p.expected_total - 30.0).abs() < 1e-9);
        let saturday = p.by_day.iter().find(|(d, _)| *d == date(2026, 4, 4)).unwrap();
        assert_eq!(saturday.1, 30.0);
    }
}
