//! Budget operations

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{Budget, Category, NewBudget};

impl Database {
    /// Create or replace the budget for a user's category
    pub fn upsert_budget(&self, user_id: &str, budget: &NewBudget) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO budgets (user_id, category, limit_amount, period)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, category) DO UPDATE SET
                limit_amount = excluded.limit_amount,
                period = excluded.period
            "#,
            params![
                user_id,
                budget.category.as_str(),
                budget.limit,
                budget.period.as_str()
            ],
        )?;

        let id = conn.query_row(
            "SELECT id FROM budgets WHERE user_id = ? AND category = ?",
            params![user_id, budget.category.as_str()],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// List a user's budgets
    pub fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, category, limit_amount, period, created_at
            FROM budgets
            WHERE user_id = ?
            ORDER BY category
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            let category: String = row.get(2)?;
            let period: String = row.get(4)?;
            let created_at: String = row.get(5)?;
            Ok(Budget {
                id: row.get(0)?,
                user_id: row.get(1)?,
                category: category.parse().unwrap_or(Category::Other),
                limit: row.get(3)?,
                period: period.parse().unwrap_or_default(),
                created_at: parse_datetime(&created_at),
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Delete a budget by id
    pub fn delete_budget(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM budgets WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BudgetPeriod;

    #[test]
    fn test_upsert_budget_replaces_limit() {
        let db = Database::in_memory().unwrap();

        let id1 = db
            .upsert_budget(
                "a",
                &NewBudget {
                    category: Category::Dining,
                    limit: 200.0,
                    period: BudgetPeriod::Monthly,
                },
            )
            .unwrap();
        let id2 = db
            .upsert_budget(
                "a",
                &NewBudget {
                    category: Category::Dining,
                    limit: 60.0,
                    period: BudgetPeriod::Weekly,
                },
            )
            .unwrap();
        assert_eq!(id1, id2);

        let budgets = db.list_budgets("a").unwrap();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].limit, 60.0);
        assert_eq!(budgets[0].period, BudgetPeriod::Weekly);

        assert!(db.delete_budget(id1).unwrap());
        assert!(db.list_budgets("a").unwrap().is_empty());
    }
}
