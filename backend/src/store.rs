use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{
    Category, CategoryPatch, ExpenseFilter, ExpensePatch, ExpenseRecord, ExpenseRow, MonthRange,
    NewCategory, NewExpense,
};

pub type StoreResult<T> = Result<T, sqlx::Error>;

/// Persistence of expenses and categories. Ownership rules live in the
/// handlers; the store only filters by owner where a query asks for it.
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    async fn list_expenses(
        &self,
        user_id: Uuid,
        filter: &ExpenseFilter,
    ) -> StoreResult<Vec<ExpenseRecord>>;

    /// Caller's expenses of one calendar month, newest first.
    async fn expenses_in_month(
        &self,
        user_id: Uuid,
        range: &MonthRange,
    ) -> StoreResult<Vec<ExpenseRecord>> {
        let filter = ExpenseFilter {
            start: Some(range.start),
            end: Some(range.end),
            category_id: None,
        };
        self.list_expenses(user_id, &filter).await
    }

    async fn find_expense(&self, id: Uuid) -> StoreResult<Option<ExpenseRecord>>;
    async fn create_expense(&self, user_id: Uuid, new: NewExpense) -> StoreResult<ExpenseRecord>;
    async fn update_expense(&self, id: Uuid, patch: ExpensePatch) -> StoreResult<ExpenseRecord>;
    async fn delete_expense(&self, id: Uuid) -> StoreResult<()>;

    /// Default categories plus the caller's own.
    async fn list_categories(&self, user_id: Uuid) -> StoreResult<Vec<Category>>;
    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>>;
    async fn create_category(&self, user_id: Uuid, new: NewCategory) -> StoreResult<Category>;
    async fn update_category(&self, id: Uuid, patch: CategoryPatch) -> StoreResult<Category>;
    async fn delete_category(&self, id: Uuid) -> StoreResult<()>;
    async fn count_category_expenses(&self, id: Uuid) -> StoreResult<i64>;
}

const EXPENSE_SELECT: &str = r#"
    SELECT
        e.id, e.user_id, e.amount, e.description, e.occurred_at,
        c.id AS category_id, c.name AS category_name, c.color AS category_color
    FROM expenses e
    LEFT JOIN categories c ON c.id = e.category_id
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExpenseStore for PgStore {
    async fn list_expenses(
        &self,
        user_id: Uuid,
        filter: &ExpenseFilter,
    ) -> StoreResult<Vec<ExpenseRecord>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(EXPENSE_SELECT);
        qb.push(" WHERE e.user_id = ");
        qb.push_bind(user_id);
        if let Some(start) = filter.start {
            qb.push(" AND e.occurred_at >= ");
            qb.push_bind(start);
        }
        if let Some(end) = filter.end {
            qb.push(" AND e.occurred_at <= ");
            qb.push_bind(end);
        }
        if let Some(category_id) = filter.category_id {
            qb.push(" AND e.category_id = ");
            qb.push_bind(category_id);
        }
        qb.push(" ORDER BY e.occurred_at DESC, e.created_at DESC");

        let rows = qb
            .build_query_as::<ExpenseRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ExpenseRecord::from).collect())
    }

    async fn find_expense(&self, id: Uuid) -> StoreResult<Option<ExpenseRecord>> {
        let row = sqlx::query_as::<_, ExpenseRow>(&format!("{EXPENSE_SELECT} WHERE e.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ExpenseRecord::from))
    }

    async fn create_expense(&self, user_id: Uuid, new: NewExpense) -> StoreResult<ExpenseRecord> {
        let row = sqlx::query_as::<_, ExpenseRow>(
            r#"
            WITH e AS (
                INSERT INTO expenses (user_id, amount, description, category_id, occurred_at)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT
                e.id, e.user_id, e.amount, e.description, e.occurred_at,
                c.id AS category_id, c.name AS category_name, c.color AS category_color
            FROM e
            LEFT JOIN categories c ON c.id = e.category_id
            "#,
        )
        .bind(user_id)
        .bind(new.amount)
        .bind(new.description)
        .bind(new.category_id)
        .bind(new.date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_expense(&self, id: Uuid, patch: ExpensePatch) -> StoreResult<ExpenseRecord> {
        let row = sqlx::query_as::<_, ExpenseRow>(
            r#"
            WITH e AS (
                UPDATE expenses SET
                    amount = COALESCE($2, amount),
                    description = COALESCE($3, description),
                    category_id = COALESCE($4, category_id),
                    occurred_at = COALESCE($5, occurred_at)
                WHERE id = $1
                RETURNING *
            )
            SELECT
                e.id, e.user_id, e.amount, e.description, e.occurred_at,
                c.id AS category_id, c.name AS category_name, c.color AS category_color
            FROM e
            LEFT JOIN categories c ON c.id = e.category_id
            "#,
        )
        .bind(id)
        .bind(patch.amount)
        .bind(patch.description)
        .bind(patch.category_id)
        .bind(patch.date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn delete_expense(&self, id: Uuid) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM expenses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    async fn list_categories(&self, user_id: Uuid) -> StoreResult<Vec<Category>> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, user_id, name, color, icon, is_default
            FROM categories
            WHERE is_default OR user_id = $1
            ORDER BY is_default DESC, name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        sqlx::query_as::<_, Category>(
            "SELECT id, user_id, name, color, icon, is_default FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_category(&self, user_id: Uuid, new: NewCategory) -> StoreResult<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (user_id, name, color, icon, is_default)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING id, user_id, name, color, icon, is_default
            "#,
        )
        .bind(user_id)
        .bind(new.name)
        .bind(new.color)
        .bind(new.icon)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_category(&self, id: Uuid, patch: CategoryPatch) -> StoreResult<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories SET
                name = COALESCE($2, name),
                color = COALESCE($3, color),
                icon = COALESCE($4, icon)
            WHERE id = $1
            RETURNING id, user_id, name, color, icon, is_default
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.color)
        .bind(patch.icon)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    async fn count_category_expenses(&self, id: Uuid) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM expenses WHERE category_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::sync::Mutex;

    /// Vec-backed store for router tests.
    #[derive(Default)]
    pub struct MemoryStore {
        expenses: Mutex<Vec<ExpenseRecord>>,
        categories: Mutex<Vec<Category>>,
    }

    impl MemoryStore {
        pub fn new(categories: Vec<Category>, expenses: Vec<ExpenseRecord>) -> Self {
            Self {
                expenses: Mutex::new(expenses),
                categories: Mutex::new(categories),
            }
        }

        fn tag_of(&self, id: Uuid) -> Option<crate::models::CategoryTag> {
            let categories = self.categories.lock().unwrap();
            categories.iter().find(|c| c.id == id).map(Category::tag)
        }
    }

    #[async_trait]
    impl ExpenseStore for MemoryStore {
        async fn list_expenses(
            &self,
            user_id: Uuid,
            filter: &ExpenseFilter,
        ) -> StoreResult<Vec<ExpenseRecord>> {
            let mut rows: Vec<ExpenseRecord> = self
                .expenses
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.user_id == user_id && filter.matches(e))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.date.cmp(&a.date));
            Ok(rows)
        }

        async fn find_expense(&self, id: Uuid) -> StoreResult<Option<ExpenseRecord>> {
            let expenses = self.expenses.lock().unwrap();
            Ok(expenses.iter().find(|e| e.id == id).cloned())
        }

        async fn create_expense(
            &self,
            user_id: Uuid,
            new: NewExpense,
        ) -> StoreResult<ExpenseRecord> {
            let record = ExpenseRecord {
                id: Uuid::new_v4(),
                user_id,
                amount: new.amount,
                description: new.description,
                date: new.date,
                category: self.tag_of(new.category_id),
            };
            self.expenses.lock().unwrap().push(record.clone());
            Ok(record)
        }

        async fn update_expense(
            &self,
            id: Uuid,
            patch: ExpensePatch,
        ) -> StoreResult<ExpenseRecord> {
            let tag = patch.category_id.and_then(|c| self.tag_of(c));
            let mut expenses = self.expenses.lock().unwrap();
            let record = expenses
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or(sqlx::Error::RowNotFound)?;
            if let Some(amount) = patch.amount {
                record.amount = amount;
            }
            if let Some(description) = patch.description {
                record.description = description;
            }
            if tag.is_some() {
                record.category = tag;
            }
            if let Some(date) = patch.date {
                record.date = date;
            }
            Ok(record.clone())
        }

        async fn delete_expense(&self, id: Uuid) -> StoreResult<()> {
            let mut expenses = self.expenses.lock().unwrap();
            let before = expenses.len();
            expenses.retain(|e| e.id != id);
            if expenses.len() == before {
                return Err(sqlx::Error::RowNotFound);
            }
            Ok(())
        }

        async fn list_categories(&self, user_id: Uuid) -> StoreResult<Vec<Category>> {
            let mut rows: Vec<Category> = self
                .categories
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.visible_to(user_id))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.is_default.cmp(&a.is_default).then(a.name.cmp(&b.name)));
            Ok(rows)
        }

        async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
            let categories = self.categories.lock().unwrap();
            Ok(categories.iter().find(|c| c.id == id).cloned())
        }

        async fn create_category(&self, user_id: Uuid, new: NewCategory) -> StoreResult<Category> {
            let category = Category {
                id: Uuid::new_v4(),
                user_id: Some(user_id),
                name: new.name,
                color: new.color,
                icon: new.icon,
                is_default: false,
            };
            self.categories.lock().unwrap().push(category.clone());
            Ok(category)
        }

        async fn update_category(&self, id: Uuid, patch: CategoryPatch) -> StoreResult<Category> {
            let mut categories = self.categories.lock().unwrap();
            let category = categories
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or(sqlx::Error::RowNotFound)?;
            if let Some(name) = patch.name {
                category.name = name;
            }
            if let Some(color) = patch.color {
                category.color = color;
            }
            if let Some(icon) = patch.icon {
                category.icon = icon;
            }
            Ok(category.clone())
        }

        async fn delete_category(&self, id: Uuid) -> StoreResult<()> {
            let mut categories = self.categories.lock().unwrap();
            let before = categories.len();
            categories.retain(|c| c.id != id);
            if categories.len() == before {
                return Err(sqlx::Error::RowNotFound);
            }
            Ok(())
        }

        async fn count_category_expenses(&self, id: Uuid) -> StoreResult<i64> {
            let expenses = self.expenses.lock().unwrap();
            let count = expenses
                .iter()
                .filter(|e| e.category.as_ref().map(|c| c.id) == Some(id))
                .count();
            Ok(count as i64)
        }
    }
}
