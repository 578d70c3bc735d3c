use sqlx::SqlitePool;

use crate::error::{Result, StorageError};
use crate::models::{AgeCategory, Sex, WeightCategory};

pub struct CategoryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CategoryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn weight_by_id(&self, weight_cat_id: i64) -> Result<WeightCategory> {
        let cat = sqlx::query_as::<_, WeightCategory>(
            "SELECT weight_cat_id, name, sex, min_kg, max_kg
             FROM weight_categories WHERE weight_cat_id = ?",
        )
        .bind(weight_cat_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(cat)
    }

    pub async fn weight_by_name(&self, name: &str, sex: Sex) -> Result<WeightCategory> {
        let cat = sqlx::query_as::<_, WeightCategory>(
            "SELECT weight_cat_id, name, sex, min_kg, max_kg
             FROM weight_categories WHERE name = ? AND sex = ?",
        )
        .bind(name)
        .bind(sex)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(cat)
    }

    pub async fn age_by_id(&self, age_cat_id: i64) -> Result<AgeCategory> {
        let cat = sqlx::query_as::<_, AgeCategory>(
            "SELECT age_cat_id, name, min_age, max_age
             FROM age_categories WHERE age_cat_id = ?",
        )
        .bind(age_cat_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(cat)
    }

    pub async fn create_weight(
        &self,
        name: &str,
        sex: Sex,
        min_kg: Option<f64>,
        max_kg: Option<f64>,
    ) -> Result<WeightCategory> {
        let cat = sqlx::query_as::<_, WeightCategory>(
            "INSERT INTO weight_categories (name, sex, min_kg, max_kg)
             VALUES (?, ?, ?, ?)
             RETURNING weight_cat_id, name, sex, min_kg, max_kg",
        )
        .bind(name)
        .bind(sex)
        .bind(min_kg)
        .bind(max_kg)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            let err = StorageError::from(e);
            if err.is_unique_violation() {
                StorageError::ConstraintViolation(format!(
                    "weight category {name} already exists for {sex:?}"
                ))
            } else {
                err
            }
        })?;

        Ok(cat)
    }

    pub async fn create_age(
        &self,
        name: &str,
        min_age: Option<i64>,
        max_age: Option<i64>,
    ) -> Result<AgeCategory> {
        let cat = sqlx::query_as::<_, AgeCategory>(
            "INSERT INTO age_categories (name, min_age, max_age)
             VALUES (?, ?, ?)
             RETURNING age_cat_id, name, min_age, max_age",
        )
        .bind(name)
        .bind(min_age)
        .bind(max_age)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            let err = StorageError::from(e);
            if err.is_unique_violation() {
                StorageError::ConstraintViolation(format!("age category {name} already exists"))
            } else {
                err
            }
        })?;

        Ok(cat)
    }
}
