use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::meals::repo_types::{Meal, MealRow, NewMeal};

pub async fn insert_meal(db: &PgPool, meal: &NewMeal) -> anyhow::Result<Meal> {
    let row = sqlx::query_as::<_, MealRow>(
        r#"
        INSERT INTO meals (user_id, created_at, source_type, raw_text, tags)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, created_at, source_type, raw_text, tags
        "#,
    )
    .bind(meal.user_id)
    .bind(meal.created_at)
    .bind(meal.source_type.as_str())
    .bind(&meal.raw_text)
    .bind(&meal.tags)
    .fetch_one(db)
    .await
    .context("insert meal")?;
    Meal::try_from(row)
}

/// Meals with `start <= created_at < end`, oldest first.
pub async fn list_between(
    db: &PgPool,
    user_id: Uuid,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> anyhow::Result<Vec<Meal>> {
    let rows = sqlx::query_as::<_, MealRow>(
        r#"
        SELECT id, user_id, created_at, source_type, raw_text, tags
        FROM meals
        WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(db)
    .await
    .context("list meals between")?;

    rows.into_iter().map(Meal::try_from).collect()
}
