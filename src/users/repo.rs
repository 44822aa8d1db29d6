use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use crate::users::repo_types::{Preferences, PreferencesRow, PreferencesUpdate, User};

const PREFERENCE_COLUMNS: &str = "user_id, goal, tone, report_time, report_format, focus, \
     dietary_restrictions, thresholds, updated_at";

impl User {
    /// Returns the user for `phone`, creating it (and its default preferences) on first contact.
    ///
    /// The upsert leans on the unique phone constraint, so concurrent first messages
    /// from the same number resolve to one row.
    pub async fn find_or_create(db: &PgPool, phone: &str, language: &str) -> anyhow::Result<User> {
        let mut tx = db.begin().await.context("begin tx")?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (phone, language)
            VALUES ($1, $2)
            ON CONFLICT (phone) DO UPDATE SET phone = EXCLUDED.phone
            RETURNING id, phone, language, store_media, created_at
            "#,
        )
        .bind(phone)
        .bind(language)
        .fetch_one(&mut *tx)
        .await
        .context("upsert user")?;

        sqlx::query(
            r#"
            INSERT INTO preferences (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .context("insert default preferences")?;

        tx.commit().await.context("commit tx")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, phone, language, store_media, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn set_store_media(db: &PgPool, id: Uuid, store_media: bool) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET store_media = $2 WHERE id = $1")
            .bind(id)
            .bind(store_media)
            .execute(db)
            .await
            .context("update store_media")?;
        Ok(())
    }
}

impl Preferences {
    pub async fn find_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Preferences>> {
        let row = sqlx::query_as::<_, PreferencesRow>(&format!(
            "SELECT {PREFERENCE_COLUMNS} FROM preferences WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        row.map(Preferences::try_from).transpose()
    }

    /// Applies only the fields present in `update`.
    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        update: &PreferencesUpdate,
    ) -> anyhow::Result<Preferences> {
        let focus = update
            .focus
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let dietary = update
            .dietary_restrictions
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let row = sqlx::query_as::<_, PreferencesRow>(&format!(
            r#"
            UPDATE preferences SET
                goal = COALESCE($2, goal),
                tone = COALESCE($3, tone),
                report_time = COALESCE($4, report_time),
                focus = COALESCE($5, focus),
                dietary_restrictions = COALESCE($6, dietary_restrictions),
                updated_at = now()
            WHERE user_id = $1
            RETURNING {PREFERENCE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(update.goal.map(|g| g.as_str()))
        .bind(update.tone.map(|t| t.as_str()))
        .bind(update.report_time.as_deref())
        .bind(focus)
        .bind(dietary)
        .fetch_one(db)
        .await
        .context("update preferences")?;
        Preferences::try_from(row)
    }

    /// Every user that has a preferences row, for the report scheduler.
    pub async fn list_with_users(db: &PgPool) -> anyhow::Result<Vec<(User, Preferences)>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.phone, u.language, u.store_media, u.created_at
            FROM users u
            JOIN preferences p ON p.user_id = u.id
            ORDER BY u.created_at ASC
            "#,
        )
        .fetch_all(db)
        .await
        .context("list users with preferences")?;

        let rows = sqlx::query_as::<_, PreferencesRow>(&format!(
            "SELECT {PREFERENCE_COLUMNS} FROM preferences"
        ))
        .fetch_all(db)
        .await
        .context("list preferences")?;

        let mut by_user = std::collections::HashMap::with_capacity(rows.len());
        for row in rows {
            let prefs = Preferences::try_from(row)?;
            by_user.insert(prefs.user_id, prefs);
        }

        Ok(users
            .into_iter()
            .filter_map(|u| by_user.remove(&u.id).map(|p| (u, p)))
            .collect())
    }
}
