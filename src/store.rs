use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::meals::{self, Meal, NewMeal};
use crate::messages::{self, Direction, MessageLog};
use crate::users::{Preferences, PreferencesUpdate, User};

/// Persistence seam for users, preferences, meals and the message log.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_or_create_user(&self, phone: &str, language: &str) -> anyhow::Result<User>;
    async fn get_user(&self, user_id: Uuid) -> anyhow::Result<Option<User>>;
    async fn get_preferences(&self, user_id: Uuid) -> anyhow::Result<Option<Preferences>>;
    async fn update_preferences(
        &self,
        user_id: Uuid,
        update: &PreferencesUpdate,
    ) -> anyhow::Result<Preferences>;
    async fn set_store_media(&self, user_id: Uuid, store_media: bool) -> anyhow::Result<()>;
    async fn insert_meal(&self, meal: NewMeal) -> anyhow::Result<Meal>;
    async fn list_meals_between(
        &self,
        user_id: Uuid,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<Vec<Meal>>;
    async fn append_message_log(
        &self,
        user_id: Option<Uuid>,
        direction: Direction,
        payload: serde_json::Value,
        at: OffsetDateTime,
    ) -> anyhow::Result<MessageLog>;
    async fn has_delivered_outbound_between(
        &self,
        user_id: Uuid,
        kind: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<bool>;
    async fn users_with_preferences(&self) -> anyhow::Result<Vec<(User, Preferences)>>;
}

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_or_create_user(&self, phone: &str, language: &str) -> anyhow::Result<User> {
        User::find_or_create(&self.db, phone, language).await
    }

    async fn get_user(&self, user_id: Uuid) -> anyhow::Result<Option<User>> {
        User::find_by_id(&self.db, user_id).await
    }

    async fn get_preferences(&self, user_id: Uuid) -> anyhow::Result<Option<Preferences>> {
        Preferences::find_by_user(&self.db, user_id).await
    }

    async fn update_preferences(
        &self,
        user_id: Uuid,
        update: &PreferencesUpdate,
    ) -> anyhow::Result<Preferences> {
        Preferences::update(&self.db, user_id, update).await
    }

    async fn set_store_media(&self, user_id: Uuid, store_media: bool) -> anyhow::Result<()> {
        User::set_store_media(&self.db, user_id, store_media).await
    }

    async fn insert_meal(&self, meal: NewMeal) -> anyhow::Result<Meal> {
        meals::repo::insert_meal(&self.db, &meal).await
    }

    async fn list_meals_between(
        &self,
        user_id: Uuid,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<Vec<Meal>> {
        meals::repo::list_between(&self.db, user_id, start, end).await
    }

    async fn append_message_log(
        &self,
        user_id: Option<Uuid>,
        direction: Direction,
        payload: serde_json::Value,
        at: OffsetDateTime,
    ) -> anyhow::Result<MessageLog> {
        messages::repo::append(&self.db, user_id, direction, &payload, at).await
    }

    async fn has_delivered_outbound_between(
        &self,
        user_id: Uuid,
        kind: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        messages::repo::has_delivered_outbound_between(&self.db, user_id, kind, start, end).await
    }

    async fn users_with_preferences(&self) -> anyhow::Result<Vec<(User, Preferences)>> {
        Preferences::list_with_users(&self.db).await
    }
}
