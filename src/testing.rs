//! In-memory fakes for every external seam.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::TwilioConfig;
use crate::llm::dto::{ChatRequest, ChatResponse};
use crate::llm::{ChatClient, LlmError, Transcriber};
use crate::media::{FetchedMedia, MediaError, MediaFetcher, VisionDescriber};
use crate::meals::{Meal, NewMeal};
use crate::messages::{Direction, MessageLog};
use crate::messaging::{IncomingMessage, MessagingProvider, SendResult, TwilioWhatsApp, WebhookError};
use crate::state::Providers;
use crate::storage::StorageClient;
use crate::store::Store;
use crate::users::{Preferences, PreferencesUpdate, User};

// --- store ---

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    preferences: HashMap<Uuid, Preferences>,
    meals: Vec<Meal>,
    logs: Vec<MessageLog>,
    failing_meal_queries: HashSet<Uuid>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn meal_count(&self) -> usize {
        self.tables().meals.len()
    }

    pub fn user_count(&self) -> usize {
        self.tables().users.len()
    }

    pub fn logs(&self) -> Vec<MessageLog> {
        self.tables().logs.clone()
    }

    pub fn logs_for(&self, user_id: Uuid) -> Vec<MessageLog> {
        self.tables()
            .logs
            .iter()
            .filter(|l| l.user_id == Some(user_id))
            .cloned()
            .collect()
    }

    pub fn meals_for(&self, user_id: Uuid) -> Vec<Meal> {
        self.tables()
            .meals
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Makes meal listing fail for one user, to simulate a storage error.
    pub fn fail_meal_queries_for(&self, user_id: Uuid) {
        self.tables().failing_meal_queries.insert(user_id);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_or_create_user(&self, phone: &str, language: &str) -> anyhow::Result<User> {
        let mut t = self.tables();
        if let Some(u) = t.users.iter().find(|u| u.phone == phone) {
            return Ok(u.clone());
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            phone: phone.to_string(),
            language: language.to_string(),
            store_media: false,
            created_at: now,
        };
        t.preferences.insert(user.id, Preferences::defaults(user.id, now));
        t.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.tables().users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn get_preferences(&self, user_id: Uuid) -> anyhow::Result<Option<Preferences>> {
        Ok(self.tables().preferences.get(&user_id).cloned())
    }

    async fn update_preferences(
        &self,
        user_id: Uuid,
        update: &PreferencesUpdate,
    ) -> anyhow::Result<Preferences> {
        let mut t = self.tables();
        let prefs = t
            .preferences
            .get_mut(&user_id)
            .ok_or_else(|| anyhow::anyhow!("no preferences for user {user_id}"))?;
        update.apply_to(prefs);
        prefs.updated_at = OffsetDateTime::now_utc();
        Ok(prefs.clone())
    }

    async fn set_store_media(&self, user_id: Uuid, store_media: bool) -> anyhow::Result<()> {
        let mut t = self.tables();
        let user = t
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| anyhow::anyhow!("no user {user_id}"))?;
        user.store_media = store_media;
        Ok(())
    }

    async fn insert_meal(&self, meal: NewMeal) -> anyhow::Result<Meal> {
        let meal = Meal {
            id: Uuid::new_v4(),
            user_id: meal.user_id,
            created_at: meal.created_at,
            source_type: meal.source_type,
            raw_text: meal.raw_text,
            tags: meal.tags,
        };
        self.tables().meals.push(meal.clone());
        Ok(meal)
    }

    async fn list_meals_between(
        &self,
        user_id: Uuid,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<Vec<Meal>> {
        let t = self.tables();
        if t.failing_meal_queries.contains(&user_id) {
            anyhow::bail!("simulated storage failure");
        }
        let mut meals: Vec<Meal> = t
            .meals
            .iter()
            .filter(|m| m.user_id == user_id && m.created_at >= start && m.created_at < end)
            .cloned()
            .collect();
        meals.sort_by_key(|m| m.created_at);
        Ok(meals)
    }

    async fn append_message_log(
        &self,
        user_id: Option<Uuid>,
        direction: Direction,
        payload: Value,
        at: OffsetDateTime,
    ) -> anyhow::Result<MessageLog> {
        let log = MessageLog {
            id: Uuid::new_v4(),
            user_id,
            created_at: at,
            direction: direction.as_str().to_string(),
            payload,
        };
        self.tables().logs.push(log.clone());
        Ok(log)
    }

    async fn has_delivered_outbound_between(
        &self,
        user_id: Uuid,
        kind: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        Ok(self.tables().logs.iter().any(|l| {
            l.user_id == Some(user_id)
                && l.direction == Direction::Out.as_str()
                && l.kind() == Some(kind)
                && l.payload["delivered"] == true
                && l.created_at >= start
                && l.created_at < end
        }))
    }

    async fn users_with_preferences(&self) -> anyhow::Result<Vec<(User, Preferences)>> {
        let t = self.tables();
        Ok(t.users
            .iter()
            .filter_map(|u| t.preferences.get(&u.id).map(|p| (u.clone(), p.clone())))
            .collect())
    }
}

// --- messaging ---

/// Real Twilio parsing with signature checks off; sends are recorded instead of posted.
pub struct RecordingMessenger {
    parser: TwilioWhatsApp,
    sent: Mutex<Vec<(String, String)>>,
    fail_sends: AtomicBool,
}

impl RecordingMessenger {
    pub fn failing() -> Self {
        let messenger = Self::default();
        messenger.set_failing(true);
        messenger
    }

    /// Makes later sends report a delivery failure (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for RecordingMessenger {
    fn default() -> Self {
        let parser = TwilioWhatsApp::new(
            TwilioConfig {
                account_sid: "AC_test".into(),
                auth_token: "token".into(),
                whatsapp_from: "+14155238886".into(),
                api_base: "http://twilio.local".into(),
                validate_signature: false,
                webhook_public_url: None,
            },
            Duration::from_secs(1),
        )
        .unwrap();
        Self {
            parser,
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl MessagingProvider for RecordingMessenger {
    fn parse_incoming(
        &self,
        params: &[(String, String)],
        received_at: OffsetDateTime,
    ) -> Result<IncomingMessage, WebhookError> {
        self.parser.parse_incoming(params, received_at)
    }

    async fn send_text(&self, to: &str, text: &str) -> SendResult {
        self.sent.lock().unwrap().push((to.to_string(), text.to_string()));
        if self.fail_sends.load(Ordering::SeqCst) {
            SendResult::failed("simulated delivery failure")
        } else {
            SendResult::sent(Some(format!("SM{}", Uuid::new_v4().simple())))
        }
    }

    fn validate_webhook(&self, signature: Option<&str>, params: &[(String, String)]) -> bool {
        self.parser.validate_webhook(signature, params)
    }
}

// --- llm ---

type Scripted = Result<ChatResponse, String>;

fn tool_call_response(name: &str, arguments: String) -> ChatResponse {
    serde_json::from_value(json!({
        "choices": [{
            "message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": name, "arguments": arguments }
                }]
            }
        }]
    }))
    .unwrap()
}

fn text_response(text: &str) -> ChatResponse {
    serde_json::from_value(json!({
        "choices": [{ "message": { "content": text } }]
    }))
    .unwrap()
}

/// Replays canned responses in order; the last one repeats.
pub struct ScriptedChat {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    fn with(first: Scripted) -> Self {
        Self {
            script: Mutex::new(VecDeque::from([first])),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::with(Err("connection refused".into()))
    }

    pub fn tool_call(name: &str, args: Value) -> Self {
        Self::with(Ok(tool_call_response(name, args.to_string())))
    }

    pub fn raw_tool_call(name: &str, arguments: &str) -> Self {
        Self::with(Ok(tool_call_response(name, arguments.to_string())))
    }

    pub fn text(text: &str) -> Self {
        Self::with(Ok(text_response(text)))
    }

    pub fn empty() -> Self {
        Self::with(Ok(ChatResponse { choices: Vec::new() }))
    }


    /// Queues a tool call after the responses already scripted.
    pub fn then_tool_call(self, name: &str, args: Value) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(tool_call_response(name, args.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        match next {
            Some(Ok(r)) => Ok(r),
            Some(Err(e)) => Err(LlmError::Other(e)),
            None => Err(LlmError::Other("script exhausted".into())),
        }
    }
}

enum TranscriberBehavior {
    Ok(String),
    Hanging,
}

pub struct FakeTranscriber {
    behavior: TranscriberBehavior,
    calls: AtomicUsize,
    last_mime: Mutex<Option<String>>,
}

impl FakeTranscriber {
    fn new(behavior: TranscriberBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            last_mime: Mutex::new(None),
        }
    }

    pub fn ok(text: &str) -> Self {
        Self::new(TranscriberBehavior::Ok(text.to_string()))
    }

    pub fn hanging() -> Self {
        Self::new(TranscriberBehavior::Hanging)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_mime(&self) -> Option<String> {
        self.last_mime.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        _audio: Bytes,
        mime_type: &str,
        _language: Option<&str>,
    ) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_mime.lock().unwrap() = Some(mime_type.to_string());
        match &self.behavior {
            TranscriberBehavior::Ok(text) => Ok(text.clone()),
            TranscriberBehavior::Hanging => std::future::pending().await,
        }
    }
}

// --- media ---

pub struct FakeFetcher {
    result: Result<(Vec<u8>, Option<String>), u16>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn bytes(body: Vec<u8>) -> Self {
        Self {
            result: Ok((body, None)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Download that reports its own `Content-Type`.
    pub fn typed(body: Vec<u8>, content_type: &str) -> Self {
        Self {
            result: Ok((body, Some(content_type.to_string()))),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            result: Err(status),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedMedia, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok((body, content_type)) => Ok(FetchedMedia {
                bytes: Bytes::from(body.clone()),
                content_type: content_type.clone(),
            }),
            Err(status) => Err(MediaError::DownloadStatus(*status)),
        }
    }
}

pub struct FakeVision {
    description: Option<String>,
}

impl FakeVision {
    pub fn ok(text: &str) -> Self {
        Self {
            description: Some(text.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { description: None }
    }
}

#[async_trait]
impl VisionDescriber for FakeVision {
    async fn describe(
        &self,
        _image: &Bytes,
        _mime_type: &str,
        _caption: Option<&str>,
    ) -> Result<String, LlmError> {
        self.description
            .clone()
            .ok_or_else(|| LlmError::Other("vision unavailable".into()))
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<Vec<(String, Bytes, String)>>,
}

impl MemoryStorage {
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().iter().map(|(k, _, _)| k.clone()).collect()
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.objects
            .lock()
            .unwrap()
            .push((key.to_string(), body, content_type.to_string()));
        Ok(())
    }
}

// --- clock ---

pub struct FixedClock {
    now: OffsetDateTime,
}

impl FixedClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.now
    }
}

// --- state ---

/// Fakes wired together, with handles kept for assertions.
pub struct FakeWorld {
    pub store: Arc<MemoryStore>,
    pub messenger: Arc<RecordingMessenger>,
    pub chat: Arc<ScriptedChat>,
    pub transcriber: Arc<FakeTranscriber>,
    pub fetcher: Arc<FakeFetcher>,
    pub clock: Arc<FixedClock>,
}

impl FakeWorld {
    pub fn new(chat: ScriptedChat, now: OffsetDateTime) -> Self {
        Self {
            store: Arc::new(MemoryStore::default()),
            messenger: Arc::new(RecordingMessenger::default()),
            chat: Arc::new(chat),
            transcriber: Arc::new(FakeTranscriber::ok("I had a chicken salad")),
            fetcher: Arc::new(FakeFetcher::bytes(vec![7; 4096])),
            clock: Arc::new(FixedClock::new(now)),
        }
    }

    pub fn with_fetcher(mut self, fetcher: FakeFetcher) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    pub fn providers(&self) -> Providers {
        Providers {
            store: self.store.clone(),
            messenger: self.messenger.clone(),
            chat: self.chat.clone(),
            transcriber: self.transcriber.clone(),
            fetcher: self.fetcher.clone(),
            storage: None,
            clock: self.clock.clone(),
        }
    }
}
