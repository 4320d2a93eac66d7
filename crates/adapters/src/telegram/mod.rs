//! Telegram Bot API adapter
//!
//! Every call is independent: a failed video does not prevent the image group
//! from being delivered, and vice versa.

use async_trait::async_trait;
use crosspost_domain::{
    AccountCredential, AdapterReport, MediaRef, Platform, PlatformAdapter, PublishError,
    PublishPlan, RemoteUploadOutcome, TelegramCall,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

use crate::http::{build_client, remote_error, transport_error};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

const PARSE_MODE: &str = "HTML";

/// Bot API client bound to one bot token
pub struct TelegramAdapter {
    client: Client,
    base_url: String,
    bot_token: SecretString,
}

/// Envelope of every Bot API response
#[derive(Deserialize)]
struct BotResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

#[derive(Deserialize)]
struct Message {
    message_id: i64,
}

/// Chat details returned by `getChat`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatInfo {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    pub username: Option<String>,
}

impl ChatInfo {
    /// Title for channels and groups, `@username` otherwise
    pub fn display_name(&self) -> Option<String> {
        self.title
            .clone()
            .or_else(|| self.username.as_ref().map(|u| format!("@{}", u)))
    }
}

impl TelegramAdapter {
    pub fn new(bot_token: SecretString, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_base_url(DEFAULT_API_URL, bot_token, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        bot_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bot_token,
        })
    }

    /// Look up a chat, used to verify the bot can reach it
    pub async fn get_chat(&self, chat_id: &str) -> Result<ChatInfo, PublishError> {
        self.call("getChat", &json!({ "chat_id": chat_id })).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &Value,
    ) -> Result<T, PublishError> {
        let url = format!(
            "{}/bot{}/{}",
            self.base_url,
            self.bot_token.expose_secret(),
            method
        );

        tracing::debug!(method, "Calling Telegram Bot API");

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        let parsed: BotResponse<T> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) => return Err(remote_error(status, body)),
        };

        match parsed {
            BotResponse {
                ok: true,
                result: Some(result),
                ..
            } if status.is_success() => Ok(result),
            BotResponse {
                description,
                error_code,
                ..
            } => Err(PublishError::Remote {
                status: error_code.or(Some(status.as_u16())),
                body: description.unwrap_or(body),
            }),
        }
    }

    async fn send_media(
        &self,
        method: &str,
        field: &str,
        chat_id: &str,
        item: &MediaRef,
        caption: Option<&str>,
    ) -> Result<String, PublishError> {
        let mut payload = json!({
            "chat_id": chat_id,
            field: item.location,
            "parse_mode": PARSE_MODE,
        });
        if let Some(caption) = caption {
            payload["caption"] = json!(caption);
        }

        let message: Message = self.call(method, &payload).await?;
        Ok(message.message_id.to_string())
    }

    async fn send_media_group(
        &self,
        chat_id: &str,
        photos: &[MediaRef],
        caption: Option<&str>,
    ) -> Result<Vec<String>, PublishError> {
        let media: Vec<Value> = photos
            .iter()
            .enumerate()
            .map(|(i, photo)| {
                let mut item = json!({ "type": "photo", "media": photo.location });
                if let (0, Some(caption)) = (i, caption) {
                    item["caption"] = json!(caption);
                    item["parse_mode"] = json!(PARSE_MODE);
                }
                item
            })
            .collect();

        let messages: Vec<Message> = self
            .call("sendMediaGroup", &json!({ "chat_id": chat_id, "media": media }))
            .await?;
        Ok(messages
            .into_iter()
            .map(|m| m.message_id.to_string())
            .collect())
    }

    /// Run one call and fold its outcome into the report
    async fn run_call(
        &self,
        call: &TelegramCall,
        chat_id: &str,
        message: &str,
        report: &mut AdapterReport,
    ) {
        let caption = |wanted: bool| (wanted && !message.is_empty()).then_some(message);

        match call {
            TelegramCall::SendText => {
                let payload = json!({
                    "chat_id": chat_id,
                    "text": message,
                    "parse_mode": PARSE_MODE,
                });
                match self.call::<Message>(call.method(), &payload).await {
                    Ok(sent) => record_post_id(report, sent.message_id.to_string()),
                    Err(e) => record_failure(report, call, e),
                }
            }
            TelegramCall::SendPhoto { photo, caption: c } => {
                let sent = self
                    .send_media(call.method(), "photo", chat_id, photo, caption(*c))
                    .await;
                record_item(report, call, photo, sent);
            }
            TelegramCall::SendVideo { video, caption: c } => {
                let sent = self
                    .send_media(call.method(), "video", chat_id, video, caption(*c))
                    .await;
                record_item(report, call, video, sent);
            }
            TelegramCall::SendMediaGroup { photos, caption: c } => {
                match self.send_media_group(chat_id, photos, caption(*c)).await {
                    Ok(ids) => {
                        let mut ids = ids.into_iter();
                        for photo in photos {
                            match ids.next() {
                                Some(id) => record_item(report, call, photo, Ok(id)),
                                None => record_item(
                                    report,
                                    call,
                                    photo,
                                    Err(PublishError::Remote {
                                        status: None,
                                        body: "no message returned for item".to_string(),
                                    }),
                                ),
                            }
                        }
                    }
                    Err(e) => {
                        for photo in photos {
                            report
                                .outcomes
                                .push(RemoteUploadOutcome::failed(photo.clone(), e.to_string()));
                        }
                        record_failure(report, call, e);
                    }
                }
            }
        }
    }
}

fn record_post_id(report: &mut AdapterReport, message_id: String) {
    report.platform_post_id.get_or_insert(message_id);
}

fn record_failure(report: &mut AdapterReport, call: &TelegramCall, error: PublishError) {
    tracing::warn!(method = call.method(), error = %error, "Telegram call failed");
    report.failures.push(error);
}

fn record_item(
    report: &mut AdapterReport,
    call: &TelegramCall,
    item: &MediaRef,
    sent: Result<String, PublishError>,
) {
    match sent {
        Ok(message_id) => {
            report
                .outcomes
                .push(RemoteUploadOutcome::succeeded(item.clone(), message_id.clone()));
            report.attached_media.push(item.clone());
            record_post_id(report, message_id);
        }
        Err(e) => {
            report
                .outcomes
                .push(RemoteUploadOutcome::failed(item.clone(), e.to_string()));
            record_failure(report, call, e);
        }
    }
}

#[async_trait]
impl PlatformAdapter for TelegramAdapter {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn execute(
        &self,
        plan: &PublishPlan,
        message: &str,
        credential: &AccountCredential,
    ) -> Result<AdapterReport, PublishError> {
        let PublishPlan::Telegram { plan, .. } = plan else {
            return Err(PublishError::Unsupported(format!(
                "telegram adapter cannot run a {} plan",
                plan.platform()
            )));
        };

        let chat_id = credential.platform_account_id.as_str();
        let mut report = AdapterReport::default();

        for call in &plan.calls {
            self.run_call(call, chat_id, message, &mut report).await;
        }

        tracing::debug!(
            calls = plan.calls.len(),
            failed = report.failures.len(),
            "Telegram plan finished"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosspost_domain::{CapabilityTable, media::classify_all};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> TelegramAdapter {
        TelegramAdapter::with_base_url(
            server.uri(),
            SecretString::new("test-token".into()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn credential() -> AccountCredential {
        // Bot API ignores this token; the chat id is what matters
        AccountCredential::new(SecretString::new("unused".into()), "@channel")
    }

    fn plan_for(urls: &[&str]) -> PublishPlan {
        CapabilityTable::default()
            .resolve_shape(Platform::Telegram, &classify_all(urls))
            .unwrap()
    }

    fn ok_message(id: i64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": id, "chat": { "id": -100 } }
        }))
    }

    #[tokio::test]
    async fn test_text_only_sends_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": "@channel",
                "text": "<b>hi</b>",
                "parse_mode": "HTML"
            })))
            .respond_with(ok_message(41))
            .expect(1)
            .mount(&server)
            .await;

        let report = adapter(&server)
            .execute(&plan_for(&[]), "<b>hi</b>", &credential())
            .await
            .unwrap();

        assert_eq!(report.platform_post_id.as_deref(), Some("41"));
        assert!(report.outcomes.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_single_photo_carries_caption() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/sendPhoto"))
            .and(body_partial_json(json!({
                "photo": "a.png",
                "caption": "look"
            })))
            .respond_with(ok_message(7))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .respond_with(ok_message(8))
            .expect(0)
            .mount(&server)
            .await;

        let report = adapter(&server)
            .execute(&plan_for(&["a.png"]), "look", &credential())
            .await
            .unwrap();

        assert_eq!(report.platform_post_id.as_deref(), Some("7"));
        assert_eq!(report.attached_media.len(), 1);
    }

    #[tokio::test]
    async fn test_video_failure_keeps_image_group() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMediaGroup"))
            .and(body_partial_json(json!({
                "media": [
                    { "type": "photo", "media": "a.png", "caption": "trip" },
                    { "type": "photo", "media": "b.png" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [ { "message_id": 10 }, { "message_id": 11 } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/sendVideo"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "ok": false,
                "error_code": 500,
                "description": "Internal Server Error"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let report = adapter(&server)
            .execute(&plan_for(&["a.png", "b.png", "c.mp4"]), "trip", &credential())
            .await
            .unwrap();

        assert_eq!(report.platform_post_id.as_deref(), Some("10"));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.outcomes.len(), 3);
        assert!(report.outcomes[0].is_success());
        assert!(report.outcomes[1].is_success());
        assert!(!report.outcomes[2].is_success());
        assert_eq!(report.attached_media.len(), 2);

        // The video carries no caption: it rode on the group
        let requests = server.received_requests().await.unwrap();
        let video = requests
            .iter()
            .find(|r| r.url.path().ends_with("/sendVideo"))
            .unwrap();
        let body: Value = serde_json::from_slice(&video.body).unwrap();
        assert!(body.get("caption").is_none());
    }

    #[tokio::test]
    async fn test_ok_false_is_remote_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot is not a member of the channel chat"
            })))
            .mount(&server)
            .await;

        let report = adapter(&server)
            .execute(&plan_for(&[]), "hello", &credential())
            .await
            .unwrap();

        assert!(report.platform_post_id.is_none());
        match &report.failures[0] {
            PublishError::Remote { status, body } => {
                assert_eq!(*status, Some(403));
                assert!(body.contains("not a member"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_group_marks_every_photo() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMediaGroup"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: wrong file identifier"
            })))
            .mount(&server)
            .await;

        let report = adapter(&server)
            .execute(&plan_for(&["a.png", "b.png"]), "", &credential())
            .await
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes.iter().all(|o| !o.is_success()));
        assert!(report.attached_media.is_empty());
    }

    #[tokio::test]
    async fn test_short_media_group_response_counts_as_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMediaGroup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [ { "message_id": 10 } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let report = adapter(&server)
            .execute(&plan_for(&["a.png", "b.png"]), "", &credential())
            .await
            .unwrap();

        assert_eq!(report.platform_post_id.as_deref(), Some("10"));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.attached_media, vec![MediaRef::new("a.png")]);
        assert!(report.outcomes[0].is_success());
        assert!(!report.outcomes[1].is_success());
    }

    async fn mount_failed_group_and_video(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMediaGroup"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: wrong file identifier"
            })))
            .expect(1)
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/sendVideo"))
            .and(body_partial_json(json!({ "video": "c.mp4" })))
            .respond_with(ok_message(20))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_image_group_failure_still_sends_video() {
        let server = MockServer::start().await;
        mount_failed_group_and_video(&server).await;

        let report = adapter(&server)
            .execute(&plan_for(&["a.png", "b.png", "c.mp4"]), "trip", &credential())
            .await
            .unwrap();

        assert_eq!(report.platform_post_id.as_deref(), Some("20"));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.attached_media, vec![MediaRef::new("c.mp4")]);

        let video = report
            .outcomes
            .iter()
            .find(|o| o.media_ref.location == "c.mp4")
            .unwrap();
        assert!(video.is_success());
        assert_eq!(video.remote_media_id.as_deref(), Some("20"));
    }

    #[tokio::test]
    async fn test_image_group_failure_publishes_as_partial() {
        use crate::store::InMemoryStore;
        use crosspost_domain::{PostHistory, PostRequest, usecases::PublishOrchestrator};
        use std::sync::Arc;
        use uuid::Uuid;

        let server = MockServer::start().await;
        mount_failed_group_and_video(&server).await;

        let store = Arc::new(InMemoryStore::new());
        let adapter: Arc<dyn PlatformAdapter> = Arc::new(adapter(&server));
        let engine =
            PublishOrchestrator::new(CapabilityTable::default(), vec![adapter], store.clone());
        let user_id = Uuid::new_v4();

        let err = engine
            .publish(
                user_id,
                PostRequest::new(
                    Platform::Telegram,
                    "trip",
                    vec!["a.png".into(), "b.png".into(), "c.mp4".into()],
                ),
                &credential(),
            )
            .await
            .unwrap_err();

        let PublishError::PartialFailure { result, failures } = &err else {
            panic!("unexpected error: {:?}", err);
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(result.platform_post_id, "20");
        assert_eq!(result.failed_items().count(), 2);

        let posts = store.list_posts(user_id, None).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].media_urls, vec!["c.mp4"]);
    }

    #[tokio::test]
    async fn test_get_chat_returns_title() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/getChat"))
            .and(body_partial_json(json!({ "chat_id": "@channel" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": { "id": -1001, "type": "channel", "title": "Release notes" }
            })))
            .mount(&server)
            .await;

        let chat = adapter(&server).get_chat("@channel").await.unwrap();

        assert_eq!(chat.id, -1001);
        assert_eq!(chat.kind, "channel");
        assert_eq!(chat.display_name().as_deref(), Some("Release notes"));
    }
}
