//! Publish use case - validates, plans, executes and records one post

use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    capability::{CapabilityTable, PublishPlan},
    media::classify_all,
    model::{AccountCredential, Platform, PostRequest, PublishResult, PublishStatus},
    ports::{AdapterReport, PlatformAdapter, PublishError, ResultPersister},
};

/// Entry point of the publishing engine.
///
/// Holds the capability table, one adapter per platform and the persister.
/// Every dependency is passed in at construction so tests can swap in fakes.
pub struct PublishOrchestrator<P>
where
    P: ResultPersister + ?Sized,
{
    capabilities: Arc<CapabilityTable>,
    adapters: Arc<HashMap<Platform, Arc<dyn PlatformAdapter>>>,
    persister: Arc<P>,
}

impl<P> Clone for PublishOrchestrator<P>
where
    P: ResultPersister + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            capabilities: Arc::clone(&self.capabilities),
            adapters: Arc::clone(&self.adapters),
            persister: Arc::clone(&self.persister),
        }
    }
}

impl<P> PublishOrchestrator<P>
where
    P: ResultPersister + ?Sized,
{
    pub fn new(
        capabilities: CapabilityTable,
        adapters: Vec<Arc<dyn PlatformAdapter>>,
        persister: Arc<P>,
    ) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.platform(), adapter))
            .collect();

        Self {
            capabilities: Arc::new(capabilities),
            adapters: Arc::new(adapters),
            persister,
        }
    }

    /// Platforms with a registered adapter
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<_> = self.adapters.keys().copied().collect();
        platforms.sort_by_key(|p| p.as_str());
        platforms
    }

    /// Validate the request and pick its plan without touching the network
    pub fn plan(&self, request: &PostRequest) -> Result<PublishPlan, PublishError> {
        if request.is_empty() {
            return Err(PublishError::InvalidRequest(
                "message or media required".to_string(),
            ));
        }

        let media = classify_all(&request.media);

        self.capabilities
            .resolve_shape(request.platform, &media)
            .map_err(|rejection| {
                tracing::warn!(
                    platform = %request.platform,
                    shape = ?rejection.shape,
                    reason = %rejection.reason,
                    "Post shape rejected"
                );
                PublishError::Unsupported(rejection.reason)
            })
    }

    /// Publish one request for `user_id`.
    ///
    /// Never retries and never deduplicates: two identical calls create two
    /// remote posts.
    pub async fn publish(
        &self,
        user_id: Uuid,
        request: PostRequest,
        credential: &AccountCredential,
    ) -> Result<PublishResult, PublishError> {
        let plan = self.plan(&request)?;

        let adapter = self
            .adapters
            .get(&request.platform)
            .ok_or(PublishError::NotConfigured(request.platform))?;

        tracing::info!(
            platform = %request.platform,
            shape = %plan.shape(),
            calls = plan.call_count(),
            media_count = request.media.len(),
            "Publishing post"
        );

        let report = adapter
            .execute(&plan, &request.message, credential)
            .await
            .inspect_err(|e| {
                tracing::error!(platform = %request.platform, error = %e, "Publish aborted");
            })?;

        let (result, failures) = aggregate(&request, report)?;

        tracing::info!(
            platform = %result.platform,
            platform_post_id = %result.platform_post_id,
            attached = result.attached_media.len(),
            failed_calls = failures.len(),
            "Platform accepted post"
        );

        // The remote post exists from here on; a local failure cannot undo it.
        if let Err(e) = self.persister.save(&result, user_id).await {
            tracing::error!(
                platform = %result.platform,
                platform_post_id = %result.platform_post_id,
                error = %e,
                "Published remotely but failed to save post"
            );
            return Err(PublishError::PersistFailed {
                result: Box::new(result),
                reason: e.to_string(),
            });
        }

        if !failures.is_empty() {
            tracing::warn!(
                platform = %result.platform,
                failed_calls = failures.len(),
                "Post partially published"
            );
            return Err(PublishError::PartialFailure {
                result: Box::new(result),
                failures: failures.iter().map(ToString::to_string).collect(),
            });
        }

        Ok(result)
    }
}

impl<P> PublishOrchestrator<P>
where
    P: ResultPersister + ?Sized + 'static,
{
    /// Run a publish on its own task.
    ///
    /// Dropping the returned handle does not cancel the publish, so remote
    /// calls that already started run to completion or failure.
    pub fn spawn_publish(
        &self,
        user_id: Uuid,
        request: PostRequest,
        credential: AccountCredential,
    ) -> JoinHandle<Result<PublishResult, PublishError>> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.publish(user_id, request, &credential).await })
    }
}

/// Fold an adapter report into a result plus the failures of independent calls
fn aggregate(
    request: &PostRequest,
    report: AdapterReport,
) -> Result<(PublishResult, Vec<PublishError>), PublishError> {
    let AdapterReport {
        platform_post_id,
        mut attached_media,
        mut outcomes,
        mut failures,
    } = report;

    let Some(platform_post_id) = platform_post_id.filter(|id| !id.is_empty()) else {
        // Nothing was published; surface the first failure as-is.
        return Err(failures
            .into_iter()
            .next()
            .unwrap_or_else(|| PublishError::Remote {
                status: None,
                body: "platform returned no post identifier".to_string(),
            }));
    };

    // A failed item always counts, even when the adapter only recorded the outcome.
    if failures.is_empty() {
        failures = outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| PublishError::Remote {
                status: None,
                body: format!(
                    "{}: {}",
                    o.media_ref.location,
                    o.error.as_deref().unwrap_or("no remote media id")
                ),
            })
            .collect();
    }

    // Adapters may run calls grouped by media kind; report in submission order.
    attached_media.sort_by_key(|m| input_position(&request.media, &m.location));
    outcomes.sort_by_key(|o| input_position(&request.media, &o.media_ref.location));

    let status = if failures.is_empty() {
        PublishStatus::Published
    } else {
        PublishStatus::Failed
    };

    let result = PublishResult {
        platform: request.platform,
        platform_post_id,
        message: request.message.clone(),
        attached_media,
        status,
        outcomes,
    };

    Ok((result, failures))
}

fn input_position(media: &[String], location: &str) -> usize {
    media
        .iter()
        .position(|m| m == location)
        .unwrap_or(media.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{FacebookPlan, PublishShape, TelegramCall};
    use crate::model::{MediaRef, Post, RemoteUploadOutcome};
    use crate::ports::PersistError;
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::OffsetDateTime;

    struct FakeAdapter {
        platform: Platform,
        response: Result<AdapterReport, PublishError>,
        plans: Mutex<Vec<PublishPlan>>,
        counter: AtomicUsize,
    }

    impl FakeAdapter {
        fn new(platform: Platform, response: Result<AdapterReport, PublishError>) -> Arc<Self> {
            Arc::new(Self {
                platform,
                response,
                plans: Mutex::new(vec![]),
                counter: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.plans.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PlatformAdapter for FakeAdapter {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn execute(
            &self,
            plan: &PublishPlan,
            _message: &str,
            _credential: &AccountCredential,
        ) -> Result<AdapterReport, PublishError> {
            self.plans.lock().unwrap().push(plan.clone());
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            self.response.clone().map(|mut report| {
                if report.platform_post_id.is_some() {
                    report.platform_post_id = Some(format!("post-{}", n));
                }
                report
            })
        }
    }

    #[derive(Default)]
    struct FakePersister {
        saved: Mutex<Vec<PublishResult>>,
        fail: bool,
    }

    #[async_trait]
    impl ResultPersister for FakePersister {
        async fn save(&self, result: &PublishResult, user_id: Uuid) -> Result<Post, PersistError> {
            if self.fail {
                return Err(PersistError::Database("disk full".to_string()));
            }
            self.saved.lock().unwrap().push(result.clone());
            Ok(Post::from_result(result, user_id, OffsetDateTime::now_utc()))
        }
    }

    fn credential() -> AccountCredential {
        AccountCredential::new(SecretString::new("token".into()), "page-1")
    }

    fn success_report(media: &[&str]) -> AdapterReport {
        let attached: Vec<MediaRef> = media.iter().map(|m| MediaRef::new(*m)).collect();
        AdapterReport {
            platform_post_id: Some("placeholder".to_string()),
            outcomes: attached
                .iter()
                .enumerate()
                .map(|(i, m)| RemoteUploadOutcome::succeeded(m.clone(), format!("media-{}", i)))
                .collect(),
            attached_media: attached,
            failures: vec![],
        }
    }

    fn orchestrator(
        adapter: Arc<FakeAdapter>,
        persister: Arc<FakePersister>,
    ) -> PublishOrchestrator<FakePersister> {
        let adapter: Arc<dyn PlatformAdapter> = adapter;
        PublishOrchestrator::new(CapabilityTable::default(), vec![adapter], persister)
    }

    #[tokio::test]
    async fn test_empty_request_rejected_before_remote_call() {
        let adapter = FakeAdapter::new(Platform::Facebook, Ok(success_report(&[])));
        let persister = Arc::new(FakePersister::default());
        let engine = orchestrator(adapter.clone(), persister.clone());

        let err = engine
            .publish(
                Uuid::new_v4(),
                PostRequest::new(Platform::Facebook, "  ", vec![]),
                &credential(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::InvalidRequest(_)));
        assert!(err.is_side_effect_free());
        assert_eq!(adapter.calls(), 0);
        assert!(persister.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mixed_media_on_facebook_is_unsupported() {
        let adapter = FakeAdapter::new(Platform::Facebook, Ok(success_report(&[])));
        let persister = Arc::new(FakePersister::default());
        let engine = orchestrator(adapter.clone(), persister);

        let err = engine
            .publish(
                Uuid::new_v4(),
                PostRequest::new(
                    Platform::Facebook,
                    "hi",
                    vec!["a.png".to_string(), "b.mp4".to_string()],
                ),
                &credential(),
            )
            .await
            .unwrap_err();

        match err {
            PublishError::Unsupported(reason) => assert_eq!(reason, "mixed media unsupported"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test]
    async fn test_success_saves_once_in_input_order() {
        let adapter = FakeAdapter::new(
            Platform::Facebook,
            Ok(success_report(&["b.png", "a.png", "c.png"])),
        );
        let persister = Arc::new(FakePersister::default());
        let engine = orchestrator(adapter.clone(), persister.clone());

        let result = engine
            .publish(
                Uuid::new_v4(),
                PostRequest::new(
                    Platform::Facebook,
                    "gallery",
                    vec!["b.png".into(), "a.png".into(), "c.png".into()],
                ),
                &credential(),
            )
            .await
            .unwrap();

        assert_eq!(result.status, PublishStatus::Published);
        assert_eq!(result.message, "gallery");

        let saved = persister.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        let order: Vec<_> = saved[0]
            .attached_media
            .iter()
            .map(|m| m.location.as_str())
            .collect();
        assert_eq!(order, vec!["b.png", "a.png", "c.png"]);

        let plans = adapter.plans.lock().unwrap();
        assert!(matches!(
            &plans[0],
            PublishPlan::Facebook {
                shape: PublishShape::MultiImage,
                plan: FacebookPlan::StagedPhotos(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_aborted_adapter_returns_error_without_saving() {
        let adapter = FakeAdapter::new(
            Platform::Facebook,
            Err(PublishError::Remote {
                status: Some(400),
                body: "bad photo".to_string(),
            }),
        );
        let persister = Arc::new(FakePersister::default());
        let engine = orchestrator(adapter, persister.clone());

        let err = engine
            .publish(
                Uuid::new_v4(),
                PostRequest::new(Platform::Facebook, "x", vec!["a.png".into()]),
                &credential(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Remote { status: Some(400), .. }));
        assert!(persister.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_is_saved_and_reported() {
        let photos = [MediaRef::new("a.png"), MediaRef::new("b.png")];
        let video = MediaRef::new("c.mp4");
        let report = AdapterReport {
            platform_post_id: Some("placeholder".to_string()),
            attached_media: photos.to_vec(),
            outcomes: vec![
                RemoteUploadOutcome::succeeded(photos[0].clone(), "10"),
                RemoteUploadOutcome::succeeded(photos[1].clone(), "11"),
                RemoteUploadOutcome::failed(video, "Transport error: timed out"),
            ],
            failures: vec![PublishError::Transport("timed out".to_string())],
        };
        let adapter = FakeAdapter::new(Platform::Telegram, Ok(report));
        let persister = Arc::new(FakePersister::default());
        let engine = orchestrator(adapter.clone(), persister.clone());

        let err = engine
            .publish(
                Uuid::new_v4(),
                PostRequest::new(
                    Platform::Telegram,
                    "album",
                    vec!["a.png".into(), "b.png".into(), "c.mp4".into()],
                ),
                &credential(),
            )
            .await
            .unwrap_err();

        match &err {
            PublishError::PartialFailure { result, failures } => {
                assert_eq!(result.outcomes.len(), 3);
                assert_eq!(result.failed_items().count(), 1);
                assert_eq!(failures.len(), 1);
                assert_eq!(result.status, PublishStatus::Failed);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(persister.saved.lock().unwrap()[0].status, PublishStatus::Failed);

        let plans = adapter.plans.lock().unwrap();
        let PublishPlan::Telegram { plan, .. } = &plans[0] else {
            panic!("expected telegram plan");
        };
        assert!(matches!(plan.calls[0], TelegramCall::SendMediaGroup { .. }));
        assert!(matches!(plan.calls[1], TelegramCall::SendVideo { .. }));
    }

    #[tokio::test]
    async fn test_failed_image_group_with_sent_video_is_partial() {
        let photos = [MediaRef::new("a.png"), MediaRef::new("b.png")];
        let video = MediaRef::new("c.mp4");
        let report = AdapterReport {
            platform_post_id: Some("placeholder".to_string()),
            attached_media: vec![video.clone()],
            outcomes: vec![
                RemoteUploadOutcome::failed(photos[0].clone(), "Remote error (HTTP 400)"),
                RemoteUploadOutcome::failed(photos[1].clone(), "Remote error (HTTP 400)"),
                RemoteUploadOutcome::succeeded(video, "20"),
            ],
            failures: vec![PublishError::Remote {
                status: Some(400),
                body: "wrong file identifier".to_string(),
            }],
        };
        let adapter = FakeAdapter::new(Platform::Telegram, Ok(report));
        let persister = Arc::new(FakePersister::default());
        let engine = orchestrator(adapter, persister.clone());

        let err = engine
            .publish(
                Uuid::new_v4(),
                PostRequest::new(
                    Platform::Telegram,
                    "album",
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
        assert_eq!(result.failed_items().count(), 2);
        assert_eq!(result.attached_media, vec![MediaRef::new("c.mp4")]);
        assert_eq!(persister.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_outcome_without_failure_is_still_partial() {
        let photos = [MediaRef::new("a.png"), MediaRef::new("b.png")];
        let report = AdapterReport {
            platform_post_id: Some("placeholder".to_string()),
            attached_media: vec![photos[0].clone()],
            outcomes: vec![
                RemoteUploadOutcome::succeeded(photos[0].clone(), "10"),
                RemoteUploadOutcome::failed(photos[1].clone(), "no message returned for item"),
            ],
            failures: vec![],
        };
        let adapter = FakeAdapter::new(Platform::Telegram, Ok(report));
        let engine = orchestrator(adapter, Arc::new(FakePersister::default()));

        let err = engine
            .publish(
                Uuid::new_v4(),
                PostRequest::new(
                    Platform::Telegram,
                    "",
                    vec!["a.png".into(), "b.png".into()],
                ),
                &credential(),
            )
            .await
            .unwrap_err();

        match err {
            PublishError::PartialFailure { result, failures } => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].contains("b.png"));
                assert_eq!(result.status, PublishStatus::Failed);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_nothing_published_returns_first_failure() {
        let report = AdapterReport {
            platform_post_id: None,
            attached_media: vec![],
            outcomes: vec![],
            failures: vec![
                PublishError::Transport("connection refused".to_string()),
                PublishError::Remote {
                    status: Some(500),
                    body: "oops".to_string(),
                },
            ],
        };
        let adapter = FakeAdapter::new(Platform::Telegram, Ok(report));
        let persister = Arc::new(FakePersister::default());
        let engine = orchestrator(adapter, persister.clone());

        let err = engine
            .publish(
                Uuid::new_v4(),
                PostRequest::new(Platform::Telegram, "", vec!["a.png".into(), "b.mp4".into()]),
                &credential(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Transport(_)));
        assert!(persister.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_remote_result() {
        let adapter = FakeAdapter::new(Platform::Facebook, Ok(success_report(&[])));
        let persister = Arc::new(FakePersister {
            saved: Mutex::new(vec![]),
            fail: true,
        });
        let engine = orchestrator(adapter, persister);

        let err = engine
            .publish(
                Uuid::new_v4(),
                PostRequest::new(Platform::Facebook, "hello", vec![]),
                &credential(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::PersistFailed { .. }));
        assert_eq!(err.result().unwrap().platform_post_id, "post-1");
        assert!(!err.is_side_effect_free());
    }

    #[tokio::test]
    async fn test_platform_without_adapter_is_not_configured() {
        let adapter = FakeAdapter::new(Platform::Facebook, Ok(success_report(&[])));
        let engine = orchestrator(adapter, Arc::new(FakePersister::default()));

        let err = engine
            .publish(
                Uuid::new_v4(),
                PostRequest::new(Platform::Telegram, "hello", vec![]),
                &credential(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::NotConfigured(Platform::Telegram)));
    }

    #[tokio::test]
    async fn test_identical_requests_are_not_deduplicated() {
        let adapter = FakeAdapter::new(Platform::Facebook, Ok(success_report(&[])));
        let persister = Arc::new(FakePersister::default());
        let engine = orchestrator(adapter.clone(), persister.clone());
        let user_id = Uuid::new_v4();

        let first = engine
            .publish(
                user_id,
                PostRequest::new(Platform::Facebook, "same", vec![]),
                &credential(),
            )
            .await
            .unwrap();
        let second = engine
            .publish(
                user_id,
                PostRequest::new(Platform::Facebook, "same", vec![]),
                &credential(),
            )
            .await
            .unwrap();

        assert_ne!(first.platform_post_id, second.platform_post_id);
        assert_eq!(adapter.calls(), 2);
        assert_eq!(persister.saved.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_spawned_publish_runs_to_completion() {
        let adapter = FakeAdapter::new(Platform::Telegram, Ok(success_report(&[])));
        let persister = Arc::new(FakePersister::default());
        let engine = orchestrator(adapter, persister.clone());

        let handle = engine.spawn_publish(
            Uuid::new_v4(),
            PostRequest::new(Platform::Telegram, "background", vec![]),
            credential(),
        );

        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.platform, Platform::Telegram);
        assert_eq!(persister.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_outcomes_reported_in_submission_order() {
        let video = MediaRef::new("clip.mp4");
        let photo = MediaRef::new("a.png");
        // Telegram sends the photo before the video
        let report = AdapterReport {
            platform_post_id: Some("placeholder".to_string()),
            attached_media: vec![photo.clone(), video.clone()],
            outcomes: vec![
                RemoteUploadOutcome::succeeded(photo, "1"),
                RemoteUploadOutcome::succeeded(video, "2"),
            ],
            failures: vec![],
        };
        let adapter = FakeAdapter::new(Platform::Telegram, Ok(report));
        let persister = Arc::new(FakePersister::default());
        let engine = orchestrator(adapter, persister);

        let result = engine
            .publish(
                Uuid::new_v4(),
                PostRequest::new(
                    Platform::Telegram,
                    "",
                    vec!["clip.mp4".into(), "a.png".into()],
                ),
                &credential(),
            )
            .await
            .unwrap();

        let attached: Vec<_> = result
            .attached_media
            .iter()
            .map(|m| m.location.as_str())
            .collect();
        assert_eq!(attached, vec!["clip.mp4", "a.png"]);
        assert_eq!(result.outcomes[0].remote_media_id.as_deref(), Some("2"));
    }

    #[test]
    fn test_plan_reports_multiple_videos_on_facebook() {
        let adapter = FakeAdapter::new(Platform::Facebook, Ok(success_report(&[])));
        let engine = orchestrator(adapter, Arc::new(FakePersister::default()));

        let err = engine
            .plan(&PostRequest::new(
                Platform::Facebook,
                "two clips",
                vec!["a.mp4".into(), "b.mp4".into()],
            ))
            .unwrap_err();

        assert!(matches!(err, PublishError::Unsupported(ref r) if r.contains("only one video")));
    }
}
