//! Feed, video and staged-photo publishing

use async_trait::async_trait;
use crosspost_domain::{
    AccountCredential, AdapterReport, FacebookPlan, MediaRef, Platform, PlatformAdapter,
    PublishError, PublishPlan, RemoteUploadOutcome,
};
use secrecy::ExposeSecret;

use super::FacebookAdapter;

fn field(key: impl Into<String>, value: impl Into<String>) -> (String, String) {
    (key.into(), value.into())
}

impl FacebookAdapter {
    async fn create_feed_post(
        &self,
        page_id: &str,
        token: &str,
        message: &str,
        media_fbids: &[String],
    ) -> Result<String, PublishError> {
        let mut form = Vec::with_capacity(media_fbids.len() + 2);
        if !message.is_empty() {
            form.push(field("message", message));
        }
        for (i, fbid) in media_fbids.iter().enumerate() {
            form.push(field(
                format!("attached_media[{}]", i),
                serde_json::json!({ "media_fbid": fbid }).to_string(),
            ));
        }
        form.push(field("access_token", token));

        tracing::debug!(page_id, attached = media_fbids.len(), "Creating feed post");
        self.post_form(&self.endpoint(page_id, "feed"), &form).await
    }

    async fn create_video_post(
        &self,
        page_id: &str,
        token: &str,
        message: &str,
        video: &MediaRef,
    ) -> Result<String, PublishError> {
        let form = [
            field("file_url", video.location.as_str()),
            field("description", message),
            field("access_token", token),
        ];

        tracing::debug!(page_id, video = %video.location, "Creating video post");
        self.post_form(&self.endpoint(page_id, "videos"), &form).await
    }

    /// Upload a photo without publishing it, returning its media id
    async fn stage_photo(
        &self,
        page_id: &str,
        token: &str,
        photo: &MediaRef,
    ) -> Result<String, PublishError> {
        let form = [
            field("url", photo.location.as_str()),
            field("published", "false"),
            field("access_token", token),
        ];

        self.post_form(&self.endpoint(page_id, "photos"), &form).await
    }

    async fn publish_staged_photos(
        &self,
        page_id: &str,
        token: &str,
        message: &str,
        photos: &[MediaRef],
    ) -> Result<AdapterReport, PublishError> {
        // Phase 1: stop at the first failed upload. Staged photos are left as-is.
        let mut outcomes = Vec::with_capacity(photos.len());
        let mut fbids = Vec::with_capacity(photos.len());
        for (i, photo) in photos.iter().enumerate() {
            let fbid = self
                .stage_photo(page_id, token, photo)
                .await
                .inspect_err(|e| {
                    tracing::warn!(
                        page_id,
                        index = i,
                        photo = %photo.location,
                        error = %e,
                        "Photo upload failed, aborting post"
                    );
                })?;
            tracing::debug!(page_id, index = i, media_fbid = %fbid, "Photo staged");
            outcomes.push(RemoteUploadOutcome::succeeded(photo.clone(), fbid.clone()));
            fbids.push(fbid);
        }

        // Phase 2
        let post_id = self
            .create_feed_post(page_id, token, message, &fbids)
            .await?;

        Ok(AdapterReport {
            platform_post_id: Some(post_id),
            attached_media: photos.to_vec(),
            outcomes,
            failures: vec![],
        })
    }
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn execute(
        &self,
        plan: &PublishPlan,
        message: &str,
        credential: &AccountCredential,
    ) -> Result<AdapterReport, PublishError> {
        let PublishPlan::Facebook { plan, .. } = plan else {
            return Err(PublishError::Unsupported(format!(
                "facebook adapter cannot run a {} plan",
                plan.platform()
            )));
        };

        let page_id = credential.platform_account_id.as_str();
        let token = credential.access_token.expose_secret();

        match plan {
            FacebookPlan::Feed => {
                let post_id = self.create_feed_post(page_id, token, message, &[]).await?;
                Ok(AdapterReport {
                    platform_post_id: Some(post_id),
                    ..AdapterReport::default()
                })
            }
            FacebookPlan::Video(video) => {
                let post_id = self
                    .create_video_post(page_id, token, message, video)
                    .await?;
                Ok(AdapterReport {
                    platform_post_id: Some(post_id),
                    attached_media: vec![video.clone()],
                    ..AdapterReport::default()
                })
            }
            FacebookPlan::StagedPhotos(photos) => {
                self.publish_staged_photos(page_id, token, message, photos)
                    .await
            }
        }
    }
}
