//! Post insights (engagement metrics)

use async_trait::async_trait;
use crosspost_domain::{AccountCredential, InsightsSource, PostInsights, PublishError};
use secrecy::ExposeSecret;
use serde::Deserialize;

use super::FacebookAdapter;
use crate::http::{remote_error, transport_error};

const POST_METRICS: &str = "post_impressions,post_engaged_users,post_reactions_by_type_total";

/// Feed posts are identified as `pageid_postid`; insights want the post part.
fn strip_page_prefix(platform_post_id: &str) -> &str {
    let mut parts = platform_post_id.split('_');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(post), None) => post,
        _ => platform_post_id,
    }
}

#[derive(Deserialize)]
struct InsightsResponse {
    #[serde(default)]
    data: Vec<Metric>,
}

#[derive(Deserialize)]
struct Metric {
    name: String,
    #[serde(default)]
    values: Vec<MetricValue>,
}

#[derive(Deserialize)]
struct MetricValue {
    value: serde_json::Value,
}

#[async_trait]
impl InsightsSource for FacebookAdapter {
    async fn post_insights(
        &self,
        platform_post_id: &str,
        credential: &AccountCredential,
    ) -> Result<PostInsights, PublishError> {
        let post_id = strip_page_prefix(platform_post_id);
        let url = self.endpoint(post_id, "insights");

        tracing::debug!(post_id, "Fetching post insights");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("metric", POST_METRICS),
                ("access_token", credential.access_token.expose_secret()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(remote_error(status, body));
        }

        let parsed: InsightsResponse = serde_json::from_str(&body).map_err(|e| {
            PublishError::Remote {
                status: Some(status.as_u16()),
                body: format!("malformed insights response: {}", e),
            }
        })?;

        Ok(parsed
            .data
            .into_iter()
            .filter_map(|metric| {
                let first = metric.values.into_iter().next()?;
                Some((metric.name, first.value))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential() -> AccountCredential {
        AccountCredential::new(SecretString::new("page-token".into()), "1234")
    }

    #[test]
    fn test_strip_page_prefix() {
        assert_eq!(strip_page_prefix("1234_5678"), "5678");
        assert_eq!(strip_page_prefix("5678"), "5678");
        assert_eq!(strip_page_prefix("a_b_c"), "a_b_c");
    }

    #[tokio::test]
    async fn test_fetches_first_value_of_each_metric() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v19.0/5678/insights"))
            .and(query_param("metric", POST_METRICS))
            .and(query_param("access_token", "page-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"name": "post_impressions", "values": [{"value": 120}, {"value": 3}]},
                    {"name": "post_engaged_users", "values": [{"value": 9}]},
                    {"name": "post_reactions_by_type_total", "values": [{"value": {"like": 4}}]},
                    {"name": "empty_metric", "values": []}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter =
            FacebookAdapter::with_base_url(server.uri(), "v19.0", Duration::from_secs(5)).unwrap();
        let insights = adapter
            .post_insights("1234_5678", &credential())
            .await
            .unwrap();

        assert_eq!(insights["post_impressions"], serde_json::json!(120));
        assert_eq!(insights["post_reactions_by_type_total"]["like"], 4);
        assert!(!insights.contains_key("empty_metric"));
    }

    #[tokio::test]
    async fn test_error_status_is_remote_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v19.0/5678/insights"))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let adapter =
            FacebookAdapter::with_base_url(server.uri(), "v19.0", Duration::from_secs(5)).unwrap();
        let err = adapter
            .post_insights("5678", &credential())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PublishError::Remote {
                status: Some(403),
                ..
            }
        ));
    }
}
