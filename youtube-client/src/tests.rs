#[cfg(test)]
mod tests {
    use crate::{SearchRequest, VideoPart, YouTubeApi, YouTubeApiClient};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tubescout_core::{classify, CoreError, FailureClass, YouTubeApiError};

    /// Serve the given (status, body) pairs in order, one per connection.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);

                let mut buffer = vec![0u8; 8192];
                let mut request = Vec::new();
                loop {
                    let read = socket.read(&mut buffer).await.unwrap_or(0);
                    request.extend_from_slice(&buffer[..read]);
                    if read == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                let response = format!(
                    "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", address), hits)
    }

    fn client(base_url: &str) -> YouTubeApiClient {
        YouTubeApiClient::new("test-key").unwrap().with_base_url(base_url)
    }

    fn search_request() -> SearchRequest {
        SearchRequest {
            query: "vlog".to_string(),
            published_after: Utc::now(),
            region_code: "FR".to_string(),
            page_size: 50,
            page_token: None,
        }
    }

    #[tokio::test]
    async fn test_search_page_is_parsed() {
        let body = r#"{"nextPageToken":"NEXT","items":[{"id":{"videoId":"v1"},"snippet":{"channelId":"UC1","title":"Salut","description":"","publishedAt":"2024-01-01T00:00:00Z"}}]}"#;
        let (base_url, hits) = serve(vec![(200, body)]).await;
        let client = client(&base_url);

        let page = client.search(&search_request()).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_page_token.as_deref(), Some("NEXT"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let metrics = client.get_metrics().await;
        assert_eq!(metrics.successful_requests, 1);
        assert_eq!(metrics.estimated_quota_units, 100);
    }

    #[tokio::test]
    async fn test_quota_response_is_classified_as_quota() {
        let body = r#"{"error":{"code":429,"errors":[{"reason":"quotaExceeded"}]}}"#;
        let (base_url, _) = serve(vec![(429, body)]).await;
        let client = client(&base_url);

        let error = client
            .video_details(&["v1".to_string()], VideoPart::Statistics)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            CoreError::YouTubeApi(YouTubeApiError::QuotaExceeded { status: 429, .. })
        ));
        assert_eq!(classify(&error), FailureClass::Quota);
        assert_eq!(client.get_metrics().await.quota_exceeded_requests, 1);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let (base_url, _) = serve(vec![(503, "{}")]).await;
        let client = client(&base_url);

        let error = client.channel_statistics("UC1").await.unwrap_err();
        assert_eq!(classify(&error), FailureClass::Transient);
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let (base_url, _) = serve(vec![(200, "not json")]).await;
        let client = client(&base_url);

        let error = client.playlist_items("UU1", 50, None).await.unwrap_err();
        assert!(matches!(
            error,
            CoreError::YouTubeApi(YouTubeApiError::InvalidResponse { .. })
        ));
        assert_eq!(classify(&error), FailureClass::Other);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let client = client(&format!("http://{}", address));
        let error = client.channel_full("UC1").await.unwrap_err();
        assert_eq!(classify(&error), FailureClass::Transient);
        assert_eq!(client.get_metrics().await.failed_requests, 1);
    }
}
