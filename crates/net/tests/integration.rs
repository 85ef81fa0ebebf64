//! Integration tests for net crate

#[cfg(test)]
mod tests {
    use aucat_errors::{Error, NetworkError};
    use aucat_events::{channel, AppEvent, DownloadEvent};
    use aucat_net::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn client_for(server: &MockServer) -> NetClient {
        NetClient::new(NetConfig {
            allow_http: true,
            retry_count: 0,
            retry_delay: Duration::from_millis(1),
            github_api: server.base_url(),
            drive_api: server.base_url(),
            drive_api_key: "test-key".to_string(),
            ..NetConfig::default()
        })
        .unwrap()
    }

    fn recording_transfer() -> (Transfer, Arc<Mutex<Vec<TransferProgress>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: ProgressSink = Arc::new(move |p| sink_seen.lock().unwrap().push(p));
        (Transfer::new(Uuid::new_v4()).with_progress(sink), seen)
    }

    #[tokio::test]
    async fn test_download_to_dir() {
        let server = MockServer::start();
        let (tx, mut rx) = channel();

        let content = b"test file content";
        let mock = server.mock(|when, then| {
            when.method(GET).path("/files/plugin-v1.zip");
            then.status(200)
                .header("content-length", content.len().to_string())
                .body(content);
        });

        let temp = tempdir().unwrap();
        let client = client_for(&server);
        let (transfer, seen) = recording_transfer();
        let transfer = transfer.with_events(tx);

        let path = download_to_dir(
            &client,
            &server.url("/files/plugin-v1.zip"),
            temp.path(),
            &transfer,
        )
        .await
        .unwrap();

        mock.assert();
        assert_eq!(path, temp.path().join("plugin-v1.zip"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), content);
        assert!(!temp.path().join("plugin-v1.zip.part").exists());

        let seen = seen.lock().unwrap();
        let last = seen.last().unwrap();
        assert_eq!(last.read, content.len() as u64);
        assert_eq!(last.total, Some(content.len() as u64));
        assert!(seen.iter().all(|p| p.task_id == transfer.task_id));

        let mut saw_start = false;
        let mut saw_complete = false;
        while let Ok(msg) = rx.try_recv() {
            match msg.event {
                AppEvent::Download(DownloadEvent::Started { .. }) => saw_start = true,
                AppEvent::Download(DownloadEvent::Completed { .. }) => saw_complete = true,
                _ => {}
            }
        }
        assert!(saw_start);
        assert!(saw_complete);
    }

    #[tokio::test]
    async fn test_http_error_carries_body_snippet() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing.zip");
            then.status(404).body("x".repeat(800));
        });

        let temp = tempdir().unwrap();
        let client = client_for(&server);
        let err = download_to_dir(
            &client,
            &server.url("/missing.zip"),
            temp.path(),
            &Transfer::new(Uuid::new_v4()),
        )
        .await
        .unwrap_err();

        match err {
            Error::Network(NetworkError::HttpError { status, message }) => {
                assert_eq!(status, 404);
                assert!(message.ends_with(&"x".repeat(500)));
                assert!(!message.contains(&"x".repeat(501)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!temp.path().join("missing.zip").exists());
    }

    #[tokio::test]
    async fn test_plain_http_refused_by_default() {
        let temp = tempdir().unwrap();
        let client = NetClient::with_defaults().unwrap();
        let err = download_to_dir(
            &client,
            "http://example.com/a.zip",
            temp.path(),
            &Transfer::new(Uuid::new_v4()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Network(NetworkError::InsecureUrl { .. })));
    }

    #[tokio::test]
    async fn test_github_scans_releases_when_latest_has_no_match() {
        let server = MockServer::start();
        let latest = server.mock(|when, then| {
            when.method(GET).path("/repos/o/r/releases/latest");
            then.status(200).json_body(json!({
                "tag_name": "v1",
                "published_at": "2024-01-01T00:00:00Z",
                "assets": [{"name": "a.zip", "browser_download_url": "https://dl/a.zip",
                            "updated_at": "2024-01-01T00:00:00Z"}]
            }));
        });
        let list = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/o/r/releases")
                .query_param("per_page", "30");
            then.status(200).json_body(json!([
                {"tag_name": "v1", "assets": [{"name": "a.zip", "browser_download_url": "https://dl/a.zip",
                                               "updated_at": "2024-01-01T00:00:00Z"}]},
                "not a release",
                {"tag_name": "v0", "assets": []},
                {"tag_name": "v2", "assets": [{"name": "b.zip", "browser_download_url": "https://dl/b.zip",
                                               "updated_at": "2024-05-01T00:00:00Z"}]}
            ]));
        });

        let client = client_for(&server);
        let url = resolve_release_asset(
            &client,
            &GitHubSource {
                owner: "o",
                repo: "r",
                pattern: Some(r"^b\.zip$"),
                tag: None,
            },
        )
        .await;

        latest.assert();
        list.assert();
        assert_eq!(url.as_deref(), Some("https://dl/b.zip"));
    }

    #[tokio::test]
    async fn test_github_latest_without_pattern_uses_first_asset() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/o/r/releases/latest");
            then.status(200).json_body(json!({
                "assets": [{"name": "first.zip", "browser_download_url": "https://dl/first.zip"},
                           {"name": "second.zip", "browser_download_url": "https://dl/second.zip"}]
            }));
        });
        let client = client_for(&server);
        let url = resolve_release_asset(
            &client,
            &GitHubSource {
                owner: "o",
                repo: "r",
                pattern: None,
                tag: None,
            },
        )
        .await;
        assert_eq!(url.as_deref(), Some("https://dl/first.zip"));
    }

    #[tokio::test]
    async fn test_github_unresolvable_yields_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/o/r/releases/latest");
            then.status(404).json_body(json!({"message": "Not Found"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/repos/o/r/releases");
            then.status(200).body("garbage");
        });
        let client = client_for(&server);
        let source = GitHubSource {
            owner: "o",
            repo: "r",
            pattern: None,
            tag: None,
        };
        assert!(resolve_release_asset(&client, &source).await.is_none());

        let bad_pattern = GitHubSource {
            pattern: Some("(unclosed"),
            ..source
        };
        assert!(resolve_release_asset(&client, &bad_pattern).await.is_none());
    }

    #[tokio::test]
    async fn test_github_pinned_tag() {
        let server = MockServer::start();
        let tagged = server.mock(|when, then| {
            when.method(GET).path("/repos/o/r/releases/tags/v1.2");
            then.status(200).json_body(json!({
                "assets": [{"name": "pkg-v1.2.zip", "browser_download_url": "https://dl/pkg-v1.2.zip"}]
            }));
        });
        let client = client_for(&server);
        let url = resolve_release_asset(
            &client,
            &GitHubSource {
                owner: "o",
                repo: "r",
                pattern: Some(r"\.zip$"),
                tag: Some("v1.2"),
            },
        )
        .await;
        tagged.assert();
        assert_eq!(url.as_deref(), Some("https://dl/pkg-v1.2.zip"));
    }

    #[tokio::test]
    async fn test_drive_download_uses_drive_name() {
        let server = MockServer::start();
        let meta = server.mock(|when, then| {
            when.method(GET)
                .path("/files/FILE123")
                .query_param("fields", "name")
                .header("x-goog-api-key", "test-key");
            then.status(200).json_body(json!({"name": "plugin:v1.zip"}));
        });
        let media = server.mock(|when, then| {
            when.method(GET)
                .path("/files/FILE123")
                .query_param("alt", "media")
                .header("x-goog-api-key", "test-key");
            then.status(200).body("zipbytes");
        });

        let temp = tempdir().unwrap();
        let client = client_for(&server);
        let path = drive_download(&client, "FILE123", temp.path(), &Transfer::new(Uuid::new_v4()))
            .await
            .unwrap();

        meta.assert();
        media.assert();
        assert_eq!(path, temp.path().join("plugin_v1.zip"));
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "zipbytes");
    }

    #[tokio::test]
    async fn test_drive_error_message_surfaces() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/files/GONE");
            then.status(403)
                .json_body(json!({"error": {"message": "The download quota for this file has been exceeded."}}));
        });
        let temp = tempdir().unwrap();
        let client = client_for(&server);
        let err = drive_download(&client, "GONE", temp.path(), &Transfer::new(Uuid::new_v4()))
            .await
            .unwrap_err();
        match err {
            Error::Network(NetworkError::HttpError { status, message }) => {
                assert_eq!(status, 403);
                assert!(message.contains("quota"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_booth_requires_session() {
        let server = MockServer::start();
        let temp = tempdir().unwrap();
        let client = client_for(&server);
        let err = booth_download(
            &client,
            &server.url("/downloadables/1"),
            temp.path(),
            None,
            &Transfer::new(Uuid::new_v4()),
        )
        .await
        .unwrap_err();
        assert!(err.is_auth_required());
        assert!(matches!(err, Error::Network(NetworkError::AuthWindowMissing)));
    }

    #[tokio::test]
    async fn test_booth_refused_session_is_auth_required() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/downloadables/1");
            then.status(302).header("location", "/users/sign_in");
        });
        server.mock(|when, then| {
            when.method(GET).path("/users/sign_in");
            then.status(200).body("<html>login</html>");
        });
        server.mock(|when, then| {
            when.method(GET).path("/downloadables/2");
            then.status(403);
        });

        let temp = tempdir().unwrap();
        let client = client_for(&server);
        for path in ["/downloadables/1", "/downloadables/2"] {
            let err = booth_download(
                &client,
                &server.url(path),
                temp.path(),
                Some("_session=stale"),
                &Transfer::new(Uuid::new_v4()),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, Error::Network(NetworkError::AuthRequired { .. })));
        }
    }

    #[tokio::test]
    async fn test_booth_download_with_cookie() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/downloadables/3")
                .header("cookie", "_session=good");
            then.status(200)
                .header("content-disposition", r#"attachment; filename="store item.zip""#)
                .body("payload");
        });

        let temp = tempdir().unwrap();
        let session_file = temp.path().join("booth_session");
        save_session(&session_file, "  _session=good\n").await.unwrap();
        let session = load_session(&session_file).await;
        assert_eq!(session.as_deref(), Some("_session=good"));

        let client = client_for(&server);
        let path = booth_download(
            &client,
            &server.url("/downloadables/3"),
            temp.path(),
            session.as_deref(),
            &Transfer::new(Uuid::new_v4()),
        )
        .await
        .unwrap();

        mock.assert();
        assert_eq!(path, temp.path().join("store item.zip"));
    }
}
