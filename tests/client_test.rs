//! Tests for DriveClient and Fetcher with mocked HTTP responses.

use drive_fetch::{Credential, DownloadProgress, DriveClient, FetchState, Fetcher};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use tempfile::tempdir;

fn credential() -> Credential {
    Credential {
        token: "ya29.test".to_string(),
        refresh_token: None,
        token_uri: "https://oauth2.googleapis.com/token".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        scopes: Vec::new(),
        expiry: None,
    }
}

fn client(server: &ServerGuard) -> DriveClient {
    DriveClient::new(&credential()).with_base_url(server.url())
}

fn newest_query(folder: &str, name: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded(
            "q".into(),
            format!("'{}' in parents and name = '{}' and trashed = false", folder, name),
        ),
        Matcher::UrlEncoded("orderBy".into(), "createdTime desc".into()),
        Matcher::UrlEncoded("pageSize".into(), "1".into()),
    ])
}

mod lookup {
    use super::*;

    #[tokio::test]
    async fn picks_newest_of_same_name() {
        let mut server = Server::new_async().await;
        let body = json!({
            "files": [
                {"id": "t1", "name": "A", "createdTime": "2024-01-01T00:00:00Z"},
                {"id": "t2", "name": "A", "createdTime": "2024-03-01T00:00:00Z"}
            ]
        });
        let mock = server
            .mock("GET", "/files")
            .match_query(newest_query("folder", "A"))
            .match_header("authorization", "Bearer ya29.test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let file = client(&server).find_newest("folder", "A").await.unwrap();

        mock.assert_async().await;
        assert_eq!(file.id, "t2");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(newest_query("folder", "nostrcube"))
            .with_status(200)
            .with_body(json!({"files": []}).to_string())
            .create_async()
            .await;

        let err = client(&server)
            .find_newest("folder", "nostrcube")
            .await
            .unwrap_err();

        assert!(matches!(err, drive_fetch::DriveError::FileNotFound { .. }));
        assert!(err.to_string().contains("nostrcube"));
    }

    #[tokio::test]
    async fn api_error_body_is_reported() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(
                json!({"error": {"code": 404, "message": "File not found: folder."}}).to_string(),
            )
            .create_async()
            .await;

        let err = client(&server)
            .find_newest("folder", "nostrcube")
            .await
            .unwrap_err();

        match err {
            drive_fetch::DriveError::ApiError { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "File not found: folder.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn folder_listing_follows_pages() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/files")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "'folder' in parents and trashed = false".into()),
                // pageToken is appended last, so the first page ends here.
                Matcher::Regex("supportsAllDrives=true$".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({"files": [{"id": "f1", "name": "one"}], "nextPageToken": "page-2"})
                    .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/files")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "page-2".into()))
            .with_status(200)
            .with_body(json!({"files": [{"id": "f2", "name": "two"}]}).to_string())
            .create_async()
            .await;

        let files = client(&server).list_folder("folder").await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let ids: Vec<_> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f2"]);
    }
}

mod download {
    use super::*;
    use drive_fetch::FileMetadata;

    fn target() -> FileMetadata {
        serde_json::from_value(json!({"id": "abc", "name": "nostrcube"})).unwrap()
    }

    #[tokio::test]
    async fn chunked_download_reaches_100_percent() {
        let mut server = Server::new_async().await;
        let chunks = [
            ("bytes=0-3", "bytes 0-3/10", "0123"),
            ("bytes=4-7", "bytes 4-7/10", "4567"),
            ("bytes=8-11", "bytes 8-9/10", "89"),
        ];
        let mut mocks = Vec::new();
        for (range, content_range, body) in chunks {
            mocks.push(
                server
                    .mock("GET", "/files/abc")
                    .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
                    .match_header("range", range)
                    .with_status(206)
                    .with_header("content-range", content_range)
                    .with_body(body)
                    .create_async()
                    .await,
            );
        }

        let dir = tempdir().unwrap();
        let destination = dir.path().join("out.bin");
        let mut reports: Vec<DownloadProgress> = Vec::new();

        let bytes = client(&server)
            .with_chunk_size(4)
            .download(&target(), &destination, |p| reports.push(p))
            .await
            .unwrap();

        for mock in &mocks {
            mock.assert_async().await;
        }
        assert_eq!(bytes, 10);
        assert_eq!(std::fs::read(&destination).unwrap(), b"0123456789");
        let percents: Vec<u8> = reports.iter().map(|p| p.percent()).collect();
        assert_eq!(percents, vec![40, 80, 100]);
    }

    #[tokio::test]
    async fn full_body_response_is_single_chunk() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files/abc")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .with_status(200)
            .with_body("whole file")
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let destination = dir.path().join("out.bin");
        let mut reports = Vec::new();

        let bytes = client(&server)
            .download(&target(), &destination, |p| reports.push(p.percent()))
            .await
            .unwrap();

        assert_eq!(bytes, 10);
        assert_eq!(std::fs::read(&destination).unwrap(), b"whole file");
        assert_eq!(reports, vec![100]);
    }

    #[tokio::test]
    async fn empty_remote_file() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files/abc")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .with_status(416)
            .with_header("content-range", "bytes */0")
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let destination = dir.path().join("empty.bin");
        let mut reports = Vec::new();

        let bytes = client(&server)
            .download(&target(), &destination, |p| reports.push(p.percent()))
            .await
            .unwrap();

        assert_eq!(bytes, 0);
        assert!(destination.exists());
        assert_eq!(reports, vec![100]);
    }

    #[tokio::test]
    async fn transfer_error_leaves_partial_file() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files/abc")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .match_header("range", "bytes=0-3")
            .with_status(206)
            .with_header("content-range", "bytes 0-3/10")
            .with_body("0123")
            .create_async()
            .await;
        server
            .mock("GET", "/files/abc")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .match_header("range", "bytes=4-7")
            .with_status(500)
            .with_body(json!({"error": {"code": 500, "message": "Backend Error"}}).to_string())
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let destination = dir.path().join("partial.bin");

        let err = client(&server)
            .with_chunk_size(4)
            .download(&target(), &destination, |_| {})
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Backend Error"));
        assert_eq!(std::fs::read(&destination).unwrap(), b"0123");
    }
    #[tokio::test]
    async fn huge_chunk_size_saturates_range_end() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/files/abc")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .match_header("range", format!("bytes=0-{}", u64::MAX - 1).as_str())
            .with_status(206)
            .with_header("content-range", "bytes 0-3/10")
            .with_body("0123")
            .create_async()
            .await;
        let second = server
            .mock("GET", "/files/abc")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .match_header("range", format!("bytes=4-{}", u64::MAX).as_str())
            .with_status(206)
            .with_header("content-range", "bytes 4-9/10")
            .with_body("456789")
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let destination = dir.path().join("out.bin");
        let mut reports = Vec::new();

        let bytes = client(&server)
            .with_chunk_size(u64::MAX)
            .download(&target(), &destination, |p| reports.push(p.percent()))
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(bytes, 10);
        assert_eq!(std::fs::read(&destination).unwrap(), b"0123456789");
        assert_eq!(reports, vec![40, 100]);
    }

    #[tokio::test]
    async fn zero_chunk_size_requests_single_bytes() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/files/abc")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .match_header("range", "bytes=0-0")
            .with_status(206)
            .with_header("content-range", "bytes 0-0/1")
            .with_body("x")
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let destination = dir.path().join("one.bin");

        let bytes = client(&server)
            .with_chunk_size(0)
            .download(&target(), &destination, |_| {})
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, 1);
    }
}

mod fetcher {
    use super::*;

    #[tokio::test]
    async fn not_found_creates_no_output() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"files": []}).to_string())
            .create_async()
            .await;
        let download = server
            .mock("GET", Matcher::Regex("^/files/.+".to_string()))
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let destination = dir.path().join("nostrcube");
        let client = client(&server);
        let mut fetcher = Fetcher::new(&client);

        let result = fetcher
            .fetch_latest("folder", "nostrcube", &destination, |_| {})
            .await;

        assert!(result.is_err());
        assert_eq!(fetcher.state(), FetchState::NotFound);
        assert!(!destination.exists());
        download.assert_async().await;
    }

    #[tokio::test]
    async fn downloads_newest_match() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(newest_query("folder", "nostrcube"))
            .with_status(200)
            .with_body(
                json!({"files": [
                    {"id": "new", "name": "nostrcube", "createdTime": "2024-06-01T00:00:00Z"}
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/files/new")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .with_status(206)
            .with_header("content-range", "bytes 0-4/5")
            .with_body("cube!")
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let destination = dir.path().join("nostrcube.zip");
        let client = client(&server);
        let mut fetcher = Fetcher::new(&client);
        let mut last_percent = None;

        let outcome = fetcher
            .fetch_latest("folder", "nostrcube", &destination, |p| {
                last_percent = Some(p.percent())
            })
            .await
            .unwrap();

        assert_eq!(fetcher.state(), FetchState::Complete);
        assert_eq!(outcome.file.id, "new");
        assert_eq!(outcome.path, destination);
        assert_eq!(outcome.bytes, 5);
        assert_eq!(last_percent, Some(100));
        assert_eq!(std::fs::read(&destination).unwrap(), b"cube!");
    }

    #[tokio::test]
    async fn fetcher_runs_once() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"files": []}).to_string())
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let destination = dir.path().join("x");
        let client = client(&server);
        let mut fetcher = Fetcher::new(&client);

        let _ = fetcher
            .fetch_latest("folder", "x", &destination, |_| {})
            .await;
        let second = fetcher
            .fetch_latest("folder", "x", &destination, |_| {})
            .await;

        assert!(second.is_err());
        assert_eq!(fetcher.state(), FetchState::NotFound);
    }
}

mod error_handling {
    use drive_fetch::DriveError;

    #[test]
    fn test_error_display() {
        let err = DriveError::ApiError {
            status: 403,
            message: "Insufficient Permission".to_string(),
        };

        let display = format!("{}", err);
        assert!(display.contains("403"));
        assert!(display.contains("Insufficient Permission"));
    }

    #[test]
    fn test_not_found_display() {
        let err = DriveError::FileNotFound {
            name: "nostrcube".to_string(),
            folder: "1PX5".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No file named 'nostrcube' found in folder 1PX5"
        );
    }
}
