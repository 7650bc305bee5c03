use media_chat::{
    ai::{ContentPart, FileState, MockClientFactory, MockContentClient, MockFileStore},
    app::{App, AppServices},
    documents::MockTextExtractor,
    models::{ChatRequest, Config, GenerationSettings, MediaKind, ModelChoice, Upload},
    polling::{Backoff, PollPolicy},
    Error,
};
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_poll() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(5),
        max_interval: Duration::from_millis(10),
        backoff: Backoff::Fibonacci,
        max_wait: Duration::from_secs(5),
    }
}

fn mock_app(
    factory: &MockClientFactory,
    extractor: MockTextExtractor,
    staging: &tempfile::TempDir,
) -> App {
    let config = Config {
        staging_dir: staging.path().to_path_buf(),
        poll: fast_poll(),
        ..Config::default()
    };

    App::with_services(
        AppServices {
            factory: Box::new(factory.clone()),
            extractor: Box::new(extractor),
        },
        &config,
    )
    .unwrap()
}

fn remote_file_json(state: &str) -> serde_json::Value {
    serde_json::json!({
        "name": "files/clip-1",
        "uri": "https://generativelanguage.googleapis.com/v1beta/files/clip-1",
        "mimeType": "video/mp4",
        "displayName": "clip.mp4",
        "state": state,
        "sizeBytes": "16",
        "createTime": "2024-05-14T10:00:00.000000Z",
        "expirationTime": "2024-05-16T10:00:00.000000Z"
    })
}

#[tokio::test]
async fn test_full_workflow_with_mocks() {
    let content = MockContentClient::new()
        .with_token_count(7)
        .with_response("The report covers Q1 and Q2.".to_string())
        .with_response("A dog runs along a beach.".to_string());
    let files = MockFileStore::new().with_states(vec![FileState::Processing, FileState::Active]);
    let factory = MockClientFactory::new(content.clone(), files.clone());
    let extractor = MockTextExtractor::new()
        .with_document(vec!["Q1 revenue. ", "Q1 costs. "])
        .with_document(vec!["Q2 revenue."]);
    let staging = tempfile::tempdir().unwrap();
    let app = mock_app(&factory, extractor, &staging);

    // PDFs: text is extracted locally and counted before the question is asked
    let pdf = ChatRequest::new(MediaKind::Pdf)
        .with_api_key("user-key")
        .with_prompt("What does the report cover?")
        .with_upload(Upload::new("q1.pdf", b"%PDF-1.4 q1".to_vec()))
        .with_upload(Upload::new("q2.pdf", b"%PDF-1.4 q2".to_vec()));
    let outcome = app.run(pdf).await.unwrap();

    assert_eq!(outcome.token_count, Some(7));
    assert_eq!(outcome.text.as_deref(), Some("The report covers Q1 and Q2."));
    assert_eq!(
        content.get_counted_texts(),
        vec!["Q1 revenue. Q1 costs. Q2 revenue.".to_string()]
    );
    assert_eq!(files.get_upload_count(), 0);

    // Video: uploaded, polled until active, answered, then deleted
    let video = ChatRequest::new(MediaKind::Video)
        .with_api_key("user-key")
        .with_model(ModelChoice::Gemini15Pro)
        .with_prompt("What happens in this clip?")
        .with_upload(Upload::new("beach.mp4", b"\x00\x00\x00\x18ftypmp42".to_vec()));
    let outcome = app.run(video).await.unwrap();

    assert_eq!(outcome.text.as_deref(), Some("A dog runs along a beach."));
    assert_eq!(outcome.deleted_file.as_deref(), Some("files/mock-1"));
    assert!(outcome.token_count.is_none());
    assert_eq!(files.get_poll_count(), 1);
    assert_eq!(files.get_deleted(), vec!["files/mock-1".to_string()]);

    // The staged copy does not outlive the upload
    assert!(!staging.path().join("beach.mp4").exists());

    assert_eq!(
        factory.get_connections(),
        vec![
            ("user-key".to_string(), ModelChoice::Gemini15Flash),
            ("user-key".to_string(), ModelChoice::Gemini15Pro),
        ]
    );
}

#[tokio::test]
async fn test_missing_key_stops_every_media_kind() {
    let factory = MockClientFactory::default();
    let staging = tempfile::tempdir().unwrap();
    let app = mock_app(&factory, MockTextExtractor::new(), &staging);

    for media in MediaKind::ALL {
        let request = ChatRequest::new(media)
            .with_prompt("anything")
            .with_upload(Upload::new("input.bin", vec![1, 2, 3]));
        let err = app.run(request).await.unwrap_err();
        assert!(matches!(err, Error::MissingApiKey));
        assert_eq!(err.to_string(), "Please enter your Google API key to proceed");
    }

    assert!(factory.get_connections().is_empty());
}

#[tokio::test]
async fn test_image_audio_and_video_share_one_pipeline() {
    for (media, file_name, bytes, mime) in [
        (MediaKind::Image, "cat.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg"),
        (MediaKind::Audio, "talk.mp3", b"ID3\x04".to_vec(), "audio/mpeg"),
        (MediaKind::Video, "clip.mp4", b"\x00\x00\x00\x18ftypisom".to_vec(), "video/mp4"),
    ] {
        let content = MockContentClient::new();
        let files = MockFileStore::new();
        let factory = MockClientFactory::new(content.clone(), files.clone());
        let staging = tempfile::tempdir().unwrap();
        let app = mock_app(&factory, MockTextExtractor::new(), &staging);

        let request = ChatRequest::new(media)
            .with_api_key("k")
            .with_settings(GenerationSettings::new(0.5, 0.9, 1200))
            .with_prompt("Describe it")
            .with_upload(Upload::new(file_name, bytes));
        app.run(request).await.unwrap();

        assert_eq!(files.get_uploads(), vec![(file_name.to_string(), mime.to_string())]);
        assert_eq!(files.get_deleted().len(), 1);

        let sent = content.get_requests();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0].parts[0], ContentPart::File { .. }));
        assert_eq!(sent[0].parts[1], ContentPart::text("Describe it"));
        assert_eq!(sent[0].config.max_output_tokens, 1200);
    }
}

#[tokio::test]
async fn test_processing_timeout_cleans_up_remote_file() {
    let files = MockFileStore::new().with_states(vec![FileState::Processing]);
    let factory = MockClientFactory::new(MockContentClient::new(), files.clone());
    let staging = tempfile::tempdir().unwrap();
    let config = Config {
        staging_dir: staging.path().to_path_buf(),
        poll: PollPolicy {
            max_wait: Duration::from_millis(30),
            ..fast_poll()
        },
        ..Config::default()
    };
    let app = App::with_services(
        AppServices {
            factory: Box::new(factory.clone()),
            extractor: Box::new(MockTextExtractor::new()),
        },
        &config,
    )
    .unwrap();

    let request = ChatRequest::new(MediaKind::Video)
        .with_api_key("k")
        .with_prompt("Describe")
        .with_upload(Upload::new("long.mp4", vec![0; 32]));
    let err = app.run(request).await.unwrap_err();

    assert!(matches!(err, Error::ProcessingTimeout { .. }));
    assert_eq!(files.get_deleted(), vec!["files/mock-1".to_string()]);
}

#[tokio::test]
async fn test_video_round_trip_against_gemini_rest() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .and(header("x-goog-api-key", "rest-key"))
        .and(header("Content-Type", "video/mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "file": remote_file_json("PROCESSING") })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1beta/files/clip-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(remote_file_json("ACTIVE")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/v1beta/models/gemini-1\.5-flash:generateContent$"))
        .and(body_partial_json(serde_json::json!({
            "contents": [{
                "parts": [
                    { "fileData": {
                        "mimeType": "video/mp4",
                        "fileUri": "https://generativelanguage.googleapis.com/v1beta/files/clip-1"
                    } },
                    { "text": "Summarise the clip" }
                ]
            }],
            "generationConfig": { "maxOutputTokens": 2000 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Waves roll in." }] }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/v1beta/files/clip-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let config = Config {
        gemini_base_url: server.uri(),
        staging_dir: staging.path().to_path_buf(),
        poll: fast_poll(),
        ..Config::default()
    };
    let app = App::new(&config).unwrap();

    let request = ChatRequest::new(MediaKind::Video)
        .with_api_key("rest-key")
        .with_prompt("Summarise the clip")
        .with_upload(Upload::new("clip.mp4", b"\x00\x00\x00\x18ftypisom".to_vec()));
    let outcome = app.run(request).await.unwrap();

    assert_eq!(outcome.text.as_deref(), Some("Waves roll in."));
    assert_eq!(outcome.deleted_file.as_deref(), Some("files/clip-1"));
}

#[test]
fn test_config_from_lookup_reads_polling_settings() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("GEMINI_API_KEY", "env-key"),
        ("POLL_INTERVAL_SECS", "2"),
        ("POLL_BACKOFF", "fibonacci"),
        ("POLL_MAX_WAIT_SECS", "90"),
        ("MAX_UPLOAD_MB", "8"),
    ]);

    let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

    assert_eq!(config.gemini_api_key.as_deref(), Some("env-key"));
    assert_eq!(config.poll.interval, Duration::from_secs(2));
    assert_eq!(config.poll.backoff, Backoff::Fibonacci);
    assert_eq!(config.poll.max_wait, Duration::from_secs(90));
    assert_eq!(config.max_upload_bytes, 8 * 1024 * 1024);
    assert_eq!(config.bind_addr, "127.0.0.1:8501");
}
