//! Remote shortener and rater against a mock chat-completions server

use mockito::Matcher;
use prompt_compressor::compression::{
    compress_to_target, compression_directive, LlmShortener, LoopOutcome, Segment,
    ShortenRequest, ShortenerError, TextShortener, WordCounter,
};
use prompt_compressor::config::LlmConfig;
use prompt_compressor::llm::LlmError;
use prompt_compressor::pipeline::{LlmRater, Pipeline, RelevanceRater, RunOptions, UniformRater};
use prompt_compressor::Config;
use secrecy::SecretString;
use serde_json::json;
use std::sync::Arc;

fn config(server: &mockito::Server) -> LlmConfig {
    LlmConfig {
        endpoint: format!("{}/v1/chat/completions", server.url()),
        api_key: Some(SecretString::new("test-key".to_string())),
        max_retries: 2,
        retry_backoff_ms: 1,
        ..LlmConfig::default()
    }
}

fn completion(content: &str) -> String {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    })
    .to_string()
}

#[tokio::test]
async fn test_shortener_sends_directive_and_strips_fence() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({"model": "gpt-4.1", "max_tokens": 2048})),
            Matcher::Regex("Aim for <= 7 tokens".to_string()),
            Matcher::Regex("```md".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("```md\nshort text\n```"))
        .create_async()
        .await;

    let shortener = LlmShortener::new(config(&server)).unwrap();
    let directive = compression_directive(7, None);
    let out = shortener
        .shorten(ShortenRequest {
            text: "one two three four five six seven eight nine ten",
            max_tokens: 7,
            directive: &directive,
            intent: None,
        })
        .await
        .unwrap();

    assert_eq!(out, "short text");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_loop_accepts_remote_rewrite() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("brief version"))
        .create_async()
        .await;

    let shortener = LlmShortener::new(config(&server)).unwrap();
    let mut segments = vec![Segment::new(
        0,
        "one two three four five six seven eight nine ten",
        0,
        &WordCounter,
    )];

    let report = compress_to_target(&mut segments, 5, &shortener, &WordCounter, None)
        .await
        .unwrap();

    assert_eq!(report.outcome, LoopOutcome::Converged);
    assert_eq!(segments[0].text, "brief version");
    assert_eq!(segments[0].token_count, 2);
}

#[tokio::test]
async fn test_null_content_is_treated_as_no_rewrite() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"choices": [{"message": {"role": "assistant", "content": null}}]}).to_string())
        .create_async()
        .await;

    let shortener = LlmShortener::new(config(&server)).unwrap();
    let mut segments = vec![Segment::new(0, "alpha beta gamma delta", 0, &WordCounter)];

    let report = compress_to_target(&mut segments, 2, &shortener, &WordCounter, None)
        .await
        .unwrap();

    assert_eq!(report.outcome, LoopOutcome::Stalled);
    assert_eq!(segments[0].text, "alpha beta gamma delta");
}

#[tokio::test]
async fn test_server_errors_are_retried_then_surface() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(503)
        .with_body("overloaded")
        .expect(2)
        .create_async()
        .await;

    let shortener = LlmShortener::new(config(&server)).unwrap();
    let mut segments = vec![Segment::new(0, "alpha beta gamma delta", 0, &WordCounter)];

    let err = compress_to_target(&mut segments, 2, &shortener, &WordCounter, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ShortenerError::Llm(LlmError::Api(ref msg)) if msg.contains("503")));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(401)
        .with_body("bad key")
        .expect(1)
        .create_async()
        .await;

    let shortener = LlmShortener::new(config(&server)).unwrap();
    let directive = compression_directive(3, None);
    let err = shortener
        .shorten(ShortenRequest { text: "a b c d", max_tokens: 3, directive: &directive, intent: None })
        .await
        .unwrap_err();

    assert!(matches!(err, ShortenerError::Llm(LlmError::Api(_))));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_llm_rater_applies_scores() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::Regex("Author intent: installation".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion(
            "```json\n{\"scores\":[{\"index\":0,\"score\":9},{\"index\":1,\"score\":1.5}]}\n```",
        ))
        .create_async()
        .await;

    let rater = LlmRater::new(config(&server)).unwrap();
    let mut segments = vec![
        Segment::new(0, "How to install", 0, &WordCounter),
        Segment::new(1, "Project history", 15, &WordCounter),
        Segment::new(2, "Unscored chunk", 31, &WordCounter),
    ];

    rater.rate(&mut segments, Some("installation")).await.unwrap();

    assert_eq!(segments[0].relevance_score, 9.0);
    assert_eq!(segments[1].relevance_score, 1.5);
    assert_eq!(segments[2].relevance_score, 5.0);
}

#[tokio::test]
async fn test_remote_rewrite_keeps_following_heading_on_its_own_line() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("```md\n# Title\n\nShort intro.\n```"))
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("prompt.md");
    std::fs::write(
        &input,
        "# Title\n\nA fairly long intro that rambles on about many things for quite a while.\n\n## Usage\n\nRun.\n",
    )
    .unwrap();

    let pipeline = Pipeline::new(
        Config::default(),
        Arc::new(WordCounter),
        Arc::new(LlmShortener::new(config(&server)).unwrap()),
        Arc::new(UniformRater),
    );

    let summary = pipeline
        .run(&RunOptions { input, reduce_by: "0.3".to_string(), intent: None })
        .await
        .unwrap();

    let output = std::fs::read_to_string(&summary.output).unwrap();
    assert_eq!(output, "# Title\n\nShort intro.\n\n## Usage\n\nRun.\n");
}
