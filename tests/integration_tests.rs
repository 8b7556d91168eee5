use futures::StreamExt;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use replyai::config::{EndpointConfig, ReplyAiConfig};
use replyai::error::{BackendErrorKind, Error};
use replyai::request::{GenerationOptions, GenerationParams, Tone};
use replyai::router::{default_model, EDGE_PLACEHOLDER_CREDENTIAL};
use replyai::{ProviderKind, ProviderRouter, ReplyOrchestrator, StreamEvent};

fn init_logging()
{   let _ = env_logger::builder().is_test(true).try_init();
}

/// Edge-routed config pointing at a mock server
fn edge_config(server: &MockServer, key: Option<&str>) -> ReplyAiConfig
{   let mut config = ReplyAiConfig::default();
    config.edge = EndpointConfig::new(server.uri());
    config.provider.edge_api_key = key.map(String::from);
    config
}

/// Gateway-routed config pointing at a mock server
fn gateway_config(server: &MockServer, key: Option<&str>) -> ReplyAiConfig
{   let mut config = ReplyAiConfig::default();
    config.provider.use_gateway = true;
    config.gateway = EndpointConfig::new(server.uri());
    config.provider.gateway_api_key = key.map(String::from);
    config
}

fn edge_path() -> String
{   format!("/{}", default_model(ProviderKind::Edge))
}

fn legacy_edge_body(text: &str) -> serde_json::Value
{   json!({
      "output": text,
      "job_id": "job-42",
      "latency_ms": 120,
      "cost_milli": 2
    })
}

#[tokio::test]
async fn test_edge_generates_requested_variations()
{   init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path(edge_path()))
      .and(header("authorization", "Bearer edge-key"))
      .and(body_partial_json(json!({
        "input": {
          "max_tokens": 512,
          "stream": false
        }
      })))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(legacy_edge_body("\"Love this launch!\""))
      )
      .expect(3)
      .mount(&server)
      .await;

    let orchestrator = ReplyOrchestrator::from_config(
      edge_config(&server, Some("edge-key"))
    );
    let options = GenerationOptions::new("We just shipped v2")
      .with_tone(Tone::Supportive)
      .with_variations(3);

    let batch = assert_ok!(orchestrator.generate_replies(&options).await);
    assert_eq!(batch.replies.len(), 3);
    assert!(batch.replies.iter().all(|r| r == "Love this launch!"));
    assert_eq!(batch.characters_used, vec![17, 17, 17]);
    assert_eq!(batch.provider, ProviderKind::Edge);
    assert_eq!(batch.model_used, default_model(ProviderKind::Edge));
}

#[tokio::test]
async fn test_edge_without_key_uses_placeholder_credential()
{   init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path(edge_path()))
      .and(header(
        "authorization",
        format!("Bearer {}", EDGE_PLACEHOLDER_CREDENTIAL).as_str()
      ))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(legacy_edge_body("ok"))
      )
      .expect(1)
      .mount(&server)
      .await;

    let config = edge_config(&server, None);
    let resolved = assert_ok!(ProviderRouter::new(config.clone()).resolve(None));
    assert!(resolved.degraded);

    let orchestrator = ReplyOrchestrator::from_config(config);
    let batch = assert_ok!(
      orchestrator.generate_replies(&GenerationOptions::new("gm")).await
    );
    assert_eq!(batch.replies, vec!["ok".to_string()]);
}

#[tokio::test]
async fn test_edge_chat_shaped_response_is_accepted()
{   init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/custom_model"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"content": "chat shaped"}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 3}
      })))
      .mount(&server)
      .await;

    let router = ProviderRouter::new(edge_config(&server, Some("k")));
    let adapter = assert_ok!(router.connect(Some("custom_model")));
    let result = assert_ok!(
      adapter.generate("hi", &GenerationParams::default()).await
    );
    assert_eq!(result.text, "chat shaped");
    assert_eq!(result.usage.total_tokens, 13);
    assert!(result.provider_metadata.edge().is_some());
}

#[tokio::test]
async fn test_edge_non_success_status_is_backend_error()
{   init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path(edge_path()))
      .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
      .expect(1)
      .mount(&server)
      .await;

    let orchestrator = ReplyOrchestrator::from_config(
      edge_config(&server, Some("k"))
    );
    let err = assert_err!(
      orchestrator.generate_replies(&GenerationOptions::new("gm")).await
    );
    assert_eq!(err, Error::backend(BackendErrorKind::Edge, Some(503), "overloaded"));
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn test_failure_on_third_variation_aborts_batch()
{   init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path(edge_path()))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(legacy_edge_body("fine"))
      )
      .up_to_n_times(2)
      .expect(2)
      .mount(&server)
      .await;

    Mock::given(method("POST"))
      .and(path(edge_path()))
      .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
      .expect(1)
      .mount(&server)
      .await;

    let orchestrator = ReplyOrchestrator::from_config(
      edge_config(&server, Some("k"))
    );
    let options = GenerationOptions::new("gm").with_variations(5);
    let err = assert_err!(orchestrator.generate_replies(&options).await);
    assert_eq!(err.backend_kind(), Some(BackendErrorKind::Edge));
}

#[tokio::test]
async fn test_invalid_count_makes_no_network_calls()
{   init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(legacy_edge_body("never"))
      )
      .expect(0)
      .mount(&server)
      .await;

    let orchestrator = ReplyOrchestrator::from_config(
      edge_config(&server, Some("k"))
    );
    for count in [0u8, 6]
    {   let options = GenerationOptions::new("gm").with_variations(count);
        let err = assert_err!(orchestrator.generate_replies(&options).await);
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.is_client_error());
    }
}

#[tokio::test]
async fn test_edge_timeout_surfaces_as_backend_error()
{   init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(legacy_edge_body("late"))
          .set_delay(std::time::Duration::from_secs(3))
      )
      .mount(&server)
      .await;

    let mut config = edge_config(&server, Some("k"));
    config.edge.timeout_secs = Some(1);
    let orchestrator = ReplyOrchestrator::from_config(config);
    let err = assert_err!(
      orchestrator.generate_replies(&GenerationOptions::new("gm")).await
    );
    assert!(matches!(
      err,
      Error::Backend { kind: BackendErrorKind::Edge, status: None, .. }
    ));
}

#[tokio::test]
async fn test_edge_stream_is_single_chunk()
{   init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(legacy_edge_body("whole reply"))
      )
      .expect(1)
      .mount(&server)
      .await;

    let router = ProviderRouter::new(edge_config(&server, Some("k")));
    let adapter = assert_ok!(router.connect(None));
    let stream = assert_ok!(
      adapter.stream("hi", &GenerationParams::default()).await
    );
    let events: Vec<_> = stream.collect().await;
    assert_eq!(events.len(), 2);
    assert_eq!(
      events[0].clone().unwrap(),
      StreamEvent::TextDelta("whole reply".to_string())
    );
    assert!(matches!(events[1], Ok(StreamEvent::Finish { .. })));
}

#[tokio::test]
async fn test_gateway_uses_explicit_model()
{   init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("authorization", "Bearer gw-key"))
      .and(body_partial_json(json!({
        "model": "vendor/custom:free",
        "stream": false
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "id": "gen-1",
        "model": "vendor/custom:free",
        "choices": [{"message": {"content": "hi"}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 5, "completion_tokens": 2}
      })))
      .expect(2)
      .mount(&server)
      .await;

    let orchestrator = ReplyOrchestrator::from_config(
      gateway_config(&server, Some("gw-key"))
    );
    let options = GenerationOptions::new("gm")
      .with_model("vendor/custom:free")
      .with_variations(2);
    let batch = assert_ok!(orchestrator.generate_replies(&options).await);
    assert_eq!(batch.replies, vec!["hi".to_string(), "hi".to_string()]);
    assert_eq!(batch.model_used, "vendor/custom:free");
    assert_eq!(batch.provider, ProviderKind::Gateway);
}

#[tokio::test]
async fn test_gateway_without_key_fails_before_any_call()
{   init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200))
      .expect(0)
      .mount(&server)
      .await;

    let orchestrator = ReplyOrchestrator::from_config(
      gateway_config(&server, None)
    );
    let err = assert_err!(
      orchestrator.generate_replies(&GenerationOptions::new("gm")).await
    );
    assert!(matches!(err, Error::Configuration(_)));
}

#[tokio::test]
async fn test_gateway_empty_choices_is_malformed()
{   init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(json!({"choices": []}))
      )
      .mount(&server)
      .await;

    let orchestrator = ReplyOrchestrator::from_config(
      gateway_config(&server, Some("k"))
    );
    let err = assert_err!(
      orchestrator.generate_replies(&GenerationOptions::new("gm")).await
    );
    assert_eq!(err.backend_kind(), Some(BackendErrorKind::MalformedResponse));
}

#[tokio::test]
async fn test_gateway_error_body_message_is_surfaced()
{   init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(401).set_body_json(json!({
        "error": {"message": "invalid key", "code": 401}
      })))
      .mount(&server)
      .await;

    let router = ProviderRouter::new(gateway_config(&server, Some("bad")));
    let adapter = assert_ok!(router.connect(None));
    let err = assert_err!(
      adapter.generate("hi", &GenerationParams::default()).await
    );
    assert_eq!(
      err,
      Error::backend(BackendErrorKind::Gateway, Some(401), "invalid key")
    );
}

#[tokio::test]
async fn test_gateway_streams_incrementally()
{   init_logging();
    let server = MockServer::start().await;

    let sse = concat!(
      ": processing\n\n",
      "data: {\"id\":\"gen-9\",\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
      "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
      "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2}}\n\n",
      "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(body_partial_json(json!({"stream": true})))
      .respond_with(
        ResponseTemplate::new(200)
          .insert_header("content-type", "text/event-stream")
          .set_body_string(sse)
      )
      .expect(1)
      .mount(&server)
      .await;

    let router = ProviderRouter::new(gateway_config(&server, Some("k")));
    let adapter = assert_ok!(router.connect(None));
    let stream = assert_ok!(
      adapter.stream("hi", &GenerationParams::default()).await
    );
    let events: Vec<StreamEvent> = stream
      .map(|e| e.expect("stream event"))
      .collect()
      .await;

    assert_eq!(events.len(), 3);
    assert_eq!(events[0], StreamEvent::TextDelta("Hel".to_string()));
    assert_eq!(events[1], StreamEvent::TextDelta("lo".to_string()));
    match &events[2]
    {   StreamEvent::Finish { usage, provider_metadata, .. } => {
          assert_eq!(usage.total_tokens, 5);
          assert_eq!(
            provider_metadata.gateway().unwrap().response_id.as_deref(),
            Some("gen-9")
          );
        }
      , other => panic!("expected finish, got {:?}", other)
    }
}

#[tokio::test]
async fn test_backend_handle_round_trip()
{   init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path(edge_path()))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(legacy_edge_body("from task"))
      )
      .expect(2)
      .mount(&server)
      .await;

    let backend = replyai::ReplyBackend::new(edge_config(&server, Some("k")));

    let mut rx = assert_ok!(
      backend
        .generate_replies(GenerationOptions::new("gm").with_variations(2))
        .await
    );
    match tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv()).await
    {   Ok(Some(result)) => {
          let batch = assert_ok!(result);
          assert_eq!(batch.replies.len(), 2);
        }
      , other => panic!("no reply from backend: {:?}", other.is_ok())
    }

    let mut rx = assert_ok!(backend.get_model_lists().await);
    let models = assert_ok!(rx.recv().await.expect("model list reply"));
    assert!(models.iter().any(|(k, _)| *k == ProviderKind::Gateway));
    assert!(models.iter().any(|(k, _)| *k == ProviderKind::Edge));

    assert_ok!(backend.shutdown().await);
}

#[tokio::test]
async fn test_backend_handle_reports_validation_errors()
{   let backend = replyai::ReplyBackend::new(ReplyAiConfig::default());
    let mut rx = assert_ok!(
      backend.generate_replies(GenerationOptions::new("")).await
    );
    let result = rx.recv().await.expect("reply");
    assert!(matches!(result, Err(Error::Validation(_))));
    let _ = backend.shutdown().await;
}

#[tokio::test]
#[ignore]
async fn test_live_generation()
{   init_logging();
    let config = match ReplyAiConfig::from_env()
    {   Ok(c) => c,
        Err(e) => {
          println!("Skipping: {}", e);
          return;
        }
    };
    if config.provider.use_gateway
      && config.provider.gateway_api_key.is_none()
    {   println!("Skipping: REPLYAI_GATEWAY_API_KEY not set");
        return;
    }

    let orchestrator = ReplyOrchestrator::from_config(config);
    match orchestrator
      .generate_replies(&GenerationOptions::new("Rust 2024 edition is out!"))
      .await
    {   Ok(batch) => {
          println!("Reply from {}: {:?}", batch.model_used, batch.replies);
          assert_eq!(batch.replies.len(), 1);
        }
      , Err(e) => {
          println!("Live generation failed: {}", e);
        }
    }
}
