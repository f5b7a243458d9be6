//! Assistant built from configuration against a mock backend.

use omni::agent::Assistant;
use omni::config::{OmniConfig, ProviderKind, ProviderSettings};
use omni::error::OmniError;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ollama_config(base_url: String) -> OmniConfig {
    OmniConfig {
        provider: ProviderKind::Ollama,
        ollama: ProviderSettings {
            base_url: Some(base_url),
            ..Default::default()
        },
        ..OmniConfig::default()
    }
}

#[tokio::test]
async fn from_config_loads_builtins_and_answers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "Hello there."},
            "done": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut assistant = Assistant::from_config(&ollama_config(server.uri()))
        .await
        .unwrap();

    let tools = assistant.list_capabilities();
    for name in ["create_folder", "edit_file", "read_file"] {
        assert!(tools.iter().any(|t| t == name), "missing {name}");
    }

    assert_eq!(assistant.send("hi").await, "Hello there.");
    assert_eq!(assistant.session().len(), 2);
    assert_eq!(assistant.token_usage().used(), 0);
}

#[tokio::test]
async fn structured_provider_requires_api_key() {
    let config = OmniConfig {
        provider: ProviderKind::Openai,
        ..OmniConfig::default()
    };
    let err = Assistant::from_config(&config).await.unwrap_err();
    assert!(matches!(err, OmniError::Authentication(_)));
}

#[tokio::test]
async fn out_of_range_temperature_is_rejected() {
    let config = OmniConfig {
        temperature: 1.5,
        ..ollama_config("http://localhost:11434".into())
    };
    let err = Assistant::from_config(&config).await.unwrap_err();
    assert!(matches!(err, OmniError::Configuration(_)));
}
