use clipping_agents::tools::{web_search_toolkit, TavilyClient, WebSearchConfig};
use clipping_agents::AgentError;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> WebSearchConfig {
    WebSearchConfig {
        api_key: Some("tvly-key".into()),
        base_url: server.uri(),
        ..WebSearchConfig::default()
    }
}

async fn mount_results(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("authorization", "Bearer tvly-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": "capital do Brasil",
            "answer": null,
            "results": [
                {"title": "Brasília", "url": "https://pt.wikipedia.org/wiki/Bras%C3%ADlia", "content": "Brasília é a capital federal do Brasil.", "score": 0.98},
                {"title": "Capitais", "url": "https://example.com/capitais", "content": "Lista de capitais."}
            ],
            "response_time": 0.7
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn client_sends_defaults_and_parses_results() {
    let server = MockServer::start().await;
    mount_results(&server).await;

    let client = TavilyClient::from_config(&config(&server)).unwrap();
    let response = client.search("capital do Brasil", None).await.unwrap();

    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].title, "Brasília");
    assert_eq!(response.results[0].score, Some(0.98));
    assert_eq!(response.results[1].score, None);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body, json!({"query": "capital do Brasil", "topic": "general", "max_results": 5}));
}

#[tokio::test]
async fn web_search_tool_returns_the_results() {
    let server = MockServer::start().await;
    mount_results(&server).await;

    let tools = web_search_toolkit(&config(&server)).unwrap();
    assert_eq!(tools.names(), vec!["web_search".to_string()]);

    let output = tools
        .call("web_search", json!({"query": "capital do Brasil", "max_results": 2}))
        .await
        .unwrap();
    assert_eq!(output["query"], "capital do Brasil");
    assert_eq!(output["results"][0]["url"], "https://pt.wikipedia.org/wiki/Bras%C3%ADlia");

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["max_results"], 2);
}

#[tokio::test]
async fn failed_search_is_a_search_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let client = TavilyClient::from_config(&config(&server)).unwrap();
    let err = client.search("anything", None).await.unwrap_err();
    assert!(matches!(err, AgentError::Search(ref msg) if msg.contains("401")));
}

#[test]
fn missing_api_key_is_a_config_error() {
    let err = web_search_toolkit(&WebSearchConfig::default()).err().unwrap();
    assert!(matches!(err, AgentError::Config(_)));
}
