use clipping_agents::{
    AgentError, AzureInferenceClient, AzureOpenAIClient, LanguageModel, Message, OpenAIClient,
    ToolRegistry,
};
use futures::StreamExt;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(message: Value) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": message, "finish_reason": "stop"}],
    })
}

async fn request_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    serde_json::from_slice(&requests[0].body).unwrap()
}

#[tokio::test]
async fn openai_sends_tools_and_parses_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_abc",
                "type": "function",
                "function": {"name": "add", "arguments": "{\"a\":3,\"b\":4}"},
            }],
        }))))
        .mount(&server)
        .await;

    let client = OpenAIClient::new("test-key").unwrap().with_base_url(server.uri());
    let tools = clipping_agents::tools::calculator_toolkit().describe();
    let completion = client
        .complete_chat(&[Message::user("Soma 3 e 4.")], &tools, false)
        .await
        .unwrap();

    assert_eq!(completion.content, None);
    assert_eq!(completion.tool_calls.len(), 1);
    assert_eq!(completion.tool_calls[0].id.as_deref(), Some("call_abc"));
    assert_eq!(completion.tool_calls[0].name, "add");
    assert_eq!(completion.tool_calls[0].arguments, json!({"a": 3, "b": 4}));

    let body = request_body(&server).await;
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["tools"].as_array().unwrap().len(), 3);
    assert_eq!(body["tools"][0]["function"]["name"], "add");
    assert_eq!(body["tool_choice"], "auto");
}

#[tokio::test]
async fn tool_messages_carry_their_call_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(json!({"role": "assistant", "content": "7"}))),
        )
        .mount(&server)
        .await;

    let call = clipping_agents::ToolCall {
        id: Some("call_1".into()),
        name: "add".into(),
        arguments: json!({"a": 3, "b": 4}),
    };
    let history = vec![
        Message::user("Soma 3 e 4."),
        Message::assistant_with_tool_calls("", vec![call.clone()]),
        Message::tool_result(&call, json!(7)),
    ];
    let client = OpenAIClient::new("k").unwrap().with_base_url(server.uri());
    let completion = client.complete_chat(&history, &[], false).await.unwrap();
    assert_eq!(completion.content.as_deref(), Some("7"));

    let body = request_body(&server).await;
    assert!(body["messages"][1]["content"].is_null());
    assert_eq!(body["messages"][1]["tool_calls"][0]["function"]["arguments"], "{\"a\":3,\"b\":4}");
    assert_eq!(body["messages"][2]["role"], "tool");
    assert_eq!(body["messages"][2]["tool_call_id"], "call_1");
    assert!(body.get("tools").is_none());
}

#[tokio::test]
async fn rate_limit_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let client = OpenAIClient::new("k").unwrap().with_base_url(server.uri());
    let err = client
        .complete_chat(&[Message::user("hi")], &[], false)
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::LanguageModel(ref msg) if msg.contains("rate limit")));
}

#[tokio::test]
async fn azure_openai_uses_deployment_url_and_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/deployments/gpt-4o-mini/chat/completions"))
        .and(query_param("api-version", "2024-12-01-preview"))
        .and(header("api-key", "azure-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(json!({"role": "assistant", "content": "Brasília"}))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = AzureOpenAIClient::new(&server.uri(), "gpt-4o-mini", "azure-key", None).unwrap();
    let completion = client
        .complete_chat(&[Message::user("Qual é a capital do Brasil?")], &[], false)
        .await
        .unwrap();
    assert_eq!(completion.content.as_deref(), Some("Brasília"));
    assert!(request_body(&server).await.get("model").is_none());
}

#[tokio::test]
async fn azure_inference_names_the_model_in_the_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(query_param("api-version", "2024-05-01-preview"))
        .and(header("api-key", "foundry-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(json!({"role": "assistant", "content": "ok"}))),
        )
        .mount(&server)
        .await;

    let client = AzureInferenceClient::new(&server.uri(), "foundry-key", "phi-4").unwrap();
    client
        .complete_chat(&[Message::user("hi")], &ToolRegistry::new().describe(), false)
        .await
        .unwrap();
    assert_eq!(request_body(&server).await["model"], "phi-4");
}

fn sse(events: &[Value]) -> String {
    let mut body: String = events.iter().map(|event| format!("data: {event}\n\n")).collect();
    body.push_str("data: [DONE]\n\n");
    body
}

#[tokio::test]
async fn perplexity_stream_yields_deltas_in_order() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}}]}),
        json!({"choices": [{"index": 0, "delta": {"content": "O Paraná "}}]}),
        json!({"choices": [{"index": 0, "delta": {"content": "Clube venceu."}}]}),
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer pplx-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = OpenAIClient::perplexity("pplx-key")
        .unwrap()
        .with_base_url(server.uri());
    let stream = clipping_agents::agents::stream_perplexity(&client, "Paraná Clube?")
        .await
        .unwrap();
    let deltas: Vec<String> = stream.map(|delta| delta.unwrap()).collect().await;
    assert_eq!(deltas, vec!["O Paraná ", "Clube venceu."]);

    let request = request_body(&server).await;
    assert_eq!(request["model"], "sonar-pro");
    assert_eq!(request["stream"], true);
    assert_eq!(request["messages"][0]["role"], "system");
}

#[tokio::test]
async fn streamed_completion_assembles_tool_calls() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "id": "call_9", "type": "function", "function": {"name": "multiply", "arguments": "{\"a\":"}}
        ]}}]}),
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "7,\"b\":2}"}}
        ]}}]}),
    ]);
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = OpenAIClient::new("k").unwrap().with_base_url(server.uri());
    let completion = client
        .complete_chat(&[Message::user("7 * 2")], &[], true)
        .await
        .unwrap();
    assert_eq!(completion.content, None);
    assert_eq!(completion.tool_calls.len(), 1);
    assert_eq!(completion.tool_calls[0].id.as_deref(), Some("call_9"));
    assert_eq!(completion.tool_calls[0].arguments, json!({"a": 7, "b": 2}));
}

#[tokio::test]
async fn ask_perplexity_returns_the_whole_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            json!({"role": "assistant", "content": "Últimas notícias..."}),
        )))
        .mount(&server)
        .await;

    let client = OpenAIClient::perplexity("k").unwrap().with_base_url(server.uri());
    let answer = clipping_agents::agents::ask_perplexity(&client, "Paraná Clube?")
        .await
        .unwrap();
    assert_eq!(answer, "Últimas notícias...");
}
