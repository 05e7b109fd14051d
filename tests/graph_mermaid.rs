use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use clipping_agents::agents::{clipping_agent_graph, math_agent_graph};
use clipping_agents::{StubModel, ToolRegistry};
use wiremock::matchers::{method, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn math_graph_diagram() {
    let graph = math_agent_graph(StubModel::new(Vec::new()), false).compile().unwrap();
    let diagram = graph.draw_mermaid();

    let edges: Vec<&str> = diagram
        .lines()
        .map(str::trim)
        .filter(|line| line.contains("-->") || line.contains("-.->"))
        .collect();
    assert_eq!(
        edges,
        vec![
            "__start__ --> assistant;",
            "assistant -.-> __end__;",
            "assistant -.-> tools;",
            "tools --> assistant;",
        ]
    );
    assert!(diagram.contains("__end__([<p>__end__</p>]):::last"));
}

#[test]
fn clipping_graph_diagram() {
    let graph = clipping_agent_graph(StubModel::new(Vec::new()), ToolRegistry::new(), false)
        .compile()
        .unwrap();
    let diagram = graph.draw_mermaid();

    assert!(diagram.contains("\t__start__ --> query_writer;\n"));
    assert!(diagram.contains("\tquery_writer --> search_agent;\n"));
    assert!(diagram.contains("\tsearch_agent -.-> tools;\n"));
    assert!(diagram.contains("\tsearch_agent -.-> __end__;\n"));
    assert!(diagram.contains("\ttools --> search_agent;\n"));
    // the redundant static edge to the end node is not drawn twice
    assert!(!diagram.contains("search_agent --> __end__"));
}

#[tokio::test]
async fn png_is_rendered_from_the_encoded_diagram() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/img/[A-Za-z0-9_=-]+$"))
        .and(query_param("type", "png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG fake".to_vec()))
        .mount(&server)
        .await;

    let graph = math_agent_graph(StubModel::new(Vec::new()), false).compile().unwrap();
    let png = graph.draw_mermaid_png_with(&server.uri()).await.unwrap();
    assert_eq!(png, b"\x89PNG fake".to_vec());

    let requests = server.received_requests().await.unwrap();
    let encoded = requests[0].url.path().trim_start_matches("/img/").to_string();
    let decoded = URL_SAFE.decode(encoded).unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), graph.draw_mermaid());
}

#[tokio::test]
async fn render_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let graph = math_agent_graph(StubModel::new(Vec::new()), false).compile().unwrap();
    assert!(graph.draw_mermaid_png_with(&server.uri()).await.is_err());
}

#[tokio::test]
async fn saves_mermaid_source_into_new_directories() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("diagrams").join("math").join("graph.mmd");
    let graph = math_agent_graph(StubModel::new(Vec::new()), false).compile().unwrap();

    graph.save_mermaid(&output).await.unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written, graph.draw_mermaid());
}
