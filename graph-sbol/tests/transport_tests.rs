//! HTTP behaviour of the transport against a stub endpoint

use graph_sbol::{ClientConfig, QueryError, SparqlTransport, SPARQL_RESULTS_JSON};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const QUERY: &str = "SELECT DISTINCT ?design WHERE {\n  ?collection sbol:member ?design .\n}\n";

fn results() -> serde_json::Value {
    json!({
        "head": {"vars": ["design"]},
        "results": {"bindings": [
            {"design": {"type": "uri", "value": "https://hub.example.org/design/a"}},
            {"design": {"type": "uri", "value": "https://hub.example.org/design/b"}}
        ]}
    })
}

fn transport(server: &MockServer) -> SparqlTransport {
    SparqlTransport::new(ClientConfig::new(server.uri())).unwrap()
}

async fn sent_query(server: &MockServer) -> String {
    let requests = server.received_requests().await.unwrap();
    let request = requests
        .iter()
        .rev()
        .find(|r| r.url.path() == "/sparql")
        .unwrap();
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == "query")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("email=alice"))
        .and(body_string_contains("password=hunter2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("tok123\n"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_anonymous_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sparql"))
        .and(header("Accept", SPARQL_RESULTS_JSON))
        .respond_with(ResponseTemplate::new(200).set_body_json(results()))
        .expect(1)
        .mount(&server)
        .await;

    let rows = transport(&server).execute(QUERY).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].value("design"), Some("https://hub.example.org/design/b"));
    assert_eq!(sent_query(&server).await, QUERY);
    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("x-authorization"));
}

#[tokio::test]
async fn test_login_scopes_queries() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/sparql"))
        .and(header("X-authorization", "tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results()))
        .expect(1)
        .mount(&server)
        .await;

    let mut transport = transport(&server);
    transport.login("alice", "hunter2").await.unwrap();
    assert!(transport.is_authenticated());
    assert_eq!(transport.user(), Some("alice"));

    let _ = transport.execute(QUERY).await.unwrap();

    let sent = sent_query(&server).await;
    let graph = format!("FROM <{}/user/alice> WHERE", server.uri());
    assert!(sent.contains(&graph), "{sent}");
    assert_eq!(sent.matches("FROM <").count(), 1);
}

#[tokio::test]
async fn test_spoofed_base_in_graph_uri() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/sparql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results()))
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri()).with_spoofed_base("https://hub.sd2e.org");
    let mut transport = SparqlTransport::new(config).unwrap();
    transport.login("alice", "hunter2").await.unwrap();
    let _ = transport.execute(QUERY).await.unwrap();

    assert!(sent_query(&server)
        .await
        .contains("FROM <https://hub.sd2e.org/user/alice> WHERE"));
}

#[tokio::test]
async fn test_logout_returns_to_anonymous() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/sparql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results()))
        .mount(&server)
        .await;

    let mut transport = transport(&server);
    transport.login("alice", "hunter2").await.unwrap();
    transport.logout();
    let _ = transport.execute(QUERY).await.unwrap();

    assert_eq!(sent_query(&server).await, QUERY);
}

#[tokio::test]
async fn test_rejected_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Your password was not recognized."))
        .mount(&server)
        .await;

    let mut transport = transport(&server);
    let result = transport.login("alice", "wrong").await;

    assert!(matches!(result, Err(QueryError::Auth(_))));
    assert!(!transport.is_authenticated());
}

#[tokio::test]
async fn test_status_classes() {
    for (status, check) in [
        (400u16, "malformed"),
        (500, "internal"),
        (503, "unreachable"),
        (403, "unrecognized"),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sparql"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;

        let error = transport(&server).execute(QUERY).await.unwrap_err();
        let matched = match check {
            "malformed" => matches!(error, QueryError::MalformedQuery(_)),
            "internal" => matches!(error, QueryError::EndpointInternalError(_)),
            "unreachable" => matches!(error, QueryError::EndpointUnreachable(_)),
            _ => matches!(error, QueryError::Unrecognized(_)),
        };
        assert!(matched, "status {status} gave {error:?}");
    }
}

#[tokio::test]
async fn test_undecodable_body_is_unrecognized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sparql"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let error = transport(&server).execute(QUERY).await.unwrap_err();

    assert!(matches!(error, QueryError::Unrecognized(_)));
}

#[tokio::test]
async fn test_timeout_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sparql"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(results())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri()).with_timeout(Duration::from_millis(200));
    let error = SparqlTransport::new(config)
        .unwrap()
        .execute(QUERY)
        .await
        .unwrap_err();

    assert!(matches!(error, QueryError::EndpointUnreachable(_)));
}

#[tokio::test]
async fn test_refused_connection_is_unreachable() {
    let transport = SparqlTransport::new(ClientConfig::new("http://127.0.0.1:9")).unwrap();

    let error = transport.execute(QUERY).await.unwrap_err();

    assert!(matches!(error, QueryError::EndpointUnreachable(_)));
}
