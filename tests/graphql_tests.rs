//! GraphQL fetcher against a local mock endpoint

use dex::domain::error::DexError;
use dex::domain::traits::Fetcher;
use dex::infrastructure::config::Config;
use dex::infrastructure::network::client::GraphQlFetcher;
use dex::infrastructure::network::http::create_client;
use mockito::Matcher;
use serde_json::json;

fn fetcher(endpoint: String) -> GraphQlFetcher {
    let client = create_client(&Config::default()).unwrap();
    GraphQlFetcher::gen1_species(client, endpoint)
}

#[tokio::test]
async fn test_posts_fixed_query_and_returns_body() {
    let mut server = mockito::Server::new_async().await;
    let body = json!({
        "data": { "gen1_species": [{ "name": "bulbasaur", "id": 1 }] }
    });
    let mock = server
        .mock("POST", "/graphql/v1beta")
        .match_body(Matcher::Regex("pokemon_v2_pokemonspecies".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let value = fetcher(format!("{}/graphql/v1beta", server.url()))
        .fetch()
        .await
        .unwrap();

    assert_eq!(value, body);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_graphql_errors_fail_the_fetch() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .with_status(200)
        .with_body(r#"{"errors":[{"message":"field 'gen1' not found"}]}"#)
        .create_async()
        .await;

    let err = fetcher(server.url()).fetch().await.unwrap_err();
    assert!(matches!(&err, DexError::Api(msg) if msg == "field 'gen1' not found"));
}

#[tokio::test]
async fn test_non_success_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .with_status(503)
        .with_body("upstream unavailable")
        .create_async()
        .await;

    let err = fetcher(server.url()).fetch().await.unwrap_err();
    assert!(matches!(
        err,
        DexError::Status { status: 503, ref body } if body == "upstream unavailable"
    ));
}

#[tokio::test]
async fn test_non_json_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create_async()
        .await;

    let err = fetcher(server.url()).fetch().await.unwrap_err();
    assert!(matches!(err, DexError::Json(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    // Port 9 (discard) is closed on test machines.
    let err = fetcher("http://127.0.0.1:9/".to_string())
        .fetch()
        .await
        .unwrap_err();
    assert!(matches!(err, DexError::Http(_)));
}
