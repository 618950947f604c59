use crate::domain::error::DexError;
use crate::domain::traits::Fetcher;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Every generation-I species, ordered by national dex number.
pub const GEN1_SPECIES_QUERY: &str = r#"
{
    gen1_species: pokemon_v2_pokemonspecies(
        where: { pokemon_v2_generation: { name: { _eq: "generation-i" } } }
        order_by: { id: asc }
    ) {
        name
        id
    }
}
"#;

// GraphQL error payload
#[derive(Deserialize, Debug)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

/// Posts one fixed GraphQL query and hands back the response body untouched.
pub struct GraphQlFetcher {
    client: Client,
    endpoint: String,
    query: String,
}

impl GraphQlFetcher {
    pub fn new(client: Client, endpoint: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            query: query.into(),
        }
    }

    pub fn gen1_species(client: Client, endpoint: impl Into<String>) -> Self {
        Self::new(client, endpoint, GEN1_SPECIES_QUERY)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Fetcher for GraphQlFetcher {
    async fn fetch(&self) -> Result<Value, DexError> {
        post_query(&self.client, &self.endpoint, &self.query).await
    }
}

async fn post_query(client: &Client, endpoint: &str, query: &str) -> Result<Value, DexError> {
    debug!("POST {}", endpoint);
    let response = client
        .post(endpoint)
        .json(&json!({ "query": query }))
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(DexError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let value: Value = serde_json::from_str(&body)?;
    check_errors(&value)?;
    Ok(value)
}

/// A body carrying a non-empty `errors` array is a failed query even with HTTP 200.
fn check_errors(body: &Value) -> Result<(), DexError> {
    let envelope = ErrorEnvelope::deserialize(body).unwrap_or(ErrorEnvelope { errors: Vec::new() });
    if envelope.errors.is_empty() {
        return Ok(());
    }
    let messages: Vec<_> = envelope.errors.into_iter().map(|e| e.message).collect();
    Err(DexError::Api(messages.join("; ")))
}
