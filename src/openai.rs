//! Shared OpenAI client construction.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;
use tracing::warn;

/// An OpenAI client whose HTTP requests give up after `request_timeout`.
///
/// The key is read from `OPENAI_API_KEY` by the default config.
pub fn create_client(request_timeout: Duration) -> Client<OpenAIConfig> {
    let client = Client::with_config(OpenAIConfig::default());
    match reqwest::Client::builder().timeout(request_timeout).build() {
        Ok(http) => client.with_http_client(http),
        Err(e) => {
            warn!(
                "Could not build HTTP client with a {:?} timeout, requests may hang: {}",
                request_timeout, e
            );
            client
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_with_timeout() {
        // Construction never touches the network or the key
        let _client = create_client(Duration::from_secs(5));
    }
}
