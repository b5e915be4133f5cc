//! `SessionDirectory` — the REST side of a voting session.
//!
//! Three read-only lookups feed the engine before the stream opens: the
//! option list, the unit roster, and the votes cast so far. The last is
//! only a stand-in until the stream's own `initial_data` arrives.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use votestream_core::wire::{WireOption, WireUnit, WireVote};
use votestream_core::{UnitRecord, VoteRecord, VotingOption};

use crate::config::DirectoryConfig;
use crate::error::ClientError;

/// Everything the engine needs to know about a session up front.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub options: Vec<VotingOption>,
    pub units: Vec<UnitRecord>,
    /// Votes known before the stream opened.
    pub votes: Vec<VoteRecord>,
}

#[async_trait]
pub trait SessionDirectory: Send + Sync {
    async fn options(&self, token: &str) -> Result<Vec<VotingOption>, ClientError>;

    async fn units(&self, token: &str) -> Result<Vec<UnitRecord>, ClientError>;

    /// Already-cast votes. Default: none known.
    async fn votes(&self, _token: &str) -> Result<Vec<VoteRecord>, ClientError> {
        Ok(vec![])
    }
}

/// Fetch options, units and fallback votes concurrently.
///
/// Options and units are required. A failed vote lookup is logged and
/// treated as "no votes yet", since the stream will deliver them anyway.
pub async fn load_roster(directory: &dyn SessionDirectory, token: &str) -> Result<Roster, ClientError> {
    let (options, units, votes) = tokio::join!(
        directory.options(token),
        directory.units(token),
        directory.votes(token),
    );

    let votes = votes.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "fallback vote lookup failed; waiting for the stream snapshot");
        vec![]
    });

    let roster = Roster {
        options: options?,
        units: units?,
        votes,
    };
    tracing::info!(
        options = roster.options.len(),
        units = roster.units.len(),
        votes = roster.votes.len(),
        "session roster loaded"
    );
    Ok(roster)
}

// ─── Static ───────────────────────────────────────────────────────────────────

/// A directory that serves a fixed roster. Useful for tests and offline replay.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    roster: Roster,
}

impl StaticDirectory {
    pub fn new(roster: Roster) -> Self {
        Self { roster }
    }
}

#[async_trait]
impl SessionDirectory for StaticDirectory {
    async fn options(&self, _token: &str) -> Result<Vec<VotingOption>, ClientError> {
        Ok(self.roster.options.clone())
    }

    async fn units(&self, _token: &str) -> Result<Vec<UnitRecord>, ClientError> {
        Ok(self.roster.units.clone())
    }

    async fn votes(&self, _token: &str) -> Result<Vec<VoteRecord>, ClientError> {
        Ok(self.roster.votes.clone())
    }
}

// ─── HTTP ─────────────────────────────────────────────────────────────────────

/// List responses come either bare or wrapped as `{ "data": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListEnvelope<T> {
    Wrapped { data: Vec<T> },
    Bare(Vec<T>),
}

impl<T> ListEnvelope<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(items) => items,
        }
    }
}

/// Parse a list response body, accepting both envelope shapes.
pub fn parse_list<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, ClientError> {
    let envelope: ListEnvelope<T> = serde_json::from_str(body)?;
    Ok(envelope.into_items())
}

/// Directory backed by the session's REST endpoints, authenticated with a
/// bearer token.
#[derive(Debug, Clone)]
pub struct HttpSessionDirectory {
    http: reqwest::Client,
    config: DirectoryConfig,
}

impl HttpSessionDirectory {
    pub fn new(config: DirectoryConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ClientError::Http(e.to_string()))?;
        Ok(Self { http, config })
    }

    async fn fetch_list<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<Vec<T>, ClientError> {
        let directory_err = |reason: String| ClientError::Directory {
            url: url.to_string(),
            reason,
        };

        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| directory_err(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(directory_err(format!("HTTP {status}: {body}")));
        }

        let body = resp.text().await.map_err(|e| directory_err(e.to_string()))?;
        parse_list(&body).map_err(|e| directory_err(e.to_string()))
    }
}

#[async_trait]
impl SessionDirectory for HttpSessionDirectory {
    async fn options(&self, token: &str) -> Result<Vec<VotingOption>, ClientError> {
        let wire: Vec<WireOption> = self.fetch_list(&self.config.options_url, token).await?;
        Ok(wire.into_iter().map(VotingOption::from).collect())
    }

    async fn units(&self, token: &str) -> Result<Vec<UnitRecord>, ClientError> {
        let wire: Vec<WireUnit> = self.fetch_list(&self.config.units_url, token).await?;
        Ok(wire.into_iter().map(UnitRecord::from).collect())
    }

    async fn votes(&self, token: &str) -> Result<Vec<VoteRecord>, ClientError> {
        let Some(url) = &self.config.votes_url else {
            return Ok(vec![]);
        };
        let wire: Vec<WireVote> = self.fetch_list(url, token).await?;
        Ok(wire.into_iter().map(VoteRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingVotes;

    #[async_trait]
    impl SessionDirectory for FailingVotes {
        async fn options(&self, _t: &str) -> Result<Vec<VotingOption>, ClientError> {
            Ok(vec![VotingOption::new(1, "Yes", "Y")])
        }
        async fn units(&self, _t: &str) -> Result<Vec<UnitRecord>, ClientError> {
            Ok(vec![UnitRecord::vacant(1, "101")])
        }
        async fn votes(&self, _t: &str) -> Result<Vec<VoteRecord>, ClientError> {
            Err(ClientError::Http("connection refused".into()))
        }
    }

    struct FailingOptions;

    #[async_trait]
    impl SessionDirectory for FailingOptions {
        async fn options(&self, _t: &str) -> Result<Vec<VotingOption>, ClientError> {
            Err(ClientError::Status { status: 500, body: String::new() })
        }
        async fn units(&self, _t: &str) -> Result<Vec<UnitRecord>, ClientError> {
            Ok(vec![])
        }
    }

    #[test]
    fn parse_bare_and_wrapped_lists() {
        let bare: Vec<WireOption> = parse_list(r#"[{"id":1,"text":"Yes","code":"Y"}]"#).unwrap();
        assert_eq!(bare.len(), 1);
        let wrapped: Vec<WireUnit> =
            parse_list(r#"{"data":[{"unit_id":1,"unit_number":"101","resident_id":10,"resident_name":"Ana"}]}"#)
                .unwrap();
        assert_eq!(wrapped[0].resident_id, Some(10));
        assert!(parse_list::<WireOption>(r#"{"items":[]}"#).is_err());
    }

    #[tokio::test]
    async fn vote_lookup_failure_is_not_fatal() {
        let roster = load_roster(&FailingVotes, "t").await.unwrap();
        assert_eq!(roster.options.len(), 1);
        assert_eq!(roster.units.len(), 1);
        assert!(roster.votes.is_empty());
    }

    #[tokio::test]
    async fn option_lookup_failure_is_fatal() {
        let err = load_roster(&FailingOptions, "t").await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn static_directory_serves_roster() {
        let dir = StaticDirectory::new(Roster {
            options: vec![VotingOption::new(1, "Yes", "Y")],
            units: vec![],
            votes: vec![],
        });
        let roster = load_roster(&dir, "ignored").await.unwrap();
        assert_eq!(roster.options[0].text, "Yes");
    }
}
