//! Project and credential settings for talking to CircleCI.
//!
//! Everything the locator and renderer need is carried in a [`Config`]
//! value; nothing below this module reads the process environment.

use anyhow::{bail, Context as _, Result};
use url::Url;

use crate::error::CovdeltaError;
use crate::http::{parse_url, Header};

/// Default CircleCI v1.1 API root.
pub const DEFAULT_API_URL: &str = "https://circleci.com/api/v1.1";

/// How the API token is attached to each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Auth {
    /// `Circle-Token` request header.
    #[default]
    Header,
    /// `circle-token` query parameter.
    Query,
}

/// Resolved CircleCI project context.
#[derive(Debug, Clone)]
pub struct Config {
    pub owner: String,
    pub repo: String,
    pub token: String,
    /// Pull request number without the leading `#`.
    pub pr_number: Option<String>,
    /// Source branch of the pull request.
    pub branch: Option<String>,
    /// Build number of the running job.
    pub build_num: Option<u64>,
    pub api_url: String,
    pub auth: Auth,
}

impl Config {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
            pr_number: None,
            branch: None,
            build_num: None,
            api_url: DEFAULT_API_URL.to_string(),
            auth: Auth::default(),
        }
    }

    /// Build a config from the standard CircleCI job environment
    /// (`CIRCLE_PROJECT_USERNAME`, `CIRCLE_PROJECT_REPONAME`, `CIRCLE_TOKEN`,
    /// `CIRCLE_PULL_REQUEST`, `CIRCLE_BRANCH`, `CIRCLE_BUILD_NUM`).
    ///
    /// Unset variables are left empty; call [`Config::validate`] once any
    /// command-line overrides have been applied.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v: &String| !v.is_empty());

        let mut config = Self::new(
            var("CIRCLE_PROJECT_USERNAME").unwrap_or_default(),
            var("CIRCLE_PROJECT_REPONAME").unwrap_or_default(),
            var("CIRCLE_TOKEN").unwrap_or_default(),
        );
        config.pr_number = var("CIRCLE_PULL_REQUEST").and_then(|url| pr_number_from_url(&url));
        config.branch = var("CIRCLE_BRANCH");
        config.build_num = match var("CIRCLE_BUILD_NUM") {
            Some(num) => Some(
                num.parse()
                    .with_context(|| format!("CIRCLE_BUILD_NUM is not a number: '{num}'"))?,
            ),
            None => None,
        };
        Ok(config)
    }

    /// Check that the project and token are known.
    pub fn validate(&self) -> Result<()> {
        if self.owner.is_empty() {
            bail!("project owner is required (set CIRCLE_PROJECT_USERNAME or pass --owner)");
        }
        if self.repo.is_empty() {
            bail!("project repository is required (set CIRCLE_PROJECT_REPONAME or pass --repo)");
        }
        if self.token.is_empty() {
            bail!("API token is required (set CIRCLE_TOKEN or pass --token)");
        }
        parse_url(&self.api_url).context("API root must be an absolute http(s) URL")?;
        Ok(())
    }

    /// `{api}/project/github/{owner}/{repo}`
    pub fn project_url(&self) -> crate::error::Result<Url> {
        self.endpoint(&[])
    }

    /// [`Config::project_url`] with `segments` appended. Each segment is
    /// percent-encoded, so a branch like `feature/login` stays one segment.
    pub fn endpoint(&self, segments: &[&str]) -> crate::error::Result<Url> {
        let mut url = parse_url(&self.api_url)?;
        url.path_segments_mut()
            .map_err(|()| CovdeltaError::InvalidUrl {
                url: self.api_url.clone(),
                reason: "not a hierarchical URL".to_string(),
            })?
            .pop_if_empty()
            .extend(["project", "github", self.owner.as_str(), self.repo.as_str()])
            .extend(segments);
        Ok(url)
    }

    /// Attach the token to `url` when query authentication is in use.
    pub fn authorize(&self, mut url: Url) -> Url {
        if self.auth == Auth::Query && !self.token.is_empty() {
            url.query_pairs_mut().append_pair("circle-token", &self.token);
        }
        url
    }

    /// Headers to send with every API request.
    pub fn headers(&self) -> Vec<Header> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if self.auth == Auth::Header && !self.token.is_empty() {
            headers.push(("Circle-Token".to_string(), self.token.clone()));
        }
        headers
    }
}

/// Extract the PR number from a pull request URL
/// (e.g. "https://github.com/acme/app/pull/123" → "123").
pub fn pr_number_from_url(url: &str) -> Option<String> {
    let last = url.trim_end_matches('/').rsplit('/').next()?;
    if last.is_empty() {
        None
    } else {
        Some(last.to_string())
    }
}
