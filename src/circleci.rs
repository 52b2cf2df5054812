//! Locating coverage reports among CircleCI builds.
//!
//! The coverage artifact of the running job has usually been produced by an
//! earlier job in the same workflow, so both sides of the comparison are
//! found the same way: walk the branch's completed builds newest first and
//! take the first one from the right job that stored `coverage/coverage.json`.

use serde::de::DeserializeOwned;
use url::Url;

use crate::config::Config;
use crate::error::{CovdeltaError, Result};
use crate::http::{
    fetch_following_redirects, parse_url, without_query, HttpClient, Response,
    DEFAULT_MAX_REDIRECTS,
};
use crate::model::{Artifact, Build, CoverageReport};

/// Builds requested per page of the recent-builds listing.
pub const DEFAULT_PAGE_SIZE: usize = 30;

/// Largest `limit` the recent-builds endpoint honours.
pub const MAX_PAGE_SIZE: usize = 100;

/// Walks the CircleCI API to find coverage reports.
pub struct Locator<'a> {
    client: &'a dyn HttpClient,
    config: &'a Config,
    page_size: usize,
    max_pages: Option<usize>,
    max_redirects: u32,
}

impl<'a> Locator<'a> {
    pub fn new(client: &'a dyn HttpClient, config: &'a Config) -> Self {
        Self {
            client,
            config,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// Builds per listing page, clamped to `1..=MAX_PAGE_SIZE`. A larger
    /// value would be capped by the API and every page would look short.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Stop after this many pages even if the listing continues.
    pub fn max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// URL of one page of completed builds on `branch`.
    pub fn builds_url(&self, branch: &str, page: usize) -> Result<Url> {
        let mut url = self.config.endpoint(&["tree", branch])?;
        url.query_pairs_mut()
            .append_pair("limit", &self.page_size.to_string())
            .append_pair("filter", "completed")
            .append_pair("offset", &(page * self.page_size).to_string());
        Ok(self.config.authorize(url))
    }

    /// URL of the artifact listing for `build_num`.
    pub fn artifacts_url(&self, build_num: u64) -> Result<Url> {
        let url = self
            .config
            .endpoint(&[build_num.to_string().as_str(), "artifacts"])?;
        Ok(self.config.authorize(url))
    }

    /// Find the latest build of `job` on `branch` that stored a coverage
    /// report, and download that report.
    ///
    /// Returns `Ok(None)` when the listing is exhausted without a match.
    pub fn find_coverage(&self, branch: &str, job: &str) -> Result<Option<CoverageReport>> {
        match self.find_coverage_artifact(branch, job)? {
            Some(artifact) => self.download(&artifact),
            None => Ok(None),
        }
    }

    /// Like [`Locator::find_coverage`] but stops at the artifact URL.
    pub fn find_coverage_url(&self, branch: &str, job: &str) -> Result<Option<String>> {
        Ok(self.find_coverage_artifact(branch, job)?.map(|a| a.url))
    }

    /// Coverage report stored by one specific build.
    pub fn find_build_coverage(&self, build_num: u64) -> Result<Option<CoverageReport>> {
        match self.coverage_artifact(build_num)? {
            Some(artifact) => self.download(&artifact),
            None => Ok(None),
        }
    }

    /// Coverage artifact URL of one specific build.
    pub fn coverage_url(&self, build_num: u64) -> Result<Option<String>> {
        Ok(self.coverage_artifact(build_num)?.map(|a| a.url))
    }

    fn find_coverage_artifact(&self, branch: &str, job: &str) -> Result<Option<Artifact>> {
        let mut page = 0usize;
        loop {
            if self.max_pages.is_some_and(|max| page >= max) {
                eprintln!("No coverage found for {branch}/{job} within {page} pages");
                return Ok(None);
            }

            let url = self.builds_url(branch, page)?;
            let Some(builds) = self.get_json::<Vec<Build>>(&url)? else {
                return Ok(None);
            };
            if builds.is_empty() {
                eprintln!("Reached the end of {branch} builds without a coverage report");
                return Ok(None);
            }

            for build in &builds {
                if build.job_name() != Some(job) || !build.has_artifacts {
                    continue;
                }
                if let Some(artifact) = self.coverage_artifact(build.build_num)? {
                    eprintln!(
                        "Found coverage for {branch} in build #{} ({job})",
                        build.build_num
                    );
                    return Ok(Some(artifact));
                }
            }

            if builds.len() < self.page_size {
                eprintln!("Reached the end of {branch} builds without a coverage report");
                return Ok(None);
            }
            page += 1;
        }
    }

    fn coverage_artifact(&self, build_num: u64) -> Result<Option<Artifact>> {
        let url = self.artifacts_url(build_num)?;
        let artifacts = self.get_json::<Vec<Artifact>>(&url)?.unwrap_or_default();
        Ok(artifacts.into_iter().find(Artifact::is_coverage_report))
    }

    fn download(&self, artifact: &Artifact) -> Result<Option<CoverageReport>> {
        let url = self.config.authorize(parse_url(&artifact.url)?);
        let resp = fetch_following_redirects(
            self.client,
            url.as_str(),
            &self.config.headers(),
            self.max_redirects,
        )?;
        if !resp.is_success() {
            warn_status(&artifact.url, &resp);
            return Ok(None);
        }
        CoverageReport::from_slice(&resp.body, &artifact.url).map(Some)
    }

    /// GET and decode a JSON API response. Non-2xx answers are `None`.
    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<Option<T>> {
        let url = url.as_str();
        let resp = self.client.fetch(url, &self.config.headers())?;
        if !resp.is_success() {
            warn_status(url, &resp);
            return Ok(None);
        }
        serde_json::from_slice(&resp.body)
            .map(Some)
            .map_err(|e| CovdeltaError::MalformedJson {
                url: without_query(url).to_string(),
                source: e,
            })
    }
}

fn warn_status(url: &str, resp: &Response) {
    eprintln!(
        "Warning: HTTP {} from {}, treating as not found",
        resp.status,
        without_query(url)
    );
}
