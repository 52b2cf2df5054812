#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use covdelta::config::Config;
use covdelta::error::Result;
use covdelta::http::{Header, HttpClient, Response};
use serde_json::{json, Value};

pub const CURRENT_COVERAGE: &str = include_str!("../fixtures/current_coverage.json");
pub const MASTER_COVERAGE: &str = include_str!("../fixtures/master_coverage.json");

pub const API: &str = "https://circleci.test/api/v1.1/project/github/acme/app";

/// Project config pointed at the fake API host.
pub fn config() -> Config {
    let mut config = Config::new("acme", "app", "secret");
    config.api_url = "https://circleci.test/api/v1.1".to_string();
    config.pr_number = Some("123".to_string());
    config.branch = Some("feature/login".to_string());
    config
}

/// Recent-builds page URL. `branch` is written as it appears in the path,
/// already percent-encoded (`feature%2Flogin`).
pub fn builds_url(branch: &str, limit: usize, offset: usize) -> String {
    format!("{API}/tree/{branch}?limit={limit}&filter=completed&offset={offset}")
}

pub fn artifacts_url(build_num: u64) -> String {
    format!("{API}/{build_num}/artifacts")
}

pub fn artifact_file_url(build_num: u64) -> String {
    format!("https://{build_num}-1234-gh.circle-artifacts.test/0/coverage/coverage.json")
}

/// A recent-builds entry.
pub fn build(build_num: u64, job: &str, has_artifacts: bool) -> Value {
    json!({
        "build_num": build_num,
        "status": "success",
        "has_artifacts": has_artifacts,
        "workflows": { "job_name": job, "workflow_name": "main" }
    })
}

/// Artifact listing containing a coverage report for `build_num`.
pub fn coverage_artifacts(build_num: u64) -> Value {
    json!([
        {
            "path": "coverage/index.html",
            "url": format!("https://{build_num}-1234-gh.circle-artifacts.test/0/coverage/index.html")
        },
        {
            "path": "coverage/coverage.json",
            "url": artifact_file_url(build_num)
        }
    ])
}

/// An [`HttpClient`] that answers from a table of canned responses and
/// records every request.
///
/// Responses registered for a URL are served in order; the last one repeats.
/// Unknown URLs panic.
#[derive(Default)]
pub struct ScriptedClient {
    routes: RefCell<HashMap<String, VecDeque<Response>>>,
    requests: RefCell<Vec<(String, Vec<Header>)>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, url: impl Into<String>, resp: Response) -> &Self {
        self.routes
            .borrow_mut()
            .entry(url.into())
            .or_default()
            .push_back(resp);
        self
    }

    pub fn on_json(&self, url: impl Into<String>, body: Value) -> &Self {
        self.on(url, Response::new(200, body.to_string()))
    }

    pub fn on_body(&self, url: impl Into<String>, body: &str) -> &Self {
        self.on(url, Response::new(200, body))
    }

    /// URLs requested so far, in order.
    pub fn urls(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|(u, _)| u.clone()).collect()
    }

    /// Number of requests whose URL contains `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.urls().iter().filter(|u| u.contains(needle)).count()
    }

    pub fn headers_of(&self, index: usize) -> Vec<Header> {
        self.requests.borrow()[index].1.clone()
    }
}

impl HttpClient for ScriptedClient {
    fn fetch(&self, url: &str, headers: &[Header]) -> Result<Response> {
        self.requests
            .borrow_mut()
            .push((url.to_string(), headers.to_vec()));

        let mut routes = self.routes.borrow_mut();
        let queue = routes
            .get_mut(url)
            .unwrap_or_else(|| panic!("unexpected request: {url}"));
        let resp = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        };
        Ok(resp)
    }
}
