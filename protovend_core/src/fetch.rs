//! Module sources.
//!
//! A [`Fetcher`] resolves a module name to its text content, declines when
//! the module is outside its territory (`Ok(None)`), or fails hard. Fetchers
//! compose into an ordered [`FetcherChain`]: the first fetcher that does not
//! decline wins, and the chain itself declines only when every member does.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use crate::ProtovendError;
use crate::ProtovendResult;

/// A source of module content.
#[async_trait]
pub trait Fetcher: Send + Sync {
	/// Fetch the content of `module`. Returns `Ok(None)` when this fetcher is
	/// not applicable to the module, so a chain can try the next one.
	async fn fetch(&self, module: &str) -> ProtovendResult<Option<String>>;
}

/// Reads modules that live under the project's own `api/` tree.
pub struct LocalFetcher {
	root: PathBuf,
}

impl LocalFetcher {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Local modules follow the `api/<service>/<file>.proto` convention.
	fn applies(module: &str) -> bool {
		module
			.strip_prefix("api/")
			.is_some_and(|rest| rest.contains('/') && rest.ends_with(".proto"))
	}
}

#[async_trait]
impl Fetcher for LocalFetcher {
	async fn fetch(&self, module: &str) -> ProtovendResult<Option<String>> {
		if !Self::applies(module) {
			return Ok(None);
		}

		// An applicable module that is missing on disk is a hard failure,
		// not a decline.
		let content = tokio::fs::read_to_string(self.root.join(module)).await?;
		Ok(Some(content))
	}
}

const GITHUB_API_URL: &str = "https://api.github.com/";
const GOOGLEAPIS_MARKER: &str = "google/api/";
const PROTOBUF_MARKER: &str = "google/protobuf/";
const GITHUB_PREFIX: &str = "github.com/";

/// Fetches modules from hosted repositories through the GitHub contents API.
///
/// Well-known module families are routed to their upstream repositories:
/// `google/api/*` to googleapis, `google/protobuf/*` to protocolbuffers, and
/// `github.com/<owner>/<repo>/<path>.proto` to that repository. Anything else
/// is a decline.
pub struct GithubFetcher {
	agent: ureq::Agent,
	token: Option<String>,
}

impl GithubFetcher {
	pub fn new(token: Option<String>) -> Self {
		Self {
			agent: ureq::Agent::new(),
			token,
		}
	}

	/// Map a module name to a contents-API route, or `None` to decline.
	fn api_route(module: &str) -> Option<String> {
		if let Some(idx) = module.find(GOOGLEAPIS_MARKER) {
			let file = &module[idx + GOOGLEAPIS_MARKER.len()..];
			return Some(format!(
				"repos/googleapis/googleapis/contents/google/api/{file}"
			));
		}

		if let Some(idx) = module.find(PROTOBUF_MARKER) {
			let file = &module[idx + PROTOBUF_MARKER.len()..];
			return Some(format!(
				"repos/protocolbuffers/protobuf/contents/src/google/protobuf/{file}"
			));
		}

		if let Some(rest) = module.strip_prefix(GITHUB_PREFIX) {
			let (owner, rest) = rest.split_once('/')?;
			let (repo, path) = rest.split_once('/')?;
			if path.ends_with(".proto") {
				return Some(format!("repos/{owner}/{repo}/contents/{path}"));
			}
		}

		None
	}

	fn download(agent: &ureq::Agent, token: Option<&str>, route: &str) -> ProtovendResult<String> {
		#[derive(Deserialize)]
		struct ContentsResponse {
			download_url: String,
		}

		let url = format!("{GITHUB_API_URL}{route}");
		let mut request = agent
			.get(&url)
			.set("Accept", "application/vnd.github+json")
			.set("X-GitHub-Api-Version", "2022-11-28");
		if let Some(token) = token {
			request = request.set("Authorization", &format!("Bearer {token}"));
		}

		let contents: ContentsResponse = request
			.call()
			.map_err(|e| ProtovendError::Http(e.to_string()))?
			.into_json()
			.map_err(|e| ProtovendError::Http(e.to_string()))?;

		agent
			.get(&contents.download_url)
			.call()
			.map_err(|e| ProtovendError::Http(e.to_string()))?
			.into_string()
			.map_err(|e| ProtovendError::Http(e.to_string()))
	}
}

#[async_trait]
impl Fetcher for GithubFetcher {
	async fn fetch(&self, module: &str) -> ProtovendResult<Option<String>> {
		let Some(route) = Self::api_route(module) else {
			return Ok(None);
		};

		// ureq is a blocking client; keep the round's other fetch tasks
		// running while this one waits on the network.
		let agent = self.agent.clone();
		let token = self.token.clone();
		let content =
			tokio::task::spawn_blocking(move || Self::download(&agent, token.as_deref(), &route))
				.await
				.map_err(|e| ProtovendError::Task(e.to_string()))??;

		Ok(Some(content))
	}
}

/// An ordered composition of fetchers. Order is strictly positional: the
/// chain tries each member as configured and never reorders by type.
pub struct FetcherChain {
	fetchers: Vec<Box<dyn Fetcher>>,
}

impl FetcherChain {
	pub fn new(fetchers: Vec<Box<dyn Fetcher>>) -> Self {
		Self { fetchers }
	}
}

#[async_trait]
impl Fetcher for FetcherChain {
	async fn fetch(&self, module: &str) -> ProtovendResult<Option<String>> {
		for fetcher in &self.fetchers {
			if let Some(content) = fetcher.fetch(module).await? {
				return Ok(Some(content));
			}
		}

		Ok(None)
	}
}
