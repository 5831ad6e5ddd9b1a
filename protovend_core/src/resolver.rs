//! Transitive module resolution.
//!
//! Resolution is a level-synchronous fixed point: every module of the
//! current round is fetched concurrently, imports discovered while scanning
//! become the next round's module list, and the run converges when a round
//! discovers nothing new. Every fetched module is persisted under the vendor
//! root on the way through, because the external generator later reads from
//! disk rather than from memory.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::debug;
use tracing::warn;

use crate::Fetcher;
use crate::ProtovendError;
use crate::ProtovendResult;
use crate::scan;
use crate::scan::ScanOutcome;

/// Reserved staging directory inside the vendor root. The generator writes
/// here and the migrate step drains and removes it.
pub const STAGING_DIR: &str = ".generate";

/// Filesystem layout shared by the resolve, generate, and migrate steps.
#[derive(Debug, Clone)]
pub struct TreeLayout {
	/// Project working directory.
	pub root: PathBuf,
	/// Vendor root for fetched module text, relative to `root`.
	pub vendor_dir: PathBuf,
	/// Default output root for generated files, relative to `root`.
	pub output_dir: PathBuf,
	/// Project repository identifier. Override destinations must contain it;
	/// the part after it is re-rooted at `root` during migration.
	pub project_repo: String,
}

impl TreeLayout {
	pub fn vendor_root(&self) -> PathBuf {
		self.root.join(&self.vendor_dir)
	}

	pub fn staging_root(&self) -> PathBuf {
		self.vendor_root().join(STAGING_DIR)
	}

	/// Persisted location of a vendored module.
	pub fn module_path(&self, module: &str) -> PathBuf {
		self.vendor_root().join(module)
	}
}

/// A resolved module together with where and how it is generated.
///
/// All four fields form the identity: the same module requested under a
/// different template or destination is a distinct target and is fetched
/// again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
	pub module: String,
	pub destination: Option<String>,
	pub template: PathBuf,
	pub needs_generate: bool,
}

impl Target {
	/// Local modules always need generation; external modules only when they
	/// carry an explicit destination.
	pub fn new(
		module: String,
		destination: Option<String>,
		template: PathBuf,
		is_local: bool,
	) -> Self {
		// An empty destination counts as no destination at all.
		let destination = destination.filter(|destination| !destination.is_empty());
		let needs_generate = is_local || destination.is_some();

		Self {
			module,
			destination,
			template,
			needs_generate,
		}
	}
}

/// Resolved targets grouped by template identity. Both template identities
/// are always present, possibly with empty lists; each list is sorted by
/// (module, destination).
pub type TemplateTargets = HashMap<PathBuf, Vec<Target>>;

/// Input to a resolution run.
#[derive(Debug, Default)]
pub struct ResolveRequest {
	/// Modules resolvable from the project tree.
	pub local_modules: Vec<String>,
	/// Modules from remote or vendored sources.
	pub external_modules: Vec<String>,
	/// Template identity for local targets.
	pub local_template: PathBuf,
	/// Template identity for external targets (and everything discovered
	/// transitively).
	pub external_template: PathBuf,
	/// Destination overrides keyed by module or by project-qualified module.
	pub overrides: HashMap<String, String>,
}

/// Per-task fetch parameters.
struct FetchPlan {
	module: String,
	explicit: Option<String>,
	template: PathBuf,
	is_local: bool,
	strict: bool,
}

/// The transitive-closure engine.
///
/// A `Resolver` owns its resolution set exclusively; it is not meant to be
/// shared across concurrent [`resolve`](Self::resolve) calls. Dropping the
/// future returned by `resolve` aborts the round's in-flight fetch tasks.
pub struct Resolver {
	fetcher: Arc<dyn Fetcher>,
	layout: TreeLayout,
	seen: HashSet<Target>,
}

impl Resolver {
	pub fn new(fetcher: Arc<dyn Fetcher>, layout: TreeLayout) -> Self {
		Self {
			fetcher,
			layout,
			seen: HashSet::new(),
		}
	}

	/// Resolve the transitive closure of the requested modules.
	///
	/// Declines are fatal for the initially requested set and tolerated (as
	/// logged vendoring gaps) for transitively discovered modules. Any other
	/// fetch failure fails the round fast: remaining tasks are aborted and
	/// the first error is returned with the module name attached.
	pub async fn resolve(&mut self, request: ResolveRequest) -> ProtovendResult<TemplateTargets> {
		self.seen.clear();

		let mut local = request.local_modules;
		let mut external = request.external_modules;
		let mut strict = true;

		loop {
			let deps: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
			let mut tasks: JoinSet<ProtovendResult<Target>> = JoinSet::new();
			let mut queued: HashSet<Target> = HashSet::new();

			for module in local.drain(..) {
				let explicit = lookup_override(&request.overrides, &self.layout.project_repo, &module);
				self.spawn_fetch(
					&mut tasks,
					FetchPlan {
						module,
						explicit,
						template: request.local_template.clone(),
						is_local: true,
						strict,
					},
					Arc::clone(&deps),
				);
			}

			for module in external.drain(..) {
				let explicit = lookup_override(&request.overrides, &self.layout.project_repo, &module);
				let target = Target::new(
					module.clone(),
					explicit.clone(),
					request.external_template.clone(),
					false,
				);

				// Handled in a prior round, or already queued in this one.
				if self.seen.contains(&target) || !queued.insert(target) {
					continue;
				}

				self.spawn_fetch(
					&mut tasks,
					FetchPlan {
						module,
						explicit,
						template: request.external_template.clone(),
						is_local: false,
						strict,
					},
					Arc::clone(&deps),
				);
			}

			// The resolution set is only touched once the whole round has
			// drained, so the dedup check above always observes a consistent
			// snapshot.
			let mut resolved = Vec::new();
			while let Some(joined) = tasks.join_next().await {
				match joined {
					Ok(Ok(target)) => resolved.push(target),
					Ok(Err(e)) => {
						tasks.abort_all();
						return Err(e);
					}
					Err(e) => {
						tasks.abort_all();
						return Err(ProtovendError::Task(e.to_string()));
					}
				}
			}

			for target in resolved {
				self.seen.insert(target);
			}

			let discovered = {
				let mut deps = deps.lock().await;
				std::mem::take(&mut *deps)
			};

			if discovered.is_empty() {
				break;
			}

			debug!(discovered = discovered.len(), "resolution round complete");

			// Everything discovered transitively is external from here on.
			external = discovered;
			strict = false;
		}

		let mut groups = TemplateTargets::new();
		groups.insert(request.local_template.clone(), Vec::new());
		groups.insert(request.external_template.clone(), Vec::new());

		for target in self.seen.drain() {
			groups.entry(target.template.clone()).or_default().push(target);
		}

		for targets in groups.values_mut() {
			targets.sort_by(|a, b| {
				a.module
					.cmp(&b.module)
					.then_with(|| a.destination.cmp(&b.destination))
			});
		}

		Ok(groups)
	}

	fn spawn_fetch(
		&self,
		tasks: &mut JoinSet<ProtovendResult<Target>>,
		plan: FetchPlan,
		deps: Arc<Mutex<Vec<String>>>,
	) {
		let fetcher = Arc::clone(&self.fetcher);
		let vendor_root = self.layout.vendor_root();

		tasks.spawn(async move {
			let FetchPlan {
				module,
				explicit,
				template,
				is_local,
				strict,
			} = plan;

			match vendor_module(fetcher.as_ref(), &vendor_root, &module).await {
				Ok(Some(outcome)) => {
					// An explicit override wins; a local module falls back to
					// the destination its own content declares. For external
					// modules the discovered value is discarded, since their
					// identity was fixed before fetching.
					let discovered = if is_local { outcome.package } else { None };
					let destination = explicit.or(discovered);

					if !outcome.imports.is_empty() {
						deps.lock().await.extend(outcome.imports);
					}

					Ok(Target::new(module, destination, template, is_local))
				}
				Ok(None) if strict => Err(ProtovendError::NoFetcher(module)),
				Ok(None) => {
					warn!(module = module.as_str(), "no fetcher applicable, leaving vendoring gap");
					Ok(Target::new(module, explicit, template, is_local))
				}
				Err(e) => {
					Err(ProtovendError::Fetch {
						module,
						reason: e.to_string(),
					})
				}
			}
		});
	}
}

/// Fetch one module, scan it for imports and an output-package declaration,
/// and persist the normalized text under the vendor root. Returns `None`
/// when every fetcher declined.
async fn vendor_module(
	fetcher: &dyn Fetcher,
	vendor_root: &Path,
	module: &str,
) -> ProtovendResult<Option<ScanOutcome>> {
	let Some(content) = fetcher.fetch(module).await? else {
		return Ok(None);
	};

	let outcome = scan::scan(&content);

	let path = vendor_root.join(module);
	if let Some(dir) = path.parent() {
		tokio::fs::create_dir_all(dir).await?;
	}
	tokio::fs::write(&path, &outcome.normalized).await?;

	Ok(Some(outcome))
}

/// Look up a destination override by raw module key, then by the
/// project-qualified form.
fn lookup_override(
	overrides: &HashMap<String, String>,
	project_repo: &str,
	module: &str,
) -> Option<String> {
	overrides
		.get(module)
		.or_else(|| overrides.get(&format!("{project_repo}/{module}")))
		.cloned()
}
