use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use rstest::rstest;
use similar_asserts::assert_eq;

use crate::ProtovendConfig;
use crate::ProtovendError;
use crate::ProtovendResult;
use crate::ResolveRequest;
use crate::Resolver;
use crate::Target;
use crate::TreeLayout;
use crate::fetch::Fetcher;
use crate::fetch::FetcherChain;
use crate::generate::generator_args;
use crate::migrate::destination_dir;
use crate::migrate::migrate;
use crate::scan::scan;
use crate::template::GenPlugin;
use crate::template::GenTemplate;

/// A fetcher backed by an in-memory module map, recording every fetch call.
struct MapFetcher {
	files: HashMap<String, String>,
	calls: Arc<Mutex<Vec<String>>>,
}

impl MapFetcher {
	fn new(files: &[(&str, &str)]) -> Self {
		Self {
			files: files
				.iter()
				.map(|(module, content)| (module.to_string(), content.to_string()))
				.collect(),
			calls: Arc::new(Mutex::new(Vec::new())),
		}
	}

	fn call_count(&self) -> usize {
		self.calls.lock().unwrap().len()
	}
}

#[async_trait]
impl Fetcher for MapFetcher {
	async fn fetch(&self, module: &str) -> ProtovendResult<Option<String>> {
		self.calls.lock().unwrap().push(module.to_string());
		Ok(self.files.get(module).cloned())
	}
}

/// A fetcher that fails hard for every module.
struct FailingFetcher;

#[async_trait]
impl Fetcher for FailingFetcher {
	async fn fetch(&self, _module: &str) -> ProtovendResult<Option<String>> {
		Err(ProtovendError::Http("connection refused".into()))
	}
}

fn layout_in(root: &Path) -> TreeLayout {
	TreeLayout {
		root: root.to_path_buf(),
		vendor_dir: ".vendorpb".into(),
		output_dir: "internal/pb".into(),
		project_repo: "acme/project".into(),
	}
}

fn request(local: &[&str], external: &[&str]) -> ResolveRequest {
	ResolveRequest {
		local_modules: local.iter().map(ToString::to_string).collect(),
		external_modules: external.iter().map(ToString::to_string).collect(),
		local_template: PathBuf::from("buf.gen.yaml"),
		external_template: PathBuf::from(".vendorpb/.generate/buf.gen.yaml"),
		overrides: HashMap::new(),
	}
}

fn targets_for<'a>(
	groups: &'a HashMap<PathBuf, Vec<Target>>,
	template: &str,
) -> &'a Vec<Target> {
	groups
		.get(Path::new(template))
		.unwrap_or_else(|| panic!("missing template group `{template}`"))
}

#[rstest]
#[case::plain(r#"import "google/api/annotations.proto";"#, Some("google/api/annotations.proto"))]
#[case::no_space(r#"import"a/b.proto";"#, Some("a/b.proto"))]
#[case::indented(r#"  import "a/b.proto";"#, None)]
#[case::no_slash(r#"import "nopath.proto";"#, None)]
#[case::no_semicolon(r#"import "a/b.proto""#, None)]
#[case::trailing_comment(r#"import "a/b.proto"; // note"#, None)]
#[case::commented_out(r#"// import "a/b.proto";"#, None)]
#[case::public_modifier(r#"import public "a/b.proto";"#, None)]
#[case::not_proto(r#"import "a/b.txt";"#, None)]
fn scan_recognizes_import_lines(#[case] line: &str, #[case] expected: Option<&str>) {
	let outcome = scan(line);
	let expected: Vec<String> = expected.into_iter().map(ToString::to_string).collect();
	assert_eq!(outcome.imports, expected);
}

#[rstest]
#[case::plain(
	r#"option go_package = "github.com/acme/project/pkg/x";"#,
	Some("github.com/acme/project/pkg/x")
)]
#[case::missing_spacing(r#"option go_package="x";"#, None)]
#[case::indented(r#"  option go_package = "x";"#, None)]
#[case::other_option(r#"option java_package = "com.acme";"#, None)]
fn scan_recognizes_package_options(#[case] line: &str, #[case] expected: Option<&str>) {
	let outcome = scan(line);
	assert_eq!(outcome.package.as_deref(), expected);
}

#[test]
fn scan_normalizes_line_endings_and_collects_everything() {
	let content = "syntax = \"proto3\";\r\nimport \"a/b.proto\";\r\noption go_package = \
	               \"first\";\noption go_package = \"second\";";
	let outcome = scan(content);

	assert_eq!(
		outcome.normalized,
		"syntax = \"proto3\";\nimport \"a/b.proto\";\noption go_package = \"first\";\noption \
		 go_package = \"second\";\n"
	);
	assert_eq!(outcome.imports, vec!["a/b.proto".to_string()]);
	// The last occurrence wins.
	assert_eq!(outcome.package.as_deref(), Some("second"));
}

#[tokio::test]
async fn resolve_converges_on_an_import_cycle() -> ProtovendResult<()> {
	let tmp = tempfile::tempdir()?;
	let fetcher = Arc::new(MapFetcher::new(&[
		("api/test/test.proto", "import \"shared/b.proto\";\n"),
		("shared/b.proto", "import \"api/test/test.proto\";\n"),
	]));
	let mut resolver = Resolver::new(fetcher.clone(), layout_in(tmp.path()));

	let groups = resolver.resolve(request(&["api/test/test.proto"], &[])).await?;

	// The cycle terminates: the local module reappears transitively under
	// the external template, which is a distinct target, and then closes.
	let local = targets_for(&groups, "buf.gen.yaml");
	assert_eq!(local.len(), 1);
	assert_eq!(local[0].module, "api/test/test.proto");

	let external = targets_for(&groups, ".vendorpb/.generate/buf.gen.yaml");
	let modules: Vec<&str> = external.iter().map(|t| t.module.as_str()).collect();
	assert_eq!(modules, vec!["api/test/test.proto", "shared/b.proto"]);

	// Three distinct targets, three fetches, no refetch of an identical one.
	assert_eq!(fetcher.call_count(), 3);

	Ok(())
}

#[tokio::test]
async fn resolve_fetches_a_shared_import_once() -> ProtovendResult<()> {
	let tmp = tempfile::tempdir()?;
	let fetcher = Arc::new(MapFetcher::new(&[
		("api/a/a.proto", "import \"shared/common.proto\";\n"),
		("api/b/b.proto", "import \"shared/common.proto\";\n"),
		("shared/common.proto", "syntax = \"proto3\";\n"),
	]));
	let mut resolver = Resolver::new(fetcher.clone(), layout_in(tmp.path()));

	let groups = resolver
		.resolve(request(&["api/a/a.proto", "api/b/b.proto"], &[]))
		.await?;

	assert_eq!(fetcher.call_count(), 3);
	assert_eq!(targets_for(&groups, ".vendorpb/.generate/buf.gen.yaml").len(), 1);

	Ok(())
}

#[tokio::test]
async fn resolve_classifies_targets() -> ProtovendResult<()> {
	let tmp = tempfile::tempdir()?;
	let fetcher = Arc::new(MapFetcher::new(&[
		(
			"api/test/test.proto",
			"option go_package = \"github.com/acme/project/pkg/test\";\n",
		),
		("ext/plain.proto", "syntax = \"proto3\";\n"),
		("ext/override.proto", "syntax = \"proto3\";\n"),
	]));
	let mut resolver = Resolver::new(fetcher, layout_in(tmp.path()));

	let mut req = request(&["api/test/test.proto"], &["ext/plain.proto", "ext/override.proto"]);
	req.overrides.insert(
		"ext/override.proto".into(),
		"github.com/acme/project/pkg/override".into(),
	);

	let groups = resolver.resolve(req).await?;

	let local = targets_for(&groups, "buf.gen.yaml");
	assert!(local[0].needs_generate);
	// A local module with no explicit override takes the destination its own
	// content declares.
	assert_eq!(
		local[0].destination.as_deref(),
		Some("github.com/acme/project/pkg/test")
	);

	let external = targets_for(&groups, ".vendorpb/.generate/buf.gen.yaml");
	let plain = external.iter().find(|t| t.module == "ext/plain.proto").unwrap();
	let with_override = external
		.iter()
		.find(|t| t.module == "ext/override.proto")
		.unwrap();
	assert!(!plain.needs_generate);
	assert!(plain.destination.is_none());
	assert!(with_override.needs_generate);

	Ok(())
}

#[tokio::test]
async fn resolve_fails_when_no_fetcher_takes_a_requested_module() {
	let tmp = tempfile::tempdir().unwrap();
	let fetcher = Arc::new(MapFetcher::new(&[]));
	let mut resolver = Resolver::new(fetcher, layout_in(tmp.path()));

	let result = resolver
		.resolve(request(&[], &["google/protobuf/wrappers.proto"]))
		.await;

	match result {
		Err(ProtovendError::NoFetcher(module)) => {
			assert_eq!(module, "google/protobuf/wrappers.proto");
		}
		other => panic!("expected NoFetcher error, got {other:?}"),
	}
}

#[tokio::test]
async fn resolve_tolerates_a_transitive_decline() -> ProtovendResult<()> {
	let tmp = tempfile::tempdir()?;
	let fetcher = Arc::new(MapFetcher::new(&[(
		"api/test/test.proto",
		"import \"google/api/annotations.proto\";\n",
	)]));
	let mut resolver = Resolver::new(fetcher, layout_in(tmp.path()));

	let groups = resolver.resolve(request(&["api/test/test.proto"], &[])).await?;

	// The gap is recorded as a target with nothing to generate, and no file
	// lands under the vendor root for it.
	let external = targets_for(&groups, ".vendorpb/.generate/buf.gen.yaml");
	assert_eq!(external.len(), 1);
	assert_eq!(external[0].module, "google/api/annotations.proto");
	assert!(!external[0].needs_generate);
	assert!(!tmp.path().join(".vendorpb/google/api/annotations.proto").exists());

	Ok(())
}

#[tokio::test]
async fn resolve_looks_up_project_qualified_overrides() -> ProtovendResult<()> {
	let tmp = tempfile::tempdir()?;
	let fetcher = Arc::new(MapFetcher::new(&[("ext/x.proto", "syntax = \"proto3\";\n")]));
	let mut resolver = Resolver::new(fetcher, layout_in(tmp.path()));

	let mut req = request(&[], &["ext/x.proto"]);
	req.overrides.insert(
		"acme/project/ext/x.proto".into(),
		"github.com/acme/project/pkg/x".into(),
	);

	let groups = resolver.resolve(req).await?;
	let external = targets_for(&groups, ".vendorpb/.generate/buf.gen.yaml");
	assert_eq!(
		external[0].destination.as_deref(),
		Some("github.com/acme/project/pkg/x")
	);

	Ok(())
}

#[tokio::test]
async fn resolve_with_empty_lists_touches_nothing() -> ProtovendResult<()> {
	let tmp = tempfile::tempdir()?;
	let fetcher = Arc::new(MapFetcher::new(&[]));
	let mut resolver = Resolver::new(fetcher.clone(), layout_in(tmp.path()));

	let groups = resolver.resolve(request(&[], &[])).await?;

	assert_eq!(groups.len(), 2);
	assert!(targets_for(&groups, "buf.gen.yaml").is_empty());
	assert!(targets_for(&groups, ".vendorpb/.generate/buf.gen.yaml").is_empty());
	assert_eq!(fetcher.call_count(), 0);
	assert!(!tmp.path().join(".vendorpb").exists());

	Ok(())
}

#[tokio::test]
async fn resolve_persists_vendored_modules() -> ProtovendResult<()> {
	let tmp = tempfile::tempdir()?;
	let fetcher = Arc::new(MapFetcher::new(&[(
		"api/test/test.proto",
		"syntax = \"proto3\";\r\npackage test;",
	)]));
	let mut resolver = Resolver::new(fetcher, layout_in(tmp.path()));

	resolver.resolve(request(&["api/test/test.proto"], &[])).await?;

	let vendored = std::fs::read_to_string(tmp.path().join(".vendorpb/api/test/test.proto"))?;
	assert_eq!(vendored, "syntax = \"proto3\";\npackage test;\n");

	Ok(())
}

#[tokio::test]
async fn resolve_surfaces_fetch_failures_with_the_module_name() {
	let tmp = tempfile::tempdir().unwrap();
	let mut resolver = Resolver::new(Arc::new(FailingFetcher), layout_in(tmp.path()));

	let result = resolver.resolve(request(&["api/test/test.proto"], &[])).await;

	match result {
		Err(ProtovendError::Fetch { module, .. }) => {
			assert_eq!(module, "api/test/test.proto");
		}
		other => panic!("expected Fetch error, got {other:?}"),
	}
}

#[tokio::test]
async fn fetcher_chain_is_strictly_ordered() -> ProtovendResult<()> {
	let first = MapFetcher::new(&[("shared/a.proto", "from first\n")]);
	let second = MapFetcher::new(&[
		("shared/a.proto", "from second\n"),
		("shared/b.proto", "from second\n"),
	]);
	let chain = FetcherChain::new(vec![Box::new(first), Box::new(second)]);

	// First applicable wins; later members are only consulted on decline.
	assert_eq!(chain.fetch("shared/a.proto").await?.as_deref(), Some("from first\n"));
	assert_eq!(chain.fetch("shared/b.proto").await?.as_deref(), Some("from second\n"));
	assert_eq!(chain.fetch("shared/c.proto").await?, None);

	Ok(())
}

#[test]
fn template_collects_plugin_overrides() -> ProtovendResult<()> {
	let template = GenTemplate {
		version: "v1".into(),
		plugins: vec![GenPlugin {
			name: "go".into(),
			opt: vec![
				"paths=source_relative".into(),
				"Mapi/x.proto=github.com/acme/project/pkg/x".into(),
			],
			..Default::default()
		}],
	};

	let overrides = template.plugin_overrides()?;
	assert_eq!(overrides.len(), 1);
	assert_eq!(
		overrides.get("api/x.proto").map(String::as_str),
		Some("github.com/acme/project/pkg/x")
	);

	Ok(())
}

#[rstest]
#[case::missing_value("Mapi/x.proto")]
#[case::double_equals("Mapi/x.proto=a=b")]
fn template_rejects_malformed_overrides(#[case] opt: &str) {
	let template = GenTemplate {
		version: "v1".into(),
		plugins: vec![GenPlugin {
			name: "go".into(),
			opt: vec![opt.to_string()],
			..Default::default()
		}],
	};

	assert!(matches!(
		template.plugin_overrides(),
		Err(ProtovendError::InvalidPluginOption(_))
	));
}

#[test]
fn template_external_copy_keeps_only_external_plugins() -> ProtovendResult<()> {
	let names = ["go", "grpc", "gw", "swagger"];
	let template = GenTemplate {
		version: "v1".into(),
		plugins: names
			.iter()
			.map(|name| GenPlugin {
				name: name.to_string(),
				..Default::default()
			})
			.collect(),
	};

	let external: GenTemplate = serde_yaml_ng::from_str(&template.external_plugins_only()?)
		.expect("external template should stay parseable");
	let kept: Vec<&str> = external.plugins.iter().map(|p| p.name.as_str()).collect();
	assert_eq!(kept, vec!["go", "grpc"]);
	assert_eq!(external.version, "v1");

	Ok(())
}

#[test]
fn config_parses_and_round_trips() -> ProtovendResult<()> {
	let config = ProtovendConfig::parse(
		"local_proto:\n  - api/test/test.proto\nexternal_proto: []\n",
	)?;
	assert_eq!(config.local_proto, vec!["api/test/test.proto".to_string()]);
	assert!(config.external_proto.is_empty());
	assert!(!config.is_empty());

	let rendered = config.to_yaml()?;
	assert_eq!(ProtovendConfig::parse(&rendered)?, config);

	Ok(())
}

#[test]
fn config_missing_file_points_at_init() {
	let tmp = tempfile::tempdir().unwrap();
	let result = ProtovendConfig::load(&tmp.path().join("protovend.yaml"));

	match result {
		Err(ProtovendError::ConfigNotFound(name)) => assert_eq!(name, "protovend.yaml"),
		other => panic!("expected ConfigNotFound, got {other:?}"),
	}
}

#[test]
fn generator_args_skips_groups_with_nothing_to_generate() {
	let layout = layout_in(Path::new("/project"));
	let template = Path::new("buf.gen.yaml");

	assert_eq!(generator_args(&layout, template, &[]), None);

	let vendored_only = vec![Target::new(
		"ext/plain.proto".into(),
		None,
		template.to_path_buf(),
		false,
	)];
	assert_eq!(generator_args(&layout, template, &vendored_only), None);
}

#[test]
fn generator_args_reference_staged_modules() {
	let layout = layout_in(Path::new("/project"));
	let template = Path::new("buf.gen.yaml");
	let targets = vec![
		Target::new("api/test/test.proto".into(), None, template.to_path_buf(), true),
		Target::new("ext/plain.proto".into(), None, template.to_path_buf(), false),
	];

	let args = generator_args(&layout, template, &targets).expect("one target needs generation");
	let args: Vec<String> = args
		.into_iter()
		.map(|arg| arg.to_string_lossy().into_owned())
		.collect();

	assert_eq!(
		args,
		vec![
			"generate".to_string(),
			"--template".into(),
			"buf.gen.yaml".into(),
			"--output".into(),
			"/project/.vendorpb/.generate".into(),
			"--path".into(),
			"/project/.vendorpb/api/test/test.proto".into(),
			"/project/.vendorpb".into(),
		]
	);
}

#[rstest]
#[case::default_output(None, "internal/pb/api/test")]
#[case::override_destination(
	Some("github.com/acme/project/pkg/billing"),
	"pkg/billing"
)]
fn destination_dirs_are_re_rooted(#[case] destination: Option<&str>, #[case] expected: &str) {
	let layout = layout_in(Path::new("/project"));
	let target = Target::new(
		"api/test/test.proto".into(),
		destination.map(ToString::to_string),
		PathBuf::from("buf.gen.yaml"),
		true,
	);

	let dir = destination_dir(&layout, &target).expect("destination should resolve");
	assert_eq!(dir, Path::new("/project").join(expected));
}

#[test]
fn destination_without_project_repo_is_invalid() {
	let layout = layout_in(Path::new("/project"));
	let target = Target::new(
		"pkg/x.proto".into(),
		Some("not-matching-the-project-identifier".into()),
		PathBuf::from("buf.gen.yaml"),
		false,
	);

	assert!(matches!(
		destination_dir(&layout, &target),
		Err(ProtovendError::InvalidDestination { .. })
	));
}

#[test]
fn migrate_moves_prefixed_files_and_reclaims_staging() -> ProtovendResult<()> {
	let tmp = tempfile::tempdir()?;
	let layout = layout_in(tmp.path());
	let staged = layout.staging_root().join("api/test");
	std::fs::create_dir_all(&staged)?;
	std::fs::create_dir_all(staged.join("nested"))?;
	std::fs::write(staged.join("test.pb.go"), "pb")?;
	std::fs::write(staged.join("test_grpc.pb.go"), "grpc")?;
	std::fs::write(staged.join("other.pb.go"), "other")?;

	let targets = vec![Target::new(
		"api/test/test.proto".into(),
		None,
		PathBuf::from("buf.gen.yaml"),
		true,
	)];
	migrate(&layout, &targets)?;

	let out = tmp.path().join("internal/pb/api/test");
	assert!(out.join("test.pb.go").exists());
	assert!(out.join("test_grpc.pb.go").exists());
	// Files that don't share the module's base name stay behind and vanish
	// with the staging root.
	assert!(!out.join("other.pb.go").exists());
	assert!(!layout.staging_root().exists());

	Ok(())
}

#[test]
fn migrate_rejects_invalid_destinations_before_touching_disk() -> ProtovendResult<()> {
	let tmp = tempfile::tempdir()?;
	let layout = layout_in(tmp.path());
	let staged = layout.staging_root().join("pkg");
	std::fs::create_dir_all(&staged)?;
	std::fs::write(staged.join("x.pb.go"), "pb")?;

	let targets = vec![Target::new(
		"pkg/x.proto".into(),
		Some("not-matching-the-project-identifier".into()),
		PathBuf::from("buf.gen.yaml"),
		false,
	)];

	assert!(matches!(
		migrate(&layout, &targets),
		Err(ProtovendError::InvalidDestination { .. })
	));
	// The staged file is still in place and no destination dir appeared.
	assert!(staged.join("x.pb.go").exists());
	assert!(!tmp.path().join("internal/pb").exists());

	Ok(())
}

#[test]
fn migrate_tolerates_a_missing_staging_root() -> ProtovendResult<()> {
	let tmp = tempfile::tempdir()?;
	migrate(&layout_in(tmp.path()), &[])
}
