use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use owo_colors::OwoColorize;
use protovend_cli::Commands;
use protovend_cli::ProtovendCli;
use protovend_core::CONFIG_TEMPLATE;
use protovend_core::Fetcher;
use protovend_core::FetcherChain;
use protovend_core::GEN_TEMPLATE;
use protovend_core::GenTemplate;
use protovend_core::GithubFetcher;
use protovend_core::LocalFetcher;
use protovend_core::ProtovendConfig;
use protovend_core::ResolveRequest;
use protovend_core::Resolver;
use protovend_core::Target;
use protovend_core::TreeLayout;
use protovend_core::migrate;
use protovend_core::run_generator;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = ProtovendCli::parse();

	// Respect the NO_COLOR env var.
	let use_color = std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let default_level = if args.verbose { "debug" } else { "warn" };
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();

	let result = match args.command {
		Some(Commands::Init {
			force,
			ref config,
			ref vendor_dir,
		}) => run_init(&args, force, config, vendor_dir),
		Some(Commands::Add {
			ref service,
			ref project,
			force,
			ref config,
		}) => run_add(&args, service, project, force, config),
		Some(Commands::Vendor {
			ref buf,
			ref template,
			ref config,
			ref vendor_dir,
			ref output,
			ref project,
			ref token_key,
			ref token,
		}) => run_vendor(
			&args,
			VendorOptions {
				buf,
				template,
				config,
				vendor_dir,
				output,
				project,
				token_key,
				token: token.as_deref(),
			},
		),
		None => {
			eprintln!("No subcommand specified. Run `protovend --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Try to render through miette for rich diagnostics with help text
		// and error codes.
		match e.downcast::<protovend_core::ProtovendError>() {
			Ok(err) => {
				let report: miette::Report = (*err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

fn resolve_root(args: &ProtovendCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn run_init(
	args: &ProtovendCli,
	force: bool,
	config: &str,
	vendor_dir: &str,
) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);

	add_vendor_dir_to_gitignore(&root, vendor_dir)?;

	let template_path = root.join("buf.gen.yaml");
	if template_path.exists() {
		println!(
			"Generator template already exists: {}",
			template_path.display()
		);
	} else {
		std::fs::write(&template_path, GEN_TEMPLATE)?;
		println!("Created generator template: {}", template_path.display());
	}

	let config_path = root.join(config);
	if config_path.exists() && !force {
		println!("{} config already exists", colored!("warning:", yellow));
		return Ok(());
	}

	std::fs::write(&config_path, CONFIG_TEMPLATE)?;
	println!("Created {config}");

	println!();
	println!("Next steps:");
	println!("  1. Run `protovend add <service> --project <repo>` to scaffold a service");
	println!("  2. List external modules under `external_proto` in {config}");
	println!("  3. Run `protovend vendor --project <repo>` to vendor and generate");

	Ok(())
}

/// Append the vendor dir and the tool bin dir to `.gitignore`, creating the
/// file when absent. Skips when the vendor dir is already listed.
fn add_vendor_dir_to_gitignore(root: &Path, vendor_dir: &str) -> Result<(), Box<dyn std::error::Error>> {
	let path = root.join(".gitignore");
	let existing = match std::fs::read_to_string(&path) {
		Ok(content) => content,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
		Err(e) => return Err(e.into()),
	};

	if existing.contains(vendor_dir) {
		return Ok(());
	}

	let mut updated = existing;
	if !updated.is_empty() && !updated.ends_with('\n') {
		updated.push('\n');
	}
	updated.push_str(vendor_dir);
	updated.push_str("\nbin\n");
	std::fs::write(path, updated)?;

	Ok(())
}

const PROTO_TEMPLATE: &str = r#"syntax = "proto3";

package {{ package }};

option go_package = "{{ go_package }}";

import "google/api/annotations.proto";

service {{ service }} {
  rpc Call(CallRequest) returns (CallResponse) {
    option (google.api.http) = {
      post: "/v1/call"
      body: "*"
    };
  }
  rpc ClientStream(stream ClientStreamRequest) returns (ClientStreamResponse) {}
  rpc ServerStream(ServerStreamRequest) returns (stream ServerStreamResponse) {}
  rpc BidiStream(stream BidiStreamRequest) returns (stream BidiStreamResponse) {}
}

message CallRequest {
  string name = 1;
}

message CallResponse {
  string msg = 1;
}

message ClientStreamRequest {
  int64 stroke = 1;
}

message ClientStreamResponse {
  int64 count = 1;
}

message ServerStreamRequest {
  int64 count = 1;
}

message ServerStreamResponse {
  int64 count = 1;
}

message BidiStreamRequest {
  int64 stroke = 1;
}

message BidiStreamResponse {
  int64 stroke = 1;
}
"#;

fn render_service_proto(
	package: &str,
	go_package: &str,
	service: &str,
) -> Result<String, Box<dyn std::error::Error>> {
	let mut env = minijinja::Environment::new();
	env.set_keep_trailing_newline(true);
	env.add_template("__service__", PROTO_TEMPLATE)?;

	let template = env.get_template("__service__")?;
	let rendered = template.render(minijinja::context! { package, go_package, service })?;

	Ok(rendered)
}

/// Turn a kebab-case service name into a service identifier:
/// `billing-gateway` becomes `BillingGateway`.
fn service_identifier(service: &str) -> String {
	service
		.split('-')
		.map(|segment| {
			let mut chars = segment.chars();
			match chars.next() {
				Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
				None => String::new(),
			}
		})
		.collect()
}

fn run_add(
	args: &ProtovendCli,
	service: &str,
	project: &str,
	force: bool,
	config: &str,
) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);

	let module = format!("api/{service}/{}.proto", service.replace('-', "_"));
	let proto_path = root.join(&module);

	if proto_path.exists() && !force {
		println!("{} service already exists", colored!("warning:", yellow));
		return Ok(());
	}

	let package = format!("{project}/api/{service}")
		.replace('/', ".")
		.replace('-', "_");
	let go_package = format!("{project}/pkg/{service}");
	let rendered = render_service_proto(&package, &go_package, &service_identifier(service))?;

	if let Some(dir) = proto_path.parent() {
		std::fs::create_dir_all(dir)?;
	}
	std::fs::write(&proto_path, rendered)?;
	println!("Created {module}");

	let config_path = root.join(config);
	let mut cfg = ProtovendConfig::load(&config_path)?;
	if !cfg.local_proto.iter().any(|existing| existing == &module) {
		cfg.local_proto.push(module.clone());
	}
	std::fs::write(&config_path, cfg.to_yaml()?)?;
	println!("Registered {module} in {config}");

	Ok(())
}

struct VendorOptions<'a> {
	buf: &'a Path,
	template: &'a str,
	config: &'a str,
	vendor_dir: &'a str,
	output: &'a str,
	project: &'a str,
	token_key: &'a str,
	token: Option<&'a str>,
}

fn run_vendor(
	args: &ProtovendCli,
	options: VendorOptions<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);

	// The env var named by --token-key wins over the flag.
	let token = std::env::var(options.token_key)
		.ok()
		.filter(|token| !token.is_empty())
		.or_else(|| options.token.map(ToString::to_string));

	let local_template = root.join(options.template);
	let gen_template = GenTemplate::load(&local_template)?;

	// Malformed overrides fail here, before any fetching starts.
	let overrides = gen_template.plugin_overrides()?;

	let layout = TreeLayout {
		root: root.clone(),
		vendor_dir: options.vendor_dir.into(),
		output_dir: options.output.into(),
		project_repo: options.project.to_string(),
	};

	// External targets are generated under a template copy that keeps only
	// the external plugins; it lives in the staging root so it disappears
	// with it.
	let external_template = layout.staging_root().join(options.template);
	if let Some(dir) = external_template.parent() {
		std::fs::create_dir_all(dir)?;
	}
	std::fs::write(&external_template, gen_template.external_plugins_only()?)?;

	let cfg = ProtovendConfig::load(&root.join(options.config))?;
	if cfg.is_empty() {
		println!("{} no proto modules in config", colored!("warning:", yellow));
		return Ok(());
	}

	let mut fetchers: Vec<Box<dyn Fetcher>> = vec![Box::new(LocalFetcher::new(root.clone()))];
	if let Some(token) = token {
		fetchers.push(Box::new(GithubFetcher::new(Some(token))));
	}

	let mut resolver = Resolver::new(Arc::new(FetcherChain::new(fetchers)), layout.clone());

	println!("{}", colored!("Vendoring...", bold));
	let rt = tokio::runtime::Runtime::new()?;
	let groups = rt.block_on(resolver.resolve(ResolveRequest {
		local_modules: cfg.local_proto,
		external_modules: cfg.external_proto,
		local_template: local_template.clone(),
		external_template: external_template.clone(),
		overrides,
	}))?;

	// Local template first, then external, so invocation order is stable.
	let mut to_migrate: Vec<Target> = Vec::new();
	for identity in [&local_template, &external_template] {
		let Some(targets) = groups.get(identity.as_path()) else {
			continue;
		};
		run_generator(&layout, options.buf, identity, targets)?;
		to_migrate.extend(targets.iter().cloned());
	}

	migrate(&layout, &to_migrate)?;

	println!("Vendored {} module(s).", to_migrate.len());

	if args.verbose {
		let mut modules: Vec<&str> = to_migrate.iter().map(|t| t.module.as_str()).collect();
		modules.sort_unstable();
		for module in modules {
			println!("  {module}");
		}
	}

	Ok(())
}
