use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Vendor proto dependencies and drive code generation from one command.",
	long_about = "protovend resolves every proto module a project depends on — including \
	              everything reachable through import statements — vendors the files locally, \
	              runs the external code generator over them, and moves the generated artifacts \
	              into the project tree.\n\nQuick start:\n  protovend init     Scaffold the config \
	              and generator template\n  protovend add      Add a service proto skeleton\n  \
	              protovend vendor   Resolve, vendor, generate, and place"
)]
pub struct ProtovendCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Initialize protovend in a project.
	///
	/// Adds the vendor directory and `bin` to `.gitignore`, writes a default
	/// generator template when none exists, and creates the starter config
	/// file. Existing files are left alone unless `--force` is given.
	Init {
		/// Recreate the config file even when one already exists.
		#[arg(long, default_value_t = false)]
		force: bool,

		/// Name of the config file to create.
		#[arg(long, default_value = "protovend.yaml")]
		config: String,

		/// Folder for vendored proto files, added to `.gitignore`.
		#[arg(long, default_value = ".vendorpb")]
		vendor_dir: String,
	},
	/// Add a proto service skeleton and register it in the config.
	///
	/// Renders a proto3 file with an HTTP-annotated unary call plus client,
	/// server, and bidirectional streaming RPCs to
	/// `api/<service>/<service>.proto`, and appends the module to
	/// `local_proto` in the config. Warns when the service already exists.
	Add {
		/// Kebab-case service name, e.g. `billing-gateway`.
		service: String,

		/// Project repository identifier, e.g. `github.com/acme/project`.
		#[arg(long)]
		project: String,

		/// Recreate the proto file even when it already exists.
		#[arg(long, default_value_t = false)]
		force: bool,

		/// Name of the config file to update.
		#[arg(long, default_value = "protovend.yaml")]
		config: String,
	},
	/// Resolve, vendor, generate, and place proto modules.
	///
	/// Reads the module lists from the config, resolves their transitive
	/// import closure (fetching each distinct target exactly once), vendors
	/// every fetched file, runs the generator once per template identity,
	/// and moves the generated output into the project tree.
	Vendor {
		/// Path to the generator binary.
		#[arg(long, default_value = "./bin/buf")]
		buf: PathBuf,

		/// Generator template file.
		#[arg(long, default_value = "buf.gen.yaml")]
		template: String,

		/// Config file with the module lists.
		#[arg(long, default_value = "protovend.yaml")]
		config: String,

		/// Folder for vendored proto files.
		#[arg(long, default_value = ".vendorpb")]
		vendor_dir: String,

		/// Folder for generated files without an explicit destination.
		#[arg(long, default_value = "internal/pb")]
		output: String,

		/// Project repository identifier; override destinations must
		/// contain it.
		#[arg(long)]
		project: String,

		/// Env var consulted for the repository token. Without a token only
		/// the local fetcher is available.
		#[arg(long, default_value = "GITHUB_TOKEN")]
		token_key: String,

		/// Repository token; the env var named by `--token-key` wins when
		/// both are set.
		#[arg(long)]
		token: Option<String>,
	},
}
