use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum ProtovendError {
	#[error(transparent)]
	#[diagnostic(code(protovend::io_error))]
	Io(#[from] std::io::Error),

	#[error("config file `{0}` not found")]
	#[diagnostic(
		code(protovend::config_not_found),
		help("run `protovend init` to scaffold a config file")
	)]
	ConfigNotFound(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(protovend::config_parse),
		help("check that the config is valid YAML with `local_proto` and `external_proto` lists")
	)]
	ConfigParse(String),

	#[error("generator template `{0}` not found")]
	#[diagnostic(code(protovend::template_not_found))]
	TemplateNotFound(String),

	#[error("failed to parse generator template: {0}")]
	#[diagnostic(code(protovend::template_parse))]
	TemplateParse(String),

	#[error("invalid plugin option `{0}`")]
	#[diagnostic(
		code(protovend::invalid_plugin_option),
		help("destination overrides must look like `M<module>=<path>` with exactly one `=`")
	)]
	InvalidPluginOption(String),

	#[error("failed to fetch `{module}`: {reason}")]
	#[diagnostic(code(protovend::fetch))]
	Fetch { module: String, reason: String },

	#[error("repository request failed: {0}")]
	#[diagnostic(code(protovend::http))]
	Http(String),

	#[error("no fetcher applicable for module `{0}`")]
	#[diagnostic(
		code(protovend::no_fetcher),
		help(
			"local modules must live under `api/` in the project tree; remote modules need a \
			 repository token (`--token` or the configured token env var)"
		)
	)]
	NoFetcher(String),

	#[error("resolution task failed: {0}")]
	#[diagnostic(code(protovend::task))]
	Task(String),

	#[error("invalid destination `{destination}` for `{module}`")]
	#[diagnostic(
		code(protovend::invalid_destination),
		help("override destinations must contain the project repository identifier")
	)]
	InvalidDestination { module: String, destination: String },

	#[error("failed to create dir `{path}`: {reason}")]
	#[diagnostic(code(protovend::create_dir))]
	CreateDir { path: String, reason: String },

	#[error("generator exited with {0}")]
	#[diagnostic(code(protovend::generator))]
	Generator(std::process::ExitStatus),

	#[error("failed to remove temp generated dir")]
	#[diagnostic(code(protovend::staging_cleanup))]
	StagingCleanup,
}

pub type ProtovendResult<T> = Result<T, ProtovendError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
