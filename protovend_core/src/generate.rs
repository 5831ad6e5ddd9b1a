//! External generator invocation.
//!
//! One invocation per template identity: the argument list points the
//! generator at the template, at every staged module that needs generation,
//! and at the staging output directory. Generation is assumed deterministic
//! and idempotent, so nothing here retries; a caller retries by re-running
//! the pipeline.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;

use tracing::info;

use crate::ProtovendError;
use crate::ProtovendResult;
use crate::Target;
use crate::TreeLayout;

/// Build the generator argument list for one template group.
///
/// Returns `None` when no invocation is needed: the group is empty, or no
/// target in it is marked for generation.
pub fn generator_args(
	layout: &TreeLayout,
	template: &Path,
	targets: &[Target],
) -> Option<Vec<OsString>> {
	if targets.is_empty() {
		return None;
	}

	let mut args: Vec<OsString> = vec![
		"generate".into(),
		"--template".into(),
		template.as_os_str().to_os_string(),
		"--output".into(),
		layout.staging_root().into_os_string(),
	];

	let mut added = 0;
	for target in targets {
		if !target.needs_generate {
			continue;
		}
		args.push("--path".into());
		args.push(layout.module_path(&target.module).into_os_string());
		added += 1;
	}

	if added == 0 {
		return None;
	}

	args.push(layout.vendor_root().into_os_string());
	Some(args)
}

/// Run the external generator over one template group, relaying its stdout
/// and stderr. A non-zero exit is returned verbatim as a hard failure.
pub fn run_generator(
	layout: &TreeLayout,
	generator: &Path,
	template: &Path,
	targets: &[Target],
) -> ProtovendResult<()> {
	let Some(args) = generator_args(layout, template, targets) else {
		return Ok(());
	};

	info!(
		generator = %generator.display(),
		template = %template.display(),
		"running generator"
	);

	let status = Command::new(generator)
		.args(&args)
		.stdout(Stdio::inherit())
		.stderr(Stdio::inherit())
		.status()?;

	if !status.success() {
		return Err(ProtovendError::Generator(status));
	}

	Ok(())
}
