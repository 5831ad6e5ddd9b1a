//! Placement of generated output.
//!
//! The generator writes into a flat staging layout mirroring each module's
//! directory. Migration moves every staged file whose name starts with the
//! module's base name into its final destination, then reclaims the staging
//! root.

use std::path::Path;
use std::path::PathBuf;

use tracing::debug;

use crate::ProtovendError;
use crate::ProtovendResult;
use crate::Target;
use crate::TreeLayout;

/// Compute the final directory for a target's generated files.
///
/// Without an explicit destination the module's directory is re-rooted under
/// the default output root. With one, the destination must contain the
/// project repository identifier; the text through the identifier is
/// stripped and the remainder is re-rooted at the project working directory.
pub fn destination_dir(layout: &TreeLayout, target: &Target) -> ProtovendResult<PathBuf> {
	match &target.destination {
		None => {
			let module_dir = Path::new(&target.module)
				.parent()
				.unwrap_or_else(|| Path::new(""));
			Ok(layout.root.join(&layout.output_dir).join(module_dir))
		}
		Some(destination) => {
			let Some((_, after)) = destination.split_once(&layout.project_repo) else {
				return Err(ProtovendError::InvalidDestination {
					module: target.module.clone(),
					destination: destination.clone(),
				});
			};

			Ok(layout.root.join(after.trim_start_matches('/')))
		}
	}
}

/// Move every generated file for the given targets out of the staging root
/// and into place, then delete the staging root.
///
/// Only targets marked for generation are touched. The staged directory of a
/// module is scanned non-recursively; subdirectories are skipped, never
/// descended into. A failure to delete the staging root is reported as its
/// own error after all moves have completed.
pub fn migrate(layout: &TreeLayout, targets: &[Target]) -> ProtovendResult<()> {
	let staging_root = layout.staging_root();

	for target in targets {
		if !target.needs_generate {
			continue;
		}

		let from = staging_root
			.join(&target.module)
			.parent()
			.map(Path::to_path_buf)
			.unwrap_or_else(|| staging_root.clone());

		// Destination validity is checked before touching the filesystem
		// for this target.
		let to = destination_dir(layout, target)?;

		std::fs::create_dir_all(&to).map_err(|e| {
			ProtovendError::CreateDir {
				path: to.display().to_string(),
				reason: e.to_string(),
			}
		})?;

		let module_stem = Path::new(&target.module)
			.file_stem()
			.map(|stem| stem.to_string_lossy().into_owned())
			.unwrap_or_default();

		for entry in std::fs::read_dir(&from)? {
			let entry = entry?;
			if entry.file_type()?.is_dir() {
				continue;
			}

			let name = entry.file_name();
			if name.to_string_lossy().starts_with(&module_stem) {
				debug!(
					file = %name.to_string_lossy(),
					to = %to.display(),
					"moving generated file"
				);
				std::fs::rename(entry.path(), to.join(&name))?;
			}
		}
	}

	match std::fs::remove_dir_all(&staging_root) {
		Ok(()) => Ok(()),
		// Nothing was staged; nothing to reclaim.
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(_) => Err(ProtovendError::StagingCleanup),
	}
}
