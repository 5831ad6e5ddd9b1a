use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::ProtovendError;
use crate::ProtovendResult;

/// Starter config content written by `protovend init`.
pub const CONFIG_TEMPLATE: &str = "local_proto: []\nexternal_proto: []\n";

/// Configuration loaded from a `protovend.yaml` file.
///
/// ```yaml
/// local_proto:
///   - api/billing/billing.proto
/// external_proto:
///   - google/protobuf/timestamp.proto
/// ```
///
/// `local_proto` lists modules resolvable from the project's own tree;
/// `external_proto` lists modules that come from a remote repository or a
/// vendored source. Both lists feed the resolver as the initial module set.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProtovendConfig {
	/// Modules under the project tree, generated with the full template.
	#[serde(default)]
	pub local_proto: Vec<String>,
	/// Modules fetched from elsewhere, generated with the external template.
	#[serde(default)]
	pub external_proto: Vec<String>,
}

impl ProtovendConfig {
	/// Load the config from `path`. A missing file is reported with a hint to
	/// run `protovend init`.
	pub fn load(path: &Path) -> ProtovendResult<Self> {
		let content = match std::fs::read_to_string(path) {
			Ok(content) => content,
			Err(e) if e.kind() == ErrorKind::NotFound => {
				let name = path
					.file_name()
					.map_or_else(|| path.display().to_string(), |name| {
						name.to_string_lossy().into_owned()
					});
				return Err(ProtovendError::ConfigNotFound(name));
			}
			Err(e) => return Err(e.into()),
		};

		Self::parse(&content)
	}

	/// Parse config content.
	pub fn parse(content: &str) -> ProtovendResult<Self> {
		serde_yaml_ng::from_str(content).map_err(|e| ProtovendError::ConfigParse(e.to_string()))
	}

	/// Serialize the config back to YAML for rewriting.
	pub fn to_yaml(&self) -> ProtovendResult<String> {
		serde_yaml_ng::to_string(self).map_err(|e| ProtovendError::ConfigParse(e.to_string()))
	}

	/// Returns true when both module lists are empty and there is nothing to
	/// vendor.
	pub fn is_empty(&self) -> bool {
		self.local_proto.is_empty() && self.external_proto.is_empty()
	}
}
