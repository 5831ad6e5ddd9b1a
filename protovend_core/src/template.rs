use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::ProtovendError;
use crate::ProtovendResult;

/// Plugin names that apply to externally sourced modules. The external
/// template copy keeps only these.
const EXTERNAL_PLUGINS: [&str; 2] = ["go", "grpc"];

/// Generator template written by `protovend init`.
pub const GEN_TEMPLATE: &str = r#"version: v1
plugins:
  - name: go
    path: bin/protoc-gen-go
    out: .
    opt:
      - paths=source_relative
  - name: grpc
    path: bin/protoc-gen-go-grpc
    out: .
    opt:
      - paths=source_relative
  - name: gw
    path: bin/protoc-gen-grpc-gateway
    out: .
    opt:
      - logtostderr=true
      - paths=source_relative
      - generate_unbound_methods=true
  - name: swagger
    path: bin/protoc-gen-openapiv2
    out: .
    opt:
      - generate_unbound_methods=true
"#;

/// Configuration file consumed by the external generator (`buf generate`).
///
/// Only the parts this tool inspects are modeled: the format version and the
/// plugin list with their options.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct GenTemplate {
	#[serde(default)]
	pub version: String,
	#[serde(default)]
	pub plugins: Vec<GenPlugin>,
}

/// A single plugin entry of the generator template.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct GenPlugin {
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub path: String,
	#[serde(default)]
	pub out: String,
	#[serde(default)]
	pub opt: Vec<String>,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub strategy: String,
}

impl GenTemplate {
	/// Load the template from `path`.
	pub fn load(path: &Path) -> ProtovendResult<Self> {
		let content = match std::fs::read_to_string(path) {
			Ok(content) => content,
			Err(e) if e.kind() == ErrorKind::NotFound => {
				return Err(ProtovendError::TemplateNotFound(path.display().to_string()));
			}
			Err(e) => return Err(e.into()),
		};

		serde_yaml_ng::from_str(&content).map_err(|e| ProtovendError::TemplateParse(e.to_string()))
	}

	/// Collect `M<module>=<destination>` plugin options into a destination
	/// override map. An entry without exactly one `=` is a configuration
	/// error, surfaced before any fetching starts.
	pub fn plugin_overrides(&self) -> ProtovendResult<HashMap<String, String>> {
		let mut overrides = HashMap::new();

		for plugin in &self.plugins {
			for opt in &plugin.opt {
				let Some(flag) = opt.strip_prefix('M') else {
					continue;
				};

				let mut parts = flag.split('=');
				match (parts.next(), parts.next(), parts.next()) {
					(Some(module), Some(destination), None) => {
						overrides.insert(module.to_string(), destination.to_string());
					}
					_ => return Err(ProtovendError::InvalidPluginOption(flag.to_string())),
				}
			}
		}

		Ok(overrides)
	}

	/// Serialize a copy of the template retaining only the plugins that apply
	/// to external modules. This copy is the template identity under which
	/// external targets are generated.
	pub fn external_plugins_only(&self) -> ProtovendResult<String> {
		let external = GenTemplate {
			version: self.version.clone(),
			plugins: self
				.plugins
				.iter()
				.filter(|plugin| EXTERNAL_PLUGINS.contains(&plugin.name.as_str()))
				.map(|plugin| GenPlugin {
					name: plugin.name.clone(),
					path: plugin.path.clone(),
					out: plugin.out.clone(),
					opt: plugin.opt.clone(),
					strategy: plugin.strategy.clone(),
				})
				.collect(),
		};

		serde_yaml_ng::to_string(&external).map_err(|e| ProtovendError::TemplateParse(e.to_string()))
	}
}
