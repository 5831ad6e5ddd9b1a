//! Line scanner for the two declaration shapes the resolver cares about.
//!
//! Only lines anchored at the start of the line are recognized: an import
//! declaration contributes a dependency module, and an output-package option
//! contributes a discovered destination. Multi-line imports, indented lines,
//! and commented-out declarations are ignored by design.

/// Result of scanning fetched module content.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScanOutcome {
	/// Dependency modules discovered from import declarations.
	pub imports: Vec<String>,
	/// Destination discovered from an output-package declaration, if any.
	/// When the option appears more than once the last occurrence wins.
	pub package: Option<String>,
	/// The content with line endings normalized to `\n`, ready to persist
	/// under the vendor root.
	pub normalized: String,
}

/// Scan `content` line by line, collecting imports and the output package
/// while normalizing line endings.
pub fn scan(content: &str) -> ScanOutcome {
	let mut outcome = ScanOutcome::default();

	for line in content.lines() {
		outcome.normalized.push_str(line);
		outcome.normalized.push('\n');

		if let Some(path) = import_path(line) {
			outcome.imports.push(path.to_string());
		}

		if let Some(package) = package_option(line) {
			outcome.package = Some(package.to_string());
		}
	}

	outcome
}

/// Recognize `import "<path>";` at the start of a line. The quoted path must
/// contain a `/` and end with `.proto`; the line must end with `;`.
fn import_path(line: &str) -> Option<&str> {
	let rest = line.strip_prefix("import")?.trim_start();
	let rest = rest.strip_prefix('"')?;
	let (path, tail) = rest.split_once('"')?;

	if !tail.ends_with(';') {
		return None;
	}
	if !path.contains('/') || !path.ends_with(".proto") {
		return None;
	}

	Some(path)
}

/// Recognize `option go_package = "<value>";` at the start of a line, with
/// exactly this spacing.
fn package_option(line: &str) -> Option<&str> {
	line
		.strip_prefix("option go_package = \"")?
		.strip_suffix("\";")
}
