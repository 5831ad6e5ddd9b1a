use assert_cmd::Command;

pub fn protovend_cmd() -> Command {
	let mut cmd = Command::cargo_bin("protovend").expect("binary `protovend` should build");
	cmd.env("NO_COLOR", "1").env_remove("GITHUB_TOKEN");
	cmd
}
