//! Workspace configuration driving problem matching

use std::fs;

use bep_cli::{RenderOptions, render, replay};
use bep_config::{BepConfig, workspace_config_path};
use bep_engine::{BuildEventSession, DiagnosticStream, FileUriResolver};
use bep_matcher::MarkerFilter;
use bep_types::Severity;

use crate::common::{self, Fixture};

const WORKSPACE_CONFIG: &str = r#"
[session]
encoding = "windows-1252"
diagnostic_stream = "stderr"

[[problem_matchers.Scalac]]
name = "scalac"
file_prefix = "${workspaceRoot}/"
begin = '^\[info\] compiling'
end = '^\[error\] \d+ errors? found'

[[problem_matchers.Scalac.pattern]]
regexp = '^\[(?<severity>error|warn)\] (?<file>[^:\s]+):(?<line>\d+):(?<column>\d+):$'

[[problem_matchers.Scalac.pattern]]
regexp = '^\[(?:error|warn)\] (?<message>.+)$'

[problem_matchers.Scalac.severity_map]
warn = "warning"
"#;

#[tokio::test]
async fn workspace_matcher_and_encoding() {
    let fixture = Fixture::new();
    fixture.write(".bep/config.toml", WORKSPACE_CONFIG);
    let config = BepConfig::load_from(&workspace_config_path(fixture.path()))
        .unwrap()
        .unwrap();
    let options = config.session_options().unwrap();
    assert_eq!(options.diagnostic_stream, DiagnosticStream::Stderr);

    // "café" in windows-1252: 0xE9 is not valid UTF-8 on its own.
    let stderr: &[u8] = b"[info] compiling 2 Scala sources
[error] src/Main.scala:3:9:
[error] not found: value caf\xe9
[warn] src/Util.scala:1:1:
[warn] unused import
[error] 1 error found
";
    fs::write(fixture.path().join("scalac.stderr"), stderr).unwrap();

    let events = fixture.events(&[
        common::started(&fixture.root(), "0"),
        common::action(
            "//src:main",
            "Scalac",
            false,
            Some(&fixture.uri("scalac.stderr")),
        ),
        common::finished(1, "10"),
    ]);

    let mut session = BuildEventSession::new(config.matcher_registry(), FileUriResolver, options);
    replay(&mut session, &events).await.unwrap();
    let output = render(&mut session, RenderOptions::default()).await;

    let root = fixture.root();
    assert!(output.contains("3:9 not found: value café - error"), "{output}");
    assert!(output.contains(&format!("{root}/src/Util.scala - 1 problem")), "{output}");

    let warnings = session.markers().read(
        &MarkerFilter::all()
            .resource(format!("{root}/src/Util.scala"))
            .severity_at_least(Severity::Warning),
    );
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity(), Severity::Warning);
    assert_eq!(warnings[0].message(), "unused import");
}
