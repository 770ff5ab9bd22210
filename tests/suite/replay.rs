//! End-to-end replay of event files through a session

use bep_cli::{RenderOptions, build_outcome, render, replay};
use bep_config::BepConfig;
use bep_engine::{BuildEventSession, FileUriResolver, SessionOptions};
use bep_matcher::MarkerFilter;

use crate::common::{self, Fixture};

const GCC_STDERR: &str = "\
In file included from app/main.cc:1:
app/main.cc:7:3: error: expected ';' after expression
app/main.cc:9:1: warning: unused variable 'x'
";

fn session() -> BuildEventSession {
    let config = BepConfig::default();
    BuildEventSession::new(
        config.matcher_registry(),
        FileUriResolver,
        SessionOptions::default(),
    )
}

#[tokio::test]
async fn failed_build_lists_problems() {
    let fixture = Fixture::new();
    fixture.write("out/stderr-7", GCC_STDERR);
    let events = fixture.events(&[
        common::started(&fixture.root(), "1000"),
        common::action("//app:util", "CppCompile", true, None),
        common::action(
            "//app:main",
            "CppCompile",
            false,
            Some(&fixture.uri("out/stderr-7")),
        ),
        common::finished(1, "3000"),
    ]);

    let mut session = session();
    let sent = replay(&mut session, &events).await.unwrap();
    assert_eq!(sent, 4);
    assert_eq!(build_outcome(&session), Some(false));

    let output = render(&mut session, RenderOptions::default()).await;
    let root = fixture.root();
    assert!(output.contains("//app:main - CppCompile exited with 1"), "{output}");
    assert!(output.contains(&format!("  {root}/app/main.cc - 2 problems")), "{output}");
    assert!(output.contains("    7:3 expected ';' after expression - error"), "{output}");
    assert!(output.contains("Build failed (2000ms) - BUILD_FAILURE"), "{output}");
    assert!(!output.contains("//app:util"), "{output}");
    assert!(output.ends_with("E:1 W:1\n"), "{output}");

    let errors = session
        .markers()
        .read(&MarkerFilter::all().resource(format!("{root}/app/main.cc")));
    assert_eq!(errors.len(), 2);
}

#[tokio::test]
async fn successful_build_reports_elapsed_time() {
    let fixture = Fixture::new();
    let events = fixture.events(&[
        common::started(&fixture.root(), "1000"),
        common::action("//app:main", "CppCompile", true, None),
        common::finished(0, "2500"),
    ]);

    let mut session = session();
    replay(&mut session, &events).await.unwrap();
    assert_eq!(build_outcome(&session), Some(true));

    let output = render(&mut session, RenderOptions::default()).await;
    assert_eq!(
        output,
        "Build started - build 7.1.0\nBuild succeeded (1500ms) - SUCCESS\n"
    );
}

#[tokio::test]
async fn expand_all_shows_target_outputs() {
    let fixture = Fixture::new();
    let events = fixture.events(&[
        common::started(&fixture.root(), "1000"),
        common::named_set(
            "0",
            &[
                ("libutil.a", "file:///out/libutil.a"),
                ("libutil.so", "file:///out/libutil.so"),
            ],
        ),
        common::configured("//app:util", "cc_library rule"),
        common::completed("//app:util", true, "0"),
    ]);

    let mut session = session();
    replay(&mut session, &events).await.unwrap();
    assert_eq!(build_outcome(&session), None);

    let collapsed = render(&mut session, RenderOptions::default()).await;
    assert!(collapsed.contains("//app:util [cc_library] - cc_library rule"), "{collapsed}");
    assert!(!collapsed.contains("libutil.a"), "{collapsed}");

    let expanded = render(&mut session, RenderOptions { expand_all: true }).await;
    assert!(expanded.contains("  libutil.a - file:///out/libutil.a"), "{expanded}");
    assert!(expanded.contains("  libutil.so - file:///out/libutil.so"), "{expanded}");
}

#[tokio::test]
async fn unreadable_output_is_reported_inline() {
    let fixture = Fixture::new();
    let events = fixture.events(&[
        common::started(&fixture.root(), "1000"),
        common::action(
            "//app:main",
            "CppCompile",
            false,
            Some(&fixture.uri("out/missing")),
        ),
        common::finished(1, "2000"),
    ]);

    let mut session = session();
    replay(&mut session, &events).await.unwrap();
    let output = render(&mut session, RenderOptions::default()).await;
    assert!(output.contains("  ! failed to read"), "{output}");
    assert!(output.contains("Build failed (1000ms)"), "{output}");
}

#[tokio::test]
async fn later_build_replaces_earlier_one() {
    let fixture = Fixture::new();
    fixture.write("out/stderr", GCC_STDERR);
    let events = fixture.events(&[
        common::started(&fixture.root(), "1000"),
        common::action("//app:main", "CppCompile", false, Some(&fixture.uri("out/stderr"))),
        common::finished(1, "2000"),
        common::started(&fixture.root(), "5000"),
        common::action("//app:main", "CppCompile", true, None),
        common::finished(0, "5250"),
    ]);

    let mut session = session();
    replay(&mut session, &events).await.unwrap();
    assert_eq!(session.generation(), 2);
    assert_eq!(build_outcome(&session), Some(true));

    let output = render(&mut session, RenderOptions::default()).await;
    assert!(output.contains("Build succeeded (250ms)"), "{output}");
    assert!(!output.contains("//app:main"), "{output}");
    assert!(session.markers().is_empty());
}

#[tokio::test]
async fn malformed_line_is_skipped() {
    let fixture = Fixture::new();
    let started = common::started(&fixture.root(), "1000");
    let action = common::action("//app:main", "CppCompile", true, None);
    let finished = common::finished(0, "1200");
    let events = fixture.write(
        "events.json",
        &format!("{started}\n{{not json\n{action}\n{finished}\n"),
    );

    let mut session = session();
    let sent = replay(&mut session, &events).await.unwrap();
    assert_eq!(sent, 3);
    assert_eq!(build_outcome(&session), Some(true));

    let output = render(&mut session, RenderOptions::default()).await;
    assert!(output.contains("Build succeeded (200ms)"), "{output}");
}

#[tokio::test]
async fn missing_event_file() {
    let fixture = Fixture::new();
    let mut session = session();
    let err = replay(&mut session, &fixture.path().join("nope.json"))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("failed to open"), "{err:#}");
}
