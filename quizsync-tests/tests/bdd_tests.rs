mod steps;

use cucumber::World;
use quizsync_tests::QuizWorld;

/// Election, replication and liveness scenarios
const FEATURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/features");

/// Report file in cargo's scratch directory for integration tests
#[cfg(any(feature = "output-json", feature = "output-junit"))]
fn report(name: &str) -> std::fs::File {
    let path = std::path::Path::new(env!("CARGO_TARGET_TMPDIR")).join(name);
    std::fs::File::create(&path)
        .unwrap_or_else(|e| panic!("Failed to create {}: {}", path.display(), e))
}

#[tokio::main]
async fn main() {
    #[cfg(feature = "output-junit")]
    {
        QuizWorld::cucumber()
            .max_concurrent_scenarios(1)
            .fail_on_skipped()
            .with_writer(cucumber::writer::JUnit::new(report("quizsync-bdd.xml"), 0))
            .run(FEATURES)
            .await;
        return;
    }

    #[cfg(all(feature = "output-json", not(feature = "output-junit")))]
    {
        QuizWorld::cucumber()
            .max_concurrent_scenarios(1)
            .fail_on_skipped()
            .with_writer(cucumber::writer::Json::new(report("quizsync-bdd.json")))
            .run(FEATURES)
            .await;
        return;
    }

    #[cfg(not(any(feature = "output-json", feature = "output-junit")))]
    {
        use cucumber::WriterExt;
        QuizWorld::cucumber()
            .max_concurrent_scenarios(1)
            .fail_on_skipped()
            .with_writer(
                cucumber::writer::Basic::raw(
                    std::io::stdout(),
                    cucumber::writer::Coloring::Auto,
                    cucumber::writer::Verbosity::ShowWorld,
                )
                .summarized()
                .assert_normalized(),
            )
            .run_and_exit(FEATURES)
            .await;
    }
}
