//! Single-file flows against an in-memory catalog and real FLAC files.

mod common;

use std::sync::Arc;

use common::{song, tagged_flac, FakeCatalog};
use core_metadata::{CatalogClient, CoverSource, LyricDocument, SongMetadata, TagCodec};
use core_reconcile::{
    BatchEdit, FileState, FileStatus, PipelineOptions, ReconcilePipeline,
};
use core_runtime::events::{CoreEvent, EventBus, FileEvent};

fn full(artist: &str, title: &str, album: &str) -> SongMetadata {
    SongMetadata {
        album: Some(album.to_string()),
        album_artist: Some(artist.to_string()),
        year: Some("2019".to_string()),
        duration: Some(3),
        ..song(artist, title)
    }
}

fn pipeline(catalog: &Arc<FakeCatalog>, options: PipelineOptions) -> ReconcilePipeline {
    let catalog: Arc<dyn CatalogClient> = catalog.clone();
    ReconcilePipeline::new(catalog, options)
}

#[tokio::test]
async fn test_auto_complete_applies_matching_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let path = tagged_flac(dir.path(), "01.flac", "Mili", "Rubber Human").await;

    let catalog = Arc::new(FakeCatalog::new().with_song(
        "Mili-Rubber Human",
        "101",
        full("Mili", "Rubber Human", "Key Ingredient"),
    ));
    let outcome = pipeline(&catalog, PipelineOptions::default())
        .auto_complete(&path, None)
        .await;

    assert_eq!(outcome.status, FileStatus::Applied, "{:?}", outcome.message);
    assert!(outcome.score.unwrap() >= 80);
    assert!(outcome.renamed_to.is_none());

    let (metadata, _) = TagCodec::new().read(&path).await.unwrap();
    assert_eq!(metadata.album.as_deref(), Some("Key Ingredient"));
    assert_eq!(metadata.year.as_deref(), Some("2019"));
}

#[tokio::test]
async fn test_falls_back_to_second_candidate_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = tagged_flac(dir.path(), "01.flac", "Mili", "Rubber Human").await;

    let catalog = Arc::new(
        FakeCatalog::new()
            .with_song("Mili-Rubber Human", "1", full("Someone Else", "Other Song", "X"))
            .with_song("Mili-Rubber Human", "2", full("Mili", "Rubber Human", "Key Ingredient"))
            .with_song("Mili-Rubber Human", "3", full("Mili", "Rubber Human", "Never Reached")),
    );
    let outcome = pipeline(&catalog, PipelineOptions::default())
        .auto_complete(&path, None)
        .await;

    assert_eq!(outcome.status, FileStatus::Applied);
    assert_eq!(catalog.fetches(), vec!["1", "2"]);

    let (metadata, _) = TagCodec::new().read(&path).await.unwrap();
    assert_eq!(metadata.album.as_deref(), Some("Key Ingredient"));
}

#[tokio::test]
async fn test_unfetchable_first_candidate_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = tagged_flac(dir.path(), "01.flac", "Mili", "Rubber Human").await;

    let catalog = Arc::new(
        FakeCatalog::new()
            .with_unfetchable("Mili-Rubber Human", "gone", song("Mili", "Rubber Human"))
            .with_song("Mili-Rubber Human", "2", full("Mili", "Rubber Human", "Key Ingredient")),
    );
    let outcome = pipeline(&catalog, PipelineOptions::default())
        .auto_complete(&path, None)
        .await;

    assert_eq!(outcome.status, FileStatus::Applied, "{:?}", outcome.message);
    assert_eq!(catalog.fetches(), vec!["gone", "2"]);

    let (metadata, _) = TagCodec::new().read(&path).await.unwrap();
    assert_eq!(metadata.album.as_deref(), Some("Key Ingredient"));
}

#[tokio::test]
async fn test_no_fetchable_candidate_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = tagged_flac(dir.path(), "01.flac", "Mili", "Rubber Human").await;

    let catalog = Arc::new(
        FakeCatalog::new()
            .with_unfetchable("Mili-Rubber Human", "a", song("Mili", "Rubber Human"))
            .with_unfetchable("Mili-Rubber Human", "b", song("Mili", "Rubber Human")),
    );
    let outcome = pipeline(&catalog, PipelineOptions::default())
        .auto_complete(&path, None)
        .await;

    assert_eq!(outcome.status, FileStatus::Skipped);
    assert_eq!(outcome.score, None);
    assert!(outcome.message.unwrap().contains("No candidate details"));
}

#[tokio::test]
async fn test_skips_when_both_candidates_score_low() {
    let dir = tempfile::tempdir().unwrap();
    let path = tagged_flac(dir.path(), "01.flac", "Mili", "Rubber Human").await;
    let before = std::fs::read(&path).unwrap();

    let catalog = Arc::new(
        FakeCatalog::new()
            .with_song("Mili-Rubber Human", "1", full("Nobody", "Nothing", "X"))
            .with_song("Mili-Rubber Human", "2", full("Anybody", "Anything", "Y"))
            .with_song("Mili-Rubber Human", "3", full("Mili", "Rubber Human", "Z")),
    );
    let outcome = pipeline(&catalog, PipelineOptions::default())
        .auto_complete(&path, None)
        .await;

    assert_eq!(outcome.status, FileStatus::Skipped);
    assert!(outcome.score.unwrap() < 80);
    assert!(outcome.message.unwrap().contains("below threshold"));
    assert_eq!(catalog.fetches(), vec!["1", "2"]);
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[tokio::test]
async fn test_no_results_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = tagged_flac(dir.path(), "01.flac", "Mili", "Unknown").await;
    let before = std::fs::read(&path).unwrap();

    let catalog = Arc::new(FakeCatalog::new());
    let outcome = pipeline(&catalog, PipelineOptions::default())
        .auto_complete(&path, None)
        .await;

    assert_eq!(outcome.status, FileStatus::Skipped);
    assert!(outcome.message.unwrap().contains("Mili-Unknown"));
    assert!(catalog.fetches().is_empty());
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[tokio::test]
async fn test_transient_failure_is_reported_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let path = tagged_flac(dir.path(), "01.flac", "Mili", "Busy").await;

    let catalog = Arc::new(FakeCatalog::new().with_transient("Mili-Busy"));
    let outcome = pipeline(&catalog, PipelineOptions::default())
        .auto_complete(&path, None)
        .await;

    assert_eq!(outcome.status, FileStatus::Failed);
    assert_eq!(
        outcome.message.as_deref(),
        Some("Temporary provider failure: request too frequent")
    );
}

#[tokio::test]
async fn test_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gone.flac");

    let catalog = Arc::new(FakeCatalog::new());
    let outcome = pipeline(&catalog, PipelineOptions::default())
        .auto_complete(&path, None)
        .await;

    assert_eq!(outcome.status, FileStatus::Failed);
    assert!(outcome.message.unwrap().starts_with("File not found"));
    assert!(catalog.searches().is_empty());
}

#[tokio::test]
async fn test_keyword_is_sanitized_before_search() {
    let catalog = Arc::new(FakeCatalog::new().with_song(
        "Milifeat.",
        "7",
        full("Mili", "feat.", "A"),
    ));
    let pipeline = pipeline(&catalog, PipelineOptions::default());

    let with_hash = pipeline.search("Mili#feat.", 0).await.unwrap();
    let without = pipeline.search("Milifeat.", 0).await.unwrap();

    assert_eq!(with_hash, without);
    assert_eq!(with_hash.len(), 1);
    assert_eq!(catalog.searches(), vec!["Milifeat.", "Milifeat."]);
}

#[tokio::test]
async fn test_rename_and_lyric_sidecar_after_apply() {
    let dir = tempfile::tempdir().unwrap();
    let lyric_dir = dir.path().join("lyrics");
    let path = tagged_flac(dir.path(), "track01.flac", "AC/DC", "T.N.T").await;

    let catalog = Arc::new(
        FakeCatalog::new()
            .with_song("AC/DC-T.N.T", "42", full("AC/DC", "T.N.T", "High Voltage"))
            .with_lyric(
                "42",
                LyricDocument::from_lrc("[00:01.00]Oi!\n", Some("[00:01.00]Hey!\n"), None),
            ),
    );
    let options = PipelineOptions {
        auto_rename: true,
        auto_lyric: true,
        lyric_dir: Some(lyric_dir.clone()),
        ..Default::default()
    };
    let outcome = pipeline(&catalog, options).auto_complete(&path, None).await;

    assert_eq!(outcome.status, FileStatus::Applied, "{:?}", outcome.message);
    assert_eq!(catalog.searches(), vec!["ACDC-T.N.T"]);

    let renamed = dir.path().join("ACDC - T.N.T.flac");
    assert_eq!(outcome.renamed_to.as_deref(), Some(renamed.as_path()));
    assert!(renamed.exists());
    assert!(!path.exists());

    let sidecar = lyric_dir.join("ACDC - T.N.T.txt");
    assert_eq!(outcome.lyric_sidecar.as_deref(), Some(sidecar.as_path()));
    assert_eq!(
        std::fs::read_to_string(sidecar).unwrap(),
        "[00:01.00]Oi!\n[00:01.00]Hey!\n"
    );
}

#[tokio::test]
async fn test_missing_lyric_does_not_fail_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = tagged_flac(dir.path(), "01.flac", "Mili", "Instrumental").await;

    let catalog = Arc::new(FakeCatalog::new().with_song(
        "Mili-Instrumental",
        "9",
        full("Mili", "Instrumental", "A"),
    ));
    let options = PipelineOptions {
        auto_lyric: true,
        ..Default::default()
    };
    let outcome = pipeline(&catalog, options).auto_complete(&path, None).await;

    assert_eq!(outcome.status, FileStatus::Applied);
    assert!(outcome.lyric_sidecar.is_none());
}

#[tokio::test]
async fn test_interactive_flow_reports_score_without_enforcing() {
    let dir = tempfile::tempdir().unwrap();
    let path = tagged_flac(dir.path(), "01.flac", "Mili", "Rubber Human").await;

    let catalog = Arc::new(
        FakeCatalog::new()
            .with_song("Mili-Rubber Human", "1", full("Mili", "Rubber Human", "Key Ingredient"))
            .with_song("Mili-Rubber Human", "2", full("Other", "Different", "Elsewhere")),
    );
    let pipeline = pipeline(&catalog, PipelineOptions::default());

    let local = pipeline.open(&path).await.unwrap();
    assert_eq!(local.keyword, "Mili-Rubber Human");

    let candidates = pipeline.search(&local.keyword, 0).await.unwrap();
    assert_eq!(candidates.len(), 2);

    let good = pipeline.inspect("1", &local.metadata).await.unwrap();
    assert!(good.accepted);
    let poor = pipeline.inspect("2", &local.metadata).await.unwrap();
    assert!(!poor.accepted);
    assert!(poor.score < good.score);

    // A person may still pick the poor match.
    let applied = pipeline
        .apply(&path, Some("2"), &poor.metadata, &CoverSource::Embedded)
        .await
        .unwrap();
    assert_eq!(applied.final_path, path);

    let (metadata, _) = TagCodec::new().read(&path).await.unwrap();
    assert_eq!(metadata.title.as_deref(), Some("Different"));
}

#[tokio::test]
async fn test_apply_edit_changes_only_given_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = tagged_flac(dir.path(), "01.flac", "Mili", "Rubber Human").await;

    let catalog = Arc::new(FakeCatalog::new());
    let edit = BatchEdit {
        album: Some("Key Ingredient".to_string()),
        genre: Some("Pop".to_string()),
        ..Default::default()
    };
    let outcome = pipeline(&catalog, PipelineOptions::default())
        .apply_edit(&path, &edit, None)
        .await;

    assert_eq!(outcome.status, FileStatus::Applied);
    let (metadata, _) = TagCodec::new().read(&path).await.unwrap();
    assert_eq!(metadata.album.as_deref(), Some("Key Ingredient"));
    assert_eq!(metadata.genre.as_deref(), Some("Pop"));
    assert_eq!(metadata.artist.as_deref(), Some("Mili"));
    assert_eq!(metadata.title.as_deref(), Some("Rubber Human"));
    assert!(catalog.searches().is_empty());
}

#[tokio::test]
async fn test_state_changes_are_published() {
    let dir = tempfile::tempdir().unwrap();
    let path = tagged_flac(dir.path(), "01.flac", "Mili", "Rubber Human").await;

    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let catalog = Arc::new(FakeCatalog::new().with_song(
        "Mili-Rubber Human",
        "1",
        full("Mili", "Rubber Human", "Key Ingredient"),
    ));
    let pipeline = pipeline(&catalog, PipelineOptions::default()).with_event_bus(bus);
    pipeline.auto_complete(&path, Some("run-1")).await;

    let mut states = Vec::new();
    let mut outcome = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            CoreEvent::File(FileEvent::StateChanged { state, run_id, .. }) => {
                assert_eq!(run_id.as_deref(), Some("run-1"));
                states.push(state);
            }
            CoreEvent::File(FileEvent::Outcome { status, .. }) => outcome = Some(status),
            _ => {}
        }
    }

    let expected: Vec<String> = [
        FileState::Reading,
        FileState::Searching,
        FileState::CandidateFound,
        FileState::Scoring,
        FileState::Accepted,
        FileState::Writing,
        FileState::Applied,
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    assert_eq!(states, expected);
    assert_eq!(outcome.as_deref(), Some("applied"));
}
