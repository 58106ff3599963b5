use ragdb_core::vault::{ChunkRecord, VectorStore};
use ragdb_core::{Config, GroupingMode, IngestionCoordinator, PlaceholderEmbedder, QueryCoordinator, SearchFilters, SourceFormat};
use tempfile::tempdir;

fn config(base_dir: std::path::PathBuf, db_path: std::path::PathBuf) -> Config {
    Config {
        base_dir,
        db_path,
        ..Config::default()
    }
}

fn chunk(file_path: &str, idx: i64, text: &str, vector: Vec<f32>) -> ChunkRecord {
    ChunkRecord {
        file_path: file_path.to_string(),
        chunk_index: idx,
        text: text.to_string(),
        vector,
        file_name: "f.txt".to_string(),
        file_size: text.len() as i64,
        file_type: "txt".to_string(),
        file_title: None,
        timestamp: "2024-01-01T00:00:00Z".to_string(),
    }
}

#[tokio::test]
async fn scenario_ingest_then_search_text() {
    let base = tempdir().unwrap();
    let db_dir = base.path().join("db");
    let cfg = config(base.path().to_path_buf(), db_dir.clone());

    let file_path = base.path().join("typescript.txt");
    std::fs::write(
        &file_path,
        "TypeScript is a strongly typed programming language. \
         TypeScript provides better tooling at any scale. \
         TypeScript type safety helps catch errors.",
    )
    .unwrap();

    let ingest_store = VectorStore::open(&db_dir.join("chunks.sqlite")).unwrap();
    let ingest_coordinator =
        IngestionCoordinator::new(ingest_store, PlaceholderEmbedder::new(32), cfg.clone());
    ingest_coordinator
        .ingest_file(file_path.to_str().unwrap())
        .await
        .unwrap();

    let query_store = VectorStore::open(&db_dir.join("chunks.sqlite")).unwrap();
    let query_coordinator = QueryCoordinator::new(query_store, PlaceholderEmbedder::new(32), cfg);

    let results = query_coordinator
        .query_documents("TypeScript type safety", 5)
        .await
        .unwrap();

    assert!(!results.is_empty());
    for w in results.windows(2) {
        assert!(w[0].distance <= w[1].distance);
    }
    assert!(results.iter().any(|r| r.text.contains("type safety")));
}

#[tokio::test]
async fn scenario_reingest_preserves_uniqueness() {
    let base = tempdir().unwrap();
    let db_dir = base.path().join("db");
    let cfg = config(base.path().to_path_buf(), db_dir.clone());

    let file_path = base.path().join("content.txt");
    std::fs::write(&file_path, "Alpha content ".repeat(50)).unwrap();

    let store_a = VectorStore::open(&db_dir.join("chunks.sqlite")).unwrap();
    let coordinator_a = IngestionCoordinator::new(store_a, PlaceholderEmbedder::new(32), cfg.clone());
    coordinator_a
        .ingest_file(file_path.to_str().unwrap())
        .await
        .unwrap();

    std::fs::write(&file_path, "Beta content ".repeat(50)).unwrap();
    let store_b = VectorStore::open(&db_dir.join("chunks.sqlite")).unwrap();
    let coordinator_b = IngestionCoordinator::new(store_b, PlaceholderEmbedder::new(32), cfg.clone());
    coordinator_b
        .ingest_file(file_path.to_str().unwrap())
        .await
        .unwrap();

    let files = coordinator_b.store().list_files().await.unwrap();
    assert_eq!(files.len(), 1);

    let query_store = VectorStore::open(&db_dir.join("chunks.sqlite")).unwrap();
    let query_coordinator = QueryCoordinator::new(query_store, PlaceholderEmbedder::new(32), cfg);
    let results = query_coordinator.query_documents("Alpha", 10).await.unwrap();
    assert!(!results.iter().any(|r| r.text.contains("Alpha")));
}

#[tokio::test]
async fn scenario_path_traversal_is_rejected() {
    let base = tempdir().unwrap();
    let db_dir = base.path().join("db");
    let cfg = config(base.path().to_path_buf(), db_dir.clone());

    let store = VectorStore::open(&db_dir.join("chunks.sqlite")).unwrap();
    let coordinator = IngestionCoordinator::new(store, PlaceholderEmbedder::new(32), cfg);

    let dotdot_path = base.path().join("../../etc/passwd");
    let err = coordinator
        .ingest_file(dotdot_path.to_str().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ragdb_core::ErrorKind::Validation);

    let files = coordinator.store().list_files().await.unwrap();
    assert!(files.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn scenario_symlink_escape_is_rejected_mentioning_base_dir() {
    use std::os::unix::fs::symlink;

    let base = tempdir().unwrap();
    let outside = tempdir().unwrap();
    let db_dir = base.path().join("db");
    let cfg = config(base.path().to_path_buf(), db_dir.clone());

    let target = outside.path().join("secret.txt");
    std::fs::write(&target, "outside content").unwrap();
    let link = base.path().join("escape.txt");
    symlink(&target, &link).unwrap();

    let store = VectorStore::open(&db_dir.join("chunks.sqlite")).unwrap();
    let coordinator = IngestionCoordinator::new(store, PlaceholderEmbedder::new(32), cfg);

    let err = coordinator
        .ingest_file(link.to_str().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ragdb_core::ErrorKind::Validation);
    assert!(err.to_string().to_lowercase().contains("base"));
}

#[tokio::test]
async fn scenario_hybrid_boost_reranks_on_keyword_match() {
    let db_dir = tempdir().unwrap();
    let store = VectorStore::open(&db_dir.path().join("chunks.sqlite")).unwrap();
    // A sits at distance 1.0 from the query (orthogonal); boosted by the only
    // keyword match at hybrid_weight=1.0, that becomes 1.0/(1+1*1.0) = 0.5.
    // B needs a distance strictly between 0.5 and 1.0 for the boost to
    // legitimately overtake it while still winning unboosted: cos(B, query)
    // = 0.2 puts it at distance 0.8.
    store
        .insert_chunks(&[
            chunk("/doc.txt", 0, "UniqueKeyword about X", vec![1.0, 0.0]),
            chunk("/doc.txt", 1, "similar semantics", vec![0.98, 0.2]),
        ])
        .await
        .unwrap();

    let query_vector = vec![0.0, 1.0];

    let hybrid_filters = SearchFilters {
        hybrid_weight: 1.0,
        ..SearchFilters::default()
    };
    let boosted = store
        .search(&query_vector, Some("UniqueKeyword"), 10, &hybrid_filters)
        .await
        .unwrap();
    assert_eq!(boosted[0].text, "UniqueKeyword about X");

    let vector_only_filters = SearchFilters {
        hybrid_weight: 0.0,
        ..SearchFilters::default()
    };
    let unboosted = store
        .search(&query_vector, Some("UniqueKeyword"), 10, &vector_only_filters)
        .await
        .unwrap();
    assert_eq!(unboosted[0].text, "similar semantics");
}

#[tokio::test]
async fn scenario_grouping_cut_keeps_only_near_cluster() {
    let db_dir = tempdir().unwrap();
    let store = VectorStore::open(&db_dir.path().join("chunks.sqlite")).unwrap();
    store
        .insert_chunks(&[
            chunk("/a.txt", 0, "group one first", vec![1.0, 0.0]),
            chunk("/a.txt", 1, "group one second", vec![1.0, 0.0]),
            chunk("/a.txt", 2, "group one third", vec![1.0, 0.0]),
            chunk("/b.txt", 0, "group two first", vec![-1.0, 0.0]),
            chunk("/b.txt", 1, "group two second", vec![-1.0, 0.0]),
        ])
        .await
        .unwrap();

    let similar_filters = SearchFilters {
        grouping: Some(GroupingMode::Similar),
        ..SearchFilters::default()
    };
    let similar = store
        .search(&[1.0, 0.0], None, 10, &similar_filters)
        .await
        .unwrap();
    assert_eq!(similar.len(), 3);
    assert!(similar.iter().all(|r| r.file_path == "/a.txt"));

    let related_filters = SearchFilters {
        grouping: Some(GroupingMode::Related),
        ..SearchFilters::default()
    };
    let related = store
        .search(&[1.0, 0.0], None, 10, &related_filters)
        .await
        .unwrap();
    assert_eq!(related.len(), 5);
}

#[tokio::test]
async fn scenario_inline_ingestion_round_trip_normalizes_source() {
    let base = tempdir().unwrap();
    let db_dir = base.path().join("db");
    let cfg = config(base.path().to_path_buf(), db_dir.clone());

    let store_a = VectorStore::open(&db_dir.join("chunks.sqlite")).unwrap();
    let coordinator_a = IngestionCoordinator::new(store_a, PlaceholderEmbedder::new(32), cfg.clone());
    let first = coordinator_a
        .ingest_data(
            "UniqueMark appears in a sentence about nothing in particular at all here. \
             A second sentence about gardening tools and outdoor equipment maintenance follows.",
            "https://ex.com/p?x=1#f",
            SourceFormat::PlainText,
        )
        .await
        .unwrap();

    let store_b = VectorStore::open(&db_dir.join("chunks.sqlite")).unwrap();
    let coordinator_b = IngestionCoordinator::new(store_b, PlaceholderEmbedder::new(32), cfg.clone());
    let second = coordinator_b
        .ingest_data(
            "Other content appears in a sentence about nothing in particular at all here too. \
             A second sentence about completely unrelated astronomy topics follows along nicely.",
            "https://ex.com/p?y=2",
            SourceFormat::PlainText,
        )
        .await
        .unwrap();

    assert_eq!(first.file_path, second.file_path);

    let raw_contents = std::fs::read_to_string(&second.file_path).unwrap();
    assert!(raw_contents.starts_with("Other content"));

    let query_store = VectorStore::open(&db_dir.join("chunks.sqlite")).unwrap();
    let query_coordinator = QueryCoordinator::new(query_store, PlaceholderEmbedder::new(32), cfg);

    let unique_mark = query_coordinator.query_documents("UniqueMark", 10).await.unwrap();
    assert!(!unique_mark.iter().any(|r| r.text.contains("UniqueMark")));

    let other = query_coordinator.query_documents("Other content", 10).await.unwrap();
    assert!(!other.is_empty());
    assert_eq!(other[0].source.as_deref(), Some("https://ex.com/p"));
}
