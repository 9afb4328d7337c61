//! End-to-end pipeline tests over filesystem storage.

use std::sync::Arc;

use qubitlock_core::{
    CompressionAlgorithm, ContentPipeline, EncryptOptions, EncryptionGateway, ErrorKind,
    FileRepository, LocalFileRepository, MockGateway, PipelineConfig, QubitLockError,
};
use tempfile::TempDir;

type Pipeline = ContentPipeline<MockGateway, LocalFileRepository>;

async fn setup() -> (TempDir, Pipeline, Arc<MockGateway>, Arc<LocalFileRepository>) {
    let dir = TempDir::new().unwrap();
    let gateway = Arc::new(MockGateway::new());
    let repo = Arc::new(LocalFileRepository::new(dir.path()).await.unwrap());
    let pipeline = ContentPipeline::new(PipelineConfig::default(), gateway.clone(), repo.clone());
    (dir, pipeline, gateway, repo)
}

#[tokio::test]
async fn test_store_and_retrieve_text() {
    let (_dir, p, _, repo) = setup().await;
    let data = "{\"event\":\"login\",\"ok\":true}\n".repeat(300);
    let meta = p
        .store(data.as_bytes(), "events.json", &EncryptOptions::default())
        .await
        .unwrap();

    assert_eq!(meta.content_type.as_deref(), Some("application/json"));
    let package = repo.retrieve(&meta.id).await.unwrap();
    assert_eq!(package.compression_algorithm, Some(CompressionAlgorithm::Zstd));
    assert!(package.processed_size < package.original_size);

    assert_eq!(p.retrieve(&meta.id).await.unwrap(), data.as_bytes());
    assert!(p.verify(&meta.id).await.unwrap());
}

#[tokio::test]
async fn test_blob_on_disk_is_ciphertext_token() {
    let (_dir, p, _, repo) = setup().await;
    let meta = p
        .store(b"Hello QubitLock", "hello.txt", &EncryptOptions::default())
        .await
        .unwrap();

    let blob_path = repo.blob_path(meta.storage_name.as_deref().unwrap());
    let blob = std::fs::read_to_string(blob_path).unwrap();
    assert!(blob.starts_with("mock:v1:"));
    assert!(!blob.contains("Hello QubitLock"));
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let (dir, p, gateway, _) = setup().await;
    let meta = p
        .store(b"persistent bytes", "keep.bin", &EncryptOptions::default())
        .await
        .unwrap();
    drop(p);

    let repo = Arc::new(LocalFileRepository::new(dir.path()).await.unwrap());
    let reopened = ContentPipeline::new(PipelineConfig::default(), gateway, repo);
    let loaded = reopened.metadata(&meta.id).await.unwrap();
    assert_eq!(loaded, meta);
    assert_eq!(reopened.retrieve(&meta.id).await.unwrap(), b"persistent bytes");
}

#[tokio::test]
async fn test_tampered_blob_is_integrity_violation() {
    let (_dir, p, gateway, repo) = setup().await;
    let meta = p
        .store(b"ledger entry 42", "ledger.txt", &EncryptOptions::default())
        .await
        .unwrap();

    let forged = gateway.encrypt(b"ledger entry 43").await;
    let blob_path = repo.blob_path(meta.storage_name.as_deref().unwrap());
    std::fs::write(&blob_path, forged.unwrap()).unwrap();

    let calls = gateway.decrypt_calls();
    let err = p.retrieve(&meta.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    match err {
        QubitLockError::IntegrityViolation { id, expected, actual } => {
            assert_eq!(id, meta.id);
            assert_eq!(Some(expected), meta.integrity_root);
            assert_ne!(actual, meta.integrity_root.clone().unwrap());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(gateway.decrypt_calls(), calls);
    assert!(!p.verify(&meta.id).await.unwrap());
}

#[tokio::test]
async fn test_bit_flipped_blob_is_integrity_violation() {
    let (_dir, p, gateway, repo) = setup().await;
    let meta = p
        .store(b"ledger entry 42", "l.txt", &EncryptOptions::default())
        .await
        .unwrap();

    let blob_path = repo.blob_path(meta.storage_name.as_deref().unwrap());
    let mut blob = std::fs::read(&blob_path).unwrap();
    blob[10] ^= 0x80;
    std::fs::write(&blob_path, &blob).unwrap();

    let calls = gateway.decrypt_calls();
    let err = p.retrieve(&meta.id).await.unwrap_err();
    assert!(err.is_integrity_violation(), "{err}");
    assert_eq!(gateway.decrypt_calls(), calls);
    assert!(!p.verify(&meta.id).await.unwrap());
}

#[tokio::test]
async fn test_delete_removes_record_before_blob() {
    let (_dir, p, _, repo) = setup().await;
    let meta = p
        .store(b"short lived", "tmp.txt", &EncryptOptions::default())
        .await
        .unwrap();

    // A non-empty directory in place of the blob makes its removal fail.
    let blob_path = repo.blob_path(meta.storage_name.as_deref().unwrap());
    std::fs::remove_file(&blob_path).unwrap();
    std::fs::create_dir_all(blob_path.join("pinned")).unwrap();

    assert!(p.delete(&meta.id).await.is_err());
    assert!(matches!(
        p.retrieve(&meta.id).await,
        Err(QubitLockError::NotFound(_))
    ));
    assert!(matches!(
        p.metadata(&meta.id).await,
        Err(QubitLockError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_failed_save_rolls_back_blob_and_record() {
    let (dir, p, _, _) = setup().await;
    // Index as a directory makes the final append fail.
    std::fs::create_dir(dir.path().join("index")).unwrap();

    let err = p
        .store(b"never lands", "n.txt", &EncryptOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dependency);
    assert_eq!(std::fs::read_dir(dir.path().join("blobs")).unwrap().count(), 0);
    assert_eq!(std::fs::read_dir(dir.path().join("metadata")).unwrap().count(), 0);
}

#[tokio::test]
async fn test_list_and_delete() {
    let (_dir, p, _, repo) = setup().await;
    let mut ids = Vec::new();
    for i in 0..5 {
        let meta = p
            .store(
                format!("file {i}").as_bytes(),
                &format!("f{i}.txt"),
                &EncryptOptions::default(),
            )
            .await
            .unwrap();
        ids.push(meta.id);
    }

    let page: Vec<String> = p.list(2, 1).await.unwrap().into_iter().map(|m| m.id).collect();
    assert_eq!(page, ids[1..3]);

    let victim = p.metadata(&ids[2]).await.unwrap();
    assert!(p.delete(&ids[2]).await.unwrap());
    assert!(!p.delete(&ids[2]).await.unwrap());
    assert!(!repo.blob_path(victim.storage_name.as_deref().unwrap()).exists());

    let all: Vec<String> = p.list(50, 0).await.unwrap().into_iter().map(|m| m.id).collect();
    assert_eq!(all, vec![ids[0].clone(), ids[1].clone(), ids[3].clone(), ids[4].clone()]);
    assert!(matches!(p.retrieve(&ids[2]).await, Err(QubitLockError::NotFound(_))));
}

#[tokio::test]
async fn test_unknown_and_malformed_ids() {
    let (_dir, p, _, _) = setup().await;
    for id in ["../index", "not-a-uuid", "3f1c2a9e-0000-4000-8000-000000000000"] {
        assert!(matches!(p.retrieve(id).await, Err(QubitLockError::NotFound(_))));
    }
}
