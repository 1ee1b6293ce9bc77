//! End-to-end tests for the refresh pipeline
//!
//! These tests run download, install, parse and load against a mock dataset
//! host, a temporary directory and an in-memory store:
//! - First refresh creates the live file and the rows
//! - Second refresh rotates the previous file into `.old` and updates rows
//! - Checksum and parse failures leave file and store as they were

use cep_ingest::config::Config;
use cep_ingest::error::CepError;
use cep_ingest::pipeline;
use cep_ingest::progress::NoProgress;
use cep_ingest::replace::backup_path;
use cep_ingest::store::CepStore;
use cep_ingest::Cep;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const GENERATION_1: &str = "\
cep,logradouro,complemento,bairro,localidade,uf,ibge
01310-000,Avenida Paulista,,Bela Vista,São Paulo,SP,3550308
20040-002,Rua da Assembleia,,Centro,Rio de Janeiro,RJ,3304557
";

const GENERATION_2: &str = "\
cep,logradouro,complemento,bairro,localidade,uf,ibge
01310-000,Avenida Paulista,,Jardins,São Paulo,SP,3550308
20040-002,Rua da Assembleia,,Centro,Rio de Janeiro,RJ,3304557
70040-010,Esplanada dos Ministérios,,Zona Cívico-Administrativa,Brasília,DF,5300108
";

struct Harness {
    server: MockServer,
    dir: TempDir,
    store: CepStore,
}

impl Harness {
    async fn new() -> Self {
        Self {
            server: MockServer::start().await,
            dir: TempDir::new().unwrap(),
            store: CepStore::in_memory().await.unwrap(),
        }
    }

    fn config(&self) -> Config {
        Config {
            source_url: Some(format!("{}/ceps.csv", self.server.uri())),
            dataset_path: self.dir.path().join("live").join("ceps.csv"),
            scratch_dir: self.dir.path().join("scratch"),
            ..Config::default()
        }
    }

    async fn serve(&self, body: &str) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path("/ceps.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("scratch"))
            .map(|d| d.count())
            .unwrap_or(0)
    }
}

fn cep(raw: &str) -> Cep {
    Cep::parse(raw).unwrap()
}

#[tokio::test]
async fn test_first_refresh_installs_and_loads() {
    let h = Harness::new().await;
    h.serve(GENERATION_1).await;
    let config = h.config();
    let client = pipeline::http_client(&config).unwrap();

    let report = pipeline::refresh(&config, &h.store, &client, &NoProgress).await.unwrap();

    assert_eq!(report.acquired.downloaded_bytes, GENERATION_1.len() as u64);
    assert_eq!(report.acquired.sha256, hex::encode(Sha256::digest(GENERATION_1.as_bytes())));
    assert_eq!(report.acquired.backup_path, None);
    assert_eq!(report.records_applied, 2);
    assert_eq!(report.rows_total, 2);

    assert_eq!(std::fs::read_to_string(&config.dataset_path).unwrap(), GENERATION_1);
    assert!(!backup_path(&config.dataset_path).exists());
    assert_eq!(h.scratch_entries(), 0);

    let paulista = h.store.read(&cep("01310000")).await.unwrap().unwrap();
    assert_eq!(paulista.district.as_deref(), Some("Bela Vista"));
    assert_eq!(paulista.complement, None);
}

#[tokio::test]
async fn test_second_refresh_rotates_backup_and_updates_rows() {
    let h = Harness::new().await;
    let config = h.config();
    let client = pipeline::http_client(&config).unwrap();

    h.serve(GENERATION_1).await;
    pipeline::refresh(&config, &h.store, &client, &NoProgress).await.unwrap();

    h.serve(GENERATION_2).await;
    let report = pipeline::refresh(&config, &h.store, &client, &NoProgress).await.unwrap();

    let backup = backup_path(&config.dataset_path);
    assert_eq!(report.acquired.backup_path.as_deref(), Some(backup.as_path()));
    assert_eq!(std::fs::read_to_string(&config.dataset_path).unwrap(), GENERATION_2);
    assert_eq!(std::fs::read_to_string(&backup).unwrap(), GENERATION_1);
    assert_eq!(report.records_applied, 3);
    assert_eq!(report.rows_total, 3);

    let paulista = h.store.read(&cep("01310-000")).await.unwrap().unwrap();
    assert_eq!(paulista.district.as_deref(), Some("Jardins"));
    assert!(h.store.read(&cep("70040010")).await.unwrap().is_some());
}

#[tokio::test]
async fn test_repeated_refresh_is_idempotent() {
    let h = Harness::new().await;
    h.serve(GENERATION_2).await;
    let config = h.config();
    let client = pipeline::http_client(&config).unwrap();

    pipeline::refresh(&config, &h.store, &client, &NoProgress).await.unwrap();
    let before = h.store.all().await.unwrap();
    pipeline::refresh(&config, &h.store, &client, &NoProgress).await.unwrap();

    assert_eq!(h.store.all().await.unwrap(), before);
    assert_eq!(
        std::fs::read_to_string(backup_path(&config.dataset_path)).unwrap(),
        GENERATION_2
    );
}

#[tokio::test]
async fn test_checksum_mismatch_leaves_live_file_untouched() {
    let h = Harness::new().await;
    h.serve(GENERATION_2).await;
    let mut config = h.config();
    config.expected_sha256 = Some(hex::encode(Sha256::digest(GENERATION_1.as_bytes())));

    std::fs::create_dir_all(config.dataset_path.parent().unwrap()).unwrap();
    std::fs::write(&config.dataset_path, GENERATION_1).unwrap();
    let client = pipeline::http_client(&config).unwrap();

    let err = pipeline::refresh(&config, &h.store, &client, &NoProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, CepError::Checksum(_)), "got {err:?}");
    assert_eq!(std::fs::read_to_string(&config.dataset_path).unwrap(), GENERATION_1);
    assert!(!backup_path(&config.dataset_path).exists());
    assert_eq!(h.scratch_entries(), 0);
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_matching_checksum_is_accepted() {
    let h = Harness::new().await;
    h.serve(GENERATION_1).await;
    let mut config = h.config();
    config.expected_sha256 = Some(hex::encode(Sha256::digest(GENERATION_1.as_bytes())).to_uppercase());
    config.validate().unwrap();
    let client = pipeline::http_client(&config).unwrap();

    let report = pipeline::refresh(&config, &h.store, &client, &NoProgress).await.unwrap();
    assert_eq!(report.rows_total, 2);
}

#[tokio::test]
async fn test_unparseable_dataset_keeps_store_content() {
    let h = Harness::new().await;
    let config = h.config();
    let client = pipeline::http_client(&config).unwrap();

    h.serve(GENERATION_1).await;
    pipeline::refresh(&config, &h.store, &client, &NoProgress).await.unwrap();
    let before = h.store.all().await.unwrap();

    h.serve("cep,bairro\n01310000,Jardins\nnot-a-cep,Centro\n").await;
    let err = pipeline::refresh(&config, &h.store, &client, &NoProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, CepError::Parse { line: 3, .. }), "got {err:?}");
    assert_eq!(h.store.all().await.unwrap(), before);
}

#[tokio::test]
async fn test_failed_download_keeps_previous_generation() {
    let h = Harness::new().await;
    let config = h.config();
    let client = pipeline::http_client(&config).unwrap();

    h.serve(GENERATION_1).await;
    pipeline::refresh(&config, &h.store, &client, &NoProgress).await.unwrap();

    h.server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let err = pipeline::refresh(&config, &h.store, &client, &NoProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, CepError::Transfer(_)));
    assert_eq!(std::fs::read_to_string(&config.dataset_path).unwrap(), GENERATION_1);
    assert!(!backup_path(&config.dataset_path).exists());
    assert_eq!(h.scratch_entries(), 0);
    assert_eq!(h.store.count().await.unwrap(), 2);
}
