//! Classlift CLI: upload local files through the policy-then-transfer engine.
//!
//! Set CLASSLIFT_API_TOKEN (or JWT_TOKEN) and CLASSLIFT_API_URL (or API_URL).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use classlift_api_client::ApiClient;
use classlift_cli::{assign_object_ids, ensure_uploadable, exit_code, init_tracing, render_record};
use classlift_core::{AssetDescriptor, ClientConfig, ObjectType, UploadFile, UploadRecord};
use classlift_storage::HttpStorageUploader;
use classlift_uploads::{UploadOrchestrator, UploadStateStore};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "classlift", about = "Classlift upload CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one or more files, concurrently
    Upload {
        /// Paths of the files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Asset type: videos, thumbnails, documents, markdown-images, ...
        #[arg(long)]
        object_type: ObjectType,
        /// Asset id (single file only). Defaults to a fresh UUID per file
        #[arg(long)]
        object_id: Option<String>,
        /// Type of the resource owning the asset
        #[arg(long, requires = "parent_id")]
        parent_type: Option<ObjectType>,
        /// Id of the resource owning the asset
        #[arg(long, requires = "parent_type")]
        parent_id: Option<String>,
        /// Print final records as JSON
        #[arg(long)]
        json: bool,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize upload records")?;
    println!("{}", out);
    Ok(())
}

fn build_orchestrator(config: &ClientConfig) -> anyhow::Result<UploadOrchestrator> {
    let api = ApiClient::from_config(config)?;
    let uploader = HttpStorageUploader::new()?.with_timeout(config.transfer_timeout());
    Ok(UploadOrchestrator::new(
        UploadStateStore::new(),
        Arc::new(api),
        Arc::new(uploader),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let config = ClientConfig::from_env().context(
        "Failed to load configuration. Set CLASSLIFT_API_TOKEN and CLASSLIFT_API_URL (or API_URL)",
    )?;

    let code = match cli.command {
        Commands::Upload {
            files,
            object_type,
            object_id,
            parent_type,
            parent_id,
            json,
        } => {
            ensure_uploadable(object_type)?;
            let ids = assign_object_ids(files.len(), object_id.as_deref())?;

            let mut uploads = Vec::with_capacity(files.len());
            for (path, id) in files.iter().zip(ids) {
                let file = UploadFile::from_path(path)
                    .await
                    .with_context(|| format!("Failed to load {}", path.display()))?;
                let mut descriptor = AssetDescriptor::new(object_type, id);
                if let (Some(parent_type), Some(parent_id)) = (parent_type, parent_id.as_deref()) {
                    descriptor = descriptor.with_parent(parent_type, parent_id);
                }
                uploads.push((descriptor, file));
            }

            let orchestrator = build_orchestrator(&config)?;
            tracing::debug!(
                count = uploads.len(),
                object_type = %object_type,
                api_url = %config.api_url,
                "Starting uploads"
            );
            let progress = (!json).then(|| {
                orchestrator.store().subscribe(|change| {
                    if let Some(record) = &change.record {
                        eprintln!("{}", render_record(record));
                    }
                })
            });

            let handles: Vec<_> = uploads
                .into_iter()
                .map(|(descriptor, file)| orchestrator.add_upload(descriptor, file, None))
                .collect();
            let ids: Vec<String> = handles.iter().map(|h| h.object_id().to_string()).collect();
            futures::future::join_all(handles.into_iter().map(|h| h.wait())).await;
            drop(progress);

            let records: Vec<UploadRecord> = ids
                .iter()
                .filter_map(|id| orchestrator.store().get_record(id))
                .collect();

            if json {
                print_json(&records)?;
            } else {
                for record in &records {
                    println!("{}", render_record(record));
                }
            }
            exit_code(&records)
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
