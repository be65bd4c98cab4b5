use crate::config::Config;
use crate::dicomweb::ArchiveClient;
use crate::interpret::{build_interpreter, Interpretation, InterpretationRequest, Interpreter};
use crate::pipeline::ProcessError;
use crate::render;
use crate::storage::{create_storage_backend, ScratchKind, StorageBackend};
use std::sync::Arc;
use url::Url;

/// Per-request lifecycle; any failure jumps straight to the error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    IdentifierExtracted,
    SeriesResolved,
    InstanceResolved,
    ObjectRetrieved,
    Rasterized,
    Interpreted,
    Responded,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::IdentifierExtracted => "identifier_extracted",
            Stage::SeriesResolved => "series_resolved",
            Stage::InstanceResolved => "instance_resolved",
            Stage::ObjectRetrieved => "object_retrieved",
            Stage::Rasterized => "rasterized",
            Stage::Interpreted => "interpreted",
            Stage::Responded => "responded",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub study_uid: String,
    pub series_uid: String,
    pub instance_uid: String,
    pub interpretation: Interpretation,
    /// File name of a raster retained in the image directory.
    pub image: Option<String>,
}

/// Fetch series -> fetch instance -> download -> [rasterize] -> interpret.
///
/// Holds no per-request state; one instance is shared by all handlers.
pub struct Orchestrator {
    archive: ArchiveClient,
    interpreter: Arc<dyn Interpreter>,
    storage: Arc<dyn StorageBackend>,
    retain_images: bool,
}

impl Orchestrator {
    pub fn new(
        archive: ArchiveClient,
        interpreter: Arc<dyn Interpreter>,
        storage: Arc<dyn StorageBackend>,
        retain_images: bool,
    ) -> Self {
        Self {
            archive,
            interpreter,
            storage,
            retain_images,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let archive = ArchiveClient::new(&config.archive)?;
        let interpreter = build_interpreter(&config.interpreter)?;
        let storage = create_storage_backend(&config.storage)?;
        Ok(Self::new(
            archive,
            interpreter,
            storage,
            config.storage.retain_images,
        ))
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub fn interpreter_name(&self) -> &'static str {
        self.interpreter.name()
    }

    #[tracing::instrument(skip(self), fields(study_uid = tracing::field::Empty))]
    pub async fn process(&self, dicom_url: &str) -> Result<ProcessOutcome, ProcessError> {
        let result = self.run(dicom_url).await;
        match &result {
            Ok(_) => advance(Stage::Responded),
            Err(err) => {
                let stage = Stage::Failed;
                tracing::warn!(%stage, "Processing failed: {}", err);
            }
        }
        result
    }

    async fn run(&self, dicom_url: &str) -> Result<ProcessOutcome, ProcessError> {
        advance(Stage::Received);

        let study_uid = extract_study_uid(dicom_url)?;
        tracing::Span::current().record("study_uid", study_uid.as_str());
        advance(Stage::IdentifierExtracted);

        let series_uid = self.archive.first_series(&study_uid).await?;
        advance(Stage::SeriesResolved);

        let instance_uid = self
            .archive
            .first_instance(&study_uid, &series_uid)
            .await?;
        advance(Stage::InstanceResolved);

        let bytes = self
            .archive
            .retrieve_instance(&study_uid, &series_uid, &instance_uid)
            .await?;
        // Dropping the guard removes the file, whichever way this function returns.
        let dicom_file = self
            .storage
            .write_scratch(ScratchKind::Dicom, &bytes)
            .await?;
        drop(bytes);
        advance(Stage::ObjectRetrieved);

        let raster = if self.interpreter.needs_raster() {
            let target = self.storage.reserve(ScratchKind::Image)?;
            let source_path = dicom_file.path().to_path_buf();
            let target_path = target.path().to_path_buf();
            let raster = tokio::task::spawn_blocking(move || {
                render::render_png(&source_path, &target_path)
            })
            .await
            .map_err(|e| ProcessError::RenderFailure(format!("render task failed: {}", e)))??;
            tracing::debug!(
                "Rendered {}x{} raster to {}",
                raster.width,
                raster.height,
                target.file_name()
            );
            advance(Stage::Rasterized);
            Some(target)
        } else {
            None
        };

        let request = InterpretationRequest {
            study_uid: study_uid.clone(),
            series_uid: series_uid.clone(),
            instance_uid: instance_uid.clone(),
            dicom_file: dicom_file.path().to_path_buf(),
            raster: raster.as_ref().map(|r| r.path().to_path_buf()),
        };
        let interpretation = self.interpreter.interpret(&request).await?;
        advance(Stage::Interpreted);

        let image = match raster {
            Some(file) if self.interpreter.serves_raster() || self.retain_images => {
                let name = file.file_name();
                file.keep()?;
                Some(name)
            }
            _ => None,
        };
        drop(dicom_file);

        tracing::info!(
            series_uid = %series_uid,
            instance_uid = %instance_uid,
            interpreter = self.interpreter.name(),
            "Processed DICOM instance"
        );

        Ok(ProcessOutcome {
            study_uid,
            series_uid,
            instance_uid,
            interpretation,
            image,
        })
    }
}

fn advance(stage: Stage) {
    tracing::debug!(%stage, "pipeline stage");
}

/// Take the study UID from the last non-empty path segment of a study URL.
///
/// Absolute URLs and slash-delimited relative paths are accepted; query and
/// fragment are ignored. No UID syntax check is made here.
pub fn extract_study_uid(dicom_url: &str) -> Result<String, ProcessError> {
    let invalid = || ProcessError::InvalidInput("Invalid dicom_url format".to_string());

    let trimmed = dicom_url.trim();
    if trimmed.is_empty() || !trimmed.contains('/') {
        return Err(invalid());
    }

    let parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse("http://localhost/")
            .and_then(|base| base.join(trimmed))
            .map_err(|_| invalid())?,
        Err(_) => return Err(invalid()),
    };

    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(invalid)
}
