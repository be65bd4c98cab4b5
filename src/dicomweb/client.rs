use super::{ArchiveConfig, SelectionPolicy, DICOM_ANY_TS, DICOM_JSON};
use http::header::ACCEPT;
use http::StatusCode;
use serde_json::Value;

/// DICOM-JSON key of SeriesInstanceUID.
pub const SERIES_INSTANCE_UID_TAG: &str = "0020000E";
/// DICOM-JSON key of SOPInstanceUID.
pub const SOP_INSTANCE_UID_TAG: &str = "00080018";

/// Which archive call a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Series,
    Instances,
    Object,
}

impl Resource {
    fn failure(&self) -> &'static str {
        match self {
            Resource::Series => "Failed to fetch series",
            Resource::Instances => "Failed to fetch instances",
            Resource::Object => "Failed to download DICOM file",
        }
    }

    fn empty(&self) -> &'static str {
        match self {
            Resource::Series => "No series found in study",
            Resource::Instances => "No instances found in series",
            Resource::Object => "Empty DICOM object",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("{}: {status}", .resource.failure())]
    Status { resource: Resource, status: u16 },

    #[error("{}", .0.empty())]
    Empty(Resource),

    #[error("{}: {source}", .resource.failure())]
    Transport {
        resource: Resource,
        #[source]
        source: reqwest::Error,
    },

    #[error("{}: {reason}", .resource.failure())]
    Malformed { resource: Resource, reason: String },

    #[error("failed to build archive HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Thin QIDO-RS / WADO-RS client bound to one archive root.
#[derive(Debug, Clone)]
pub struct ArchiveClient {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    selection: SelectionPolicy,
}

impl ArchiveClient {
    pub fn new(config: &ArchiveConfig) -> Result<Self, ArchiveError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(ArchiveError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
            selection: config.selection,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// QIDO-RS: pick one SeriesInstanceUID of the study.
    pub async fn first_series(&self, study_uid: &str) -> Result<String, ArchiveError> {
        let url = format!("{}/studies/{}/series", self.base_url, study_uid);
        self.query_uid(&url, Resource::Series, SERIES_INSTANCE_UID_TAG)
            .await
    }

    /// QIDO-RS: pick one SOPInstanceUID of the series.
    pub async fn first_instance(
        &self,
        study_uid: &str,
        series_uid: &str,
    ) -> Result<String, ArchiveError> {
        let url = format!(
            "{}/studies/{}/series/{}/instances",
            self.base_url, study_uid, series_uid
        );
        self.query_uid(&url, Resource::Instances, SOP_INSTANCE_UID_TAG)
            .await
    }

    /// WADO-RS: fetch the instance bytes exactly as the archive sends them.
    pub async fn retrieve_instance(
        &self,
        study_uid: &str,
        series_uid: &str,
        instance_uid: &str,
    ) -> Result<Vec<u8>, ArchiveError> {
        let url = format!(
            "{}/studies/{}/series/{}/instances/{}",
            self.base_url, study_uid, series_uid, instance_uid
        );
        tracing::debug!("Downloading DICOM file from {}", url);

        let resource = Resource::Object;
        let response = self.get(&url, DICOM_ANY_TS).send().await.map_err(|source| {
            ArchiveError::Transport { resource, source }
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ArchiveError::Status {
                resource,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ArchiveError::Transport { resource, source })?;
        tracing::debug!("Downloaded {} bytes", body.len());
        Ok(body.to_vec())
    }

    fn get(&self, url: &str, accept: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url).header(ACCEPT, accept);
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn query_uid(
        &self,
        url: &str,
        resource: Resource,
        tag: &str,
    ) -> Result<String, ArchiveError> {
        tracing::debug!("QIDO request {}", url);

        let response = self
            .get(url, DICOM_JSON)
            .send()
            .await
            .map_err(|source| ArchiveError::Transport { resource, source })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ArchiveError::Status {
                resource,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ArchiveError::Transport { resource, source })?;
        let datasets: Vec<Value> =
            serde_json::from_slice(&body).map_err(|e| ArchiveError::Malformed {
                resource,
                reason: format!("invalid DICOM JSON: {}", e),
            })?;

        select_uid(&datasets, tag, self.selection)
            .map_err(|reason| ArchiveError::Malformed { resource, reason })?
            .ok_or(ArchiveError::Empty(resource))
    }
}

/// `dataset[tag].Value[0]` as a string.
fn uid_of<'a>(dataset: &'a Value, tag: &str) -> Option<&'a str> {
    dataset
        .get(tag)
        .and_then(|el| el.get("Value"))
        .and_then(|v| v.get(0))
        .and_then(Value::as_str)
}

/// Pick one UID from a QIDO response. Only entries the policy can select are read.
///
/// `Ok(None)` means the response was an empty list.
pub(crate) fn select_uid(
    datasets: &[Value],
    tag: &str,
    policy: SelectionPolicy,
) -> Result<Option<String>, String> {
    let Some(first) = datasets.first() else {
        return Ok(None);
    };

    match policy {
        SelectionPolicy::First => uid_of(first, tag)
            .map(|uid| Some(uid.to_string()))
            .ok_or_else(|| format!("entry 0 has no value for tag {}", tag)),
        SelectionPolicy::Lexicographic => {
            let uids: Vec<String> = datasets
                .iter()
                .filter_map(|dataset| uid_of(dataset, tag))
                .map(str::to_string)
                .collect();
            if uids.is_empty() {
                return Err(format!("no entry has a value for tag {}", tag));
            }
            Ok(policy.select(&uids).cloned())
        }
    }
}
