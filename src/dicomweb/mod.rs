//! DICOMweb (QIDO-RS / WADO-RS) access to the upstream archive.

mod client;
mod config;

pub use client::{ArchiveClient, ArchiveError, Resource, SERIES_INSTANCE_UID_TAG, SOP_INSTANCE_UID_TAG};
pub use config::{ArchiveConfig, SelectionPolicy};

/// Media type for QIDO-RS metadata responses.
pub const DICOM_JSON: &str = "application/dicom+json";
/// Media type for WADO-RS instance retrieval, any transfer syntax.
pub const DICOM_ANY_TS: &str = "application/dicom; transfer-syntax=*";
