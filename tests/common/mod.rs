#![allow(dead_code)]

use async_trait::async_trait;
use dicom_core::value::PrimitiveValue;
use dicom_core::{DataElement, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_metadata_service::config::ServiceConfig;
use dicom_metadata_service::models::ObjectReference;
use dicom_metadata_service::services::dicom::DicomParser;
use dicom_metadata_service::services::extraction::ExtractionService;
use dicom_metadata_service::services::staging::StagingArea;
use dicom_metadata_service::services::storage::{FetchError, ObjectFetcher};
use dicom_metadata_service::{AppState, create_app};
use dicom_object::InMemDicomObject;
use dicom_object::meta::FileMetaTableBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const SOP_INSTANCE_UID: &str = "1.2.826.0.1.3680043.2.1125.1.1";

/// A small explicit VR little endian CT image with pixel data.
pub fn sample_dicom(patient_id: &str, modality: &str) -> Vec<u8> {
    let obj = InMemDicomObject::from_element_iter([
        DataElement::new(
            tags::SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(uids::CT_IMAGE_STORAGE),
        ),
        DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(SOP_INSTANCE_UID),
        ),
        DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from(modality)),
        DataElement::new(tags::PATIENT_NAME, VR::PN, PrimitiveValue::from("Doe^Jane")),
        DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from(patient_id)),
        DataElement::new(
            tags::STUDY_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from("1.2.826.0.1.3680043.2.1125.1"),
        ),
        DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(512_u16)),
        DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(256_u16)),
        DataElement::new(tags::PIXEL_DATA, VR::OB, PrimitiveValue::from(vec![0xAB_u8; 64])),
    ]);

    let file = obj
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
                .media_storage_sop_instance_uid(SOP_INSTANCE_UID),
        )
        .unwrap();

    let mut bytes = Vec::new();
    file.write_all(&mut bytes).unwrap();
    bytes
}

/// Serves objects from memory and records every call.
#[derive(Default)]
pub struct MemoryFetcher {
    objects: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl MemoryFetcher {
    pub fn with_object(mut self, reference: &str, bytes: Vec<u8>) -> Self {
        self.objects.insert(reference.to_string(), bytes);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn destinations(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, path)| path.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectFetcher for MemoryFetcher {
    async fn fetch(
        &self,
        reference: &ObjectReference,
        destination: &Path,
    ) -> Result<u64, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((reference.to_string(), destination.to_path_buf()));

        let bytes = self
            .objects
            .get(&reference.to_string())
            .ok_or_else(|| FetchError::ObjectNotFound {
                bucket: reference.bucket().to_string(),
                key: reference.key().to_string(),
            })?;
        tokio::fs::write(destination, bytes)
            .await
            .map_err(|e| FetchError::LocalWrite(e.kind()))?;
        Ok(bytes.len() as u64)
    }
}

/// Writes a partial object, then fails the transfer.
#[derive(Default)]
pub struct InterruptedFetcher {
    destinations: Mutex<Vec<PathBuf>>,
}

impl InterruptedFetcher {
    pub fn destinations(&self) -> Vec<PathBuf> {
        self.destinations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectFetcher for InterruptedFetcher {
    async fn fetch(&self, _: &ObjectReference, destination: &Path) -> Result<u64, FetchError> {
        self.destinations
            .lock()
            .unwrap()
            .push(destination.to_path_buf());
        tokio::fs::write(destination, &[0u8; 100])
            .await
            .map_err(|e| FetchError::LocalWrite(e.kind()))?;
        Err(FetchError::Transfer("connection reset by peer".to_string()))
    }
}

/// Writes a partial object and never completes.
#[derive(Default)]
pub struct StalledFetcher {
    destinations: Mutex<Vec<PathBuf>>,
}

impl StalledFetcher {
    pub fn destinations(&self) -> Vec<PathBuf> {
        self.destinations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectFetcher for StalledFetcher {
    async fn fetch(&self, _: &ObjectReference, destination: &Path) -> Result<u64, FetchError> {
        tokio::fs::write(destination, &[0u8; 100])
            .await
            .map_err(|e| FetchError::LocalWrite(e.kind()))?;
        self.destinations
            .lock()
            .unwrap()
            .push(destination.to_path_buf());
        std::future::pending::<()>().await;
        Ok(0)
    }
}

pub fn service_with(fetcher: Arc<dyn ObjectFetcher>, staging_dir: &Path) -> ExtractionService {
    ExtractionService::new(
        fetcher,
        Arc::new(DicomParser::default()),
        StagingArea::new(Some(staging_dir.to_path_buf())),
    )
}

pub fn app_with(fetcher: Arc<dyn ObjectFetcher>, staging_dir: &Path) -> axum::Router {
    create_app(AppState {
        extraction: Arc::new(service_with(fetcher, staging_dir)),
        config: ServiceConfig::default(),
    })
}

/// Entries currently in `dir`.
pub fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}
