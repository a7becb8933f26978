//! DICOM Part 10 metadata extraction.
//!
//! The file meta group and the top-level data set are read with dicom-rs up
//! to Pixel Data, then the elements named by a [`FieldSet`] are converted to
//! JSON. Pixel data is never read.

pub mod fields;
mod value;

pub use dicom_core::Tag;

use dicom_dictionary_std::tags;
use dicom_encoding::transfer_syntax::TransferSyntaxIndex;
use dicom_object::meta::FileMetaTable;
use dicom_object::OpenFileOptions;
use dicom_object::file::ReadPreamble;
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use fields::FieldSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;

const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8; 4] = b"DICM";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The bytes are not a well-formed DICOM file.
    #[error("Malformed DICOM file: {0}")]
    MalformedFile(String),

    /// The file is well-formed but uses an encoding this parser does not
    /// implement.
    #[error("Unsupported DICOM encoding: {0}")]
    UnsupportedEncoding(String),
}

/// Extracted metadata keyed by field name. Keys are sorted, so equal inputs
/// serialise to identical JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct MetadataResult(#[schema(value_type = Object)] BTreeMap<String, Value>);

impl MetadataResult {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

/// Turns a local file into a [`MetadataResult`].
pub trait MetadataParser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<MetadataResult, ParseError>;
}

#[derive(Debug, Clone, Default)]
pub struct DicomParser {
    fields: FieldSet,
}

impl DicomParser {
    pub fn new(fields: FieldSet) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<MetadataResult, ParseError> {
        let body = strip_preamble(bytes)?;

        // Bounded by the group length (0002,0000).
        let meta = FileMetaTable::from_reader(body).map_err(|e| {
            ParseError::MalformedFile(format!("file meta information could not be read: {e}"))
        })?;
        let uid = meta
            .transfer_syntax()
            .trim_end_matches(['\0', ' '])
            .to_string();
        let syntax = TransferSyntaxRegistry.get(&uid).ok_or_else(|| {
            ParseError::UnsupportedEncoding(format!("transfer syntax {uid} is not recognised"))
        })?;
        debug!(transfer_syntax = %uid, name = syntax.name(), "file meta information read");

        let object = OpenFileOptions::new()
            .read_preamble(ReadPreamble::Never)
            .read_until(tags::PIXEL_DATA)
            .from_reader(Cursor::new(body.to_vec()))
            .map_err(|e| ParseError::MalformedFile(format!("data set could not be read: {e}")))?;

        let mut result = BTreeMap::new();
        for field in self.fields.iter() {
            let value = if field.tag == tags::TRANSFER_SYNTAX_UID {
                Value::String(uid.clone())
            } else {
                match object.element(field.tag) {
                    Ok(element) => match element.value().primitive() {
                        Some(primitive) => value::convert(field, element.vr(), primitive)?,
                        None => {
                            return Err(ParseError::UnsupportedEncoding(format!(
                                "{} holds a sequence or encapsulated value",
                                field.name
                            )));
                        }
                    },
                    Err(_) => Value::Null,
                }
            };
            result.insert(field.name.to_string(), value);
        }

        Ok(MetadataResult(result))
    }
}

impl MetadataParser for DicomParser {
    fn parse(&self, path: &Path) -> Result<MetadataResult, ParseError> {
        let bytes = std::fs::read(path).map_err(|e| {
            ParseError::MalformedFile(format!("file could not be read: {}", e.kind()))
        })?;
        debug!(bytes = bytes.len(), "parsing DICOM file");
        self.parse_bytes(&bytes)
    }
}

/// Drops the 128-byte preamble, keeping the DICM signature.
fn strip_preamble(bytes: &[u8]) -> Result<&[u8], ParseError> {
    if bytes.len() < PREAMBLE_LEN + MAGIC.len() {
        return Err(ParseError::MalformedFile(format!(
            "file is {} bytes, too short for a DICOM preamble",
            bytes.len()
        )));
    }
    if &bytes[PREAMBLE_LEN..PREAMBLE_LEN + MAGIC.len()] != MAGIC {
        return Err(ParseError::MalformedFile(
            "missing DICM signature after the 128-byte preamble".to_string(),
        ));
    }
    Ok(&bytes[PREAMBLE_LEN..])
}
