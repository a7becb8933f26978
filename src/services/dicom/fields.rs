use dicom_core::Tag;
use dicom_dictionary_std::tags;
use thiserror::Error;

/// Shape of the JSON value a field is converted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    TextList,
    Integer,
    Decimal,
    DecimalList,
    Date,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub tag: Tag,
    pub kind: FieldKind,
}

const fn field(name: &'static str, tag: Tag, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, tag, kind }
}

use FieldKind::*;

pub const DEFAULT_FIELDS: &[FieldSpec] = &[
    // File meta information
    field("transfer_syntax_uid", tags::TRANSFER_SYNTAX_UID, Text),
    // SOP common
    field("sop_class_uid", tags::SOP_CLASS_UID, Text),
    field("sop_instance_uid", tags::SOP_INSTANCE_UID, Text),
    // Patient
    field("patient_id", tags::PATIENT_ID, Text),
    field("patient_name", tags::PATIENT_NAME, Text),
    field("patient_birth_date", tags::PATIENT_BIRTH_DATE, Date),
    field("patient_sex", tags::PATIENT_SEX, Text),
    field("patient_age", tags::PATIENT_AGE, Text),
    // Study
    field("study_instance_uid", tags::STUDY_INSTANCE_UID, Text),
    field("study_id", tags::STUDY_ID, Text),
    field("study_date", tags::STUDY_DATE, Date),
    field("study_time", tags::STUDY_TIME, Time),
    field("study_description", tags::STUDY_DESCRIPTION, Text),
    field("accession_number", tags::ACCESSION_NUMBER, Text),
    // Series
    field("series_instance_uid", tags::SERIES_INSTANCE_UID, Text),
    field("series_number", tags::SERIES_NUMBER, Integer),
    field("series_description", tags::SERIES_DESCRIPTION, Text),
    field("modality", tags::MODALITY, Text),
    field("body_part_examined", tags::BODY_PART_EXAMINED, Text),
    // Instance and acquisition
    field("instance_number", tags::INSTANCE_NUMBER, Integer),
    field("acquisition_date", tags::ACQUISITION_DATE, Date),
    field("acquisition_time", tags::ACQUISITION_TIME, Time),
    field("manufacturer", tags::MANUFACTURER, Text),
    field("manufacturer_model_name", tags::MANUFACTURER_MODEL_NAME, Text),
    field("image_type", tags::IMAGE_TYPE, TextList),
    field("slice_thickness", tags::SLICE_THICKNESS, Decimal),
    field("kvp", tags::KVP, Decimal),
    // Geometry
    field("image_position_patient", tags::IMAGE_POSITION_PATIENT, DecimalList),
    field("image_orientation_patient", tags::IMAGE_ORIENTATION_PATIENT, DecimalList),
    field("rows", tags::ROWS, Integer),
    field("columns", tags::COLUMNS, Integer),
    field("pixel_spacing", tags::PIXEL_SPACING, DecimalList),
    field("number_of_frames", tags::NUMBER_OF_FRAMES, Integer),
    // Pixel description
    field("samples_per_pixel", tags::SAMPLES_PER_PIXEL, Integer),
    field("photometric_interpretation", tags::PHOTOMETRIC_INTERPRETATION, Text),
    field("bits_allocated", tags::BITS_ALLOCATED, Integer),
    field("bits_stored", tags::BITS_STORED, Integer),
    field("pixel_representation", tags::PIXEL_REPRESENTATION, Integer),
    field("window_center", tags::WINDOW_CENTER, DecimalList),
    field("window_width", tags::WINDOW_WIDTH, DecimalList),
    field("rescale_intercept", tags::RESCALE_INTERCEPT, Decimal),
    field("rescale_slope", tags::RESCALE_SLOPE, Decimal),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown metadata field: {0}")]
pub struct UnknownField(pub String);

/// The fields every parse reports, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet {
    fields: Vec<FieldSpec>,
}

impl Default for FieldSet {
    fn default() -> Self {
        Self {
            fields: DEFAULT_FIELDS.to_vec(),
        }
    }
}

impl FieldSet {
    /// Restricts the default table to `names`. Duplicates are collapsed.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, UnknownField> {
        let mut fields: Vec<FieldSpec> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim();
            let spec = DEFAULT_FIELDS
                .iter()
                .find(|f| f.name == name)
                .ok_or_else(|| UnknownField(name.to_string()))?;
            if !fields.iter().any(|f| f.name == spec.name) {
                fields.push(*spec);
            }
        }
        Ok(Self { fields })
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    pub fn by_tag(&self, tag: Tag) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
