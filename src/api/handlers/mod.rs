pub mod dicom;
pub mod health;
