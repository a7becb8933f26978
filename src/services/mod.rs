pub mod dicom;
pub mod extraction;
pub mod staging;
pub mod storage;
