pub mod duplicates;
pub mod scan;
pub mod status;
