use crate::entities::catalog::CityCatalog;
use crate::entities::dataset::Dataset;
use crate::value_objects::weekly_point::WeeklySeries;
use std::path::Path;

pub trait ReportWriter {
    fn write_report(
        &self,
        path: &Path,
        dataset: &Dataset,
        synthetic: &WeeklySeries,
        catalog: &CityCatalog,
        generated_at: &str,
    ) -> Result<(), String>;
}
