use crate::entities::dataset::Dataset;
use crate::errors::PersistenceError;

pub trait DatasetStore {
    /// Missing or unreadable stores load as an empty dataset.
    fn load(&self) -> Dataset;
    fn save(&self, dataset: &Dataset) -> Result<(), PersistenceError>;
}
