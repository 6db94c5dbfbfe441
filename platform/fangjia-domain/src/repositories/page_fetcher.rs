use crate::errors::RetrievalError;

pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<String, RetrievalError>;
}
