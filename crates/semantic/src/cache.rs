use once_cell::sync::OnceCell;
use onnxruntime::{environment::Environment, session::Session};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use tokenizers::Tokenizer;

use crate::EmbeddingError;

static ORT_ENV: OnceCell<Environment> = OnceCell::new();

// Sessions are not `Send`, so each worker thread keeps its own handle.
thread_local! {
    static MODEL_CACHE: RefCell<HashMap<ModelCacheKey, Rc<CachedModel>>> =
        RefCell::new(HashMap::new());
}

#[derive(Debug, Hash, PartialEq, Eq, Clone)]
pub(crate) struct ModelCacheKey {
    pub(crate) model_path: PathBuf,
    pub(crate) tokenizer_path: PathBuf,
}

pub(crate) struct CachedModel {
    pub(crate) tokenizer: Tokenizer,
    pub(crate) session: RefCell<Session<'static>>,
}

impl CachedModel {
    fn load(key: &ModelCacheKey) -> Result<Self, EmbeddingError> {
        if !key.model_path.exists() {
            return Err(EmbeddingError::ModelNotFound(
                key.model_path.display().to_string(),
            ));
        }
        if !key.tokenizer_path.exists() {
            return Err(EmbeddingError::ModelNotFound(
                key.tokenizer_path.display().to_string(),
            ));
        }
        let tokenizer = Tokenizer::from_file(&key.tokenizer_path)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        let env = ort_environment()?;
        let session = env
            .new_session_builder()
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?
            .with_model_from_file(key.model_path.clone())
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        Ok(Self {
            tokenizer,
            session: RefCell::new(session),
        })
    }
}

pub(crate) fn get_or_load_model_handle(
    key: &ModelCacheKey,
) -> Result<Rc<CachedModel>, EmbeddingError> {
    MODEL_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(handle) = cache.get(key) {
            return Ok(handle.clone());
        }

        let handle = Rc::new(CachedModel::load(key)?);
        cache.insert(key.clone(), handle.clone());
        Ok(handle)
    })
}

fn ort_environment() -> Result<&'static Environment, EmbeddingError> {
    ORT_ENV.get_or_try_init(|| {
        Environment::builder()
            .with_name("plant-semantic")
            .build()
            .map_err(|e| EmbeddingError::Inference(e.to_string()))
    })
}
