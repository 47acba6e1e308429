pub mod labels;
pub mod vocab;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::DatasetConfig;

pub use labels::{
    NEW_LINE_TOKEN, PLACEHOLDER_TOKENS, convert_strings_to_labels, segment, substitute_escapes,
    tokenize_paragraph,
};
pub use vocab::ParagraphVocab;

pub type SharedVocab = Arc<ParagraphVocab>;

/// Resolve the mapping for a dataset: the configured JSON file when one is
/// set, the built-in mapping otherwise.
pub fn load_vocab(cfg: &DatasetConfig) -> Result<SharedVocab> {
    let vocab = match cfg.vocab_path() {
        Some(path) => {
            let vocab = ParagraphVocab::load(path)?;
            info!("Loaded mapping with {} symbols from {}", vocab.len(), path.display());
            vocab
        }
        None => ParagraphVocab::builtin(),
    };
    Ok(Arc::new(vocab))
}
