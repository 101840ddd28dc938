/// Vocabulary — dense integer indices for base scene elements.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::scene::Corpus;

#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("corpus contains no scene elements")]
    Empty,
}

/// Bidirectional mapping between base element identifiers and `[0, N)`.
///
/// Indices follow first appearance in corpus order and never change for
/// the lifetime of a trained model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vocabulary {
    index: FxHashMap<String, usize>,
    elements: Vec<String>,
}

impl Vocabulary {
    /// Build the vocabulary from every base element in the corpus.
    pub fn build(corpus: &Corpus) -> Result<Vocabulary, VocabularyError> {
        let mut vocab = Vocabulary::default();
        for scene in corpus.scenes() {
            vocab.insert(scene.base_element());
        }
        if vocab.is_empty() {
            return Err(VocabularyError::Empty);
        }
        Ok(vocab)
    }

    /// Insert a base element, returning its index.
    pub fn insert(&mut self, element: &str) -> usize {
        if let Some(&i) = self.index.get(element) {
            return i;
        }
        let i = self.elements.len();
        self.elements.push(element.to_string());
        self.index.insert(element.to_string(), i);
        i
    }

    pub fn index_of(&self, element: &str) -> Option<usize> {
        self.index.get(element).copied()
    }

    pub fn element(&self, index: usize) -> Option<&str> {
        self.elements.get(index).map(String::as_str)
    }

    pub fn contains(&self, element: &str) -> bool {
        self.index.contains_key(element)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in index order.
    pub fn elements(&self) -> &[String] {
        &self.elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::scene::{Context, SceneRecord, Trailer};

    fn corpus(ids: &[&[&str]]) -> Corpus {
        Corpus::new(
            ids.iter()
                .map(|t| {
                    Trailer::new(
                        t.iter()
                            .map(|e| SceneRecord::new(e, Context::Low, 2.0, "NV1"))
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn build_strips_repeat_markers() {
        let vocab = Vocabulary::build(&corpus(&[&["A", "A_R", "B"], &["C", "B"]])).unwrap();
        assert_eq!(vocab.len(), 3);
        assert!(vocab.contains("A"));
        assert!(!vocab.contains("A_R"));
        assert_eq!(vocab.elements(), &["A", "B", "C"]);
    }

    #[test]
    fn indices_are_a_bijection() {
        let vocab = Vocabulary::build(&corpus(&[&["X", "Y", "Z", "X"]])).unwrap();
        for i in 0..vocab.len() {
            let element = vocab.element(i).unwrap();
            assert_eq!(vocab.index_of(element), Some(i));
        }
        assert_eq!(vocab.element(vocab.len()), None);
        assert_eq!(vocab.index_of("missing"), None);
    }

    #[test]
    fn empty_corpus_is_an_error() {
        assert!(matches!(
            Vocabulary::build(&Corpus::default()),
            Err(VocabularyError::Empty)
        ));
        assert!(matches!(
            Vocabulary::build(&corpus(&[&[]])),
            Err(VocabularyError::Empty)
        ));
    }
}
