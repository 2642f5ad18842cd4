use pilot_browser::LabeledElement;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Element with label [{label}] not found")]
pub struct ElementNotFound {
    pub label: String,
}

/// Labels produced by one perception pass. A new pass replaces the whole set.
#[derive(Debug, Clone)]
pub struct LabelSet<E> {
    epoch: u64,
    elements: Vec<LabeledElement<E>>,
}

impl<E> LabelSet<E> {
    pub fn new(epoch: u64, elements: Vec<LabeledElement<E>>) -> Self {
        Self { epoch, elements }
    }

    /// A set that resolves nothing. Stands in when a page check fails.
    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Exact match on the label text.
    pub fn resolve(&self, label: &str) -> Result<&E, ElementNotFound> {
        self.elements
            .iter()
            .find(|e| e.label == label)
            .map(|e| &e.element)
            .ok_or_else(|| ElementNotFound {
                label: label.to_string(),
            })
    }

    /// `[label]: description`, one line per element.
    pub fn digest(&self) -> String {
        self.elements
            .iter()
            .map(|e| format!("[{}]: {}", e.label, e.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(epoch: u64, ids: &[&str]) -> LabelSet<String> {
        LabelSet::new(
            epoch,
            ids.iter()
                .enumerate()
                .map(|(i, id)| LabeledElement {
                    label: i.to_string(),
                    element: id.to_string(),
                    description: format!("<button> {}", id),
                })
                .collect(),
        )
    }

    #[test]
    fn test_exact_match_only() {
        let labels = set(1, &["a", "b", "c"]);
        assert_eq!(labels.resolve("1").unwrap(), "b");
        assert!(labels.resolve(" 1").is_err());
        assert!(labels.resolve("[1]").is_err());
    }

    #[test]
    fn test_label_from_older_observation_not_found() {
        let first = set(1, &["a", "b", "c", "d", "e"]);
        assert!(first.resolve("4").is_ok());

        let newest = set(2, &["x", "y"]);
        assert_eq!(
            newest.resolve("4"),
            Err(ElementNotFound {
                label: "4".to_string()
            })
        );
        assert_eq!(newest.epoch(), 2);
    }

    #[test]
    fn test_digest_format() {
        assert_eq!(
            set(1, &["Home", "Go"]).digest(),
            "[0]: <button> Home\n[1]: <button> Go"
        );
        assert_eq!(LabelSet::<String>::empty().digest(), "");
    }
}
