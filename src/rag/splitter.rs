use super::{Document, RagError};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Splits text on the first separator that occurs in it, recursing into
/// pieces that are still too long, then merges neighbouring pieces back into
/// chunks of at most `chunk_size` chars that overlap by up to `chunk_overlap`.
/// Separators stay attached to the start of the piece that follows them.
#[derive(Clone, Debug)]
pub struct RecursiveCharacterTextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for RecursiveCharacterTextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: ["\n\n", "\n", " ", ""].map(String::from).to_vec(),
        }
    }
}

impl RecursiveCharacterTextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, RagError> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(RagError::InvalidSplitter {
                chunk_size,
                chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        })
    }

    pub fn with_separators(mut self, separators: &[&str]) -> Self {
        self.separators = separators.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split every document; each chunk keeps the metadata of its document.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        documents
            .iter()
            .flat_map(|document| {
                self.split_text(&document.content)
                    .into_iter()
                    .map(|content| Document {
                        content,
                        metadata: document.metadata.clone(),
                    })
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or_default();
        let mut remaining: &[String] = &[];
        for (index, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                remaining = &separators[index + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut short = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                short.push(piece);
                continue;
            }
            if !short.is_empty() {
                chunks.extend(self.merge(std::mem::take(&mut short)));
            }
            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !short.is_empty() {
            chunks.extend(self.merge(short));
        }
        chunks
    }

    fn merge(&self, pieces: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: Vec<String> = Vec::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(&piece);
            if total + len > self.chunk_size && !window.is_empty() {
                if total > self.chunk_size {
                    tracing::warn!(
                        size = total,
                        chunk_size = self.chunk_size,
                        "created a chunk longer than the chunk size"
                    );
                }
                chunks.extend(join_window(&window));
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    let dropped = window.remove(0);
                    total -= char_len(&dropped);
                }
            }
            total += len;
            window.push(piece);
        }
        chunks.extend(join_window(&window));
        chunks
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn join_window(window: &[String]) -> Option<String> {
    let joined = window.concat();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        let mut parts = text.split(separator);
        parts
            .next()
            .map(str::to_owned)
            .into_iter()
            .chain(parts.map(|part| format!("{separator}{part}")))
            .collect()
    };
    pieces.into_iter().filter(|piece| !piece.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbouring_chunks_overlap() {
        let splitter = RecursiveCharacterTextSplitter::new(10, 4).unwrap();

        assert_eq!(
            splitter.split_text("aaa bbb ccc ddd eee"),
            ["aaa bbb", "bbb ccc", "ccc ddd", "ddd eee"]
        );
    }

    #[test]
    fn paragraphs_are_preferred_over_words() {
        let splitter = RecursiveCharacterTextSplitter::new(12, 4).unwrap();

        assert_eq!(
            splitter.split_text("para one.\n\npara two."),
            ["para one.", "para two."]
        );
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let splitter = RecursiveCharacterTextSplitter::new(10, 4).unwrap();

        assert_eq!(
            splitter.split_text("abcdefghijklmnop"),
            ["abcdefghij", "ghijklmnop"]
        );
    }

    #[test]
    fn lengths_are_counted_in_chars() {
        let splitter = RecursiveCharacterTextSplitter::new(6, 0).unwrap();

        let chunks = splitter.split_text("ééééé ààààà");
        assert_eq!(chunks, ["ééééé", "ààààà"]);
    }

    #[test]
    fn default_chunks_stay_within_budget() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(200);
        let splitter = RecursiveCharacterTextSplitter::default();

        let chunks = splitter.split_text(&text);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= DEFAULT_CHUNK_SIZE));
        let first = &chunks[0];
        let tail = &first[first.len() - 50..];
        assert!(chunks[1].contains(tail.trim()));
    }

    #[test]
    fn documents_keep_their_metadata() {
        let splitter = RecursiveCharacterTextSplitter::new(10, 0).unwrap();
        let documents = [Document::new("one two three", "a.pdf", 4)];

        let chunks = splitter.split_documents(&documents);

        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|chunk| chunk.metadata.page == 4));
        assert!(chunks.iter().all(|chunk| chunk.metadata.source == "a.pdf"));
    }

    #[test]
    fn overlap_must_be_smaller_than_chunks() {
        assert!(matches!(
            RecursiveCharacterTextSplitter::new(100, 100),
            Err(RagError::InvalidSplitter { .. })
        ));
    }
}
