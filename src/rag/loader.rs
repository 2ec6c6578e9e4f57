use std::path::Path;

use super::{Document, RagError};

/// Read a PDF into one [`Document`] per page. Pages without text are skipped.
/// Parsing runs on the blocking thread pool.
pub async fn load_pdf(path: impl AsRef<Path>) -> Result<Vec<Document>, RagError> {
    let path = path.as_ref();
    if !tokio::fs::try_exists(path).await? {
        return Err(RagError::FileNotFound(path.to_path_buf()));
    }
    let is_pdf = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(RagError::NotPdf(path.to_path_buf()));
    }

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_pages(&path)).await?
}

fn read_pages(path: &Path) -> Result<Vec<Document>, RagError> {
    let pdf = lopdf::Document::load(path)?;
    let source = path.display().to_string();
    let mut documents = Vec::new();
    for (index, page_number) in pdf.get_pages().into_keys().enumerate() {
        let text = match pdf.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(%source, page = page_number, %err, "skipping unreadable page");
                continue;
            }
        };
        if text.trim().is_empty() {
            continue;
        }
        documents.push(Document::new(text, source.clone(), index));
    }

    tracing::info!(%source, pages = documents.len(), "loaded pdf");
    Ok(documents)
}

#[cfg(test)]
pub(crate) mod tests {
    use lopdf::{
        Object, Stream, dictionary,
        content::{Content, Operation},
    };

    use super::*;

    /// Write a PDF whose pages each show one line of text; `None` leaves a page blank.
    pub(crate) fn write_pdf(path: &Path, pages: &[Option<&str>]) {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let operations = match text {
                Some(text) => vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
                None => Vec::new(),
            };
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[tokio::test]
    async fn one_document_per_page_with_zero_based_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.PDF");
        write_pdf(&path, &[Some("Chapter one"), None, Some("Chapter three")]);

        let documents = load_pdf(&path).await.unwrap();

        assert_eq!(documents.len(), 2);
        assert!(documents[0].content.contains("Chapter one"));
        assert_eq!(documents[0].metadata.page, 0);
        assert!(documents[1].content.contains("Chapter three"));
        assert_eq!(documents[1].metadata.page, 2);
        assert_eq!(documents[1].metadata.source, path.display().to_string());
    }

    #[tokio::test]
    async fn missing_file_and_wrong_extension_are_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("absent.pdf");
        assert!(matches!(
            load_pdf(&missing).await,
            Err(RagError::FileNotFound(path)) if path == missing
        ));

        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "plain text").unwrap();
        assert!(matches!(load_pdf(&notes).await, Err(RagError::NotPdf(_))));
    }
}
