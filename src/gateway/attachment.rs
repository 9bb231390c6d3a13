//! Attachment model and classification.
//!
//! An inbound message carries either a document or a list of photo
//! variants; [`MessageMedia`] makes that choice explicit so classification
//! can match on it exhaustively.

use super::{GatewayError, SizeValidator};
use crate::config::{IMAGE_MIME_TYPE, PDF_MIME_TYPE};
use teloxide::types::{Document, Message, PhotoSize};

/// Which message field an attachment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Sent as a file
    Document,
    /// Sent as a compressed photo
    Image,
}

/// Remote file reference with platform-declared metadata.
///
/// `mime_type` and `size` come from the platform and are untrusted until
/// checked by [`AttachmentClassifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Opaque remote file id
    pub file_id: String,
    /// Original file name, documents only
    pub file_name: Option<String>,
    /// Declared MIME type, documents only
    pub mime_type: Option<String>,
    /// Declared size in bytes
    pub size: u64,
    /// Source field
    pub kind: AttachmentKind,
}

impl From<&Document> for Attachment {
    fn from(doc: &Document) -> Self {
        Self {
            file_id: doc.file.id.0.clone(),
            file_name: doc.file_name.clone(),
            mime_type: doc.mime_type.as_ref().map(ToString::to_string),
            size: u64::from(doc.file.size),
            kind: AttachmentKind::Document,
        }
    }
}

impl From<&PhotoSize> for Attachment {
    fn from(photo: &PhotoSize) -> Self {
        Self {
            file_id: photo.file.id.0.clone(),
            file_name: None,
            mime_type: None,
            size: u64::from(photo.file.size),
            kind: AttachmentKind::Image,
        }
    }
}

/// Media carried by an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageMedia {
    /// A file attachment
    Document(Attachment),
    /// Photo variants, smallest first; empty when the message has no media
    Photo(Vec<Attachment>),
}

impl MessageMedia {
    /// Extract the media of a Telegram message
    #[must_use]
    pub fn from_message(msg: &Message) -> Self {
        if let Some(doc) = msg.document() {
            return Self::Document(Attachment::from(doc));
        }
        Self::Photo(
            msg.photo()
                .map(|sizes| sizes.iter().map(Attachment::from).collect())
                .unwrap_or_default(),
        )
    }
}

/// Validation gate for inbound attachments
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachmentClassifier {
    sizes: SizeValidator,
}

impl AttachmentClassifier {
    /// Create a classifier enforcing the given ceilings
    #[must_use]
    pub const fn new(sizes: SizeValidator) -> Self {
        Self { sizes }
    }

    /// Select the image carried by a message.
    ///
    /// A document must declare the accepted image MIME type exactly. Without a
    /// document, the last photo variant (the highest resolution) is chosen.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::UnsupportedMimeType`] for a non-image document
    /// - [`GatewayError::ImageNotFound`] when there is no photo either
    /// - [`GatewayError::FileTooLarge`] when the chosen attachment is too big
    pub fn classify_as_image<'a>(
        &self,
        media: &'a MessageMedia,
    ) -> Result<&'a Attachment, GatewayError> {
        let attachment = match media {
            MessageMedia::Document(doc) => {
                require_mime_type(doc, IMAGE_MIME_TYPE)?;
                doc
            }
            MessageMedia::Photo(variants) => variants.last().ok_or(GatewayError::ImageNotFound)?,
        };
        self.sizes.check_download_size(attachment)?;
        Ok(attachment)
    }

    /// Select the PDF document carried by a message.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::UnsupportedMimeType`] unless the message has a PDF document
    /// - [`GatewayError::FileTooLarge`] when the document is too big
    pub fn classify_as_pdf_document<'a>(
        &self,
        media: &'a MessageMedia,
    ) -> Result<&'a Attachment, GatewayError> {
        let MessageMedia::Document(doc) = media else {
            return Err(GatewayError::UnsupportedMimeType {
                expected: PDF_MIME_TYPE,
                actual: None,
            });
        };
        require_mime_type(doc, PDF_MIME_TYPE)?;
        self.sizes.check_download_size(doc)?;
        Ok(doc)
    }
}

fn require_mime_type(doc: &Attachment, expected: &'static str) -> Result<(), GatewayError> {
    if doc.mime_type.as_deref() == Some(expected) {
        return Ok(());
    }
    Err(GatewayError::UnsupportedMimeType {
        expected,
        actual: doc.mime_type.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_FILESIZE_DOWNLOAD;
    use rstest::rstest;

    fn document(mime_type: &str, size: u64) -> Attachment {
        Attachment {
            file_id: "doc_id".to_string(),
            file_name: Some("file".to_string()),
            mime_type: Some(mime_type.to_string()),
            size,
            kind: AttachmentKind::Document,
        }
    }

    fn photo(file_id: &str, size: u64) -> Attachment {
        Attachment {
            file_id: file_id.to_string(),
            file_name: None,
            mime_type: None,
            size,
            kind: AttachmentKind::Image,
        }
    }

    #[test]
    fn test_image_document_is_accepted() -> Result<(), GatewayError> {
        let media = MessageMedia::Document(document(IMAGE_MIME_TYPE, MAX_FILESIZE_DOWNLOAD));

        let actual = AttachmentClassifier::default().classify_as_image(&media)?;

        assert_eq!(actual.file_id, "doc_id");
        assert_eq!(actual.kind, AttachmentKind::Document);
        Ok(())
    }

    #[rstest]
    #[case("clearly_invalid", 1)]
    #[case(PDF_MIME_TYPE, 1)]
    #[case("image/png", 1)]
    #[case("image", MAX_FILESIZE_DOWNLOAD + 1)]
    fn test_image_document_with_wrong_mime_type_is_rejected(
        #[case] mime_type: &str,
        #[case] size: u64,
    ) {
        let media = MessageMedia::Document(document(mime_type, size));

        let result = AttachmentClassifier::default().classify_as_image(&media);

        assert!(matches!(
            result,
            Err(GatewayError::UnsupportedMimeType { expected: IMAGE_MIME_TYPE, .. })
        ));
    }

    #[test]
    fn test_image_document_too_large() {
        let media = MessageMedia::Document(document(IMAGE_MIME_TYPE, MAX_FILESIZE_DOWNLOAD + 1));

        let result = AttachmentClassifier::default().classify_as_image(&media);

        assert!(matches!(result, Err(GatewayError::FileTooLarge { .. })));
    }

    #[test]
    fn test_photo_picks_last_variant() -> Result<(), GatewayError> {
        let media = MessageMedia::Photo(vec![
            photo("small", 10),
            photo("medium", 100),
            photo("large", MAX_FILESIZE_DOWNLOAD),
        ]);

        let actual = AttachmentClassifier::default().classify_as_image(&media)?;

        assert_eq!(actual.file_id, "large");
        assert_eq!(actual.kind, AttachmentKind::Image);
        Ok(())
    }

    #[test]
    fn test_photo_not_found() {
        let media = MessageMedia::Photo(Vec::new());

        let result = AttachmentClassifier::default().classify_as_image(&media);

        assert!(matches!(result, Err(GatewayError::ImageNotFound)));
    }

    #[test]
    fn test_photo_too_large() {
        // Smaller variants do not rescue an oversized best variant
        let media = MessageMedia::Photo(vec![
            photo("small", 10),
            photo("large", MAX_FILESIZE_DOWNLOAD + 1),
        ]);

        let result = AttachmentClassifier::default().classify_as_image(&media);

        assert!(matches!(result, Err(GatewayError::FileTooLarge { .. })));
    }

    #[test]
    fn test_pdf_document_is_accepted() -> Result<(), GatewayError> {
        let media = MessageMedia::Document(document(PDF_MIME_TYPE, MAX_FILESIZE_DOWNLOAD));

        let actual = AttachmentClassifier::default().classify_as_pdf_document(&media)?;

        assert_eq!(actual.file_id, "doc_id");
        Ok(())
    }

    #[rstest]
    #[case("clearly_invalid", 1)]
    #[case(IMAGE_MIME_TYPE, 1)]
    #[case("application/pdf; charset=binary", MAX_FILESIZE_DOWNLOAD + 1)]
    fn test_pdf_document_with_wrong_mime_type_is_rejected(
        #[case] mime_type: &str,
        #[case] size: u64,
    ) {
        let media = MessageMedia::Document(document(mime_type, size));

        let result = AttachmentClassifier::default().classify_as_pdf_document(&media);

        assert!(matches!(
            result,
            Err(GatewayError::UnsupportedMimeType { expected: PDF_MIME_TYPE, .. })
        ));
    }

    #[test]
    fn test_pdf_document_missing_mime_type_is_rejected() {
        let mut doc = document(PDF_MIME_TYPE, 1);
        doc.mime_type = None;
        let media = MessageMedia::Document(doc);

        let result = AttachmentClassifier::default().classify_as_pdf_document(&media);

        assert!(matches!(
            result,
            Err(GatewayError::UnsupportedMimeType { actual: None, .. })
        ));
    }

    #[test]
    fn test_pdf_document_too_large() {
        let media = MessageMedia::Document(document(PDF_MIME_TYPE, MAX_FILESIZE_DOWNLOAD + 1));

        let result = AttachmentClassifier::default().classify_as_pdf_document(&media);

        assert!(matches!(result, Err(GatewayError::FileTooLarge { .. })));
    }

    #[test]
    fn test_photo_is_not_a_pdf_document() {
        let media = MessageMedia::Photo(vec![photo("large", 10)]);

        let result = AttachmentClassifier::default().classify_as_pdf_document(&media);

        assert!(matches!(result, Err(GatewayError::UnsupportedMimeType { .. })));
    }
}
