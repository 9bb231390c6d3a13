//! User-facing texts and keyboards.

use super::state::PasswordTask;
use crate::gateway::GatewayError;
use crate::platform::{ActionButton, LinkButton, Markup};
use crate::processing::ProcessingError;

/// Label of the button finishing a merge
pub const DONE_BUTTON: &str = "Done";
/// Callback data of the inline cancel button
pub const CANCEL_CALLBACK: &str = "cancel";

/// Greeting for `/start`
pub const WELCOME_TEXT: &str = "Welcome to PDF Courier!\n\n\
I can merge PDF files, add or remove PDF passwords and turn images into PDF files.\n\
Type /help to see what I can do.";

/// Reply for `/help`
pub const HELP_TEXT: &str = "<b>Commands</b>\n\
/merge - merge PDF files\n\
/encrypt - protect a PDF file with a password\n\
/decrypt - remove the password from a PDF file\n\
/topdf - convert an image into a PDF file\n\
/cancel - cancel the current operation";

/// Prompt starting a merge
pub const MERGE_PROMPT: &str = "Send me the PDF files that you'll like to merge.\n\n\
Note that the files will be merged in the order that you send me.\n\
Press <b>Done</b> when you've sent all the files.";
/// Reply when "Done" comes too early
pub const MERGE_NEED_MORE: &str = "You need to send me at least two PDF files to merge.";
/// Header of the merged file listing
pub const MERGE_FILES_HEADER: &str = "You've merged the following files:\n";

/// Prompt asking for an image
pub const IMAGE_PROMPT: &str = "Send me the image that you'll like to convert into a PDF file.";

/// Reply when the produced file cannot be uploaded
pub const RESULT_TOO_LARGE: &str =
    "The resulting file is too large for me to send to you, sorry.";
/// Reply for failures without a more specific message
pub const GENERIC_FAILURE: &str = "Something went wrong, please try again.";

/// Reply after a PDF was added to a merge
#[must_use]
pub fn merge_file_received(file_name: Option<&str>, count: usize) -> String {
    let name = file_name.unwrap_or("your file");
    format!("Added {name} ({count} so far). Send me more files or press Done.")
}

/// Prompt asking for the PDF of a password task
#[must_use]
pub const fn password_task_prompt(task: PasswordTask) -> &'static str {
    match task {
        PasswordTask::Encrypt => "Send me the PDF file that you'll like to encrypt.",
        PasswordTask::Decrypt => "Send me the PDF file that you'll like to decrypt.",
    }
}

/// Prompt asking for the password
#[must_use]
pub const fn password_prompt(task: PasswordTask) -> &'static str {
    match task {
        PasswordTask::Encrypt => "Send me the password to encrypt your PDF file with.",
        PasswordTask::Decrypt => "Send me the password to decrypt your PDF file.",
    }
}

/// Reply keyboard shown while collecting merge files
#[must_use]
pub fn merge_markup() -> Markup {
    Markup::Buttons(vec![
        DONE_BUTTON.to_string(),
        crate::gateway::control::CANCEL_BUTTON.to_string(),
    ])
}

/// Inline keyboard with a cancel button
#[must_use]
pub fn cancel_inline_markup() -> Markup {
    Markup::Actions(vec![ActionButton {
        text: crate::gateway::control::CANCEL_BUTTON.to_string(),
        data: CANCEL_CALLBACK.to_string(),
    }])
}

/// Inline keyboard linking to support, if a support URL is configured
#[must_use]
pub fn support_markup(support_url: Option<&url::Url>) -> Option<Markup> {
    support_url.map(|url| {
        Markup::Links(vec![LinkButton {
            text: "Support PDF Courier".to_string(),
            url: url.clone(),
        }])
    })
}

/// User-facing text for an error, `None` when the error is not the user's doing
#[must_use]
pub fn error_text(error: &GatewayError) -> Option<String> {
    let text = match error {
        GatewayError::FileTooLarge { limit, .. } => format!(
            "Your file is too large for me to process, the limit is {} MB.",
            limit / (1024 * 1024)
        ),
        GatewayError::UnsupportedMimeType { expected, .. } => match *expected {
            crate::config::PDF_MIME_TYPE => "Your file is not a PDF file.".to_string(),
            _ => "Your file is not a supported image, send me a JPEG image or a photo.".to_string(),
        },
        GatewayError::ImageNotFound => "Send me an image or a photo.".to_string(),
        GatewayError::Processing(e) => processing_error_text(e)?.to_string(),
        _ => return None,
    };
    Some(text)
}

const fn processing_error_text(error: &ProcessingError) -> Option<&'static str> {
    let text = match error {
        ProcessingError::ReadError => "Your PDF file is invalid or damaged.",
        ProcessingError::EncryptError => "Your PDF file is already encrypted.",
        ProcessingError::DecryptError => "Your PDF file is not encrypted or cannot be decrypted.",
        ProcessingError::IncorrectPassword => "The password is incorrect.",
        ProcessingError::NoTextFound => "No text found in your PDF file.",
        ProcessingError::NoImagesFound => "No images found in your PDF file.",
        ProcessingError::Timeout(_) | ProcessingError::Failed(_) | ProcessingError::Io(_) => {
            return None
        }
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IMAGE_MIME_TYPE, MAX_FILESIZE_DOWNLOAD, PDF_MIME_TYPE};

    #[test]
    fn test_validation_errors_have_user_text() {
        let too_large = GatewayError::FileTooLarge {
            size: MAX_FILESIZE_DOWNLOAD + 1,
            limit: MAX_FILESIZE_DOWNLOAD,
        };
        assert_eq!(
            error_text(&too_large).as_deref(),
            Some("Your file is too large for me to process, the limit is 20 MB.")
        );

        let not_pdf = GatewayError::UnsupportedMimeType {
            expected: PDF_MIME_TYPE,
            actual: None,
        };
        assert_eq!(error_text(&not_pdf).as_deref(), Some("Your file is not a PDF file."));

        let not_image = GatewayError::UnsupportedMimeType {
            expected: IMAGE_MIME_TYPE,
            actual: Some("image/png".to_string()),
        };
        assert!(error_text(&not_image).is_some());
        assert!(error_text(&GatewayError::ImageNotFound).is_some());
    }

    #[test]
    fn test_internal_errors_have_no_user_text() {
        let missing = GatewayError::MissingConversationKey {
            key: "pdf_file".to_string(),
        };
        assert_eq!(error_text(&missing), None);

        let failed = GatewayError::Processing(ProcessingError::Failed("crash".to_string()));
        assert_eq!(error_text(&failed), None);
    }

    #[test]
    fn test_processing_errors_are_translated() {
        let wrong_password = GatewayError::Processing(ProcessingError::IncorrectPassword);
        assert_eq!(
            error_text(&wrong_password).as_deref(),
            Some("The password is incorrect.")
        );
    }

    #[test]
    fn test_support_markup() -> Result<(), url::ParseError> {
        assert_eq!(support_markup(None), None);

        let url: url::Url = "https://example.com/support".parse()?;
        let Some(Markup::Links(links)) = support_markup(Some(&url)) else {
            panic!("expected link markup");
        };
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, url);
        Ok(())
    }
}
