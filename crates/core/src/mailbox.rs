//! Reading newsletters out of a directory of saved `.eml` files.
//!
//! The newest message is staged aside while it is read. A [`StagedMessage`]
//! puts the file back where it came from when dropped, so a failed run never
//! loses a message; call [`StagedMessage::consume`] once the message has been
//! fully handled to delete it instead.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use mail_parser::{MessageParser, PartType};
use tracing::{debug, warn};

use crate::{DigestorError, Result};

/// Returns the most recently modified `.eml` file in `dir`.
///
/// Ties are broken by file name so the choice is deterministic.
pub fn latest_message(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(DigestorError::FileNotFound(dir.to_path_buf()));
    }

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_eml = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("eml"));
        if !is_eml || !path.is_file() {
            continue;
        }

        let modified = fs::metadata(&path)?.modified()?;
        let newer = match &newest {
            None => true,
            Some((time, current)) => modified > *time || (modified == *time && path > *current),
        };
        if newer {
            newest = Some((modified, path));
        }
    }

    newest.map(|(_, path)| path).ok_or_else(|| DigestorError::MailboxEmpty(dir.to_path_buf()))
}

/// A message moved out of its inbox while it is being processed.
#[derive(Debug)]
pub struct StagedMessage {
    original: PathBuf,
    staged: PathBuf,
    consumed: bool,
}

impl StagedMessage {
    /// Moves `source` into `staging_dir`, keeping its file name.
    pub fn stage(source: impl AsRef<Path>, staging_dir: impl AsRef<Path>) -> Result<Self> {
        let original = source.as_ref().to_path_buf();
        let file_name = original
            .file_name()
            .ok_or_else(|| DigestorError::MailError(format!("not a file: {}", original.display())))?;

        fs::create_dir_all(staging_dir.as_ref())?;
        let staged = staging_dir.as_ref().join(file_name);
        move_file(&original, &staged)?;
        debug!(from = %original.display(), to = %staged.display(), "staged message");

        Ok(Self { original, staged, consumed: false })
    }

    /// Where the message came from.
    pub fn original_path(&self) -> &Path {
        &self.original
    }

    /// Where the message currently lives.
    pub fn path(&self) -> &Path {
        &self.staged
    }

    /// Reads the staged message.
    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.staged)?)
    }

    /// Deletes the staged file; it will not be restored.
    pub fn consume(mut self) -> Result<()> {
        self.consumed = true;
        fs::remove_file(&self.staged)?;
        Ok(())
    }
}

impl Drop for StagedMessage {
    fn drop(&mut self) {
        if self.consumed {
            return;
        }
        if let Err(err) = move_file(&self.staged, &self.original) {
            warn!(path = %self.staged.display(), error = %err, "could not restore staged message");
        }
    }
}

/// Moves a file, copying it when source and target sit on different filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    move_file_with(from, to, |from, to| fs::rename(from, to))
}

fn move_file_with(from: &Path, to: &Path, rename: impl FnOnce(&Path, &Path) -> io::Result<()>) -> io::Result<()> {
    match rename(from, to) {
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            debug!(from = %from.display(), to = %to.display(), "rename crosses filesystems, copying");
            if let Err(err) = fs::copy(from, to) {
                let _ = fs::remove_file(to);
                return Err(err);
            }
            fs::remove_file(from)
        }
        other => other,
    }
}

/// Header fields and HTML body of one parsed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailContent {
    pub subject: Option<String>,
    pub html: String,
}

/// Parses raw RFC 5322 bytes and returns the first `text/html` body part.
///
/// # Errors
///
/// [`DigestorError::MailError`] when the bytes are not a message or the
/// message carries no HTML part.
pub fn parse_message(bytes: &[u8]) -> Result<MailContent> {
    let message = MessageParser::default()
        .parse(bytes)
        .ok_or_else(|| DigestorError::MailError("input is not an email message".to_string()))?;

    let html = match message.html_part(0).map(|part| &part.body) {
        Some(PartType::Html(html)) => html.to_string(),
        _ => return Err(DigestorError::MailError("message has no text/html part".to_string())),
    };

    Ok(MailContent { subject: message.subject().map(str::to_string), html })
}

/// Extracts the HTML body of a raw message.
pub fn html_body(bytes: &[u8]) -> Result<String> {
    parse_message(bytes).map(|content| content.html)
}

/// Stages the newest message in `inbox` and reads its HTML body.
///
/// The returned guard still owns the file; consume it after the newsletter
/// has been processed.
pub fn load_latest_html(inbox: impl AsRef<Path>, staging_dir: impl AsRef<Path>) -> Result<(StagedMessage, MailContent)> {
    let latest = latest_message(inbox)?;
    let staged = StagedMessage::stage(&latest, staging_dir)?;
    let content = parse_message(&staged.read()?)?;
    debug!(subject = ?content.subject, "loaded newsletter");

    Ok((staged, content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MESSAGE: &str = "From: TLDR <dan@tldrnewsletter.com>\r\n\
To: reader@example.com\r\n\
Subject: TLDR InfoSec\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Plain text version\r\n\
--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body><h1>Miscellaneous</h1></body></html>\r\n\
--b1--\r\n";

    const PLAIN_ONLY: &str = "From: a@example.com\r\nSubject: Hi\r\nContent-Type: text/plain\r\n\r\nJust text\r\n";

    fn write_eml(dir: &Path, name: &str, body: &str, age: Duration) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
        path
    }

    #[test]
    fn test_latest_message_picks_newest() {
        let inbox = tempfile::tempdir().unwrap();
        write_eml(inbox.path(), "old.eml", MESSAGE, Duration::from_secs(600));
        let newest = write_eml(inbox.path(), "new.eml", MESSAGE, Duration::from_secs(10));
        write_eml(inbox.path(), "notes.txt", "ignored", Duration::ZERO);

        assert_eq!(latest_message(inbox.path()).unwrap(), newest);
    }

    #[test]
    fn test_latest_message_empty_inbox() {
        let inbox = tempfile::tempdir().unwrap();
        assert!(matches!(latest_message(inbox.path()), Err(DigestorError::MailboxEmpty(_))));
    }

    #[test]
    fn test_latest_message_missing_dir() {
        assert!(matches!(latest_message("/nonexistent/inbox"), Err(DigestorError::FileNotFound(_))));
    }

    #[test]
    fn test_html_body_multipart() {
        let html = html_body(MESSAGE.as_bytes()).unwrap();
        assert!(html.contains("<h1>Miscellaneous</h1>"));
    }

    #[test]
    fn test_parse_message_subject() {
        let content = parse_message(MESSAGE.as_bytes()).unwrap();
        assert_eq!(content.subject.as_deref(), Some("TLDR InfoSec"));
    }

    #[test]
    fn test_html_body_plain_only_fails() {
        assert!(matches!(html_body(PLAIN_ONLY.as_bytes()), Err(DigestorError::MailError(_))));
    }

    #[test]
    fn test_staged_message_restored_on_drop() {
        let inbox = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let source = write_eml(inbox.path(), "issue.eml", MESSAGE, Duration::ZERO);

        {
            let staged = StagedMessage::stage(&source, staging.path()).unwrap();
            assert!(!source.exists());
            assert!(staged.path().exists());
        }

        assert!(source.exists());
    }

    #[test]
    fn test_staged_message_consumed() {
        let inbox = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let source = write_eml(inbox.path(), "issue.eml", MESSAGE, Duration::ZERO);

        let staged = StagedMessage::stage(&source, staging.path()).unwrap();
        let staged_path = staged.path().to_path_buf();
        staged.consume().unwrap();

        assert!(!source.exists());
        assert!(!staged_path.exists());
    }

    #[test]
    fn test_move_falls_back_to_copy_across_filesystems() {
        let inbox = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let source = write_eml(inbox.path(), "issue.eml", MESSAGE, Duration::ZERO);
        let target = staging.path().join("issue.eml");

        let cross_device = |_: &Path, _: &Path| Err(io::Error::from(io::ErrorKind::CrossesDevices));
        move_file_with(&source, &target, cross_device).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&target).unwrap(), MESSAGE);
    }

    #[test]
    fn test_move_keeps_other_rename_errors() {
        let inbox = tempfile::tempdir().unwrap();
        let source = write_eml(inbox.path(), "issue.eml", MESSAGE, Duration::ZERO);

        let denied = |_: &Path, _: &Path| Err(io::Error::from(io::ErrorKind::PermissionDenied));
        let err = move_file_with(&source, &inbox.path().join("moved.eml"), denied).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(source.exists());
    }

    #[test]
    fn test_stage_and_restore_between_separate_trees() {
        // The crate directory and the system temp dir are often different filesystems.
        let inbox = tempfile::tempdir_in(env!("CARGO_MANIFEST_DIR")).unwrap();
        let staging = tempfile::tempdir().unwrap();
        let source = write_eml(inbox.path(), "issue.eml", MESSAGE, Duration::ZERO);

        {
            let staged = StagedMessage::stage(&source, staging.path().join("digestor-staging")).unwrap();
            assert!(!source.exists());
            assert_eq!(staged.read().unwrap(), MESSAGE.as_bytes());
        }

        assert_eq!(fs::read_to_string(&source).unwrap(), MESSAGE);
    }

    #[test]
    fn test_load_latest_html() {
        let inbox = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let source = write_eml(inbox.path(), "issue.eml", MESSAGE, Duration::ZERO);

        let (staged, content) = load_latest_html(inbox.path(), staging.path()).unwrap();
        assert!(content.html.contains("Miscellaneous"));
        assert_eq!(staged.original_path(), source);

        drop(staged);
        assert!(source.exists());
    }

    #[test]
    fn test_load_latest_html_restores_unparseable_message() {
        let inbox = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let source = write_eml(inbox.path(), "plain.eml", PLAIN_ONLY, Duration::ZERO);

        assert!(load_latest_html(inbox.path(), staging.path()).is_err());
        assert!(source.exists());
    }
}
