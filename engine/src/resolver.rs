//! Fetching output file bytes referenced by build events.

use std::future::Future;

use bep_types::File;
use tokio::fs;
use url::Url;

use crate::error::ResolveError;

/// Turns a file URI from the event stream into its bytes.
///
/// Implementations decide which schemes they support. The session only
/// calls this for files without inline contents.
pub trait ByteStreamResolver: Send + Sync {
    fn fetch(&self, uri: &str) -> impl Future<Output = Result<Vec<u8>, ResolveError>> + Send;
}

/// Reads `file://` URIs from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileUriResolver;

impl ByteStreamResolver for FileUriResolver {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, ResolveError> {
        let url = Url::parse(uri).map_err(|_| ResolveError::InvalidUri {
            uri: uri.to_string(),
        })?;
        if url.scheme() != "file" {
            return Err(ResolveError::UnsupportedScheme {
                uri: uri.to_string(),
                scheme: url.scheme().to_string(),
            });
        }
        let path = url.to_file_path().map_err(|()| ResolveError::InvalidUri {
            uri: uri.to_string(),
        })?;
        fs::read(&path)
            .await
            .map_err(|source| ResolveError::Io { path, source })
    }
}

/// Bytes of `file`: inline contents when present, otherwise fetched by URI.
pub async fn file_contents<R>(file: &File, resolver: &R) -> Result<Vec<u8>, ResolveError>
where
    R: ByteStreamResolver,
{
    if let Some(bytes) = file.inline_contents() {
        return Ok(bytes);
    }
    match &file.uri {
        Some(uri) => resolver.fetch(uri).await,
        None => Err(ResolveError::MissingContent {
            name: file.name.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write as _;

    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_reads_file_uri() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"a.cc:1:1: error: boom\n").unwrap();
        let uri = Url::from_file_path(tmp.path()).unwrap();

        let bytes = FileUriResolver.fetch(uri.as_str()).await.unwrap();
        assert_eq!(bytes, b"a.cc:1:1: error: boom\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let uri = Url::from_file_path(dir.path().join("stderr")).unwrap();

        let err = FileUriResolver.fetch(uri.as_str()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Io { .. }));
    }

    #[tokio::test]
    async fn test_rejects_other_schemes() {
        let err = FileUriResolver
            .fetch("bytestream://remote.example/blobs/abc/12")
            .await
            .unwrap_err();
        assert!(
            matches!(err, ResolveError::UnsupportedScheme { ref scheme, .. } if scheme == "bytestream")
        );
        let err = FileUriResolver.fetch("not a uri").await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidUri { .. }));
    }

    #[tokio::test]
    async fn test_inline_contents_win_over_uri() {
        let file = File::named("stderr")
            .with_uri("bytestream://remote.example/blobs/abc/12")
            .with_contents(b"inline");
        let bytes = file_contents(&file, &FileUriResolver).await.unwrap();
        assert_eq!(bytes, b"inline");
    }

    #[tokio::test]
    async fn test_file_without_source() {
        let err = file_contents(&File::named("stdout"), &FileUriResolver)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::MissingContent { ref name } if name == "stdout"));
    }
}
