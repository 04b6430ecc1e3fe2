//! Media files uploaded for an activity, stored per code under the media root.

use std::path::{Component, Path, PathBuf};

use futures::future::BoxFuture;
use tokio::fs;
use tracing::warn;

/// Collaborator owning the media files referenced by activity content.
pub trait MediaLibrary: Send + Sync {
    fn file_exists(&self, code: u32, name: &str) -> BoxFuture<'static, bool>;
    fn delete_file(&self, code: u32, name: &str) -> BoxFuture<'static, std::io::Result<()>>;
    /// Remove the whole media directory of an activity.
    fn delete_all(&self, code: u32) -> BoxFuture<'static, std::io::Result<()>>;
}

/// Filesystem-backed media library rooted at `config.media_root`.
pub struct FsMediaLibrary {
    root: PathBuf,
}

impl FsMediaLibrary {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn activity_dir(&self, code: u32) -> PathBuf {
        self.root.join(code.to_string())
    }

    /// Resolve a file path, rejecting names that escape the activity directory.
    fn file_path(&self, code: u32, name: &str) -> Option<PathBuf> {
        let candidate = Path::new(name);
        let safe = candidate
            .components()
            .all(|part| matches!(part, Component::Normal(_)));
        if !safe || name.is_empty() {
            warn!(code, name, "rejected suspicious media file name");
            return None;
        }
        Some(self.activity_dir(code).join(candidate))
    }
}

impl MediaLibrary for FsMediaLibrary {
    fn file_exists(&self, code: u32, name: &str) -> BoxFuture<'static, bool> {
        let path = self.file_path(code, name);
        Box::pin(async move {
            match path {
                Some(path) => fs::try_exists(&path).await.unwrap_or(false),
                None => false,
            }
        })
    }

    fn delete_file(&self, code: u32, name: &str) -> BoxFuture<'static, std::io::Result<()>> {
        let path = self.file_path(code, name);
        Box::pin(async move {
            let Some(path) = path else {
                return Ok(());
            };
            match fs::remove_file(&path).await {
                Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
                _ => Ok(()),
            }
        })
    }

    fn delete_all(&self, code: u32) -> BoxFuture<'static, std::io::Result<()>> {
        let dir = self.activity_dir(code);
        Box::pin(async move {
            match fs::remove_dir_all(&dir).await {
                Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
                _ => Ok(()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> (FsMediaLibrary, PathBuf) {
        let root = std::env::temp_dir().join(format!("livepoll-media-{}", uuid::Uuid::new_v4()));
        (FsMediaLibrary::new(root.clone()), root)
    }

    #[tokio::test]
    async fn delete_missing_file_is_not_an_error() {
        let (library, _root) = library();
        library.delete_file(1234567, "gone.png").await.unwrap();
        library.delete_all(1234567).await.unwrap();
    }

    #[tokio::test]
    async fn deletes_existing_files_and_directories() {
        let (library, root) = library();
        let dir = root.join("1234567");
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("banner.png"), b"png").await.unwrap();

        assert!(library.file_exists(1234567, "banner.png").await);
        library.delete_file(1234567, "banner.png").await.unwrap();
        assert!(!library.file_exists(1234567, "banner.png").await);

        fs::write(dir.join("other.png"), b"png").await.unwrap();
        library.delete_all(1234567).await.unwrap();
        assert!(!fs::try_exists(&dir).await.unwrap());

        let _ = fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn path_traversal_names_are_rejected() {
        let (library, _root) = library();
        assert!(!library.file_exists(1234567, "../secret").await);
        library.delete_file(1234567, "../secret").await.unwrap();
    }
}
