use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewdefError {
    #[error("reading viewdef directory {0:?}: {1}")]
    ReadDir(std::path::PathBuf, std::io::Error),
    #[error("reading viewdef file {0:?}: {1}")]
    ReadFile(std::path::PathBuf, std::io::Error),
    #[error("starting filesystem watcher: {0}")]
    Watch(#[from] notify::Error),
}
