//! File reading
//!
//! Files are decoded as UTF-8. Anything else is reported as a decode error
//! rather than lossily converted.

use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::sandbox::ResolvedPath;
use crate::types::{FsError, FsResult};

/// Read a whole file as UTF-8 text, refusing files over `max_bytes`
///
/// Only regular files are opened; pipes, sockets and devices could block
/// or never end.
pub async fn read(path: &ResolvedPath, max_bytes: u64) -> FsResult<String> {
    let io_err = |e: std::io::Error| FsError::from_io(&e, path.relative());

    let metadata = fs::metadata(path.as_path()).await.map_err(io_err)?;

    if metadata.is_dir() {
        return Err(FsError::IsADirectory(path.relative().to_string()));
    }
    if !metadata.is_file() {
        return Err(FsError::NotAFile(path.relative().to_string()));
    }

    if metadata.len() > max_bytes {
        return Err(FsError::TooLarge {
            size: metadata.len(),
            max: max_bytes,
        });
    }

    // One byte past the limit is enough to tell the file has grown
    let file = fs::File::open(path.as_path()).await.map_err(io_err)?;
    let mut limited = file.take(max_bytes.saturating_add(1));
    let mut bytes = Vec::with_capacity(metadata.len() as usize);
    limited.read_to_end(&mut bytes).await.map_err(io_err)?;

    if bytes.len() as u64 > max_bytes {
        let size = match limited.get_ref().metadata().await {
            Ok(current) => current.len(),
            Err(_) => bytes.len() as u64,
        };
        return Err(FsError::TooLarge {
            size,
            max: max_bytes,
        });
    }

    String::from_utf8(bytes).map_err(|_| FsError::DecodeError(path.relative().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::Sandbox;
    use std::fs as stdfs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Sandbox) {
        let dir = TempDir::new().unwrap();
        stdfs::create_dir(dir.path().join("sub")).unwrap();
        stdfs::write(dir.path().join("hello.txt"), "héllo wörld\n").unwrap();
        stdfs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x81]).unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        (dir, sandbox)
    }

    #[tokio::test]
    async fn test_read_utf8() {
        let (_dir, sandbox) = setup();
        let path = sandbox.resolve("hello.txt").unwrap();
        assert_eq!(read(&path, 1024).await.unwrap(), "héllo wörld\n");
    }

    #[tokio::test]
    async fn test_binary_is_decode_error() {
        let (_dir, sandbox) = setup();
        let path = sandbox.resolve("blob.bin").unwrap();
        assert!(matches!(
            read(&path, 1024).await,
            Err(FsError::DecodeError(p)) if p == "blob.bin"
        ));
    }

    #[tokio::test]
    async fn test_directory_is_rejected() {
        let (_dir, sandbox) = setup();
        let path = sandbox.resolve("sub").unwrap();
        assert!(matches!(
            read(&path, 1024).await,
            Err(FsError::IsADirectory(_))
        ));
    }

    #[tokio::test]
    async fn test_size_guard() {
        let (_dir, sandbox) = setup();
        let path = sandbox.resolve("hello.txt").unwrap();
        assert!(matches!(
            read(&path, 4).await,
            Err(FsError::TooLarge { max: 4, .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fifo_is_rejected_without_blocking() {
        let (dir, sandbox) = setup();
        let status = std::process::Command::new("mkfifo")
            .arg(dir.path().join("pipe"))
            .status()
            .unwrap();
        assert!(status.success());

        let path = sandbox.resolve("pipe").unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(2), read(&path, 1024))
            .await
            .expect("read of a fifo must not block");
        assert!(matches!(result, Err(FsError::NotAFile(p)) if p == "pipe"));
    }

    #[tokio::test]
    async fn test_exact_limit_is_allowed() {
        let (dir, sandbox) = setup();
        stdfs::write(dir.path().join("five"), "12345").unwrap();
        let path = sandbox.resolve("five").unwrap();
        assert_eq!(read(&path, 5).await.unwrap(), "12345");
    }

    #[tokio::test]
    async fn test_empty_file() {
        let (dir, sandbox) = setup();
        stdfs::write(dir.path().join("empty"), "").unwrap();
        let path = sandbox.resolve("empty").unwrap();
        assert_eq!(read(&path, 0).await.unwrap(), "");
    }
}
