//! Whole-file and chunked transfers against the remote store

use bytes::{Bytes, BytesMut};

use common::remote::{RemoteError, RemoteStore, CHUNK_SIZE};

/// Fetch the content of `path`, chunked when `size` exceeds `threshold`.
pub async fn fetch(
    remote: &dyn RemoteStore,
    path: &str,
    size: u64,
    threshold: u64,
) -> Result<Bytes, RemoteError> {
    if size <= threshold {
        return remote.get_file(path).await;
    }

    tracing::info!(path, size, "fetching in chunks");
    let mut buf = BytesMut::with_capacity(size as usize);
    let mut offset = 0u64;
    while offset < size {
        let chunk = remote.get_file_chunk(path, offset).await?;
        if chunk.is_empty() {
            tracing::warn!(path, offset, size, "file shrank during chunked fetch");
            break;
        }
        offset += chunk.len() as u64;
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Upload `data` as the new content of `path` and return the new version.
pub async fn upload(
    remote: &dyn RemoteStore,
    path: &str,
    data: Bytes,
    threshold: u64,
) -> Result<u64, RemoteError> {
    let size = data.len() as u64;
    if size <= threshold {
        return remote.upload_file(path, data).await;
    }

    tracing::info!(path, size, "uploading in chunks");
    let mut offset = 0u64;
    loop {
        let end = (offset + CHUNK_SIZE).min(size);
        let finished = end == size;
        let chunk = data.slice(offset as usize..end as usize);
        if let Some(version) = remote
            .upload_file_chunk(path, chunk, offset, finished)
            .await?
        {
            return Ok(version);
        }
        if finished {
            return Err(RemoteError::Server(format!(
                "no version returned for final chunk of {}",
                path
            )));
        }
        offset = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use server::MasterStore;
    use tempfile::TempDir;

    fn payload(len: usize) -> Bytes {
        Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_chunked_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = MasterStore::open(dir.path()).await.unwrap();
        let data = payload(CHUNK_SIZE as usize * 2 + 17);

        let version = upload(&store, "big", data.clone(), 1000).await.unwrap();
        assert_eq!(store.info("big").await.unwrap().version, version);

        let fetched = fetch(&store, "big", data.len() as u64, 1000).await.unwrap();
        assert_eq!(fetched, data);
    }

    #[tokio::test]
    async fn test_small_files_go_whole() {
        let dir = TempDir::new().unwrap();
        let store = MasterStore::open(dir.path()).await.unwrap();
        let data = payload(100);

        upload(&store, "small", data.clone(), 1000).await.unwrap();
        let fetched = fetch(&store, "small", 100, 1000).await.unwrap();
        assert_eq!(fetched, data);
    }

    #[tokio::test]
    async fn test_chunked_upload_of_exact_multiple() {
        let dir = TempDir::new().unwrap();
        let store = MasterStore::open(dir.path()).await.unwrap();
        let data = payload(CHUNK_SIZE as usize * 2);

        upload(&store, "even", data.clone(), 10).await.unwrap();
        let fetched = fetch(&store, "even", data.len() as u64, 10).await.unwrap();
        assert_eq!(fetched.len(), data.len());
        assert_eq!(fetched, data);
    }
}
