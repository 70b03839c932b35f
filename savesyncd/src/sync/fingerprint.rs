use std::io;
use std::path::Path;

use md5::Context;
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

/// Lowercase hex MD5 of the file's bytes, read in fixed-size chunks.
///
/// MD5 matches the checksum the backend reports for stored objects, so the
/// two can be compared directly.
pub async fn fingerprint(path: &Path) -> io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut ctx = Context::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        ctx.consume(&buf[..read]);
    }
    Ok(format!("{:x}", ctx.compute()))
}
