use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncWriteExt};

const CHUNK_SIZE: usize = 64 * 1024;

/// One client-submitted file, spooled to a request-owned temp file.
#[derive(Debug)]
pub struct IncomingFile {
    name: String,
    spool: NamedTempFile,
    size: u64,
}

impl IncomingFile {
    /// Streams `reader` into a fresh spool file.
    pub async fn spool<R>(name: String, mut reader: R) -> io::Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let spool = NamedTempFile::new()?;
        let mut out = tokio::fs::File::from_std(spool.reopen()?);
        let size = tokio::io::copy(&mut reader, &mut out).await?;
        out.flush().await?;

        Ok(Self { name, spool, size })
    }

    pub fn from_bytes(name: &str, data: &[u8]) -> io::Result<Self> {
        let mut spool = NamedTempFile::new()?;
        spool.write_all(data)?;
        spool.flush()?;

        Ok(Self {
            name: name.to_string(),
            spool,
            size: data.len() as u64,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// A fresh handle positioned at the start of the content.
    pub fn open(&self) -> io::Result<File> {
        self.spool.reopen()
    }

    pub fn header(&self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(len);
        self.open()?.take(len as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// True when the content is a readable ZIP archive, whatever the name says.
    pub fn is_archive(&self) -> bool {
        match self.open() {
            Ok(file) => zip::ZipArchive::new(file).is_ok(),
            Err(_) => false,
        }
    }

    /// Copies the content to `dest` chunk by chunk.
    pub fn copy_to(&self, dest: &Path) -> io::Result<u64> {
        let mut reader = BufReader::with_capacity(CHUNK_SIZE, self.open()?);
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, File::create(dest)?);
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut written = 0u64;

        loop {
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            writer.write_all(&chunk[..n])?;
            written += n as u64;
        }
        writer.flush()?;

        Ok(written)
    }
}
