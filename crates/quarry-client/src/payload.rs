//! Response payload handling: decompression and parser dispatch.

use std::io;

use async_compression::tokio::bufread::{BrotliDecoder, BzDecoder, GzipDecoder, XzDecoder};
use jiff::Timestamp;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use quarry_parse::ParserRegistry;
use quarry_types::{Compression, ParsingConfig, RepositoryInfo, RepositoryPackage};

use crate::Error;

/// Decompress a response body per the configured compression, falling back
/// to the `Content-Encoding` header when the configuration says `none`.
///
/// Some mirrors advertise compression on plain payloads: when decompression
/// fails but the bytes are valid UTF-8, the content is treated as already
/// decompressed instead of surfacing an error.
pub(crate) async fn decompress(
    repository: &str,
    compression: Compression,
    content_encoding: Option<&str>,
    body: &[u8],
) -> Result<Vec<u8>, Error> {
    let effective = match compression {
        Compression::None => detect(content_encoding),
        configured => configured,
    };

    let result = match effective {
        Compression::None => return Ok(body.to_vec()),
        Compression::Gzip => read_all(GzipDecoder::new(body)).await,
        Compression::Bzip2 => read_all(BzDecoder::new(body)).await,
        Compression::Xz => read_all(XzDecoder::new(body)).await,
        Compression::Brotli => read_all(BrotliDecoder::new(body)).await,
    };

    match result {
        Ok(decompressed) => Ok(decompressed),
        Err(source) => {
            if std::str::from_utf8(body).is_ok() {
                debug!("Content appears to be already decompressed despite {effective:?} config");
                Ok(body.to_vec())
            } else {
                Err(Error::Decompress {
                    repository: repository.to_string(),
                    source,
                })
            }
        }
    }
}

fn detect(content_encoding: Option<&str>) -> Compression {
    match content_encoding.map(str::to_lowercase).as_deref() {
        Some("gzip") => Compression::Gzip,
        Some("bzip2" | "bz2") => Compression::Bzip2,
        Some("xz") => Compression::Xz,
        Some("br" | "brotli") => Compression::Brotli,
        _ => Compression::None,
    }
}

async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> io::Result<Vec<u8>> {
    let mut decompressed = Vec::new();
    reader.read_to_end(&mut decompressed).await?;
    Ok(decompressed)
}

/// Decompress, decode, and parse a response body into normalized packages,
/// stamping each with the fetch time.
pub(crate) async fn parse_payload(
    repository: &RepositoryInfo,
    parsing: &ParsingConfig,
    parsers: &ParserRegistry,
    body: &[u8],
    content_encoding: Option<&str>,
) -> Result<Vec<RepositoryPackage>, Error> {
    let bytes = decompress(&repository.name, parsing.compression, content_encoding, body).await?;
    // Only UTF-8 payloads are supported; invalid sequences are dropped
    // rather than failing the document.
    let text = String::from_utf8_lossy(&bytes);

    let parser = parsers
        .get(&parsing.format)
        .ok_or_else(|| Error::UnknownFormat {
            repository: repository.name.clone(),
            format: parsing.format.clone(),
        })?;
    let mut packages = parser(&text, parsing, repository).map_err(|source| Error::Parse {
        repository: repository.name.clone(),
        source,
    })?;

    let now = Timestamp::now();
    for package in &mut packages {
        package.last_updated = Some(now);
    }
    Ok(packages)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression as GzLevel;
    use flate2::write::GzEncoder;

    use super::*;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), GzLevel::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[tokio::test]
    async fn gzip_round_trip() {
        let body = gzip(b"Package: nginx\n");
        let out = decompress("r", Compression::Gzip, None, &body).await.unwrap();
        assert_eq!(out, b"Package: nginx\n");
    }

    #[tokio::test]
    async fn content_encoding_is_auto_detected() {
        let body = gzip(b"hello");
        let out = decompress("r", Compression::None, Some("gzip"), &body)
            .await
            .unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn plain_utf8_passes_through_despite_gzip_config() {
        let body = b"Package: nginx\nVersion: 1.24.0\n";
        let out = decompress("r", Compression::Gzip, None, body).await.unwrap();
        assert_eq!(out, body);
    }

    #[tokio::test]
    async fn binary_garbage_with_gzip_config_is_an_error() {
        let body = [0x1f, 0x8b, 0xff, 0x00, 0x80, 0xfe];
        let result = decompress("r", Compression::Gzip, None, &body).await;
        assert!(matches!(result, Err(Error::Decompress { .. })));
    }

    #[tokio::test]
    async fn none_compression_is_a_passthrough() {
        let out = decompress("r", Compression::None, None, b"plain")
            .await
            .unwrap();
        assert_eq!(out, b"plain");
    }
}
