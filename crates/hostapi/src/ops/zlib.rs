use std::io::{Read, Write};

use base64::Engine as _;
use deno_core::{anyhow::anyhow, anyhow::Error as AnyError, op, OpState};
use flate2::read::GzDecoder;
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn inflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = flate2::read::DeflateDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

fn brotli_compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let params = brotli::enc::BrotliEncoderParams::default();
    brotli::BrotliCompress(&mut std::io::Cursor::new(data), &mut out, &params).expect("in-memory brotli encode");
    out
}

fn brotli_decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    brotli::BrotliDecompress(&mut std::io::Cursor::new(data), &mut out)?;
    Ok(out)
}

/// `zlib.transform(op, data_base64) -> base64` (§4.5 `zlib` module): one op
/// covers gzip/gunzip/deflate/inflate/brotliCompress/brotliDecompress.
#[op]
pub fn op_zlib_transform(_state: &mut OpState, operation: String, data_base64: String) -> Result<String, AnyError> {
    let data = base64::engine::general_purpose::STANDARD.decode(&data_base64)?;
    let out = match operation.as_str() {
        "gzip" => gzip(&data)?,
        "gunzip" => gunzip(&data)?,
        "deflate" => deflate(&data)?,
        "inflate" => inflate(&data)?,
        "brotliCompress" => brotli_compress(&data),
        "brotliDecompress" => brotli_decompress(&data)?,
        other => return Err(anyhow!("unsupported zlib operation: {other}")),
    };
    Ok(base64::engine::general_purpose::STANDARD.encode(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_round_trips() {
        let compressed = gzip(b"hello gzip").unwrap();
        assert_eq!(gunzip(&compressed).unwrap(), b"hello gzip");
    }

    #[test]
    fn deflate_round_trips() {
        let compressed = deflate(b"hello deflate").unwrap();
        assert_eq!(inflate(&compressed).unwrap(), b"hello deflate");
    }

    #[test]
    fn brotli_round_trips() {
        let compressed = brotli_compress(b"hello brotli");
        assert_eq!(brotli_decompress(&compressed).unwrap(), b"hello brotli");
    }
}
