//! Random-access view of a remote firmware archive.
//!
//! [`RangeReader`] implements `Read + Seek` over HTTP range requests so a
//! structural parser can walk a multi-gigabyte archive (zip central
//! directory first, then individual members) without downloading it. The
//! parser itself lives outside this crate behind [`ArchiveParser`].

use std::io::{self, Read, Seek, SeekFrom};

use log::debug;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::StatusCode;

use crate::error::{FwError, Result};
use crate::model::Firmware;
use crate::transport::HttpTransport;

pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Consumer of a byte-range-readable archive, e.g. an IPSW parser.
pub trait ArchiveParser {
    type Image;

    fn parse(&self, reader: &mut dyn ReadSeek) -> Result<Self::Image>;
}

/// Seekable reader over a remote file, fetching one block per miss.
pub struct RangeReader<'a> {
    http:      &'a Client,
    url:       String,
    len:       u64,
    pos:       u64,
    chunk:     usize,
    buf:       Vec<u8>,
    buf_start: u64,
}

impl std::fmt::Debug for RangeReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeReader")
            .field("url", &self.url)
            .field("len", &self.len)
            .field("pos", &self.pos)
            .finish()
    }
}

impl<'a> RangeReader<'a> {
    /// Open `url` on the transport's session; the length comes from a HEAD
    /// request.
    pub fn open(transport: &'a HttpTransport, url: &str, chunk: usize) -> Result<Self> {
        if chunk == 0 {
            return Err(FwError::Usage("range chunk must be greater than zero".into()));
        }
        let http = transport.http();
        debug!("HEAD {url}");
        let resp = http.head(url).send()?.error_for_status()?;
        let len = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| FwError::Decode(format!("{url}: no Content-Length")))?;
        debug!("{url}: {len} bytes");
        Ok(Self {
            http,
            url: url.to_string(),
            len,
            pos: 0,
            chunk,
            buf: Vec::new(),
            buf_start: 0,
        })
    }

    /// Total archive size in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn fetch_block(&mut self) -> Result<()> {
        let Some(range) = range_header(self.pos, self.chunk, self.len) else {
            self.buf.clear();
            return Ok(());
        };
        debug!("GET {} {range}", self.url);
        let resp = self
            .http
            .get(&self.url)
            .header(RANGE, &range)
            .send()?
            .error_for_status()?;
        if resp.status() != StatusCode::PARTIAL_CONTENT {
            return Err(FwError::Decode(format!(
                "{}: range request answered with {}",
                self.url,
                resp.status()
            )));
        }
        self.buf = resp.bytes()?.to_vec();
        self.buf_start = self.pos;
        Ok(())
    }

    fn buffered(&self) -> bool {
        self.pos >= self.buf_start && self.pos < self.buf_start + self.buf.len() as u64
    }
}

impl Read for RangeReader<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() || self.pos >= self.len {
            return Ok(0);
        }
        if !self.buffered() {
            self.fetch_block().map_err(io::Error::other)?;
            if self.buf.is_empty() {
                return Ok(0);
            }
        }
        let offset = (self.pos - self.buf_start) as usize;
        let n = out.len().min(self.buf.len() - offset);
        out[..n].copy_from_slice(&self.buf[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for RangeReader<'_> {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        self.pos = seek_target(self.pos, self.len, from)?;
        Ok(self.pos)
    }
}

/// `Range` header value for the block starting at `start`, or `None` at EOF.
fn range_header(start: u64, chunk: usize, len: u64) -> Option<String> {
    if start >= len {
        return None;
    }
    let end = start.saturating_add(chunk as u64).min(len) - 1;
    Some(format!("bytes={start}-{end}"))
}

fn seek_target(pos: u64, len: u64, from: SeekFrom) -> io::Result<u64> {
    let target = match from {
        SeekFrom::Start(n) => Some(n),
        SeekFrom::End(d) => len.checked_add_signed(d),
        SeekFrom::Current(d) => pos.checked_add_signed(d),
    };
    target.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "seek before start of archive")
    })
}

/// Open the archive of `firmware` for ranged reads.
pub fn open_archive<'a>(
    transport: &'a HttpTransport,
    firmware:  &Firmware,
    chunk:     usize,
) -> Result<RangeReader<'a>> {
    RangeReader::open(transport, firmware.url(), chunk)
}

/// Hand the archive of `firmware` to `parser`.
pub fn parse_archive<P: ArchiveParser>(
    parser:    &P,
    transport: &HttpTransport,
    firmware:  &Firmware,
    chunk:     usize,
) -> Result<P::Image> {
    let mut reader = open_archive(transport, firmware, chunk)?;
    parser.parse(&mut reader)
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Cursor, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::model::{fixtures, FirmwareRecord};

    const EOCD: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

    /// 100 bytes: a counting prefix, then an end-of-central-directory record.
    fn archive_bytes() -> Vec<u8> {
        let mut data: Vec<u8> = (0..78u8).collect();
        data.extend_from_slice(&EOCD);
        data.extend_from_slice(&[0u8; 18]);
        data
    }

    /// Serve `data` over HTTP on loopback; HEAD reports the length, a GET
    /// with `Range` gets 206 unless `honor_range` is false.
    fn serve(data: Vec<u8>, honor_range: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let data = Arc::new(data);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let data = Arc::clone(&data);
                thread::spawn(move || answer(stream, &data, honor_range));
            }
        });
        format!("http://{addr}/iPhone14,7_16.1_20B82_Restore.ipsw")
    }

    fn answer(stream: TcpStream, data: &[u8], honor_range: bool) {
        let Ok(read_half) = stream.try_clone() else { return };
        let mut reader = BufReader::new(read_half);
        let mut out = stream;
        loop {
            let mut request = String::new();
            if reader.read_line(&mut request).unwrap_or(0) == 0 {
                return;
            }
            let mut range = None;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    return;
                }
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((key, val)) = line.split_once(':') {
                    if key.eq_ignore_ascii_case("range") {
                        range = val
                            .trim()
                            .strip_prefix("bytes=")
                            .and_then(|r| r.split_once('-'))
                            .and_then(|(a, b)| Some((a.parse::<usize>().ok()?, b.parse::<usize>().ok()?)));
                    }
                }
            }

            let (status, body, extra) = match range {
                Some((a, b)) if honor_range => (
                    "206 Partial Content",
                    &data[a..=b],
                    format!("Content-Range: bytes {a}-{b}/{}\r\n", data.len()),
                ),
                _ => ("200 OK", data, String::new()),
            };
            let header = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\n{extra}\r\n",
                body.len()
            );
            if out.write_all(header.as_bytes()).is_err() {
                return;
            }
            if !request.starts_with("HEAD") && out.write_all(body).is_err() {
                return;
            }
        }
    }

    fn loopback() -> HttpTransport {
        let http = Client::builder().no_proxy().build().unwrap();
        HttpTransport::with_client(http)
    }

    fn firmware_at(url: &str) -> Firmware {
        let mut v = fixtures::firmware("iPhone14,7", "16.1", "20B82");
        v["url"] = serde_json::Value::String(url.to_string());
        let rec: FirmwareRecord = serde_json::from_value(v).unwrap();
        Firmware::from_record(rec, "iPhone14,7").unwrap()
    }

    #[test]
    fn range_blocks() {
        assert_eq!(range_header(0, 1024, 10_000).as_deref(), Some("bytes=0-1023"));
        assert_eq!(range_header(9_500, 1024, 10_000).as_deref(), Some("bytes=9500-9999"));
        assert_eq!(range_header(10_000, 1024, 10_000), None);
    }

    #[test]
    fn seek_math() {
        assert_eq!(seek_target(5, 100, SeekFrom::Start(42)).unwrap(), 42);
        assert_eq!(seek_target(5, 100, SeekFrom::End(-22)).unwrap(), 78);
        assert_eq!(seek_target(5, 100, SeekFrom::Current(10)).unwrap(), 15);
        assert_eq!(seek_target(5, 100, SeekFrom::End(10)).unwrap(), 110);
        assert!(seek_target(5, 100, SeekFrom::Current(-6)).is_err());
    }

    /// Reads the zip end-of-central-directory signature from the tail.
    struct EocdSignature;

    impl ArchiveParser for EocdSignature {
        type Image = bool;

        fn parse(&self, reader: &mut dyn ReadSeek) -> Result<bool> {
            let mut sig = [0u8; 4];
            reader.seek(SeekFrom::End(-22))?;
            reader.read_exact(&mut sig)?;
            Ok(sig == [0x50, 0x4b, 0x05, 0x06])
        }
    }

    #[test]
    fn parser_sees_read_seek() {
        let mut data = vec![0u8; 64];
        data.extend_from_slice(&[0x50, 0x4b, 0x05, 0x06]);
        data.extend_from_slice(&[0u8; 18]);
        assert!(EocdSignature.parse(&mut Cursor::new(data)).unwrap());
    }

    #[test]
    fn reads_across_block_boundaries() {
        let data = archive_bytes();
        let url = serve(data.clone(), true);
        let http = loopback();

        let mut reader = RangeReader::open(&http, &url, 7).unwrap();
        assert_eq!(reader.len(), 100);

        let mut all = Vec::new();
        reader.read_to_end(&mut all).unwrap();
        assert_eq!(all, data);

        let mut sig = [0u8; 4];
        reader.seek(SeekFrom::End(-22)).unwrap();
        reader.read_exact(&mut sig).unwrap();
        assert_eq!(sig, EOCD);

        // Backwards seek lands outside the buffered block.
        let mut head = [0u8; 10];
        reader.seek(SeekFrom::Start(3)).unwrap();
        reader.read_exact(&mut head).unwrap();
        assert_eq!(&head[..], &data[3..13]);
    }

    #[test]
    fn parse_archive_hands_reader_to_parser() {
        let url = serve(archive_bytes(), true);
        let http = loopback();
        let fw = firmware_at(&url);
        assert!(parse_archive(&EocdSignature, &http, &fw, 16).unwrap());
    }

    #[test]
    fn full_response_to_range_request_is_rejected() {
        let url = serve(archive_bytes(), false);
        let http = loopback();
        let fw = firmware_at(&url);

        let reader = open_archive(&http, &fw, 16).unwrap();
        assert_eq!(reader.len(), 100);

        let err = parse_archive(&EocdSignature, &http, &fw, 16).unwrap_err();
        assert!(matches!(err, FwError::Io(_)), "{err:?}");
        assert!(err.to_string().contains("200"), "{err}");
    }

    #[test]
    fn zero_chunk_is_usage_error() {
        let http = loopback();
        let err = RangeReader::open(&http, "http://127.0.0.1:9/x", 0).unwrap_err();
        assert!(matches!(err, FwError::Usage(_)));
    }
}
