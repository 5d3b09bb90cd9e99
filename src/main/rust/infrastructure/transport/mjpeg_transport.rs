use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use crate::domain::errors::{Result, WatchdogError};
use crate::domain::ports::{StreamTransport, TransportEvent};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Start of a JPEG image, used when the relay omits a multipart boundary
const JPEG_SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// MJPEG-over-HTTP transport.
///
/// Each `start` supersedes the previous connection: the reader task is
/// aborted and a generation counter fences out any late events it might
/// otherwise deliver. Frame arrival is detected by scanning the byte stream
/// for multipart part boundaries, so no image decoding happens here.
pub struct MjpegTransport {
    client: reqwest::Client,
    events: mpsc::Sender<TransportEvent>,
    stall_window: Duration,
    generation: Arc<AtomicU64>,
    last_frame: Arc<Mutex<Option<Instant>>>,
    reader: Option<JoinHandle<()>>,
}

impl MjpegTransport {
    pub fn new(events: mpsc::Sender<TransportEvent>, stall_window: Duration) -> Result<Self> {
        // No overall request timeout: the body is an endless stream
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| WatchdogError::TransportStartFailed(e.to_string()))?;

        Ok(Self {
            client,
            events,
            stall_window,
            generation: Arc::new(AtomicU64::new(0)),
            last_frame: Arc::new(Mutex::new(None)),
            reader: None,
        })
    }

    fn halt_reader(&mut self) {
        if let Some(handle) = self.reader.take() {
            handle.abort();
        }
    }
}

impl StreamTransport for MjpegTransport {
    fn start(&mut self, url: Url) -> Result<()> {
        self.halt_reader();
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_frame.lock().unwrap() = None;

        let reader = Reader {
            client: self.client.clone(),
            events: self.events.clone(),
            generation: self.generation.clone(),
            my_generation,
            last_frame: self.last_frame.clone(),
        };
        self.reader = Some(tokio::spawn(reader.run(url)));
        Ok(())
    }

    fn stop(&mut self) {
        // Bump the generation so an already-aborting reader stays silent
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.halt_reader();
        *self.last_frame.lock().unwrap() = None;
    }

    fn is_producing_frames(&self) -> bool {
        self.last_frame
            .lock()
            .unwrap()
            .map(|at| at.elapsed() <= self.stall_window)
            .unwrap_or(false)
    }
}

impl Drop for MjpegTransport {
    fn drop(&mut self) {
        self.halt_reader();
    }
}

struct Reader {
    client: reqwest::Client,
    events: mpsc::Sender<TransportEvent>,
    generation: Arc<AtomicU64>,
    my_generation: u64,
    last_frame: Arc<Mutex<Option<Instant>>>,
}

impl Reader {
    fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.my_generation
    }

    async fn run(self, url: Url) {
        let reason = match self.read_stream(url).await {
            Ok(()) => return, // superseded mid-stream, exit quietly
            Err(reason) => reason,
        };

        if self.is_current() {
            let _ = self
                .events
                .send(TransportEvent::Failed { reason })
                .await;
        }
    }

    async fn read_stream(&self, url: Url) -> std::result::Result<(), String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("connect failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("relay returned status {}", response.status()));
        }

        let boundary = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_boundary);

        let mut scanner = match boundary {
            Some(b) => {
                debug!("Multipart boundary: {}", b);
                FrameScanner::for_boundary(&b)
            }
            None => {
                debug!("No multipart boundary, falling back to JPEG markers");
                FrameScanner::for_jpeg()
            }
        };

        let mut stream = response.bytes_stream();
        let mut loaded = false;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| format!("stream read failed: {}", e))?;

            if !self.is_current() {
                return Ok(());
            }

            if scanner.scan(&chunk) > 0 {
                *self.last_frame.lock().unwrap() = Some(Instant::now());
                if !loaded {
                    loaded = true;
                    let _ = self.events.send(TransportEvent::Loaded).await;
                }
            }
        }

        Err("stream ended".to_string())
    }
}

/// Extract the boundary parameter from a multipart content type
fn parse_boundary(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let part = part.trim();
        part.strip_prefix("boundary=")
            .map(|b| b.trim_matches('"').to_string())
    })
}

/// Counts frame delimiters in a byte stream, across chunk edges.
struct FrameScanner {
    needle: Vec<u8>,
    carry: Vec<u8>,
}

impl FrameScanner {
    fn for_boundary(boundary: &str) -> Self {
        Self {
            needle: format!("--{}", boundary).into_bytes(),
            carry: Vec::new(),
        }
    }

    fn for_jpeg() -> Self {
        Self {
            needle: JPEG_SOI.to_vec(),
            carry: Vec::new(),
        }
    }

    /// Count needle occurrences in `chunk`, remembering a tail so a needle
    /// split across two chunks is still found
    fn scan(&mut self, chunk: &[u8]) -> usize {
        let n = self.needle.len();
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(chunk);

        if data.len() < n {
            self.carry = data;
            return 0;
        }

        let mut count = 0;
        let mut i = 0;
        while i + n <= data.len() {
            if data[i..i + n] == self.needle[..] {
                count += 1;
                i += n;
            } else {
                i += 1;
            }
        }

        self.carry = data[data.len() - (n - 1)..].to_vec();
        count
    }
}
