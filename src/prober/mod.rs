pub mod http;
pub mod request;
pub mod response;
pub mod timesplit;
pub mod transport;

pub use http::run_probe_cycle;
pub use timesplit::TimeSample;

/// Where a probe cycle goes. `host` is what the `Host:` header carries, which
/// differs from the connection address when a host override is in effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Target {
    pub fn with_host(&self, host: &str) -> Target {
        Target {
            host: host.to_string(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFlags {
    pub accept_compression: bool,
    pub use_head_method: bool,
    pub use_http10: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeOptions {
    pub flags: RequestFlags,
    pub timesplit: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub status_code: u32,
    pub reason_phrase: Option<String>,
    pub total_bytes: u64,
    pub elapsed_ms: u64,
    pub compressed: bool,
    pub samples: Vec<TimeSample>,
}

/// Hooks invoked while a reply streams in. All of them default to no-ops.
pub trait ProbeObserver {
    /// The header region of the first chunk, without the terminating blank line.
    fn on_header_text(&mut self, _header: &str) {}

    /// Every chunk as read. `opened` is the timing slot this chunk started, if any.
    fn on_raw_chunk(&mut self, _chunk: &[u8], _opened: Option<&TimeSample>) {}

    /// Running byte count after each chunk.
    fn on_progress(&mut self, _total_bytes: u64) {}
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl ProbeObserver for NoopObserver {}
