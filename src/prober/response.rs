use tracing::debug;

use super::timesplit::TimeSampler;
use super::transport::Transport;
use super::{ProbeObserver, ProbeResult};
use crate::error::ProbeError;
use crate::timestamp::Clock;

pub const RECV_BUF: usize = 4 * 1024;

const HEADER_END: &str = "\r\n\r\n";
const GZIP_MARKER: &str = "Content-Encoding: gzip";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub code: u32,
    pub reason: String,
}

/// What the first chunk of a reply tells us.
#[derive(Debug)]
pub struct ReplyHead {
    pub header_text: String,
    pub compressed: bool,
    pub status: Result<StatusLine, ProbeError>,
}

/// Inspect the first chunk of a reply. A chunk without the blank line that
/// ends the header is treated as header all the way through.
pub fn extract_reply_head(chunk: &[u8]) -> ReplyHead {
    let text = String::from_utf8_lossy(chunk);
    let header_text = match text.find(HEADER_END) {
        Some(end) => text[..end].to_string(),
        None => text.into_owned(),
    };
    let compressed = header_text.contains(GZIP_MARKER);
    let status = parse_status_line(&header_text);
    ReplyHead {
        header_text,
        compressed,
        status,
    }
}

/// `VERSION SP CODE SP REASON`. The code is read leniently: leading digits
/// only, anything else yields 0. Codes outside the usual three digits are kept
/// as sent.
pub fn parse_status_line(header: &str) -> Result<StatusLine, ProbeError> {
    let line = header.split('\n').next().unwrap_or_default();
    let malformed = || ProbeError::StatusLine(line.trim_end_matches('\r').to_string());

    let (_version, rest) = line.split_once(' ').ok_or_else(malformed)?;
    let (code, reason) = rest.split_once(' ').ok_or_else(malformed)?;
    let reason = match reason.find('\r') {
        Some(cr) => &reason[..cr],
        None => reason,
    };

    Ok(StatusLine {
        code: lenient_code(code),
        reason: reason.to_string(),
    })
}

fn lenient_code(s: &str) -> u32 {
    let digits: String = s
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse() {
        Ok(code) => code,
        Err(_) if digits.is_empty() => 0,
        Err(_) => u32::MAX,
    }
}

/// Read the reply until EOF, filling `result` as it goes.
///
/// Status, reason and compression come from the first non-empty chunk only.
/// A malformed status line leaves the code at 0 and the reason unset; any
/// read error aborts the cycle.
pub fn ingest<T, C>(
    transport: &mut T,
    clock: &C,
    start_ms: u64,
    timesplit: bool,
    result: &mut ProbeResult,
    observer: &mut dyn ProbeObserver,
) -> Result<(), ProbeError>
where
    T: Transport + ?Sized,
    C: Clock + ?Sized,
{
    let mut buf = vec![0u8; RECV_BUF];
    let mut sampler = TimeSampler::new(start_ms);
    let mut total: u64 = 0;

    loop {
        let nread = transport.read_chunk(&mut buf).map_err(ProbeError::Read)?;
        if nread == 0 {
            break;
        }
        let chunk = &buf[..nread];

        let opened = if timesplit {
            sampler.record(total, nread as u64, clock.now_ms()).copied()
        } else {
            None
        };

        if total == 0 {
            let head = extract_reply_head(chunk);
            observer.on_header_text(&head.header_text);
            result.compressed = head.compressed;
            match head.status {
                Ok(status) => {
                    result.status_code = status.code;
                    result.reason_phrase = Some(status.reason);
                }
                Err(e) => debug!("{}", e),
            }
        }

        observer.on_raw_chunk(chunk, opened.as_ref());
        total += nread as u64;
        result.total_bytes = total;
        observer.on_progress(total);
    }

    result.samples = sampler.into_samples();
    Ok(())
}
