//! Console output: banner, per-cycle status lines and the live view of a
//! transfer in progress.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::net::IpAddr;
use std::time::Instant;

use crate::config::ProbeConfig;
use crate::prober::timesplit::MAX_SAMPLES;
use crate::prober::{ProbeObserver, ProbeResult, Target, TimeSample};

/// Clears the current terminal line and moves the cursor to its start.
pub const ANSI_CLEARLINE: &str = "\x1b[1K\x1b[G";

/// Bandwidth is measured only once this much has arrived, so that connection
/// setup and the header do not skew it.
const BANDWIDTH_WARMUP: u64 = 4 * 4 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayOptions {
    pub showhdr: bool,
    pub dump: bool,
    pub silent: bool,
    pub timesplit: bool,
}

impl From<&ProbeConfig> for DisplayOptions {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            showhdr: config.showhdr,
            dump: config.dump,
            silent: config.silent,
            timesplit: config.timesplit,
        }
    }
}

pub fn format_banner(target: &Target, ip: IpAddr, config: &ProbeConfig) -> String {
    let mut s = format!("PROBE {} ({}) port {}", target.host, ip, target.port);
    if config.compr {
        s.push_str(" [compr]");
    }
    if config.head {
        s.push_str(" [head]");
    }
    if config.http10 {
        s.push_str(" [http10]");
    }
    if config.wait_secs != 1 {
        let _ = write!(s, " [wait {}]", config.wait_secs);
    }
    s
}

/// `id. code reason    len bytes    ms ms[    compr]`. The length is put in
/// parentheses when it changed since the previous reply.
pub fn format_status_line(id: u64, result: &ProbeResult, previous: Option<&ProbeResult>) -> String {
    let mut s = format!(
        "{}. {} {}",
        id,
        result.status_code,
        result.reason_phrase.as_deref().unwrap_or("()")
    );
    match previous {
        Some(prev) if prev.total_bytes != result.total_bytes => {
            let _ = write!(s, "    ({})", result.total_bytes);
        }
        _ => {
            let _ = write!(s, "    {}", result.total_bytes);
        }
    }
    let _ = write!(s, " bytes    {} ms", result.elapsed_ms);
    if result.compressed {
        s.push_str("    compr");
    }
    s
}

pub fn format_timesplit(samples: &[TimeSample]) -> String {
    let mut s = String::new();
    for (j, sample) in samples.iter().enumerate() {
        let _ = writeln!(
            s,
            "       [{}] {}-{} -> {} ms",
            j, sample.first_byte, sample.last_byte, sample.elapsed_ms
        );
    }
    s
}

fn format_chunk_time(sample: &TimeSample) -> String {
    format!(
        "\n\n-----------------------------------------------\n\
         CHUNK TIME INFORMATION: {}-{} -> {} ms\n\
         -----------------------------------------------\n\n",
        sample.first_byte, sample.last_byte, sample.elapsed_ms
    )
}

fn format_progress(total: u64, bandwidth: Option<f64>) -> String {
    let mut s = format!("{ANSI_CLEARLINE}{total} bytes read");
    if let Some(kbs) = bandwidth {
        let _ = write!(s, " ({kbs:.2} kbytes/s)");
    }
    s
}

/// Per-cycle live output, driven by the probe engine while a reply streams in.
pub struct ConsoleObserver<W: Write> {
    out: W,
    options: DisplayOptions,
    bandwidth_start: Option<Instant>,
    opened_slots: usize,
}

impl ConsoleObserver<io::Stdout> {
    pub fn stdout(options: DisplayOptions) -> Self {
        Self::new(io::stdout(), options)
    }
}

impl<W: Write> ConsoleObserver<W> {
    pub fn new(out: W, options: DisplayOptions) -> Self {
        Self {
            out,
            options,
            bandwidth_start: None,
            opened_slots: 0,
        }
    }

    fn bandwidth(&mut self, total: u64) -> Option<f64> {
        if total == BANDWIDTH_WARMUP {
            self.bandwidth_start = Some(Instant::now());
        }
        if total <= BANDWIDTH_WARMUP {
            return None;
        }
        let start = *self.bandwidth_start.get_or_insert_with(Instant::now);
        let secs = start.elapsed().as_secs_f64();
        if secs <= 0.0 {
            return None;
        }
        Some((total - BANDWIDTH_WARMUP) as f64 / secs / 1024.0)
    }

    fn emit(&mut self, bytes: &[u8]) {
        // stdout going away is not worth failing a probe over
        let _ = self.out.write_all(bytes);
        let _ = self.out.flush();
    }
}

impl<W: Write> ProbeObserver for ConsoleObserver<W> {
    fn on_header_text(&mut self, header: &str) {
        if !self.options.showhdr {
            return;
        }
        let text = if self.options.silent {
            format!("{header}\n")
        } else {
            format!("\n{header}\n\n")
        };
        self.emit(text.as_bytes());
    }

    fn on_raw_chunk(&mut self, chunk: &[u8], opened: Option<&TimeSample>) {
        if !self.options.dump {
            return;
        }
        self.emit(chunk);
        let Some(sample) = opened.filter(|_| self.options.timesplit) else {
            return;
        };
        self.opened_slots += 1;
        // the last slot may still grow, so its time is only final in the summary
        if self.opened_slots < MAX_SAMPLES {
            let info = format_chunk_time(sample);
            self.emit(info.as_bytes());
        }
    }

    fn on_progress(&mut self, total_bytes: u64) {
        if self.options.dump || self.options.silent {
            return;
        }
        let bandwidth = self.bandwidth(total_bytes);
        let line = format_progress(total_bytes, bandwidth);
        self.emit(line.as_bytes());
    }
}

/// Prints one status line per finished cycle, comparing with the cycle before.
pub struct StatusReporter<W: Write> {
    out: W,
    options: DisplayOptions,
    previous: Option<ProbeResult>,
}

impl StatusReporter<io::Stdout> {
    pub fn stdout(options: DisplayOptions) -> Self {
        Self::new(io::stdout(), options)
    }
}

impl<W: Write> StatusReporter<W> {
    pub fn new(out: W, options: DisplayOptions) -> Self {
        Self {
            out,
            options,
            previous: None,
        }
    }

    pub fn report(&mut self, id: u64, result: ProbeResult) -> io::Result<()> {
        if !self.options.silent {
            let line = format_status_line(id, &result, self.previous.as_ref());
            writeln!(self.out, "{ANSI_CLEARLINE}{line}")?;
            if self.options.timesplit {
                self.out.write_all(format_timesplit(&result.samples).as_bytes())?;
            }
            self.out.flush()?;
        }
        self.previous = Some(result);
        Ok(())
    }
}
