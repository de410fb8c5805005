use std::io;
use std::net::SocketAddr;

use thiserror::Error;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_BADARGS: u8 = 1;
pub const EXIT_RESOLV: u8 = 2;
pub const EXIT_CONN: u8 = 3;
pub const EXIT_WRITE: u8 = 4;
pub const EXIT_READ: u8 = 5;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Resolving {host}: {source}")]
    Resolve { host: String, source: io::Error },

    #[error("Opening the connection to {addr}: {source}")]
    Connect { addr: SocketAddr, source: io::Error },

    #[error("Sending the HTTP request: {0}")]
    Write(#[source] io::Error),

    #[error("Reading from socket: {0}")]
    Read(#[source] io::Error),

    #[error("Malformed status line: {0:?}")]
    StatusLine(String),
}

impl ProbeError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ProbeError::InvalidUrl { .. } => EXIT_BADARGS,
            ProbeError::Resolve { .. } => EXIT_RESOLV,
            ProbeError::Connect { .. } => EXIT_CONN,
            ProbeError::Write(_) => EXIT_WRITE,
            ProbeError::Read(_) => EXIT_READ,
            // never fatal, kept for completeness
            ProbeError::StatusLine(_) => EXIT_SUCCESS,
        }
    }
}
