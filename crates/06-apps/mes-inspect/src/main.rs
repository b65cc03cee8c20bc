//! Offline inspector for scheduler command frames, fence values and log dumps.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mes_abi::{
    ApiStatus, ApiVersion, Command as ApiCommand, ErrorCode, Opcode, API_FRAME_SIZE_IN_BYTES,
};
use mes_codec::{Frame, FrameCodec, LogEntry, LogSnapshot};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

/// How the firmware left a fence word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum FenceReport {
    Pending,
    Failed { error: ErrorCode },
    Written { value: u64 },
}

impl FenceReport {
    fn classify(value: u64) -> Self {
        if value == 0 {
            FenceReport::Pending
        } else if let Some(error) = ErrorCode::from_fence_value(value) {
            FenceReport::Failed { error }
        } else {
            FenceReport::Written { value }
        }
    }
}

#[derive(Clone, Debug, Serialize)]
struct FrameReport {
    index: usize,
    opcode: u8,
    name: Option<&'static str>,
    dwsize: u8,
    status: Option<ApiStatus>,
    command: Option<ApiCommand>,
    error: Option<String>,
}

impl FrameReport {
    fn inspect(codec: &FrameCodec, index: usize, frame: &Frame) -> Self {
        let header = frame.header();
        let (command, error) = match codec.decode(frame) {
            Ok(command) => (Some(command), None),
            Err(err) => (None, Some(err.to_string())),
        };
        Self {
            index,
            opcode: header.opcode(),
            name: Opcode::from_raw(header.opcode()).map(Opcode::name),
            dwsize: header.dwsize(),
            status: codec.peek_status(frame),
            command,
            error,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
struct LogReport {
    capacity: u32,
    first_free: u32,
    wraparound: u32,
    entries: Vec<LogEntry>,
}

impl LogReport {
    fn from_snapshot(snapshot: &LogSnapshot) -> Self {
        Self {
            capacity: snapshot.capacity(),
            first_free: snapshot.first_free(),
            wraparound: snapshot.wraparound(),
            entries: snapshot.entries().collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
struct LayoutRow {
    opcode: Opcode,
    raw: u8,
    min_version: ApiVersion,
    dwsize: Option<u8>,
    status_offset: Option<usize>,
}

fn layout_rows(codec: &FrameCodec) -> Vec<LayoutRow> {
    Opcode::ALL
        .iter()
        .map(|&opcode| LayoutRow {
            opcode,
            raw: opcode.raw(),
            min_version: opcode.min_version(),
            dwsize: codec.expected_dwsize(opcode),
            status_offset: codec.status_offset(opcode),
        })
        .collect()
}

/// Text rendering helpers used by the CLI commands.
mod render {
    use super::{FenceReport, FrameReport, LayoutRow, LogReport};
    use mes_abi::{LogEvent, Opcode};
    use std::fmt::Write;

    /// Format a decoded fence value.
    pub fn fence(value: u64) -> String {
        let mut out = String::new();
        write!(out, "fence {value:#018x}: ").expect("write fence");
        match FenceReport::classify(value) {
            FenceReport::Pending => out.push_str("pending\n"),
            FenceReport::Written { value } => {
                writeln!(out, "written, value {value}").expect("write value");
            }
            FenceReport::Failed { error } => {
                out.push_str("failed\n");
                writeln!(out, "  category:  {}", error.category).expect("write category");
                let name = Opcode::from_raw(error.opcode).map_or("unknown", Opcode::name);
                writeln!(out, "  opcode:    {} ({name})", error.opcode).expect("write opcode");
                writeln!(out, "  misc op:   {}", error.misc_op).expect("write misc op");
                writeln!(out, "  api error: {:#04x}", error.api_error).expect("write api error");
            }
        }
        out
    }

    /// Format one log event on a single line.
    pub fn event(event: &LogEvent) -> String {
        match *event {
            LogEvent::ContextStateChange { h_context, state } => {
                format!("context {h_context:#x} -> {state:?}")
            }
            LogEvent::QueueNewWork { h_queue } => format!("queue {h_queue:#x} new work"),
            LogEvent::QueueNoMoreWork { h_queue } => format!("queue {h_queue:#x} no more work"),
            LogEvent::QueueWaitSyncObject {
                h_queue,
                h_sync_object,
            } => format!("queue {h_queue:#x} waits on {h_sync_object:#x}"),
            LogEvent::QueueUnwaitSyncObject {
                h_queue,
                h_sync_object,
            } => format!("queue {h_queue:#x} released by {h_sync_object:#x}"),
            LogEvent::Unknown {
                operation_type,
                payload: [a, b],
            } => format!("unknown op {operation_type} [{a:#x}, {b:#x}]"),
        }
    }

    /// Format a parsed event log, oldest entry first.
    pub fn log(report: &LogReport) -> String {
        let mut out = String::new();
        writeln!(
            out,
            "Log: capacity={} first_free={} wraparound={} entries={}",
            report.capacity,
            report.first_free,
            report.wraparound,
            report.entries.len()
        )
        .expect("write log header");
        for entry in &report.entries {
            writeln!(
                out,
                "[{}:{}] t={} {}",
                entry.generation,
                entry.index,
                entry.gpu_time_stamp,
                event(&entry.event)
            )
            .expect("write entry");
        }
        out
    }

    /// Format a frame summary followed by its decoded payload or the rejection.
    pub fn frame(report: &FrameReport) -> String {
        let mut out = String::new();
        writeln!(
            out,
            "Frame {}: {} (opcode {}) dwsize={}",
            report.index,
            report.name.unwrap_or("UNKNOWN"),
            report.opcode,
            report.dwsize
        )
        .expect("write frame header");
        if let Some(status) = &report.status {
            writeln!(
                out,
                "  fence: addr={:#018x} value={:#018x}",
                status.fence_addr, status.fence_value
            )
            .expect("write fence");
        }
        match (&report.command, &report.error) {
            (Some(command), _) => writeln!(out, "  {command:?}").expect("write command"),
            (None, Some(error)) => writeln!(out, "  rejected: {error}").expect("write error"),
            (None, None) => {}
        }
        out
    }

    /// Format the per-opcode layout table of one interface version.
    pub fn layout(rows: &[LayoutRow]) -> String {
        let mut out = String::new();
        for row in rows {
            write!(
                out,
                "{:>2} {:<24} since {:<5}",
                row.raw,
                row.opcode.name(),
                row.min_version.to_string()
            )
            .expect("write row");
            match (row.dwsize, row.status_offset) {
                (Some(dwsize), Some(offset)) => {
                    writeln!(out, " dwsize={dwsize:<2} status@{offset}").expect("write layout")
                }
                _ => out.push_str(" unavailable\n"),
            }
        }
        out
    }
}

/// Decode scheduler firmware artifacts captured from a device or a simulator.
#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect scheduler command frames and logs", long_about = None)]
struct Cli {
    /// Interface version frames were encoded for (decimal or hex).
    #[arg(long, global = true, value_parser = parse_u32, default_value_t = ApiVersion::CURRENT.raw())]
    api_version: u32,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode one or more 256-byte frames from a binary file.
    Frame {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Parse a dump of the firmware event log buffer.
    Log {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Explain a 64-bit fence value read back from memory.
    Fence {
        /// Fence value (decimal or hex).
        #[arg(value_parser = parse_u64, value_name = "VALUE")]
        value: u64,
    },
    /// Print frame size and status offset of every opcode.
    Layout,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let codec = FrameCodec::new(ApiVersion(cli.api_version));
    tracing::debug!(version = %codec.version(), "codec ready");

    match cli.command {
        Command::Frame { path } => {
            let reports = load_frames(&path)?
                .iter()
                .enumerate()
                .map(|(index, frame)| FrameReport::inspect(&codec, index, frame))
                .collect::<Vec<_>>();
            if cli.json {
                print_json(&reports)?;
            } else {
                reports.iter().for_each(|r| print!("{}", render::frame(r)));
            }
        }
        Command::Log { path } => {
            let bytes = read_file(&path)?;
            let snapshot = LogSnapshot::parse(&bytes)
                .with_context(|| format!("failed to parse log dump {path:?}"))?;
            let report = LogReport::from_snapshot(&snapshot);
            if cli.json {
                print_json(&report)?;
            } else {
                print!("{}", render::log(&report));
            }
        }
        Command::Fence { value } => {
            if cli.json {
                print_json(&FenceReport::classify(value))?;
            } else {
                print!("{}", render::fence(value));
            }
        }
        Command::Layout => {
            let rows = layout_rows(&codec);
            if cli.json {
                print_json(&rows)?;
            } else {
                print!("{}", render::layout(&rows));
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {path:?}"))
}

fn load_frames(path: &Path) -> Result<Vec<Frame>> {
    let bytes = read_file(path)?;
    split_frames(&bytes).with_context(|| format!("invalid frame file {path:?}"))
}

fn split_frames(bytes: &[u8]) -> Result<Vec<Frame>> {
    if bytes.is_empty() || bytes.len() % API_FRAME_SIZE_IN_BYTES != 0 {
        bail!(
            "{} bytes is not a whole number of {API_FRAME_SIZE_IN_BYTES}-byte frames",
            bytes.len()
        );
    }
    bytes
        .chunks_exact(API_FRAME_SIZE_IN_BYTES)
        .map(|chunk| Frame::from_bytes(chunk).map_err(Into::into))
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_u32(input: &str) -> Result<u32, String> {
    if let Some(stripped) = input.strip_prefix("0x") {
        u32::from_str_radix(stripped, 16).map_err(|_| format!("invalid hex value '{input}'"))
    } else {
        input
            .parse::<u32>()
            .map_err(|_| format!("invalid number '{input}'"))
    }
}

fn parse_u64(input: &str) -> Result<u64, String> {
    let digits = input.replace('_', "");
    if let Some(stripped) = digits.strip_prefix("0x") {
        u64::from_str_radix(stripped, 16).map_err(|_| format!("invalid hex value '{input}'"))
    } else {
        digits
            .parse::<u64>()
            .map_err(|_| format!("invalid number '{input}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use mes_abi::{
        ContextState, ErrorCategory, LogEntryRecord, LogEvent, LogHeader, PerformYield,
    };

    fn log_dump(header: LogHeader, events: &[(u64, LogEvent)]) -> Vec<u8> {
        let mut bytes = header.to_bytes().to_vec();
        for (ts, event) in events {
            bytes.extend_from_slice(&LogEntryRecord::from_event(*ts, event).to_bytes());
        }
        bytes
    }

    #[test]
    fn fence_render_matches_expectation() {
        assert_snapshot!(render::fence(0), @"fence 0x0000000000000000: pending");
        assert_snapshot!(render::fence(7), @"fence 0x0000000000000007: written, value 7");
        let failed = ErrorCode::new(ErrorCategory::Scheduling, 2, 0, 0x11).to_fence_value();
        assert_snapshot!(render::fence(failed), @r###"
        fence 0x8200021100000000: failed
          category:  scheduling
          opcode:    2 (ADD_QUEUE)
          misc op:   0
          api error: 0x11
        "###);
    }

    #[test]
    fn log_render_orders_wrapped_entries() {
        let header = LogHeader {
            first_free_entry_index: 1,
            wraparound_count: 1,
            number_of_entries: 3,
            reserved: [0; 2],
        };
        let bytes = log_dump(
            header,
            &[
                (300, LogEvent::QueueNoMoreWork { h_queue: 0xBEEF }),
                (
                    100,
                    LogEvent::ContextStateChange {
                        h_context: 0xAAA1,
                        state: ContextState::Ready,
                    },
                ),
                (200, LogEvent::QueueNewWork { h_queue: 0xBEEF }),
            ],
        );
        let snapshot = LogSnapshot::parse(&bytes).expect("parse");
        assert_snapshot!(render::log(&LogReport::from_snapshot(&snapshot)), @r###"
        Log: capacity=3 first_free=1 wraparound=1 entries=3
        [0:1] t=100 context 0xaaa1 -> Ready
        [0:2] t=200 queue 0xbeef new work
        [1:0] t=300 queue 0xbeef no more work
        "###);
    }

    #[test]
    fn frame_render_shows_status_and_payload() {
        let codec = FrameCodec::default();
        let frame = codec
            .encode(&ApiCommand::PerformYield(PerformYield {
                dummy: 0,
                api_status: ApiStatus::new(0x1_0000_0000, 7),
                timestamp: 0,
            }))
            .expect("encode");
        let report = FrameReport::inspect(&codec, 0, &frame);
        assert_snapshot!(render::frame(&report), @r###"
        Frame 0: PERFORM_YIELD (opcode 4) dwsize=8
          fence: addr=0x0000000100000000 value=0x0000000000000007
          PerformYield(PerformYield { dummy: 0, api_status: ApiStatus { fence_addr: 4294967296, fence_value: 7 }, timestamp: 0 })
        "###);
    }

    #[test]
    fn rejected_frames_keep_their_fence() {
        let codec = FrameCodec::default();
        let mut words = codec
            .encode(&ApiCommand::PerformYield(PerformYield {
                dummy: 0,
                api_status: ApiStatus::new(0x2000, 3),
                timestamp: 0,
            }))
            .expect("encode")
            .into_words();
        words[63] = 1;
        let report = FrameReport::inspect(&codec, 2, &Frame::from_words(words));
        assert_eq!(report.status, Some(ApiStatus::new(0x2000, 3)));
        assert!(report.command.is_none());
        let text = render::frame(&report);
        assert!(text.contains("rejected: reserved word 63 is not zero"), "{text}");
    }

    #[test]
    fn layout_hides_opcodes_newer_than_the_codec() {
        let rows = layout_rows(&FrameCodec::new(ApiVersion(0x11)));
        let text = render::layout(&rows);
        let line = |name: &str| {
            text.lines()
                .find(|line| line.contains(name))
                .map(str::to_owned)
                .unwrap_or_default()
        };
        assert!(line("AMD_LOG").contains("status@"));
        assert!(line("SET_SE_MODE").ends_with("unavailable"));
        assert!(line("SET_HW_RSRC_1 ").ends_with("unavailable"));
        assert!(line("PERFORM_YIELD").contains("dwsize=8 "));
    }

    #[test]
    fn fence_json_is_tagged() {
        let json = serde_json::to_value(FenceReport::classify(0)).expect("json");
        assert_eq!(json, serde_json::json!({ "state": "pending" }));
    }

    #[test]
    fn frame_files_must_hold_whole_frames() {
        assert!(split_frames(&[]).is_err());
        assert!(split_frames(&[0u8; 300]).is_err());
        assert_eq!(split_frames(&[0u8; 512]).expect("two frames").len(), 2);
    }

    #[test]
    fn numbers_accept_hex_and_separators() {
        assert_eq!(parse_u64("0x8200_0211_0000_0000"), Ok(0x8200_0211_0000_0000));
        assert_eq!(parse_u64("42"), Ok(42));
        assert_eq!(parse_u32("0x13"), Ok(0x13));
        assert!(parse_u32("nope").is_err());
    }
}
