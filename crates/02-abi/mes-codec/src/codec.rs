use crate::error::{DecodeError, EncodeError};
use crate::frame::{Frame, FrameReader, FrameWriter};
use crate::wire::Wire;
use mes_abi::{ApiStatus, ApiType, ApiVersion, Command, Opcode, API_FRAME_SIZE_IN_DWORDS};

const OPCODE_SLOTS: usize = Opcode::SetHwResources1 as usize + 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Layout {
    dwsize: u8,
    status_offset: usize,
}

/// Encodes and decodes command frames for one interface version.
///
/// Frame sizes are not tabulated by hand: each opcode's layout is measured
/// once at construction by encoding its empty payload for the configured
/// version, so the size check on decode always agrees with the encoder.
#[derive(Clone, Debug)]
pub struct FrameCodec {
    version: ApiVersion,
    layouts: [Option<Layout>; OPCODE_SLOTS],
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(ApiVersion::CURRENT)
    }
}

impl FrameCodec {
    pub fn new(version: ApiVersion) -> Self {
        let mut layouts = [None; OPCODE_SLOTS];
        for opcode in Opcode::ALL {
            if !opcode.is_available(version) {
                continue;
            }
            match encode_payload(&Command::default_for(opcode), opcode, version) {
                Ok((frame, Some(status_offset))) => {
                    layouts[opcode.raw() as usize] = Some(Layout {
                        dwsize: frame.header().dwsize(),
                        status_offset,
                    });
                }
                Ok((_, None)) => tracing::warn!(%opcode, "layout without completion status"),
                Err(err) => tracing::warn!(%opcode, %err, "layout could not be measured"),
            }
        }
        Self { version, layouts }
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    fn layout(&self, opcode: Opcode) -> Option<Layout> {
        self.layouts.get(opcode.raw() as usize).copied().flatten()
    }

    /// Size in dwords (header included) of `opcode` frames, `None` when the
    /// opcode is not part of this version.
    pub fn expected_dwsize(&self, opcode: Opcode) -> Option<u8> {
        self.layout(opcode).map(|layout| layout.dwsize)
    }

    /// Byte offset of the completion status inside `opcode` frames.
    pub fn status_offset(&self, opcode: Opcode) -> Option<usize> {
        self.layout(opcode).map(|layout| layout.status_offset)
    }

    /// Builds the 64-dword frame for `command`; unused words are zero.
    pub fn encode(&self, command: &Command) -> Result<Frame, EncodeError> {
        let frame = match command.opcode() {
            Some(opcode) => {
                if !opcode.is_available(self.version) {
                    return Err(EncodeError::OpcodeUnavailable {
                        opcode,
                        version: self.version,
                    });
                }
                encode_payload(command, opcode, self.version)?.0
            }
            None => encode_unrecognized(command)?,
        };
        tracing::trace!(
            opcode = command.raw_opcode(),
            dwsize = frame.header().dwsize(),
            "encoded frame"
        );
        Ok(frame)
    }

    /// Parses a frame. Unknown opcodes come back as [`Command::Unrecognized`].
    pub fn decode(&self, frame: &Frame) -> Result<Command, DecodeError> {
        let header = frame.header();
        if header.api_type() != ApiType::Scheduler.raw() {
            return Err(DecodeError::UnsupportedType {
                api_type: header.api_type(),
            });
        }
        if header.reserved() != 0 {
            return Err(DecodeError::MalformedHeader {
                header: header.bits(),
            });
        }
        let dwsize = header.dwsize();
        if dwsize == 0 || usize::from(dwsize) > API_FRAME_SIZE_IN_DWORDS {
            return Err(DecodeError::InvalidSize { dwsize });
        }
        ensure_zero_tail(frame, usize::from(dwsize))?;

        let Some(opcode) = Opcode::from_raw(header.opcode()) else {
            return Ok(Command::Unrecognized {
                opcode: header.opcode(),
                dwords: frame.words()[1..usize::from(dwsize)].to_vec(),
            });
        };
        if !opcode.is_available(self.version) {
            return Err(DecodeError::OpcodeUnavailable {
                opcode,
                version: self.version,
            });
        }
        let expected = self
            .expected_dwsize(opcode)
            .ok_or(DecodeError::OpcodeUnavailable {
                opcode,
                version: self.version,
            })?;
        if dwsize != expected {
            return Err(DecodeError::SizeMismatch {
                opcode,
                declared: dwsize,
                expected,
            });
        }

        let mut reader = FrameReader::new(frame, opcode, self.version);
        let command = read_payload(opcode, &mut reader)?;
        reader.finish()?;
        Ok(command)
    }

    /// Completion status of a frame without decoding the rest of it.
    ///
    /// Only needs a valid header and a known opcode, so a consumer can still
    /// complete a command whose payload it rejects.
    pub fn peek_status(&self, frame: &Frame) -> Option<ApiStatus> {
        let header = frame.header();
        let opcode = Opcode::from_raw(header.opcode())?;
        let layout = self.layout(opcode)?;
        if header.api_type() != ApiType::Scheduler.raw() || header.dwsize() != layout.dwsize {
            return None;
        }
        let word = layout.status_offset / 4;
        let words = frame.words();
        let pair = |at: usize| u64::from(words[at]) | (u64::from(words[at + 1]) << 32);
        Some(ApiStatus::new(pair(word), pair(word + 2)))
    }
}

fn ensure_zero_tail(frame: &Frame, used: usize) -> Result<(), DecodeError> {
    match frame.words()[used..].iter().position(|w| *w != 0) {
        Some(offset) => Err(DecodeError::ReservedNotZero {
            word: used + offset,
        }),
        None => Ok(()),
    }
}

fn encode_unrecognized(command: &Command) -> Result<Frame, EncodeError> {
    let Command::Unrecognized { opcode, dwords } = command else {
        return Err(EncodeError::UnrecognizedIsKnown {
            opcode: command.raw_opcode(),
        });
    };
    if Opcode::from_raw(*opcode).is_some() {
        return Err(EncodeError::UnrecognizedIsKnown { opcode: *opcode });
    }
    let mut writer = FrameWriter::new(*opcode, ApiVersion::CURRENT);
    writer.u32s(dwords)?;
    Ok(writer.finish().0)
}

fn encode_payload(
    command: &Command,
    opcode: Opcode,
    version: ApiVersion,
) -> Result<(Frame, Option<usize>), EncodeError> {
    let mut w = FrameWriter::new(opcode.raw(), version);
    match command {
        Command::SetHwResources(cmd) => cmd.write(&mut w)?,
        Command::SetSchedulingConfig(cmd) => cmd.write(&mut w)?,
        Command::AddQueue(cmd) => cmd.write(&mut w)?,
        Command::RemoveQueue(cmd) => cmd.write(&mut w)?,
        Command::PerformYield(cmd) => cmd.write(&mut w)?,
        Command::SetGangPriorityLevel(cmd) | Command::ChangeGangPriority(cmd) => {
            cmd.write(&mut w)?
        }
        Command::Suspend(cmd) => cmd.write(&mut w)?,
        Command::Resume(cmd) => cmd.write(&mut w)?,
        Command::Reset(cmd) => cmd.write(&mut w)?,
        Command::SetLogBuffer(cmd) => cmd.write(&mut w)?,
        Command::QuerySchedulerStatus(cmd) => cmd.write(&mut w)?,
        Command::SetDebugVmid(cmd) => cmd.write(&mut w)?,
        Command::Misc(cmd) => cmd.write(&mut w)?,
        Command::UpdateRootPageTable(cmd) => cmd.write(&mut w)?,
        Command::AmdLog(cmd) => cmd.write(&mut w)?,
        Command::SetSeMode(cmd) => cmd.write(&mut w)?,
        Command::SetGangSubmit(cmd) => cmd.write(&mut w)?,
        Command::SetHwResources1(cmd) => cmd.write(&mut w)?,
        Command::Unrecognized { opcode, .. } => {
            return Err(EncodeError::UnrecognizedIsKnown { opcode: *opcode })
        }
    }
    Ok(w.finish())
}

fn read_payload(opcode: Opcode, r: &mut FrameReader<'_>) -> Result<Command, DecodeError> {
    Ok(match opcode {
        Opcode::SetHwResources => Command::SetHwResources(Wire::read(r)?),
        Opcode::SetSchedulingConfig => Command::SetSchedulingConfig(Wire::read(r)?),
        Opcode::AddQueue => Command::AddQueue(Wire::read(r)?),
        Opcode::RemoveQueue => Command::RemoveQueue(Wire::read(r)?),
        Opcode::PerformYield => Command::PerformYield(Wire::read(r)?),
        Opcode::SetGangPriorityLevel => Command::SetGangPriorityLevel(Wire::read(r)?),
        Opcode::Suspend => Command::Suspend(Wire::read(r)?),
        Opcode::Resume => Command::Resume(Wire::read(r)?),
        Opcode::Reset => Command::Reset(Wire::read(r)?),
        Opcode::SetLogBuffer => Command::SetLogBuffer(Wire::read(r)?),
        Opcode::ChangeGangPriority => Command::ChangeGangPriority(Wire::read(r)?),
        Opcode::QuerySchedulerStatus => Command::QuerySchedulerStatus(Wire::read(r)?),
        Opcode::SetDebugVmid => Command::SetDebugVmid(Wire::read(r)?),
        Opcode::Misc => Command::Misc(Wire::read(r)?),
        Opcode::UpdateRootPageTable => Command::UpdateRootPageTable(Wire::read(r)?),
        Opcode::AmdLog => Command::AmdLog(Wire::read(r)?),
        Opcode::SetSeMode => Command::SetSeMode(Wire::read(r)?),
        Opcode::SetGangSubmit => Command::SetGangSubmit(Wire::read(r)?),
        Opcode::SetHwResources1 => Command::SetHwResources1(Wire::read(r)?),
    })
}
