//! The closed command and status tag sets, and the owned byte buffer they
//! travel with.

/// The one-byte command tag. Discriminants match the wire contract exactly —
/// do not reorder these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    Continue = 0,
    Kill = 1,
    SetBreakpoint = 2,
    RemoveBreakpoint = 3,
    EnableMmioTracking = 4,
    DisableMmioTracking = 5,
    SetMmioValue = 6,
    AddToMmioReadQueue = 7,
    SetCpuInterruptTrigger = 8,
    EnableCodeCoverage = 9,
    DisableCodeCoverage = 10,
    GetCodeCoverage = 11,
    GetCodeCoverageShm = 12,
    ResetCodeCoverage = 13,
    SetReturnCodeAddress = 14,
    GetReturnCode = 15,
    DoRun = 16,
    DoRunShm = 17,
    SetErrorSymbol = 18,
    SetFixedRead = 19,
    GetCpuPc = 20,
    JumpCpuTo = 21,
    StoreCpuRegisters = 22,
    RestoreCpuRegisters = 23,
}

impl Command {
    /// Decodes a wire tag. `None` for any value outside `0..=23` — the
    /// caller should treat that as MALFORMED, not panic.
    pub fn from_tag(tag: u8) -> Option<Command> {
        use Command::*;
        Some(match tag {
            0 => Continue,
            1 => Kill,
            2 => SetBreakpoint,
            3 => RemoveBreakpoint,
            4 => EnableMmioTracking,
            5 => DisableMmioTracking,
            6 => SetMmioValue,
            7 => AddToMmioReadQueue,
            8 => SetCpuInterruptTrigger,
            9 => EnableCodeCoverage,
            10 => DisableCodeCoverage,
            11 => GetCodeCoverage,
            12 => GetCodeCoverageShm,
            13 => ResetCodeCoverage,
            14 => SetReturnCodeAddress,
            15 => GetReturnCode,
            16 => DoRun,
            17 => DoRunShm,
            18 => SetErrorSymbol,
            19 => SetFixedRead,
            20 => GetCpuPc,
            21 => JumpCpuTo,
            22 => StoreCpuRegisters,
            23 => RestoreCpuRegisters,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// Response/event status. `OK` and `ERROR` are the handler's own
/// pass/fail; `MALFORMED` is reserved for the dispatcher — a handler is
/// never asked to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    Error = 1,
    Malformed = 2,
}

impl Status {
    pub fn from_tag(tag: u8) -> Option<Status> {
        match tag {
            0 => Some(Status::Ok),
            1 => Some(Status::Error),
            2 => Some(Status::Malformed),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tags_round_trip() {
        for tag in 0u8..=23 {
            let cmd = Command::from_tag(tag).expect("tag in range");
            assert_eq!(cmd.tag(), tag);
        }
        assert!(Command::from_tag(24).is_none());
    }

    #[test]
    fn set_mmio_value_is_tag_six() {
        // the only name used anywhere for this command
        assert_eq!(Command::SetMmioValue.tag(), 6);
    }

    #[test]
    fn status_tags_round_trip() {
        for tag in 0u8..=2 {
            assert_eq!(Status::from_tag(tag).unwrap().tag(), tag);
        }
        assert!(Status::from_tag(3).is_none());
    }
}
