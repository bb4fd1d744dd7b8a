//! Closed enumerations for the SLAP message taxonomy.
//!
//! The protocol has a fixed operation set known at build time: three message
//! classes, eleven request kinds plus an unknown sentinel, and four event
//! kinds. Each enum carries its small-integer wire code.

/// Top-level class of an inbound frame (bytes 4..8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageClass {
    Error,
    Event,
    Reply,
}

impl MessageClass {
    /// Decode the wire class code. Returns `None` for unknown codes.
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Error),
            1 => Some(Self::Event),
            2 => Some(Self::Reply),
            _ => None,
        }
    }

    /// Wire code for this class.
    pub fn code(self) -> u32 {
        match self {
            Self::Error => 0,
            Self::Event => 1,
            Self::Reply => 2,
        }
    }
}

/// The closed set of operations a caller may invoke.
///
/// `Unknown` (255) is the sentinel the wire uses for unrecognized kinds;
/// decoding never fails, it degrades to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    ListThreads,
    ThreadInfo,
    SuspendThread,
    ResumeThread,
    ThreadStack,
    FrameLocals,
    SetBreakpoint,
    ModifyBreakpoint,
    Evaluate,
    SourceFile,
    Step,
    Unknown,
}

impl RequestKind {
    /// Decode a wire request kind.
    pub fn from_u32(code: u32) -> Self {
        match code {
            1 => Self::ListThreads,
            2 => Self::ThreadInfo,
            3 => Self::SuspendThread,
            4 => Self::ResumeThread,
            5 => Self::ThreadStack,
            6 => Self::FrameLocals,
            7 => Self::SetBreakpoint,
            8 => Self::ModifyBreakpoint,
            9 => Self::Evaluate,
            10 => Self::SourceFile,
            11 => Self::Step,
            _ => Self::Unknown,
        }
    }

    /// Wire code for this kind.
    pub fn code(self) -> u32 {
        match self {
            Self::ListThreads => 1,
            Self::ThreadInfo => 2,
            Self::SuspendThread => 3,
            Self::ResumeThread => 4,
            Self::ThreadStack => 5,
            Self::FrameLocals => 6,
            Self::SetBreakpoint => 7,
            Self::ModifyBreakpoint => 8,
            Self::Evaluate => 9,
            Self::SourceFile => 10,
            Self::Step => 11,
            Self::Unknown => 255,
        }
    }

    /// Whether replies of this kind arrive as a multi-frame stream.
    ///
    /// Thread-stack and frame-locals replies are spread over several frames
    /// and reassembled into one aggregate value.
    #[inline]
    pub fn is_streaming(self) -> bool {
        matches!(self, Self::ThreadStack | Self::FrameLocals)
    }
}

/// Asynchronous notifications the remote side may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BreakpointHit,
    ThreadStarted,
    ThreadEnded,
    StepCompleted,
}

impl EventKind {
    /// Decode a wire event kind. Returns `None` for unknown codes.
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::BreakpointHit),
            2 => Some(Self::ThreadStarted),
            3 => Some(Self::ThreadEnded),
            4 => Some(Self::StepCompleted),
            _ => None,
        }
    }

    /// Wire code for this event kind.
    pub fn code(self) -> u32 {
        match self {
            Self::BreakpointHit => 1,
            Self::ThreadStarted => 2,
            Self::ThreadEnded => 3,
            Self::StepCompleted => 4,
        }
    }
}

/// Sub-action of a modify-breakpoint request, carried in `param1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointAction {
    Delete,
    Disable,
    Enable,
}

impl BreakpointAction {
    /// Wire code for this action.
    pub fn code(self) -> u32 {
        match self {
            Self::Delete => 0,
            Self::Disable => 1,
            Self::Enable => 2,
        }
    }
}

/// Kind of step requested, carried in the low bits of the step parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Line,
    Over,
    Out,
}

impl StepKind {
    /// Wire code for this step kind.
    pub fn code(self) -> u32 {
        match self {
            Self::Line => 0,
            Self::Over => 1,
            Self::Out => 2,
        }
    }
}

/// The "until magik" flag (bit 4) always set in step requests.
pub const STEP_UNTIL_MAGIK: u32 = 0x10;

/// Pack the step parameter: `count << 16 | stepKind | 0x10`.
pub fn pack_step_param(kind: StepKind, count: u16) -> u32 {
    (u32::from(count) << 16) | kind.code() | STEP_UNTIL_MAGIK
}
