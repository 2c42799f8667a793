use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bitflags::bitflags;
use notify::event::{ModifyKind, RenameMode};
use notify::EventKind;
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::error::ParseOpError;

bitflags! {
    /// Kinds of filesystem change, combinable as a mask.
    ///
    /// Bit values follow the classic fsnotify numbering so masks written for
    /// other tools (`15` for everything but chmod) keep their meaning.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Op: u32 {
        const CREATE = 1;
        const WRITE = 1 << 1;
        const REMOVE = 1 << 2;
        const RENAME = 1 << 3;
        const CHMOD = 1 << 4;
    }
}

/// Display order, matching fsnotify's `Op.String()`.
const OP_NAMES: [(Op, &str); 5] = [
    (Op::CREATE, "CREATE"),
    (Op::REMOVE, "REMOVE"),
    (Op::WRITE, "WRITE"),
    (Op::RENAME, "RENAME"),
    (Op::CHMOD, "CHMOD"),
];

impl Op {
    /// Union of create, write, remove and rename.
    pub const DEFAULT_MASK: Op = Op::CREATE
        .union(Op::WRITE)
        .union(Op::REMOVE)
        .union(Op::RENAME);

    /// Maps a notify event kind onto our kinds.
    ///
    /// Returns an empty set for kinds that are never reported: access
    /// notifications, unclassified events, and the combined `Both` rename
    /// notice whose sides already arrived as separate `From`/`To` events.
    pub fn from_kind(kind: &EventKind) -> Op {
        match kind {
            EventKind::Create(_) => Op::CREATE,
            EventKind::Remove(_) => Op::REMOVE,
            EventKind::Modify(ModifyKind::Metadata(_)) => Op::CHMOD,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Op::CREATE,
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Op::empty(),
            EventKind::Modify(ModifyKind::Name(_)) => Op::RENAME,
            EventKind::Modify(_) => Op::WRITE,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => Op::empty(),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (op, name) in OP_NAMES {
            if self.contains(op) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl FromStr for Op {
    type Err = ParseOpError;

    /// Parses either a raw integer mask (`"15"`) or kind names joined by
    /// `|` or `,` (`"create|write"`), case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(bits) = s.parse::<u32>() {
            return Ok(Op::from_bits_retain(bits));
        }

        let mut op = Op::empty();
        for name in s.split(['|', ',']).map(str::trim) {
            op |= match name.to_ascii_lowercase().as_str() {
                "create" => Op::CREATE,
                "write" => Op::WRITE,
                "remove" => Op::REMOVE,
                "rename" => Op::RENAME,
                "chmod" => Op::CHMOD,
                "all" => Op::all(),
                _ => return Err(ParseOpError(name.to_string())),
            };
        }
        Ok(op)
    }
}

impl Serialize for Op {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single filesystem change: the affected path and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    path: PathBuf,
    op: Op,
}

impl Event {
    pub fn new(path: impl Into<PathBuf>, op: Op) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn op(&self) -> Op {
        self.op
    }

    /// Splits a notify event into one record per affected path.
    ///
    /// Kinds that map to an empty `Op` produce nothing.
    pub fn from_notify(event: notify::Event) -> Vec<Event> {
        let op = Op::from_kind(&event.kind);
        if op.is_empty() {
            return Vec::new();
        }
        event
            .paths
            .into_iter()
            .map(|path| Event::new(path, op))
            .collect()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.path.display().to_string(), self.op)
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Event", 3)?;
        // Lossy so a non-UTF-8 name still yields a whole line.
        state.serialize_field("name", &self.path.to_string_lossy())?;
        state.serialize_field("op", &self.op)?;
        state.serialize_field("mask", &self.op.bits())?;
        state.end()
    }
}
