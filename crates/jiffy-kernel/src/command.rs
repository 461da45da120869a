//! Command descriptors and tables (spec.md §3 "Command descriptor").

use std::collections::HashMap;

use jiffy_types::{ArgList, CommandId};

use crate::events::PartitionEvent;

/// Flags that decide how the chain engine routes a command.
///
/// At minimum a command is `mutates` xor `accessor`; `scaling` marks the
/// commands that are only legal during an active import/export
/// (`scale_put`/`scale_remove`), so the engine can reject them outside
/// that window without the partition having to re-derive the distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFlags {
    pub mutates: bool,
    pub accessor: bool,
    pub scaling: bool,
}

impl CommandFlags {
    pub const fn mutation() -> Self {
        Self {
            mutates: true,
            accessor: false,
            scaling: false,
        }
    }

    pub const fn accessor() -> Self {
        Self {
            mutates: false,
            accessor: true,
            scaling: false,
        }
    }

    pub const fn scaling_mutation() -> Self {
        Self {
            mutates: true,
            accessor: false,
            scaling: true,
        }
    }
}

/// The result of dispatching one command to a partition: the response body
/// plus any events to hand to the notification sink (spec.md §4.7).
#[derive(Debug, Clone, Default)]
pub struct CommandOutcome {
    pub response: ArgList,
    pub events: Vec<PartitionEvent>,
}

impl CommandOutcome {
    pub fn response_only(response: ArgList) -> Self {
        Self {
            response,
            events: Vec::new(),
        }
    }

    pub fn with_event(response: ArgList, event: PartitionEvent) -> Self {
        Self {
            response,
            events: vec![event],
        }
    }
}

/// A single entry in a partition's command table: the name and flags used
/// by the chain engine to decide whether to forward or answer locally. The
/// handler itself lives on the `Partition` impl's dispatch method, not in
/// this table — mirroring the original `(cmd_id -> (handler, flags))`
/// layout from spec.md §3 while keeping dispatch as ordinary Rust `match`
/// arms instead of a dynamic function-pointer table.
#[derive(Debug, Clone, Copy)]
pub struct CommandDescriptor {
    pub id: CommandId,
    pub name: &'static str,
    pub flags: CommandFlags,
}

/// A partition's full command vocabulary, keyed by [`CommandId`].
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    entries: HashMap<CommandId, CommandDescriptor>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, desc: CommandDescriptor) -> &mut Self {
        self.entries.insert(desc.id, desc);
        self
    }

    pub fn get(&self, id: CommandId) -> Option<&CommandDescriptor> {
        self.entries.get(&id)
    }

    pub fn flags(&self, id: CommandId) -> Option<CommandFlags> {
        self.entries.get(&id).map(|d| d.flags)
    }
}
