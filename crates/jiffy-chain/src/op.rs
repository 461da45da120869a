//! Chain operations (spec.md §3 "Chain op").

use jiffy_types::{ArgList, ClientId, CommandId, SequenceId};

/// A single queued-for-forwarding operation: the sequence stamp that
/// orders it, the command to run, its arguments, and the client waiting
/// on its eventual response. Kept separately from
/// [`jiffy_kernel::CommandOutcome`] because a chain op is forwarded and
/// acked before its outcome is known to every replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOp {
    pub seq: SequenceId,
    pub client: ClientId,
    pub cmd: CommandId,
    pub args: ArgList,
}

impl ChainOp {
    pub fn new(seq: SequenceId, client: ClientId, cmd: CommandId, args: ArgList) -> Self {
        Self {
            seq,
            client,
            cmd,
            args,
        }
    }
}

/// Which position in the chain this block currently occupies (spec.md §3
/// "Chain role"). `Singleton` short-circuits both forwarding and
/// acknowledgement: a lone replica is both head and tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainRole {
    Singleton,
    Head,
    Mid,
    Tail,
}

impl ChainRole {
    pub fn is_head(self) -> bool {
        matches!(self, ChainRole::Head | ChainRole::Singleton)
    }

    pub fn is_tail(self) -> bool {
        matches!(self, ChainRole::Tail | ChainRole::Singleton)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_is_both_head_and_tail() {
        assert!(ChainRole::Singleton.is_head());
        assert!(ChainRole::Singleton.is_tail());
    }

    #[test]
    fn mid_is_neither() {
        assert!(!ChainRole::Mid.is_head());
        assert!(!ChainRole::Mid.is_tail());
    }
}
