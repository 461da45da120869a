//! # jiffy-types: Core types for the Jiffy storage-block chain engine
//!
//! Shared, dependency-free types used across the engine:
//! - Identifiers ([`ClientId`], [`BlockId`], [`CommandId`])
//! - Ordering ([`SequenceId`])
//! - Hash-slot territory ([`SlotRange`])
//! - Block naming ([`BlockName`])
//! - Command argument framing ([`ArgList`], [`sentinel`])

mod args;
mod block_name;
mod ids;
mod sequence;
mod slot;

pub use args::{arg, sentinel, status, status_with, ArgList};
pub use block_name::{BlockName, BlockNameError};
pub use ids::{BlockId, ClientId, CommandId};
pub use sequence::SequenceId;
pub use slot::{SlotRange, SlotRangeParseError, SLOT_UNIVERSE};
