//! Command IDs and the command table for the hash-table partition
//! (spec.md §4.3).

use jiffy_types::CommandId;

use crate::command::{CommandDescriptor, CommandFlags, CommandTable};

pub const EXISTS: CommandId = CommandId::new(1);
pub const GET: CommandId = CommandId::new(2);
pub const PUT: CommandId = CommandId::new(3);
pub const UPSERT: CommandId = CommandId::new(4);
pub const UPDATE: CommandId = CommandId::new(5);
pub const REMOVE: CommandId = CommandId::new(6);
pub const SCALE_PUT: CommandId = CommandId::new(7);
pub const SCALE_REMOVE: CommandId = CommandId::new(8);
pub const GET_DATA_IN_SLOT_RANGE: CommandId = CommandId::new(9);
pub const UPDATE_PARTITION: CommandId = CommandId::new(10);
pub const GET_METADATA: CommandId = CommandId::new(11);
pub const GET_STORAGE_SIZE: CommandId = CommandId::new(12);

pub fn build_command_table() -> CommandTable {
    let mut table = CommandTable::new();
    table
        .register(CommandDescriptor {
            id: EXISTS,
            name: "exists",
            flags: CommandFlags::accessor(),
        })
        .register(CommandDescriptor {
            id: GET,
            name: "get",
            flags: CommandFlags::accessor(),
        })
        .register(CommandDescriptor {
            id: PUT,
            name: "put",
            flags: CommandFlags::mutation(),
        })
        .register(CommandDescriptor {
            id: UPSERT,
            name: "upsert",
            flags: CommandFlags::mutation(),
        })
        .register(CommandDescriptor {
            id: UPDATE,
            name: "update",
            flags: CommandFlags::mutation(),
        })
        .register(CommandDescriptor {
            id: REMOVE,
            name: "remove",
            flags: CommandFlags::mutation(),
        })
        .register(CommandDescriptor {
            id: SCALE_PUT,
            name: "scale_put",
            flags: CommandFlags::scaling_mutation(),
        })
        .register(CommandDescriptor {
            id: SCALE_REMOVE,
            name: "scale_remove",
            flags: CommandFlags::scaling_mutation(),
        })
        .register(CommandDescriptor {
            id: GET_DATA_IN_SLOT_RANGE,
            name: "get_data_in_slot_range",
            flags: CommandFlags::accessor(),
        })
        .register(CommandDescriptor {
            id: UPDATE_PARTITION,
            name: "update_partition",
            flags: CommandFlags::mutation(),
        })
        .register(CommandDescriptor {
            id: GET_METADATA,
            name: "get_metadata",
            flags: CommandFlags::accessor(),
        })
        .register(CommandDescriptor {
            id: GET_STORAGE_SIZE,
            name: "get_storage_size",
            flags: CommandFlags::accessor(),
        });
    table
}
