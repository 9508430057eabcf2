//! Operation tags, driver capability sets and permission policy.
//!
//! A driver advertises the optional operations it implements through [`Capabilities`]. The
//! facade combines that set with its [`Permissions`] to decide whether an operation may run.

use std::fmt;

/// Every operation the facade can gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetTables,
    GetSchema,
    CreateTable,
    AlterTable,
    DropTable,
    GetFields,
    AddField,
    AlterField,
    RemoveField,
    GetIndexes,
    AddIndex,
    RemoveIndex,
    CreateId,
    Save,
    Find,
    Add,
    Update,
    Remove,
    MapReduce,
    Sql,
    WriteBlob,
    RemoveBlob,
}

/// The permission an operation requires in addition to driver support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Always allowed.
    Read,
    /// Requires `modify_schema`.
    ModifySchema,
    /// Requires the database not to be readonly.
    Write,
    /// Requires an explicit opt-in in the configuration (map-reduce, SQL).
    OptIn,
}

impl Operation {
    pub const ALL: [Operation; 22] = [
        Operation::GetTables,
        Operation::GetSchema,
        Operation::CreateTable,
        Operation::AlterTable,
        Operation::DropTable,
        Operation::GetFields,
        Operation::AddField,
        Operation::AlterField,
        Operation::RemoveField,
        Operation::GetIndexes,
        Operation::AddIndex,
        Operation::RemoveIndex,
        Operation::CreateId,
        Operation::Save,
        Operation::Find,
        Operation::Add,
        Operation::Update,
        Operation::Remove,
        Operation::MapReduce,
        Operation::Sql,
        Operation::WriteBlob,
        Operation::RemoveBlob,
    ];

    fn bit(self) -> u32 {
        1 << (self as u32)
    }

    pub fn permission(self) -> Permission {
        match self {
            Operation::GetTables
            | Operation::GetSchema
            | Operation::GetFields
            | Operation::GetIndexes
            | Operation::Find => Permission::Read,
            Operation::CreateTable
            | Operation::AlterTable
            | Operation::DropTable
            | Operation::AddField
            | Operation::AlterField
            | Operation::RemoveField
            | Operation::AddIndex
            | Operation::RemoveIndex => Permission::ModifySchema,
            Operation::CreateId
            | Operation::Save
            | Operation::Add
            | Operation::Update
            | Operation::Remove
            | Operation::WriteBlob
            | Operation::RemoveBlob => Permission::Write,
            Operation::MapReduce | Operation::Sql => Permission::OptIn,
        }
    }

    /// Whether the operation is backed by the driver (as opposed to the BLOB store).
    pub fn is_driver_operation(self) -> bool {
        !matches!(self, Operation::WriteBlob | Operation::RemoveBlob)
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::GetTables => "get_tables",
            Operation::GetSchema => "get_schema",
            Operation::CreateTable => "create_table",
            Operation::AlterTable => "alter_table",
            Operation::DropTable => "drop_table",
            Operation::GetFields => "get_fields",
            Operation::AddField => "add_field",
            Operation::AlterField => "alter_field",
            Operation::RemoveField => "remove_field",
            Operation::GetIndexes => "get_indexes",
            Operation::AddIndex => "add_index",
            Operation::RemoveIndex => "remove_index",
            Operation::CreateId => "create_id",
            Operation::Save => "save",
            Operation::Find => "find",
            Operation::Add => "add",
            Operation::Update => "update",
            Operation::Remove => "remove",
            Operation::MapReduce => "map_reduce",
            Operation::Sql => "sql",
            Operation::WriteBlob => "write_blob",
            Operation::RemoveBlob => "remove_blob",
        }
    }

    /// The message reported when the operation is refused.
    pub fn denied_message(self) -> &'static str {
        match self {
            Operation::GetTables => "Cannot list tables",
            Operation::GetSchema => "Cannot read the table schema",
            Operation::CreateTable => "Cannot create tables",
            Operation::AlterTable => "Cannot alter tables",
            Operation::DropTable => "Cannot drop tables",
            Operation::GetFields => "Cannot list fields",
            Operation::AddField => "Cannot add fields",
            Operation::AlterField => "Cannot alter fields",
            Operation::RemoveField => "Cannot remove fields",
            Operation::GetIndexes => "Cannot list indexes",
            Operation::AddIndex => "Cannot add indexes",
            Operation::RemoveIndex => "Cannot remove indexes",
            Operation::CreateId => "Cannot create row ids",
            Operation::Save => "Cannot save rows",
            Operation::Find => "Cannot find rows",
            Operation::Add => "Cannot add rows",
            Operation::Update => "Cannot update rows",
            Operation::Remove => "Cannot remove rows",
            Operation::MapReduce => "Cannot run map-reduce",
            Operation::Sql => "Cannot run sql",
            Operation::WriteBlob => "Cannot store blobs",
            Operation::RemoveBlob => "Cannot remove blobs",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of optional operations a driver implements.
///
/// Drivers build their set once and the facade captures it at construction, so capability checks
/// never probe the driver at call time.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const fn empty() -> Self {
        Capabilities(0)
    }

    /// Every driver operation.
    pub fn all() -> Self {
        Operation::ALL
            .into_iter()
            .filter(|op| op.is_driver_operation())
            .collect()
    }

    pub fn with(self, op: Operation) -> Self {
        Capabilities(self.0 | op.bit())
    }

    pub fn without(self, op: Operation) -> Self {
        Capabilities(self.0 & !op.bit())
    }

    pub fn contains(self, op: Operation) -> bool {
        self.0 & op.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Operation> {
        Operation::ALL
            .into_iter()
            .filter(move |op| self.contains(*op))
    }
}

impl FromIterator<Operation> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Capabilities::empty(), Capabilities::with)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Permission policy of a database connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions {
    readonly: bool,
    modify_schema: bool,
}

impl Permissions {
    /// Creates a policy. `modify_schema` is forced off for readonly connections.
    pub fn new(readonly: bool, modify_schema: bool) -> Self {
        Self {
            readonly,
            modify_schema: !readonly && modify_schema,
        }
    }

    pub fn readonly(&self) -> bool {
        self.readonly
    }

    pub fn modify_schema(&self) -> bool {
        self.modify_schema
    }

    /// Whether the policy permits `op`. Opt-in operations are decided by the caller.
    pub fn allows(&self, op: Operation) -> bool {
        match op.permission() {
            Permission::Read | Permission::OptIn => true,
            Permission::ModifySchema => self.modify_schema,
            Permission::Write => !self.readonly,
        }
    }
}
