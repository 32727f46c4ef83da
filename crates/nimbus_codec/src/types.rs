//! Operation and resource type enumerations.
//!
//! There are two layers. The logical [`OperationType`] and [`ResourceType`]
//! are what the rest of the driver speaks. The wire enums
//! [`WireOperationType`] and [`WireResourceType`] are the closed sets of
//! 16-bit ids the server understands. Not every logical value has a wire id.

use crate::error::{CodecError, CodecResult};
use std::fmt;
use std::str::FromStr;

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident = $id:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                #[doc = concat!("Wire id `", stringify!($id), "`.")]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in id order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Returns the 16-bit id written on the wire.
            pub const fn id(self) -> u16 {
                match self {
                    $($name::$variant => $id,)+
                }
            }

            /// Looks up a variant by its wire id.
            ///
            /// # Errors
            ///
            /// Returns [`CodecError::ProtocolDecode`] for ids this client
            /// does not know.
            pub fn from_id(id: u16) -> CodecResult<Self> {
                match id {
                    $($id => Ok($name::$variant),)+
                    code => Err(CodecError::ProtocolDecode { field: $field, code }),
                }
            }

            /// Returns the variant name.
            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

macro_rules! logical_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Every variant.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Returns the variant name.
            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $name {
            type Err = String;

            /// Parses a variant name, ignoring case, `-` and `_`.
            ///
            /// The wire name of a variant is accepted too, so that the
            /// `Display` output of a decoded frame parses back.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted: String = s
                    .chars()
                    .filter(|c| *c != '-' && *c != '_')
                    .collect::<String>()
                    .to_ascii_lowercase();
                let by_name = Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.name().to_ascii_lowercase() == wanted);
                let by_wire_name = || {
                    let mut matches = Self::ALL.iter().copied().filter(|v| {
                        v.to_wire()
                            .map(|w| w.name().to_ascii_lowercase() == wanted)
                            .unwrap_or(false)
                    });
                    match (matches.next(), matches.next()) {
                        (Some(v), None) => Some(v),
                        _ => None,
                    }
                };
                by_name
                    .or_else(by_wire_name)
                    .ok_or_else(|| format!("unknown {}: {}", stringify!($name), s))
            }
        }
    };
}

wire_enum! {
    /// Operation type ids understood by the server.
    WireOperationType, "operation type" {
        Connection = 0x0000,
        Create = 0x0001,
        Update = 0x0002,
        Read = 0x0003,
        ReadFeed = 0x0004,
        Delete = 0x0005,
        Replace = 0x0006,
        ExecuteJavaScript = 0x0008,
        SqlQuery = 0x0009,
        Pause = 0x000A,
        Resume = 0x000B,
        Stop = 0x000C,
        Recycle = 0x000D,
        Crash = 0x000E,
        Query = 0x000F,
        ForceConfigRefresh = 0x0010,
        Head = 0x0011,
        HeadFeed = 0x0012,
        Upsert = 0x0013,
        Recreate = 0x0014,
        Throttle = 0x0015,
        GetSplitPoint = 0x0016,
        PreCreateValidation = 0x0017,
        BatchApply = 0x0018,
        AbortSplit = 0x0019,
        CompleteSplit = 0x001A,
        OfferUpdateOperation = 0x001B,
        OfferPreGrowValidation = 0x001C,
        BatchReportThroughputUtilization = 0x001D,
        CompletePartitionMigration = 0x001E,
        AbortPartitionMigration = 0x001F,
        PreReplaceValidation = 0x0020,
        AddComputeGatewayRequestCharges = 0x0021,
        MigratePartition = 0x0022,
    }
}

wire_enum! {
    /// Resource type ids understood by the server.
    WireResourceType, "resource type" {
        Connection = 0x0000,
        Database = 0x0001,
        Collection = 0x0002,
        Document = 0x0003,
        Attachment = 0x0004,
        User = 0x0005,
        Permission = 0x0006,
        StoredProcedure = 0x0007,
        Conflict = 0x0008,
        Trigger = 0x0009,
        UserDefinedFunction = 0x000A,
        Module = 0x000B,
        Replica = 0x000C,
        ModuleCommand = 0x000D,
        Record = 0x000E,
        Offer = 0x000F,
        PartitionSetInformation = 0x0010,
        XpReplicatorAddress = 0x0011,
        MasterPartition = 0x0012,
        ServerPartition = 0x0013,
        DatabaseAccount = 0x0014,
        Topology = 0x0015,
        PartitionKeyRange = 0x0016,
        Schema = 0x0018,
        BatchApply = 0x0019,
        RestoreMetadata = 0x001A,
        ComputeGatewayCharges = 0x001B,
        RidRange = 0x001C,
        UserDefinedType = 0x001D,
    }
}

logical_enum! {
    /// The kind of operation a request performs.
    OperationType {
        /// Create a resource.
        Create,
        /// Partially update a resource.
        Update,
        /// Read a single resource.
        Read,
        /// Enumerate a feed of resources.
        ReadFeed,
        /// Delete a resource.
        Delete,
        /// Replace a resource.
        Replace,
        /// Execute a stored procedure.
        ExecuteJavaScript,
        /// Execute a SQL query.
        SqlQuery,
        /// Execute a native query.
        Query,
        /// Read resource metadata only.
        Head,
        /// Read feed metadata only.
        HeadFeed,
        /// Create or replace a resource.
        Upsert,
        /// Pause a replica.
        Pause,
        /// Resume a replica.
        Resume,
        /// Stop a replica.
        Stop,
        /// Recycle a replica.
        Recycle,
        /// Crash a replica (fault injection).
        Crash,
        /// Force the server to reload its configuration.
        ForceConfigRefresh,
        /// Recreate a resource.
        Recreate,
        /// Throttle a replica.
        Throttle,
        /// Compute a partition split point.
        GetSplitPoint,
        /// Validate a create before executing it.
        PreCreateValidation,
        /// Apply a batch of operations.
        BatchApply,
        /// Abort a partition split.
        AbortSplit,
        /// Complete a partition split.
        CompleteSplit,
        /// Update a throughput offer.
        OfferUpdateOperation,
        /// Validate an offer before growing it.
        OfferPreGrowValidation,
        /// Report throughput utilization for a batch.
        BatchReportThroughputUtilization,
        /// Abort a partition migration.
        AbortPartitionMigration,
        /// Complete a partition migration.
        CompletePartitionMigration,
        /// Validate a replace before executing it.
        PreReplaceValidation,
        /// Migrate a partition.
        MigratePartition,
        /// Add request charges computed by a gateway.
        AddComputeGatewayRequestCharges,
        /// Fetch a query plan. Gateway only, never framed.
        QueryPlan,
        /// Read a replica set from the master partition. Gateway only.
        ReadReplicaFromMasterPartition,
    }
}

logical_enum! {
    /// The kind of resource a request addresses.
    ResourceType {
        /// Attachment metadata.
        Attachment,
        /// A document collection (container).
        DocumentCollection,
        /// A replication conflict.
        Conflict,
        /// A database.
        Database,
        /// A document.
        Document,
        /// A server module.
        Module,
        /// A server module command.
        ModuleCommand,
        /// A record.
        Record,
        /// A permission.
        Permission,
        /// A replica.
        Replica,
        /// A stored procedure.
        StoredProcedure,
        /// A trigger.
        Trigger,
        /// A user.
        User,
        /// A user-defined type.
        UserDefinedType,
        /// A user-defined function.
        UserDefinedFunction,
        /// A throughput offer.
        Offer,
        /// Partition set information.
        PartitionSetInformation,
        /// Replicator address.
        XpReplicatorAddress,
        /// The master partition.
        MasterPartition,
        /// A server partition.
        ServerPartition,
        /// The database account.
        DatabaseAccount,
        /// Cluster topology.
        Topology,
        /// A partition key range.
        PartitionKeyRange,
        /// A schema.
        Schema,
        /// A batch of operations.
        BatchApply,
        /// Restore metadata.
        RestoreMetadata,
        /// Gateway-computed charges.
        ComputeGatewayCharges,
        /// A resource id range.
        RidRange,
        /// Replica addresses. Gateway only, never framed.
        Address,
        /// Attachment media content. Gateway only, never framed.
        Media,
    }
}

impl OperationType {
    /// Returns true if the operation does not modify any resource.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            OperationType::Read
                | OperationType::ReadFeed
                | OperationType::Head
                | OperationType::HeadFeed
                | OperationType::Query
                | OperationType::SqlQuery
                | OperationType::QueryPlan
        )
    }

    /// Maps the operation to its wire id.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedOperation`] for gateway-only
    /// operations.
    pub fn to_wire(self) -> CodecResult<WireOperationType> {
        use WireOperationType as W;
        let wire = match self {
            OperationType::Create => W::Create,
            OperationType::Update => W::Update,
            OperationType::Read => W::Read,
            OperationType::ReadFeed => W::ReadFeed,
            OperationType::Delete => W::Delete,
            OperationType::Replace => W::Replace,
            OperationType::ExecuteJavaScript => W::ExecuteJavaScript,
            OperationType::SqlQuery => W::SqlQuery,
            OperationType::Query => W::Query,
            OperationType::Head => W::Head,
            OperationType::HeadFeed => W::HeadFeed,
            OperationType::Upsert => W::Upsert,
            OperationType::Pause => W::Pause,
            OperationType::Resume => W::Resume,
            OperationType::Stop => W::Stop,
            OperationType::Recycle => W::Recycle,
            OperationType::Crash => W::Crash,
            OperationType::ForceConfigRefresh => W::ForceConfigRefresh,
            OperationType::Recreate => W::Recreate,
            OperationType::Throttle => W::Throttle,
            OperationType::GetSplitPoint => W::GetSplitPoint,
            OperationType::PreCreateValidation => W::PreCreateValidation,
            OperationType::BatchApply => W::BatchApply,
            OperationType::AbortSplit => W::AbortSplit,
            OperationType::CompleteSplit => W::CompleteSplit,
            OperationType::OfferUpdateOperation => W::OfferUpdateOperation,
            OperationType::OfferPreGrowValidation => W::OfferPreGrowValidation,
            OperationType::BatchReportThroughputUtilization => {
                W::BatchReportThroughputUtilization
            }
            OperationType::AbortPartitionMigration => W::AbortPartitionMigration,
            OperationType::CompletePartitionMigration => W::CompletePartitionMigration,
            OperationType::PreReplaceValidation => W::PreReplaceValidation,
            OperationType::MigratePartition => W::MigratePartition,
            OperationType::AddComputeGatewayRequestCharges => W::AddComputeGatewayRequestCharges,
            OperationType::QueryPlan | OperationType::ReadReplicaFromMasterPartition => {
                return Err(CodecError::UnsupportedOperation {
                    operation: self.name(),
                })
            }
        };
        Ok(wire)
    }
}

impl ResourceType {
    /// Maps the resource to its wire id.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedResource`] for gateway-only
    /// resources.
    pub fn to_wire(self) -> CodecResult<WireResourceType> {
        use WireResourceType as W;
        let wire = match self {
            ResourceType::Attachment => W::Attachment,
            ResourceType::DocumentCollection => W::Collection,
            ResourceType::Conflict => W::Conflict,
            ResourceType::Database => W::Database,
            ResourceType::Document => W::Document,
            ResourceType::Module => W::Module,
            ResourceType::ModuleCommand => W::ModuleCommand,
            ResourceType::Record => W::Record,
            ResourceType::Permission => W::Permission,
            ResourceType::Replica => W::Replica,
            ResourceType::StoredProcedure => W::StoredProcedure,
            ResourceType::Trigger => W::Trigger,
            ResourceType::User => W::User,
            ResourceType::UserDefinedType => W::UserDefinedType,
            ResourceType::UserDefinedFunction => W::UserDefinedFunction,
            ResourceType::Offer => W::Offer,
            ResourceType::PartitionSetInformation => W::PartitionSetInformation,
            ResourceType::XpReplicatorAddress => W::XpReplicatorAddress,
            ResourceType::MasterPartition => W::MasterPartition,
            ResourceType::ServerPartition => W::ServerPartition,
            ResourceType::DatabaseAccount => W::DatabaseAccount,
            ResourceType::Topology => W::Topology,
            ResourceType::PartitionKeyRange => W::PartitionKeyRange,
            ResourceType::Schema => W::Schema,
            ResourceType::BatchApply => W::BatchApply,
            ResourceType::RestoreMetadata => W::RestoreMetadata,
            ResourceType::ComputeGatewayCharges => W::ComputeGatewayCharges,
            ResourceType::RidRange => W::RidRange,
            ResourceType::Address | ResourceType::Media => {
                return Err(CodecError::UnsupportedResource {
                    resource: self.name(),
                })
            }
        };
        Ok(wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn wire_ids_are_unique() {
        let ops: HashSet<u16> = WireOperationType::ALL.iter().map(|o| o.id()).collect();
        assert_eq!(ops.len(), WireOperationType::ALL.len());

        let resources: HashSet<u16> = WireResourceType::ALL.iter().map(|r| r.id()).collect();
        assert_eq!(resources.len(), WireResourceType::ALL.len());
    }

    #[test]
    fn from_id_inverts_id() {
        for op in WireOperationType::ALL {
            assert_eq!(WireOperationType::from_id(op.id()).unwrap(), *op);
        }
        for resource in WireResourceType::ALL {
            assert_eq!(WireResourceType::from_id(resource.id()).unwrap(), *resource);
        }
    }

    #[test]
    fn unknown_ids_are_protocol_errors() {
        // 0x0007 and 0x0017 are holes in the id space
        assert_eq!(
            WireOperationType::from_id(0x0007),
            Err(CodecError::ProtocolDecode {
                field: "operation type",
                code: 0x0007
            })
        );
        assert_eq!(
            WireResourceType::from_id(0x0017),
            Err(CodecError::ProtocolDecode {
                field: "resource type",
                code: 0x0017
            })
        );
        assert!(WireOperationType::from_id(u16::MAX).is_err());
    }

    #[test]
    fn gateway_only_types_are_unsupported() {
        assert_eq!(
            OperationType::QueryPlan.to_wire(),
            Err(CodecError::UnsupportedOperation {
                operation: "QueryPlan"
            })
        );
        assert!(OperationType::ReadReplicaFromMasterPartition
            .to_wire()
            .is_err());
        assert_eq!(
            ResourceType::Media.to_wire(),
            Err(CodecError::UnsupportedResource { resource: "Media" })
        );
        assert!(ResourceType::Address.to_wire().is_err());
    }

    #[test]
    fn logical_mapping() {
        assert_eq!(
            ResourceType::DocumentCollection.to_wire().unwrap(),
            WireResourceType::Collection
        );
        assert_eq!(
            OperationType::SqlQuery.to_wire().unwrap(),
            WireOperationType::SqlQuery
        );
    }

    #[test]
    fn read_only_classification() {
        assert!(OperationType::Read.is_read_only());
        assert!(OperationType::Query.is_read_only());
        assert!(OperationType::HeadFeed.is_read_only());
        assert!(!OperationType::Create.is_read_only());
        assert!(!OperationType::Upsert.is_read_only());
        assert!(!OperationType::ExecuteJavaScript.is_read_only());
    }

    #[test]
    fn parse_names() {
        assert_eq!("read".parse::<OperationType>().unwrap(), OperationType::Read);
        assert_eq!(
            "read-feed".parse::<OperationType>().unwrap(),
            OperationType::ReadFeed
        );
        assert_eq!(
            "document_collection".parse::<ResourceType>().unwrap(),
            ResourceType::DocumentCollection
        );
        assert!("bogus".parse::<ResourceType>().is_err());
    }

    #[test]
    fn parse_wire_names() {
        assert_eq!(
            "Collection".parse::<ResourceType>().unwrap(),
            ResourceType::DocumentCollection
        );
        for resource in ResourceType::ALL {
            if let Ok(wire) = resource.to_wire() {
                assert_eq!(wire.name().parse::<ResourceType>().unwrap(), *resource);
            }
        }
        for op in OperationType::ALL {
            if let Ok(wire) = op.to_wire() {
                assert_eq!(wire.name().parse::<OperationType>().unwrap(), *op);
            }
        }
    }
}
