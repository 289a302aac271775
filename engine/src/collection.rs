//! The fixed set of collections held by the local store.
//!
//! Every entity type of the clinic API gets one collection. Collections are
//! independent partitions: the engine enforces no referential integrity
//! between them.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Field holding the server-side identifier of every entity.
pub const KEY_FIELD: &str = "_id";

/// Sync metadata fields that may leak into payloads (older clients stored
/// them inline) and must never reach the server.
pub const RESERVED_FIELDS: [&str; 6] = [
    "syncState",
    "endpoint",
    "payloadEncoding",
    "collection",
    "revision",
    "updatedAt",
];

/// A named partition of same-typed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Collection {
    Appointments,
    Clinics,
    Doctors,
    Invoices,
    Medicines,
    Patients,
    Prescriptions,
    Receptionists,
    SellRecords,
    Suppliers,
    Users,
}

impl Collection {
    /// Every collection, in scan order.
    pub const ALL: [Collection; 11] = [
        Collection::Appointments,
        Collection::Clinics,
        Collection::Doctors,
        Collection::Invoices,
        Collection::Medicines,
        Collection::Patients,
        Collection::Prescriptions,
        Collection::Receptionists,
        Collection::SellRecords,
        Collection::Suppliers,
        Collection::Users,
    ];

    /// Wire and storage name of the collection.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Appointments => "appointments",
            Collection::Clinics => "clinics",
            Collection::Doctors => "doctors",
            Collection::Invoices => "invoices",
            Collection::Medicines => "medicines",
            Collection::Patients => "patients",
            Collection::Prescriptions => "prescriptions",
            Collection::Receptionists => "receptionists",
            Collection::SellRecords => "sell-records",
            Collection::Suppliers => "suppliers",
            Collection::Users => "users",
        }
    }

    /// Name of the unique identifier field for this collection.
    pub fn key_field(&self) -> &'static str {
        match self {
            Collection::Appointments
            | Collection::Clinics
            | Collection::Doctors
            | Collection::Invoices
            | Collection::Medicines
            | Collection::Patients
            | Collection::Prescriptions
            | Collection::Receptionists
            | Collection::SellRecords
            | Collection::Suppliers
            | Collection::Users => KEY_FIELD,
        }
    }

    /// Whether a payload field is engine-owned and stripped before dispatch.
    pub fn is_reserved_field(&self, field: &str) -> bool {
        field == self.key_field() || RESERVED_FIELDS.contains(&field)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::UnknownCollection(s.to_string()))
    }
}
