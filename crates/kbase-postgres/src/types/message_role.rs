//! Chat message role enumeration.

use diesel_derive_enum::DbEnum;
#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Author role of a chat message.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[derive(Serialize, Deserialize, DbEnum, Display, EnumIter, EnumString)]
#[ExistingTypePath = "crate::schema::sql_types::MessageRole"]
pub enum MessageRole {
    /// Message authored by the end user
    #[db_rename = "human"]
    #[serde(rename = "human")]
    #[strum(serialize = "human")]
    Human,

    /// Message authored by the assistant
    #[db_rename = "ai"]
    #[serde(rename = "ai")]
    #[strum(serialize = "ai")]
    Ai,
}
