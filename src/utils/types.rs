//! Module for type aliases that help to better identify field types

use uuid::Uuid;

pub type UserId = Uuid;
pub type Port = u16;
