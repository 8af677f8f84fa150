//! Events tag groups of transactions, e.g. a trip.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub status: EventStatus,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            icon: None,
            status: EventStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EventStatus::Active
    }
}

impl Identifiable for Event {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Event {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Active,
    Inactive,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventStatus::Active => "Active",
            EventStatus::Inactive => "Inactive",
        };
        f.write_str(label)
    }
}
