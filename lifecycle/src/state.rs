//! Resource state model observed by waiters
//!
//! A resource reports up to two independent dimensions: its availability
//! (provisioning / copy lifecycle) and, for compute-class resources, its
//! instance status (power state). Read adapters expose whichever dimensions
//! the resource has through [`ResourceState`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Provisioning / copy state of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Availability {
    #[default]
    Unknown,
    Migrating,
    Uploading,
    Transferring,
    Discontinued,
    Available,
    Failed,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Unknown => "",
            Availability::Migrating => "migrating",
            Availability::Uploading => "uploading",
            Availability::Transferring => "transferring",
            Availability::Discontinued => "discontinued",
            Availability::Available => "available",
            Availability::Failed => "failed",
        }
    }

    /// Parses the API representation; anything unrecognised is `Unknown`.
    pub fn from_api_str(value: &str) -> Self {
        match value {
            "migrating" => Availability::Migrating,
            "uploading" => Availability::Uploading,
            "transferring" => Availability::Transferring,
            "discontinued" => Availability::Discontinued,
            "available" => Availability::Available,
            "failed" => Availability::Failed,
            _ => Availability::Unknown,
        }
    }

    pub fn is_available(&self) -> bool {
        *self == Availability::Available
    }

    pub fn is_failed(&self) -> bool {
        *self == Availability::Failed
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Unknown => f.write_str("unknown"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Power state of a compute-class resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InstanceStatus {
    #[default]
    Unknown,
    Cleaning,
    Down,
    Up,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Unknown => "",
            InstanceStatus::Cleaning => "cleaning",
            InstanceStatus::Down => "down",
            InstanceStatus::Up => "up",
        }
    }

    pub fn from_api_str(value: &str) -> Self {
        match value {
            "cleaning" => InstanceStatus::Cleaning,
            "down" => InstanceStatus::Down,
            "up" => InstanceStatus::Up,
            _ => InstanceStatus::Unknown,
        }
    }

    pub fn is_up(&self) -> bool {
        *self == InstanceStatus::Up
    }

    pub fn is_down(&self) -> bool {
        *self == InstanceStatus::Down
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::Unknown => f.write_str("unknown"),
            other => f.write_str(other.as_str()),
        }
    }
}

impl Serialize for Availability {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Availability {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value
            .as_deref()
            .map(Availability::from_api_str)
            .unwrap_or_default())
    }
}

impl Serialize for InstanceStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for InstanceStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value
            .as_deref()
            .map(InstanceStatus::from_api_str)
            .unwrap_or_default())
    }
}

/// SakuraCloud resource identifier
///
/// The API sends IDs as strings but accepts numbers too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ResourceId(pub u64);

impl ResourceId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ResourceId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::str::FromStr for ResourceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

impl Serialize for ResourceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrU64 {
            String(String),
            U64(u64),
        }

        match StringOrU64::deserialize(deserializer)? {
            StringOrU64::String(s) => s
                .parse::<u64>()
                .map(ResourceId)
                .map_err(serde::de::Error::custom),
            StringOrU64::U64(u) => Ok(ResourceId(u)),
        }
    }
}

/// Capability view over a resource's observed state.
///
/// Each method returns `None` when the resource does not have that
/// dimension; waiters only classify the dimensions that are present.
pub trait ResourceState: Send + 'static {
    fn availability(&self) -> Option<Availability> {
        None
    }

    fn instance_status(&self) -> Option<InstanceStatus> {
        None
    }
}

/// Anything that carries a resource ID
pub trait Identified {
    fn id(&self) -> ResourceId;
}

/// Plain state value for adapters that don't have a richer model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateSnapshot {
    pub id: ResourceId,
    pub availability: Option<Availability>,
    pub instance_status: Option<InstanceStatus>,
}

impl StateSnapshot {
    pub fn new(id: impl Into<ResourceId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = Some(availability);
        self
    }

    pub fn with_instance_status(mut self, status: InstanceStatus) -> Self {
        self.instance_status = Some(status);
        self
    }
}

impl ResourceState for StateSnapshot {
    fn availability(&self) -> Option<Availability> {
        self.availability
    }

    fn instance_status(&self) -> Option<InstanceStatus> {
        self.instance_status
    }
}

impl Identified for StateSnapshot {
    fn id(&self) -> ResourceId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_decodes_api_values() {
        let values: Vec<Availability> =
            serde_json::from_str(r#"["available","migrating","failed","",null,"brand-new"]"#)
                .unwrap();
        assert_eq!(
            values,
            vec![
                Availability::Available,
                Availability::Migrating,
                Availability::Failed,
                Availability::Unknown,
                Availability::Unknown,
                Availability::Unknown,
            ]
        );
    }

    #[test]
    fn instance_status_decodes_api_values() {
        let values: Vec<InstanceStatus> =
            serde_json::from_str(r#"["up","down","cleaning",""]"#).unwrap();
        assert_eq!(
            values,
            vec![
                InstanceStatus::Up,
                InstanceStatus::Down,
                InstanceStatus::Cleaning,
                InstanceStatus::Unknown,
            ]
        );
        assert_eq!(serde_json::to_string(&InstanceStatus::Up).unwrap(), r#""up""#);
    }

    #[test]
    fn resource_id_accepts_string_or_number() {
        let ids: Vec<ResourceId> = serde_json::from_str(r#"["113000000001", 42]"#).unwrap();
        assert_eq!(ids, vec![ResourceId(113000000001), ResourceId(42)]);
        assert_eq!(
            serde_json::to_string(&ResourceId(42)).unwrap(),
            r#""42""#
        );
        assert!(serde_json::from_str::<ResourceId>(r#""abc""#).is_err());
    }

    #[test]
    fn snapshot_exposes_only_configured_dimensions() {
        let disk = StateSnapshot::new(1u64).with_availability(Availability::Migrating);
        assert_eq!(disk.availability(), Some(Availability::Migrating));
        assert_eq!(disk.instance_status(), None);

        let server = StateSnapshot::new(2u64).with_instance_status(InstanceStatus::Down);
        assert_eq!(server.availability(), None);
        assert!(server.instance_status().unwrap().is_down());
        assert_eq!(server.id(), ResourceId(2));
    }
}
