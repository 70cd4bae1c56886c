use crate::*;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ActivityKind {
    Create,
    Update,
    Delete,
    Move,
    Add,
    Remove,
    Refresh,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 7] = [
        ActivityKind::Create,
        ActivityKind::Update,
        ActivityKind::Delete,
        ActivityKind::Move,
        ActivityKind::Add,
        ActivityKind::Remove,
        ActivityKind::Refresh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Create => "Create",
            ActivityKind::Update => "Update",
            ActivityKind::Delete => "Delete",
            ActivityKind::Move => "Move",
            ActivityKind::Add => "Add",
            ActivityKind::Remove => "Remove",
            ActivityKind::Refresh => "Refresh",
        }
    }
}

impl FromStr for ActivityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ActivityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownActivityKind(s.to_owned()))
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ActorKind {
    Application,
    Organization,
    Person,
}

impl ActorKind {
    pub fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "Application" => Some(ActorKind::Application),
            "Organization" => Some(ActorKind::Organization),
            "Person" => Some(ActorKind::Person),
            _ => None,
        }
    }
}

/// One change event of the feed.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub object: Resource,
    pub target: Option<Value>,
    /// Must be a string when present, anything else is `InvalidField`.
    pub summary: Option<String>,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub actor: Option<Value>,
}

impl Activity {
    /// Kind of the actor, when the actor names one of the known types.
    pub fn actor_kind(&self) -> Option<ActorKind> {
        self.actor
            .as_ref()?
            .get("type")?
            .as_str()
            .and_then(ActorKind::from_type)
    }
}

const RECORD: &str = "activity";

fn timestamp(obj: &Object, field: &'static str) -> Result<Option<DateTime<FixedOffset>>> {
    optional_str(obj, RECORD, field)?
        .map(|value| {
            DateTime::parse_from_rfc3339(&value).map_err(|source| Error::MalformedTimestamp {
                field,
                value,
                source,
            })
        })
        .transpose()
}

pub fn decode_activity(value: &Value) -> Result<Activity> {
    let obj = as_object(value, RECORD)?;
    let id = required_str(obj, RECORD, "id")?;
    let kind = required_str(obj, RECORD, "type")?.parse()?;
    let object = decode_resource(required(obj, RECORD, "object")?)?;

    Ok(Activity {
        id,
        kind,
        object,
        target: present(obj, "target").cloned(),
        summary: optional_str(obj, RECORD, "summary")?,
        start_time: timestamp(obj, "startTime")?,
        end_time: timestamp(obj, "endTime")?,
        actor: present(obj, "actor").cloned(),
    })
}
