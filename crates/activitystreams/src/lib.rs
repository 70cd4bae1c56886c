pub mod activities;
pub mod collection;
pub mod traverse;

use std::fmt;

use miette::Diagnostic;
use serde::Serialize;
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use thiserror::Error;

pub use activities::{decode_activity, Activity, ActivityKind, ActorKind};
pub use collection::{
    decode_collection, decode_page, decode_page_bytes, OrderedCollection, OrderedCollectionPage,
};
pub use traverse::{
    activities_reverse, fetch_collection, pages_reverse, ActivitiesReverse, Fetch, FetchOptions,
    HttpFetcher, PagesReverse,
};

pub const IIIF_DISCOVERY_CONTEXT: &str = "http://iiif.io/api/discovery/1/context.json";

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("response body is not valid JSON")]
    MalformedJson(#[from] serde_json::Error),

    #[error("{record} must be a JSON object")]
    NotAnObject { record: &'static str },

    #[error("{record} is missing required field `{field}`")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    #[error("field `{field}` of {record} has an unexpected value")]
    InvalidField {
        record: &'static str,
        field: &'static str,
    },

    #[error("expected a {expected} but got type {found}")]
    UnexpectedType {
        expected: &'static str,
        found: String,
    },

    #[error("unknown activity type {0}")]
    #[diagnostic(help("known types are Create, Update, Delete, Move, Add, Remove and Refresh"))]
    UnknownActivityKind(String),

    #[error("field `{field}` is not an RFC 3339 timestamp: {value}")]
    MalformedTimestamp {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("could not fetch {url}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Client(#[from] reqwest::Error),

    #[error("page {0} was already visited, the prev chain loops")]
    PageCycle(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) type Object = Map<String, Value>;

pub(crate) fn as_object<'a>(value: &'a Value, record: &'static str) -> Result<&'a Object> {
    value.as_object().ok_or(Error::NotAnObject { record })
}

/// Looks up `field`, treating an explicit JSON `null` like an absent key.
pub(crate) fn present<'a>(obj: &'a Object, field: &str) -> Option<&'a Value> {
    obj.get(field).filter(|value| !value.is_null())
}

pub(crate) fn required<'a>(
    obj: &'a Object,
    record: &'static str,
    field: &'static str,
) -> Result<&'a Value> {
    present(obj, field).ok_or(Error::MissingField { record, field })
}

pub(crate) fn required_str(
    obj: &Object,
    record: &'static str,
    field: &'static str,
) -> Result<String> {
    required(obj, record, field)?
        .as_str()
        .map(str::to_owned)
        .ok_or(Error::InvalidField { record, field })
}

pub(crate) fn optional_str(
    obj: &Object,
    record: &'static str,
    field: &'static str,
) -> Result<Option<String>> {
    present(obj, field)
        .map(|value| {
            value
                .as_str()
                .map(str::to_owned)
                .ok_or(Error::InvalidField { record, field })
        })
        .transpose()
}

/// Protocol context of a collection, either one URI or a list of them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Context {
    Single(String),
    List(Vec<String>),
}

impl Context {
    pub(crate) fn decode(value: &Value) -> Result<Self> {
        let invalid = || Error::InvalidField {
            record: "collection",
            field: "@context",
        };
        match value {
            Value::String(uri) => Ok(Context::Single(uri.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_owned).ok_or_else(invalid))
                .collect::<Result<Vec<_>>>()
                .map(Context::List),
            _ => Err(invalid()),
        }
    }

    pub fn contains(&self, uri: &str) -> bool {
        match self {
            Context::Single(single) => single == uri,
            Context::List(list) => list.iter().any(|item| item == uri),
        }
    }
}

/// Reference to a page or collection. Servers send either the bare URL or
/// an object carrying `id` and `type`.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Link {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl Link {
    pub(crate) fn decode(value: &Value, field: &'static str) -> Result<Self> {
        match value {
            Value::String(id) => Ok(Link {
                id: id.clone(),
                kind: None,
            }),
            Value::Object(obj) => Ok(Link {
                id: required_str(obj, field, "id")?,
                kind: optional_str(obj, field, "type")?,
            }),
            _ => Err(Error::NotAnObject { record: field }),
        }
    }
}

/// The object an activity acted upon.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub see_also: Option<Value>,
    /// Must be a string when present, anything else is `InvalidField`.
    pub canonical: Option<String>,
    pub provider: Option<Value>,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} {}", self.kind, id),
            None => write!(f, "{} (anonymous)", self.kind),
        }
    }
}

pub fn decode_resource(value: &Value) -> Result<Resource> {
    const RECORD: &str = "resource";
    let obj = as_object(value, RECORD)?;
    Ok(Resource {
        id: optional_str(obj, RECORD, "id")?,
        kind: required_str(obj, RECORD, "type")?,
        see_also: present(obj, "seeAlso").cloned(),
        canonical: optional_str(obj, RECORD, "canonical")?,
        provider: present(obj, "provider").cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_without_optional_fields() {
        let resource = decode_resource(&json!({"id": "r1", "type": "Manifest"})).unwrap();
        assert_eq!(resource.id.as_deref(), Some("r1"));
        assert_eq!(resource.kind, "Manifest");
        assert_eq!(resource.see_also, None);
        assert_eq!(resource.canonical, None);
        assert_eq!(resource.provider, None);
    }

    #[test]
    fn resource_keeps_optional_fields_verbatim() {
        let see_also = json!([{"id": "https://example.org/r1.xml", "type": "Dataset", "format": "text/xml"}]);
        let provider = json!([{"id": "https://example.org/", "type": "Agent"}]);
        let resource = decode_resource(&json!({
            "id": "r1",
            "type": "Manifest",
            "seeAlso": see_also,
            "canonical": "https://example.org/canonical/r1",
            "provider": provider,
        }))
        .unwrap();
        assert_eq!(resource.see_also, Some(see_also));
        assert_eq!(resource.canonical.as_deref(), Some("https://example.org/canonical/r1"));
        assert_eq!(resource.provider, Some(provider));
    }

    #[test]
    fn anonymous_resource() {
        let resource = decode_resource(&json!({"id": null, "type": "Collection"})).unwrap();
        assert_eq!(resource.id, None);
        assert_eq!(resource.to_string(), "Collection (anonymous)");

        let resource = decode_resource(&json!({"type": "Collection"})).unwrap();
        assert_eq!(resource.id, None);
    }

    #[test]
    fn canonical_must_be_a_string() {
        let err = decode_resource(&json!({"id": "r1", "type": "Manifest", "canonical": 7})).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidField {
                record: "resource",
                field: "canonical"
            }
        ));
    }

    #[test]
    fn resource_requires_type() {
        let err = decode_resource(&json!({"id": "r1"})).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField {
                record: "resource",
                field: "type"
            }
        ));
    }

    #[test]
    fn link_from_string_or_object() {
        let link = Link::decode(&json!("https://example.org/page/1"), "prev").unwrap();
        assert_eq!(link.id, "https://example.org/page/1");
        assert_eq!(link.kind, None);

        let link = Link::decode(
            &json!({"id": "https://example.org/page/1", "type": "OrderedCollectionPage"}),
            "prev",
        )
        .unwrap();
        assert_eq!(link.kind.as_deref(), Some("OrderedCollectionPage"));

        let err = Link::decode(&json!({"type": "OrderedCollectionPage"}), "last").unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField {
                record: "last",
                field: "id"
            }
        ));
    }

    #[test]
    fn context_single_and_list() {
        let single = Context::decode(&json!(IIIF_DISCOVERY_CONTEXT)).unwrap();
        assert!(single.contains(IIIF_DISCOVERY_CONTEXT));

        let list = Context::decode(&json!([
            "http://iiif.io/api/discovery/1/context.json",
            "https://www.w3.org/ns/activitystreams"
        ]))
        .unwrap();
        assert!(list.contains("https://www.w3.org/ns/activitystreams"));

        assert!(Context::decode(&json!(42)).is_err());
    }
}
