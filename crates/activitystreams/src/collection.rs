use crate::*;
use serde_json::Value;
use serde_with::skip_serializing_none;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum OrderedCollectionType {
    OrderedCollection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum OrderedCollectionPageType {
    OrderedCollectionPage,
}

const COLLECTION_TYPE: &str = "OrderedCollection";
const PAGE_TYPE: &str = "OrderedCollectionPage";

/// Root descriptor of an activity stream.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedCollection {
    #[serde(rename = "@context")]
    pub context: Context,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OrderedCollectionType,
    pub first: Option<Link>,
    pub last: Link,
    /// Advisory only, never checked against what a traversal yields.
    pub total_items: Option<u64>,
}

/// One fetched slice of the stream. `ordered_items` keeps the server's
/// order, oldest activity first.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedCollectionPage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OrderedCollectionPageType,
    pub start_index: u64,
    pub part_of: Link,
    pub prev: Option<Link>,
    pub next: Option<Link>,
    pub ordered_items: Vec<Activity>,
}

impl OrderedCollectionPage {
    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.ordered_items.iter()
    }
}

fn expect_type(obj: &Object, record: &'static str, expected: &'static str) -> Result<()> {
    let found = required_str(obj, record, "type")?;
    if found != expected {
        return Err(Error::UnexpectedType { expected, found });
    }
    Ok(())
}

fn optional_link(obj: &Object, field: &'static str) -> Result<Option<Link>> {
    present(obj, field)
        .map(|value| Link::decode(value, field))
        .transpose()
}

pub fn decode_page(value: &Value) -> Result<OrderedCollectionPage> {
    const RECORD: &str = "page";
    let obj = as_object(value, RECORD)?;
    let id = required_str(obj, RECORD, "id")?;
    expect_type(obj, RECORD, PAGE_TYPE)?;
    let start_index = required(obj, RECORD, "startIndex")?
        .as_u64()
        .ok_or(Error::InvalidField {
            record: RECORD,
            field: "startIndex",
        })?;
    let part_of = Link::decode(required(obj, RECORD, "partOf")?, "partOf")?;
    let ordered_items = required(obj, RECORD, "orderedItems")?
        .as_array()
        .ok_or(Error::InvalidField {
            record: RECORD,
            field: "orderedItems",
        })?
        .iter()
        .map(decode_activity)
        .collect::<Result<Vec<_>>>()?;

    Ok(OrderedCollectionPage {
        id,
        kind: OrderedCollectionPageType::OrderedCollectionPage,
        start_index,
        part_of,
        prev: optional_link(obj, "prev")?,
        next: optional_link(obj, "next")?,
        ordered_items,
    })
}

pub fn decode_page_bytes(body: &[u8]) -> Result<OrderedCollectionPage> {
    let value: Value = serde_json::from_slice(body)?;
    decode_page(&value)
}

pub fn decode_collection(body: &[u8]) -> Result<OrderedCollection> {
    const RECORD: &str = "collection";
    let value: Value = serde_json::from_slice(body)?;
    let obj = as_object(&value, RECORD)?;
    let id = required_str(obj, RECORD, "id")?;
    let context = Context::decode(required(obj, RECORD, "@context")?)?;
    expect_type(obj, RECORD, COLLECTION_TYPE)?;
    let last = Link::decode(required(obj, RECORD, "last")?, "last")?;
    let total_items = present(obj, "totalItems")
        .map(|value| {
            value.as_u64().ok_or(Error::InvalidField {
                record: RECORD,
                field: "totalItems",
            })
        })
        .transpose()?;

    Ok(OrderedCollection {
        context,
        id,
        kind: OrderedCollectionType::OrderedCollection,
        first: optional_link(obj, "first")?,
        last,
        total_items,
    })
}
