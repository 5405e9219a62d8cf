//! Change-stream records in the DynamoDB Streams JSON shape.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventAction {
    Insert,
    Modify,
    Remove,
}

impl EventAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventAction::Insert => "INSERT",
            EventAction::Modify => "MODIFY",
            EventAction::Remove => "REMOVE",
        }
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed attribute value as it appears in a stream image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StreamAttribute {
    #[serde(rename = "S")]
    String(String),
    #[serde(rename = "N")]
    Number(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "SS")]
    StringSet(Vec<String>),
    #[serde(rename = "NS")]
    NumberSet(Vec<String>),
    /// Base64 encoded, kept as the encoded string.
    #[serde(rename = "B")]
    Binary(String),
    #[serde(rename = "BS")]
    BinarySet(Vec<String>),
    #[serde(rename = "L")]
    List(Vec<StreamAttribute>),
    #[serde(rename = "M")]
    Map(HashMap<String, StreamAttribute>),
    #[serde(rename = "NULL")]
    Null(bool),
}

fn number_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

impl StreamAttribute {
    /// Plain JSON with the type tags removed. Numbers that do not parse are
    /// kept as strings.
    pub fn to_json(&self) -> Value {
        match self {
            StreamAttribute::String(s) | StreamAttribute::Binary(s) => Value::String(s.clone()),
            StreamAttribute::Number(n) => number_value(n),
            StreamAttribute::Bool(b) => Value::Bool(*b),
            StreamAttribute::StringSet(set) | StreamAttribute::BinarySet(set) => {
                Value::Array(set.iter().cloned().map(Value::String).collect())
            }
            StreamAttribute::NumberSet(set) => {
                Value::Array(set.iter().map(|n| number_value(n)).collect())
            }
            StreamAttribute::List(items) => {
                Value::Array(items.iter().map(StreamAttribute::to_json).collect())
            }
            StreamAttribute::Map(map) => Value::Object(image_to_item(map)),
            StreamAttribute::Null(_) => Value::Null,
        }
    }
}

pub type Image = HashMap<String, StreamAttribute>;

/// Plain JSON object for an image. `NULL` attributes are left out so the
/// decoded field takes its default.
pub fn image_to_item(image: &Image) -> Map<String, Value> {
    image
        .iter()
        .filter(|(_, attribute)| !matches!(attribute, StreamAttribute::Null(_)))
        .map(|(name, attribute)| (name.clone(), attribute.to_json()))
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StreamChange {
    pub keys: Image,
    pub new_image: Option<Image>,
    pub old_image: Option<Image>,
    pub stream_view_type: Option<String>,
    pub sequence_number: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEventRecord {
    #[serde(rename = "eventID", default)]
    pub event_id: String,
    #[serde(rename = "eventName")]
    pub event_action: EventAction,
    /// ARN of the stream; the source table is derived from it.
    #[serde(rename = "eventSourceARN")]
    pub source_arn: String,
    #[serde(rename = "dynamodb", default)]
    pub change: StreamChange,
}

impl ChangeEventRecord {
    /// Decodes one raw record of a batch.
    pub fn from_value(raw: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(raw)
    }

    /// The image before the change, decoded into `T`.
    pub fn before_image<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        decode_image(self.change.old_image.as_ref())
    }

    /// The image after the change, decoded into `T`.
    pub fn after_image<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        decode_image(self.change.new_image.as_ref())
    }
}

fn decode_image<T: DeserializeOwned>(
    image: Option<&Image>,
) -> Result<Option<T>, serde_json::Error> {
    image
        .map(|image| serde_json::from_value(Value::Object(image_to_item(image))))
        .transpose()
}

/// One delivery from the change stream. Records stay raw until the router
/// decodes them one at a time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeEventBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_conversion() {
        let attribute: StreamAttribute = serde_json::from_value(json!({
            "M": {
                "count": {"N": "3"},
                "ratio": {"N": "0.5"},
                "acl": {"SS": ["a", "b"]},
                "nested": {"L": [{"BOOL": true}, {"NULL": true}]},
                "blob": {"B": "aGVsbG8="},
                "blobs": {"BS": ["aGVsbG8="]},
                "missing": {"NULL": true}
            }
        }))
        .unwrap();

        assert_eq!(
            attribute.to_json(),
            json!({
                "count": 3,
                "ratio": 0.5,
                "acl": ["a", "b"],
                "nested": [true, null],
                "blob": "aGVsbG8=",
                "blobs": ["aGVsbG8="]
            })
        );
    }

    #[test]
    fn test_record_wire_format() {
        let record: ChangeEventRecord = serde_json::from_value(json!({
            "eventID": "1",
            "eventName": "MODIFY",
            "eventSourceARN": "arn:aws:dynamodb:us-east-1:123456789012:table/cla-dev-signatures/stream/2020-03-02T05:49:58.779",
            "dynamodb": {
                "Keys": {"signature_id": {"S": "s1"}},
                "NewImage": {"signature_id": {"S": "s1"}, "signature_signed": {"BOOL": true}},
                "StreamViewType": "NEW_AND_OLD_IMAGES"
            }
        }))
        .unwrap();

        assert_eq!(record.event_action, EventAction::Modify);
        let after: Value = record.after_image().unwrap().unwrap();
        assert_eq!(after["signature_signed"], json!(true));
        assert!(record.before_image::<Value>().unwrap().is_none());
    }

    #[test]
    fn test_null_attribute_takes_field_default() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(default)]
            name: String,
            #[serde(default)]
            signed: bool,
        }

        let image: Image = serde_json::from_value(json!({
            "name": {"NULL": true},
            "signed": {"NULL": true}
        }))
        .unwrap();
        let row: Row = serde_json::from_value(Value::Object(image_to_item(&image))).unwrap();
        assert_eq!(row.name, "");
        assert!(!row.signed);
    }

    #[test]
    fn test_record_without_source_arn_does_not_decode() {
        let raw = json!({"eventID": "1", "eventName": "MODIFY"});
        assert!(ChangeEventRecord::from_value(raw).is_err());

        let raw = json!({"eventID": "2", "eventName": "TRUNCATE", "eventSourceARN": "x"});
        assert!(ChangeEventRecord::from_value(raw).is_err());
    }
}
