use crate::detection::VehicleInfo;
use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{self, Debug};

/// Body of `POST /process_image`. `image` is Base64, optionally prefixed with
/// a `data:<mime>;base64,` header
#[derive(Default)]
pub struct ProcessImageRequest {
    pub image: Option<String>,
}

/// Any well-formed JSON is accepted. A body that is not an object simply has
/// no image; an `image` that is present must be a string or null
impl<'de> Deserialize<'de> for ProcessImageRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ProcessImageRequestVisitor)
    }
}

struct ProcessImageRequestVisitor;

impl ProcessImageRequestVisitor {
    fn no_image<E>(self) -> Result<ProcessImageRequest, E> {
        Ok(ProcessImageRequest::default())
    }
}

impl<'de> Visitor<'de> for ProcessImageRequestVisitor {
    type Value = ProcessImageRequest;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut image = None;
        while let Some(key) = map.next_key::<String>()? {
            if key == "image" {
                image = map.next_value::<Option<String>>()?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(ProcessImageRequest { image })
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        self.no_image()
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        self.no_image()
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        self.no_image()
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        self.no_image()
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        self.no_image()
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        self.no_image()
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        self.no_image()
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
        self.no_image()
    }
}

impl Debug for ProcessImageRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.image {
            Some(image) => write!(f, "ProcessImageRequest {{ image: <{} bytes> }}", image.len()),
            None => write!(f, "ProcessImageRequest {{ image: None }}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// The JSON body of every gateway response, successful or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_info: Option<VehicleInfo>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>, vehicle_info: VehicleInfo) -> Self {
        ApiResponse {
            status: Status::Success,
            message: message.into(),
            vehicle_info: Some(vehicle_info),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ApiResponse {
            status: Status::Error,
            message: message.into(),
            vehicle_info: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_omits_vehicle_info() {
        let res = ApiResponse::error("No image data provided.");
        assert_eq!(
            serde_json::to_value(res).unwrap(),
            json!({ "status": "error", "message": "No image data provided." })
        );
    }

    #[test]
    fn test_success_shape() {
        let res = ApiResponse::success("ok", VehicleInfo::new().with("ownerName", "A"));
        assert_eq!(
            serde_json::to_value(res).unwrap(),
            json!({ "status": "success", "message": "ok", "vehicle_info": { "ownerName": "A" } })
        );
    }

    #[test]
    fn test_request_ignores_unknown_keys() {
        let req: ProcessImageRequest =
            serde_json::from_value(json!({ "camera": "front", "image": "AAAA" })).unwrap();
        assert_eq!(req.image.as_deref(), Some("AAAA"));

        let req: ProcessImageRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.image.is_none());
    }

    #[test]
    fn test_request_without_object_has_no_image() {
        for body in ["null", "[]", "[1, {\"image\": \"AAAA\"}]", "5", "true", "\"AAAA\""] {
            let req: ProcessImageRequest = serde_json::from_str(body).unwrap();
            assert!(req.image.is_none(), "{body}");
        }

        let req: ProcessImageRequest = serde_json::from_str(r#"{"image": null}"#).unwrap();
        assert!(req.image.is_none());
    }

    #[test]
    fn test_request_image_must_be_a_string() {
        assert!(serde_json::from_str::<ProcessImageRequest>(r#"{"image": 5}"#).is_err());
        assert!(serde_json::from_str::<ProcessImageRequest>(r#"{"image": ["AAAA"]}"#).is_err());
    }
}
