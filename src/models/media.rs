use serde::{Deserialize, Serialize};
use crate::record::{Item, now_millis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "video/mp4")]
    Mp4,
    #[serde(rename = "audio/mp3")]
    Mp3,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Mp4 => "video/mp4",
            MediaType::Mp3 => "audio/mp3",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "jpeg",
            MediaType::Mp4 => "mp4",
            MediaType::Mp3 => "mp3",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A captured photo, video or audio clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    pub id: String,
    pub file_name: String,
    pub file_type: MediaType,
    pub timestamp: i64,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl MediaFile {
    /// New file with a generated id, stamped with the current time
    pub fn new(file_name: impl Into<String>, file_type: MediaType, data: Vec<u8>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_name: file_name.into(),
            file_type,
            timestamp: now_millis(),
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Partial update for [`MediaFile`]. `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFilePatch {
    pub file_name: Option<String>,
    pub file_type: Option<MediaType>,
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
}

impl Item for MediaFile {
    type Patch = MediaFilePatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, patch: MediaFilePatch) {
        if let Some(file_name) = patch.file_name {
            self.file_name = file_name;
        }
        if let Some(file_type) = patch.file_type {
            self.file_type = file_type;
        }
        if let Some(data) = patch.data {
            self.data = data;
        }
    }

    fn touch(&mut self, now_ms: i64) {
        self.timestamp = self.timestamp.max(now_ms);
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
