use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One piece of a conversation turn.
///
/// File and inline parts precede the trailing text part by convention; the
/// provider does not depend on the order otherwise.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    InlineBinary { mime_type: String, data: String },
    FileReference { uri: String, mime_type: String },
    ReasoningText { text: String },
    ContinuationSignature { signature: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn inline_binary(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        ContentPart::InlineBinary {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn file_reference(uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ContentPart::FileReference {
            uri: uri.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn reasoning_text(text: impl Into<String>) -> Self {
        ContentPart::ReasoningText { text: text.into() }
    }

    pub fn continuation_signature(signature: impl Into<String>) -> Self {
        ContentPart::ContinuationSignature {
            signature: signature.into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl Content {
    pub fn new(role: Role, parts: Vec<ContentPart>) -> Self {
        Self { role, parts }
    }

    pub fn user(parts: Vec<ContentPart>) -> Self {
        Self::new(Role::User, parts)
    }

    pub fn model(parts: Vec<ContentPart>) -> Self {
        Self::new(Role::Model, parts)
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![ContentPart::text(text)])
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self::model(vec![ContentPart::text(text)])
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Uploading,
    Ready,
    Failed,
}

/// A file previously handed to the provider's upload service.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub uri: String,
    pub mime_type: String,
    pub state: FileState,
}

impl UploadedFile {
    pub fn ready(uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: mime_type.into(),
            state: FileState::Ready,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == FileState::Ready
    }
}

/// Base64 payload with its mime type, as sent to or returned by the provider.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl InlineData {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}
