use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Upload status of a release as tracked by the control plane.
///
/// Progresses `uploadStarted → uploadFinished → readyToBePublished → committed`.
/// Statuses this client does not know are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    UploadStarted,
    UploadFinished,
    ReadyToBePublished,
    Committed,
    Error,
    MalwareDetected,
    Other(String),
}

impl UploadStatus {
    /// Returns `true` for statuses the release can never leave.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Error | Self::MalwareDetected)
    }

    /// Wire name of the status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::UploadStarted => "uploadStarted",
            Self::UploadFinished => "uploadFinished",
            Self::ReadyToBePublished => "readyToBePublished",
            Self::Committed => "committed",
            Self::Error => "error",
            Self::MalwareDetected => "malwareDetected",
            Self::Other(s) => s,
        }
    }

    fn from_wire(s: &str) -> Self {
        match s {
            "uploadStarted" => Self::UploadStarted,
            "uploadFinished" => Self::UploadFinished,
            "readyToBePublished" => Self::ReadyToBePublished,
            "committed" => Self::Committed,
            "error" => Self::Error,
            "malwareDetected" => Self::MalwareDetected,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Serialize for UploadStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UploadStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&s))
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Debug symbol flavours accepted by `symbol_uploads`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolType {
    /// Zipped dSYM bundle.
    Apple,
    /// ProGuard `mapping.txt`.
    AndroidProguard,
    Breakpad,
    /// Zipped PDB files.
    #[serde(rename = "UWP")]
    Uwp,
}

impl std::str::FromStr for SymbolType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Apple" => Ok(Self::Apple),
            "AndroidProguard" | "AndroidJava" => Ok(Self::AndroidProguard),
            "Breakpad" | "AndroidNative" => Ok(Self::Breakpad),
            "UWP" => Ok(Self::Uwp),
            other => Err(format!("unsupported symbols type: {other}")),
        }
    }
}

/// Where a committed release is made available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationType {
    /// Distribution groups (testers).
    #[default]
    Groups,
    /// A connected app store.
    Store,
}

impl std::str::FromStr for DestinationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "groups" => Ok(Self::Groups),
            "store" => Ok(Self::Store),
            other => Err(format!("unsupported destination type: {other}")),
        }
    }
}

/// A distribution group or store reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
}

/// Build metadata attached to a published release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
}

impl BuildInfo {
    /// Returns `true` when no field is set.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.branch.is_none() && self.commit_hash.is_none()
    }
}

/// Accepts an identifier encoded either as a JSON string or a number.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}
