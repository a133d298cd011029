//! Sync policy model: how a context is uploaded, downloaded, filtered and
//! retained while it is bound to a session.
//!
//! Sub-policies that can be invalid (`UploadPolicy`, `RecyclePolicy`) have
//! private fields and validate in their constructors and on deserialization,
//! so a `SyncPolicy` assembled from them is always valid. Validation failures
//! are `ContextError::InvalidPolicy` and never reach the wire.

use crate::error::{ContextError, ContextResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Default upload period in minutes.
pub const DEFAULT_UPLOAD_PERIOD: u32 = 30;

const GLOB_METACHARACTERS: &[char] = &['*', '?', '[', ']', '{', '}'];

/// Treats an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStrategy {
    #[default]
    PeriodicUpload,
    UploadBeforeResourceRelease,
    UploadAfterFileClose,
    Archive,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadStrategy {
    DownloadSync,
    #[default]
    DownloadAsync,
}

/// Upload behaviour. `period` is in minutes and must be positive for
/// `PeriodicUpload`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawUploadPolicy", into = "RawUploadPolicy")]
pub struct UploadPolicy {
    auto_upload: bool,
    upload_strategy: UploadStrategy,
    period: u32,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUploadPolicy {
    #[serde(default = "default_true")]
    auto_upload: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    upload_strategy: UploadStrategy,
    #[serde(default)]
    period: Option<u32>,
}

fn default_true() -> bool {
    true
}

impl UploadPolicy {
    pub fn new(
        auto_upload: bool,
        upload_strategy: UploadStrategy,
        period: u32,
    ) -> ContextResult<Self> {
        if upload_strategy == UploadStrategy::PeriodicUpload && period == 0 {
            return Err(ContextError::InvalidPolicy(
                "upload period must be a positive number of minutes for PeriodicUpload".into(),
            ));
        }
        Ok(Self {
            auto_upload,
            upload_strategy,
            period,
        })
    }

    /// Periodic upload every `period` minutes.
    pub fn periodic(period: u32) -> ContextResult<Self> {
        Self::new(true, UploadStrategy::PeriodicUpload, period)
    }

    /// Uploads disabled.
    pub fn disabled() -> Self {
        Self {
            auto_upload: false,
            ..Self::default()
        }
    }

    pub fn auto_upload(&self) -> bool {
        self.auto_upload
    }

    pub fn upload_strategy(&self) -> UploadStrategy {
        self.upload_strategy
    }

    pub fn period(&self) -> u32 {
        self.period
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            auto_upload: true,
            upload_strategy: UploadStrategy::PeriodicUpload,
            period: DEFAULT_UPLOAD_PERIOD,
        }
    }
}

impl TryFrom<RawUploadPolicy> for UploadPolicy {
    type Error = ContextError;

    fn try_from(raw: RawUploadPolicy) -> ContextResult<Self> {
        Self::new(
            raw.auto_upload,
            raw.upload_strategy,
            raw.period.unwrap_or(DEFAULT_UPLOAD_PERIOD),
        )
    }
}

impl From<UploadPolicy> for RawUploadPolicy {
    fn from(p: UploadPolicy) -> Self {
        Self {
            auto_upload: p.auto_upload,
            upload_strategy: p.upload_strategy,
            period: Some(p.period),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPolicy {
    #[serde(default = "default_true")]
    pub auto_download: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub download_strategy: DownloadStrategy,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            auto_download: true,
            download_strategy: DownloadStrategy::DownloadAsync,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePolicy {
    #[serde(default = "default_true")]
    pub sync_local_file: bool,
}

impl Default for DeletePolicy {
    fn default() -> Self {
        Self {
            sync_local_file: true,
        }
    }
}

/// A path to synchronize, minus any excluded sub-paths.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteList {
    pub path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exclude_paths: Vec<String>,
}

impl WhiteList {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            exclude_paths: Vec::new(),
        }
    }

    pub fn excluding(mut self, path: impl Into<String>) -> Self {
        self.exclude_paths.push(path.into());
        self
    }
}

/// Allow list. Empty means "sync everything".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BwList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub white_lists: Vec<WhiteList>,
}

impl BwList {
    pub fn is_unrestricted(&self) -> bool {
        self.white_lists.is_empty()
    }
}

/// Retention period after which the server deletes context data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    #[serde(rename = "Lifecycle_1Day")]
    OneDay,
    #[serde(rename = "Lifecycle_3Days")]
    ThreeDays,
    #[serde(rename = "Lifecycle_7Days")]
    SevenDays,
    #[serde(rename = "Lifecycle_14Days")]
    FourteenDays,
    #[serde(rename = "Lifecycle_30Days")]
    ThirtyDays,
    #[serde(rename = "Lifecycle_60Days")]
    SixtyDays,
    #[serde(rename = "Lifecycle_90Days")]
    NinetyDays,
    #[serde(rename = "Lifecycle_180Days")]
    OneHundredEightyDays,
    #[serde(rename = "Lifecycle_365Days")]
    OneYear,
    #[default]
    #[serde(rename = "Lifecycle_Forever")]
    Forever,
}

impl Lifecycle {
    /// Retention in days; `None` for `Forever`.
    pub fn days(&self) -> Option<u32> {
        match self {
            Lifecycle::OneDay => Some(1),
            Lifecycle::ThreeDays => Some(3),
            Lifecycle::SevenDays => Some(7),
            Lifecycle::FourteenDays => Some(14),
            Lifecycle::ThirtyDays => Some(30),
            Lifecycle::SixtyDays => Some(60),
            Lifecycle::NinetyDays => Some(90),
            Lifecycle::OneHundredEightyDays => Some(180),
            Lifecycle::OneYear => Some(365),
            Lifecycle::Forever => None,
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.days() {
            Some(1) => write!(f, "1 day"),
            Some(days) => write!(f, "{days} days"),
            None => write!(f, "forever"),
        }
    }
}

/// Server-side automatic deletion of data older than `lifecycle`.
///
/// `paths` are literal prefixes. The server does not expand wildcards, so
/// a glob pattern would silently match nothing and is rejected here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRecyclePolicy", into = "RawRecyclePolicy")]
pub struct RecyclePolicy {
    lifecycle: Lifecycle,
    paths: Vec<String>,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecyclePolicy {
    #[serde(default, deserialize_with = "null_as_default")]
    lifecycle: Lifecycle,
    #[serde(default, deserialize_with = "null_as_default")]
    paths: Vec<String>,
}

impl RecyclePolicy {
    pub fn new(lifecycle: Lifecycle, paths: Vec<String>) -> ContextResult<Self> {
        for path in &paths {
            validate_literal_path(path)?;
        }
        Ok(Self { lifecycle, paths })
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Empty means the lifecycle applies to the whole context.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

impl TryFrom<RawRecyclePolicy> for RecyclePolicy {
    type Error = ContextError;

    fn try_from(raw: RawRecyclePolicy) -> ContextResult<Self> {
        Self::new(raw.lifecycle, raw.paths)
    }
}

impl From<RecyclePolicy> for RawRecyclePolicy {
    fn from(p: RecyclePolicy) -> Self {
        Self {
            lifecycle: p.lifecycle,
            paths: p.paths,
        }
    }
}

fn validate_literal_path(path: &str) -> ContextResult<()> {
    if let Some(c) = path.chars().find(|c| GLOB_METACHARACTERS.contains(c)) {
        return Err(ContextError::InvalidPolicy(format!(
            "recycle path {path:?} contains wildcard character {c:?}; use an exact path prefix"
        )));
    }
    Ok(())
}

/// Complete synchronization policy for one context binding.
///
/// Missing or `null` sub-policies are normalized to their defaults, so
/// "not configured" never reads as "disabled". A missing recycle policy
/// means data is retained forever.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPolicy {
    #[serde(default, deserialize_with = "null_as_default")]
    pub upload_policy: UploadPolicy,
    #[serde(default, deserialize_with = "null_as_default")]
    pub download_policy: DownloadPolicy,
    #[serde(default, deserialize_with = "null_as_default")]
    pub delete_policy: DeletePolicy,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bw_list: BwList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recycle_policy: Option<RecyclePolicy>,
}

impl SyncPolicy {
    pub fn with_upload_policy(mut self, policy: UploadPolicy) -> Self {
        self.upload_policy = policy;
        self
    }

    pub fn with_download_policy(mut self, policy: DownloadPolicy) -> Self {
        self.download_policy = policy;
        self
    }

    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    pub fn with_white_list(mut self, entry: WhiteList) -> Self {
        self.bw_list.white_lists.push(entry);
        self
    }

    pub fn with_recycle_policy(mut self, policy: RecyclePolicy) -> Self {
        self.recycle_policy = Some(policy);
        self
    }

    /// Parses a policy from its wire JSON, validating every sub-policy.
    pub fn from_json(json: &str) -> ContextResult<Self> {
        serde_json::from_str(json).map_err(|e| ContextError::InvalidPolicy(e.to_string()))
    }
}

/// Binding of one context to a mount path inside a session.
///
/// Fixed for the life of the session; a different binding needs a new
/// session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSync {
    context_id: String,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy: Option<SyncPolicy>,
}

impl ContextSync {
    pub fn new(
        context_id: impl Into<String>,
        path: impl Into<String>,
        policy: Option<SyncPolicy>,
    ) -> ContextResult<Self> {
        let context_id = context_id.into();
        let path = path.into();
        if context_id.trim().is_empty() {
            return Err(ContextError::InvalidPolicy(
                "context sync requires a context id".into(),
            ));
        }
        if path.trim().is_empty() {
            return Err(ContextError::InvalidPolicy(
                "context sync requires a mount path".into(),
            ));
        }
        Ok(Self {
            context_id,
            path,
            policy,
        })
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn policy(&self) -> Option<&SyncPolicy> {
        self.policy.as_ref()
    }

    /// Entry for the session-creation `PersistenceDataList`.
    pub(crate) fn to_persistence_entry(&self) -> ContextResult<serde_json::Value> {
        let mut entry = serde_json::json!({
            "ContextId": self.context_id,
            "Path": self.path,
        });
        if let Some(policy) = &self.policy {
            entry["Policy"] = serde_json::Value::String(serde_json::to_string(policy)?);
        }
        Ok(entry)
    }
}
