//! Domain models for content permissions
//!
//! Identity rules:
//! - a content item is identified by `(content_type, id)`; `name` is a display label
//! - a grantee is identified by `(grantee_type, id)`; `name` is a display label
//! - a grant holds at most one mode per capability

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::StewardError;
use crate::ids::{SessionId, SiteId};

// =============================================================================
// Content Models
// =============================================================================

/// Addressable content types of the analytics platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Workbook,
    Datasource,
    Project,
    View,
    Flow,
}

impl ContentType {
    pub const ALL: [ContentType; 5] = [
        ContentType::Workbook,
        ContentType::Datasource,
        ContentType::Project,
        ContentType::View,
        ContentType::Flow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workbook => "workbook",
            Self::Datasource => "datasource",
            Self::Project => "project",
            Self::View => "view",
            Self::Flow => "flow",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = StewardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| StewardError::invalid_input(format!("unknown content type '{s}'")))
    }
}

/// Reference to one content item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRef {
    pub content_type: ContentType,
    pub id: String,
    /// Cached display label, not part of identity
    #[serde(default)]
    pub name: String,
}

impl ContentRef {
    pub fn new(content_type: ContentType, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            content_type,
            id: id.into(),
            name: name.into(),
        }
    }

    /// Reference without a known display label
    pub fn unnamed(content_type: ContentType, id: impl Into<String>) -> Self {
        Self::new(content_type, id, "")
    }

    pub fn same_item(&self, other: &ContentRef) -> bool {
        self.content_type == other.content_type && self.id == other.id
    }
}

impl PartialEq for ContentRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_item(other)
    }
}

impl Eq for ContentRef {}

impl Hash for ContentRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.content_type.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.content_type, self.id)
    }
}

// =============================================================================
// Grantee Models
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GranteeType {
    User,
    Group,
}

impl GranteeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for GranteeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GranteeType {
    type Err = StewardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "group" => Ok(Self::Group),
            other => Err(StewardError::invalid_input(format!(
                "unknown grantee type '{other}'"
            ))),
        }
    }
}

/// Identity of a user or group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GranteeRef {
    pub grantee_type: GranteeType,
    pub id: String,
}

impl GranteeRef {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            grantee_type: GranteeType::User,
            id: id.into(),
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self {
            grantee_type: GranteeType::Group,
            id: id.into(),
        }
    }
}

impl fmt::Display for GranteeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.grantee_type, self.id)
    }
}

/// A user or group with its display name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grantee {
    pub grantee_type: GranteeType,
    pub id: String,
    pub name: String,
}

impl Grantee {
    /// Display name used when a lookup fails
    pub const UNKNOWN_NAME: &'static str = "Unknown";

    pub fn new(reference: GranteeRef, name: impl Into<String>) -> Self {
        Self {
            grantee_type: reference.grantee_type,
            id: reference.id,
            name: name.into(),
        }
    }

    pub fn unknown(reference: GranteeRef) -> Self {
        Self::new(reference, Self::UNKNOWN_NAME)
    }

    pub fn reference(&self) -> GranteeRef {
        GranteeRef {
            grantee_type: self.grantee_type,
            id: self.id.clone(),
        }
    }

    pub fn is(&self, reference: &GranteeRef) -> bool {
        self.grantee_type == reference.grantee_type && self.id == reference.id
    }
}

impl PartialEq for Grantee {
    fn eq(&self, other: &Self) -> bool {
        self.grantee_type == other.grantee_type && self.id == other.id
    }
}

impl Eq for Grantee {}

// =============================================================================
// Capability Models
// =============================================================================

/// Permission actions known to the platform, named as the platform names them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    Read,
    Filter,
    ViewComments,
    AddComments,
    ExportImage,
    ExportData,
    ShareView,
    ViewUnderlyingData,
    Write,
    CreateRefreshMetrics,
    OverwriteRefreshMetrics,
    DeleteRefreshMetrics,
    ChangeHierarchy,
    Delete,
    ChangePermissions,
}

impl Capability {
    pub const ALL: [Capability; 15] = [
        Capability::Read,
        Capability::Filter,
        Capability::ViewComments,
        Capability::AddComments,
        Capability::ExportImage,
        Capability::ExportData,
        Capability::ShareView,
        Capability::ViewUnderlyingData,
        Capability::Write,
        Capability::CreateRefreshMetrics,
        Capability::OverwriteRefreshMetrics,
        Capability::DeleteRefreshMetrics,
        Capability::ChangeHierarchy,
        Capability::Delete,
        Capability::ChangePermissions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "Read",
            Self::Filter => "Filter",
            Self::ViewComments => "ViewComments",
            Self::AddComments => "AddComments",
            Self::ExportImage => "ExportImage",
            Self::ExportData => "ExportData",
            Self::ShareView => "ShareView",
            Self::ViewUnderlyingData => "ViewUnderlyingData",
            Self::Write => "Write",
            Self::CreateRefreshMetrics => "CreateRefreshMetrics",
            Self::OverwriteRefreshMetrics => "OverwriteRefreshMetrics",
            Self::DeleteRefreshMetrics => "DeleteRefreshMetrics",
            Self::ChangeHierarchy => "ChangeHierarchy",
            Self::Delete => "Delete",
            Self::ChangePermissions => "ChangePermissions",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = StewardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StewardError::invalid_input(format!("unknown capability '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Allow,
    Deny,
}

impl Mode {
    pub fn opposite(&self) -> Mode {
        match self {
            Self::Allow => Self::Deny,
            Self::Deny => Self::Allow,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("Allow"),
            Self::Deny => f.write_str("Deny"),
        }
    }
}

/// Capability to mode mapping; one entry per capability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeMap<Capability, Mode>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every capability in `capabilities` with `Allow`
    pub fn allow(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        capabilities.into_iter().map(|c| (c, Mode::Allow)).collect()
    }

    /// Insert an entry, returning the mode it replaced
    pub fn insert(&mut self, capability: Capability, mode: Mode) -> Option<Mode> {
        self.0.insert(capability, mode)
    }

    pub fn remove(&mut self, capability: Capability) -> Option<Mode> {
        self.0.remove(&capability)
    }

    pub fn get(&self, capability: Capability) -> Option<Mode> {
        self.0.get(&capability).copied()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains_key(&capability)
    }

    pub fn contains_entry(&self, capability: Capability, mode: Mode) -> bool {
        self.get(capability) == Some(mode)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Capability, Mode)> + '_ {
        self.0.iter().map(|(c, m)| (*c, *m))
    }

    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.keys().copied()
    }

    /// Entries satisfying `keep`
    pub fn filtered(&self, mut keep: impl FnMut(Capability, Mode) -> bool) -> Self {
        self.iter().filter(|(c, m)| keep(*c, *m)).collect()
    }

    /// Entries whose capability `other` does not hold in any mode
    pub fn without_capabilities_of(&self, other: &CapabilitySet) -> Self {
        self.filtered(|c, _| !other.contains(c))
    }

    /// True when every capability here is also in `other`
    pub fn is_capability_subset(&self, other: &CapabilitySet) -> bool {
        self.capabilities().all(|c| other.contains(c))
    }

    /// Overlay `other` onto this set; `other` wins on conflicts
    pub fn merge_from(&mut self, other: &CapabilitySet) {
        for (capability, mode) in other.iter() {
            self.0.insert(capability, mode);
        }
    }
}

impl FromIterator<(Capability, Mode)> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = (Capability, Mode)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for CapabilitySet {
    type Item = (Capability, Mode);
    type IntoIter = btree_map::IntoIter<Capability, Mode>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Capabilities assigned to one grantee on one content item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub grantee: Grantee,
    pub capabilities: CapabilitySet,
}

impl Grant {
    pub fn new(grantee: Grantee, capabilities: CapabilitySet) -> Self {
        Self {
            grantee,
            capabilities,
        }
    }
}

/// Named capability presets; each strictly contains the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Template {
    Viewer,
    Author,
    Admin,
}

impl Template {
    pub const ALL: [Template; 3] = [Template::Viewer, Template::Author, Template::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "Viewer",
            Self::Author => "Author",
            Self::Admin => "Admin",
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Template {
    type Err = StewardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| StewardError::invalid_input(format!("unknown template '{s}'")))
    }
}

/// Conflict discipline when copying grants onto a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyMode {
    /// Clear every grant on the target, then apply the source grants
    Replace,
    /// Apply only capabilities the target grantee does not already hold
    Merge,
    /// Apply every source capability without looking at the target
    Additive,
}

impl fmt::Display for CopyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace => f.write_str("replace"),
            Self::Merge => f.write_str("merge"),
            Self::Additive => f.write_str("additive"),
        }
    }
}

// =============================================================================
// Request Context
// =============================================================================

/// Site and session every repository call runs under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub site_id: SiteId,
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl RequestContext {
    pub fn new(site_id: SiteId) -> Self {
        Self {
            site_id,
            session_id: SessionId::new(),
            actor: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}
