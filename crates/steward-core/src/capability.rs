//! Static capability registry
//!
//! Answers three questions without I/O:
//! - which capabilities mean something on a content type
//! - which capabilities survive a copy between two content types
//! - what a named template expands to

use crate::error::{Result, StewardError};
use crate::models::{Capability, CapabilitySet, ContentType, Template};

use Capability::*;

const WORKBOOK: &[Capability] = &Capability::ALL;

const VIEW: &[Capability] = &[
    Read,
    Filter,
    ViewComments,
    AddComments,
    ExportImage,
    ExportData,
    ShareView,
    ViewUnderlyingData,
    CreateRefreshMetrics,
    OverwriteRefreshMetrics,
    DeleteRefreshMetrics,
    Delete,
    ChangePermissions,
];

const DATASOURCE: &[Capability] = &[Read, ExportData, Write, ChangeHierarchy, Delete, ChangePermissions];

const PROJECT: &[Capability] = &[Read, Write, ChangeHierarchy, Delete, ChangePermissions];

const FLOW: &[Capability] = &[Read, ExportData, Write, ChangeHierarchy, Delete, ChangePermissions];

const VIEWER: &[Capability] = &[Read, Filter, ViewComments, AddComments, ExportImage];

const AUTHOR_EXTRA: &[Capability] = &[
    ExportData,
    ShareView,
    ViewUnderlyingData,
    Write,
    CreateRefreshMetrics,
    OverwriteRefreshMetrics,
];

const ADMIN_EXTRA: &[Capability] = &[DeleteRefreshMetrics, ChangeHierarchy, Delete, ChangePermissions];

/// Capability registry and compatibility matrix
pub struct CapabilityModel;

impl CapabilityModel {
    /// Capabilities the platform accepts on `content_type`
    pub fn valid_capabilities(content_type: ContentType) -> &'static [Capability] {
        match content_type {
            ContentType::Workbook => WORKBOOK,
            ContentType::View => VIEW,
            ContentType::Datasource => DATASOURCE,
            ContentType::Project => PROJECT,
            ContentType::Flow => FLOW,
        }
    }

    pub fn is_valid(capability: Capability, content_type: ContentType) -> bool {
        Self::valid_capabilities(content_type).contains(&capability)
    }

    /// Whether `capability` can be carried from `source` content to `target` content.
    /// Within one type everything is compatible.
    pub fn is_compatible(capability: Capability, source: ContentType, target: ContentType) -> bool {
        source == target || (Self::is_valid(capability, source) && Self::is_valid(capability, target))
    }

    /// The compatibility matrix cell for `(source, target)`
    pub fn compatible_capabilities(source: ContentType, target: ContentType) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| Self::is_compatible(*c, source, target))
            .collect()
    }

    /// Full template expansion, every entry `Allow`
    pub fn template_capabilities(template: Template) -> CapabilitySet {
        let extra: &[&[Capability]] = match template {
            Template::Viewer => &[VIEWER],
            Template::Author => &[VIEWER, AUTHOR_EXTRA],
            Template::Admin => &[VIEWER, AUTHOR_EXTRA, ADMIN_EXTRA],
        };
        CapabilitySet::allow(extra.iter().flat_map(|caps| caps.iter().copied()))
    }

    /// Template expansion narrowed to what `content_type` accepts
    pub fn template_capabilities_for(template: Template, content_type: ContentType) -> CapabilitySet {
        Self::template_capabilities(template).filtered(|c, _| Self::is_valid(c, content_type))
    }

    /// Capabilities in `set` that `content_type` does not accept
    pub fn inapplicable(set: &CapabilitySet, content_type: ContentType) -> Vec<Capability> {
        set.capabilities()
            .filter(|c| !Self::is_valid(*c, content_type))
            .collect()
    }

    /// Reject a set holding capabilities `content_type` does not accept
    pub fn validate_for(set: &CapabilitySet, content_type: ContentType) -> Result<()> {
        let rejected = Self::inapplicable(set, content_type);
        if rejected.is_empty() {
            Ok(())
        } else {
            Err(StewardError::CapabilityNotApplicable {
                content_type,
                capabilities: rejected,
            })
        }
    }
}
