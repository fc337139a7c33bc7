//! Classification outcome.

use ironflow_core::types::Boundary;

use super::RuleScope;

/// Attribute a `Classify*` builtin writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Region,
    Site,
    Tenant,
    Role,
    Group,
    Provider,
    Connectivity,
}

impl Tag {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Region" => Self::Region,
            "Site" => Self::Site,
            "Tenant" => Self::Tenant,
            "Role" => Self::Role,
            "Group" => Self::Group,
            "Provider" => Self::Provider,
            "Connectivity" => Self::Connectivity,
            _ => return None,
        })
    }

    pub(crate) fn scope(self) -> RuleScope {
        match self {
            Self::Provider | Self::Connectivity => RuleScope::Interface,
            _ => RuleScope::Exporter,
        }
    }
}

/// Values accumulated while evaluating one rule list.
///
/// Every field is write-once: the first non-empty value sticks and later
/// writes are ignored. `rejected` never goes back to `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifierResult {
    pub region: String,
    pub site: String,
    pub tenant: String,
    pub role: String,
    pub group: String,
    pub provider: String,
    pub connectivity: String,
    pub boundary: Boundary,
    /// Interface name override
    pub name: String,
    /// Interface description override
    pub description: String,
    pub rejected: bool,
}

impl ClassifierResult {
    /// Store a lower-cased tag value unless one is already set.
    pub fn set_tag(&mut self, tag: Tag, value: &str) {
        let slot = match tag {
            Tag::Region => &mut self.region,
            Tag::Site => &mut self.site,
            Tag::Tenant => &mut self.tenant,
            Tag::Role => &mut self.role,
            Tag::Group => &mut self.group,
            Tag::Provider => &mut self.provider,
            Tag::Connectivity => &mut self.connectivity,
        };
        set_once(slot, value.to_lowercase());
    }

    pub fn tag(&self, tag: Tag) -> &str {
        match tag {
            Tag::Region => &self.region,
            Tag::Site => &self.site,
            Tag::Tenant => &self.tenant,
            Tag::Role => &self.role,
            Tag::Group => &self.group,
            Tag::Provider => &self.provider,
            Tag::Connectivity => &self.connectivity,
        }
    }

    pub fn set_boundary(&mut self, boundary: Boundary) {
        if self.boundary == Boundary::Undefined {
            self.boundary = boundary;
        }
    }

    pub fn set_name(&mut self, name: &str) {
        set_once(&mut self.name, name.to_owned());
    }

    pub fn set_description(&mut self, description: &str) {
        set_once(&mut self.description, description.to_owned());
    }

    pub fn reject(&mut self) {
        self.rejected = true;
    }
}

fn set_once(slot: &mut String, value: String) {
    if slot.is_empty() && !value.is_empty() {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_write_wins_and_lowercases() {
        let mut result = ClassifierResult::default();
        result.set_tag(Tag::Region, "Europe");
        result.set_tag(Tag::Region, "asia");
        assert_eq!(result.region, "europe");
        assert_eq!(result.tag(Tag::Region), "europe");
    }

    #[test]
    fn empty_value_does_not_claim_slot() {
        let mut result = ClassifierResult::default();
        result.set_tag(Tag::Site, "");
        result.set_tag(Tag::Site, "PAR");
        assert_eq!(result.site, "par");
    }

    #[test]
    fn boundary_first_write_wins() {
        let mut result = ClassifierResult::default();
        result.set_boundary(Boundary::External);
        result.set_boundary(Boundary::Internal);
        assert_eq!(result.boundary, Boundary::External);
    }

    #[test]
    fn name_override_keeps_case() {
        let mut result = ClassifierResult::default();
        result.set_name("Gi0/0/200.300");
        result.set_name("other");
        assert_eq!(result.name, "Gi0/0/200.300");
    }

    #[test]
    fn tag_scopes() {
        assert_eq!(Tag::Provider.scope(), RuleScope::Interface);
        assert_eq!(Tag::Group.scope(), RuleScope::Exporter);
        assert_eq!(Tag::from_name("Nope"), None);
    }
}
