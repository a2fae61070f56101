//! Session roles and capabilities.
//!
//! Authentication happens outside the core. Once a session is established its role is resolved
//! into an explicit [`Capabilities`] set exactly once, and that set is handed to the workflow;
//! nothing downstream compares role strings.

use ica_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::{CaptureError, CaptureResult};

/// Role of the signed-in user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Reporter,
    TeamLead,
    Developer,
    Admin,
}

impl FromStr for Role {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reporter" | "frontline_worker" => Ok(Role::Reporter),
            "team_lead" => Ok(Role::TeamLead),
            "developer" => Ok(Role::Developer),
            "admin" | "system_admin" => Ok(Role::Admin),
            other => Err(CaptureError::InvalidInput(format!("unknown role: {other}"))),
        }
    }
}

/// Developer-facing features that can be granted to a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Fill the metadata and narrative steps from canned sample incidents.
    SampleData,
    /// Fill clarification answers with generated mock text.
    MockAnswers,
}

/// The resolved set of capabilities for a session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities(BTreeSet<Capability>);

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }

    /// Resolves the capabilities a role is entitled to.
    ///
    /// Without the `sample-data` feature no role receives any capability.
    pub fn for_role(role: Role) -> Self {
        if !cfg!(feature = "sample-data") {
            return Self::none();
        }
        let granted: &[Capability] = match role {
            Role::Reporter => &[],
            Role::TeamLead => &[Capability::SampleData],
            Role::Developer | Role::Admin => &[Capability::SampleData, Capability::MockAnswers],
        };
        Self(granted.iter().copied().collect())
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

/// An authenticated session as seen by the capture workflow.
#[derive(Clone, Debug)]
pub struct Session {
    reporter_name: NonEmptyText,
    role: Role,
    capabilities: Capabilities,
}

impl Session {
    /// Creates a session, resolving the role's capabilities once.
    pub fn resolve(reporter_name: NonEmptyText, role: Role) -> Self {
        Self {
            reporter_name,
            role,
            capabilities: Capabilities::for_role(role),
        }
    }

    pub fn reporter_name(&self) -> &NonEmptyText {
        &self.reporter_name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Fails with [`CaptureError::MissingCapability`] unless `capability` was granted.
    pub fn require(&self, capability: Capability) -> CaptureResult<()> {
        if self.capabilities.allows(capability) {
            Ok(())
        } else {
            Err(CaptureError::MissingCapability(capability))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing_accepts_aliases() {
        assert_eq!("Reporter".parse::<Role>().unwrap(), Role::Reporter);
        assert_eq!(" system_admin ".parse::<Role>().unwrap(), Role::Admin);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_reporter_never_gets_developer_capabilities() {
        let session = Session::resolve(NonEmptyText::new("Sam").unwrap(), Role::Reporter);
        assert!(session.require(Capability::SampleData).is_err());
        assert!(session.require(Capability::MockAnswers).is_err());
    }

    #[cfg(feature = "sample-data")]
    #[test]
    fn test_developer_gets_sample_capabilities() {
        let session = Session::resolve(NonEmptyText::new("Dev").unwrap(), Role::Developer);
        assert!(session.require(Capability::SampleData).is_ok());
        assert!(session.require(Capability::MockAnswers).is_ok());

        let lead = Capabilities::for_role(Role::TeamLead);
        assert!(lead.allows(Capability::SampleData));
        assert!(!lead.allows(Capability::MockAnswers));
    }

    #[cfg(not(feature = "sample-data"))]
    #[test]
    fn test_capabilities_are_empty_without_feature() {
        assert_eq!(Capabilities::for_role(Role::Admin), Capabilities::none());
    }
}
