use std::{
    collections::{BTreeMap, HashSet},
    fs, io,
    path::{Path, PathBuf},
};

use derive_more::derive::{Deref, Display, From, Into};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::sreport::{SlurmUser, UsageMap};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Display, From, Into, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Organization(pub String);

impl From<&str> for Organization {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

pub type Members = HashSet<SlurmUser>;
pub type OrganizationUsage = BTreeMap<Organization, UsageMap>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterFormat {
    /// one login per line
    Flat,
    /// JSON object, organization -> list of logins
    Grouped,
}

/// The users a report is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Roster {
    Flat(Members),
    Grouped(BTreeMap<Organization, Members>),
}

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("reading roster from {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing grouped roster")]
    Json(#[from] serde_json::Error),
}

/// Usage restricted to a roster, shaped like the roster it was filtered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FilteredUsage {
    Flat(UsageMap),
    Grouped(OrganizationUsage),
}

impl FilteredUsage {
    pub fn is_empty(&self) -> bool {
        match self {
            FilteredUsage::Flat(usage) => usage.is_empty(),
            FilteredUsage::Grouped(usage) => usage.values().all(UsageMap::is_empty),
        }
    }
}

impl Roster {
    pub fn load(path: impl AsRef<Path>, format: RosterFormat) -> Result<Self, RosterError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| RosterError::Io {
            path: path.to_owned(),
            source,
        })?;
        let roster = match format {
            RosterFormat::Flat => Self::parse_flat(&content),
            RosterFormat::Grouped => Self::parse_grouped(&content)?,
        };
        debug!(path = %path.display(), users = roster.user_count(), "loaded roster");
        Ok(roster)
    }

    /// Blank lines and `#` comments are skipped.
    pub fn parse_flat(input: &str) -> Self {
        Roster::Flat(
            input
                .lines()
                .map(|line| line.split('#').next().unwrap_or_default().trim())
                .filter(|login| !login.is_empty())
                .map(SlurmUser::from)
                .collect(),
        )
    }

    pub fn parse_grouped(input: &str) -> Result<Self, RosterError> {
        Ok(Roster::Grouped(serde_json::from_str(input)?))
    }

    /// Distinct users, a user in two organizations counts once.
    pub fn user_count(&self) -> usize {
        match self {
            Roster::Flat(users) => users.len(),
            Roster::Grouped(groups) => groups.values().flatten().collect::<HashSet<_>>().len(),
        }
    }

    pub fn contains(&self, user: &SlurmUser) -> bool {
        match self {
            Roster::Flat(users) => users.contains(user),
            Roster::Grouped(groups) => groups.values().any(|members| members.contains(user)),
        }
    }

    pub fn filter(&self, usage: &UsageMap) -> FilteredUsage {
        match self {
            Roster::Flat(users) => FilteredUsage::Flat(filter_by_roster(usage, users)),
            Roster::Grouped(groups) => FilteredUsage::Grouped(filter_by_organization(usage, groups)),
        }
    }
}

/// Users without usage in the window are dropped, as are users nobody asked about.
pub fn filter_by_roster(usage: &UsageMap, roster: &Members) -> UsageMap {
    usage
        .iter()
        .filter(|(user, _)| roster.contains(*user))
        .map(|(user, record)| (user.clone(), *record))
        .collect()
}

/// Organizations without any usage are left out of the result.
pub fn filter_by_organization(
    usage: &UsageMap,
    roster: &BTreeMap<Organization, Members>,
) -> OrganizationUsage {
    roster
        .iter()
        .map(|(organization, members)| (organization.clone(), filter_by_roster(usage, members)))
        .filter(|(_, usage)| !usage.is_empty())
        .collect()
}

#[allow(non_snake_case)]
#[cfg(test)]
mod test {
    use std::io::Write as _;

    use color_eyre::Result;

    use super::*;
    use crate::sreport::UsageRecord;

    fn usage() -> UsageMap {
        [
            ("vsc40001", UsageRecord::new(100, 5)),
            ("vsc40002", UsageRecord::new(200, 0)),
            ("vsc40003", UsageRecord::new(7, 7)),
        ]
        .into_iter()
        .map(|(user, record)| (SlurmUser::from(user), record))
        .collect()
    }

    fn members(users: &[&str]) -> Members {
        users.iter().copied().map(SlurmUser::from).collect()
    }

    #[test]
    fn Roster__parse_flat() {
        let roster = Roster::parse_flat("vsc40001\n\n  vsc40002  \n# vsc40003\nvsc40004 # left in May\n");
        assert_eq!(roster, Roster::Flat(members(&["vsc40001", "vsc40002", "vsc40004"])));
    }

    #[test]
    fn Roster__parse_grouped() -> Result<()> {
        let roster = Roster::parse_grouped(r#"{"acme": ["vsc40001"], "initech": ["vsc40002", "vsc40001"]}"#)?;
        assert_eq!(roster.user_count(), 2);
        assert!(roster.contains(&"vsc40002".into()));
        assert!(!roster.contains(&"vsc40003".into()));
        Ok(())
    }

    #[test]
    fn Roster__parse_grouped__invalid() {
        assert!(matches!(Roster::parse_grouped(r#"["vsc40001"]"#), Err(RosterError::Json(_))));
    }

    #[test]
    fn Roster__load() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, r#"{{"acme": ["vsc40001"]}}"#)?;
        let roster = Roster::load(file.path(), RosterFormat::Grouped)?;
        assert_eq!(roster, Roster::Grouped(BTreeMap::from([(Organization::from("acme"), members(&["vsc40001"]))])));

        let roster = Roster::load(file.path(), RosterFormat::Flat)?;
        assert_eq!(roster.user_count(), 1);

        assert!(matches!(
            Roster::load(file.path().with_extension("missing"), RosterFormat::Flat),
            Err(RosterError::Io { .. })
        ));
        Ok(())
    }

    #[test]
    fn filter_by_roster__subset_of_both() {
        let roster = members(&["vsc40001", "vsc40003", "vsc49999"]);
        let filtered = filter_by_roster(&usage(), &roster);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.keys().all(|user| roster.contains(user) && usage().contains_key(user)));
        assert_eq!(filtered[&SlurmUser::from("vsc40003")], UsageRecord::new(7, 7));
    }

    #[test]
    fn filter_by_roster__empty_roster() {
        assert!(filter_by_roster(&usage(), &Members::new()).is_empty());
    }

    #[test]
    fn filter_by_organization__drops_unclaimed_users() {
        let roster = BTreeMap::from([(Organization::from("acme"), members(&["vsc40001"]))]);
        let filtered = filter_by_organization(&usage(), &roster);
        let expected = OrganizationUsage::from([(
            Organization::from("acme"),
            UsageMap::from([(SlurmUser::from("vsc40001"), UsageRecord::new(100, 5))]),
        )]);
        assert_eq!(filtered, expected);
    }

    #[test]
    fn filter_by_organization__partitions_intersection() {
        let roster = BTreeMap::from([
            (Organization::from("acme"), members(&["vsc40001", "vsc49999"])),
            (Organization::from("initech"), members(&["vsc40002", "vsc40001"])),
            (Organization::from("umbrella"), members(&["vsc48888"])),
        ]);
        let filtered = filter_by_organization(&usage(), &roster);

        assert_eq!(filtered.keys().map(|org| org.as_str()).collect::<Vec<_>>(), ["acme", "initech"]);
        let users: HashSet<&SlurmUser> = filtered.values().flat_map(|usage| usage.keys()).collect();
        let expected = [SlurmUser::from("vsc40001"), SlurmUser::from("vsc40002")];
        assert_eq!(users, expected.iter().collect::<HashSet<_>>());
        // assigned to both by the roster, so listed under both
        assert!(filtered.values().all(|usage| usage.contains_key(&SlurmUser::from("vsc40001"))));
    }

    #[test]
    fn Roster__filter__keeps_shape() {
        assert!(matches!(Roster::Flat(members(&["vsc40001"])).filter(&usage()), FilteredUsage::Flat(_)));
        let grouped = Roster::Grouped(BTreeMap::from([(Organization::from("acme"), members(&["vsc40009"]))])).filter(&usage());
        assert!(matches!(grouped, FilteredUsage::Grouped(_)));
        assert!(grouped.is_empty());
    }
}
