use formyard_core::{AppError, AppResult, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered set of team member ids decoded from a team selector field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberList(Vec<UserId>);

impl MemberList {
    /// Creates a member list, dropping zero ids and duplicates.
    #[must_use]
    pub fn new(members: impl IntoIterator<Item = UserId>) -> Self {
        let mut list = Vec::new();
        for member in members {
            if member.get() != 0 && !list.contains(&member) {
                list.push(member);
            }
        }
        Self(list)
    }

    /// Decodes the stored JSON array. Empty or missing content is an empty list.
    ///
    /// Array items may be numbers or numeric strings; zero and blank items are
    /// dropped.
    pub fn decode(raw: Option<&str>) -> AppResult<Self> {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Ok(Self::default());
        };

        let value: Value = serde_json::from_str(raw).map_err(|error| {
            AppError::Validation(format!("invalid team member list '{raw}': {error}"))
        })?;
        let Value::Array(items) = value else {
            return Err(AppError::Validation(format!(
                "team member list must be a JSON array, got '{raw}'"
            )));
        };

        let mut members = Vec::with_capacity(items.len());
        for item in items {
            let id = match item {
                Value::Number(number) => number.as_i64(),
                Value::String(text) if text.trim().is_empty() => None,
                Value::String(text) => Some(text.trim().parse::<i64>().map_err(|error| {
                    AppError::Validation(format!("invalid team member id '{text}': {error}"))
                })?),
                Value::Null => None,
                other => {
                    return Err(AppError::Validation(format!(
                        "invalid team member id '{other}'"
                    )));
                }
            };
            if let Some(id) = id {
                members.push(UserId::new(id));
            }
        }

        Ok(Self::new(members))
    }

    /// Encodes the list as a JSON array of numbers.
    #[must_use]
    pub fn encode(&self) -> String {
        let items: Vec<i64> = self.0.iter().map(|member| member.get()).collect();
        Value::from(items).to_string()
    }

    /// Returns the member list seen from `member`'s copy: the member is
    /// replaced by the original owner.
    #[must_use]
    pub fn swapped(&self, member: UserId, owner: UserId) -> Self {
        Self::new(
            self.0
                .iter()
                .copied()
                .filter(|candidate| *candidate != member)
                .chain(std::iter::once(owner)),
        )
    }

    /// Returns members present here but not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Vec<UserId> {
        self.0
            .iter()
            .copied()
            .filter(|member| !other.contains(*member))
            .collect()
    }

    /// Returns whether the list contains a member.
    #[must_use]
    pub fn contains(&self, member: UserId) -> bool {
        self.0.contains(&member)
    }

    /// Returns the member ids in order.
    #[must_use]
    pub fn members(&self) -> &[UserId] {
        &self.0
    }

    /// Returns whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Net change between two member lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipChange {
    /// Members present only in the new list.
    pub added: Vec<UserId>,
    /// Members present only in the old list.
    pub removed: Vec<UserId>,
}

impl MembershipChange {
    /// Computes the change from `old` to `new`.
    #[must_use]
    pub fn between(old: &MemberList, new: &MemberList) -> Self {
        Self {
            added: new.difference(old),
            removed: old.difference(new),
        }
    }
}
