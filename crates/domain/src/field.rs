use formyard_core::{AppError, AppResult, ContainerId, FieldId, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How team copies of an entry are matched across members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "field_id")]
pub enum TeamCorrelation {
    /// Team synchronization is switched off for the field.
    #[default]
    Disabled,
    /// Copies are never matched, every synchronization creates new copies.
    Unmatched,
    /// Copies are matched by equal primary content of the referenced field.
    Field(FieldId),
}

/// Configuration of a team member select field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSelectorConfig {
    /// Correlation mode for team copies.
    pub correlation: TeamCorrelation,
    /// Whether membership changes raise member events.
    pub notify_members: bool,
}

impl TeamSelectorConfig {
    /// Returns whether this field drives team synchronization.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self.correlation, TeamCorrelation::Disabled)
    }
}

/// Type and configuration of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Numeric value.
    Number,
    /// Link with alternative text.
    Url,
    /// Single choice from a fixed option list.
    Select {
        /// Available option labels.
        options: Vec<String>,
    },
    /// Multiple choices from a fixed option list.
    MultiSelect {
        /// Available option labels.
        options: Vec<String>,
    },
    /// Comma-separated tags.
    Tag,
    /// Attachment reference.
    File,
    /// Parent and sibling links for ordered structures.
    Node,
    /// JSON list of member user ids.
    TeamMemberSelect(TeamSelectorConfig),
    /// Field type provided by an externally registered capability.
    Custom {
        /// Registered type name.
        type_name: String,
        /// Opaque type configuration.
        #[serde(default)]
        config: Value,
    },
}

impl FieldKind {
    /// Returns the registry type name handling this kind.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Url => "url",
            Self::Select { .. } => "select",
            Self::MultiSelect { .. } => "multiselect",
            Self::Tag => "tag",
            Self::File => "file",
            Self::Node => "node",
            Self::TeamMemberSelect(_) => "teammemberselect",
            Self::Custom { type_name, .. } => type_name.as_str(),
        }
    }
}

/// Field definition within a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    id: FieldId,
    container_id: ContainerId,
    name: NonEmptyString,
    kind: FieldKind,
}

impl FieldDefinition {
    /// Creates a validated field definition.
    pub fn new(
        id: FieldId,
        container_id: ContainerId,
        name: impl Into<String>,
        kind: FieldKind,
    ) -> AppResult<Self> {
        if let FieldKind::Select { options } | FieldKind::MultiSelect { options } = &kind
            && options.iter().any(|option| option.trim().is_empty())
        {
            return Err(AppError::Validation(
                "select options must not be empty".to_owned(),
            ));
        }

        if let FieldKind::TeamMemberSelect(TeamSelectorConfig {
            correlation: TeamCorrelation::Field(reference),
            ..
        }) = &kind
            && *reference == id
        {
            return Err(AppError::Validation(format!(
                "team field '{id}' cannot correlate on itself"
            )));
        }

        Ok(Self {
            id,
            container_id,
            name: NonEmptyString::new(name)?,
            kind,
        })
    }

    /// Returns the field identifier.
    #[must_use]
    pub fn id(&self) -> FieldId {
        self.id
    }

    /// Returns the owning container.
    #[must_use]
    pub fn container_id(&self) -> ContainerId {
        self.container_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the field kind.
    #[must_use]
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Returns the team configuration when this is an active team selector.
    #[must_use]
    pub fn team_config(&self) -> Option<&TeamSelectorConfig> {
        match &self.kind {
            FieldKind::TeamMemberSelect(config) if config.is_active() => Some(config),
            _ => None,
        }
    }
}

/// Returns the single active team selector among the fields of a container.
#[must_use]
pub fn active_team_field(fields: &[FieldDefinition]) -> Option<&FieldDefinition> {
    fields.iter().find(|field| field.team_config().is_some())
}

#[cfg(test)]
mod tests {
    use formyard_core::{ContainerId, FieldId};

    use super::{FieldDefinition, FieldKind, TeamCorrelation, TeamSelectorConfig, active_team_field};

    #[test]
    fn team_field_cannot_reference_itself() {
        let result = FieldDefinition::new(
            FieldId::new(3),
            ContainerId::new(1),
            "Team",
            FieldKind::TeamMemberSelect(TeamSelectorConfig {
                correlation: TeamCorrelation::Field(FieldId::new(3)),
                notify_members: false,
            }),
        );
        assert!(result.is_err());
    }

    #[test]
    fn disabled_team_field_is_not_active() {
        let fields = vec![
            FieldDefinition::new(
                FieldId::new(1),
                ContainerId::new(1),
                "Members",
                FieldKind::TeamMemberSelect(TeamSelectorConfig::default()),
            )
            .unwrap_or_else(|_| unreachable!()),
            FieldDefinition::new(
                FieldId::new(2),
                ContainerId::new(1),
                "Team",
                FieldKind::TeamMemberSelect(TeamSelectorConfig {
                    correlation: TeamCorrelation::Unmatched,
                    notify_members: true,
                }),
            )
            .unwrap_or_else(|_| unreachable!()),
        ];

        let active = active_team_field(&fields).map(FieldDefinition::id);
        assert_eq!(active, Some(FieldId::new(2)));
    }

    #[test]
    fn custom_kind_reports_registered_name() {
        let kind = FieldKind::Custom {
            type_name: "rating".to_owned(),
            config: serde_json::json!({"max": 5}),
        };
        assert_eq!(kind.type_name(), "rating");
    }
}
