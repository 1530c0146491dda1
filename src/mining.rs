//! Role mining wizard forms.
//!
//! Each form validates itself and marshals into the flat argument map of its mining task.
//! No mining happens here.

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::MiningConfig;
use crate::entities::task_definition::{self, TaskDefinition};
use crate::errors::ApiError;
use crate::filter::{self, BooleanOperation, Filter};
use crate::tasks::{
    self, ARG_RESULT_NAME, DefinitionDraft, LaunchRequest, LaunchResult, TaskArguments, TaskLauncher,
};
use crate::validation::{MAX_NAME_LENGTH, Validatable, ValidationError, ValidationErrors, validators};

pub const DIRECTED_TASK_NAME: &str = "Directed Role Mining";
pub const IT_TASK_NAME: &str = "IT Role Mining";

pub const ARG_NEW_ROLE_NAME: &str = "newRoleName";
pub const ARG_NEW_ROLE_OWNER: &str = "newRoleOwner";
pub const ARG_NEW_ROLE_TYPE: &str = "newRoleType";
pub const ARG_CONTAINER_ROLE: &str = "containerRole";
pub const ARG_ROLE_ID: &str = "roleId";
pub const ARG_GROUP_NAMES: &str = "groupNames";
pub const ARG_FILTER: &str = "filter";
pub const ARG_CONSTRAINT_FILTERS: &str = "constraintFilters";
pub const ARG_APPLICATIONS: &str = "applications";
pub const ARG_THRESHOLD: &str = "threshold";
pub const ARG_SIMULATE: &str = "simulate";
pub const ARG_MIN_IDENTITIES: &str = "minIdentities";
pub const ARG_MIN_ENTITLEMENTS: &str = "minEntitlements";
pub const ARG_MAX_CANDIDATE_ROLES: &str = "maxCandidateRoles";
pub const ARG_POPULATION_FILTER: &str = "populationFilter";

/// Property holding the applications of an identity's accounts.
const APPLICATION_PROPERTY: &str = "links.application.id";

fn to_csv(values: &[String]) -> String {
    values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()).collect::<Vec<_>>().join(",")
}

/// Name of the result a run of `task_name` produces for `user`.
#[must_use]
pub fn result_name(template_name: Option<&str>, task_name: &str, user: &str) -> String {
    let base = template_name.filter(|n| !n.trim().is_empty()).unwrap_or(task_name);
    format!("{base} - {user}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum EntitlementCreationOption {
    CreateNewRole,
    AddToExistingRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum PopulationOption {
    #[default]
    None,
    GroupFilters,
    IdentityFilter,
}

/// Directed role mining wizard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectedMiningForm {
    pub template_id: Option<Uuid>,
    pub template_name: Option<String>,
    pub entitlement_creation_option: Option<EntitlementCreationOption>,
    pub new_role_name: Option<String>,
    pub new_role_owner: Option<String>,
    pub new_role_type: Option<String>,
    pub container_role: Option<String>,
    pub existing_role: Option<String>,
    #[serde(default)]
    pub filter_creation_option: PopulationOption,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Identity constraints in the filter expression language.
    #[serde(default)]
    pub identity_filters: Vec<String>,
    #[serde(default)]
    pub applications: Vec<String>,
    #[serde(default)]
    pub threshold: u32,
    #[serde(default)]
    pub simulate: bool,
}

fn compile_all(field: &str, sources: &[String], errors: &mut ValidationErrors) -> Vec<Filter> {
    let mut filters = Vec::new();
    for source in sources.iter().filter(|s| !s.trim().is_empty()) {
        match filter::compile(source) {
            Ok(filter) => filters.push(filter),
            Err(err) => errors.add(ValidationError::new(field, err.to_string())),
        }
    }
    filters
}

impl Validatable for DirectedMiningForm {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        match self.entitlement_creation_option {
            Some(EntitlementCreationOption::CreateNewRole) => {
                errors.check(validators::validate_required(
                    "newRoleOwner",
                    self.new_role_owner.as_deref().unwrap_or_default(),
                ));
                errors.check(validators::validate_required(
                    "newRoleType",
                    self.new_role_type.as_deref().unwrap_or_default(),
                ));
            }
            Some(EntitlementCreationOption::AddToExistingRole) => {
                errors.check(validators::validate_required(
                    "existingRole",
                    self.existing_role.as_deref().unwrap_or_default(),
                ));
            }
            None => errors.add(ValidationError::new(
                "entitlementCreationOption",
                "Choose to create a new role or add to an existing one",
            )),
        }
        if self.filter_creation_option == PopulationOption::GroupFilters && to_csv(&self.groups).is_empty() {
            errors.add(ValidationError::new("groups", "Select at least one group"));
        }
        compile_all("identityFilters", &self.identity_filters, &mut errors);
        errors.check(validators::validate_range("threshold", self.threshold, Some(0), Some(100)));
        errors.result()
    }
}

impl DirectedMiningForm {
    /// Task arguments for `user`.
    ///
    /// # Errors
    /// Fails with every invalid field.
    pub fn arguments(&self, user: &str) -> Result<TaskArguments, ApiError> {
        self.validate()?;
        let mut args = TaskArguments::new();

        match self.entitlement_creation_option {
            Some(EntitlementCreationOption::CreateNewRole) => {
                if let Some(name) = self.new_role_name.as_deref().filter(|n| !n.trim().is_empty()) {
                    args.insert(ARG_NEW_ROLE_NAME.into(), name.to_string());
                }
                args.insert(ARG_NEW_ROLE_OWNER.into(), self.new_role_owner.clone().unwrap_or_default());
                args.insert(ARG_NEW_ROLE_TYPE.into(), self.new_role_type.clone().unwrap_or_default());
                if let Some(container) = &self.container_role {
                    args.insert(ARG_CONTAINER_ROLE.into(), container.clone());
                }
            }
            Some(EntitlementCreationOption::AddToExistingRole) => {
                args.insert(ARG_ROLE_ID.into(), self.existing_role.clone().unwrap_or_default());
            }
            None => {}
        }

        match self.filter_creation_option {
            PopulationOption::GroupFilters => {
                args.insert(ARG_GROUP_NAMES.into(), to_csv(&self.groups));
            }
            PopulationOption::IdentityFilter => {
                let mut errors = ValidationErrors::new();
                let filters = compile_all("identityFilters", &self.identity_filters, &mut errors);
                errors.result()?;
                let rendered: Vec<String> = filters.iter().map(ToString::to_string).collect();
                if let Some(combined) = Filter::combine(BooleanOperation::And, filters) {
                    args.insert(ARG_FILTER.into(), combined.to_string());
                }
                let constraints = serde_json::to_string(&rendered)
                    .map_err(|err| ApiError::internal("Cannot encode constraint filters", Some(err.to_string())))?;
                args.insert(ARG_CONSTRAINT_FILTERS.into(), constraints);
            }
            PopulationOption::None => {}
        }

        args.insert(ARG_APPLICATIONS.into(), to_csv(&self.applications));
        args.insert(ARG_THRESHOLD.into(), self.threshold.to_string());
        args.insert(ARG_SIMULATE.into(), self.simulate.to_string());
        args.insert(
            ARG_RESULT_NAME.into(),
            result_name(self.template_name.as_deref(), DIRECTED_TASK_NAME, user),
        );
        Ok(args)
    }
}

/// IT role mining wizard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItMiningForm {
    pub template_id: Option<Uuid>,
    pub template_name: Option<String>,
    #[serde(default)]
    pub applications: Vec<String>,
    pub min_identities: Option<u32>,
    pub min_entitlements: Option<u32>,
    pub max_candidate_roles: Option<u32>,
    /// Extra identity attribute constraint in the filter expression language.
    pub attribute_filter: Option<String>,
}

impl Validatable for ItMiningForm {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if to_csv(&self.applications).is_empty() {
            errors.add(ValidationError::new("applications", "Select at least one application"));
        }
        if let Some(max) = self.max_candidate_roles {
            errors.check(validators::validate_range("maxCandidateRoles", max, Some(1), None));
        }
        if let Some(source) = &self.attribute_filter {
            compile_all("attributeFilter", std::slice::from_ref(source), &mut errors);
        }
        errors.result()
    }
}

impl ItMiningForm {
    /// Task arguments for `user`, unset numbers taken from `defaults`.
    ///
    /// # Errors
    /// Fails with every invalid field.
    pub fn arguments(&self, user: &str, defaults: &MiningConfig) -> Result<TaskArguments, ApiError> {
        self.validate()?;
        let applications: Vec<String> = self
            .applications
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        let mut population = vec![Filter::is_in(APPLICATION_PROPERTY, applications.clone())];
        if let Some(source) = self.attribute_filter.as_deref().filter(|s| !s.trim().is_empty()) {
            population.push(filter::compile(source)?);
        }
        let population = Filter::combine(BooleanOperation::And, population);

        let mut args = TaskArguments::new();
        args.insert(
            ARG_MIN_IDENTITIES.into(),
            self.min_identities.unwrap_or(defaults.min_identities).to_string(),
        );
        args.insert(
            ARG_MIN_ENTITLEMENTS.into(),
            self.min_entitlements.unwrap_or(defaults.min_entitlements).to_string(),
        );
        args.insert(
            ARG_MAX_CANDIDATE_ROLES.into(),
            self.max_candidate_roles.unwrap_or(defaults.max_candidate_roles).to_string(),
        );
        args.insert(ARG_APPLICATIONS.into(), applications.join(","));
        if let Some(population) = population {
            args.insert(ARG_POPULATION_FILTER.into(), population.to_string());
        }
        args.insert(
            ARG_RESULT_NAME.into(),
            result_name(self.template_name.as_deref(), IT_TASK_NAME, user),
        );
        Ok(args)
    }
}

/// Either wizard, tagged by `kind` (`directed` or `it`).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MiningForm {
    Directed(DirectedMiningForm),
    It(ItMiningForm),
}

impl MiningForm {
    #[must_use]
    pub const fn sub_type(&self) -> &'static str {
        match self {
            Self::Directed(_) => task_definition::SUB_TYPE_DIRECTED_MINING,
            Self::It(_) => task_definition::SUB_TYPE_IT_MINING,
        }
    }

    #[must_use]
    pub const fn task_name(&self) -> &'static str {
        match self {
            Self::Directed(_) => DIRECTED_TASK_NAME,
            Self::It(_) => IT_TASK_NAME,
        }
    }

    #[must_use]
    pub const fn template_id(&self) -> Option<Uuid> {
        match self {
            Self::Directed(form) => form.template_id,
            Self::It(form) => form.template_id,
        }
    }

    #[must_use]
    pub fn template_name(&self) -> Option<&str> {
        match self {
            Self::Directed(form) => form.template_name.as_deref(),
            Self::It(form) => form.template_name.as_deref(),
        }
    }

    /// # Errors
    /// Fails with every invalid field of the wizard.
    pub fn arguments(&self, user: &str, defaults: &MiningConfig) -> Result<TaskArguments, ApiError> {
        match self {
            Self::Directed(form) => form.arguments(user),
            Self::It(form) => form.arguments(user, defaults),
        }
    }
}

/// Store the wizard as a template. A form carrying `templateId` updates that template.
///
/// # Errors
/// `ValidationFailed` for an invalid form or a missing name, `Conflict` for a duplicate
/// name, `NotFound` for an unknown template id.
pub async fn save_template(
    db: &DatabaseConnection,
    form: &MiningForm,
    description: Option<String>,
    owner: &str,
    defaults: &MiningConfig,
) -> Result<TaskDefinition, ApiError> {
    let name = form.template_name().unwrap_or_default().trim().to_string();
    if form.template_id().is_none() {
        validators::validate_required("templateName", &name)?;
    }
    validators::validate_length("templateName", &name, None, Some(MAX_NAME_LENGTH))?;
    let arguments = form.arguments(owner, defaults)?;
    let draft = DefinitionDraft {
        id: form.template_id(),
        name,
        sub_type: form.sub_type().to_string(),
        owner: owner.to_string(),
        description,
        template: true,
        arguments,
    };
    let saved = tasks::save_definition(db, draft, "template").await?;
    info!(id = %saved.id, sub_type = %saved.sub_type, "Saved mining template");
    Ok(saved)
}

/// Submit the wizard's task.
///
/// # Errors
/// Fails with an invalid form or whatever the launcher refuses.
pub async fn launch(
    launcher: &dyn TaskLauncher,
    form: &MiningForm,
    user: &str,
    defaults: &MiningConfig,
) -> Result<LaunchResult, ApiError> {
    let arguments = form.arguments(user, defaults)?;
    launcher
        .launch(LaunchRequest {
            name: form.template_name().unwrap_or(form.task_name()).to_string(),
            sub_type: form.sub_type().to_string(),
            definition_id: form.template_id(),
            launcher: user.to_string(),
            arguments,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_role_form() -> DirectedMiningForm {
        DirectedMiningForm {
            entitlement_creation_option: Some(EntitlementCreationOption::CreateNewRole),
            new_role_name: Some("Finance Clerks".into()),
            new_role_owner: Some("jsmith".into()),
            new_role_type: Some("business".into()),
            applications: vec!["AD".into(), " ".into(), "LDAP".into()],
            threshold: 80,
            ..Default::default()
        }
    }

    // ============================================================================
    // Directed mining
    // ============================================================================

    #[test]
    fn test_directed_new_role_arguments() {
        let args = new_role_form().arguments("spadmin").unwrap();
        assert_eq!(args[ARG_NEW_ROLE_NAME], "Finance Clerks");
        assert_eq!(args[ARG_NEW_ROLE_OWNER], "jsmith");
        assert_eq!(args[ARG_APPLICATIONS], "AD,LDAP");
        assert_eq!(args[ARG_THRESHOLD], "80");
        assert_eq!(args[ARG_SIMULATE], "false");
        assert_eq!(args[ARG_RESULT_NAME], "Directed Role Mining - spadmin");
        assert!(!args.contains_key(ARG_ROLE_ID));
    }

    #[test]
    fn test_directed_requires_a_creation_option() {
        let form = DirectedMiningForm {
            entitlement_creation_option: None,
            ..new_role_form()
        };
        let ApiError::ValidationFailed { errors } = form.arguments("spadmin").unwrap_err() else {
            panic!("expected validation failure");
        };
        assert_eq!(errors[0].field, "entitlementCreationOption");
    }

    #[test]
    fn test_directed_existing_role_and_groups() {
        let form = DirectedMiningForm {
            entitlement_creation_option: Some(EntitlementCreationOption::AddToExistingRole),
            existing_role: Some("role-1".into()),
            filter_creation_option: PopulationOption::GroupFilters,
            groups: vec!["Finance".into(), "HR".into()],
            template_name: Some("Quarterly".into()),
            ..Default::default()
        };
        let args = form.arguments("spadmin").unwrap();
        assert_eq!(args[ARG_ROLE_ID], "role-1");
        assert_eq!(args[ARG_GROUP_NAMES], "Finance,HR");
        assert_eq!(args[ARG_RESULT_NAME], "Quarterly - spadmin");
        assert!(!args.contains_key(ARG_NEW_ROLE_OWNER));
    }

    #[test]
    fn test_directed_identity_filter_constraints() {
        let form = DirectedMiningForm {
            filter_creation_option: PopulationOption::IdentityFilter,
            identity_filters: vec![r#"department == "Finance""#.into(), r#"inactive == false"#.into()],
            ..new_role_form()
        };
        let args = form.arguments("spadmin").unwrap();
        assert_eq!(args[ARG_FILTER], r#"(department == "Finance" && inactive == false)"#);
        let constraints: Vec<String> = serde_json::from_str(&args[ARG_CONSTRAINT_FILTERS]).unwrap();
        assert_eq!(constraints.len(), 2);
    }

    #[test]
    fn test_directed_bad_filter_is_a_field_error() {
        let form = DirectedMiningForm {
            filter_creation_option: PopulationOption::IdentityFilter,
            identity_filters: vec!["department ==".into()],
            ..new_role_form()
        };
        let err = form.validate().unwrap_err();
        assert_eq!(err.errors()[0].field, "identityFilters");
    }

    #[test]
    fn test_directed_threshold_range() {
        let form = DirectedMiningForm {
            threshold: 150,
            ..new_role_form()
        };
        assert_eq!(form.validate().unwrap_err().errors()[0].field, "threshold");
    }

    // ============================================================================
    // IT mining
    // ============================================================================

    #[test]
    fn test_it_mining_defaults_and_population() {
        let form = ItMiningForm {
            applications: vec!["AD".into(), "LDAP".into()],
            ..Default::default()
        };
        let args = form.arguments("spadmin", &MiningConfig::default()).unwrap();
        assert_eq!(args[ARG_MIN_IDENTITIES], "0");
        assert_eq!(args[ARG_MIN_ENTITLEMENTS], "0");
        assert_eq!(args[ARG_MAX_CANDIDATE_ROLES], "1000");
        assert_eq!(args[ARG_APPLICATIONS], "AD,LDAP");
        assert_eq!(args[ARG_POPULATION_FILTER], r#"links.application.id.in({"AD", "LDAP"})"#);
        assert_eq!(args[ARG_RESULT_NAME], "IT Role Mining - spadmin");
    }

    #[test]
    fn test_it_mining_attribute_filter_is_anded() {
        let form = ItMiningForm {
            applications: vec!["AD".into()],
            min_identities: Some(5),
            attribute_filter: Some(r#"department == "Finance""#.into()),
            ..Default::default()
        };
        let args = form.arguments("spadmin", &MiningConfig::default()).unwrap();
        assert_eq!(args[ARG_MIN_IDENTITIES], "5");
        assert_eq!(
            args[ARG_POPULATION_FILTER],
            r#"(links.application.id.in({"AD"}) && department == "Finance")"#
        );
    }

    #[test]
    fn test_it_mining_requires_applications() {
        let err = ItMiningForm::default().validate().unwrap_err();
        assert_eq!(err.errors()[0].field, "applications");
    }
    // ============================================================================
    // Templates and launching
    // ============================================================================

    async fn db() -> DatabaseConnection {
        use sea_orm_migration::MigratorTrait;
        let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
        crate::migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn it_form(name: &str) -> MiningForm {
        MiningForm::It(ItMiningForm {
            template_name: Some(name.into()),
            applications: vec!["AD".into()],
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_save_template_rejects_duplicates_and_updates_by_id() {
        let db = db().await;
        let defaults = MiningConfig::default();
        let saved = save_template(&db, &it_form("Quarterly"), None, "spadmin", &defaults)
            .await
            .unwrap();
        assert!(saved.template);
        assert_eq!(saved.sub_type, task_definition::SUB_TYPE_IT_MINING);
        assert_eq!(saved.arguments[ARG_RESULT_NAME], "Quarterly - spadmin");

        let err = save_template(&db, &it_form("Quarterly"), None, "spadmin", &defaults)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict { .. }));

        let update = MiningForm::It(ItMiningForm {
            template_id: Some(saved.id),
            template_name: Some("Quarterly".into()),
            applications: vec!["LDAP".into()],
            ..Default::default()
        });
        let updated = save_template(&db, &update, None, "spadmin", &defaults).await.unwrap();
        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.arguments[ARG_APPLICATIONS], "LDAP");
    }

    #[tokio::test]
    async fn test_save_template_requires_a_name() {
        let db = db().await;
        let err = save_template(&db, &it_form(" "), None, "spadmin", &MiningConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed { .. }));
    }

    #[tokio::test]
    async fn test_launch_submits_arguments() {
        let db = db().await;
        let launcher = tasks::DatabaseTaskLauncher::new(db);
        let result = launch(&launcher, &it_form("Quarterly"), "spadmin", &MiningConfig::default())
            .await
            .unwrap();
        assert_eq!(result.name, "Quarterly");
        assert!(launch(&launcher, &it_form("Quarterly"), "spadmin", &MiningConfig::default())
            .await
            .is_err());
    }

    #[test]
    fn test_mining_form_is_tagged() {
        let form: MiningForm = serde_json::from_value(serde_json::json!({
            "kind": "directed",
            "entitlementCreationOption": "addToExistingRole",
            "existingRole": "r1"
        }))
        .unwrap();
        assert_eq!(form.sub_type(), task_definition::SUB_TYPE_DIRECTED_MINING);
        assert_eq!(form.task_name(), DIRECTED_TASK_NAME);
    }
}
