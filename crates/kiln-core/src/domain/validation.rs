use crate::domain::entities::request::GenerationRequest;
use crate::domain::render::is_variable_name;
use crate::domain::value_objects::ModuleId;

/// Longest accepted project name (npm's package name limit).
pub const MAX_PROJECT_NAME_LEN: usize = 214;

/// Upper bound for `GenerationOptions::max_retries`.
pub const MAX_RETRIES: u32 = 10;

/// Centralized request validation.
///
/// Every check runs; the caller gets the complete list of problems rather
/// than the first one.
pub struct DomainValidator;

impl DomainValidator {
    /// Validate a request and return its module ids, parsed.
    pub fn validate_request(request: &GenerationRequest) -> Result<Vec<ModuleId>, Vec<String>> {
        let mut issues = Vec::new();

        Self::check_project_name(request.project_name(), &mut issues);

        let location = request.output_location().as_os_str();
        if location.is_empty() {
            issues.push("output location cannot be empty".to_string());
        } else if location.as_encoded_bytes().contains(&0) {
            issues.push("output location cannot contain NUL bytes".to_string());
        }

        let mut ids = Vec::with_capacity(request.modules().len());
        for raw in request.modules() {
            match ModuleId::parse(raw.as_str()) {
                Ok(id) => ids.push(id),
                Err(e) => issues.push(e.to_string()),
            }
        }

        for name in request.variables().keys() {
            if !is_variable_name(name) {
                issues.push(format!(
                    "variable name '{name}' is invalid; use letters, digits and '_', not starting with a digit"
                ));
            }
        }

        let options = request.options();
        if options.timeout.is_zero() {
            issues.push("timeout must be greater than zero".to_string());
        }
        if options.max_retries > MAX_RETRIES {
            issues.push(format!(
                "max_retries is {}; maximum is {MAX_RETRIES}",
                options.max_retries
            ));
        }

        if issues.is_empty() {
            Ok(ids)
        } else {
            Err(issues)
        }
    }

    fn check_project_name(name: &str, issues: &mut Vec<String>) {
        if name.trim().is_empty() {
            issues.push("project name cannot be empty".to_string());
            return;
        }
        let len = name.chars().count();
        if len > MAX_PROJECT_NAME_LEN {
            issues.push(format!(
                "project name is {len} characters long; maximum is {MAX_PROJECT_NAME_LEN}"
            ));
        }
        if name.contains(['/', '\\']) {
            issues.push("project name cannot contain path separators".to_string());
        }
        if name.chars().any(char::is_control) {
            issues.push("project name cannot contain control characters".to_string());
        }
        if name == "." || name == ".." {
            issues.push(format!("'{name}' is not a valid project name"));
        }
    }
}
