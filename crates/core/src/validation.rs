//! Input checks applied before anything reaches storage.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use validator::{Validate, ValidationErrors};

use crate::error::DomainError;
use crate::types::{JobInput, JobUpdate, NewUser, UploadKind, UserUpdate};

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid username regex"));
static SALARY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[$€£¥₹]?[\d,]+(\s*-\s*[$€£¥₹]?[\d,]+)?$").expect("valid salary regex")
});

const PASSWORD_SPECIALS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Checks a registration request.
pub fn validate_new_user(input: &NewUser) -> Result<(), DomainError> {
    let mut messages = collect(input.validate());
    check_username(&input.username, &mut messages);
    check_password(&input.password, &mut messages);
    finish(messages)
}

pub fn validate_user_update(input: &UserUpdate) -> Result<(), DomainError> {
    let mut messages = collect(input.validate());
    if let Some(username) = &input.username {
        check_username(username, &mut messages);
    }
    if let Some(password) = &input.password {
        check_password(password, &mut messages);
    }
    finish(messages)
}

/// Checks a posting and returns it trimmed, with the salary normalized.
pub fn validate_job_input(mut input: JobInput) -> Result<JobInput, DomainError> {
    for field in [
        &mut input.title,
        &mut input.description,
        &mut input.location,
        &mut input.category,
        &mut input.company,
    ] {
        *field = field.trim().to_string();
    }
    let mut messages = collect(input.validate());
    match normalize_salary(input.salary.as_deref()) {
        Ok(salary) => input.salary = salary,
        Err(message) => messages.push(message),
    }
    finish(messages).map(|_| input)
}

/// Same as [`validate_job_input`] for the fields present in the patch.
pub fn validate_job_update(mut input: JobUpdate) -> Result<JobUpdate, DomainError> {
    for field in [
        &mut input.title,
        &mut input.description,
        &mut input.location,
        &mut input.category,
        &mut input.company,
    ]
    .into_iter()
    .flatten()
    {
        *field = field.trim().to_string();
    }
    let mut messages = collect(input.validate());
    if let Some(raw) = input.salary.take() {
        match normalize_salary(Some(&raw)) {
            // An explicitly blank salary clears the stored value.
            Ok(salary) => input.salary = Some(salary.unwrap_or_default()),
            Err(message) => messages.push(message),
        }
    }
    finish(messages).map(|_| input)
}

/// Validates the salary format and prefixes bare amounts with `$`.
pub fn normalize_salary(raw: Option<&str>) -> Result<Option<String>, String> {
    let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    if !SALARY_PATTERN.is_match(value) {
        return Err(
            "Please enter a valid salary format (e.g., $50,000 or $50,000 - $70,000)".to_string(),
        );
    }
    let starts_with_currency = value
        .chars()
        .next()
        .map(|c| !c.is_ascii_digit())
        .unwrap_or(false);
    if starts_with_currency {
        Ok(Some(value.to_string()))
    } else {
        Ok(Some(format!("${value}")))
    }
}

/// Returns the lowercased extension when the file name is acceptable for `kind`.
pub fn check_upload_extension(kind: UploadKind, filename: &str) -> Result<String, DomainError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let allowed = kind.allowed_extensions();
    if allowed.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(DomainError::validation(format!(
            "Invalid file type. Allowed extensions: {}",
            allowed.join(", ")
        )))
    }
}

fn check_username(username: &str, messages: &mut Vec<String>) {
    if !USERNAME_PATTERN.is_match(username) {
        messages.push("Username can only contain letters, numbers, and underscores".to_string());
    }
}

fn check_password(password: &str, messages: &mut Vec<String>) {
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        messages.push("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        messages.push("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        messages.push("Password must contain at least one number".to_string());
    }
    if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
        messages.push("Password must contain at least one special character".to_string());
    }
}

fn collect(result: Result<(), ValidationErrors>) -> Vec<String> {
    let Err(errors) = result else {
        return Vec::new();
    };
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                error
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid"))
            })
        })
        .collect()
}

fn finish(messages: Vec<String>) -> Result<(), DomainError> {
    if messages.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn new_user(username: &str, email: &str, password: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Role::JobSeeker,
            profile_picture: None,
        }
    }

    fn job_input() -> JobInput {
        JobInput {
            title: "Backend Engineer".into(),
            description: "Own the services that power the job board.".into(),
            salary: Some("90,000 - 120,000".into()),
            location: "Remote".into(),
            category: "Engineering".into(),
            company: "Acme".into(),
            company_logo: None,
        }
    }

    #[test]
    fn accepts_valid_registration() {
        validate_new_user(&new_user("jane_doe", "jane@example.com", "Str0ng!pass"))
            .expect("valid user");
    }

    #[test]
    fn reports_every_registration_problem() {
        let err = validate_new_user(&new_user("a-", "not-an-email", "weak")).unwrap_err();
        let DomainError::Validation(messages) = err else {
            panic!("expected validation error");
        };
        assert!(messages.contains(&"Please enter a valid email address".to_string()));
        assert!(messages.contains(&"Username must be between 3 and 50 characters".to_string()));
        assert!(messages
            .contains(&"Username can only contain letters, numbers, and underscores".to_string()));
        assert!(messages.contains(&"Password must contain at least one uppercase letter".to_string()));
        assert!(messages.contains(&"Password must contain at least one special character".to_string()));
    }

    #[test]
    fn update_only_checks_present_fields() {
        validate_user_update(&UserUpdate::default()).expect("empty update is valid");
        let err = validate_user_update(&UserUpdate {
            email: Some("broken".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.messages(), vec!["Please enter a valid email address".to_string()]);
    }

    #[test]
    fn salary_gets_dollar_prefix() {
        assert_eq!(
            normalize_salary(Some("50,000")).unwrap().as_deref(),
            Some("$50,000")
        );
        assert_eq!(
            normalize_salary(Some("€40,000 - €50,000")).unwrap().as_deref(),
            Some("€40,000 - €50,000")
        );
        assert_eq!(normalize_salary(Some("  ")).unwrap(), None);
        assert!(normalize_salary(Some("lots of money")).is_err());
    }

    #[test]
    fn job_input_is_normalized() {
        let job = validate_job_input(job_input()).expect("valid job");
        assert_eq!(job.salary.as_deref(), Some("$90,000 - 120,000"));
    }

    #[test]
    fn short_job_fields_are_rejected() {
        let mut input = job_input();
        input.title = "Dev".into();
        input.description = "Too short".into();
        let err = validate_job_input(input).unwrap_err();
        assert_eq!(
            err.messages(),
            vec![
                "Description must be between 20 and 5000 characters".to_string(),
                "Job title must be between 5 and 100 characters".to_string(),
            ]
        );
    }

    #[test]
    fn job_fields_are_trimmed_before_length_checks() {
        let mut input = job_input();
        input.title = "     ".into();
        let err = validate_job_input(input).unwrap_err();
        assert_eq!(
            err.messages(),
            vec!["Job title must be between 5 and 100 characters".to_string()]
        );

        let mut input = job_input();
        input.title = "    x".into();
        assert!(validate_job_input(input).is_err());

        let mut input = job_input();
        input.company = "  Acme Corp  ".into();
        let job = validate_job_input(input).expect("padded fields are valid");
        assert_eq!(job.company, "Acme Corp");
    }

    #[test]
    fn job_update_fields_are_trimmed() {
        let update = validate_job_update(JobUpdate {
            title: Some("   Senior Dev   ".into()),
            ..Default::default()
        })
        .expect("valid update");
        assert_eq!(update.title.as_deref(), Some("Senior Dev"));

        let err = validate_job_update(JobUpdate {
            location: Some("   ".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(
            err.messages(),
            vec!["Location must be between 2 and 100 characters".to_string()]
        );
    }

    #[test]
    fn blank_salary_update_clears_value() {
        let update = validate_job_update(JobUpdate {
            salary: Some(" ".into()),
            ..Default::default()
        })
        .expect("blank salary is allowed");
        assert_eq!(update.salary.as_deref(), Some(""));
    }

    #[test]
    fn upload_extensions_depend_on_kind() {
        assert_eq!(
            check_upload_extension(UploadKind::Resume, "CV.PDF").unwrap(),
            "pdf"
        );
        assert!(check_upload_extension(UploadKind::Resume, "cv.exe").is_err());
        assert!(check_upload_extension(UploadKind::CompanyLogo, "logo.docx").is_err());
        assert!(check_upload_extension(UploadKind::ProfilePicture, "me.jpeg").is_ok());
        assert!(check_upload_extension(UploadKind::Resume, "no_extension").is_err());
    }
}
