use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{StoreError, StudentStore};

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub email: String,
}

/// Incoming create/update body. Missing fields default so that validation
/// can report every problem at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentRequest {
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub email: String,
}

/// Student fields that passed validation; the only input stores accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentFields {
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub email: String,
}

/// Per-field validation messages keyed by the JSON field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl StudentRequest {
    pub fn validate(self) -> Result<StudentFields, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        check_name(&mut errors, "firstName", &self.first_name);
        check_name(&mut errors, "lastName", &self.last_name);
        if self.age < 1 {
            errors.add("age", "must be greater than or equal to 1");
        }
        if !is_well_formed_email(&self.email) {
            errors.add("email", "must be a well-formed email address");
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(StudentFields {
            first_name: self.first_name,
            last_name: self.last_name,
            age: self.age,
            email: self.email,
        })
    }
}

fn check_name(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "must not be blank");
        return;
    }
    let len = value.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        errors.add(
            field,
            format!("size must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS}"),
        );
    }
}

fn is_well_formed_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

#[derive(Debug, Error)]
pub enum StudentError {
    #[error("Student with id {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct StudentService {
    store: Arc<dyn StudentStore>,
}

impl StudentService {
    pub fn new(store: Arc<dyn StudentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, request: StudentRequest) -> Result<Student, StudentError> {
        let fields = request.validate()?;
        let student = self.store.insert_student(&fields).await?;
        info!("Created student {}", student.id);
        Ok(student)
    }

    pub async fn update(&self, id: i64, request: StudentRequest) -> Result<Student, StudentError> {
        let fields = request.validate()?;
        self.store
            .update_student(id, &fields)
            .await?
            .ok_or(StudentError::NotFound(id))
    }

    pub async fn delete(&self, id: i64) -> Result<(), StudentError> {
        if self.store.delete_student(id).await? {
            info!("Deleted student {}", id);
            Ok(())
        } else {
            Err(StudentError::NotFound(id))
        }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Student, StudentError> {
        self.store
            .find_student(id)
            .await?
            .ok_or(StudentError::NotFound(id))
    }

    pub async fn find_all(&self) -> Result<Vec<Student>, StudentError> {
        Ok(self.store.list_students().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ana() -> StudentRequest {
        StudentRequest {
            first_name: "Ana".to_string(),
            last_name: "Garcia".to_string(),
            age: 22,
            email: "ana@x.com".to_string(),
        }
    }

    fn service() -> (StudentService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (StudentService::new(store.clone()), store)
    }

    #[test]
    fn validation_reports_every_field() {
        let errors = StudentRequest {
            first_name: " ".to_string(),
            last_name: "G".to_string(),
            age: 0,
            email: "not-an-email".to_string(),
        }
        .validate()
        .unwrap_err();

        let fields = errors.fields();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields["firstName"], "must not be blank");
        assert_eq!(fields["lastName"], "size must be between 2 and 100");
        assert_eq!(fields["age"], "must be greater than or equal to 1");
        assert_eq!(fields["email"], "must be a well-formed email address");
    }

    #[test]
    fn accepts_valid_student() {
        let fields = ana().validate().unwrap();
        assert_eq!(fields.first_name, "Ana");
        assert_eq!(fields.age, 22);
    }

    #[test]
    fn email_shapes() {
        assert!(is_well_formed_email("juan.perez@email.com"));
        assert!(!is_well_formed_email("@email.com"));
        assert!(!is_well_formed_email("juan@"));
        assert!(!is_well_formed_email("juan@@email.com"));
        assert!(!is_well_formed_email("juan perez@email.com"));
    }

    #[tokio::test]
    async fn create_then_find_returns_same_fields() {
        let (service, _) = service();

        let created = service.create(ana()).await.unwrap();
        let found = service.find_by_id(created.id).await.unwrap();

        assert_eq!(created, found);
        assert_eq!(found.first_name, "Ana");
        assert_eq!(found.last_name, "Garcia");
        assert_eq!(found.age, 22);
        assert_eq!(found.email, "ana@x.com");
    }

    #[tokio::test]
    async fn update_of_missing_student_creates_nothing() {
        let (service, store) = service();

        let err = service.update(999, ana()).await.unwrap_err();

        assert!(matches!(err, StudentError::NotFound(999)));
        assert_eq!(err.to_string(), "Student with id 999 not found");
        assert!(store.list_students().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_of_missing_student_is_not_found() {
        let (service, _) = service();
        let err = service.delete(42).await.unwrap_err();
        assert!(matches!(err, StudentError::NotFound(42)));
    }

    #[tokio::test]
    async fn update_replaces_fields() {
        let (service, _) = service();
        let created = service.create(ana()).await.unwrap();

        let updated = service
            .update(
                created.id,
                StudentRequest {
                    age: 23,
                    ..ana()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.age, 23);
        assert_eq!(service.find_all().await.unwrap(), vec![updated]);
    }

    #[tokio::test]
    async fn invalid_request_is_not_stored() {
        let (service, store) = service();
        let err = service
            .create(StudentRequest {
                age: 0,
                ..ana()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StudentError::Validation(_)));
        assert!(store.list_students().await.unwrap().is_empty());
    }
}
