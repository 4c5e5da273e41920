#![allow(dead_code)]

pub mod faults;

use std::num::NonZeroUsize;
use std::sync::Arc;

use rostra::application::Services;
use rostra::application::books::CreateBookCommand;
use rostra::application::lending::LendingConfig;
use rostra::application::students::CreateStudentCommand;
use rostra::application::teachers::CreateTeacherCommand;
use rostra::cache::{CacheConfig, CacheKey, CacheStore, MemoryCacheStore};
use rostra::domain::entities::{BookRecord, StudentRecord, TeacherRecord};
use rostra::infra::memory::InMemoryRepositories;
use uuid::Uuid;

use self::faults::FaultyRepos;

pub struct Harness {
    pub services: Services,
    pub repos: Arc<InMemoryRepositories>,
    pub store: Arc<MemoryCacheStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_lending(LendingConfig::default())
    }

    pub fn with_lending(lending: LendingConfig) -> Self {
        let repos = Arc::new(InMemoryRepositories::new());
        let store = Arc::new(MemoryCacheStore::new(
            NonZeroUsize::new(1_024).expect("non-zero capacity"),
        ));
        let services = Services::new(
            repos.clone(),
            store.clone(),
            &CacheConfig::default(),
            lending,
        );
        Self {
            services,
            repos,
            store,
        }
    }

    /// Services over repositories that fail writes injected into the
    /// returned handle; `repos` still reads the underlying state.
    pub fn with_faults() -> (Self, Arc<FaultyRepos>) {
        let repos = Arc::new(InMemoryRepositories::new());
        let faulty = Arc::new(FaultyRepos::new(repos.clone()));
        let store = Arc::new(MemoryCacheStore::new(
            NonZeroUsize::new(1_024).expect("non-zero capacity"),
        ));
        let services = Services::new(
            faulty.clone(),
            store.clone(),
            &CacheConfig::default(),
            LendingConfig::default(),
        );
        (
            Self {
                services,
                repos,
                store,
            },
            faulty,
        )
    }

    pub async fn cached(&self, key: CacheKey) -> bool {
        self.store
            .get(&key.to_string())
            .await
            .expect("memory store does not fault")
            .is_some()
    }

    pub async fn teacher(&self, name: &str) -> TeacherRecord {
        self.services
            .teachers
            .create(CreateTeacherCommand {
                name: name.to_string(),
                email: unique_email(name),
                subject: "Mathematics".to_string(),
            })
            .await
            .expect("teacher should be created")
    }

    pub async fn student(&self, teacher_id: Uuid, name: &str) -> StudentRecord {
        self.services
            .students
            .create(student_command(teacher_id, name))
            .await
            .expect("student should be created")
    }

    pub async fn book(&self, title: &str, quantity: i32) -> BookRecord {
        self.services
            .books
            .create(book_command(title, quantity))
            .await
            .expect("book should be created")
    }
}

pub fn unique_email(name: &str) -> String {
    format!("{}{}@school.org", name.to_lowercase(), Uuid::new_v4().simple())
}

pub fn student_command(teacher_id: Uuid, name: &str) -> CreateStudentCommand {
    CreateStudentCommand {
        name: name.to_string(),
        email: unique_email(name),
        grade: "10".to_string(),
        teacher_id: Some(teacher_id),
    }
}

pub fn book_command(title: &str, quantity: i32) -> CreateBookCommand {
    CreateBookCommand {
        title: title.to_string(),
        author: "Ursula K. Le Guin".to_string(),
        isbn: Uuid::new_v4().simple().to_string(),
        published_year: 1969,
        genre: "Fiction".to_string(),
        quantity: Some(quantity),
    }
}
