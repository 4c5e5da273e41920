pub mod books;
pub mod error;
pub mod lending;
pub mod recovery;
pub mod repos;
pub mod students;
pub mod teachers;

use std::sync::Arc;

use crate::cache::{CacheConfig, CacheConsumer, CacheStore, CacheTrigger, ReadThrough};

use self::books::BookService;
use self::lending::{LendingConfig, LendingService};
use self::repos::{BooksRepo, StudentsRepo, TeachersRepo};
use self::students::StudentService;
use self::teachers::TeacherService;

/// Every service, wired to one repository set and one cache store.
#[derive(Clone)]
pub struct Services {
    pub teachers: TeacherService,
    pub students: StudentService,
    pub books: BookService,
    pub lending: LendingService,
    pub cache_store: Arc<dyn CacheStore>,
    pub consumer: Arc<CacheConsumer>,
}

impl Services {
    pub fn new<R>(
        repos: Arc<R>,
        store: Arc<dyn CacheStore>,
        cache: &CacheConfig,
        lending: LendingConfig,
    ) -> Self
    where
        R: TeachersRepo + StudentsRepo + BooksRepo + 'static,
    {
        let teachers_repo: Arc<dyn TeachersRepo> = repos.clone();
        let students_repo: Arc<dyn StudentsRepo> = repos.clone();
        let books_repo: Arc<dyn BooksRepo> = repos;

        Self::from_parts(teachers_repo, students_repo, books_repo, store, cache, lending)
    }

    /// Wires services over independently supplied repositories.
    pub fn from_parts(
        teachers_repo: Arc<dyn TeachersRepo>,
        students_repo: Arc<dyn StudentsRepo>,
        books_repo: Arc<dyn BooksRepo>,
        store: Arc<dyn CacheStore>,
        cache: &CacheConfig,
        lending: LendingConfig,
    ) -> Self {
        let reader = Arc::new(ReadThrough::new(store.clone(), cache.default_ttl));
        let consumer = Arc::new(CacheConsumer::new(store.clone(), cache.policy));
        let trigger = Arc::new(CacheTrigger::new(cache.is_enabled(), consumer.clone()));

        Self {
            teachers: TeacherService::new(
                teachers_repo.clone(),
                students_repo.clone(),
                reader.clone(),
                trigger.clone(),
            ),
            students: StudentService::new(
                students_repo.clone(),
                teachers_repo,
                books_repo.clone(),
                reader.clone(),
                trigger.clone(),
            ),
            books: BookService::new(
                books_repo.clone(),
                students_repo.clone(),
                reader,
                trigger.clone(),
            ),
            lending: LendingService::new(books_repo, students_repo, trigger, lending),
            cache_store: store,
            consumer,
        }
    }
}
