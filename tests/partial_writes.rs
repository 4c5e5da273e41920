//! Multi-record writes that fail part way: committed steps are rolled back
//! and the cache never keeps serving what the store no longer holds.

mod common;

use rostra::application::error::ServiceError;
use rostra::application::repos::{BooksRepo, StudentFilter, StudentsRepo, TeachersRepo};
use rostra::application::students::UpdateStudentCommand;
use rostra::cache::CacheKey;
use rostra::domain::entities::EntityKind;

use common::Harness;
use common::faults::Fault;

fn is_backing_store(err: &ServiceError) -> bool {
    matches!(err, ServiceError::BackingStore(_))
}

#[tokio::test]
async fn reassignment_rolls_back_when_old_roster_write_fails() {
    let (harness, faults) = Harness::with_faults();
    let first = harness.teacher("Ada").await;
    let second = harness.teacher("Grace").await;
    let student = harness.student(first.id, "Lin").await;
    harness.services.students.get(student.id).await.unwrap();
    harness.services.teachers.get(second.id).await.unwrap();
    assert!(harness.cached(CacheKey::student(student.id)).await);

    faults.inject(Fault::RemoveStudentFrom(first.id));
    let err = harness
        .services
        .students
        .update(
            student.id,
            UpdateStudentCommand {
                teacher_id: Some(second.id),
                ..UpdateStudentCommand::default()
            },
        )
        .await
        .unwrap_err();

    assert!(is_backing_store(&err), "{err:?}");
    let stored = harness.repos.find_student(student.id).await.unwrap().unwrap();
    let first_after = harness.repos.find_teacher(first.id).await.unwrap().unwrap();
    let second_after = harness.repos.find_teacher(second.id).await.unwrap().unwrap();
    assert_eq!(stored.teacher_id, Some(first.id));
    assert!(first_after.students.contains(&student.id));
    assert!(!second_after.students.contains(&student.id));

    assert!(!harness.cached(CacheKey::student(student.id)).await);
    assert!(!harness.cached(CacheKey::teacher(second.id)).await);
    let served = harness.services.students.get(student.id).await.unwrap();
    assert_eq!(served.teacher_id, stored.teacher_id);
}

#[tokio::test]
async fn reassignment_leaves_state_untouched_when_new_roster_write_fails() {
    let (harness, faults) = Harness::with_faults();
    let first = harness.teacher("Ada").await;
    let second = harness.teacher("Grace").await;
    let student = harness.student(first.id, "Lin").await;

    faults.inject(Fault::AddStudent);
    let err = harness
        .services
        .students
        .update(
            student.id,
            UpdateStudentCommand {
                teacher_id: Some(second.id),
                ..UpdateStudentCommand::default()
            },
        )
        .await
        .unwrap_err();

    assert!(is_backing_store(&err), "{err:?}");
    let stored = harness.repos.find_student(student.id).await.unwrap().unwrap();
    let second_after = harness.repos.find_teacher(second.id).await.unwrap().unwrap();
    assert_eq!(stored.teacher_id, Some(first.id));
    assert!(second_after.students.is_empty());
}

#[tokio::test]
async fn create_removes_student_when_roster_write_fails() {
    let (harness, faults) = Harness::with_faults();
    let teacher = harness.teacher("Ada").await;
    harness.services.students.list().await.unwrap();
    harness.services.teachers.get(teacher.id).await.unwrap();

    faults.inject(Fault::AddStudent);
    let err = harness
        .services
        .students
        .create(common::student_command(teacher.id, "Lin"))
        .await
        .unwrap_err();

    assert!(is_backing_store(&err), "{err:?}");
    let students = harness
        .repos
        .list_students(&StudentFilter::default())
        .await
        .unwrap();
    assert!(students.is_empty());
    assert!(!harness.cached(CacheKey::collection(EntityKind::Student)).await);
    assert!(!harness.cached(CacheKey::teacher(teacher.id)).await);
}

#[tokio::test]
async fn student_delete_restores_roster_and_loans_when_delete_fails() {
    let (harness, faults) = Harness::with_faults();
    let teacher = harness.teacher("Ada").await;
    let student = harness.student(teacher.id, "Lin").await;
    let book = harness.book("Earthsea", 1).await;
    harness
        .services
        .lending
        .borrow(student.id, book.id)
        .await
        .unwrap();
    harness.services.students.get(student.id).await.unwrap();
    harness.services.books.get(book.id).await.unwrap();

    faults.inject(Fault::DeleteStudent);
    let err = harness.services.students.delete(student.id).await.unwrap_err();

    assert!(is_backing_store(&err), "{err:?}");
    let stored_student = harness.repos.find_student(student.id).await.unwrap().unwrap();
    let stored_book = harness.repos.find_book(book.id).await.unwrap().unwrap();
    let stored_teacher = harness.repos.find_teacher(teacher.id).await.unwrap().unwrap();
    assert!(stored_student.books.contains(&book.id));
    assert_eq!(stored_book.quantity, 0);
    assert!(stored_book.borrowed_by.contains(&student.id));
    assert!(stored_teacher.students.contains(&student.id));

    assert!(!harness.cached(CacheKey::student(student.id)).await);
    assert!(!harness.cached(CacheKey::book(book.id)).await);
}

#[tokio::test]
async fn student_delete_rejoins_roster_when_release_fails() {
    let (harness, faults) = Harness::with_faults();
    let teacher = harness.teacher("Ada").await;
    let student = harness.student(teacher.id, "Lin").await;
    harness.services.teachers.roster(teacher.id).await.unwrap();

    faults.inject(Fault::ReleaseBorrower);
    let err = harness.services.students.delete(student.id).await.unwrap_err();

    assert!(is_backing_store(&err), "{err:?}");
    let stored_teacher = harness.repos.find_teacher(teacher.id).await.unwrap().unwrap();
    assert!(stored_teacher.students.contains(&student.id));
    assert!(harness.repos.find_student(student.id).await.unwrap().is_some());
    assert!(!harness.cached(CacheKey::roster(teacher.id)).await);
}

#[tokio::test]
async fn teacher_delete_readopts_students_when_delete_fails() {
    let (harness, faults) = Harness::with_faults();
    let teacher = harness.teacher("Ada").await;
    let student = harness.student(teacher.id, "Lin").await;
    harness.services.students.get(student.id).await.unwrap();

    faults.inject(Fault::DeleteTeacher);
    let err = harness.services.teachers.delete(teacher.id).await.unwrap_err();

    assert!(is_backing_store(&err), "{err:?}");
    assert!(harness.repos.find_teacher(teacher.id).await.unwrap().is_some());
    let stored = harness.repos.find_student(student.id).await.unwrap().unwrap();
    assert_eq!(stored.teacher_id, Some(teacher.id));

    assert!(!harness.cached(CacheKey::student(student.id)).await);
    let served = harness.services.students.get(student.id).await.unwrap();
    assert_eq!(served.teacher_id, Some(teacher.id));
}

#[tokio::test]
async fn book_delete_restores_holders_when_delete_fails() {
    let (harness, faults) = Harness::with_faults();
    let teacher = harness.teacher("Ada").await;
    let student = harness.student(teacher.id, "Lin").await;
    let book = harness.book("Earthsea", 1).await;
    harness
        .services
        .lending
        .borrow(student.id, book.id)
        .await
        .unwrap();
    harness.services.students.books(student.id).await.unwrap();

    faults.inject(Fault::DeleteBook);
    let err = harness.services.books.delete(book.id).await.unwrap_err();

    assert!(is_backing_store(&err), "{err:?}");
    assert!(harness.repos.find_book(book.id).await.unwrap().is_some());
    let stored = harness.repos.find_student(student.id).await.unwrap().unwrap();
    assert!(stored.books.contains(&book.id));
    assert!(!harness.cached(CacheKey::book_list(student.id)).await);
}
