//! Student and course records and the selection relation between them.
//!
//! Handlers talk to a [`Store`]; [`MemoryStore`] is the implementation the
//! binary runs with. Every lookup is by key, and listings come back ordered
//! by id.

use std::collections::BTreeSet;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of a generated student id.
pub const STUDENT_ID_LEN: usize = 10;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub username: String,
}

impl Student {
    /// A new student with a random alphanumeric id.
    pub fn new(username: impl Into<String>) -> Self {
        let id = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(STUDENT_ID_LEN)
            .map(char::from)
            .collect();
        Self { id, username: username.into() }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub teacher: String,
    pub department: String,
    pub time: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("{what} {key} already exists")]
    Conflict { what: &'static str, key: String },
    #[error("no {what} with id={key}")]
    NotFound { what: &'static str, key: String },
}

impl StoreError {
    fn not_found(what: &'static str, key: &str) -> Self {
        Self::NotFound { what, key: key.to_owned() }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-based persistence for students, courses and selections.
pub trait Store: Send + Sync + 'static {
    /// Fails with `Conflict` when the id or the username is taken.
    fn create_student(&self, student: Student) -> StoreResult<()>;
    fn student(&self, id: &str) -> StoreResult<Option<Student>>;
    fn student_for_user(&self, username: &str) -> StoreResult<Option<Student>>;
    fn students(&self) -> StoreResult<Vec<Student>>;

    /// Inserts the course, or replaces the one with the same id.
    fn put_course(&self, course: Course) -> StoreResult<()>;
    fn course(&self, id: &str) -> StoreResult<Option<Course>>;
    fn course_exists(&self, id: &str) -> StoreResult<bool>;
    fn courses(&self) -> StoreResult<Vec<Course>>;

    fn clear_selection(&self, student: &str) -> StoreResult<()>;
    /// Adds to the selection; fails without writing if any course is unknown.
    fn add_selection(&self, student: &str, courses: &[String]) -> StoreResult<()>;
    /// Selected course ids, ordered.
    fn selection(&self, student: &str) -> StoreResult<Vec<String>>;

    fn replace_selection(&self, student: &str, courses: &[String]) -> StoreResult<()> {
        self.clear_selection(student)?;
        self.add_selection(student, courses)
    }
}

/// In-process [`Store`] over concurrent maps.
#[derive(Default)]
pub struct MemoryStore {
    students: DashMap<String, Student>,
    users: DashMap<String, String>,
    courses: DashMap<String, Course>,
    selections: DashMap<String, BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    fn ensure_student(&self, id: &str) -> StoreResult<()> {
        if self.students.contains_key(id) {
            Ok(())
        } else {
            Err(StoreError::not_found("student", id))
        }
    }

    fn ensure_courses(&self, ids: &[String]) -> StoreResult<()> {
        match ids.iter().find(|id| !self.courses.contains_key(id.as_str())) {
            Some(missing) => Err(StoreError::not_found("course", missing)),
            None => Ok(()),
        }
    }
}

impl Store for MemoryStore {
    fn create_student(&self, student: Student) -> StoreResult<()> {
        // Lock order: users, then students.
        let Entry::Vacant(user) = self.users.entry(student.username.clone()) else {
            return Err(StoreError::Conflict { what: "user", key: student.username });
        };
        let Entry::Vacant(record) = self.students.entry(student.id.clone()) else {
            return Err(StoreError::Conflict { what: "student", key: student.id });
        };
        user.insert(student.id.clone());
        record.insert(student);
        Ok(())
    }

    fn student(&self, id: &str) -> StoreResult<Option<Student>> {
        Ok(self.students.get(id).map(|s| s.value().clone()))
    }

    fn student_for_user(&self, username: &str) -> StoreResult<Option<Student>> {
        let Some(id) = self.users.get(username).map(|id| id.value().clone()) else {
            return Ok(None);
        };
        self.student(&id)
    }

    fn students(&self) -> StoreResult<Vec<Student>> {
        let mut all: Vec<_> = self.students.iter().map(|s| s.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    fn put_course(&self, course: Course) -> StoreResult<()> {
        self.courses.insert(course.id.clone(), course);
        Ok(())
    }

    fn course(&self, id: &str) -> StoreResult<Option<Course>> {
        Ok(self.courses.get(id).map(|c| c.value().clone()))
    }

    fn course_exists(&self, id: &str) -> StoreResult<bool> {
        Ok(self.courses.contains_key(id))
    }

    fn courses(&self) -> StoreResult<Vec<Course>> {
        let mut all: Vec<_> = self.courses.iter().map(|c| c.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    fn clear_selection(&self, student: &str) -> StoreResult<()> {
        self.ensure_student(student)?;
        self.selections.remove(student);
        Ok(())
    }

    fn add_selection(&self, student: &str, courses: &[String]) -> StoreResult<()> {
        self.ensure_student(student)?;
        self.ensure_courses(courses)?;
        self.selections
            .entry(student.to_owned())
            .or_default()
            .extend(courses.iter().cloned());
        Ok(())
    }

    fn selection(&self, student: &str) -> StoreResult<Vec<String>> {
        Ok(self.selections
            .get(student)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Swaps the whole set in one write, so readers never see it half-built.
    fn replace_selection(&self, student: &str, courses: &[String]) -> StoreResult<()> {
        self.ensure_student(student)?;
        self.ensure_courses(courses)?;
        self.selections.insert(student.to_owned(), courses.iter().cloned().collect());
        Ok(())
    }
}
