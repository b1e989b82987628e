#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use course_market::{
    AppConfig, AppState,
    auth::issue_token,
    error::RepositoryError,
    models::{Course, CourseDraft, NewUser, Purchase, PurchaseRecord, Role, User, UserCredentials},
    password,
    repository::{RepoResult, Repository},
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

/// bcrypt's minimum cost keeps the suites fast.
pub const TEST_COST: u32 = 4;

#[derive(Default)]
struct Tables {
    users: Vec<(User, String)>,
    courses: Vec<Course>,
    purchases: Vec<Purchase>,
    next_user_id: i32,
    next_course_id: i32,
    next_purchase_id: i32,
}

/// InMemoryRepository
///
/// A `Repository` double that enforces the same uniqueness, ownership and
/// foreign-key rules as the Postgres schema. Flip `fail` to make every call
/// return a database error.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
    pub fail: AtomicBool,
}

fn db_down() -> RepositoryError {
    RepositoryError::Database(sqlx::Error::PoolTimedOut)
}

impl InMemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> RepoResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(db_down())
        } else {
            Ok(())
        }
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }

    pub fn purchase_count(&self) -> usize {
        self.tables.lock().unwrap().purchases.len()
    }

    pub fn stored_hash(&self, username: &str) -> Option<String> {
        self.tables
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|(u, _)| u.username == username)
            .map(|(_, hash)| hash.clone())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn username_or_email_taken(&self, username: &str, email: &str) -> RepoResult<bool> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .any(|(u, _)| u.username == username || u.email == email))
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if tables
            .users
            .iter()
            .any(|(u, _)| u.username == user.username || u.email == user.email)
        {
            return Err(RepositoryError::UniqueViolation("users_username_key".to_string()));
        }
        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: Utc::now(),
        };
        tables.users.push((created.clone(), user.password_hash));
        Ok(created)
    }

    async fn get_user(&self, id: i32) -> RepoResult<Option<User>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|(u, _)| u.id == id).map(|(u, _)| u.clone()))
    }

    async fn find_credentials(&self, username: &str) -> RepoResult<Option<UserCredentials>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .find(|(u, _)| u.username == username)
            .map(|(u, hash)| UserCredentials {
                id: u.id,
                username: u.username.clone(),
                email: u.email.clone(),
                password_hash: hash.clone(),
                role: u.role,
            }))
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let mut users: Vec<User> = tables.users.iter().map(|(u, _)| u.clone()).collect();
        users.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(users)
    }

    async fn update_user_role(&self, id: i32, role: Role) -> RepoResult<Option<User>> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter_mut()
            .find(|(u, _)| u.id == id)
            .map(|(u, _)| {
                u.role = role;
                u.clone()
            }))
    }

    async fn delete_user(&self, id: i32) -> RepoResult<bool> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if !tables.users.iter().any(|(u, _)| u.id == id) {
            return Ok(false);
        }
        if tables.courses.iter().any(|c| c.instructor_id == id) {
            return Err(RepositoryError::ForeignKeyViolation(
                "courses_instructor_id_fkey".to_string(),
            ));
        }
        tables.purchases.retain(|p| p.user_id != id);
        tables.users.retain(|(u, _)| u.id != id);
        Ok(true)
    }

    async fn create_course(&self, draft: CourseDraft, instructor_id: i32) -> RepoResult<Course> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        tables.next_course_id += 1;
        let course = Course {
            id: tables.next_course_id,
            title: draft.title,
            description: draft.description,
            price: draft.price,
            instructor_id,
            created_at: Utc::now(),
        };
        tables.courses.push(course.clone());
        Ok(course)
    }

    async fn list_courses(&self) -> RepoResult<Vec<Course>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let mut courses = tables.courses.clone();
        courses.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(courses)
    }

    async fn update_course(
        &self,
        id: i32,
        instructor_id: i32,
        draft: CourseDraft,
    ) -> RepoResult<Option<Course>> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .courses
            .iter_mut()
            .find(|c| c.id == id && c.instructor_id == instructor_id)
            .map(|c| {
                c.title = draft.title;
                c.description = draft.description;
                c.price = draft.price;
                c.clone()
            }))
    }

    async fn delete_course(&self, id: i32, instructor_id: i32) -> RepoResult<bool> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if !tables
            .courses
            .iter()
            .any(|c| c.id == id && c.instructor_id == instructor_id)
        {
            return Ok(false);
        }
        tables.purchases.retain(|p| p.course_id != id);
        tables.courses.retain(|c| c.id != id);
        Ok(true)
    }

    async fn create_purchase(&self, user_id: i32, course_id: i32) -> RepoResult<Purchase> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if tables
            .purchases
            .iter()
            .any(|p| p.user_id == user_id && p.course_id == course_id)
        {
            return Err(RepositoryError::UniqueViolation(
                "purchases_user_id_course_id_key".to_string(),
            ));
        }
        let known_user = tables.users.iter().any(|(u, _)| u.id == user_id);
        let known_course = tables.courses.iter().any(|c| c.id == course_id);
        if !known_user || !known_course {
            return Err(RepositoryError::ForeignKeyViolation(
                "purchases_course_id_fkey".to_string(),
            ));
        }
        tables.next_purchase_id += 1;
        let purchase = Purchase {
            id: tables.next_purchase_id,
            user_id,
            course_id,
            purchased_at: Utc::now(),
        };
        tables.purchases.push(purchase.clone());
        Ok(purchase)
    }

    async fn list_purchases(&self) -> RepoResult<Vec<PurchaseRecord>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let mut purchases = tables.purchases.clone();
        purchases.sort_by(|a, b| (b.purchased_at, b.id).cmp(&(a.purchased_at, a.id)));
        Ok(purchases
            .into_iter()
            .filter_map(|p| {
                let (user, _) = tables.users.iter().find(|(u, _)| u.id == p.user_id)?;
                let course = tables.courses.iter().find(|c| c.id == p.course_id)?;
                Some(PurchaseRecord {
                    id: p.id,
                    purchased_at: p.purchased_at,
                    username: user.username.clone(),
                    course_title: course.title.clone(),
                    price: course.price,
                })
            })
            .collect())
    }

    async fn list_user_courses(&self, user_id: i32) -> RepoResult<Vec<Course>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let mut purchases: Vec<&Purchase> =
            tables.purchases.iter().filter(|p| p.user_id == user_id).collect();
        purchases.sort_by(|a, b| (b.purchased_at, b.id).cmp(&(a.purchased_at, a.id)));
        Ok(purchases
            .into_iter()
            .filter_map(|p| tables.courses.iter().find(|c| c.id == p.course_id).cloned())
            .collect())
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        salt_rounds: TEST_COST,
        ..AppConfig::default()
    }
}

pub fn test_state(repo: Arc<InMemoryRepository>) -> AppState {
    AppState {
        repo,
        config: test_config(),
    }
}

/// Inserts a user directly, bypassing the registration handler.
pub async fn seed_user(repo: &InMemoryRepository, username: &str, role: Role, password: &str) -> User {
    let password_hash = password::hash(password, TEST_COST).unwrap();
    repo.create_user(NewUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password_hash,
        role,
    })
    .await
    .unwrap()
}

pub fn bearer_for(user: &User, config: &AppConfig) -> String {
    format!("Bearer {}", issue_token(user.id, user.role, config).unwrap())
}
