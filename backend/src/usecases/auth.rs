use std::sync::{Arc, LazyLock};

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString},
};
use chrono::{Duration, Utc};
use crates::domain::{
    entities::{subscriptions::InsertSubscriptionEntity, users::InsertUserEntity},
    repositories::{
        devices::DeviceRepository, subscriptions::SubscriptionRepository, users::UserRepository,
    },
    value_objects::users::{LoginDto, LoginModel, RegisterModel, RegisteredUserDto, UserDto},
};
use rand::{Rng, seq::SliceRandom};
use regex::Regex;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::issue_token,
    axum_http::error_responses::AppError,
    config::config_model::{Jwt, Trial},
};

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

const GENERATED_PASSWORD_LEN: usize = 10;
const MIN_PASSWORD_LEN: usize = 6;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Email обязателен для заполнения")]
    MissingEmail,
    #[error("Неверный формат email")]
    InvalidEmail,
    #[error("Пользователь с таким email уже существует")]
    EmailTaken,
    #[error("Пароль должен содержать не менее {MIN_PASSWORD_LEN} символов")]
    WeakPassword,
    #[error("Email/имя пользователя и пароль обязательны для заполнения")]
    MissingCredentials,
    #[error("Неверные учетные данные")]
    InvalidCredentials,
    #[error("Пользователь не найден")]
    UserNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AccountError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            AccountError::MissingEmail
            | AccountError::InvalidEmail
            | AccountError::EmailTaken
            | AccountError::WeakPassword
            | AccountError::MissingCredentials => StatusCode::BAD_REQUEST,
            AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AccountError::UserNotFound => StatusCode::NOT_FOUND,
            AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Internal(err) => AppError::Internal(err),
            other => AppError::rejected(other.status_code(), other.to_string()),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, AccountError>;

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Random password with at least one character from each class.
pub fn generate_password(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let classes = [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS];
    let all: Vec<u8> = classes.concat();

    let mut chars: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    while chars.len() < len {
        chars.push(all[rng.gen_range(0..all.len())]);
    }
    chars.shuffle(&mut rng);

    chars.into_iter().map(char::from).collect()
}

pub struct AuthUseCase<U, S, D>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    D: DeviceRepository + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    subscription_repo: Arc<S>,
    device_repo: Arc<D>,
    jwt: Jwt,
    trial: Trial,
}

impl<U, S, D> AuthUseCase<U, S, D>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    D: DeviceRepository + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        subscription_repo: Arc<S>,
        device_repo: Arc<D>,
        jwt: Jwt,
        trial: Trial,
    ) -> Self {
        Self {
            user_repo,
            subscription_repo,
            device_repo,
            jwt,
            trial,
        }
    }

    async fn unique_username(&self, base: &str) -> UseCaseResult<String> {
        let mut candidate = base.to_string();
        let mut counter = 1;

        loop {
            let taken = self
                .user_repo
                .username_exists(candidate.clone())
                .await
                .map_err(|err| {
                    error!(db_error = ?err, "auth: failed to check username");
                    AccountError::Internal(err)
                })?;
            if !taken {
                return Ok(candidate);
            }
            candidate = format!("{base}{counter}");
            counter += 1;
        }
    }

    pub async fn register(&self, model: RegisterModel) -> UseCaseResult<RegisteredUserDto> {
        let email = model
            .email
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .ok_or(AccountError::MissingEmail)?;

        if !EMAIL_REGEX.is_match(&email) {
            warn!("auth: registration with malformed email");
            return Err(AccountError::InvalidEmail);
        }

        let existing = self
            .user_repo
            .find_by_email(email.clone())
            .await
            .map_err(|err| {
                error!(db_error = ?err, "auth: failed to look up email");
                AccountError::Internal(err)
            })?;
        if existing.is_some() {
            info!("auth: registration for existing email refused");
            return Err(AccountError::EmailTaken);
        }

        let (password, generated_password) = match model.password {
            Some(password) if password.chars().count() < MIN_PASSWORD_LEN => {
                return Err(AccountError::WeakPassword);
            }
            Some(password) => (password, None),
            None => {
                let generated = generate_password(GENERATED_PASSWORD_LEN);
                (generated.clone(), Some(generated))
            }
        };

        let base_username = email.split('@').next().unwrap_or_default().to_string();
        let username = self.unique_username(&base_username).await?;
        let password_hash = hash_password(&password)?;

        let trial_expires_at = Utc::now() + Duration::days(self.trial.duration_days);

        let (user, subscription) = self
            .user_repo
            .create_with_subscription(
                InsertUserEntity {
                    email,
                    username,
                    password_hash,
                    is_admin: false,
                },
                InsertSubscriptionEntity {
                    user_id: Uuid::nil(),
                    is_active: true,
                    device_limit: self.trial.device_limit,
                    expires_at: Some(trial_expires_at),
                    auto_renewal: false,
                },
            )
            .await
            .map_err(|err| {
                error!(db_error = ?err, "auth: failed to create user");
                AccountError::Internal(err)
            })?;

        info!(user_id = %user.id, %trial_expires_at, "auth: user registered with trial");

        Ok(RegisteredUserDto {
            user: UserDto::new(user, Some(subscription)),
            generated_password,
        })
    }

    pub async fn login(&self, model: LoginModel) -> UseCaseResult<LoginDto> {
        let email = model.email.filter(|value| !value.trim().is_empty());
        let username = model.username.filter(|value| !value.trim().is_empty());
        if (email.is_none() && username.is_none()) || model.password.is_empty() {
            return Err(AccountError::MissingCredentials);
        }

        let lookup = match (email, username) {
            (Some(email), _) => self.user_repo.find_by_email(email.trim().to_lowercase()).await,
            (None, Some(username)) => {
                self.user_repo
                    .find_by_username(username.trim().to_string())
                    .await
            }
            (None, None) => return Err(AccountError::MissingCredentials),
        };

        let user = lookup
            .map_err(|err| {
                error!(db_error = ?err, "auth: failed to look up user for login");
                AccountError::Internal(err)
            })?
            .ok_or(AccountError::InvalidCredentials)?;

        if !verify_password(&model.password, &user.password_hash) {
            warn!(user_id = %user.id, "auth: wrong password");
            return Err(AccountError::InvalidCredentials);
        }

        let device_id = model
            .device_id
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let token = issue_token(&self.jwt.secret, user.id, &device_id, self.jwt.expires_in_secs)?;

        let subscription = self
            .subscription_repo
            .find_by_user_id(user.id)
            .await
            .map_err(AccountError::Internal)?;

        info!(user_id = %user.id, "auth: login succeeded");

        Ok(LoginDto {
            token,
            device_id,
            user: UserDto::new(user, subscription),
        })
    }

    pub async fn logout(&self, user_id: Uuid, device_id: String) -> UseCaseResult<()> {
        let removed = self
            .device_repo
            .remove_device(user_id, device_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "auth: failed to remove device on logout");
                AccountError::Internal(err)
            })?;

        info!(%user_id, removed, "auth: logout");
        Ok(())
    }

    pub async fn me(&self, user_id: Uuid) -> UseCaseResult<UserDto> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(AccountError::Internal)?
            .ok_or(AccountError::UserNotFound)?;

        let subscription = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(AccountError::Internal)?;

        Ok(UserDto::new(user, subscription))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::{
        entities::{subscriptions::SubscriptionEntity, users::UserEntity},
        repositories::{
            devices::MockDeviceRepository, subscriptions::MockSubscriptionRepository,
            users::MockUserRepository,
        },
    };
    use mockall::predicate::eq;

    fn usecase(
        users: MockUserRepository,
        subscriptions: MockSubscriptionRepository,
    ) -> AuthUseCase<MockUserRepository, MockSubscriptionRepository, MockDeviceRepository> {
        AuthUseCase::new(
            Arc::new(users),
            Arc::new(subscriptions),
            Arc::new(MockDeviceRepository::new()),
            Jwt {
                secret: "test-secret".to_string(),
                expires_in_secs: 3600,
            },
            Trial {
                duration_days: 7,
                device_limit: 2,
            },
        )
    }

    fn stored_user(email: &str, username: &str, password: &str) -> UserEntity {
        UserEntity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash: hash_password(password).unwrap(),
            is_admin: false,
            phone_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn generated_password_has_every_class() {
        let password = generate_password(GENERATED_PASSWORD_LEN);

        assert_eq!(password.len(), GENERATED_PASSWORD_LEN);
        assert!(password.bytes().any(|b| UPPERCASE.contains(&b)));
        assert!(password.bytes().any(|b| LOWERCASE.contains(&b)));
        assert!(password.bytes().any(|b| DIGITS.contains(&b)));
        assert!(password.bytes().any(|b| SYMBOLS.contains(&b)));
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("s3cret!").unwrap();

        assert!(verify_password("s3cret!", &hash));
        assert!(!verify_password("other", &hash));
        assert!(!verify_password("s3cret!", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn register_picks_next_free_username_and_starts_trial() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .with(eq("anna@example.com".to_string()))
            .returning(|_| Ok(None));
        users
            .expect_username_exists()
            .with(eq("anna".to_string()))
            .returning(|_| Ok(true));
        users
            .expect_username_exists()
            .with(eq("anna1".to_string()))
            .returning(|_| Ok(false));
        users
            .expect_create_with_subscription()
            .withf(|user, subscription| {
                user.username == "anna1"
                    && user.email == "anna@example.com"
                    && subscription.is_active
                    && subscription.device_limit == 2
            })
            .returning(|user, subscription| {
                let id = Uuid::new_v4();
                Ok((
                    UserEntity {
                        id,
                        email: user.email,
                        username: user.username,
                        password_hash: user.password_hash,
                        is_admin: false,
                        phone_number: None,
                        created_at: Utc::now(),
                        updated_at: Utc::now(),
                    },
                    SubscriptionEntity {
                        user_id: id,
                        is_active: subscription.is_active,
                        device_limit: subscription.device_limit,
                        expires_at: subscription.expires_at,
                        plan_id: None,
                        last_payment_id: None,
                        auto_renewal: false,
                        default_payment_method_ref: None,
                        updated_at: Utc::now(),
                    },
                ))
            });

        let registered = usecase(users, MockSubscriptionRepository::new())
            .register(RegisterModel {
                email: Some(" Anna@Example.com ".to_string()),
                password: None,
            })
            .await
            .unwrap();

        assert_eq!(registered.user.username, "anna1");
        assert_eq!(
            registered.generated_password.map(|p| p.len()),
            Some(GENERATED_PASSWORD_LEN)
        );
        let subscription = registered.user.subscription.unwrap();
        assert!(subscription.active);
        let trial_days = (subscription.expire_date.unwrap() - Utc::now()).num_days();
        assert!((6..=7).contains(&trial_days));
    }

    #[tokio::test]
    async fn register_rejects_duplicate_and_malformed_email() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(|email| Ok(Some(stored_user(&email, "taken", "password"))));
        let usecase = usecase(users, MockSubscriptionRepository::new());

        let duplicate = usecase
            .register(RegisterModel {
                email: Some("taken@example.com".to_string()),
                password: None,
            })
            .await;
        assert!(matches!(duplicate, Err(AccountError::EmailTaken)));

        let malformed = usecase
            .register(RegisterModel {
                email: Some("not-an-email".to_string()),
                password: None,
            })
            .await;
        assert!(matches!(malformed, Err(AccountError::InvalidEmail)));

        let missing = usecase
            .register(RegisterModel {
                email: None,
                password: None,
            })
            .await;
        assert!(matches!(missing, Err(AccountError::MissingEmail)));
    }

    #[tokio::test]
    async fn login_by_username_issues_token_with_fresh_device() {
        let user = stored_user("anna@example.com", "anna", "correct-horse");
        let user_id = user.id;

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_username()
            .with(eq("anna".to_string()))
            .returning(move |_| Ok(Some(user.clone())));
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_find_by_user_id()
            .with(eq(user_id))
            .returning(|_| Ok(None));

        let login = usecase(users, subscriptions)
            .login(LoginModel {
                email: None,
                username: Some("anna".to_string()),
                password: "correct-horse".to_string(),
                device_id: None,
            })
            .await
            .unwrap();

        let claims = crate::auth::validate_token("test-secret", &login.token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.device_id, login.device_id);
        assert!(Uuid::parse_str(&login.device_id).is_ok());
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_unauthorized() {
        let user = stored_user("anna@example.com", "anna", "correct-horse");

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));

        let result = usecase(users, MockSubscriptionRepository::new())
            .login(LoginModel {
                email: Some("anna@example.com".to_string()),
                username: None,
                password: "wrong".to_string(),
                device_id: Some("tv".to_string()),
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
