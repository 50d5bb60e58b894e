use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// A signed-in user. `uid` namespaces every stored transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
        }
    }

    /// The letter shown in the profile badge.
    pub fn initial(&self) -> char {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .and_then(|s| s.chars().next())
            .unwrap_or('?')
    }

    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.uid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user not found")]
    UserNotFound,
    #[error("email already in use")]
    EmailAlreadyInUse,
    #[error("full name is required")]
    MissingName,
    /// Anything the provider reported that matches no known category.
    #[error("{0}")]
    Provider(String),
}

impl AuthError {
    /// Classifies a raw provider message by the error codes it mentions.
    pub fn from_provider_message(message: &str) -> Self {
        if message.contains("auth/invalid-credential") || message.contains("wrong-password") {
            AuthError::InvalidCredentials
        } else if message.contains("auth/user-not-found") {
            AuthError::UserNotFound
        } else if message.contains("auth/email-already-in-use") {
            AuthError::EmailAlreadyInUse
        } else {
            AuthError::Provider(message.to_string())
        }
    }

    /// Text for the sign-in form. Unknown provider messages pass through unchanged.
    pub fn user_message(&self) -> &str {
        match self {
            AuthError::InvalidCredentials => "Неверный email или пароль.",
            AuthError::UserNotFound => "Аккаунт не найден. Попробуйте зарегистрироваться.",
            AuthError::EmailAlreadyInUse => "Такой email уже зарегистрирован.",
            AuthError::MissingName => "Пожалуйста, укажите имя.",
            AuthError::Provider(message) => message,
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Identity, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_out(&self);

    fn current(&self) -> Option<Identity>;
}

/// Checks run before any provider call.
pub fn validate_registration(full_name: &str) -> Result<&str, AuthError> {
    let trimmed = full_name.trim();
    if trimmed.is_empty() {
        Err(AuthError::MissingName)
    } else {
        Ok(trimmed)
    }
}

struct Account {
    password: String,
    identity: Identity,
}

/// Accounts kept in memory for the lifetime of the process.
#[derive(Default)]
pub struct MemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<Identity>>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_current(&self, identity: Option<Identity>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = identity;
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Identity, AuthError> {
        let full_name = validate_registration(full_name)?;
        let key = email.trim().to_lowercase();
        let identity = {
            let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
            if accounts.contains_key(&key) {
                return Err(AuthError::EmailAlreadyInUse);
            }
            let identity = Identity {
                uid: uuid::Uuid::new_v4().simple().to_string(),
                email: Some(email.trim().to_string()),
                display_name: Some(full_name.to_string()),
            };
            accounts.insert(
                key,
                Account {
                    password: password.to_string(),
                    identity: identity.clone(),
                },
            );
            identity
        };
        tracing::info!(uid = %identity.uid, "account registered");
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = {
            let accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
            let account = accounts
                .get(&email.trim().to_lowercase())
                .ok_or(AuthError::UserNotFound)?;
            if account.password != password {
                return Err(AuthError::InvalidCredentials);
            }
            account.identity.clone()
        };
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) {
        self.set_current(None);
    }

    fn current(&self) -> Option<Identity> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
