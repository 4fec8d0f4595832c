//! Demo account directory

use sha2::{Digest, Sha256};

use super::{AuthError, Authenticator, Role, User};

struct DemoAccount {
    id: &'static str,
    name: &'static str,
    email: &'static str,
    role: Role,
    password: &'static str,
}

const DEMO_ACCOUNTS: &[DemoAccount] = &[
    DemoAccount {
        id: "1",
        name: "Aarav Sharma",
        email: "student@krmangalam.edu.in",
        role: Role::Student,
        password: "student123",
    },
    DemoAccount {
        id: "2",
        name: "Dr. Priya Gupta",
        email: "instructor@krmangalam.edu.in",
        role: Role::Instructor,
        password: "instructor123",
    },
];

/// Fixed training accounts for classroom use.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoDirectory;

impl DemoDirectory {
    pub fn new() -> Self {
        Self
    }

    /// Emails of the built-in accounts.
    pub fn emails(&self) -> impl Iterator<Item = &'static str> {
        DEMO_ACCOUNTS.iter().map(|a| a.email)
    }
}

impl Authenticator for DemoDirectory {
    fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let account = DEMO_ACCOUNTS
            .iter()
            .find(|a| a.email == email)
            .ok_or(AuthError::InvalidCredentials)?;

        if !digest_eq(account.password, password) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(User {
            id: account.id.to_string(),
            name: account.name.to_string(),
            email: account.email.to_string(),
            role: account.role,
            avatar: None,
        })
    }
}

// Constant-time over fixed-length digests.
fn digest_eq(expected: &str, given: &str) -> bool {
    let a = Sha256::digest(expected.as_bytes());
    let b = Sha256::digest(given.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_login() {
        let user = DemoDirectory::new()
            .authenticate("student@krmangalam.edu.in", "student123")
            .unwrap();
        assert_eq!(user.role, Role::Student);
        assert_eq!(user.name, "Aarav Sharma");
    }

    #[test]
    fn test_instructor_login() {
        let user = DemoDirectory::new()
            .authenticate("instructor@krmangalam.edu.in", "instructor123")
            .unwrap();
        assert_eq!(user.role, Role::Instructor);
        assert_eq!(user.id, "2");
    }

    #[test]
    fn test_wrong_password() {
        let err = DemoDirectory::new()
            .authenticate("student@krmangalam.edu.in", "instructor123")
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn test_unknown_email() {
        let err = DemoDirectory::new()
            .authenticate("nobody@example.com", "student123")
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn test_serialized_user_has_no_password() {
        let user = DemoDirectory::new()
            .authenticate("student@krmangalam.edu.in", "student123")
            .unwrap();
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("student123"));
        assert!(json.contains("\"role\":\"student\""));
    }

    #[test]
    fn test_emails_list_every_account() {
        let emails: Vec<_> = DemoDirectory::new().emails().collect();
        assert_eq!(
            emails,
            vec!["student@krmangalam.edu.in", "instructor@krmangalam.edu.in"]
        );
    }
}
