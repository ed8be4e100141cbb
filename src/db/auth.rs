use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Store;
use crate::models::{PublicUser, Session};

impl Store {
    /// Checks the credentials and opens a session, returning its token.
    pub fn login(
        &mut self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Option<(String, PublicUser)> {
        let user = self
            .users
            .iter()
            .find(|u| u.username == username && u.password == password)?
            .public();
        let token = format!("sess_{}", Uuid::new_v4().simple());
        self.sessions.insert(
            token.clone(),
            Session {
                user_id: user.id.clone(),
                created_at: now,
            },
        );
        Some((token, user))
    }

    pub fn logout(&mut self, token: &str) {
        self.sessions.remove(token);
    }

    pub fn verify(&self, token: &str) -> Option<PublicUser> {
        let session = self.sessions.get(token)?;
        self.users
            .iter()
            .find(|u| u.id == session.user_id)
            .map(|u| u.public())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
