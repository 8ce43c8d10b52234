//! Client sessions (spec §3 "Client session"): usernames need not be
//! unique across history, but must be unique among currently-connected
//! sessions.

use std::collections::HashMap;
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct ClientSession {
    pub username: String,
    pub connected_at: SystemTime,
}

#[derive(Debug, Default)]
pub struct SessionTable {
    by_username: HashMap<String, ClientSession>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct UsernameTaken;

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, username: String) -> Result<(), UsernameTaken> {
        if self.by_username.contains_key(&username) {
            return Err(UsernameTaken);
        }
        self.by_username.insert(
            username.clone(),
            ClientSession {
                username,
                connected_at: SystemTime::now(),
            },
        );
        Ok(())
    }

    pub fn disconnect(&mut self, username: &str) {
        self.by_username.remove(username);
    }

    pub fn is_connected(&self, username: &str) -> bool {
        self.by_username.contains_key(username)
    }
}
