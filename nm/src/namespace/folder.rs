//! Folder records (spec §3 "Folder"). The root folder (`""`) always
//! exists and is never created or deleted explicitly.

use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct Folder {
    pub path: String,
    pub owner: String,
    pub created_at: SystemTime,
}

impl Folder {
    pub fn root(owner: impl Into<String>) -> Self {
        Self {
            path: String::new(),
            owner: owner.into(),
            created_at: SystemTime::now(),
        }
    }
}
