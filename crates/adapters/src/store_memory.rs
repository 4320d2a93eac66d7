//! In-memory store for testing and offline mode

use async_trait::async_trait;
use crosspost_domain::{
    AccountCredential, AccountDirectory, AccountError, Clock, PersistError, Platform, Post,
    PostHistory, PublishResult, ResultPersister, SocialAccount, SystemClock,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// In-memory store implementation
pub struct InMemoryStore {
    accounts: RwLock<HashMap<(Uuid, Platform), SocialAccount>>,
    posts: RwLock<Vec<Post>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            posts: RwLock::new(Vec::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultPersister for InMemoryStore {
    async fn save(&self, result: &PublishResult, user_id: Uuid) -> Result<Post, PersistError> {
        let post = Post::from_result(result, user_id, self.clock.now());
        let mut posts = self
            .posts
            .write()
            .map_err(|e| PersistError::Database(e.to_string()))?;
        posts.push(post.clone());
        Ok(post)
    }
}

#[async_trait]
impl PostHistory for InMemoryStore {
    async fn list_posts(
        &self,
        user_id: Uuid,
        platform: Option<Platform>,
    ) -> Result<Vec<Post>, PersistError> {
        let posts = self
            .posts
            .read()
            .map_err(|e| PersistError::Database(e.to_string()))?;
        // Newest first
        Ok(posts
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .filter(|p| platform.is_none_or(|platform| p.platform == platform))
            .cloned()
            .collect())
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, PersistError> {
        let posts = self
            .posts
            .read()
            .map_err(|e| PersistError::Database(e.to_string()))?;
        Ok(posts.iter().find(|p| p.id == id).cloned())
    }
}

#[async_trait]
impl AccountDirectory for InMemoryStore {
    async fn credential(
        &self,
        user_id: Uuid,
        platform: Platform,
    ) -> Result<AccountCredential, AccountError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|e| AccountError::Database(e.to_string()))?;
        accounts
            .get(&(user_id, platform))
            .map(SocialAccount::credential)
            .ok_or(AccountError::NotConnected { user_id, platform })
    }

    async fn connect(&self, account: &SocialAccount) -> Result<(), AccountError> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|e| AccountError::Database(e.to_string()))?;
        accounts.insert((account.user_id, account.platform), account.clone());
        Ok(())
    }

    async fn list_accounts(&self, user_id: Uuid) -> Result<Vec<SocialAccount>, AccountError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|e| AccountError::Database(e.to_string()))?;
        let mut found: Vec<_> = accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.platform.as_str());
        Ok(found)
    }
}
