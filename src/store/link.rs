use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::errors::AppError;

use super::KvStore;

const CODE_LEN: usize = 8;

/// One-shot codes that bind a chat to a wallet.
///
/// A wallet asks for a code, the chat redeems it, and from then on the chat
/// resolves to that wallet. Unredeemed codes expire after `ttl`.
#[derive(Clone)]
pub struct LinkCodes {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl LinkCodes {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        LinkCodes { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn issue(&self, wallet: &str) -> String {
        loop {
            let code = new_code();
            let key = code_key(&code);
            if self.store.get(&key).await.is_none() {
                self.store.set(&key, wallet.to_string(), Some(self.ttl)).await;
                info!("Issued link code for {}", wallet);
                return code;
            }
        }
    }

    /// Consume `code` and bind `chat_id` to its wallet.
    pub async fn redeem(&self, code: &str, chat_id: i64) -> Result<String, AppError> {
        let code = code.trim().to_uppercase();
        let wallet = self
            .store
            .remove(&code_key(&code))
            .await
            .ok_or_else(|| AppError::NotFound("link code is unknown or expired".into()))?;
        self.store.set(&chat_key(chat_id), wallet.clone(), None).await;
        info!("Chat {} linked to {}", chat_id, wallet);
        Ok(wallet)
    }

    pub async fn wallet_for_chat(&self, chat_id: i64) -> Option<String> {
        self.store.get(&chat_key(chat_id)).await
    }
}

fn new_code() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..CODE_LEN].to_uppercase()
}

fn code_key(code: &str) -> String {
    format!("link:{}", code)
}

fn chat_key(chat_id: i64) -> String {
    format!("chat:{}", chat_id)
}
