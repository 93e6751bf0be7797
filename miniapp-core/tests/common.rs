//! Common test utilities shared across integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use miniapp_core::{
    BridgeExecutor, EncryptionKeyProvider, SecureStorageConfig, SecureStorageDispatcher,
    SecureStorageHost, SecureStorageResult,
};
use tempfile::TempDir;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Everything the dispatcher sent back to the "script".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeMessage {
    Value { callback_id: String, value: String },
    Error { callback_id: String, error: String },
    Event { event_type: String, value: String },
}

/// Forwards every post to a channel the test awaits on.
pub struct ChannelExecutor {
    tx: mpsc::UnboundedSender<BridgeMessage>,
}

impl BridgeExecutor for ChannelExecutor {
    fn post_value(&self, callback_id: String, value: String) {
        let _ = self.tx.send(BridgeMessage::Value { callback_id, value });
    }

    fn post_error(&self, callback_id: String, error: String) {
        let _ = self.tx.send(BridgeMessage::Error { callback_id, error });
    }

    fn dispatch_event(&self, event_type: String, value: String) {
        let _ = self.tx.send(BridgeMessage::Event { event_type, value });
    }
}

/// Returns the same key for every database.
pub struct FixedKeyProvider(pub [u8; 32]);

impl EncryptionKeyProvider for FixedKeyProvider {
    fn database_key(&self, _database_name: String) -> SecureStorageResult<Vec<u8>> {
        Ok(self.0.to_vec())
    }
}

pub fn config(dir: &TempDir) -> SecureStorageConfig {
    SecureStorageConfig::new(dir.path().to_string_lossy().into_owned())
}

pub fn host_with(
    config: SecureStorageConfig,
    provider: Arc<dyn EncryptionKeyProvider>,
) -> Arc<SecureStorageHost> {
    SecureStorageHost::with_runtime(config, provider, Handle::current())
}

pub fn host(dir: &TempDir) -> Arc<SecureStorageHost> {
    host_with(config(dir), Arc::new(FixedKeyProvider([0x5a; 32])))
}

/// A dispatcher wired to a channel executor for one mini-app.
pub struct Session {
    pub dispatcher: Arc<SecureStorageDispatcher>,
    rx: mpsc::UnboundedReceiver<BridgeMessage>,
}

impl Session {
    pub fn new(host: &Arc<SecureStorageHost>, mini_app_id: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Arc::clone(host).create_dispatcher();
        dispatcher.set_bridge_executor(Arc::new(ChannelExecutor { tx }));
        dispatcher.set_mini_app_components(mini_app_id.to_string());
        Self { dispatcher, rx }
    }

    pub async fn next(&mut self) -> BridgeMessage {
        tokio::time::timeout(Duration::from_secs(10), self.rx.recv())
            .await
            .expect("bridge reply timed out")
            .expect("bridge channel closed")
    }

    pub async fn load(&mut self) -> BridgeMessage {
        self.dispatcher.on_load();
        self.next().await
    }

    pub async fn set_items(&mut self, callback_id: &str, items: serde_json::Value) -> BridgeMessage {
        let payload = serde_json::json!({
            "action": "setSecureStorageItems",
            "param": { "secureStorageItems": items },
            "id": callback_id,
        });
        self.dispatcher
            .on_set_items(callback_id.to_string(), &payload.to_string());
        self.next().await
    }

    pub async fn get_item(&mut self, callback_id: &str, key: &str) -> BridgeMessage {
        let payload = serde_json::json!({ "param": { "secureStorageKey": key } });
        self.dispatcher
            .on_get_item(callback_id.to_string(), &payload.to_string());
        self.next().await
    }

    pub async fn remove_items(&mut self, callback_id: &str, keys: &[&str]) -> BridgeMessage {
        let payload = serde_json::json!({ "param": { "secureStorageKeyList": keys } });
        self.dispatcher
            .on_remove_items(callback_id.to_string(), &payload.to_string());
        self.next().await
    }

    pub async fn clear_all(&mut self, callback_id: &str) -> BridgeMessage {
        self.dispatcher.on_clear_all(callback_id.to_string());
        self.next().await
    }

    pub async fn size(&mut self, callback_id: &str) -> BridgeMessage {
        self.dispatcher.on_size(callback_id.to_string());
        self.next().await
    }
}

pub fn value(callback_id: &str, value: &str) -> BridgeMessage {
    BridgeMessage::Value {
        callback_id: callback_id.to_string(),
        value: value.to_string(),
    }
}

pub fn ready_event() -> BridgeMessage {
    BridgeMessage::Event {
        event_type: "miniappsecurestorageready".to_string(),
        value: String::new(),
    }
}

/// Returns the `type` of an error reply for `callback_id`.
pub fn error_type(message: &BridgeMessage, callback_id: &str) -> String {
    match message {
        BridgeMessage::Error {
            callback_id: id,
            error,
        } if id == callback_id => {
            let json: serde_json::Value = serde_json::from_str(error).expect("error json");
            json["type"].as_str().expect("error type").to_string()
        }
        other => panic!("expected an error for {callback_id}, got {other:?}"),
    }
}
