use strum::{Display, EnumString, IntoStaticStr};

/// Channel back to the mini-app's JavaScript context.
///
/// Implemented by the host `WebView` integration. Replies are keyed by the
/// callback id the script sent with its command.
#[uniffi::export(with_foreign)]
pub trait BridgeExecutor: Send + Sync {
    /// Resolves the script promise identified by `callback_id` with `value`.
    fn post_value(&self, callback_id: String, value: String);

    /// Rejects the script promise identified by `callback_id` with `error`.
    fn post_error(&self, callback_id: String, error: String);

    /// Fires a `window` event of type `event_type` carrying `value`.
    fn dispatch_event(&self, event_type: String, value: String);
}

/// Events pushed to the mini-app without a pending callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, uniffi::Enum)]
#[strum(serialize_all = "lowercase")]
pub enum NativeEventType {
    /// The secure storage finished loading.
    MiniAppSecureStorageReady,
    /// The secure storage could not be loaded.
    MiniAppSecureStorageLoadError,
}
